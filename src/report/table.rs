use tabled::Tabled;
use super::generator::{format_duration, CoreCheckRow};

#[derive(Debug, Clone, Tabled)]
pub struct CoreCheckTableRow {
    #[tabled(rename = "#")]
    pub number: u8,
    #[tabled(rename = "Core Check")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Tests")]
    pub tests: String,
    #[tabled(rename = "Duration")]
    pub duration: String,
    #[tabled(rename = "Evidence")]
    pub evidence: String,
}

impl From<&CoreCheckRow> for CoreCheckTableRow {
    fn from(row: &CoreCheckRow) -> Self {
        let tests = if row.total == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", row.passed, row.total)
        };
        let evidence = if row.evidence_count > 0 {
            row.evidence_count.to_string()
        } else {
            "-".to_string()
        };

        CoreCheckTableRow {
            number: row.number,
            name: row.name.clone(),
            status: row.status.label().to_string(),
            tests,
            duration: format_duration(row.duration_ms),
            evidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditStatus;
    use tabled::Table;

    #[test]
    fn test_row_from_core_check() {
        let row = CoreCheckRow {
            number: 6,
            name: "Checksum Verification".to_string(),
            status: AuditStatus::Passed,
            total: 2,
            passed: 2,
            failed: 0,
            skipped: 0,
            duration_ms: 1500,
            details: String::new(),
            tests: vec![],
            evidence_count: 0,
        };
        let table_row = CoreCheckTableRow::from(&row);
        assert_eq!(table_row.tests, "2/2");
        assert_eq!(table_row.duration, "1.5s");
        assert_eq!(table_row.evidence, "-");

        let rendered = Table::new(vec![table_row]).to_string();
        assert!(rendered.contains("Core Check"));
        assert!(rendered.contains("Checksum Verification"));
    }
}
