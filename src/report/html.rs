//! HTML rendering for reports.
//!
//! The standard report is a Tera template over the serialized `ReportData`;
//! consolidated Markdown goes through pulldown-cmark and is wrapped in the
//! same page template.

use std::collections::HashMap;
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;
use tera::{Context, Tera, Value};
use crate::audit::AuditStatus;
use crate::error::Result;
use crate::merge::ParsedSection;
use super::generator::{format_duration, ReportData, REPORT_TITLE};

const PAGE_TEMPLATE: &str = include_str!("templates/page.html");
const REPORT_TEMPLATE: &str = include_str!("templates/report.html");

#[derive(Serialize)]
struct BenchmarkRow {
    name: String,
    value: String,
    target: String,
    status: &'static str,
}

pub struct HtmlRenderer {
    tera: Tera,
}

impl HtmlRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![("page.html", PAGE_TEMPLATE), ("report.html", REPORT_TEMPLATE)])?;
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    fn register_filters(tera: &mut Tera) {
        // Milliseconds as "350ms" / "1.5s" / "2m 5s"
        tera.register_filter("duration", |value: &Value, _: &HashMap<String, Value>| {
            Ok(match value.as_u64() {
                Some(ms) => Value::String(format_duration(ms)),
                None => value.clone(),
            })
        });

        tera.register_filter("status_label", |value: &Value, _: &HashMap<String, Value>| {
            Ok(match value.as_str().and_then(AuditStatus::parse) {
                Some(status) => Value::String(status.label().to_string()),
                None => value.clone(),
            })
        });
    }

    pub fn render_report(&self, data: &ReportData) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", REPORT_TITLE);
        context.insert("report", &serde_json::to_value(data)?);
        context.insert("generated", &data.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());

        let device = &data.device_info;
        let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
        context.insert(
            "device",
            &format!("{} / {} (build {})", na(&device.device_model), na(&device.os_version), na(&device.app_build)),
        );
        context.insert(
            "pass_rate",
            &format!("{:.1}% (threshold {:.1}%)", data.pass_rate, data.pass_threshold),
        );

        let benchmarks: Vec<BenchmarkRow> = match &data.benchmarks {
            Some(ParsedSection::Data(bench)) => bench
                .metrics
                .iter()
                .map(|m| BenchmarkRow {
                    name: m.name.clone(),
                    value: m.display_value(),
                    target: m.target.map(|t| format!("{:.2}", t)).unwrap_or_else(|| "-".to_string()),
                    status: m.status(),
                })
                .collect(),
            _ => Vec::new(),
        };
        context.insert("benchmarks", &benchmarks);
        context.insert("benchmark_error", &section_error(&data.benchmarks));

        context.insert(
            "coverage",
            &data.coverage.as_ref().and_then(|c| c.data()).map(|c| {
                format!(
                    "{:.1}% ({}/{} lines, {} files)",
                    c.line_coverage, c.lines_hit, c.lines_found, c.files
                )
            }),
        );
        context.insert("coverage_error", &section_error(&data.coverage));
        context.insert("manual_error", &section_error(&data.manual_results));

        Ok(self.tera.render("report.html", &context)?)
    }

    /// Converts Markdown (tables enabled) to a full HTML page.
    pub fn render_markdown(&self, title: &str, markdown: &str) -> Result<String> {
        let mut body = String::new();
        html::push_html(&mut body, Parser::new_ext(markdown, Options::ENABLE_TABLES));

        let mut context = Context::new();
        context.insert("title", title);
        context.insert("body", &body);
        Ok(self.tera.render("page.html", &context)?)
    }
}

fn section_error<T>(section: &Option<ParsedSection<T>>) -> Option<String> {
    section.as_ref().and_then(|s| s.error_message()).map(str::to_string)
}
