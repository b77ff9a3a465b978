mod benchmark;
mod coverage;
mod formats;
mod generator;
mod html;
mod sources;
mod table;
mod template;

pub use benchmark::{BenchmarkMetric, BenchmarkSummary};
pub use coverage::{load_coverage, parse_coverage, parse_lcov, CoverageReport, FileCoverage};
pub use formats::{to_csv, to_json, to_json_pretty, to_markdown};
pub use generator::{
    format_duration, report_timestamp, CoreCheckRow, CoverageSection, EvidenceSummary, ReportData, ReportFiles,
    ReportGenerator, ReportInput, SecuritySection, MIN_LINE_COVERAGE, REPORT_TITLE,
};
pub use html::HtmlRenderer;
pub use sources::ReportSources;
pub use template::{Placeholder, TemplateRenderer, TemplateValues};
pub use table::CoreCheckTableRow;
