mod core_check;
mod manual;
mod merger;

pub use core_check::{classify, classify_text, normalize, CoreCheck, CORE_CHECK_RULES};
pub use manual::{load_results, parse_results, ParsedSection, ResultEntry};
pub use merger::{merge, merge_results, CoreCheckSummary, MergedResults, MergedTestRecord, SourceType};
