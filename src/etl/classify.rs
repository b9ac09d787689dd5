use std::sync::OnceLock;

use regex::Regex;

use crate::data::audit::TagClassification;

fn problem_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r##"[=+/&<>;'"?%#$@,. \t\r\n]"##).expect("valid problem chars regex"))
}

fn lower() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|_)*$").expect("valid lower regex"))
}

fn lower_colon() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|_)*:([a-z]|_)*$").expect("valid lower_colon regex"))
}

/// Sorts a tag key into its quality bucket. The checks overlap, so they run
/// in a fixed order and the first hit wins.
pub fn classify(key: &str) -> TagClassification {
    if problem_chars().is_match(key) {
        TagClassification::ProblemChars
    } else if key.matches(':').count() > 1 {
        TagClassification::TooManyColons
    } else if lower().is_match(key) {
        TagClassification::Lower
    } else if lower_colon().is_match(key) {
        TagClassification::LowerColon
    } else {
        TagClassification::Correct
    }
}
