//! Canonical severity names and the colors used to show them.
//!
//! Configuration and environment values are normalized to lowercase and mapped onto the
//! three severities. Unknown values return `None`.

use crate::vigil_core::Severity;

/// Official severity names (all lowercase).
pub const OFFICIAL_SEVERITIES: [&str; 3] = ["info", "warning", "error"];

/// Convert an incoming severity string into a [`Severity`].
///
/// Returns `None` for unknown names.
pub fn canonical_severity(value: &str) -> Option<Severity> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "info" | "information" | "notice" => Some(Severity::Info),
        "warning" | "warn" => Some(Severity::Warning),
        "error" | "err" | "critical" => Some(Severity::Error),
        _ => None,
    }
}

/// Color name of the dot shown next to an entry.
pub fn severity_color_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "blue",
        Severity::Warning => "yellow",
        Severity::Error => "red",
    }
}
