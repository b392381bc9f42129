//! Core domain types shared by every console component.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a log entry, ordered from least to most urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation-ordered identifier of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One immutable record in the activity feed.
///
/// Entries are only minted by [`crate::vigil_log::LogBuffer::append`]; the fields are
/// read-only from the outside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    id: EntryId,
    message: String,
    timestamp: DateTime<Utc>,
    severity: Severity,
}

impl LogEntry {
    pub(crate) fn new(
        id: EntryId,
        message: String,
        timestamp: DateTime<Utc>,
        severity: Severity,
    ) -> Self {
        Self { id, message, timestamp, severity }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Simulated head count for one zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCount {
    pub label: String,
    pub count: u32,
}

/// Maximum occupancy the density display scales against.
pub const OCCUPANCY_CAPACITY: u32 = 50;

/// A simulated per-zone occupancy reading.
///
/// `total_count` is carried separately from the zones; producers decide how the two
/// relate (the bundled generator sums the zones).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensitySnapshot {
    pub total_count: u32,
    pub zones: Vec<ZoneCount>,
}

impl DensitySnapshot {
    pub fn capacity(&self) -> u32 {
        OCCUPANCY_CAPACITY
    }

    /// Fraction of capacity in use, clamped to `0.0..=1.0`.
    pub fn occupancy_ratio(&self) -> f64 {
        (f64::from(self.total_count) / f64::from(OCCUPANCY_CAPACITY)).clamp(0.0, 1.0)
    }

    pub fn zone_sum(&self) -> u32 {
        self.zones.iter().map(|zone| zone.count).sum()
    }
}

/// Rejected user action. The display text doubles as the error entry's message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid video URL: {input}")]
    InvalidUrl { input: String },
    #[error("No video source selected: enter a URL or upload a file first")]
    NoSource,
    #[error("Unsupported file type {declared:?}: please select a video file")]
    UnsupportedMediaType { declared: String },
    #[error("File too large: {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("Cannot send an empty message")]
    EmptyMessage,
    #[error("Stop the running analysis before changing the video source")]
    AnalysisRunning,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Severity::Info, Severity::Warning)]
    #[case(Severity::Warning, Severity::Error)]
    fn severities_are_ordered_by_urgency(#[case] lower: Severity, #[case] higher: Severity) {
        assert!(lower < higher);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let value = serde_json::to_value(Severity::Warning).unwrap();
        assert_eq!(value, serde_json::json!("warning"));
    }

    #[test]
    fn occupancy_ratio_is_clamped() {
        let snapshot = DensitySnapshot {
            total_count: 80,
            zones: vec![ZoneCount { label: "Zone A".to_string(), count: 80 }],
        };
        assert_eq!(snapshot.occupancy_ratio(), 1.0);
        assert_eq!(snapshot.capacity(), 50);
    }

    #[test]
    fn validation_error_text_names_the_limit() {
        let error = ValidationError::FileTooLarge { size_bytes: 10, limit_bytes: 5 };
        assert_eq!(error.to_string(), "File too large: 10 bytes exceeds the 5 byte limit");
    }
}
