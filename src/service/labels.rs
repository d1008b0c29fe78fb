use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The two recognised scan roles. Matching is case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanLabel {
    Flange,
    Tread,
}

impl ScanLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanLabel::Flange => "Flange",
            ScanLabel::Tread => "Tread",
        }
    }
}

impl fmt::Display for ScanLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scan label \"{0}\"")]
pub struct UnknownLabel(pub String);

impl FromStr for ScanLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Flange" => Ok(ScanLabel::Flange),
            "Tread" => Ok(ScanLabel::Tread),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Raised when two scans are not exactly one flange and one tread
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected one \"Flange\" and one \"Tread\" scan, got \"{first}\" and \"{second}\"")]
pub struct LabelMismatchError {
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalOrder {
    FlangeFirst,
    TreadFirst,
}

pub fn resolve_labels(first: &str, second: &str) -> Result<ArrivalOrder, LabelMismatchError> {
    match (first.parse::<ScanLabel>(), second.parse::<ScanLabel>()) {
        (Ok(ScanLabel::Flange), Ok(ScanLabel::Tread)) => Ok(ArrivalOrder::FlangeFirst),
        (Ok(ScanLabel::Tread), Ok(ScanLabel::Flange)) => Ok(ArrivalOrder::TreadFirst),
        _ => Err(LabelMismatchError {
            first: first.to_string(),
            second: second.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_orders_resolve() {
        assert_eq!(resolve_labels("Flange", "Tread"), Ok(ArrivalOrder::FlangeFirst));
        assert_eq!(resolve_labels("Tread", "Flange"), Ok(ArrivalOrder::TreadFirst));
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!(resolve_labels("flange", "Tread").is_err());
        assert!("TREAD".parse::<ScanLabel>().is_err());
    }

    #[test]
    fn test_duplicate_and_unknown_labels() {
        assert!(resolve_labels("Tread", "Tread").is_err());
        let err = resolve_labels("Rim", "Tread").unwrap_err();
        assert_eq!(err.first, "Rim");
        assert!(err.to_string().contains("\"Rim\""));
    }
}
