use std::fmt;
use std::str::FromStr;

use crate::shared::face_detection::FaceDetection;

/// Which candidate represents a frame when the detector finds several.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// The detector's first candidate, whatever its confidence.
    #[default]
    First,
    /// The candidate with the highest confidence; ties keep the earlier one.
    HighestConfidence,
}

impl SelectionPolicy {
    pub fn select<'a>(&self, candidates: &'a [FaceDetection]) -> Option<&'a FaceDetection> {
        match self {
            SelectionPolicy::First => candidates.first(),
            SelectionPolicy::HighestConfidence => {
                candidates.iter().reduce(|best, candidate| {
                    if candidate.confidence > best.confidence {
                        candidate
                    } else {
                        best
                    }
                })
            }
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(SelectionPolicy::First),
            "highest-confidence" => Ok(SelectionPolicy::HighestConfidence),
            other => Err(format!(
                "unknown selection policy '{other}' (expected 'first' or 'highest-confidence')"
            )),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::First => f.write_str("first"),
            SelectionPolicy::HighestConfidence => f.write_str("highest-confidence"),
        }
    }
}
