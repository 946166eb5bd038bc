//! Audit and inspection score outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of scoring an audit against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Approved,
    Rejected,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentStatus::Approved => "approved",
            AssessmentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approved when `score >= target - tolerance`; the boundary is approved.
pub fn calculate_status(score: f64, target: f64, tolerance: f64) -> AssessmentStatus {
    if score >= target - tolerance {
        AssessmentStatus::Approved
    } else {
        AssessmentStatus::Rejected
    }
}
