//! Normalized job status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `sacct` State names and their normalized status.
const ACCOUNTING_STATES: &[(&str, JobStatus)] = &[
    ("COMPLETED", JobStatus::Completed),
    ("COMPLETING", JobStatus::Completing),
    ("FAILED", JobStatus::Failed),
    ("NODE_FAIL", JobStatus::Failed),
    ("OUT_OF_MEMORY", JobStatus::Failed),
    ("BOOT_FAIL", JobStatus::Failed),
    ("DEADLINE", JobStatus::Failed),
    ("CANCELLED", JobStatus::Cancelled),
    ("PREEMPTED", JobStatus::Cancelled),
    ("REVOKED", JobStatus::Cancelled),
    ("TIMEOUT", JobStatus::TimedOut),
    ("PENDING", JobStatus::Pending),
    ("RUNNING", JobStatus::Running),
];

/// Scheduler job status, normalized across the live and accounting views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completing,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    Unknown,
}

impl JobStatus {
    /// No further transition occurs from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::TimedOut
        )
    }

    /// Map an `squeue` state token, short (`PD`) or long (`PENDING`).
    pub fn from_live_token(token: &str) -> Option<Self> {
        let status = match token.trim().to_ascii_uppercase().as_str() {
            "PD" | "PENDING" => JobStatus::Pending,
            "R" | "RUNNING" => JobStatus::Running,
            "CG" | "COMPLETING" => JobStatus::Completing,
            "CD" | "COMPLETED" => JobStatus::Completed,
            "F" | "FAILED" => JobStatus::Failed,
            "CA" | "CANCELLED" => JobStatus::Cancelled,
            "TO" | "TIMEOUT" => JobStatus::TimedOut,
            _ => return None,
        };
        Some(status)
    }

    /// Map an `sacct` State value such as `CANCELLED by 1001` or
    /// `COMPLETED`. A value cut short by a fixed column width (`OUT_OF_ME+`)
    /// maps to the state it abbreviates. Unrecognized states are `Unknown`.
    pub fn from_accounting_state(state: &str) -> Self {
        let word = state
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches('+')
            .to_ascii_uppercase();

        if word.is_empty() {
            return JobStatus::Unknown;
        }

        ACCOUNTING_STATES
            .iter()
            .find(|(name, _)| *name == word || (word.len() >= 6 && name.starts_with(&word)))
            .map(|(_, status)| *status)
            .unwrap_or(JobStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completing => "COMPLETING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::TimedOut => "TIMEOUT",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
