//! Job records for background site validation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

crate::define_id_type!(i64, JobId);

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Unknown job status: {}", other)),
        }
    }
}

/// Progress and outcome of one background job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub uuid: Uuid,
    pub name: String,
    pub status: JobStatus,
    pub status_code: Option<i32>,
    pub total_content: Option<i64>,
    pub processed_content: Option<i64>,
    pub progress_message: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Renders the poll-friendly "N out of total (P%)" message.
pub fn progress_message(processed: i64, total: i64) -> String {
    let percent = if total > 0 {
        ((processed as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };
    format!("{} out of {} ({}%)", processed, total, percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_message() {
        assert_eq!(progress_message(50, 120), "50 out of 120 (42%)");
        assert_eq!(progress_message(120, 120), "120 out of 120 (100%)");
        assert_eq!(progress_message(0, 0), "0 out of 0 (0%)");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }
}
