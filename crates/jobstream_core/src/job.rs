use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job id must not be empty")]
pub struct InvalidJobId;

/// Opaque backend job handle. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidJobId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidJobId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = InvalidJobId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Started,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, failed and cancelled jobs never produce further updates.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Started => "started",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub percentage: f64,
    /// Processing phase tag, e.g. `"reducing"` during map-reduce passes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce_batch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_seconds_remaining: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// One pushed frame from `/ws/jobs/{job_id}`. Self-contained; never diffed
/// against earlier envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_pass_metrics: Option<JobMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_metrics: Option<JobMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl UpdateEnvelope {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_rejects_blank_input() {
        assert_eq!(JobId::new(""), Err(InvalidJobId));
        assert_eq!(JobId::new("   "), Err(InvalidJobId));
        assert_eq!(JobId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn envelope_requires_known_status() {
        assert!(UpdateEnvelope::parse(r#"{"progress":{"current":1}}"#).is_err());
        assert!(UpdateEnvelope::parse(r#"{"status":"paused"}"#).is_err());
        let envelope = UpdateEnvelope::parse(r#"{"status":"started","extra":true}"#).unwrap();
        assert_eq!(envelope.status, JobStatus::Started);
        assert!(!envelope.is_terminal());
    }

    #[test]
    fn reduce_phase_fields_are_read() {
        let envelope = UpdateEnvelope::parse(
            r#"{"status":"processing","progress":{"current":2,"total":4,"percentage":50.0,
                "phase":"reducing","reduce_level":1,"reduce_items":8,"reduce_batch":2,
                "estimated_seconds_remaining":12.5}}"#,
        )
        .unwrap();
        let progress = envelope.progress.unwrap();
        assert_eq!(progress.phase.as_deref(), Some("reducing"));
        assert_eq!(progress.reduce_level, Some(1));
        assert_eq!(progress.reduce_items, Some(8));
        assert_eq!(progress.reduce_batch, Some(2));
        assert_eq!(progress.estimated_seconds_remaining, Some(12.5));
    }
}
