use crate::{JobId, JobMetrics, JobStatus, LinkState, ProgressSnapshot};

/// Observable channel state handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub job_id: JobId,
    pub link: LinkState,
    pub reconnect_attempts: u32,
    pub reconnect_disabled: bool,
    pub closed: bool,
    pub status: Option<JobStatus>,
    pub progress: Option<ProgressSnapshot>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub current_pass_metrics: Option<JobMetrics>,
    pub cumulative_metrics: Option<JobMetrics>,
    pub last_timestamp: Option<String>,
}

impl ChannelView {
    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    /// True once nothing more will happen on this channel.
    pub fn is_settled(&self) -> bool {
        self.link == LinkState::Disconnected
    }
}
