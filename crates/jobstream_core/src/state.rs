use std::time::Duration;

use crate::view_model::ChannelView;
use crate::{JobId, JobMetrics, JobStatus, ProgressSnapshot, UpdateEnvelope};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_ABNORMAL: u16 = 1006;
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Close codes meaning the server ended the stream on purpose.
pub fn is_do_not_retry_code(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_POLICY_VIOLATION)
}

/// Fixed-interval bounded retry. No backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Connecting,
    Connected,
    ReconnectScheduled,
    /// No connection and nothing scheduled. Final unless the caller reopens.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    job_id: JobId,
    url: String,
    policy: ReconnectPolicy,
    link: LinkState,
    reconnect_attempts: u32,
    reconnect_disabled: bool,
    closed: bool,
    status: Option<JobStatus>,
    progress: Option<ProgressSnapshot>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    current_pass_metrics: Option<JobMetrics>,
    cumulative_metrics: Option<JobMetrics>,
    last_timestamp: Option<String>,
    dirty: bool,
}

impl ChannelState {
    pub fn new(job_id: JobId, url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            job_id,
            url: url.into(),
            policy,
            link: LinkState::Connecting,
            reconnect_attempts: 0,
            reconnect_disabled: false,
            closed: false,
            status: None,
            progress: None,
            result: None,
            error: None,
            current_pass_metrics: None,
            cumulative_metrics: None,
            last_timestamp: None,
            dirty: false,
        }
    }

    pub fn view(&self) -> ChannelView {
        ChannelView {
            job_id: self.job_id.clone(),
            link: self.link,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_disabled: self.reconnect_disabled,
            closed: self.closed,
            status: self.status,
            progress: self.progress.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            current_pass_metrics: self.current_pass_metrics.clone(),
            cumulative_metrics: self.cumulative_metrics.clone(),
            last_timestamp: self.last_timestamp.clone(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn reconnect_disabled(&self) -> bool {
        self.reconnect_disabled
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_link(&mut self, link: LinkState) {
        if self.link != link {
            self.link = link;
            self.dirty = true;
        }
    }

    pub(crate) fn reset_attempts(&mut self) {
        if self.reconnect_attempts != 0 {
            self.reconnect_attempts = 0;
            self.dirty = true;
        }
    }

    /// Claims the next reconnect slot, or `None` when the channel must stay down.
    pub(crate) fn try_claim_reconnect(&mut self) -> Option<u32> {
        if self.closed
            || self.reconnect_disabled
            || self.reconnect_attempts >= self.policy.max_attempts
        {
            return None;
        }
        self.reconnect_attempts += 1;
        self.dirty = true;
        Some(self.reconnect_attempts)
    }

    pub(crate) fn can_reconnect(&self) -> bool {
        !self.closed && !self.reconnect_disabled
    }

    pub(crate) fn disable_reconnect(&mut self) {
        if !self.reconnect_disabled {
            self.reconnect_disabled = true;
            self.dirty = true;
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
        self.reconnect_disabled = true;
        self.reconnect_attempts = self.policy.max_attempts;
        self.link = LinkState::Disconnected;
        self.dirty = true;
    }

    pub(crate) fn apply_envelope(&mut self, envelope: &UpdateEnvelope) {
        self.status = Some(envelope.status);
        if let Some(progress) = &envelope.progress {
            self.progress = Some(progress.clone());
        }
        if let Some(result) = &envelope.result {
            self.result = Some(result.clone());
        }
        if let Some(error) = &envelope.error {
            self.error = Some(error.clone());
        }
        if let Some(metrics) = &envelope.current_pass_metrics {
            self.current_pass_metrics = Some(metrics.clone());
        }
        if let Some(metrics) = &envelope.cumulative_metrics {
            self.cumulative_metrics = Some(metrics.clone());
        }
        if let Some(timestamp) = &envelope.timestamp {
            self.last_timestamp = Some(timestamp.clone());
        }
        if envelope.is_terminal() {
            self.reconnect_disabled = true;
        }
        self.dirty = true;
    }
}
