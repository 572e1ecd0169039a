//! Jobstream core: pure job-channel state machine, wire types and draft history.
mod effect;
mod history;
mod job;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use history::{DraftHistory, DEFAULT_HISTORY_DEPTH};
pub use job::{
    InvalidJobId, JobId, JobMetrics, JobStatus, ProgressSnapshot, UpdateEnvelope,
};
pub use msg::Msg;
pub use state::{
    is_do_not_retry_code, ChannelState, LinkState, ReconnectPolicy, CLOSE_ABNORMAL, CLOSE_NORMAL,
    CLOSE_POLICY_VIOLATION,
};
pub use update::update;
pub use view_model::ChannelView;
