use std::time::Duration;

use crate::UpdateEnvelope;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Connect { url: String },
    ScheduleReconnect { attempt: u32, delay: Duration },
    CancelReconnect,
    /// Release the connection handle, if any.
    Disconnect,
    NotifyUpdate(UpdateEnvelope),
    NotifyError(String),
    NotifyClose { code: Option<u16> },
    /// A frame failed to parse and was dropped. Never reaches the observer.
    FrameDiscarded { reason: String },
}
