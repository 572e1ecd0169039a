use crate::{is_do_not_retry_code, ChannelState, Effect, LinkState, Msg, UpdateEnvelope};

/// Pure update function: applies a message to the channel state and returns
/// the effects the driver must run, in order.
pub fn update(mut state: ChannelState, msg: Msg) -> (ChannelState, Vec<Effect>) {
    if state.is_closed() {
        // A connect that raced with close still holds a live handle.
        let effects = match msg {
            Msg::Connected => vec![Effect::Disconnect],
            _ => Vec::new(),
        };
        return (state, effects);
    }

    let effects = match msg {
        Msg::OpenRequested => {
            state.set_link(LinkState::Connecting);
            vec![Effect::Connect {
                url: state.url().to_string(),
            }]
        }
        Msg::Connected => {
            state.reset_attempts();
            state.set_link(LinkState::Connected);
            Vec::new()
        }
        Msg::FrameReceived(raw) => match UpdateEnvelope::parse(&raw) {
            Ok(envelope) => {
                state.apply_envelope(&envelope);
                vec![Effect::NotifyUpdate(envelope)]
            }
            Err(err) => vec![Effect::FrameDiscarded {
                reason: err.to_string(),
            }],
        },
        Msg::TransportFailed(message) => vec![Effect::NotifyError(message)],
        Msg::ConnectionClosed { code } => {
            if code.is_some_and(is_do_not_retry_code) {
                state.disable_reconnect();
            }
            let mut effects = vec![Effect::Disconnect, Effect::NotifyClose { code }];
            match state.try_claim_reconnect() {
                Some(attempt) => {
                    state.set_link(LinkState::ReconnectScheduled);
                    effects.push(Effect::ScheduleReconnect {
                        attempt,
                        delay: state.policy().delay,
                    });
                }
                None => state.set_link(LinkState::Disconnected),
            }
            effects
        }
        Msg::ReconnectDue => {
            if state.link() != LinkState::ReconnectScheduled {
                Vec::new()
            } else if state.can_reconnect() {
                state.set_link(LinkState::Connecting);
                vec![Effect::Connect {
                    url: state.url().to_string(),
                }]
            } else {
                state.set_link(LinkState::Disconnected);
                Vec::new()
            }
        }
        Msg::CloseRequested => {
            let had_pending = state.link() == LinkState::ReconnectScheduled;
            state.mark_closed();
            let mut effects = Vec::with_capacity(2);
            if had_pending {
                effects.push(Effect::CancelReconnect);
            }
            effects.push(Effect::Disconnect);
            effects
        }
    };

    (state, effects)
}
