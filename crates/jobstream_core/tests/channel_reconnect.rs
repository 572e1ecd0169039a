use std::time::Duration;

use jobstream_core::{
    update, ChannelState, Effect, JobId, LinkState, Msg, ReconnectPolicy, CLOSE_ABNORMAL,
    CLOSE_NORMAL, CLOSE_POLICY_VIOLATION,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    jobstream_logging::initialize_for_tests();
}

fn new_channel(job: &str) -> ChannelState {
    let url = format!("ws://gateway.test/ws/jobs/{job}");
    let state = ChannelState::new(JobId::new(job).unwrap(), url, ReconnectPolicy::default());
    let (state, _effects) = update(state, Msg::OpenRequested);
    state
}

fn abnormal_close() -> Msg {
    Msg::ConnectionClosed {
        code: Some(CLOSE_ABNORMAL),
    }
}

fn scheduled(effects: &[Effect]) -> Option<(u32, Duration)> {
    effects.iter().find_map(|effect| match effect {
        Effect::ScheduleReconnect { attempt, delay } => Some((*attempt, *delay)),
        _ => None,
    })
}

#[test]
fn six_abnormal_closes_schedule_exactly_five_reconnects() {
    init_logging();
    let mut state = new_channel("xyz");
    let mut schedules = Vec::new();

    for close_index in 1..=6 {
        let (next, effects) = update(state, abnormal_close());
        state = next;
        if let Some(schedule) = scheduled(&effects) {
            schedules.push(schedule);
            assert_eq!(state.link(), LinkState::ReconnectScheduled);
            let (next, effects) = update(state, Msg::ReconnectDue);
            state = next;
            assert!(
                matches!(effects.as_slice(), [Effect::Connect { .. }]),
                "close #{close_index} did not reconnect"
            );
        }
    }

    let delay = Duration::from_millis(2000);
    assert_eq!(
        schedules,
        vec![(1, delay), (2, delay), (3, delay), (4, delay), (5, delay)]
    );
    assert_eq!(state.reconnect_attempts(), 5);
    assert_eq!(state.link(), LinkState::Disconnected);
    assert!(!state.is_connected());
}

#[test]
fn successful_open_resets_attempt_counter() {
    init_logging();
    let state = new_channel("abc");
    let (state, _) = update(state, abnormal_close());
    let (state, _) = update(state, Msg::ReconnectDue);
    let (state, _) = update(state, abnormal_close());
    assert_eq!(state.reconnect_attempts(), 2);

    let (state, _) = update(state, Msg::ReconnectDue);
    let (state, _) = update(state, Msg::Connected);
    assert_eq!(state.reconnect_attempts(), 0);
    assert!(state.is_connected());

    let (state, effects) = update(state, abnormal_close());
    assert_eq!(scheduled(&effects), Some((1, Duration::from_millis(2000))));
    assert_eq!(state.reconnect_attempts(), 1);
}

#[test]
fn normal_and_policy_closes_are_final() {
    init_logging();
    for code in [CLOSE_NORMAL, CLOSE_POLICY_VIOLATION] {
        let state = new_channel("abc");
        let (state, _) = update(state, Msg::Connected);
        let (state, effects) = update(state, Msg::ConnectionClosed { code: Some(code) });
        assert_eq!(
            effects,
            vec![
                Effect::Disconnect,
                Effect::NotifyClose { code: Some(code) }
            ]
        );
        assert!(state.reconnect_disabled());
        assert_eq!(state.link(), LinkState::Disconnected);
    }
}

#[test]
fn close_without_code_is_retried() {
    init_logging();
    let state = new_channel("abc");
    let (_state, effects) = update(state, Msg::ConnectionClosed { code: None });
    assert!(scheduled(&effects).is_some());
}

#[test]
fn close_is_idempotent_and_cancels_pending_reconnect() {
    init_logging();
    let state = new_channel("abc");
    let (state, _) = update(state, abnormal_close());
    assert_eq!(state.link(), LinkState::ReconnectScheduled);

    let (state, effects) = update(state, Msg::CloseRequested);
    assert_eq!(effects, vec![Effect::CancelReconnect, Effect::Disconnect]);
    assert_eq!(state.link(), LinkState::Disconnected);
    assert_eq!(state.reconnect_attempts(), 5);
    assert!(state.is_closed());

    let (state, effects) = update(state, Msg::CloseRequested);
    assert!(effects.is_empty());
    assert_eq!(state.link(), LinkState::Disconnected);

    // A timer that slipped through before cancellation does nothing.
    let (state, effects) = update(state, Msg::ReconnectDue);
    assert!(effects.is_empty());
    assert!(!state.is_connected());
}

#[test]
fn nothing_is_delivered_after_close() {
    init_logging();
    let state = new_channel("abc");
    let (state, _) = update(state, Msg::Connected);
    let (state, _) = update(state, Msg::CloseRequested);

    let (state, effects) = update(
        state,
        Msg::FrameReceived(r#"{"status":"processing"}"#.to_string()),
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().status, None);

    let (state, effects) = update(state, Msg::TransportFailed("late".into()));
    assert!(effects.is_empty());
    let (state, effects) = update(state, abnormal_close());
    assert!(effects.is_empty());

    // A handshake that completes after close only releases the connection.
    let (state, effects) = update(state, Msg::Connected);
    assert_eq!(effects, vec![Effect::Disconnect]);
    assert!(!state.is_connected());
}

#[test]
fn custom_policy_is_honoured() {
    init_logging();
    let policy = ReconnectPolicy {
        max_attempts: 1,
        delay: Duration::from_millis(50),
    };
    let state = ChannelState::new(JobId::new("p").unwrap(), "ws://x/ws/jobs/p", policy);
    let (state, _) = update(state, Msg::OpenRequested);
    let (state, effects) = update(state, abnormal_close());
    assert_eq!(scheduled(&effects), Some((1, Duration::from_millis(50))));
    let (state, _) = update(state, Msg::ReconnectDue);
    let (state, effects) = update(state, abnormal_close());
    assert_eq!(scheduled(&effects), None);
    assert_eq!(state.link(), LinkState::Disconnected);
}
