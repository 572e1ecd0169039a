use std::sync::Once;

use jobstream_core::{
    update, ChannelState, Effect, JobId, JobStatus, LinkState, Msg, ProgressSnapshot,
    ReconnectPolicy, CLOSE_ABNORMAL,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(jobstream_logging::initialize_for_tests);
}

fn open_channel(job: &str) -> ChannelState {
    let job_id = JobId::new(job).unwrap();
    let url = format!("ws://gateway.test/ws/jobs/{job}");
    let state = ChannelState::new(job_id, url, ReconnectPolicy::default());
    let (state, _effects) = update(state, Msg::OpenRequested);
    let (state, _effects) = update(state, Msg::Connected);
    state
}

fn frame(raw: &str) -> Msg {
    Msg::FrameReceived(raw.to_string())
}

#[test]
fn open_requests_connection_to_job_stream() {
    init_logging();
    let state = ChannelState::new(
        JobId::new("abc").unwrap(),
        "ws://gateway.test/ws/jobs/abc",
        ReconnectPolicy::default(),
    );

    let (state, effects) = update(state, Msg::OpenRequested);

    assert_eq!(state.link(), LinkState::Connecting);
    assert!(!state.is_connected());
    assert_eq!(
        effects,
        vec![Effect::Connect {
            url: "ws://gateway.test/ws/jobs/abc".to_string()
        }]
    );

    let (state, effects) = update(state, Msg::Connected);
    assert!(state.is_connected());
    assert!(effects.is_empty());
}

#[test]
fn processing_then_completed_disables_reconnect() {
    init_logging();
    let state = open_channel("abc");

    let (mut state, effects) = update(
        state,
        frame(r#"{"status":"processing","progress":{"current":3,"total":10,"percentage":30}}"#),
    );
    let view = state.view();
    assert_eq!(view.status, Some(JobStatus::Processing));
    assert_eq!(
        view.progress,
        Some(ProgressSnapshot {
            current: 3,
            total: 10,
            percentage: 30.0,
            ..ProgressSnapshot::default()
        })
    );
    assert!(!view.reconnect_disabled);
    assert!(matches!(effects.as_slice(), [Effect::NotifyUpdate(_)]));
    assert!(state.consume_dirty());

    let (state, effects) = update(state, frame(r#"{"status":"completed","result":"done"}"#));
    let view = state.view();
    assert_eq!(view.status, Some(JobStatus::Completed));
    assert_eq!(view.result, Some(serde_json::json!("done")));
    assert!(view.reconnect_disabled);
    assert_eq!(effects.len(), 1);

    let attempts_before = state.reconnect_attempts();
    let (state, effects) = update(
        state,
        Msg::ConnectionClosed {
            code: Some(CLOSE_ABNORMAL),
        },
    );
    assert_eq!(state.reconnect_attempts(), attempts_before);
    assert_eq!(state.link(), LinkState::Disconnected);
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ScheduleReconnect { .. })));
}

#[test]
fn malformed_frames_leave_state_untouched() {
    init_logging();
    let state = open_channel("abc");
    let (mut state, _effects) = update(
        state,
        frame(r#"{"status":"processing","progress":{"current":1,"total":2,"percentage":50}}"#),
    );
    assert!(state.consume_dirty());
    let before = state.view();

    for raw in [
        "not json",
        "{\"status\":",
        r#"{"progress":{"current":2}}"#,
        r#"{"status":"exploded"}"#,
        "",
    ] {
        let (next, effects) = update(state, frame(raw));
        state = next;
        assert_eq!(state.view(), before, "frame {raw:?} changed state");
        assert!(!state.consume_dirty());
        assert!(
            matches!(effects.as_slice(), [Effect::FrameDiscarded { .. }]),
            "frame {raw:?} produced {effects:?}"
        );
    }
}

#[test]
fn envelope_without_progress_keeps_previous_snapshot() {
    init_logging();
    let state = open_channel("abc");
    let (state, _) = update(
        state,
        frame(r#"{"status":"processing","progress":{"current":4,"total":8,"percentage":50}}"#),
    );
    let (state, _) = update(
        state,
        frame(r#"{"status":"processing","progress":{"current":6,"total":8,"percentage":75,"phase":"reducing","reduce_level":2}}"#),
    );
    let progress = state.view().progress.unwrap();
    assert_eq!(progress.current, 6);
    assert_eq!(progress.phase.as_deref(), Some("reducing"));
    assert_eq!(progress.reduce_level, Some(2));

    // Wholesale replacement: fields missing from a new snapshot do not survive.
    let (state, _) = update(
        state,
        frame(r#"{"status":"processing","progress":{"current":7,"total":8,"percentage":87.5}}"#),
    );
    let progress = state.view().progress.unwrap();
    assert_eq!(progress.phase, None);
    assert_eq!(progress.reduce_level, None);

    let (state, _) = update(state, frame(r#"{"status":"processing"}"#));
    assert_eq!(state.view().progress.unwrap().current, 7);
}

#[test]
fn metrics_and_errors_are_exposed() {
    init_logging();
    let state = open_channel("m1");
    let (state, effects) = update(
        state,
        frame(
            r#"{"status":"failed","error":"provider timeout",
                "current_pass_metrics":{"input_tokens":10,"output_tokens":5},
                "cumulative_metrics":{"total_tokens":120,"cost":0.25},
                "timestamp":"2026-10-19T10:00:00Z"}"#,
        ),
    );
    let view = state.view();
    assert_eq!(view.status, Some(JobStatus::Failed));
    assert_eq!(view.error.as_deref(), Some("provider timeout"));
    assert_eq!(view.current_pass_metrics.unwrap().input_tokens, Some(10));
    let cumulative = view.cumulative_metrics.unwrap();
    assert_eq!(cumulative.total_tokens, Some(120));
    assert_eq!(cumulative.cost, Some(0.25));
    assert_eq!(view.last_timestamp.as_deref(), Some("2026-10-19T10:00:00Z"));
    assert!(view.reconnect_disabled);
    match effects.as_slice() {
        [Effect::NotifyUpdate(envelope)] => assert!(envelope.is_terminal()),
        other => panic!("unexpected effects {other:?}"),
    }
}

#[test]
fn transport_errors_are_reported_not_fatal() {
    init_logging();
    let state = open_channel("abc");
    let (state, effects) = update(state, Msg::TransportFailed("reset by peer".into()));
    assert_eq!(effects, vec![Effect::NotifyError("reset by peer".into())]);
    assert!(state.is_connected());
}
