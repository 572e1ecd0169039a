//! Plain-text rendering of job data for the terminal.

use jobstream_core::{JobMetrics, ProgressSnapshot, UpdateEnvelope};
use jobstream_engine::{JobRecord, JobVersion};

pub fn progress_line(progress: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{}/{} ({:.0}%)",
        progress.current, progress.total, progress.percentage
    );
    if let Some(phase) = &progress.phase {
        line.push_str(&format!(" {phase}"));
        if let Some(level) = progress.reduce_level {
            line.push_str(&format!(" level {level}"));
        }
    }
    if let Some(eta) = progress.estimated_seconds_remaining {
        line.push_str(&format!(", ~{eta:.0}s left"));
    }
    line
}

pub fn metrics_line(metrics: &JobMetrics) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(tokens) = metrics.total_tokens {
        parts.push(format!("{tokens} tokens"));
    }
    if let Some(cost) = metrics.cost {
        parts.push(format!("${cost:.4}"));
    }
    if let Some(ms) = metrics.duration_ms {
        parts.push(format!("{:.1}s", ms as f64 / 1000.0));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub fn update_line(update: &UpdateEnvelope) -> String {
    let mut line = update.status.to_string();
    if let Some(progress) = &update.progress {
        line.push_str(&format!("  {}", progress_line(progress)));
    }
    if let Some(metrics) = update.cumulative_metrics.as_ref().and_then(metrics_line) {
        line.push_str(&format!("  [{metrics}]"));
    }
    if let Some(error) = &update.error {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

/// Strings print verbatim, anything else as pretty JSON.
pub fn result_text(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub fn job_summary(record: &JobRecord) -> String {
    let mut lines = vec![format!("job      {}", record.id), format!("status   {}", record.status)];
    if let Some(service) = &record.service_name {
        let flavor = record.flavor_name.as_deref().unwrap_or("-");
        lines.push(format!("service  {service} ({flavor})"));
    }
    if let Some(progress) = &record.progress {
        lines.push(format!("progress {}", progress_line(progress)));
    }
    if let Some(version) = record.current_version {
        lines.push(format!("version  {version}"));
    }
    if let Some(created) = &record.created_at {
        lines.push(format!("created  {created}"));
    }
    if let Some(completed) = &record.completed_at {
        lines.push(format!("finished {completed}"));
    }
    if let Some(metrics) = record.cumulative_metrics.as_ref().and_then(metrics_line) {
        lines.push(format!("usage    {metrics}"));
    }
    if let Some(error) = &record.error {
        lines.push(format!("error    {error}"));
    }
    lines.join("\n")
}

pub fn version_row(version: &JobVersion) -> String {
    let marker = if version.is_current { "*" } else { " " };
    format!(
        "{marker} v{}\t{}\t{}",
        version.version,
        version.created_at.as_deref().unwrap_or("-"),
        version.created_by.as_deref().unwrap_or("-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobstream_core::JobStatus;
    use pretty_assertions::assert_eq;

    fn progress(current: u64, total: u64, percentage: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            current,
            total,
            percentage,
            ..ProgressSnapshot::default()
        }
    }

    #[test]
    fn progress_includes_reduce_phase() {
        let mut snapshot = progress(3, 4, 75.0);
        assert_eq!(progress_line(&snapshot), "3/4 (75%)");

        snapshot.phase = Some("reducing".into());
        snapshot.reduce_level = Some(2);
        snapshot.estimated_seconds_remaining = Some(41.6);
        assert_eq!(progress_line(&snapshot), "3/4 (75%) reducing level 2, ~42s left");
    }

    #[test]
    fn update_line_lists_present_fields_only() {
        let update = UpdateEnvelope::parse(
            r#"{"status":"failed","error":"boom","cumulative_metrics":{"total_tokens":12,"duration_ms":1500}}"#,
        )
        .unwrap();
        assert_eq!(update_line(&update), "failed  [12 tokens, 1.5s]  error: boom");

        let bare = UpdateEnvelope::parse(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(update.status, JobStatus::Failed);
        assert_eq!(update_line(&bare), "queued");
    }

    #[test]
    fn empty_metrics_render_nothing() {
        assert_eq!(metrics_line(&JobMetrics::default()), None);
    }

    #[test]
    fn string_results_print_verbatim() {
        assert_eq!(result_text(&serde_json::json!("plain")), "plain");
        assert_eq!(result_text(&serde_json::json!({"a": 1})), "{\n  \"a\": 1\n}");
    }
}
