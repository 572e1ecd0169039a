use jobstream_core::JobId;
use sha2::{Digest, Sha256};

/// Filesystem-safe, deterministic draft filename: `{sanitized_id}--{short_hash(id)}.draft.json`.
///
/// The hash keeps ids that sanitize to the same text apart.
pub fn draft_filename(job_id: &JobId) -> String {
    let raw = job_id.as_str();
    format!("{}--{}.draft.json", sanitize_id(raw), short_hash(raw))
}

fn sanitize_id(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    let mut cleaned = compacted.trim_matches('_').to_string();
    if cleaned.is_empty() {
        cleaned = "job".to_string();
    }
    cleaned.truncate(64);
    cleaned
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
