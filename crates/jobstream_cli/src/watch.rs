//! `jobstream watch`: REST snapshot, then live updates until the job ends.

use anyhow::{bail, Result};
use jobstream_core::JobId;
use jobstream_engine::{
    ChannelEvent, ChannelOptions, ConfigResolver, GatewayClient, JobChannel, JobRecord,
};
use tokio::sync::mpsc;

use crate::render;

pub async fn watch(
    resolver: &ConfigResolver,
    client: &GatewayClient,
    job_id: &JobId,
    options: ChannelOptions,
) -> Result<()> {
    let snapshot = client.get_job(job_id).await?;
    println!("{}", render::job_summary(&snapshot));
    if snapshot.status.is_terminal() {
        print_result(snapshot.result.as_ref());
        return Ok(());
    }

    let max_attempts = options.policy.max_attempts;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = JobChannel::open_with_resolver(resolver, job_id.as_str(), tx, options)?;

    // The driver drops its sender once the channel settles.
    while let Some(event) = rx.recv().await {
        match event {
            ChannelEvent::Update(update) => {
                println!("{}", render::update_line(&update));
                if update.is_terminal() {
                    print_result(update.result.as_ref());
                    channel.close();
                    return Ok(());
                }
            }
            ChannelEvent::Error(message) => eprintln!("connection error: {message}"),
            ChannelEvent::Closed(code) => {
                let view = channel.view();
                if view.reconnect_disabled {
                    eprintln!("stream closed ({})", close_label(code));
                } else {
                    eprintln!(
                        "stream closed ({}), reconnecting ({}/{})",
                        close_label(code),
                        view.reconnect_attempts,
                        max_attempts
                    );
                }
            }
        }
    }

    let record = reconcile(client, job_id).await?;
    println!("{}", render::job_summary(&record));
    print_result(record.result.as_ref());
    Ok(())
}

/// Updates sent while the stream was down are not replayed, so the final word
/// comes from a fresh snapshot.
pub async fn reconcile(client: &GatewayClient, job_id: &JobId) -> Result<JobRecord> {
    let record = client.get_job(job_id).await?;
    if !record.status.is_terminal() {
        bail!(
            "lost the update stream for {job_id} before it finished (last status {})",
            record.status
        );
    }
    Ok(record)
}

fn print_result(result: Option<&serde_json::Value>) {
    if let Some(result) = result {
        println!("\n{}", render::result_text(result));
    }
}

fn close_label(code: Option<u16>) -> String {
    code.map_or_else(|| "no code".to_string(), |code| format!("code {code}"))
}
