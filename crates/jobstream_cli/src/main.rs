//! `jobstream`: follow and manage gateway jobs from the terminal.

mod render;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jobstream_core::JobId;
use jobstream_engine::{
    ClientSettings, ConfigResolver, DraftStore, ExportFormat, GatewayClient, ResultEditor,
};
use jobstream_logging::{stream_error, stream_info, LogDestination};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "jobstream", version, about = "Follow and manage gateway jobs")]
struct Cli {
    /// Origin serving `/api/config`, e.g. https://console.example.com
    #[arg(long, env = "JOBSTREAM_SERVER")]
    server: String,
    /// Directory for unsaved result drafts.
    #[arg(long, default_value = ".jobstream/drafts")]
    drafts: PathBuf,
    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    log: LogTarget,
    /// Log at debug level.
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Docx,
    Pdf,
    Markdown,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Docx => ExportFormat::Docx,
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Markdown => ExportFormat::Markdown,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Resolve and print the runtime configuration
    Config,
    /// Stream live updates until the job finishes
    Watch { job: String },
    /// Print the current job snapshot
    Show { job: String },
    /// Ask the backend to cancel a running job
    Cancel { job: String },
    /// Delete a job and its results
    Delete { job: String },
    /// List saved result versions
    Versions { job: String },
    /// Print one result version
    Version { job: String, number: u32 },
    /// Make an older version current again
    Restore { job: String, number: u32 },
    /// Download the result as a document
    Export {
        job: String,
        #[arg(value_enum)]
        format: FormatArg,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Work with the local result draft
    Draft {
        job: String,
        #[command(subcommand)]
        cmd: DraftCmd,
    },
}

#[derive(Subcommand)]
enum DraftCmd {
    /// Print the draft (or the saved result when there is none)
    Show,
    /// Replace the draft text with a file's contents
    Set { file: PathBuf },
    /// Send the draft to the backend as a new version
    Save,
    /// Drop the draft and go back to the saved result
    Discard,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match cli.log {
        LogTarget::Terminal => LogDestination::Terminal,
        LogTarget::File => LogDestination::File(PathBuf::from("jobstream.log")),
        LogTarget::Both => LogDestination::Both(PathBuf::from("jobstream.log")),
    };
    jobstream_logging::initialize(destination, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            stream_error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = ClientSettings::default();
    let resolver = ConfigResolver::new(&cli.server, &settings)?;
    let config = resolver
        .resolve()
        .await
        .with_context(|| format!("loading runtime configuration from {}", cli.server))?;
    let client = GatewayClient::new(config, &settings)?;

    match cli.cmd {
        Cmd::Config => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        Cmd::Watch { job } => {
            let job_id = parse_job(&job)?;
            watch::watch(&resolver, &client, &job_id, Default::default()).await?;
        }
        Cmd::Show { job } => {
            let record = client.get_job(&parse_job(&job)?).await?;
            println!("{}", render::job_summary(&record));
            if let Some(result) = &record.result {
                println!("\n{}", render::result_text(result));
            }
        }
        Cmd::Cancel { job } => {
            client.cancel_job(&parse_job(&job)?).await?;
            println!("cancellation requested for {job}");
        }
        Cmd::Delete { job } => {
            client.delete_job(&parse_job(&job)?).await?;
            println!("deleted {job}");
        }
        Cmd::Versions { job } => {
            for version in client.list_versions(&parse_job(&job)?).await? {
                println!("{}", render::version_row(&version));
            }
        }
        Cmd::Version { job, number } => {
            let version = client.get_version(&parse_job(&job)?, number).await?;
            println!("{}", render::version_row(&version));
            if let Some(result) = &version.result {
                println!("\n{}", render::result_text(result));
            }
        }
        Cmd::Restore { job, number } => {
            let job_id = parse_job(&job)?;
            let version = client.restore_version(&job_id, number).await?;
            // A local draft was based on the replaced result.
            let mut editor = open_editor(&client, &cli.drafts, &job_id).await?;
            editor.rebase(version.result.as_ref())?;
            println!("restored v{number} as v{}", version.version);
        }
        Cmd::Export { job, format, out } => {
            let job_id = parse_job(&job)?;
            let format = ExportFormat::from(format);
            let document = client.export_job(&job_id, format).await?;
            let path = out.unwrap_or_else(|| {
                // Only the final component of a server-suggested name is used.
                document
                    .filename
                    .as_deref()
                    .and_then(|name| Path::new(name).file_name())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(format!("{job_id}.{}", format.extension())))
            });
            tokio::fs::write(&path, &document.bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            stream_info!("Exported job {} as {} to {:?}", job_id, format.as_str(), path);
            println!("{} ({} bytes)", path.display(), document.bytes.len());
        }
        Cmd::Draft { job, cmd } => {
            let job_id = parse_job(&job)?;
            let mut editor = open_editor(&client, &cli.drafts, &job_id).await?;
            match cmd {
                DraftCmd::Show => {
                    let state = if editor.is_dirty() { "draft" } else { "saved" };
                    eprintln!("({state})");
                    println!("{}", editor.text());
                }
                DraftCmd::Set { file } => {
                    let text = tokio::fs::read_to_string(&file)
                        .await
                        .with_context(|| format!("reading {}", file.display()))?;
                    editor.edit(text)?;
                    if editor.is_dirty() {
                        println!("draft updated");
                    } else {
                        println!("matches saved result");
                    }
                }
                DraftCmd::Save => {
                    if !editor.is_dirty() {
                        println!("nothing to save");
                        return Ok(());
                    }
                    let version = editor.save(&client).await?;
                    println!("saved as v{}", version.version);
                }
                DraftCmd::Discard => {
                    editor.discard()?;
                    println!("draft discarded");
                }
            }
        }
    }
    Ok(())
}

fn parse_job(raw: &str) -> Result<JobId> {
    Ok(JobId::new(raw)?)
}

async fn open_editor(
    client: &GatewayClient,
    drafts: &Path,
    job_id: &JobId,
) -> Result<ResultEditor> {
    let record = client.get_job(job_id).await?;
    let store = DraftStore::new(drafts);
    Ok(ResultEditor::open(job_id.clone(), record.result.as_ref(), store)?)
}
