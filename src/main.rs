//! CLI entry point for `mailpress`.

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailpress::config::{self, Config};
use mailpress::convert::{CommandRenderer, DocumentRenderer, UnavailableRenderer};
use mailpress::export::report;
use mailpress::filter::{self, FilterCriteria};
use mailpress::pipeline::{
    self, ChannelObserver, Collaborators, ProgressEvent, RunReport, RunRequest, RunState,
};
use mailpress::store::{DirectoryStore, MailStore};

#[derive(Parser)]
#[command(
    name = "mailpress",
    version,
    about = "Archive mailbox messages and their attachments as one PDF per message"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $MAILPRESS_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive the matching messages of a folder
    Run {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Directory receiving the PDFs
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Folder archived messages are moved to
        #[arg(long)]
        dest: Option<String>,
        /// Category applied to archived messages
        #[arg(long)]
        success_category: Option<String>,
        /// Category applied to messages that could not be archived
        #[arg(long)]
        error_category: Option<String>,
        /// Do not apply any category
        #[arg(long)]
        no_categories: bool,
        /// Leave archived messages unread
        #[arg(long)]
        keep_unread: bool,
        /// Office suite binary used for office documents (e.g. soffice)
        #[arg(long, value_name = "PROGRAM")]
        office_command: Option<String>,
        /// Write the JSON run report to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Stop after this many seconds; the message in flight is finished first
        #[arg(long, value_name = "SECONDS")]
        max_time: Option<u64>,
        /// Print the run report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the messages a run would process, without touching anything
    Preview {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        json: bool,
    },
    /// List the folders of a mail store
    Folders {
        /// Mail store root directory
        #[arg(short, long, env = "MAILPRESS_STORE")]
        store: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Which messages to look at.
#[derive(Args)]
struct SelectionArgs {
    /// Mail store root directory
    #[arg(short, long, env = "MAILPRESS_STORE")]
    store: Option<PathBuf>,
    /// Source folder
    #[arg(short, long)]
    folder: Option<String>,
    /// Comma-separated subject keywords (any one must match)
    #[arg(short, long)]
    keywords: Option<String>,
    /// Earliest received date (YYYY-MM-DD, DD/MM/YYYY, YYYY-MM or YYYY)
    #[arg(long, value_name = "DATE")]
    from: Option<String>,
    /// Latest received date, inclusive
    #[arg(long, value_name = "DATE")]
    to: Option<String>,
    /// Only messages not yet read
    #[arg(long)]
    unread_only: bool,
}

impl SelectionArgs {
    fn store_root(&self, config: &Config) -> anyhow::Result<PathBuf> {
        self.store
            .clone()
            .or_else(|| config.pipeline.store_root.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("No mail store given: use --store or set pipeline.store_root")
            })
    }

    fn folder(&self, config: &Config) -> String {
        self.folder
            .clone()
            .unwrap_or_else(|| config.pipeline.folder.clone())
    }

    fn criteria(&self, config: &Config) -> FilterCriteria {
        let keywords = self
            .keywords
            .clone()
            .unwrap_or_else(|| config.pipeline.keywords.join(","));
        FilterCriteria::parse(&keywords, self.from.as_deref(), self.to.as_deref())
            .with_unread_only(self.unread_only || config.pipeline.unread_only)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Run {
            selection,
            output,
            dest,
            success_category,
            error_category,
            no_categories,
            keep_unread,
            office_command,
            report,
            max_time,
            json,
        } => {
            let request = RunRequest {
                folder: selection.folder(&config),
                criteria: selection.criteria(&config),
                dest_folder: dest.or_else(|| config.pipeline.destination.clone()),
                output_dir: output
                    .or_else(|| config.pipeline.output_dir.clone())
                    .ok_or_else(|| {
                        anyhow::anyhow!("No output directory: use --output or set pipeline.output_dir")
                    })?,
                success_category: if no_categories {
                    None
                } else {
                    success_category.or_else(|| config.pipeline.success_category.clone())
                },
                error_category: if no_categories {
                    None
                } else {
                    error_category.or_else(|| config.pipeline.error_category.clone())
                },
                mark_read: config.pipeline.mark_read && !keep_unread,
            };
            let store_root = selection.store_root(&config)?;
            let office = office_command.or_else(|| config.office.command.clone());
            cmd_run(
                &config,
                request,
                store_root,
                office,
                report.as_deref(),
                max_time.map(Duration::from_secs),
                json,
            )
        }
        Commands::Preview { selection, json } => cmd_preview(&config, &selection, json),
        Commands::Folders { store, json } => {
            let root = store
                .or_else(|| config.pipeline.store_root.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("No mail store given: use --store or set pipeline.store_root")
                })?;
            cmd_folders(&root, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailpress.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailpress", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Run the pipeline with a progress bar and print the report.
fn cmd_run(
    config: &Config,
    request: RunRequest,
    store_root: PathBuf,
    office_command: Option<String>,
    report_path: Option<&Path>,
    max_time: Option<Duration>,
    json: bool,
) -> anyhow::Result<()> {
    let (observer, events) = ChannelObserver::new();

    let handle = pipeline::start(
        request,
        config.pipeline_options(),
        move || {
            let store = DirectoryStore::open(&store_root)?;
            let renderer: Box<dyn DocumentRenderer> = match office_command {
                Some(program) => Box::new(CommandRenderer::new(program)),
                None => Box::new(UnavailableRenderer),
            };
            Ok(Collaborators {
                store: Box::new(store),
                renderer,
            })
        },
        Arc::new(observer),
    )?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Archiving [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let deadline = max_time.map(|limit| Instant::now() + limit);
    loop {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(ProgressEvent::Progress { stats, record }) => {
                pb.set_length(stats.total as u64);
                pb.set_position(stats.processed as u64);
                pb.set_message(record.subject.chars().take(50).collect::<String>());
            }
            Ok(ProgressEvent::Log { .. }) => {}
            Ok(ProgressEvent::Finished(_)) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) && handle.is_running() {
            tracing::warn!("Time limit reached, cancelling run");
            handle.cancel();
        }
        pb.tick();
    }

    let run_report = handle.wait();
    pb.finish_and_clear();

    if let Some(path) = report_path {
        report::write_json(&run_report, path)?;
        tracing::info!(path = %path.display(), "Wrote run report");
    }

    if json {
        println!("{}", report::to_json(&run_report)?);
    } else {
        print!("{}", report::summary_table(&run_report));
    }

    finish_status(&run_report)
}

/// Exit status: failed runs and runs with failed messages are errors.
fn finish_status(report: &RunReport) -> anyhow::Result<()> {
    match report.state {
        RunState::Failed => anyhow::bail!(
            "Run failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
        _ if report.statistics.failed > 0 => anyhow::bail!(
            "{} message(s) could not be archived",
            report.statistics.failed
        ),
        _ => Ok(()),
    }
}

/// Print the messages a run would select.
fn cmd_preview(config: &Config, selection: &SelectionArgs, json: bool) -> anyhow::Result<()> {
    let root = selection.store_root(config)?;
    let folder = selection.folder(config);
    let criteria = selection.criteria(config);

    let store = DirectoryStore::open(&root)?;
    let messages = store.list_messages(&folder)?;
    let selected: Vec<_> = filter::select(&messages, &criteria).collect();

    if json {
        let items: Vec<serde_json::Value> = selected
            .iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "date": m.received.to_rfc3339(),
                    "from": {
                        "address": m.sender.address,
                        "display_name": m.sender.display_name,
                    },
                    "subject": m.subject,
                    "unread": m.unread,
                    "attachments": m.attachments.iter().map(|a| serde_json::json!({
                        "filename": a.filename,
                        "size": a.size,
                    })).collect::<Vec<_>>(),
                    "file_name": mailpress::export::naming::archive_file_name(m),
                })
            })
            .collect();
        let output = serde_json::json!({
            "folder": folder,
            "folder_size": messages.len(),
            "keywords": criteria.keywords,
            "date_from": criteria.date_from,
            "date_to": criteria.date_to,
            "unread_only": criteria.unread_only,
            "result_count": selected.len(),
            "results": items,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};

    println!();
    println!(
        "  {} of {} message(s) in '{}' match",
        selected.len(),
        messages.len(),
        folder
    );
    println!();

    if selected.is_empty() {
        return Ok(());
    }

    println!(
        "  {:<4} {:<17} {:<25} {:<40} {:>10}",
        "#", "Date", "From", "Subject", "Attached"
    );
    println!("  {}", "-".repeat(100));

    for (i, message) in selected.iter().enumerate() {
        let date = message.received.format("%Y-%m-%d %H:%M").to_string();
        let from_trunc: String = message.sender.label().chars().take(24).collect();
        let subj_trunc: String = message.subject.chars().take(39).collect();
        let attached: u64 = message.attachments.iter().map(|a| a.size).sum();
        let attached = if message.attachments.is_empty() {
            "-".to_string()
        } else {
            format!(
                "{} ({})",
                message.attachments.len(),
                format_size(attached, BINARY)
            )
        };

        println!(
            "  {:<4} {:<17} {:<25} {:<40} {:>10}",
            i + 1,
            date,
            from_trunc,
            subj_trunc,
            attached
        );
    }
    println!();
    Ok(())
}

/// Print the folders of a mail store.
fn cmd_folders(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = DirectoryStore::open(root)?;
    let folders = store.list_folders()?;

    if json {
        let output = serde_json::json!({
            "store": root.to_string_lossy(),
            "folders": folders,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        for folder in &folders {
            let count = store.list_messages(folder).map(|m| m.len()).unwrap_or(0);
            println!("  {count:>6}  {folder}");
        }
        println!();
    }
    Ok(())
}
