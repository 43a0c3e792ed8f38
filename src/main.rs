//! CLI entry point for `mboxdelta`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use mboxdelta::config::{self, ActiveLists, Config};
use mboxdelta::deliver::{HttpSink, ServiceEndpoint};
use mboxdelta::parser::body::BodyExtractor;
use mboxdelta::parser::text::PlainTextExtractor;
use mboxdelta::pipeline::{self, RunOptions, TaskContext};

/// Index the delta folder of a mailing-list archive.
///
/// Every file in DROP_FOLDER holds one archived mail and is named after its
/// archive URL. Files of active mailing lists are parsed and posted to the
/// indexing service, then deleted. Files of other lists are deleted without
/// being posted. Files that fail stay in place for the next run.
#[derive(Parser)]
#[command(name = "mboxdelta", version)]
struct Cli {
    /// Folder with the delta files
    #[arg(value_name = "DROP_FOLDER")]
    drop_folder: PathBuf,

    /// Number of worker threads (at least 1)
    #[arg(value_name = "CONCURRENCY")]
    concurrency: usize,

    /// Indexing service host, e.g. https://search.example.org
    #[arg(value_name = "SERVICE_HOST")]
    service_host: String,

    /// REST path of the content API, e.g. /v2/rest/content
    #[arg(value_name = "SERVICE_PATH")]
    service_path: String,

    /// Content type the mails are stored under
    #[arg(value_name = "CONTENT_TYPE")]
    content_type: String,

    #[arg(value_name = "USERNAME")]
    username: String,

    #[arg(value_name = "PASSWORD")]
    password: String,

    /// Properties file listing the active `project[-listType]` keys
    #[arg(value_name = "ACTIVE_LISTS")]
    active_lists: PathBuf,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML file with tuning options
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            Cli::command().print_long_help()?;
            return Ok(());
        }
        Err(e) => e.exit(),
    };

    let config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    if cli.concurrency < 1 {
        anyhow::bail!("number of threads must be at least 1, got {}", cli.concurrency);
    }

    cmd_index(cli, &config)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxdelta.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run one indexing pass over the drop folder.
fn cmd_index(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let started = Instant::now();

    let active = ActiveLists::load(&cli.active_lists).with_context(|| {
        format!("cannot load active mail lists from {}", cli.active_lists.display())
    })?;

    let endpoint = ServiceEndpoint {
        host: cli.service_host,
        path: cli.service_path,
        content_type: cli.content_type,
        username: cli.username,
        password: cli.password,
    };
    let sink = HttpSink::new(endpoint, &config.delivery, cli.concurrency)?;

    let ctx = Arc::new(TaskContext {
        extractor: BodyExtractor::new(Arc::new(PlainTextExtractor), &config.extract),
        sink: Arc::new(sink),
    });

    let options = RunOptions::new(cli.concurrency, &config.ingest);
    let report = pipeline::index_folder(&cli.drop_folder, &active, &options, ctx)
        .with_context(|| format!("cannot index {}", cli.drop_folder.display()))?;

    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        delivered = report.delivered,
        failed = report.failed,
        "Finished"
    );
    Ok(())
}
