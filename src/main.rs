use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use davmirror::{
    logging, Config, ConfigOverrides, MirrorError, SyncReport, WebDAVMirrorService,
};

/// Mirror a WebDAV directory tree onto local storage
#[derive(Parser, Debug)]
#[command(name = "davmirror", version, about)]
struct Cli {
    /// Remote directory to mirror, e.g. /data/
    remote_dir: String,

    /// Local destination directory
    local_dir: PathBuf,

    /// Directory name that anchors remote entries, e.g. data
    base_dir: String,

    /// WebDAV server URL (default: $WEBDAV_URL)
    #[arg(long)]
    url: Option<String>,

    /// WebDAV username (default: $WEBDAV_USERNAME)
    #[arg(long)]
    username: Option<String>,

    /// WebDAV password (default: $WEBDAV_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Maximum concurrent transfers (default: all cores, or the SLURM allocation)
    #[arg(long)]
    workers: Option<usize>,

    /// Take node, job id and CPU budget from the SLURM environment
    #[arg(long)]
    slurm: bool,

    /// Job id used for temporary files and the failure ledger
    #[arg(long)]
    job_id: Option<String>,

    /// Directory for the failure ledger (default: $DAVMIRROR_LEDGER_DIR or .)
    #[arg(long)]
    ledger_dir: Option<PathBuf>,

    /// Directory for the log file (default: $DAVMIRROR_LOG_DIR or .)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::resolve(ConfigOverrides {
        url: cli.url,
        username: cli.username,
        password: cli.password,
        workers: cli.workers,
        use_slurm: cli.slurm,
        job_id: cli.job_id,
        ledger_dir: cli.ledger_dir,
        log_dir: cli.log_dir,
    })?;

    let log_handle = logging::init_logging(&config.run, &config.log_dir)?;
    info!("Logging to {}", log_handle.path.display());
    config.run.log_allocation();

    let service = WebDAVMirrorService::from_config(&config)?;

    match service
        .download_folder(&cli.remote_dir, &cli.local_dir, &cli.base_dir)
        .await
    {
        Ok(report) => {
            if cli.json {
                print_report(&report)?;
            }
            if report.has_failures() {
                warn!(
                    "{} files failed; see {}",
                    report.files_failed,
                    report.ledger_path.display()
                );
                return Ok(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(code = e.error_code(), "{}", e);
            if let Some(action) = e.suggested_action() {
                error!("💡 {}", action);
            }
            if let davmirror::SyncError::Incomplete { failures, .. } = &e {
                for failure in failures {
                    error!(code = failure.error_code(), "{}", failure);
                }
            }
            if let (true, Some(report)) = (cli.json, e.report()) {
                print_report(report)?;
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_report(report: &SyncReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
