use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use fitcam::capture::{CaptureSource, FileSource};
use fitcam::config::CamConfig;
use fitcam::encode::{BudgetEncoder, CodecKind};
use fitcam::error::{CamError, HasRecoverySuggestion, Retryable, classify};
use fitcam::ledger::{LedgerLog, ScriptUploader, StatusPoller, publish_latest};
use fitcam::notify::NullNotifier;
use fitcam::session::CameraSessionBuilder;
use fitcam::storage::PhotoStore;
use tracing_subscriber::EnvFilter;

/// Grayscale still camera with a hard per-photo byte budget:
/// - capture with libcamera-jpeg, convert to gray
/// - encode at the highest quality that fits, downscaling if needed
/// - keep a timestamped gallery plus a `latest` slot, upload on demand
#[derive(Parser, Debug)]
#[command(name = "fitcam", version)]
#[command(about = "📷 Take grayscale photos that always fit a byte budget")]
struct Cli {
    /// JSON configuration file; flags and env vars override it
    #[arg(long, global = true, env = "FITCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Gallery directory
    #[arg(long, global = true, env = "FITCAM_PHOTOS_DIR")]
    photos_dir: Option<PathBuf>,

    /// Output codec
    #[arg(long, global = true, value_enum, env = "FITCAM_CODEC")]
    codec: Option<CodecKind>,

    /// Byte budget per photo
    #[arg(long, global = true, env = "FITCAM_BUDGET")]
    budget: Option<usize>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture photos from the camera into the gallery
    Shot {
        /// Number of photos to take
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Pause between photos: 5 (seconds), 30s, 2m, 1h
        #[arg(short, long, default_value = "0")]
        interval: String,
    },
    /// Fit an existing image file under the budget
    Fit {
        input: PathBuf,
        output: PathBuf,
    },
    /// Print the gallery as JSON
    Gallery,
    /// Upload the latest photo to the ledger
    Upload {
        /// Poll the gateway until the upload is confirmed
        #[arg(long)]
        poll: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = run(cli).await;
    if let Err(err) = &outcome {
        if let Some(hint) = err.downcast_ref::<CamError>().and_then(|e| e.recovery_suggestion()) {
            eprintln!("hint: {}", hint);
        }
    }
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Shot { count, interval } => shot(&config, count, parse_duration(&interval)?).await,
        Command::Fit { input, output } => fit_file(&config, input, output).await,
        Command::Gallery => gallery(&config),
        Command::Upload { poll } => upload(&config, poll).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fitcam=debug" } else { "fitcam=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<CamConfig> {
    let mut config = match &cli.config {
        Some(path) => CamConfig::load(path)?,
        None => CamConfig::default(),
    };
    if let Some(dir) = &cli.photos_dir {
        config.photos_dir = dir.clone();
    }
    if let Some(codec) = cli.codec {
        config.codec = codec;
    }
    if let Some(budget) = cli.budget {
        config.budget_bytes = budget;
    }
    config.validate()?;
    Ok(config)
}

/// What a multi-shot run does after a failed capture.
#[derive(Debug, PartialEq, Eq)]
enum AfterFailure {
    /// Later shots would fail the same way
    Abort,
    /// Wait at least this long before the next shot
    Backoff(Duration),
    Continue,
}

fn after_failure(error: &CamError) -> AfterFailure {
    if classify::is_fatal(error) {
        AfterFailure::Abort
    } else if error.is_retryable() {
        AfterFailure::Backoff(Duration::from_millis(error.retry_delay_ms().unwrap_or(0)))
    } else {
        AfterFailure::Continue
    }
}

async fn shot(config: &CamConfig, count: u32, interval: Duration) -> Result<()> {
    let mut session = CameraSessionBuilder::from_config(config)?.build()?;
    let mut failures = 0;
    let mut backoff = Duration::ZERO;
    for i in 0..count {
        let pause = interval.max(backoff);
        backoff = Duration::ZERO;
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match session.capture_once().await {
            Ok(report) => println!(
                "Captured {}  (q={}, bytes={}, {}x{}{})",
                report.stored.path.display(),
                report.quality,
                report.bytes,
                report.width,
                report.height,
                if report.fits { "" } else { ", OVER BUDGET" }
            ),
            Err(e) => {
                eprintln!("Capture failed: {}", e);
                failures += 1;
                match after_failure(&e) {
                    AfterFailure::Abort => return Err(e.into()),
                    AfterFailure::Backoff(delay) => {
                        if let Some(hint) = e.recovery_suggestion() {
                            eprintln!("hint: {}", hint);
                        }
                        backoff = delay;
                    }
                    AfterFailure::Continue => {}
                }
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{} of {} captures failed", failures, count));
    }
    Ok(())
}

async fn fit_file(config: &CamConfig, input: PathBuf, output: PathBuf) -> Result<()> {
    let image = FileSource::new(&input).capture().await?;
    let encoder = BudgetEncoder::new(config.codec.build()?, config.budget_bytes, config.tuning)?;
    let result = tokio::task::spawn_blocking(move || encoder.fit(&image)).await??;

    std::fs::write(&output, &result.bytes)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "{} -> {}  (q={}, bytes={}/{}, {}, encodes={})",
        input.display(),
        output.display(),
        result.quality,
        result.bytes.len(),
        config.budget_bytes,
        result.size(),
        result.stats.encodes
    );
    if !result.fits {
        eprintln!("warning: budget unreachable at q={} and {}", result.quality, result.size());
    }
    Ok(())
}

fn gallery(config: &CamConfig) -> Result<()> {
    let items = PhotoStore::new(&config.photos_dir).gallery()?;
    let body = serde_json::json!({ "ok": true, "local": items });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn upload(config: &CamConfig, poll: bool) -> Result<()> {
    let store = PhotoStore::new(&config.photos_dir);
    let uploader = ScriptUploader::new(&config.uploader_script, config.budget_bytes);
    let log = LedgerLog::new(config.ledger_log_path());
    let extension = config.codec.build()?.extension();

    let record = publish_latest(&store, extension, &uploader, &log, &NullNotifier).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if poll {
        let poller = StatusPoller::new(&config.gateway);
        match poller.wait_confirmed(&record.id, 6, Duration::from_secs(3)).await {
            Some(status) if status.confirmed => println!("Confirmed on-chain."),
            Some(status) => println!("Not confirmed yet (HTTP {}).", status.http_status),
            None => println!("Status unavailable; check {} later.", poller.status_url(&record.id)),
        }
    }
    Ok(())
}

/// Parse duration string like "30s", "2m", "1h" into a `Duration`
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("Invalid duration format: {}", duration));
    }

    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", num_str))?;

    match unit {
        "s" => Ok(Duration::from_secs(num)),
        "m" => Ok(Duration::from_secs(num * 60)),
        "h" => Ok(Duration::from_secs(num * 3600)),
        _ => Err(anyhow!(
            "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("x").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn failure_policy_follows_error_class() {
        let config = CamError::config("budget_bytes", "0", "must be greater than 0");
        assert_eq!(after_failure(&config), AfterFailure::Abort);

        let busy = CamError::capture("libcamera-jpeg exited with status 1");
        assert_eq!(after_failure(&busy), AfterFailure::Backoff(Duration::from_secs(1)));

        let missing = CamError::capture("failed to start libcamera-jpeg")
            .with_severity(fitcam::error::ErrorSeverity::Fatal);
        assert_eq!(after_failure(&missing), AfterFailure::Abort);

        let codec = CamError::encoding("jpeg", 30, "zero-area image");
        assert_eq!(after_failure(&codec), AfterFailure::Continue);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["fitcam", "--codec", "jpeg", "fit", "in.png", "out.jpg"]).unwrap();
        assert_eq!(cli.codec, Some(CodecKind::Jpeg));
        assert!(matches!(cli.command, Command::Fit { .. }));

        let cli = Cli::try_parse_from(["fitcam", "shot", "-n", "3", "--interval", "10s"]).unwrap();
        assert!(matches!(cli.command, Command::Shot { count: 3, .. }));
    }
}
