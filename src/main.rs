//! tgam-link - Main Entry Point
//!
//! Decodes TGAM captures, generates synthetic streams, and runs a live
//! demo session with chart refresh logging.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tgam_link::{
    config::{self, AppConfig, LoggingConfig},
    pipeline::{ChartFrame, ChartRefresher, SessionBuilder, SessionEvent, SessionReport},
    sink::{FormattedWriter, RecordFormat},
    TgamSimulator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// TGAM brainwave stream decoder.
#[derive(Parser, Debug)]
#[command(name = "tgam-link", version)]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a capture file or an already-configured device node.
    Decode {
        /// Byte source; stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Record file; overrides the configured output path.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<FormatOpt>,
        /// Write the session report here as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Write a synthetic TGAM stream.
    Simulate {
        /// Destination; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "5130")]
        frames: u64,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Flip a checksum bit in every Nth frame (0 = never).
        #[arg(long, default_value = "0")]
        corrupt_every: u64,
    },
    /// Run the simulator through the live pipeline.
    Demo {
        #[arg(long, default_value = "10")]
        seconds: u64,
        /// Record file for the demo session.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the default configuration file.
    InitConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatOpt {
    Decimal,
    Csv,
    Jsonl,
    Microvolts,
    Binary,
}

impl From<FormatOpt> for RecordFormat {
    fn from(opt: FormatOpt) -> Self {
        match opt {
            FormatOpt::Decimal => RecordFormat::Decimal,
            FormatOpt::Csv => RecordFormat::Csv,
            FormatOpt::Jsonl => RecordFormat::JsonLines,
            FormatOpt::Microvolts => RecordFormat::Microvolts,
            FormatOpt::Binary => RecordFormat::Binary,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::default_config_path);
    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path),
        None => AppConfig::default(),
    };

    let _log_guard = init_logging(&config.logging);
    tracing::debug!("Using config {:?}", config_path);

    match cli.cmd {
        Cmd::Decode {
            input,
            output,
            format,
            report,
        } => decode(config, input, output, format, report),
        Cmd::Simulate {
            output,
            frames,
            seed,
            corrupt_every,
        } => simulate(output, frames, seed, corrupt_every),
        Cmd::Demo { seconds, output } => demo(config, seconds, output),
        Cmd::InitConfig { path } => {
            let Some(path) = path.or(config_path) else {
                bail!("Could not determine config directory; pass --path");
            };
            if path.exists() {
                bail!("{:?} already exists", path);
            }
            AppConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

/// Stderr logging, plus a daily rolling file when enabled.
///
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_logging(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let (file_layer, guard) = match logging.file_logging.then(|| logging.resolved_log_dir()).flatten() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tgam-link.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn open_writer(config: &AppConfig, output: Option<PathBuf>) -> Result<Option<FormattedWriter<std::fs::File>>> {
    let Some(path) = output.or_else(|| config.persistence.output_path.clone()) else {
        return Ok(None);
    };
    let writer = FormattedWriter::create(&path, config.persistence.format, config.persistence.filter)
        .with_context(|| format!("Opening record file {}", path.display()))?;
    Ok(Some(writer))
}

fn decode(
    mut config: AppConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<FormatOpt>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(format) = format {
        config.persistence.format = format.into();
    }

    let source: Box<dyn Read + Send> = match &input {
        Some(path) => Box::new(
            std::fs::File::open(path).with_context(|| format!("Opening {}", path.display()))?,
        ),
        None => Box::new(io::stdin()),
    };

    let mut builder = SessionBuilder::new(config.clone());
    if let Some(writer) = open_writer(&config, output)? {
        builder = builder.persist_to(Box::new(writer));
    }

    tracing::info!(
        "Decoding {}",
        input
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdin".to_string())
    );
    let session = builder.start(Box::new(source))?;
    let report = session.join()?;

    print_summary(&report);
    if let Some(path) = report_path {
        write_report(&path, &report)?;
    }
    if let Some(error) = &report.link_error {
        bail!("Link failed: {}", error);
    }
    Ok(())
}

fn simulate(output: Option<PathBuf>, frames: u64, seed: u64, corrupt_every: u64) -> Result<()> {
    let mut sim = TgamSimulator::new(seed)
        .with_frame_limit(frames)
        .with_corruption(corrupt_every);

    let written = match &output {
        Some(path) => {
            let mut file = io::BufWriter::new(
                std::fs::File::create(path)
                    .with_context(|| format!("Creating {}", path.display()))?,
            );
            let n = io::copy(&mut sim, &mut file)?;
            file.flush()?;
            n
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let n = io::copy(&mut sim, &mut lock)?;
            lock.flush()?;
            n
        }
    };

    tracing::info!(
        "Simulated {} frames ({} bytes, {} corrupted)",
        sim.frames_emitted(),
        written,
        sim.corrupted()
    );
    Ok(())
}

fn demo(config: AppConfig, seconds: u64, output: Option<PathBuf>) -> Result<()> {
    let chart = tgam_link::sink::VisualizationBuffer::new(config.visualization.window);

    let mut builder = SessionBuilder::new(config.clone()).visualize(chart.clone());
    if let Some(writer) = open_writer(&config, output)? {
        builder = builder.persist_to(Box::new(writer));
    }
    let seed = chrono::Utc::now().timestamp_millis() as u64;
    let session = builder.start(Box::new(TgamSimulator::new(seed).paced()))?;

    let refresher = ChartRefresher::new(chart, &config.visualization).with_analysis(&config.analysis);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    let refresh_handle = std::thread::spawn(move || refresher.run(stop_rx, log_chart_frame));

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline && !session.is_finished() {
        if let Some(event) = session.events().recv_timeout(Duration::from_millis(100)) {
            log_event(&event);
        }
    }

    drop(stop_tx);
    let report = session.close()?;
    let frames = refresh_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Chart refresh thread panicked"))?;
    tracing::info!("Delivered {} chart frames", frames);
    print_summary(&report);
    Ok(())
}

fn log_chart_frame(frame: ChartFrame) {
    let dominant = frame
        .bands
        .and_then(|b| b.dominant())
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-".to_string());
    let metrics = frame.metrics;
    let (mean_uv, std_uv) = frame.stats.map(|s| (s.mean, s.std)).unwrap_or_default();
    tracing::info!(
        window = frame.samples.len(),
        mean_uv,
        std_uv,
        attention = ?metrics.attention,
        meditation = ?metrics.meditation,
        signal = ?metrics.signal_level(),
        "Chart refresh, dominant band {}",
        dominant
    );
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::LinkFailure(message) => tracing::error!("Link failure: {}", message),
        SessionEvent::SinkError { sink, message, .. } => {
            tracing::warn!("Sink {} error: {}", sink, message)
        }
        SessionEvent::LinkStatus(status) => tracing::info!("Link {}", status),
        SessionEvent::Stats(stats) => tracing::debug!(
            frames = stats.frames_decoded,
            dropped = stats.frames_dropped(),
            "Decoder progress"
        ),
        SessionEvent::DecoderFinished => tracing::debug!("Decoder finished"),
    }
}

fn print_summary(report: &SessionReport) {
    println!("Link:            {}", report.link_status);
    println!("Bytes read:      {}", report.bytes_read);
    println!("Frames decoded:  {}", report.decoder.frames_decoded);
    println!(
        "Frames dropped:  {} (checksum {}, too long {}, malformed {})",
        report.decoder.frames_dropped(),
        report.decoder.checksum_mismatches,
        report.decoder.frames_too_long,
        report.decoder.malformed_payloads
    );
    if let Some(reason) = &report.last_drop {
        println!("Last drop:       {}", reason);
    }
    println!("Samples routed:  {}", report.router.routed);
    if let Some(persistence) = &report.persistence {
        println!(
            "Records written: {} ({} rejected, {} write failures)",
            persistence.records_written,
            report.persistence_rejections(),
            persistence.write_failures
        );
    }
    println!(
        "Duration:        {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
}

fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Writing report {}", path.display()))?;
    tracing::info!("Session report written to {}", path.display());
    Ok(())
}
