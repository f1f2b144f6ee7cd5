use crate::app::config::{FileRotation, LogType, LoggingConfig};
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::time::SystemTime;
use tracing_subscriber::fmt::format::{FmtSpan, Writer};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

type DynLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync + 'static>;

struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs();

        const SECONDS_PER_DAY: u64 = 86400;
        const DAYS_BEFORE_UNIX_EPOCH: i64 = 719468;

        let days_since_epoch = (secs / SECONDS_PER_DAY) as i64 + DAYS_BEFORE_UNIX_EPOCH;
        let seconds_today = secs % SECONDS_PER_DAY;

        let (year, month, day) = days_to_ymd(days_since_epoch);
        let hours = seconds_today / 3600;
        let minutes = (seconds_today / 60) % 60;
        let seconds = seconds_today % 60;

        write!(
            w,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hours, minutes, seconds
        )
    }
}

fn days_to_ymd(days: i64) -> (i64, u8, u8) {
    let z = days + 306;
    let h = 100 * z - 25;
    let a = h / 3652425;
    let b = a - a / 4;
    let y = (100 * b + h) / 36525;
    let c = b + z - 365 * y - y / 4;
    let m = (5 * c + 456) / 153;
    let d = c - (153 * m - 457) / 5;

    let year = y + (m > 12) as i64;
    let month = if m > 12 { m - 12 } else { m };

    (year, month as u8, d as u8)
}

/// Initialise the tracing subscriber from configured sinks. Metrics
/// scraping and log shipping live outside the process; this wires
/// stdout and rolling-file sinks only.
pub fn init(config: &LoggingConfig) -> Result<()> {
    config.validate()?;

    let crate_name = env!("CARGO_PKG_NAME");
    let filter = EnvFilter::from_default_env()
        .add_directive("error".parse()?)
        .add_directive(format!("{}={}", crate_name, config.level).parse()?);

    let mut layers: Vec<DynLayer> = Vec::new();

    for sink in &config.sinks {
        match &sink.dest {
            LogType::Stdout { color, json } => {
                let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
                std::mem::forget(guard);

                layers.push(build_layer(non_blocking, *json, sink.spans, Some(*color)));
            }
            LogType::File {
                path,
                json,
                rotation,
                max_files,
            } => {
                let writer = create_file_writer(path, rotation, *max_files)?;
                layers.push(build_layer(writer, *json, sink.spans, None));
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

fn build_layer(
    writer: tracing_appender::non_blocking::NonBlocking,
    json: bool,
    spans: bool,
    ansi: Option<bool>,
) -> DynLayer {
    let span_events = if spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_span_events(span_events)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_timer(CompactTime)
            .with_ansi(ansi.unwrap_or(false))
            .with_writer(writer)
            .with_span_events(span_events)
            .boxed()
    }
}

fn create_file_writer(
    path: &Path,
    rotation: &FileRotation,
    max_files: usize,
) -> Result<tracing_appender::non_blocking::NonBlocking> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name in path: {}", path.display()))?;

    let directory = path
        .parent()
        .ok_or_else(|| anyhow!("Invalid directory in path: {}", path.display()))?;

    if !directory.as_os_str().is_empty() {
        std::fs::create_dir_all(directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    }

    let file_appender = match rotation {
        FileRotation::Daily => tracing_appender::rolling::daily(directory, file_name),
        FileRotation::Hourly => tracing_appender::rolling::hourly(directory, file_name),
        FileRotation::Never => tracing_appender::rolling::never(directory, file_name),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    cleanup_old_files(directory, file_name, max_files)?;

    std::mem::forget(guard);

    Ok(non_blocking)
}

fn cleanup_old_files(directory: &Path, prefix: &str, max_files: usize) -> Result<()> {
    if max_files == 0 {
        return Ok(());
    }

    let mut files: Vec<_> = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false)
        })
        .filter_map(|entry| {
            entry
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok().map(|time| (entry.path(), time)))
        })
        .collect();

    if files.len() <= max_files {
        return Ok(());
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in files.iter().skip(max_files) {
        let _ = std::fs::remove_file(path);
    }

    Ok(())
}
