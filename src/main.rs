use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use geotrack::display::{CsvFormatter, JsonFormatter, OutputFormat, StatusReport, TextFormatter};
use geotrack::{
    MockPermissions, PermissionState, Platform, Position, PositionHistory, PositionTracker,
    SimulatedGeolocation, TrackerConfig,
};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// How often the display checks whether tracking has dropped out
const STATUS_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PermissionArg {
    Granted,
    Denied,
    Prompt,
    Unknown,
}

impl From<PermissionArg> for PermissionState {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Granted => PermissionState::Granted,
            PermissionArg::Denied => PermissionState::Denied,
            PermissionArg::Prompt => PermissionState::Prompt,
            PermissionArg::Unknown => PermissionState::Unknown,
        }
    }
}

/// Track a simulated device position and display the history or last error
#[derive(Debug, Parser)]
#[command(name = "geotrack", version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Request a single fix instead of tracking
    #[arg(long)]
    once: bool,

    /// Stop after this many positions (0 runs until Ctrl-C or an error)
    #[arg(short = 'n', long, default_value_t = 10)]
    updates: usize,

    /// Run as a host without geolocation capability
    #[arg(long)]
    unsupported: bool,

    /// Run as a host without a permissions capability
    #[arg(long)]
    no_permissions: bool,

    /// Permission granted by the simulated user
    #[arg(long, value_enum)]
    permission: Option<PermissionArg>,

    /// Pause between simulated updates (milliseconds)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Probability that a simulated update fails
    #[arg(long)]
    error_probability: Option<f64>,

    /// Fix request timeout (milliseconds, unbounded when omitted)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum number of positions kept in the history
    #[arg(long)]
    history_limit: Option<usize>,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Args {
    fn effective_config(&self) -> Result<TrackerConfig> {
        let mut config = match &self.config {
            Some(path) => TrackerConfig::from_file(path)?,
            None => TrackerConfig::default(),
        };

        if let Some(permission) = self.permission {
            config.simulation.permission = permission.into();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.simulation.interval_ms = interval_ms;
        }
        if let Some(probability) = self.error_probability {
            config.simulation.error_probability = probability;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.options.timeout_ms = Some(timeout_ms);
        }
        if let Some(limit) = self.history_limit {
            config.history_limit = Some(limit);
        }

        config.validate()?;
        Ok(config)
    }

    fn platform(&self, config: &TrackerConfig) -> Platform {
        let mut platform = Platform::unsupported();
        if !self.unsupported {
            platform = platform.with_geolocation(Arc::new(SimulatedGeolocation::new(
                config.simulation.clone(),
                Handle::current(),
            )));
        }
        if !self.no_permissions {
            platform = platform.with_permissions(Arc::new(MockPermissions::new(
                config.simulation.permission,
            )));
        }
        platform
    }
}

struct Display {
    format: OutputFormat,
    history: PositionHistory,
    /// Positions recorded so far; the history may have dropped some of them
    received: usize,
    text: TextFormatter,
    json: JsonFormatter,
    csv: CsvFormatter,
}

impl Display {
    fn new(format: OutputFormat, history_limit: Option<usize>) -> Self {
        Self {
            format,
            history: history_limit
                .map(PositionHistory::with_limit)
                .unwrap_or_default(),
            received: 0,
            text: TextFormatter::new(),
            json: JsonFormatter::new(false),
            csv: CsvFormatter::new(),
        }
    }

    fn start(&self) {
        if self.format == OutputFormat::Csv && self.csv.include_header {
            println!("{}", self.csv.header());
        }
    }

    /// Append a stream value and print it as it arrives
    fn record(&mut self, value: Option<Position>) -> Result<bool> {
        let Some(position) = value else {
            return Ok(false);
        };

        match self.format {
            OutputFormat::Text => println!("{}", self.text.format_position(&position)),
            OutputFormat::Json => println!("{}", self.json.format_position(&position)?),
            OutputFormat::Csv => println!("{}", self.csv.format_position(&position)),
        }
        self.received += 1;
        Ok(self.history.record(Some(position)))
    }

    fn finish(&self, tracker: &PositionTracker) -> Result<()> {
        let report = StatusReport::capture(tracker, &self.history);
        match self.format {
            OutputFormat::Text => print!("\n{}", self.text.format_report(&report)),
            OutputFormat::Json => println!("{}", JsonFormatter::new(true).format_report(&report)?),
            OutputFormat::Csv => {
                if let Some(error) = &report.error {
                    eprintln!("{}", self.text.format_error(error));
                }
            }
        }
        Ok(())
    }
}

async fn track(tracker: &PositionTracker, display: &mut Display, updates: usize) -> Result<()> {
    tracker.track_me();
    if !tracker.is_tracking() {
        return Ok(());
    }

    let mut subscription = tracker.subscribe();
    let mut status = tokio::time::interval(STATUS_POLL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            value = subscription.recv() => {
                let Ok(value) = value else { break };
                if display.record(value)? && updates > 0 && display.received >= updates {
                    break;
                }
            }
            _ = status.tick() => {
                if !tracker.is_tracking() {
                    warn!("Tracking stopped after a position error");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    tracker.stop_track_me();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.effective_config()?;

    if let Some(path) = &args.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("saving configuration to {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let tracker = PositionTracker::new(args.platform(&config), &config);
    let mut display = Display::new(args.format, config.history_limit);
    display.start();

    if args.once {
        match tracker.find_me().await {
            Ok(position) => {
                display.record(Some(position))?;
            }
            Err(error) => warn!("No fix: {}", error),
        }
    } else {
        track(&tracker, &mut display, args.updates).await?;
    }

    display.finish(&tracker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack::{MockGeolocation, PositionError};

    fn tracker_with(mock: &Arc<MockGeolocation>) -> PositionTracker {
        let platform = Platform::unsupported().with_geolocation(mock.clone());
        PositionTracker::new(platform, &TrackerConfig::default())
    }

    async fn feed(mock: &MockGeolocation, count: usize) {
        for step in 0..count {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mock.emit_position(Position::new(step as f64, 0.0, 5.0));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_requested_updates_with_short_history() {
        let mock = Arc::new(MockGeolocation::new());
        let tracker = tracker_with(&mock);
        let mut display = Display::new(OutputFormat::Text, Some(2));

        let finished = tokio::time::timeout(Duration::from_secs(30), async {
            let (result, _) = tokio::join!(track(&tracker, &mut display, 3), feed(&mock, 6));
            result
        })
        .await;

        assert!(matches!(finished, Ok(Ok(()))));
        assert_eq!(display.received, 3);
        assert_eq!(display.history.len(), 2);
        assert!(!tracker.is_tracking());
        assert_eq!(mock.active_watch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_tracking_drops_out() {
        let mock = Arc::new(MockGeolocation::new());
        let tracker = tracker_with(&mock);
        let mut display = Display::new(OutputFormat::Csv, None);

        let failing = async {
            feed(&mock, 1).await;
            mock.emit_error(PositionError::permission_denied("User denied Geolocation"));
        };
        let finished = tokio::time::timeout(Duration::from_secs(30), async {
            let (result, _) = tokio::join!(track(&tracker, &mut display, 0), failing);
            result
        })
        .await;

        assert!(matches!(finished, Ok(Ok(()))));
        assert_eq!(display.received, 1);
        assert!(tracker.position_error().is_some());
    }

    #[tokio::test]
    async fn test_unsupported_platform_returns_immediately() {
        let tracker = PositionTracker::new(Platform::unsupported(), &TrackerConfig::default());
        let mut display = Display::new(OutputFormat::Json, None);

        track(&tracker, &mut display, 5).await.unwrap();
        assert_eq!(display.received, 0);
    }
}
