use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use screen_sentinel_core::{
    AppConfig, DisplayController, FileOverrideSource, FileStatusSource, OverrideSource, PollLoop,
    ProcessSupervisor, ReconciliationEngine, SentinelError, ShutdownSignal, StatusSource,
    SysfsBacklight,
};
use tracing_subscriber::EnvFilter;

fn main() -> screen_sentinel_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_daemon(config.resolve()?),
        Commands::Probe { config } => run_probe(&config.resolve()?),
        Commands::Screen { state, config } => run_screen(&config.resolve()?, state),
    }
}

fn run_daemon(config: AppConfig) -> screen_sentinel_core::Result<()> {
    tracing::info!(
        status = %config.status_path,
        overrides = %config.override_path,
        "starting screen sentinel"
    );

    let shutdown = ShutdownSignal::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received termination signal");
        signal.trigger();
    })
    .map_err(|err| SentinelError::msg(format!("failed to install signal handler: {err}")))?;

    let engine = ReconciliationEngine::new(
        SysfsBacklight::new(config.display.clone()),
        ProcessSupervisor::new(config.visualizer.clone()),
        &config.engine,
    );
    let mut poll = PollLoop::new(
        FileStatusSource::new(&config.status_path),
        FileOverrideSource::new(&config.override_path),
        engine,
        config.poll.clone(),
        shutdown,
    );

    poll.run();
    tracing::info!("screen sentinel stopped");
    Ok(())
}

fn run_probe(config: &AppConfig) -> screen_sentinel_core::Result<()> {
    let status = FileStatusSource::new(&config.status_path).read();
    let command = FileOverrideSource::new(&config.override_path).read();

    let report = serde_json::json!({
        "status": status,
        "override": command,
    });
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| SentinelError::msg(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn run_screen(config: &AppConfig, state: ScreenState) -> screen_sentinel_core::Result<()> {
    let on = matches!(state, ScreenState::On);
    tracing::info!(on, "setting backlight");
    SysfsBacklight::new(config.display.clone()).set_backlight(on)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drives a display backlight and visualizer from playback state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the supervisory loop until interrupted.
    Run {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Read the status and override channels once and print them as JSON.
    Probe {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Switch the backlight once and exit.
    Screen {
        #[arg(value_enum)]
        state: ScreenState,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ScreenState {
    On,
    Off,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file; missing keys fall back to defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Player status file.
    #[arg(long)]
    status_file: Option<String>,
    /// Manual override control file.
    #[arg(long)]
    override_file: Option<String>,
    /// Seconds of idle playback before the screen blanks.
    #[arg(long)]
    inactivity_timeout: Option<u64>,
    /// Poll interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Command line used to launch the visualizer.
    #[arg(long)]
    visualizer_command: Option<String>,
}

impl ConfigArgs {
    fn resolve(&self) -> screen_sentinel_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::debug!(?path, "loading configuration");
                AppConfig::load(path)?
            }
            None => AppConfig::default(),
        };

        if let Some(path) = &self.status_file {
            config.status_path = path.clone();
        }
        if let Some(path) = &self.override_file {
            config.override_path = path.clone();
        }
        if let Some(secs) = self.inactivity_timeout {
            config.engine.inactivity_timeout_secs = secs;
        }
        if let Some(ms) = self.interval_ms {
            config.poll.interval_ms = ms;
        }
        if let Some(command) = &self.visualizer_command {
            config.visualizer.command = command.clone();
        }
        Ok(config)
    }
}
