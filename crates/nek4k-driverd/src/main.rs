//! nek4k-driverd entry point.
//!
//! Loads the configuration, sets up logging, detaches from the terminal, and
//! runs the event loop until SIGINT or SIGTERM.
//!
//! # Startup sequence
//!
//! ```text
//! main()
//!  └─ Cli::parse()                  -- command line
//!  └─ load_config() + overrides     -- TOML file (absolute path), CLI wins
//!  └─ init_logging()                -- stderr, or the log file when detached
//!  └─ daemon()                      -- unless --dbg / foreground
//!  └─ signal flags                  -- SIGHUP reload, SIGINT/SIGTERM stop
//!  └─ XTestSink::open()             -- X display + XTest check
//!  └─ DeviceLocator::locate()       -- explicit path or autoscan
//!  └─ DaemonLoop::run()             -- until shutdown
//! ```
//!
//! # Exit codes
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | clean shutdown, or `--print-config`              |
//! | 1    | configuration file unreadable or malformed       |
//! | 2    | explicit device path could not be opened        |
//! | 3    | `/dev/input` could not be scanned                |
//! | 4    | autoscan found no matching device               |
//! | 5    | a mapping is out of range or duplicated          |
//! | 6    | no X display, or the display lacks XTest         |
//! | 7    | daemonization, log file, or signal setup failed |

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use nek4k_driverd::application::locate_device::LocateError;
use nek4k_driverd::application::translate_event::SinkError;
use nek4k_driverd::infrastructure::storage::config::{
    absolute_config_path, load_config, render_config, AppConfig, ConfigError, ConfigOverrides,
    DEFAULT_CONFIG_PATH,
};

/// Userspace driver for the Zoom jog and Spell key of the Microsoft Natural
/// Ergonomic Keyboard 4000.
#[derive(Debug, Parser)]
#[command(name = "nek4k-driverd", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Keyboard device node, or "auto" to scan /dev/input.
    #[arg(short = 'k', long = "kbd-dev")]
    kbd_dev: Option<String>,

    /// X11 keycode (or mouse button) for Zoom pushed up.
    #[arg(short = 'U', long = "zoom-up")]
    zoom_up: Option<u32>,

    /// X11 keycode (or mouse button) for Zoom pushed down.
    #[arg(short = 'D', long = "zoom-down")]
    zoom_down: Option<u32>,

    /// X11 keycode for the Spell key.
    #[arg(short = 'S', long)]
    spell: Option<u32>,

    /// Treat both Zoom codes as mouse button numbers.
    #[arg(short = 'b', long = "zoom-mouse-button")]
    zoom_mouse_button: bool,

    /// Treat both Zoom buttons as a mouse wheel (one click per press).
    #[arg(short = 'w', long = "zoom-mouse-wheel")]
    zoom_mouse_wheel: bool,

    /// X display to send events to.  Without it the `[display]` file setting
    /// applies, then `$DISPLAY`.
    #[arg(short = 'd', long)]
    display: Option<String>,

    /// Stay in the foreground and log to stderr.
    #[arg(long = "dbg", alias = "foreground")]
    foreground: bool,

    /// Log file used when running detached.
    #[arg(short = 'l', long = "logfile")]
    log_file: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).  RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            device_path: self.kbd_dev.clone(),
            zoom_up: self.zoom_up,
            zoom_down: self.zoom_down,
            spell: self.spell,
            zoom_mouse_button: self.zoom_mouse_button,
            zoom_mouse_wheel: self.zoom_mouse_wheel,
            display: self.display.clone(),
            foreground: self.foreground,
            log_file: self.log_file.clone(),
        }
    }
}

// ── Errors and exit codes ─────────────────────────────────────────────────────

/// Every fatal error the daemon can stop with.
#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{0:#}")]
    Setup(anyhow::Error),
}

impl DaemonError {
    fn exit_code(&self) -> u8 {
        match self {
            DaemonError::Config(ConfigError::Mapping(_)) => 5,
            DaemonError::Config(_) => 1,
            DaemonError::Locate(LocateError::DeviceOpen { .. }) => 2,
            DaemonError::Locate(LocateError::ScanFailure { .. }) => 3,
            DaemonError::Locate(LocateError::NoMatchingDevice) => 4,
            DaemonError::Sink(_) => 6,
            DaemonError::Setup(_) => 7,
        }
    }
}

// ── Startup helpers ───────────────────────────────────────────────────────────

/// Anchors `--config` at the startup directory, then loads the file and
/// applies command-line overrides.  The anchored path is what SIGHUP reloads
/// read after `daemon()` has changed to `/`.
fn effective_config(cli: &mut Cli) -> Result<AppConfig, ConfigError> {
    cli.config = absolute_config_path(&cli.config)?;
    let mut config = load_config(&cli.config)?;
    cli.overrides().apply(&mut config);
    Ok(config)
}

/// `RUST_LOG` wins; otherwise `-v`/`-vv`, then the configured level.
fn log_filter(verbose: u8, configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(filter: EnvFilter, config: &AppConfig) -> anyhow::Result<()> {
    use anyhow::Context;

    if config.daemon.foreground {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let path = &config.daemon.log_file;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

// ── Linux runtime ─────────────────────────────────────────────────────────────

#[cfg(target_os = "linux")]
fn run(cli: &Cli, config: AppConfig) -> Result<(), DaemonError> {
    use std::sync::Arc;

    use anyhow::Context;
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use tracing::info;

    use nek4k_driverd::application::locate_device::DeviceLocator;
    use nek4k_driverd::application::run_daemon::{DaemonLoop, LoopSignals};
    use nek4k_driverd::infrastructure::input_device::linux::EvdevProbe;
    use nek4k_driverd::infrastructure::output_sink::xtest::XTestSink;
    use nek4k_driverd::infrastructure::storage::config::ConfigFileMappings;

    // Validate before detaching so range errors reach the terminal.
    let table = config.mapping_table().map_err(ConfigError::from)?;
    let identity = config.device_identity();

    if !config.daemon.foreground {
        nix::unistd::daemon(false, false)
            .context("failed to daemonize")
            .map_err(DaemonError::Setup)?;
    }
    info!("nek4k-driverd {} starting", env!("CARGO_PKG_VERSION"));

    let signals = LoopSignals::default();
    for (signal, flag) in [
        (SIGHUP, &signals.reload),
        (SIGINT, &signals.shutdown),
        (SIGTERM, &signals.shutdown),
    ] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .with_context(|| format!("failed to install handler for signal {signal}"))
            .map_err(DaemonError::Setup)?;
    }

    let sink = XTestSink::open(config.display.name.as_deref())?;
    let device = DeviceLocator::new(EvdevProbe).locate(&config.device.path, &identity)?;

    let mappings = ConfigFileMappings::new(cli.config.clone(), cli.overrides());
    let mut daemon = DaemonLoop::new(
        device,
        sink,
        mappings,
        table,
        signals,
        config.loop_settings(),
    );
    let stats = daemon.run();
    info!(
        "shutting down: {} delivered, {} failed",
        stats.delivered, stats.delivery_failures
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: &Cli, _config: AppConfig) -> Result<(), DaemonError> {
    Err(DaemonError::Setup(anyhow::anyhow!(
        "nek4k-driverd requires Linux evdev and X11"
    )))
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();

    let config = match effective_config(&mut cli) {
        Ok(config) => config,
        Err(e) => {
            let e = DaemonError::from(e);
            eprintln!("nek4k-driverd: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    if cli.print_config {
        return match render_config(&config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                let e = DaemonError::from(e);
                eprintln!("nek4k-driverd: {e}");
                ExitCode::from(e.exit_code())
            }
        };
    }

    let filter = log_filter(cli.verbose, &config.daemon.log_level);
    if let Err(e) = init_logging(filter, &config) {
        let e = DaemonError::Setup(e);
        eprintln!("nek4k-driverd: {e}");
        return ExitCode::from(e.exit_code());
    }

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            // Foreground logging already went to stderr.
            if !cli.foreground {
                eprintln!("nek4k-driverd: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
