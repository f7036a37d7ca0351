//! # S626 HAL Binary
//!
//! Opens the board, starts the polling engine and pumps the host component
//! until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Run with the simulation driver
//! s626_hal --config config/s626.toml --simulate
//!
//! # Verbose logging for ten seconds
//! s626_hal -c config/s626.toml -s -v --duration 10
//! ```

use clap::Parser;
use s626_common::config::{ConfigError, ConfigLoader, LogLevel};
use s626_common::hal::config::S626Config;
use s626_common::consts::DEFAULT_CONFIG_PATH;
use s626_hal::{DriverRegistry, S626Component};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// S626 HAL - board I/O mediator with a periodic polling thread
#[derive(Parser, Debug)]
#[command(name = "s626_hal")]
#[command(version)]
#[command(about = "Sensoray 626 board I/O mediator with a periodic polling thread")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (s626.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Driver to load (overrides board.driver)
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("S626 HAL failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loaded = load_config(&args);

    let log_level = loaded
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("S626 HAL v{} starting...", env!("CARGO_PKG_VERSION"));
    let config = loaded?;
    config.validate()?;

    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation".to_string()
    } else if let Some(name) = &args.driver {
        name.clone()
    } else {
        config.board.driver.clone()
    };

    let registry = DriverRegistry::with_builtin();
    let driver = registry.create_driver(&driver_name)?;
    info!("Created driver: {} v{}", driver.name(), driver.version());

    let mut component =
        S626Component::new(config.shared.service_name.clone(), driver, config.poller.clone());
    component.configure()?;
    apply_startup_config(&mut component, &config)?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    component.start()?;
    pump(&mut component, &running, &config, args.duration.map(Duration::from_secs));

    let stats = component.stop()?;
    info!(
        "Polling: {} cycles ({} complete, {} aborted, {} idle), avg={}us, max={}us, violations={}",
        stats.cycles,
        stats.completed,
        stats.aborted,
        stats.idle,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.timing_violations
    );
    component.cleanup()?;

    info!("S626 HAL shutdown complete");
    Ok(())
}

/// Load the configuration file. A missing file at the default path falls
/// back to built-in defaults; an explicitly given path must exist.
fn load_config(args: &Args) -> Result<S626Config, ConfigError> {
    match S626Config::load(&args.config) {
        Err(ConfigError::FileNotFound) if args.config.as_os_str() == DEFAULT_CONFIG_PATH => {
            Ok(S626Config::default())
        }
        other => other,
    }
}

/// Open the board and apply the `[board]` and `[channels]` sections.
fn apply_startup_config(
    component: &mut S626Component,
    config: &S626Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let board = &config.board;
    component.prepare_driver(&board.device, board.bus, board.slot)?;

    let channels = &config.channels;
    component.set_initial_adc(channels.adc_select);
    component.set_initial_enc(channels.enc_select);
    component
        .interface()
        .set_initial_digital(&channels.initial_dio)?;
    if channels.adc_range != 0 {
        component.set_range_adc(u16::MAX, channels.adc_range)?;
    }
    if channels.prepare_encoders {
        component.prepare_all_enc()?;
    }
    component.set_active_publishing(u32::from(channels.activity));
    info!(
        "Channels: activity={:?}, adc={:#06x}, enc={:#04x}",
        channels.activity_mask(),
        channels.adc_select,
        channels.enc_select
    );
    Ok(())
}

/// Run the host update cadence until shutdown is requested.
fn pump(
    component: &mut S626Component,
    running: &AtomicBool,
    config: &S626Config,
    duration: Option<Duration>,
) {
    let started = Instant::now();
    let period = config.poller.update_period();
    let mut updates: u64 = 0;

    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|d| started.elapsed() >= d) {
            info!("Run duration elapsed");
            break;
        }

        match component.update() {
            Ok(outputs) => {
                updates += 1;
                if updates % 100 == 0 {
                    debug!(
                        "DIO={:04x?} ADC={:?} ENC={:?}",
                        outputs.dio, outputs.adc, outputs.enc
                    );
                }
            }
            Err(e) => warn!("Update failed: {e}"),
        }

        let code = component.last_error();
        if code != 0 {
            debug!("Last error code {code}");
        }
        std::thread::sleep(period);
    }
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        "debug"
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
