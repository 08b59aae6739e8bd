//! # AMP HAL Binary
//!
//! Runs the rotary encoder and push buttons on their own threads and keeps
//! the LED transport to the coprocessor initialised until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Real hardware, default config
//! amp_hal --config /etc/amp/amp.toml
//!
//! # No GPIO; LEDs through a plain file instead of /dev/mem
//! amp_hal -s --mem-device /tmp/amp-window
//!
//! # LED scanner animation, verbose JSON logs
//! amp_hal --scanner -v --json
//! ```

use amp::config::ConfigLoader;
use amp::hal::config::HalConfig;
use amp::hal::consts::DEFAULT_CONFIG_PATH;
use amp_hal::core::{CoreOptions, HalCore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// AMP HAL - rotary encoder, buttons and LED transport
#[derive(Parser, Debug)]
#[command(name = "amp_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Edge-driven input peripherals and coprocessor LED transport")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file. A missing file means board defaults.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use simulated edge sources instead of GPIO character devices
    #[arg(short = 's', long)]
    simulate: bool,

    /// Physical memory device; overrides `[shared_memory].device`
    #[arg(long, value_name = "PATH")]
    mem_device: Option<PathBuf>,

    /// Animate the LED string with a bouncing scanner
    #[arg(long)]
    scanner: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        if tracing::dispatcher::has_been_set() {
            error!("HAL startup failed: {}", e);
        } else {
            eprintln!("amp_hal: {e}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = HalConfig::load_or_default(&args.config)?;
    if let Some(device) = args.mem_device.clone() {
        config.shared_memory.device = device;
    }

    setup_tracing(&args, &config);
    let _span = tracing::info_span!("service", name = %config.shared.service_name).entered();

    info!("AMP HAL v{} starting...", env!("CARGO_PKG_VERSION"));
    if args.simulate {
        info!("Simulation mode enabled");
    }

    let mut hal_core = HalCore::from_config(
        config,
        CoreOptions {
            simulate: args.simulate,
            scanner: args.scanner,
        },
    )?;

    let running = hal_core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let result = hal_core.run();
    if let Err(e) = &result {
        error!("HAL loop error: {}", e);
    }
    hal_core.shutdown()?;
    result?;

    info!("AMP HAL shutdown complete");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and `[shared].log_level`.
fn setup_tracing(args: &Args, config: &HalConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.shared.log_level.as_filter_str()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
