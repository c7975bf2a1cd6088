//! busylight - office busy sign daemon
//!
//! Watches keyboard activity, a video-call application and a manual
//! override, and switches a smart-plug light on while you are busy.

mod actuator;
mod busy;
mod config;
mod control;
mod monitor;
mod signals;

use anyhow::{anyhow, Context, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::actuator::{LightActuator, VeSyncClient};
use crate::config::{Config, Credentials, LogFormat};
use crate::control::ControlSurface;
use crate::monitor::{AppContext, Monitor, MonitorSettings};
use crate::signals::SystemSignals;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.format)?;

    info!("Starting busylight v{}", VERSION);

    // Refuse to start without a working actuator
    let credentials = Credentials::from_env()?;
    let actuator = VeSyncClient::new(&config.vesync, credentials, config.monitor.actuator_timeout())
        .context("Failed to create VeSync client")?;

    let context = Arc::new(AppContext::new(actuator, config.monitor.actuator_timeout()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("busylight-rt")
        .build()
        .context("Failed to create tokio runtime")?;
    let handle = runtime.handle().clone();

    // Ctrl-C and SIGTERM behave like "Quit"
    let signal_context = context.clone();
    handle.spawn(async move {
        wait_for_termination().await;
        signal_context.request_shutdown();
    });

    let monitor = Monitor::new(
        context.clone(),
        SystemSignals::new(),
        MonitorSettings::from(&config.monitor),
    );

    let monitor_context = context.clone();
    let monitor_thread = std::thread::Builder::new()
        .name("busylight-monitor".to_string())
        .spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(monitor.run()))) {
                Ok(cycles) => {
                    info!("busylight shutdown complete after {} cycles", cycles);
                    // The control surface may be parked in an event loop or a stdin read
                    std::process::exit(0);
                }
                Err(payload) => {
                    error!("Monitor loop panicked: {}", panic_message(payload.as_ref()));
                    turn_off_after_failure(&runtime, &monitor_context);
                    std::process::exit(1);
                }
            }
        })
        .context("Failed to spawn monitor thread")?;

    // Control surface runs on the main thread (required for the macOS menu bar)
    let surface = ControlSurface::new(context.clone(), handle);
    if let Err(e) = control::run_surface(surface, config.control.surface) {
        error!("Control surface error: {}", e);
        context.request_shutdown();
    }

    // Wait for "Quit" or Ctrl-C to stop the loop and turn the light off
    match monitor_thread.join() {
        Ok(()) => Ok(()),
        Err(payload) => {
            let message = panic_message(payload.as_ref()).to_string();
            error!("Monitor thread panicked: {}", message);
            // The monitor's runtime went down with its thread
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;
            turn_off_after_failure(&runtime, &context);
            Err(anyhow!("monitor thread panicked: {}", message))
        }
    }
}

/// Best-effort "off" once the loop can no longer do it itself.
fn turn_off_after_failure<A: LightActuator>(
    runtime: &tokio::runtime::Runtime,
    context: &AppContext<A>,
) {
    if let Err(e) = runtime.block_on(context.set_light_state(false)) {
        error!("Failed to turn light off after monitor failure: {}", e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// Resolve on Ctrl-C, or SIGTERM where available.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
                    _ = term.recv() => info!("Terminate signal received"),
                }
                return;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupt received");
    }
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
    }

    Ok(())
}
