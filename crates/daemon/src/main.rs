//! hotplugd
//!
//! Hotplug device-management daemon: classifies kernel device events per
//! device class, maintains per-class registries of attached devices, drives
//! the USB accessory-mode handshake, and publishes lifecycle notifications.

use anyhow::{Context, Result};
use clap::Parser;
use common::{DaemonBridge, DaemonCommand, DaemonEvent, create_daemon_bridge, setup_logging};
use daemon::config::DaemonConfig;
use daemon::worker::spawn_device_worker;
use event::DeviceEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "hotplugd")]
#[command(author, version, about = "Hotplug device-management daemon")]
#[command(long_about = "
Observes kernel device events (USB, Bluetooth, storage media), maintains a
live registry of attached devices per device class, negotiates USB accessory
mode with connected phones, and exposes device state to subscribers.

Decoded device events arrive on stdin, one event per line, as
whitespace-separated KEY=VALUE attributes, e.g.:

    ACTION=add DEVPATH=/devices/usb1/1-1 SUBSYSTEM=usb DEVTYPE=usb_device

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/hotplugd/daemon.toml
    3. /etc/hotplugd/daemon.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// Run headless without the stdin event feed
    #[arg(long)]
    service: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = DaemonConfig::default();
        let path = DaemonConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if args.config.is_some() {
        DaemonConfig::load(args.config.clone()).context("Failed to load configuration")?
    } else {
        DaemonConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("hotplugd v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let (bridge, worker) = create_daemon_bridge();
    let worker_handle = spawn_device_worker(worker, config.clone());

    // Log lifecycle notifications as they fan out of the worker.
    let notification_bridge = bridge.clone();
    let notification_task = tokio::spawn(async move {
        while let Ok(event) = notification_bridge.recv_event().await {
            let DaemonEvent::DeviceChanged { class, action, device } = event;
            info!(
                "{} {:?}: number {} path {} ({:04x}:{:04x})",
                class,
                action,
                device.device_number,
                device.device_path,
                device.vendor_id,
                device.product_id
            );
        }
    });

    let service_mode = args.service || config.daemon.service_mode;
    if service_mode {
        info!("Running in service mode (no stdin event feed)");
        wait_for_shutdown().await;
    } else {
        // The production transport decodes kernel uevents externally; here
        // decoded events arrive on stdin as KEY=VALUE lines.
        let feed_bridge = bridge.clone();
        let feed_task = tokio::spawn(async move {
            if let Err(e) = feed_events(feed_bridge).await {
                error!("event feed stopped: {:#}", e);
            }
        });
        wait_for_shutdown().await;
        feed_task.abort();
    }

    info!("Shutting down device worker...");
    if let Err(e) = bridge.send_command(DaemonCommand::Shutdown).await {
        error!("Error sending shutdown: {}", e);
    }
    notification_task.abort();

    if worker_handle.join().is_err() {
        error!("device worker thread panicked");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Read decoded device events from stdin and forward them to the worker
async fn feed_events(bridge: DaemonBridge) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let attributes: Vec<(String, String)> = line
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if attributes.is_empty() {
            warn!("ignoring malformed event line: {:?}", line);
            continue;
        }

        bridge
            .send_command(DaemonCommand::DeviceEvent {
                event: DeviceEvent::new(attributes),
            })
            .await
            .context("failed to deliver event to worker")?;
    }

    info!("event feed reached end of input");
    Ok(())
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }
}
