//! xylo-ledd
//!
//! Drives Xylo LED cards over USB: programs each card as it is plugged in,
//! plays the attach animation, and exposes the ledmask attribute through a
//! console and one-shot CLI flags.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{UsbBridge, UsbCommand, UsbEvent, create_usb_bridge, setup_logging};
use server::config::{ServerConfig, load_config};
use server::console;
use server::usb::{find_devices, spawn_usb_worker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "xylo-ledd")]
#[command(author, version, about = "Xylo LED card daemon")]
#[command(long_about = "
Programs Xylo LED cards as they are plugged in and exposes each card's
ledmask attribute.

EXAMPLES:
    # Run until Ctrl+C, reading console commands from stdin
    xylo-ledd

    # Light LEDs 0, 2, 5 and 7 on the first card and exit
    xylo-ledd --set a5

    # Print the first card's ledmask and exit
    xylo-ledd --get

    # List connected cards without programming them
    xylo-ledd --list-devices

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/xylo-led/server.toml
    3. /etc/xylo-led/server.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List connected cards and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print the first card's ledmask and exit
    #[arg(long, conflicts_with = "set")]
    get: bool,

    /// Write a hex ledmask to the first card and exit
    #[arg(long, value_name = "HEX")]
    set: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ServerConfig::default();
        let path = ServerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        load_config(path).context("Failed to load configuration")?
    } else {
        ServerConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("xylo-ledd v{}", env!("CARGO_PKG_VERSION"));

    if args.list_devices {
        return list_devices_mode();
    }

    let (usb_bridge, worker) = create_usb_bridge();
    let usb_worker_handle = spawn_usb_worker(worker, config.usb_settings())
        .context("Failed to spawn USB worker thread")?;

    let result = if args.get {
        get_mode(&usb_bridge).await
    } else if let Some(text) = args.set.as_deref() {
        set_mode(&usb_bridge, text).await
    } else {
        run_service(&usb_bridge).await
    };

    info!("Shutting down USB subsystem...");
    if let Err(e) = shutdown_usb_worker(&usb_bridge).await {
        error!("Error shutting down USB worker: {:#}", e);
    }

    match usb_worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("USB worker exited with error: {}", e),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    result
}

/// List cards and exit
fn list_devices_mode() -> Result<()> {
    let devices = find_devices().context("Failed to enumerate USB devices")?;

    if devices.is_empty() {
        println!("No Xylo cards found.");
    } else {
        println!("Found {} Xylo card(s):\n", devices.len());
        for device in devices {
            println!("  {}", device);
        }
    }
    Ok(())
}

async fn get_mode(bridge: &UsbBridge) -> Result<()> {
    let id = console::resolve(bridge, None).await?;
    let text = bridge
        .read_attribute(id)
        .await
        .with_context(|| format!("Failed to read ledmask of {}", id))?;
    print!("{}", text);
    Ok(())
}

async fn set_mode(bridge: &UsbBridge, text: &str) -> Result<()> {
    let id = console::resolve(bridge, None).await?;
    bridge
        .write_attribute(id, text)
        .await
        .with_context(|| format!("Failed to write ledmask of {}", id))?;
    info!("{}: ledmask set from {:?}", id, text);
    Ok(())
}

/// Run until Ctrl+C, serving console commands and logging card events
async fn run_service(bridge: &UsbBridge) -> Result<()> {
    info!("Press Ctrl+C to shutdown");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => handle_console_line(bridge, &line).await,
                    Ok(None) => {
                        info!("stdin closed, console disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        stdin_open = false;
                    }
                }
            }

            event = bridge.recv_event() => {
                match event {
                    Ok(UsbEvent::SessionAttached { session }) => {
                        info!("{} is {} (ledmask {:#04x})", session.id, session.state, session.ledmask);
                    }
                    Ok(UsbEvent::SessionDetached { session }) => info!("{} removed", session),
                    Err(e) => return Err(anyhow!("USB worker stopped: {}", e)),
                }
            }
        }
    }

    Ok(())
}

async fn handle_console_line(bridge: &UsbBridge, line: &str) {
    let reply = match console::parse_line(line) {
        Ok(None) => return,
        Ok(Some(command)) => console::execute(bridge, command).await,
        Err(e) => Err(e),
    };

    match reply {
        Ok(text) => println!("{}", text),
        Err(e) => println!("error: {:#}", e),
    }
}

async fn shutdown_usb_worker(bridge: &UsbBridge) -> Result<()> {
    bridge
        .send_command(UsbCommand::Shutdown)
        .await
        .context("Failed to send Shutdown command")?;
    Ok(())
}
