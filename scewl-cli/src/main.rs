//! scewl-cli - Command-line driver for the SCEWL bus controller
//!
//! Plays a device CPU against the controller's CPU link, or with `--id 2`
//! the FAA transceiver on its FAA link. Provides both a REPL and one-shot
//! command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::PayloadFormat;
use scewl_client::BusClient;
use scewl_controller::{HostLink, LinkConfig};
use scewl_protocol::DeviceId;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scewl-cli")]
#[command(about = "Command-line driver and FAA transceiver for the SCEWL bus controller")]
#[command(version)]
struct Cli {
    /// Controller link as <transport>:<role>:<address>
    #[arg(
        short,
        long,
        env = "SCEWL_CLI_LINK",
        default_value = "unix:connect:/tmp/scewl/cpu.sock"
    )]
    link: LinkConfig,

    /// Device id stamped on outgoing frames (2 acts as the FAA transceiver)
    #[arg(short, long, env = "SCEWL_DEVICE_ID")]
    id: u16,

    /// Print received payloads as hex
    #[arg(long)]
    hex: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Register this device with the SSS
    Register,

    /// Deregister this device from the SSS
    Deregister,

    /// Send a text message to a device
    Send {
        /// Target device id
        target: u16,
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Send hex-encoded bytes to a device
    SendHex {
        /// Target device id
        target: u16,
        /// Payload as a hex string, e.g. deadbeef
        data: String,
    },

    /// Broadcast a text message to every device
    Broadcast {
        /// Message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Print received messages
    Recv {
        /// Block until at least one message arrives
        #[arg(short, long)]
        wait: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let format = if cli.hex {
        PayloadFormat::Hex
    } else {
        PayloadFormat::Text
    };

    let link = HostLink::open("controller", &cli.link).map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;
    let mut client = BusClient::new(link, DeviceId::new(cli.id));

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, &cli.link, format)?;
        }
        Some(cmd) => match commands::execute(&mut client, cmd, format) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
