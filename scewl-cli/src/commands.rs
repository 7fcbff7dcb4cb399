//! Command execution.

use crate::Commands;
use colored::Colorize;
use scewl_client::{BusClient, ClientError};
use scewl_protocol::{Channel, DeviceId, Frame, ReadMode};

/// How received payloads are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Text,
    Hex,
}

/// Executes a command and returns the formatted output.
pub fn execute<C: Channel>(
    client: &mut BusClient<C>,
    cmd: Commands,
    format: PayloadFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => Err("the REPL cannot run as a one-shot command".into()),

        Commands::Register => registration(client, true),

        Commands::Deregister => registration(client, false),

        Commands::Send { target, message } => {
            let data = message.join(" ");
            send(client, DeviceId::new(target), data.as_bytes())
        }

        Commands::SendHex { target, data } => {
            let bytes = hex::decode(data.trim())
                .map_err(|e| format!("'{}' is not a valid hex string: {}", data, e))?;
            send(client, DeviceId::new(target), &bytes)
        }

        Commands::Broadcast { message } => {
            let data = message.join(" ");
            send(client, DeviceId::BROADCAST, data.as_bytes())
        }

        Commands::Recv { wait } => {
            let mut lines = Vec::new();
            if wait {
                let frame = client
                    .recv(ReadMode::Blocking)
                    .ok_or("link closed before a message arrived")?;
                lines.push(format_frame(&frame, format));
            }
            lines.extend(drain(client, format));

            if lines.is_empty() {
                Ok("No messages".yellow().to_string())
            } else {
                Ok(lines.join("\n"))
            }
        }
    }
}

/// Collects every frame that is already waiting, formatted one per line.
pub fn drain<C: Channel>(client: &mut BusClient<C>, format: PayloadFormat) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(frame) = client.recv(ReadMode::NonBlocking) {
        lines.push(format_frame(&frame, format));
    }
    lines
}

pub fn format_frame(frame: &Frame, format: PayloadFormat) -> String {
    let payload = match format {
        PayloadFormat::Text => frame.payload.escape_ascii().to_string(),
        PayloadFormat::Hex => hex::encode(&frame.payload),
    };
    let mut line = format!(
        "{}->{} ({}B): {}",
        frame.source.to_string().cyan(),
        frame.target,
        frame.payload.len(),
        payload
    );
    if frame.is_truncated() {
        line.push_str(&format!(" [truncated from {}B]", frame.declared_len()).yellow().to_string());
    }
    line
}

fn registration<C: Channel>(
    client: &mut BusClient<C>,
    register: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    if client.id() == DeviceId::FAA {
        return Err("the FAA transceiver does not register with the SSS".into());
    }

    let (result, done, already) = if register {
        (client.register(), "Registered", "Already registered")
    } else {
        (client.deregister(), "Deregistered", "Already deregistered")
    };

    match result {
        Ok(()) => Ok(format!("{} device {}", done.green(), client.id())),
        Err(ClientError::Already) => Ok(format!("{} device {}", already.yellow(), client.id())),
        Err(e) => Err(e.into()),
    }
}

fn send<C: Channel>(
    client: &mut BusClient<C>,
    target: DeviceId,
    data: &[u8],
) -> Result<String, Box<dyn std::error::Error>> {
    client.send(target, data)?;
    Ok(format!(
        "{} {}->{} ({}B)",
        "Sent".green(),
        client.id(),
        target.to_string().cyan(),
        data.len()
    ))
}
