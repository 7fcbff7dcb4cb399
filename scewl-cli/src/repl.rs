//! Interactive REPL.

use crate::commands::{self, PayloadFormat};
use crate::Commands;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use scewl_client::BusClient;
use scewl_controller::{HostLink, LinkConfig};
use scewl_protocol::{Channel, DeviceId};
use std::path::PathBuf;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help

  register                      Register with the SSS
  deregister                    Deregister from the SSS

  send <id> <message>           Send a text message to a device
  send-hex <id> <hex>           Send hex-encoded bytes to a device
  broadcast <message>           Broadcast a text message
  recv                          Check for new messages

  quit, exit                    Exit the REPL

Press enter to check for new messages.
"#;

pub fn run(
    mut client: BusClient<HostLink>,
    link: &LinkConfig,
    format: PayloadFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let faa = client.id() == DeviceId::FAA;
    let title = if faa { "FAA transceiver" } else { "scewl CLI" };
    println!("{}", title.bold().cyan());
    println!("Connected to {} as device {}", link, client.id());

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = history_path();
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    let prompt = if faa { "FAA>" } else { "scewl>" };
    let prompt = format!("{} ", prompt.cyan());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    match execute_repl_command(&mut client, line, format) {
                        Ok(Some(output)) => println!("{}\n", output),
                        Ok(None) => break,
                        Err(e) => println!("{}: {}\n", "Error".red(), e),
                    }
                }
                print_received(&mut client, format);

                if client.channel().is_closed() {
                    println!("{}", "Controller closed the link.".red());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

fn history_path() -> PathBuf {
    home::home_dir()
        .map(|h| h.join(".scewl_history"))
        .unwrap_or_else(|| ".scewl_history".into())
}

fn print_received<C: Channel>(client: &mut BusClient<C>, format: PayloadFormat) {
    let lines = commands::drain(client, format);
    if lines.is_empty() {
        return;
    }
    println!(
        "{} {} {}",
        "=".repeat(10),
        "RECEIVED MESSAGES".bold(),
        "=".repeat(10)
    );
    for line in lines {
        println!("{}", line);
    }
}

/// Runs one REPL line. `Ok(None)` ends the session.
fn execute_repl_command<C: Channel>(
    client: &mut BusClient<C>,
    line: &str,
    format: PayloadFormat,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match parse_line(line)? {
        Parsed::Help => Ok(Some(HELP_TEXT.to_string())),
        Parsed::Quit => Ok(None),
        Parsed::Usage(usage) => Ok(Some(format!("Usage: {}", usage))),
        Parsed::Unknown(cmd) => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
        Parsed::Command(cmd) => commands::execute(client, cmd, format).map(Some),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Parsed {
    Help,
    Quit,
    Usage(&'static str),
    Unknown(String),
    Command(Commands),
}

fn parse_line(line: &str) -> Result<Parsed, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((cmd, args)) = parts.split_first() else {
        return Ok(Parsed::Help);
    };
    let cmd = cmd.to_lowercase();

    let parsed = match cmd.as_str() {
        "help" | "?" => Parsed::Help,
        "quit" | "exit" | "q" => Parsed::Quit,
        "register" => Parsed::Command(Commands::Register),
        "deregister" => Parsed::Command(Commands::Deregister),
        "recv" | "r" => Parsed::Command(Commands::Recv { wait: false }),

        "send" | "s" => {
            if args.len() < 2 {
                return Ok(Parsed::Usage("send <id> <message>"));
            }
            Parsed::Command(Commands::Send {
                target: parse_id(args[0])?,
                message: args[1..].iter().map(|s| s.to_string()).collect(),
            })
        }

        "send-hex" | "send_hex" | "sh" => {
            if args.len() < 2 {
                return Ok(Parsed::Usage("send-hex <id> <hex>"));
            }
            Parsed::Command(Commands::SendHex {
                target: parse_id(args[0])?,
                data: args[1..].concat(),
            })
        }

        "broadcast" | "b" => {
            if args.is_empty() {
                return Ok(Parsed::Usage("broadcast <message>"));
            }
            Parsed::Command(Commands::Broadcast {
                message: args.iter().map(|s| s.to_string()).collect(),
            })
        }

        _ => Parsed::Unknown(cmd),
    };
    Ok(parsed)
}

fn parse_id(arg: &str) -> Result<u16, String> {
    arg.parse()
        .map_err(|_| format!("SCEWL id must be an integer in 0..=65535, got '{}'", arg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scewl_protocol::MemoryChannel;

    #[test]
    fn test_parse_send() {
        assert_eq!(
            parse_line("send 10 message goes here").unwrap(),
            Parsed::Command(Commands::Send {
                target: 10,
                message: vec!["message".into(), "goes".into(), "here".into()],
            })
        );
        assert_eq!(parse_line("send 10").unwrap(), Parsed::Usage("send <id> <message>"));
        assert!(parse_line("send ten hello").is_err());
    }

    #[test]
    fn test_parse_send_hex_joins_chunks() {
        assert_eq!(
            parse_line("send_hex 10 dead beef").unwrap(),
            Parsed::Command(Commands::SendHex {
                target: 10,
                data: "deadbeef".into(),
            })
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_line("HELP").unwrap(), Parsed::Help);
        assert_eq!(parse_line("exit").unwrap(), Parsed::Quit);
        assert_eq!(parse_line("docker ps").unwrap(), Parsed::Unknown("docker".into()));
        assert_eq!(parse_line("broadcast").unwrap(), Parsed::Usage("broadcast <message>"));
    }

    #[test]
    fn test_execute_quit_and_help() {
        let mut client = BusClient::new(MemoryChannel::new(), DeviceId::FAA);
        let format = PayloadFormat::Text;
        assert!(execute_repl_command(&mut client, "quit", format).unwrap().is_none());
        let help = execute_repl_command(&mut client, "help", format).unwrap().unwrap();
        assert!(help.contains("send-hex"));
    }
}
