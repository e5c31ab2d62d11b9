use std::path::PathBuf;

use anyhow::Result;
use bridge::BridgeConfig;
use clap::{Parser, Subcommand};
use trigger::{discover_ports, SystemPaths};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List raw MIDI outputs usable as midi.port_name
    ListPorts {
        #[arg(long, default_value = "/dev/snd")]
        dev_dir: PathBuf,
        #[arg(long, default_value = "/proc/asound")]
        proc_dir: PathBuf,
    },
    /// Validate a configuration file without starting the server
    CheckConfig {
        #[arg(default_value = "config.yaml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::ListPorts { dev_dir, proc_dir } => {
            let ports = discover_ports(&SystemPaths { dev_dir, proc_dir }).await?;
            if ports.is_empty() {
                println!("no midi outputs found");
            }
            for port in ports {
                println!("{}\t{}\t{}", port.name, port.alias, port.path.display());
            }
        }
        Command::CheckConfig { path } => {
            let config = BridgeConfig::load(&path)?;
            println!(
                "ok: port={} channel={} velocity={} hold={}ms",
                config.midi.port_name,
                config.midi.channel,
                config.midi.velocity,
                config.midi.hold.as_millis()
            );
            for (index, button) in config.midi.buttons.iter().enumerate() {
                let velocity = button.effective_velocity(config.midi.velocity);
                println!(
                    "  [{index}] note={} velocity={} {}",
                    button.note, velocity, button.label
                );
            }
        }
    }

    Ok(())
}
