//! asus-smcd: ASUS ATK hotkey and sensor daemon

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use asus_smc::codes::{classify, parse_code, Classified};
use asus_smc::registry::{Initial, KEY_TABLE};
use asus_smc::SmcConfig;

#[derive(Parser)]
#[command(name = "asus-smcd")]
#[command(about = "Hotkey, keyboard backlight and ambient light daemon for ASUS laptops")]
struct Cli {
    /// Config file path (default: ~/.config/asus-smc/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (default)
    Run,
    /// Print the registry key table
    Keys,
    /// Show what a notification code does
    Classify {
        /// Code, decimal or 0x-prefixed hex
        code: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(SmcConfig::default_path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Loading config from {:?}", config_path);
            let config = SmcConfig::load(&config_path)
                .with_context(|| format!("load {}", config_path.display()))?;
            asus_smc::daemon::run(config).await
        }
        Command::Keys => {
            print_keys();
            Ok(())
        }
        Command::Classify { code } => {
            let value = parse_code(&code).with_context(|| format!("invalid code {code:?}"))?;
            match classify(value) {
                Classified::Action(action) => println!("0x{value:02X}: {action}"),
                Classified::Ignored(why) => println!("0x{value:02X}: ignored ({why})"),
                Classified::Unknown => println!("0x{value:02X}: unknown"),
            }
            Ok(())
        }
        Command::Config => {
            let config = SmcConfig::load(&config_path)
                .with_context(|| format!("load {}", config_path.display()))?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn print_keys() {
    println!("{:<6} {:<5} {:<5} value", "key", "flags", "type");
    for key in KEY_TABLE {
        let value = match key.initial {
            Initial::U8(v) => v.to_string(),
            Initial::U16(v) => v.to_string(),
            Initial::U32(v) => v.to_string(),
            Initial::Bytes(b) => format!("{b:02X?}"),
            Initial::Computed(c) => format!("<{c:?}>"),
        };
        println!(
            "{:<6} {:<5} {:<5} {}",
            format!("{:?}", key.name),
            key.flags.to_string(),
            key.value_type.name(),
            value
        );
    }
}
