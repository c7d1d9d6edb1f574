//! Line-oriented control on stdin
//!
//! One command per line:
//!
//! ```text
//! 0xC4          dispatch a decoded notification code
//! raw 0xD1      raw device notification (decoded via _WED without DMES)
//! suspend       power transition to off
//! resume        power transition to on
//! level 8       set the keyboard backlight (badged and persisted)
//! status        print the engine status as JSON
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::codes::parse_code;
use crate::engine::EngineHandle;
use crate::error::SmcError;
use crate::power::PowerState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinCommand {
    Notify(u32),
    Raw(u32),
    Power(PowerState),
    Level(i64),
    Status,
}

/// Parse one input line; `Ok(None)` for blank lines
pub fn parse_line(line: &str) -> Result<Option<StdinCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();

    let cmd = match (first, arg) {
        ("raw", Some(v)) => {
            StdinCommand::Raw(parse_code(v).ok_or_else(|| format!("bad code {v:?}"))?)
        }
        ("suspend", None) => StdinCommand::Power(PowerState::Off),
        ("resume", None) => StdinCommand::Power(PowerState::On),
        ("level", Some(v)) => {
            StdinCommand::Level(v.parse().map_err(|_| format!("bad level {v:?}"))?)
        }
        ("status", None) => StdinCommand::Status,
        (code, None) => {
            StdinCommand::Notify(parse_code(code).ok_or_else(|| format!("bad command {code:?}"))?)
        }
        _ => return Err(format!("bad command {:?}", line.trim())),
    };
    Ok(Some(cmd))
}

async fn execute(engine: &EngineHandle, cmd: StdinCommand) -> Result<(), SmcError> {
    match cmd {
        StdinCommand::Notify(code) => engine.notify(code).await,
        StdinCommand::Raw(raw) => engine.device_notification(raw).await,
        StdinCommand::Power(state) => engine.set_power_state(state).await,
        StdinCommand::Level(level) => {
            let applied = engine.set_backlight_level(level, true, true).await?;
            info!("Keyboard backlight level {}", applied);
            Ok(())
        }
        StdinCommand::Status => {
            let status = engine.status().await?;
            match serde_json::to_string_pretty(&status) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("Failed to encode status: {}", e),
            }
            Ok(())
        }
    }
}

/// Feed stdin into the engine until EOF or the engine stops
pub async fn run(engine: EngineHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(cmd)) => {
                if let Err(e) = execute(&engine, cmd).await {
                    warn!("{}", e);
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
}
