//! Plain-text sensor scripts.
//!
//! One command per line:
//!
//! ```text
//! # visitor presses hotspot 1, hesitates, moves to 2
//! press 1
//! wait 400
//! release 1
//! press 2
//! wait 5000ms
//! ```
//!
//! `down`/`up`/`unpress` are accepted as aliases. Blank lines and `#` comments are skipped.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::SensorHub;
use crate::error::ScriptError;
use crate::models::HotspotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    Press(HotspotId),
    Release(HotspotId),
    Wait(Duration),
}

impl SensorCommand {
    /// Parse one script line. Returns `None` for blank lines and comments.
    pub fn parse_line(line: usize, text: &str) -> Result<Option<Self>, ScriptError> {
        let text = text.split('#').next().unwrap_or_default().trim();
        let mut parts = text.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(None);
        };
        let argument = parts.next();
        if let Some(extra) = parts.next() {
            return Err(ScriptError::UnexpectedArgument {
                line,
                value: extra.to_string(),
            });
        }

        let parsed = match command.to_lowercase().as_str() {
            "press" | "down" => Self::Press(parse_id(line, command, argument)?),
            "release" | "unpress" | "up" => Self::Release(parse_id(line, command, argument)?),
            "wait" => Self::Wait(parse_wait(line, command, argument)?),
            _ => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: command.to_string(),
                })
            }
        };
        Ok(Some(parsed))
    }

    /// Report a press or release to `hub`. Waits are left to the caller.
    pub fn apply(&self, hub: &SensorHub) {
        match self {
            Self::Press(id) => hub.notify_pressed(*id),
            Self::Release(id) => hub.notify_released(*id),
            Self::Wait(_) => {}
        }
    }
}

fn parse_id(line: usize, command: &str, argument: Option<&str>) -> Result<HotspotId, ScriptError> {
    let value = argument.ok_or_else(|| ScriptError::MissingArgument {
        line,
        command: command.to_string(),
        expected: "a hotspot id",
    })?;
    value.parse().map_err(|source| ScriptError::InvalidId {
        line,
        value: value.to_string(),
        source,
    })
}

fn parse_wait(line: usize, command: &str, argument: Option<&str>) -> Result<Duration, ScriptError> {
    let value = argument.ok_or_else(|| ScriptError::MissingArgument {
        line,
        command: command.to_string(),
        expected: "a duration in milliseconds",
    })?;
    value
        .strip_suffix("ms")
        .unwrap_or(value)
        .parse()
        .map(Duration::from_millis)
        .map_err(|source| ScriptError::InvalidDuration {
            line,
            value: value.to_string(),
            source,
        })
}

/// A parsed sequence of sensor commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorScript {
    commands: Vec<SensorCommand>,
}

impl SensorScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    pub fn commands(&self) -> &[SensorCommand] {
        &self.commands
    }

    /// Sum of all waits in the script
    pub fn duration(&self) -> Duration {
        self.commands
            .iter()
            .map(|command| match command {
                SensorCommand::Wait(wait) => *wait,
                _ => Duration::ZERO,
            })
            .sum()
    }

    /// Replay the script against `hub`, sleeping through the waits.
    pub async fn play(&self, hub: &SensorHub) {
        for command in &self.commands {
            match command {
                SensorCommand::Wait(wait) => tokio::time::sleep(*wait).await,
                other => other.apply(hub),
            }
        }
    }
}

impl FromStr for SensorScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut commands = Vec::new();
        for (index, text) in s.lines().enumerate() {
            if let Some(command) = SensorCommand::parse_line(index + 1, text)? {
                commands.push(command);
            }
        }
        Ok(Self { commands })
    }
}
