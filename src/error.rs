use std::path::PathBuf;
use thiserror::Error;

use crate::action::ActionKind;

/// A snapshot or decision point the engine refuses to act on.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("unknown phase {0:?}")]
    UnknownPhase(String),
    #[error("malformed {phase} phase: {message}")]
    MalformedPhase { phase: &'static str, message: String },
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("player {player} cannot {command} during {phase}")]
    IllegalCommand {
        player: usize,
        command: String,
        phase: &'static str,
    },
    #[error("player {player} cannot afford {action:?}")]
    CannotAfford { player: usize, action: ActionKind },
    #[error("{action:?} needs a valid target")]
    InvalidTarget { action: ActionKind },
    #[error("the game is over")]
    GameOver,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command for version {sent} rejected, current version is {current}")]
    Stale { sent: u64, current: u64 },
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat service unavailable")]
    Unavailable,
    #[error("chat service failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
