use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("insufficient data: {have} {unit}, need at least {need}")]
    InsufficientData {
        have: usize,
        need: usize,
        unit: &'static str,
    },

    #[error("{file}: missing required columns {columns:?}")]
    MissingColumns { file: String, columns: Vec<String> },

    #[error("{file} line {line}: {reason}")]
    MalformedRow {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("{what} not found at {path}; run `{upstream}` first")]
    MissingArtifact {
        what: &'static str,
        path: PathBuf,
        upstream: &'static str,
    },

    #[error("unknown position {0}")]
    UnknownPosition(String),
}

impl RoleError {
    pub fn insufficient_events(have: usize, need: usize) -> Self {
        Self::InsufficientData {
            have,
            need,
            unit: "events",
        }
    }

    pub fn insufficient_players(have: usize, need: usize) -> Self {
        Self::InsufficientData {
            have,
            need,
            unit: "players",
        }
    }

    /// Skippable errors drop one record; everything else aborts the run.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}

pub type RoleResult<T> = Result<T, RoleError>;
