//! Error taxonomy for roster generation and screen navigation.

use std::path::PathBuf;

use thiserror::Error;

use crate::navigator::Screen;

/// Rejected configuration: fatal at generation or navigator construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unrecognized game_id {id}. Must be one of {supported}")]
    UnknownVariant { id: String, supported: String },

    #[error("Unrecognized army label {0:?}. Must be Allied or Axis")]
    UnknownArmy(String),

    #[error("{0}")]
    InvalidUnitCount(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scenario config: {0}")]
    Malformed(String),

    #[error("force data {path}: {message}")]
    ForceData { path: PathBuf, message: String },
}

/// OCR backend failure.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to write OCR scratch image {path}: {message}")]
    Scratch { path: PathBuf, message: String },
}

/// Capture or pointer backend failure.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("failed to decode screen capture: {0}")]
    Decode(String),

    #[error("failed to persist screenshot {path}: {message}")]
    Persist { path: PathBuf, message: String },
}

/// Anything that aborts a population run.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("screen state error: requires {required}, currently on {actual}")]
    ScreenState { required: Screen, actual: Screen },

    #[error("target not found: {target:?} ({reason})")]
    TargetNotFound { target: String, reason: String },

    #[error("cannot derive a reinforcement index from wave {wave:?}")]
    InvalidWave { wave: String },

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Input(#[from] DriverError),

    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<NavError>,
    },
}

impl NavError {
    pub fn not_found(target: &str, reason: impl Into<String>) -> Self {
        NavError::TargetNotFound {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    /// Tag the error with the roster step being processed. Only the innermost
    /// step is kept; outer steps are already part of its label.
    pub fn at(self, step: impl Into<String>) -> Self {
        match self {
            NavError::Step { .. } => self,
            other => NavError::Step {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying failure with any step tags removed.
    #[cfg(test)]
    pub fn root(&self) -> &NavError {
        match self {
            NavError::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_state_message_names_both_screens() {
        let err = NavError::ScreenState {
            required: Screen::ScenarioEditor,
            actual: Screen::UnitEditor,
        };
        let text = err.to_string();
        assert!(text.contains("Scenario Editor"));
        assert!(text.contains("Unit Editor"));
    }

    #[test]
    fn step_tag_keeps_innermost_label() {
        let err = NavError::not_found("Rifle Platoon", "no candidates")
            .at("unit Rifle Platoon")
            .at("nation German");
        assert_eq!(
            err.to_string(),
            "unit Rifle Platoon: target not found: \"Rifle Platoon\" (no candidates)"
        );
        assert!(matches!(err.root(), NavError::TargetNotFound { .. }));
    }
}
