//! Error types.

use std::io;
use std::path::PathBuf;

pub type Result<T> = core::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("failed to read config file {}: {source}", .path.display())]
    ConfigRead { path: PathBuf, source: io::Error },
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("unknown experiment '{name}'{hint}")]
    UnknownExperiment { name: String, hint: String },
    #[error("experiment '{experiment}': unknown custom callable '{name}'. available: {available}")]
    UnknownCallable {
        experiment: String,
        name: String,
        available: String,
    },

    #[error("failed to encode run plan: {0}")]
    PlanEncode(#[from] toml::ser::Error),

    #[error("failed to start runner '{program}': {source}")]
    RunnerSpawn { program: String, source: io::Error },
    #[error("runner '{program}' failed ({})", exit_status(.code))]
    RunnerFailed { program: String, code: Option<i32> },

    #[error("failed installing interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Process exit code to report for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(e) => e.exit_code(),
            Error::RunnerFailed { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_failure_propagates_child_code() {
        let e = Error::RunnerFailed {
            program: "flow".to_string(),
            code: Some(3),
        };
        assert_eq!(e.exit_code(), 3);
        assert_eq!(e.to_string(), "runner 'flow' failed (exit code 3)");
    }

    #[test]
    fn signalled_runner_exits_with_one() {
        let e = Error::RunnerFailed {
            program: "flow".to_string(),
            code: None,
        };
        assert_eq!(e.exit_code(), 1);
        assert!(e.to_string().contains("terminated by signal"));
    }
}
