// src/errors.rs

//! Crate-wide error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The record source could not be read; nothing was built or executed.
    #[error("record source error: {0}")]
    Source(#[source] anyhow::Error),

    #[error("dependency '{parent}' -> '{child}' references unknown resource '{missing}'")]
    UnknownReference {
        parent: String,
        child: String,
        missing: String,
    },

    #[error("cyclic dependencies detected: {}", format_cycles(.cycles))]
    CyclicDependency { cycles: Vec<Vec<String>> },

    #[error(
        "scheduling incomplete: failed {failed:?}, blocked {blocked:?}, not started {not_started:?}"
    )]
    Incomplete {
        failed: Vec<String>,
        blocked: Vec<String>,
        not_started: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by a single resource's creation operation.
///
/// Local to that resource: it ends up as the resource's `Error` status and
/// blocks its dependents, but never aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("creation of '{key}' failed{}: {message}", exit_suffix(.exit_code))]
pub struct CreationError {
    pub key: String,
    pub message: String,
    /// Process exit code, when the creation ran an external command.
    pub exit_code: Option<i32>,
}

impl CreationError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {code})"),
        None => String::new(),
    }
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| format!("[{}]", c.join(" -> ")))
        .collect::<Vec<_>>()
        .join(", ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_error_lists_every_cycle() {
        let err = SchedulerError::CyclicDependency {
            cycles: vec![
                vec!["pod/a".to_string(), "pod/b".to_string()],
                vec!["pod/c".to_string(), "pod/c".to_string()],
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("[pod/a -> pod/b]"));
        assert!(msg.contains("[pod/c -> pod/c]"));
    }

    #[test]
    fn creation_error_mentions_exit_code() {
        let err = CreationError::new("job/migrate", "command failed").with_exit_code(3);
        assert_eq!(
            err.to_string(),
            "creation of 'job/migrate' failed (exit code 3): command failed"
        );
    }
}
