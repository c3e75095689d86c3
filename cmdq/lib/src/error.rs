//! Error types for the command queue library.

use thiserror::Error;

/// Errors describing why a single command did not succeed.
///
/// These are never raised out of the engine. They travel as data inside a
/// [`CommandOutput`](crate::CommandOutput) to the entry's result handler and
/// to `command-done` listeners.
#[derive(Debug, Error)]
pub enum RunError {
    /// The shell could not be started (missing binary, bad working
    /// directory, permissions).
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        /// The command that was being launched.
        command: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully.
    #[error("`{command}` failed ({})", describe_exit(.code, .signal))]
    NonZeroExit {
        /// The command that failed.
        command: String,
        /// The exit code, when the process exited normally.
        code: Option<i32>,
        /// The terminating signal, when the process was killed (unix only).
        signal: Option<i32>,
    },

    /// The task driving the command panicked or was aborted before reporting.
    #[error("command task for `{command}` did not finish: {message}")]
    Join {
        /// The command whose task was lost.
        command: String,
        /// Description of the join failure.
        message: String,
    },
}

impl RunError {
    /// Returns the exit code, if the command ran far enough to produce one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns the terminating signal, if any.
    pub fn signal(&self) -> Option<i32> {
        match self {
            RunError::NonZeroExit { signal, .. } => *signal,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("killed by signal {signal}"),
        (None, None) => "unknown exit status".to_string(),
    }
}

/// Errors raised while constructing or configuring a queue engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Engines need a name to tag their events with.
    #[error("queue name cannot be empty")]
    EmptyName,

    /// The requested scheduling mode is not recognised.
    #[error("unknown queue mode `{0}` (expected sequential or concurrent)")]
    InvalidMode(String),

    /// The event name is not one of the five lifecycle events.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

/// Errors that can occur when loading a console theme.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Failed to read the theme file.
    #[error("failed to read theme: {0}")]
    Read(#[from] std::io::Error),

    /// The theme file is not a JSON object of role names to color names.
    #[error("failed to parse theme: {0}")]
    Parse(#[from] serde_json::Error),

    /// A role was mapped to a color this crate does not know.
    #[error("unknown color `{color}` for role `{role}`")]
    UnknownColor {
        /// The role being configured.
        role: String,
        /// The unrecognised color name.
        color: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_message_includes_code() {
        let err = RunError::NonZeroExit {
            command: "false".to_string(),
            code: Some(1),
            signal: None,
        };
        assert_eq!(err.to_string(), "`false` failed (exit code 1)");
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.signal(), None);
    }

    #[test]
    fn non_zero_exit_message_falls_back_to_signal() {
        let err = RunError::NonZeroExit {
            command: "sleep 100".to_string(),
            code: None,
            signal: Some(9),
        };
        assert!(err.to_string().contains("killed by signal 9"));
        assert_eq!(err.signal(), Some(9));
    }

    #[test]
    fn launch_error_keeps_source() {
        use std::error::Error as _;

        let err = RunError::Launch {
            command: "ls".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        };
        assert!(err.to_string().contains("failed to launch `ls`"));
        assert!(err.source().is_some());
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(ConfigError::EmptyName.to_string(), "queue name cannot be empty");
        assert!(
            ConfigError::InvalidMode("fast".to_string())
                .to_string()
                .contains("`fast`")
        );
    }
}
