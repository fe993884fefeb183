//! Error types for tailwatch operations.
//!
//! This module provides the error hierarchy, built with `thiserror`, for
//! capture database access, file I/O, external commands and configuration.

use thiserror::Error;

/// Result type alias for tailwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Kismet capture database errors.
    #[error("kismet error: {0}")]
    Kismet(#[from] KismetError),

    /// File system failures.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command and external process errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Unreadable or out-of-range configuration.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong, naming the offending key where known.
        message: String,
    },

    /// Malformed input data (event logs, GPS files, ignore lists).
    #[error("invalid data: {message}")]
    InvalidData {
        /// Description of what was wrong with the data.
        message: String,
    },
}

/// Errors raised while reading Kismet capture databases.
#[derive(Error, Debug)]
pub enum KismetError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// No capture file matched the configured pattern.
    #[error("no Kismet database files found at: {pattern}")]
    NoCaptures {
        /// Pattern that was searched.
        pattern: String,
    },

    /// The capture does not look like a Kismet database.
    #[error("database validation failed: {0}")]
    Validation(String),

    /// The capture pattern could not be turned into a matcher.
    #[error("invalid capture pattern: {0}")]
    Pattern(String),
}

/// Failures touching logs, lists, reports and other files.
#[derive(Error, Debug)]
pub enum IoError {
    /// An explicitly named input does not exist.
    #[error("no such file: {path}")]
    FileNotFound {
        /// Missing path.
        path: String,
    },

    /// Reading failed.
    #[error("cannot read {path}: {reason}")]
    ReadFailed {
        /// File being read.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// Writing or appending failed.
    #[error("cannot write {path}: {reason}")]
    WriteFailed {
        /// File being written.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// An output directory could not be created.
    #[error("cannot create directory {path}: {reason}")]
    DirectoryFailed {
        /// Directory being created.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// Any other `std::io` failure, such as writing to a closed stdout.
    #[error("{0}")]
    Generic(String),
}

/// CLI command and external process errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An external program could not be started.
    #[error("failed to run {program}: {reason}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Reason for failure.
        reason: String,
    },

    /// The display server never answered.
    #[error("display {display} not available after {attempts} attempts")]
    DisplayTimeout {
        /// Display that was polled.
        display: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// The operation was interrupted by a shutdown signal.
    #[error("interrupted")]
    Interrupted,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Kismet(KismetError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for KismetError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData {
            message: err.to_string(),
        }
    }
}

impl From<regex::Error> for KismetError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_kismet_error_display() {
        let err = KismetError::NoCaptures {
            pattern: "/tmp/*.kismet".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no Kismet database files found at: /tmp/*.kismet"
        );

        let err = KismetError::Validation("no devices table".to_string());
        assert!(err.to_string().contains("no devices table"));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::DisplayTimeout {
            display: ":0".to_string(),
            attempts: 20,
        };
        assert_eq!(err.to_string(), "display :0 not available after 20 attempts");

        let err = CommandError::SpawnFailed {
            program: "pgrep".to_string(),
            reason: "not found".to_string(),
        };
        assert!(err.to_string().contains("pgrep"));
    }

    #[test]
    fn test_io_error_names_path() {
        let err = IoError::ReadFailed {
            path: "ignore_lists/mac_list.json".to_string(),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot read ignore_lists/mac_list.json: permission denied"
        );

        let err: Error = IoError::DirectoryFailed {
            path: "surveillance_reports".to_string(),
            reason: "read-only file system".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("I/O error: cannot create directory"));
    }

    #[test]
    fn test_std_io_error_becomes_generic() {
        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = broken.into();
        assert!(matches!(err, Error::Io(IoError::Generic(ref m)) if m == "pipe closed"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Kismet(KismetError::Database(_))));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::InvalidData { .. }));
    }

    #[test]
    #[allow(clippy::invalid_regex)]
    fn test_from_regex_error() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err: KismetError = regex_err.into();
        assert!(matches!(err, KismetError::Pattern(_)));
    }
}
