//! Custom error types for the DHCP sync daemon
//!
//! This module defines the error taxonomy of the synchronization loop. Startup
//! errors are fatal; fetch, read, write and reload errors are logged and the loop
//! carries on with the next poll.

use std::fmt;

/// Main error type for the DHCP sync daemon
#[derive(Debug)]
pub enum SyncError {
    /// Error occurred while reading the configuration file
    ConfigRead(std::io::Error),

    /// Error occurred while parsing the configuration file
    ConfigParse(json5::Error),

    /// A required configuration value is absent or empty
    ConfigMissing(&'static str),

    /// A configuration value is present but unusable
    ConfigInvalid(String),

    /// The inventory request failed before a response was received
    Http(reqwest::Error),

    /// The inventory answered with a non-success status
    HttpStatus(reqwest::StatusCode),

    /// The inventory answered with something other than plain text
    UnexpectedContentType(String),

    /// The export body could not be decoded
    InvalidBody(String),

    /// The export contained no host reservations
    NoReservations,

    /// Error occurred while reading the current generated configuration
    Read(std::io::Error),

    /// Error occurred while writing the generated configuration
    Write(std::io::Error),

    /// A service control command could not be run or exited unsuccessfully
    Command {
        /// The command line that was executed
        command: String,
        /// Exit code, if the process ran to completion
        code: Option<i32>,
        /// Captured standard error or the spawn failure
        detail: String,
    },

    /// Generic error with a message
    Generic(String),
}

impl SyncError {
    /// Returns `true` for errors raised while fetching or validating the export.
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            SyncError::Http(_)
                | SyncError::HttpStatus(_)
                | SyncError::UnexpectedContentType(_)
                | SyncError::InvalidBody(_)
                | SyncError::NoReservations
        )
    }

    /// Returns `true` for configuration errors detected at startup.
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            SyncError::ConfigRead(_)
                | SyncError::ConfigParse(_)
                | SyncError::ConfigMissing(_)
                | SyncError::ConfigInvalid(_)
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::ConfigRead(e) => {
                write!(f, "Failed to read configuration file: {e}")
            }
            SyncError::ConfigParse(e) => {
                write!(f, "Failed to parse configuration: {e}")
            }
            SyncError::ConfigMissing(key) => {
                write!(f, "Configuration error: {key} is not defined")
            }
            SyncError::ConfigInvalid(msg) => {
                write!(f, "Configuration error: {msg}")
            }
            SyncError::Http(e) => {
                if e.is_timeout() {
                    write!(f, "Inventory API call timed out: {e}")
                } else {
                    write!(f, "Inventory API call failed: {e}")
                }
            }
            SyncError::HttpStatus(status) => {
                write!(f, "Inventory API responded with error status: {status}")
            }
            SyncError::UnexpectedContentType(ctype) => {
                write!(f, "Unexpected content-type: {ctype}")
            }
            SyncError::InvalidBody(msg) => {
                write!(f, "Invalid inventory export body: {msg}")
            }
            SyncError::NoReservations => {
                write!(f, "No DHCP reservations in inventory response")
            }
            SyncError::Read(e) => {
                write!(f, "Failed to read current DHCP configuration: {e}")
            }
            SyncError::Write(e) => {
                write!(f, "Failed to write DHCP configuration: {e}")
            }
            SyncError::Command {
                command,
                code,
                detail,
            } => match code {
                Some(code) => write!(
                    f,
                    "Command '{command}' failed with exit code {code}: {detail}"
                ),
                None => write!(f, "Command '{command}' failed: {detail}"),
            },
            SyncError::Generic(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::ConfigRead(e) | SyncError::Read(e) | SyncError::Write(e) => Some(e),
            SyncError::ConfigParse(e) => Some(e),
            SyncError::Http(e) => Some(e),
            SyncError::ConfigMissing(_)
            | SyncError::ConfigInvalid(_)
            | SyncError::HttpStatus(_)
            | SyncError::UnexpectedContentType(_)
            | SyncError::InvalidBody(_)
            | SyncError::NoReservations
            | SyncError::Command { .. }
            | SyncError::Generic(_) => None,
        }
    }
}

impl From<json5::Error> for SyncError {
    fn from(error: json5::Error) -> Self {
        SyncError::ConfigParse(error)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::Http(error)
    }
}

impl From<&str> for SyncError {
    fn from(msg: &str) -> Self {
        SyncError::Generic(msg.to_string())
    }
}

impl From<String> for SyncError {
    fn from(msg: String) -> Self {
        SyncError::Generic(msg)
    }
}

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        assert!(SyncError::NoReservations.is_fetch_error());
        assert!(
            SyncError::HttpStatus(reqwest::StatusCode::INTERNAL_SERVER_ERROR).is_fetch_error()
        );
        assert!(SyncError::UnexpectedContentType("text/html".to_string()).is_fetch_error());
        assert!(!SyncError::ConfigMissing("api_token").is_fetch_error());
        assert!(!SyncError::Write(std::io::Error::other("disk full")).is_fetch_error());
    }

    #[test]
    fn test_startup_error_classification() {
        assert!(SyncError::ConfigMissing("inventory_url").is_startup_error());
        assert!(SyncError::ConfigInvalid("bad".to_string()).is_startup_error());
        assert!(!SyncError::NoReservations.is_startup_error());
    }

    #[test]
    fn test_command_error_display() {
        let err = SyncError::Command {
            command: "dhcpd -t".to_string(),
            code: Some(1),
            detail: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'dhcpd -t' failed with exit code 1: syntax error"
        );

        let err = SyncError::Command {
            command: "systemctl restart dhcpd.service".to_string(),
            code: None,
            detail: "killed by signal".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'systemctl restart dhcpd.service' failed: killed by signal"
        );
    }

    #[test]
    fn test_generic_from_str() {
        let err = SyncError::from("boom");
        assert_eq!(err.to_string(), "Error: boom");
    }
}
