//! Errors raised while talking to the remote server.

use std::fmt;

/// A fault returned by the remote peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Last two lines of the message (the tail of a server traceback), joined.
    pub fn summary(&self) -> String {
        let lines: Vec<&str> = self.message.split('\n').collect();
        let start = lines.len().saturating_sub(2);
        lines[start..].concat()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.summary())
    }
}

/// Errors that can occur while establishing or using a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// A required connection parameter is missing from the configuration.
    MissingConnectionInfo(&'static str),
    /// Network or HTTP level failure.
    Transport(String),
    /// The peer answered with something that is not a valid XML-RPC response.
    Protocol(String),
    /// The peer answered with a fault.
    Fault(Fault),
    /// Credentials were rejected.
    AuthenticationRefused { username: String },
    /// The server version could not be read or is too old.
    UnsupportedVersion(String),
    /// An operation was attempted after the handshake failed.
    NotConnected,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::MissingConnectionInfo(key) => {
                write!(f, "no connection information provided (missing '{}')", key)
            }
            ConnectionError::Transport(msg) => write!(f, "transport error: {}", msg),
            ConnectionError::Protocol(msg) => write!(f, "malformed response: {}", msg),
            ConnectionError::Fault(fault) => write!(f, "{}", fault),
            ConnectionError::AuthenticationRefused { username } => {
                write!(f, "not able to connect with given information, username: {}", username)
            }
            ConnectionError::UnsupportedVersion(version) => write!(f, "unsupported server version: {}", version),
            ConnectionError::NotConnected => write!(f, "not connected to the server"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<Fault> for ConnectionError {
    fn from(fault: Fault) -> Self {
        ConnectionError::Fault(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_summary_keeps_last_two_lines() {
        let fault = Fault::new("2", "Traceback\n  File x\nValidationError:\n bad partner");
        assert_eq!(fault.summary(), "ValidationError: bad partner");
    }

    #[test]
    fn test_fault_summary_single_line() {
        let fault = Fault::new("1", "Access denied");
        assert_eq!(fault.summary(), "Access denied");
        assert_eq!(fault.to_string(), "fault 1: Access denied");
    }

    #[test]
    fn test_missing_info_message() {
        let err = ConnectionError::MissingConnectionInfo("odoo_host");
        assert!(err.to_string().contains("odoo_host"));
    }
}
