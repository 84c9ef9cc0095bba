//! Centralized error types for mailwindow.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors produced while fetching mail.
///
/// None of these reach callers of
/// [`MailboxService::get_recent_messages`](crate::service::MailboxService::get_recent_messages);
/// the service recovers them and reports them through
/// [`FetchOutcome`](crate::service::FetchOutcome) instead.
#[derive(Error, Debug, Clone)]
pub enum MailError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {reason}")]
    Io { path: PathBuf, reason: String },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// TCP, TLS or authentication failed before a session was ready.
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// The mailbox could not be opened.
    #[error("Cannot open mailbox '{mailbox}': {reason}")]
    Mailbox { mailbox: String, reason: String },

    /// The session failed after it was established (fetch stream, socket).
    #[error("Transport error: {0}")]
    Transport(String),

    /// An attempt did not settle within its time budget.
    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The attempt was cancelled from outside and its session torn down.
    #[error("Attempt cancelled")]
    Cancelled,
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: source.to_string(),
        }
    }

    /// Create a `Connect` variant.
    pub fn connect(host: &str, port: u16, reason: impl ToString) -> Self {
        Self::Connect {
            host: host.to_string(),
            port,
            reason: reason.to_string(),
        }
    }

    /// Create a `Mailbox` variant.
    pub fn mailbox(mailbox: &str, reason: impl ToString) -> Self {
        Self::Mailbox {
            mailbox: mailbox.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Reasons a decoding tier gives up and hands over to the next one.
///
/// Internal to [`crate::parser`]; a decode as a whole never fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `mail-parser` found no RFC 5322 envelope in the bytes.
    #[error("no parsable message structure")]
    Unstructured,

    /// Even a lossy text decode leaves nothing but whitespace.
    #[error("no readable text in raw content")]
    NoReadableContent,
}
