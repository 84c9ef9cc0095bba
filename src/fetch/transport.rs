//! Seam between the fetch lifecycle and a concrete mail protocol client.

use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;
use crate::fetch::EventSender;
use crate::model::window::SequenceWindow;

/// Opens authenticated sessions against one server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: MailSession;

    /// Connect and log in. Fails with [`crate::error::MailError::Connect`].
    async fn connect(&self, credentials: &Credentials) -> Result<Self::Session>;
}

/// One authenticated session.
#[async_trait]
pub trait MailSession: Send {
    /// Open `mailbox` read-only and return its message count.
    async fn examine(&mut self, mailbox: &str) -> Result<u32>;

    /// Fetch every message in `window`, reporting each through `events`.
    ///
    /// Returns once the server has finished the fetch. Completion and failure
    /// are signalled to the collector by the caller, not by the session.
    async fn fetch(&mut self, window: SequenceWindow, events: &EventSender) -> Result<()>;

    /// Log out. Called at most once per session.
    async fn close(&mut self) -> Result<()>;
}
