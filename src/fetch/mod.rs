//! The fetch pipeline: transport seam, event collector, and per-attempt lifecycle.
//!
//! One attempt owns one IMAP session. The transport pushes per-message
//! events into a single channel read by [`collector::FetchCollector`], which
//! also receives decode completions on that channel and is the only owner
//! of the join state.

pub mod collector;
pub mod imap;
pub mod lifecycle;
pub mod transport;

use tokio::sync::mpsc;

use crate::error::{MailError, Result};
use crate::model::email::ParsedEmail;

/// Everything the collector reacts to, in arrival order.
#[derive(Debug)]
pub(crate) enum CollectorEvent {
    MessageStarted(u32),
    BodyChunk(u32, Vec<u8>),
    MessageEnded(u32),
    FetchEnded,
    FetchError(MailError),
    Decoded(ParsedEmail),
}

/// Producer side of a collector's channel, handed to the transport.
///
/// Transports may only report message events; fetch completion is signalled
/// by the lifecycle once the transport's fetch call returns.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<CollectorEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<CollectorEvent>) -> Self {
        Self { tx }
    }

    /// A new message with sequence number `seq` begins.
    pub fn message_started(&self, seq: u32) -> Result<()> {
        self.send(CollectorEvent::MessageStarted(seq))
    }

    /// Next slice of the raw body of message `seq`, in order.
    pub fn body_chunk(&self, seq: u32, bytes: Vec<u8>) -> Result<()> {
        self.send(CollectorEvent::BodyChunk(seq, bytes))
    }

    /// All bytes of message `seq` have been delivered.
    pub fn message_ended(&self, seq: u32) -> Result<()> {
        self.send(CollectorEvent::MessageEnded(seq))
    }

    pub(crate) fn fetch_ended(&self) -> Result<()> {
        self.send(CollectorEvent::FetchEnded)
    }

    pub(crate) fn fetch_failed(&self, error: MailError) -> Result<()> {
        self.send(CollectorEvent::FetchError(error))
    }

    fn send(&self, event: CollectorEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| MailError::Transport("collector is no longer receiving".into()))
    }
}
