//! `mailwindow`: recent mail from an IMAP mailbox, decoded for display.
//!
//! The library fetches the newest messages of one mailbox read-only,
//! decodes each one with a layered fallback so that every fetched message
//! yields a record, and retries whole attempts under a time budget.

pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod service;
