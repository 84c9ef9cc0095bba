//! Scriptable in-memory mail server for pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mailwindow::config::{Config, Credentials};
use mailwindow::error::{MailError, Result};
use mailwindow::fetch::transport::{Connector, MailSession};
use mailwindow::fetch::EventSender;
use mailwindow::model::window::SequenceWindow;

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A configured setup with the default retry policy.
pub fn configured() -> Config {
    let mut config = Config::default();
    config.imap.host = "imap.test".to_string();
    config.imap.user = Some("tester@example.com".to_string());
    config.imap.password = Some("secret".to_string());
    config
}

/// A minimal message whose `Date` header is `day` May 2024.
pub fn dated_message(subject: &str, day: u32) -> Vec<u8> {
    format!(
        "From: sender@example.com\r\n\
         To: me@example.com\r\n\
         Subject: {subject}\r\n\
         Date: {day:02} May 2024 10:00:00 +0000\r\n\
         \r\n\
         Body of {subject}\r\n"
    )
    .into_bytes()
}

/// How one connection behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    RefuseConnect,
    FailExamine,
    /// Deliver the first message, start the second, then drop the stream.
    FailMidFetch,
    /// Never answer EXAMINE.
    Hang,
    /// Answer FETCH only after this long.
    SlowFetch(Duration),
}

#[derive(Default)]
struct ServerState {
    mailbox: Vec<Vec<u8>>,
    script: Mutex<VecDeque<Behavior>>,
    windows: Mutex<Vec<SequenceWindow>>,
    connects: AtomicUsize,
    examines: AtomicUsize,
    fetches: AtomicUsize,
    closes: AtomicUsize,
}

/// Fake server; clones share state.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<ServerState>,
}

impl FakeServer {
    /// A server whose mailbox holds `messages`, sequence numbers from 1.
    pub fn with_messages(messages: Vec<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(ServerState {
                mailbox: messages,
                ..ServerState::default()
            }),
        }
    }

    /// Behaviors for successive connections; `Normal` once exhausted.
    pub fn script(self, behaviors: &[Behavior]) -> Self {
        self.state
            .script
            .lock()
            .unwrap()
            .extend(behaviors.iter().copied());
        self
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn examines(&self) -> usize {
        self.state.examines.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<SequenceWindow> {
        self.state.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeServer {
    type Session = FakeSession;

    async fn connect(&self, credentials: &Credentials) -> Result<FakeSession> {
        assert!(!credentials.user.is_empty());
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Behavior::Normal);
        if behavior == Behavior::RefuseConnect {
            return Err(MailError::connect("imap.test", 993, "connection refused"));
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            behavior,
        })
    }
}

pub struct FakeSession {
    state: Arc<ServerState>,
    behavior: Behavior,
}

#[async_trait]
impl MailSession for FakeSession {
    async fn examine(&mut self, mailbox: &str) -> Result<u32> {
        self.state.examines.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::FailExamine => Err(MailError::mailbox(mailbox, "NO no such mailbox")),
            Behavior::Hang => std::future::pending().await,
            _ => Ok(self.state.mailbox.len() as u32),
        }
    }

    async fn fetch(&mut self, window: SequenceWindow, events: &EventSender) -> Result<()> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        self.state.windows.lock().unwrap().push(window);
        if let Behavior::SlowFetch(delay) = self.behavior {
            tokio::time::sleep(delay).await;
        }

        for seq in window.start..=window.end {
            let body = &self.state.mailbox[(seq - 1) as usize];
            events.message_started(seq)?;
            if self.behavior == Behavior::FailMidFetch && seq > window.start {
                return Err(MailError::Transport("connection reset by peer".into()));
            }
            for chunk in body.chunks(7) {
                events.body_chunk(seq, chunk.to_vec())?;
            }
            events.message_ended(seq)?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
