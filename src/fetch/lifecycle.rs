//! One fetch attempt: connect, open the mailbox, fetch the window, drain decodes.
//!
//! Every exit path, including cancellation, closes the session before the
//! attempt settles.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::error::{MailError, Result};
use crate::fetch::collector::FetchCollector;
use crate::fetch::transport::{Connector, MailSession};
use crate::model::email::ParsedEmail;
use crate::model::window::{FetchRequest, SequenceWindow};
use crate::parser::Decode;

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Connecting,
    MailboxOpening,
    Fetching,
    Draining,
    Settled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Connecting => "connecting",
            LifecycleState::MailboxOpening => "opening mailbox",
            LifecycleState::Fetching => "fetching",
            LifecycleState::Draining => "draining",
            LifecycleState::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// Logs transitions; settles once.
#[derive(Debug)]
struct Tracker {
    state: LifecycleState,
}

impl Tracker {
    fn new() -> Self {
        debug!(state = %LifecycleState::Connecting, "Attempt started");
        Self {
            state: LifecycleState::Connecting,
        }
    }

    fn enter(&mut self, next: LifecycleState) {
        if self.state == LifecycleState::Settled {
            return;
        }
        debug!(from = %self.state, to = %next, "Attempt state");
        self.state = next;
    }
}

/// Owns a session and closes it at most once.
struct SessionGuard<S> {
    session: S,
    open: bool,
}

impl<S: MailSession> SessionGuard<S> {
    async fn close(&mut self, grace: Duration) {
        if !self.open {
            return;
        }
        self.open = false;
        match tokio::time::timeout(grace, self.session.close()).await {
            Ok(Ok(())) => debug!("Session closed"),
            Ok(Err(e)) => debug!(error = %e, "Logout failed, dropping connection"),
            Err(_) => warn!(?grace, "Logout timed out, dropping connection"),
        }
    }
}

/// Aborts the collector if the attempt exits before draining it.
struct CollectorTask(JoinHandle<Result<Vec<ParsedEmail>>>);

impl Drop for CollectorTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Everything one attempt needs besides the request itself.
pub struct FetchAttempt<'a, C, D> {
    pub connector: &'a C,
    pub credentials: &'a Credentials,
    pub mailbox: &'a str,
    pub decoder: Arc<D>,
    /// Upper bound on a logout before the connection is simply dropped.
    pub logout_grace: Duration,
}

impl<C, D> FetchAttempt<'_, C, D>
where
    C: Connector,
    D: Decode + 'static,
{
    /// Fetch and decode the newest `request.limit` messages.
    ///
    /// An empty mailbox (or a zero limit) yields an empty list without
    /// issuing a fetch. Cancelling `cancel` makes the attempt close its
    /// session and return [`MailError::Cancelled`].
    pub async fn fetch_window(
        &self,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParsedEmail>> {
        let mut tracker = Tracker::new();

        let session = until_cancelled(cancel, self.connector.connect(self.credentials)).await;
        let mut guard = match session {
            Ok(session) => SessionGuard {
                session,
                open: true,
            },
            Err(e) => {
                tracker.enter(LifecycleState::Settled);
                return Err(e);
            }
        };

        let outcome = self.drive(&mut guard, &mut tracker, request, cancel).await;
        guard.close(self.logout_grace).await;
        tracker.enter(LifecycleState::Settled);
        outcome
    }

    async fn drive(
        &self,
        guard: &mut SessionGuard<C::Session>,
        tracker: &mut Tracker,
        request: FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParsedEmail>> {
        tracker.enter(LifecycleState::MailboxOpening);
        let total = until_cancelled(cancel, guard.session.examine(self.mailbox)).await?;

        let Some(window) = SequenceWindow::latest(total, request.limit) else {
            info!(mailbox = self.mailbox, total, "Nothing to fetch");
            return Ok(Vec::new());
        };

        tracker.enter(LifecycleState::Fetching);
        info!(mailbox = self.mailbox, total, %window, "Fetching window");
        let (collector, events) = FetchCollector::channel(Arc::clone(&self.decoder));
        let mut task = CollectorTask(tokio::spawn(collector.run()));

        match until_cancelled(cancel, guard.session.fetch(window, &events)).await {
            Ok(()) => {
                let _ = events.fetch_ended();
            }
            Err(MailError::Cancelled) => return Err(MailError::Cancelled),
            Err(e) => {
                let _ = events.fetch_failed(e);
            }
        }
        drop(events);

        // The stream is done; the connection is not needed for decoding.
        guard.close(self.logout_grace).await;

        tracker.enter(LifecycleState::Draining);
        until_cancelled(cancel, async {
            (&mut task.0)
                .await
                .map_err(|e| MailError::Transport(format!("collector task failed: {e}")))
        })
        .await?
    }
}

/// Run `fut` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MailError::Cancelled),
        res = fut => res,
    }
}
