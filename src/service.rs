//! Public entry point: recent messages from the configured mailbox, with
//! per-attempt timeouts and retries.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{mask_user, Config, FetchConfig, ImapConfig};
use crate::error::{MailError, Result};
use crate::fetch::imap::ImapConnector;
use crate::fetch::lifecycle::FetchAttempt;
use crate::fetch::transport::Connector;
use crate::model::email::ParsedEmail;
use crate::model::window::FetchRequest;
use crate::parser::{Decode, MessageDecoder};

/// What a request for recent messages came back with.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Newest first.
    Messages(Vec<ParsedEmail>),
    /// The server answered and there was nothing to return.
    Empty,
    /// Every attempt failed.
    Unavailable { attempts: u32, last_error: MailError },
    /// No credentials; the server was never contacted.
    NotConfigured,
}

impl FetchOutcome {
    /// Flatten to a list; anything but `Messages` is empty.
    pub fn into_messages(self) -> Vec<ParsedEmail> {
        match self {
            FetchOutcome::Messages(list) => list,
            _ => Vec::new(),
        }
    }

    /// Short machine-readable label.
    pub fn status(&self) -> &'static str {
        match self {
            FetchOutcome::Messages(_) => "ok",
            FetchOutcome::Empty => "empty",
            FetchOutcome::Unavailable { .. } => "unavailable",
            FetchOutcome::NotConfigured => "not_configured",
        }
    }
}

/// Configuration summary safe to show or log.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub configured: bool,
    pub masked_user: Option<String>,
    pub host: String,
    pub port: u16,
    pub mailbox: String,
}

/// Fetches recent mail through a [`Connector`], retrying failed attempts.
pub struct MailboxService<C, D = MessageDecoder> {
    imap: ImapConfig,
    policy: FetchConfig,
    connector: C,
    decoder: Arc<D>,
}

impl MailboxService<ImapConnector> {
    /// Service talking to the configured IMAP server.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            ImapConnector::from_config(&config.imap),
            MessageDecoder::new(),
        )
    }
}

impl<C, D> MailboxService<C, D>
where
    C: Connector,
    D: Decode + 'static,
{
    pub fn new(config: &Config, connector: C, decoder: D) -> Self {
        Self {
            imap: config.imap.clone(),
            policy: config.fetch.clone(),
            connector,
            decoder: Arc::new(decoder),
        }
    }

    /// Whether credentials are present, without revealing them.
    pub fn config_status(&self) -> ConfigStatus {
        ConfigStatus {
            configured: self.imap.is_configured(),
            masked_user: self.imap.user.as_deref().map(mask_user),
            host: self.imap.host.clone(),
            port: self.imap.port,
            mailbox: self.imap.mailbox.clone(),
        }
    }

    /// Up to `limit` most recent messages, newest first.
    ///
    /// Never fails: an unconfigured service or a server that stays
    /// unreachable yields an empty list. Use [`Self::fetch_recent`] to tell
    /// those cases apart.
    pub async fn get_recent_messages(&self, limit: u32) -> Vec<ParsedEmail> {
        self.fetch_recent(limit).await.into_messages()
    }

    /// Like [`Self::get_recent_messages`], but says why a list is empty.
    pub async fn fetch_recent(&self, limit: u32) -> FetchOutcome {
        let Some(credentials) = self.imap.credentials() else {
            warn!("IMAP credentials not configured, returning no messages");
            return FetchOutcome::NotConfigured;
        };

        let request = FetchRequest::new(limit);
        let attempt = FetchAttempt {
            connector: &self.connector,
            credentials: &credentials,
            mailbox: &self.imap.mailbox,
            decoder: Arc::clone(&self.decoder),
            logout_grace: self.policy.teardown_grace(),
        };
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt_no = 1;
        loop {
            info!(
                attempt = attempt_no,
                max_attempts,
                limit,
                host = %self.imap.host,
                "Fetching recent messages"
            );
            match self.run_attempt(&attempt, request).await {
                Ok(list) if list.is_empty() => {
                    info!(attempt = attempt_no, "Mailbox has no messages to return");
                    return FetchOutcome::Empty;
                }
                Ok(list) => {
                    info!(attempt = attempt_no, count = list.len(), "Fetched messages");
                    return FetchOutcome::Messages(list);
                }
                Err(e) if attempt_no < max_attempts => {
                    let backoff = self.policy.retry_backoff();
                    warn!(
                        attempt = attempt_no,
                        max_attempts,
                        error = %e,
                        ?backoff,
                        "Fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt_no += 1;
                }
                Err(e) => {
                    error!(attempts = attempt_no, error = %e, "All fetch attempts failed");
                    return FetchOutcome::Unavailable {
                        attempts: attempt_no,
                        last_error: e,
                    };
                }
            }
        }
    }

    /// One attempt under the configured time budget.
    ///
    /// On timeout the attempt is cancelled and given the teardown grace to
    /// close its session; whatever it produces after that is discarded.
    async fn run_attempt(
        &self,
        attempt: &FetchAttempt<'_, C, D>,
        request: FetchRequest,
    ) -> Result<Vec<ParsedEmail>> {
        let cancel = CancellationToken::new();
        let budget = self.policy.attempt_timeout();
        let work = attempt.fetch_window(request, &cancel);
        tokio::pin!(work);

        tokio::select! {
            res = &mut work => res,
            _ = tokio::time::sleep(budget) => {
                warn!(?budget, "Fetch attempt timed out, closing its session");
                cancel.cancel();
                let grace: Duration = self.policy.teardown_grace();
                if tokio::time::timeout(grace, &mut work).await.is_err() {
                    warn!(?grace, "Session teardown exceeded grace period, abandoning it");
                }
                Err(MailError::Timeout(budget))
            }
        }
    }
}
