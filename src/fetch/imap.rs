//! IMAP transport over `async-imap`, plain TCP or implicit TLS.

use std::fmt::Debug;

use async_imap::Session;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::{mask_user, Credentials, ImapConfig};
use crate::error::{MailError, Result};
use crate::fetch::transport::{Connector, MailSession};
use crate::fetch::EventSender;
use crate::model::window::SequenceWindow;

/// Full message source without touching `\Seen`.
const FETCH_QUERY: &str = "(BODY.PEEK[] BODYSTRUCTURE)";

/// Body bytes forwarded to the collector per event.
const CHUNK_SIZE: usize = 16 * 1024;

/// Byte stream under an IMAP session, TLS or not.
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> SessionStream for T {}

/// Connects to the configured IMAP server.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    host: String,
    port: u16,
    tls: bool,
    accept_invalid_certs: bool,
}

impl ImapConnector {
    pub fn from_config(config: &ImapConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            tls: config.tls,
            accept_invalid_certs: config.accept_invalid_certs,
        }
    }

    fn connect_error(&self, reason: impl ToString) -> MailError {
        MailError::connect(&self.host, self.port, reason)
    }

    async fn open_stream(&self) -> Result<Box<dyn SessionStream>> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| self.connect_error(e))?;
        if !self.tls {
            return Ok(Box::new(tcp));
        }

        let tls = tokio_native_tls::native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| self.connect_error(e))?;
        let stream = tokio_native_tls::TlsConnector::from(tls)
            .connect(&self.host, tcp)
            .await
            .map_err(|e| self.connect_error(format!("TLS handshake failed: {e}")))?;
        Ok(Box::new(stream))
    }
}

#[async_trait]
impl Connector for ImapConnector {
    type Session = ImapSession;

    async fn connect(&self, credentials: &Credentials) -> Result<ImapSession> {
        info!(
            host = %self.host,
            port = self.port,
            tls = self.tls,
            user = %mask_user(&credentials.user),
            "Connecting to IMAP server"
        );
        let stream = self.open_stream().await?;

        let client = async_imap::Client::new(stream);
        let session = client
            .login(&credentials.user, &credentials.password)
            .await
            .map_err(|(e, _)| self.connect_error(format!("login rejected: {e}")))?;
        debug!(host = %self.host, "Logged in");
        Ok(ImapSession { session })
    }
}

/// An authenticated `async-imap` session.
pub struct ImapSession {
    session: Session<Box<dyn SessionStream>>,
}

#[async_trait]
impl MailSession for ImapSession {
    async fn examine(&mut self, mailbox: &str) -> Result<u32> {
        let opened = self
            .session
            .examine(mailbox)
            .await
            .map_err(|e| MailError::mailbox(mailbox, e))?;
        debug!(mailbox, exists = opened.exists, "Mailbox opened read-only");
        Ok(opened.exists)
    }

    async fn fetch(&mut self, window: SequenceWindow, events: &EventSender) -> Result<()> {
        let fetches = self
            .session
            .fetch(window.to_sequence_set(), FETCH_QUERY)
            .await
            .map_err(|e| MailError::Transport(format!("FETCH {window} failed: {e}")))?;
        futures::pin_mut!(fetches);

        while let Some(item) = fetches.next().await {
            let fetch = item.map_err(|e| MailError::Transport(format!("FETCH stream: {e}")))?;
            let seq = fetch.message;
            events.message_started(seq)?;
            if let Some(body) = fetch.body() {
                for chunk in body.chunks(CHUNK_SIZE) {
                    events.body_chunk(seq, chunk.to_vec())?;
                }
            }
            events.message_ended(seq)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| MailError::Transport(format!("LOGOUT failed: {e}")))
    }
}
