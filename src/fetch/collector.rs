//! Joins streamed message events and asynchronous decodes into one sorted list.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{MailError, Result};
use crate::fetch::{CollectorEvent, EventSender};
use crate::model::email::{sort_newest_first, ParsedEmail};
use crate::parser::Decode;

/// Bytes of one in-flight message.
#[derive(Debug)]
struct MessageStream {
    sequence: u32,
    buffer: Vec<u8>,
}

/// Join state. The result may be produced iff `fetch_ended && pending_decodes == 0`.
///
/// A message is pending from its first event until its decode reports back,
/// so a fetch end that overtakes a message still being received cannot close
/// the join early.
#[derive(Debug, Default)]
struct PendingState {
    pending_decodes: usize,
    fetch_ended: bool,
}

impl PendingState {
    fn is_complete(&self) -> bool {
        self.fetch_ended && self.pending_decodes == 0
    }
}

/// Consumer of one fetch's events.
///
/// Runs as a single task; nothing else touches its state, so no locking is
/// involved. Decodes run on their own tasks and report back through the
/// same channel.
pub struct FetchCollector<D> {
    decoder: Arc<D>,
    rx: mpsc::UnboundedReceiver<CollectorEvent>,
    // Weak so that the channel closes once the transport side and all
    // running decodes are gone.
    decode_tx: mpsc::WeakUnboundedSender<CollectorEvent>,
    streams: HashMap<u32, MessageStream>,
    pending: PendingState,
    results: Vec<ParsedEmail>,
}

impl<D: Decode + 'static> FetchCollector<D> {
    /// Create a collector and the sender feeding it.
    pub fn channel(decoder: Arc<D>) -> (Self, EventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = Self {
            decoder,
            rx,
            decode_tx: tx.downgrade(),
            streams: HashMap::new(),
            pending: PendingState::default(),
            results: Vec::new(),
        };
        (collector, EventSender::new(tx))
    }

    /// Process events until the join completes or the fetch fails.
    ///
    /// Resolves exactly once: with every decoded message sorted newest
    /// first, or with the first fetch error.
    pub async fn run(mut self) -> Result<Vec<ParsedEmail>> {
        while let Some(event) = self.rx.recv().await {
            match event {
                CollectorEvent::MessageStarted(seq) => self.start(seq),
                CollectorEvent::BodyChunk(seq, bytes) => self.append(seq, &bytes),
                CollectorEvent::MessageEnded(seq) => self.finish(seq),
                CollectorEvent::Decoded(email) => {
                    debug!(sequence = email.id, "Decode complete");
                    self.results.push(email);
                    self.pending.pending_decodes = self.pending.pending_decodes.saturating_sub(1);
                }
                CollectorEvent::FetchEnded => {
                    debug!(pending = self.pending.pending_decodes, "Fetch ended");
                    self.pending.fetch_ended = true;
                }
                CollectorEvent::FetchError(err) => {
                    warn!(
                        error = %err,
                        in_flight = self.pending.pending_decodes,
                        "Fetch failed, discarding in-flight messages"
                    );
                    return Err(err);
                }
            }

            if self.pending.is_complete() {
                let mut results = std::mem::take(&mut self.results);
                sort_newest_first(&mut results);
                return Ok(results);
            }
        }

        Err(MailError::Transport(
            "event stream closed before the fetch completed".into(),
        ))
    }

    fn start(&mut self, seq: u32) {
        if self.streams.contains_key(&seq) {
            warn!(sequence = seq, "Duplicate message start ignored");
            return;
        }
        self.streams.insert(
            seq,
            MessageStream {
                sequence: seq,
                buffer: Vec::new(),
            },
        );
        self.pending.pending_decodes += 1;
    }

    fn append(&mut self, seq: u32, bytes: &[u8]) {
        if !self.streams.contains_key(&seq) {
            warn!(sequence = seq, "Body chunk for unannounced message");
            self.start(seq);
        }
        if let Some(stream) = self.streams.get_mut(&seq) {
            stream.buffer.extend_from_slice(bytes);
        }
    }

    fn finish(&mut self, seq: u32) {
        let stream = match self.streams.remove(&seq) {
            Some(stream) => stream,
            None => {
                warn!(sequence = seq, "End of unannounced message, decoding it as empty");
                self.pending.pending_decodes += 1;
                MessageStream {
                    sequence: seq,
                    buffer: Vec::new(),
                }
            }
        };
        debug!(
            sequence = stream.sequence,
            size = stream.buffer.len(),
            "Message received, decoding"
        );

        let decoder = Arc::clone(&self.decoder);
        match self.decode_tx.upgrade() {
            Some(tx) => {
                tokio::spawn(async move {
                    let email = decoder.decode(stream.sequence, &stream.buffer);
                    // The collector may already have failed and gone away.
                    let _ = tx.send(CollectorEvent::Decoded(email));
                });
            }
            None => {
                // Every sender is gone; nothing else can arrive, decode inline.
                let email = decoder.decode(stream.sequence, &stream.buffer);
                self.results.push(email);
                self.pending.pending_decodes = self.pending.pending_decodes.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reads the body as a Unix timestamp and records how often it ran.
    #[derive(Default)]
    struct StampDecoder {
        calls: AtomicUsize,
    }

    impl Decode for StampDecoder {
        fn decode(&self, sequence: u32, raw: &[u8]) -> ParsedEmail {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ts: i64 = std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            ParsedEmail {
                id: sequence,
                from: String::new(),
                to: String::new(),
                subject: format!("#{sequence}"),
                date: Utc.timestamp_opt(ts, 0).unwrap(),
                preview: String::new(),
                body: String::from_utf8_lossy(raw).into_owned(),
                html: String::new(),
                text: String::new(),
                attachment_count: 0,
                degraded: false,
            }
        }
    }

    fn send_message(events: &EventSender, seq: u32, body: &str) {
        events.message_started(seq).unwrap();
        for chunk in body.as_bytes().chunks(2) {
            events.body_chunk(seq, chunk.to_vec()).unwrap();
        }
        events.message_ended(seq).unwrap();
    }

    fn ids(list: &[ParsedEmail]) -> Vec<u32> {
        list.iter().map(|e| e.id).collect()
    }

    #[tokio::test]
    async fn test_fetch_end_after_all_messages() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(Arc::clone(&decoder));
        send_message(&events, 3, "300");
        send_message(&events, 4, "100");
        send_message(&events, 5, "200");
        events.fetch_ended().unwrap();

        let result = collector.run().await.unwrap();
        assert_eq!(ids(&result), vec![3, 5, 4]);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_end_before_last_message_ends() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        send_message(&events, 1, "10");
        events.message_started(2).unwrap();
        events.fetch_ended().unwrap();
        events.body_chunk(2, b"20".to_vec()).unwrap();
        events.message_ended(2).unwrap();

        let result = collector.run().await.unwrap();
        assert_eq!(ids(&result), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_fetch_end_races_slow_decodes() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        let task = tokio::spawn(collector.run());

        send_message(&events, 1, "1");
        tokio::time::sleep(Duration::from_millis(5)).await;
        send_message(&events, 2, "2");
        events.fetch_ended().unwrap();
        drop(events);

        let result = task.await.unwrap().unwrap();
        assert_eq!(ids(&result), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_messages_interleaved_across_sequences() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        events.message_started(7).unwrap();
        events.message_started(8).unwrap();
        events.body_chunk(8, b"5".to_vec()).unwrap();
        events.body_chunk(7, b"9".to_vec()).unwrap();
        events.body_chunk(8, b"0".to_vec()).unwrap();
        events.message_ended(8).unwrap();
        events.message_ended(7).unwrap();
        events.fetch_ended().unwrap();

        let result = collector.run().await.unwrap();
        assert_eq!(ids(&result), vec![8, 7]);
        assert_eq!(result[0].body, "50");
        assert_eq!(result[1].body, "9");
    }

    #[tokio::test]
    async fn test_equal_dates_keep_sequence_order() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        send_message(&events, 9, "50");
        send_message(&events, 2, "50");
        send_message(&events, 5, "50");
        events.fetch_ended().unwrap();

        let result = collector.run().await.unwrap();
        assert_eq!(ids(&result), vec![2, 5, 9]);
    }

    #[tokio::test]
    async fn test_empty_fetch_completes() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(Arc::clone(&decoder));
        events.fetch_ended().unwrap();
        assert!(collector.run().await.unwrap().is_empty());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_fails_without_waiting() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        send_message(&events, 1, "1");
        events.message_started(2).unwrap();
        events
            .fetch_failed(MailError::Transport("connection reset".into()))
            .unwrap();

        let err = collector.run().await.unwrap_err();
        assert!(matches!(err, MailError::Transport(ref m) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_closed_channel_without_fetch_end_fails() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        send_message(&events, 1, "1");
        drop(events);
        assert!(matches!(
            collector.run().await,
            Err(MailError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_unannounced_chunk_and_end_are_kept() {
        let decoder = Arc::new(StampDecoder::default());
        let (collector, events) = FetchCollector::channel(decoder);
        events.body_chunk(4, b"40".to_vec()).unwrap();
        events.message_ended(4).unwrap();
        events.message_ended(6).unwrap();
        events.fetch_ended().unwrap();

        let result = collector.run().await.unwrap();
        assert_eq!(ids(&result), vec![4, 6]);
    }
}
