//! Message decoding: raw fetched bytes to [`ParsedEmail`], with layered fallback.
//!
//! Decoding runs through an ordered list of tiers. The first tier that
//! succeeds produces the record; the last one cannot fail, so
//! [`MessageDecoder::decode`] always returns something to show.

pub mod eml;
pub mod fallback;
pub mod html;
pub mod mime;
pub mod text;

use mail_parser::MessageParser;
use tracing::warn;

use crate::error::DecodeError;
use crate::model::email::ParsedEmail;

/// Anything that turns one fetched message into a record.
///
/// Implementations must be infallible; the fetch pipeline counts on every
/// started message producing exactly one record.
pub trait Decode: Send + Sync {
    fn decode(&self, sequence: u32, raw: &[u8]) -> ParsedEmail;
}

type Tier = fn(&MessageParser, u32, &[u8]) -> Result<ParsedEmail, DecodeError>;

/// Fallible tiers in priority order.
const TIERS: [(&str, Tier); 2] = [
    ("structured", mime::decode_structured),
    ("raw", raw_tier),
];

fn raw_tier(_: &MessageParser, sequence: u32, raw: &[u8]) -> Result<ParsedEmail, DecodeError> {
    fallback::decode_raw(sequence, raw)
}

/// The production decoder, backed by `mail-parser`.
#[derive(Default)]
pub struct MessageDecoder {
    parser: MessageParser,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decode for MessageDecoder {
    fn decode(&self, sequence: u32, raw: &[u8]) -> ParsedEmail {
        for (name, tier) in TIERS {
            match tier(&self.parser, sequence, raw) {
                Ok(email) => return email,
                Err(e) => {
                    warn!(
                        sequence,
                        tier = name,
                        size = raw.len(),
                        error = %e,
                        "Decode tier failed, falling back"
                    );
                }
            }
        }
        fallback::minimal(sequence)
    }
}
