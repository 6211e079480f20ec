pub mod json;

use crate::types::Envelope;
use crate::QueueResult;

pub use json::JsonCodec;

/// Encodes envelopes for the wire and decodes what consumers receive.
pub trait EnvelopeCodec: Send + Sync {
    fn encode(&self, envelope: &Envelope) -> QueueResult<Vec<u8>>;

    /// Fails with `QueueError::MalformedEnvelope` for anything that does not
    /// name a usable job.
    fn decode(&self, body: &[u8]) -> QueueResult<Envelope>;

    /// MIME type set on published messages
    fn content_type(&self) -> &'static str;

    fn codec_id(&self) -> &'static str;
}
