use serde::Deserialize;

use crate::codec::EnvelopeCodec;
use crate::types::{Envelope, APPLICATION_JSON};
use crate::{QueueError, QueueResult};

/// JSON codec for `{"job_id": .., "type": ..}` envelopes
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

/// Decoding shape: `job_id` is optional here so its absence is reported
/// as a malformed envelope rather than a serde error.
#[derive(Deserialize)]
struct RawEnvelope {
    job_id: Option<i64>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl EnvelopeCodec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> QueueResult<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    fn decode(&self, body: &[u8]) -> QueueResult<Envelope> {
        let raw: RawEnvelope = serde_json::from_slice(body)
            .map_err(|e| QueueError::MalformedEnvelope(e.to_string()))?;

        match raw.job_id {
            Some(id) if id > 0 => Ok(Envelope {
                job_id: id.into(),
                kind: raw.kind.unwrap_or_default(),
            }),
            Some(id) => Err(QueueError::MalformedEnvelope(format!("invalid job_id {id}"))),
            None => Err(QueueError::MalformedEnvelope("missing job_id".to_string())),
        }
    }

    fn content_type(&self) -> &'static str {
        APPLICATION_JSON
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}
