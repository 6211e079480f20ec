use scrape_core::{JobId, ScrapeTarget};
use serde::{Deserialize, Serialize};

/// The only thing that travels through a channel: which job, for which target.
///
/// Wire format: `{"job_id": <integer>, "type": "<string>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub job_id: JobId,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Envelope {
    pub fn new(job_id: JobId, target: ScrapeTarget) -> Self {
        Self {
            job_id,
            kind: target.as_str().to_string(),
        }
    }

    /// The target named in the envelope, if it names one.
    pub fn target(&self) -> Option<ScrapeTarget> {
        self.kind.parse().ok()
    }
}
