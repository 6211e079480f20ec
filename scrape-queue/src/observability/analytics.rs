use std::sync::Arc;

use chrono::Utc;
use scrape_core::{JobId, JobKind, ScrapeTarget};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use super::LiveMetrics;
use crate::JobEvent;

/// Event stream plus live counters, shared by the dispatcher and workers
#[derive(Clone)]
pub struct ObservabilityLayer {
    event_broadcaster: broadcast::Sender<JobEvent>,
    metrics: Arc<LiveMetrics>,
}

impl ObservabilityLayer {
    pub fn new() -> Self {
        let (event_broadcaster, _) = broadcast::channel(1024);

        Self {
            event_broadcaster,
            metrics: Arc::new(LiveMetrics::new()),
        }
    }

    fn emit(&self, event: JobEvent) {
        debug!("Recorded {} for job {:?}", event.event_name(), event.job_id());
        // No subscribers is fine.
        let _ = self.event_broadcaster.send(event);
    }

    pub fn record_dispatched(&self, job_id: JobId, kind: JobKind) {
        self.metrics.increment_dispatched();
        self.emit(JobEvent::Dispatched {
            job_id,
            kind,
            at: Utc::now(),
        });
    }

    pub fn record_dispatch_failed(&self, job_id: JobId, channel: &str, error: &str) {
        self.metrics.increment_dispatch_failures();
        self.emit(JobEvent::DispatchFailed {
            job_id,
            channel: channel.to_string(),
            error: error.to_string(),
            at: Utc::now(),
        });
    }

    pub fn record_started(&self, job_id: JobId, target: ScrapeTarget) {
        self.metrics.increment_started(target);
        self.emit(JobEvent::Started {
            job_id,
            target,
            at: Utc::now(),
        });
    }

    pub fn record_completed(
        &self,
        job_id: JobId,
        target: ScrapeTarget,
        records: usize,
        job_finished: bool,
    ) {
        self.metrics.increment_completed(target, records);
        self.emit(JobEvent::Completed {
            job_id,
            target,
            records,
            job_finished,
            at: Utc::now(),
        });
    }

    pub fn record_failed(&self, job_id: JobId, target: ScrapeTarget, error: &str) {
        self.metrics.increment_failed(target);
        self.emit(JobEvent::Failed {
            job_id,
            target,
            error: error.to_string(),
            at: Utc::now(),
        });
    }

    pub fn record_dropped(&self, job_id: Option<JobId>, channel: &str, reason: &str) {
        self.metrics.increment_dropped();
        self.emit(JobEvent::Dropped {
            job_id,
            channel: channel.to_string(),
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_broadcaster.subscribe()
    }

    /// Events as a stream; lagging subscribers see `Err` items.
    pub fn event_stream(&self) -> BroadcastStream<JobEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn metrics(&self) -> &LiveMetrics {
        &self.metrics
    }
}

impl Default for ObservabilityLayer {
    fn default() -> Self {
        Self::new()
    }
}
