use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::broker::ChannelBroker;
use crate::types::{ConsumerTag, Delivery};
use crate::QueueResult;

/// What to do with a delivery once its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ack,
    /// Rejected deliveries are never requeued by the consume loop.
    Reject,
}

impl Decision {
    /// Apply the decision to the broker that handed out `delivery`.
    pub async fn settle(self, broker: &dyn ChannelBroker, delivery: &Delivery) -> QueueResult<()> {
        match self {
            Decision::Ack => broker.ack(delivery).await,
            Decision::Reject => broker.reject(delivery, false).await,
        }
    }
}

/// Handles one delivery. Settlement happens after `handle` returns, so the
/// acknowledgement is always synchronous with handler completion.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Decision;
}

/// A receive -> handle -> settle loop bound to one channel.
pub struct Consumer {
    tag: ConsumerTag,
    channel: String,
    broker: Arc<dyn ChannelBroker>,
    handler: Arc<dyn DeliveryHandler>,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl Consumer {
    pub fn new(
        broker: Arc<dyn ChannelBroker>,
        channel: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        let channel = channel.into();
        Self {
            tag: ConsumerTag::new(&channel),
            channel,
            broker,
            handler,
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_error_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }

    pub fn tag(&self) -> &ConsumerTag {
        &self.tag
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown interrupts waiting for a message, never a delivery that is
    /// already being handled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> QueueResult<()> {
        self.broker.declare(&self.channel).await?;
        info!("Consumer {} listening on {}", self.tag, self.channel);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                received = self.broker.receive(&self.channel, self.poll_interval) => received,
            };

            match received {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => {}
                Err(e) => {
                    warn!("Receive on {} failed: {}", self.channel, e);
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        info!("Consumer {} stopped", self.tag);
        Ok(())
    }

    async fn process(&self, delivery: Delivery) {
        debug!(
            "Consumer {} got delivery {} (redelivered: {})",
            self.tag, delivery.tag, delivery.redelivered
        );

        let decision = self.handler.handle(&delivery).await;
        if let Err(e) = decision.settle(self.broker.as_ref(), &delivery).await {
            // The broker keeps the message; it comes back after a reconnect.
            error!("Could not settle delivery {} on {}: {}", delivery.tag, self.channel, e);
        }
    }
}
