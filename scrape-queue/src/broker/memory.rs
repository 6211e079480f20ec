use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::ChannelBroker;
use crate::types::{ChannelCapabilities, Delivery, DeliveryTag, MessageProperties, OutboundMessage};
use crate::{QueueError, QueueResult};

#[derive(Debug, Clone)]
struct StoredMessage {
    body: Vec<u8>,
    properties: MessageProperties,
    redelivered: bool,
}

#[derive(Default)]
struct ChannelState {
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<DeliveryTag, StoredMessage>,
    notify: Arc<Notify>,
}

/// In-process broker for tests, development and the single-process server.
///
/// Cloning shares the same channels, so one clone can publish while another consumes.
#[derive(Clone)]
pub struct MemoryBroker {
    channels: Arc<RwLock<HashMap<String, ChannelState>>>,
    next_tag: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            next_tag: Arc::new(AtomicU64::new(1)),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Re-open after [`ChannelBroker::close`]. Declared channels and their messages survive.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Deliveries handed out but not yet acked or rejected.
    pub fn unacked_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|state| state.unacked.len())
            .unwrap_or(0)
    }

    /// Copy of the bodies waiting in a channel, oldest first.
    pub fn peek(&self, channel: &str) -> Vec<Vec<u8>> {
        self.channels
            .read()
            .get(channel)
            .map(|state| state.ready.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }

    fn ensure_connected(&self) -> QueueResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::NotConnected)
        }
    }

    /// Pop the next ready message, or hand back the channel's notifier to wait on.
    fn try_take(&self, channel: &str) -> QueueResult<Result<Delivery, Arc<Notify>>> {
        let mut channels = self.channels.write();
        let state = channels
            .get_mut(channel)
            .ok_or_else(|| QueueError::ChannelNotDeclared(channel.to_string()))?;

        match state.ready.pop_front() {
            Some(message) => {
                let tag = DeliveryTag(self.next_tag.fetch_add(1, Ordering::Relaxed));
                let delivery = Delivery {
                    tag,
                    channel: channel.to_string(),
                    body: message.body.clone(),
                    properties: message.properties.clone(),
                    redelivered: message.redelivered,
                };
                state.unacked.insert(tag, message);
                Ok(Ok(delivery))
            }
            None => Ok(Err(Arc::clone(&state.notify))),
        }
    }

    fn settle(&self, delivery: &Delivery) -> QueueResult<(StoredMessage, Arc<Notify>)> {
        let mut channels = self.channels.write();
        let state = channels
            .get_mut(&delivery.channel)
            .ok_or_else(|| QueueError::ChannelNotDeclared(delivery.channel.clone()))?;
        let message = state
            .unacked
            .remove(&delivery.tag)
            .ok_or(QueueError::UnknownDelivery(delivery.tag))?;
        Ok((message, Arc::clone(&state.notify)))
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelBroker for MemoryBroker {
    async fn declare(&self, channel: &str) -> QueueResult<()> {
        self.ensure_connected()?;
        let mut channels = self.channels.write();
        if !channels.contains_key(channel) {
            channels.insert(channel.to_string(), ChannelState::default());
            debug!("Declared channel {}", channel);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: OutboundMessage) -> QueueResult<()> {
        self.ensure_connected()?;
        let notify = {
            let mut channels = self.channels.write();
            let state = channels
                .get_mut(channel)
                .ok_or_else(|| QueueError::ChannelNotDeclared(channel.to_string()))?;
            state.ready.push_back(StoredMessage {
                body: message.body,
                properties: message.properties,
                redelivered: false,
            });
            Arc::clone(&state.notify)
        };
        notify.notify_one();
        Ok(())
    }

    async fn receive(&self, channel: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = Instant::now() + wait;
        loop {
            self.ensure_connected()?;
            let notify = match self.try_take(channel)? {
                Ok(delivery) => return Ok(Some(delivery)),
                Err(notify) => notify,
            };
            // notify_one stores a permit when nobody is waiting, so a publish
            // landing between try_take and here is not lost.
            if tokio::time::timeout_at(deadline, notify.notified()).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.ensure_connected()?;
        self.settle(delivery)?;
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        self.ensure_connected()?;
        let (mut message, notify) = self.settle(delivery)?;
        if requeue {
            message.redelivered = true;
            if let Some(state) = self.channels.write().get_mut(&delivery.channel) {
                state.ready.push_front(message);
            }
            notify.notify_one();
        }
        Ok(())
    }

    async fn message_count(&self, channel: &str) -> QueueResult<usize> {
        self.channels
            .read()
            .get(channel)
            .map(|state| state.ready.len())
            .ok_or_else(|| QueueError::ChannelNotDeclared(channel.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> QueueResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        let mut channels = self.channels.write();
        for (name, state) in channels.iter_mut() {
            // Blocked receivers observe the disconnect instead of waiting out their timeout.
            state.notify.notify_waiters();

            let mut returned: Vec<(DeliveryTag, StoredMessage)> = state.unacked.drain().collect();
            if returned.is_empty() {
                continue;
            }
            returned.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
            debug!("Returning {} unacked deliveries to {}", returned.len(), name);
            for (_, mut message) in returned {
                message.redelivered = true;
                state.ready.push_front(message);
            }
        }
        Ok(())
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            durable: false,
            ..ChannelCapabilities::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(body: &str) -> OutboundMessage {
        OutboundMessage::new(body.as_bytes().to_vec(), MessageProperties::persistent_json())
    }

    #[tokio::test]
    async fn publish_to_undeclared_channel_fails() {
        let broker = MemoryBroker::new();
        let err = broker.publish("nowhere", message("{}")).await.unwrap_err();
        assert!(matches!(err, QueueError::ChannelNotDeclared(ref c) if c == "nowhere"));
    }

    #[tokio::test]
    async fn receive_times_out_on_empty_channel() {
        let broker = MemoryBroker::new();
        broker.declare("q").await.unwrap();
        let got = broker.receive("q", Duration::from_millis(20)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_publish() {
        let broker = MemoryBroker::new();
        broker.declare("q").await.unwrap();

        let consumer = broker.clone();
        let waiter =
            tokio::spawn(async move { consumer.receive("q", Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish("q", message("hello")).await.unwrap();

        let delivery = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(delivery.body, b"hello");
        assert_eq!(delivery.properties.content_type, "application/json");
    }

    #[tokio::test]
    async fn requeue_flags_redelivery() {
        let broker = MemoryBroker::new();
        broker.declare("q").await.unwrap();
        broker.publish("q", message("a")).await.unwrap();

        let first = broker.receive("q", Duration::ZERO).await.unwrap().unwrap();
        assert!(!first.redelivered);
        broker.reject(&first, true).await.unwrap();

        let second = broker.receive("q", Duration::ZERO).await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_ne!(first.tag, second.tag);
    }

    #[tokio::test]
    async fn settling_twice_is_an_error() {
        let broker = MemoryBroker::new();
        broker.declare("q").await.unwrap();
        broker.publish("q", message("a")).await.unwrap();
        let delivery = broker.receive("q", Duration::ZERO).await.unwrap().unwrap();

        broker.ack(&delivery).await.unwrap();
        assert!(matches!(broker.ack(&delivery).await, Err(QueueError::UnknownDelivery(_))));
    }
}
