use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ChannelBroker;
use crate::types::{ChannelCapabilities, Delivery, DeliveryTag, MessageProperties, OutboundMessage};
use crate::{QueueError, QueueResult};

/// How long a consumer may go without a heartbeat before its unacked
/// deliveries are handed back to the channel.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Moves every entry of KEYS[1] (a dead consumer's unacked list) to the
/// consuming end of KEYS[2] (the ready list), flagging it redelivered.
const RECLAIM_SCRIPT: &str = r#"
local moved = 0
while true do
  local raw = redis.call('RPOP', KEYS[1])
  if not raw then break end
  raw = string.gsub(raw, '"redelivered":false}$', '"redelivered":true}')
  redis.call('RPUSH', KEYS[2], raw)
  moved = moved + 1
end
return moved
"#;

/// Stored form of a message inside the Redis lists. `redelivered` must stay
/// the last field; the reclaim script rewrites it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    body: String,
    properties: MessageProperties,
    #[serde(default)]
    redelivered: bool,
}

struct InFlight {
    channel: String,
    raw: String,
}

fn ready_key(prefix: &str, channel: &str) -> String {
    format!("{prefix}:{channel}:ready")
}

fn unacked_key(prefix: &str, channel: &str, consumer: &str) -> String {
    format!("{prefix}:{channel}:unacked:{consumer}")
}

fn heartbeat_key(prefix: &str, consumer: &str) -> String {
    format!("{prefix}:consumer:{consumer}")
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn spawn_heartbeat(
    mut conn: MultiplexedConnection,
    key: String,
    lease: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(lease / 3);
        loop {
            ticker.tick().await;
            let beat: redis::RedisResult<()> = redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("PX")
                .arg(millis(lease))
                .query_async(&mut conn)
                .await;
            if let Err(e) = beat {
                warn!("Heartbeat {} failed: {}", key, e);
            }
        }
    })
}

/// Redis list-backed channels (Redis 6.2+ for `BLMOVE`).
///
/// Layout per channel: `{prefix}:{channel}:ready` holds waiting messages
/// (pushed left, consumed right). Every broker instance is a consumer with
/// its own id; its deliveries sit in `{prefix}:{channel}:unacked:{id}`
/// until they are acked or rejected, and `{prefix}:consumer:{id}` is kept
/// alive by a heartbeat. Once a consumer's heartbeat lapses, the next
/// [`RedisBroker::reclaim_orphans`] by any live consumer returns its
/// deliveries to their channels.
pub struct RedisBroker {
    client: redis::Client,
    conn: MultiplexedConnection,
    /// Idle connections for blocking receives; one per concurrent receiver.
    blocking: Mutex<Vec<MultiplexedConnection>>,
    prefix: String,
    consumer_id: String,
    lease: Duration,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    last_reclaim: Mutex<Option<Instant>>,
    inflight: Mutex<HashMap<DeliveryTag, InFlight>>,
    next_tag: AtomicU64,
    connected: AtomicBool,
}

impl RedisBroker {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> QueueResult<Self> {
        Self::connect_with_lease(url, prefix, DEFAULT_LEASE).await
    }

    pub async fn connect_with_lease(
        url: &str,
        prefix: impl Into<String>,
        lease: Duration,
    ) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let prefix = prefix.into();
        let consumer_id = Uuid::new_v4().simple().to_string();

        let heartbeat = heartbeat_key(&prefix, &consumer_id);
        let _: () = redis::cmd("SET")
            .arg(&heartbeat)
            .arg(1)
            .arg("PX")
            .arg(millis(lease))
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("SADD")
            .arg(format!("{prefix}:consumers"))
            .arg(&consumer_id)
            .query_async(&mut conn)
            .await?;
        info!("Connected to redis as consumer {}", consumer_id);

        Ok(Self {
            heartbeat: Mutex::new(Some(spawn_heartbeat(conn.clone(), heartbeat, lease))),
            client,
            conn,
            blocking: Mutex::new(Vec::new()),
            prefix,
            consumer_id,
            lease,
            last_reclaim: Mutex::new(None),
            inflight: Mutex::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
            connected: AtomicBool::new(true),
        })
    }

    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    fn channels_key(&self) -> String {
        format!("{}:channels", self.prefix)
    }

    fn consumers_key(&self) -> String {
        format!("{}:consumers", self.prefix)
    }

    fn ready_key(&self, channel: &str) -> String {
        ready_key(&self.prefix, channel)
    }

    fn unacked_key(&self, channel: &str) -> String {
        unacked_key(&self.prefix, channel, &self.consumer_id)
    }

    fn ensure_connected(&self) -> QueueResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QueueError::NotConnected)
        }
    }

    async fn ensure_declared(&self, channel: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let known: bool = redis::cmd("SISMEMBER")
            .arg(self.channels_key())
            .arg(channel)
            .query_async(&mut conn)
            .await?;
        if known {
            Ok(())
        } else {
            Err(QueueError::ChannelNotDeclared(channel.to_string()))
        }
    }

    /// Return the unacked deliveries of every consumer whose heartbeat has
    /// expired to their channels. Returns how many were moved.
    pub async fn reclaim_orphans(&self) -> QueueResult<usize> {
        let mut conn = self.conn.clone();
        let consumers: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.consumers_key())
            .query_async(&mut conn)
            .await?;
        let channels: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.channels_key())
            .query_async(&mut conn)
            .await?;
        let script = redis::Script::new(RECLAIM_SCRIPT);

        let mut moved = 0;
        for consumer in consumers.iter().filter(|c| **c != self.consumer_id) {
            let alive: bool = redis::cmd("EXISTS")
                .arg(heartbeat_key(&self.prefix, consumer))
                .query_async(&mut conn)
                .await?;
            if alive {
                continue;
            }

            for channel in &channels {
                let count: usize = script
                    .key(unacked_key(&self.prefix, channel, consumer))
                    .key(self.ready_key(channel))
                    .invoke_async(&mut conn)
                    .await?;
                if count > 0 {
                    warn!(
                        "Returned {} deliveries abandoned by consumer {} to {}",
                        count, consumer, channel
                    );
                }
                moved += count;
            }
            let _: i64 = redis::cmd("SREM")
                .arg(self.consumers_key())
                .arg(consumer)
                .query_async(&mut conn)
                .await?;
        }
        Ok(moved)
    }

    /// At most once per lease, so idle polling stays cheap.
    async fn reclaim_if_due(&self) {
        let due = {
            let mut last = self.last_reclaim.lock();
            let due = last.map_or(true, |at| at.elapsed() >= self.lease);
            if due {
                *last = Some(Instant::now());
            }
            due
        };
        if due {
            if let Err(e) = self.reclaim_orphans().await {
                warn!("Could not reclaim abandoned deliveries: {}", e);
            }
        }
    }

    async fn blocking_move(
        &self,
        ready: &str,
        unacked: &str,
        wait: Duration,
    ) -> QueueResult<Option<String>> {
        let pooled = self.blocking.lock().pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => self.client.get_multiplexed_async_connection().await?,
        };
        // A failed connection is dropped instead of going back to the pool.
        let raw: Option<String> = redis::cmd("BLMOVE")
            .arg(ready)
            .arg(unacked)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(wait.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.blocking.lock().push(conn);
        Ok(raw)
    }

    /// Take a delivery out of the unacked list; optionally push it back for redelivery.
    async fn settle(&self, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        let inflight = self
            .inflight
            .lock()
            .remove(&delivery.tag)
            .ok_or(QueueError::UnknownDelivery(delivery.tag))?;
        self.release(&inflight, requeue).await
    }

    async fn release(&self, inflight: &InFlight, requeue: bool) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LREM")
            .arg(self.unacked_key(&inflight.channel))
            .arg(1)
            .arg(&inflight.raw)
            .query_async(&mut conn)
            .await?;

        if requeue {
            let mut message: WireMessage = serde_json::from_str(&inflight.raw)?;
            message.redelivered = true;
            let raw = serde_json::to_string(&message)?;
            // Consumers pop from the right, so this puts it first in line.
            let _: i64 = redis::cmd("RPUSH")
                .arg(self.ready_key(&inflight.channel))
                .arg(raw)
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn deregister(&self) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(heartbeat_key(&self.prefix, &self.consumer_id))
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("SREM")
            .arg(self.consumers_key())
            .arg(&self.consumer_id)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

impl Drop for RedisBroker {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.get_mut().take() {
            heartbeat.abort();
        }
    }
}

#[async_trait]
impl ChannelBroker for RedisBroker {
    async fn declare(&self, channel: &str) -> QueueResult<()> {
        self.ensure_connected()?;
        let mut conn = self.conn.clone();
        let added: i64 = redis::cmd("SADD")
            .arg(self.channels_key())
            .arg(channel)
            .query_async(&mut conn)
            .await?;
        if added > 0 {
            debug!("Declared channel {}", channel);
        }
        Ok(())
    }

    async fn publish(&self, channel: &str, message: OutboundMessage) -> QueueResult<()> {
        self.ensure_connected()?;
        self.ensure_declared(channel).await?;

        let body = String::from_utf8(message.body).map_err(|e| QueueError::PublishFailed {
            channel: channel.to_string(),
            reason: e.to_string(),
        })?;
        let raw = serde_json::to_string(&WireMessage {
            body,
            properties: message.properties,
            redelivered: false,
        })?;

        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(self.ready_key(channel))
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn receive(&self, channel: &str, wait: Duration) -> QueueResult<Option<Delivery>> {
        self.ensure_connected()?;
        self.ensure_declared(channel).await?;

        self.reclaim_if_due().await;

        let ready = self.ready_key(channel);
        let unacked = self.unacked_key(channel);
        let raw: Option<String> = if wait.is_zero() {
            let mut conn = self.conn.clone();
            redis::cmd("LMOVE")
                .arg(&ready)
                .arg(&unacked)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?
        } else {
            self.blocking_move(&ready, &unacked, wait).await?
        };

        let Some(raw) = raw else {
            return Ok(None);
        };

        let message: WireMessage = match serde_json::from_str(&raw) {
            Ok(message) => message,
            Err(e) => {
                // Not ours to interpret; hand the raw text over and let the codec reject it.
                warn!("Unreadable entry in {}: {}", ready, e);
                WireMessage {
                    body: raw.clone(),
                    properties: MessageProperties::persistent_json(),
                    redelivered: false,
                }
            }
        };

        let tag = DeliveryTag(self.next_tag.fetch_add(1, Ordering::Relaxed));
        self.inflight.lock().insert(
            tag,
            InFlight {
                channel: channel.to_string(),
                raw,
            },
        );

        Ok(Some(Delivery {
            tag,
            channel: channel.to_string(),
            body: message.body.into_bytes(),
            properties: message.properties,
            redelivered: message.redelivered,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.ensure_connected()?;
        self.settle(delivery, false).await
    }

    async fn reject(&self, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        self.ensure_connected()?;
        self.settle(delivery, requeue).await
    }

    async fn message_count(&self, channel: &str) -> QueueResult<usize> {
        self.ensure_declared(channel).await?;
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(self.ready_key(channel))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> QueueResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.abort();
        }

        let outstanding: Vec<InFlight> = self.inflight.lock().drain().map(|(_, f)| f).collect();
        for inflight in &outstanding {
            if let Err(e) = self.release(inflight, true).await {
                warn!("Could not return delivery to {}: {}", inflight.channel, e);
            }
        }
        self.blocking.lock().clear();
        self.deregister().await
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities::default()
    }
}
