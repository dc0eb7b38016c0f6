// ── MQTT subscription bookkeeping ──
//
// Topic → bindings table published through `ArcSwap` so `dispatch` reads
// a snapshot without locking. Mutations are serialized by a mutex and
// replace the whole table. A binding's `active` flag is cleared on
// unsubscribe, so a snapshot loaded before the swap never delivers to it,
// and unsubscribe returns only once no delivery to the binding is running.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::model::EntityType;
use crate::util::{LOG_BODY_LIMIT, clean_for_logging};

/// Broker operations the subscription manager needs.
#[async_trait]
pub trait MqttTransport: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<(), Error>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), Error>;

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error>;
}

/// Decodes a payload and hands it to the user's handler.
pub(crate) type Deliver = Box<dyn Fn(&[u8]) -> Result<(), Error> + Send + Sync>;

struct Binding {
    id: u64,
    entity_type: EntityType,
    deliver: Deliver,
    active: AtomicBool,
    in_flight: AtomicUsize,
}

impl Binding {
    /// Run `deliver` unless the binding was deactivated.
    fn try_deliver(&self, payload: &[u8]) -> Result<(), Error> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = if self.active.load(Ordering::SeqCst) {
            (self.deliver)(payload)
        } else {
            Ok(())
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Deactivate, then wait out deliveries that already passed the check.
    async fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::task::yield_now().await;
        }
    }
}

type TopicTable = HashMap<String, Vec<Arc<Binding>>>;

/// Handle returned by a subscribe call; pass it back to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    topic: String,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Routes incoming MQTT messages to the handlers bound to their topic.
pub struct SubscriptionManager {
    transport: Arc<dyn MqttTransport>,
    table: ArcSwap<TopicTable>,
    write: Mutex<()>,
    next_id: AtomicU64,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("topics", &self.topics())
            .finish_non_exhaustive()
    }
}

impl SubscriptionManager {
    pub fn new(transport: Arc<dyn MqttTransport>) -> Self {
        Self {
            transport,
            table: ArcSwap::from_pointee(TopicTable::new()),
            write: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn MqttTransport> {
        &self.transport
    }

    /// Topics with at least one binding, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.table.load().keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    pub fn binding_count(&self, topic: &str) -> usize {
        self.table.load().get(topic).map_or(0, Vec::len)
    }

    /// Bind `deliver` to `topic`. The broker subscription is made for the
    /// first binding of a topic only.
    pub(crate) async fn subscribe(
        &self,
        topic: String,
        entity_type: EntityType,
        deliver: Deliver,
    ) -> Result<Subscription, Error> {
        let _guard = self.write.lock().await;
        let current = self.table.load_full();

        if !current.contains_key(&topic) {
            self.transport.subscribe(&topic).await?;
            debug!(%topic, %entity_type, "subscribed");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let binding = Arc::new(Binding {
            id,
            entity_type,
            deliver,
            active: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
        });

        let mut next = (*current).clone();
        next.entry(topic.clone()).or_default().push(binding);
        self.table.store(Arc::new(next));

        Ok(Subscription { id, topic })
    }

    /// Remove one binding. Unsubscribes from the broker when it was the
    /// last one on its topic. Unknown handles are ignored.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<(), Error> {
        let _guard = self.write.lock().await;
        let current = self.table.load_full();
        let Some(bindings) = current.get(&subscription.topic) else {
            return Ok(());
        };
        let Some(binding) = bindings.iter().find(|b| b.id == subscription.id) else {
            return Ok(());
        };
        binding.deactivate().await;

        let remaining: Vec<_> = bindings
            .iter()
            .filter(|b| b.id != subscription.id)
            .cloned()
            .collect();
        let last = remaining.is_empty();
        let mut next = (*current).clone();
        if last {
            next.remove(&subscription.topic);
        } else {
            next.insert(subscription.topic.clone(), remaining);
        }
        self.table.store(Arc::new(next));

        if last {
            self.transport.unsubscribe(&subscription.topic).await?;
            debug!(topic = %subscription.topic, "unsubscribed");
        }
        Ok(())
    }

    /// Remove every binding on `topic` and unsubscribe from the broker.
    pub async fn unsubscribe_topic(&self, topic: &str) -> Result<(), Error> {
        let _guard = self.write.lock().await;
        let current = self.table.load_full();
        let Some(bindings) = current.get(topic) else {
            return Ok(());
        };
        for binding in bindings {
            binding.deactivate().await;
        }

        let mut next = (*current).clone();
        next.remove(topic);
        self.table.store(Arc::new(next));

        self.transport.unsubscribe(topic).await?;
        debug!(%topic, "unsubscribed all");
        Ok(())
    }

    /// Deliver an incoming message to every active binding of `topic`.
    ///
    /// Never fails: unknown topics are ignored and payloads that do not
    /// decode are logged and dropped.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) {
        let table = self.table.load_full();
        let Some(bindings) = table.get(topic) else {
            trace!(%topic, "message on unsubscribed topic");
            return;
        };
        for binding in bindings {
            if let Err(e) = binding.try_deliver(payload) {
                warn!(
                    %topic,
                    entity_type = %binding.entity_type,
                    error = %e,
                    payload = %clean_for_logging(&String::from_utf8_lossy(payload), LOG_BODY_LIMIT),
                    "dropping MQTT message"
                );
            }
        }
    }
}
