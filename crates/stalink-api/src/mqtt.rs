//! MQTT transport over `rumqttc` with auto-reconnect.
//!
//! [`RumqttTransport`] queues subscribe/unsubscribe/publish requests on the
//! client; [`MqttEventLoop`] drives the connection on a background task,
//! forwards incoming publishes to the [`SubscriptionManager`], and backs off
//! exponentially after connection errors until cancelled.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::subscription::{MqttTransport, SubscriptionManager};

pub use rumqttc::QoS;

const REQUEST_CHANNEL_CAPACITY: usize = 64;

// ── Configuration ────────────────────────────────────────────────────

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    /// Default: 1883.
    pub port: u16,
    pub client_id: String,
    /// Default: 30s.
    pub keep_alive: Duration,
    /// QoS for subscriptions and publishes. Default: at least once.
    pub qos: QoS,
    pub username: Option<String>,
    pub password: Option<String>,
    pub reconnect: ReconnectConfig,
}

impl MqttConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 1883,
            client_id: format!("stalink-{}", std::process::id()),
            keep_alive: Duration::from_secs(30),
            qos: QoS::AtLeastOnce,
            username: None,
            password: None,
            reconnect: ReconnectConfig::default(),
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

/// Exponential backoff configuration for MQTT reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// Production [`MqttTransport`] backed by a `rumqttc::AsyncClient`.
pub struct RumqttTransport {
    client: AsyncClient,
    qos: QoS,
    topics: Arc<Mutex<BTreeSet<String>>>,
}

impl RumqttTransport {
    /// Create the client and its (not yet running) event loop.
    pub fn connect(config: &MqttConfig) -> (Arc<Self>, MqttEventLoop) {
        let (client, event_loop) = AsyncClient::new(config.options(), REQUEST_CHANNEL_CAPACITY);
        let topics = Arc::new(Mutex::new(BTreeSet::new()));
        info!(host = %config.host, port = config.port, "MQTT client created");

        let transport = Arc::new(Self {
            client: client.clone(),
            qos: config.qos,
            topics: Arc::clone(&topics),
        });
        let event_loop = MqttEventLoop {
            event_loop,
            client,
            qos: config.qos,
            topics,
            reconnect: config.reconnect.clone(),
        };
        (transport, event_loop)
    }
}

#[async_trait]
impl MqttTransport for RumqttTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), Error> {
        self.topics.lock().await.insert(topic.to_owned());
        self.client.subscribe(topic, self.qos).await?;
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), Error> {
        self.topics.lock().await.remove(topic);
        self.client.unsubscribe(topic).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        debug!(%topic, bytes = payload.len(), "MQTT publish");
        self.client.publish(topic, self.qos, false, payload).await?;
        Ok(())
    }
}

// ── Event loop ───────────────────────────────────────────────────────

/// The connection side of a [`RumqttTransport`].
pub struct MqttEventLoop {
    event_loop: EventLoop,
    client: AsyncClient,
    qos: QoS,
    topics: Arc<Mutex<BTreeSet<String>>>,
    reconnect: ReconnectConfig,
}

impl MqttEventLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(
        self,
        manager: Arc<SubscriptionManager>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, Error> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::MqttSetup(format!("no tokio runtime: {e}")))?;
        Ok(runtime.spawn(self.run(manager, cancel)))
    }

    /// Poll → dispatch → on error, backoff → poll again.
    async fn run(mut self, manager: Arc<SubscriptionManager>, cancel: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                        attempt = 0;
                        resubscribe(&self.client, &self.topics, self.qos).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        manager.dispatch(&publish.topic, &publish.payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, attempt, "MQTT connection error");

                        if let Some(max) = self.reconnect.max_retries {
                            if attempt >= max {
                                error!(max_retries = max, "MQTT reconnection limit reached, giving up");
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &self.reconnect);
                        info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "Waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }

        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request not queued");
        }
        debug!("MQTT loop exiting");
    }
}

/// Clean sessions drop subscriptions, so re-issue them after each connect.
/// Uses the non-blocking client calls: the request channel is drained by
/// the event loop that calls this.
async fn resubscribe(client: &AsyncClient, topics: &Mutex<BTreeSet<String>>, qos: QoS) {
    let topics = topics.lock().await;
    for topic in topics.iter() {
        if let Err(e) = client.try_subscribe(topic.as_str(), qos) {
            warn!(%topic, error = %e, "MQTT resubscribe failed");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25%, seeded from the attempt number.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}
