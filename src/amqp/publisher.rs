//! AMQP-backed notifier for outbound player traffic
//!
//! The queue core talks to players through the synchronous `Notifier` trait;
//! this implementation bridges it onto the async broker by handing every
//! outbound message to a publishing task over an unbounded channel. Presence
//! is tracked from the Connected/Disconnected commands observed on the wire.

use crate::amqp::messages::{
    MessageEnvelope, ACTIVITY_LAUNCH_EXCHANGE, LAUNCH_ROUTING_KEY, NOTICE_ROUTING_KEY,
    PLAYER_NOTICES_EXCHANGE,
};
use crate::error::{QueueError, Result};
use crate::notify::Notifier;
use crate::types::{ActivityLaunch, PlayerId, PlayerNotice};
use crate::utils::current_timestamp;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for outbound publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

enum Outbound {
    Notice(PlayerNotice),
    Launch(ActivityLaunch),
}

/// Notifier that publishes notices and launch commands to the broker
pub struct AmqpNotifier {
    tx: mpsc::UnboundedSender<Outbound>,
    online: Arc<Mutex<HashSet<PlayerId>>>,
}

impl AmqpNotifier {
    /// Declare the outbound exchanges and spawn the publishing task
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        Self::setup_exchanges(&channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(publish_loop(channel, config, rx));

        Ok(Self {
            tx,
            online: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    async fn setup_exchanges(channel: &Channel) -> Result<()> {
        for exchange in [PLAYER_NOTICES_EXCHANGE, ACTIVITY_LAUNCH_EXCHANGE] {
            let args = ExchangeDeclareArguments::new(exchange, "topic");
            channel.exchange_declare(args).await.map_err(|e| {
                QueueError::AmqpConnectionFailed {
                    message: format!("Failed to declare exchange {}: {}", exchange, e),
                }
            })?;
        }

        info!("Successfully set up AMQP exchanges");
        Ok(())
    }

    /// Number of players currently marked online
    pub fn online_count(&self) -> usize {
        self.online.lock().map(|online| online.len()).unwrap_or(0)
    }

    fn enqueue(&self, message: Outbound) {
        if self.tx.send(message).is_err() {
            error!("Publishing task is gone, dropping outbound message");
        }
    }
}

impl Notifier for AmqpNotifier {
    fn send_message(&self, player_id: &PlayerId, text: &str) {
        self.enqueue(Outbound::Notice(PlayerNotice {
            player_id: player_id.clone(),
            text: text.to_string(),
            timestamp: current_timestamp(),
        }));
    }

    fn dispatch_command(&self, player_id: &PlayerId, command: &str) {
        self.enqueue(Outbound::Launch(ActivityLaunch {
            player_id: player_id.clone(),
            command: command.to_string(),
            timestamp: current_timestamp(),
        }));
    }

    fn is_online(&self, player_id: &PlayerId) -> bool {
        self.online
            .lock()
            .map(|online| online.contains(player_id))
            .unwrap_or(false)
    }

    fn set_presence(&self, player_id: &PlayerId, online: bool) {
        if let Ok(mut set) = self.online.lock() {
            if online {
                set.insert(player_id.clone());
            } else {
                set.remove(player_id);
            }
        }
    }
}

async fn publish_loop(
    channel: Channel,
    config: PublisherConfig,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(message) = rx.recv().await {
        let result = match message {
            Outbound::Notice(notice) => {
                let envelope = MessageEnvelope::new(notice, NOTICE_ROUTING_KEY.to_string());
                publish_with_retry(&channel, &config, PLAYER_NOTICES_EXCHANGE, &envelope).await
            }
            Outbound::Launch(launch) => {
                let envelope = MessageEnvelope::new(launch, LAUNCH_ROUTING_KEY.to_string());
                publish_with_retry(&channel, &config, ACTIVITY_LAUNCH_EXCHANGE, &envelope).await
            }
        };
        if let Err(e) = result {
            error!("Dropping outbound message after retries: {}", e);
        }
    }
    debug!("Publishing task finished");
}

async fn publish_with_retry<T>(
    channel: &Channel,
    config: &PublisherConfig,
    exchange: &str,
    envelope: &MessageEnvelope<T>,
) -> Result<()>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut retry_count = 0;
    let mut delay = Duration::from_millis(config.retry_delay_ms);

    loop {
        match try_publish(channel, exchange, envelope).await {
            Ok(()) => {
                debug!(
                    "Published message {} to exchange {}",
                    envelope.correlation_id, exchange
                );
                return Ok(());
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > config.max_retries {
                    error!(
                        "Failed to publish message {} after {} retries: {}",
                        envelope.correlation_id, config.max_retries, e
                    );
                    return Err(e);
                }

                warn!(
                    "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                    retry_count, envelope.correlation_id, e, delay
                );

                sleep(delay).await;
                delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
            }
        }
    }
}

async fn try_publish<T>(
    channel: &Channel,
    exchange: &str,
    envelope: &MessageEnvelope<T>,
) -> Result<()>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let payload = envelope.to_bytes()?;

    let args = BasicPublishArguments::new(exchange, &envelope.routing_key);
    let mut properties = BasicProperties::default();
    properties
        .with_message_id(&envelope.correlation_id)
        .with_timestamp(envelope.timestamp.timestamp() as u64)
        .with_content_type("application/json");

    channel
        .basic_publish(properties, payload, args)
        .await
        .map_err(|e| QueueError::AmqpConnectionFailed {
            message: format!("Failed to publish message: {}", e),
        })?;

    Ok(())
}
