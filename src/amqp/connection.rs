//! AMQP connection management with retry logic

use crate::config::app::AmqpSettings;
use crate::error::{QueueError, Result};
use amqprs::channel::{Channel, QueueDeclareArguments};
use amqprs::connection::{Connection, OpenConnectionArguments};
use anyhow::Context;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Configuration for the AMQP connection
#[derive(Debug, Clone)]
pub struct AmqpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            max_retries: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl From<&AmqpSettings> for AmqpConfig {
    fn from(settings: &AmqpSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            password: settings.password.clone(),
            vhost: settings.vhost.clone(),
            max_retries: settings.max_retry_attempts,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

/// Wrapper around the broker connection
pub struct AmqpConnection {
    connection: Connection,
    _config: AmqpConfig,
}

impl AmqpConnection {
    /// Connect to the broker, retrying with exponential backoff
    pub async fn new(config: AmqpConfig) -> Result<Self> {
        let connection = Self::connect_with_retry(&config).await?;

        Ok(Self {
            connection,
            _config: config,
        })
    }

    async fn connect_with_retry(config: &AmqpConfig) -> Result<Connection> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(config.retry_delay_ms);

        loop {
            match Self::try_connect(config).await {
                Ok(connection) => {
                    info!("Successfully connected to AMQP broker");
                    return Ok(connection);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > config.max_retries {
                        error!(
                            "Failed to connect to AMQP after {} retries",
                            config.max_retries
                        );
                        return Err(QueueError::AmqpConnectionFailed {
                            message: format!("Max retries exceeded: {}", e),
                        }
                        .into());
                    }

                    warn!(
                        "AMQP connection attempt {} failed: {}. Retrying in {:?}",
                        retry_count, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(30000));
                }
            }
        }
    }

    async fn try_connect(config: &AmqpConfig) -> Result<Connection> {
        let mut args = OpenConnectionArguments::new(
            &config.host,
            config.port,
            &config.username,
            &config.password,
        );
        args.virtual_host(&config.vhost);

        Connection::open(&args)
            .await
            .context("Failed to open AMQP connection")
            .map_err(|e| {
                QueueError::AmqpConnectionFailed {
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Open a plain channel, for publishing
    pub async fn open_channel(&self) -> Result<Channel> {
        self.connection
            .open_channel(None)
            .await
            .map_err(|e| {
                QueueError::AmqpConnectionFailed {
                    message: format!("Failed to open channel: {}", e),
                }
                .into()
            })
    }

    /// Open a channel and make sure the command queue exists
    pub async fn open_command_channel(&self, queue_name: &str) -> Result<Channel> {
        let channel = self
            .connection
            .open_channel(None)
            .await
            .map_err(|e| QueueError::AmqpConnectionFailed {
                message: format!("Failed to open channel: {}", e),
            })?;

        let args = QueueDeclareArguments::durable_client_named(queue_name);
        channel
            .queue_declare(args)
            .await
            .map_err(|e| QueueError::AmqpConnectionFailed {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        info!("Declared command queue: {}", queue_name);
        Ok(channel)
    }

    /// Close the connection
    pub async fn close(self) -> Result<()> {
        self.connection
            .close()
            .await
            .context("Failed to close AMQP connection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amqp_config_default() {
        let config = AmqpConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5672);
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AmqpSettings {
            host: "broker.internal".to_string(),
            port: 5673,
            username: "ready".to_string(),
            password: "secret".to_string(),
            vhost: "/matches".to_string(),
            command_queue: "matchqueue.commands".to_string(),
            max_retry_attempts: 3,
            retry_delay_ms: 250,
        };
        let config = AmqpConfig::from(&settings);
        assert_eq!(config.host, "broker.internal");
        assert_eq!(config.port, 5673);
        assert_eq!(config.vhost, "/matches");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 250);
    }

    // Note: Integration tests with an actual AMQP broker would go in tests/
}
