//! Main application configuration
//!
//! Configuration comes from an optional TOML file with environment-variable
//! overrides on top, validated before the service starts.

use crate::config::queues::{validate_definition, QueueDefinition};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub amqp: AmqpSettings,
    /// Queue category definitions
    #[serde(default = "default_queues")]
    pub queues: Vec<QueueDefinition>,
    /// Per-key message template overrides
    #[serde(default)]
    pub messages: HashMap<String, String>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health/metrics endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Queue name for inbound player commands
    pub command_queue: String,
    /// Maximum retry attempts for the initial connection
    pub max_retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

fn default_queues() -> Vec<QueueDefinition> {
    vec![QueueDefinition::named("casual")]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            amqp: AmqpSettings::default(),
            queues: default_queues(),
            messages: HashMap::new(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "ready-room".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            command_queue: "matchqueue.commands".to_string(),
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        if let Ok(host) = env::var("AMQP_HOST") {
            self.amqp.host = host;
        }
        if let Ok(port) = env::var("AMQP_PORT") {
            self.amqp.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_PORT value: {}", port))?;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            self.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            self.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            self.amqp.vhost = vhost;
        }
        if let Ok(queue) = env::var("AMQP_COMMAND_QUEUE") {
            self.amqp.command_queue = queue;
        }
        if let Ok(retries) = env::var("AMQP_MAX_RETRY_ATTEMPTS") {
            self.amqp.max_retry_attempts = retries
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_MAX_RETRY_ATTEMPTS value: {}", retries))?;
        }
        if let Ok(delay) = env::var("AMQP_RETRY_DELAY_MS") {
            self.amqp.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_RETRY_DELAY_MS value: {}", delay))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.amqp.host.is_empty() {
        return Err(anyhow!("AMQP host cannot be empty"));
    }
    if config.amqp.command_queue.is_empty() {
        return Err(anyhow!("AMQP command queue name cannot be empty"));
    }

    if config.queues.is_empty() {
        return Err(anyhow!("At least one queue definition is required"));
    }
    for def in &config.queues {
        validate_definition(def)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.queues.len(), 1);
        assert_eq!(config.queues[0].name, "casual");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_toml_parsing() {
        let raw = r#"
            [service]
            name = "ready-room"
            log_level = "debug"
            health_port = 9090
            shutdown_timeout_seconds = 10

            [amqp]
            host = "broker"
            port = 5672
            username = "svc"
            password = "secret"
            vhost = "/"
            command_queue = "mq.commands"
            max_retry_attempts = 3
            retry_delay_ms = 500

            [[queues]]
            name = "duo"
            max_players = 2
            confirmation_seconds = 30
            countdown_seconds = 10

            [messages]
            "queue.join.full" = "No room left"
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.health_port, 9090);
        assert_eq!(config.amqp.host, "broker");
        assert_eq!(config.queues[0].name, "duo");
        assert_eq!(config.queues[0].max_players, 2);
        // Unset fields take serde defaults
        assert_eq!(config.queues[0].buffer_ticks, 20);
        assert_eq!(
            config.messages.get("queue.join.full").map(String::as_str),
            Some("No room left")
        );
    }

    #[test]
    fn test_empty_queue_list_rejected() {
        let mut config = AppConfig::default();
        config.queues.clear();
        assert!(validate_config(&config).is_err());
    }
}
