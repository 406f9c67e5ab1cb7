//! AMQP message definitions and serialization

use crate::error::{QueueError, Result};
use crate::types::{CommandRequest, PlayerCommand};
use serde_json;

/// Exchanges for outbound traffic
pub const PLAYER_NOTICES_EXCHANGE: &str = "matchqueue.player_notices";
pub const ACTIVITY_LAUNCH_EXCHANGE: &str = "matchqueue.activity_launches";

/// Routing keys for outbound messages
pub const NOTICE_ROUTING_KEY: &str = "player.notice";
pub const LAUNCH_ROUTING_KEY: &str = "activity.launch";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            QueueError::Internal {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize an envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            QueueError::InvalidCommandRequest {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Serialization and validation for inbound command requests
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize and validate a command request
    pub fn deserialize_command_request(bytes: &[u8]) -> Result<CommandRequest> {
        let request: CommandRequest =
            serde_json::from_slice(bytes).map_err(|e| QueueError::InvalidCommandRequest {
                reason: format!("Failed to deserialize command request: {}", e),
            })?;

        Self::validate_command_request(&request)?;
        Ok(request)
    }

    /// Validate a command request
    pub fn validate_command_request(request: &CommandRequest) -> Result<()> {
        if request.player_id.trim().is_empty() {
            return Err(QueueError::InvalidCommandRequest {
                reason: "Player ID cannot be empty".to_string(),
            }
            .into());
        }

        if let PlayerCommand::Join { category } = &request.command {
            if category.trim().is_empty() {
                return Err(QueueError::InvalidCommandRequest {
                    reason: "Join command requires a category".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}
