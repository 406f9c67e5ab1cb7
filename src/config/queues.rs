//! Queue category definitions and the provider seam
//!
//! A `QueueDefinition` carries the static parameters of one matchmaking
//! category. Definitions are created at configuration load and never mutated;
//! the coordinator looks them up case-insensitively through a
//! `DefinitionProvider`.

use crate::error::{QueueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Static parameters for one matchmaking category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDefinition {
    /// Category name, unique case-insensitively
    pub name: String,
    /// Pool capacity; reaching it forms a match group
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    /// Informational lower bound, surfaced by the list command
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    /// Activity-launch command template ({queue} and {player} placeholders)
    #[serde(default)]
    pub activity_command: String,
    /// Ready-confirmation window in seconds
    #[serde(default = "default_confirmation_seconds")]
    pub confirmation_seconds: u64,
    /// Countdown length in seconds once everyone has confirmed
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u32,
    /// Grace delay in ticks before the announcement queue resumes after a
    /// timed-out group
    #[serde(default = "default_buffer_ticks")]
    pub buffer_ticks: u64,
    /// Whether the confirmation phase runs at all
    #[serde(default = "default_requires_confirmation")]
    pub requires_confirmation: bool,
}

fn default_max_players() -> usize {
    12
}

fn default_min_players() -> usize {
    2
}

fn default_confirmation_seconds() -> u64 {
    30
}

fn default_countdown_seconds() -> u32 {
    10
}

fn default_buffer_ticks() -> u64 {
    20
}

fn default_requires_confirmation() -> bool {
    true
}

impl QueueDefinition {
    /// Create a definition with default timings for the given category
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            max_players: default_max_players(),
            min_players: default_min_players(),
            activity_command: format!("match start {}", name),
            confirmation_seconds: default_confirmation_seconds(),
            countdown_seconds: default_countdown_seconds(),
            buffer_ticks: default_buffer_ticks(),
            requires_confirmation: default_requires_confirmation(),
        }
    }

    /// Substitute the command template for a dispatched member
    pub fn launch_command(&self, player_id: &str) -> String {
        self.activity_command
            .replace("{queue}", &self.name)
            .replace("{player}", player_id)
    }
}

/// Validate a single queue definition
pub fn validate_definition(def: &QueueDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(QueueError::ConfigurationError {
            message: "queue name cannot be empty".to_string(),
        }
        .into());
    }
    if def.max_players == 0 {
        return Err(QueueError::ConfigurationError {
            message: format!("queue '{}': max_players must be greater than 0", def.name),
        }
        .into());
    }
    if def.min_players > def.max_players {
        return Err(QueueError::ConfigurationError {
            message: format!(
                "queue '{}': min_players cannot exceed max_players",
                def.name
            ),
        }
        .into());
    }
    if def.requires_confirmation && def.confirmation_seconds == 0 {
        return Err(QueueError::ConfigurationError {
            message: format!(
                "queue '{}': confirmation_seconds must be greater than 0",
                def.name
            ),
        }
        .into());
    }
    Ok(())
}

/// Trait for looking up queue definitions
pub trait DefinitionProvider: Send + Sync {
    /// Get the definition for a category, case-insensitive
    fn definition(&self, category: &str) -> Option<Arc<QueueDefinition>>;

    /// All configured definitions, in load order
    fn all(&self) -> Vec<Arc<QueueDefinition>>;
}

/// Provider backed by the definitions loaded at startup
#[derive(Debug, Clone)]
pub struct StaticDefinitionProvider {
    by_name: HashMap<String, Arc<QueueDefinition>>,
    order: Vec<Arc<QueueDefinition>>,
}

impl StaticDefinitionProvider {
    /// Build a provider from validated definitions; empty activity commands
    /// fall back to `match start <name>`.
    pub fn new(definitions: Vec<QueueDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(QueueError::ConfigurationError {
                message: "at least one queue definition is required".to_string(),
            }
            .into());
        }

        let mut by_name = HashMap::new();
        let mut order = Vec::new();

        for mut def in definitions {
            if def.activity_command.trim().is_empty() {
                def.activity_command = format!("match start {}", def.name);
            }
            validate_definition(&def)?;

            let key = def.name.to_lowercase();
            let def = Arc::new(def);
            if by_name.insert(key, Arc::clone(&def)).is_some() {
                return Err(QueueError::ConfigurationError {
                    message: format!("duplicate queue definition: {}", def.name),
                }
                .into());
            }
            order.push(def);
        }

        Ok(Self { by_name, order })
    }
}

impl DefinitionProvider for StaticDefinitionProvider {
    fn definition(&self, category: &str) -> Option<Arc<QueueDefinition>> {
        self.by_name.get(&category.to_lowercase()).cloned()
    }

    fn all(&self) -> Vec<Arc<QueueDefinition>> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_defaults() {
        let def = QueueDefinition::named("duo");
        assert_eq!(def.max_players, 12);
        assert_eq!(def.min_players, 2);
        assert_eq!(def.confirmation_seconds, 30);
        assert_eq!(def.countdown_seconds, 10);
        assert_eq!(def.buffer_ticks, 20);
        assert!(def.requires_confirmation);
        assert_eq!(def.activity_command, "match start duo");
    }

    #[test]
    fn test_launch_command_substitution() {
        let mut def = QueueDefinition::named("bedwars");
        def.activity_command = "bw join {queue} {player}".to_string();
        assert_eq!(def.launch_command("alice"), "bw join bedwars alice");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let provider =
            StaticDefinitionProvider::new(vec![QueueDefinition::named("Duo")]).unwrap();
        assert!(provider.definition("duo").is_some());
        assert!(provider.definition("DUO").is_some());
        assert!(provider.definition("trio").is_none());
    }

    #[test]
    fn test_validation_rejects_bad_definitions() {
        let mut def = QueueDefinition::named("duo");
        def.max_players = 0;
        assert!(StaticDefinitionProvider::new(vec![def]).is_err());

        let mut def = QueueDefinition::named("duo");
        def.min_players = 20;
        assert!(StaticDefinitionProvider::new(vec![def]).is_err());

        let mut def = QueueDefinition::named("duo");
        def.confirmation_seconds = 0;
        assert!(StaticDefinitionProvider::new(vec![def.clone()]).is_err());
        def.requires_confirmation = false;
        assert!(StaticDefinitionProvider::new(vec![def]).is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_rejected() {
        assert!(StaticDefinitionProvider::new(vec![]).is_err());

        let dup = vec![QueueDefinition::named("duo"), QueueDefinition::named("DUO")];
        assert!(StaticDefinitionProvider::new(dup).is_err());
    }
}
