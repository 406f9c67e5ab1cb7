//! Configuration management for the match queue service

pub mod app;
pub mod messages;
pub mod queues;

pub use app::{AppConfig, AmqpSettings, ServiceSettings};
pub use messages::MessageCatalog;
pub use queues::{DefinitionProvider, QueueDefinition, StaticDefinitionProvider};
