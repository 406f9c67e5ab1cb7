//! Ready Room - Match queue and ready-check microservice
//!
//! This crate provides category-based player queueing over AMQP: players
//! join named queues, full pools become match groups, groups run a
//! ready-confirmation window and a launch countdown, and dispatched members
//! receive their activity-launch commands.

pub mod amqp;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod sched;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use config::{DefinitionProvider, StaticDefinitionProvider};
pub use notify::Notifier;
pub use queue::{GroupRegistry, GroupScheduler, MatchCoordinator};
pub use sched::TickScheduler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
