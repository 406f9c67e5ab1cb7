//! AMQP integration: broker connection, wire messages, the inbound command
//! consumer, and the outbound notifier.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::{CommandRequestConsumer, CommandRouter};
pub use messages::MessageEnvelope;
pub use publisher::{AmqpNotifier, PublisherConfig};
