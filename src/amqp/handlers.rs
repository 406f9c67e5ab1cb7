//! AMQP message handling: consuming player commands off the wire
//!
//! Inbound `CommandRequest` messages are deserialized, validated, and routed
//! to the coordinator. Malformed payloads are logged and dropped; the broker
//! auto-acks on this queue, so a poison message cannot wedge the consumer.

use crate::amqp::messages::MessageUtils;
use crate::config::messages::MessageCatalog;
use crate::error::{QueueError, Result};
use crate::notify::Notifier;
use crate::queue::coordinator::MatchCoordinator;
use crate::types::{CommandRequest, PlayerCommand};
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Routes validated player commands to the coordinator
pub struct CommandRouter {
    coordinator: MatchCoordinator,
    notifier: Arc<dyn Notifier>,
    messages: Arc<MessageCatalog>,
}

impl CommandRouter {
    pub fn new(
        coordinator: MatchCoordinator,
        notifier: Arc<dyn Notifier>,
        messages: Arc<MessageCatalog>,
    ) -> Self {
        Self {
            coordinator,
            notifier,
            messages,
        }
    }

    /// Dispatch one command to the coordinator
    pub fn route(&self, request: CommandRequest) -> Result<()> {
        let player_id = request.player_id;
        match request.command {
            PlayerCommand::Join { category } => self.coordinator.join_queue(&player_id, &category),
            PlayerCommand::Leave => self.coordinator.leave_queue(&player_id),
            PlayerCommand::Confirm => self.coordinator.confirm_participation(&player_id),
            PlayerCommand::ListQueues => {
                for status in self.coordinator.queue_listing()? {
                    let line = self.messages.render(
                        "queue.list.entry",
                        &[
                            ("queue", status.category),
                            ("current", status.waiting.to_string()),
                            ("min", status.min_players.to_string()),
                            ("max", status.max_players.to_string()),
                        ],
                    );
                    self.notifier.send_message(&player_id, &line);
                }
                Ok(())
            }
            PlayerCommand::Connected => {
                self.notifier.set_presence(&player_id, true);
                Ok(())
            }
            PlayerCommand::Disconnected => {
                self.notifier.set_presence(&player_id, false);
                self.coordinator.handle_disconnect(&player_id)
            }
        }
    }
}

/// Consumer for the player command queue
pub struct CommandRequestConsumer {
    router: Arc<CommandRouter>,
    channel: Channel,
    consumer_tag: String,
}

impl CommandRequestConsumer {
    pub fn new(router: Arc<CommandRouter>, channel: Channel) -> Self {
        let consumer_tag = format!("command-consumer-{}", uuid::Uuid::new_v4());

        Self {
            router,
            channel,
            consumer_tag,
        }
    }

    /// Start consuming messages from the command queue
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag)
            .auto_ack(true)
            .finish();

        self.channel
            .basic_consume(InboundConsumer::new(self.router.clone()), args)
            .await
            .map_err(|e| QueueError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming messages from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| QueueError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming messages");
        Ok(())
    }
}

struct InboundConsumer {
    router: Arc<CommandRouter>,
}

impl InboundConsumer {
    fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }

    fn process_message(&self, content: &[u8]) -> Result<()> {
        let request = MessageUtils::deserialize_command_request(content)?;
        info!(
            "Command request parsed - player_id: '{}', command: {:?}",
            request.player_id, request.command
        );
        self.router.route(request)
    }
}

#[async_trait]
impl AsyncConsumer for InboundConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        info!(
            "AMQP message received - delivery_tag: {}, routing_key: '{}', size: {} bytes",
            delivery_tag,
            deliver.routing_key(),
            content.len()
        );

        if let Err(e) = self.process_message(&content) {
            error!(
                "Message processing failed - delivery_tag: {}, error: {}",
                delivery_tag, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::queues::{QueueDefinition, StaticDefinitionProvider};
    use crate::metrics::MetricsCollector;
    use crate::notify::RecordingNotifier;
    use crate::queue::registry::GroupRegistry;
    use crate::queue::scheduler::GroupScheduler;
    use crate::sched::{ManualTickScheduler, TickScheduler};
    use crate::utils::current_timestamp;

    fn test_router() -> (CommandRouter, Arc<RecordingNotifier>) {
        let registry = GroupRegistry::new();
        let ticker = Arc::new(ManualTickScheduler::new()) as Arc<dyn TickScheduler>;
        let notifier = Arc::new(RecordingNotifier::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let messages = Arc::new(MessageCatalog::with_defaults());
        let scheduler = GroupScheduler::new(registry.clone(), ticker, metrics.clone());
        let mut def = QueueDefinition::named("duo");
        def.max_players = 2;
        let provider = Arc::new(StaticDefinitionProvider::new(vec![def]).unwrap());
        let coordinator = MatchCoordinator::new(
            provider,
            registry,
            scheduler,
            notifier.clone(),
            messages.clone(),
            metrics,
        );
        (
            CommandRouter::new(coordinator, notifier.clone(), messages),
            notifier,
        )
    }

    fn request(player: &str, command: PlayerCommand) -> CommandRequest {
        CommandRequest {
            player_id: player.to_string(),
            command,
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_join_command_routed() {
        let (router, notifier) = test_router();
        router
            .route(request(
                "alice",
                PlayerCommand::Join {
                    category: "duo".to_string(),
                },
            ))
            .unwrap();

        assert_eq!(
            notifier.messages_for("alice"),
            vec!["You joined the duo queue (1/2)".to_string()]
        );
    }

    #[test]
    fn test_list_command_renders_entries() {
        let (router, notifier) = test_router();
        router
            .route(request(
                "alice",
                PlayerCommand::Join {
                    category: "duo".to_string(),
                },
            ))
            .unwrap();
        router
            .route(request("bob", PlayerCommand::ListQueues))
            .unwrap();

        assert_eq!(
            notifier.messages_for("bob"),
            vec!["duo: 1 waiting (2-2 players)".to_string()]
        );
    }

    #[test]
    fn test_presence_commands_update_notifier() {
        let (router, notifier) = test_router();
        let bob = "bob".to_string();

        router
            .route(request("bob", PlayerCommand::Disconnected))
            .unwrap();
        assert!(!notifier.is_online(&bob));

        router
            .route(request("bob", PlayerCommand::Connected))
            .unwrap();
        assert!(notifier.is_online(&bob));
    }

    #[test]
    fn test_disconnect_removes_from_pool() {
        let (router, notifier) = test_router();
        router
            .route(request(
                "alice",
                PlayerCommand::Join {
                    category: "duo".to_string(),
                },
            ))
            .unwrap();
        router
            .route(request("alice", PlayerCommand::Disconnected))
            .unwrap();

        router
            .route(request("bob", PlayerCommand::ListQueues))
            .unwrap();
        assert_eq!(
            notifier.messages_for("bob"),
            vec!["duo: 0 waiting (2-2 players)".to_string()]
        );
        // No farewell for a dropped connection
        assert_eq!(notifier.messages_for("alice").len(), 1);
    }
}
