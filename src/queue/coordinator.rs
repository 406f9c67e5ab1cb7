//! Coordinator: the single entrypoint for player commands
//!
//! Routes join, leave, confirm, and listing requests against the waiting
//! pools and the group registry, forming a match group as soon as a pool
//! fills. Denials that are the player's own doing (already queued, unknown
//! category, nothing to confirm) become notifier messages rather than
//! errors; only internal failures propagate to the caller.

use crate::config::messages::MessageCatalog;
use crate::config::queues::DefinitionProvider;
use crate::error::{QueueError, Result};
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::queue::group::MatchGroup;
use crate::queue::pool::WaitingPool;
use crate::queue::registry::GroupRegistry;
use crate::queue::scheduler::GroupScheduler;
use crate::types::{GroupId, GroupState, Membership, PlayerId, QueueStatus, RemovalReason};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Snapshot served by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub players_waiting: usize,
    pub players_in_groups: usize,
    pub active_groups: usize,
    pub categories: usize,
}

#[derive(Clone)]
pub struct MatchCoordinator {
    definitions: Arc<dyn DefinitionProvider>,
    pools: Arc<RwLock<HashMap<String, WaitingPool>>>,
    registry: GroupRegistry,
    scheduler: GroupScheduler,
    notifier: Arc<dyn Notifier>,
    messages: Arc<MessageCatalog>,
    metrics: Arc<MetricsCollector>,
}

impl MatchCoordinator {
    pub fn new(
        definitions: Arc<dyn DefinitionProvider>,
        registry: GroupRegistry,
        scheduler: GroupScheduler,
        notifier: Arc<dyn Notifier>,
        messages: Arc<MessageCatalog>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let pools = definitions
            .all()
            .into_iter()
            .map(|def| {
                let key = def.name.to_lowercase();
                (key, WaitingPool::new(def))
            })
            .collect();
        Self {
            definitions,
            pools: Arc::new(RwLock::new(pools)),
            registry,
            scheduler,
            notifier,
            messages,
            metrics,
        }
    }

    /// Put a player into a category's waiting pool; forms and schedules a
    /// group when the pool reaches capacity.
    pub fn join_queue(&self, player_id: &PlayerId, category: &str) -> Result<()> {
        self.deliver(player_id, self.try_join(player_id, category))
    }

    fn try_join(
        &self,
        player_id: &PlayerId,
        category: &str,
    ) -> std::result::Result<(), QueueError> {
        if self.registry.membership(player_id)?.is_some() {
            return Err(QueueError::AlreadyQueued);
        }
        let definition = self
            .definitions
            .definition(category)
            .ok_or_else(|| QueueError::UnknownCategory {
                category: category.to_string(),
            })?;

        let mut pools = self
            .pools
            .write()
            .map_err(|_| QueueError::lock("waiting pools"))?;
        let pool = pools
            .get_mut(&definition.name.to_lowercase())
            .ok_or_else(|| QueueError::UnknownCategory {
                category: category.to_string(),
            })?;

        if !pool.add_player(player_id) {
            return Err(QueueError::QueueFull {
                category: definition.name.clone(),
            });
        }
        self.registry.set_pooled(player_id, &definition.name)?;

        let ack = self.messages.render(
            "queue.join.success",
            &[
                ("queue", definition.name.clone()),
                ("current", pool.len().to_string()),
                ("max", definition.max_players.to_string()),
            ],
        );
        self.notifier.send_message(player_id, &ack);
        self.metrics
            .joins_total
            .with_label_values(&[definition.name.as_str()])
            .inc();
        info!("{} joined queue {}", player_id, definition.name);

        if pool.is_full() {
            let members = pool.members();
            pool.clear();
            self.form_group(&definition.name, members)?;
        }

        self.refresh_gauges()?;
        Ok(())
    }

    fn form_group(
        &self,
        category: &str,
        members: Vec<PlayerId>,
    ) -> std::result::Result<(), QueueError> {
        let definition =
            self.definitions
                .definition(category)
                .ok_or_else(|| QueueError::UnknownCategory {
                    category: category.to_string(),
                })?;
        let group = MatchGroup::new(
            definition,
            members,
            self.notifier.clone(),
            self.messages.clone(),
        );
        let group_id = group.id();
        self.registry.insert_group(group)?;
        self.scheduler.schedule_group(group_id);
        self.metrics
            .groups_formed_total
            .with_label_values(&[category])
            .inc();
        info!("formed group {} for queue {}", group_id, category);
        Ok(())
    }

    /// Remove a player from wherever they are tracked, pool or group
    pub fn leave_queue(&self, player_id: &PlayerId) -> Result<()> {
        self.deliver(player_id, self.try_leave(player_id, true))
    }

    /// A dropped connection is treated as a leave, except that an untracked
    /// player is not an error and no farewell is sent.
    pub fn handle_disconnect(&self, player_id: &PlayerId) -> Result<()> {
        match self.try_leave(player_id, false) {
            Ok(()) => Ok(()),
            Err(QueueError::NotQueued) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn try_leave(
        &self,
        player_id: &PlayerId,
        notify: bool,
    ) -> std::result::Result<(), QueueError> {
        let membership = self
            .registry
            .membership(player_id)?
            .ok_or(QueueError::NotQueued)?;

        match membership {
            Membership::Pooled(category) => {
                let mut pools = self
                    .pools
                    .write()
                    .map_err(|_| QueueError::lock("waiting pools"))?;
                if let Some(pool) = pools.get_mut(&category.to_lowercase()) {
                    pool.remove_player(player_id);
                }
                self.registry.clear_membership(player_id)?;
            }
            Membership::Grouped(group_id) => {
                let outcome = self.registry.with_group_mut(group_id, |group| {
                    group.remove_player(player_id);
                    (group.is_empty(), group.state(), group.all_confirmed())
                })?;
                self.registry.clear_membership(player_id)?;

                match outcome {
                    Some((true, _, _)) => {
                        self.scheduler.remove_group(group_id, RemovalReason::Emptied)?;
                        info!("group {} emptied out, cancelled", group_id);
                    }
                    Some((false, GroupState::Confirming, true)) => {
                        // The leaver was the last holdout
                        self.complete_confirmation(group_id)?;
                    }
                    _ => {}
                }
            }
        }

        if notify {
            let farewell = self.messages.render("queue.leave.success", &[]);
            self.notifier.send_message(player_id, &farewell);
        }
        self.metrics.leaves_total.inc();
        info!("{} left the queue", player_id);
        self.refresh_gauges()?;
        Ok(())
    }

    /// Record a player's ready confirmation; starts the countdown once the
    /// whole group has confirmed. Confirming during the countdown is an
    /// acknowledged no-op, never a countdown restart.
    pub fn confirm_participation(&self, player_id: &PlayerId) -> Result<()> {
        self.deliver(player_id, self.try_confirm(player_id))
    }

    fn try_confirm(&self, player_id: &PlayerId) -> std::result::Result<(), QueueError> {
        let membership = self
            .registry
            .membership(player_id)?
            .ok_or(QueueError::NotQueued)?;

        let group_id = match membership {
            Membership::Pooled(_) => return Err(QueueError::NoPendingConfirmation),
            Membership::Grouped(group_id) => group_id,
        };

        let outcome = self.registry.with_group_mut(group_id, |group| {
            group.confirm_player(player_id);
            (group.state(), group.all_confirmed())
        })?;
        let (state, all_confirmed) = outcome.ok_or_else(|| QueueError::StaleGroup {
            group_id: group_id.to_string(),
        })?;

        let ack = self.messages.render("queue.group.confirm-success", &[]);
        self.notifier.send_message(player_id, &ack);

        if all_confirmed && state == GroupState::Confirming {
            self.complete_confirmation(group_id)?;
        } else {
            debug!(
                "confirmation from {} for group {} in state {}",
                player_id, group_id, state
            );
        }
        Ok(())
    }

    fn complete_confirmation(&self, group_id: GroupId) -> std::result::Result<(), QueueError> {
        self.registry
            .with_group_mut(group_id, |group| group.notify_all_confirmed())?;
        self.scheduler.start_countdown(group_id);
        info!("group {} fully confirmed, countdown started", group_id);
        Ok(())
    }

    /// Current standing of every configured category, in definition order
    pub fn queue_listing(&self) -> Result<Vec<QueueStatus>> {
        let pools = self
            .pools
            .read()
            .map_err(|_| QueueError::lock("waiting pools"))?;
        let mut listing = Vec::new();
        for definition in self.definitions.all() {
            let waiting = pools
                .get(&definition.name.to_lowercase())
                .map(|pool| pool.len())
                .unwrap_or(0);
            listing.push(QueueStatus {
                category: definition.name.clone(),
                waiting,
                min_players: definition.min_players,
                max_players: definition.max_players,
            });
        }
        Ok(listing)
    }

    pub fn stats(&self) -> Result<ServiceStats> {
        let (pooled, grouped) = self.registry.tracked_counts()?;
        Ok(ServiceStats {
            players_waiting: pooled,
            players_in_groups: grouped,
            active_groups: self.registry.group_count()?,
            categories: self.definitions.all().len(),
        })
    }

    /// Cancel all timers, notify every tracked player, and empty all state
    pub fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown();

        let notice = self.messages.render("queue.shutdown", &[]);
        let tracked = self.registry.clear()?;
        for player_id in &tracked {
            self.notifier.send_message(player_id, &notice);
        }

        let mut pools = self
            .pools
            .write()
            .map_err(|_| QueueError::lock("waiting pools"))?;
        for pool in pools.values_mut() {
            pool.clear();
        }
        drop(pools);

        self.metrics.players_waiting.set(0);
        self.metrics.active_groups.set(0);
        info!("coordinator shut down, {} players notified", tracked.len());
        Ok(())
    }

    /// Turn a player-caused denial into a notifier message; anything else
    /// propagates.
    fn deliver(
        &self,
        player_id: &PlayerId,
        result: std::result::Result<(), QueueError>,
    ) -> Result<()> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        let (key, params, kind): (&str, Vec<(&str, String)>, &str) = match &err {
            QueueError::AlreadyQueued => ("queue.join.already-in", vec![], "already_queued"),
            QueueError::UnknownCategory { category } => (
                "queue.join.not-found",
                vec![("queue", category.clone())],
                "unknown_category",
            ),
            QueueError::QueueFull { category } => (
                "queue.join.full",
                vec![("queue", category.clone())],
                "queue_full",
            ),
            QueueError::NotQueued => ("queue.leave.not-in", vec![], "not_queued"),
            QueueError::NoPendingConfirmation | QueueError::StaleGroup { .. } => {
                ("queue.confirm.none", vec![], "no_confirmation")
            }
            _ => return Err(err.into()),
        };
        let text = self.messages.render(key, &params);
        self.notifier.send_message(player_id, &text);
        self.metrics
            .rejections_total
            .with_label_values(&[kind])
            .inc();
        debug!("denied {}: {}", player_id, err);
        Ok(())
    }

    fn refresh_gauges(&self) -> std::result::Result<(), QueueError> {
        let (pooled, _) = self.registry.tracked_counts()?;
        self.metrics.players_waiting.set(pooled as i64);
        self.metrics
            .active_groups
            .set(self.registry.group_count()? as i64);
        Ok(())
    }
}
