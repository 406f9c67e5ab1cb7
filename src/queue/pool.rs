//! Waiting pool for one matchmaking category
//!
//! Pure bookkeeping below capacity: no timers, no external calls. The
//! coordinator's membership table is the source of truth for which pool a
//! player is in; the pool only tracks its own members in join order.

use crate::config::queues::QueueDefinition;
use crate::types::PlayerId;
use std::sync::Arc;

/// Players enqueued for one category, below capacity
#[derive(Debug, Clone)]
pub struct WaitingPool {
    definition: Arc<QueueDefinition>,
    members: Vec<PlayerId>,
}

impl WaitingPool {
    pub fn new(definition: Arc<QueueDefinition>) -> Self {
        Self {
            definition,
            members: Vec::new(),
        }
    }

    /// Add a player; false if the pool is already at capacity or the player
    /// is already in it.
    pub fn add_player(&mut self, player_id: &PlayerId) -> bool {
        if self.is_full() || self.members.contains(player_id) {
            return false;
        }
        self.members.push(player_id.clone());
        true
    }

    /// Remove a player; no-op if absent
    pub fn remove_player(&mut self, player_id: &PlayerId) {
        self.members.retain(|member| member != player_id);
    }

    /// Remove all members, leaving the pool empty for future joiners
    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.definition.max_players
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.members.contains(player_id)
    }

    /// Snapshot of current members in join order
    pub fn members(&self) -> Vec<PlayerId> {
        self.members.clone()
    }

    pub fn definition(&self) -> &Arc<QueueDefinition> {
        &self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn duo_pool() -> WaitingPool {
        let mut def = QueueDefinition::named("duo");
        def.max_players = 2;
        WaitingPool::new(Arc::new(def))
    }

    #[test]
    fn test_add_until_full() {
        let mut pool = duo_pool();
        assert!(pool.add_player(&"a".to_string()));
        assert!(!pool.is_full());
        assert!(pool.add_player(&"b".to_string()));
        assert!(pool.is_full());
        assert!(!pool.add_player(&"c".to_string()));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut pool = duo_pool();
        assert!(pool.add_player(&"a".to_string()));
        assert!(!pool.add_player(&"a".to_string()));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut pool = duo_pool();
        pool.add_player(&"a".to_string());
        pool.add_player(&"b".to_string());

        pool.remove_player(&"a".to_string());
        assert_eq!(pool.members(), vec!["b".to_string()]);

        // Removing an absent player is a no-op
        pool.remove_player(&"zz".to_string());
        assert_eq!(pool.len(), 1);

        pool.clear();
        assert!(pool.is_empty());
        assert!(!pool.is_full());
    }

    #[test]
    fn test_members_preserve_join_order() {
        let mut def = QueueDefinition::named("squad");
        def.max_players = 4;
        let mut pool = WaitingPool::new(Arc::new(def));
        for name in ["c", "a", "b"] {
            pool.add_player(&name.to_string());
        }
        assert_eq!(
            pool.members(),
            vec!["c".to_string(), "a".to_string(), "b".to_string()]
        );
    }

    proptest! {
        /// The pool never exceeds its capacity under any join/leave sequence
        #[test]
        fn prop_capacity_never_exceeded(ops in prop::collection::vec((0u8..16, prop::bool::ANY), 0..64)) {
            let mut def = QueueDefinition::named("squad");
            def.max_players = 4;
            let mut pool = WaitingPool::new(Arc::new(def));

            for (player, join) in ops {
                let id = format!("p{}", player);
                if join {
                    pool.add_player(&id);
                } else {
                    pool.remove_player(&id);
                }
                prop_assert!(pool.len() <= 4);
                prop_assert_eq!(pool.is_full(), pool.len() == 4);
            }
        }
    }
}
