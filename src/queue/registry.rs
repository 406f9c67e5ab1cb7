//! Shared registry of active groups and player memberships
//!
//! One owned table of groups by id and one membership entry per tracked
//! player, mutated only by the coordinator and the group scheduler. Keeping
//! both under a single lock makes "remove group + forget its members" atomic,
//! which is what upholds the single-membership invariant.

use crate::error::QueueError;
use crate::queue::group::MatchGroup;
use crate::types::{GroupId, Membership, PlayerId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct RegistryInner {
    groups: HashMap<GroupId, MatchGroup>,
    memberships: HashMap<PlayerId, Membership>,
}

/// Handle to the shared group/membership tables
#[derive(Clone, Default)]
pub struct GroupRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

type Result<T> = std::result::Result<T, QueueError>;

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group and move its members to Grouped state
    pub fn insert_group(&self, group: MatchGroup) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        let group_id = group.id();
        for member in group.members() {
            inner
                .memberships
                .insert(member.clone(), Membership::Grouped(group_id));
        }
        inner.groups.insert(group_id, group);
        Ok(())
    }

    /// Remove a group, forgetting the membership of everyone it still tracks
    pub fn remove_group(&self, group_id: GroupId) -> Result<Option<MatchGroup>> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        let group = inner.groups.remove(&group_id);
        if let Some(group) = &group {
            for member in group.members() {
                if inner.memberships.get(member) == Some(&Membership::Grouped(group_id)) {
                    inner.memberships.remove(member);
                }
            }
        }
        Ok(group)
    }

    /// Run a closure against a group, if it is still active
    pub fn with_group<R>(
        &self,
        group_id: GroupId,
        f: impl FnOnce(&MatchGroup) -> R,
    ) -> Result<Option<R>> {
        let inner = self.inner.read().map_err(|_| QueueError::lock("registry"))?;
        Ok(inner.groups.get(&group_id).map(f))
    }

    /// Run a mutating closure against a group, if it is still active
    pub fn with_group_mut<R>(
        &self,
        group_id: GroupId,
        f: impl FnOnce(&mut MatchGroup) -> R,
    ) -> Result<Option<R>> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        Ok(inner.groups.get_mut(&group_id).map(f))
    }

    pub fn contains_group(&self, group_id: GroupId) -> Result<bool> {
        let inner = self.inner.read().map_err(|_| QueueError::lock("registry"))?;
        Ok(inner.groups.contains_key(&group_id))
    }

    pub fn group_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(|_| QueueError::lock("registry"))?;
        Ok(inner.groups.len())
    }

    /// Current membership of a player, if tracked
    pub fn membership(&self, player_id: &PlayerId) -> Result<Option<Membership>> {
        let inner = self.inner.read().map_err(|_| QueueError::lock("registry"))?;
        Ok(inner.memberships.get(player_id).cloned())
    }

    /// Mark a player as waiting in the named category's pool
    pub fn set_pooled(&self, player_id: &PlayerId, category: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        inner
            .memberships
            .insert(player_id.clone(), Membership::Pooled(category.to_string()));
        Ok(())
    }

    /// Forget a player's membership entirely
    pub fn clear_membership(&self, player_id: &PlayerId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        inner.memberships.remove(player_id);
        Ok(())
    }

    /// Counts of (pooled, grouped) players
    pub fn tracked_counts(&self) -> Result<(usize, usize)> {
        let inner = self.inner.read().map_err(|_| QueueError::lock("registry"))?;
        let pooled = inner
            .memberships
            .values()
            .filter(|m| matches!(m, Membership::Pooled(_)))
            .count();
        let grouped = inner.memberships.len() - pooled;
        Ok((pooled, grouped))
    }

    /// Drop every group and membership, returning the ids of all players that
    /// were still tracked (for the shutdown notice).
    pub fn clear(&self) -> Result<Vec<PlayerId>> {
        let mut inner = self.inner.write().map_err(|_| QueueError::lock("registry"))?;
        let tracked = inner.memberships.keys().cloned().collect();
        inner.groups.clear();
        inner.memberships.clear();
        Ok(tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::messages::MessageCatalog;
    use crate::config::queues::QueueDefinition;
    use crate::notify::RecordingNotifier;

    fn test_group(members: &[&str]) -> MatchGroup {
        let mut def = QueueDefinition::named("duo");
        def.max_players = members.len();
        MatchGroup::new(
            Arc::new(def),
            members.iter().map(|m| m.to_string()).collect(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(MessageCatalog::with_defaults()),
        )
    }

    #[test]
    fn test_insert_tracks_members_as_grouped() {
        let registry = GroupRegistry::new();
        let group = test_group(&["a", "b"]);
        let group_id = group.id();
        registry.insert_group(group).unwrap();

        assert_eq!(registry.group_count().unwrap(), 1);
        assert_eq!(
            registry.membership(&"a".to_string()).unwrap(),
            Some(Membership::Grouped(group_id))
        );
        assert_eq!(registry.tracked_counts().unwrap(), (0, 2));
    }

    #[test]
    fn test_remove_group_forgets_members() {
        let registry = GroupRegistry::new();
        let group = test_group(&["a", "b"]);
        let group_id = group.id();
        registry.insert_group(group).unwrap();

        let removed = registry.remove_group(group_id).unwrap();
        assert!(removed.is_some());
        assert_eq!(registry.membership(&"a".to_string()).unwrap(), None);
        assert_eq!(registry.group_count().unwrap(), 0);

        // Removing again is a no-op
        assert!(registry.remove_group(group_id).unwrap().is_none());
    }

    #[test]
    fn test_with_group_mut_on_missing_group() {
        let registry = GroupRegistry::new();
        let missing = crate::utils::generate_group_id();
        let seen = registry.with_group_mut(missing, |_| ()).unwrap();
        assert!(seen.is_none());
    }

    #[test]
    fn test_clear_returns_tracked_players() {
        let registry = GroupRegistry::new();
        registry.insert_group(test_group(&["a", "b"])).unwrap();
        registry.set_pooled(&"c".to_string(), "duo").unwrap();

        let mut tracked = registry.clear().unwrap();
        tracked.sort();
        assert_eq!(tracked, vec!["a", "b", "c"]);
        assert_eq!(registry.group_count().unwrap(), 0);
        assert_eq!(registry.tracked_counts().unwrap(), (0, 0));
    }
}
