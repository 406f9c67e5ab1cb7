//! Match group state machine
//!
//! A group is created the instant a pool fills, with a frozen member list and
//! an all-false confirmation map. It moves Formed -> Confirming -> Countdown
//! -> Dispatched, or to the absorbing Cancelled state on timeout or when
//! departures empty it. Removal from the active registry is always the
//! caller's job; the group itself only tracks members and broadcasts.

use crate::config::messages::MessageCatalog;
use crate::config::queues::QueueDefinition;
use crate::notify::Notifier;
use crate::types::{CountdownStep, GroupId, GroupState, PlayerId};
use crate::utils::{current_timestamp, generate_group_id};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// One formed group moving through confirmation, countdown, and dispatch
#[derive(Clone)]
pub struct MatchGroup {
    id: GroupId,
    definition: Arc<QueueDefinition>,
    members: Vec<PlayerId>,
    confirmations: HashMap<PlayerId, bool>,
    countdown_remaining: u32,
    state: GroupState,
    created_at: DateTime<Utc>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<MessageCatalog>,
}

impl MatchGroup {
    /// Build a group from a pool snapshot; all members start unconfirmed
    pub fn new(
        definition: Arc<QueueDefinition>,
        members: Vec<PlayerId>,
        notifier: Arc<dyn Notifier>,
        messages: Arc<MessageCatalog>,
    ) -> Self {
        let confirmations = members
            .iter()
            .map(|member| (member.clone(), false))
            .collect();
        let countdown_remaining = definition.countdown_seconds;
        Self {
            id: generate_group_id(),
            definition,
            members,
            confirmations,
            countdown_remaining,
            state: GroupState::Formed,
            created_at: current_timestamp(),
            notifier,
            messages,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn definition(&self) -> &Arc<QueueDefinition> {
        &self.definition
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn members(&self) -> &[PlayerId] {
        &self.members
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.members.contains(player_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Broadcast the ready announcement and, when confirmation is required,
    /// the confirmation prompt, to currently-online members. No state change.
    pub fn notify_ready(&self) {
        let ready = self.messages.render("queue.group.ready", &[]);
        let prompt = self.messages.render(
            "queue.group.confirm-prompt",
            &[("seconds", self.definition.confirmation_seconds.to_string())],
        );

        for member in &self.members {
            if self.notifier.is_online(member) {
                self.notifier.send_message(member, &ready);
                if self.definition.requires_confirmation {
                    self.notifier.send_message(member, &prompt);
                }
            }
        }
    }

    /// Transition into the confirmation window
    pub fn begin_confirmation(&mut self) {
        self.state = GroupState::Confirming;
    }

    /// Transition into the countdown phase
    pub fn begin_countdown(&mut self) {
        self.state = GroupState::Countdown;
    }

    /// Mark a member confirmed; false if the player is not tracked
    pub fn confirm_player(&mut self, player_id: &PlayerId) -> bool {
        match self.confirmations.get_mut(player_id) {
            Some(confirmed) => {
                *confirmed = true;
                true
            }
            None => false,
        }
    }

    /// True iff every currently-tracked member has confirmed
    pub fn all_confirmed(&self) -> bool {
        self.confirmations.values().all(|confirmed| *confirmed)
    }

    /// Broadcast that every member has confirmed
    pub fn notify_all_confirmed(&self) {
        let text = self.messages.render("queue.group.confirm-all", &[]);
        self.broadcast(&text);
    }

    /// One countdown tick: broadcast remaining seconds, or dispatch at zero.
    /// Members who disconnected simply do not receive the launch command;
    /// dispatch never fails the whole group.
    pub fn update_countdown(&mut self) -> CountdownStep {
        if self.countdown_remaining == 0 {
            self.dispatch();
            return CountdownStep::Dispatched;
        }

        let text = self.messages.render(
            "queue.group.countdown",
            &[("seconds", self.countdown_remaining.to_string())],
        );
        self.broadcast(&text);
        self.countdown_remaining -= 1;
        CountdownStep::Ticked(self.countdown_remaining)
    }

    fn dispatch(&mut self) {
        let launching = self.messages.render("queue.group.launching", &[]);
        self.broadcast(&launching);

        for member in &self.members {
            if self.notifier.is_online(member) {
                let command = self.definition.launch_command(member);
                self.notifier.dispatch_command(member, &command);
            }
        }

        self.state = GroupState::Dispatched;
    }

    /// Broadcast the cancellation notice; does not touch the registry
    pub fn cancel(&mut self) {
        let text = self.messages.render("queue.group.cancelled", &[]);
        self.broadcast(&text);
        self.state = GroupState::Cancelled;
    }

    /// Broadcast the timed-out notice, then the same cancellation as `cancel`
    pub fn timeout(&mut self) {
        let text = self.messages.render("queue.group.timeout", &[]);
        self.broadcast(&text);
        self.cancel();
    }

    /// Detach a member from tracking and confirmations; true if removed.
    /// An emptied group is the caller's cue to treat it as cancelled.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member != player_id);
        if self.members.len() < before {
            self.confirmations.remove(player_id);
            true
        } else {
            false
        }
    }

    /// Send a message to every still-online member
    pub fn broadcast(&self, text: &str) {
        for member in &self.members {
            if self.notifier.is_online(member) {
                self.notifier.send_message(member, text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;

    fn duo_group() -> (MatchGroup, Arc<RecordingNotifier>) {
        let mut def = QueueDefinition::named("duo");
        def.max_players = 2;
        def.countdown_seconds = 3;
        def.activity_command = "match start {queue}".to_string();
        let notifier = Arc::new(RecordingNotifier::new());
        let group = MatchGroup::new(
            Arc::new(def),
            vec!["a".to_string(), "b".to_string()],
            notifier.clone(),
            Arc::new(MessageCatalog::with_defaults()),
        );
        (group, notifier)
    }

    #[test]
    fn test_new_group_starts_unconfirmed() {
        let (group, _) = duo_group();
        assert_eq!(group.state(), GroupState::Formed);
        assert!(!group.all_confirmed());
        assert!(group.contains_player(&"a".to_string()));
        assert!(!group.contains_player(&"z".to_string()));
    }

    #[test]
    fn test_confirm_tracking() {
        let (mut group, _) = duo_group();
        assert!(group.confirm_player(&"a".to_string()));
        assert!(!group.all_confirmed());
        assert!(group.confirm_player(&"b".to_string()));
        assert!(group.all_confirmed());
        // Strangers cannot confirm
        assert!(!group.confirm_player(&"z".to_string()));
    }

    #[test]
    fn test_removing_unconfirmed_member_can_complete_group() {
        let (mut group, _) = duo_group();
        group.confirm_player(&"a".to_string());
        assert!(!group.all_confirmed());

        assert!(group.remove_player(&"b".to_string()));
        assert!(group.all_confirmed());
        assert!(!group.is_empty());

        assert!(group.remove_player(&"a".to_string()));
        assert!(group.is_empty());
    }

    #[test]
    fn test_notify_ready_includes_prompt_when_required() {
        let (group, notifier) = duo_group();
        group.notify_ready();

        let for_a = notifier.messages_for("a");
        assert_eq!(for_a.len(), 2);
        assert!(for_a[0].contains("ready"));
        assert!(for_a[1].contains("/confirm"));
        assert!(for_a[1].contains("30s"));
    }

    #[test]
    fn test_notify_ready_skips_offline_members() {
        let (group, notifier) = duo_group();
        notifier.set_offline("b");
        group.notify_ready();

        assert_eq!(notifier.messages_for("a").len(), 2);
        assert!(notifier.messages_for("b").is_empty());
    }

    #[test]
    fn test_countdown_runs_down_then_dispatches() {
        let (mut group, notifier) = duo_group();
        assert_eq!(group.update_countdown(), CountdownStep::Ticked(2));
        assert_eq!(group.update_countdown(), CountdownStep::Ticked(1));
        assert_eq!(group.update_countdown(), CountdownStep::Ticked(0));
        assert_eq!(group.update_countdown(), CountdownStep::Dispatched);
        assert_eq!(group.state(), GroupState::Dispatched);

        let countdowns: Vec<String> = notifier
            .messages_for("a")
            .into_iter()
            .filter(|m| m.contains("starts in"))
            .collect();
        assert_eq!(countdowns.len(), 3);
        assert!(countdowns[0].contains("3s"));
        assert!(countdowns[2].contains("1s"));

        let commands = notifier.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], ("a".to_string(), "match start duo".to_string()));
    }

    #[test]
    fn test_dispatch_skips_offline_members() {
        let (mut group, notifier) = duo_group();
        notifier.set_offline("b");
        group.countdown_remaining = 0;
        assert_eq!(group.update_countdown(), CountdownStep::Dispatched);

        let commands = notifier.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "a");
    }

    #[test]
    fn test_timeout_broadcasts_timeout_then_cancellation() {
        let (mut group, notifier) = duo_group();
        group.timeout();
        assert_eq!(group.state(), GroupState::Cancelled);

        let for_a = notifier.messages_for("a");
        assert_eq!(for_a.len(), 2);
        assert!(for_a[0].contains("timed out"));
        assert!(for_a[1].contains("cancelled"));
    }
}
