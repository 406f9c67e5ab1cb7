//! Notification seam between the queue core and the host platform
//!
//! The core addresses players through this trait only; the AMQP-backed
//! implementation lives in `amqp::publisher`, and `RecordingNotifier` backs
//! the tests.

use crate::types::PlayerId;
use std::collections::HashSet;
use std::sync::Mutex;

/// Outbound messaging and presence lookup for players
pub trait Notifier: Send + Sync {
    /// Deliver a chat-style message to one player
    fn send_message(&self, player_id: &PlayerId, text: &str);

    /// Issue an activity-launch command on behalf of one player
    fn dispatch_command(&self, player_id: &PlayerId, command: &str);

    /// Whether the player is currently connected
    fn is_online(&self, player_id: &PlayerId) -> bool;

    /// Record a connect or disconnect observed on the wire
    fn set_presence(&self, player_id: &PlayerId, online: bool);
}

/// In-memory notifier for tests: records everything, everyone is online
/// unless marked otherwise.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(PlayerId, String)>>,
    commands: Mutex<Vec<(PlayerId, String)>>,
    offline: Mutex<HashSet<PlayerId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages in delivery order
    pub fn messages(&self) -> Vec<(PlayerId, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Messages delivered to one player, in order
    pub fn messages_for(&self, player_id: &str) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| {
                m.iter()
                    .filter(|(p, _)| p == player_id)
                    .map(|(_, text)| text.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All recorded dispatch commands in delivery order
    pub fn commands(&self) -> Vec<(PlayerId, String)> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn set_offline(&self, player_id: &str) {
        if let Ok(mut offline) = self.offline.lock() {
            offline.insert(player_id.to_string());
        }
    }

    pub fn set_online(&self, player_id: &str) {
        if let Ok(mut offline) = self.offline.lock() {
            offline.remove(player_id);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
        if let Ok(mut commands) = self.commands.lock() {
            commands.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send_message(&self, player_id: &PlayerId, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((player_id.clone(), text.to_string()));
        }
    }

    fn dispatch_command(&self, player_id: &PlayerId, command: &str) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push((player_id.clone(), command.to_string()));
        }
    }

    fn is_online(&self, player_id: &PlayerId) -> bool {
        self.offline
            .lock()
            .map(|offline| !offline.contains(player_id))
            .unwrap_or(false)
    }

    fn set_presence(&self, player_id: &PlayerId, online: bool) {
        if online {
            self.set_online(player_id);
        } else {
            self.set_offline(player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_records_in_order() {
        let notifier = RecordingNotifier::new();
        notifier.send_message(&"a".to_string(), "first");
        notifier.send_message(&"b".to_string(), "second");
        notifier.send_message(&"a".to_string(), "third");

        assert_eq!(notifier.messages_for("a"), vec!["first", "third"]);
        assert_eq!(notifier.messages().len(), 3);
    }

    #[test]
    fn test_presence_tracking() {
        let notifier = RecordingNotifier::new();
        let player = "a".to_string();
        assert!(notifier.is_online(&player));
        notifier.set_offline("a");
        assert!(!notifier.is_online(&player));
        notifier.set_online("a");
        assert!(notifier.is_online(&player));
    }
}
