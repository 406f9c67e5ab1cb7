//! Common types used throughout the match queue service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for match groups
pub type GroupId = Uuid;

/// Lifecycle state of a match group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupState {
    /// Group has been formed but not yet announced
    Formed,
    /// Ready announcement sent, waiting for member confirmations
    Confirming,
    /// All members confirmed, countdown running
    Countdown,
    /// Activity command issued to members (terminal state)
    Dispatched,
    /// Cancelled by timeout or departures (terminal state)
    Cancelled,
}

impl std::fmt::Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupState::Formed => write!(f, "Formed"),
            GroupState::Confirming => write!(f, "Confirming"),
            GroupState::Countdown => write!(f, "Countdown"),
            GroupState::Dispatched => write!(f, "Dispatched"),
            GroupState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Result of one countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Countdown still running; remaining seconds after this tick
    Ticked(u32),
    /// Countdown hit zero and the activity command was dispatched
    Dispatched,
}

/// Where a tracked player currently sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    /// Waiting in the pool of the named category
    Pooled(String),
    /// Member of an active match group
    Grouped(GroupId),
}

/// Why a group was removed from the active registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Emptied,
    TimedOut,
    Dispatched,
    Shutdown,
}

impl RemovalReason {
    /// Label used for the cancellation metrics counter
    pub fn as_label(&self) -> &'static str {
        match self {
            RemovalReason::Emptied => "emptied",
            RemovalReason::TimedOut => "timeout",
            RemovalReason::Dispatched => "dispatched",
            RemovalReason::Shutdown => "shutdown",
        }
    }
}

/// Read-only per-category status for the list/info commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub category: String,
    pub waiting: usize,
    pub min_players: usize,
    pub max_players: usize,
}

/// Inbound player command, delivered over the command queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// `queue join <category>`
    Join { category: String },
    /// `queue leave`
    Leave,
    /// `confirm` (ready confirmation)
    Confirm,
    /// `queue list`
    ListQueues,
    /// Host signals the player came online
    Connected,
    /// Host signals connection loss
    Disconnected,
}

/// Request wrapper for an inbound player command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub player_id: PlayerId,
    pub command: PlayerCommand,
    pub timestamp: DateTime<Utc>,
}

/// Outbound chat-style message addressed to one player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerNotice {
    pub player_id: PlayerId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Outbound activity-launch command for one dispatched member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLaunch {
    pub player_id: PlayerId,
    pub command: String,
    pub timestamp: DateTime<Utc>,
}
