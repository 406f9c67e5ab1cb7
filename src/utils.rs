//! Utility functions for the match queue service

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Scheduler ticks per second, matching the host tick rate
pub const TICKS_PER_SECOND: u64 = 20;

/// Generate a new unique group ID
pub fn generate_group_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to scheduler ticks
pub fn seconds_to_ticks(seconds: u64) -> u64 {
    seconds * TICKS_PER_SECOND
}

/// Wall-clock duration of the given number of ticks
pub fn tick_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks * 1000 / TICKS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_group_id();
        let id2 = generate_group_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_seconds_to_ticks() {
        assert_eq!(seconds_to_ticks(0), 0);
        assert_eq!(seconds_to_ticks(1), 20);
        assert_eq!(seconds_to_ticks(30), 600);
    }

    #[test]
    fn test_tick_duration() {
        assert_eq!(tick_duration(20), Duration::from_secs(1));
        assert_eq!(tick_duration(1), Duration::from_millis(50));
    }
}
