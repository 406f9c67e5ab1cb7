//! Group scheduler: announcement pipeline and per-group timers
//!
//! Owns two things: the FIFO of freshly formed groups awaiting their ready
//! announcement, processed through a single in-flight slot so no two groups'
//! announcements interleave (serialized across all categories), and the named
//! timer table keyed `{group_id}_{purpose}` so any group's timers can be
//! cancelled together by prefix. Confirmation and countdown windows run
//! independently and concurrently once started; only the announcement step is
//! serialized.

use crate::error::QueueError;
use crate::metrics::MetricsCollector;
use crate::queue::registry::GroupRegistry;
use crate::sched::{TaskId, TickScheduler};
use crate::types::{CountdownStep, GroupId, RemovalReason};
use crate::utils::{seconds_to_ticks, TICKS_PER_SECOND};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

const PURPOSE_PROCESS: &str = "process";
const PURPOSE_TIMEOUT: &str = "timeout";
const PURPOSE_COUNTDOWN: &str = "countdown";

/// Shared key for the post-timeout grace delay; deliberately not group-keyed
/// so a timed-out group leaves no timer behind under its own id.
const ANNOUNCE_BUFFER_KEY: &str = "announce_buffer";

fn timer_key(group_id: GroupId, purpose: &str) -> String {
    format!("{}_{}", group_id, purpose)
}

#[derive(Default)]
struct AnnounceState {
    pending: VecDeque<GroupId>,
    in_flight: Option<GroupId>,
}

/// Advances groups through announcement, confirmation, countdown, and
/// dispatch; owns every per-group timer.
#[derive(Clone)]
pub struct GroupScheduler {
    registry: GroupRegistry,
    ticker: Arc<dyn TickScheduler>,
    metrics: Arc<MetricsCollector>,
    timers: Arc<Mutex<HashMap<String, TaskId>>>,
    announce: Arc<Mutex<AnnounceState>>,
}

impl GroupScheduler {
    pub fn new(
        registry: GroupRegistry,
        ticker: Arc<dyn TickScheduler>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            ticker,
            metrics,
            timers: Arc::new(Mutex::new(HashMap::new())),
            announce: Arc::new(Mutex::new(AnnounceState::default())),
        }
    }

    /// Enqueue a freshly formed group for announcement; begins processing
    /// immediately if no other announcement is in flight.
    pub fn schedule_group(&self, group_id: GroupId) {
        if let Ok(mut announce) = self.announce.lock() {
            announce.pending.push_back(group_id);
        }
        self.process_next();
    }

    fn process_next(&self) {
        let group_id = {
            let Ok(mut announce) = self.announce.lock() else {
                return;
            };
            if announce.in_flight.is_some() {
                return;
            }
            let Some(group_id) = announce.pending.pop_front() else {
                return;
            };
            announce.in_flight = Some(group_id);
            group_id
        };

        let this = self.clone();
        let task = self
            .ticker
            .run_once(1, Box::new(move || this.run_announcement(group_id)));
        self.register(timer_key(group_id, PURPOSE_PROCESS), task);
    }

    /// The one-tick-deferred announcement step for the group at the head of
    /// the FIFO. A group that was already resolved (everyone left) is a
    /// silent no-op; a group whose members all confirmed before this step ran
    /// skips the confirmation window entirely.
    fn run_announcement(&self, group_id: GroupId) {
        self.unregister(&timer_key(group_id, PURPOSE_PROCESS));

        let params = self.registry.with_group_mut(group_id, |group| {
            group.notify_ready();
            let def = group.definition();
            let (requires, seconds, buffer) = (
                def.requires_confirmation,
                def.confirmation_seconds,
                def.buffer_ticks,
            );
            if !requires {
                return (false, seconds, buffer);
            }
            group.begin_confirmation();
            if group.all_confirmed() {
                // Everyone confirmed before the announcement step ran
                group.notify_all_confirmed();
                (false, seconds, buffer)
            } else {
                (true, seconds, buffer)
            }
        });

        match params {
            Ok(Some((true, confirmation_seconds, buffer_ticks))) => {
                self.start_confirmation(group_id, confirmation_seconds, buffer_ticks);
            }
            Ok(Some((false, _, _))) => {
                self.start_countdown(group_id);
            }
            Ok(None) => {
                debug!("skipping announcement for stale group {}", group_id);
            }
            Err(e) => {
                error!("announcement for group {} failed: {}", group_id, e);
            }
        }

        self.release_slot(group_id);
    }

    fn release_slot(&self, group_id: GroupId) {
        let more = {
            let Ok(mut announce) = self.announce.lock() else {
                return;
            };
            if announce.in_flight == Some(group_id) {
                announce.in_flight = None;
            }
            !announce.pending.is_empty()
        };
        if more {
            self.process_next();
        }
    }

    fn start_confirmation(&self, group_id: GroupId, confirmation_seconds: u64, buffer_ticks: u64) {
        let this = self.clone();
        let task = self.ticker.run_once(
            seconds_to_ticks(confirmation_seconds),
            Box::new(move || this.handle_confirmation_timeout(group_id, buffer_ticks)),
        );
        self.register(timer_key(group_id, PURPOSE_TIMEOUT), task);
    }

    fn handle_confirmation_timeout(&self, group_id: GroupId, buffer_ticks: u64) {
        self.unregister(&timer_key(group_id, PURPOSE_TIMEOUT));

        let timed_out = self.registry.with_group_mut(group_id, |group| {
            if group.all_confirmed() {
                false
            } else {
                group.timeout();
                true
            }
        });

        match timed_out {
            Ok(Some(true)) => {
                if let Err(e) = self.remove_group(group_id, RemovalReason::TimedOut) {
                    error!("failed to deregister timed-out group {}: {}", group_id, e);
                }
                // Grace gap before the announcement queue resumes
                let this = self.clone();
                let task = self.ticker.run_once(
                    buffer_ticks.max(1),
                    Box::new(move || {
                        this.unregister(ANNOUNCE_BUFFER_KEY);
                        this.process_next();
                    }),
                );
                self.register(ANNOUNCE_BUFFER_KEY.to_string(), task);
            }
            Ok(Some(false)) => {
                // Fully confirmed in the meantime; the countdown owns it now
            }
            Ok(None) => {
                debug!("confirmation timeout for stale group {}", group_id);
            }
            Err(e) => {
                error!("confirmation timeout for group {} failed: {}", group_id, e);
            }
        }
    }

    /// Cancel the now-moot confirmation timer and begin the once-per-second
    /// countdown. The repeating timer self-cancels once the group is gone.
    pub fn start_countdown(&self, group_id: GroupId) {
        self.cancel_key(&timer_key(group_id, PURPOSE_TIMEOUT));

        if let Err(e) = self
            .registry
            .with_group_mut(group_id, |group| group.begin_countdown())
        {
            error!("failed to mark group {} counting down: {}", group_id, e);
        }

        let this = self.clone();
        let task = self.ticker.run_repeating(
            1,
            TICKS_PER_SECOND,
            Box::new(move || this.countdown_tick(group_id)),
        );
        self.register(timer_key(group_id, PURPOSE_COUNTDOWN), task);
    }

    fn countdown_tick(&self, group_id: GroupId) {
        match self
            .registry
            .with_group_mut(group_id, |group| group.update_countdown())
        {
            Ok(Some(CountdownStep::Dispatched)) => {
                if let Err(e) = self.remove_group(group_id, RemovalReason::Dispatched) {
                    error!("failed to deregister dispatched group {}: {}", group_id, e);
                }
            }
            Ok(Some(CountdownStep::Ticked(_))) => {}
            Ok(None) => {
                // Group already resolved by another path
                self.cancel_key(&timer_key(group_id, PURPOSE_COUNTDOWN));
            }
            Err(e) => {
                error!("countdown tick for group {} failed: {}", group_id, e);
            }
        }
    }

    /// Deregister a group and cancel every timer it still owns. Every removal
    /// path (empty-out, timeout, dispatch, shutdown) funnels through here so
    /// no group can outlive its timers, or vice versa.
    pub fn remove_group(
        &self,
        group_id: GroupId,
        reason: RemovalReason,
    ) -> Result<bool, QueueError> {
        let removed = self.registry.remove_group(group_id)?;
        self.cancel_group_tasks(group_id);

        if let Some(group) = &removed {
            let category = group.definition().name.as_str();
            match reason {
                RemovalReason::Dispatched => {
                    self.metrics
                        .groups_dispatched_total
                        .with_label_values(&[category])
                        .inc();
                }
                _ => {
                    self.metrics
                        .groups_cancelled_total
                        .with_label_values(&[reason.as_label()])
                        .inc();
                }
            }
            self.metrics
                .active_groups
                .set(self.registry.group_count()? as i64);
        }

        Ok(removed.is_some())
    }

    /// Cancel every timer keyed by this group id; idempotent. Cancelling the
    /// pending announcement step of the in-flight group also frees the slot,
    /// so an emptied-out group cannot stall the pipeline.
    pub fn cancel_group_tasks(&self, group_id: GroupId) {
        let prefix = group_id.to_string();
        let cancelled: Vec<(String, TaskId)> = match self.timers.lock() {
            Ok(mut timers) => {
                let keys: Vec<String> = timers
                    .keys()
                    .filter(|key| key.starts_with(&prefix))
                    .cloned()
                    .collect();
                keys.into_iter()
                    .filter_map(|key| timers.remove(&key).map(|id| (key, id)))
                    .collect()
            }
            Err(_) => return,
        };

        for (_, id) in &cancelled {
            self.ticker.cancel(*id);
        }

        if cancelled
            .iter()
            .any(|(key, _)| key.ends_with(PURPOSE_PROCESS))
        {
            self.release_slot(group_id);
        }
    }

    /// Whether any timer is still registered under this group's id
    pub fn has_group_tasks(&self, group_id: GroupId) -> bool {
        let prefix = group_id.to_string();
        self.timers
            .lock()
            .map(|timers| timers.keys().any(|key| key.starts_with(&prefix)))
            .unwrap_or(false)
    }

    /// Total registered timers, buffer delay included
    pub fn timer_count(&self) -> usize {
        self.timers.lock().map(|timers| timers.len()).unwrap_or(0)
    }

    /// Cancel every outstanding timer and drop the announcement queue
    pub fn shutdown(&self) {
        let all: Vec<TaskId> = match self.timers.lock() {
            Ok(mut timers) => timers.drain().map(|(_, id)| id).collect(),
            Err(_) => Vec::new(),
        };
        for id in all {
            self.ticker.cancel(id);
        }
        if let Ok(mut announce) = self.announce.lock() {
            announce.pending.clear();
            announce.in_flight = None;
        }
    }

    fn register(&self, key: String, task: TaskId) {
        let old = match self.timers.lock() {
            Ok(mut timers) => timers.insert(key, task),
            Err(_) => None,
        };
        if let Some(old) = old {
            self.ticker.cancel(old);
        }
    }

    fn unregister(&self, key: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.remove(key);
        }
    }

    fn cancel_key(&self, key: &str) {
        let id = match self.timers.lock() {
            Ok(mut timers) => timers.remove(key),
            Err(_) => None,
        };
        if let Some(id) = id {
            self.ticker.cancel(id);
        }
    }
}
