//! Hand-driven tick scheduler for deterministic tests
//!
//! Time only moves when `advance` is called. Callbacks may re-enter the
//! scheduler to register or cancel tasks, including cancelling themselves.

use crate::sched::{OnceTask, RepeatingTask, TaskId, TickScheduler};
use std::collections::HashMap;
use std::sync::Mutex;

struct ManualTask {
    remaining: u64,
    interval: Option<u64>,
    /// Taken out while the callback runs so re-entrant cancels see the entry
    callback: Option<RepeatingTask>,
}

#[derive(Default)]
struct Inner {
    next_id: TaskId,
    tasks: HashMap<TaskId, ManualTask>,
}

/// Deterministic in-process tick scheduler
#[derive(Default)]
pub struct ManualTickScheduler {
    inner: Mutex<Inner>,
}

impl ManualTickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently registered
    pub fn pending(&self) -> usize {
        self.inner.lock().map(|inner| inner.tasks.len()).unwrap_or(0)
    }

    fn insert(&self, remaining: u64, interval: Option<u64>, callback: RepeatingTask) -> TaskId {
        let mut inner = self.inner.lock().expect("scheduler lock poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner.tasks.insert(
            id,
            ManualTask {
                // A zero delay still waits for the next tick
                remaining: remaining.max(1),
                interval,
                callback: Some(callback),
            },
        );
        id
    }

    /// Advance simulated time by `ticks`, firing every task that comes due
    pub fn advance(&self, ticks: u64) {
        for _ in 0..ticks {
            let due: Vec<(TaskId, RepeatingTask)> = {
                let mut inner = self.inner.lock().expect("scheduler lock poisoned");
                let mut due = Vec::new();
                let mut ids: Vec<TaskId> = inner.tasks.keys().copied().collect();
                ids.sort_unstable();
                for id in ids {
                    let task = inner.tasks.get_mut(&id).expect("task disappeared");
                    task.remaining = task.remaining.saturating_sub(1);
                    if task.remaining == 0 {
                        if let Some(callback) = task.callback.take() {
                            due.push((id, callback));
                        }
                    }
                }
                due
            };

            for (id, mut callback) in due {
                // Lock released: the callback may schedule or cancel freely
                callback();

                let mut inner = self.inner.lock().expect("scheduler lock poisoned");
                match inner.tasks.get_mut(&id) {
                    Some(task) => match task.interval {
                        Some(interval) => {
                            task.remaining = interval;
                            task.callback = Some(callback);
                        }
                        None => {
                            inner.tasks.remove(&id);
                        }
                    },
                    // Cancelled from inside the callback
                    None => {}
                }
            }
        }
    }
}

impl TickScheduler for ManualTickScheduler {
    fn run_once(&self, delay_ticks: u64, task: OnceTask) -> TaskId {
        let mut task = Some(task);
        self.insert(
            delay_ticks,
            None,
            Box::new(move || {
                if let Some(task) = task.take() {
                    task();
                }
            }),
        )
    }

    fn run_repeating(
        &self,
        initial_delay_ticks: u64,
        interval_ticks: u64,
        task: RepeatingTask,
    ) -> TaskId {
        self.insert(initial_delay_ticks, Some(interval_ticks.max(1)), task)
    }

    fn cancel(&self, id: TaskId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.tasks.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_run_once_fires_exactly_once() {
        let sched = ManualTickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        sched.run_once(
            3,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sched.advance(2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sched.advance(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sched.advance(10);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_repeating_interval() {
        let sched = ManualTickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        sched.run_repeating(
            1,
            5,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sched.advance(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sched.advance(4);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sched.advance(1);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        sched.advance(10);
        assert_eq!(fired.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let sched = ManualTickScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        let id = sched.run_once(
            2,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sched.cancel(id);
        sched.cancel(id);
        sched.advance(5);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_can_schedule_more_work() {
        let sched = Arc::new(ManualTickScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_sched = Arc::clone(&sched);
        let counter = Arc::clone(&fired);
        sched.run_once(
            1,
            Box::new(move || {
                let counter = Arc::clone(&counter);
                inner_sched.run_once(
                    1,
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        sched.advance(1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sched.advance(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeating_task_can_cancel_itself() {
        let sched = Arc::new(ManualTickScheduler::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let id_cell = Arc::new(Mutex::new(0u64));
        let inner_sched = Arc::clone(&sched);
        let counter = Arc::clone(&fired);
        let id_for_task = Arc::clone(&id_cell);
        let id = sched.run_repeating(
            1,
            1,
            Box::new(move || {
                let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if count == 3 {
                    inner_sched.cancel(*id_for_task.lock().unwrap());
                }
            }),
        );
        *id_cell.lock().unwrap() = id;

        sched.advance(10);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(sched.pending(), 0);
    }
}
