//! Tokio-backed tick scheduler

use crate::sched::{OnceTask, RepeatingTask, TaskId, TickScheduler};
use crate::utils::tick_duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Scheduler that spawns one tokio task per timer and aborts it on cancel.
/// Must be created and used inside a tokio runtime.
#[derive(Default)]
pub struct TokioTickScheduler {
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<TaskId, JoinHandle<()>>>>,
}

impl TokioTickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> TaskId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn track(&self, id: TaskId, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if handle.is_finished() {
                tasks.remove(&id);
            } else {
                tasks.insert(id, handle);
            }
        }
    }

    /// Number of timers still tracked
    pub fn task_count(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }
}

impl TickScheduler for TokioTickScheduler {
    fn run_once(&self, delay_ticks: u64, task: OnceTask) -> TaskId {
        let id = self.next_id();
        let tasks = Arc::clone(&self.tasks);
        let handle = tokio::spawn(async move {
            sleep(tick_duration(delay_ticks)).await;
            task();
            if let Ok(mut tasks) = tasks.lock() {
                tasks.remove(&id);
            }
        });
        self.track(id, handle);
        id
    }

    fn run_repeating(
        &self,
        initial_delay_ticks: u64,
        interval_ticks: u64,
        mut task: RepeatingTask,
    ) -> TaskId {
        let id = self.next_id();
        let handle = tokio::spawn(async move {
            sleep(tick_duration(initial_delay_ticks)).await;
            loop {
                task();
                sleep(tick_duration(interval_ticks)).await;
            }
        });
        self.track(id, handle);
        id
    }

    fn cancel(&self, id: TaskId) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(handle) = tasks.remove(&id) {
                handle.abort();
            }
        }
    }
}
