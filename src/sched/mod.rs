//! Tick-based scheduling primitives
//!
//! The queue core never blocks: waiting is expressed as callbacks scheduled
//! against this narrow contract. One tick is 50ms (20 ticks per second).
//! `TokioTickScheduler` is the production implementation; `ManualTickScheduler`
//! drives time by hand for deterministic tests.

pub mod manual;
pub mod tokio;

pub use manual::ManualTickScheduler;
pub use tokio::TokioTickScheduler;

/// Opaque handle for a scheduled task
pub type TaskId = u64;

/// One-shot callback
pub type OnceTask = Box<dyn FnOnce() + Send>;

/// Repeating callback
pub type RepeatingTask = Box<dyn FnMut() + Send>;

/// Deferred and periodic callback scheduling in ticks
pub trait TickScheduler: Send + Sync {
    /// Run `task` once after `delay_ticks`
    fn run_once(&self, delay_ticks: u64, task: OnceTask) -> TaskId;

    /// Run `task` after `initial_delay_ticks`, then every `interval_ticks`
    fn run_repeating(&self, initial_delay_ticks: u64, interval_ticks: u64, task: RepeatingTask)
        -> TaskId;

    /// Cancel a scheduled task; unknown or finished ids are a no-op
    fn cancel(&self, id: TaskId);
}
