//! Matchmaking core: waiting pools, match groups, and the machinery that
//! moves players between them.
//!
//! `MatchCoordinator` is the public face; everything else backs it. Pools
//! collect joiners per category, the registry tracks formed groups and who
//! belongs where, and the scheduler drives each group's announcement,
//! confirmation window, and launch countdown on the tick clock.

pub mod coordinator;
pub mod group;
pub mod pool;
pub mod registry;
pub mod scheduler;

pub use coordinator::{MatchCoordinator, ServiceStats};
pub use group::MatchGroup;
pub use pool::WaitingPool;
pub use registry::GroupRegistry;
pub use scheduler::GroupScheduler;
