mod scheduler;
mod task;
mod watcher;

pub use scheduler::RefreshScheduler;
pub use task::{RefreshReason, RefreshTask, ScheduleRefresh, DEFAULT_REGION};
pub use watcher::{affected_release_ids, MutationWatcher, DEFAULT_DISPATCH_INTERVAL};
