//! Core orchestration machinery
//!
//! Pure state and concurrency primitives with no knowledge of the concrete
//! collaborators: the persisted progress tree, the deduplicating merge, the
//! retry policy, the bounded worker pool, and run statistics.

pub mod dedup;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod state;

pub use progress::{ProgressStore, ProgressTree};
pub use retry::RetryPolicy;
pub use scheduler::{CancellationFlag, TaskCompletion, TaskOutcome, TaskScheduler};
pub use state::{CountryOutcome, RunStats};
