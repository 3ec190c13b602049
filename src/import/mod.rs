//! The batched-parallel import engine.

pub mod batch;
pub mod driver;
pub mod executor;
pub mod future;
pub mod notifier;
pub mod pool;

pub use batch::{Batch, BatchBuilder, Lane, Window};
pub use driver::{run_import, ImportSummary};
pub use executor::{BatchRunner, MAX_BATCH_ATTEMPTS};
pub use future::{pair, pair_with_notifier, Future, Promise};
pub use notifier::{Notifier, ReadinessToken};
pub use pool::WorkerPool;
