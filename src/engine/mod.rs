//! Worker-pool engine: a shared FIFO backlog consumed by a fixed set of threads.

mod queue;
mod worker;

pub use queue::{MAX_WORKERS, WorkerQueue};
