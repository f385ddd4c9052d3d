//! # bgqueue
//!
//! Bounded background work queue: a fixed pool of worker threads consumes
//! [`WorkRef`](model::WorkRef) items from a shared FIFO backlog, tracks each
//! item through processing to success or failure, and exposes consistent
//! status snapshots plus operations to clear or requeue failed work.
//!
//! The [`report`] module is a client of the queue that fetches dealership
//! data in parallel and ranks the results.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod report;
pub mod telemetry;

pub use engine::WorkerQueue;
pub use error::{Error, Result};
pub use model::{QueueStatus, Work, WorkRef};
