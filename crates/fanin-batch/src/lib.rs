//! fanin-batch: request batching and coalescing engine
//!
//! This crate contains the backend-agnostic core of the agent:
//!
//! - [`Request`] - one pending operation with its delivery channel
//! - [`Batcher`] - queues requests, forms size- and time-bounded batches,
//!   coalesces equivalent operations, and fans results back to every caller
//! - [`Executor`] - the seam a backend adapter implements to execute one
//!   batch worth of distinct operations
//!
//! The batcher is deliberately single-consumer: one worker task drains the
//! submission channel, which is what makes per-batch grouping correct
//! without any locking on the hot path.

pub mod batcher;
pub mod error;
pub mod executor;
pub mod request;

pub use batcher::{Batcher, BatcherConfig};
pub use error::{BatchError, BatchResult};
pub use executor::Executor;
pub use request::{Operation, Request};
