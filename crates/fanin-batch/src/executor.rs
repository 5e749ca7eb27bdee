//! The executor seam between the batcher and a backend adapter.

use async_trait::async_trait;

use crate::error::{BatchError, BatchResult};
use crate::request::Operation;

/// Executes one batch worth of distinct operations against a backend.
///
/// The batcher hands the executor one representative operation per group,
/// in first-seen order. Where the backend supports it (key-value
/// pipelines) the whole slice is issued as a single network round trip;
/// otherwise the adapter is free to run the operations concurrently.
///
/// Failure semantics mirror the fan-out model:
///
/// - outer `Err` - the whole batch failed (connection checkout, pipeline
///   transport); every member of every group receives that error;
/// - inner `Err` at index `i` - only the group behind `ops[i]` failed;
/// - replies must be `Clone` so one backend result can be distributed to
///   every coalesced member.
///
/// Executors never retry; retries are a caller concern.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    type Op: Operation;
    type Reply: Clone + Send + 'static;

    async fn execute(
        &self,
        ops: &[Self::Op],
    ) -> BatchResult<Vec<BatchResult<Self::Reply>>>;

    /// Human-readable backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// One-shot connectivity probe used at startup. Failures are
    /// reported as warnings by the caller and never abort startup.
    async fn probe(&self) -> Result<(), BatchError> {
        Ok(())
    }
}
