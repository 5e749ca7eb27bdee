//! The pending-request object and the operation trait it carries.

use std::hash::Hash;

use tokio::sync::oneshot;

use crate::error::{BatchError, BatchResult};

/// An operation that can be batched and coalesced.
///
/// Equivalence is defined by [`Operation::group_key`]: two operations
/// with equal keys in the same batch are satisfied by a single backend
/// call. For the closed operation enums used by the agent the key is the
/// operation value itself, which makes the grouping tuples exhaustive by
/// construction (a parameterless operation like a full bucket listing
/// always collapses into one group).
pub trait Operation: Clone + Send + 'static {
    /// Grouping key: operations with equal keys coalesce.
    type GroupKey: Hash + Eq + Clone + Send;

    fn group_key(&self) -> Self::GroupKey;

    /// Short operation name for logs and error messages.
    fn name(&self) -> &'static str;
}

/// A pending operation together with its delivery channel.
///
/// Constructed by the HTTP front, owned by the batcher from submission
/// until delivery. Exactly one value is delivered, exactly once: the
/// sender is consumed by [`Request::deliver`], so a second delivery is
/// unrepresentable. If the request is dropped without delivery (worker
/// aborted during shutdown), the receiver observes a closed channel and
/// the caller maps that to a shutdown error.
#[derive(Debug)]
pub struct Request<O, R> {
    op: O,
    reply: oneshot::Sender<BatchResult<R>>,
}

impl<O: Operation, R> Request<O, R> {
    /// Creates a request and the receiving half of its delivery channel.
    pub fn new(op: O) -> (Self, oneshot::Receiver<BatchResult<R>>) {
        let (reply, rx) = oneshot::channel();
        (Self { op, reply }, rx)
    }

    pub fn op(&self) -> &O {
        &self.op
    }

    /// Delivers the result or error, consuming the request.
    ///
    /// A send error only means the caller gave up waiting; the value is
    /// dropped in that case.
    pub fn deliver(self, result: BatchResult<R>) {
        let _ = self.reply.send(result);
    }

    /// Fails the request without consulting any backend.
    pub fn fail(self, error: BatchError) {
        self.deliver(Err(error));
    }
}
