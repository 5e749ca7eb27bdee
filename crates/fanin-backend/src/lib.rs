//! fanin-backend: backend executors for the fanin agent
//!
//! Two adapters implement the engine's [`Executor`] seam:
//!
//! - [`object::ObjectStoreExecutor`] - bucket-scoped object storage
//!   (list buckets, list objects, fetch object) over the AWS S3 SDK
//! - [`kv::KvExecutor`] - key-value operations (get, set, del, exists)
//!   pipelined over a pooled Redis connection
//!
//! Both adapters translate one batch worth of distinct operations into
//! backend calls and report failures per group or per batch, as the
//! engine's fan-out model requires.
//!
//! [`Executor`]: fanin_batch::Executor

pub mod error;
pub mod kv;
pub mod object;

pub use error::{BackendError, BackendResult};
pub use kv::{KvConfig, KvExecutor, KvOp, KvReply};
pub use object::{
    BucketListing, ObjectListing, ObjectOp, ObjectPayload, ObjectReply, ObjectStoreConfig,
    ObjectStoreExecutor,
};
