//! Object-storage backend executor over the AWS S3 SDK.
//!
//! Distinct groups of one batch execute concurrently; each group is a
//! single SDK call whose failure affects only that group. Fetched
//! object bodies are buffered into [`Bytes`], so a coalesced fetch fans
//! out reference-counted copies of the same payload to every caller.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::list_buckets::ListBucketsOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::Client;
use bytes::Bytes;
use fanin_batch::{BatchError, BatchResult, Executor, Operation};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::BackendError;

/// Listing cap applied when the caller does not ask for one.
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Concurrent SDK calls per batch. Groups beyond this wait for a slot.
const GROUP_CONCURRENCY: usize = 4;

/// Settings for the object-store backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub region: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
        }
    }
}

/// Object-store operations.
///
/// The enum is its own grouping key; in particular every `ListBuckets`
/// value is equal to every other, so such requests always collapse into
/// a single group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectOp {
    ListBuckets,
    ListObjects {
        bucket: String,
        prefix: String,
        max_keys: i32,
    },
    GetObject {
        bucket: String,
        key: String,
    },
}

impl ObjectOp {
    /// Builds a listing operation, applying [`DEFAULT_MAX_KEYS`] when no
    /// cap was requested.
    pub fn list_objects(bucket: String, prefix: String, max_keys: Option<i32>) -> Self {
        Self::ListObjects {
            bucket,
            prefix,
            max_keys: max_keys.unwrap_or(DEFAULT_MAX_KEYS),
        }
    }
}

impl Operation for ObjectOp {
    type GroupKey = ObjectOp;

    fn group_key(&self) -> ObjectOp {
        self.clone()
    }

    fn name(&self) -> &'static str {
        match self {
            ObjectOp::ListBuckets => "ListBuckets",
            ObjectOp::ListObjects { .. } => "ListObjects",
            ObjectOp::GetObject { .. } => "GetObject",
        }
    }
}

/// Bucket listing as reported by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct BucketListing {
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub creation_date: Option<String>,
}

/// Object listing for one bucket/prefix query.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectListing {
    pub bucket: String,
    pub prefix: String,
    pub key_count: i32,
    pub is_truncated: bool,
    pub objects: Vec<ObjectSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

/// A fetched object, fully buffered.
#[derive(Debug, Clone)]
pub struct ObjectPayload {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl ObjectPayload {
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Replies from the object-store backend.
#[derive(Debug, Clone)]
pub enum ObjectReply {
    Buckets(BucketListing),
    Objects(ObjectListing),
    Payload(ObjectPayload),
}

/// Executor backed by an S3 client. The client is internally pooled and
/// safe for concurrent use after construction.
pub struct ObjectStoreExecutor {
    client: Client,
}

impl ObjectStoreExecutor {
    /// Loads credentials and region from the default provider chain.
    pub async fn connect(config: &ObjectStoreConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
        }
    }

    async fn execute_one_indexed(
        &self,
        index: usize,
        op: &ObjectOp,
    ) -> (usize, BatchResult<ObjectReply>) {
        (index, self.execute_one(op).await)
    }

    async fn execute_one(&self, op: &ObjectOp) -> BatchResult<ObjectReply> {
        match op {
            ObjectOp::ListBuckets => {
                let output = self
                    .client
                    .list_buckets()
                    .send()
                    .await
                    .map_err(sdk_error)?;
                Ok(ObjectReply::Buckets(BucketListing::from_output(output)))
            }
            ObjectOp::ListObjects {
                bucket,
                prefix,
                max_keys,
            } => {
                let output = self
                    .client
                    .list_objects_v2()
                    .bucket(bucket.as_str())
                    .prefix(prefix.as_str())
                    .max_keys(*max_keys)
                    .send()
                    .await
                    .map_err(sdk_error)?;
                Ok(ObjectReply::Objects(ObjectListing::from_output(
                    bucket, prefix, output,
                )))
            }
            ObjectOp::GetObject { bucket, key } => {
                let output = self
                    .client
                    .get_object()
                    .bucket(bucket.as_str())
                    .key(key.as_str())
                    .send()
                    .await
                    .map_err(sdk_error)?;

                let content_type = output.content_type().map(str::to_string);
                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(sdk_error)?
                    .into_bytes();

                Ok(ObjectReply::Payload(ObjectPayload { body, content_type }))
            }
        }
    }
}

#[async_trait]
impl Executor for ObjectStoreExecutor {
    type Op = ObjectOp;
    type Reply = ObjectReply;

    async fn execute(&self, ops: &[ObjectOp]) -> BatchResult<Vec<BatchResult<ObjectReply>>> {
        let mut indexed: Vec<(usize, BatchResult<ObjectReply>)> = stream::iter(
            ops.iter().cloned().enumerate(),
        )
        .map(|(index, op)| async move { self.execute_one_indexed(index, &op).await })
        .buffer_unordered(GROUP_CONCURRENCY)
        .collect()
        .await;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn probe(&self) -> Result<(), BatchError> {
        self.client
            .list_buckets()
            .send()
            .await
            .map(|_| ())
            .map_err(sdk_error)
    }
}

fn sdk_error(err: impl std::error::Error) -> BatchError {
    BackendError::command(format!("{}", DisplayErrorContext(&err))).into()
}

impl BucketListing {
    fn from_output(output: ListBucketsOutput) -> Self {
        let buckets = output
            .buckets()
            .iter()
            .map(|bucket| BucketSummary {
                name: bucket.name().unwrap_or_default().to_string(),
                creation_date: bucket.creation_date().map(|date| date.to_string()),
            })
            .collect();

        Self { buckets }
    }
}

impl ObjectListing {
    fn from_output(bucket: &str, prefix: &str, output: ListObjectsV2Output) -> Self {
        let objects = output
            .contents()
            .iter()
            .map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0),
                last_modified: object.last_modified().map(|date| date.to_string()),
                etag: object.e_tag().map(str::to_string),
            })
            .collect();

        Self {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            key_count: output.key_count().unwrap_or(0),
            is_truncated: output.is_truncated().unwrap_or(false),
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::types::{Bucket, Object};

    #[test]
    fn every_bucket_listing_request_is_equivalent() {
        assert_eq!(ObjectOp::ListBuckets.group_key(), ObjectOp::ListBuckets);
    }

    #[test]
    fn listing_key_covers_bucket_prefix_and_cap() {
        let a = ObjectOp::list_objects("b".into(), "p/".into(), Some(10));
        let b = ObjectOp::list_objects("b".into(), "p/".into(), Some(10));
        assert_eq!(a.group_key(), b.group_key());

        let other_cap = ObjectOp::list_objects("b".into(), "p/".into(), Some(20));
        assert_ne!(a.group_key(), other_cap.group_key());
    }

    #[test]
    fn listing_cap_defaults_when_unset() {
        let op = ObjectOp::list_objects("b".into(), String::new(), None);
        assert_eq!(
            op,
            ObjectOp::ListObjects {
                bucket: "b".into(),
                prefix: String::new(),
                max_keys: DEFAULT_MAX_KEYS,
            }
        );
    }

    #[test]
    fn fetch_key_is_bucket_and_key() {
        let a = ObjectOp::GetObject { bucket: "b".into(), key: "k".into() };
        let b = ObjectOp::GetObject { bucket: "b".into(), key: "k".into() };
        assert_eq!(a.group_key(), b.group_key());

        let other_bucket = ObjectOp::GetObject { bucket: "c".into(), key: "k".into() };
        assert_ne!(a.group_key(), other_bucket.group_key());
    }

    #[test]
    fn bucket_listing_mirrors_backend_output() {
        let output = ListBucketsOutput::builder()
            .buckets(Bucket::builder().name("alpha").build())
            .buckets(Bucket::builder().name("beta").build())
            .build();

        let listing = BucketListing::from_output(output);
        let names: Vec<_> = listing.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["buckets"][0]["name"], "alpha");
    }

    #[test]
    fn object_listing_mirrors_backend_output() {
        let output = ListObjectsV2Output::builder()
            .key_count(2)
            .is_truncated(false)
            .contents(Object::builder().key("a.txt").size(3).build())
            .contents(Object::builder().key("b.txt").size(7).build())
            .build();

        let listing = ObjectListing::from_output("data", "logs/", output);
        assert_eq!(listing.bucket, "data");
        assert_eq!(listing.prefix, "logs/");
        assert_eq!(listing.key_count, 2);
        assert!(!listing.is_truncated);
        assert_eq!(listing.objects[1].key, "b.txt");
        assert_eq!(listing.objects[1].size, 7);
    }

    #[test]
    fn cloned_payloads_share_the_buffered_body() {
        let payload = ObjectPayload {
            body: Bytes::from_static(b"shared bytes"),
            content_type: Some("text/plain".to_string()),
        };

        let copy = payload.clone();
        assert_eq!(copy.body, payload.body);
        assert_eq!(copy.content_length(), 12);
    }
}
