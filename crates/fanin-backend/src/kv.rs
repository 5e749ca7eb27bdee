//! Key-value backend executor over a pooled Redis connection.
//!
//! One batch worth of distinct operations is issued as a single
//! pipeline round trip on one pooled connection. Pool checkout and
//! transport failures fail the whole batch; a reply that cannot be
//! interpreted for its operation fails only that operation's group.

use async_trait::async_trait;
use deadpool_redis::redis;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use fanin_batch::{BatchError, BatchResult, Executor, Operation};

use crate::error::BackendError;

/// Connection settings for the key-value backend.
#[derive(Debug, Clone)]
pub struct KvConfig {
    pub host: String,
    pub port: u16,
    /// Optional shared secret.
    pub password: Option<String>,
    /// Number of pooled connections.
    pub pool_size: usize,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            pool_size: 10,
        }
    }
}

impl KvConfig {
    fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}", password, self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// Key-value operations, one variant per supported command.
///
/// The enum is its own grouping key: requests whose operations compare
/// equal (same command, same parameters) coalesce into one pipelined
/// command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KvOp {
    Get { key: String },
    Set { key: String, value: String },
    Del { key: String },
    Exists { key: String },
}

impl Operation for KvOp {
    type GroupKey = KvOp;

    fn group_key(&self) -> KvOp {
        self.clone()
    }

    fn name(&self) -> &'static str {
        match self {
            KvOp::Get { .. } => "Get",
            KvOp::Set { .. } => "Set",
            KvOp::Del { .. } => "Del",
            KvOp::Exists { .. } => "Exists",
        }
    }
}

/// Replies from the key-value backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvReply {
    /// Value of a `Get`; a missing key yields the empty string.
    Value(String),
    /// Acknowledgement string of a `Set`.
    Status(String),
    /// Number of keys removed by a `Del`.
    Deleted(i64),
    /// Number of keys found by an `Exists`.
    Exists(i64),
}

/// Pipelining executor over a deadpool-managed Redis pool.
pub struct KvExecutor {
    pool: Pool,
}

impl KvExecutor {
    /// Builds the connection pool. No connection is established yet;
    /// use [`Executor::probe`] to verify connectivity.
    pub fn connect(config: &KvConfig) -> Result<Self, BackendError> {
        let mut pool_config = deadpool_redis::Config::from_url(config.url());
        pool_config.pool = Some(PoolConfig::new(config.pool_size));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BackendError::connection(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, BackendError> {
        self.pool
            .get()
            .await
            .map_err(|e| BackendError::connection(e.to_string()))
    }
}

#[async_trait]
impl Executor for KvExecutor {
    type Op = KvOp;
    type Reply = KvReply;

    async fn execute(&self, ops: &[KvOp]) -> BatchResult<Vec<BatchResult<KvReply>>> {
        let mut conn = self.connection().await.map_err(BatchError::from)?;

        let mut pipe = redis::pipe();
        for op in ops {
            match op {
                KvOp::Get { key } => {
                    pipe.get(key);
                }
                KvOp::Set { key, value } => {
                    pipe.set(key, value);
                }
                KvOp::Del { key } => {
                    pipe.del(key);
                }
                KvOp::Exists { key } => {
                    pipe.exists(key);
                }
            }
        }

        tracing::debug!(commands = ops.len(), "issuing pipeline");
        let replies: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| BatchError::from(BackendError::connection(e.to_string())))?;

        if replies.len() != ops.len() {
            return Err(BackendError::unexpected_reply(format!(
                "pipeline returned {} replies for {} commands",
                replies.len(),
                ops.len()
            ))
            .into());
        }

        Ok(ops
            .iter()
            .zip(replies)
            .map(|(op, reply)| convert_reply(op, reply))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn probe(&self) -> Result<(), BatchError> {
        let mut conn = self.connection().await.map_err(BatchError::from)?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| BatchError::from(BackendError::connection(e.to_string())))?;
        if pong != "PONG" {
            return Err(BackendError::unexpected_reply(format!("PING answered {pong:?}")).into());
        }
        Ok(())
    }
}

/// Interprets one pipeline reply for the operation that produced it.
///
/// Errors here (including server error replies) affect only the group
/// behind this command, not the rest of the batch.
fn convert_reply(op: &KvOp, reply: redis::Value) -> BatchResult<KvReply> {
    let converted = match op {
        KvOp::Get { .. } => {
            // A nil reply means the key does not exist; that is a value
            // (the empty string), not an error.
            redis::from_redis_value::<Option<String>>(&reply)
                .map(|value| KvReply::Value(value.unwrap_or_default()))
        }
        KvOp::Set { .. } => {
            redis::from_redis_value::<String>(&reply).map(KvReply::Status)
        }
        KvOp::Del { .. } => redis::from_redis_value::<i64>(&reply).map(KvReply::Deleted),
        KvOp::Exists { .. } => redis::from_redis_value::<i64>(&reply).map(KvReply::Exists),
    };

    converted.map_err(|e| {
        BackendError::unexpected_reply(format!("{} reply: {e}", op.name())).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadpool_redis::redis::Value;

    #[test]
    fn connection_url_includes_optional_password() {
        let plain = KvConfig::default();
        assert_eq!(plain.url(), "redis://localhost:6379");

        let secured = KvConfig {
            password: Some("hunter2".to_string()),
            ..KvConfig::default()
        };
        assert_eq!(secured.url(), "redis://:hunter2@localhost:6379");
    }

    #[test]
    fn equal_operations_share_a_group_key() {
        let a = KvOp::Get { key: "x".into() };
        let b = KvOp::Get { key: "x".into() };
        assert_eq!(a.group_key(), b.group_key());

        let other_key = KvOp::Get { key: "y".into() };
        assert_ne!(a.group_key(), other_key.group_key());

        // Same key, different command: never equivalent.
        let exists = KvOp::Exists { key: "x".into() };
        assert_ne!(a.group_key(), exists.group_key());

        // Set groups on (key, value), not key alone.
        let set1 = KvOp::Set { key: "k".into(), value: "1".into() };
        let set2 = KvOp::Set { key: "k".into(), value: "2".into() };
        assert_ne!(set1.group_key(), set2.group_key());
    }

    #[test]
    fn missing_key_becomes_empty_value() {
        let reply = convert_reply(&KvOp::Get { key: "absent".into() }, Value::Nil).unwrap();
        assert_eq!(reply, KvReply::Value(String::new()));
    }

    #[test]
    fn present_key_keeps_its_value() {
        let reply = convert_reply(
            &KvOp::Get { key: "k".into() },
            Value::BulkString(b"payload".to_vec()),
        )
        .unwrap();
        assert_eq!(reply, KvReply::Value("payload".to_string()));
    }

    #[test]
    fn set_reply_is_the_acknowledgement_string() {
        let reply = convert_reply(
            &KvOp::Set { key: "k".into(), value: "v".into() },
            Value::Okay,
        )
        .unwrap();
        assert_eq!(reply, KvReply::Status("OK".to_string()));
    }

    #[test]
    fn del_and_exists_replies_are_counts() {
        let deleted = convert_reply(&KvOp::Del { key: "k".into() }, Value::Int(2)).unwrap();
        assert_eq!(deleted, KvReply::Deleted(2));

        let exists = convert_reply(&KvOp::Exists { key: "k".into() }, Value::Int(0)).unwrap();
        assert_eq!(exists, KvReply::Exists(0));
    }

    #[test]
    fn uninterpretable_reply_fails_only_that_command() {
        let err = convert_reply(&KvOp::Del { key: "k".into() }, Value::Nil).unwrap_err();
        assert!(matches!(err, BatchError::Backend(_)));
    }
}
