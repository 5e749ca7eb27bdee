//! Key-value endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use fanin_backend::{KvOp, KvReply};
use fanin_batch::{Executor, Request};

use super::{await_delivery, require, unexpected_reply, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetQuery {
    key: Option<String>,
    value: Option<String>,
}

/// `GET /redis/get?key=` → `{"value": <string>}`.
///
/// A key the backend has never seen yields an empty value, not an
/// error.
pub async fn get_value<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError>
where
    E: Executor<Op = KvOp, Reply = KvReply>,
{
    let key = require(query.key, "key")?;

    let (request, rx) = Request::new(KvOp::Get { key });
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        KvReply::Value(value) => Ok(Json(json!({ "value": value }))),
        _ => Err(unexpected_reply("get")),
    }
}

/// `POST /redis/set?key=&value=` → `{"result": "OK"}`.
pub async fn set_value<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<SetQuery>,
) -> Result<Json<Value>, ApiError>
where
    E: Executor<Op = KvOp, Reply = KvReply>,
{
    let key = require(query.key, "key")?;
    let value = require(query.value, "value")?;

    let (request, rx) = Request::new(KvOp::Set { key, value });
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        KvReply::Status(result) => Ok(Json(json!({ "result": result }))),
        _ => Err(unexpected_reply("set")),
    }
}

/// `DELETE /redis/del?key=` → `{"deleted": <int>}`.
pub async fn del_value<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError>
where
    E: Executor<Op = KvOp, Reply = KvReply>,
{
    let key = require(query.key, "key")?;

    let (request, rx) = Request::new(KvOp::Del { key });
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        KvReply::Deleted(count) => Ok(Json(json!({ "deleted": count }))),
        _ => Err(unexpected_reply("del")),
    }
}

/// `GET /redis/exists?key=` → `{"exists": <bool>}`.
pub async fn exists_value<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, ApiError>
where
    E: Executor<Op = KvOp, Reply = KvReply>,
{
    let key = require(query.key, "key")?;

    let (request, rx) = Request::new(KvOp::Exists { key });
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        KvReply::Exists(count) => Ok(Json(json!({ "exists": count > 0 }))),
        _ => Err(unexpected_reply("exists")),
    }
}
