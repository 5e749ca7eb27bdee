//! Object-store endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use fanin_backend::{ObjectOp, ObjectReply};
use fanin_batch::{Executor, Request};

use super::{await_delivery, require, unexpected_reply, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    bucket: Option<String>,
    prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetObjectQuery {
    bucket: Option<String>,
    key: Option<String>,
}

/// Resolves the bucket for a request, falling back to the configured
/// default bucket.
fn resolve_bucket<E: Executor>(
    state: &AppState<E>,
    bucket: Option<String>,
) -> Result<String, ApiError> {
    bucket
        .filter(|b| !b.is_empty())
        .or_else(|| state.config.default_bucket.clone())
        .ok_or_else(|| {
            ApiError::invalid_input("missing required parameter: bucket (no default bucket configured)")
        })
}

/// `GET /s3/listBuckets` → JSON listing.
pub async fn list_buckets<E>(
    State(state): State<Arc<AppState<E>>>,
) -> Result<Response, ApiError>
where
    E: Executor<Op = ObjectOp, Reply = ObjectReply>,
{
    let (request, rx) = Request::new(ObjectOp::ListBuckets);
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        ObjectReply::Buckets(listing) => Ok(Json(listing).into_response()),
        _ => Err(unexpected_reply("listBuckets")),
    }
}

/// `GET /s3/listObjects?bucket=&prefix=` → JSON listing.
pub async fn list_objects<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<ListObjectsQuery>,
) -> Result<Response, ApiError>
where
    E: Executor<Op = ObjectOp, Reply = ObjectReply>,
{
    let bucket = resolve_bucket(&state, query.bucket)?;
    let prefix = query.prefix.unwrap_or_default();

    let (request, rx) = Request::new(ObjectOp::list_objects(bucket, prefix, None));
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        ObjectReply::Objects(listing) => Ok(Json(listing).into_response()),
        _ => Err(unexpected_reply("listObjects")),
    }
}

/// `GET /s3/getObject?bucket=&key=` → raw body with `Content-Type` and
/// `Content-Length`.
pub async fn get_object<E>(
    State(state): State<Arc<AppState<E>>>,
    Query(query): Query<GetObjectQuery>,
) -> Result<Response, ApiError>
where
    E: Executor<Op = ObjectOp, Reply = ObjectReply>,
{
    let bucket = resolve_bucket(&state, query.bucket)?;
    let key = require(query.key, "key")?;

    let (request, rx) = Request::new(ObjectOp::GetObject { bucket, key });
    state.batcher.submit(request).await;

    match await_delivery(rx).await? {
        ObjectReply::Payload(payload) => {
            // The buffered body is written exactly once per response;
            // coalesced callers each hold their own reference-counted
            // copy.
            let content_type = payload
                .content_type
                .as_deref()
                .and_then(|ct| HeaderValue::from_str(ct).ok());

            let mut response = (StatusCode::OK, payload.body).into_response();
            if let Some(content_type) = content_type {
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, content_type);
            }
            Ok(response)
        }
        _ => Err(unexpected_reply("getObject")),
    }
}
