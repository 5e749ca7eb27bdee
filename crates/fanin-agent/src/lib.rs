//! fanin-agent: the node-local batching proxy
//!
//! This crate wires the batching engine and the backend executors into a
//! deployable sidecar:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                fanin-agent                   │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - flags + env overrides   │
//! │  http/            - axum routes and state   │
//! │  observability/   - logging and metrics     │
//! │  main.rs          - lifecycle               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The HTTP surface comes in two flavors, one per backend family:
//! `/s3/*` for the object-store agent, `/redis/*` for the key-value
//! agent. Both share `/health`, `/metrics`, and (in debug mode)
//! `/debug/config`.

pub mod config;
pub mod http;
pub mod observability;
