//! Application state shared across HTTP handlers.

use std::sync::Arc;

use fanin_batch::{Batcher, Executor};

use crate::config::AgentConfig;

/// State behind every handler: the batcher (which owns the executor)
/// and the effective configuration.
///
/// Generic over the executor so tests can inject stubs the same way the
/// binary injects the real backends.
pub struct AppState<E: Executor> {
    pub batcher: Arc<Batcher<E>>,
    pub config: AgentConfig,
}

impl<E: Executor> AppState<E> {
    /// Builds the state, spawning the batcher worker according to the
    /// configured batching policy.
    pub fn new(executor: Arc<E>, config: AgentConfig) -> Self {
        let batcher = Arc::new(Batcher::new(executor, config.batcher_config()));
        Self { batcher, config }
    }
}

impl<E: Executor> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            batcher: Arc::clone(&self.batcher),
            config: self.config.clone(),
        }
    }
}
