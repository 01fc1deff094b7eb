//! Context provider boundary.
//!
//! The engine never gathers signals itself; a collaborator implements
//! [`ContextProvider`] and may return partial context. Failures here never
//! fail a session: the orchestrator degrades to an empty context and lets
//! the risk engine work with what it has.

use async_trait::async_trait;
use std::sync::RwLock;
use thiserror::Error;
use veriflow_core::{AuthContext, RequestId};

/// Failure to gather context for a request.
#[derive(Debug, Error)]
#[error("context gathering failed: {0}")]
pub struct ContextError(pub String);

/// Collaborator that resolves contextual signals for a request.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Gather signals for `request_id`. Partial context is fine; this is
    /// called at session start and again before every step-up check, so
    /// implementations should return the freshest signals they have.
    async fn context(&self, request_id: RequestId) -> Result<AuthContext, ContextError>;
}

/// A [`ContextProvider`] serving a fixed, swappable context.
///
/// Primarily a test fixture: scripting a mid-flow `set` simulates signals
/// changing between steps (new network, anomalous timing).
#[derive(Debug)]
pub struct StaticContextProvider {
    context: RwLock<AuthContext>,
}

impl StaticContextProvider {
    /// Serve `context` for every request.
    #[must_use]
    pub fn new(context: AuthContext) -> Self {
        Self {
            context: RwLock::new(context),
        }
    }

    /// Replace the served context.
    pub fn set(&self, context: AuthContext) {
        *self.context.write().expect("context lock poisoned") = context;
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn context(&self, _request_id: RequestId) -> Result<AuthContext, ContextError> {
        Ok(self.context.read().expect("context lock poisoned").clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriflow_core::NetworkSignals;

    #[tokio::test]
    async fn serves_and_swaps_context() {
        let request_id = RequestId::new();
        let provider = StaticContextProvider::new(AuthContext::empty(request_id));

        let first = provider.context(request_id).await.unwrap();
        assert!(first.is_empty());

        let mut updated = AuthContext::empty(request_id);
        updated.network = Some(NetworkSignals {
            reputation: 0.9,
            anonymizing_proxy: true,
            ip_address: None,
        });
        provider.set(updated.clone());

        let second = provider.context(request_id).await.unwrap();
        assert_eq!(second, updated);
    }
}
