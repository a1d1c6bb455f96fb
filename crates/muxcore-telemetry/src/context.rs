//! Request context for correlation and tracing across crate boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Context carried through a unit of work for tracing and debugging.
///
/// Distinct from `muxcore_core::RunId`/`StepId`: those name a persisted
/// run or step, while `RequestContext` correlates the in-process spans
/// one call to the Router or Connection Manager generates, independent of
/// whether that call belongs to a run at all (e.g. discovery, heartbeats).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique identifier for this context.
    pub request_id: Uuid,
    /// Correlation ID shared by a context and all its descendants.
    pub correlation_id: Uuid,
    /// Parent context's `request_id`, if this is a child context.
    pub parent_id: Option<Uuid>,
    /// Session ID, if this work happens within a registry session.
    pub session_id: Option<Uuid>,
    /// User ID, if the work was submitted by an authenticated caller.
    pub user_id: Option<Uuid>,
    /// When the context was created.
    pub started_at: DateTime<Utc>,
    /// Component that created this context (e.g. `"router"`).
    pub source: String,
    /// Operation being performed, if named.
    pub operation: Option<String>,
    /// Free-form metadata propagated alongside the context.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RequestContext {
    /// Create a new root context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            parent_id: None,
            session_id: None,
            user_id: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a child context inheriting correlation, session, and metadata.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.request_id),
            session_id: self.session_id,
            user_id: self.user_id,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            metadata: self.metadata.clone(),
        }
    }

    /// Override the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Attach a session ID.
    #[must_use]
    pub fn with_session_id(mut self, id: Uuid) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Attach a user ID.
    #[must_use]
    pub fn with_user_id(mut self, id: Uuid) -> Self {
        self.user_id = Some(id);
        self
    }

    /// Name the operation being performed.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Time elapsed since this context was created.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Build a `tracing::Span` carrying this context's correlation fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            source = %self.source,
            operation = self.operation.as_deref(),
        )
    }

    /// Whether this context has a parent.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent_id.is_some()
    }

    /// First 8 characters of `request_id`, for compact log lines.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.request_id.to_string()[..8].to_string()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Enters a context's span on construction and logs elapsed time on drop.
pub struct RequestGuard {
    context: RequestContext,
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl RequestGuard {
    /// Enter `context`'s span, logging its start.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("request started");
        Self { context, span }
    }

    /// The context this guard wraps.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_its_own_correlation_root() {
        let ctx = RequestContext::new("test");
        assert_eq!(ctx.source, "test");
        assert_eq!(ctx.request_id, ctx.correlation_id);
        assert!(ctx.parent_id.is_none());
        assert!(!ctx.has_parent());
    }

    #[test]
    fn builder_methods_set_fields() {
        let session = Uuid::new_v4();
        let user = Uuid::new_v4();
        let correlation = Uuid::new_v4();

        let ctx = RequestContext::new("test")
            .with_correlation_id(correlation)
            .with_session_id(session)
            .with_user_id(user)
            .with_operation("dispatch_step")
            .with_metadata("server_id", "fs-tools");

        assert_eq!(ctx.correlation_id, correlation);
        assert_eq!(ctx.session_id, Some(session));
        assert_eq!(ctx.user_id, Some(user));
        assert_eq!(ctx.operation, Some("dispatch_step".to_string()));
        assert_eq!(ctx.metadata.get("server_id"), Some(&"fs-tools".to_string()));
    }

    #[test]
    fn child_inherits_correlation_and_metadata() {
        let session = Uuid::new_v4();
        let parent = RequestContext::new("router").with_session_id(session).with_metadata("run", "r-1");

        let child = parent.child("connection_manager");

        assert_ne!(child.request_id, parent.request_id);
        assert_eq!(child.correlation_id, parent.correlation_id);
        assert_eq!(child.parent_id, Some(parent.request_id));
        assert_eq!(child.session_id, Some(session));
        assert_eq!(child.metadata.get("run"), Some(&"r-1".to_string()));
    }

    #[test]
    fn elapsed_grows_over_time() {
        let ctx = RequestContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn short_id_is_eight_characters() {
        let ctx = RequestContext::new("test");
        assert_eq!(ctx.short_id().len(), 8);
    }

    #[test]
    fn serialization_round_trips() {
        let ctx = RequestContext::new("test").with_operation("dispatch_step").with_metadata("k", "v");

        let json = serde_json::to_string(&ctx).unwrap();
        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.source, "test");
        assert_eq!(parsed.operation, Some("dispatch_step".to_string()));
    }
}
