//! Explicit request context.

use uuid::Uuid;

/// Who is acting, on behalf of which tenant, under which correlation id.
///
/// Passed into every aggregate mutation and command handler. Nothing in
/// the core reads tenant or actor from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Tenant (forum site) the request belongs to.
    pub tenant_id: Uuid,
    /// The user performing the mutation.
    pub actor_id: Uuid,
    /// Correlation ID to trace a request through its events.
    pub correlation_id: Uuid,
}

impl RequestContext {
    /// Creates a context with a fresh correlation ID.
    #[must_use]
    pub fn new(tenant_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            tenant_id,
            actor_id,
            correlation_id: Uuid::now_v7(),
        }
    }

    /// Returns the same tenant and correlation under a different actor.
    #[must_use]
    pub fn with_actor(self, actor_id: Uuid) -> Self {
        Self { actor_id, ..self }
    }
}
