use axum::{extract::FromRequestParts, http::request::Parts};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
    error::ApiError,
    models::{AccountKind, Identity},
};

/// IdentityContext
///
/// Per-call slot holding the verified caller. The access guard creates one
/// per inbound request and attaches it to that request's extensions, so
/// concurrent calls never share a slot. Clones share the same slot.
#[derive(Clone, Default, Debug)]
pub struct IdentityContext {
    slot: Arc<Mutex<Option<Identity>>>,
}

impl IdentityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the identity, replacing whatever was there.
    pub fn set(&self, account_id: i32, account_kind: AccountKind) {
        let previous = self.slot.lock().replace(Identity {
            account_id,
            account_kind,
        });
        if let Some(stale) = previous {
            tracing::warn!(?stale, "identity context overwritten before it was cleared");
        }
    }

    pub fn get(&self) -> Option<Identity> {
        *self.slot.lock()
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }

    /// Sets the identity and returns a scope that clears it when dropped.
    /// Dropping happens on normal return, on early return, on panic unwinding
    /// and when the enclosing future is cancelled.
    pub fn enter(&self, identity: Identity) -> ContextScope<'_> {
        self.set(identity.account_id, identity.account_kind);
        ContextScope { context: self }
    }
}

/// ContextScope
///
/// Guard returned by `IdentityContext::enter`.
#[must_use = "the identity is cleared as soon as the scope is dropped"]
pub struct ContextScope<'a> {
    context: &'a IdentityContext,
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.context.clear();
    }
}

/// Identity Extractor
///
/// Reads the caller from the request's `IdentityContext`. Only succeeds inside
/// a route group wrapped by the access guard; anywhere else the context is
/// missing or empty and the request is rejected with 401.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IdentityContext>()
            .and_then(IdentityContext::get)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
