use axum::{
    extract::{FromRef, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::future::Future;

use crate::{
    AppState,
    context::IdentityContext,
    error::ApiError,
    models::{AccountKind, Identity, TokenKind, TokenPair},
    repository::RepositoryState,
    token::{TokenCodec, TokenCodecState},
};

/// AccessGuard
///
/// Resolves the caller of a protected operation from its `Authorization`
/// header and decides whether it may run. The sequence per call is:
///
/// 1. Extract: a missing or blank header is rejected before decoding.
/// 2. Decode: signature, issuer and expiry through the token codec.
/// 3. Token kind: only access tokens call protected operations.
/// 4. Role: the account kind must be in the operation's allow-set.
/// 5. Existence: the account must still be in the credential store, so a
///    deleted account's token stops working before it expires.
/// 6. Install & proceed: the identity is placed in the call's
///    `IdentityContext` for exactly as long as the operation runs.
///
/// Any rejection returns before the operation is invoked.
#[derive(Clone)]
pub struct AccessGuard {
    tokens: TokenCodecState,
    repo: RepositoryState,
}

impl FromRef<AppState> for AccessGuard {
    fn from_ref(app_state: &AppState) -> AccessGuard {
        AccessGuard::new(app_state.tokens.clone(), app_state.repo.clone())
    }
}

impl AccessGuard {
    pub fn new(tokens: TokenCodecState, repo: RepositoryState) -> Self {
        Self { tokens, repo }
    }

    /// authorize
    ///
    /// Steps 1 to 5. Returns the verified identity without touching any context.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        allowed: &[AccountKind],
    ) -> Result<Identity, ApiError> {
        let token = authorization
            .map(bearer_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Token not provided"))?;

        let payload = self.tokens.decode(token).inspect_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
        })?;

        if payload.token_kind != TokenKind::Access {
            tracing::debug!(
                account_id = payload.account_id,
                account_kind = %payload.account_kind,
                "refresh token presented to a protected operation"
            );
            return Err(ApiError::unauthorized("use access token"));
        }

        if !allowed.contains(&payload.account_kind) {
            tracing::debug!(
                account_id = payload.account_id,
                account_kind = %payload.account_kind,
                ?allowed,
                "account kind outside the allow-set"
            );
            return Err(ApiError::forbidden("no access"));
        }

        if self
            .repo
            .lookup(payload.account_kind, payload.account_id)
            .await?
            .is_none()
        {
            tracing::warn!(
                account_id = payload.account_id,
                account_kind = %payload.account_kind,
                "valid token for an account that no longer exists"
            );
            return Err(ApiError::unauthorized(format!(
                "no such {}",
                payload.account_kind
            )));
        }

        Ok(Identity {
            account_id: payload.account_id,
            account_kind: payload.account_kind,
        })
    }

    /// run
    ///
    /// Authorizes the call, then runs `operation` with the identity installed
    /// in `context`. The context is cleared when the operation finishes,
    /// fails, panics or is cancelled.
    pub async fn run<F, Fut>(
        &self,
        context: &IdentityContext,
        authorization: Option<&str>,
        allowed: &[AccountKind],
        operation: F,
    ) -> Result<Fut::Output, ApiError>
    where
        F: FnOnce(Identity) -> Fut,
        Fut: Future,
    {
        let identity = self.authorize(authorization, allowed).await?;
        let _scope = context.enter(identity);
        Ok(operation(identity).await)
    }
}

/// Accepts both `Bearer <token>` and a bare token. The scheme is matched
/// case-insensitively; a scheme with nothing after it yields an empty token.
fn bearer_token(header_value: &str) -> &str {
    let value = header_value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    }
}

/// RoleGuard
///
/// Middleware state binding an `AccessGuard` to the fixed allow-set of one
/// route group. Applied with
/// `middleware::from_fn_with_state(RoleGuard::new(..), require_roles)`.
#[derive(Clone)]
pub struct RoleGuard {
    guard: AccessGuard,
    allowed: &'static [AccountKind],
}

impl RoleGuard {
    pub fn new(guard: AccessGuard, allowed: &'static [AccountKind]) -> Self {
        Self { guard, allowed }
    }
}

/// require_roles
///
/// Middleware running the access guard around the rest of the stack. A fresh
/// `IdentityContext` is attached to the request so handlers can read the
/// caller through the `Identity` extractor.
pub async fn require_roles(
    State(role_guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let context = IdentityContext::new();
    request.extensions_mut().insert(context.clone());

    role_guard
        .guard
        .run(
            &context,
            authorization.as_deref(),
            role_guard.allowed,
            |_| next.run(request),
        )
        .await
}

/// refresh_pair
///
/// The refresh flow: only a valid refresh token mints a new pair, for the
/// same account. The account is not re-checked against the store here.
pub fn refresh_pair(tokens: &TokenCodec, refresh_token: &str) -> Result<TokenPair, ApiError> {
    if refresh_token.trim().is_empty() {
        return Err(ApiError::unauthorized("Token not provided"));
    }

    let payload = tokens.decode(refresh_token)?;
    if payload.token_kind != TokenKind::Refresh {
        return Err(ApiError::unauthorized("use refresh token"));
    }

    let pair = tokens.mint_pair(payload.account_id, payload.account_kind)?;
    tracing::info!(
        account_id = payload.account_id,
        account_kind = %payload.account_kind,
        "token pair refreshed"
    );
    Ok(pair)
}
