use crate::{
    AppState,
    auth::refresh_pair,
    error::{ApiError, ErrorBody},
    models::{
        AccountDetail, AccountKind, Identity, LoginRequest, MessageBody, RefreshQuery,
        ResetPasswordRequest, TokenPair,
    },
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};

// --- Public Handlers ---

/// login
///
/// [Public Route] Exchanges a username and password for a token pair. The path
/// segment selects which credential table is searched.
///
/// Unknown usernames and wrong passwords produce the same message.
#[utoipa::path(
    post,
    path = "/api/{kind}/login",
    params(("kind" = AccountKind, Path, description = "student, staff or admin")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenPair),
        (status = 400, description = "Bad credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    kind: Result<Path<AccountKind>, PathRejection>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Path(kind) = kind?;
    let Json(payload) = payload?;

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let record = state
        .repo
        .find_by_username(kind, &payload.username)
        .await?;

    let Some(record) = record.filter(|r| state.hasher.verify(&payload.password, &r.password))
    else {
        tracing::info!(account_kind = %kind, username = %payload.username, "login failed");
        return Err(ApiError::bad_request("Username or password incorrect"));
    };

    let pair = state.tokens.mint_pair(record.id, kind)?;
    tracing::info!(account_kind = %kind, account_id = record.id, "login succeeded");
    Ok(Json(pair))
}

/// refresh
///
/// [Public Route] Trades a refresh token for a new access/refresh pair.
/// An access token is refused here.
#[utoipa::path(
    get,
    path = "/api/auth/refresh",
    params(RefreshQuery),
    responses(
        (status = 200, description = "Refreshed", body = TokenPair),
        (status = 401, description = "Invalid, expired or wrong kind of token", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    query: Result<Query<RefreshQuery>, QueryRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Query(query) = query?;
    let pair = refresh_pair(&state.tokens, &query.refresh_token)?;
    Ok(Json(pair))
}

// --- Guarded Handlers ---

/// reset_password
///
/// [Authenticated Route] Changes the caller's own password after checking the
/// old one. The account comes from the identity context, never from the body.
#[utoipa::path(
    put,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageBody),
        (status = 400, description = "Old password incorrect", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn reset_password(
    identity: Identity,
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let Json(payload) = payload?;
    if payload.new_password.is_empty() {
        return Err(ApiError::bad_request("New password is required"));
    }

    let Identity {
        account_id,
        account_kind,
    } = identity;

    let record = state
        .repo
        .lookup(account_kind, account_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("{} not found", account_kind.title())))?;

    if !state.hasher.verify(&payload.old_password, &record.password) {
        return Err(ApiError::bad_request("Old password is incorrect"));
    }

    let hash = state.hasher.hash(&payload.new_password)?;
    if !state
        .repo
        .update_password(account_kind, account_id, &hash)
        .await?
    {
        // Deleted between the lookup and the update.
        return Err(ApiError::bad_request(format!(
            "{} not found",
            account_kind.title()
        )));
    }

    tracing::info!(account_id, account_kind = %account_kind, "password reset");
    Ok(Json(MessageBody {
        code: 200,
        message: "Password reset successfully".to_string(),
    }))
}

/// get_me
///
/// [Authenticated Route] Returns the caller's identity as resolved by the guard.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current identity", body = Identity),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn get_me(identity: Identity) -> Json<Identity> {
    Json(identity)
}

// --- Kind-Restricted Handlers ---

/// get_detail
///
/// [Student/Staff Route] Returns the caller's own account record. Mounted
/// twice, once behind a student-only guard and once behind a staff-only
/// guard, so the identity's kind always matches the path.
#[utoipa::path(
    get,
    path = "/api/{kind}/detail",
    params(("kind" = AccountKind, Path, description = "student or staff")),
    responses(
        (status = 200, description = "Caller's account", body = AccountDetail),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Token belongs to another account kind", body = ErrorBody)
    )
)]
pub async fn get_detail(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<AccountDetail>, ApiError> {
    let record = state
        .repo
        .lookup(identity.account_kind, identity.account_id)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!("{} not found", identity.account_kind.title()))
        })?;

    Ok(Json(AccountDetail::from_record(identity.account_kind, record)))
}
