use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity Vocabulary ---

/// AccountKind
///
/// The three disjoint kinds of account. Each kind has its own credential table
/// and its own integer id space, so an id is only meaningful next to its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AccountKind {
    Student,
    Staff,
    Admin,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [AccountKind::Admin, AccountKind::Staff, AccountKind::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Student => "student",
            AccountKind::Staff => "staff",
            AccountKind::Admin => "admin",
        }
    }

    /// Credential table holding accounts of this kind.
    pub fn table(self) -> &'static str {
        match self {
            AccountKind::Student => "students",
            AccountKind::Staff => "staff",
            AccountKind::Admin => "admins",
        }
    }

    /// Capitalised name used in user-facing messages ("Staff not found").
    pub fn title(self) -> &'static str {
        match self {
            AccountKind::Student => "Student",
            AccountKind::Staff => "Staff",
            AccountKind::Admin => "Admin",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TokenKind
///
/// Purpose a token was minted for. Access tokens call protected operations;
/// refresh tokens only mint a new pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

/// Identity
///
/// The verified caller of a guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Identity {
    pub account_id: i32,
    pub account_kind: AccountKind,
}

// --- Credential Store Rows ---

/// AccountRecord
///
/// One row of `students`, `staff` or `admins`. `password` holds the PHC hash
/// string, never plaintext.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRecord {
    pub id: i32,
    pub username: String,
    pub password: String,
}

// --- Request Payloads ---

/// LoginRequest
///
/// Input for `POST /api/{kind}/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RefreshQuery
///
/// Query string for `GET /api/auth/refresh?refreshToken=...`.
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RefreshQuery {
    pub refresh_token: String,
}

/// ResetPasswordRequest
///
/// Input for `PUT /api/auth/reset-password`. The account is taken from the
/// caller's token, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// --- Responses ---

/// TokenPair
///
/// Returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// AccountDetail
///
/// The caller's own account as returned by `GET /api/{student|staff}/detail`.
/// Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountDetail {
    pub id: i32,
    pub username: String,
    pub account_kind: AccountKind,
}

impl AccountDetail {
    pub fn from_record(account_kind: AccountKind, record: AccountRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            account_kind,
        }
    }
}

/// MessageBody
///
/// Plain acknowledgement, same shape as an error body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageBody {
    pub code: u16,
    pub message: String,
}
