use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AccountKind, TokenKind, TokenPair};

/// Fixed `sub` claim written into every token.
pub const TOKEN_SUBJECT: &str = "comp0010.ucl.ac.uk";

impl TokenKind {
    /// How long a token of this kind stays valid after minting.
    pub fn lifetime(self) -> Duration {
        match self {
            TokenKind::Access => Duration::hours(6),
            TokenKind::Refresh => Duration::days(30),
        }
    }
}

/// Payload
///
/// The identity and purpose claims carried by a token. Immutable once minted,
/// and recovered unchanged by `TokenCodec::decode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub account_id: i32,
    pub account_kind: AccountKind,
    pub token_kind: TokenKind,
}

/// Claims
///
/// Full JWT claim set. The three payload claims are camelCase
/// (`accountId`, `accountType`, `jwtType`) so existing clients can read them;
/// the rest are the registered JWT claims.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub account_id: i32,
    pub account_type: AccountKind,
    pub jwt_type: TokenKind,
    /// JWT ID (jti): random per token, so two tokens minted in the same second differ.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub sub: String,
}

impl From<Claims> for Payload {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: claims.account_id,
            account_kind: claims.account_type,
            token_kind: claims.jwt_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Empty token, bad signature, wrong issuer, or malformed structure.
    #[error("Token Invalid")]
    Invalid,
    /// Signature verified but the expiry instant has passed.
    #[error("Token Expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// TokenCodec
///
/// Mints and verifies HS256 tokens with the single process-wide secret. Keys
/// are fixed at construction; there is no rotation and no per-account key.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

pub type TokenCodecState = Arc<TokenCodec>;

impl TokenCodec {
    pub fn new(secret: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // No grace period: a token is rejected as soon as `exp` has passed.
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
        }
    }

    /// mint
    ///
    /// Signs a token for the account, valid from now for the lifetime of `token_kind`.
    pub fn mint(
        &self,
        account_id: i32,
        account_kind: AccountKind,
        token_kind: TokenKind,
    ) -> Result<String, TokenError> {
        self.mint_at(account_id, account_kind, token_kind, Utc::now())
    }

    /// mint_at
    ///
    /// Same as `mint`, with `iat` pinned to `issued_at` and `exp` derived from it.
    pub fn mint_at(
        &self,
        account_id: i32,
        account_kind: AccountKind,
        token_kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expires_at = issued_at + token_kind.lifetime();
        let claims = Claims {
            account_id,
            account_type: account_kind,
            jwt_type: token_kind,
            jti: Uuid::new_v4(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            sub: TOKEN_SUBJECT.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Mints a fresh access/refresh pair for the account.
    pub fn mint_pair(
        &self,
        account_id: i32,
        account_kind: AccountKind,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.mint(account_id, account_kind, TokenKind::Access)?,
            refresh_token: self.mint(account_id, account_kind, TokenKind::Refresh)?,
        })
    }

    /// decode
    ///
    /// Verifies signature, issuer and expiry, then recovers the payload. The
    /// signature is checked first, so `Expired` is only reported for tokens
    /// this process actually signed.
    pub fn decode(&self, token: &str) -> Result<Payload, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Invalid);
        }

        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims.into()),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                kind => {
                    tracing::debug!(?kind, "token rejected");
                    Err(TokenError::Invalid)
                }
            },
        }
    }
}
