use async_trait::async_trait;
use chrono::{Duration, Utc};
use sms_auth::{
    AccessGuard, ApiError, IdentityContext, MemoryRepository, TokenCodec,
    auth::refresh_pair,
    models::{AccountKind, AccountRecord, Identity, TokenKind},
    repository::{Repository, RepositoryError},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

// --- Failing Repository for Store Errors ---

struct FailingRepo;

#[async_trait]
impl Repository for FailingRepo {
    async fn lookup(
        &self,
        _kind: AccountKind,
        _id: i32,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_username(
        &self,
        _kind: AccountKind,
        _username: &str,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn create_account(
        &self,
        _kind: AccountKind,
        _username: &str,
        _password_hash: &str,
    ) -> Result<AccountRecord, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn update_password(
        &self,
        _kind: AccountKind,
        _id: i32,
        _password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const ADMIN_ONLY: &[AccountKind] = &[AccountKind::Admin];
const ADMIN_AND_STAFF: &[AccountKind] = &[AccountKind::Admin, AccountKind::Staff];

fn codec() -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(TEST_JWT_SECRET, "api.comp0010.ucl.ac.uk"))
}

fn record(id: i32, username: &str) -> AccountRecord {
    AccountRecord {
        id,
        username: username.to_string(),
        password: "unused".to_string(),
    }
}

/// Store holding staff 42, admin 1 and student 3. No student 7.
fn seeded_repo() -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    repo.insert(AccountKind::Staff, record(42, "lecturer"));
    repo.insert(AccountKind::Admin, record(1, "admin"));
    repo.insert(AccountKind::Student, record(3, "alice"));
    Arc::new(repo)
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn assert_unauthorized<T: std::fmt::Debug>(result: Result<T, ApiError>, expected: &str) {
    match result {
        Err(ApiError::Unauthorized(message)) => assert_eq!(message, expected),
        other => panic!("expected Unauthorized({expected:?}), got {other:?}"),
    }
}

// --- authorize ---

#[tokio::test]
async fn test_authorize_success() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(42, AccountKind::Staff, TokenKind::Access).unwrap();

    let identity = guard
        .authorize(Some(&bearer(&token)), ADMIN_AND_STAFF)
        .await
        .unwrap();

    assert_eq!(
        identity,
        Identity {
            account_id: 42,
            account_kind: AccountKind::Staff,
        }
    );
}

#[tokio::test]
async fn test_authorize_accepts_bare_token() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();

    assert!(guard.authorize(Some(&token), ADMIN_ONLY).await.is_ok());
}

#[tokio::test]
async fn test_authorize_missing_token() {
    let guard = AccessGuard::new(codec(), seeded_repo());

    assert_unauthorized(guard.authorize(None, ADMIN_ONLY).await, "Token not provided");
    assert_unauthorized(guard.authorize(Some(""), ADMIN_ONLY).await, "Token not provided");
    for blank_scheme in ["Bearer ", "Bearer   ", "Bearer", "bearer", "  BEARER \t"] {
        assert_unauthorized(
            guard.authorize(Some(blank_scheme), ADMIN_ONLY).await,
            "Token not provided",
        );
    }
}

#[tokio::test]
async fn test_authorize_scheme_is_case_insensitive() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();

    for scheme in ["bearer", "BEARER", "Bearer"] {
        let header = format!("{} {}", scheme, token);
        assert!(guard.authorize(Some(&header), ADMIN_ONLY).await.is_ok());
    }
}

#[tokio::test]
async fn test_authorize_garbage_token() {
    let guard = AccessGuard::new(codec(), seeded_repo());

    assert_unauthorized(
        guard.authorize(Some("Bearer garbage"), ADMIN_ONLY).await,
        "Token Invalid",
    );
}

#[tokio::test]
async fn test_authorize_expired_token() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens
        .mint_at(
            1,
            AccountKind::Admin,
            TokenKind::Access,
            Utc::now() - Duration::hours(7),
        )
        .unwrap();

    assert_unauthorized(
        guard.authorize(Some(&bearer(&token)), ADMIN_ONLY).await,
        "Token Expired",
    );
}

#[tokio::test]
async fn test_authorize_rejects_refresh_token() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Refresh).unwrap();

    assert_unauthorized(
        guard.authorize(Some(&bearer(&token)), ADMIN_ONLY).await,
        "use access token",
    );
}

#[tokio::test]
async fn test_authorize_role_mismatch_is_forbidden() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(42, AccountKind::Staff, TokenKind::Access).unwrap();

    match guard.authorize(Some(&bearer(&token)), ADMIN_ONLY).await {
        Err(ApiError::Forbidden(message)) => assert_eq!(message, "no access"),
        other => panic!("expected Forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authorize_role_checked_before_existence() {
    // Staff 99 does not exist, but the allow-set already excludes staff.
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(99, AccountKind::Staff, TokenKind::Access).unwrap();

    assert!(matches!(
        guard.authorize(Some(&bearer(&token)), ADMIN_ONLY).await,
        Err(ApiError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_authorize_unknown_student() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(7, AccountKind::Student, TokenKind::Access).unwrap();

    assert_unauthorized(
        guard
            .authorize(Some(&bearer(&token)), &AccountKind::ALL)
            .await,
        "no such student",
    );
}

#[tokio::test]
async fn test_authorize_id_spaces_are_per_kind() {
    // Admin 1 exists; student 1 does not.
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Student, TokenKind::Access).unwrap();

    assert_unauthorized(
        guard
            .authorize(Some(&bearer(&token)), &AccountKind::ALL)
            .await,
        "no such student",
    );
}

#[tokio::test]
async fn test_authorize_deleted_account() {
    let tokens = codec();
    let repo = seeded_repo();
    let guard = AccessGuard::new(tokens.clone(), repo.clone());
    let token = tokens.mint(42, AccountKind::Staff, TokenKind::Access).unwrap();

    assert!(
        guard
            .authorize(Some(&bearer(&token)), ADMIN_AND_STAFF)
            .await
            .is_ok()
    );

    assert!(repo.remove(AccountKind::Staff, 42));
    assert_unauthorized(
        guard
            .authorize(Some(&bearer(&token)), ADMIN_AND_STAFF)
            .await,
        "no such staff",
    );
}

#[tokio::test]
async fn test_authorize_store_failure_is_internal() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), Arc::new(FailingRepo));
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();

    assert!(matches!(
        guard.authorize(Some(&bearer(&token)), ADMIN_ONLY).await,
        Err(ApiError::Internal(_))
    ));
}

// --- run ---

#[tokio::test]
async fn test_run_installs_identity_then_clears() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();
    let context = IdentityContext::new();

    let seen = guard
        .run(&context, Some(&bearer(&token)), ADMIN_ONLY, |identity| {
            let context = context.clone();
            async move {
                assert_eq!(context.get(), Some(identity));
                identity
            }
        })
        .await
        .unwrap();

    assert_eq!(seen.account_id, 1);
    assert_eq!(context.get(), None);
}

#[tokio::test]
async fn test_run_clears_after_operation_error() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();
    let context = IdentityContext::new();

    let outcome = guard
        .run(&context, Some(&bearer(&token)), ADMIN_ONLY, |_| async {
            Err::<(), _>(ApiError::bad_request("Module code already exists"))
        })
        .await
        .unwrap();

    assert!(matches!(outcome, Err(ApiError::BadRequest(_))));
    assert_eq!(context.get(), None);
}

#[tokio::test]
async fn test_run_rejection_never_sets_context_or_runs_operation() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(42, AccountKind::Staff, TokenKind::Access).unwrap();
    let context = IdentityContext::new();
    let ran = AtomicBool::new(false);

    let outcome = guard
        .run(&context, Some(&bearer(&token)), ADMIN_ONLY, |_| async {
            ran.store(true, Ordering::SeqCst);
        })
        .await;

    assert!(matches!(outcome, Err(ApiError::Forbidden(_))));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(context.get(), None);
}

#[tokio::test]
async fn test_run_clears_after_panic() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();
    let context = IdentityContext::new();
    let task_context = context.clone();

    let handle = tokio::spawn(async move {
        guard
            .run(
                &task_context,
                Some(&bearer(&token)),
                ADMIN_ONLY,
                |_| async { panic!("handler crashed") },
            )
            .await
    });

    assert!(handle.await.unwrap_err().is_panic());
    assert_eq!(context.get(), None);
}

#[tokio::test]
async fn test_run_clears_on_cancellation() {
    let tokens = codec();
    let guard = AccessGuard::new(tokens.clone(), seeded_repo());
    let token = tokens.mint(1, AccountKind::Admin, TokenKind::Access).unwrap();
    let context = IdentityContext::new();
    let header = bearer(&token);

    let call = guard.run(&context, Some(&header), ADMIN_ONLY, |_| {
        std::future::pending::<()>()
    });
    let outcome = tokio::time::timeout(std::time::Duration::from_millis(50), call).await;

    assert!(outcome.is_err());
    assert_eq!(context.get(), None);
}

// --- refresh flow ---

#[test]
fn test_refresh_with_refresh_token() {
    let tokens = codec();
    let refresh = tokens.mint(3, AccountKind::Student, TokenKind::Refresh).unwrap();

    let pair = refresh_pair(&tokens, &refresh).unwrap();
    let access = tokens.decode(&pair.access_token).unwrap();
    let next_refresh = tokens.decode(&pair.refresh_token).unwrap();

    assert_eq!(access.account_id, 3);
    assert_eq!(access.account_kind, AccountKind::Student);
    assert_eq!(access.token_kind, TokenKind::Access);
    assert_eq!(next_refresh.token_kind, TokenKind::Refresh);
}

#[test]
fn test_refresh_with_access_token_is_rejected() {
    let tokens = codec();
    let access = tokens.mint(3, AccountKind::Student, TokenKind::Access).unwrap();

    assert_unauthorized(refresh_pair(&tokens, &access), "use refresh token");
}

#[test]
fn test_refresh_with_expired_token() {
    let tokens = codec();
    let refresh = tokens
        .mint_at(
            3,
            AccountKind::Student,
            TokenKind::Refresh,
            Utc::now() - Duration::days(31),
        )
        .unwrap();

    assert_unauthorized(refresh_pair(&tokens, &refresh), "Token Expired");
}

#[test]
fn test_refresh_does_not_consult_the_store() {
    // No store is involved at all: a refresh token for an account that was
    // never created still mints a pair.
    let tokens = codec();
    let refresh = tokens.mint(999, AccountKind::Staff, TokenKind::Refresh).unwrap();

    assert!(refresh_pair(&tokens, &refresh).is_ok());
}
