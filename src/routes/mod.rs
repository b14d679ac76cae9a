//! Router Module Index
//!
//! Routes are split by access requirement. Guarding is applied per group in
//! `create_router` with an explicit allow-set.

/// Routes open to anonymous callers: health, login, refresh.
pub mod public;

/// Routes behind the access guard. Any signed-in account kind may call them.
pub mod authenticated;

/// Routes behind a guard admitting exactly one account kind.
pub mod restricted;
