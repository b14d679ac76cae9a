use std::env;

/// AppConfig
///
/// Holds the service's configuration state. Immutable once loaded and kept
/// in `AppState`.
#[derive(Clone)]
pub struct AppConfig {
    // Database connection string (Postgres). `None` runs against the in-memory store (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls log format and secret requirements.
    pub env: Env,
    // Shared HS256 secret used to sign and verify every token.
    pub jwt_secret: String,
    // Value written to and required in the `iss` claim.
    pub jwt_issuer: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Argon2 cost parameters. `None` keeps the argon2 crate defaults.
    pub argon2_m_cost: Option<u32>,
    pub argon2_t_cost: Option<u32>,
    pub argon2_p_cost: Option<u32>,
    // Bootstrap admin created at startup if absent. `None` skips seeding.
    pub seed_admin: Option<SeedAdmin>,
}

/// SeedAdmin
///
/// Username and plaintext password of the bootstrap admin account.
#[derive(Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

/// Env
///
/// Runtime context: local development (pretty logs, fallback secret, optional
/// database) or production (JSON logs, every secret mandatory).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_JWT_ISSUER: &str = "api.comp0010.ucl.ac.uk";
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// Non-panicking configuration for test setup. Uses the in-memory store and
    /// the cheapest Argon2 parameters the crate accepts.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            argon2_m_cost: Some(256),
            argon2_t_cost: Some(1),
            argon2_p_cost: Some(1),
            seed_admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing
    /// (`JWT_SECRET` and `DATABASE_URL` in production) or if an Argon2 cost
    /// variable is set but is not an integer.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Local => env::var("DATABASE_URL").ok(),
        };

        let seed_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) => Some(SeedAdmin { username, password }),
            // Local runs always get a known admin to log in with.
            _ if env == Env::Local => Some(SeedAdmin {
                username: "admin".to_string(),
                password: "123456".to_string(),
            }),
            _ => None,
        };

        Self {
            db_url,
            env,
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| DEFAULT_JWT_ISSUER.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            argon2_m_cost: cost_var("ARGON2_M_COST"),
            argon2_t_cost: cost_var("ARGON2_T_COST"),
            argon2_p_cost: cost_var("ARGON2_P_COST"),
            seed_admin,
        }
    }
}

fn cost_var(name: &str) -> Option<u32> {
    env::var(name).ok().map(|raw| {
        raw.parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be an unsigned integer, got {raw:?}"))
    })
}
