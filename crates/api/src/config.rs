use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the JWT
/// secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    /// Shared secret for `POST /api/v1/internal/trigger`. Empty disables the
    /// endpoint.
    pub trigger_secret: String,
    /// Jobs one owner may create per trailing hour.
    pub enqueue_limit_per_hour: i64,
    /// Spawn a one-shot scheduler run after each enqueue.
    pub trigger_on_enqueue: bool,
    /// Run the periodic scheduler loop inside the API process. Disable when
    /// a separate `longform-worker` handles the queue.
    pub scheduler_loop: bool,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                    |
    /// | `TRIGGER_SECRET`         | empty (disabled)        |
    /// | `ENQUEUE_LIMIT_PER_HOUR` | `10`                    |
    /// | `TRIGGER_ON_ENQUEUE`     | `true`                  |
    /// | `SCHEDULER_LOOP`         | `true`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let trigger_secret = std::env::var("TRIGGER_SECRET").unwrap_or_default();

        let enqueue_limit_per_hour: i64 = std::env::var("ENQUEUE_LIMIT_PER_HOUR")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("ENQUEUE_LIMIT_PER_HOUR must be a valid i64");

        let trigger_on_enqueue: bool = std::env::var("TRIGGER_ON_ENQUEUE")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("TRIGGER_ON_ENQUEUE must be true or false");

        let scheduler_loop: bool = std::env::var("SCHEDULER_LOOP")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("SCHEDULER_LOOP must be true or false");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            trigger_secret,
            enqueue_limit_per_hour,
            trigger_on_enqueue,
            scheduler_loop,
            jwt,
        }
    }
}
