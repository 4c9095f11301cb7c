/// Generation service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL of the OpenAI-compatible API, without the trailing path.
    pub api_url: String,
    /// Bearer token. Empty disables the `Authorization` header.
    pub api_key: String,
    pub model: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    pub requests_per_minute: usize,
    pub max_concurrency: usize,
}

impl GenerationConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                     |
    /// |----------------------------------|-----------------------------|
    /// | `GENERATION_API_URL`             | `https://api.openai.com/v1` |
    /// | `GENERATION_API_KEY`             | (empty)                     |
    /// | `GENERATION_MODEL`               | `gpt-4o-mini`               |
    /// | `GENERATION_TIMEOUT_SECS`        | `120`                       |
    /// | `GENERATION_REQUESTS_PER_MINUTE` | `20`                        |
    /// | `GENERATION_MAX_CONCURRENCY`     | `4`                         |
    pub fn from_env() -> Self {
        let api_url = std::env::var("GENERATION_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into())
            .trim_end_matches('/')
            .to_string();

        let api_key = std::env::var("GENERATION_API_KEY").unwrap_or_default();

        let model = std::env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

        let timeout_secs: u64 = std::env::var("GENERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("GENERATION_TIMEOUT_SECS must be a valid u64");

        let requests_per_minute: usize = std::env::var("GENERATION_REQUESTS_PER_MINUTE")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("GENERATION_REQUESTS_PER_MINUTE must be a valid usize");

        let max_concurrency: usize = std::env::var("GENERATION_MAX_CONCURRENCY")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("GENERATION_MAX_CONCURRENCY must be a valid usize");

        Self {
            api_url,
            api_key,
            model,
            timeout_secs,
            requests_per_minute,
            max_concurrency,
        }
    }
}
