//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Deployment mode; development exposes error details and mock transcripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Runtime configuration for the proxy server.
///
/// Every field has a default so the server runs without any environment
/// variables set; without an API key it answers with mock replies.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Provider credential; `None` switches the chat route to mock replies.
    pub openai_api_key: Option<String>,

    /// Provider API root (default: `"https://api.openai.com/v1"`).
    pub openai_base_url: String,

    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub transcribe_model: String,

    /// Upper bound on each provider call.
    pub upstream_timeout: Duration,

    pub environment: Environment,

    /// `tracing` filter string used when `RUST_LOG` is unset.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Largest accepted transcription upload.
    pub max_audio_bytes: usize,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Build [`ServerConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        Self {
            bind_address: env_or("PALAVER_BIND", "0.0.0.0:3000"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_owned(),
            chat_model: env_or("PALAVER_CHAT_MODEL", "gpt-3.5-turbo"),
            temperature: parse_or(&lookup, "PALAVER_TEMPERATURE", 0.7),
            max_tokens: parse_or(&lookup, "PALAVER_MAX_TOKENS", 1000),
            transcribe_model: env_or("PALAVER_TRANSCRIBE_MODEL", "whisper-1"),
            upstream_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PALAVER_UPSTREAM_TIMEOUT_SECS",
                60,
            )),
            environment: Environment::parse(&env_or("PALAVER_ENV", "development")),
            log_level: env_or("PALAVER_LOG", "palaver=debug,info"),
            log_json: lookup("PALAVER_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_audio_bytes: parse_or(&lookup, "PALAVER_MAX_AUDIO_MB", 25usize)
                .saturating_mul(1024 * 1024),
            cors_allowed_origins: non_empty("PALAVER_CORS_ORIGINS"),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
