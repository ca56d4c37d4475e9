//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::prompt::DEFAULT_END_MARKER;
use crate::upstream::Sampling;

/// Runtime configuration for tutor-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// with only `GEMINI_API_KEY` set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs go to a daily-rolling file in this directory.
    pub log_dir: Option<PathBuf>,

    /// Model identifier passed to the completion backend.
    pub model: String,

    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,

    /// Fixed rate-limit window.
    pub rate_window: Duration,

    /// Requests allowed per client within one window.
    pub rate_max_requests: u32,

    /// Use `X-Forwarded-For` / `X-Real-IP` as the client key.  Enable only
    /// behind a reverse proxy that overwrites these headers.
    pub trust_forwarded: bool,

    /// Capacity of the relay channel between upstream reader and SSE writer.
    pub stream_buffer: usize,

    /// Prompt template file replacing the built-in one.
    pub prompt_file: Option<PathBuf>,

    /// Literal line the model must print when done.
    pub end_marker: String,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("TUTOR_BIND", "0.0.0.0:3000"),
            log_level: env_or("TUTOR_LOG", "info"),
            log_json: parse_bool("TUTOR_LOG_JSON", false),
            log_dir: env_opt("TUTOR_LOG_DIR").map(PathBuf::from),
            model: env_or("TUTOR_MODEL", "gemini-2.5-flash-preview-04-17"),
            temperature: parse_env("TUTOR_TEMPERATURE", 0.2),
            top_p: parse_env("TUTOR_TOP_P", 0.8),
            max_output_tokens: parse_env("TUTOR_MAX_OUTPUT_TOKENS", 4096),
            rate_window: Duration::from_secs(parse_env::<u64>("TUTOR_RATE_WINDOW_SECS", 60).max(1)),
            rate_max_requests: parse_env::<u32>("TUTOR_RATE_MAX_REQUESTS", 30).max(1),
            trust_forwarded: parse_bool("TUTOR_TRUST_FORWARDED", false),
            stream_buffer: parse_env::<usize>("TUTOR_STREAM_BUFFER", 32).max(1),
            prompt_file: env_opt("TUTOR_PROMPT_FILE").map(PathBuf::from),
            end_marker: env_or("TUTOR_END_MARKER", DEFAULT_END_MARKER),
            cors_allowed_origins: env_opt("TUTOR_CORS_ORIGINS"),
            enable_swagger: parse_bool("TUTOR_ENABLE_SWAGGER", true),
        }
    }

    /// Sampling parameters for every upstream call.
    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.temperature,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            model: "gemini-2.5-flash-preview-04-17".to_owned(),
            temperature: 0.2,
            top_p: 0.8,
            max_output_tokens: 4096,
            rate_window: Duration::from_secs(60),
            rate_max_requests: 30,
            trust_forwarded: false,
            stream_buffer: 32,
            prompt_file: None,
            end_marker: DEFAULT_END_MARKER.to_owned(),
            cors_allowed_origins: None,
            enable_swagger: true,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}
