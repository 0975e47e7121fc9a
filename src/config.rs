use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "LabsExplained";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upload ceiling for lab-report files (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types accepted by the lab-set upload.
pub const ALLOWED_UPLOAD_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg"];

/// Session token lifetime (1 hour).
pub const SESSION_TOKEN_TTL_SECS: i64 = 3600;

/// Password reset token lifetime.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// PBKDF2 rounds for password hashes.
pub const DEFAULT_PASSWORD_HASH_ITERATIONS: u32 = 600_000;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_DATABASE_PATH: &str = "labsexplained.db";
const DEFAULT_FHIR_SERVER_URL: &str = "http://localhost:8080/fhir";
const DEFAULT_OCR_API_URL: &str = "http://localhost:8001/ocr";
const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAILGUN_API_URL: &str = "https://api.eu.mailgun.net";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "labsexplained_lib=info,labsexplained=info,tower_http=info".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Mailgun credentials. Absent when reset emails are only logged.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub domain: String,
    pub api_key: String,
    pub from: String,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub fhir_server_url: String,
    pub ocr_api_url: String,
    pub ocr_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub jwt_secret: String,
    pub mail: Option<MailConfig>,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub http_timeout_secs: u64,
    pub password_hash_iterations: u32,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = get("LABS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "LABS_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let http_timeout_secs = parse_number(
            "HTTP_TIMEOUT_SECS",
            get("HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        let password_hash_iterations = parse_number(
            "PASSWORD_HASH_ITERATIONS",
            get("PASSWORD_HASH_ITERATIONS"),
            DEFAULT_PASSWORD_HASH_ITERATIONS,
        )?;

        let mail = match (get("MAILGUN_DOMAIN"), get("MAILGUN_API_KEY")) {
            (Some(domain), Some(api_key)) => Some(MailConfig {
                api_url: get("MAILGUN_API_URL")
                    .unwrap_or_else(|| DEFAULT_MAILGUN_API_URL.to_string()),
                from: get("EMAIL_FROM").unwrap_or_else(|| format!("{APP_NAME} <noreply@{domain}>")),
                domain,
                api_key,
            }),
            _ => None,
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            database_path: PathBuf::from(
                get("LABS_DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            fhir_server_url: get("FHIR_SERVER_URL")
                .unwrap_or_else(|| DEFAULT_FHIR_SERVER_URL.to_string()),
            ocr_api_url: get("OCR_API_URL").unwrap_or_else(|| DEFAULT_OCR_API_URL.to_string()),
            ocr_api_key: get("OCR_API_KEY"),
            llm_api_url: get("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_api_key: get("LLM_API_KEY"),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            jwt_secret,
            mail,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_origins,
            http_timeout_secs,
            password_hash_iterations,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
