//! Runtime configuration gathered from the environment.
//!
//! Values come from process environment variables (optionally seeded from a
//! `.env` file by the binary) and fall back to defaults that match the public
//! BMTC web portal. CLI flags override paths and run options on top of this.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings for talking to the transit authority's API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub origin: String,
    pub referer: String,
    pub language: String,
    pub device_type: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts per request, including the first one.
    pub attempts: u32,
    pub retry_pause: Duration,
    /// Pause before every request so the backend is not hammered.
    pub request_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bmtcmobileapistaging.amnex.com/WebAPI".to_string(),
            origin: "https://bmtcwebportal.amnex.com".to_string(),
            referer: "https://bmtcwebportal.amnex.com/".to_string(),
            language: "en".to_string(),
            device_type: "WEB".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            attempts: 3,
            retry_pause: Duration::from_secs(2),
            request_delay: Duration::from_millis(500),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_or("BMTC_API_BASE_URL", defaults.base_url),
            origin: env_or("BMTC_API_ORIGIN", defaults.origin),
            referer: env_or("BMTC_API_REFERER", defaults.referer),
            language: env_or("BMTC_API_LANGUAGE", defaults.language),
            device_type: defaults.device_type,
            timeout: Duration::from_secs(env_parse(
                "BMTC_HTTP_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            connect_timeout: Duration::from_secs(env_parse(
                "BMTC_HTTP_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )),
            attempts: env_parse("BMTC_HTTP_RETRIES", defaults.attempts).max(1),
            retry_pause: Duration::from_millis(env_parse(
                "BMTC_HTTP_RETRY_PAUSE_MS",
                defaults.retry_pause.as_millis() as u64,
            )),
            request_delay: Duration::from_millis(env_parse(
                "BMTC_REQUEST_DELAY_MS",
                defaults.request_delay.as_millis() as u64,
            )),
        }
    }
}

/// Static facts about the published feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub agency_id: String,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    /// Language tag of the transliterated stop names.
    pub translation_language: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            agency_id: "1".to_string(),
            agency_name: "BMTC".to_string(),
            agency_url: "https://mybmtc.karnataka.gov.in/english".to_string(),
            agency_timezone: "Asia/Kolkata".to_string(),
            translation_language: "kn".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            agency_id: defaults.agency_id,
            agency_name: env_or("GTFS_AGENCY_NAME", defaults.agency_name),
            agency_url: env_or("GTFS_AGENCY_URL", defaults.agency_url),
            agency_timezone: env_or("GTFS_AGENCY_TIMEZONE", defaults.agency_timezone),
            translation_language: defaults.translation_language,
        }
    }
}

/// Locations of the third-party validators. Unset means "skip".
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub java: String,
    pub gtfs_validator_jar: Option<PathBuf>,
    pub gtfsvtor_bin: Option<PathBuf>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            gtfs_validator_jar: None,
            gtfsvtor_bin: None,
        }
    }
}

impl ValidatorConfig {
    pub fn from_env() -> Self {
        Self {
            java: env_or("JAVA_BIN", "java".to_string()),
            gtfs_validator_jar: std::env::var("GTFS_VALIDATOR_JAR").ok().map(PathBuf::from),
            gtfsvtor_bin: std::env::var("GTFSVTOR_BIN").ok().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub feed: FeedConfig,
    pub validators: ValidatorConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            feed: FeedConfig::from_env(),
            validators: ValidatorConfig::from_env(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
            default
        }),
        Err(_) => default,
    }
}
