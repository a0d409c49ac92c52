use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 10;

/// How much the upload response says about files that were skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureReporting {
    /// Skipped files are only logged server-side.
    #[default]
    Silent,
    /// Skipped files are listed in the response with a reason.
    Detailed,
}

impl FromStr for FailureReporting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" => Ok(FailureReporting::Silent),
            "detailed" => Ok(FailureReporting::Detailed),
            other => Err(format!("Unknown failure reporting level: {}", other)),
        }
    }
}

/// Which browser origins may call the API cross-origin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CorsPolicy {
    /// Any origin, for development setups where the client runs on another port.
    #[default]
    AnyOrigin,
    /// Only the listed origins.
    Origins(Vec<String>),
    /// No CORS headers at all; only same-origin clients work.
    Disabled,
}

impl FromStr for CorsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(CorsPolicy::AnyOrigin),
            "" | "none" | "off" => Ok(CorsPolicy::Disabled),
            list => {
                let origins: Vec<String> = list
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect();
                if origins.iter().all(|o| o.starts_with("http://") || o.starts_with("https://")) {
                    Ok(CorsPolicy::Origins(origins))
                } else {
                    Err(format!("Invalid CORS origin list: {}", list))
                }
            }
        }
    }
}

/// At most `max_requests` per client IP in each fixed `window`. Zero disables the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }
}

/// 100 requests per 15 minutes on `/api`.
pub const DEFAULT_API_RATE_LIMIT: RateLimit = RateLimit::new(100, 15 * 60);
/// 10 uploads per minute.
pub const DEFAULT_UPLOAD_RATE_LIMIT: RateLimit = RateLimit::new(10, 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl UploadLimits {
    /// Upper bound for a whole multipart body, with some room for part headers.
    pub fn max_request_size(&self) -> u64 {
        self.max_file_size * self.max_files as u64 + 1024 * 1024
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub db_max_connections: u32,
    pub storage_path: String,
    pub static_dir: Option<String>,
    pub limits: UploadLimits,
    pub failure_reporting: FailureReporting,
    pub cors: CorsPolicy,
    pub api_rate_limit: RateLimit,
    pub upload_rate_limit: RateLimit,
}

fn rate_limit_from_env(prefix: &str, default: RateLimit) -> Result<RateLimit, Box<dyn std::error::Error>> {
    let max_requests = match env::var(format!("{}_MAX", prefix)) {
        Ok(value) => value.parse()?,
        Err(_) => default.max_requests,
    };
    let window_secs = match env::var(format!("{}_WINDOW_SECS", prefix)) {
        Ok(value) => value.parse()?,
        Err(_) => default.window.as_secs(),
    };
    Ok(RateLimit::new(max_requests, window_secs))
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("PHOTO_SYNC_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            host: env::var("PHOTO_SYNC_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("PHOTO_SYNC_DB_PATH")
                .unwrap_or_else(|_| "./data/photos.db".to_string()),
            db_max_connections: env::var("PHOTO_SYNC_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            storage_path: env::var("PHOTO_SYNC_STORAGE_PATH")
                .unwrap_or_else(|_| "./storage".to_string()),
            static_dir: env::var("PHOTO_SYNC_STATIC_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            limits: UploadLimits {
                max_file_size: env::var("PHOTO_SYNC_MAX_FILE_SIZE")
                    .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE.to_string())
                    .parse()?,
                max_files: env::var("PHOTO_SYNC_MAX_FILES")
                    .unwrap_or_else(|_| DEFAULT_MAX_FILES.to_string())
                    .parse()?,
            },
            failure_reporting: env::var("PHOTO_SYNC_FAILURE_REPORTING")
                .unwrap_or_else(|_| "silent".to_string())
                .parse()?,
            cors: env::var("PHOTO_SYNC_CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .parse()?,
            api_rate_limit: rate_limit_from_env("PHOTO_SYNC_RATE_LIMIT", DEFAULT_API_RATE_LIMIT)?,
            upload_rate_limit: rate_limit_from_env(
                "PHOTO_SYNC_UPLOAD_RATE_LIMIT",
                DEFAULT_UPLOAD_RATE_LIMIT,
            )?,
        })
    }
}
