use serde::Deserialize;

use crate::auth::jwt::MAX_TTL_HOURS;
use crate::error::AppError;

const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";

/// Runtime configuration.
///
/// Sources, later ones overriding earlier ones:
/// - built-in defaults
/// - `acsoguard.toml` in the working directory (or the file passed with `--config`)
/// - `ACSOGUARD_*` environment variables (e.g. `ACSOGUARD_JWT_SECRET`)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Optional credentials injected into `mongodb_uri` at connect time.
    #[serde(default)]
    pub mongodb_username: Option<String>,
    #[serde(default)]
    pub mongodb_password: Option<String>,
    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,
    /// Bearer token lifetime.
    pub jwt_ttl_hours: i64,
    /// Bucket holding incident attachments.
    pub s3_bucket: String,
    /// Custom S3 endpoint (MinIO, LocalStack).
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    /// Directory with the built frontend, served for non-API paths.
    #[serde(default)]
    pub static_dir: Option<String>,
    /// Comma-separated list of allowed CORS origins. Empty disables CORS.
    #[serde(default)]
    pub cors_origins: String,
    /// Capacity of the live event channel.
    pub live_buffer: usize,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let file = match path {
            Some(path) => config::File::with_name(path).required(true),
            None => config::File::with_name("acsoguard").required(false),
        };

        let settings = config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:5000")
            .map_err(config_error)?
            .set_default("mongodb_uri", "mongodb://localhost:27017")
            .map_err(config_error)?
            .set_default("mongodb_database", "acsoguard")
            .map_err(config_error)?
            .set_default("jwt_secret", DEFAULT_JWT_SECRET)
            .map_err(config_error)?
            .set_default("jwt_ttl_hours", 24)
            .map_err(config_error)?
            .set_default("s3_bucket", "acsoguard-attachments")
            .map_err(config_error)?
            .set_default("live_buffer", 256)
            .map_err(config_error)?
            .add_source(file)
            .add_source(config::Environment::with_prefix("ACSOGUARD").try_parsing(true))
            .build()
            .map_err(config_error)?;

        let config: AppConfig = settings.try_deserialize().map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.jwt_ttl_hours <= 0 || self.jwt_ttl_hours > MAX_TTL_HOURS {
            return Err(AppError::Internal(format!(
                "jwt_ttl_hours must be between 1 and {MAX_TTL_HOURS}"
            )));
        }
        if self.live_buffer == 0 {
            return Err(AppError::Internal("live_buffer must be greater than zero".into()));
        }
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!("Using the built-in development JWT secret; set ACSOGUARD_JWT_SECRET");
        }
        Ok(())
    }

    /// The MongoDB URI with `mongodb_username`/`mongodb_password` injected, if set.
    pub fn mongodb_connection_uri(&self) -> Result<String, AppError> {
        let Some(username) = self.mongodb_username.as_deref() else {
            return Ok(self.mongodb_uri.clone());
        };

        let mut url = url::Url::parse(&self.mongodb_uri)
            .map_err(|e| AppError::Internal(format!("Invalid mongodb_uri: {e}")))?;
        url.set_username(username)
            .map_err(|_| AppError::Internal("mongodb_uri cannot carry credentials".into()))?;
        url.set_password(self.mongodb_password.as_deref())
            .map_err(|_| AppError::Internal("mongodb_uri cannot carry credentials".into()))?;

        Ok(url.to_string())
    }

    /// Parsed CORS origins, trimmed, empty entries dropped.
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect()
    }
}

fn config_error(err: config::ConfigError) -> AppError {
    AppError::Internal(format!("Invalid configuration: {err}"))
}
