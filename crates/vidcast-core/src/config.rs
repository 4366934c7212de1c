//! Configuration module
//!
//! Pipeline configuration is read from the environment (with `.env` support)
//! once at startup and shared read-only afterwards.

use std::env;
use std::str::FromStr;

use crate::constants::DEFAULT_ENCODER_PROCESSOR;
use crate::models::{default_ladder, parse_ladder, RenditionSpec};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 4000;
const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
const UPLOAD_LOCATOR_VALID_FOR_HOURS: i64 = 1;
const VIDEO_AVAILABLE_FOR_DAYS: i64 = 30;
const ALLOWED_VIDEO_FILE_EXTENSIONS: &str = ".mp4,.mov,.wmv,.avi,.mkv";
const JOB_TIMEOUT_SECS: u64 = 1800;
const JOB_POLL_INTERVAL_MS: u64 = 1000;
const MAX_CONCURRENT_JOBS: usize = 2;
const DEV_STORAGE_ACCOUNT_NAME: &str = "devstoreaccount";
const DEV_STORAGE_ACCOUNT_KEY: &str = "dev-storage-account-key-change-me";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Externally reachable origin of this service, used in signed URLs.
    pub public_base_url: String,
    // Storage account
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub storage_account_name: Option<String>,
    pub storage_account_key: Option<String>,
    // Transcode account
    pub transcode_account_name: Option<String>,
    pub transcode_account_key: Option<String>,
    pub ffmpeg_path: String,
    pub encoder_processor_name: String,
    pub max_concurrent_jobs: usize,
    // Upload and publish policy
    pub max_file_size_bytes: u64,
    pub upload_locator_valid_for_hours: i64,
    pub video_available_for_days: i64,
    /// Extensions including the leading dot. Matching is case-sensitive.
    pub allowed_video_file_extensions: Vec<String>,
    pub renditions: Vec<RenditionSpec>,
    pub job_timeout_secs: u64,
    pub job_poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            server_port: SERVER_PORT,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            public_base_url: format!("http://localhost:{}", SERVER_PORT),
            storage_backend: StorageBackend::Memory,
            local_storage_path: None,
            s3_bucket: None,
            s3_region: None,
            storage_account_name: None,
            storage_account_key: None,
            transcode_account_name: None,
            transcode_account_key: None,
            ffmpeg_path: "ffmpeg".to_string(),
            encoder_processor_name: DEFAULT_ENCODER_PROCESSOR.to_string(),
            max_concurrent_jobs: MAX_CONCURRENT_JOBS,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            upload_locator_valid_for_hours: UPLOAD_LOCATOR_VALID_FOR_HOURS,
            video_available_for_days: VIDEO_AVAILABLE_FOR_DAYS,
            allowed_video_file_extensions: split_extensions(ALLOWED_VIDEO_FILE_EXTENSIONS),
            renditions: default_ladder(),
            job_timeout_secs: JOB_TIMEOUT_SECS,
            job_poll_interval_ms: JOB_POLL_INTERVAL_MS,
        }
    }
}

fn split_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = PipelineConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = env_parse("PORT", SERVER_PORT)?;

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None if env_opt("LOCAL_STORAGE_PATH").is_some() => StorageBackend::Local,
            None => StorageBackend::Memory,
        };

        let renditions = match env_opt("RENDITIONS") {
            Some(raw) => parse_ladder(&raw)?,
            None => defaults.renditions,
        };

        Ok(PipelineConfig {
            server_port,
            cors_origins,
            public_base_url: env_opt("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", server_port))
                .trim_end_matches('/')
                .to_string(),
            environment,
            storage_backend,
            local_storage_path: env_opt("LOCAL_STORAGE_PATH"),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION").or_else(|| env_opt("AWS_REGION")),
            storage_account_name: env_opt("STORAGE_ACCOUNT_NAME"),
            storage_account_key: env_opt("STORAGE_ACCOUNT_KEY"),
            transcode_account_name: env_opt("TRANSCODE_ACCOUNT_NAME"),
            transcode_account_key: env_opt("TRANSCODE_ACCOUNT_KEY"),
            ffmpeg_path: env_opt("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            encoder_processor_name: env_opt("ENCODER_PROCESSOR_NAME")
                .unwrap_or(defaults.encoder_processor_name),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", MAX_CONCURRENT_JOBS)?,
            max_file_size_bytes: env_parse("MAX_FILE_SIZE_BYTES", MAX_FILE_SIZE_BYTES)?,
            upload_locator_valid_for_hours: env_parse(
                "UPLOAD_LOCATOR_VALID_FOR_HOURS",
                UPLOAD_LOCATOR_VALID_FOR_HOURS,
            )?,
            video_available_for_days: env_parse(
                "VIDEO_AVAILABLE_FOR_DAYS",
                VIDEO_AVAILABLE_FOR_DAYS,
            )?,
            allowed_video_file_extensions: env_opt("ALLOWED_VIDEO_FILE_EXTENSIONS")
                .map(|raw| split_extensions(&raw))
                .unwrap_or(defaults.allowed_video_file_extensions),
            renditions,
            job_timeout_secs: env_parse("JOB_TIMEOUT_SECS", JOB_TIMEOUT_SECS)?,
            job_poll_interval_ms: env_parse("JOB_POLL_INTERVAL_MS", JOB_POLL_INTERVAL_MS)?,
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.is_production() && self.storage_account_key.is_none() {
            return Err(anyhow::anyhow!(
                "STORAGE_ACCOUNT_KEY must be set in production"
            ));
        }

        if self.allowed_video_file_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_VIDEO_FILE_EXTENSIONS must list at least one extension"
            ));
        }

        if let Some(ext) = self
            .allowed_video_file_extensions
            .iter()
            .find(|e| !e.starts_with('.'))
        {
            return Err(anyhow::anyhow!(
                "Allowed extension '{}' must start with a dot",
                ext
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_BYTES must be greater than 0"));
        }

        if self.upload_locator_valid_for_hours <= 0 || self.video_available_for_days <= 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_LOCATOR_VALID_FOR_HOURS and VIDEO_AVAILABLE_FOR_DAYS must be positive"
            ));
        }

        if self.job_timeout_secs == 0 || self.job_poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "JOB_TIMEOUT_SECS and JOB_POLL_INTERVAL_MS must be greater than 0"
            ));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_JOBS must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn inner(&self) -> &PipelineConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        self.inner().is_production()
    }

    /// Both storage and transcode accounts have explicit credentials.
    pub fn credentials_configured(&self) -> bool {
        let c = self.inner();
        c.storage_account_name.is_some()
            && c.storage_account_key.is_some()
            && c.transcode_account_name.is_some()
            && c.transcode_account_key.is_some()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn public_base_url(&self) -> &str {
        &self.inner().public_base_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn storage_account_name(&self) -> &str {
        self.inner()
            .storage_account_name
            .as_deref()
            .unwrap_or(DEV_STORAGE_ACCOUNT_NAME)
    }

    /// Key used to sign container capabilities.
    pub fn storage_account_key(&self) -> &str {
        self.inner()
            .storage_account_key
            .as_deref()
            .unwrap_or(DEV_STORAGE_ACCOUNT_KEY)
    }

    pub fn transcode_account_name(&self) -> Option<&str> {
        self.inner().transcode_account_name.as_deref()
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn encoder_processor_name(&self) -> &str {
        &self.inner().encoder_processor_name
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.inner().max_concurrent_jobs
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.inner().max_file_size_bytes
    }

    pub fn upload_locator_valid_for_hours(&self) -> i64 {
        self.inner().upload_locator_valid_for_hours
    }

    pub fn video_available_for_days(&self) -> i64 {
        self.inner().video_available_for_days
    }

    pub fn allowed_video_file_extensions(&self) -> &[String] {
        &self.inner().allowed_video_file_extensions
    }

    pub fn renditions(&self) -> &[RenditionSpec] {
        &self.inner().renditions
    }

    pub fn job_timeout_secs(&self) -> u64 {
        self.inner().job_timeout_secs
    }

    pub fn job_poll_interval_ms(&self) -> u64 {
        self.inner().job_poll_interval_ms
    }
}

impl From<PipelineConfig> for Config {
    fn from(config: PipelineConfig) -> Self {
        Config(Box::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage_backend(), StorageBackend::Memory);
        assert_eq!(config.renditions().len(), 2);
        assert!(!config.credentials_configured());
    }

    #[test]
    fn test_split_extensions_keeps_case() {
        assert_eq!(
            split_extensions(".mp4, .MOV,,.mkv "),
            vec![".mp4".to_string(), ".MOV".to_string(), ".mkv".to_string()]
        );
    }

    #[test]
    fn test_validate_rejects_wildcard_cors_in_production() {
        let config = Config::from(PipelineConfig {
            environment: "production".to_string(),
            storage_account_key: Some("k".to_string()),
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn test_validate_requires_account_key_in_production() {
        let config = Config::from(PipelineConfig {
            environment: "prod".to_string(),
            cors_origins: vec!["https://app.example.com".to_string()],
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("STORAGE_ACCOUNT_KEY"));
    }

    #[test]
    fn test_validate_rejects_extension_without_dot() {
        let config = Config::from(PipelineConfig {
            allowed_video_file_extensions: vec!["mp4".to_string()],
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_local_backend_needs_path() {
        let config = Config::from(PipelineConfig {
            storage_backend: StorageBackend::Local,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_account_key_falls_back_to_dev_key() {
        let config = Config::default();
        assert_eq!(config.storage_account_key(), DEV_STORAGE_ACCOUNT_KEY);
        let config = Config::from(PipelineConfig {
            storage_account_key: Some("secret".to_string()),
            ..Default::default()
        });
        assert_eq!(config.storage_account_key(), "secret");
    }
}
