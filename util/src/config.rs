//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub renderer_url: String,
    pub renderer_timeout_seconds: u64,
    pub storage_upload_url: String,
    pub storage_public_base: String,
    pub storage_signing_key: String,
    pub artifact_url_expiry_minutes: u64,
    pub gmail_username: String,
    pub gmail_app_password: String,
    pub email_from_name: String,
    pub frontend_url: String,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// This method is used internally to populate the singleton. It panics
    /// if required variables are missing or improperly formatted.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "learnsphere".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").expect("DATABASE_PATH is required"),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap(),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET is required"),
            jwt_duration_minutes: env::var("JWT_DURATION_MINUTES")
                .unwrap_or("60".into())
                .parse()
                .unwrap(),
            renderer_url: env::var("RENDERER_URL").unwrap_or_default(),
            renderer_timeout_seconds: env::var("RENDERER_TIMEOUT_SECONDS")
                .unwrap_or("10".into())
                .parse()
                .unwrap(),
            storage_upload_url: env::var("STORAGE_UPLOAD_URL").unwrap_or_default(),
            storage_public_base: env::var("STORAGE_PUBLIC_BASE").unwrap_or_default(),
            storage_signing_key: env::var("STORAGE_SIGNING_KEY").unwrap_or_default(),
            artifact_url_expiry_minutes: env::var("ARTIFACT_URL_EXPIRY_MINUTES")
                .unwrap_or("5".into())
                .parse()
                .unwrap(),
            gmail_username: env::var("GMAIL_USERNAME").unwrap_or_default(),
            gmail_app_password: env::var("GMAIL_APP_PASSWORD").unwrap_or_default(),
            email_from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "LearnSphere".into()),
            frontend_url: env::var("FRONTEND_URL").unwrap_or_default(),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().unwrap();
            *guard = AppConfig::from_env();
        }
    }

    /// Generic internal setter for any field in the config.
    ///
    /// Used by public per-field setter methods.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    /// Override `env` value.
    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_project_name(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.project_name = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_renderer_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.renderer_url = value.into());
    }

    pub fn set_renderer_timeout_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.renderer_timeout_seconds = value);
    }

    pub fn set_storage_upload_url(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_upload_url = value.into());
    }

    pub fn set_storage_public_base(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_public_base = value.into());
    }

    pub fn set_storage_signing_key(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.storage_signing_key = value.into());
    }

    pub fn set_artifact_url_expiry_minutes(value: u64) {
        AppConfig::set_field(|cfg| cfg.artifact_url_expiry_minutes = value);
    }

    pub fn set_gmail_username(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gmail_username = value.into());
    }

    pub fn set_gmail_app_password(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.gmail_app_password = value.into());
    }

    pub fn set_email_from_name(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.email_from_name = value.into());
    }
}

// --- Free-function getters, the form the rest of the workspace uses ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn renderer_url() -> String {
    AppConfig::global().renderer_url.clone()
}

pub fn renderer_timeout_seconds() -> u64 {
    AppConfig::global().renderer_timeout_seconds
}

pub fn storage_upload_url() -> String {
    AppConfig::global().storage_upload_url.clone()
}

pub fn storage_public_base() -> String {
    AppConfig::global().storage_public_base.clone()
}

pub fn storage_signing_key() -> String {
    AppConfig::global().storage_signing_key.clone()
}

pub fn artifact_url_expiry_minutes() -> u64 {
    AppConfig::global().artifact_url_expiry_minutes
}

pub fn gmail_username() -> String {
    AppConfig::global().gmail_username.clone()
}

pub fn gmail_app_password() -> String {
    AppConfig::global().gmail_app_password.clone()
}

pub fn email_from_name() -> String {
    AppConfig::global().email_from_name.clone()
}

pub fn frontend_url() -> String {
    AppConfig::global().frontend_url.clone()
}
