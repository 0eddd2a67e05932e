use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] basic_toml::Error),
    #[error("failed to initialise logger: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Magic links live at most one day
pub const MAX_TTL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PocketsendSettings {
    pub application: ApplicationSettings,
    pub magic_link: MagicLinkSettings,
    pub password: PasswordSettings,
    pub storage: StorageSettings,
    pub dispatch: DispatchSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public origin of the UI; verification links are built under it
    pub base_url: String,
    /// `production` hides debug links from magic-link responses
    pub environment: String,
    pub cors_origins: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MagicLinkSettings {
    pub ttl_seconds: u64,
    pub token_bytes: usize,
    /// Create a placeholder candidate for unknown phone numbers
    pub auto_provision: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
    pub min_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `memory` or `sqlite`
    pub backend: String,
    pub database_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// `log` or `webhook`
    pub mode: String,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
    /// Upper bound on a single delivery attempt
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            environment: "development".to_string(),
            cors_origins: "http://localhost:5000,http://localhost:5173".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

impl Default for MagicLinkSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            token_bytes: 32,
            auto_provision: false,
        }
    }
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            min_length: 8,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            database_url: "sqlite://pocketsend.db".to_string(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            mode: "log".to_string(),
            webhook_url: None,
            webhook_token: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PocketsendSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - A settings file cannot be read or parsed
    /// - The resulting configuration is invalid
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings(Path::new("Settings.toml"))?;
        Self::apply_env_overrides(&mut settings);
        settings.initialize_logger()?;
        settings.validate()?;

        Ok(settings)
    }

    /// `RUST_LOG` has already been folded into `logging.level`
    fn initialize_logger(&self) -> Result<(), SettingsError> {
        env_logger::Builder::new()
            .parse_filters(&self.logging.level)
            .try_init()?;
        Ok(())
    }

    /// Load base settings, highest priority last:
    /// 1. Default settings
    /// 2. `default_path` (normally `./Settings.toml`) if it exists
    /// 3. `Settings.toml` in `POCKETSEND_SECRETS_DIR`, replacing the above
    ///
    /// Environment variables are applied separately afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed.
    pub fn load_base_settings(default_path: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if default_path.exists() {
            settings = basic_toml::from_str(&fs::read_to_string(default_path)?)?;
            println!("✓ Loaded base settings from {}", default_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("POCKETSEND_SECRETS_DIR") {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = basic_toml::from_str(&fs::read_to_string(&secrets_path)?)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ POCKETSEND_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        let app = &mut settings.application;
        Self::apply_string_env_override("HOST", &mut app.host);
        Self::apply_parsed_env_override("PORT", &mut app.port);
        Self::apply_string_env_override("BASE_URL", &mut app.base_url);
        Self::apply_string_env_override("APP_ENV", &mut app.environment);
        Self::apply_string_env_override("CORS_ORIGINS", &mut app.cors_origins);
        Self::apply_parsed_env_override("REQUEST_TIMEOUT_SECONDS", &mut app.request_timeout_seconds);

        let magic_link = &mut settings.magic_link;
        Self::apply_parsed_env_override("MAGIC_LINK_TTL_SECONDS", &mut magic_link.ttl_seconds);
        Self::apply_parsed_env_override("MAGIC_LINK_AUTO_PROVISION", &mut magic_link.auto_provision);

        let password = &mut settings.password;
        Self::apply_parsed_env_override("BCRYPT_COST", &mut password.bcrypt_cost);
        Self::apply_parsed_env_override("PASSWORD_MIN_LENGTH", &mut password.min_length);

        Self::apply_string_env_override("STORAGE_BACKEND", &mut settings.storage.backend);
        Self::apply_string_env_override("DATABASE_URL", &mut settings.storage.database_url);

        let dispatch = &mut settings.dispatch;
        Self::apply_string_env_override("DISPATCH_MODE", &mut dispatch.mode);
        if let Ok(url) = std::env::var("DISPATCH_WEBHOOK_URL") {
            dispatch.webhook_url = Some(url);
        }
        if let Ok(token) = std::env::var("DISPATCH_WEBHOOK_TOKEN") {
            dispatch.webhook_token = Some(token);
        }
        Self::apply_parsed_env_override("DISPATCH_TIMEOUT_SECONDS", &mut dispatch.timeout_seconds);

        Self::apply_string_env_override("RUST_LOG", &mut settings.logging.level);
    }

    fn apply_string_env_override(env_var: &str, target: &mut String) {
        if let Ok(value) = std::env::var(env_var) {
            if !value.trim().is_empty() {
                *target = value.trim().to_string();
            }
        }
    }

    /// Unparsable values are ignored and the current setting kept
    fn apply_parsed_env_override<T: std::str::FromStr>(env_var: &str, target: &mut T) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.trim().parse::<T>() {
                *target = value;
            }
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if line.trim_start().starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Reject configurations the service cannot run safely with
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(10..=31).contains(&self.password.bcrypt_cost) {
            return invalid(format!(
                "bcrypt_cost must be between 10 and 31, got {}",
                self.password.bcrypt_cost
            ));
        }
        if self.magic_link.token_bytes < 32 {
            return invalid(format!(
                "token_bytes must be at least 32, got {}",
                self.magic_link.token_bytes
            ));
        }
        if self.magic_link.ttl_seconds == 0 {
            return invalid("ttl_seconds must be greater than zero".to_string());
        }
        if self.magic_link.ttl_seconds > MAX_TTL_SECONDS {
            return invalid(format!(
                "ttl_seconds must be at most {MAX_TTL_SECONDS}, got {}",
                self.magic_link.ttl_seconds
            ));
        }
        match url::Url::parse(&self.application.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return invalid(format!(
                    "base_url must be an absolute http(s) URL, got {:?}",
                    self.application.base_url
                ))
            }
        }
        match self.dispatch.mode.as_str() {
            "log" => {}
            "webhook" if self.dispatch.webhook_url.is_some() => {}
            "webhook" => return invalid("webhook dispatch requires webhook_url".to_string()),
            other => return invalid(format!("unknown dispatch mode {other:?}")),
        }
        if self.dispatch.timeout_seconds == 0 {
            return invalid("dispatch timeout_seconds must be greater than zero".to_string());
        }
        match self.storage.backend.as_str() {
            "memory" => {}
            "sqlite" if cfg!(feature = "sqlite") => {}
            "sqlite" => return invalid("built without the sqlite feature".to_string()),
            other => return invalid(format!("unknown storage backend {other:?}")),
        }
        Ok(())
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.application.environment.eq_ignore_ascii_case("production")
    }
}

fn invalid(message: String) -> Result<(), SettingsError> {
    Err(SettingsError::Invalid(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "BASE_URL",
        "APP_ENV",
        "CORS_ORIGINS",
        "REQUEST_TIMEOUT_SECONDS",
        "MAGIC_LINK_TTL_SECONDS",
        "MAGIC_LINK_AUTO_PROVISION",
        "BCRYPT_COST",
        "PASSWORD_MIN_LENGTH",
        "STORAGE_BACKEND",
        "DATABASE_URL",
        "DISPATCH_MODE",
        "DISPATCH_WEBHOOK_URL",
        "DISPATCH_WEBHOOK_TOKEN",
        "DISPATCH_TIMEOUT_SECONDS",
        "POCKETSEND_SECRETS_DIR",
    ];

    fn clean_env_vars() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_settings(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("Settings.toml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = PocketsendSettings::default();
        assert_eq!(settings.magic_link.ttl_seconds, 3600);
        assert_eq!(settings.magic_link.token_bytes, 32);
        assert!(!settings.magic_link.auto_provision);
        assert_eq!(settings.password.bcrypt_cost, 12);
        assert_eq!(settings.password.min_length, 8);
        assert_eq!(settings.storage.backend, "memory");
        assert_eq!(settings.dispatch.mode, "log");
        assert_eq!(settings.dispatch.timeout_seconds, 10);
        assert!(!settings.is_production());
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_partial_toml_keeps_defaults() {
        clean_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(
            dir.path(),
            "[application]\nport = 8088\n\n[magic_link]\nauto_provision = true\n",
        );

        let settings = PocketsendSettings::load_base_settings(&path).unwrap();
        assert_eq!(settings.application.port, 8088);
        assert_eq!(settings.application.host, "0.0.0.0");
        assert!(settings.magic_link.auto_provision);
        assert_eq!(settings.magic_link.ttl_seconds, 3600);
    }

    #[test]
    #[serial]
    fn test_secrets_dir_replaces_root_settings() {
        clean_env_vars();
        let root = tempfile::tempdir().unwrap();
        let secrets = tempfile::tempdir().unwrap();
        let root_path = write_settings(root.path(), "[application]\nport = 7000\n");
        write_settings(secrets.path(), "[password]\nbcrypt_cost = 13\n");

        std::env::set_var("POCKETSEND_SECRETS_DIR", secrets.path());
        let settings = PocketsendSettings::load_base_settings(&root_path).unwrap();

        assert_eq!(settings.password.bcrypt_cost, 13);
        // Wholesale replacement, not a merge
        assert_eq!(settings.application.port, 5000);
        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        clean_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let settings =
            PocketsendSettings::load_base_settings(&dir.path().join("Settings.toml")).unwrap();
        assert_eq!(settings.application.port, 5000);
    }

    #[test]
    #[serial]
    fn test_malformed_toml_is_an_error() {
        clean_env_vars();
        let dir = tempfile::tempdir().unwrap();
        let path = write_settings(dir.path(), "[application\nport = ");
        assert!(matches!(
            PocketsendSettings::load_base_settings(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();
        std::env::set_var("PORT", "9090");
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("MAGIC_LINK_TTL_SECONDS", "600");
        std::env::set_var("MAGIC_LINK_AUTO_PROVISION", "true");
        std::env::set_var("BCRYPT_COST", "11");
        std::env::set_var("DISPATCH_MODE", "webhook");
        std::env::set_var("DISPATCH_WEBHOOK_URL", "https://sms.example.com/send");
        std::env::set_var("DISPATCH_TIMEOUT_SECONDS", "3");

        let mut settings = PocketsendSettings::default();
        PocketsendSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.application.port, 9090);
        assert!(settings.is_production());
        assert_eq!(settings.magic_link.ttl_seconds, 600);
        assert!(settings.magic_link.auto_provision);
        assert_eq!(settings.password.bcrypt_cost, 11);
        assert_eq!(settings.dispatch.mode, "webhook");
        assert_eq!(
            settings.dispatch.webhook_url.as_deref(),
            Some("https://sms.example.com/send")
        );
        assert_eq!(settings.dispatch.timeout_seconds, 3);
        assert!(settings.validate().is_ok());

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_unparsable_env_value_is_ignored() {
        clean_env_vars();
        std::env::set_var("PORT", "not-a-port");
        let mut settings = PocketsendSettings::default();
        PocketsendSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.application.port, 5000);
        clean_env_vars();
    }

    #[test]
    fn test_validate_rejections() {
        let cases: Vec<(&str, Box<dyn Fn(&mut PocketsendSettings)>)> = vec![
            ("low cost", Box::new(|s: &mut PocketsendSettings| s.password.bcrypt_cost = 9)),
            ("high cost", Box::new(|s: &mut PocketsendSettings| s.password.bcrypt_cost = 32)),
            ("short tokens", Box::new(|s: &mut PocketsendSettings| s.magic_link.token_bytes = 16)),
            ("zero ttl", Box::new(|s: &mut PocketsendSettings| s.magic_link.ttl_seconds = 0)),
            ("huge ttl", Box::new(|s: &mut PocketsendSettings| s.magic_link.ttl_seconds = u64::MAX)),
            ("ttl over a day", Box::new(|s: &mut PocketsendSettings| s.magic_link.ttl_seconds = MAX_TTL_SECONDS + 1)),
            ("relative base", Box::new(|s: &mut PocketsendSettings| s.application.base_url = "/app".to_string())),
            ("ftp base", Box::new(|s: &mut PocketsendSettings| s.application.base_url = "ftp://x.test".to_string())),
            ("webhook no url", Box::new(|s: &mut PocketsendSettings| s.dispatch.mode = "webhook".to_string())),
            ("bad dispatch", Box::new(|s: &mut PocketsendSettings| s.dispatch.mode = "pigeon".to_string())),
            ("zero dispatch timeout", Box::new(|s: &mut PocketsendSettings| s.dispatch.timeout_seconds = 0)),
            ("bad storage", Box::new(|s: &mut PocketsendSettings| s.storage.backend = "postgres".to_string())),
        ];

        for (name, mutate) in cases {
            let mut settings = PocketsendSettings::default();
            mutate(&mut settings);
            assert!(
                matches!(settings.validate(), Err(SettingsError::Invalid(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_cors_origins_split() {
        let mut settings = PocketsendSettings::default();
        settings.application.cors_origins = "https://a.test, https://b.test,".to_string();
        assert_eq!(
            settings.get_cors_origins(),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert_eq!(settings.get_bind_address(), "0.0.0.0:5000");
    }
}
