use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgileError;

pub const PASSWORD_ENV: &str = "UC4_DECRYPTED_PWD";
pub const DEFAULT_API_VERSION: &str = "v2.0";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConnectionConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
    pub skip_cert_validation: Option<bool>,
    pub timeout_secs: Option<u64>,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Default)]
pub struct ConnectionOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub skip_cert_validation: Option<bool>,
}

#[derive(Clone)]
pub enum Credentials {
    ApiKey(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey([REDACTED])"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub base_url: reqwest::Url,
    pub api_version: String,
    pub credentials: Credentials,
    pub skip_cert_validation: bool,
    pub timeout: Duration,
}

impl ConnectionSettings {
    pub fn resolve(
        config: &ConnectionConfig,
        overrides: ConnectionOverrides,
        password: Option<String>,
    ) -> std::result::Result<Self, AgileError> {
        let raw_url = non_empty(overrides.base_url)
            .or_else(|| non_empty(config.base_url.clone()))
            .ok_or_else(|| AgileError::invalid_parameter("URL", ""))?;
        let base_url = reqwest::Url::parse(&raw_url)
            .map_err(|_| AgileError::invalid_parameter("URL", &raw_url))?;

        let api_key = non_empty(overrides.api_key).or_else(|| non_empty(config.api_key.clone()));
        let credentials = match api_key {
            Some(key) => Credentials::ApiKey(key),
            None => {
                let username = non_empty(overrides.username)
                    .or_else(|| non_empty(config.username.clone()))
                    .ok_or_else(|| AgileError::invalid_parameter("Username", ""))?;
                let password = non_empty(password).ok_or_else(|| {
                    AgileError::Validation(format!(
                        "No API key configured and no password found in {PASSWORD_ENV}"
                    ))
                })?;
                Credentials::Basic { username, password }
            }
        };

        Ok(Self {
            base_url,
            api_version: non_empty(config.api_version.clone())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            credentials,
            skip_cert_validation: overrides
                .skip_cert_validation
                .or(config.skip_cert_validation)
                .unwrap_or(false),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// Root every REST path hangs off, without a trailing slash.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/slm/webservice/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.api_version
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agilecentral")
        .join("config.toml")
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> ConnectionConfig {
        ConnectionConfig {
            base_url: Some("https://rally1.rallydev.com".into()),
            username: Some("ops@example.com".into()),
            api_key: None,
            api_version: None,
            skip_cert_validation: Some(true),
            timeout_secs: None,
        }
    }

    #[test]
    fn parses_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[connection]
base_url = "https://rally1.rallydev.com"
api_key = "_abc"
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.connection.api_key.as_deref(), Some("_abc"));
        assert_eq!(config.connection.timeout_secs, Some(5));
    }

    #[test]
    fn missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(config.connection.base_url.is_none());
    }

    #[test]
    fn api_key_wins_over_basic_auth() {
        let overrides = ConnectionOverrides {
            api_key: Some("_key".into()),
            ..Default::default()
        };
        let settings = ConnectionSettings::resolve(&file_config(), overrides, None).unwrap();
        assert!(matches!(settings.credentials, Credentials::ApiKey(ref k) if k == "_key"));
        assert!(settings.skip_cert_validation);
        assert_eq!(
            settings.endpoint(),
            "https://rally1.rallydev.com/slm/webservice/v2.0"
        );
    }

    #[test]
    fn basic_auth_needs_password() {
        let err = ConnectionSettings::resolve(&file_config(), ConnectionOverrides::default(), None)
            .unwrap_err();
        assert!(err.to_string().contains(PASSWORD_ENV));

        let settings = ConnectionSettings::resolve(
            &file_config(),
            ConnectionOverrides::default(),
            Some("secret".into()),
        )
        .unwrap();
        assert!(matches!(settings.credentials, Credentials::Basic { .. }));
    }

    #[test]
    fn cli_overrides_file_values() {
        let overrides = ConnectionOverrides {
            base_url: Some("https://on-prem.example.com/".into()),
            skip_cert_validation: Some(false),
            ..Default::default()
        };
        let settings =
            ConnectionSettings::resolve(&file_config(), overrides, Some("pw".into())).unwrap();
        assert!(!settings.skip_cert_validation);
        assert_eq!(
            settings.endpoint(),
            "https://on-prem.example.com/slm/webservice/v2.0"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        let overrides = ConnectionOverrides {
            base_url: Some("not a url".into()),
            ..Default::default()
        };
        let err = ConnectionSettings::resolve(&ConnectionConfig::default(), overrides, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for parameter [URL] : [not a url]"
        );
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::Basic {
            username: "u".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
