use crate::error::{Result, WelcomeError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub region: RegionConfig,
    pub mail: MailConfig,
    pub qrz: QrzConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Geographic filter: 5-digit zip codes considered local. An empty list
/// disables the filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionConfig {
    #[serde(default)]
    pub zip_codes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub subject: String,
    pub template_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QrzConfig {
    pub login_url: String,
    pub profile_url_base: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Worker ceiling for concurrent sends. Lookup and email services
    /// rate-limit, so this stays in the low single digits.
    pub concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            WelcomeError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Load the welcome message template referenced by the config.
    pub fn load_template(&self) -> Result<String> {
        fs::read_to_string(&self.mail.template_path).map_err(|e| {
            WelcomeError::Config(format!(
                "Failed to read message template '{}': {}",
                self.mail.template_path, e
            ))
        })
    }
}

/// Credentials pulled from the environment rather than the config file.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub qrz_username: String,
    pub qrz_password: String,
    pub sendgrid_api_key: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let qrz_username =
            std::env::var("QRZ_USERNAME").unwrap_or_else(|_| "K7DRQ".to_string());
        let qrz_password = std::env::var("QRZ_PASSWORD")
            .map_err(|_| WelcomeError::Config("No QRZ_PASSWORD environment variable set.".into()))?;
        let sendgrid_api_key = std::env::var("SENDGRID_API_KEY").map_err(|_| {
            WelcomeError::Config("No SENDGRID_API_KEY environment variable set.".into())
        })?;
        Ok(Self {
            qrz_username,
            qrz_password,
            sendgrid_api_key,
        })
    }
}
