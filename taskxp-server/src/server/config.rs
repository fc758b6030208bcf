use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub listen_port: Option<u16>,
    pub dev_cors_origin: Option<String>,
    /// Adds `Secure` to the session cookie; enable behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    /// bcrypt work factor for new passwords; defaults to `bcrypt::DEFAULT_COST`.
    pub bcrypt_cost: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(text)?;
        if cfg.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_secret must not be empty".into()));
        }
        if let Some(cost) = cfg.bcrypt_cost
            && !(4..=31).contains(&cost)
        {
            return Err(ConfigError::Invalid(format!(
                "bcrypt_cost must be within 4..=31, got {cost}"
            )));
        }
        Ok(cfg)
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost.unwrap_or(bcrypt::DEFAULT_COST)
    }
}

/// Starter config written by `init-config`.
pub fn render_default_config() -> String {
    let secret = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    format!(
        "# taskxp server configuration\n\
         jwt_secret: \"{secret}\"\n\
         # listen_port: 5151\n\
         # dev_cors_origin: \"http://localhost:5173\"\n\
         secure_cookies: false\n"
    )
}
