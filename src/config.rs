use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub api_key_prefix: String,
    pub enabled: bool,
    pub loyalty_enabled: bool,
    pub referral_enabled: bool,
    /// Prefix prepended to generated customer profile identifiers.
    pub profile_id_prefix: String,
    pub site_id: String,
    /// Product attribute names forwarded to the engine with each cart item.
    pub product_attributes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_url = env_map
            .get("PROMO_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PROMO_API_URL".to_string()))?;

        let api_key = env_map
            .get("PROMO_API_KEY")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("PROMO_API_KEY".to_string()))?;

        let site_id = env_map
            .get("SITE_ID")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("SITE_ID".to_string()))?;

        let api_key_prefix = env_map
            .get("PROMO_API_KEY_PREFIX")
            .cloned()
            .unwrap_or_else(|| "ApiKey-v1".to_string());

        let enabled = parse_bool(&env_map, "PROMO_ENABLED", true)?;
        let loyalty_enabled = parse_bool(&env_map, "LOYALTY_ENABLED", false)?;
        let referral_enabled = parse_bool(&env_map, "REFERRAL_ENABLED", false)?;

        let profile_id_prefix = env_map
            .get("PROFILE_ID_PREFIX")
            .cloned()
            .unwrap_or_default();

        let product_attributes = env_map
            .get("PRODUCT_ATTRIBUTES")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Config {
            api_url,
            api_key,
            api_key_prefix,
            enabled,
            loyalty_enabled,
            referral_enabled,
            profile_id_prefix,
            site_id,
            product_attributes,
        })
    }
}

fn parse_bool(
    env_map: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.as_str()) {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be true or false, got {}", other),
        )),
    }
}
