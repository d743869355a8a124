use serde::{Deserialize, Serialize};

/// Provider credentials and generation defaults.
///
/// Missing credentials are allowed at startup; a route without credentials
/// fails at call time with a configuration error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    /// Model used when a request names none.
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl ProviderSettings {
    /// Settings from the conventional environment variables, for quick
    /// wiring in binaries.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_from_empty_toml() {
        let settings: ProviderSettings = toml::from_str("").unwrap();
        assert_eq!(settings.default_model, "gpt-4o-mini");
        assert_eq!(settings.max_tokens, 1000);
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let settings: ProviderSettings = toml::from_str(
            r#"
            openai_api_key = "sk-test"
            default_model = "claude-3-5-haiku-20241022"
            "#,
        )
        .unwrap();
        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.default_model, "claude-3-5-haiku-20241022");
        assert_eq!(settings.temperature, 0.7);
    }
}
