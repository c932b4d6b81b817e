use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Shared third-party gateway used when a provider has no base URL of its own.
pub const DEFAULT_GATEWAY_URL: &str = "https://yunwu.ai";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unknown GEMINI_AUTH_MODE {0:?} (expected bearer, header or query)")]
    UnknownAuthMode(String),
}

/// How the Gemini adapter presents its API key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeminiAuthMode {
    #[default]
    Bearer,
    /// `x-goog-api-key` header, as the Google endpoint expects.
    Header,
    /// `?key=` query parameter.
    Query,
}

impl FromStr for GeminiAuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(Self::Bearer),
            "header" | "x-goog-api-key" => Ok(Self::Header),
            "query" | "key" => Ok(Self::Query),
            _ => Err(ConfigError::UnknownAuthMode(s.to_string())),
        }
    }
}

/// Credentials and endpoint for one upstream provider.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl ProviderSettings {
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub debug: bool,
    /// `None` means any origin.
    pub allowed_origins: Option<Vec<String>>,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider_timeout: Duration,
    pub dalle: ProviderSettings,
    pub stability: ProviderSettings,
    pub gemini: ProviderSettings,
    pub gemini_auth_mode: GeminiAuthMode,
    pub doubao: ProviderSettings,
    pub chat: ProviderSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let host = parse_or(get("HOST"), "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or(get("PORT"), "PORT", 8000u16)?;
        let max_body_bytes = parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", 20 * 1024 * 1024usize)?;
        let timeout_secs = parse_or(get("PROVIDER_TIMEOUT_SECS"), "PROVIDER_TIMEOUT_SECS", 120u64)?;
        let debug = get("DEBUG").is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        let allowed_origins = get("ALLOWED_ORIGINS").and_then(|raw| {
            let origins: Vec<String> = raw
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if origins.is_empty() || origins.iter().any(|o| o == "*") {
                None
            } else {
                Some(origins)
            }
        });

        let gemini_auth_mode = match get("GEMINI_AUTH_MODE") {
            Some(raw) => raw.parse()?,
            None => GeminiAuthMode::default(),
        };

        let gemini_key = get("GEMINI_API_KEY");
        let openai_key = get("OPENAI_API_KEY");
        let chat_key = get("CHAT_API_KEY")
            .or_else(|| gemini_key.clone())
            .or_else(|| openai_key.clone());

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                debug,
                allowed_origins,
                max_body_bytes,
            },
            provider_timeout: Duration::from_secs(timeout_secs),
            dalle: ProviderSettings {
                api_key: openai_key,
                base_url: or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: or("DALLE_MODEL", "dall-e-3"),
            },
            stability: ProviderSettings {
                api_key: get("STABILITY_API_KEY"),
                base_url: or("STABILITY_BASE_URL", "https://api.stability.ai"),
                model: or("STABILITY_ENGINE", "stable-diffusion-xl-1024-v1-0"),
            },
            gemini: ProviderSettings {
                api_key: gemini_key,
                base_url: or("GEMINI_BASE_URL", DEFAULT_GATEWAY_URL),
                model: or("GEMINI_MODEL", "gemini-2.5-flash-image"),
            },
            gemini_auth_mode,
            doubao: ProviderSettings {
                api_key: get("DOUBAO_API_KEY"),
                base_url: or("DOUBAO_BASE_URL", DEFAULT_GATEWAY_URL),
                model: or("DOUBAO_MODEL", "doubao-seedream-4-0-250828"),
            },
            chat: ProviderSettings {
                api_key: chat_key,
                base_url: or("CHAT_BASE_URL", &format!("{DEFAULT_GATEWAY_URL}/v1")),
                model: or("CHAT_MODEL", "gpt-5-2025-08-07"),
            },
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_point_at_shared_gateway() {
        let cfg = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert!(cfg.server.allowed_origins.is_none());
        assert_eq!(cfg.gemini.base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(cfg.doubao.base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(cfg.chat.base_url, "https://yunwu.ai/v1");
        assert_eq!(cfg.gemini.model, "gemini-2.5-flash-image");
        assert_eq!(cfg.gemini_auth_mode, GeminiAuthMode::Bearer);
        assert!(!cfg.dalle.has_credentials());
        assert_eq!(cfg.provider_timeout, Duration::from_secs(120));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = AppConfig::from_map(&vars(&[("OPENAI_API_KEY", "  "), ("PORT", "")])).unwrap();
        assert!(cfg.dalle.api_key.is_none());
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn chat_key_falls_back_to_gemini_then_openai() {
        let cfg = AppConfig::from_map(&vars(&[("OPENAI_API_KEY", "sk-openai")])).unwrap();
        assert_eq!(cfg.chat.api_key.as_deref(), Some("sk-openai"));

        let cfg = AppConfig::from_map(&vars(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "gm"),
        ]))
        .unwrap();
        assert_eq!(cfg.chat.api_key.as_deref(), Some("gm"));

        let cfg = AppConfig::from_map(&vars(&[
            ("GEMINI_API_KEY", "gm"),
            ("CHAT_API_KEY", "chat"),
        ]))
        .unwrap();
        assert_eq!(cfg.chat.api_key.as_deref(), Some("chat"));
    }

    #[test]
    fn origins_list_is_split() {
        let cfg = AppConfig::from_map(&vars(&[(
            "ALLOWED_ORIGINS",
            "http://localhost:3000, https://app.example.com",
        )]))
        .unwrap();
        assert_eq!(
            cfg.server.allowed_origins,
            Some(vec![
                "http://localhost:3000".to_string(),
                "https://app.example.com".to_string()
            ])
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = AppConfig::from_map(&vars(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn auth_mode_parses() {
        assert_eq!("query".parse::<GeminiAuthMode>().unwrap(), GeminiAuthMode::Query);
        assert_eq!("HEADER".parse::<GeminiAuthMode>().unwrap(), GeminiAuthMode::Header);
        assert!("oauth".parse::<GeminiAuthMode>().is_err());
    }
}
