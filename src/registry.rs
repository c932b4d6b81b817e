use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Client;

use crate::config::{AppConfig, GeminiAuthMode, ProviderSettings};
use crate::connectors::chat::ChatConnector;
use crate::connectors::dalle::DalleConnector;
use crate::connectors::doubao::DoubaoConnector;
use crate::connectors::gemini::GeminiConnector;
use crate::connectors::stability::StabilityConnector;
use crate::connectors::{build_http_client, ConnectorError, ImageConnector};
use crate::core::entities::ServiceDescriptor;

/// Service id advertised for the chat adapter next to the image services.
pub const CHAT_SERVICE_ID: &str = "chat";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Dalle,
    StableDiffusion,
    GeminiImage,
    DoubaoImage,
}

impl ServiceId {
    pub const ALL: [ServiceId; 4] = [
        ServiceId::Dalle,
        ServiceId::StableDiffusion,
        ServiceId::GeminiImage,
        ServiceId::DoubaoImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Dalle => "dalle",
            ServiceId::StableDiffusion => "stable-diffusion",
            ServiceId::GeminiImage => "gemini-image",
            ServiceId::DoubaoImage => "doubao-image",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Service '{0}' not found")]
pub struct UnknownService(pub String);

impl FromStr for ServiceId {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownService(s.to_string()))
    }
}

/// Request-level values layered over a provider's environment settings.
#[derive(Clone, Debug, Default)]
pub struct ProviderOverrides {
    pub model: Option<String>,
}

impl ProviderOverrides {
    pub fn model(model: Option<&str>) -> Self {
        Self {
            model: model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none()
    }

    pub fn apply(&self, settings: &ProviderSettings) -> ProviderSettings {
        let mut out = settings.clone();
        if let Some(model) = &self.model {
            out.model = model.clone();
        }
        out
    }
}

/// Adapters for every service, built once at startup. Gemini and Doubao act
/// as templates: requests carrying overrides get a fresh adapter.
pub struct ServiceRegistry {
    client: Client,
    gemini_settings: ProviderSettings,
    gemini_auth_mode: GeminiAuthMode,
    doubao_settings: ProviderSettings,
    dalle: Arc<DalleConnector>,
    stability: Arc<StabilityConnector>,
    gemini: Arc<GeminiConnector>,
    doubao: Arc<DoubaoConnector>,
    chat: Arc<ChatConnector>,
}

impl ServiceRegistry {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ConnectorError> {
        let client = build_http_client(cfg.provider_timeout)?;
        let no_overrides = ProviderOverrides::default();
        for (var, settings) in [("GEMINI_API_KEY", &cfg.gemini), ("DOUBAO_API_KEY", &cfg.doubao)] {
            if !settings.has_credentials() {
                tracing::warn!("{var} not configured");
            }
        }
        Ok(Self {
            dalle: Arc::new(DalleConnector::new(client.clone(), &cfg.dalle)),
            stability: Arc::new(StabilityConnector::new(client.clone(), &cfg.stability)),
            gemini: Arc::new(GeminiConnector::from_settings(
                client.clone(),
                &cfg.gemini,
                cfg.gemini_auth_mode,
                &no_overrides,
            )),
            doubao: Arc::new(DoubaoConnector::from_settings(
                client.clone(),
                &cfg.doubao,
                &no_overrides,
            )),
            chat: Arc::new(ChatConnector::new(client.clone(), &cfg.chat)),
            gemini_settings: cfg.gemini.clone(),
            gemini_auth_mode: cfg.gemini_auth_mode,
            doubao_settings: cfg.doubao.clone(),
            client,
        })
    }

    /// Resolves a service string; unknown ids are `None`.
    pub fn lookup(&self, id: &str) -> Option<ServiceId> {
        id.parse().ok()
    }

    pub fn dalle(&self) -> Arc<DalleConnector> {
        Arc::clone(&self.dalle)
    }

    pub fn stability(&self) -> Arc<StabilityConnector> {
        Arc::clone(&self.stability)
    }

    pub fn gemini_for(&self, overrides: &ProviderOverrides) -> Arc<GeminiConnector> {
        if overrides.is_empty() {
            return Arc::clone(&self.gemini);
        }
        tracing::debug!(model = ?overrides.model, "building gemini-image adapter for request");
        Arc::new(GeminiConnector::from_settings(
            self.client.clone(),
            &self.gemini_settings,
            self.gemini_auth_mode,
            overrides,
        ))
    }

    pub fn doubao_for(&self, overrides: &ProviderOverrides) -> Arc<DoubaoConnector> {
        if overrides.is_empty() {
            return Arc::clone(&self.doubao);
        }
        tracing::debug!(model = ?overrides.model, "building doubao-image adapter for request");
        Arc::new(DoubaoConnector::from_settings(
            self.client.clone(),
            &self.doubao_settings,
            overrides,
        ))
    }

    pub fn chat(&self) -> Arc<ChatConnector> {
        Arc::clone(&self.chat)
    }

    fn descriptor<C: ImageConnector>(connector: &C) -> ServiceDescriptor {
        ServiceDescriptor {
            id: connector.id().to_string(),
            name: connector.display_name().to_string(),
            available: connector.is_configured(),
        }
    }

    /// Availability of every service, chat last. `available` reflects only
    /// whether credentials are configured.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        vec![
            Self::descriptor(self.dalle.as_ref()),
            Self::descriptor(self.stability.as_ref()),
            Self::descriptor(self.gemini.as_ref()),
            Self::descriptor(self.doubao.as_ref()),
            ServiceDescriptor {
                id: CHAT_SERVICE_ID.to_string(),
                name: self.chat.display_name().to_string(),
                available: self.chat.is_configured(),
            },
        ]
    }

    pub fn service_ids(&self) -> Vec<&'static str> {
        ServiceId::ALL
            .iter()
            .map(ServiceId::as_str)
            .chain(std::iter::once(CHAT_SERVICE_ID))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn registry(vars: &[(&str, &str)]) -> ServiceRegistry {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceRegistry::from_config(&AppConfig::from_map(&vars).unwrap()).unwrap()
    }

    #[test]
    fn parses_known_ids_only() {
        for id in ServiceId::ALL {
            assert_eq!(id.as_str().parse::<ServiceId>().unwrap(), id);
        }
        let err = "midjourney".parse::<ServiceId>().unwrap_err();
        assert_eq!(err.to_string(), "Service 'midjourney' not found");
    }

    #[test]
    fn availability_tracks_credentials() {
        let reg = registry(&[("OPENAI_API_KEY", "sk"), ("DOUBAO_API_KEY", "db")]);
        let avail: HashMap<String, bool> = reg
            .descriptors()
            .into_iter()
            .map(|d| (d.id, d.available))
            .collect();
        assert_eq!(avail.len(), 5);
        assert!(avail["dalle"]);
        assert!(!avail["stable-diffusion"]);
        assert!(!avail["gemini-image"]);
        assert!(avail["doubao-image"]);
        // chat falls back to the OpenAI key
        assert!(avail["chat"]);
    }

    #[test]
    fn overrides_build_fresh_adapters() {
        let reg = registry(&[("GEMINI_MODEL", "gemini-env")]);
        let default = reg.gemini_for(&ProviderOverrides::default());
        assert_eq!(default.model(), "gemini-env");
        assert!(Arc::ptr_eq(&default, &reg.gemini_for(&ProviderOverrides::model(None))));

        let custom = reg.gemini_for(&ProviderOverrides::model(Some("gemini-3-pro-image-preview")));
        assert_eq!(custom.model(), "gemini-3-pro-image-preview");
        assert_eq!(reg.gemini_for(&ProviderOverrides::default()).model(), "gemini-env");

        let doubao = reg.doubao_for(&ProviderOverrides::model(Some("  ")));
        assert_eq!(doubao.model(), "doubao-seedream-4-0-250828");
    }

    #[test]
    fn lists_service_ids_with_chat() {
        let reg = registry(&[]);
        assert_eq!(
            reg.service_ids(),
            vec!["dalle", "stable-diffusion", "gemini-image", "doubao-image", "chat"]
        );
    }
}
