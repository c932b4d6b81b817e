use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::config::AppConfig;
use crate::connectors::{ConnectorError, ImageConnector};
use crate::core::entities::{ChatCompletion, GeneratedImage, ImageJob};
use crate::metrics;
use crate::registry::{ProviderOverrides, ServiceRegistry, CHAT_SERVICE_ID};

#[derive(Clone)]
pub struct AppState {
    registry: Arc<ServiceRegistry>,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Result<Self, ConnectorError> {
        Ok(Self::from_registry(ServiceRegistry::from_config(cfg)?))
    }

    pub fn from_registry(registry: ServiceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Runs one generation on the adapter matching the job. Overrides only
    /// affect the template services (Gemini and Doubao).
    pub async fn generate(
        &self,
        route: &'static str,
        prompt: &str,
        job: ImageJob,
        overrides: &ProviderOverrides,
    ) -> Result<GeneratedImage, ConnectorError> {
        match job {
            ImageJob::Dalle(opts) => {
                let connector = self.registry.dalle();
                run(route, connector.as_ref(), prompt, opts).await
            }
            ImageJob::StableDiffusion(opts) => {
                let connector = self.registry.stability();
                run(route, connector.as_ref(), prompt, opts).await
            }
            ImageJob::Gemini(opts) => {
                let connector = self.registry.gemini_for(overrides);
                run(route, connector.as_ref(), prompt, opts).await
            }
            ImageJob::Doubao(opts) => {
                let connector = self.registry.doubao_for(overrides);
                run(route, connector.as_ref(), prompt, opts).await
            }
        }
    }

    pub async fn chat(
        &self,
        messages: Vec<Value>,
        model: Option<&str>,
    ) -> Result<ChatCompletion, ConnectorError> {
        let started = Instant::now();
        let result = self.registry.chat().chat_completion(messages, model).await;
        record("text_chat", CHAT_SERVICE_ID, &result, started);
        result
    }
}

async fn run<C: ImageConnector>(
    route: &'static str,
    connector: &C,
    prompt: &str,
    options: C::Options,
) -> Result<GeneratedImage, ConnectorError> {
    let service = connector.id().as_str();
    tracing::info!(route, service, model = connector.model(), "generating image");
    let started = Instant::now();
    let result = connector.generate(prompt, options).await;
    record(route, service, &result, started);
    result
}

fn record<T>(route: &str, service: &str, result: &Result<T, ConnectorError>, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    match result {
        Ok(_) => {
            tracing::info!(route, service, elapsed, "provider call succeeded");
            metrics::observe(route, service, "success", elapsed);
        }
        Err(e) => {
            if e.is_expected() {
                tracing::warn!(route, service, code = e.code(), error = %e, "provider reported a failure");
            } else {
                tracing::error!(route, service, code = e.code(), error = %e, "provider call failed");
            }
            metrics::observe(route, service, "failure", elapsed);
            metrics::provider_error(service, e.code());
        }
    }
}
