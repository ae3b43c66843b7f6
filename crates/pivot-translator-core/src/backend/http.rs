use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::traits::{ModelLoader, TranslationModel};
use crate::config::BackendConfig;
use crate::directory::ModelDescriptor;
use crate::error::{Error, Result};
use crate::language::LanguageRegistry;

/// Loads models served by an OpenAI-compatible inference server.
/// Works with: llama.cpp server, vLLM, Ollama, text-generation-inference, etc.
pub struct HttpModelLoader {
    client: Client,
    config: BackendConfig,
    registry: Arc<LanguageRegistry>,
}

/// One model handle on the inference server, bound to a language pair
pub struct HttpModel {
    client: Client,
    url: String,
    api_key: Option<String>,
    handle: String,
    source_name: String,
    target_name: String,
    retry_count: u32,
    retry_delay_ms: u64,
    max_wait: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelListEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelListEntry {
    id: String,
}

impl HttpModelLoader {
    pub fn new(config: BackendConfig, registry: Arc<LanguageRegistry>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            registry,
        })
    }

    fn base_url(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    /// List model ids the server currently serves
    async fn served_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url());
        let mut req = self.client.get(&url);
        if let Some(ref key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.map_err(|e| Error::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Request(format!("HTTP {} from {url}", response.status())));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    async fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn TranslationModel>> {
        let load_error = |reason: String| Error::ModelLoad {
            model: descriptor.handle().to_string(),
            reason,
        };

        let served = self
            .served_models()
            .await
            .map_err(|e| load_error(format!("{} unreachable: {e}", self.base_url())))?;

        if !served.iter().any(|id| id == descriptor.handle()) {
            return Err(load_error(format!(
                "not served by {} (install it on the inference server first)",
                self.base_url()
            )));
        }

        info!("Model {} available at {}", descriptor, self.base_url());

        Ok(Arc::new(HttpModel {
            client: self.client.clone(),
            url: format!("{}/chat/completions", self.base_url()),
            api_key: self.config.api_key.clone(),
            handle: descriptor.handle().to_string(),
            source_name: self.registry.display_name(descriptor.source()).to_string(),
            target_name: self.registry.display_name(descriptor.target()).to_string(),
            retry_count: self.config.retry_count.max(1),
            retry_delay_ms: self.config.retry_delay_ms,
            max_wait: Duration::from_secs(self.config.timeout_secs),
        }))
    }

    fn name(&self) -> &'static str {
        "OpenAI Compatible"
    }
}

impl HttpModel {
    fn create_prompt(&self, text: &str) -> String {
        format!(
            "Translate the following text from {} into {}. Output only the translation, no explanations.\n\nText: \"{}\"",
            self.source_name, self.target_name, text
        )
    }

    fn inference_error(&self, reason: String) -> Error {
        Error::Inference {
            model: self.handle.clone(),
            reason,
        }
    }

    /// Make API request with retry logic
    async fn request_with_retry(&self, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.handle.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: self.create_prompt(text),
            }],
            temperature: Some(0.0),
        };

        let mut last_error = None;

        for attempt in 0..self.retry_count {
            debug!(
                "Inference request attempt {}/{} to {} ({})",
                attempt + 1,
                self.retry_count,
                self.url,
                self.handle
            );

            let mut req = self.client.post(&self.url).json(&request);

            if let Some(ref key) = self.api_key {
                req = req.header("Authorization", format!("Bearer {key}"));
            }

            match req.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<ChatResponse>().await {
                            Ok(chat_response) => {
                                if let Some(choice) = chat_response.choices.first() {
                                    return Ok(strip_quotes(&choice.message.content));
                                }
                                last_error =
                                    Some(Error::InvalidResponse("No choices in response".to_string()));
                            }
                            Err(e) => {
                                warn!("Failed to parse response: {}", e);
                                last_error = Some(Error::InvalidResponse(e.to_string()));
                            }
                        }
                    } else if response.status().as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse().ok());

                        warn!("Rate limited, retry after {:?}s", retry_after);
                        last_error = Some(Error::RateLimited { retry_after });

                        if attempt + 1 < self.retry_count {
                            tokio::time::sleep(rate_limit_wait(retry_after, self.max_wait)).await;
                        }
                        continue;
                    } else {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        warn!("API error: {} - {}", status, body);
                        last_error = Some(Error::Request(format!("HTTP {status}: {body}")));
                    }
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    if e.is_timeout() {
                        last_error = Some(Error::Timeout);
                    } else {
                        last_error = Some(Error::Request(e.to_string()));
                    }
                }
            }

            if attempt + 1 < self.retry_count {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }

        error!("Inference with {} failed after {} attempts", self.handle, self.retry_count);
        let reason = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        Err(self.inference_error(reason))
    }
}

#[async_trait]
impl TranslationModel for HttpModel {
    async fn infer(&self, text: &str) -> Result<String> {
        self.request_with_retry(text).await
    }
}

/// Wait before retrying a 429, never longer than `max_wait`
fn rate_limit_wait(retry_after: Option<u64>, max_wait: Duration) -> Duration {
    Duration::from_secs(retry_after.unwrap_or(5)).min(max_wait)
}

/// Remove whitespace and the quotes chat models like to wrap answers in
fn strip_quotes(content: &str) -> String {
    content
        .trim()
        .trim_start_matches('"')
        .trim_end_matches('"')
        .to_string()
}
