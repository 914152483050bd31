//! Ollama generation over `/api/generate`.
//!
//! API reference: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use kbase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Body of a non-streaming generate call.
#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    /// Base64 images, for multimodal models
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    options: SamplingOptions,
    stream: bool,
}

#[derive(Debug, Default, Serialize)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl<'a> From<&'a LlmRequest> for GenerateBody<'a> {
    fn from(request: &'a LlmRequest) -> Self {
        Self {
            model: &request.model,
            prompt: &request.prompt,
            system: request.system.as_deref(),
            images: request.images.iter().map(|image| image.to_base64()).collect(),
            options: SamplingOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    model: String,
    response: String,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl From<GenerateReply> for LlmResponse {
    fn from(reply: GenerateReply) -> Self {
        LlmResponse {
            content: reply.response,
            model: reply.model,
            usage: LlmUsage::new(
                reply.prompt_eval_count.unwrap_or(0),
                reply.eval_count.unwrap_or(0),
            ),
            done: reply.done,
        }
    }
}

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model, images = request.images.len()))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let response = self
            .http
            .post(self.generate_url())
            .json(&GenerateBody::from(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Ollama unreachable at {}: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Llm(format!("Ollama returned {}: {}", status, body)));
        }

        let reply: GenerateReply = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Malformed Ollama reply: {}", e)))?;

        tracing::debug!(
            chars = reply.response.chars().count(),
            eval_count = ?reply.eval_count,
            "Ollama generation finished"
        );

        Ok(reply.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageAttachment;

    #[test]
    fn test_base_url_is_normalized() {
        let client = OllamaClient::with_base_url("http://gpu-box:11434/");
        assert_eq!(client.generate_url(), "http://gpu-box:11434/api/generate");
        assert_eq!(OllamaClient::default().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_body_carries_sampling_system_and_images() {
        let request = LlmRequest::new("What is the refund policy?", "llama3.2")
            .with_system("Only use the context.")
            .with_temperature(0.25)
            .with_top_p(0.92)
            .with_max_tokens(900)
            .with_image(ImageAttachment::new("image/png", b"hello".to_vec()));

        let json = serde_json::to_value(GenerateBody::from(&request)).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["system"], "Only use the context.");
        assert_eq!(json["images"][0], "aGVsbG8=");
        assert_eq!(json["options"]["num_predict"], 900);
        assert_eq!(json["options"]["top_p"].as_f64().map(|v| (v * 100.0).round()), Some(92.0));
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_body_omits_absent_fields() {
        let request = LlmRequest::new("Hi", "llama3.2");
        let json = serde_json::to_value(GenerateBody::from(&request)).unwrap();
        assert!(json.get("images").is_none());
        assert!(json.get("system").is_none());
        assert!(json["options"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_reply_maps_usage() {
        let reply: GenerateReply = serde_json::from_str(
            r#"{"model":"llama3.2","response":"Within 30 days.","done":true,"prompt_eval_count":12,"eval_count":5}"#,
        )
        .unwrap();
        let response = LlmResponse::from(reply);
        assert_eq!(response.content, "Within 30 days.");
        assert_eq!(response.usage.total_tokens, 17);
    }
}
