//! Google Gemini provider implementation.
//!
//! Uses the `generateContent` REST endpoint with a system instruction,
//! generation config and optional inline image data.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use kbase_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini LLM client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_GEMINI_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_gemini_request(&self, request: &LlmRequest) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(request.prompt.clone()),
            inline_data: None,
        }];
        parts.extend(request.images.iter().map(|image| Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.to_base64(),
            }),
        }));

        GenerateContentRequest {
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                    inline_data: None,
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                top_p: request.top_p,
            },
        }
    }

    /// Concatenate the text parts of the first candidate.
    fn convert_response(&self, model: &str, response: GenerateContentResponse) -> LlmResponse {
        let first = response.candidates.into_iter().next();
        let done = first
            .as_ref()
            .and_then(|c| c.finish_reason.as_deref())
            .map(|reason| reason == "STOP")
            .unwrap_or(false);

        let content = first
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response
            .usage_metadata
            .map(|u| LlmUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        LlmResponse {
            content,
            model: model.to_string(),
            usage,
            done,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model, images = request.images.len()))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending generateContent request to Gemini");

        let body = self.to_gemini_request(request);
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Gemini: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Gemini response: {}", e)))?;

        tracing::info!("Received completion from Gemini");

        Ok(self.convert_response(&request.model, parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageAttachment;

    #[test]
    fn test_gemini_request_shape() {
        let client = GeminiClient::new("key");
        let request = LlmRequest::new("What is the refund policy?", "gemini-2.5-flash")
            .with_system("Knowledge base content: ...")
            .with_temperature(0.25)
            .with_top_p(0.92)
            .with_max_tokens(900)
            .with_image(ImageAttachment::new("image/jpeg", b"hello".to_vec()));

        let json = serde_json::to_value(client.to_gemini_request(&request)).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Knowledge base content: ..."
        );
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][0]["text"],
            "What is the refund policy?"
        );
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["data"],
            "aGVsbG8="
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 900);
    }

    #[test]
    fn test_gemini_response_conversion() {
        let client = GeminiClient::new("key");
        let raw = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Refunds are issued "}, {"text": "within 30 days."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 8}
        });
        let parsed: GenerateContentResponse = serde_json::from_value(raw).unwrap();

        let response = client.convert_response("gemini-2.5-flash", parsed);
        assert_eq!(response.content, "Refunds are issued within 30 days.");
        assert_eq!(response.usage.total_tokens, 48);
        assert!(response.done);
    }

    #[test]
    fn test_gemini_blocked_response_is_empty() {
        let client = GeminiClient::new("key");
        let parsed: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"candidates": []})).unwrap();

        let response = client.convert_response("gemini-2.5-flash", parsed);
        assert!(response.content.is_empty());
        assert!(!response.done);
    }
}
