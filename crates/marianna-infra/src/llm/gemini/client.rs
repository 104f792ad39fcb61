//! GeminiProvider -- concrete [`LlmProvider`] implementation for Google Gemini.
//!
//! Sends requests to `{base_url}/v1beta/models/{model}:generateContent`
//! authenticated with the `x-goog-api-key` header. Inline attachments are
//! base64-encoded and placed before the text part of their message.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};

use marianna_core::llm::provider::LlmProvider;
use marianna_observe::genai_attrs::PROVIDER_GEMINI;
use marianna_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};

use super::types::{
    GeminiBlob, GeminiContent, GeminiErrorResponse, GeminiPart, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig,
};

/// Google Gemini LLM provider.
///
/// Constructed even without an API key so the application can run offline;
/// in that case every call fails with [`LlmError::AuthenticationFailed`].
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key wrapped in SecretString, if configured
    /// * `model` - Default model identifier (e.g., "gemini-2.5-flash")
    pub fn new(api_key: Option<SecretString>, model: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            // Outer bound; the persona applies its own, shorter timeout.
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model,
        })
    }

    /// The default model for this provider.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Convert a generic [`CompletionRequest`] into a Gemini request body.
    fn to_gemini_request(request: &CompletionRequest) -> GenerateContentRequest {
        let contents = request
            .messages
            .iter()
            .map(|message| {
                let mut parts: Vec<GeminiPart> = message
                    .attachments
                    .iter()
                    .map(|attachment| GeminiPart::InlineData {
                        inline_data: GeminiBlob {
                            mime_type: attachment.mime_type.clone(),
                            data: BASE64.encode(&attachment.data),
                        },
                    })
                    .collect();
                parts.push(GeminiPart::Text {
                    text: message.content.clone(),
                });

                GeminiContent {
                    role: Some(message.role.to_string()),
                    parts,
                }
            })
            .collect();

        let system_instruction = request.system.as_ref().map(|system| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: system.clone(),
            }],
        });

        let generation_config = (request.max_tokens.is_some() || request.temperature.is_some())
            .then(|| GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            });

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }

    /// Flatten a Gemini response into a [`CompletionResponse`].
    ///
    /// Text parts of the first candidate are concatenated; a response with no
    /// candidates or no text yields empty content rather than an error.
    fn from_gemini_response(response: GenerateContentResponse, model: &str) -> CompletionResponse {
        let candidate = response.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());

        let content = candidate
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| match part {
                        GeminiPart::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response.usage_metadata.unwrap_or_default();

        CompletionResponse {
            content,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            finish_reason,
            usage: Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
        }
    }
}

/// Map a non-2xx status to an [`LlmError`].
fn map_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> LlmError {
    let message = serde_json::from_str::<GeminiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        400 => LlmError::InvalidRequest(message),
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: retry_after_secs.map(|s| s * 1000),
        },
        503 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

// GeminiProvider does NOT derive Debug so internal state is never printed.

impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER_GEMINI
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let Some(api_key) = &self.api_key else {
            return Err(LlmError::AuthenticationFailed);
        };

        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model.as_str()
        };
        let body = Self::to_gemini_request(request);

        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), retry_after, &error_body));
        }

        let gemini_response: GenerateContentResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        Ok(Self::from_gemini_response(gemini_response, model))
    }
}
