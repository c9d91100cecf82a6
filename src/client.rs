use std::future::Future;
use std::sync::Arc;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::config::{ImageSize, TranslatorConfig};
use crate::error::{ConfigError, Result, TranslateError};
use crate::types::{SourceImage, TranslatedImage};

const DEFAULT_RESULT_MEDIA_TYPE: &str = "image/png";

/// One request/response round trip to an image-editing model.
///
/// Implementations perform a single call and never retry; retrying is the
/// job of [`crate::Translator`].
pub trait ImageEditModel: Send + Sync + 'static {
    /// Send `image` together with `instruction` and return the edited image.
    fn edit_image(
        &self,
        image: &SourceImage,
        instruction: &str,
    ) -> impl Future<Output = Result<TranslatedImage>> + Send;
}

impl<T: ImageEditModel> ImageEditModel for Arc<T> {
    fn edit_image(
        &self,
        image: &SourceImage,
        instruction: &str,
    ) -> impl Future<Output = Result<TranslatedImage>> + Send {
        (**self).edit_image(image, instruction)
    }
}

/// Gemini `generateContent` client for image editing.
pub struct GeminiClient {
    http: Client,
    config: TranslatorConfig,
}

impl GeminiClient {
    /// Build a client with its own HTTP connection pool and the configured timeout.
    pub fn new(config: TranslatorConfig) -> std::result::Result<Self, ConfigError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Self::with_client(http, config)
    }

    /// Build a client on top of an existing `reqwest::Client`.
    pub fn with_client(
        http: Client,
        config: TranslatorConfig,
    ) -> std::result::Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }
}

impl ImageEditModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.config.model, file = %image.file_name))]
    async fn edit_image(&self, image: &SourceImage, instruction: &str) -> Result<TranslatedImage> {
        let body = build_request_body(image, instruction, self.config.image_size);
        let url = self.config.generate_url();

        debug!(bytes = image.bytes.len(), media_type = %image.media_type, "sending edit request");

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&self.config.endpoint, &e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| network_error(&self.config.endpoint, &e))?;

        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &text));
        }

        parse_generate_response(&text)
    }
}

fn network_error(endpoint: &str, err: &reqwest::Error) -> TranslateError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    TranslateError::Network {
        endpoint: endpoint.to_string(),
        message,
    }
}

/// Request body: inline image first, then the instruction, plus the output size hint.
pub fn build_request_body(image: &SourceImage, instruction: &str, image_size: ImageSize) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": image.media_type,
                        "data": image.to_base64(),
                    }
                },
                { "text": instruction },
            ]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": {
                "imageSize": image_size.as_str(),
            }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: Option<String>,
    data: Option<String>,
}

/// Extract the edited image from a successful `generateContent` response.
pub fn parse_generate_response(body: &str) -> Result<TranslatedImage> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| TranslateError::MalformedResponse(e.to_string()))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(TranslateError::EmptyResponse)?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let inline = parts.iter().find_map(|p| {
        p.inline_data
            .as_ref()
            .and_then(|d| d.data.as_deref().filter(|s| !s.is_empty()).map(|data| (d, data)))
    });

    if let Some((inline, data)) = inline {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| TranslateError::MalformedResponse(format!("bad image payload: {}", e)))?;
        let media_type = inline
            .mime_type
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_RESULT_MEDIA_TYPE.to_string());
        return Ok(TranslatedImage::new(media_type, bytes));
    }

    if let Some(text) = parts
        .into_iter()
        .filter_map(|p| p.text)
        .find(|t| !t.trim().is_empty())
    {
        warn!(text = %text, "model returned text instead of image");
        return Err(TranslateError::ModelReturnedText(text));
    }

    debug!(finish_reason = ?candidate.finish_reason, "candidate carried no image");
    Err(TranslateError::NoImage)
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Turn a non-success HTTP response into a classified error.
///
/// The nested `error.message` is preferred over the raw body.
pub fn classify_api_error(http_status: u16, body: &str) -> TranslateError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let api_status = parsed
        .as_ref()
        .and_then(|e| e.error.status.clone())
        .unwrap_or_default();
    let message = parsed
        .and_then(|e| e.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let raw = body.trim();
            if raw.is_empty() {
                format!("HTTP {}", http_status)
            } else {
                raw.to_string()
            }
        });
    let lower = message.to_ascii_lowercase();

    if lower.contains("user location is not supported") {
        return TranslateError::UnsupportedRegion;
    }

    if matches!(http_status, 401 | 403)
        || api_status == "PERMISSION_DENIED"
        || api_status == "UNAUTHENTICATED"
        || lower.contains("api key not valid")
    {
        return TranslateError::PermissionDenied { message };
    }

    if matches!(http_status, 500 | 503)
        || api_status == "INTERNAL"
        || api_status == "UNAVAILABLE"
        || lower.contains("overloaded")
    {
        return TranslateError::Transient {
            status: Some(http_status),
            message,
        };
    }

    TranslateError::InvalidRequest {
        status: http_status,
        message,
    }
}
