use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{GeneratedContent, GenerationRequest, ImageBlob};
use crate::prompts;
use crate::services::{ImageGenerator, TextGenerator};

pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const POSTER_ASPECT_RATIO: &str = "3:4";

const TEXT_TIMEOUT: Duration = Duration::from_secs(60);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API Key is missing. Please set it in the environment.")]
    MissingKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("No response from Gemini")]
    EmptyResponse,
    #[error("Gemini returned malformed content: {0}")]
    Malformed(String),
    #[error("Failed to generate image visual: {0}")]
    NoImage(String),
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        let is_base64 = s
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
                        if s.len() > 100 && is_base64 {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn inline_part(image: &ImageBlob) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.to_base64(),
        }
    })
}

/// Gemini `generateContent` client used for both the caption and the poster.
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gemini_api_key.clone(), config.gemini_api_base.clone())
    }

    async fn call_model(&self, model: &str, body: &Value, timeout: Duration) -> Result<GeminiResponse, GeminiError> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingKey)?;
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, api_key);

        info!("🔗 Making request to: {}", url.replace(api_key, "***"));
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = body.clone();
            truncate_base64_in_json(&mut logged);
            tracing::debug!("📤 Request body: {}", logged);
        }

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await.map_err(|e| GeminiError::Http(e.to_string()))?;
        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Http(format!("status={} body={}", status, response_text)));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            let mut preview = response_text.chars().take(500).collect::<String>();
            if let Ok(mut value) = serde_json::from_str::<Value>(&response_text) {
                truncate_base64_in_json(&mut value);
                preview = value.to_string();
            }
            error!("❌ Failed to parse Gemini response: {} body={}", e, preview);
            GeminiError::Malformed(format!("parse error: {}", e))
        })
    }

    fn content_request(request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({ "text": prompts::user_fields(request) })];
        if let Some(image) = request.product_image.as_ref().filter(|i| !i.is_empty()) {
            parts.push(inline_part(image));
        }
        if let Some(logo) = request.logo_image.as_ref().filter(|i| !i.is_empty()) {
            parts.push(json!({ "text": "logo_image:" }));
            parts.push(inline_part(logo));
        }

        json!({
            "systemInstruction": { "parts": [{ "text": prompts::SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "image_prompt": { "type": "STRING" },
                        "caption": { "type": "STRING" },
                        "hashtags": { "type": "STRING" }
                    },
                    "required": ["image_prompt", "caption", "hashtags"]
                }
            }
        })
    }

    fn image_request(prompt: &str, source: Option<&ImageBlob>) -> Value {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = source.filter(|i| !i.is_empty()) {
            parts.push(inline_part(image));
        }

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": POSTER_ASPECT_RATIO }
            }
        })
    }
}

/// Parses the JSON object the text model was asked to produce.
pub fn parse_generated_content(text: &str) -> Result<GeneratedContent, GeminiError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);
    if unfenced.is_empty() {
        return Err(GeminiError::EmptyResponse);
    }
    serde_json::from_str(unfenced).map_err(|e| GeminiError::Malformed(e.to_string()))
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_content(&self, request: &GenerationRequest) -> crate::Result<GeneratedContent> {
        info!("🚀 Generating marketing content for product: {}", request.product_name);
        let body = Self::content_request(request);
        let parsed = self.call_model(TEXT_MODEL, &body, TEXT_TIMEOUT).await?;

        let text = extract_first_text(&parsed).ok_or(GeminiError::EmptyResponse)?;
        let content = parse_generated_content(&text)?;
        info!(
            "✅ Content generated: prompt {} chars, caption {} chars",
            content.image_prompt.len(),
            content.caption.len()
        );
        Ok(content)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &str, source: Option<&ImageBlob>) -> crate::Result<ImageBlob> {
        info!("🎯 Generating poster with prompt: {}", preview(prompt, 100));
        let body = Self::image_request(prompt, source);
        let parsed = self.call_model(IMAGE_MODEL, &body, IMAGE_TIMEOUT).await?;

        let inline = extract_first_image(&parsed)
            .ok_or_else(|| GeminiError::NoImage("no image data in response".into()))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| GeminiError::NoImage(format!("invalid base64 image: {}", e)))?;
        if data.is_empty() {
            warn!("⚠️ Gemini returned an empty image payload");
            return Err(GeminiError::NoImage("empty image payload".into()).into());
        }

        info!("🖼️ Extracted {} image ({} bytes)", inline.mime_type, data.len());
        Ok(ImageBlob::new(inline.mime_type.clone(), data))
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if out.len() < text.len() {
        out.push('…');
    }
    out
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default = "default_mime")]
    mime_type: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

fn extract_first_text(resp: &GeminiResponse) -> Option<String> {
    resp.candidates.first().and_then(|c| {
        c.content.parts.iter().find_map(|p| match p {
            Part::Text { text } if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
    })
}

fn extract_first_image(resp: &GeminiResponse) -> Option<&InlineData> {
    resp.candidates.iter().flat_map(|c| c.content.parts.iter()).find_map(|p| match p {
        Part::Inline { inline_data } if !inline_data.data.is_empty() => Some(inline_data),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, DisplayStyle};
    use crate::Error;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn text_path() -> String {
        format!("/models/{}:generateContent", TEXT_MODEL)
    }

    fn image_path() -> String {
        format!("/models/{}:generateContent", IMAGE_MODEL)
    }

    fn make_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(Some("test-key".into()), server.uri())
    }

    fn kopi_request() -> GenerationRequest {
        GenerationRequest::new(
            "Kopi Susu",
            DisplayStyle::Colorful,
            ContentType::Showcase,
            ImageBlob::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[tokio::test]
    async fn test_generate_content_parses_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(text_path()))
            .and(query_param("key", "test-key"))
            .and(body_string_contains("responseSchema"))
            .and(body_string_contains("Kopi Susu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
                r##"{"image_prompt":"vertical poster","caption":"Nikmati kopi","hashtags":"#umkm #kopi"}"##,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let content = make_client(&server).generate_content(&kopi_request()).await.unwrap();
        assert_eq!(
            content,
            GeneratedContent {
                image_prompt: "vertical poster".into(),
                caption: "Nikmati kopi".into(),
                hashtags: "#umkm #kopi".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_generate_content_rejects_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(text_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response(r#"{"image_prompt":"p","caption":"c"}"#)),
            )
            .mount(&server)
            .await;

        let err = make_client(&server).generate_content(&kopi_request()).await.unwrap_err();
        assert!(matches!(err, Error::Gemini(GeminiError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_generate_content_rejects_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(text_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = make_client(&server).generate_content(&kopi_request()).await.unwrap_err();
        assert!(matches!(err, Error::Gemini(GeminiError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(text_path()))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = make_client(&server).generate_content(&kopi_request()).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let client = GeminiClient::new(None, server.uri());
        let err = client.generate_content(&kopi_request()).await.unwrap_err();
        assert!(matches!(err, Error::Gemini(GeminiError::MissingKey)));
    }

    #[tokio::test]
    async fn test_generate_image_decodes_inline_data() {
        let server = MockServer::start().await;
        let fake_image = vec![0x89, 0x50, 0x4E, 0x47];
        let b64 = base64::engine::general_purpose::STANDARD.encode(&fake_image);

        Mock::given(method("POST"))
            .and(path(image_path()))
            .and(body_string_contains("\"aspectRatio\":\"3:4\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": b64 } }
                ] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = ImageBlob::new("image/jpeg", vec![0xFF, 0xD8]);
        let image = make_client(&server).generate_image("poster", Some(&source)).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data.to_vec(), fake_image);
    }

    #[tokio::test]
    async fn test_generate_image_rejects_missing_inline_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(image_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("no image here")))
            .mount(&server)
            .await;

        let err = make_client(&server).generate_image("poster", None).await.unwrap_err();
        assert!(matches!(err, Error::Gemini(GeminiError::NoImage(_))));
    }

    #[test]
    fn test_parse_generated_content_strips_fences() {
        let content =
            parse_generated_content("```json\n{\"image_prompt\":\"a\",\"caption\":\"b\",\"hashtags\":\"c\"}\n```")
                .unwrap();
        assert_eq!(content.hashtags, "c");
        assert!(matches!(parse_generated_content("   "), Err(GeminiError::EmptyResponse)));
        assert!(matches!(parse_generated_content("not json"), Err(GeminiError::Malformed(_))));
    }

    #[test]
    fn test_truncate_base64_in_json() {
        let mut value = json!({ "parts": [{ "inlineData": { "data": "A".repeat(300) } }] });
        truncate_base64_in_json(&mut value);
        let data = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(data.contains("truncated 250 chars"));
    }

    #[test]
    fn truncate_leaves_non_base64_text_alone() {
        let text = format!("{}é{}", "x".repeat(49), "y".repeat(100));
        let mut value = json!({ "error": { "data": text.clone() } });
        truncate_base64_in_json(&mut value);
        assert_eq!(value["error"]["data"], json!(text));
    }
}
