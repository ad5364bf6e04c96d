//! Gemini generate-content endpoints over reqwest
//!
//! Streaming goes through `:streamGenerateContent?alt=sse`, the fallback
//! through the plain `:generateContent` call. The credential travels as
//! the `key` query parameter on both.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use url::Url;

use super::{
    AssistantError, ChunkStream, ClientConstructor, GenerateContentRequest,
    GenerateContentResponse, ModelSdk, RestModel, StreamChunk, StreamingModel,
};

fn endpoint(
    base_url: &str,
    model: &str,
    method: &str,
    params: &[(&str, &str)],
) -> Result<Url, AssistantError> {
    let raw = format!("{}/models/{}:{}", base_url.trim_end_matches('/'), model, method);
    Url::parse_with_params(&raw, params)
        .map_err(|e| AssistantError::Transport(format!("invalid endpoint {}: {}", raw, e)))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AssistantError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!("Gemini API error ({}): {}", status, body);
    Err(AssistantError::Http {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}

/// Loads the HTTP client that backs streaming generations
pub struct GeminiSdk {
    base_url: String,
}

impl GeminiSdk {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ModelSdk for GeminiSdk {
    async fn load(&self) -> Result<Arc<dyn ClientConstructor>, AssistantError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AssistantError::ClientUnavailable(e.to_string()))?;

        tracing::debug!("Gemini streaming client ready ({})", self.base_url);
        Ok(Arc::new(GeminiConstructor {
            http,
            base_url: self.base_url.clone(),
        }))
    }
}

struct GeminiConstructor {
    http: Client,
    base_url: String,
}

impl ClientConstructor for GeminiConstructor {
    fn construct(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<Box<dyn StreamingModel>, AssistantError> {
        if credential.trim().is_empty() {
            return Err(AssistantError::MissingCredential);
        }

        Ok(Box::new(GeminiStreamingClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            credential: credential.to_string(),
            model: model.to_string(),
        }))
    }
}

pub struct GeminiStreamingClient {
    http: Client,
    base_url: String,
    credential: String,
    model: String,
}

#[async_trait]
impl StreamingModel for GeminiStreamingClient {
    async fn generate_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ChunkStream, AssistantError> {
        let url = endpoint(
            &self.base_url,
            &self.model,
            "streamGenerateContent",
            &[("alt", "sse"), ("key", &self.credential)],
        )?;

        let response = self
            .http
            .post(url)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(AssistantError::from)?;
                buffer.extend_from_slice(&chunk);

                // Process complete SSE frames (blank-line separated)
                while let Some((end, separator)) = frame_boundary(&buffer) {
                    let frame: Vec<u8> = buffer.drain(..end + separator).take(end).collect();
                    if let Some(parsed) = parse_sse_frame(&String::from_utf8_lossy(&frame)) {
                        yield parsed?;
                    }
                }
            }

            if !buffer.is_empty() {
                if let Some(parsed) = parse_sse_frame(&String::from_utf8_lossy(&buffer)) {
                    yield parsed?;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Position of the first blank-line frame separator and its length
fn frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        if buffer[i..].starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if buffer[i..].starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

/// Parse one SSE frame; frames without data (comments, keep-alives) yield nothing
fn parse_sse_frame(frame: &str) -> Option<Result<StreamChunk, AssistantError>> {
    let data: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();

    if data.is_empty() {
        return None;
    }

    let payload = data.join("\n");
    if payload.trim().is_empty() || payload.trim() == "[DONE]" {
        return None;
    }

    Some(
        serde_json::from_str::<GenerateContentResponse>(&payload)
            .map(StreamChunk::Structured)
            .map_err(|e| AssistantError::MalformedResponse(e.to_string())),
    )
}

/// Single request/response generation
pub struct GeminiRest {
    http: Client,
    base_url: String,
}

impl GeminiRest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RestModel for GeminiRest {
    async fn generate(
        &self,
        credential: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AssistantError> {
        let url = endpoint(&self.base_url, model, "generateContent", &[("key", credential)])?;

        let response = self.http.post(url).json(request).send().await?;
        let response = ensure_success(response).await?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AssistantError::MalformedResponse(e.to_string()))
    }
}
