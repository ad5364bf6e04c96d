use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

pub mod gemini;

/// Errors surfaced by the model backend.
///
/// The `Display` text is what the user sees after `"AI request failed: "`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssistantError {
    #[error("no API key set")]
    MissingCredential,

    #[error("HTTP {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("model client unavailable: {0}")]
    ClientUnavailable(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        // the request URL carries the credential as a query parameter
        let err = err.without_url();
        if err.is_timeout() {
            AssistantError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            AssistantError::MalformedResponse(err.to_string())
        } else {
            AssistantError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// A single user turn framed by the system instruction
    pub fn single_turn(system_instruction: &str, prompt: &str) -> Self {
        Self {
            system_instruction: Some(Content {
                role: "system".to_string(),
                parts: vec![Part::text(system_instruction)],
            }),
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text(prompt)],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined; empty when the shape is missing
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// One element of a streamed generation
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// The client already exposes the chunk text directly
    Text(String),
    /// Raw candidate/parts payload
    Structured(GenerateContentResponse),
}

impl StreamChunk {
    pub fn text(&self) -> String {
        match self {
            StreamChunk::Text(text) => text.clone(),
            StreamChunk::Structured(response) => response.text(),
        }
    }
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, AssistantError>>;

/// A client bound to one credential and model that can stream generations
#[async_trait]
pub trait StreamingModel: Send + Sync {
    async fn generate_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ChunkStream, AssistantError>;
}

/// Builds streaming clients once the SDK capability is available
pub trait ClientConstructor: Send + Sync {
    fn construct(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<Box<dyn StreamingModel>, AssistantError>;
}

/// The lazily-loaded streaming capability
#[async_trait]
pub trait ModelSdk: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn ClientConstructor>, AssistantError>;
}

/// Plain request/response fallback used when streaming is unavailable
#[async_trait]
pub trait RestModel: Send + Sync {
    async fn generate(
        &self,
        credential: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AssistantError>;
}

/// Streaming SDK plus REST fallback, shared by every request of the process.
///
/// The SDK capability is cached after its first successful load; a failed
/// load is retried by the next request.
pub struct ModelBackend {
    sdk: Arc<dyn ModelSdk>,
    constructor: OnceCell<Arc<dyn ClientConstructor>>,
    rest: Arc<dyn RestModel>,
}

impl ModelBackend {
    pub fn new(sdk: Arc<dyn ModelSdk>, rest: Arc<dyn RestModel>) -> Self {
        Self {
            sdk,
            constructor: OnceCell::new(),
            rest,
        }
    }

    /// Gemini over reqwest for both paths
    pub fn gemini(base_url: &str) -> Self {
        Self::new(
            Arc::new(gemini::GeminiSdk::new(base_url)),
            Arc::new(gemini::GeminiRest::new(base_url)),
        )
    }

    pub fn is_sdk_loaded(&self) -> bool {
        self.constructor.initialized()
    }

    /// Resolve the SDK (at most one successful load) and build a client
    pub async fn streaming_client(
        &self,
        credential: &str,
        model: &str,
    ) -> Result<Box<dyn StreamingModel>, AssistantError> {
        let constructor = self
            .constructor
            .get_or_try_init(|| async { self.sdk.load().await })
            .await?;
        constructor.construct(credential, model)
    }

    pub fn rest(&self) -> &dyn RestModel {
        self.rest.as_ref()
    }
}
