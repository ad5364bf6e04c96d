//! Background half of an assistant request
//!
//! Runs in a spawned task and reports through [`ShellEvent`]s. A request is
//! superseded as soon as the shared stream epoch moves past its session id;
//! from then on it sends nothing and its network work is simply dropped.

use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use crate::llm::{AssistantError, GenerateContentRequest, ModelBackend};
use crate::output::LineId;

use super::epoch::Epoch;
use super::ShellEvent;

pub const SYSTEM_PROMPT: &str = "You are Terminus, the built-in command-line assistant of the personal site of Thomas Brugman. Your role is to help visitors quickly with concise, accurate answers and guidance. Be brief by default; expand only when explicitly asked.\n\nSite context:\n- The site is a Hugo-powered personal website for Thomas Brugman. It features an About page, Projects, Skills, a technical Blog with posts about Linux, automation, GitHub Actions, and open source, and a Contact page.\n- The site includes an interactive terminal with built-in commands: about, projects, skills, contact, blog, read, clear, theme, reboot, shutdown, matrix, sudo, whoami, ls, pwd.\n- When appropriate, guide users to these sections, summarize their content, or suggest relevant commands.\n\nBehavior:\n- Communicate clearly, avoid jargon unless appropriate, and provide actionable steps.\n- Never request or reveal secrets; do not echo API keys.\n- If a request is unclear or broad, ask a minimal clarifying question.";

/// Everything a request needs, captured when it starts
#[derive(Debug, Clone)]
pub struct AssistantRequest {
    pub session: u64,
    pub line: LineId,
    pub prompt: String,
    pub credential: String,
    pub model: String,
    pub timeout: Duration,
}

enum Outcome {
    Finished,
    Superseded,
}

struct Reporter<'a> {
    session: u64,
    line: LineId,
    epoch: &'a Epoch,
    events: &'a UnboundedSender<ShellEvent>,
}

impl Reporter<'_> {
    fn is_active(&self) -> bool {
        self.epoch.is_current(self.session)
    }

    fn send(&self, event: ShellEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Shell gone, dropping update for session {}", self.session);
        }
    }

    fn chunk(&self, text: String) {
        self.send(ShellEvent::StreamChunk {
            session: self.session,
            line: self.line,
            text,
        });
    }
}

async fn bounded<F: Future>(limit: Duration, fut: F) -> Result<F::Output, AssistantError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AssistantError::Timeout(limit))
}

/// Drive one request to completion, failure, or supersession
pub async fn run(
    backend: Arc<ModelBackend>,
    request: AssistantRequest,
    epoch: Epoch,
    events: UnboundedSender<ShellEvent>,
) {
    let reporter = Reporter {
        session: request.session,
        line: request.line,
        epoch: &epoch,
        events: &events,
    };

    let result = generate(&backend, &request, &reporter).await;

    if !reporter.is_active() {
        tracing::debug!("Assistant session {} superseded", request.session);
        return;
    }

    match result {
        Ok(Outcome::Finished) => {
            tracing::info!("Assistant session {} finished", request.session);
            reporter.send(ShellEvent::StreamDone {
                session: request.session,
                line: request.line,
            });
        }
        Ok(Outcome::Superseded) => {
            tracing::debug!("Assistant session {} superseded", request.session);
        }
        Err(e) => {
            tracing::warn!("Assistant session {} failed: {}", request.session, e);
            reporter.send(ShellEvent::StreamFailed {
                session: request.session,
                line: request.line,
                message: format!("AI request failed: {}", e),
            });
        }
    }
}

async fn generate(
    backend: &ModelBackend,
    request: &AssistantRequest,
    reporter: &Reporter<'_>,
) -> Result<Outcome, AssistantError> {
    let body = GenerateContentRequest::single_turn(SYSTEM_PROMPT, &request.prompt);

    let client = match bounded(
        request.timeout,
        backend.streaming_client(&request.credential, &request.model),
    )
    .await
    {
        Ok(Ok(client)) => client,
        Ok(Err(e)) => {
            tracing::debug!("Streaming client unavailable ({}), using REST", e);
            return generate_rest(backend, request, &body, reporter).await;
        }
        Err(e) => {
            tracing::debug!("Streaming client load stalled ({}), using REST", e);
            return generate_rest(backend, request, &body, reporter).await;
        }
    };

    let mut chunks = bounded(request.timeout, client.generate_stream(body)).await??;

    while let Some(chunk) = bounded(request.timeout, chunks.next()).await? {
        if !reporter.is_active() {
            return Ok(Outcome::Superseded);
        }
        let text = chunk?.text();
        if !text.is_empty() {
            reporter.chunk(text);
        }
    }

    Ok(Outcome::Finished)
}

async fn generate_rest(
    backend: &ModelBackend,
    request: &AssistantRequest,
    body: &GenerateContentRequest,
    reporter: &Reporter<'_>,
) -> Result<Outcome, AssistantError> {
    let response = bounded(
        request.timeout,
        backend
            .rest()
            .generate(&request.credential, &request.model, body),
    )
    .await??;

    if !reporter.is_active() {
        return Ok(Outcome::Superseded);
    }

    let text = response.text();
    if !text.is_empty() {
        reporter.chunk(text);
    }
    Ok(Outcome::Finished)
}
