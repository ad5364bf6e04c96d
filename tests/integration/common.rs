use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use terminus::config::{Config, MissPolicy};
use terminus::content::SiteContent;
use terminus::llm::{
    AssistantError, Candidate, ChunkStream, ClientConstructor, Content, GenerateContentRequest,
    GenerateContentResponse, ModelBackend, ModelSdk, Part, RestModel, StreamChunk,
    StreamingModel,
};
use terminus::output::{BundledMarkdown, MarkdownLoader};
use terminus::shell::{Host, Key, Shell, ShellDeps, Theme};
use terminus::storage::{KeyValueStore, MemoryStore, CREDENTIAL_KEY};

/// What the shell asked its host to do
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Navigate(String),
    Reload,
    Halt,
    Theme(Theme),
}

#[derive(Clone, Default)]
pub struct RecordingHost {
    pub calls: Arc<Mutex<Vec<HostCall>>>,
}

impl Host for RecordingHost {
    fn navigate(&mut self, url: &str) {
        self.calls.lock().unwrap().push(HostCall::Navigate(url.to_string()));
    }

    fn reload(&mut self) {
        self.calls.lock().unwrap().push(HostCall::Reload);
    }

    fn halt(&mut self) {
        self.calls.lock().unwrap().push(HostCall::Halt);
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.calls.lock().unwrap().push(HostCall::Theme(theme));
    }
}

/// Text of the single user turn of a request
pub fn prompt_of(request: &GenerateContentRequest) -> String {
    request
        .contents
        .first()
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.clone())
        .unwrap_or_default()
}

/// Streams the prompt back word by word, one word per `delay`
#[derive(Clone)]
pub struct EchoSdk {
    pub fail_load: bool,
    pub delay: Duration,
    pub loads: Arc<AtomicUsize>,
}

impl EchoSdk {
    pub fn new(delay: Duration) -> Self {
        Self {
            fail_load: false,
            delay,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::new(Duration::ZERO)
        }
    }
}

#[async_trait]
impl ModelSdk for EchoSdk {
    async fn load(&self) -> Result<Arc<dyn ClientConstructor>, AssistantError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(AssistantError::ClientUnavailable("sdk missing".into()));
        }
        Ok(Arc::new(EchoConstructor { delay: self.delay }))
    }
}

struct EchoConstructor {
    delay: Duration,
}

impl ClientConstructor for EchoConstructor {
    fn construct(
        &self,
        _credential: &str,
        _model: &str,
    ) -> Result<Box<dyn StreamingModel>, AssistantError> {
        Ok(Box::new(EchoClient { delay: self.delay }))
    }
}

struct EchoClient {
    delay: Duration,
}

#[async_trait]
impl StreamingModel for EchoClient {
    async fn generate_stream(
        &self,
        request: GenerateContentRequest,
    ) -> Result<ChunkStream, AssistantError> {
        let words: Vec<String> = prompt_of(&request)
            .split_inclusive(' ')
            .map(str::to_string)
            .collect();
        let delay = self.delay;
        let stream = futures::stream::iter(words).then(move |word| async move {
            tokio::time::sleep(delay).await;
            Ok(StreamChunk::Text(word))
        });
        Ok(stream.boxed())
    }
}

/// Streams nothing and never finishes
pub struct StalledSdk;

#[async_trait]
impl ModelSdk for StalledSdk {
    async fn load(&self) -> Result<Arc<dyn ClientConstructor>, AssistantError> {
        Ok(Arc::new(StalledConstructor))
    }
}

struct StalledConstructor;

impl ClientConstructor for StalledConstructor {
    fn construct(
        &self,
        _credential: &str,
        _model: &str,
    ) -> Result<Box<dyn StreamingModel>, AssistantError> {
        Ok(Box::new(StalledClient))
    }
}

struct StalledClient;

#[async_trait]
impl StreamingModel for StalledClient {
    async fn generate_stream(
        &self,
        _request: GenerateContentRequest,
    ) -> Result<ChunkStream, AssistantError> {
        Ok(futures::stream::pending().boxed())
    }
}

/// REST fallback with a canned answer
#[derive(Clone)]
pub struct CannedRest {
    pub reply: Result<String, AssistantError>,
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

impl CannedRest {
    pub fn ok(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn err(error: AssistantError) -> Self {
        Self {
            reply: Err(error),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer only after `delay` has passed
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RestModel for CannedRest {
    async fn generate(
        &self,
        _credential: &str,
        _model: &str,
        _request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let text = self.reply.clone()?;
        Ok(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: "model".to_string(),
                    parts: vec![Part::text(text)],
                }),
            }],
        })
    }
}

pub fn sample_content() -> SiteContent {
    SiteContent::from_json(
        r#"{
        "content": {
            "posts": [
                {"title": "First", "date": "2024-01-01", "summary": "One", "url": "/blog/first/"},
                {"title": "Second", "date": "2024-02-01", "summary": "Two", "url": "/blog/second/"},
                {"title": "Third", "date": "2024-03-01", "summary": "Three", "url": "/blog/third/"}
            ],
            "welcomeMessages": ["Hi"]
        }
    }"#,
    )
    .unwrap()
}

pub struct Harness {
    pub shell: Shell,
    pub host: RecordingHost,
}

pub struct HarnessBuilder {
    content: SiteContent,
    store: Box<dyn KeyValueStore>,
    sdk: Arc<dyn ModelSdk>,
    rest: Arc<dyn RestModel>,
    markdown: Arc<dyn MarkdownLoader>,
    config: Config,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            content: sample_content(),
            store: Box::new(MemoryStore::new()),
            sdk: Arc::new(EchoSdk::new(Duration::from_millis(10))),
            rest: Arc::new(CannedRest::ok("rest answer")),
            markdown: Arc::new(BundledMarkdown),
            config: Config::default(),
        }
    }

    pub fn content(mut self, content: SiteContent) -> Self {
        self.content = content;
        self
    }

    pub fn store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Store with a credential already set
    pub fn with_key(self) -> Self {
        let mut store = MemoryStore::new();
        store.set(CREDENTIAL_KEY, "test-key-1234").unwrap();
        self.store(store)
    }

    pub fn sdk(mut self, sdk: impl ModelSdk + 'static) -> Self {
        self.sdk = Arc::new(sdk);
        self
    }

    pub fn rest(mut self, rest: impl RestModel + 'static) -> Self {
        self.rest = Arc::new(rest);
        self
    }

    pub fn markdown(mut self, loader: impl MarkdownLoader + 'static) -> Self {
        self.markdown = Arc::new(loader);
        self
    }

    pub fn miss_policy(mut self, policy: MissPolicy) -> Self {
        self.config.assistant.miss_policy = policy;
        self
    }

    pub fn markdown_default(mut self, enabled: bool) -> Self {
        self.config.markdown.default_enabled = enabled;
        self
    }

    pub fn build(self) -> Harness {
        let backend = ModelBackend::new(self.sdk.clone(), self.rest.clone());
        self.build_with(backend)
    }

    /// Build around a ready-made backend instead of the scripted one
    pub fn build_with(self, backend: ModelBackend) -> Harness {
        let host = RecordingHost::default();
        let shell = Shell::new(ShellDeps {
            content: self.content,
            store: self.store,
            host: Box::new(host.clone()),
            backend: Arc::new(backend),
            markdown: self.markdown,
            config: self.config,
        });
        Harness { shell, host }
    }
}

impl Harness {
    pub fn run(&mut self, line: &str) {
        self.shell.submit_line(line);
    }

    pub fn key(&mut self, key: Key) {
        self.shell.handle_key(key);
    }

    pub fn typed(&mut self, text: &str) {
        for c in text.chars() {
            self.shell.handle_key(Key::Char(c));
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.shell.output().texts()
    }

    pub fn last(&self) -> String {
        self.texts().last().cloned().unwrap_or_default()
    }

    pub fn host_calls(&self) -> Vec<HostCall> {
        self.host.calls.lock().unwrap().clone()
    }

    /// Apply events until nothing arrives for `idle` of (paused) time
    pub async fn settle_for(&mut self, idle: Duration) {
        while let Ok(Some(event)) = tokio::time::timeout(idle, self.shell.next_event()).await {
            self.shell.apply(event);
        }
    }

    /// Apply events until the shell is quiet
    pub async fn settle(&mut self) {
        self.settle_for(Duration::from_secs(120)).await;
    }

    /// Let `span` of time pass, applying whatever arrives meanwhile
    pub async fn advance(&mut self, span: Duration) {
        let deadline = tokio::time::Instant::now() + span;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.shell.next_event()).await {
                Ok(Some(event)) => self.shell.apply(event),
                _ => break,
            }
        }
    }
}
