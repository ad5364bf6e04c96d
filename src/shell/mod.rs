//! The command shell session
//!
//! One [`Shell`] per page view. It owns the input line, the output log and
//! all session state, and is driven from a single event loop: key presses go
//! through [`Shell::handle_key`], results of background work come back as
//! [`ShellEvent`]s and are applied with [`Shell::apply`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

pub mod assistant;
pub mod autocomplete;
pub mod banner;
pub mod builtins;
pub mod commands;
pub mod epoch;
pub mod history;
pub mod host;
pub mod selection;

pub use autocomplete::{Autocomplete, Completion};
pub use banner::{BannerState, WelcomeBanner};
pub use commands::{Command, CommandParser, MarkdownAction};
pub use epoch::Epoch;
pub use history::{History, Recall};
pub use host::{Host, Theme};
pub use selection::PostPicker;

use crate::config::{Config, MissPolicy};
use crate::content::SiteContent;
use crate::llm::ModelBackend;
use crate::output::{
    BlockTag, LibraryState, LineClass, LineId, MarkdownError, MarkdownLibrary, MarkdownLibs,
    MarkdownLoader, OutputLog, StreamingLine,
};
use crate::storage::{self, KeyValueStore};

use assistant::AssistantRequest;

/// Echoed in front of every submitted command
pub const PROMPT: &str = "thomas@website:~$ ";

/// Input placeholder while the post picker is open
pub const SELECTION_PLACEHOLDER: &str = "[Blog Selection Mode]";

/// Keys the shell reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Up,
    Down,
    Tab,
    Escape,
    PageUp,
    PageDown,
}

/// The single-line text input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLine {
    pub value: String,
    pub read_only: bool,
    pub dimmed: bool,
}

impl InputLine {
    pub fn editable() -> Self {
        Self::default()
    }

    fn selection_mode() -> Self {
        Self {
            value: SELECTION_PLACEHOLDER.to_string(),
            read_only: true,
            dimmed: true,
        }
    }
}

/// Staged UI feedback, delivered after a delay unless the UI epoch moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedAction {
    /// Second stage of opening a post
    OpenPost { url: String },
    Navigate { url: String },
    Reload,
    Halt,
    SudoRetraction,
}

/// Results of background work, applied on the event loop
#[derive(Debug)]
pub enum ShellEvent {
    BannerTick,
    BannerHide,
    Staged { epoch: u64, action: StagedAction },
    RenderTick { line: LineId },
    MarkdownLoaded(Result<MarkdownLibs, MarkdownError>),
    StreamChunk { session: u64, line: LineId, text: String },
    StreamDone { session: u64, line: LineId },
    StreamFailed { session: u64, line: LineId, message: String },
}

/// Collaborators injected at construction
pub struct ShellDeps {
    pub content: SiteContent,
    pub store: Box<dyn KeyValueStore>,
    pub host: Box<dyn Host>,
    pub backend: Arc<ModelBackend>,
    pub markdown: Arc<dyn MarkdownLoader>,
    pub config: Config,
}

pub struct Shell {
    content: SiteContent,
    store: Box<dyn KeyValueStore>,
    host: Box<dyn Host>,
    backend: Arc<ModelBackend>,
    markdown: MarkdownLibrary,
    config: Config,

    output: OutputLog,
    input: InputLine,
    history: History,
    autocomplete: Autocomplete,
    picker: Option<PostPicker>,
    banner: WelcomeBanner,
    theme: Theme,
    markdown_enabled: bool,
    has_typed: bool,
    halted: bool,
    dirty: bool,

    /// Advanced by every assistant request and by clear/reboot/shutdown
    stream_epoch: Epoch,
    /// Advanced by clear/reboot/shutdown
    ui_epoch: Epoch,

    events_tx: UnboundedSender<ShellEvent>,
    events_rx: UnboundedReceiver<ShellEvent>,
}

impl Shell {
    pub fn new(deps: ShellDeps) -> Self {
        let ShellDeps {
            content,
            store,
            host,
            backend,
            markdown,
            config,
        } = deps;

        let markdown_enabled =
            storage::read_markdown_flag(store.as_ref(), config.markdown.default_enabled);
        let welcome = content
            .welcome_messages
            .as_ref()
            .and_then(|messages| messages.first().cloned())
            .or_else(|| builtins::DEFAULT_WELCOME.first().map(|s| s.to_string()))
            .unwrap_or_default();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            content,
            store,
            host,
            backend,
            markdown: MarkdownLibrary::new(markdown),
            config,
            output: OutputLog::new(),
            input: InputLine::editable(),
            history: History::new(),
            autocomplete: Autocomplete::new(),
            picker: None,
            banner: WelcomeBanner::new(welcome),
            theme: Theme::default(),
            markdown_enabled,
            has_typed: false,
            halted: false,
            dirty: true,
            stream_epoch: Epoch::new(),
            ui_epoch: Epoch::new(),
            events_tx,
            events_rx,
        }
    }

    /// Begin typing the welcome banner. Needs a Tokio runtime.
    pub fn start(&mut self) {
        if self.banner.state() == BannerState::Typing {
            self.schedule(self.typewriter_delay(), ShellEvent::BannerTick);
        }
    }

    // ---- accessors for hosts and tests ----

    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputLog {
        &mut self.output
    }

    pub fn input(&self) -> &InputLine {
        &self.input
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn banner(&self) -> &WelcomeBanner {
        &self.banner
    }

    pub fn picker(&self) -> Option<&PostPicker> {
        self.picker.as_ref()
    }

    pub fn is_selecting(&self) -> bool {
        self.picker.is_some()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn markdown_enabled(&self) -> bool {
        self.markdown_enabled
    }

    pub fn markdown_state(&self) -> &LibraryState {
        self.markdown.state()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn miss_policy(&self) -> MissPolicy {
        self.config.assistant.miss_policy
    }

    /// Session id of the most recent assistant request
    pub fn active_stream(&self) -> u64 {
        self.stream_epoch.current()
    }

    /// Whether anything visible changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        let output = self.output.take_dirty();
        std::mem::take(&mut self.dirty) || output
    }

    // ---- scheduling ----

    fn schedule(&self, delay: Duration, event: ShellEvent) {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(event);
        });
    }

    fn stage(&self, delay_ms: u64, action: StagedAction) {
        self.schedule(
            Duration::from_millis(delay_ms),
            ShellEvent::Staged {
                epoch: self.ui_epoch.current(),
                action,
            },
        );
    }

    fn typewriter_delay(&self) -> Duration {
        Duration::from_millis(self.config.timings.typewriter_ms)
    }

    // ---- event loop integration ----

    /// Apply every event that is already queued; returns how many
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event without applying it
    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        self.events_rx.recv().await
    }

    pub fn apply(&mut self, event: ShellEvent) {
        self.dirty = true;
        match event {
            ShellEvent::BannerTick => {
                if self.banner.type_next() {
                    self.schedule(self.typewriter_delay(), ShellEvent::BannerTick);
                }
            }
            ShellEvent::BannerHide => self.banner.hide(),
            ShellEvent::Staged { epoch, action } => {
                if !self.ui_epoch.is_current(epoch) {
                    tracing::debug!("Dropping stale staged action {:?}", action);
                    return;
                }
                self.run_staged(epoch, action);
            }
            ShellEvent::RenderTick { line } => self.render_tick(line),
            ShellEvent::MarkdownLoaded(result) => self.markdown_loaded(result),
            ShellEvent::StreamChunk {
                session,
                line,
                text,
            } => {
                if self.stream_is_active(session) {
                    self.append_to_stream(line, &text);
                }
            }
            ShellEvent::StreamDone { session, line } => {
                if self.stream_is_active(session) {
                    self.seal_stream(line);
                }
            }
            ShellEvent::StreamFailed {
                session,
                line,
                message,
            } => {
                if self.stream_is_active(session) {
                    self.append_to_stream(line, &message);
                    self.seal_stream(line);
                }
            }
        }
    }

    fn stream_is_active(&self, session: u64) -> bool {
        let active = self.stream_epoch.is_current(session);
        if !active {
            tracing::debug!("Ignoring output of superseded session {}", session);
        }
        active
    }

    fn run_staged(&mut self, epoch: u64, action: StagedAction) {
        match action {
            StagedAction::OpenPost { url } => {
                self.output.push("Navigating to blog post...", LineClass::Success);
                self.schedule(
                    Duration::from_millis(self.config.timings.navigate_ms),
                    ShellEvent::Staged {
                        epoch,
                        action: StagedAction::Navigate { url },
                    },
                );
            }
            StagedAction::Navigate { url } => {
                tracing::info!("Navigating to {}", url);
                self.host.navigate(&url);
            }
            StagedAction::Reload => self.host.reload(),
            StagedAction::Halt => {
                self.halted = true;
                self.host.halt();
            }
            StagedAction::SudoRetraction => builtins::sudo_retraction(&mut self.output),
        }
    }

    // ---- keyboard ----

    pub fn handle_key(&mut self, key: Key) {
        self.dirty = true;

        if !self.has_typed {
            self.has_typed = true;
            if self.banner.fade() {
                self.schedule(
                    Duration::from_millis(self.config.timings.banner_fade_ms),
                    ShellEvent::BannerHide,
                );
            }
        }

        if self.halted {
            return;
        }

        if self.picker.is_some() {
            self.handle_selection_key(key);
            return;
        }

        match key {
            Key::Enter => self.submit(),
            Key::Up => {
                let step = self.history.older();
                self.recall(step);
            }
            Key::Down => {
                let step = self.history.newer();
                self.recall(step);
            }
            Key::Tab => self.complete(),
            Key::Char(c) => {
                if !self.input.read_only {
                    self.input.value.push(c);
                }
            }
            Key::Backspace => {
                if !self.input.read_only {
                    self.input.value.pop();
                }
            }
            Key::PageUp => self.output.scroll_up(5),
            Key::PageDown => self.output.scroll_down(5),
            Key::Escape => {}
        }
    }

    fn handle_selection_key(&mut self, key: Key) {
        let Some(picker) = self.picker.as_mut() else {
            return;
        };

        match key {
            Key::Up => {
                picker.move_up();
                self.render_picker();
            }
            Key::Down => {
                picker.move_down();
                self.render_picker();
            }
            Key::Enter => {
                let post = picker.selected().clone();
                self.output
                    .push(format!("Opening \"{}\"...", post.title), LineClass::Info);
                self.stage(
                    self.config.timings.open_post_ms,
                    StagedAction::OpenPost { url: post.url },
                );
                self.exit_selection();
            }
            Key::Escape => self.exit_selection(),
            _ => {}
        }
    }

    fn render_picker(&mut self) {
        if let Some(picker) = &self.picker {
            self.output
                .replace_block(BlockTag::PostList, picker.block_lines());
        }
    }

    fn exit_selection(&mut self) {
        self.picker = None;
        self.input = InputLine::editable();
        self.output.remove_block(BlockTag::PostList);
    }

    fn recall(&mut self, step: Recall) {
        match step {
            Recall::Entry(entry) => self.input.value = entry,
            Recall::Cleared => self.input.value.clear(),
            Recall::Unchanged => {}
        }
    }

    fn complete(&mut self) {
        match self.autocomplete.complete(&self.input.value) {
            Completion::Unique(command) => self.input.value = command.to_string(),
            Completion::Candidates(matches) => {
                self.output.push(
                    format!("Available commands: {}", matches.join(", ")),
                    LineClass::Info,
                );
            }
            Completion::NoMatch => {}
        }
    }

    /// Submit whatever is in the input line
    pub fn submit(&mut self) {
        let full = self.input.value.trim().to_string();
        self.input.value.clear();
        self.history.reset_cursor();

        if full.is_empty() {
            return;
        }

        self.history.push(full.clone());
        self.output
            .push(format!("{}{}", PROMPT, full), LineClass::Command);
        self.execute(&full);
        self.output.scroll_to_bottom();
    }

    /// Type `line` into the input and submit it
    pub fn submit_line(&mut self, line: &str) {
        if self.picker.is_some() || self.halted {
            return;
        }
        self.input.value = line.to_string();
        self.submit();
    }

    // ---- dispatch ----

    fn execute(&mut self, full: &str) {
        let command = CommandParser::parse(full);
        tracing::debug!("Dispatching {:?}", command);

        match command {
            Command::Read(arg) => self.read_post(&arg),
            Command::Markdown(action) => self.markdown_command(action),
            Command::SetKey(token) => self.set_key(&token),
            Command::ClearKey => self.clear_key(),
            Command::Ask(prompt) => {
                if prompt.is_empty() {
                    self.output.push("Usage: ai <prompt>", LineClass::Error);
                } else {
                    self.ask(&prompt);
                }
            }
            Command::Help => builtins::help(&mut self.output, self.config.assistant.miss_policy),
            Command::About => builtins::about(&mut self.output),
            Command::Projects => builtins::projects(&mut self.output, &self.content),
            Command::Skills => builtins::skills(&mut self.output, &self.content),
            Command::Contact => builtins::contact(&mut self.output),
            Command::Blog => self.open_blog(),
            Command::Clear => self.clear(),
            Command::Theme => self.toggle_theme(),
            Command::Reboot => self.reboot(),
            Command::Shutdown => self.shutdown(),
            Command::Matrix => builtins::matrix(&mut self.output),
            Command::Sudo => {
                builtins::sudo_denied(&mut self.output);
                self.stage(self.config.timings.sudo_ms, StagedAction::SudoRetraction);
            }
            Command::Whoami => builtins::whoami(&mut self.output),
            Command::Ls => builtins::ls(&mut self.output),
            Command::Pwd => builtins::pwd(&mut self.output),
            Command::Unknown { command, full } => match self.miss_policy() {
                MissPolicy::Assistant => self.ask(&full),
                MissPolicy::Suggest => builtins::not_found(&mut self.output, &command),
            },
        }
    }

    fn read_post(&mut self, arg: &str) {
        let posts = self.content.posts();
        if posts.is_empty() {
            self.output.push("No blog posts available.", LineClass::Error);
            return;
        }

        let post = commands::parse_leading_int(arg)
            .and_then(|n| usize::try_from(n).ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| posts.get(index))
            .cloned();

        match post {
            Some(post) => {
                self.output
                    .push(format!("Opening \"{}\"...", post.title), LineClass::Info);
                self.stage(
                    self.config.timings.open_post_ms,
                    StagedAction::OpenPost { url: post.url },
                );
            }
            None => {
                self.output.push(
                    format!(
                        "Post {} not found. Use \"blog\" to see available posts.",
                        arg
                    ),
                    LineClass::Error,
                );
            }
        }
    }

    fn open_blog(&mut self) {
        let Some(picker) = PostPicker::new(self.content.posts()) else {
            self.output.push("No blog posts available yet.", LineClass::Info);
            self.output.push("Check back soon for updates!", LineClass::Plain);
            return;
        };

        self.output.push("Latest Blog Posts", LineClass::Info);
        self.output.push("", LineClass::Plain);
        self.output.push(
            "Use ↑/↓ arrow keys to navigate, Enter to select, Esc to cancel",
            LineClass::Info,
        );
        self.output.push("", LineClass::Plain);

        self.picker = Some(picker);
        self.render_picker();
        self.input = InputLine::selection_mode();
    }

    fn markdown_command(&mut self, action: MarkdownAction) {
        let target = match action {
            MarkdownAction::Status => {
                self.output.push(
                    format!("Markdown is {}", on_off(self.markdown_enabled)),
                    LineClass::Info,
                );
                return;
            }
            MarkdownAction::On => true,
            MarkdownAction::Off => false,
            MarkdownAction::Toggle => !self.markdown_enabled,
            MarkdownAction::Invalid(_) => {
                self.output.push(
                    "Usage: md on | md off | md toggle | md status",
                    LineClass::Info,
                );
                return;
            }
        };

        let value = if target { "true" } else { "false" };
        if let Err(e) = self.store.set(storage::MARKDOWN_ENABLED_KEY, value) {
            tracing::warn!("Failed to persist Markdown preference: {}", e);
            self.output
                .push("Failed to store Markdown preference.", LineClass::Error);
            return;
        }

        self.markdown_enabled = target;
        tracing::info!("Markdown rendering {}", on_off(target));
        self.output
            .push(format!("Markdown: {}", on_off(target)), LineClass::Info);
    }

    fn set_key(&mut self, token: &str) {
        if token.is_empty() {
            self.output
                .push("Usage: setkey YOUR_API_KEY", LineClass::Error);
            return;
        }

        let masked = storage::mask_credential(token);
        match self.store.set(storage::CREDENTIAL_KEY, token) {
            Ok(()) => {
                tracing::info!("API key stored ({})", masked);
                self.output
                    .push(format!("API key set: {}", masked), LineClass::Success);
            }
            Err(e) => {
                tracing::warn!("Failed to store API key: {}", e);
                self.output.push("Failed to store API key.", LineClass::Error);
            }
        }
    }

    fn clear_key(&mut self) {
        match self.store.remove(storage::CREDENTIAL_KEY) {
            Ok(()) => {
                tracing::info!("API key cleared");
                self.output.push("API key cleared.", LineClass::Success);
            }
            Err(e) => {
                tracing::warn!("Failed to clear API key: {}", e);
                self.output.push("Failed to clear API key.", LineClass::Error);
            }
        }
    }

    fn clear(&mut self) {
        self.stream_epoch.advance();
        self.ui_epoch.advance();
        self.output.clear();
        self.output.push("Terminal cleared", LineClass::Info);
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.host.apply_theme(self.theme);
        self.output.push(
            format!("Switched to {} theme", self.theme.name()),
            LineClass::Success,
        );
    }

    fn reboot(&mut self) {
        self.stream_epoch.advance();
        self.ui_epoch.advance();
        self.output.push("Rebooting system...", LineClass::Info);
        self.stage(self.config.timings.reboot_ms, StagedAction::Reload);
    }

    fn shutdown(&mut self) {
        self.stream_epoch.advance();
        self.ui_epoch.advance();
        self.output.push("System shutting down...", LineClass::Info);
        self.output.push("Thank you for visiting!", LineClass::Success);
        self.stage(self.config.timings.shutdown_ms, StagedAction::Halt);
    }

    // ---- assistant ----

    fn ask(&mut self, prompt: &str) {
        let credential = match self.store.get(storage::CREDENTIAL_KEY) {
            Ok(Some(key)) if !key.is_empty() => key,
            Ok(_) => {
                self.output.push(
                    "No API key set. Use: setkey YOUR_API_KEY",
                    LineClass::Error,
                );
                return;
            }
            Err(e) => {
                tracing::warn!("Failed to read API key: {}", e);
                self.output.push(
                    "No API key set. Use: setkey YOUR_API_KEY",
                    LineClass::Error,
                );
                return;
            }
        };

        let session = self.stream_epoch.advance();
        let prefix = format!(
            "[{}] Terminus: ",
            chrono::Local::now().format("%H:%M:%S")
        );
        let line = self.output.push_stream(StreamingLine::new(
            prefix,
            self.markdown_enabled,
            self.config.markdown.throttle(),
        ));

        tracing::info!(
            "Assistant session {} started (model {})",
            session,
            self.config.assistant.model
        );

        let request = AssistantRequest {
            session,
            line,
            prompt: prompt.to_string(),
            credential,
            model: self.config.assistant.model.clone(),
            timeout: self.config.assistant.timeout(),
        };
        tokio::spawn(assistant::run(
            self.backend.clone(),
            request,
            self.stream_epoch.clone(),
            self.events_tx.clone(),
        ));
    }

    // ---- streaming lines ----

    fn ensure_markdown(&mut self) {
        if let Some(loader) = self.markdown.begin_load() {
            tracing::debug!("Loading Markdown libraries");
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                let result = loader.load().await;
                let _ = tx.send(ShellEvent::MarkdownLoaded(result));
            });
        }
    }

    fn append_to_stream(&mut self, line: LineId, text: &str) {
        let libs_ready = self.markdown.ready().is_some();
        let Some(stream) = self.output.stream_mut(line) else {
            return;
        };

        let uses_markdown = stream.uses_markdown();
        let delay = stream.append(text, libs_ready, Instant::now());
        self.output.scroll_to_bottom();

        if uses_markdown && !libs_ready {
            self.ensure_markdown();
        }
        if let Some(delay) = delay {
            self.schedule(delay, ShellEvent::RenderTick { line });
        }
    }

    fn seal_stream(&mut self, line: LineId) {
        let libs = self.markdown.ready().cloned();
        if let Some(stream) = self.output.stream_mut(line) {
            stream.seal(libs.as_ref(), Instant::now());
        }
    }

    fn render_tick(&mut self, line: LineId) {
        let libs = self.markdown.ready().cloned();
        let Some(stream) = self.output.stream_mut(line) else {
            tracing::debug!("Render tick for removed line {}", line);
            return;
        };
        if stream.is_sealed() {
            return;
        }

        let uses_markdown = stream.uses_markdown();
        let again = stream.render_tick(libs.as_ref(), Instant::now());

        if uses_markdown && libs.is_none() {
            self.ensure_markdown();
        }
        if let Some(delay) = again {
            self.schedule(delay, ShellEvent::RenderTick { line });
        }
    }

    fn markdown_loaded(&mut self, result: Result<MarkdownLibs, MarkdownError>) {
        self.markdown.finish_load(result);
        let Some(libs) = self.markdown.ready().cloned() else {
            return;
        };

        let now = Instant::now();
        for line in self.output.stream_ids() {
            let Some(stream) = self.output.stream_mut(line) else {
                continue;
            };
            if stream.is_sealed() {
                stream.render_late(&libs, now);
            } else if let Some(delay) = stream.request_render(now) {
                self.schedule(delay, ShellEvent::RenderTick { line });
            }
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}
