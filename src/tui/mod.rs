//! Terminal host - runs the shell inside a ratatui screen
//!
//! The runner owns the [`Shell`] and drives it from one loop: crossterm key
//! and mouse events go in, queued [`ShellEvent`](crate::shell::ShellEvent)s
//! are drained, and the screen is redrawn when something changed. Host side
//! effects requested by the shell arrive over a channel so they can replace
//! the shell itself (reload) or the whole screen (halt).

pub mod html;
pub mod ui;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::Config;
use crate::content::SiteContent;
use crate::llm::ModelBackend;
use crate::output::{BundledMarkdown, MarkdownLoader};
use crate::shell::{Host, Key, Shell, ShellDeps, Theme};
use crate::storage::FileStore;

/// Side effects the shell asked its host for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    Navigate(String),
    Reload,
    Halt,
    Theme(Theme),
}

/// [`Host`] that forwards every request to the runner
pub struct TerminalHost {
    tx: UnboundedSender<HostRequest>,
}

impl TerminalHost {
    pub fn new(tx: UnboundedSender<HostRequest>) -> Self {
        Self { tx }
    }

    fn send(&self, request: HostRequest) {
        if self.tx.send(request).is_err() {
            tracing::debug!("Terminal host is gone");
        }
    }
}

impl Host for TerminalHost {
    fn navigate(&mut self, url: &str) {
        self.send(HostRequest::Navigate(url.to_string()));
    }

    fn reload(&mut self) {
        self.send(HostRequest::Reload);
    }

    fn halt(&mut self) {
        self.send(HostRequest::Halt);
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.send(HostRequest::Theme(theme));
    }
}

/// Host-side screen state that outlives a single shell
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub theme: Theme,
    pub status: Option<String>,
    pub halted: bool,
    /// Advances every loop iteration; drives the cursor blink
    pub frame: u64,
}

pub struct TuiRunner {
    config: Config,
    content: SiteContent,
    backend: Arc<ModelBackend>,
    markdown: Arc<dyn MarkdownLoader>,
    view: ViewState,
    host_tx: UnboundedSender<HostRequest>,
    host_rx: UnboundedReceiver<HostRequest>,
}

impl TuiRunner {
    pub fn new(config: Config, content: SiteContent) -> Self {
        let backend = Arc::new(ModelBackend::gemini(&config.assistant.base_url));
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        Self {
            config,
            content,
            backend,
            markdown: Arc::new(BundledMarkdown),
            view: ViewState::default(),
            host_tx,
            host_rx,
        }
    }

    /// A fresh shell, as if the page had just been loaded
    fn build_shell(&self) -> Result<Shell> {
        let storage_path = self.config.storage_path()?;
        let store = FileStore::open(&storage_path)
            .with_context(|| format!("Failed to open storage at {}", storage_path.display()))?;

        let mut shell = Shell::new(ShellDeps {
            content: self.content.clone(),
            store: Box::new(store),
            host: Box::new(TerminalHost::new(self.host_tx.clone())),
            backend: self.backend.clone(),
            markdown: self.markdown.clone(),
            config: self.config.clone(),
        });
        shell.start();
        Ok(shell)
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut shell = self.build_shell()?;

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_event_loop(&mut terminal, &mut shell).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn run_event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        shell: &mut Shell,
    ) -> Result<()> {
        let mut needs_redraw = true;

        loop {
            if needs_redraw || ui::is_animating(shell) {
                terminal.draw(|f| ui::draw(f, shell, &self.view))?;
                needs_redraw = false;
            }

            if event::poll(Duration::from_millis(30))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if is_exit(&key) {
                            break;
                        }
                        if let Some(key) = map_key(&key) {
                            shell.handle_key(key);
                        }
                    }
                    Event::Mouse(mouse) => match mouse.kind {
                        MouseEventKind::ScrollUp => shell.output_mut().scroll_up(3),
                        MouseEventKind::ScrollDown => shell.output_mut().scroll_down(3),
                        _ => {}
                    },
                    Event::Resize(_, _) => needs_redraw = true,
                    _ => {}
                }
            }

            // Let spawned tasks make progress between polls
            tokio::task::yield_now().await;
            shell.drain_events();

            while let Ok(request) = self.host_rx.try_recv() {
                match request {
                    HostRequest::Navigate(url) => self.open_url(&url),
                    HostRequest::Reload => {
                        tracing::info!("Reloading shell");
                        *shell = self.build_shell()?;
                        self.view.status = None;
                    }
                    HostRequest::Halt => {
                        tracing::info!("System halted");
                        self.view.halted = true;
                    }
                    HostRequest::Theme(theme) => self.view.theme = theme,
                }
                needs_redraw = true;
            }

            if shell.take_dirty() {
                needs_redraw = true;
            }

            self.view.frame = self.view.frame.wrapping_add(1);
            if self.view.frame % ui::BLINK_FRAMES == 0 {
                needs_redraw = true;
            }
        }

        Ok(())
    }

    fn open_url(&mut self, url: &str) {
        let target = resolve_url(self.config.site.base_url.as_deref(), url);

        let Some(command) = self.config.site.browser_command.as_deref() else {
            self.view.status = Some(format!("→ {}", target));
            return;
        };

        let spawned = std::process::Command::new(command)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        self.view.status = match spawned {
            Ok(_) => Some(format!("Opened {}", target)),
            Err(e) => {
                tracing::warn!("Failed to launch {}: {}", command, e);
                Some(format!("Could not open {}", target))
            }
        };
    }
}

/// Join a site-relative post URL onto the configured origin
pub fn resolve_url(base: Option<&str>, target: &str) -> String {
    let Some(base) = base else {
        return target.to_string();
    };
    match url::Url::parse(base).and_then(|base| base.join(target)) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            tracing::debug!("Cannot resolve {} against {}: {}", target, base, e);
            target.to_string()
        }
    }
}

fn is_exit(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
}

/// Translate a crossterm key into one the shell understands
pub fn map_key(key: &KeyEvent) -> Option<Key> {
    // some platforms also report releases and repeats
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) || key.modifiers.contains(KeyModifiers::ALT)
    {
        return None;
    }

    match key.code {
        KeyCode::Char(c) => Some(Key::Char(c)),
        KeyCode::Backspace => Some(Key::Backspace),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Tab => Some(Key::Tab),
        KeyCode::Esc => Some(Key::Escape),
        KeyCode::PageUp => Some(Key::PageUp),
        KeyCode::PageDown => Some(Key::PageDown),
        _ => None,
    }
}
