//! Incrementally appended output lines
//!
//! A streaming line owns the accumulated text of one assistant reply. With
//! Markdown enabled it re-renders the whole buffer at most once per throttle
//! window; the caller schedules the deferred render and feeds it back through
//! [`StreamingLine::render_tick`].

use std::time::Duration;
use tokio::time::Instant;

use super::markdown::MarkdownLibs;

/// What a line currently displays
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedContent {
    Plain(String),
    /// Sanitized HTML
    Html(String),
}

impl RenderedContent {
    pub fn as_str(&self) -> &str {
        match self {
            RenderedContent::Plain(text) | RenderedContent::Html(text) => text,
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, RenderedContent::Html(_))
    }
}

#[derive(Debug, Clone)]
pub struct StreamingLine {
    prefix: String,
    use_markdown: bool,
    throttle: Duration,
    buffer: String,
    rendered: RenderedContent,
    render_pending: bool,
    last_render: Option<Instant>,
    sealed: bool,
    /// Sealed while the libraries were still loading
    late_render: bool,
}

impl StreamingLine {
    /// `use_markdown` is fixed for the lifetime of the line
    pub fn new(prefix: impl Into<String>, use_markdown: bool, throttle: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            use_markdown,
            throttle,
            buffer: String::new(),
            rendered: RenderedContent::Plain(String::new()),
            render_pending: false,
            last_render: None,
            sealed: false,
            late_render: false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn content(&self) -> &RenderedContent {
        &self.rendered
    }

    pub fn uses_markdown(&self) -> bool {
        self.use_markdown
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn render_pending(&self) -> bool {
        self.render_pending
    }

    /// Append text. Returns the delay after which a render tick should be
    /// delivered, or `None` when no new tick is needed.
    pub fn append(&mut self, text: &str, libs_ready: bool, now: Instant) -> Option<Duration> {
        if self.sealed {
            return None;
        }

        self.buffer.push_str(text);

        if !self.use_markdown {
            self.rendered = RenderedContent::Plain(self.buffer.clone());
            return None;
        }

        if !libs_ready {
            self.rendered = RenderedContent::Plain(self.buffer.clone());
        }

        self.schedule(now)
    }

    fn schedule(&mut self, now: Instant) -> Option<Duration> {
        if self.render_pending {
            return None;
        }
        self.render_pending = true;

        let delay = match self.last_render {
            Some(last) => (last + self.throttle).saturating_duration_since(now),
            None => Duration::ZERO,
        };
        Some(delay)
    }

    /// Ask for a render, e.g. once the libraries became available
    pub fn request_render(&mut self, now: Instant) -> Option<Duration> {
        if self.sealed || !self.use_markdown {
            return None;
        }
        self.schedule(now)
    }

    /// Run a deferred render. Returns a further delay if the throttle window
    /// has not elapsed yet.
    pub fn render_tick(&mut self, libs: Option<&MarkdownLibs>, now: Instant) -> Option<Duration> {
        self.render_pending = false;
        if self.sealed || !self.use_markdown {
            return None;
        }

        let Some(libs) = libs else {
            self.rendered = RenderedContent::Plain(self.buffer.clone());
            return None;
        };

        if let Some(last) = self.last_render {
            if now.duration_since(last) < self.throttle {
                return self.schedule(now);
            }
        }

        self.render_with(libs, now);
        None
    }

    /// Stop accepting text and perform the final, unthrottled render
    pub fn seal(&mut self, libs: Option<&MarkdownLibs>, now: Instant) {
        if self.sealed {
            return;
        }
        self.sealed = true;
        self.render_pending = false;

        if self.use_markdown {
            match libs {
                Some(libs) => self.render_with(libs, now),
                None => {
                    self.rendered = RenderedContent::Plain(self.buffer.clone());
                    self.late_render = true;
                }
            }
        }
    }

    /// Final render of a line that was sealed before the libraries arrived.
    /// Returns whether anything was rendered.
    pub fn render_late(&mut self, libs: &MarkdownLibs, now: Instant) -> bool {
        if !self.late_render {
            return false;
        }
        self.late_render = false;
        self.render_with(libs, now);
        true
    }

    fn render_with(&mut self, libs: &MarkdownLibs, now: Instant) {
        self.last_render = Some(now);
        self.rendered = match libs.render(&self.buffer) {
            Ok(html) => RenderedContent::Html(html),
            Err(e) => {
                tracing::debug!("Markdown render failed, showing plain text: {}", e);
                RenderedContent::Plain(self.buffer.clone())
            }
        };
    }
}
