//! Markdown-to-HTML conversion and HTML sanitization for assistant replies
//!
//! Both steps sit behind traits so the shell can treat them as a capability
//! that is loaded once, in the background, and may never become available.
//! The bundled implementation uses pulldown-cmark for conversion and an
//! allow-list sanitizer for the resulting HTML.

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MarkdownError {
    #[error("markdown libraries unavailable: {0}")]
    Unavailable(String),

    #[error("markdown conversion failed: {0}")]
    Render(String),

    #[error("html sanitization failed: {0}")]
    Sanitize(String),
}

pub trait MarkdownConverter: Send + Sync {
    fn to_html(&self, markdown: &str) -> Result<String, MarkdownError>;
}

pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> Result<String, MarkdownError>;
}

/// The pair of libraries a Markdown line needs
#[derive(Clone)]
pub struct MarkdownLibs {
    converter: Arc<dyn MarkdownConverter>,
    sanitizer: Arc<dyn HtmlSanitizer>,
}

impl MarkdownLibs {
    pub fn new(converter: Arc<dyn MarkdownConverter>, sanitizer: Arc<dyn HtmlSanitizer>) -> Self {
        Self {
            converter,
            sanitizer,
        }
    }

    pub fn bundled() -> Self {
        Self::new(Arc::new(CmarkConverter), Arc::new(AllowlistSanitizer))
    }

    /// Convert then sanitize; any error is reported, never panics
    pub fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        let raw = self.converter.to_html(markdown)?;
        self.sanitizer.sanitize(&raw)
    }
}

impl std::fmt::Debug for MarkdownLibs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownLibs").finish_non_exhaustive()
    }
}

/// Resolves the libraries; called at most once per process
#[async_trait]
pub trait MarkdownLoader: Send + Sync {
    async fn load(&self) -> Result<MarkdownLibs, MarkdownError>;
}

/// Loader for the libraries compiled into the binary
pub struct BundledMarkdown;

#[async_trait]
impl MarkdownLoader for BundledMarkdown {
    async fn load(&self) -> Result<MarkdownLibs, MarkdownError> {
        Ok(MarkdownLibs::bundled())
    }
}

#[derive(Debug, Clone)]
pub enum LibraryState {
    NotLoaded,
    Loading,
    Ready(MarkdownLibs),
    Failed,
}

/// Load-once bookkeeping shared by every streaming line
pub struct MarkdownLibrary {
    loader: Arc<dyn MarkdownLoader>,
    state: LibraryState,
}

impl MarkdownLibrary {
    pub fn new(loader: Arc<dyn MarkdownLoader>) -> Self {
        Self {
            loader,
            state: LibraryState::NotLoaded,
        }
    }

    pub fn state(&self) -> &LibraryState {
        &self.state
    }

    pub fn ready(&self) -> Option<&MarkdownLibs> {
        match &self.state {
            LibraryState::Ready(libs) => Some(libs),
            _ => None,
        }
    }

    /// Hand out the loader exactly once; the caller runs it in the background
    pub fn begin_load(&mut self) -> Option<Arc<dyn MarkdownLoader>> {
        match self.state {
            LibraryState::NotLoaded => {
                self.state = LibraryState::Loading;
                Some(self.loader.clone())
            }
            _ => None,
        }
    }

    pub fn finish_load(&mut self, result: Result<MarkdownLibs, MarkdownError>) {
        self.state = match result {
            Ok(libs) => LibraryState::Ready(libs),
            Err(e) => {
                tracing::warn!("Markdown libraries failed to load, staying with plain text: {}", e);
                LibraryState::Failed
            }
        };
    }
}

/// CommonMark plus tables, strikethrough and task lists
pub struct CmarkConverter;

impl MarkdownConverter for CmarkConverter {
    fn to_html(&self, markdown: &str) -> Result<String, MarkdownError> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

/// Elements removed together with everything inside them
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "title",
];

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "em", "strong", "del", "s", "code", "pre", "blockquote", "ul", "ol", "li",
    "a", "h1", "h2", "h3", "h4", "h5", "h6", "table", "thead", "tbody", "tr", "th", "td", "input",
    "span", "div", "sup", "sub",
];

static STRIPPED_PATTERNS: LazyLock<Vec<(Regex, Regex)>> = LazyLock::new(|| {
    STRIPPED_ELEMENTS
        .iter()
        .filter_map(|tag| {
            let closed = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok()?;
            let unclosed = Regex::new(&format!(r"(?is)<{tag}\b.*$")).ok()?;
            Some((closed, unclosed))
        })
        .collect()
});

static COMMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?(-->|$)").ok());

static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").ok());

static ATTRIBUTE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z][a-z0-9-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+)))?"#).ok()
});

static LANGUAGE_CLASS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^language-[A-Za-z0-9_+#-]+$").ok());

/// Keeps a fixed set of formatting tags and a handful of attributes.
///
/// Script-like elements disappear with their content, every other unknown tag
/// is dropped while its text stays, and text outside tags is re-escaped.
pub struct AllowlistSanitizer;

impl HtmlSanitizer for AllowlistSanitizer {
    fn sanitize(&self, html: &str) -> Result<String, MarkdownError> {
        let (Some(comment), Some(tag_re)) = (COMMENT.as_ref(), TAG.as_ref()) else {
            return Err(MarkdownError::Sanitize("sanitizer patterns failed to compile".into()));
        };
        if STRIPPED_PATTERNS.len() != STRIPPED_ELEMENTS.len() {
            return Err(MarkdownError::Sanitize("sanitizer patterns failed to compile".into()));
        }

        let mut cleaned = comment.replace_all(html, "").into_owned();
        for (closed, unclosed) in STRIPPED_PATTERNS.iter() {
            cleaned = closed.replace_all(&cleaned, "").into_owned();
            cleaned = unclosed.replace_all(&cleaned, "").into_owned();
        }

        let mut out = String::with_capacity(cleaned.len());
        let mut last = 0;
        for caps in tag_re.captures_iter(&cleaned) {
            let Some(whole) = caps.get(0) else { continue };
            escape_text(&cleaned[last..whole.start()], &mut out);
            last = whole.end();

            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();
            if !ALLOWED_TAGS.contains(&name.as_str()) {
                continue;
            }

            if closing {
                out.push_str(&format!("</{}>", name));
                continue;
            }

            let raw_attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            let self_closing = raw_attrs.trim_end().ends_with('/');
            out.push('<');
            out.push_str(&name);
            for (attr, value) in allowed_attributes(&name, raw_attrs) {
                match value {
                    Some(value) => out.push_str(&format!(" {}=\"{}\"", attr, value)),
                    None => out.push_str(&format!(" {}", attr)),
                }
            }
            if self_closing {
                out.push_str(" /");
            }
            out.push('>');
        }
        escape_text(&cleaned[last..], &mut out);

        Ok(out)
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn allowed_attributes(tag: &str, raw: &str) -> Vec<(String, Option<String>)> {
    let Some(attr_re) = ATTRIBUTE.as_ref() else {
        return Vec::new();
    };

    let mut kept = Vec::new();
    for caps in attr_re.captures_iter(raw) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().replace('"', "&quot;"));

        let keep = match (tag, name.as_str()) {
            ("a", "href") => value.as_deref().is_some_and(is_safe_url),
            ("code", "class") => value
                .as_deref()
                .zip(LANGUAGE_CLASS.as_ref())
                .is_some_and(|(v, re)| re.is_match(v)),
            ("input", "type") => value.as_deref() == Some("checkbox"),
            ("input", "checked") | ("input", "disabled") => true,
            _ => false,
        };

        if keep {
            kept.push((name, value));
        }
    }
    kept
}

/// http(s), mailto, or a relative reference
fn is_safe_url(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.chars().any(|c| c.is_control()) {
        return false;
    }

    // an entity ahead of the scheme separator could decode to ':'
    let head_end = trimmed.find([':', '/', '?', '#']).unwrap_or(trimmed.len());
    if trimmed[..head_end].contains('&') {
        return false;
    }

    let scheme_end = trimmed.find(':');
    let path_start = trimmed.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => {
            let scheme = trimmed[..colon].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
        (None, _) => true,
    }
}
