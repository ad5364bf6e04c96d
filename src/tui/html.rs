//! Sanitized HTML to styled terminal lines
//!
//! Only understands the small tag set the sanitizer lets through. Unknown
//! tags are ignored and their text is kept.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use regex::Regex;
use std::sync::LazyLock;

const HEADING: Color = Color::Rgb(80, 200, 220);
const CODE: Color = Color::Rgb(220, 200, 100);
const LINK: Color = Color::Rgb(100, 140, 200);
const RULE: Color = Color::Rgb(100, 100, 110);

static TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").ok());

static WHITESPACE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Convert HTML to lines drawn on top of `base`
pub fn html_to_lines(html: &str, base: Style) -> Vec<Line<'static>> {
    let Some(tag_re) = TAG.as_ref() else {
        return html.lines().map(|l| Line::styled(l.to_string(), base)).collect();
    };

    let mut renderer = HtmlRenderer::new(base);
    let mut last = 0;
    for caps in tag_re.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        renderer.text(&decode_entities(&html[last..whole.start()]));
        last = whole.end();

        let closing = !caps[1].is_empty();
        let name = caps[2].to_ascii_lowercase();
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or("");
        if closing {
            renderer.close(&name);
        } else {
            renderer.open(&name, attrs);
        }
    }
    renderer.text(&decode_entities(&html[last..]));
    renderer.finish()
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

enum ListKind {
    Bullet,
    Ordered(u64),
}

struct HtmlRenderer {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListKind>,
    pending_marker: Option<String>,
    quote_depth: usize,
    in_pre: bool,
    cell_index: usize,
}

impl HtmlRenderer {
    fn new(base: Style) -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![base],
            lists: Vec::new(),
            pending_marker: None,
            quote_depth: 0,
            in_pre: false,
            cell_index: 0,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(style);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn blank(&mut self) {
        self.flush();
        let last_blank = self.lines.last().map_or(true, |l| l.spans.is_empty());
        if !last_blank {
            self.lines.push(Line::default());
        }
    }

    fn start_line(&mut self) {
        if !self.current.is_empty() {
            return;
        }
        if self.quote_depth > 0 {
            self.current.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(RULE),
            ));
        }
        if let Some(marker) = self.pending_marker.take() {
            self.current.push(Span::styled(marker, self.styles[0]));
        }
    }

    fn emit(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.start_line();
        let style = self.style();
        self.current.push(Span::styled(text, style));
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }

        if self.in_pre {
            let mut parts = raw.split('\n').peekable();
            while let Some(part) = parts.next() {
                self.emit(part.to_string());
                if parts.peek().is_some() {
                    // keep empty code lines
                    if self.current.is_empty() {
                        self.lines.push(Line::default());
                    }
                    self.flush();
                }
            }
            return;
        }

        let collapsed = match WHITESPACE.as_ref() {
            Some(ws) => ws.replace_all(raw, " ").into_owned(),
            None => raw.to_string(),
        };
        let text = if self.current.is_empty() {
            collapsed.trim_start().to_string()
        } else {
            collapsed
        };
        self.emit(text);
    }

    fn open(&mut self, tag: &str, attrs: &str) {
        let style = self.style();
        match tag {
            "p" | "div" => self.flush(),
            "br" => {
                self.start_line();
                if self.current.is_empty() {
                    self.lines.push(Line::default());
                }
                self.flush();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.blank();
                self.push_style(style.fg(HEADING).add_modifier(Modifier::BOLD));
            }
            "strong" | "b" => self.push_style(style.add_modifier(Modifier::BOLD)),
            "em" | "i" => self.push_style(style.add_modifier(Modifier::ITALIC)),
            "del" | "s" => self.push_style(style.add_modifier(Modifier::CROSSED_OUT)),
            "code" => self.push_style(style.fg(CODE)),
            "a" => self.push_style(style.fg(LINK).add_modifier(Modifier::UNDERLINED)),
            "pre" => {
                self.blank();
                self.in_pre = true;
            }
            "blockquote" => {
                self.flush();
                self.quote_depth += 1;
            }
            "ul" => {
                self.flush();
                self.lists.push(ListKind::Bullet);
            }
            "ol" => {
                self.flush();
                self.lists.push(ListKind::Ordered(1));
            }
            "li" => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.pending_marker = Some(marker);
            }
            "input" => {
                let mark = if attrs.contains("checked") { "[x] " } else { "[ ] " };
                self.emit(mark.to_string());
            }
            "hr" => {
                self.blank();
                self.lines.push(Line::styled("─".repeat(24), Style::default().fg(RULE)));
            }
            "table" => self.blank(),
            "tr" => {
                self.flush();
                self.cell_index = 0;
            }
            "th" | "td" => {
                if self.cell_index > 0 {
                    self.start_line();
                    self.current
                        .push(Span::styled(" │ ", Style::default().fg(RULE)));
                }
                self.cell_index += 1;
                if tag == "th" {
                    self.push_style(style.add_modifier(Modifier::BOLD));
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: &str) {
        match tag {
            "p" => self.blank(),
            "div" | "li" | "tr" => self.flush(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.pop_style();
                self.blank();
            }
            "strong" | "b" | "em" | "i" | "del" | "s" | "code" | "a" | "th" => self.pop_style(),
            "pre" => {
                self.in_pre = false;
                self.blank();
            }
            "blockquote" => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank();
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            "table" => self.blank(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
