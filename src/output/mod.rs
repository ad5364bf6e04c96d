//! The scrollable output log
//!
//! Lines are appended at the bottom and never edited, except streaming lines
//! (which grow until sealed) and the one replaceable block used for the
//! post picker.

use tokio::time::Instant;

pub mod markdown;
pub mod stream;

pub use markdown::{
    AllowlistSanitizer, BundledMarkdown, CmarkConverter, HtmlSanitizer, LibraryState,
    MarkdownConverter, MarkdownError, MarkdownLibrary, MarkdownLibs, MarkdownLoader,
};
pub use stream::{RenderedContent, StreamingLine};

pub type LineId = u64;

/// Semantic class of a line; hosts map it to a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineClass {
    #[default]
    Plain,
    Info,
    Success,
    Error,
    Command,
}

/// Identifies a group of lines that is re-rendered as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    PostList,
}

#[derive(Debug, Clone)]
pub enum LineBody {
    Text(String),
    Stream(StreamingLine),
}

#[derive(Debug, Clone)]
pub struct OutputLine {
    pub id: LineId,
    pub class: LineClass,
    pub body: LineBody,
    pub tag: Option<BlockTag>,
    /// Drawn with a highlight (the selected post)
    pub highlighted: bool,
    /// Used by hosts to fade new lines in
    pub appeared_at: Instant,
}

impl OutputLine {
    /// What the line shows when no markup is interpreted
    pub fn plain_text(&self) -> String {
        match &self.body {
            LineBody::Text(text) => text.clone(),
            LineBody::Stream(stream) => format!("{}{}", stream.prefix(), stream.buffer()),
        }
    }

    pub fn stream(&self) -> Option<&StreamingLine> {
        match &self.body {
            LineBody::Stream(stream) => Some(stream),
            LineBody::Text(_) => None,
        }
    }
}

/// One line of a replaceable block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLine {
    pub text: String,
    pub class: LineClass,
    pub highlighted: bool,
}

impl BlockLine {
    pub fn new(text: impl Into<String>, class: LineClass) -> Self {
        Self {
            text: text.into(),
            class,
            highlighted: false,
        }
    }

    pub fn highlighted(mut self) -> Self {
        self.highlighted = true;
        self
    }
}

#[derive(Debug, Default)]
pub struct OutputLog {
    lines: Vec<OutputLine>,
    next_id: LineId,
    /// Lines scrolled back from the bottom; 0 follows the newest line
    scroll_offset: usize,
    dirty: bool,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn allocate_id(&mut self) -> LineId {
        self.next_id += 1;
        self.next_id
    }

    fn push_body(
        &mut self,
        body: LineBody,
        class: LineClass,
        tag: Option<BlockTag>,
        highlighted: bool,
    ) -> LineId {
        let id = self.allocate_id();
        self.lines.push(OutputLine {
            id,
            class,
            body,
            tag,
            highlighted,
            appeared_at: Instant::now(),
        });
        self.scroll_to_bottom();
        id
    }

    pub fn push(&mut self, text: impl Into<String>, class: LineClass) -> LineId {
        self.push_body(LineBody::Text(text.into()), class, None, false)
    }

    pub fn push_stream(&mut self, stream: StreamingLine) -> LineId {
        self.push_body(LineBody::Stream(stream), LineClass::Plain, None, false)
    }

    pub fn get(&self, id: LineId) -> Option<&OutputLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    pub fn stream_mut(&mut self, id: LineId) -> Option<&mut StreamingLine> {
        self.dirty = true;
        self.lines
            .iter_mut()
            .find(|line| line.id == id)
            .and_then(|line| match &mut line.body {
                LineBody::Stream(stream) => Some(stream),
                LineBody::Text(_) => None,
            })
    }

    /// Ids of every streaming line, sealed or not
    pub fn stream_ids(&self) -> Vec<LineId> {
        self.lines
            .iter()
            .filter(|line| line.stream().is_some())
            .map(|line| line.id)
            .collect()
    }

    /// Remove the tagged block and append `lines` in its place at the bottom
    pub fn replace_block(&mut self, tag: BlockTag, lines: Vec<BlockLine>) {
        self.remove_block(tag);
        for line in lines {
            self.push_body(LineBody::Text(line.text), line.class, Some(tag), line.highlighted);
        }
    }

    pub fn remove_block(&mut self, tag: BlockTag) {
        let before = self.lines.len();
        self.lines.retain(|line| line.tag != Some(tag));
        if self.lines.len() != before {
            self.dirty = true;
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll_offset = 0;
        self.dirty = true;
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Scroll back, never past the oldest line
    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(amount)
            .min(self.lines.len());
        self.dirty = true;
    }

    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
        self.dirty = true;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether anything changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Plain text of every line, oldest first
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(OutputLine::plain_text).collect()
    }
}
