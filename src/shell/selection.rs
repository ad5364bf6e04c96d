//! Arrow-key picker over the latest posts

use crate::content::Post;
use crate::output::{BlockLine, LineClass};

/// Posts offered by the picker
pub const PICKER_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct PostPicker {
    posts: Vec<Post>,
    selected: usize,
}

impl PostPicker {
    /// `None` when there is nothing to pick from
    pub fn new(posts: &[Post]) -> Option<Self> {
        if posts.is_empty() {
            return None;
        }
        Some(Self {
            posts: posts.iter().take(PICKER_LIMIT).cloned().collect(),
            selected: 0,
        })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> &Post {
        // non-empty and clamped by construction
        &self.posts[self.selected]
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.posts.len() {
            self.selected += 1;
        }
    }

    /// The list as output lines, the selected entry marked
    pub fn block_lines(&self) -> Vec<BlockLine> {
        let mut lines = Vec::with_capacity(self.posts.len() * 4);
        for (index, post) in self.posts.iter().enumerate() {
            let selected = index == self.selected;
            let marker = if selected { "► " } else { "  " };
            let title = BlockLine::new(
                format!("{}{}. {}", marker, index + 1, post.title),
                if selected {
                    LineClass::Success
                } else {
                    LineClass::Plain
                },
            );
            lines.push(if selected { title.highlighted() } else { title });
            lines.push(BlockLine::new(format!("    Date: {}", post.date), LineClass::Info));
            lines.push(BlockLine::new(format!("    {}", post.summary), LineClass::Plain));
            lines.push(BlockLine::new("", LineClass::Plain));
        }
        lines
    }
}
