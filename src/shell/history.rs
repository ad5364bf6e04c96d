use std::collections::VecDeque;

/// Maximum number of remembered commands
pub const HISTORY_LIMIT: usize = 50;

/// Result of stepping through history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    /// Show this entry in the input
    Entry(String),
    /// Stepped past the newest entry; the input becomes empty
    Cleared,
    /// At a boundary, nothing changes
    Unchanged,
}

/// Submitted commands, most recent first
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<String>,
    /// `None` while not browsing
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Into<String>) {
        self.entries.push_front(command.into());
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Step to an older entry
    pub fn older(&mut self) -> Recall {
        let next = self.cursor.map_or(0, |c| c + 1);
        match self.entries.get(next) {
            Some(entry) => {
                self.cursor = Some(next);
                Recall::Entry(entry.clone())
            }
            None => Recall::Unchanged,
        }
    }

    /// Step to a newer entry, or leave browsing past the newest one
    pub fn newer(&mut self) -> Recall {
        match self.cursor {
            Some(0) => {
                self.cursor = None;
                Recall::Cleared
            }
            Some(c) => {
                self.cursor = Some(c - 1);
                self.entries
                    .get(c - 1)
                    .cloned()
                    .map_or(Recall::Unchanged, Recall::Entry)
            }
            None => Recall::Unchanged,
        }
    }
}
