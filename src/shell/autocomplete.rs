//! Tab completion of command names

use super::commands::COMPLETIONS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Exactly one command matches; it replaces the input
    Unique(&'static str),
    /// Several commands match; they are listed
    Candidates(Vec<&'static str>),
    NoMatch,
}

/// Prefix matcher over the known command vocabulary
#[derive(Debug, Clone)]
pub struct Autocomplete {
    commands: &'static [&'static str],
}

impl Default for Autocomplete {
    fn default() -> Self {
        Self::new()
    }
}

impl Autocomplete {
    pub fn new() -> Self {
        Self {
            commands: COMPLETIONS,
        }
    }

    pub fn commands(&self) -> &'static [&'static str] {
        self.commands
    }

    /// Complete the lower-cased input against every known command
    pub fn complete(&self, input: &str) -> Completion {
        let prefix = input.to_lowercase();
        let matches: Vec<&'static str> = self
            .commands
            .iter()
            .copied()
            .filter(|cmd| cmd.starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [] => Completion::NoMatch,
            [single] => Completion::Unique(single),
            _ => Completion::Candidates(matches),
        }
    }
}
