//! Parsing of one submitted line into a command

/// Every command offered by Tab completion, in display order
pub const COMPLETIONS: &[&str] = &[
    "help", "about", "projects", "skills", "contact", "blog", "read", "clear", "theme", "reboot",
    "shutdown", "whoami", "pwd", "ls", "sudo", "matrix", "md", "setkey", "clearkey", "ai",
];

/// Base commands considered for "did you mean" hints
pub const SUGGESTIBLE: &[&str] = &[
    "help", "about", "projects", "skills", "contact", "blog", "read", "clear", "theme", "reboot",
    "shutdown", "whoami", "pwd", "ls", "sudo", "matrix",
];

/// Largest edit distance that still produces a suggestion
pub const SUGGESTION_DISTANCE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownAction {
    Status,
    On,
    Off,
    Toggle,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `read <N>`, argument kept verbatim
    Read(String),
    Markdown(MarkdownAction),
    /// `setkey <token>`; the token may be empty
    SetKey(String),
    ClearKey,
    /// `ai <prompt>`; the prompt may be empty
    Ask(String),
    Help,
    About,
    Projects,
    Skills,
    Contact,
    Blog,
    Clear,
    Theme,
    Reboot,
    Shutdown,
    Matrix,
    Sudo,
    Whoami,
    Ls,
    Pwd,
    /// No match; `full` keeps the original casing
    Unknown { command: String, full: String },
}

pub struct CommandParser;

impl CommandParser {
    /// Parse a submitted line. Prefix commands are checked before exact
    /// names, and their arguments are taken from the original-case text.
    pub fn parse(input: &str) -> Command {
        let full = input.trim();
        let command = full.to_lowercase();

        if command.starts_with("read ") {
            let arg = command.split(' ').nth(1).unwrap_or_default();
            return Command::Read(arg.to_string());
        }

        if command == "md" || command.starts_with("md ") {
            let arg = tail(full, 2).to_lowercase();
            let action = match arg.as_str() {
                "" | "status" => MarkdownAction::Status,
                "on" => MarkdownAction::On,
                "off" => MarkdownAction::Off,
                "toggle" => MarkdownAction::Toggle,
                _ => MarkdownAction::Invalid(arg),
            };
            return Command::Markdown(action);
        }

        if command == "setkey" || command.starts_with("setkey ") {
            return Command::SetKey(tail(full, 6).to_string());
        }

        if command == "clearkey" {
            return Command::ClearKey;
        }

        if command == "ai" || command.starts_with("ai ") {
            return Command::Ask(tail(full, 2).to_string());
        }

        match command.as_str() {
            "help" => Command::Help,
            "about" => Command::About,
            "projects" => Command::Projects,
            "skills" => Command::Skills,
            "contact" => Command::Contact,
            "blog" | "posts" => Command::Blog,
            "clear" => Command::Clear,
            "theme" => Command::Theme,
            "reboot" => Command::Reboot,
            "shutdown" => Command::Shutdown,
            "matrix" | "easter" => Command::Matrix,
            "sudo" => Command::Sudo,
            "whoami" => Command::Whoami,
            "ls" => Command::Ls,
            "pwd" => Command::Pwd,
            _ => Command::Unknown {
                command,
                full: full.to_string(),
            },
        }
    }
}

/// Trimmed text after the first `skip` bytes of an ASCII command word
fn tail(full: &str, skip: usize) -> &str {
    full.get(skip..).unwrap_or_default().trim()
}

/// Leading integer of `s`, accepting surrounding noise the way a lenient
/// number parser does (`"2abc"` is 2, `"abc"` is nothing)
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}

/// Base commands within the suggestion distance of `command`
pub fn suggestions(command: &str) -> Vec<&'static str> {
    SUGGESTIBLE
        .iter()
        .copied()
        .filter(|candidate| levenshtein(command, candidate) <= SUGGESTION_DISTANCE)
        .collect()
}
