//! Canned output of the informational commands

use rand::Rng;

use crate::config::MissPolicy;
use crate::content::SiteContent;
use crate::output::{LineClass, OutputLog};

use super::commands::suggestions;

const MATRIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789@#$%^&*()";
const MATRIX_ROWS: usize = 20;
const MATRIX_COLUMNS: usize = 50;

const FALLBACK_SKILLS: &[&str] = &[
    "Linux System Configuration",
    "Shell Scripting (Bash)",
    "Infrastructure as Code (YAML)",
    "GitHub Actions Automation",
    "WSL Development",
];

pub const DEFAULT_WELCOME: &[&str] = &[
    "Welcome to Thomas Brugman's digital workspace...",
    "Linux enthusiast & hobby developer at your service...",
    "Type 'help' to explore my projects and skills...",
    "Ready to dive into the world of open source...",
];

fn emit(log: &mut OutputLog, lines: &[(&str, LineClass)]) {
    for (text, class) in lines {
        log.push(*text, *class);
    }
}

pub fn help(log: &mut OutputLog, policy: MissPolicy) {
    use LineClass::{Info, Plain, Success};

    emit(
        log,
        &[
            ("Available commands:", Info),
            ("", Plain),
            ("  help      - Show this help message", Success),
            ("  about     - Learn more about me", Success),
            ("  projects  - View my projects", Success),
            ("  skills    - List my technical skills", Success),
            ("  contact   - Get my contact information", Success),
            ("  blog      - Read my latest blog posts (interactive)", Success),
            ("  read <N>  - Read blog post number N (legacy)", Success),
            ("  clear     - Clear the terminal screen", Success),
            ("  theme     - Toggle light/dark theme", Success),
            ("  reboot    - Reload the website", Success),
            ("  shutdown  - Close the terminal", Success),
            ("", Plain),
            ("Unix-like commands:", Info),
            ("  whoami    - Display current user info", Success),
            ("  pwd       - Show current directory", Success),
            ("  ls        - List directory contents", Success),
            ("", Plain),
            ("Easter eggs:", Info),
            ("  matrix    - Enter the Matrix", Success),
            ("  sudo      - Try to gain root access", Success),
            ("", Plain),
            ("Tip: Use Tab for autocomplete and arrow keys for command history", Info),
            ("", Plain),
            ("AI integration:", Info),
            ("  ai <prompt> - Ask Terminus explicitly", Success),
            ("  setkey <API_KEY> - Add Terminus API key", Success),
            ("  clearkey - Remove stored API key", Success),
        ],
    );

    let note = match policy {
        MissPolicy::Assistant => "Note: Unrecognized commands are routed to Terminus automatically.",
        MissPolicy::Suggest => "Note: Unrecognized commands show suggestions for similar commands.",
    };
    log.push(note, Info);

    emit(
        log,
        &[
            ("", Plain),
            ("Markdown:", Info),
            (
                "  md on/off/toggle/status - Control Markdown rendering for AI responses",
                Success,
            ),
        ],
    );
}

pub fn about(log: &mut OutputLog) {
    use LineClass::{Info, Plain, Success};

    emit(
        log,
        &[
            ("About Thomas Brugman", Info),
            ("", Plain),
            ("Hi, I'm Thomas 👋", Success),
            ("", Plain),
            ("A Linux enthusiast and hobby developer from the Netherlands", Plain),
            ("with a passion for automation and open source. I have several", Plain),
            ("years of experience tinkering with Linux systems, configuring", Plain),
            ("servers, and developing small-scale applications.", Plain),
            ("", Plain),
            ("I specialize in Linux system configuration, shell scripting,", Plain),
            ("infrastructure as code, and GitHub Actions automation.", Plain),
            ("", Plain),
            ("Type \"projects\" to see my work or \"contact\" to get in touch!", Plain),
        ],
    );
}

pub fn projects(log: &mut OutputLog, content: &SiteContent) {
    log.push("My Projects", LineClass::Info);
    log.push("", LineClass::Plain);

    if let Some((featured, other)) = content.partition_projects() {
        if !featured.is_empty() {
            log.push("Featured Projects:", LineClass::Success);
            for (index, project) in featured.iter().enumerate() {
                log.push(format!("{}. {}", index + 1, project.name), LineClass::Success);
                log.push(format!("   {}", project.description), LineClass::Plain);
                log.push(
                    format!("   Tech: {}", project.technologies.join(", ")),
                    LineClass::Info,
                );
                log.push(format!("   Status: {}", project.status), LineClass::Info);
                log.push(format!("   URL: {}", project.url), LineClass::Info);
                log.push("", LineClass::Plain);
            }
        }

        if !other.is_empty() {
            log.push("Other Projects:", LineClass::Success);
            for (index, project) in other.iter().enumerate() {
                log.push(format!("{}. {}", index + 1, project.name), LineClass::Success);
                log.push(format!("   {}", project.description), LineClass::Plain);
                log.push(format!("   URL: {}", project.url), LineClass::Info);
                log.push("", LineClass::Plain);
            }
        }
    }

    log.push("Check out more projects on my GitHub:", LineClass::Info);
    log.push("https://github.com/Githubguy132010", LineClass::Info);
}

pub fn skills(log: &mut OutputLog, content: &SiteContent) {
    log.push("Technical Skills", LineClass::Info);
    log.push("", LineClass::Plain);

    match content.skills_by_category() {
        Some(groups) => {
            for (category, members) in groups {
                log.push(format!("{}:", category), LineClass::Success);
                for skill in members {
                    log.push(
                        format!("  • {} ({})", skill.name, skill.level),
                        LineClass::Success,
                    );
                    log.push(format!("    {}", skill.description), LineClass::Plain);
                }
                log.push("", LineClass::Plain);
            }
        }
        None => {
            for skill in FALLBACK_SKILLS {
                log.push(format!("• {}", skill), LineClass::Success);
            }
        }
    }

    log.push("Always learning and exploring new technologies!", LineClass::Info);
}

pub fn contact(log: &mut OutputLog) {
    use LineClass::{Info, Plain, Success};

    emit(
        log,
        &[
            ("Contact Information", Info),
            ("", Plain),
            ("📧 Email: thomas.brugman.teb3@gmail.com", Success),
            ("🐙 GitHub: https://github.com/Githubguy132010", Success),
            ("", Plain),
            ("Feel free to reach out for:", Info),
            ("• Linux configurations", Success),
            ("• Open source collaboration", Success),
            ("• Automation projects", Success),
            ("• Development tools", Success),
        ],
    );
}

pub fn whoami(log: &mut OutputLog) {
    use LineClass::{Info, Success};

    emit(
        log,
        &[
            ("thomas", Success),
            ("Full name: Thomas Brugman", Info),
            ("Role: Linux Enthusiast & Hobby Developer", Info),
            ("Location: Netherlands", Info),
            (
                "Superpower: Making computers do exactly what I want (most of the time)",
                Success,
            ),
        ],
    );
}

pub fn ls(log: &mut OutputLog) {
    use LineClass::{Error, Info, Plain, Success};

    emit(
        log,
        &[
            ("total 42", Info),
            ("drwxr-xr-x  about/", Success),
            ("drwxr-xr-x  projects/", Success),
            ("drwxr-xr-x  blog/", Success),
            ("drwxr-xr-x  skills/", Success),
            ("-rw-r--r--  contact.txt", Success),
            ("-rw-r--r--  .secrets", Error),
            ("", Plain),
            (
                "Tip: Use specific commands like \"about\", \"projects\" to explore these directories!",
                Info,
            ),
        ],
    );
}

pub fn pwd(log: &mut OutputLog) {
    log.push("/home/thomas/website", LineClass::Success);
}

/// Random characters, one string with a row per line
pub fn matrix_grid<R: Rng>(rng: &mut R) -> String {
    (0..MATRIX_ROWS)
        .map(|_| {
            (0..MATRIX_COLUMNS)
                .map(|_| MATRIX_ALPHABET[rng.gen_range(0..MATRIX_ALPHABET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn matrix(log: &mut OutputLog) {
    log.push("Initiating Matrix mode...", LineClass::Success);
    log.push(matrix_grid(&mut rand::thread_rng()), LineClass::Success);
    log.push("Welcome to the Matrix, Neo...", LineClass::Success);
}

pub fn sudo_denied(log: &mut OutputLog) {
    log.push(
        "thomas is not in the sudoers file. This incident will be reported.",
        LineClass::Error,
    );
}

pub fn sudo_retraction(log: &mut OutputLog) {
    log.push("Just kidding! 😄", LineClass::Success);
    log.push("With great power comes great responsibility!", LineClass::Info);
}

/// Error plus "did you mean" hint for an unmatched command
pub fn not_found(log: &mut OutputLog, command: &str) {
    log.push(
        format!(
            "Command not found: {}. Type 'help' for available commands.",
            command
        ),
        LineClass::Error,
    );

    let similar = suggestions(command);
    if !similar.is_empty() {
        log.push(
            format!("Did you mean: {}?", similar.join(", ")),
            LineClass::Info,
        );
    }
}
