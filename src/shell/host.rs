//! The environment the shell is embedded in

/// Two-state color scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Background color as `#rrggbb`
    pub fn background(self) -> &'static str {
        match self {
            Theme::Dark => "#000000",
            Theme::Light => "#f8f9fa",
        }
    }

    /// Foreground color as `#rrggbb`
    pub fn foreground(self) -> &'static str {
        match self {
            Theme::Dark => "#00ff00",
            Theme::Light => "#212529",
        }
    }
}

/// Side effects outside the log and input line. Called from the event loop
/// only, never from background tasks.
pub trait Host {
    /// Leave for another page
    fn navigate(&mut self, url: &str);

    /// Start over with a fresh shell
    fn reload(&mut self);

    /// Replace everything with the halt screen
    fn halt(&mut self);

    fn apply_theme(&mut self, theme: Theme);
}
