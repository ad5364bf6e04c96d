/// Lifecycle of the welcome line shown above the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerState {
    Typing,
    Shown,
    Fading,
    Hidden,
}

/// Typewriter-style welcome message, dismissed by the first key press
#[derive(Debug, Clone)]
pub struct WelcomeBanner {
    text: String,
    typed: usize,
    state: BannerState,
}

impl WelcomeBanner {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let state = if text.is_empty() {
            BannerState::Shown
        } else {
            BannerState::Typing
        };
        Self {
            text,
            typed: 0,
            state,
        }
    }

    pub fn state(&self) -> BannerState {
        self.state
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }

    /// The part typed so far
    pub fn visible_text(&self) -> &str {
        match self.text.char_indices().nth(self.typed) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }

    /// Type one more character; returns whether more remain
    pub fn type_next(&mut self) -> bool {
        if self.state != BannerState::Typing {
            return false;
        }
        self.typed += 1;
        if self.typed >= self.text.chars().count() {
            self.state = BannerState::Shown;
            return false;
        }
        true
    }

    /// Start dismissing; returns false if already dismissed
    pub fn fade(&mut self) -> bool {
        match self.state {
            BannerState::Typing | BannerState::Shown => {
                self.state = BannerState::Fading;
                true
            }
            BannerState::Fading | BannerState::Hidden => false,
        }
    }

    pub fn hide(&mut self) {
        self.state = BannerState::Hidden;
    }

    pub fn is_visible(&self) -> bool {
        self.state != BannerState::Hidden
    }
}
