use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui::icons::{CHECK, CROSS};

/// Spinner shown on stderr while a relay call is in flight.
///
/// indicatif hides it automatically when stderr is not a terminal, so
/// piped output stays clean.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl Into<String>) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style);
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn success(self, message: impl AsRef<str>) {
        self.bar
            .finish_with_message(format!("{}{}", CHECK, style(message.as_ref()).green()));
    }

    pub fn failure(self, message: impl AsRef<str>) {
        self.bar
            .finish_with_message(format!("{}{}", CROSS, style(message.as_ref()).red()));
    }

    /// Remove the spinner line without leaving a message.
    pub fn clear(self) {
        self.bar.finish_and_clear();
    }
}
