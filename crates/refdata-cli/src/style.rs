use std::env;

use color_eyre::owo_colors::OwoColorize;
use refdata_core::CommandStatus;

/// Colours for human output. Everything is plain text when colour is off,
/// so callers never branch on it.
pub struct Style {
    color: bool,
}

impl Style {
    /// Colour needs a terminal, no `--no-color` and no `NO_COLOR`.
    pub fn new(no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            color: is_tty && !no_color && !env_no_color,
        }
    }

    pub fn status(&self, status: CommandStatus, text: &str) -> String {
        let (mark, tone) = match status {
            CommandStatus::Ok => ("✔", Tone::Good),
            CommandStatus::UserError => ("✗", Tone::Warn),
            CommandStatus::Failure => ("✖", Tone::Bad),
        };
        self.paint(tone, &format!("{mark} {text}"), true)
    }

    pub fn hint(&self, text: &str) -> String {
        self.paint(Tone::Note, &format!("Tip: {text}"), false)
    }

    pub fn error_header(&self, text: &str) -> String {
        self.paint(Tone::Bad, text, true)
    }

    pub fn fix_bullet(&self, text: &str) -> String {
        self.paint(Tone::Good, &format!("  • {text}"), false)
    }

    pub fn table_header(&self, text: &str) -> String {
        if self.color {
            text.bold().underline().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint(&self, tone: Tone, text: &str, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let colored = match tone {
            Tone::Good => text.green().to_string(),
            Tone::Warn => text.yellow().to_string(),
            Tone::Bad => text.red().to_string(),
            Tone::Note => text.cyan().to_string(),
        };
        if bold {
            colored.bold().to_string()
        } else {
            colored
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Bad,
    Note,
}
