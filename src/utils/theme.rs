use colored::Colorize;
use std::io::{self, IsTerminal};

/// Styles for the diagnostics the binary prints itself.
pub struct Theme {
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
        }
    }
}

impl Theme {
    /// The default theme, with colours switched off when stderr is not a
    /// terminal.
    pub fn new() -> Self {
        if !io::stderr().is_terminal() {
            colored::control::set_override(false);
        }
        Theme::default()
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        (self.error_style)(message.into())
    }

    pub fn warning(&self, message: impl Into<String>) -> String {
        (self.warning_style)(message.into())
    }
}
