use colored::*;

use crate::agents::MessageRole;

/// Outcome marker for a diagnostic line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMark {
    Pass,
    Fail,
    Warn,
}

/// Console handles all terminal output with colored formatting
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
            assistant_color: Color::Green,
            tool_color: Color::Magenta,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(user_color: Color, assistant_color: Color, tool_color: Color) -> Self {
        Self {
            user_color,
            assistant_color,
            tool_color,
        }
    }

    /// Print a conversation message with the role upper-cased
    pub fn print_message(&self, role: MessageRole, text: &str) {
        let color = match role {
            MessageRole::User => self.user_color,
            MessageRole::Assistant => self.assistant_color,
        };
        println!(
            "{} {}",
            format!("{}:", role.as_str().to_uppercase()).color(color).bold(),
            text
        );
    }

    /// Print a line belonging to a run step
    pub fn print_step_line(&self, line: &str) {
        if line.starts_with("Step ") {
            println!("{}", line.color(self.tool_color).bold());
        } else {
            println!("{}", line);
        }
    }

    /// Print a newline
    pub fn println(&self) {
        println!();
    }

    /// Print a system message (progress, info, etc.)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    /// Print a diagnostic result line
    pub fn print_check(&self, mark: CheckMark, message: &str) {
        let marker = match mark {
            CheckMark::Pass => "✅".green(),
            CheckMark::Fail => "❌".red(),
            CheckMark::Warn => "⚠️".yellow(),
        };
        println!("{} {}", marker, message);
    }

    /// Print an indented detail line under a check
    pub fn print_detail(&self, label: &str, value: &str) {
        println!("   {}: {}", label.bright_black(), value);
    }

    /// Print a sub-section title, preceded by a blank line
    pub fn print_section(&self, title: &str) {
        println!();
        println!("{}", title.bold());
    }

    /// Print a plain line
    pub fn print_line(&self, line: &str) {
        println!("{}", line);
    }

    /// Print troubleshooting hints
    pub fn print_hints(&self, hints: &[&str]) {
        println!();
        println!("{}", "💡 Troubleshooting:".yellow().bold());
        for (i, hint) in hints.iter().enumerate() {
            println!("   {}. {}", i + 1, hint);
        }
    }

    /// Print a section header
    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", "=".repeat(70).bright_blue());
        println!("{}", title.bright_blue().bold());
        println!("{}", "=".repeat(70).bright_blue());
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(50).bright_black());
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
