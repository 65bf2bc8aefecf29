//! Status lines on stderr, one mark per kind.

use owo_colors::{AnsiColors, OwoColorize};

use super::colored;

#[derive(Debug, Clone, Copy)]
enum Status {
    Success,
    Info,
    Warning,
    Error,
}

impl Status {
    fn mark(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Info => "ℹ",
            Status::Warning => "⚠",
            Status::Error => "✗",
        }
    }

    fn color(self) -> AnsiColors {
        match self {
            Status::Success => AnsiColors::Green,
            Status::Info => AnsiColors::Blue,
            Status::Warning => AnsiColors::Yellow,
            Status::Error => AnsiColors::Red,
        }
    }

    /// Warnings and errors tint the message too.
    fn tints_message(self) -> bool {
        matches!(self, Status::Warning | Status::Error)
    }
}

fn line(status: Status, message: &str, colored: bool) -> String {
    if !colored {
        return format!("{} {message}", status.mark());
    }
    let mark = status.mark().color(status.color()).bold().to_string();
    if status.tints_message() {
        format!("{mark} {}", message.color(status.color()))
    } else {
        format!("{mark} {message}")
    }
}

pub fn success(message: &str) {
    eprintln!("{}", line(Status::Success, message, colored()));
}

pub fn info(message: &str) {
    eprintln!("{}", line(Status::Info, message, colored()));
}

pub fn warning(message: &str) {
    eprintln!("{}", line(Status::Warning, message, colored()));
}

pub fn error(message: &str) {
    eprintln!("{}", line(Status::Error, message, colored()));
}
