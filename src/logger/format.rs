//! Log formatting and console output with ANSI colors
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 9;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(&tag),
        format_level(level),
        message
    );

    print_stdout_safe(&line);
}

/// Format a tag with its subsystem color
fn format_tag(tag: &LogTag) -> ColoredString {
    let name = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => name.bright_yellow().bold(),
        LogTag::Modules => name.bright_magenta().bold(),
        LogTag::Upstream => name.bright_cyan().bold(),
        LogTag::Relay => name.bright_green().bold(),
        LogTag::Http => name.bright_blue().bold(),
        LogTag::Test => name.bright_white().bold(),
        LogTag::Other(_) => name.white().bold(),
    }
}

/// Format a level marker with appropriate color
fn format_level(level: &str) -> ColoredString {
    let padded = format!("{:<width$}", level, width = LEVEL_WIDTH);
    match level {
        "ERROR" => padded.bright_red().bold(),
        "WARN" => padded.yellow().bold(),
        "DEBUG" | "VERBOSE" => padded.dimmed(),
        _ => padded.white().bold(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = stdout().flush();
}
