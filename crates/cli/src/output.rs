//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format hours as a human-readable duration
pub fn format_hours(hours: f64) -> String {
    const DAY: f64 = 24.0;
    const YEAR: f64 = 365.0 * DAY;

    if hours >= YEAR {
        format!("{:.0} h (~{:.1} years)", hours, hours / YEAR)
    } else if hours >= DAY {
        format!("{:.0} h (~{:.0} days)", hours, hours / DAY)
    } else {
        format!("{:.1} h", hours)
    }
}

/// Format a score in [0, 1] as a percentage
pub fn format_score(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Color a stability score by band
pub fn color_score(score: f64) -> String {
    let formatted = format_score(score);
    if score >= 0.7 {
        formatted.green().to_string()
    } else if score >= 0.4 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" | "not_loaded" => status.yellow().to_string(),
        "unhealthy" | "unavailable" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(12.34), "12.3 h");
        assert_eq!(format_hours(480.0), "480 h (~20 days)");
        assert_eq!(format_hours(17520.0), "17520 h (~2.0 years)");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.8766), "87.7%");
        assert_eq!(format_score(0.0), "0.0%");
    }
}
