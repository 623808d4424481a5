//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
#[allow(dead_code)]
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

/// Format confidence as percentage
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Format a latency in milliseconds
pub fn format_latency(latency_ms: u64) -> String {
    if latency_ms >= 1000 {
        format!("{:.2}s", latency_ms as f64 / 1000.0)
    } else {
        format!("{}ms", latency_ms)
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a validation verdict
pub fn color_verdict(verdict: &str) -> String {
    match verdict {
        "agree" => verdict.green().to_string(),
        "partially_agree" => verdict.yellow().to_string(),
        "uncertain" => verdict.blue().to_string(),
        "disagree" => verdict.red().to_string(),
        _ => verdict.to_string(),
    }
}

/// Color an anomaly severity
pub fn color_severity(severity: &str) -> String {
    match severity {
        "low" => severity.yellow().to_string(),
        "medium" => severity.truecolor(255, 165, 0).to_string(),
        "high" => severity.red().bold().to_string(),
        _ => severity.to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f32) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.87), "87%");
        assert_eq!(format_confidence(1.0), "100%");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(12), "12ms");
        assert_eq!(format_latency(1500), "1.50s");
    }
}
