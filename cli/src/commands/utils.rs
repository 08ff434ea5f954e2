//! Shared output formatting.

use colored::*;
use std::time::Duration;

/// Formats a duration as seconds with millisecond precision.
pub fn format_secs(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// Formats a real-time factor, or "n/a" when nothing was timed.
pub fn format_rtf(rtf: Option<f64>) -> String {
    match rtf {
        Some(rtf) if rtf >= 1.0 => format!("{:.2}x", rtf).green().to_string(),
        Some(rtf) => format!("{:.2}x", rtf).yellow().to_string(),
        None => "n/a".to_string(),
    }
}

/// Prints one `label: value` summary line.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<18} {}", format!("{}:", label).dimmed(), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(Duration::from_millis(1500)), "1.500s");
    }

    #[test]
    fn test_format_rtf_none() {
        assert_eq!(format_rtf(None), "n/a");
    }
}
