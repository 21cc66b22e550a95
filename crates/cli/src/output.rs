//! Output formatting utilities

use colored::Colorize;

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

/// Print a bold section heading with a ruler
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "=".repeat(50));
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: i64) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format a percentage with one decimal
pub fn format_pct(pct: f64) -> String {
    format!("{:.1}%", pct)
}

/// Color a pod or allocation phase based on value
pub fn color_phase(phase: &str) -> String {
    match phase.to_lowercase().as_str() {
        "active" | "running" | "applied" => phase.green().to_string(),
        "pending" | "provisioning" => phase.yellow().to_string(),
        "failed" | "error" => phase.red().to_string(),
        _ => phase.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_formats_cores_and_millicores() {
        assert_eq!(format_cpu(500), "500m");
        assert_eq!(format_cpu(1500), "1.5");
        assert_eq!(format_cpu(0), "0m");
    }
}
