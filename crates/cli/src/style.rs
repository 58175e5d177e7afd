//! Shared styling utilities for the CLI.

use console::Style;

use projvault_core::merge::{ChangeSource, ConflictType};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Marker for the active version or branch.
pub fn current_marker(is_current: bool) -> String {
    if is_current {
        Style::new().green().bold().apply_to("●").to_string()
    } else {
        String::new()
    }
}

/// Label for the side a merge change came from.
pub fn source_label(source: ChangeSource) -> String {
    let style = match source {
        ChangeSource::Current => Style::new().blue(),
        ChangeSource::Target => Style::new().magenta(),
        ChangeSource::Both => Style::new().green(),
    };
    style.apply_to(source.to_string()).to_string()
}

/// Label for a conflict category.
pub fn conflict_label(kind: ConflictType) -> String {
    let style = match kind {
        ConflictType::Type => Style::new().red().bold(),
        _ => Style::new().red(),
    };
    style.apply_to(kind.to_string()).to_string()
}

/// Render a confidence in [0, 1] as a percentage, coloured by strength.
pub fn confidence(value: f64) -> String {
    let style = if value >= 0.8 {
        Style::new().green()
    } else if value >= 0.5 {
        Style::new().yellow()
    } else {
        Style::new().red()
    };
    style.apply_to(format!("{:.0}%", value * 100.0)).to_string()
}
