//! Small display helpers for terminal rendering.

use chrono::{DateTime, Utc};

/// Format a timestamp for display, e.g. "Apr 29, 2023 at 9:00 AM"
pub fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format("%b %-d, %Y at %-I:%M %p").to_string()
}

/// Truncate text for one-line listings, char-safe
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// Up to two initials from a display name, e.g. "Ada Lovelace" -> "AL"
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(|c| c.to_uppercase())
        .collect()
}
