//! Time formatting helpers.

use std::time::Duration;

/// Format a duration in seconds to a human-readable string.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Format a sub-minute duration with millisecond precision, falling back to
/// [`format_duration`] for anything longer.
pub fn format_millis(duration: Duration) -> String {
    if duration.as_secs() >= 60 {
        format_duration(duration.as_secs())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
