//! Terminal presentation of progress snapshots.

use std::time::Duration;

use indicatif::style::TemplateError;
use indicatif::ProgressStyle;
use qaagent_core::{Phase, ProgressSnapshot};

/// Percentage from which the bar reassures the user that work continues.
pub const SLOW_HINT_THRESHOLD: f64 = 82.0;

const DEFAULT_LABEL: &str = "Processing...";
const SLOW_HINT: &str = "Almost there... Complex analysis in progress";

/// Format a duration as `m:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Style for a bar of length 100 whose position is the percentage.
pub fn bar_style() -> Result<ProgressStyle, TemplateError> {
    Ok(ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")?.progress_chars("#>-"))
}

/// Message shown left of the bar.
pub fn status_message(snapshot: &ProgressSnapshot) -> String {
    let label = snapshot.label.as_deref().unwrap_or(DEFAULT_LABEL);
    let status = match snapshot.phase {
        Phase::Running => format_elapsed(snapshot.elapsed),
        phase => phase.to_string(),
    };

    if (SLOW_HINT_THRESHOLD..100.0).contains(&snapshot.percentage) {
        format!("{} ({}) {}", label, status, SLOW_HINT)
    } else {
        format!("{} ({})", label, status)
    }
}
