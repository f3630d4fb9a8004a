use std::time::Duration;

/// Format `ms` milliseconds as `h:mm`, or `h:mm:ss` with `show_seconds`.
///
/// Hours are not padded and not wrapped.
pub fn format_time(ms: u64, show_seconds: bool) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    if show_seconds {
        let seconds = (ms / 1000) % 60;
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours}:{minutes:02}")
    }
}

/// [`format_time`] for a [`Duration`].
pub fn format_elapsed(elapsed: Duration, show_seconds: bool) -> String {
    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    format_time(ms, show_seconds)
}
