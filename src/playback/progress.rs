//! Playback progress and time labels

/// Position within the current track.
///
/// The seek-bar fraction and the elapsed label are both derived from this one
/// value, so they cannot disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub elapsed_ms: u64,
    pub duration_ms: u64,
}

impl Progress {
    pub fn new(elapsed_ms: u64, duration_ms: u64) -> Self {
        Self {
            elapsed_ms: elapsed_ms.min(duration_ms),
            duration_ms,
        }
    }

    /// Progress at a seek-bar fraction of the track
    pub fn from_fraction(fraction: f64, duration_ms: u64) -> Self {
        Self::new(position_for_fraction(fraction, duration_ms), duration_ms)
    }

    /// Normalized progress in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            self.elapsed_ms as f64 / self.duration_ms as f64
        }
    }

    pub fn elapsed_label(&self) -> String {
        format_millis(self.elapsed_ms)
    }

    pub fn duration_label(&self) -> String {
        format_millis(self.duration_ms)
    }
}

/// Decoder position for a seek-bar fraction: `round(fraction * duration)`
pub fn position_for_fraction(fraction: f64, duration_ms: u64) -> u64 {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    (fraction * duration_ms as f64).round() as u64
}

/// Format milliseconds as `m:ss`
pub fn format_millis(millis: u64) -> String {
    let total_secs = millis / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Parse an `m:ss` label back into milliseconds
pub fn parse_duration_label(label: &str) -> Option<u64> {
    let (minutes, seconds) = label.trim().split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    Some((minutes * 60 + seconds) * 1000)
}
