//! Display helpers.

/// Formats seconds as zero-padded `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// A fixed-width text progress bar, e.g. `[#####-----]`.
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pads_and_keeps_long_minutes() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(125 * 60 + 9), "125:09");
    }

    #[test]
    fn bar_is_clamped() {
        assert_eq!(progress_bar(0.5, 4), "[##--]");
        assert_eq!(progress_bar(2.0, 3), "[###]");
        assert_eq!(progress_bar(f64::NAN, 2), "[--]");
    }
}
