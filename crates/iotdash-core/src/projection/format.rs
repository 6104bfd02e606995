//! Human-readable formatting helpers shared by the view-models.

use bytesize::ByteSize;

/// Binary-unit byte count, e.g. "1.5 GiB".
pub fn fmt_bytes(bytes: u64) -> String {
    ByteSize(bytes).to_string_as(true)
}

/// One decimal place with a percent sign.
pub fn fmt_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}

/// Clock speed reported in MHz, shown in GHz above 1000.
pub fn fmt_frequency(mhz: f64) -> String {
    if mhz >= 1000.0 {
        format!("{:.2} GHz", mhz / 1000.0)
    } else {
        format!("{mhz:.0} MHz")
    }
}

/// Render a percentage bar split into filled and empty portions.
///
/// Returns `(filled, empty)` strings of `█` and `░` characters that together
/// span `width` character positions. Caller applies styling per segment.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn fmt_pct_bar(pct: f64, width: u16) -> (String, String) {
    let clamped = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
    let filled_count = ((clamped / 100.0) * f64::from(width)).round() as u16;
    let empty_count = width.saturating_sub(filled_count);
    (
        "█".repeat(usize::from(filled_count)),
        "░".repeat(usize::from(empty_count)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_byte_counts_stay_in_bytes() {
        assert_eq!(fmt_bytes(512), "512 B");
    }

    #[test]
    fn frequency_switches_units() {
        assert_eq!(fmt_frequency(1500.0), "1.50 GHz");
        assert_eq!(fmt_frequency(600.0), "600 MHz");
    }

    #[test]
    fn bar_spans_width() {
        let (filled, empty) = fmt_pct_bar(25.0, 8);
        assert_eq!(filled.chars().count(), 2);
        assert_eq!(empty.chars().count(), 6);

        let (filled, empty) = fmt_pct_bar(140.0, 4);
        assert_eq!(filled.chars().count(), 4);
        assert!(empty.is_empty());
    }
}
