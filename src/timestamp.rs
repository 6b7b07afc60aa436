/// Formats milliseconds as `HH:MM:SS.mmm`; hours widen past 99.
pub fn time_str(ms: f64) -> String {
    let total = ms.max(0.0).round() as u64;
    let hours = total / 3_600_000;
    let minutes = total % 3_600_000 / 60_000;
    let seconds = total % 60_000 / 1000;
    let milliseconds = total % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(time_str(0.0), "00:00:00.000");
        assert_eq!(time_str(26.122), "00:00:00.026");
        assert_eq!(time_str(3_723_004.4), "01:02:03.004");
        assert_eq!(time_str(360_000_000.0), "100:00:00.000");
    }
}
