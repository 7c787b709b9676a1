//! ANSI stripping, terminal width, and timestamps for log output.

/// Remove ANSI escape sequences (SGR colours and other CSI sequences).
///
/// A lone `ESC` followed by anything but `[` drops both characters.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            // Parameters and intermediates run until a final byte in `@..=~`.
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// Width of the terminal from `COLUMNS`, or 80.
pub(super) fn terminal_columns() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(80)
}

/// Current UTC time for the log file header.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time for log file lines.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colors_and_cursor_moves() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m theme"), "ERROR theme");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mApplying theme\x1b[0m"),
            "==> Applying theme"
        );
        assert_eq!(strip_ansi("\r\x1b[K  kitty"), "\r  kitty");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn strip_ansi_drops_two_char_escapes() {
        assert_eq!(strip_ansi("\x1b7saved"), "saved");
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let time = format_utc_time();
        assert_eq!(time.len(), 8);
        assert_eq!(&time[2..3], ":");
        let datetime = format_utc_datetime();
        assert_eq!(datetime.len(), 19);
        assert_eq!(&datetime[10..11], " ");
    }
}
