//! ANSI color helpers for CLI output.

use std::io::IsTerminal;

pub fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

pub fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

/// Format a status label (right-aligned, green, bold).
pub fn status_label(label: &str) -> String {
    format!("\x1b[1;32m{:>12}\x1b[0m", label)
}

/// Colors are on for a terminal stdout unless `--no-color` or `NO_COLOR` is set.
pub fn enabled(no_color: bool) -> bool {
    !no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// `paint` the text when colors are on, otherwise pass it through.
pub fn maybe(color: bool, paint: fn(&str) -> String, s: &str) -> String {
    if color {
        paint(s)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_passes_through_without_color() {
        assert_eq!(maybe(false, red, "x"), "x");
        assert_eq!(maybe(true, red, "x"), "\x1b[31mx\x1b[0m");
    }

    #[test]
    fn no_color_flag_wins() {
        assert!(!enabled(true));
    }
}
