//! Terminal escape-sequence removal for captured process output.

use std::sync::LazyLock;

use regex::Regex;

/// ESC `[`, optional `?`, digits/semicolons, one final letter.
static CSI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1B\[\??[0-9;]*[a-zA-Z]").expect("CSI pattern compiles"));

/// Strip ANSI CSI sequences (colors, cursor movement) from `text`.
///
/// `"\x1B[32mGreen\x1B[0m"` becomes `"Green"`.  Idempotent.
pub fn strip_ansi(text: &str) -> String {
    CSI_PATTERN.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_color_codes() {
        assert_eq!(strip_ansi("\x1B[32mGreen text\x1B[0m"), "Green text");
    }

    #[test]
    fn removes_private_mode_sequences() {
        assert_eq!(strip_ansi("\x1B[?25lhidden cursor\x1B[?25h"), "hidden cursor");
        assert_eq!(strip_ansi("\x1B[1;31mbold red\x1B[0m"), "bold red");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(strip_ansi("Global Skills\n  Agents: claude"), "Global Skills\n  Agents: claude");
    }

    #[test]
    fn idempotent() {
        let raw = "\x1B[36mmy-skill\x1B[39m  ~/.agents/skills/my-skill";
        let once = strip_ansi(raw);
        assert_eq!(strip_ansi(&once), once);
    }
}
