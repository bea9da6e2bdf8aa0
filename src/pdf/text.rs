//! Cleaning and truncation of extracted page text

/// Appended whenever text was cut short
pub const TRUNCATION_MARKER: &str = " [...truncated]";

/// Turns raw extracted text into compact, display-ready text.
///
/// Cleaning keeps line structure but collapses horizontal whitespace inside
/// lines and squeezes every run of blank lines into a single paragraph
/// break. The cleaned text is then capped at `max_chars` characters
/// (marker included) on a word boundary where one is available.
#[derive(Debug, Clone, Copy)]
pub struct TextNormalizer {
    max_chars: usize,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self { max_chars: 10_000 }
    }
}

impl TextNormalizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn normalize(&self, raw: &str) -> String {
        truncate(&clean(raw), self.max_chars)
    }
}

/// Expand common typographic ligatures found in PDFs
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Normalize whitespace while keeping paragraph boundaries
pub fn clean(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = expand_ligatures(text)
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n");

    let mut out = String::with_capacity(text.len());
    let mut pending_break = false;

    for line in text.split('\n') {
        let words: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || (c.is_control() && c != '\n'))
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }

        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        pending_break = false;

        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(word);
        }
    }

    out
}

/// Cut `text` to at most `max_chars` characters, marker included
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    // No room for the marker: hard cut
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }

    let budget = max_chars - marker_len;
    let cut = text
        .char_indices()
        .nth(budget)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];

    let splits_word = text[cut..]
        .chars()
        .next()
        .map(|c| !c.is_whitespace())
        .unwrap_or(false);
    let head = if splits_word {
        match head.rfind(char::is_whitespace) {
            Some(i) if i > 0 => &head[..i],
            _ => head,
        }
    } else {
        head
    };

    format!("{}{}", head.trim_end(), TRUNCATION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case("  hello    world \t ", "hello world")]
    #[case("line one\nline two", "line one\nline two")]
    #[case("para one\n\n\n\n\npara two", "para one\n\npara two")]
    #[case("para one\n \n\t\npara two", "para one\n\npara two")]
    #[case("\n\n\nleading and trailing\n\n\n", "leading and trailing")]
    #[case("windows\r\nline\rends", "windows\nline\nends")]
    #[case("e\u{FB03}cient \u{FB01}le", "efficient file")]
    #[case("page\u{000C}break", "page\nbreak")]
    fn test_clean(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean(input), expected);
    }

    #[test]
    fn test_clean_is_deterministic() {
        let raw = "A  b\n\n\n\nc\td";
        assert_eq!(clean(raw), clean(raw));
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("short text", 100), "short text");
        assert_eq!(truncate("exact", 5), "exact");
    }

    #[test]
    fn test_truncate_on_word_boundary() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let max = 30;
        let out = truncate(text, max);

        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(out.chars().count() <= max);
        let body = out.trim_end_matches(TRUNCATION_MARKER);
        assert_eq!(body, "alpha beta");
    }

    #[test]
    fn test_truncate_single_long_word() {
        let text = "x".repeat(100);
        let out = truncate(&text, 40);
        assert_eq!(out.chars().count(), 40);
        assert!(out.starts_with("xxxx"));
    }

    #[rstest]
    #[case(0, "")]
    #[case(5, "alpha")]
    #[case(15, "alpha beta g☃mm")]
    fn test_truncate_limit_below_marker(#[case] max: usize, #[case] expected: &str) {
        let out = truncate("alpha beta g\u{2603}mma delta", max);
        assert_eq!(out, expected);
        assert!(out.chars().count() <= max);
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "日本語のテキスト ".repeat(20);
        let out = truncate(&text, 50);
        assert!(out.chars().count() <= 50);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_normalizer_combines_clean_and_truncate() {
        let normalizer = TextNormalizer::new(30);
        let out = normalizer.normalize("one   two\n\n\n\nthree four five six seven");
        assert!(out.starts_with("one two\n\nthree"));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }
}
