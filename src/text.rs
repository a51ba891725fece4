pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole-word (or whole-phrase) containment. `text` and `term` are expected to be
/// normalized already.
pub fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }

    let mut start = 0usize;
    while let Some(offset) = text[start..].find(term) {
        let begin = start + offset;
        let end = begin + term.len();

        let left_ok = text[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let right_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if left_ok && right_ok {
            return true;
        }

        // advance by one char so overlapping occurrences are still found
        start = begin + text[begin..].chars().next().map_or(1, char::len_utf8);
    }

    false
}

pub fn has_any_term<S: AsRef<str>>(text: &str, terms: &[S]) -> bool {
    terms.iter().any(|term| contains_term(text, term.as_ref()))
}

pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn truncate_title(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(max_chars).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_collapses_whitespace() {
        assert_eq!(
            normalize_query("  What is the   FLOOD risk\tin Bentiu? "),
            "what is the flood risk in bentiu?"
        );
    }

    #[test]
    fn term_match_respects_word_boundaries() {
        assert!(contains_term("what about bor?", "bor"));
        assert!(!contains_term("my neighbor lives here", "bor"));
        assert!(!contains_term("this is it", "hi"));
        assert!(contains_term("hi, anyone there", "hi"));
    }

    #[test]
    fn phrase_terms_match_as_a_unit() {
        assert!(contains_term("risk in upper nile state", "upper nile"));
        assert!(!contains_term("upper-level nile", "upper nile"));
    }

    #[test]
    fn later_occurrence_is_found_after_rejected_one() {
        assert!(contains_term("neighbor and bor", "bor"));
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(120000), "120,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate_title("short", 50), "short");
        let long = "a".repeat(60);
        assert_eq!(truncate_title(&long, 50), format!("{}...", "a".repeat(50)));
    }
}
