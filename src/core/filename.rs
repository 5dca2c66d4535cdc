//! Filesystem-safe name handling

/// Characters that can't appear in Windows file names.
const FORBIDDEN_CHARS: &[char] = &['>', '<', ':', '"', '\\', '/', '|', '?', '*', '.'];

/// Replaces each forbidden character in the string with a space.
///
/// Replacement is one-for-one, so the result has the same character count as
/// the input, and applying the function twice changes nothing.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_characters_replaced() {
        let cleaned = sanitize_file_name(r#"a>b<c:d"e\f/g|h?i*j.k"#);
        assert_eq!(cleaned, "a b c d e f g h i j k");
    }

    #[test]
    fn test_length_preserved() {
        let inputs = ["", "plain name", "Mr. Blue Sky", "AC/DC - T.N.T.", "???"];
        for input in inputs {
            assert_eq!(sanitize_file_name(input).chars().count(), input.chars().count());
        }
    }

    #[test]
    fn test_no_forbidden_characters_remain() {
        let cleaned = sanitize_file_name("What?!: a / test. \\ |case|");
        assert!(!cleaned.chars().any(|c| FORBIDDEN_CHARS.contains(&c)));
    }

    #[test]
    fn test_idempotent() {
        let once = sanitize_file_name("Song. Title / Artist?");
        let twice = sanitize_file_name(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(sanitize_file_name("Träume · 夢"), "Träume · 夢");
    }
}
