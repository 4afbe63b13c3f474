//! Output filename sanitization.

/// Fallback name when sanitization leaves nothing usable.
const FALLBACK_COMPONENT: &str = "recording";

/// Characters Windows refuses in file names.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Sanitize a trigger description into a filename component.
///
/// Filesystem-invalid characters, control characters and whitespace become
/// `_`; runs of `_` collapse to one; leading/trailing `_` are trimmed. An
/// empty result becomes the literal `recording`.
pub fn sanitize_file_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_underscore = false;

    for c in raw.chars() {
        let mapped = if c.is_whitespace() || c.is_control() || INVALID_CHARS.contains(&c) {
            '_'
        } else {
            c
        };

        if mapped == '_' {
            if !last_was_underscore {
                out.push('_');
            }
            last_was_underscore = true;
        } else {
            out.push(mapped);
            last_was_underscore = false;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_COMPONENT.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(sanitize_file_component("Round='Classic'"), "Round='Classic'");
    }

    #[test]
    fn test_invalid_chars_replaced_without_runs() {
        let result = sanitize_file_component("Round='A/B'");
        assert!(!result.contains('/'));
        assert!(!result.contains("__"));
        assert_eq!(result, "Round='A_B'");
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(sanitize_file_component("a  b\tc"), "a_b_c");
    }

    #[test]
    fn test_edges_trimmed() {
        assert_eq!(sanitize_file_component("  /name/  "), "name");
    }

    #[test]
    fn test_empty_becomes_fallback() {
        assert_eq!(sanitize_file_component(""), "recording");
        assert_eq!(sanitize_file_component(" /\\* "), "recording");
    }
}
