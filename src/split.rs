//! Quote-aware string splitting
//!
//! Splits text on a delimiter while treating single- and double-quoted
//! spans as atomic. Every component that tokenizes expressions goes
//! through here.

/// Split `text` by `delimiter`, respecting quotes.
///
/// A span opened by `'` or `"` is closed only by the same character;
/// delimiters inside it are literal text. When `remove_quotes` is set the
/// quote characters themselves are dropped from the output tokens.
/// Consecutive delimiters produce empty tokens and the final token is
/// always emitted, so the token count is `delimiter count outside quotes
/// + 1`. An unterminated quote runs to the end of the text without
/// splitting.
pub fn split_quote_aware(text: &str, delimiter: char, remove_quotes: bool) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut current_quote = '"';

    for ch in text.chars() {
        if in_quotes {
            if ch == current_quote {
                in_quotes = false;
                if !remove_quotes {
                    current.push(ch);
                }
            } else {
                current.push(ch);
            }
        } else if ch == '\'' || ch == '"' {
            in_quotes = true;
            current_quote = ch;
            if !remove_quotes {
                current.push(ch);
            }
        } else if ch == delimiter {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    result.push(current);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_split() {
        assert_eq!(
            split_quote_aware("a b c", ' ', false),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_quoted_span_is_atomic() {
        assert_eq!(
            split_quote_aware(r#"key="some value" other"#, ' ', false),
            vec![r#"key="some value""#, "other"]
        );
    }

    #[test]
    fn test_remove_quotes() {
        assert_eq!(
            split_quote_aware(r#"path="a b"=c"#, '=', true),
            vec!["path", "a b", "c"]
        );
    }

    #[test]
    fn test_single_quotes() {
        assert_eq!(
            split_quote_aware("say 'hello world' now", ' ', true),
            vec!["say", "hello world", "now"]
        );
    }

    #[test]
    fn test_mixed_quote_kinds() {
        // A double quote inside single quotes is literal text
        assert_eq!(
            split_quote_aware(r#"a='x "y" z' b=2"#, ' ', false),
            vec![r#"a='x "y" z'"#, "b=2"]
        );
    }

    #[test]
    fn test_consecutive_delimiters_yield_empty_tokens() {
        assert_eq!(split_quote_aware("a==b", '=', false), vec!["a", "", "b"]);
        assert_eq!(split_quote_aware("a ", ' ', false), vec!["a", ""]);
    }

    #[test]
    fn test_delimiter_inside_quotes_not_split() {
        assert_eq!(
            split_quote_aware(r#"msg="a=b" rest"#, '=', true),
            vec!["msg", "a=b rest"]
        );
        assert_eq!(
            split_quote_aware(r#""a=b" tail"#, '=', false),
            vec![r#""a=b" tail"#]
        );
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(
            split_quote_aware(r#"a "b c d"#, ' ', true),
            vec!["a", "b c d"]
        );
    }

    #[test]
    fn test_rejoin_is_delimiter_equivalent() {
        let tokens = split_quote_aware(r#"one "two three" four"#, ' ', true);
        assert_eq!(tokens, vec!["one", "two three", "four"]);
        // Re-quoting the field that was quoted and re-joining reproduces
        // an equivalent string
        let rejoined = format!("{} \"{}\" {}", tokens[0], tokens[1], tokens[2]);
        assert_eq!(rejoined, r#"one "two three" four"#);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(split_quote_aware("", ' ', false), vec![""]);
    }
}
