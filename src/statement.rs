//! Script parsing and the statement cursor
//!
//! A script is plain text of the form `KEYWORD_CODE [properties] value`,
//! one statement after another. Parsing strips comments, splits the text
//! at word-boundary occurrences of registered keyword codes (outside
//! quotes), and turns each chunk into a [`Statement`]. The resulting
//! [`Script`] is consumed through a forward-only cursor.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{error, trace, warn};

use crate::keyword::{Keyword, KeywordCategory, KeywordSet};
use crate::split::split_quote_aware;

/// One parsed script instruction. Immutable once parsed.
#[derive(Clone)]
pub struct Statement {
    keyword: Rc<dyn Keyword>,
    properties: IndexMap<String, String>,
    value: String,
}

impl Statement {
    pub fn keyword(&self) -> &Rc<dyn Keyword> {
        &self.keyword
    }

    pub fn code(&self) -> &str {
        self.keyword.code()
    }

    pub fn category(&self) -> KeywordCategory {
        self.keyword.category()
    }

    /// Inline property from the bracketed block, if present
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("keyword", &self.keyword.code())
            .field("properties", &self.properties)
            .field("value", &self.value)
            .finish()
    }
}

/// Parsed script: ordered statements plus a forward-only cursor
pub struct Script {
    statements: Vec<Statement>,
    cursor: usize,
    has_error: bool,
}

impl Script {
    /// Parse script text against the registered keywords.
    ///
    /// Chunks that fail keyword identification are dropped with a logged
    /// error and set [`Script::has_error`]; parsing itself never aborts.
    pub fn parse(keywords: &KeywordSet, text: &str) -> Script {
        let stripped = strip_comments(text);
        let codes = keywords.codes_longest_first();

        let mut statements = Vec::new();
        let mut has_error = false;

        for chunk in chunk_statements(&stripped, &codes) {
            let collapsed = collapse_whitespace(chunk);
            if collapsed.is_empty() {
                continue;
            }

            let Some(keyword) = identify_keyword(&collapsed, &codes, keywords) else {
                error!("Failed to match a keyword for statement chunk: {collapsed}");
                has_error = true;
                continue;
            };

            let rest = collapsed[keyword.code().len()..].trim_start();
            let (properties, value) = if rest.starts_with('[') {
                parse_property_block(rest)
            } else {
                (IndexMap::new(), rest.to_string())
            };

            trace!("Parsed statement: [{}] {}", keyword.code(), value);
            statements.push(Statement {
                keyword,
                properties,
                value,
            });
        }

        Script {
            statements,
            cursor: 0,
            has_error,
        }
    }

    /// Next statement, advancing the cursor
    pub fn next(&mut self) -> Option<Statement> {
        let statement = self.statements.get(self.cursor).cloned();
        if statement.is_some() {
            self.cursor += 1;
        }
        statement
    }

    /// Upcoming statement without advancing
    pub fn peek(&self) -> Option<&Statement> {
        self.statements.get(self.cursor)
    }

    /// First upcoming statement whose category is one of `categories`,
    /// without advancing
    pub fn peek_category(&self, categories: &[KeywordCategory]) -> Option<&Statement> {
        self.statements[self.cursor..]
            .iter()
            .find(|s| categories.contains(&s.category()))
    }

    pub fn is_eof(&self) -> bool {
        self.cursor >= self.statements.len()
    }

    /// Rewind the cursor to the first statement
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// True when at least one chunk was dropped during parsing
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Remove `//` line and `/* */` block comments, quote-aware. Line breaks
/// after line comments are kept so statement spacing survives; a block
/// comment collapses to a single space.
fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_quotes = false;
    let mut current_quote = '"';

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == current_quote {
                in_quotes = false;
            }
            result.push(ch);
        } else if ch == '\'' || ch == '"' {
            in_quotes = true;
            current_quote = ch;
            result.push(ch);
        } else if ch == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    result.push('\n');
                    break;
                }
            }
        } else if ch == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = ' ';
            for c in chars.by_ref() {
                if prev == '*' && c == '/' {
                    break;
                }
                prev = c;
            }
            result.push(' ');
        } else {
            result.push(ch);
        }
    }

    result
}

/// Split text into chunks, each starting at a word-boundary occurrence of
/// a keyword code outside quotes. Text before the first boundary becomes a
/// leading chunk (dropped later unless empty).
fn chunk_statements<'a>(text: &'a str, codes: &[&str]) -> Vec<&'a str> {
    let mut boundaries = Vec::new();
    let mut in_quotes = false;
    let mut current_quote = '"';
    let mut prev_is_word = false;

    for (i, ch) in text.char_indices() {
        if in_quotes {
            if ch == current_quote {
                in_quotes = false;
            }
            prev_is_word = false;
            continue;
        }
        if ch == '\'' || ch == '"' {
            in_quotes = true;
            current_quote = ch;
            prev_is_word = false;
            continue;
        }
        if !prev_is_word && is_word_char(ch) {
            let rest = &text[i..];
            for code in codes {
                if rest.starts_with(code)
                    && rest[code.len()..]
                        .chars()
                        .next()
                        .map_or(true, |c| !is_word_char(c))
                {
                    boundaries.push(i);
                    break;
                }
            }
        }
        prev_is_word = is_word_char(ch);
    }

    let mut chunks = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for boundary in boundaries {
        chunks.push(&text[start..boundary]);
        start = boundary;
    }
    chunks.push(&text[start..]);
    chunks
}

/// Trim and collapse all whitespace runs (including newlines) to single
/// spaces
fn collapse_whitespace(chunk: &str) -> String {
    let mut out = String::with_capacity(chunk.len());
    let mut last_space = false;
    for ch in chunk.trim().chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

/// Match the chunk's leading token against registered codes, longest first
fn identify_keyword(
    chunk: &str,
    codes: &[&str],
    keywords: &KeywordSet,
) -> Option<Rc<dyn Keyword>> {
    for code in codes {
        if chunk.starts_with(code)
            && chunk[code.len()..]
                .chars()
                .next()
                .map_or(true, |c| !is_word_char(c))
        {
            return keywords.find(code);
        }
    }
    None
}

/// Parse a `[key=value key2="quoted" loneTitle]` block. Returns the
/// property map and the remaining value text. `rest` must start with `[`.
fn parse_property_block(rest: &str) -> (IndexMap<String, String>, String) {
    let Some(close) = find_block_end(rest) else {
        warn!("Unterminated property block, treating it as value text: {rest}");
        return (IndexMap::new(), rest.to_string());
    };

    let inner = &rest[1..close];
    let value = rest[close + 1..].trim().to_string();

    let mut properties = IndexMap::new();
    for token in split_quote_aware(inner, ' ', false) {
        if token.is_empty() {
            continue;
        }
        let parts = split_quote_aware(&token, '=', true);
        if parts.len() == 1 {
            properties.insert("title".to_string(), parts[0].clone());
        } else {
            properties.insert(parts[0].clone(), parts[1..].join("="));
        }
    }

    (properties, value)
}

/// Byte index of the unquoted `]` closing the block opened at index 0
fn find_block_end(rest: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut current_quote = '"';
    for (i, ch) in rest.char_indices().skip(1) {
        if in_quotes {
            if ch == current_quote {
                in_quotes = false;
            }
        } else if ch == '\'' || ch == '"' {
            in_quotes = true;
            current_quote = ch;
        } else if ch == ']' {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::Result;
    use crate::report::Reporter;
    use pretty_assertions::assert_eq;

    struct Plain {
        code: &'static str,
        category: KeywordCategory,
    }

    impl Keyword for Plain {
        fn code(&self) -> &str {
            self.code
        }

        fn category(&self) -> KeywordCategory {
            self.category
        }

        fn handle(
            &self,
            _ctx: &mut Context,
            _reporter: &mut Reporter<'_>,
            _statement: &Statement,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    fn test_keywords() -> KeywordSet {
        let mut set = KeywordSet::new();
        for (code, category) in [
            ("DESC", KeywordCategory::NoImpact),
            ("SEND", KeywordCategory::Action),
            ("SLEEP", KeywordCategory::Utility),
            ("EQUAL", KeywordCategory::Assertion),
            ("NOT_EQUAL", KeywordCategory::Assertion),
        ] {
            set.add(Rc::new(Plain { code, category }));
        }
        set
    }

    #[test]
    fn test_parse_single_statement() {
        let script = Script::parse(&test_keywords(), "DESC smoke test");
        assert_eq!(script.len(), 1);
        assert_eq!(script.statements()[0].code(), "DESC");
        assert_eq!(script.statements()[0].value(), "smoke test");
        assert!(!script.has_error());
    }

    #[test]
    fn test_parse_multiple_statements() {
        let script = Script::parse(
            &test_keywords(),
            "DESC first test\nSEND body.json\nEQUAL body.status=ok",
        );
        let codes: Vec<&str> = script.statements().iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec!["DESC", "SEND", "EQUAL"]);
        assert_eq!(script.statements()[1].value(), "body.json");
        assert_eq!(script.statements()[2].value(), "body.status=ok");
    }

    #[test]
    fn test_statements_on_one_line() {
        let script = Script::parse(&test_keywords(), "DESC alpha SEND body.json");
        assert_eq!(script.len(), 2);
        assert_eq!(script.statements()[0].value(), "alpha");
        assert_eq!(script.statements()[1].value(), "body.json");
    }

    #[test]
    fn test_quoted_keyword_code_does_not_split() {
        let script = Script::parse(&test_keywords(), r#"DESC "SEND is mentioned here""#);
        assert_eq!(script.len(), 1);
        assert_eq!(
            script.statements()[0].value(),
            r#""SEND is mentioned here""#
        );
    }

    #[test]
    fn test_keyword_as_word_prefix_does_not_split() {
        let script = Script::parse(&test_keywords(), "DESC the SENDER address");
        assert_eq!(script.len(), 1);
        assert_eq!(script.statements()[0].value(), "the SENDER address");
    }

    #[test]
    fn test_comments_are_stripped() {
        let script = Script::parse(
            &test_keywords(),
            "// header comment\nDESC hello /* inline */ world\n// SEND inside comment\n",
        );
        assert_eq!(script.len(), 1);
        assert_eq!(script.statements()[0].value(), "hello world");
    }

    #[test]
    fn test_comment_markers_inside_quotes_are_text() {
        let script = Script::parse(&test_keywords(), r#"DESC "http://example" tail"#);
        assert_eq!(script.len(), 1);
        assert_eq!(script.statements()[0].value(), r#""http://example" tail"#);
    }

    #[test]
    fn test_whitespace_collapse() {
        let script = Script::parse(&test_keywords(), "DESC  spread\n\tover   lines");
        assert_eq!(script.statements()[0].value(), "spread over lines");
    }

    #[test]
    fn test_property_block() {
        let script = Script::parse(
            &test_keywords(),
            r#"SEND [id=5 "Checkout flow" retry=2] body.json"#,
        );
        let statement = &script.statements()[0];
        assert_eq!(statement.property("id"), Some("5"));
        assert_eq!(statement.property("title"), Some("Checkout flow"));
        assert_eq!(statement.property("retry"), Some("2"));
        assert_eq!(statement.value(), "body.json");
    }

    #[test]
    fn test_property_value_with_embedded_delimiters() {
        let script = Script::parse(&test_keywords(), r#"SEND [msg="a=b c"] body.json"#);
        assert_eq!(script.statements()[0].property("msg"), Some("a=b c"));
    }

    #[test]
    fn test_unterminated_property_block_is_value() {
        let script = Script::parse(&test_keywords(), "SEND [oops body.json");
        let statement = &script.statements()[0];
        assert!(statement.properties().is_empty());
        assert_eq!(statement.value(), "[oops body.json");
    }

    #[test]
    fn test_unmatched_leading_text_sets_error() {
        let script = Script::parse(&test_keywords(), "leading junk DESC ok");
        assert!(script.has_error());
        assert_eq!(script.len(), 1);
        assert_eq!(script.statements()[0].value(), "ok");
    }

    #[test]
    fn test_empty_script() {
        let script = Script::parse(&test_keywords(), "   \n\n  ");
        assert!(script.is_empty());
        assert!(!script.has_error());
    }

    #[test]
    fn test_cursor() {
        let mut script = Script::parse(&test_keywords(), "DESC a\nSEND b\nEQUAL c=1");
        assert!(!script.is_eof());
        assert_eq!(script.peek().map(|s| s.code().to_string()).as_deref(), Some("DESC"));

        let first = script.next().map(|s| s.code().to_string());
        assert_eq!(first.as_deref(), Some("DESC"));

        // Scan forward for the next assertion/action after the cursor
        let upcoming = script
            .peek_category(&[KeywordCategory::Action, KeywordCategory::Assertion])
            .map(|s| s.code().to_string());
        assert_eq!(upcoming.as_deref(), Some("SEND"));

        script.next();
        script.next();
        assert!(script.is_eof());
        assert!(script.next().is_none());

        script.reset();
        assert_eq!(script.peek().map(|s| s.code().to_string()).as_deref(), Some("DESC"));
    }
}
