//! Statement rewrites and error suppression around execution.
//!
//! Some engines reject fragments that are otherwise portable: T-SQL and
//! Oracle have no `TRUE`/`FALSE` literals, and no driver binds a list to a
//! single placeholder. Each dialect carries a fixed table of rewrites applied
//! before a statement is sent, and a short allow-list of native error codes
//! that count as success for one statement shape only (re-creating an index
//! that already exists).

use crate::query::Query;
use crate::value::SqlValue;

/// How a dialect spells parameter placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, bound by position.
    Question,
    /// `@0`, `@1`, … (zero-based).
    AtIndexed,
    /// `:1`, `:2`, … (one-based).
    ColonIndexed,
}

impl PlaceholderStyle {
    /// Renders the zero-based placeholder `index`.
    #[must_use]
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Question => String::from("?"),
            Self::AtIndexed => format!("@{index}"),
            Self::ColonIndexed => format!(":{}", index + 1),
        }
    }
}

/// A rewrite applied to every statement before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Expands [`SqlValue::List`] parameters into one placeholder per item.
    ExpandListParameters,
    /// Replaces `TRUE`/`FALSE` keywords with `1`/`0`.
    BooleanLiterals,
}

/// A native error treated as success for one statement shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suppression {
    /// Native error code as reported by the driver.
    pub code: &'static str,
    /// Statement prefixes (upper case, single spaces) the code applies to.
    pub statements: &'static [&'static str],
    /// What the error means.
    pub reason: &'static str,
}

/// The rewrite and suppression table of one dialect.
#[derive(Debug, Clone, Copy)]
pub struct DefendRules {
    /// Placeholder spelling used when renumbering.
    pub placeholders: PlaceholderStyle,
    /// Rewrites, applied in order.
    pub rewrites: &'static [Rewrite],
    /// Errors converted into an empty result.
    pub suppressions: &'static [Suppression],
}

impl DefendRules {
    /// Applies every rewrite to `query`.
    #[must_use]
    pub fn rewrite(&self, query: Query) -> Query {
        self.rewrites
            .iter()
            .fold(query, |query, rewrite| match rewrite {
                Rewrite::ExpandListParameters => expand_lists(query, self.placeholders),
                Rewrite::BooleanLiterals => Query {
                    text: replace_boolean_literals(&query.text),
                    parameters: query.parameters,
                },
            })
    }

    /// Returns the suppression matching a failed statement, if any.
    #[must_use]
    pub fn suppression(&self, text: &str, code: &str) -> Option<&'static Suppression> {
        let normalized = normalize_statement(text);
        self.suppressions.iter().find(|s| {
            s.code.eq_ignore_ascii_case(code)
                && s.statements.iter().any(|p| normalized.starts_with(p))
        })
    }
}

fn normalize_statement(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// One lexical piece of a statement.
#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    /// Code outside literals, identifiers and comments.
    Code(&'a str),
    /// Anything that must be copied verbatim.
    Opaque(&'a str),
}

fn split_pieces(text: &str) -> Vec<Piece<'_>> {
    let bytes = text.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let end = match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let mut j = i + 1;
                loop {
                    match bytes.get(j) {
                        None => break j,
                        Some(&b) if b == quote => {
                            if bytes.get(j + 1) == Some(&quote) {
                                j += 2;
                            } else {
                                break j + 1;
                            }
                        }
                        Some(_) => j += 1,
                    }
                }
            }
            b'[' => text[i..].find(']').map_or(bytes.len(), |p| i + p + 1),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                text[i..].find('\n').map_or(bytes.len(), |p| i + p)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                text[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2)
            }
            _ => {
                i += 1;
                continue;
            }
        };
        if start < i {
            pieces.push(Piece::Code(&text[start..i]));
        }
        pieces.push(Piece::Opaque(&text[i..end]));
        start = end;
        i = end;
    }
    if start < bytes.len() {
        pieces.push(Piece::Code(&text[start..]));
    }
    pieces
}

fn replace_boolean_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in split_pieces(text) {
        match piece {
            Piece::Opaque(s) => out.push_str(s),
            Piece::Code(s) => {
                let mut word = String::new();
                for c in s.chars() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                        word.push(c);
                    } else {
                        out.push_str(boolean_word(&word));
                        word.clear();
                        out.push(c);
                    }
                }
                out.push_str(boolean_word(&word));
            }
        }
    }
    out
}

fn boolean_word(word: &str) -> &str {
    if word.eq_ignore_ascii_case("true") {
        "1"
    } else if word.eq_ignore_ascii_case("false") {
        "0"
    } else {
        word
    }
}

fn expand_lists(query: Query, style: PlaceholderStyle) -> Query {
    if !query.parameters.iter().any(|p| matches!(p, SqlValue::List(_))) {
        return query;
    }

    let mut starts = Vec::with_capacity(query.parameters.len());
    let mut flattened = Vec::new();
    for parameter in &query.parameters {
        starts.push(flattened.len());
        match parameter {
            SqlValue::List(items) => flattened.extend(items.iter().cloned()),
            other => flattened.push(other.clone()),
        }
    }

    let render = |index: usize| -> Option<String> {
        let start = *starts.get(index)?;
        Some(match query.parameters.get(index)? {
            SqlValue::List(items) if items.is_empty() => String::from("NULL"),
            SqlValue::List(items) => (start..start + items.len())
                .map(|i| style.render(i))
                .collect::<Vec<_>>()
                .join(", "),
            _ => style.render(start),
        })
    };

    let mut text = String::with_capacity(query.text.len());
    let mut positional = 0;
    for piece in split_pieces(&query.text) {
        let code = match piece {
            Piece::Opaque(s) => {
                text.push_str(s);
                continue;
            }
            Piece::Code(s) => s,
        };
        let mut chars = code.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            let mut token = &code[pos..pos + c.len_utf8()];
            let marker = match (style, c) {
                (PlaceholderStyle::Question, '?') => {
                    positional += 1;
                    Some(positional - 1)
                }
                (PlaceholderStyle::AtIndexed, '@') | (PlaceholderStyle::ColonIndexed, ':') => {
                    let digits: String = code[pos + 1..]
                        .chars()
                        .take_while(char::is_ascii_digit)
                        .collect();
                    match digits.parse::<usize>() {
                        Ok(n) => {
                            for _ in 0..digits.len() {
                                chars.next();
                            }
                            token = &code[pos..=pos + digits.len()];
                            Some(if style == PlaceholderStyle::ColonIndexed {
                                n.saturating_sub(1)
                            } else {
                                n
                            })
                        }
                        Err(_) => None,
                    }
                }
                _ => None,
            };
            match marker.and_then(|index| render(index)) {
                Some(rendered) => text.push_str(&rendered),
                None => text.push_str(token),
            }
        }
    }

    Query {
        text,
        parameters: flattened,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: DefendRules = DefendRules {
        placeholders: PlaceholderStyle::Question,
        rewrites: &[Rewrite::ExpandListParameters],
        suppressions: &[],
    };

    const INDEXED: DefendRules = DefendRules {
        placeholders: PlaceholderStyle::AtIndexed,
        rewrites: &[Rewrite::ExpandListParameters, Rewrite::BooleanLiterals],
        suppressions: &[Suppression {
            code: "1913",
            statements: &["CREATE INDEX", "CREATE UNIQUE INDEX"],
            reason: "index already exists",
        }],
    };

    fn ints(values: &[i64]) -> SqlValue {
        SqlValue::List(values.iter().map(|v| SqlValue::Int(*v)).collect())
    }

    #[test]
    fn test_expand_positional_list() {
        let query = Query::with_parameters(
            "SELECT * FROM t WHERE a = ? AND b IN (?) AND c = '?'",
            vec![SqlValue::Int(1), ints(&[2, 3, 4])],
        );
        let rewritten = QUESTION.rewrite(query);
        assert_eq!(
            rewritten.text,
            "SELECT * FROM t WHERE a = ? AND b IN (?, ?, ?) AND c = '?'"
        );
        assert_eq!(rewritten.parameters.len(), 4);
    }

    #[test]
    fn test_expand_renumbers_indexed_placeholders() {
        let query = Query::with_parameters(
            "SELECT * FROM t WHERE b IN (@0) AND a = @1",
            vec![ints(&[7, 8]), SqlValue::Int(1)],
        );
        let rewritten = INDEXED.rewrite(query);
        assert_eq!(rewritten.text, "SELECT * FROM t WHERE b IN (@0, @1) AND a = @2");
        assert_eq!(
            rewritten.parameters,
            vec![SqlValue::Int(7), SqlValue::Int(8), SqlValue::Int(1)]
        );
    }

    #[test]
    fn test_colon_placeholders_are_one_based() {
        let query = Query::with_parameters("x IN (:1) AND y = :2", vec![ints(&[1, 2]), SqlValue::Int(3)]);
        let rules = DefendRules {
            placeholders: PlaceholderStyle::ColonIndexed,
            ..QUESTION
        };
        assert_eq!(rules.rewrite(query).text, "x IN (:1, :2) AND y = :3");
    }

    #[test]
    fn test_out_of_range_placeholders_are_kept() {
        let query = Query::with_parameters(
            "SELECT * FROM t WHERE b IN (@0) AND a = @12",
            vec![ints(&[7, 8])],
        );
        assert_eq!(
            INDEXED.rewrite(query).text,
            "SELECT * FROM t WHERE b IN (@0, @1) AND a = @12"
        );

        let query = Query::with_parameters("x IN (:1) AND y = :35", vec![ints(&[1, 2])]);
        let rules = DefendRules {
            placeholders: PlaceholderStyle::ColonIndexed,
            ..QUESTION
        };
        assert_eq!(rules.rewrite(query).text, "x IN (:1, :2) AND y = :35");
    }

    #[test]
    fn test_empty_list_becomes_null() {
        let query = Query::with_parameters("x IN (?)", vec![SqlValue::List(Vec::new())]);
        let rewritten = QUESTION.rewrite(query);
        assert_eq!(rewritten.text, "x IN (NULL)");
        assert!(rewritten.parameters.is_empty());
    }

    #[test]
    fn test_boolean_literals_outside_quotes() {
        let query = Query::new(
            "UPDATE t SET flag = TRUE, label = 'true', [false] = 1 WHERE other = false AND is_true = 1",
        );
        assert_eq!(
            INDEXED.rewrite(query).text,
            "UPDATE t SET flag = 1, label = 'true', [false] = 1 WHERE other = 0 AND is_true = 1"
        );
    }

    #[test]
    fn test_suppression_is_scoped_to_statement() {
        assert!(INDEXED
            .suppression("create   unique index \"IDX_a\" ON t (a)", "1913")
            .is_some());
        assert!(INDEXED.suppression("CREATE TABLE t (a int)", "1913").is_none());
        assert!(INDEXED.suppression("CREATE INDEX i ON t (a)", "2714").is_none());
    }

    #[test]
    fn test_comments_are_opaque() {
        let pieces = split_pieces("SELECT 1 -- true?\n, 2 /* ? */");
        assert_eq!(
            pieces,
            vec![
                Piece::Code("SELECT 1 "),
                Piece::Opaque("-- true?"),
                Piece::Code("\n, 2 "),
                Piece::Opaque("/* ? */"),
            ]
        );
    }
}
