//! The boolean keyword filter language.
//!
//! A query is a boolean expression over keyword rules, e.g.
//!
//! ```text
//! +title:rust and not (author:bob or -content:'memory safety')
//! ```
//!
//! Each rule optionally carries a sense (`+` include, `-` exclude; include is
//! the default) and a field qualifier (`title:`, `link:`, `author:`,
//! `content:`; all fields by default). Words may be quoted to contain
//! whitespace. Operators `or`, `and` and `not` bind from loosest to tightest.
//!
//! Parsing is eager: invalid query text fails with a [`QueryError`] before a
//! filter can ever be saved. Evaluation is pure and stateless given the
//! matching options.

pub mod lexer;
pub mod parser;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Item;

pub use parser::Parser;

/// Parse filter query text into an expression tree.
pub fn parse(input: &str) -> Result<Expr, QueryError> {
    Parser::parse(input)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("unmatched parenthesis")]
    UnmatchedParen,

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected trailing input after {0}")]
    TrailingInput(String),

    #[error("unexpected end of query")]
    UnexpectedEnd,
}

/// One matchable item field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Link,
    Author,
    Content,
}

/// A set of item fields a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMask(u8);

impl FieldMask {
    pub const TITLE: FieldMask = FieldMask(1);
    pub const LINK: FieldMask = FieldMask(2);
    pub const AUTHOR: FieldMask = FieldMask(4);
    pub const CONTENT: FieldMask = FieldMask(8);
    pub const ALL: FieldMask = FieldMask(0xf);

    pub fn contains(self, other: FieldMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<Field> for FieldMask {
    fn from(field: Field) -> Self {
        match field {
            Field::Title => FieldMask::TITLE,
            Field::Link => FieldMask::LINK,
            Field::Author => FieldMask::AUTHOR,
            Field::Content => FieldMask::CONTENT,
        }
    }
}

/// Whether a rule requires its word to be present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Include,
    Exclude,
}

/// Matching options shared by every rule of one filter.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub ignore_case: bool,
    pub whole_word: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            whole_word: true,
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Rule {
        sense: Sense,
        fields: FieldMask,
        word: String,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Evaluate this expression against one item.
    ///
    /// An include rule is true iff its word is found in the selected fields;
    /// an exclude rule is true iff the word is absent, so a lone `-word`
    /// passes everything except items mentioning the word.
    pub fn matches(&self, item: &Item, opts: MatchOptions) -> bool {
        match self {
            Expr::Rule { sense, fields, word } => {
                let found = word_in_fields(item, *fields, word, opts);
                match sense {
                    Sense::Include => found,
                    Sense::Exclude => !found,
                }
            }
            Expr::And(left, right) => left.matches(item, opts) && right.matches(item, opts),
            Expr::Or(left, right) => left.matches(item, opts) || right.matches(item, opts),
            Expr::Not(inner) => !inner.matches(item, opts),
        }
    }
}

fn word_in_fields(item: &Item, fields: FieldMask, word: &str, opts: MatchOptions) -> bool {
    let mut strings = Vec::new();
    if fields.contains(FieldMask::TITLE) {
        strings.push(item.title.as_str());
    }
    if fields.contains(FieldMask::LINK) {
        strings.push(item.link.as_str());
    }
    if fields.contains(FieldMask::AUTHOR) {
        strings.push(item.author.as_str());
    }
    if fields.contains(FieldMask::CONTENT) {
        strings.push(item.description.as_str());
    }
    let text = strings.join("\n");

    let (text, word) = if opts.ignore_case {
        (text.to_lowercase(), word.to_lowercase())
    } else {
        (text, word.to_string())
    };

    if opts.whole_word {
        text.split_whitespace().any(|token| token == word)
    } else {
        text.contains(&word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str, author: &str, description: &str) -> Item {
        Item {
            feed_id: "feed-1".into(),
            id: "item-1".into(),
            timestamp: chrono::Utc::now(),
            received: chrono::Utc::now(),
            title: title.into(),
            description: description.into(),
            link: link.into(),
            author: author.into(),
            read: false,
        }
    }

    #[test]
    fn test_include_rule_whole_word() {
        let expr = parse("rust").unwrap();
        let opts = MatchOptions::default();
        assert!(expr.matches(&item("Rust 1.80 released", "", "", ""), opts));
        assert!(!expr.matches(&item("Rustacean news", "", "", ""), opts));
    }

    #[test]
    fn test_substring_match_when_not_whole_word() {
        let expr = parse("rust").unwrap();
        let opts = MatchOptions {
            ignore_case: true,
            whole_word: false,
        };
        assert!(expr.matches(&item("Rustacean news", "", "", ""), opts));
    }

    #[test]
    fn test_case_sensitive_match() {
        let expr = parse("Rust").unwrap();
        let opts = MatchOptions {
            ignore_case: false,
            whole_word: true,
        };
        assert!(expr.matches(&item("Rust news", "", "", ""), opts));
        assert!(!expr.matches(&item("rust news", "", "", ""), opts));
    }

    #[test]
    fn test_qualifier_restricts_fields() {
        let expr = parse("author:alice").unwrap();
        let opts = MatchOptions::default();
        assert!(expr.matches(&item("", "", "alice", ""), opts));
        // The word appearing in another field does not count
        assert!(!expr.matches(&item("alice", "", "bob", ""), opts));
    }

    #[test]
    fn test_exclude_is_a_pass_through_gate() {
        let expr = parse("-beta").unwrap();
        let opts = MatchOptions::default();
        assert!(expr.matches(&item("stable release", "", "", ""), opts));
        assert!(!expr.matches(&item("", "", "", "now in beta"), opts));
    }

    #[test]
    fn test_title_include_with_default_mask_exclude() {
        // "+title:alpha -beta": the include passes on the title, but the
        // exclude (default ALL mask) finds "beta" in the body and fails,
        // so the whole expression is false.
        let expr = parse("+title:alpha -beta").unwrap();
        let opts = MatchOptions::default();
        let it = item("Alpha Release", "", "", "no beta here");
        assert!(!expr.matches(&it, opts));

        // Without "beta" anywhere, it passes.
        let it = item("Alpha Release", "", "", "all good");
        assert!(expr.matches(&it, opts));
    }

    #[test]
    fn test_boolean_combinators_truth_table() {
        let expr = parse("(a or b) and not c").unwrap();
        let opts = MatchOptions::default();
        for bits in 0..8u8 {
            let has_a = bits & 1 != 0;
            let has_b = bits & 2 != 0;
            let has_c = bits & 4 != 0;
            let mut words = Vec::new();
            if has_a {
                words.push("a");
            }
            if has_b {
                words.push("b");
            }
            if has_c {
                words.push("c");
            }
            let it = item(&words.join(" "), "", "", "");
            let expected = (has_a || has_b) && !has_c;
            assert_eq!(
                expr.matches(&it, opts),
                expected,
                "a={} b={} c={}",
                has_a,
                has_b,
                has_c
            );
        }
    }

    #[test]
    fn test_quoted_phrase_substring() {
        let expr = parse("'memory safety'").unwrap();
        let opts = MatchOptions {
            ignore_case: true,
            whole_word: false,
        };
        assert!(expr.matches(&item("", "", "", "On memory safety in Rust"), opts));
        assert!(!expr.matches(&item("", "", "", "memory and safety"), opts));
    }
}
