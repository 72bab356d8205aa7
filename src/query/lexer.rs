use super::{Field, QueryError};

/// A single token of the filter query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Plus,
    Minus,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Qualifier(Field),
    Word(String),
}

/// Characters that terminate a bare word.
fn is_reserved(c: char) -> bool {
    c.is_whitespace() || matches!(c, '+' | '-' | '(' | ')' | '\'' | '"')
}

const QUALIFIERS: [(&str, Field); 4] = [
    ("title:", Field::Title),
    ("link:", Field::Link),
    ("author:", Field::Author),
    ("content:", Field::Content),
];

pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        match c {
            '+' => {
                tokens.push(Token::Plus);
                rest = &rest[1..];
            }
            '-' => {
                tokens.push(Token::Minus);
                rest = &rest[1..];
            }
            '(' => {
                tokens.push(Token::LParen);
                rest = &rest[1..];
            }
            ')' => {
                tokens.push(Token::RParen);
                rest = &rest[1..];
            }
            '\'' | '"' => {
                let (word, remainder) = lex_quoted(rest, c)?;
                tokens.push(Token::Word(word));
                rest = remainder;
            }
            _ => {
                // Qualifiers are matched by prefix, before bare words, so
                // `title:rust` lexes as a qualifier followed by a word.
                if let Some((name, field)) = QUALIFIERS
                    .iter()
                    .find(|(name, _)| rest.starts_with(name))
                {
                    tokens.push(Token::Qualifier(*field));
                    rest = &rest[name.len()..];
                    continue;
                }
                let (word, remainder) = lex_bare(rest);
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Word(word),
                });
                rest = remainder;
            }
        }
    }

    Ok(tokens)
}

/// Lex a quoted phrase, stripping the quotes. The phrase may contain
/// whitespace but must be non-empty and terminated.
fn lex_quoted(input: &str, quote: char) -> Result<(String, &str), QueryError> {
    let body = &input[quote.len_utf8()..];
    match body.find(quote) {
        Some(0) | None => Err(QueryError::UnterminatedQuote(quote)),
        Some(end) => Ok((body[..end].to_string(), &body[end + quote.len_utf8()..])),
    }
}

fn lex_bare(input: &str) -> (String, &str) {
    let end = input
        .find(is_reserved)
        .unwrap_or(input.len());
    (input[..end].to_string(), &input[end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_words_and_keywords() {
        let tokens = tokenize("rust and not go").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("rust".into()),
                Token::And,
                Token::Not,
                Token::Word("go".into()),
            ]
        );
    }

    #[test]
    fn test_punctuation_and_qualifiers() {
        let tokens = tokenize("(+title:rust -author:bob)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Plus,
                Token::Qualifier(Field::Title),
                Token::Word("rust".into()),
                Token::Minus,
                Token::Qualifier(Field::Author),
                Token::Word("bob".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_quoted_phrases() {
        let tokens = tokenize(r#""hello world" 'and more'"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("hello world".into()),
                Token::Word("and more".into()),
            ]
        );
    }

    #[test]
    fn test_quoted_keyword_stays_a_word() {
        // Quoting suppresses keyword recognition
        let tokens = tokenize(r#""and""#).unwrap();
        assert_eq!(tokens, vec![Token::Word("and".into())]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            tokenize("\"oops"),
            Err(QueryError::UnterminatedQuote('"'))
        ));
        assert!(matches!(
            tokenize("''"),
            Err(QueryError::UnterminatedQuote('\''))
        ));
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        // Only lowercase and/or/not are operators
        let tokens = tokenize("AND").unwrap();
        assert_eq!(tokens, vec![Token::Word("AND".into())]);
    }

    #[test]
    fn test_word_stops_at_reserved_chars() {
        let tokens = tokenize("alpha-beta").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("alpha".into()),
                Token::Minus,
                Token::Word("beta".into()),
            ]
        );
    }
}
