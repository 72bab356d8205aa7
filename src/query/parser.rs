use super::lexer::{tokenize, Token};
use super::{Expr, FieldMask, QueryError, Sense};

/// Recursive-descent parser for the filter query grammar.
///
/// ```text
/// expr    := and_expr ( "or" and_expr )*
/// and_expr:= not_expr ( "and" not_expr )*
/// not_expr:= "not" not_expr | primary
/// primary := "(" expr ")" | rule
/// rule    := [ "+" | "-" ] [ qualifier ] word
/// ```
///
/// Precedence, lowest to highest: `or`, `and`, `not` (right-associative).
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn parse(input: &str) -> Result<Expr, QueryError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(QueryError::TrailingInput(format!("{:?}", token))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.not_expr()?;
        loop {
            // Adjacent rules conjoin implicitly, so "+title:alpha -beta"
            // means "+title:alpha and -beta".
            if !self.eat(&Token::And) && !self.at_primary_start() {
                return Ok(left);
            }
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
    }

    fn at_primary_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Not
                    | Token::LParen
                    | Token::Plus
                    | Token::Minus
                    | Token::Qualifier(_)
                    | Token::Word(_)
            )
        )
    }

    fn not_expr(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::Not) {
            let inner = self.not_expr()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::LParen) {
            let inner = self.expr()?;
            if !self.eat(&Token::RParen) {
                return Err(QueryError::UnmatchedParen);
            }
            return Ok(inner);
        }
        self.rule()
    }

    fn rule(&mut self) -> Result<Expr, QueryError> {
        let sense = if self.eat(&Token::Plus) {
            Sense::Include
        } else if self.eat(&Token::Minus) {
            Sense::Exclude
        } else {
            Sense::Include
        };

        let fields = match self.peek() {
            Some(Token::Qualifier(field)) => {
                let mask = FieldMask::from(*field);
                self.pos += 1;
                mask
            }
            _ => FieldMask::ALL,
        };

        match self.advance() {
            Some(Token::Word(word)) => Ok(Expr::Rule { sense, fields, word }),
            Some(token) => Err(QueryError::UnexpectedToken(format!("{:?}", token))),
            None => Err(QueryError::UnexpectedEnd),
        }
    }
}
