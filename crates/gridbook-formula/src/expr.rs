//! Arithmetic over the residue of a formula after every reference and
//! aggregate has been substituted with a numeric literal: numbers, the four
//! operators, and parentheses.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    /// A run of letters survived substitution: an unrecognized name.
    UnknownName(String),
    /// Anything else that fails to lex or parse.
    Malformed(String),
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::UnknownName(name) => write!(f, "unknown name: {name}"),
            ExprError::Malformed(msg) => write!(f, "malformed expression: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.position += 1;
                }
                '+' => {
                    self.position += 1;
                    tokens.push(Token::Plus);
                }
                '-' => {
                    self.position += 1;
                    tokens.push(Token::Minus);
                }
                '*' => {
                    self.position += 1;
                    tokens.push(Token::Star);
                }
                '/' => {
                    self.position += 1;
                    tokens.push(Token::Slash);
                }
                '(' => {
                    self.position += 1;
                    tokens.push(Token::LeftParen);
                }
                ')' => {
                    self.position += 1;
                    tokens.push(Token::RightParen);
                }
                '0'..='9' | '.' => tokens.push(self.read_number()?),
                c if c.is_ascii_alphabetic() => {
                    return Err(ExprError::UnknownName(self.read_word()));
                }
                c => {
                    return Err(ExprError::Malformed(format!("unexpected character: {c}")));
                }
            }
        }

        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let mut s = String::new();
        let mut has_dot = false;
        let mut has_exp = false;

        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    s.push(c);
                    self.position += 1;
                }
                '.' if !has_dot && !has_exp => {
                    has_dot = true;
                    s.push(c);
                    self.position += 1;
                }
                'e' | 'E' if !has_exp => {
                    has_exp = true;
                    s.push(c);
                    self.position += 1;
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        s.push(sign);
                        self.position += 1;
                    }
                }
                _ => break,
            }
        }

        s.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExprError::Malformed(format!("invalid number: {s}")))
    }

    fn read_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.position += 1;
            } else {
                break;
            }
        }
        s
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.position += 1;
        token
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.position += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.position += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.position += 1;
                    value *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.position += 1;
                    // Division by zero surfaces as an infinity and is
                    // classified by the caller, not rejected here.
                    value /= self.factor()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // factor := ('+' | '-')* (number | '(' expression ')')
    fn factor(&mut self) -> Result<f64, ExprError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Plus) => self.factor(),
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::LeftParen) => {
                let value = self.expression()?;
                match self.advance() {
                    Some(Token::RightParen) => Ok(value),
                    _ => Err(ExprError::Malformed("expected ')'".into())),
                }
            }
            Some(token) => Err(ExprError::Malformed(format!("unexpected token: {token:?}"))),
            None => Err(ExprError::Malformed("unexpected end of expression".into())),
        }
    }
}

/// Evaluate a pure arithmetic expression. Infinities and NaN are legal
/// results; the caller maps them to error symbols.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };

    let value = parser.expression()?;
    if parser.position != parser.tokens.len() {
        return Err(ExprError::Malformed("trailing input".into()));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_and_precedence() {
        assert_eq!(evaluate("42").unwrap(), 42.0);
        assert_eq!(evaluate("2+3*4").unwrap(), 14.0);
        assert_eq!(evaluate("(2+3)*4").unwrap(), 20.0);
        assert_eq!(evaluate("10/4").unwrap(), 2.5);
        assert_eq!(evaluate("10-2-3").unwrap(), 5.0);
        assert_eq!(evaluate("100/5/2").unwrap(), 10.0);
    }

    #[test]
    fn test_unary_signs() {
        assert_eq!(evaluate("-5").unwrap(), -5.0);
        assert_eq!(evaluate("3--5").unwrap(), 8.0);
        assert_eq!(evaluate("3++5").unwrap(), 8.0);
        assert_eq!(evaluate("-(2+3)").unwrap(), -5.0);
    }

    #[test]
    fn test_scientific_and_decimal_literals() {
        assert_eq!(evaluate("1e3+2").unwrap(), 1002.0);
        assert_eq!(evaluate("2.5e-1").unwrap(), 0.25);
        assert_eq!(evaluate(".5*2").unwrap(), 1.0);
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        assert!(evaluate("10/0").unwrap().is_infinite());
        assert!(evaluate("0/0").unwrap().is_nan());
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            evaluate("FOO(2)"),
            Err(ExprError::UnknownName(name)) if name == "FOO"
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(evaluate(""), Err(ExprError::Malformed(_))));
        assert!(matches!(evaluate("1+"), Err(ExprError::Malformed(_))));
        assert!(matches!(evaluate("(1+2"), Err(ExprError::Malformed(_))));
        assert!(matches!(evaluate("1 2"), Err(ExprError::Malformed(_))));
        assert!(matches!(evaluate("1:2"), Err(ExprError::Malformed(_))));
    }
}
