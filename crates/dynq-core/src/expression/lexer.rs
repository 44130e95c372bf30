//! Tokenizer for expression text.
//!
//! Tokens are produced one at a time by [`Lexer::next_token`]; the parser
//! holds only the current token. Positions are character indices into the
//! source text.

use std::fmt;

use crate::error::ParseError;

/// Token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// End of input; returned repeatedly once reached.
    End,
    /// Identifier or keyword (`@0` included).
    Identifier,
    /// Quoted literal, quotes included in the token text.
    StringLiteral,
    /// Digits only.
    IntegerLiteral,
    /// Digits with a fraction, exponent, or `f` suffix.
    RealLiteral,
    /// `!`
    Exclamation,
    /// `%`
    Percent,
    /// `&`
    Ampersand,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// `,`
    Comma,
    /// `-`
    Minus,
    /// `.`
    Dot,
    /// `/`
    Slash,
    /// `:`
    Colon,
    /// `<`
    LessThan,
    /// `=`
    Equal,
    /// `>`
    GreaterThan,
    /// `?`
    Question,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `|`
    Bar,
    /// `!=`
    ExclamationEqual,
    /// `&&`
    DoubleAmpersand,
    /// `<=`
    LessThanEqual,
    /// `<>`
    LessGreater,
    /// `==`
    DoubleEqual,
    /// `>=`
    GreaterThanEqual,
    /// `||`
    DoubleBar,
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Category.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: String,
    /// Character index of the first character.
    pub pos: usize,
}

impl Token {
    /// Whether this is the identifier `word`, ignoring case.
    #[must_use]
    pub fn is_identifier(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::End {
            f.write_str("end of expression")
        } else {
            write!(f, "'{}'", self.text)
        }
    }
}

/// Character cursor over the expression text.
#[derive(Debug)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    /// Start lexing `text` at its first character.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    /// Consume `next` if it is the current character.
    fn eat(&mut self, next: char) -> bool {
        if self.current() == Some(next) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Lex the next token, skipping leading whitespace.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        while self.current().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let start = self.pos;
        let Some(ch) = self.current() else {
            return Ok(Token {
                kind: TokenKind::End,
                text: String::new(),
                pos: start,
            });
        };

        let kind = match ch {
            '"' | '\'' => self.read_string(ch)?,
            c if c.is_alphabetic() || c == '@' || c == '_' => {
                self.bump();
                while self.current().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                    self.bump();
                }
                TokenKind::Identifier
            }
            c if c.is_ascii_digit() => self.read_number()?,
            _ => {
                self.bump();
                self.read_punctuation(ch, start)?
            }
        };

        Ok(Token {
            kind,
            text: self.chars[start..self.pos].iter().collect(),
            pos: start,
        })
    }

    fn read_punctuation(&mut self, ch: char, start: usize) -> Result<TokenKind, ParseError> {
        let kind = match ch {
            '!' if self.eat('=') => TokenKind::ExclamationEqual,
            '!' => TokenKind::Exclamation,
            '%' => TokenKind::Percent,
            '&' if self.eat('&') => TokenKind::DoubleAmpersand,
            '&' => TokenKind::Ampersand,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '*' => TokenKind::Asterisk,
            '+' => TokenKind::Plus,
            ',' => TokenKind::Comma,
            '-' => TokenKind::Minus,
            '.' => TokenKind::Dot,
            '/' => TokenKind::Slash,
            ':' => TokenKind::Colon,
            '<' if self.eat('=') => TokenKind::LessThanEqual,
            '<' if self.eat('>') => TokenKind::LessGreater,
            '<' => TokenKind::LessThan,
            '=' if self.eat('=') => TokenKind::DoubleEqual,
            '=' => TokenKind::Equal,
            '>' if self.eat('=') => TokenKind::GreaterThanEqual,
            '>' => TokenKind::GreaterThan,
            '?' => TokenKind::Question,
            '[' => TokenKind::OpenBracket,
            ']' => TokenKind::CloseBracket,
            '|' if self.eat('|') => TokenKind::DoubleBar,
            '|' => TokenKind::Bar,
            other => return Err(ParseError::InvalidCharacter { ch: other, pos: start }),
        };
        Ok(kind)
    }

    /// A doubled quote inside the literal stands for one quote character.
    fn read_string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        loop {
            self.bump();
            while self.current().is_some_and(|c| c != quote) {
                self.bump();
            }
            if self.current().is_none() {
                return Err(ParseError::UnterminatedStringLiteral { pos: self.pos });
            }
            self.bump();
            if self.current() != Some(quote) {
                return Ok(TokenKind::StringLiteral);
            }
        }
    }

    fn read_number(&mut self) -> Result<TokenKind, ParseError> {
        let mut kind = TokenKind::IntegerLiteral;
        self.read_digits();
        if self.current() == Some('.') {
            kind = TokenKind::RealLiteral;
            self.bump();
            self.expect_digit()?;
            self.read_digits();
        }
        if matches!(self.current(), Some('e' | 'E')) {
            kind = TokenKind::RealLiteral;
            self.bump();
            if matches!(self.current(), Some('+' | '-')) {
                self.bump();
            }
            self.expect_digit()?;
            self.read_digits();
        }
        if matches!(self.current(), Some('f' | 'F')) {
            kind = TokenKind::RealLiteral;
            self.bump();
        }
        Ok(kind)
    }

    fn read_digits(&mut self) {
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn expect_digit(&self) -> Result<(), ParseError> {
        if self.current().is_some_and(|c| c.is_ascii_digit()) {
            Ok(())
        } else {
            Err(ParseError::DigitExpected { pos: self.pos })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<(TokenKind, String)> {
        let mut lexer = Lexer::new(text);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::End {
                return tokens;
            }
            tokens.push((token.kind, token.text));
        }
    }

    #[test]
    fn test_should_lex_comparison_with_argument() {
        let tokens = lex("Name == \"Home\" and CreateDate > @0");
        let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::DoubleEqual,
                TokenKind::StringLiteral,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::GreaterThan,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(tokens[2].1, "\"Home\"");
        assert_eq!(tokens[6].1, "@0");
    }

    #[test]
    fn test_should_lex_two_character_operators() {
        let kinds: Vec<TokenKind> = lex("!= && <= <> == >= || < > = ! & |")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::ExclamationEqual,
                TokenKind::DoubleAmpersand,
                TokenKind::LessThanEqual,
                TokenKind::LessGreater,
                TokenKind::DoubleEqual,
                TokenKind::GreaterThanEqual,
                TokenKind::DoubleBar,
                TokenKind::LessThan,
                TokenKind::GreaterThan,
                TokenKind::Equal,
                TokenKind::Exclamation,
                TokenKind::Ampersand,
                TokenKind::Bar,
            ]
        );
    }

    #[test]
    fn test_should_lex_real_literals() {
        assert_eq!(lex("1.5")[0].0, TokenKind::RealLiteral);
        assert_eq!(lex("1e10")[0].0, TokenKind::RealLiteral);
        assert_eq!(lex("2.5e-3")[0], (TokenKind::RealLiteral, "2.5e-3".to_owned()));
        assert_eq!(lex("3f")[0], (TokenKind::RealLiteral, "3f".to_owned()));
        assert_eq!(lex("42")[0].0, TokenKind::IntegerLiteral);
    }

    #[test]
    fn test_should_keep_doubled_quotes_in_one_token() {
        let tokens = lex("'it''s' \"say \"\"hi\"\"\"");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].1, "'it''s'");
        assert_eq!(tokens[1].1, "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_should_reject_unterminated_string() {
        let mut lexer = Lexer::new("Name == \"Home");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err, ParseError::UnterminatedStringLiteral { pos: 13 });
    }

    #[test]
    fn test_should_reject_invalid_character() {
        let mut lexer = Lexer::new("a # b");
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err, ParseError::InvalidCharacter { ch: '#', pos: 2 });
    }

    #[test]
    fn test_should_require_digit_after_decimal_point() {
        let err = Lexer::new("1.x").next_token().unwrap_err();
        assert_eq!(err, ParseError::DigitExpected { pos: 2 });
    }

    #[test]
    fn test_should_repeat_end_token() {
        let mut lexer = Lexer::new("  ");
        for _ in 0..3 {
            let token = lexer.next_token().unwrap();
            assert_eq!(token.kind, TokenKind::End);
            assert_eq!(token.pos, 2);
        }
    }
}
