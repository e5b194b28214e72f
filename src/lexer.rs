//! The tokenizer.
//!
//! Lowercase names lex as combinators, uppercase names as variables or
//! namespace components, runs of operator characters as operators. A few
//! exact operator spellings are reserved punctuation (`=`, `->`, `|`).
//! Both `//` line comments and `/* */` block comments are skipped.

use crate::error::{Error, Result};
use crate::escape::unescape;
use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    // punctuation
    Comma,
    Semicolon,
    Bar,
    LParen,
    RParen,
    LSquare,
    RSquare,
    LCurly,
    RCurly,
    Colon,
    DColon,
    Eq,
    Arrow,
    Lambda,
    Underscore,
    // names
    Lowercase,
    Uppercase,
    Operator,
    // literals
    Integer,
    HexInteger,
    Float,
    Char,
    Text,
    // keywords
    If,
    Then,
    Else,
    Try,
    Catch,
    Throw,
    Let,
    In,
    Data,
    Def,
    Val,
    Namespace,
    Using,
    Import,
}

impl TokenKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Eof => "end of input",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Bar => "'|'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LSquare => "'['",
            TokenKind::RSquare => "']'",
            TokenKind::LCurly => "'{'",
            TokenKind::RCurly => "'}'",
            TokenKind::Colon => "':'",
            TokenKind::DColon => "'::'",
            TokenKind::Eq => "'='",
            TokenKind::Arrow => "'->'",
            TokenKind::Lambda => "'\\'",
            TokenKind::Underscore => "'_'",
            TokenKind::Lowercase => "name",
            TokenKind::Uppercase => "variable",
            TokenKind::Operator => "operator",
            TokenKind::Integer => "integer",
            TokenKind::HexInteger => "hexadecimal integer",
            TokenKind::Float => "float",
            TokenKind::Char => "character",
            TokenKind::Text => "text",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::Try => "'try'",
            TokenKind::Catch => "'catch'",
            TokenKind::Throw => "'throw'",
            TokenKind::Let => "'let'",
            TokenKind::In => "'in'",
            TokenKind::Data => "'data'",
            TokenKind::Def => "'def'",
            TokenKind::Val => "'val'",
            TokenKind::Namespace => "'namespace'",
            TokenKind::Using => "'using'",
            TokenKind::Import => "'import'",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
    pub text: String,
}

/// Characters that may start or continue an operator.
pub fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '!' | '<' | '>' | '+' | '-' | '/' | '*' | '^' | '#' | '%' | '~' | '@' | '$' | '&'
            | '|' | '.'
    )
}

fn keyword(s: &str) -> Option<TokenKind> {
    match s {
        "if" => Some(TokenKind::If),
        "then" => Some(TokenKind::Then),
        "else" => Some(TokenKind::Else),
        "try" => Some(TokenKind::Try),
        "catch" => Some(TokenKind::Catch),
        "throw" => Some(TokenKind::Throw),
        "let" => Some(TokenKind::Let),
        "in" => Some(TokenKind::In),
        "data" => Some(TokenKind::Data),
        "def" => Some(TokenKind::Def),
        "val" => Some(TokenKind::Val),
        "namespace" => Some(TokenKind::Namespace),
        "using" => Some(TokenKind::Using),
        "import" => Some(TokenKind::Import),
        _ => None,
    }
}

struct Lexer<'a> {
    resource: String,
    chars: Vec<char>,
    at: usize,
    row: u32,
    col: u32,
    _source: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(resource: &str, source: &'a str) -> Self {
        Lexer {
            resource: resource.to_string(),
            chars: source.chars().collect(),
            at: 0,
            row: 1,
            col: 1,
            _source: source,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.resource.clone(), self.row, self.col)
    }

    fn look(&self, n: usize) -> Option<char> {
        self.chars.get(self.at + n).copied()
    }

    fn skip(&mut self) -> Option<char> {
        let c = self.chars.get(self.at).copied();
        if let Some(c) = c {
            self.at += 1;
            if c == '\n' {
                self.row += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        c
    }

    fn skip_white(&mut self) -> Result<()> {
        loop {
            match self.look(0) {
                Some(c) if c.is_whitespace() => {
                    self.skip();
                }
                Some('/') if self.look(1) == Some('/') => {
                    while let Some(c) = self.look(0) {
                        if c == '\n' {
                            break;
                        }
                        self.skip();
                    }
                }
                Some('/') if self.look(1) == Some('*') => {
                    let p = self.position();
                    self.skip();
                    self.skip();
                    loop {
                        match (self.look(0), self.look(1)) {
                            (Some('*'), Some('/')) => {
                                self.skip();
                                self.skip();
                                break;
                            }
                            (Some(_), _) => {
                                self.skip();
                            }
                            (None, _) => {
                                return Err(Error::Lexical(p, "unterminated comment".to_string()))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_number(&mut self) -> Result<Token> {
        let p = self.position();
        let mut s = String::new();
        if self.look(0) == Some('0') && self.look(1) == Some('x') {
            s.push(self.skip().unwrap_or('0'));
            s.push(self.skip().unwrap_or('x'));
            while let Some(c) = self.look(0) {
                if c.is_ascii_hexdigit() {
                    s.push(c);
                    self.skip();
                } else {
                    break;
                }
            }
            return Ok(Token {
                kind: TokenKind::HexInteger,
                position: p,
                text: s,
            });
        }
        while let Some(c) = self.look(0) {
            if c.is_ascii_digit() {
                s.push(c);
                self.skip();
            } else {
                break;
            }
        }
        let mut kind = TokenKind::Integer;
        if self.look(0) == Some('.') && self.look(1).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            kind = TokenKind::Float;
            s.push('.');
            self.skip();
            while let Some(c) = self.look(0) {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.skip();
                } else {
                    break;
                }
            }
            if matches!(self.look(0), Some('e') | Some('E')) {
                s.push('e');
                self.skip();
                if matches!(self.look(0), Some('+') | Some('-')) {
                    s.push(self.skip().unwrap_or('+'));
                }
                while let Some(c) = self.look(0) {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.skip();
                    } else {
                        break;
                    }
                }
            }
        }
        Ok(Token {
            kind,
            position: p,
            text: s,
        })
    }

    fn lex_quoted(&mut self, quote: char) -> Result<String> {
        let p = self.position();
        self.skip(); // opening quote
        let mut raw = String::new();
        loop {
            match self.look(0) {
                Some(c) if c == quote => {
                    self.skip();
                    break;
                }
                Some('\\') => {
                    raw.push('\\');
                    self.skip();
                    match self.skip() {
                        Some(c) => raw.push(c),
                        None => {
                            return Err(Error::Lexical(p, "unterminated literal".to_string()))
                        }
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.skip();
                }
                None => return Err(Error::Lexical(p, "unterminated literal".to_string())),
            }
        }
        unescape(&raw).ok_or_else(|| Error::Lexical(p, "malformed escape".to_string()))
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_white()?;
        let p = self.position();
        let c = match self.look(0) {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    position: p,
                    text: String::new(),
                })
            }
        };

        let sp = p.clone();
        let simple = move |kind| Token {
            kind,
            position: sp.clone(),
            text: c.to_string(),
        };

        match c {
            ',' => {
                self.skip();
                Ok(simple(TokenKind::Comma))
            }
            ';' => {
                self.skip();
                Ok(simple(TokenKind::Semicolon))
            }
            '(' => {
                self.skip();
                Ok(simple(TokenKind::LParen))
            }
            ')' => {
                self.skip();
                Ok(simple(TokenKind::RParen))
            }
            '[' => {
                self.skip();
                Ok(simple(TokenKind::LSquare))
            }
            ']' => {
                self.skip();
                Ok(simple(TokenKind::RSquare))
            }
            '{' => {
                self.skip();
                Ok(simple(TokenKind::LCurly))
            }
            '}' => {
                self.skip();
                Ok(simple(TokenKind::RCurly))
            }
            '\\' => {
                self.skip();
                Ok(simple(TokenKind::Lambda))
            }
            ':' => {
                self.skip();
                if self.look(0) == Some(':') {
                    self.skip();
                    Ok(Token {
                        kind: TokenKind::DColon,
                        position: p,
                        text: "::".to_string(),
                    })
                } else {
                    Ok(simple(TokenKind::Colon))
                }
            }
            '\'' => {
                let s = self.lex_quoted('\'')?;
                let mut cs = s.chars();
                match (cs.next(), cs.next()) {
                    (Some(ch), None) => Ok(Token {
                        kind: TokenKind::Char,
                        position: p,
                        text: ch.to_string(),
                    }),
                    _ => Err(Error::Lexical(p, "malformed character literal".to_string())),
                }
            }
            '"' => {
                let s = self.lex_quoted('"')?;
                Ok(Token {
                    kind: TokenKind::Text,
                    position: p,
                    text: s,
                })
            }
            '_' if !self
                .look(1)
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false) =>
            {
                self.skip();
                Ok(simple(TokenKind::Underscore))
            }
            c if c.is_ascii_digit() => self.lex_number(),
            c if is_operator_char(c) => {
                let mut s = String::new();
                while let Some(c) = self.look(0) {
                    if is_operator_char(c) {
                        s.push(c);
                        self.skip();
                    } else {
                        break;
                    }
                }
                let kind = match s.as_str() {
                    "=" => TokenKind::Eq,
                    "->" => TokenKind::Arrow,
                    "|" => TokenKind::Bar,
                    _ => TokenKind::Operator,
                };
                Ok(Token {
                    kind,
                    position: p,
                    text: s,
                })
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(c) = self.look(0) {
                    if c.is_alphanumeric() || c == '_' {
                        s.push(c);
                        self.skip();
                    } else {
                        break;
                    }
                }
                let kind = if c.is_uppercase() {
                    TokenKind::Uppercase
                } else {
                    keyword(&s).unwrap_or(TokenKind::Lowercase)
                };
                Ok(Token {
                    kind,
                    position: p,
                    text: s,
                })
            }
            c => Err(Error::Lexical(p, format!("unexpected character '{}'", c))),
        }
    }
}

/// Tokenize a source; the result always ends with an `Eof` token.
pub fn tokenize(resource: &str, source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(resource, source);
    let mut tokens = Vec::new();
    loop {
        let t = lexer.next_token()?;
        let done = t.kind == TokenKind::Eof;
        tokens.push(t);
        if done {
            return Ok(tokens);
        }
    }
}

/// A token stream with lookahead, consumed by the parser and the assembler.
pub struct Tokens {
    tokens: Vec<Token>,
    at: usize,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>) -> Self {
        Tokens { tokens, at: 0 }
    }

    pub fn from_source(resource: &str, source: &str) -> Result<Tokens> {
        Ok(Tokens::new(tokenize(resource, source)?))
    }

    pub fn look(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.at + n).min(last)]
    }

    pub fn kind(&self) -> TokenKind {
        self.look(0).kind
    }

    pub fn text(&self) -> &str {
        &self.look(0).text
    }

    pub fn position(&self) -> Position {
        self.look(0).position.clone()
    }

    pub fn skip(&mut self) {
        if self.at + 1 < self.tokens.len() {
            self.at += 1;
        }
    }

    pub fn is_kind(&self, k: TokenKind) -> bool {
        self.kind() == k
    }

    pub fn is_text(&self, s: &str) -> bool {
        self.text() == s
    }

    pub fn force(&mut self, k: TokenKind) -> Result<Token> {
        if self.kind() == k {
            let t = self.look(0).clone();
            self.skip();
            Ok(t)
        } else {
            Err(Error::Syntactical(
                self.position(),
                format!("{} expected, found {}", k.describe(), self.kind().describe()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize("test", src).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_definition() {
        let ks = kinds("def fac = [0 -> 1 | N -> N * (fac (N - 1))]");
        assert_eq!(ks[0], TokenKind::Def);
        assert_eq!(ks[1], TokenKind::Lowercase);
        assert_eq!(ks[2], TokenKind::Eq);
        assert_eq!(ks[3], TokenKind::LSquare);
        assert!(ks.contains(&TokenKind::Arrow));
        assert!(ks.contains(&TokenKind::Bar));
        assert_eq!(*ks.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn test_operators_and_punctuation() {
        let ts = tokenize("test", "a <= b :: c . d == e").unwrap();
        assert_eq!(ts[1].kind, TokenKind::Operator);
        assert_eq!(ts[1].text, "<=");
        assert_eq!(ts[3].kind, TokenKind::DColon);
        assert_eq!(ts[5].kind, TokenKind::Operator);
        assert_eq!(ts[5].text, ".");
        assert_eq!(ts[7].text, "==");
    }

    #[test]
    fn test_literals() {
        let ts = tokenize("test", "42 0xff 3.14 'a' '\\n' \"hi\\tthere\"").unwrap();
        assert_eq!(ts[0].kind, TokenKind::Integer);
        assert_eq!(ts[1].kind, TokenKind::HexInteger);
        assert_eq!(ts[2].kind, TokenKind::Float);
        assert_eq!(ts[3].kind, TokenKind::Char);
        assert_eq!(ts[4].kind, TokenKind::Char);
        assert_eq!(ts[4].text, "\n");
        assert_eq!(ts[5].kind, TokenKind::Text);
        assert_eq!(ts[5].text, "hi\tthere");
    }

    #[test]
    fn test_comments() {
        let ks = kinds("1 // comment\n /* block \n comment */ 2");
        assert_eq!(ks, vec![TokenKind::Integer, TokenKind::Integer, TokenKind::Eof]);
    }

    #[test]
    fn test_wildcard_vs_identifier() {
        let ts = tokenize("test", "_ _x X").unwrap();
        assert_eq!(ts[0].kind, TokenKind::Underscore);
        assert_eq!(ts[1].kind, TokenKind::Lowercase);
        assert_eq!(ts[2].kind, TokenKind::Uppercase);
    }

    #[test]
    fn test_positions() {
        let ts = tokenize("m.eg", "a\n  b").unwrap();
        assert_eq!(ts[1].position.row(), 2);
        assert_eq!(ts[1].position.col(), 3);
    }

    #[test]
    fn test_unterminated_text() {
        assert!(tokenize("test", "\"abc").is_err());
    }
}
