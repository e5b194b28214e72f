//! The recursive-descent parser.
//!
//! Applications are juxtaposed primaries; operator expressions are parsed by
//! precedence climbing with binding strength and associativity taken from
//! the operator table. Patterns share the expression node type.

use crate::ast::{Alternative, Decl, Expr, Line, Match, Unit};
use crate::error::{Error, Result};
use crate::lexer::{TokenKind, Tokens};
use crate::operators;
use crate::position::Position;

pub struct Parser {
    tokens: Tokens,
}

impl Parser {
    pub fn new(tokens: Tokens) -> Self {
        Parser { tokens }
    }

    pub fn from_source(resource: &str, source: &str) -> Result<Self> {
        Ok(Parser::new(Tokens::from_source(resource, source)?))
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::Syntactical(self.tokens.position(), msg.into())
    }

    fn position(&self) -> Position {
        self.tokens.position()
    }

    // --- declarations ---

    /// Parse a whole module body.
    pub fn parse_unit(&mut self) -> Result<Unit> {
        let mut decls = Vec::new();
        loop {
            while self.tokens.is_kind(TokenKind::Semicolon) {
                self.tokens.skip();
            }
            if self.tokens.is_kind(TokenKind::Eof) {
                return Ok(Unit { decls });
            }
            decls.push(self.parse_decl()?);
        }
    }

    /// Parse an interactive line: `;`-separated declarations and
    /// expressions.
    pub fn parse_line(&mut self) -> Result<Vec<Line>> {
        let mut items = Vec::new();
        loop {
            while self.tokens.is_kind(TokenKind::Semicolon) {
                self.tokens.skip();
            }
            if self.tokens.is_kind(TokenKind::Eof) {
                return Ok(items);
            }
            if self.at_decl() {
                items.push(Line::Decl(self.parse_decl()?));
            } else {
                items.push(Line::Expr(self.parse_expr()?));
            }
        }
    }

    fn at_decl(&self) -> bool {
        matches!(
            self.tokens.kind(),
            TokenKind::Data
                | TokenKind::Def
                | TokenKind::Val
                | TokenKind::Namespace
                | TokenKind::Using
                | TokenKind::Import
        )
    }

    fn parse_decl(&mut self) -> Result<Decl> {
        let p = self.position();
        match self.tokens.kind() {
            TokenKind::Namespace => {
                self.tokens.skip();
                let path = self.parse_uppercase_path()?;
                self.tokens.force(TokenKind::LParen)?;
                let mut decls = Vec::new();
                while !self.tokens.is_kind(TokenKind::RParen) {
                    if self.tokens.is_kind(TokenKind::Eof) {
                        return Err(self.error("')' expected"));
                    }
                    while self.tokens.is_kind(TokenKind::Semicolon) {
                        self.tokens.skip();
                    }
                    if self.tokens.is_kind(TokenKind::RParen) {
                        break;
                    }
                    decls.push(self.parse_decl()?);
                }
                self.tokens.force(TokenKind::RParen)?;
                Ok(Decl::Namespace(p, path, decls))
            }
            TokenKind::Import => {
                self.tokens.skip();
                let t = self.tokens.force(TokenKind::Text)?;
                Ok(Decl::Import(p, t.text))
            }
            TokenKind::Using => {
                self.tokens.skip();
                let path = self.parse_uppercase_path()?;
                Ok(Decl::Using(p, path))
            }
            TokenKind::Data => {
                self.tokens.skip();
                let mut names = Vec::new();
                loop {
                    let n = self.parse_decl_name()?;
                    names.push(n);
                    if self.tokens.is_kind(TokenKind::Comma) {
                        self.tokens.skip();
                    } else {
                        break;
                    }
                }
                Ok(Decl::Data(p, names))
            }
            TokenKind::Def => {
                self.tokens.skip();
                let n = self.parse_decl_name()?;
                self.tokens.force(TokenKind::Eq)?;
                let e = self.parse_expr()?;
                Ok(Decl::Def(p, n, e))
            }
            TokenKind::Val => {
                self.tokens.skip();
                let n = self.parse_decl_name()?;
                self.tokens.force(TokenKind::Eq)?;
                let e = self.parse_expr()?;
                Ok(Decl::Val(p, n, e))
            }
            _ => Err(self.error("declaration expected")),
        }
    }

    /// A declared name: a combinator or an operator.
    fn parse_decl_name(&mut self) -> Result<Expr> {
        let p = self.position();
        match self.tokens.kind() {
            TokenKind::Lowercase | TokenKind::Operator => {
                let n = self.tokens.text().to_string();
                self.tokens.skip();
                Ok(Expr::Combinator(p, Vec::new(), n))
            }
            _ => Err(self.error("combinator or operator name expected")),
        }
    }

    fn parse_uppercase_path(&mut self) -> Result<Vec<String>> {
        let mut path = Vec::new();
        let t = self.tokens.force(TokenKind::Uppercase)?;
        path.push(t.text);
        while self.tokens.is_kind(TokenKind::DColon) {
            self.tokens.skip();
            let t = self.tokens.force(TokenKind::Uppercase)?;
            path.push(t.text);
        }
        Ok(path)
    }

    // --- expressions ---

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: usize) -> Result<Expr> {
        let mut lhs = self.parse_operand()?;
        loop {
            if !self.tokens.is_kind(TokenKind::Operator) {
                return Ok(lhs);
            }
            let op = self.tokens.text().to_string();
            if !operators::is_infix(&op) || operators::precedence(&op) < min_prec {
                return Ok(lhs);
            }
            let p = self.position();
            self.tokens.skip();
            let next_min = if operators::is_right_associative(&op) {
                operators::precedence(&op)
            } else {
                operators::precedence(&op) + 1
            };
            let rhs = self.parse_binary(next_min)?;
            lhs = apply(
                p.clone(),
                Expr::Combinator(p, Vec::new(), op),
                vec![lhs, rhs],
            );
        }
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        if self.tokens.is_kind(TokenKind::Operator) && operators::is_prefix(self.tokens.text()) {
            let p = self.position();
            let op = self.tokens.text().to_string();
            self.tokens.skip();
            if op == "-" {
                // fold negative literals; otherwise monadic minus
                match self.tokens.kind() {
                    TokenKind::Integer | TokenKind::HexInteger => {
                        let n = self.parse_integer_literal()?;
                        let first = Expr::Integer(p, -n);
                        return self.parse_application_from(first);
                    }
                    TokenKind::Float => {
                        let t = self.tokens.force(TokenKind::Float)?;
                        let f = t
                            .text
                            .parse::<f64>()
                            .map_err(|_| self.error("malformed float"))?;
                        let first = Expr::Float(p, -f);
                        return self.parse_application_from(first);
                    }
                    _ => {
                        let e = self.parse_operand()?;
                        return Ok(apply(
                            p.clone(),
                            Expr::Combinator(p, Vec::new(), "!-".to_string()),
                            vec![e],
                        ));
                    }
                }
            }
            let e = self.parse_operand()?;
            return Ok(apply(p.clone(), Expr::Combinator(p, Vec::new(), op), vec![e]));
        }
        self.parse_application()
    }

    fn parse_application(&mut self) -> Result<Expr> {
        let first = self.parse_primary()?;
        self.parse_application_from(first)
    }

    fn parse_application_from(&mut self, first: Expr) -> Result<Expr> {
        let p = first.position();
        let mut args = Vec::new();
        while self.at_primary() {
            args.push(self.parse_primary()?);
        }
        if args.is_empty() {
            Ok(first)
        } else {
            Ok(apply(p, first, args))
        }
    }

    fn at_primary(&self) -> bool {
        matches!(
            self.tokens.kind(),
            TokenKind::Integer
                | TokenKind::HexInteger
                | TokenKind::Float
                | TokenKind::Char
                | TokenKind::Text
                | TokenKind::Lowercase
                | TokenKind::Uppercase
                | TokenKind::Underscore
                | TokenKind::LParen
                | TokenKind::LCurly
                | TokenKind::LSquare
                | TokenKind::Lambda
                | TokenKind::If
                | TokenKind::Try
                | TokenKind::Throw
                | TokenKind::Let
        )
    }

    fn parse_integer_literal(&mut self) -> Result<i64> {
        let t = self.tokens.look(0).clone();
        match t.kind {
            TokenKind::Integer => {
                self.tokens.skip();
                t.text
                    .parse::<i64>()
                    .map_err(|_| Error::Syntactical(t.position, "malformed integer".to_string()))
            }
            TokenKind::HexInteger => {
                self.tokens.skip();
                i64::from_str_radix(t.text.trim_start_matches("0x"), 16)
                    .map_err(|_| Error::Syntactical(t.position, "malformed integer".to_string()))
            }
            _ => Err(self.error("integer expected")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let p = self.position();
        match self.tokens.kind() {
            TokenKind::Integer | TokenKind::HexInteger => {
                let n = self.parse_integer_literal()?;
                Ok(Expr::Integer(p, n))
            }
            TokenKind::Float => {
                let t = self.tokens.force(TokenKind::Float)?;
                let f = t
                    .text
                    .parse::<f64>()
                    .map_err(|_| self.error("malformed float"))?;
                Ok(Expr::Float(p, f))
            }
            TokenKind::Char => {
                let t = self.tokens.force(TokenKind::Char)?;
                Ok(Expr::Char(p, t.text.chars().next().unwrap_or('?')))
            }
            TokenKind::Text => {
                let t = self.tokens.force(TokenKind::Text)?;
                Ok(Expr::Text(p, t.text))
            }
            TokenKind::Lowercase => {
                let t = self.tokens.force(TokenKind::Lowercase)?;
                Ok(Expr::Combinator(p, Vec::new(), t.text))
            }
            TokenKind::Uppercase => self.parse_name(),
            TokenKind::Underscore => {
                self.tokens.skip();
                Ok(Expr::Wildcard(p))
            }
            TokenKind::LParen => self.parse_parenthesised(),
            TokenKind::LCurly => self.parse_list(false),
            TokenKind::LSquare => {
                self.tokens.skip();
                let m = self.parse_match(TokenKind::RSquare)?;
                self.tokens.force(TokenKind::RSquare)?;
                Ok(Expr::Lambda(p, m))
            }
            TokenKind::Lambda => {
                self.tokens.skip();
                let mut patterns = Vec::new();
                while !self.tokens.is_kind(TokenKind::Arrow) {
                    patterns.push(self.parse_pattern()?);
                }
                self.tokens.force(TokenKind::Arrow)?;
                let body = self.parse_expr()?;
                Ok(Expr::Lambda(
                    p,
                    Match {
                        alternatives: vec![Alternative {
                            patterns,
                            guard: None,
                            body,
                        }],
                    },
                ))
            }
            TokenKind::If => {
                self.tokens.skip();
                let c = self.parse_expr()?;
                self.tokens.force(TokenKind::Then)?;
                let t = self.parse_expr()?;
                self.tokens.force(TokenKind::Else)?;
                let e = self.parse_expr()?;
                Ok(Expr::If(p, Box::new(c), Box::new(t), Box::new(e)))
            }
            TokenKind::Try => {
                self.tokens.skip();
                let e = self.parse_expr()?;
                self.tokens.force(TokenKind::Catch)?;
                let h = self.parse_expr()?;
                Ok(Expr::Try(p, Box::new(e), Box::new(h)))
            }
            TokenKind::Throw => {
                self.tokens.skip();
                let e = self.parse_expr()?;
                Ok(Expr::Throw(p, Box::new(e)))
            }
            TokenKind::Let => {
                self.tokens.skip();
                let pat = self.parse_pattern()?;
                self.tokens.force(TokenKind::Eq)?;
                let v = self.parse_expr()?;
                self.tokens.force(TokenKind::In)?;
                let b = self.parse_expr()?;
                Ok(Expr::Let(p, Box::new(pat), Box::new(v), Box::new(b)))
            }
            _ => Err(self.error(format!(
                "expression expected, found {}",
                self.tokens.kind().describe()
            ))),
        }
    }

    /// A possibly-qualified name starting with an uppercase segment. A bare
    /// uppercase name is a variable; a path is a combinator reference.
    fn parse_name(&mut self) -> Result<Expr> {
        let p = self.position();
        let t = self.tokens.force(TokenKind::Uppercase)?;
        let mut segments = vec![t.text];
        while self.tokens.is_kind(TokenKind::DColon) {
            self.tokens.skip();
            match self.tokens.kind() {
                TokenKind::Uppercase => {
                    segments.push(self.tokens.text().to_string());
                    self.tokens.skip();
                }
                TokenKind::Lowercase | TokenKind::Operator => {
                    let n = self.tokens.text().to_string();
                    self.tokens.skip();
                    return Ok(Expr::Combinator(p, segments, n));
                }
                _ => return Err(self.error("name expected after '::'")),
            }
        }
        if segments.len() == 1 {
            Ok(Expr::Variable(p, segments.remove(0)))
        } else {
            let n = segments.pop().unwrap_or_default();
            Ok(Expr::Combinator(p, segments, n))
        }
    }

    fn parse_parenthesised(&mut self) -> Result<Expr> {
        let p = self.position();
        self.tokens.force(TokenKind::LParen)?;
        if self.tokens.is_kind(TokenKind::RParen) {
            self.tokens.skip();
            return Ok(Expr::combinator_fq(p, "System::nop"));
        }
        // `(+)` names an operator combinator
        if matches!(self.tokens.kind(), TokenKind::Operator | TokenKind::Eq | TokenKind::Bar)
            && self.tokens.look(1).kind == TokenKind::RParen
        {
            let n = self.tokens.text().to_string();
            self.tokens.skip();
            self.tokens.skip();
            return Ok(Expr::Combinator(p, Vec::new(), n));
        }
        let first = self.parse_expr()?;
        if self.tokens.is_kind(TokenKind::Comma) {
            let mut elements = vec![first];
            while self.tokens.is_kind(TokenKind::Comma) {
                self.tokens.skip();
                elements.push(self.parse_expr()?);
            }
            self.tokens.force(TokenKind::RParen)?;
            Ok(Expr::Tuple(p, elements))
        } else {
            self.tokens.force(TokenKind::RParen)?;
            Ok(first)
        }
    }

    /// `{…}` list literals and list patterns.
    fn parse_list(&mut self, pattern: bool) -> Result<Expr> {
        let p = self.position();
        self.tokens.force(TokenKind::LCurly)?;
        if self.tokens.is_kind(TokenKind::RCurly) {
            self.tokens.skip();
            return Ok(Expr::List(p, Vec::new(), None));
        }
        let mut elements = Vec::new();
        let mut tail = None;
        loop {
            let e = if pattern {
                self.parse_pattern()?
            } else {
                self.parse_expr()?
            };
            elements.push(e);
            match self.tokens.kind() {
                TokenKind::Comma => {
                    self.tokens.skip();
                }
                TokenKind::Bar => {
                    self.tokens.skip();
                    let t = if pattern {
                        self.parse_pattern()?
                    } else {
                        self.parse_expr()?
                    };
                    tail = Some(Box::new(t));
                    break;
                }
                _ => break,
            }
        }
        self.tokens.force(TokenKind::RCurly)?;
        Ok(Expr::List(p, elements, tail))
    }

    fn parse_match(&mut self, terminator: TokenKind) -> Result<Match> {
        let mut alternatives = Vec::new();
        loop {
            let mut patterns = Vec::new();
            while !self.tokens.is_kind(TokenKind::Arrow) {
                if self.tokens.is_kind(TokenKind::Eof) {
                    return Err(self.error("'->' expected"));
                }
                patterns.push(self.parse_pattern()?);
            }
            self.tokens.force(TokenKind::Arrow)?;
            let body = self.parse_expr()?;
            alternatives.push(Alternative {
                patterns,
                guard: None,
                body,
            });
            if self.tokens.is_kind(TokenKind::Bar) {
                self.tokens.skip();
            } else if self.tokens.is_kind(terminator) {
                return Ok(Match { alternatives });
            } else {
                return Err(self.error(format!(
                    "'|' or {} expected, found {}",
                    terminator.describe(),
                    self.tokens.kind().describe()
                )));
            }
        }
    }

    // --- patterns ---

    pub fn parse_pattern(&mut self) -> Result<Expr> {
        let p = self.position();
        match self.tokens.kind() {
            TokenKind::Integer | TokenKind::HexInteger => {
                let n = self.parse_integer_literal()?;
                Ok(Expr::Integer(p, n))
            }
            TokenKind::Operator if self.tokens.is_text("-") => {
                self.tokens.skip();
                match self.tokens.kind() {
                    TokenKind::Integer | TokenKind::HexInteger => {
                        let n = self.parse_integer_literal()?;
                        Ok(Expr::Integer(p, -n))
                    }
                    TokenKind::Float => {
                        let t = self.tokens.force(TokenKind::Float)?;
                        let f = t
                            .text
                            .parse::<f64>()
                            .map_err(|_| self.error("malformed float"))?;
                        Ok(Expr::Float(p, -f))
                    }
                    _ => Err(self.error("literal expected after '-'")),
                }
            }
            TokenKind::Float => {
                let t = self.tokens.force(TokenKind::Float)?;
                let f = t
                    .text
                    .parse::<f64>()
                    .map_err(|_| self.error("malformed float"))?;
                Ok(Expr::Float(p, f))
            }
            TokenKind::Char => {
                let t = self.tokens.force(TokenKind::Char)?;
                Ok(Expr::Char(p, t.text.chars().next().unwrap_or('?')))
            }
            TokenKind::Text => {
                let t = self.tokens.force(TokenKind::Text)?;
                Ok(Expr::Text(p, t.text))
            }
            TokenKind::Underscore => {
                self.tokens.skip();
                Ok(Expr::Wildcard(p))
            }
            TokenKind::Lowercase => {
                let t = self.tokens.force(TokenKind::Lowercase)?;
                Ok(Expr::Combinator(p, Vec::new(), t.text))
            }
            TokenKind::Uppercase => self.parse_name(),
            TokenKind::LCurly => self.parse_list(true),
            TokenKind::LParen => {
                self.tokens.skip();
                let first = self.parse_pattern()?;
                if self.tokens.is_kind(TokenKind::Comma) {
                    let mut elements = vec![first];
                    while self.tokens.is_kind(TokenKind::Comma) {
                        self.tokens.skip();
                        elements.push(self.parse_pattern()?);
                    }
                    self.tokens.force(TokenKind::RParen)?;
                    return Ok(Expr::Tuple(p, elements));
                }
                let mut args = Vec::new();
                while !self.tokens.is_kind(TokenKind::RParen) {
                    if self.tokens.is_kind(TokenKind::Eof) {
                        return Err(self.error("')' expected"));
                    }
                    args.push(self.parse_pattern()?);
                }
                self.tokens.force(TokenKind::RParen)?;
                if args.is_empty() {
                    Ok(first)
                } else {
                    Ok(apply(p, first, args))
                }
            }
            _ => Err(self.error(format!(
                "pattern expected, found {}",
                self.tokens.kind().describe()
            ))),
        }
    }
}

/// Build an application, flattening a nested application head.
pub fn apply(p: Position, head: Expr, args: Vec<Expr>) -> Expr {
    match head {
        Expr::Application(_, mut ee) => {
            ee.extend(args);
            Expr::Application(p, ee)
        }
        head => {
            let mut ee = vec![head];
            ee.extend(args);
            Expr::Application(p, ee)
        }
    }
}

/// Parse a module body.
pub fn parse_unit(resource: &str, source: &str) -> Result<Unit> {
    Parser::from_source(resource, source)?.parse_unit()
}

/// Parse an interactive line.
pub fn parse_line(source: &str) -> Result<Vec<Line>> {
    Parser::from_source("internal", source)?.parse_line()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        let mut p = Parser::from_source("test", src).unwrap();
        let e = p.parse_expr().unwrap();
        assert!(p.tokens.is_kind(TokenKind::Eof), "trailing input in {:?}", src);
        e
    }

    #[test]
    fn test_application_flattens() {
        let e = expr("f x y");
        match e {
            Expr::Application(_, ee) => assert_eq!(ee.len(), 3),
            _ => panic!("expected application"),
        }
        let e = expr("(f x) y");
        match e {
            Expr::Application(_, ee) => assert_eq!(ee.len(), 3),
            _ => panic!("expected flattened application"),
        }
    }

    #[test]
    fn test_operator_precedence() {
        // multiplication binds tighter than addition
        let e = expr("1 + 2 * 3");
        assert_eq!(format!("{}", e), "(+ 1 (* 2 3))");
        let e = expr("1 * 2 + 3");
        assert_eq!(format!("{}", e), "(+ (* 1 2) 3)");
    }

    #[test]
    fn test_match_lambda() {
        let e = expr("[0 -> 1 | N -> N]");
        match e {
            Expr::Lambda(_, m) => {
                assert_eq!(m.alternatives.len(), 2);
                assert_eq!(m.alternatives[0].patterns.len(), 1);
            }
            _ => panic!("expected lambda"),
        }
    }

    #[test]
    fn test_fac_parses() {
        let u = parse_unit("test", "def fac = [0 -> 1 | n -> n * (fac (n - 1))]").unwrap();
        assert_eq!(u.decls.len(), 1);
    }

    #[test]
    fn test_list_and_tuple() {
        let e = expr("{1, 2, 3}");
        match e {
            Expr::List(_, ee, None) => assert_eq!(ee.len(), 3),
            _ => panic!("expected list"),
        }
        let e = expr("(1, \"a\", 'z')");
        match e {
            Expr::Tuple(_, ee) => assert_eq!(ee.len(), 3),
            _ => panic!("expected tuple"),
        }
        let e = expr("{1, 2 | T}");
        match e {
            Expr::List(_, ee, Some(_)) => assert_eq!(ee.len(), 2),
            _ => panic!("expected dotted list"),
        }
    }

    #[test]
    fn test_if_try_let_throw() {
        let e = expr("if X then 1 else 2");
        assert!(matches!(e, Expr::If(_, _, _, _)));
        let e = expr("try f 1 catch [E -> E]");
        assert!(matches!(e, Expr::Try(_, _, _)));
        let e = expr("let X = 1 in X");
        assert!(matches!(e, Expr::Let(_, _, _, _)));
        let e = expr("throw \"oops\"");
        assert!(matches!(e, Expr::Throw(_, _)));
    }

    #[test]
    fn test_qualified_names() {
        let e = expr("System::to_list");
        match e {
            Expr::Combinator(_, parts, n) => {
                assert_eq!(parts, vec!["System".to_string()]);
                assert_eq!(n, "to_list");
            }
            _ => panic!("expected combinator"),
        }
        let e = expr("X");
        assert!(matches!(e, Expr::Variable(_, _)));
    }

    #[test]
    fn test_prefix_minus() {
        let e = expr("-1");
        assert!(matches!(e, Expr::Integer(_, -1)));
        assert_eq!(format!("{}", expr("- X")), "(!- X)");
    }

    #[test]
    fn test_parenthesised_operator() {
        let e = expr("(+) 1 2");
        assert_eq!(format!("{}", e), "(+ 1 2)");
    }

    #[test]
    fn test_line_with_semicolons() {
        let ll = parse_line("def f = 1; f").unwrap();
        assert_eq!(ll.len(), 2);
        assert!(matches!(ll[0], Line::Decl(_)));
        assert!(matches!(ll[1], Line::Expr(_)));
    }

    #[test]
    fn test_constructor_pattern() {
        let u = parse_unit(
            "test",
            "def map = [F {} -> {} | F (cons X XX) -> cons (F X) (map F XX)]",
        )
        .unwrap();
        assert_eq!(u.decls.len(), 1);
    }

    #[test]
    fn test_parse_errors_carry_position() {
        let r = parse_unit("bad.eg", "def = ");
        assert!(r.is_err());
        let e = r.unwrap_err();
        assert_eq!(e.position().resource(), "bad.eg");
    }
}
