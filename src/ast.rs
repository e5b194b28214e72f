//! AST nodes produced by the parser and rewritten by the pipeline stages.
//!
//! Patterns are expressions syntactically; the match compiler checks their
//! shape. Identification rewrites name nodes in place: qualified combinator
//! names gain their full namespace path, and lowercase pattern binders are
//! turned into variables.

use std::fmt;

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub patterns: Vec<Expr>,
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(Position, i64),
    Float(Position, f64),
    Char(Position, char),
    Text(Position, String),
    /// A (possibly qualified) combinator name; identification makes the
    /// path absolute.
    Combinator(Position, Vec<String>, String),
    Variable(Position, String),
    Wildcard(Position),
    /// Flattened application: head followed by arguments.
    Application(Position, Vec<Expr>),
    Lambda(Position, Match),
    /// `{e1, e2, …}` or `{e1, e2 | tail}`
    List(Position, Vec<Expr>, Option<Box<Expr>>),
    /// `(e1, e2, …)`, at least two elements
    Tuple(Position, Vec<Expr>),
    If(Position, Box<Expr>, Box<Expr>, Box<Expr>),
    /// `let pattern = value in body`
    Let(Position, Box<Expr>, Box<Expr>, Box<Expr>),
    /// `try expr catch handler`
    Try(Position, Box<Expr>, Box<Expr>),
    Throw(Position, Box<Expr>),
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Expr::Integer(p, _)
            | Expr::Float(p, _)
            | Expr::Char(p, _)
            | Expr::Text(p, _)
            | Expr::Combinator(p, _, _)
            | Expr::Variable(p, _)
            | Expr::Wildcard(p)
            | Expr::Application(p, _)
            | Expr::Lambda(p, _)
            | Expr::List(p, _, _)
            | Expr::Tuple(p, _)
            | Expr::If(p, _, _, _)
            | Expr::Let(p, _, _, _)
            | Expr::Try(p, _, _)
            | Expr::Throw(p, _) => p.clone(),
        }
    }

    /// A combinator node for an already fully-qualified name.
    pub fn combinator_fq(p: Position, fq: &str) -> Expr {
        let mut parts: Vec<String> = fq.split("::").map(|s| s.to_string()).collect();
        let name = parts.pop().unwrap_or_default();
        Expr::Combinator(p, parts, name)
    }

    /// The qualified name of a combinator node.
    pub fn fq_name(parts: &[String], name: &str) -> String {
        if parts.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", parts.join("::"), name)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// `data c1, c2, …` — 0-ary constructor declarations
    Data(Position, Vec<Expr>),
    /// `def name = expr`
    Def(Position, Expr, Expr),
    /// `val name = expr` — reduced at load time
    Val(Position, Expr, Expr),
    /// `namespace Name ( decls )`
    Namespace(Position, Vec<String>, Vec<Decl>),
    Import(Position, String),
    Using(Position, Vec<String>),
}

impl Decl {
    pub fn position(&self) -> Position {
        match self {
            Decl::Data(p, _)
            | Decl::Def(p, _, _)
            | Decl::Val(p, _, _)
            | Decl::Namespace(p, _, _)
            | Decl::Import(p, _)
            | Decl::Using(p, _) => p.clone(),
        }
    }
}

/// One compilation unit: a module body or a REPL line's declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub decls: Vec<Decl>,
}

/// A parsed interactive line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Decl(Decl),
    Expr(Expr),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(_, n) => write!(f, "{}", n),
            Expr::Float(_, x) => write!(f, "{:?}", x),
            Expr::Char(_, c) => write!(f, "'{}'", crate::escape::escape(&c.to_string())),
            Expr::Text(_, s) => write!(f, "\"{}\"", crate::escape::escape(s)),
            Expr::Combinator(_, parts, n) => write!(f, "{}", Expr::fq_name(parts, n)),
            Expr::Variable(_, n) => write!(f, "{}", n),
            Expr::Wildcard(_) => write!(f, "_"),
            Expr::Application(_, ee) => {
                write!(f, "(")?;
                for (i, e) in ee.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Expr::Lambda(_, m) => {
                write!(f, "[")?;
                for (i, a) in m.alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    for p in &a.patterns {
                        write!(f, "{} ", p)?;
                    }
                    write!(f, "-> {}", a.body)?;
                }
                write!(f, "]")
            }
            Expr::List(_, ee, tail) => {
                write!(f, "{{")?;
                for (i, e) in ee.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                if let Some(t) = tail {
                    write!(f, "| {}", t)?;
                }
                write!(f, "}}")
            }
            Expr::Tuple(_, ee) => {
                write!(f, "(")?;
                for (i, e) in ee.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Expr::If(_, c, t, e) => write!(f, "if {} then {} else {}", c, t, e),
            Expr::Let(_, p, v, b) => write!(f, "let {} = {} in {}", p, v, b),
            Expr::Try(_, e, h) => write!(f, "try {} catch {}", e, h),
            Expr::Throw(_, e) => write!(f, "throw {}", e),
        }
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decl::Data(_, cc) => {
                write!(f, "data ")?;
                for (i, c) in cc.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                Ok(())
            }
            Decl::Def(_, n, e) => write!(f, "def {} = {}", n, e),
            Decl::Val(_, n, e) => write!(f, "val {} = {}", n, e),
            Decl::Namespace(_, nn, dd) => {
                writeln!(f, "namespace {} (", nn.join("::"))?;
                for d in dd {
                    writeln!(f, "  {}", d)?;
                }
                write!(f, ")")
            }
            Decl::Import(_, s) => write!(f, "import \"{}\"", s),
            Decl::Using(_, nn) => write!(f, "using {}", nn.join("::")),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.decls {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}

