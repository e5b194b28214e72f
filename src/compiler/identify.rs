//! Identification: resolve every user-visible name to its fully-qualified
//! symbol, and settle which lowercase pattern names bind variables.
//!
//! In pattern position a name that resolves to a data constructor is a
//! constant to test against; anything else binds. In body position local
//! binders shadow combinators.

use crate::ast::{Decl, Expr, Match, Unit};
use crate::error::{Error, Result};
use crate::position::Position;

use super::namespace::{DeclKind, NamespaceEnv};

/// The declarations stage: enter every declared name into the environment.
pub fn declare_unit(env: &mut NamespaceEnv, unit: &Unit) -> Result<()> {
    let mut context: Vec<Vec<String>> = Vec::new();
    declare_decls(env, &unit.decls, &mut context, false)
}

/// Interactive variant: re-declaring an existing name is allowed.
pub fn declare_unit_implicit(env: &mut NamespaceEnv, unit: &Unit) {
    let mut context: Vec<Vec<String>> = Vec::new();
    let _ = declare_decls(env, &unit.decls, &mut context, true);
}

fn declare_decls(
    env: &mut NamespaceEnv,
    decls: &[Decl],
    context: &mut Vec<Vec<String>>,
    implicit: bool,
) -> Result<()> {
    for d in decls {
        match d {
            Decl::Data(p, names) => {
                for n in names {
                    if let Expr::Combinator(_, parts, name) = n {
                        let fq = qualify(context, parts, name);
                        if implicit {
                            env.declare_implicit(&fq, DeclKind::Data);
                        } else {
                            env.declare(p, &fq, DeclKind::Data)?;
                        }
                    }
                }
            }
            Decl::Def(p, n, _) | Decl::Val(p, n, _) => {
                if let Expr::Combinator(_, parts, name) = n {
                    let fq = qualify(context, parts, name);
                    if implicit {
                        env.declare_implicit(&fq, DeclKind::Def);
                    } else {
                        env.declare(p, &fq, DeclKind::Def)?;
                    }
                }
            }
            Decl::Namespace(_, path, dd) => {
                context.push(path.clone());
                declare_decls(env, dd, context, implicit)?;
                context.pop();
            }
            Decl::Import(_, _) | Decl::Using(_, _) => {}
        }
    }
    Ok(())
}

fn qualify(context: &[Vec<String>], parts: &[String], name: &str) -> String {
    let mut segments: Vec<String> = context.iter().flatten().cloned().collect();
    segments.extend(parts.iter().cloned());
    segments.push(name.to_string());
    segments.join("::")
}

/// The identification stage proper. `usings` carries directives already in
/// force (the interactive evaluator threads its accumulated set through) and
/// collects the ones this unit adds.
pub fn identify_unit(
    env: &NamespaceEnv,
    unit: &mut Unit,
    usings: &mut Vec<Vec<String>>,
) -> Result<()> {
    let mut ident = Identifier {
        env,
        context: Vec::new(),
    };
    ident.walk_decls(&mut unit.decls, usings)
}

struct Identifier<'e> {
    env: &'e NamespaceEnv,
    context: Vec<Vec<String>>,
}

impl<'e> Identifier<'e> {
    fn walk_decls(&mut self, decls: &mut [Decl], usings: &mut Vec<Vec<String>>) -> Result<()> {
        for d in decls {
            match d {
                Decl::Using(_, path) => {
                    if !usings.contains(path) {
                        usings.push(path.clone());
                    }
                }
                Decl::Import(_, _) => {}
                Decl::Data(_, names) => {
                    for n in names {
                        self.rewrite_declared_name(n);
                    }
                }
                Decl::Def(_, n, e) | Decl::Val(_, n, e) => {
                    self.rewrite_declared_name(n);
                    let mut scope = Vec::new();
                    self.identify_expr(e, usings, &mut scope)?;
                }
                Decl::Namespace(_, path, dd) => {
                    self.context.push(path.clone());
                    self.walk_decls(dd, usings)?;
                    self.context.pop();
                }
            }
        }
        Ok(())
    }

    fn rewrite_declared_name(&self, n: &mut Expr) {
        if let Expr::Combinator(p, parts, name) = n {
            let fq = qualify(&self.context, parts, name);
            *n = Expr::combinator_fq(p.clone(), &fq);
        }
    }

    fn undeclared(&self, p: &Position, what: &str) -> Error {
        Error::Identification(p.clone(), format!("undeclared '{}'", what))
    }

    fn identify_expr(
        &self,
        e: &mut Expr,
        usings: &[Vec<String>],
        scope: &mut Vec<String>,
    ) -> Result<()> {
        match e {
            Expr::Integer(_, _)
            | Expr::Float(_, _)
            | Expr::Char(_, _)
            | Expr::Text(_, _)
            | Expr::Wildcard(_) => Ok(()),
            Expr::Variable(p, n) => {
                if scope.iter().any(|s| s == n) {
                    Ok(())
                } else {
                    Err(self.undeclared(p, n))
                }
            }
            Expr::Combinator(p, parts, n) => {
                if parts.is_empty() && scope.iter().any(|s| s == n) {
                    *e = Expr::Variable(p.clone(), n.clone());
                    return Ok(());
                }
                match self.env.resolve(&self.context, usings, parts, n) {
                    Some((fq, _)) => {
                        *e = Expr::combinator_fq(p.clone(), &fq);
                        Ok(())
                    }
                    None => Err(self.undeclared(p, &Expr::fq_name(parts, n))),
                }
            }
            Expr::Application(_, ee) => {
                for x in ee {
                    self.identify_expr(x, usings, scope)?;
                }
                Ok(())
            }
            Expr::List(_, ee, tail) => {
                for x in ee.iter_mut() {
                    self.identify_expr(x, usings, scope)?;
                }
                if let Some(t) = tail {
                    self.identify_expr(t, usings, scope)?;
                }
                Ok(())
            }
            Expr::Tuple(_, ee) => {
                for x in ee {
                    self.identify_expr(x, usings, scope)?;
                }
                Ok(())
            }
            Expr::If(_, c, t, f) => {
                self.identify_expr(c, usings, scope)?;
                self.identify_expr(t, usings, scope)?;
                self.identify_expr(f, usings, scope)
            }
            Expr::Try(_, x, h) => {
                self.identify_expr(x, usings, scope)?;
                self.identify_expr(h, usings, scope)
            }
            Expr::Throw(_, x) => self.identify_expr(x, usings, scope),
            Expr::Let(_, p, v, b) => {
                self.identify_expr(v, usings, scope)?;
                let mark = scope.len();
                self.identify_pattern(p, usings, scope)?;
                self.identify_expr(b, usings, scope)?;
                scope.truncate(mark);
                Ok(())
            }
            Expr::Lambda(_, m) => self.identify_match(m, usings, scope),
        }
    }

    fn identify_match(
        &self,
        m: &mut Match,
        usings: &[Vec<String>],
        scope: &mut Vec<String>,
    ) -> Result<()> {
        for a in &mut m.alternatives {
            let mark = scope.len();
            for p in &mut a.patterns {
                self.identify_pattern(p, usings, scope)?;
            }
            if let Some(g) = &mut a.guard {
                self.identify_expr(g, usings, scope)?;
            }
            self.identify_expr(&mut a.body, usings, scope)?;
            scope.truncate(mark);
        }
        Ok(())
    }

    fn identify_pattern(
        &self,
        e: &mut Expr,
        usings: &[Vec<String>],
        scope: &mut Vec<String>,
    ) -> Result<()> {
        match e {
            Expr::Integer(_, _)
            | Expr::Float(_, _)
            | Expr::Char(_, _)
            | Expr::Text(_, _)
            | Expr::Wildcard(_) => Ok(()),
            Expr::Variable(_, n) => {
                scope.push(n.clone());
                Ok(())
            }
            Expr::Combinator(p, parts, n) => {
                match self.env.resolve(&self.context, usings, parts, n) {
                    Some((fq, DeclKind::Data)) => {
                        *e = Expr::combinator_fq(p.clone(), &fq);
                        Ok(())
                    }
                    _ if parts.is_empty() => {
                        // an unqualified name that is no constructor binds
                        scope.push(n.clone());
                        *e = Expr::Variable(p.clone(), n.clone());
                        Ok(())
                    }
                    _ => Err(Error::Identification(
                        p.clone(),
                        format!("data constructor expected, found '{}'", Expr::fq_name(parts, n)),
                    )),
                }
            }
            Expr::Application(p, ee) => {
                let (head, args) = match ee.split_first_mut() {
                    Some(x) => x,
                    None => return Ok(()),
                };
                match head {
                    Expr::Combinator(hp, parts, n) => {
                        match self.env.resolve(&self.context, usings, parts, n) {
                            Some((fq, DeclKind::Data)) => {
                                *head = Expr::combinator_fq(hp.clone(), &fq);
                            }
                            _ => {
                                return Err(Error::Identification(
                                    p.clone(),
                                    format!(
                                        "data constructor expected in pattern, found '{}'",
                                        Expr::fq_name(parts, n)
                                    ),
                                ))
                            }
                        }
                    }
                    _ => {
                        return Err(Error::Identification(
                            p.clone(),
                            "data constructor expected in pattern".to_string(),
                        ))
                    }
                }
                for a in args {
                    self.identify_pattern(a, usings, scope)?;
                }
                Ok(())
            }
            Expr::List(_, ee, tail) => {
                for x in ee.iter_mut() {
                    self.identify_pattern(x, usings, scope)?;
                }
                if let Some(t) = tail {
                    self.identify_pattern(t, usings, scope)?;
                }
                Ok(())
            }
            Expr::Tuple(_, ee) => {
                for x in ee {
                    self.identify_pattern(x, usings, scope)?;
                }
                Ok(())
            }
            other => Err(Error::Identification(
                other.position(),
                "pattern expected".to_string(),
            )),
        }
    }
}
