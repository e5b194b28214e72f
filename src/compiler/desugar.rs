//! Desugaring: list and tuple literals become constructor applications,
//! `if`/`let` become lambda applications, `try`/`throw` become applications
//! of the exception primitives, and short-circuit `&&`/`||` become branch
//! selection. Runs after identification; every name this stage introduces is
//! already fully qualified.

use crate::ast::{Alternative, Decl, Expr, Match, Unit};
use crate::parser::apply;
use crate::position::Position;

pub fn desugar_unit(unit: &mut Unit) {
    for d in &mut unit.decls {
        desugar_decl(d);
    }
}

fn desugar_decl(d: &mut Decl) {
    match d {
        Decl::Def(_, _, e) | Decl::Val(_, _, e) => desugar_expr(e),
        Decl::Namespace(_, _, dd) => {
            for d in dd {
                desugar_decl(d);
            }
        }
        Decl::Data(_, _) | Decl::Import(_, _) | Decl::Using(_, _) => {}
    }
}

fn sys(p: &Position, name: &str) -> Expr {
    Expr::combinator_fq(p.clone(), &format!("System::{}", name))
}

pub fn desugar_expr(e: &mut Expr) {
    match e {
        Expr::Integer(_, _)
        | Expr::Float(_, _)
        | Expr::Char(_, _)
        | Expr::Text(_, _)
        | Expr::Combinator(_, _, _)
        | Expr::Variable(_, _)
        | Expr::Wildcard(_) => {}
        Expr::Application(p, ee) => {
            for x in ee.iter_mut() {
                desugar_expr(x);
            }
            // short-circuit operators select a branch instead of applying
            if ee.len() == 3 {
                if let Expr::Combinator(_, parts, n) = &ee[0] {
                    let in_system = parts.len() == 1 && parts[0] == "System";
                    let is_and = in_system && n == "&&";
                    let is_or = in_system && n == "||";
                    if is_and || is_or {
                        let p = p.clone();
                        let cond = ee[1].clone();
                        let rhs = ee[2].clone();
                        let (then_branch, else_branch) = if is_and {
                            (rhs, sys(&p, "false"))
                        } else {
                            (sys(&p, "true"), rhs)
                        };
                        *e = if_to_match(&p, cond, then_branch, else_branch);
                        return;
                    }
                }
            }
        }
        Expr::Lambda(_, m) => desugar_match(m),
        Expr::List(p, ee, tail) => {
            let p = p.clone();
            for x in ee.iter_mut() {
                desugar_expr(x);
            }
            let mut result = match tail {
                Some(t) => {
                    desugar_expr(t);
                    (**t).clone()
                }
                None => sys(&p, "nil"),
            };
            for x in ee.drain(..).rev() {
                result = apply(p.clone(), sys(&p, "cons"), vec![x, result]);
            }
            *e = result;
        }
        Expr::Tuple(p, ee) => {
            let p = p.clone();
            for x in ee.iter_mut() {
                desugar_expr(x);
            }
            let elements = std::mem::take(ee);
            *e = apply(p.clone(), sys(&p, "tuple"), elements);
        }
        Expr::If(p, c, t, f) => {
            let p = p.clone();
            desugar_expr(c);
            desugar_expr(t);
            desugar_expr(f);
            *e = if_to_match(&p, (**c).clone(), (**t).clone(), (**f).clone());
        }
        Expr::Let(p, pat, v, b) => {
            let p = p.clone();
            desugar_expr(pat);
            desugar_expr(v);
            desugar_expr(b);
            let lambda = Expr::Lambda(
                p.clone(),
                Match {
                    alternatives: vec![Alternative {
                        patterns: vec![(**pat).clone()],
                        guard: None,
                        body: (**b).clone(),
                    }],
                },
            );
            *e = apply(p, lambda, vec![(**v).clone()]);
        }
        Expr::Try(p, x, h) => {
            let p = p.clone();
            desugar_expr(x);
            desugar_expr(h);
            // the protected expression must not reduce before the handler is
            // installed, so it travels as a one-shot abstraction
            let delayed = Expr::Lambda(
                p.clone(),
                Match {
                    alternatives: vec![Alternative {
                        patterns: vec![Expr::Wildcard(p.clone())],
                        guard: None,
                        body: (**x).clone(),
                    }],
                },
            );
            *e = apply(p.clone(), sys(&p, "handle"), vec![(**h).clone(), delayed]);
        }
        Expr::Throw(p, x) => {
            let p = p.clone();
            desugar_expr(x);
            *e = apply(p.clone(), sys(&p, "throw"), vec![(**x).clone()]);
        }
    }
}

fn desugar_match(m: &mut Match) {
    for a in &mut m.alternatives {
        for p in &mut a.patterns {
            desugar_expr(p);
        }
        if let Some(g) = &mut a.guard {
            desugar_expr(g);
        }
        desugar_expr(&mut a.body);
    }
}

/// `if c then t else f` becomes a match on `true`/`false` applied to `c`;
/// the untaken branch is never evaluated.
fn if_to_match(p: &Position, c: Expr, t: Expr, f: Expr) -> Expr {
    let lambda = Expr::Lambda(
        p.clone(),
        Match {
            alternatives: vec![
                Alternative {
                    patterns: vec![sys(p, "true")],
                    guard: None,
                    body: t,
                },
                Alternative {
                    patterns: vec![sys(p, "false")],
                    guard: None,
                    body: f,
                },
            ],
        },
    );
    apply(p.clone(), lambda, vec![c])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn desugared(src: &str) -> Expr {
        let mut p = Parser::from_source("test", src).unwrap();
        let mut e = p.parse_expr().unwrap();
        desugar_expr(&mut e);
        e
    }

    #[test]
    fn test_list_becomes_cons_spine() {
        let e = desugared("{1, 2}");
        assert_eq!(
            format!("{}", e),
            "(System::cons 1 (System::cons 2 System::nil))"
        );
    }

    #[test]
    fn test_dotted_list_tail() {
        let e = desugared("{1 | T}");
        assert_eq!(format!("{}", e), "(System::cons 1 T)");
    }

    #[test]
    fn test_tuple_becomes_application() {
        let e = desugared("(1, 2, 3)");
        assert_eq!(format!("{}", e), "(System::tuple 1 2 3)");
    }

    #[test]
    fn test_if_becomes_match() {
        let e = desugared("if X then 1 else 2");
        let s = format!("{}", e);
        assert!(s.contains("System::true -> 1"), "{}", s);
        assert!(s.contains("System::false -> 2"), "{}", s);
        assert!(s.ends_with("X)"), "{}", s);
    }

    #[test]
    fn test_let_becomes_application() {
        let e = desugared("let X = 1 in X");
        assert_eq!(format!("{}", e), "([X -> X] 1)");
    }

    #[test]
    fn test_try_throw() {
        let e = desugared("try 1 catch H");
        assert_eq!(format!("{}", e), "(System::handle H [_ -> 1])");
        let e = desugared("throw 1");
        assert_eq!(format!("{}", e), "(System::throw 1)");
    }
}
