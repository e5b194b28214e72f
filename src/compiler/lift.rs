//! Lambda lifting: every inner lambda becomes a top-level anonymous
//! combinator taking its free variables as extra leading arguments, and the
//! original occurrence becomes a partial application on the captured values.
//!
//! Lifted combinators live in the `Local` namespace with names derived from
//! the enclosing combinator, made unique by a process-wide counter so that
//! interactive redefinition cannot collide.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ast::{Decl, Expr, Match, Unit};
use crate::operators::to_ascii;
use crate::parser::apply;

static LIFT_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn lift_unit(unit: &mut Unit) {
    let mut lifted = Vec::new();
    for d in &mut unit.decls {
        lift_decl(d, &mut lifted);
    }
    unit.decls.extend(lifted);
}

fn lift_decl(d: &mut Decl, out: &mut Vec<Decl>) {
    match d {
        Decl::Def(_, name, body) | Decl::Val(_, name, body) => {
            let base = base_name(name);
            match body {
                // the top-level lambda is the combinator's own match
                Expr::Lambda(_, m) => lift_match(m, &base, out),
                e => lift_expr(e, &base, out),
            }
        }
        Decl::Namespace(_, _, dd) => {
            for d in dd {
                lift_decl(d, out);
            }
        }
        Decl::Data(_, _) | Decl::Import(_, _) | Decl::Using(_, _) => {}
    }
}

fn base_name(name: &Expr) -> String {
    match name {
        Expr::Combinator(_, _, n) => to_ascii(n),
        _ => "anonymous".to_string(),
    }
}

fn lift_match(m: &mut Match, base: &str, out: &mut Vec<Decl>) {
    for a in &mut m.alternatives {
        if let Some(g) = &mut a.guard {
            lift_expr(g, base, out);
        }
        lift_expr(&mut a.body, base, out);
    }
}

fn lift_expr(e: &mut Expr, base: &str, out: &mut Vec<Decl>) {
    match e {
        Expr::Lambda(p, m) => {
            // innermost lambdas lift first
            lift_match(m, base, out);

            let captures = free_variables(m);
            let n = LIFT_COUNTER.fetch_add(1, Ordering::SeqCst);
            let fq = format!("Local::{}_{}", base, n);
            let p = p.clone();

            let mut lifted = m.clone();
            for a in &mut lifted.alternatives {
                let mut patterns: Vec<Expr> = captures
                    .iter()
                    .map(|v| Expr::Variable(p.clone(), v.clone()))
                    .collect();
                patterns.extend(a.patterns.drain(..));
                a.patterns = patterns;
            }
            out.push(Decl::Def(
                p.clone(),
                Expr::combinator_fq(p.clone(), &fq),
                Expr::Lambda(p.clone(), lifted),
            ));

            let reference = Expr::combinator_fq(p.clone(), &fq);
            *e = if captures.is_empty() {
                reference
            } else {
                apply(
                    p.clone(),
                    reference,
                    captures
                        .iter()
                        .map(|v| Expr::Variable(p.clone(), v.clone()))
                        .collect(),
                )
            };
        }
        Expr::Application(_, ee) => {
            for x in ee {
                lift_expr(x, base, out);
            }
        }
        Expr::List(_, ee, tail) => {
            for x in ee.iter_mut() {
                lift_expr(x, base, out);
            }
            if let Some(t) = tail {
                lift_expr(t, base, out);
            }
        }
        Expr::Tuple(_, ee) => {
            for x in ee {
                lift_expr(x, base, out);
            }
        }
        Expr::If(_, c, t, f) => {
            lift_expr(c, base, out);
            lift_expr(t, base, out);
            lift_expr(f, base, out);
        }
        Expr::Let(_, _, v, b) => {
            lift_expr(v, base, out);
            lift_expr(b, base, out);
        }
        Expr::Try(_, x, h) => {
            lift_expr(x, base, out);
            lift_expr(h, base, out);
        }
        Expr::Throw(_, x) => lift_expr(x, base, out),
        _ => {}
    }
}

/// Free variables of a match, in first-occurrence order.
fn free_variables(m: &Match) -> Vec<String> {
    let mut bound = Vec::new();
    let mut free = Vec::new();
    walk_match(m, &mut bound, &mut free);
    free
}

fn walk_match(m: &Match, bound: &mut Vec<String>, free: &mut Vec<String>) {
    for a in &m.alternatives {
        let mark = bound.len();
        for p in &a.patterns {
            pattern_binders(p, bound);
        }
        if let Some(g) = &a.guard {
            walk_expr(g, bound, free);
        }
        walk_expr(&a.body, bound, free);
        bound.truncate(mark);
    }
}

fn pattern_binders(p: &Expr, bound: &mut Vec<String>) {
    match p {
        Expr::Variable(_, n) => bound.push(n.clone()),
        Expr::Application(_, ee) => {
            for x in ee.iter().skip(1) {
                pattern_binders(x, bound);
            }
        }
        Expr::List(_, ee, tail) => {
            for x in ee {
                pattern_binders(x, bound);
            }
            if let Some(t) = tail {
                pattern_binders(t, bound);
            }
        }
        Expr::Tuple(_, ee) => {
            for x in ee {
                pattern_binders(x, bound);
            }
        }
        _ => {}
    }
}

fn walk_expr(e: &Expr, bound: &mut Vec<String>, free: &mut Vec<String>) {
    match e {
        Expr::Variable(_, n) => {
            if !bound.iter().any(|b| b == n) && !free.iter().any(|f| f == n) {
                free.push(n.clone());
            }
        }
        Expr::Application(_, ee) | Expr::Tuple(_, ee) => {
            for x in ee {
                walk_expr(x, bound, free);
            }
        }
        Expr::List(_, ee, tail) => {
            for x in ee {
                walk_expr(x, bound, free);
            }
            if let Some(t) = tail {
                walk_expr(t, bound, free);
            }
        }
        Expr::Lambda(_, m) => walk_match(m, bound, free),
        Expr::If(_, c, t, f) => {
            walk_expr(c, bound, free);
            walk_expr(t, bound, free);
            walk_expr(f, bound, free);
        }
        Expr::Let(_, p, v, b) => {
            walk_expr(v, bound, free);
            let mark = bound.len();
            pattern_binders(p, bound);
            walk_expr(b, bound, free);
            bound.truncate(mark);
        }
        Expr::Try(_, x, h) => {
            walk_expr(x, bound, free);
            walk_expr(h, bound, free);
        }
        Expr::Throw(_, x) => walk_expr(x, bound, free),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_unit;

    #[test]
    fn test_inner_lambda_lifts_with_capture() {
        let mut u = parse_unit("test", "def f = [X -> [Y -> X] 2]").unwrap();
        lift_unit(&mut u);
        assert_eq!(u.decls.len(), 2);
        // the occurrence became a partial application on the capture
        let s = format!("{}", u.decls[0]);
        assert!(s.contains("Local::"), "{}", s);
        assert!(s.contains("X) 2") || s.contains("X 2"), "{}", s);
        // the lifted combinator prepends the captured variable
        if let Decl::Def(_, _, Expr::Lambda(_, m)) = &u.decls[1] {
            assert_eq!(m.alternatives[0].patterns.len(), 2);
        } else {
            panic!("expected lifted definition");
        }
    }

    #[test]
    fn test_capture_free_lambda_lifts_to_reference() {
        let mut u = parse_unit("test", "def f = [X -> X] ").unwrap();
        lift_unit(&mut u);
        // the top-level lambda is the definition itself, nothing lifts
        assert_eq!(u.decls.len(), 1);

        let mut u = parse_unit("test", "def g = h [X -> X]").unwrap();
        lift_unit(&mut u);
        assert_eq!(u.decls.len(), 2);
        let s = format!("{}", u.decls[0]);
        assert!(s.contains("(h Local::"), "{}", s);
    }

    #[test]
    fn test_free_variable_order() {
        let mut u = parse_unit("test", "def f = [A B -> g [X -> B A X]]").unwrap();
        lift_unit(&mut u);
        if let Decl::Def(_, _, Expr::Lambda(_, m)) = &u.decls[1] {
            // captures in first-occurrence order: B then A
            let pats: Vec<String> =
                m.alternatives[0].patterns.iter().map(|p| format!("{}", p)).collect();
            assert_eq!(pats[0], "B");
            assert_eq!(pats[1], "A");
            assert_eq!(pats.len(), 3);
        } else {
            panic!("expected lifted definition");
        }
    }
}
