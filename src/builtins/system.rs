//! The `system` module: primitive combinators, arithmetic, comparisons,
//! conversions, and basic I/O.
//!
//! Object fields: `System::get` and `System::set` work on `object` spines
//! `{object, field, value, …}`. `set` performs a functional update and
//! returns the rebuilt object; the field is never mutated in place.

use std::cmp::Ordering;
use std::io::BufRead;

use super::{dyadic, medadic, monadic, triadic, variadic};
use crate::machine::Machine;
use crate::term::{self, combinator, compare, Combinator, Term, TermRef};

pub fn exports(m: &Machine) -> Vec<TermRef> {
    let mut oo = Vec::new();

    // exception primitives
    oo.push(combinator(Combinator::Throw(m.enter_symbol2("System", "throw"))));
    oo.push(combinator(Combinator::Handle(m.enter_symbol2("System", "handle"))));
    oo.push(monadic(m, "System", "fail", "System::fail t - raise an unmatched-call exception", |m, a0| {
        // the argument is the thunk of the failed call; the payload is the
        // original application
        let payload = match a0.as_array() {
            Some(cell) => {
                let tt = cell.to_vec();
                if tt.len() > 5 {
                    term::array(tt[4..].to_vec())
                } else {
                    tt.get(4).cloned().flatten().unwrap_or_else(|| a0.clone())
                }
            }
            None => a0.clone(),
        };
        let _ = m;
        Err(payload)
    }));

    // K and identity
    oo.push(dyadic(m, "System", "k", "System::k x y - k combinator", |_m, a0, _a1| Ok(a0.clone())));
    oo.push(monadic(m, "System", "id", "System::id x - identity combinator", |_m, a0| {
        Ok(a0.clone())
    }));

    // basic constants
    for n in [
        "int", "float", "char", "text", "nil", "cons", "none", "true", "false", "tuple",
        "object", "nop",
    ] {
        oo.push(m.create_data2("System", n));
    }

    oo.push(medadic(m, "System", "min_int", "System::min_int - smallest integer", |m| {
        Ok(m.create_integer(i64::MIN))
    }));
    oo.push(medadic(m, "System", "max_int", "System::max_int - largest integer", |m| {
        Ok(m.create_integer(i64::MAX))
    }));

    // operators
    oo.push(monadic(m, "System", "!-", "System::!- x - monadic minus", |m, a0| match &**a0 {
        Term::Integer(n) => n
            .checked_neg()
            .map(|r| m.create_integer(r))
            .ok_or_else(|| m.create_text("overflow")),
        Term::Float(f) => Ok(m.create_float(-f)),
        _ => Err(m.bad_args("System::!-", &[a0.clone()])),
    }));

    oo.push(dyadic(m, "System", "+", "System::+ x y - addition", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Integer(x), Term::Integer(y)) => x
                .checked_add(*y)
                .map(|r| m.create_integer(r))
                .ok_or_else(|| m.create_text("overflow")),
            (Term::Float(x), Term::Float(y)) => Ok(m.create_float(x + y)),
            (Term::Text(x), Term::Text(y)) => Ok(m.create_text(format!("{}{}", x, y))),
            _ => Err(m.bad_args("System::+", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "System", "-", "System::- x y - subtraction", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Integer(x), Term::Integer(y)) => x
                .checked_sub(*y)
                .map(|r| m.create_integer(r))
                .ok_or_else(|| m.create_text("overflow")),
            (Term::Float(x), Term::Float(y)) => Ok(m.create_float(x - y)),
            _ => Err(m.bad_args("System::-", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "System", "*", "System::* x y - multiplication", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Integer(x), Term::Integer(y)) => x
                .checked_mul(*y)
                .map(|r| m.create_integer(r))
                .ok_or_else(|| m.create_text("overflow")),
            (Term::Float(x), Term::Float(y)) => Ok(m.create_float(x * y)),
            _ => Err(m.bad_args("System::*", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "System", "/", "System::/ x y - division", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Integer(x), Term::Integer(y)) => {
                if *y == 0 {
                    Err(m.create_text("divide by zero"))
                } else {
                    x.checked_div(*y)
                        .map(|r| m.create_integer(r))
                        .ok_or_else(|| m.create_text("overflow"))
                }
            }
            (Term::Float(x), Term::Float(y)) => Ok(m.create_float(x / y)),
            _ => Err(m.bad_args("System::/", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "System", "%", "System::% x y - modulo", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Integer(x), Term::Integer(y)) => {
                if *y == 0 {
                    Err(m.create_text("divide by zero"))
                } else {
                    x.checked_rem(*y)
                        .map(|r| m.create_integer(r))
                        .ok_or_else(|| m.create_text("overflow"))
                }
            }
            _ => Err(m.bad_args("System::%", &[a0.clone(), a1.clone()])),
        }
    }));

    // comparisons over the total term order
    oo.push(dyadic(m, "System", "<", "System::< x y - less than", |m, a0, a1| {
        Ok(m.create_bool(compare(a0, a1) == Ordering::Less))
    }));
    oo.push(dyadic(m, "System", "<=", "System::<= x y - less than or equal", |m, a0, a1| {
        Ok(m.create_bool(compare(a0, a1) != Ordering::Greater))
    }));
    oo.push(dyadic(m, "System", "==", "System::== x y - equality", |m, a0, a1| {
        Ok(m.create_bool(compare(a0, a1) == Ordering::Equal))
    }));
    oo.push(dyadic(m, "System", "/=", "System::/= x y - inequality", |m, a0, a1| {
        Ok(m.create_bool(compare(a0, a1) != Ordering::Equal))
    }));

    // strict fallbacks; the infix forms short-circuit through desugaring
    oo.push(dyadic(m, "System", "&&", "System::&& x y - conjunction", |m, a0, a1| {
        if m.is_false(a0) {
            Ok(a0.clone())
        } else if m.is_true(a0) {
            Ok(a1.clone())
        } else {
            Err(m.bad_args("System::&&", &[a0.clone(), a1.clone()]))
        }
    }));
    oo.push(dyadic(m, "System", "||", "System::|| x y - disjunction", |m, a0, a1| {
        if m.is_true(a0) {
            Ok(a0.clone())
        } else if m.is_false(a0) {
            Ok(a1.clone())
        } else {
            Err(m.bad_args("System::||", &[a0.clone(), a1.clone()]))
        }
    }));

    // conversions
    oo.push(monadic(m, "System", "to_int", "System::to_int x - convert to integer", |m, a0| {
        match &**a0 {
            Term::Integer(_) => Ok(a0.clone()),
            Term::Float(f) => Ok(m.create_integer(*f as i64)),
            Term::Char(c) => Ok(m.create_integer(*c as i64)),
            Term::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| m.create_integer(n))
                .map_err(|_| m.bad_args("System::to_int", &[a0.clone()])),
            _ => Err(m.bad_args("System::to_int", &[a0.clone()])),
        }
    }));
    oo.push(monadic(m, "System", "to_float", "System::to_float x - convert to float", |m, a0| {
        match &**a0 {
            Term::Float(_) => Ok(a0.clone()),
            Term::Integer(n) => Ok(m.create_float(*n as f64)),
            Term::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(|f| m.create_float(f))
                .map_err(|_| m.bad_args("System::to_float", &[a0.clone()])),
            _ => Err(m.bad_args("System::to_float", &[a0.clone()])),
        }
    }));
    oo.push(monadic(m, "System", "to_text", "System::to_text x - convert to text", |m, a0| {
        match &**a0 {
            Term::Text(_) => Ok(a0.clone()),
            Term::Char(c) => Ok(m.create_text(c.to_string())),
            _ => Ok(m.create_text(m.render_term(a0))),
        }
    }));

    // tuples and lists
    oo.push(monadic(m, "System", "to_list", "System::to_list t - tuple to list", |m, a0| {
        if m.is_tuple_spine(a0) {
            Ok(m.to_list(m.from_tuple(a0)))
        } else if m.is_list(a0) {
            Ok(a0.clone())
        } else {
            Err(m.bad_args("System::to_list", &[a0.clone()]))
        }
    }));
    oo.push(monadic(m, "System", "to_tuple", "System::to_tuple l - list to tuple", |m, a0| {
        if m.is_list(a0) {
            Ok(m.to_tuple(m.from_list(a0)))
        } else {
            Err(m.bad_args("System::to_tuple", &[a0.clone()]))
        }
    }));

    // object fields; set rebuilds the spine
    oo.push(dyadic(m, "System", "get", "System::get f o - get an object field", |m, a0, a1| {
        let fields = object_fields(m, a1)
            .ok_or_else(|| m.bad_args("System::get", &[a0.clone(), a1.clone()]))?;
        for (k, v) in fields {
            if compare(&k, a0) == Ordering::Equal {
                return Ok(v);
            }
        }
        Err(m.bad_args("System::get", &[a0.clone(), a1.clone()]))
    }));
    oo.push(triadic(m, "System", "set", "System::set f v o - functionally update an object field", |m, a0, a1, a2| {
        let fields = object_fields(m, a2)
            .ok_or_else(|| m.bad_args("System::set", &[a0.clone(), a1.clone(), a2.clone()]))?;
        let mut slots = vec![Some(m.create_data2("System", "object"))];
        let mut found = false;
        for (k, v) in fields {
            let v = if compare(&k, a0) == Ordering::Equal {
                found = true;
                a1.clone()
            } else {
                v
            };
            slots.push(Some(k));
            slots.push(Some(v));
        }
        if !found {
            slots.push(Some(a0.clone()));
            slots.push(Some(a1.clone()));
        }
        Ok(term::array(slots))
    }));

    // host environment
    oo.push(monadic(m, "System", "arg", "System::arg n - nth application argument", |m, a0| {
        match a0.as_integer() {
            Some(n) if n >= 0 => match m.get_arg(n as usize) {
                Some(s) => Ok(m.create_text(s)),
                None => Ok(m.create_none()),
            },
            _ => Err(m.bad_args("System::arg", &[a0.clone()])),
        }
    }));
    oo.push(monadic(m, "System", "getenv", "System::getenv s - environment variable", |m, a0| {
        match a0.as_text() {
            Some(s) => match std::env::var(s) {
                Ok(v) => Ok(m.create_text(v)),
                Err(_) => Ok(m.create_none()),
            },
            None => Err(m.bad_args("System::getenv", &[a0.clone()])),
        }
    }));

    // basic I/O
    oo.push(variadic(m, "System", "print", "System::print x .. - print terms without escapes", |m, aa| {
        let mut s = String::new();
        for a in aa {
            match &**a {
                Term::Text(t) => s.push_str(t),
                Term::Char(c) => s.push(*c),
                _ => s.push_str(&m.render_term(a)),
            }
        }
        print!("{}", s);
        Ok(m.create_data2("System", "nop"))
    }));
    oo.push(medadic(m, "System", "getline", "System::getline - read a line from standard input", |m| {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => Ok(m.create_text(line.trim_end_matches('\n').to_string())),
            Err(e) => Err(m.create_text(format!("getline: {}", e))),
        }
    }));
    oo.push(variadic(m, "System", "format", "System::format f x .. - substitute arguments into a format text", |m, aa| {
        let f = match aa.first().and_then(|a| a.as_text()) {
            Some(f) => f.to_string(),
            None => return Err(m.bad_args("System::format", aa)),
        };
        let mut out = String::new();
        let mut next = 1;
        let mut rest = f.as_str();
        while let Some(i) = rest.find("{}") {
            out.push_str(&rest[..i]);
            match aa.get(next) {
                Some(a) => match &**a {
                    Term::Text(t) => out.push_str(t),
                    Term::Char(c) => out.push(*c),
                    _ => out.push_str(&m.render_term(a)),
                },
                None => return Err(m.bad_args("System::format", aa)),
            }
            next += 1;
            rest = &rest[i + 2..];
        }
        out.push_str(rest);
        Ok(m.create_text(out))
    }));

    oo
}

/// The key/value pairs of an `{object, k, v, …}` spine.
fn object_fields(m: &Machine, o: &TermRef) -> Option<Vec<(TermRef, TermRef)>> {
    let cell = o.as_array()?;
    let tt = cell.to_vec();
    let head = tt.first().cloned().flatten()?;
    if term::head_symbol(&head) != Some(crate::machine::SYMBOL_OBJECT) {
        return None;
    }
    let _ = m;
    let mut out = Vec::new();
    let mut i = 1;
    while i + 1 < tt.len() {
        out.push((tt[i].clone()?, tt[i + 1].clone()?));
        i += 2;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::array_of;

    fn machine_with_system() -> std::sync::Arc<Machine> {
        let m = Machine::new();
        for o in exports(&m) {
            m.define_data(o);
        }
        m
    }

    fn apply(m: &Machine, name: &str, args: Vec<TermRef>) -> crate::machine::ReduceResult {
        let mut ee = vec![m.get_combinator(name)];
        ee.extend(args);
        m.reduce(array_of(ee))
    }

    #[test]
    fn test_arithmetic() {
        let m = machine_with_system();
        let r = apply(&m, "System::+", vec![m.create_integer(2), m.create_integer(3)]);
        assert_eq!(r.result.unwrap().as_integer(), Some(5));
        let r = apply(&m, "System::*", vec![m.create_integer(6), m.create_integer(7)]);
        assert_eq!(r.result.unwrap().as_integer(), Some(42));
    }

    #[test]
    fn test_text_concat() {
        let m = machine_with_system();
        let r = apply(
            &m,
            "System::+",
            vec![m.create_text("caught "), m.create_text("oops")],
        );
        assert_eq!(r.result.unwrap().as_text(), Some("caught oops"));
    }

    #[test]
    fn test_divide_by_zero_raises() {
        let m = machine_with_system();
        let r = apply(&m, "System::/", vec![m.create_integer(1), m.create_integer(0)]);
        assert!(r.exception);
        assert_eq!(r.result.unwrap().as_text(), Some("divide by zero"));
    }

    #[test]
    fn test_overflow_raises() {
        let m = machine_with_system();
        let r = apply(
            &m,
            "System::+",
            vec![m.create_integer(i64::MAX), m.create_integer(1)],
        );
        assert!(r.exception);
    }

    #[test]
    fn test_bad_args_payload() {
        let m = machine_with_system();
        let r = apply(&m, "System::+", vec![m.create_integer(1), m.create_text("x")]);
        assert!(r.exception);
        let payload = r.result.unwrap();
        let a = payload.as_array().expect("structured payload");
        assert_eq!(a.get(0).unwrap().as_text(), Some("System::+"));
    }

    #[test]
    fn test_comparisons() {
        let m = machine_with_system();
        let r = apply(&m, "System::<", vec![m.create_integer(1), m.create_integer(2)]);
        assert!(m.is_true(&r.result.unwrap()));
        let r = apply(&m, "System::==", vec![m.create_text("a"), m.create_text("a")]);
        assert!(m.is_true(&r.result.unwrap()));
    }

    #[test]
    fn test_to_list_on_tuple() {
        let m = machine_with_system();
        let t = m.to_tuple(vec![m.create_integer(1), m.create_integer(2), m.create_integer(3)]);
        let r = apply(&m, "System::to_list", vec![t]);
        let l = r.result.unwrap();
        assert!(m.is_list(&l));
        assert_eq!(m.render_term(&l), "{1, 2, 3}");
    }

    #[test]
    fn test_object_get_set() {
        let m = machine_with_system();
        let obj = array_of(vec![
            m.create_data2("System", "object"),
            m.create_text("x"),
            m.create_integer(1),
        ]);
        let r = apply(&m, "System::get", vec![m.create_text("x"), obj.clone()]);
        assert_eq!(r.result.unwrap().as_integer(), Some(1));

        let r = apply(
            &m,
            "System::set",
            vec![m.create_text("x"), m.create_integer(2), obj.clone()],
        );
        let updated = r.result.unwrap();
        let r = apply(&m, "System::get", vec![m.create_text("x"), updated]);
        assert_eq!(r.result.unwrap().as_integer(), Some(2));
        // the original object is unchanged
        let r = apply(&m, "System::get", vec![m.create_text("x"), obj]);
        assert_eq!(r.result.unwrap().as_integer(), Some(1));
    }

    #[test]
    fn test_format() {
        let m = machine_with_system();
        let r = apply(
            &m,
            "System::format",
            vec![m.create_text("{} and {}"), m.create_integer(1), m.create_text("two")],
        );
        assert_eq!(r.result.unwrap().as_text(), Some("1 and two"));
    }
}
