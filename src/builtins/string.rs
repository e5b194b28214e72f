//! The `string` module: text inspection and manipulation.

use super::{dyadic, monadic};
use crate::machine::Machine;
use crate::term::{Term, TermRef};

pub fn exports(m: &Machine) -> Vec<TermRef> {
    let mut oo = Vec::new();

    oo.push(monadic(m, "String", "length", "String::length s - number of characters", |m, a0| {
        match a0.as_text() {
            Some(s) => Ok(m.create_integer(s.chars().count() as i64)),
            None => Err(m.bad_args("String::length", &[a0.clone()])),
        }
    }));

    oo.push(dyadic(m, "String", "append", "String::append s0 s1 - concatenation", |m, a0, a1| {
        match (a0.as_text(), a1.as_text()) {
            (Some(x), Some(y)) => Ok(m.create_text(format!("{}{}", x, y))),
            _ => Err(m.bad_args("String::append", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(monadic(m, "String", "to_chars", "String::to_chars s - text to character list", |m, a0| {
        match a0.as_text() {
            Some(s) => Ok(m.to_list(s.chars().map(|c| m.create_char(c)).collect())),
            None => Err(m.bad_args("String::to_chars", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "String", "from_chars", "String::from_chars l - character list to text", |m, a0| {
        if !m.is_list(a0) {
            return Err(m.bad_args("String::from_chars", &[a0.clone()]));
        }
        let mut s = String::new();
        for c in m.from_list(a0) {
            match &*c {
                Term::Char(c) => s.push(*c),
                _ => return Err(m.bad_args("String::from_chars", &[a0.clone()])),
            }
        }
        Ok(m.create_text(s))
    }));

    oo.push(dyadic(m, "String", "index", "String::index n s - nth character", |m, a0, a1| {
        match (a0.as_integer(), a1.as_text()) {
            (Some(n), Some(s)) if n >= 0 => match s.chars().nth(n as usize) {
                Some(c) => Ok(m.create_char(c)),
                None => Ok(m.create_none()),
            },
            _ => Err(m.bad_args("String::index", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "String", "count", "String::count s0 s1 - occurrences of s0 in s1", |m, a0, a1| {
        match (a0.as_text(), a1.as_text()) {
            (Some(pat), Some(s)) if !pat.is_empty() => {
                Ok(m.create_integer(s.matches(pat).count() as i64))
            }
            _ => Err(m.bad_args("String::count", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "String", "contains", "String::contains s0 s1 - s1 contains s0", |m, a0, a1| {
        match (a0.as_text(), a1.as_text()) {
            (Some(pat), Some(s)) => Ok(m.create_bool(s.contains(pat))),
            _ => Err(m.bad_args("String::contains", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "String", "starts_with", "String::starts_with s0 s1 - s1 starts with s0", |m, a0, a1| {
        match (a0.as_text(), a1.as_text()) {
            (Some(pat), Some(s)) => Ok(m.create_bool(s.starts_with(pat))),
            _ => Err(m.bad_args("String::starts_with", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "String", "ends_with", "String::ends_with s0 s1 - s1 ends with s0", |m, a0, a1| {
        match (a0.as_text(), a1.as_text()) {
            (Some(pat), Some(s)) => Ok(m.create_bool(s.ends_with(pat))),
            _ => Err(m.bad_args("String::ends_with", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(monadic(m, "String", "to_upper", "String::to_upper s - upper case", |m, a0| {
        match a0.as_text() {
            Some(s) => Ok(m.create_text(s.to_uppercase())),
            None => Err(m.bad_args("String::to_upper", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "String", "to_lower", "String::to_lower s - lower case", |m, a0| {
        match a0.as_text() {
            Some(s) => Ok(m.create_text(s.to_lowercase())),
            None => Err(m.bad_args("String::to_lower", &[a0.clone()])),
        }
    }));

    oo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::array_of;

    fn machine_with_string() -> std::sync::Arc<Machine> {
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
    fn test_length_counts_chars() {
        let m = machine_with_string();
        let r = apply(&m, "String::length", vec![m.create_text("héllo")]);
        assert_eq!(r.result.unwrap().as_integer(), Some(5));
    }

    #[test]
    fn test_chars_roundtrip() {
        let m = machine_with_string();
        let r = apply(&m, "String::to_chars", vec![m.create_text("ab")]);
        let l = r.result.unwrap();
        let r = apply(&m, "String::from_chars", vec![l]);
        assert_eq!(r.result.unwrap().as_text(), Some("ab"));
    }

    #[test]
    fn test_contains() {
        let m = machine_with_string();
        let r = apply(
            &m,
            "String::contains",
            vec![m.create_text("ell"), m.create_text("hello")],
        );
        assert!(m.is_true(&r.result.unwrap()));
    }
}
