//! The `math` module: floating-point functions and constants.

use std::cmp::Ordering;

use super::{dyadic, medadic, monadic};
use crate::machine::Machine;
use crate::term::{compare, Term, TermRef};

fn float_fn(
    m: &Machine,
    n: &'static str,
    doc: &'static str,
    f: fn(f64) -> f64,
) -> TermRef {
    monadic(m, "Math", n, doc, move |m, a0| match &**a0 {
        Term::Float(x) => Ok(m.create_float(f(*x))),
        Term::Integer(x) => Ok(m.create_float(f(*x as f64))),
        _ => Err(m.bad_args(n, &[a0.clone()])),
    })
}

pub fn exports(m: &Machine) -> Vec<TermRef> {
    let mut oo = Vec::new();

    oo.push(medadic(m, "Math", "pi", "Math::pi - the constant pi", |m| {
        Ok(m.create_float(std::f64::consts::PI))
    }));
    oo.push(medadic(m, "Math", "e", "Math::e - Euler's number", |m| {
        Ok(m.create_float(std::f64::consts::E))
    }));

    oo.push(float_fn(m, "sqrt", "Math::sqrt x - square root", f64::sqrt));
    oo.push(float_fn(m, "exp", "Math::exp x - exponential", f64::exp));
    oo.push(float_fn(m, "ln", "Math::ln x - natural logarithm", f64::ln));
    oo.push(float_fn(m, "log", "Math::log x - base 10 logarithm", f64::log10));
    oo.push(float_fn(m, "sin", "Math::sin x - sine", f64::sin));
    oo.push(float_fn(m, "cos", "Math::cos x - cosine", f64::cos));
    oo.push(float_fn(m, "tan", "Math::tan x - tangent", f64::tan));
    oo.push(float_fn(m, "floor", "Math::floor x - round down", f64::floor));
    oo.push(float_fn(m, "ceil", "Math::ceil x - round up", f64::ceil));
    oo.push(float_fn(m, "round", "Math::round x - round to nearest", f64::round));

    oo.push(monadic(m, "Math", "abs", "Math::abs x - absolute value", |m, a0| match &**a0 {
        Term::Integer(n) => n
            .checked_abs()
            .map(|r| m.create_integer(r))
            .ok_or_else(|| m.create_text("overflow")),
        Term::Float(f) => Ok(m.create_float(f.abs())),
        _ => Err(m.bad_args("Math::abs", &[a0.clone()])),
    }));

    oo.push(dyadic(m, "Math", "pow", "Math::pow x y - x raised to y", |m, a0, a1| {
        match (&**a0, &**a1) {
            (Term::Float(x), Term::Float(y)) => Ok(m.create_float(x.powf(*y))),
            (Term::Integer(x), Term::Integer(y)) if *y >= 0 && *y <= u32::MAX as i64 => x
                .checked_pow(*y as u32)
                .map(|r| m.create_integer(r))
                .ok_or_else(|| m.create_text("overflow")),
            _ => Err(m.bad_args("Math::pow", &[a0.clone(), a1.clone()])),
        }
    }));

    oo.push(dyadic(m, "Math", "min", "Math::min x y - smaller of two terms", |_m, a0, a1| {
        Ok(if compare(a0, a1) == Ordering::Greater {
            a1.clone()
        } else {
            a0.clone()
        })
    }));
    oo.push(dyadic(m, "Math", "max", "Math::max x y - larger of two terms", |_m, a0, a1| {
        Ok(if compare(a0, a1) == Ordering::Less {
            a1.clone()
        } else {
            a0.clone()
        })
    }));

    oo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::array_of;

    fn machine_with_math() -> std::sync::Arc<Machine> {
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
    fn test_sqrt() {
        let m = machine_with_math();
        let r = apply(&m, "Math::sqrt", vec![m.create_float(9.0)]);
        assert_eq!(r.result.unwrap().as_float(), Some(3.0));
    }

    #[test]
    fn test_pi_is_a_constant() {
        let m = machine_with_math();
        let r = m.reduce(m.get_combinator("Math::pi"));
        assert_eq!(r.result.unwrap().as_float(), Some(std::f64::consts::PI));
    }

    #[test]
    fn test_integer_pow() {
        let m = machine_with_math();
        let r = apply(&m, "Math::pow", vec![m.create_integer(2), m.create_integer(10)]);
        assert_eq!(r.result.unwrap().as_integer(), Some(1024));
    }

    #[test]
    fn test_min_max() {
        let m = machine_with_math();
        let r = apply(&m, "Math::min", vec![m.create_integer(3), m.create_integer(1)]);
        assert_eq!(r.result.unwrap().as_integer(), Some(1));
        let r = apply(&m, "Math::max", vec![m.create_integer(3), m.create_integer(1)]);
        assert_eq!(r.result.unwrap().as_integer(), Some(3));
    }
}
