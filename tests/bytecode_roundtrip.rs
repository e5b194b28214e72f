//! Disassemble/assemble and serialize/deserialize round trips.

mod common;

use common::{eval_capture, eval_one, evaluator};

use egel::bytecode::{assemble, disassemble};
use egel::serialize::{deserialize, serialize};
use egel::term;

#[test]
fn test_reassembled_factorial_still_computes() {
    let mut e = evaluator();
    eval_capture(&mut e, "def fac = [0 -> 1 | n -> n * (fac (n - 1))]");
    let m = e.machine();

    let fac = m.get_combinator("fac");
    let listing = disassemble(&m, &fac).expect("disassemble");
    assert!(listing.starts_with("bytecode 01\n"));
    assert!(listing.ends_with("end\n"));

    let fac2 = assemble(&m, &listing).expect("assemble");
    let app = term::array_of(vec![fac2, m.create_integer(5)]);
    let r = m.reduce(app);
    assert!(!r.exception);
    assert_eq!(r.result.unwrap().as_integer(), Some(120));
}

#[test]
fn test_listing_is_stable_under_roundtrip() {
    let mut e = evaluator();
    eval_capture(&mut e, "def twice = [x -> x + x]");
    let m = e.machine();

    let c0 = m.get_combinator("twice");
    let d0 = disassemble(&m, &c0).unwrap();
    let c1 = assemble(&m, &d0).unwrap();
    let d1 = disassemble(&m, &c1).unwrap();
    assert_eq!(d0, d1);
}

#[test]
fn test_data_constructor_roundtrip() {
    let mut e = evaluator();
    eval_capture(&mut e, "data leaf");
    let m = e.machine();
    let c = m.get_combinator("leaf");
    let d = disassemble(&m, &c).unwrap();
    assert_eq!(d, "data 01 leaf end\n");
    let c2 = assemble(&m, &d).unwrap();
    assert!(term::equal(&c, &c2));
}

#[test]
fn test_roundtrip_through_builtins() {
    // System::asm (System::dis fac) applied to 5 evaluates to 120
    let mut e = evaluator();
    eval_capture(&mut e, "def fac = [0 -> 1 | n -> n * (fac (n - 1))]");
    let r = eval_one(&mut e, "(System::asm (System::dis fac)) 5");
    assert_eq!(r, "120");
}

#[test]
fn test_serialize_roundtrip_closed_terms() {
    let mut e = evaluator();
    eval_capture(&mut e, "data branch");
    let m = e.machine();

    let terms = vec![
        m.create_integer(-7),
        m.create_float(2.5),
        m.create_char('λ'),
        m.create_text("line\nbreak"),
        m.to_list(vec![m.create_integer(1), m.create_text("two")]),
        m.to_tuple(vec![m.create_integer(1), m.create_integer(2)]),
        term::array_of(vec![
            m.get_combinator("branch"),
            m.create_integer(1),
            m.create_integer(2),
        ]),
    ];
    for t in terms {
        let s = serialize(&m, &t).expect("serialize");
        let u = deserialize(&m, &s).expect("deserialize");
        assert!(term::equal(&t, &u), "round trip changed {}", m.render_term(&t));
    }
}

#[test]
fn test_serialize_via_language() {
    let mut e = evaluator();
    let r = eval_one(
        &mut e,
        "System::deserialize (System::serialize {1, {2, 3}, \"x\"})",
    );
    assert_eq!(r, "{1, {2, 3}, \"x\"}");
}
