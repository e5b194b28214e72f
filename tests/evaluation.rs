//! End-to-end evaluation scenarios: definitions, pattern matching, lists,
//! tuples, exceptions, and application arity behavior.

mod common;

use common::{eval_capture, eval_one, evaluator};

#[test]
fn test_factorial() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "def fac = [0 -> 1 | n -> n * (fac (n - 1))]; fac 5");
    assert_eq!(r, "120");
}

#[test]
fn test_map_over_list_literal() {
    let mut e = evaluator();
    let r = eval_one(
        &mut e,
        "def map = [f nil -> nil | f (cons x xx) -> cons (f x) (map f xx)]; \
         map [x -> x + 1] {1, 2, 3}",
    );
    assert_eq!(r, "{2, 3, 4}");
}

#[test]
fn test_tuple_is_a_spine() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "(1, \"a\", 'z')");
    assert_eq!(r, "(1, \"a\", 'z')");

    let m = e.machine();
    let rr = m.reduce(m.get_combinator("Dummy"));
    let v = rr.result.expect("tuple value");
    // four slots: the tuple constructor plus three elements
    assert_eq!(v.as_array().map(|a| a.len()), Some(4));
}

#[test]
fn test_tuple_to_list() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "System::to_list (1, 2, 3)");
    assert_eq!(r, "{1, 2, 3}");
}

#[test]
fn test_throw_caught_by_handler() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "try (throw \"oops\") catch [e -> \"caught \" + e]");
    assert_eq!(r, "\"caught oops\"");
}

#[test]
fn test_try_without_throw_is_transparent() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "try 1 + 2 catch [e -> 99]");
    assert_eq!(r, "3");
}

#[test]
fn test_uncaught_throw_reaches_top_level() {
    let mut e = evaluator();
    let rr = eval_capture(&mut e, "throw {1, 2}");
    assert_eq!(rr, vec![(true, "{1, 2}".to_string())]);
}

#[test]
fn test_nested_handlers_pick_nearest() {
    let mut e = evaluator();
    let r = eval_one(
        &mut e,
        "try (try (throw 1) catch [x -> x + 10]) catch [x -> x + 100]",
    );
    assert_eq!(r, "11");
}

#[test]
fn test_exception_in_argument_position() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "try 1 + (throw 7) catch [x -> x]");
    assert_eq!(r, "7");
}

#[test]
fn test_first_match_wins() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "def pick = [x -> 1 | 0 -> 2]; pick 0");
    assert_eq!(r, "1");
}

#[test]
fn test_over_application_reapplies_trailing_arguments() {
    let mut e = evaluator();
    // f x = g; f a b c reduces to g b c
    let r = eval_one(
        &mut e,
        "def g = [x y -> x + y]; def f = [x -> g]; f 1 2 40",
    );
    assert_eq!(r, "42");
}

#[test]
fn test_partial_application() {
    let mut e = evaluator();
    eval_capture(&mut e, "def add = [x y -> x + y]; def inc = add 1");
    let r = eval_one(&mut e, "inc 41");
    assert_eq!(r, "42");
}

#[test]
fn test_unmatched_call_raises_fail() {
    let mut e = evaluator();
    let rr = eval_capture(&mut e, "def z = [0 -> 0]; z 1");
    assert_eq!(rr.len(), 1);
    assert!(rr[0].0, "expected an exception, got {:?}", rr);
    // the payload carries the original application
    assert!(rr[0].1.contains("z"), "{}", rr[0].1);
}

#[test]
fn test_arithmetic_exceptions() {
    let mut e = evaluator();
    let rr = eval_capture(&mut e, "1 / 0");
    assert_eq!(rr, vec![(true, "\"divide by zero\"".to_string())]);
    let rr = eval_capture(&mut e, "try 1 / 0 catch [x -> x]");
    assert_eq!(rr, vec![(false, "\"divide by zero\"".to_string())]);
}

#[test]
fn test_guards_and_conditionals() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "if 1 < 2 then \"yes\" else \"no\"");
    assert_eq!(r, "\"yes\"");
    let r = eval_one(&mut e, "if true && false then 1 else 2");
    assert_eq!(r, "2");
    // the untaken branch never evaluates
    let r = eval_one(&mut e, "if true then 1 else (1 / 0)");
    assert_eq!(r, "1");
}

#[test]
fn test_let_and_lambda() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "let X = 40 in X + 2");
    assert_eq!(r, "42");
    let r = eval_one(&mut e, "(\\x y -> x * y) 6 7");
    assert_eq!(r, "42");
}

#[test]
fn test_user_defined_operator() {
    let mut e = evaluator();
    eval_capture(&mut e, "def +++ = [x y -> (x + y) + 1]");
    let r = eval_one(&mut e, "1 +++ 2");
    assert_eq!(r, "4");
}

#[test]
fn test_namespaces_and_using() {
    let mut e = evaluator();
    eval_capture(&mut e, "namespace Shape ( data circle, square def area = [circle -> 3 | square -> 4] )");
    let r = eval_one(&mut e, "Shape::area Shape::circle");
    assert_eq!(r, "3");
    eval_capture(&mut e, "using Shape");
    let r = eval_one(&mut e, "area square");
    assert_eq!(r, "4");
}

#[test]
fn test_reducer_determinism() {
    let mut a = evaluator();
    let mut b = evaluator();
    let src = "def fib = [0 -> 0 | 1 -> 1 | n -> (fib (n - 1)) + (fib (n - 2))]; fib 15";
    assert_eq!(eval_one(&mut a, src), eval_one(&mut b, src));
}

#[test]
fn test_cons_pattern_with_dotted_tail() {
    let mut e = evaluator();
    let r = eval_one(&mut e, "def heads = [{x | _} -> x]; heads {9, 8, 7}");
    assert_eq!(r, "9");
}

#[test]
fn test_deep_recursion_does_not_overflow() {
    // the trampoline turns deep call chains into thunk chains
    let mut e = evaluator();
    let r = eval_one(
        &mut e,
        "def count = [0 -> 0 | n -> 1 + (count (n - 1))]; count 100000",
    );
    assert_eq!(r, "100000");
}
