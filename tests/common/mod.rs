//! Shared helpers for the end-to-end test suites.

use std::sync::Arc;

use parking_lot::Mutex;

use egel::eval::Eval;
use egel::machine::Machine;
use egel::modules::{ModuleManager, Options};
use egel::term::Slot;

/// A fresh evaluator over its own machine.
pub fn evaluator() -> Eval {
    evaluator_with_options(Options::new())
}

pub fn evaluator_with_options(options: Options) -> Eval {
    let manager = ModuleManager::new(options, Machine::new()).expect("internal modules load");
    Eval::new(manager)
}

/// Evaluate a line and collect every delivered outcome as
/// `(is_exception, rendered_term)`.
pub fn eval_capture(eval: &mut Eval, line: &str) -> Vec<(bool, String)> {
    let out: Arc<Mutex<Vec<(bool, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let o0 = out.clone();
    let o1 = out.clone();
    eval.eval_line(
        line,
        Arc::new(move |m: &Machine, o: &Slot| {
            o0.lock().push((false, m.render_slot(o)));
        }),
        Arc::new(move |m: &Machine, o: &Slot| {
            o1.lock().push((true, m.render_slot(o)));
        }),
    )
    .unwrap_or_else(|e| panic!("evaluation of {:?} failed: {}", line, e));
    let v = out.lock().clone();
    v
}

/// Evaluate a line expected to deliver exactly one ordinary result.
pub fn eval_one(eval: &mut Eval, line: &str) -> String {
    let rr = eval_capture(eval, line);
    assert_eq!(rr.len(), 1, "expected one result from {:?}, got {:?}", line, rr);
    assert!(!rr[0].0, "unexpected exception from {:?}: {}", line, rr[0].1);
    rr[0].1.clone()
}
