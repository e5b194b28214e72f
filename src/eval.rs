//! The line evaluator: incremental batch evaluation.
//!
//! A line is an import, a using, a definition, a `val`, or an expression.
//! Imports go through the module manager; usings accumulate and prefix every
//! later definition; definitions compile through the ordinary pipeline with
//! implicit redeclaration allowed; an expression is wrapped into a synthetic
//! definition, compiled, and reduced.

use std::sync::Arc;

use tracing::debug;

use crate::ast::{Decl, Expr, Line, Unit};
use crate::compiler::{
    declare_unit_implicit, desugar_unit, emit_code, emit_data, identify_unit, lift_unit, DeclKind,
};
use crate::error::Result;
use crate::machine::Machine;
use crate::modules::ModuleManager;
use crate::parser;
use crate::position::Position;
use crate::term::{combinator, head_symbol, Combinator, Slot, TermRef};

/// Observer of one evaluation outcome.
pub type EvalCallback = Arc<dyn Fn(&Machine, &Slot) + Send + Sync>;

/// The default result printer; `nop` results stay silent.
pub fn default_main_callback(machine: &Machine, o: &Slot) {
    if let Some(t) = o {
        let nop = machine.enter_symbol2("System", "nop");
        if head_symbol(t) == Some(nop) {
            return;
        }
        println!("{}", machine.render_term(t));
    }
}

/// The default uncaught-exception printer.
pub fn default_exception_callback(machine: &Machine, e: &Slot) {
    println!("exception({})", machine.render_slot(e));
}

pub struct Eval {
    manager: ModuleManager,
    usings: Vec<Decl>,
}

impl Eval {
    pub fn new(manager: ModuleManager) -> Self {
        // the system namespace is in scope from the start
        let usings = vec![Decl::Using(
            Position::internal(),
            vec!["System".to_string()],
        )];
        Eval { manager, usings }
    }

    pub fn machine(&self) -> Arc<Machine> {
        self.manager.machine().clone()
    }

    pub fn manager_mut(&mut self) -> &mut ModuleManager {
        &mut self.manager
    }

    /// Load a module file and its transitive imports.
    pub fn eval_load(&mut self, filename: &str) -> Result<()> {
        self.manager.load(&Position::new(filename, 0, 0), filename)
    }

    /// Reduce every declared `val` and install the outcome as its value.
    pub fn eval_values(&mut self) {
        let machine = self.machine();
        for v in self.manager.values() {
            self.force_value(&machine, &v.string);
        }
    }

    fn force_value(&self, machine: &Machine, name: &str) {
        let c = machine.get_combinator(name);
        if machine.is_stub(&c) {
            return;
        }
        if matches!(&*c, crate::term::Term::Combinator(Combinator::Value(_, _))) {
            return;
        }
        debug!(val = name, "reduce value");
        let r = machine.reduce(c);
        match (r.exception, r.result) {
            (false, Some(v)) => {
                let s = machine.enter_symbol(name);
                machine.define_data(combinator(Combinator::Value(s, v)));
            }
            (true, e) => default_exception_callback(machine, &e),
            _ => {}
        }
    }

    /// Evaluate one interactive line, delivering expression outcomes to the
    /// given observers.
    pub fn eval_line(
        &mut self,
        line: &str,
        on_result: EvalCallback,
        on_exception: EvalCallback,
    ) -> Result<()> {
        for item in parser::parse_line(line)? {
            match item {
                Line::Decl(Decl::Import(p, name)) => {
                    self.manager.load(&p, &name)?;
                }
                Line::Decl(d @ Decl::Using(_, _)) => {
                    self.usings.push(d);
                }
                Line::Decl(d) => {
                    let vals = matches!(&d, Decl::Val(_, _, _));
                    let unit = self.handle_definition(d)?;
                    if vals {
                        let machine = self.machine();
                        let mut names = Vec::new();
                        collect_val_names(&unit, &mut names);
                        for n in names {
                            self.force_value(&machine, &n);
                        }
                    }
                }
                Line::Expr(e) => {
                    self.handle_expression(e, on_result.clone(), on_exception.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Evaluate a line with the default printers.
    pub fn eval_command(&mut self, line: &str) -> Result<()> {
        self.eval_line(
            line,
            Arc::new(default_main_callback),
            Arc::new(default_exception_callback),
        )
    }

    /// Batch entry: reduce `main` when a loaded module defined it.
    pub fn eval_main(&mut self) -> Result<()> {
        let machine = self.machine();
        let c = machine.get_combinator("main");
        if !machine.is_stub(&c) {
            self.reduce_with_callbacks(
                c,
                Arc::new(default_main_callback),
                Arc::new(default_exception_callback),
            );
        }
        Ok(())
    }

    /// Compile one declaration through the pipeline, prefixed by the
    /// accumulated usings; interactive redefinition is allowed.
    fn handle_definition(&mut self, d: Decl) -> Result<Unit> {
        let mut decls = self.usings.clone();
        decls.push(d);
        let mut unit = Unit { decls };

        let machine = self.machine();
        let env = self.manager.env_mut();
        declare_unit_implicit(env, &unit);
        let mut usings = Vec::new();
        identify_unit(env, &mut unit, &mut usings)?;
        desugar_unit(&mut unit);
        lift_unit(&mut unit);
        // lifted combinators come into scope implicitly
        for d in &unit.decls {
            if let Decl::Def(_, Expr::Combinator(_, parts, n), _) = d {
                env.declare_implicit(&Expr::fq_name(parts, n), DeclKind::Def);
            }
        }
        let _guard = machine.lock();
        emit_data(&machine, &unit);
        emit_code(&machine, &unit)?;
        Ok(unit)
    }

    /// Wrap an expression into a synthetic definition, compile, and reduce.
    fn handle_expression(
        &mut self,
        e: Expr,
        on_result: EvalCallback,
        on_exception: EvalCallback,
    ) -> Result<()> {
        let p = e.position();
        let name = Expr::Combinator(p.clone(), Vec::new(), "Dummy".to_string());
        self.handle_definition(Decl::Def(p, name, e))?;

        let machine = self.machine();
        let c = machine.get_combinator("Dummy");
        if !machine.is_stub(&c) {
            self.reduce_with_callbacks(c, on_result, on_exception);
        }
        Ok(())
    }

    fn reduce_with_callbacks(
        &self,
        c: TermRef,
        on_result: EvalCallback,
        on_exception: EvalCallback,
    ) {
        let machine = self.machine();
        let sr = machine.enter_symbol2("Internal", "result");
        let ret = combinator(Combinator::Sink(
            sr,
            Arc::new(move |m: &Machine, o: &Slot| on_result(m, o)),
        ));
        let se = machine.enter_symbol2("Internal", "exception");
        let exc = combinator(Combinator::Sink(
            se,
            Arc::new(move |m: &Machine, o: &Slot| on_exception(m, o)),
        ));
        machine.reduce_with(c, ret, exc, &crate::machine::RunFlag::new());
    }
}

fn collect_val_names(unit: &Unit, out: &mut Vec<String>) {
    for d in &unit.decls {
        if let Decl::Val(_, Expr::Combinator(_, parts, n), _) = d {
            out.push(Expr::fq_name(parts, n));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Options;
    use parking_lot::Mutex;

    fn evaluator() -> Eval {
        let mm = ModuleManager::new(Options::new(), Machine::new()).unwrap();
        Eval::new(mm)
    }

    /// Evaluate a line and capture delivered results as rendered strings.
    fn eval_capture(eval: &mut Eval, line: &str) -> Vec<(bool, String)> {
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
        .unwrap();
        let v = out.lock().clone();
        v
    }

    #[test]
    fn test_expression_line() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "1 + 2");
        assert_eq!(r, vec![(false, "3".to_string())]);
    }

    #[test]
    fn test_definition_then_use() {
        let mut e = evaluator();
        assert!(eval_capture(&mut e, "def double = [x -> x + x]").is_empty());
        let r = eval_capture(&mut e, "double 21");
        assert_eq!(r, vec![(false, "42".to_string())]);
    }

    #[test]
    fn test_factorial_end_to_end() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "def fac = [0 -> 1 | n -> n * (fac (n - 1))]; fac 5");
        assert_eq!(r, vec![(false, "120".to_string())]);
    }

    #[test]
    fn test_map_end_to_end() {
        let mut e = evaluator();
        let r = eval_capture(
            &mut e,
            "def map = [f nil -> nil | f (cons x xx) -> cons (f x) (map f xx)]; \
             map [x -> x + 1] {1, 2, 3}",
        );
        assert_eq!(r, vec![(false, "{2, 3, 4}".to_string())]);
    }

    #[test]
    fn test_tuple_and_to_list() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "(1, \"a\", 'z')");
        assert_eq!(r, vec![(false, "(1, \"a\", 'z')".to_string())]);
        let r = eval_capture(&mut e, "System::to_list (1, 2, 3)");
        assert_eq!(r, vec![(false, "{1, 2, 3}".to_string())]);
    }

    #[test]
    fn test_try_catch_line() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "try (throw \"oops\") catch [e -> \"caught \" + e]");
        assert_eq!(r, vec![(false, "\"caught oops\"".to_string())]);
    }

    #[test]
    fn test_uncaught_exception_goes_to_handler() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "throw 42");
        assert_eq!(r, vec![(true, "42".to_string())]);
    }

    #[test]
    fn test_data_declaration_and_match() {
        let mut e = evaluator();
        eval_capture(&mut e, "data leaf, node");
        let r = eval_capture(
            &mut e,
            "def depth = [leaf -> 0 | (node l r) -> 1 + (depth l)]; depth (node leaf leaf)",
        );
        assert_eq!(r, vec![(false, "1".to_string())]);
    }

    #[test]
    fn test_val_reduces_once() {
        let mut e = evaluator();
        eval_capture(&mut e, "val x = 2 * 21");
        let m = e.machine();
        let c = m.get_combinator("x");
        assert!(matches!(
            &*c,
            crate::term::Term::Combinator(Combinator::Value(_, _))
        ));
        let r = eval_capture(&mut e, "x");
        assert_eq!(r, vec![(false, "42".to_string())]);
    }

    #[test]
    fn test_redefinition_wins() {
        let mut e = evaluator();
        eval_capture(&mut e, "def f = 1");
        eval_capture(&mut e, "def f = 2");
        let r = eval_capture(&mut e, "f");
        assert_eq!(r, vec![(false, "2".to_string())]);
    }

    #[test]
    fn test_over_application_scenario() {
        let mut e = evaluator();
        let r = eval_capture(&mut e, "def f = [x -> System::id]; f 1 2");
        assert_eq!(r, vec![(false, "2".to_string())]);
    }

    #[test]
    fn test_compile_error_reported_with_position() {
        let mut e = evaluator();
        let r = e.eval_command("def f = ");
        assert!(r.is_err());
        let r = e.eval_command("undeclared_name 1");
        assert!(r.is_err());
    }
}
