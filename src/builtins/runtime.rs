//! The `runtime` module: querying and manipulating the machine itself —
//! disassembly, assembly, term serialization, docstrings, module
//! introspection, and type predicates.

use std::any::Any;
use std::cmp::Ordering;

use super::{medadic, monadic};
use crate::bytecode::{assemble, disassemble};
use crate::machine::{Machine, ModuleInfo};
use crate::serialize::{deserialize, serialize};
use crate::term::{self, Combinator, Opaque, Symbol, Term, TermRef};

/// A loaded module as an opaque runtime value.
struct ModuleValue {
    symbol: Symbol,
    info: ModuleInfo,
}

impl Opaque for ModuleValue {
    fn symbol(&self) -> Symbol {
        self.symbol
    }

    fn compare(&self, other: &dyn Opaque) -> Ordering {
        match other.as_any().downcast_ref::<ModuleValue>() {
            Some(o) => self.info.path.cmp(&o.info.path),
            None => Ordering::Less,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn module_value(m: &Machine, info: ModuleInfo) -> TermRef {
    term::opaque(Box::new(ModuleValue {
        symbol: m.enter_symbol2("System", "module"),
        info,
    }))
}

fn as_module(o: &TermRef) -> Option<&ModuleInfo> {
    match &**o {
        Term::Opaque(v) => v.as_any().downcast_ref::<ModuleValue>().map(|m| &m.info),
        _ => None,
    }
}

pub fn exports(m: &Machine) -> Vec<TermRef> {
    let mut oo = Vec::new();

    oo.push(monadic(m, "System", "dis", "System::dis o - disassemble a combinator object", |m, a0| {
        match disassemble(m, a0) {
            Ok(s) => Ok(m.create_text(s)),
            Err(_) => Err(m.bad_args("System::dis", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "asm", "System::asm s - assemble bytecode into a combinator", |m, a0| {
        match a0.as_text() {
            Some(s) => assemble(m, s).map_err(|e| m.create_text(e.to_string())),
            None => Err(m.bad_args("System::asm", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "serialize", "System::serialize t - serialize a term to a text", |m, a0| {
        serialize(m, a0)
            .map(|s| m.create_text(s))
            .map_err(|e| m.create_text(e))
    }));

    oo.push(monadic(m, "System", "deserialize", "System::deserialize t - deserialize a text to a term", |m, a0| {
        match a0.as_text() {
            Some(s) => deserialize(m, s).map_err(|e| m.create_text(e)),
            None => Err(m.bad_args("System::deserialize", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "docstring", "System::docstring o - docstring of a combinator", |m, a0| {
        match m.docstring(a0) {
            Some(d) => Ok(m.create_text(d)),
            None => Ok(m.create_none()),
        }
    }));

    // module introspection
    oo.push(medadic(m, "System", "query_modules", "System::query_modules - list the loaded modules", |m| {
        let mm = m
            .module_infos()
            .into_iter()
            .map(|i| module_value(m, i))
            .collect();
        Ok(m.to_list(mm))
    }));

    oo.push(monadic(m, "System", "is_module", "System::is_module m - check for a module value", |m, a0| {
        Ok(m.create_bool(as_module(a0).is_some()))
    }));

    oo.push(monadic(m, "System", "query_module_name", "System::query_module_name m - name of a module", |m, a0| {
        match as_module(a0) {
            Some(i) => Ok(m.create_text(i.name.clone())),
            None => Err(m.bad_args("System::query_module_name", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "query_module_path", "System::query_module_path m - path of a module", |m, a0| {
        match as_module(a0) {
            Some(i) => Ok(m.create_text(i.path.clone())),
            None => Err(m.bad_args("System::query_module_path", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "query_module_imports", "System::query_module_imports m - imports of a module", |m, a0| {
        match as_module(a0) {
            Some(i) => {
                let ii = i.imports.iter().map(|s| m.create_text(s.clone())).collect();
                Ok(m.to_list(ii))
            }
            None => Err(m.bad_args("System::query_module_imports", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "query_module_exports", "System::query_module_exports m - exports of a module", |m, a0| {
        match as_module(a0) {
            Some(i) => Ok(m.to_list(i.exports.clone())),
            None => Err(m.bad_args("System::query_module_exports", &[a0.clone()])),
        }
    }));

    // type predicates
    oo.push(predicate(m, "is_integer", "System::is_integer o - test for integer", |t| {
        matches!(&**t, Term::Integer(_))
    }));
    oo.push(predicate(m, "is_float", "System::is_float o - test for float", |t| {
        matches!(&**t, Term::Float(_))
    }));
    oo.push(predicate(m, "is_character", "System::is_character o - test for character", |t| {
        matches!(&**t, Term::Char(_))
    }));
    oo.push(predicate(m, "is_text", "System::is_text o - test for text", |t| {
        matches!(&**t, Term::Text(_))
    }));
    oo.push(predicate(m, "is_combinator", "System::is_combinator o - test for combinator", |t| {
        t.is_combinator()
    }));
    oo.push(predicate(m, "is_opaque", "System::is_opaque o - test for opaque value", |t| {
        matches!(&**t, Term::Opaque(_))
    }));
    oo.push(predicate(m, "is_array", "System::is_array o - test for array value", |t| {
        t.is_array()
    }));
    oo.push(predicate(m, "is_bytecode", "System::is_bytecode o - test for bytecode value", |t| {
        matches!(&**t, Term::Combinator(Combinator::Bytecode(_)))
    }));

    oo.push(monadic(m, "System", "get_array", "System::get_array o - array to list", |m, a0| {
        match a0.as_array() {
            Some(cell) => {
                let mut vv = Vec::new();
                for s in cell.to_vec() {
                    match s {
                        Some(t) => vv.push(t),
                        None => return Err(m.bad_args("System::get_array", &[a0.clone()])),
                    }
                }
                Ok(m.to_list(vv))
            }
            None => Err(m.bad_args("System::get_array", &[a0.clone()])),
        }
    }));

    oo.push(monadic(m, "System", "get_bytecode", "System::get_bytecode o - bytecode listing of a combinator", |m, a0| {
        match &**a0 {
            Term::Combinator(Combinator::Bytecode(_)) => match disassemble(m, a0) {
                Ok(s) => Ok(m.create_text(s)),
                Err(e) => Err(m.create_text(e)),
            },
            _ => Err(m.bad_args("System::get_bytecode", &[a0.clone()])),
        }
    }));

    oo
}

fn predicate(
    m: &Machine,
    n: &'static str,
    doc: &'static str,
    f: fn(&TermRef) -> bool,
) -> TermRef {
    monadic(m, "System", n, doc, move |m, a0| Ok(m.create_bool(f(a0))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::array_of;

    fn machine_with_runtime() -> std::sync::Arc<Machine> {
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
    fn test_predicates() {
        let m = machine_with_runtime();
        let r = apply(&m, "System::is_integer", vec![m.create_integer(1)]);
        assert!(m.is_true(&r.result.unwrap()));
        let r = apply(&m, "System::is_text", vec![m.create_integer(1)]);
        assert!(m.is_false(&r.result.unwrap()));
    }

    #[test]
    fn test_dis_of_data_constructor() {
        let m = machine_with_runtime();
        let c = m.create_data2("Shape", "leaf");
        let r = apply(&m, "System::dis", vec![c]);
        assert_eq!(r.result.unwrap().as_text(), Some("data 01 Shape::leaf end\n"));
    }

    #[test]
    fn test_serialize_roundtrip_via_builtins() {
        let m = machine_with_runtime();
        let t = m.to_list(vec![m.create_integer(1), m.create_integer(2)]);
        let r = apply(&m, "System::serialize", vec![t.clone()]);
        let s = r.result.unwrap();
        let r = apply(&m, "System::deserialize", vec![s]);
        assert!(term::equal(&t, &r.result.unwrap()));
    }

    #[test]
    fn test_get_array() {
        let m = machine_with_runtime();
        let a = array_of(vec![m.create_integer(1), m.create_integer(2)]);
        let r = apply(&m, "System::get_array", vec![a]);
        assert_eq!(m.render_term(&r.result.unwrap()), "{1, 2}");
    }
}
