//! The machine: process-wide symbol and data tables, distinguished symbols,
//! and the trampolining reducer.
//!
//! The machine is a handle threaded through every API so that tests can
//! isolate state; the CLI driver constructs exactly one. The symbol table is
//! a bijection between fully-qualified names and compact ids; the data table
//! is the append-only root set that bytecode refers to by `data_id`.
//! Recursive combinators refer to each other through the data table rather
//! than by direct pointer, which is what makes reference counting sufficient
//! for top-level cycles.

use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::collections::BTreeMap;

use itertools::Itertools;
use lasso::{Key, Spur, ThreadedRodeo};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::term::{
    self, array, combinator, head_symbol, integer, Arity, Builtin, BuiltinFn, Combinator, DataId,
    Slot, Symbol, Term, TermKey, TermRef,
};

// Distinguished symbols, interned in this order at machine construction.
pub const SYMBOL_INT: Symbol = Symbol(0);
pub const SYMBOL_FLOAT: Symbol = Symbol(1);
pub const SYMBOL_CHAR: Symbol = Symbol(2);
pub const SYMBOL_TEXT: Symbol = Symbol(3);
pub const SYMBOL_NONE: Symbol = Symbol(4);
pub const SYMBOL_TRUE: Symbol = Symbol(5);
pub const SYMBOL_FALSE: Symbol = Symbol(6);
pub const SYMBOL_TUPLE: Symbol = Symbol(7);
pub const SYMBOL_NIL: Symbol = Symbol(8);
pub const SYMBOL_CONS: Symbol = Symbol(9);
pub const SYMBOL_OBJECT: Symbol = Symbol(10);

/// Reducer run states for cooperative cancellation.
pub const RUN_RUNNING: u8 = 0;
pub const RUN_SLEEPING: u8 = 1;
pub const RUN_HALTED: u8 = 2;

/// Shared tri-state flag observed by the reducer at every loop head.
#[derive(Clone, Default)]
pub struct RunFlag(Arc<AtomicU8>);

impl RunFlag {
    pub fn new() -> Self {
        RunFlag(Arc::new(AtomicU8::new(RUN_RUNNING)))
    }

    pub fn set(&self, state: u8) {
        self.0.store(state, AtomicOrdering::SeqCst);
    }

    pub fn get(&self) -> u8 {
        self.0.load(AtomicOrdering::SeqCst)
    }

    pub fn halt(&self) {
        self.set(RUN_HALTED);
    }
}

/// The outcome of a reduction: the delivered term and whether it arrived
/// through the exception continuation.
#[derive(Debug, Clone, Default)]
pub struct ReduceResult {
    pub result: Slot,
    pub exception: bool,
}

/// Description of a loaded module, kept for runtime introspection.
#[derive(Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub path: String,
    pub imports: Vec<String>,
    pub exports: Vec<TermRef>,
}

struct DataTable {
    to: Vec<TermRef>,
    from: BTreeMap<TermKey, DataId>,
}

impl DataTable {
    fn new() -> Self {
        DataTable {
            to: Vec::new(),
            from: BTreeMap::new(),
        }
    }

    fn enter(&mut self, o: TermRef) -> DataId {
        match self.from.get(&TermKey(o.clone())) {
            Some(d) => *d,
            None => {
                let d = self.to.len() as DataId;
                self.from.insert(TermKey(o.clone()), d);
                self.to.push(o);
                d
            }
        }
    }

    /// Enter or overwrite. Because combinators key by symbol alone, defining
    /// a compiled combinator replaces the stub that held its slot, and every
    /// bytecode reference by data id picks up the definition.
    fn define(&mut self, o: TermRef) -> DataId {
        match self.from.get(&TermKey(o.clone())) {
            Some(d) => {
                let d = *d;
                self.to[d as usize] = o;
                d
            }
            None => self.enter(o),
        }
    }

    fn get(&self, d: DataId) -> Option<TermRef> {
        self.to.get(d as usize).cloned()
    }

    fn find(&self, o: &TermRef) -> Option<DataId> {
        self.from.get(&TermKey(o.clone())).copied()
    }

    fn len(&self) -> usize {
        self.to.len()
    }
}

/// The machine.
pub struct Machine {
    symbols: ThreadedRodeo,
    data: RwLock<DataTable>,
    modules: RwLock<Vec<ModuleInfo>>,
    args: RwLock<Vec<String>>,
    // serializes multi-step mutations of the shared tables
    lock: Mutex<()>,
}

impl Machine {
    pub fn new() -> Arc<Machine> {
        let m = Machine {
            symbols: ThreadedRodeo::new(),
            data: RwLock::new(DataTable::new()),
            modules: RwLock::new(Vec::new()),
            args: RwLock::new(Vec::new()),
            lock: Mutex::new(()),
        };
        m.populate();
        Arc::new(m)
    }

    /// Intern the distinguished symbols and data constructors in their fixed
    /// startup order.
    fn populate(&self) {
        let names = [
            "int", "float", "char", "text", "none", "true", "false", "tuple", "nil", "cons",
            "object",
        ];
        for (i, n) in names.iter().enumerate() {
            let s = self.enter_symbol2("System", n);
            debug_assert_eq!(s.0 as usize, i);
            let d = self.enter_data(combinator(Combinator::Data(s)));
            debug_assert_eq!(d as usize, i);
        }
    }

    // --- symbol table ---

    pub fn enter_symbol(&self, n: &str) -> Symbol {
        Symbol(self.symbols.get_or_intern(n).into_usize() as u32)
    }

    pub fn enter_symbol2(&self, n0: &str, n1: &str) -> Symbol {
        self.enter_symbol(&format!("{}::{}", n0, n1))
    }

    pub fn has_symbol(&self, n: &str) -> bool {
        self.symbols.contains(n)
    }

    pub fn symbol_text(&self, s: Symbol) -> &str {
        match Spur::try_from_usize(s.0 as usize) {
            Some(k) => self.symbols.resolve(&k),
            None => "?",
        }
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    // --- data table ---

    pub fn enter_data(&self, o: TermRef) -> DataId {
        self.data.write().enter(o)
    }

    pub fn define_data(&self, o: TermRef) -> DataId {
        self.data.write().define(o)
    }

    pub fn get_data(&self, d: DataId) -> Option<TermRef> {
        self.data.read().get(d)
    }

    pub fn find_data(&self, o: &TermRef) -> Option<DataId> {
        self.data.read().find(o)
    }

    pub fn data_count(&self) -> usize {
        self.data.read().len()
    }

    /// The current definition of a symbol: the data-table entry, or a fresh
    /// interned stub when the symbol has no definition yet.
    pub fn get_combinator_by_symbol(&self, s: Symbol) -> TermRef {
        let stub = combinator(Combinator::Stub(s));
        let d = self.enter_data(stub);
        // the entry may hold the real definition already
        self.get_data(d).unwrap_or_else(|| combinator(Combinator::Stub(s)))
    }

    pub fn get_combinator(&self, n: &str) -> TermRef {
        let s = self.enter_symbol(n);
        self.get_combinator_by_symbol(s)
    }

    pub fn is_data_symbol(&self, s: Symbol) -> bool {
        let probe = combinator(Combinator::Stub(s));
        match self.find_data(&probe).and_then(|d| self.get_data(d)) {
            Some(t) => matches!(&*t, Term::Combinator(Combinator::Data(_))),
            None => false,
        }
    }

    pub fn is_stub(&self, t: &TermRef) -> bool {
        matches!(&**t, Term::Combinator(Combinator::Stub(_)))
    }

    /// Serialize multi-step updates of the shared tables.
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Application arguments exposed to `System::arg`.
    pub fn set_args(&self, args: Vec<String>) {
        *self.args.write() = args;
    }

    pub fn get_arg(&self, n: usize) -> Option<String> {
        self.args.read().get(n).cloned()
    }

    // --- module registry ---

    pub fn register_module(&self, info: ModuleInfo) {
        self.modules.write().push(info);
    }

    pub fn module_infos(&self) -> Vec<ModuleInfo> {
        self.modules.read().clone()
    }

    // --- constructors and well-formedness helpers ---

    pub fn create_integer(&self, n: i64) -> TermRef {
        integer(n)
    }

    pub fn create_float(&self, f: f64) -> TermRef {
        term::float(f)
    }

    pub fn create_char(&self, c: char) -> TermRef {
        term::charval(c)
    }

    pub fn create_text(&self, s: impl Into<String>) -> TermRef {
        term::text(s)
    }

    pub fn create_none(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_NONE))
    }

    pub fn create_true(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_TRUE))
    }

    pub fn create_false(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_FALSE))
    }

    pub fn create_bool(&self, b: bool) -> TermRef {
        if b {
            self.create_true()
        } else {
            self.create_false()
        }
    }

    pub fn create_nil(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_NIL))
    }

    pub fn create_cons(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_CONS))
    }

    pub fn create_tuple(&self) -> TermRef {
        combinator(Combinator::Data(SYMBOL_TUPLE))
    }

    pub fn create_data(&self, n: &str) -> TermRef {
        combinator(Combinator::Data(self.enter_symbol(n)))
    }

    pub fn create_data2(&self, n0: &str, n1: &str) -> TermRef {
        combinator(Combinator::Data(self.enter_symbol2(n0, n1)))
    }

    pub fn create_callback(
        &self,
        n0: &str,
        n1: &str,
        arity: Arity,
        doc: Option<&'static str>,
        func: BuiltinFn,
    ) -> TermRef {
        combinator(Combinator::Callback(Builtin {
            symbol: self.enter_symbol2(n0, n1),
            arity,
            doc,
            func,
        }))
    }

    pub fn is_true(&self, t: &TermRef) -> bool {
        matches!(&**t, Term::Combinator(c) if c.symbol() == SYMBOL_TRUE)
    }

    pub fn is_false(&self, t: &TermRef) -> bool {
        matches!(&**t, Term::Combinator(c) if c.symbol() == SYMBOL_FALSE)
    }

    pub fn is_nil(&self, t: &TermRef) -> bool {
        matches!(&**t, Term::Combinator(c) if c.symbol() == SYMBOL_NIL)
    }

    pub fn is_cons_spine(&self, t: &TermRef) -> bool {
        match t.as_array() {
            Some(a) if a.len() == 3 => {
                a.get(0).map(|h| head_symbol(&h) == Some(SYMBOL_CONS)).unwrap_or(false)
            }
            _ => false,
        }
    }

    pub fn is_tuple_spine(&self, t: &TermRef) -> bool {
        match t.as_array() {
            Some(a) if a.len() > 0 => {
                a.get(0).map(|h| head_symbol(&h) == Some(SYMBOL_TUPLE)).unwrap_or(false)
            }
            _ => false,
        }
    }

    pub fn is_list(&self, t: &TermRef) -> bool {
        let mut l = t.clone();
        loop {
            if self.is_nil(&l) {
                return true;
            }
            if !self.is_cons_spine(&l) {
                return false;
            }
            match l.as_array().and_then(|a| a.get(2)) {
                Some(tail) => l = tail,
                None => return false,
            }
        }
    }

    pub fn to_list(&self, oo: Vec<TermRef>) -> TermRef {
        let cons = self.create_cons();
        let mut result = self.create_nil();
        for o in oo.into_iter().rev() {
            result = term::array_of(vec![cons.clone(), o, result]);
        }
        result
    }

    pub fn from_list(&self, t: &TermRef) -> Vec<TermRef> {
        let mut oo = Vec::new();
        let mut l = t.clone();
        while self.is_cons_spine(&l) {
            let a = match l.as_array() {
                Some(a) => a,
                None => break,
            };
            if let Some(x) = a.get(1) {
                oo.push(x);
            }
            match a.get(2) {
                Some(tail) => l = tail,
                None => break,
            }
        }
        oo
    }

    pub fn to_tuple(&self, oo: Vec<TermRef>) -> TermRef {
        let mut tt = vec![self.create_tuple()];
        tt.extend(oo);
        term::array_of(tt)
    }

    pub fn from_tuple(&self, t: &TermRef) -> Vec<TermRef> {
        match t.as_array() {
            Some(a) if self.is_tuple_spine(t) => {
                (1..a.len()).filter_map(|n| a.get(n)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The "bad arguments" exception payload: combinator name plus the
    /// offending arguments.
    pub fn bad_args(&self, name: &str, args: &[TermRef]) -> TermRef {
        let mut tt = vec![self.create_text(name)];
        tt.extend(args.iter().cloned());
        term::array_of(tt)
    }

    // --- rendering ---

    pub fn render_slot(&self, s: &Slot) -> String {
        match s {
            None => ".".to_string(),
            Some(t) => self.render_term(t),
        }
    }

    pub fn render_term(&self, t: &TermRef) -> String {
        match &**t {
            Term::Integer(n) => n.to_string(),
            Term::Float(f) => format!("{:?}", f),
            Term::Char(c) => format!("'{}'", crate::escape::escape(&c.to_string())),
            Term::Text(s) => format!("\"{}\"", crate::escape::escape(s)),
            Term::Combinator(c) => self.symbol_text(c.symbol()).to_string(),
            Term::Opaque(o) => self.symbol_text(o.symbol()).to_string(),
            Term::Array(_) => {
                if self.is_tuple_spine(t) {
                    self.render_tuple(t)
                } else if self.is_cons_spine(t) {
                    self.render_list(t)
                } else {
                    self.render_array(t)
                }
            }
        }
    }

    fn render_array(&self, t: &TermRef) -> String {
        let slots = t.as_array().map(|a| a.to_vec()).unwrap_or_default();
        format!("({})", slots.iter().map(|s| self.render_slot(s)).join(" "))
    }

    fn render_tuple(&self, t: &TermRef) -> String {
        let slots = t.as_array().map(|a| a.to_vec()).unwrap_or_default();
        format!(
            "({})",
            slots.iter().skip(1).map(|s| self.render_slot(s)).join(", ")
        )
    }

    fn render_list(&self, t: &TermRef) -> String {
        let mut parts = Vec::new();
        let mut l = t.clone();
        loop {
            if self.is_nil(&l) {
                return format!("{{{}}}", parts.join(", "));
            }
            if self.is_cons_spine(&l) {
                let a = match l.as_array() {
                    Some(a) => a,
                    None => break,
                };
                parts.push(self.render_slot(&a.get(1)));
                match a.get(2) {
                    Some(tail) => l = tail,
                    None => break,
                }
            } else {
                // improper tail
                return format!("{{{}| {}}}", parts.join(", "), self.render_term(&l));
            }
        }
        format!("{{{}}}", parts.join(", "))
    }

    pub fn docstring(&self, t: &TermRef) -> Option<String> {
        match &**t {
            Term::Combinator(Combinator::Callback(b)) => b.doc.map(|d| d.to_string()),
            _ => None,
        }
    }

    // --- the reducer ---

    /// Drive `f` to weak-head normal form, delivering the outcome to the
    /// `ret` combinator or the exception to `exc`. One trampoline step per
    /// loop turn: the current thunk's head decides the next thunk.
    pub fn reduce_with(&self, f: TermRef, ret: TermRef, exc: TermRef, run: &RunFlag) {
        // result array: slot 5 is the cell the sink observes
        let r = array(vec![None, None, None, None, Some(ret), None]);
        let e = array(vec![None, None, None, None, Some(exc), None]);
        let t = array(vec![
            Some(r.clone()),
            Some(integer(5)),
            Some(r),
            Some(e),
            Some(f),
        ]);

        let mut trampoline = Some(t);
        while let Some(thunk) = trampoline {
            match run.get() {
                RUN_HALTED => break,
                RUN_SLEEPING => {
                    std::thread::sleep(std::time::Duration::from_millis(100));
                    trampoline = Some(thunk);
                }
                _ => {
                    trampoline = self.reduce_step(&thunk);
                }
            }
        }
    }

    /// Reduce and collect the outcome.
    pub fn reduce_flagged(&self, f: TermRef, run: &RunFlag) -> ReduceResult {
        let cell = Arc::new(Mutex::new(ReduceResult::default()));

        let c0 = cell.clone();
        let sr = self.enter_symbol2("Internal", "result");
        let ret = combinator(Combinator::Sink(
            sr,
            Arc::new(move |_m: &Machine, o: &Slot| {
                let mut r = c0.lock();
                r.result = o.clone();
                r.exception = false;
            }),
        ));

        let c1 = cell.clone();
        let se = self.enter_symbol2("Internal", "exception");
        let exc = combinator(Combinator::Sink(
            se,
            Arc::new(move |_m: &Machine, o: &Slot| {
                let mut r = c1.lock();
                r.result = o.clone();
                r.exception = true;
            }),
        ));

        self.reduce_with(f, ret, exc, run);
        let r = cell.lock();
        r.clone()
    }

    pub fn reduce(&self, f: TermRef) -> ReduceResult {
        self.reduce_flagged(f, &RunFlag::new())
    }

    /// One reducer step: dispatch on the head at thunk slot 4.
    pub fn reduce_step(&self, thunk: &TermRef) -> Option<TermRef> {
        let cell = thunk.as_array()?;
        let head = cell.get(4)?;
        trace!(head = %self.render_term(&head), "reduce");
        match &*head {
            Term::Combinator(c) => self.reduce_combinator(c, &head, thunk),
            Term::Array(_) => {
                // an application spine as head flattens into the thunk
                let tt = cell.to_vec();
                let hh = head.as_array().map(|a| a.to_vec()).unwrap_or_default();
                let mut rr: Vec<Slot> = tt[0..4].to_vec();
                rr.extend(hh);
                rr.extend(tt[5..].iter().cloned());
                Some(array(rr))
            }
            // literals and opaques evaluate to themselves
            _ => self.write_spine(&head, thunk),
        }
    }

    fn reduce_combinator(
        &self,
        c: &Combinator,
        head: &TermRef,
        thunk: &TermRef,
    ) -> Option<TermRef> {
        let cell = thunk.as_array()?;
        match c {
            Combinator::Data(_) => self.write_spine(head, thunk),
            Combinator::Bytecode(body) => crate::bytecode::vm::execute(self, body, thunk),
            Combinator::Callback(b) => self.reduce_callback(b, head, thunk),
            Combinator::Value(_, v) => {
                let tt = cell.to_vec();
                let mut rr: Vec<Slot> = tt[0..4].to_vec();
                rr.push(Some(v.clone()));
                rr.extend(tt[5..].iter().cloned());
                Some(array(rr))
            }
            Combinator::Throw(_) => {
                if cell.len() > 5 {
                    let v = cell.get(5)?;
                    self.deliver_exception(&cell.get(3), v)
                } else {
                    self.write_spine(head, thunk)
                }
            }
            Combinator::Handle(_) => {
                if cell.len() > 6 {
                    let tt = cell.to_vec();
                    let h = tt[5].clone();
                    let f = tt[6].clone();
                    // handler thunk: the catcher applied at the try's result slot
                    let handler = array(vec![
                        tt[0].clone(),
                        tt[1].clone(),
                        tt[2].clone(),
                        tt[3].clone(),
                        h,
                    ]);
                    // force the delayed body under the installed handler
                    let mut rr: Vec<Slot> = vec![
                        tt[0].clone(),
                        tt[1].clone(),
                        tt[2].clone(),
                        Some(handler),
                        f,
                        Some(combinator(Combinator::Data(self.enter_symbol2(
                            "System", "nop",
                        )))),
                    ];
                    rr.extend(tt[7..].iter().cloned());
                    Some(array(rr))
                } else {
                    self.write_spine(head, thunk)
                }
            }
            Combinator::Sink(_, f) => {
                f(self, &cell.get(5));
                None
            }
            Combinator::Stub(s) => {
                let msg = format!("undefined combinator '{}'", self.symbol_text(*s));
                self.deliver_exception(&cell.get(3), self.create_text(msg))
            }
        }
    }

    fn reduce_callback(&self, b: &Builtin, head: &TermRef, thunk: &TermRef) -> Option<TermRef> {
        let cell = thunk.as_array()?;
        let tt = cell.to_vec();
        let argc = tt.len().saturating_sub(5);
        let wanted = b.arity.count().unwrap_or(argc);
        if argc < wanted {
            // under-saturated: the application is a constant spine
            return self.write_spine(head, thunk);
        }
        let mut args: SmallVec<[TermRef; 4]> = SmallVec::new();
        for s in &tt[5..5 + wanted] {
            match s {
                Some(t) => args.push(t.clone()),
                None => {
                    return self.deliver_exception(
                        &tt[3],
                        self.create_text("null argument in application"),
                    )
                }
            }
        }
        match (b.func)(self, &args) {
            Ok(r) => {
                if argc > wanted {
                    // surplus arguments re-apply to the produced value
                    let mut rr: Vec<Slot> = tt[0..4].to_vec();
                    rr.push(Some(r));
                    rr.extend(tt[5 + wanted..].iter().cloned());
                    Some(array(rr))
                } else {
                    self.write_result(&tt[0], &tt[1], r);
                    tt[2].clone()
                }
            }
            Err(e) => self.deliver_exception(&tt[3], e),
        }
    }

    /// A non-reducible head evaluates to itself (or its spine): write the
    /// value into the caller's result slot and continue with `k`.
    fn write_spine(&self, head: &TermRef, thunk: &TermRef) -> Option<TermRef> {
        let cell = thunk.as_array()?;
        let tt = cell.to_vec();
        let value = if tt.len() > 5 {
            let mut ss: Vec<Slot> = vec![Some(head.clone())];
            ss.extend(tt[5..].iter().cloned());
            array(ss)
        } else {
            head.clone()
        };
        self.write_result(&tt[0], &tt[1], value);
        tt[2].clone()
    }

    fn write_result(&self, rt: &Slot, rti: &Slot, value: TermRef) {
        match (rt, rti) {
            (Some(rt), Some(rti)) => match (rt.as_array(), rti.as_integer()) {
                (Some(cell), Some(i)) => cell.set(i as usize, Some(value)),
                _ => warn!("malformed result wiring"),
            },
            _ => warn!("result slot missing"),
        }
    }

    /// Deliver a thrown term: rebuild the exception thunk with the payload
    /// as the handler's argument.
    pub fn deliver_exception(&self, exc: &Slot, payload: TermRef) -> Option<TermRef> {
        match exc {
            Some(e) => {
                let ee = e.as_array()?.to_vec();
                if ee.len() < 5 {
                    warn!("malformed exception thunk");
                    return None;
                }
                let mut rr: Vec<Slot> = ee[0..5].to_vec();
                rr.push(Some(payload));
                Some(array(rr))
            }
            None => {
                warn!("uncatchable exception: {}", self.render_term(&payload));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_order() {
        let m = Machine::new();
        assert_eq!(m.enter_symbol("System::int"), SYMBOL_INT);
        assert_eq!(m.enter_symbol("System::cons"), SYMBOL_CONS);
        assert_eq!(m.enter_symbol("System::object"), SYMBOL_OBJECT);
        assert_eq!(m.symbol_text(SYMBOL_NIL), "System::nil");
    }

    #[test]
    fn test_data_table_interning() {
        let m = Machine::new();
        let a = m.create_integer(42);
        let b = m.create_integer(42);
        let d0 = m.enter_data(a);
        let d1 = m.enter_data(b);
        assert_eq!(d0, d1);
    }

    #[test]
    fn test_define_replaces_stub() {
        let m = Machine::new();
        let s = m.enter_symbol2("Test", "f");
        let stub = m.get_combinator_by_symbol(s);
        assert!(m.is_stub(&stub));
        let d0 = m.find_data(&stub).unwrap();
        let real = m.create_data2("Test", "f");
        let d1 = m.define_data(real);
        assert_eq!(d0, d1);
        assert!(!m.is_stub(&m.get_combinator_by_symbol(s)));
    }

    #[test]
    fn test_list_roundtrip() {
        let m = Machine::new();
        let l = m.to_list(vec![m.create_integer(1), m.create_integer(2)]);
        assert!(m.is_list(&l));
        let v = m.from_list(&l);
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].as_integer(), Some(1));
        assert_eq!(m.render_term(&l), "{1, 2}");
    }

    #[test]
    fn test_tuple_render() {
        let m = Machine::new();
        let t = m.to_tuple(vec![m.create_integer(1), m.create_text("a")]);
        assert_eq!(m.render_term(&t), "(1, \"a\")");
    }

    #[test]
    fn test_reduce_literal() {
        let m = Machine::new();
        let r = m.reduce(m.create_integer(7));
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(7));
    }

    #[test]
    fn test_reduce_callback() {
        let m = Machine::new();
        let twice = m.create_callback(
            "Test",
            "twice",
            Arity::Monadic,
            None,
            Arc::new(|m: &Machine, aa: &[TermRef]| match aa[0].as_integer() {
                Some(n) => Ok(m.create_integer(2 * n)),
                None => Err(m.bad_args("Test::twice", aa)),
            }),
        );
        let app = term::array_of(vec![twice, m.create_integer(21)]);
        let r = m.reduce(app);
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(42));
    }

    #[test]
    fn test_reduce_throw() {
        let m = Machine::new();
        let thr = combinator(Combinator::Throw(m.enter_symbol2("System", "throw")));
        let app = term::array_of(vec![thr, m.create_text("oops")]);
        let r = m.reduce(app);
        assert!(r.exception);
        assert_eq!(r.result.unwrap().as_text(), Some("oops"));
    }

    #[test]
    fn test_reduce_handle_catches() {
        let m = Machine::new();
        let thr = combinator(Combinator::Throw(m.enter_symbol2("System", "throw")));
        let hnd = combinator(Combinator::Handle(m.enter_symbol2("System", "handle")));
        // handler: k 99 — ignores the thrown value
        let k = m.create_callback(
            "Test",
            "k99",
            Arity::Monadic,
            None,
            Arc::new(|m: &Machine, _aa: &[TermRef]| Ok(m.create_integer(99))),
        );
        let body = term::array_of(vec![thr, m.create_text("boom")]);
        let app = term::array_of(vec![hnd, k, body]);
        let r = m.reduce(app);
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(99));
    }

    #[test]
    fn test_reducer_determinism() {
        let m = Machine::new();
        let mk = || {
            let l = m.to_list(vec![m.create_integer(3), m.create_integer(1)]);
            m.reduce(l)
        };
        let (a, b) = (mk(), mk());
        assert!(term::equal(&a.result.unwrap(), &b.result.unwrap()));
    }
}
