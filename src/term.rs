//! Runtime terms.
//!
//! A term is the unit of computation of the graph-reduction machine: a
//! reference-counted, conceptually immutable value. The one sanctioned
//! mutation is the in-place `set` on an array, used by the reducer to patch
//! thunk slots and fill result spines; it is only legal while the array is
//! not yet visible outside the current reducer step.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A symbol: a compact id for an interned fully-qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub u32);

/// An index into the machine-wide data table.
pub type DataId = u32;

/// Shared ownership of a term.
pub type TermRef = Arc<Term>;

/// A nullable term slot, as found in arrays and registers.
pub type Slot = Option<TermRef>;

/// Host values participate in the term model through this trait. They carry
/// a symbol, compare through a host callback, and are never serialized.
pub trait Opaque: Send + Sync {
    fn symbol(&self) -> Symbol;
    fn compare(&self, other: &dyn Opaque) -> Ordering;
    fn as_any(&self) -> &dyn Any;
}

/// An ordered sequence of term slots with interior mutability.
pub struct ArrayCell {
    slots: RwLock<Vec<Slot>>,
}

impl ArrayCell {
    pub fn new(slots: Vec<Slot>) -> Self {
        ArrayCell {
            slots: RwLock::new(slots),
        }
    }

    pub fn with_size(n: usize) -> Self {
        ArrayCell::new(vec![None; n])
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, n: usize) -> Slot {
        self.slots.read().get(n).cloned().flatten()
    }

    /// In-place update. Valid only on arrays not aliased outside the
    /// current reducer step.
    pub fn set(&self, n: usize, o: Slot) {
        let mut slots = self.slots.write();
        if n < slots.len() {
            slots[n] = o;
        }
    }

    pub fn to_vec(&self) -> Vec<Slot> {
        self.slots.read().clone()
    }
}

/// The arity class of a host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Medadic,
    Monadic,
    Dyadic,
    Triadic,
    Variadic,
}

impl Arity {
    /// The fixed argument count, or `None` for variadic callbacks.
    pub fn count(&self) -> Option<usize> {
        match self {
            Arity::Medadic => Some(0),
            Arity::Monadic => Some(1),
            Arity::Dyadic => Some(2),
            Arity::Triadic => Some(3),
            Arity::Variadic => None,
        }
    }
}

/// Host callback: arguments in, value out, or a term thrown as an exception.
pub type BuiltinFn =
    Arc<dyn Fn(&crate::machine::Machine, &[TermRef]) -> Result<TermRef, TermRef> + Send + Sync>;

/// Result receiver: observes one delivered term, ends the trampoline.
pub type SinkFn = Arc<dyn Fn(&crate::machine::Machine, &Slot) + Send + Sync>;

/// A host builtin combinator.
#[derive(Clone)]
pub struct Builtin {
    pub symbol: Symbol,
    pub arity: Arity,
    pub doc: Option<&'static str>,
    pub func: BuiltinFn,
}

/// The body of a compiled combinator: code bytes plus the per-combinator
/// data table of machine data ids.
#[derive(Debug, Clone)]
pub struct BytecodeBody {
    pub symbol: Symbol,
    pub code: Arc<Vec<u8>>,
    pub data: Arc<Vec<DataId>>,
}

/// The only reducible term variant. Data constructors, forward-reference
/// stubs, compiled bytecode, host callbacks, reduced value bindings, the two
/// exception primitives, and the internal result sink are all combinators
/// with their own reduction behavior.
#[derive(Clone)]
pub enum Combinator {
    Data(Symbol),
    Stub(Symbol),
    Bytecode(BytecodeBody),
    Callback(Builtin),
    Value(Symbol, TermRef),
    Throw(Symbol),
    Handle(Symbol),
    Sink(Symbol, SinkFn),
}

impl Combinator {
    pub fn symbol(&self) -> Symbol {
        match self {
            Combinator::Data(s)
            | Combinator::Stub(s)
            | Combinator::Value(s, _)
            | Combinator::Throw(s)
            | Combinator::Handle(s)
            | Combinator::Sink(s, _) => *s,
            Combinator::Bytecode(b) => b.symbol,
            Combinator::Callback(b) => b.symbol,
        }
    }
}

impl fmt::Debug for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Combinator::Data(_) => "data",
            Combinator::Stub(_) => "stub",
            Combinator::Bytecode(_) => "bytecode",
            Combinator::Callback(_) => "callback",
            Combinator::Value(_, _) => "value",
            Combinator::Throw(_) => "throw",
            Combinator::Handle(_) => "handle",
            Combinator::Sink(_, _) => "sink",
        };
        write!(f, "Combinator::{}({})", kind, self.symbol().0)
    }
}

/// A runtime term.
pub enum Term {
    Integer(i64),
    Float(f64),
    Char(char),
    Text(String),
    Array(ArrayCell),
    Combinator(Combinator),
    Opaque(Box<dyn Opaque>),
}

impl Term {
    /// Tag order used by the total ordering over terms.
    fn tag(&self) -> u8 {
        match self {
            Term::Integer(_) => 0,
            Term::Float(_) => 1,
            Term::Char(_) => 2,
            Term::Text(_) => 3,
            Term::Opaque(_) => 4,
            Term::Combinator(_) => 5,
            Term::Array(_) => 6,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Term::Array(_))
    }

    pub fn is_combinator(&self) -> bool {
        matches!(self, Term::Combinator(_))
    }

    pub fn as_array(&self) -> Option<&ArrayCell> {
        match self {
            Term::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_combinator(&self) -> Option<&Combinator> {
        match self {
            Term::Combinator(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Term::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Term::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Term::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Integer(n) => write!(f, "Integer({})", n),
            Term::Float(x) => write!(f, "Float({:?})", x),
            Term::Char(c) => write!(f, "Char({:?})", c),
            Term::Text(s) => write!(f, "Text({:?})", s),
            Term::Array(a) => {
                write!(f, "Array[")?;
                for (i, s) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match s {
                        Some(t) => write!(f, "{:?}", t)?,
                        None => write!(f, ".")?,
                    }
                }
                write!(f, "]")
            }
            Term::Combinator(c) => write!(f, "{:?}", c),
            Term::Opaque(o) => write!(f, "Opaque({})", o.symbol().0),
        }
    }
}

/// The head symbol of a term. Literals answer their type symbol, combinators
/// their own symbol, arrays the head symbol of their first slot. This is the
/// symbol the `TAG` instruction compares.
pub fn head_symbol(t: &TermRef) -> Option<Symbol> {
    match &**t {
        Term::Integer(_) => Some(crate::machine::SYMBOL_INT),
        Term::Float(_) => Some(crate::machine::SYMBOL_FLOAT),
        Term::Char(_) => Some(crate::machine::SYMBOL_CHAR),
        Term::Text(_) => Some(crate::machine::SYMBOL_TEXT),
        Term::Combinator(c) => Some(c.symbol()),
        Term::Opaque(o) => Some(o.symbol()),
        Term::Array(a) => a.get(0).as_ref().and_then(head_symbol),
    }
}

/// Total ordering over term slots: null sorts first, then by tag, then by
/// value. Combinators compare by symbol alone, which is what lets a compiled
/// definition replace the stub that held its data-table slot.
pub fn compare_slots(a: &Slot, b: &Slot) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare(a, b),
    }
}

/// Total ordering over terms.
pub fn compare(a: &TermRef, b: &TermRef) -> Ordering {
    if Arc::ptr_eq(a, b) {
        return Ordering::Equal;
    }
    let (t0, t1) = (a.tag(), b.tag());
    if t0 != t1 {
        return t0.cmp(&t1);
    }
    match (&**a, &**b) {
        (Term::Integer(x), Term::Integer(y)) => x.cmp(y),
        (Term::Float(x), Term::Float(y)) => x.total_cmp(y),
        (Term::Char(x), Term::Char(y)) => x.cmp(y),
        (Term::Text(x), Term::Text(y)) => x.cmp(y),
        (Term::Opaque(x), Term::Opaque(y)) => match x.symbol().cmp(&y.symbol()) {
            Ordering::Equal => x.compare(&**y),
            ord => ord,
        },
        (Term::Combinator(x), Term::Combinator(y)) => x.symbol().cmp(&y.symbol()),
        (Term::Array(x), Term::Array(y)) => {
            let (xx, yy) = (x.to_vec(), y.to_vec());
            match xx.len().cmp(&yy.len()) {
                Ordering::Equal => {
                    for (xs, ys) in xx.iter().zip(yy.iter()) {
                        let c = compare_slots(xs, ys);
                        if c != Ordering::Equal {
                            return c;
                        }
                    }
                    Ordering::Equal
                }
                ord => ord,
            }
        }
        _ => Ordering::Equal,
    }
}

/// Structural equality, derived from the total order.
pub fn equal(a: &TermRef, b: &TermRef) -> bool {
    compare(a, b) == Ordering::Equal
}

/// A term wrapper ordered by [`compare`], used to key the data table's
/// reverse map.
#[derive(Clone)]
pub struct TermKey(pub TermRef);

impl PartialEq for TermKey {
    fn eq(&self, other: &Self) -> bool {
        equal(&self.0, &other.0)
    }
}

impl Eq for TermKey {}

impl PartialOrd for TermKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

// Construction helpers; the machine re-exports these behind its `create_*`
// interface.

pub fn integer(n: i64) -> TermRef {
    Arc::new(Term::Integer(n))
}

pub fn float(f: f64) -> TermRef {
    Arc::new(Term::Float(f))
}

pub fn charval(c: char) -> TermRef {
    Arc::new(Term::Char(c))
}

pub fn text(s: impl Into<String>) -> TermRef {
    Arc::new(Term::Text(s.into()))
}

pub fn array(slots: Vec<Slot>) -> TermRef {
    Arc::new(Term::Array(ArrayCell::new(slots)))
}

pub fn array_of(terms: Vec<TermRef>) -> TermRef {
    array(terms.into_iter().map(Some).collect())
}

pub fn combinator(c: Combinator) -> TermRef {
    Arc::new(Term::Combinator(c))
}

pub fn opaque(o: Box<dyn Opaque>) -> TermRef {
    Arc::new(Term::Opaque(o))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_literals() {
        assert_eq!(compare(&integer(1), &integer(1)), Ordering::Equal);
        assert_eq!(compare(&integer(1), &integer(2)), Ordering::Less);
        // tags order integers before texts
        assert_eq!(compare(&integer(100), &text("a")), Ordering::Less);
        assert_eq!(compare(&text("a"), &text("b")), Ordering::Less);
    }

    #[test]
    fn test_compare_arrays() {
        let a = array_of(vec![integer(1), integer(2)]);
        let b = array_of(vec![integer(1), integer(2)]);
        let c = array_of(vec![integer(1), integer(3)]);
        assert!(equal(&a, &b));
        assert_eq!(compare(&a, &c), Ordering::Less);
        // shorter arrays sort first
        let d = array_of(vec![integer(9)]);
        assert_eq!(compare(&d, &a), Ordering::Less);
    }

    #[test]
    fn test_combinators_compare_by_symbol() {
        let d = combinator(Combinator::Data(Symbol(7)));
        let s = combinator(Combinator::Stub(Symbol(7)));
        assert!(equal(&d, &s));
    }

    #[test]
    fn test_array_cell_set() {
        let a = ArrayCell::with_size(3);
        assert!(a.get(1).is_none());
        a.set(1, Some(integer(42)));
        assert_eq!(a.get(1).and_then(|t| t.as_integer()), Some(42));
    }
}
