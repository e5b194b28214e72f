//! Internal modules: the primitive combinators every machine carries.
//!
//! Each submodule contributes one exports table; the module manager loads
//! them at startup through the same pipeline as any other module.

pub mod math;
pub mod runtime;
pub mod string;
pub mod system;

use std::sync::Arc;

use crate::machine::Machine;
use crate::modules::{InternalModule, Module};
use crate::term::{Arity, TermRef};

pub fn internal_modules() -> Vec<Box<dyn Module>> {
    vec![
        InternalModule::new("system", system::exports),
        InternalModule::new("math", math::exports),
        InternalModule::new("string", string::exports),
        InternalModule::new("runtime", runtime::exports),
    ]
}

// Concise builders for the export tables.

pub(crate) fn medadic(
    m: &Machine,
    ns: &str,
    n: &str,
    doc: &'static str,
    f: impl Fn(&Machine) -> Result<TermRef, TermRef> + Send + Sync + 'static,
) -> TermRef {
    m.create_callback(ns, n, Arity::Medadic, Some(doc), Arc::new(move |m, _aa| f(m)))
}

pub(crate) fn monadic(
    m: &Machine,
    ns: &str,
    n: &str,
    doc: &'static str,
    f: impl Fn(&Machine, &TermRef) -> Result<TermRef, TermRef> + Send + Sync + 'static,
) -> TermRef {
    m.create_callback(ns, n, Arity::Monadic, Some(doc), Arc::new(move |m, aa| f(m, &aa[0])))
}

pub(crate) fn dyadic(
    m: &Machine,
    ns: &str,
    n: &str,
    doc: &'static str,
    f: impl Fn(&Machine, &TermRef, &TermRef) -> Result<TermRef, TermRef> + Send + Sync + 'static,
) -> TermRef {
    m.create_callback(
        ns,
        n,
        Arity::Dyadic,
        Some(doc),
        Arc::new(move |m, aa| f(m, &aa[0], &aa[1])),
    )
}

pub(crate) fn triadic(
    m: &Machine,
    ns: &str,
    n: &str,
    doc: &'static str,
    f: impl Fn(&Machine, &TermRef, &TermRef, &TermRef) -> Result<TermRef, TermRef>
        + Send
        + Sync
        + 'static,
) -> TermRef {
    m.create_callback(
        ns,
        n,
        Arity::Triadic,
        Some(doc),
        Arc::new(move |m, aa| f(m, &aa[0], &aa[1], &aa[2])),
    )
}

pub(crate) fn variadic(
    m: &Machine,
    ns: &str,
    n: &str,
    doc: &'static str,
    f: impl Fn(&Machine, &[TermRef]) -> Result<TermRef, TermRef> + Send + Sync + 'static,
) -> TermRef {
    m.create_callback(ns, n, Arity::Variadic, Some(doc), Arc::new(f))
}
