//! An interpreter for a small, eagerly-evaluated, untyped functional
//! language with pattern matching, algebraic data constructors,
//! user-defined operators, namespaces, and a module system.
//!
//! # Architecture
//!
//! Programs compile ahead of time to a register-based bytecode and run on a
//! graph-reduction machine over reference-counted terms:
//!
//! 1. **Frontend** (`lexer`, `parser`) — a conventional tokenizer and
//!    recursive-descent parser producing AST nodes.
//! 2. **Pipeline** (`compiler`) — identification, desugaring, lambda
//!    lifting, data emission, and code emission through the pattern-match
//!    compiler.
//! 3. **Runtime** (`term`, `machine`, `bytecode`) — a trampolined reducer
//!    driving thunks to weak-head normal form, and a twelve-opcode register
//!    machine executing compiled combinators. The textual disassembly of a
//!    combinator is its canonical persistent form; the assembler is the
//!    inverse.
//! 4. **Modules** (`modules`, `builtins`) — transitive loading of source
//!    and plugin modules, staged so cross-module references always resolve,
//!    plus the internal `system`, `math`, `string`, and `runtime` modules.
//! 5. **Driver** (`eval`, `repl`, the `egel` binary) — batch evaluation of
//!    `main`, incremental line evaluation, and the interactive loop.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use egel::machine::Machine;
//! use egel::modules::{ModuleManager, Options};
//! use egel::eval::Eval;
//!
//! let manager = ModuleManager::new(Options::new(), Machine::new()).unwrap();
//! let mut eval = Eval::new(manager);
//!
//! eval.eval_line(
//!     "def fac = [0 -> 1 | n -> n * (fac (n - 1))]; fac 5",
//!     Arc::new(|m: &Machine, o: &egel::term::Slot| {
//!         assert_eq!(m.render_slot(o), "120");
//!     }),
//!     Arc::new(|_m: &Machine, _o: &egel::term::Slot| panic!("unexpected exception")),
//! )
//! .unwrap();
//! ```

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod escape;
pub mod eval;
pub mod lexer;
pub mod machine;
pub mod modules;
pub mod operators;
pub mod parser;
pub mod position;
pub mod repl;
pub mod serialize;
pub mod term;

pub use error::{Error, Result};
pub use eval::Eval;
pub use machine::{Machine, ReduceResult, RunFlag};
pub use modules::{ModuleManager, Options};
pub use position::Position;
pub use term::{Term, TermRef};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_surface() {
        let machine = Machine::new();
        let manager = ModuleManager::new(Options::new(), machine).unwrap();
        let mut eval = Eval::new(manager);
        assert!(eval.eval_command("def answer = 42").is_ok());
        let m = eval.machine();
        let r = m.reduce(m.get_combinator("answer"));
        assert_eq!(r.result.unwrap().as_integer(), Some(42));
    }
}
