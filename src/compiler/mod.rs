//! The AST → bytecode pipeline.
//!
//! Stages, in the order the module manager applies them: declarations
//! ([`namespace`]), identification ([`identify`]), desugaring ([`desugar`]),
//! lambda lifting ([`lift`]), data emission and code emission ([`emit`]).
//! Every stage runs over all queued modules before the next begins, so a
//! module's `using` of another always sees the other's declarations.

pub mod desugar;
pub mod emit;
pub mod identify;
pub mod lift;
pub mod namespace;

pub use desugar::desugar_unit;
pub use emit::{emit_code, emit_data, emit_def};
pub use identify::{declare_unit, declare_unit_implicit, identify_unit};
pub use lift::lift_unit;
pub use namespace::{DeclKind, NamespaceEnv};
