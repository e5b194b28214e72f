//! The identification environment: which fully-qualified names are declared,
//! and whether each names a data constructor or a definition.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Data,
    Def,
}

/// The global declaration environment threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct NamespaceEnv {
    decls: HashMap<String, DeclKind>,
}

impl NamespaceEnv {
    pub fn new() -> Self {
        NamespaceEnv::default()
    }

    pub fn declare(&mut self, p: &Position, fq: &str, kind: DeclKind) -> Result<()> {
        if self.decls.contains_key(fq) {
            return Err(Error::Semantical(
                p.clone(),
                format!("redeclaration of '{}'", fq),
            ));
        }
        self.decls.insert(fq.to_string(), kind);
        Ok(())
    }

    /// Declare or overwrite; interactive definitions may shadow earlier
    /// ones.
    pub fn declare_implicit(&mut self, fq: &str, kind: DeclKind) {
        self.decls.insert(fq.to_string(), kind);
    }

    pub fn get(&self, fq: &str) -> Option<DeclKind> {
        self.decls.get(fq).copied()
    }

    /// Resolve a possibly-qualified occurrence. `context` is the stack of
    /// enclosing namespace paths, outermost first; `usings` the active
    /// `using` directives. Innermost namespaces win, then usings in order,
    /// then the name as written.
    pub fn resolve(
        &self,
        context: &[Vec<String>],
        usings: &[Vec<String>],
        parts: &[String],
        name: &str,
    ) -> Option<(String, DeclKind)> {
        let tail = if parts.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", parts.join("::"), name)
        };
        if !parts.is_empty() {
            // a qualified name resolves absolutely first
            if let Some(k) = self.get(&tail) {
                return Some((tail, k));
            }
        }
        for ctx in context.iter().rev() {
            let fq = format!("{}::{}", ctx.join("::"), tail);
            if let Some(k) = self.get(&fq) {
                return Some((fq, k));
            }
        }
        for u in usings {
            let fq = format!("{}::{}", u.join("::"), tail);
            if let Some(k) = self.get(&fq) {
                return Some((fq, k));
            }
        }
        self.get(&tail).map(|k| (tail, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_resolve() {
        let mut env = NamespaceEnv::new();
        let p = Position::internal();
        env.declare(&p, "System::nil", DeclKind::Data).unwrap();
        env.declare(&p, "Foo::f", DeclKind::Def).unwrap();

        let usings = vec![vec!["System".to_string()]];
        let r = env.resolve(&[], &usings, &[], "nil");
        assert_eq!(r, Some(("System::nil".to_string(), DeclKind::Data)));

        // enclosing namespace wins over usings
        let ctx = vec![vec!["Foo".to_string()]];
        let r = env.resolve(&ctx, &usings, &[], "f");
        assert_eq!(r, Some(("Foo::f".to_string(), DeclKind::Def)));

        // qualified names resolve absolutely
        let r = env.resolve(&ctx, &usings, &["System".to_string()], "nil");
        assert_eq!(r, Some(("System::nil".to_string(), DeclKind::Data)));

        assert_eq!(env.resolve(&[], &[], &[], "nil"), None);
    }

    #[test]
    fn test_redeclaration_fails() {
        let mut env = NamespaceEnv::new();
        let p = Position::internal();
        env.declare(&p, "Foo::f", DeclKind::Def).unwrap();
        assert!(env.declare(&p, "Foo::f", DeclKind::Def).is_err());
        env.declare_implicit("Foo::f", DeclKind::Data);
        assert_eq!(env.get("Foo::f"), Some(DeclKind::Data));
    }
}
