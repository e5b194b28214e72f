//! Modules and the module manager.
//!
//! A module is source (`.eg`), internal (builtin), or dynamic (`.ego`
//! plugin). The manager resolves filenames against the include path, loads
//! the transitive import closure, orders it leaves-first, and applies the
//! pipeline stages across all queued modules stage by stage, so that a
//! module's `using` of another always sees the other's declarations.
//! Loading an already-loaded absolute path is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::ast::{Decl, Expr, Unit};
use crate::bytecode::disassemble;
use crate::compiler::{
    declare_unit, desugar_unit, emit_code, emit_data, identify_unit, lift_unit, DeclKind,
    NamespaceEnv,
};
use crate::error::{Error, Result};
use crate::machine::{Machine, ModuleInfo};
use crate::parser;
use crate::position::Position;
use crate::term::{Combinator, Term, TermRef};

/// Interpreter options: include paths and per-stage debug dumps.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub include_path: Vec<PathBuf>,
    pub interactive: bool,
    pub dump_tokens: bool,
    pub dump_parse: bool,
    pub dump_identified: bool,
    pub dump_desugared: bool,
    pub dump_lifted: bool,
    pub dump_bytecode: bool,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    pub fn add_include_path(&mut self, p: impl Into<PathBuf>) {
        self.include_path.push(p.into());
    }
}

/// A qualified string: a name plus the position it was written at.
#[derive(Debug, Clone)]
pub struct QualifiedString {
    pub position: Position,
    pub string: String,
}

/// The lifecycle and pipeline hooks every module answers to. Stages that do
/// not apply to a module kind default to no-ops, so the manager can treat
/// every module as if it were a source file.
pub trait Module: Send {
    fn path(&self) -> &str;
    fn filename(&self) -> &str;

    fn load(&mut self, machine: &Machine) -> Result<()>;
    fn unload(&mut self) {}

    fn imports(&self) -> Vec<QualifiedString> {
        Vec::new()
    }

    /// Declared `val` names, reduced after loading.
    fn values(&self) -> Vec<QualifiedString> {
        Vec::new()
    }

    fn exports(&self) -> Vec<TermRef>;

    fn syntactical(&mut self, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn declarations(&mut self, _env: &mut NamespaceEnv, _machine: &Machine) -> Result<()> {
        Ok(())
    }

    fn semantical(&mut self, _env: &NamespaceEnv, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn desugar(&mut self, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn lift(&mut self, _options: &Options) -> Result<()> {
        Ok(())
    }

    fn datagen(&mut self, _machine: &Machine) -> Result<()> {
        Ok(())
    }

    fn codegen(&mut self, _machine: &Machine, _options: &Options) -> Result<()> {
        Ok(())
    }
}

/// A module of interpreter builtins, registered at startup.
pub struct InternalModule {
    name: String,
    exports_fn: fn(&Machine) -> Vec<TermRef>,
    exports: Vec<TermRef>,
}

impl InternalModule {
    pub fn new(name: &str, exports_fn: fn(&Machine) -> Vec<TermRef>) -> Box<Self> {
        Box::new(InternalModule {
            name: name.to_string(),
            exports_fn,
            exports: Vec::new(),
        })
    }
}

impl Module for InternalModule {
    fn path(&self) -> &str {
        &self.name
    }

    fn filename(&self) -> &str {
        &self.name
    }

    fn load(&mut self, machine: &Machine) -> Result<()> {
        self.exports = (self.exports_fn)(machine);
        Ok(())
    }

    fn exports(&self) -> Vec<TermRef> {
        self.exports.clone()
    }

    fn declarations(&mut self, env: &mut NamespaceEnv, machine: &Machine) -> Result<()> {
        declare_exports(env, machine, &self.exports);
        Ok(())
    }

    fn codegen(&mut self, machine: &Machine, _options: &Options) -> Result<()> {
        for o in &self.exports {
            machine.define_data(o.clone());
        }
        Ok(())
    }
}

/// Dynamically loaded plugin module. The shared object exposes
/// `egel_imports: fn() -> Vec<String>` and
/// `egel_exports: fn(&Machine) -> Vec<TermRef>`; the library handle stays
/// owned here and is released on unload.
pub struct DynamicModule {
    path: String,
    filename: String,
    library: Option<libloading::Library>,
    imports: Vec<QualifiedString>,
    exports: Vec<TermRef>,
}

impl DynamicModule {
    pub fn new(path: &str, filename: &str) -> Box<Self> {
        Box::new(DynamicModule {
            path: path.to_string(),
            filename: filename.to_string(),
            library: None,
            imports: Vec::new(),
            exports: Vec::new(),
        })
    }

    pub fn filetype(fname: &str) -> bool {
        fname.ends_with(".ego")
    }
}

type PluginImports = unsafe fn() -> Vec<String>;
type PluginExports = unsafe fn(&Machine) -> Vec<TermRef>;

impl Module for DynamicModule {
    fn path(&self) -> &str {
        &self.path
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn load(&mut self, machine: &Machine) -> Result<()> {
        let p = Position::new(self.path.clone(), 0, 0);
        let io = |e: String| Error::Io(p.clone(), e);
        unsafe {
            let lib = libloading::Library::new(&self.path)
                .map_err(|e| io(format!("dynamic load error: {}", e)))?;
            let (imports, exports) = {
                let egel_imports: libloading::Symbol<'_, PluginImports> = lib
                    .get(b"egel_imports")
                    .map_err(|e| io(format!("dynamic load error: {}", e)))?;
                let egel_exports: libloading::Symbol<'_, PluginExports> = lib
                    .get(b"egel_exports")
                    .map_err(|e| io(format!("dynamic load error: {}", e)))?;
                (egel_imports(), egel_exports(machine))
            };
            self.imports = imports
                .into_iter()
                .map(|s| QualifiedString {
                    position: p.clone(),
                    string: s,
                })
                .collect();
            self.exports = exports;
            self.library = Some(lib);
        }
        Ok(())
    }

    fn unload(&mut self) {
        self.library.take();
    }

    fn imports(&self) -> Vec<QualifiedString> {
        self.imports.clone()
    }

    fn exports(&self) -> Vec<TermRef> {
        self.exports.clone()
    }

    fn declarations(&mut self, env: &mut NamespaceEnv, machine: &Machine) -> Result<()> {
        declare_exports(env, machine, &self.exports);
        Ok(())
    }

    fn codegen(&mut self, machine: &Machine, _options: &Options) -> Result<()> {
        for o in &self.exports {
            machine.define_data(o.clone());
        }
        Ok(())
    }
}

fn declare_exports(env: &mut NamespaceEnv, machine: &Machine, exports: &[TermRef]) {
    for o in exports {
        if let Term::Combinator(c) = &**o {
            let fq = machine.symbol_text(c.symbol()).to_string();
            let kind = match c {
                Combinator::Data(_) => DeclKind::Data,
                _ => DeclKind::Def,
            };
            env.declare_implicit(&fq, kind);
        }
    }
}

/// A source module: an `.eg` file carried through the pipeline stages.
pub struct SourceModule {
    path: String,
    filename: String,
    source: String,
    unit: Option<Unit>,
    combinators: Vec<TermRef>,
}

impl SourceModule {
    pub fn new(path: &str, filename: &str) -> Box<Self> {
        Box::new(SourceModule {
            path: path.to_string(),
            filename: filename.to_string(),
            source: String::new(),
            unit: None,
            combinators: Vec::new(),
        })
    }

    pub fn filetype(fname: &str) -> bool {
        fname.ends_with(".eg")
    }

    fn unit_mut(&mut self) -> Result<&mut Unit> {
        self.unit.as_mut().ok_or_else(|| {
            Error::Internal(
                Position::new(self.path.clone(), 0, 0),
                "module not parsed".to_string(),
            )
        })
    }
}

impl Module for SourceModule {
    fn path(&self) -> &str {
        &self.path
    }

    fn filename(&self) -> &str {
        &self.filename
    }

    fn load(&mut self, _machine: &Machine) -> Result<()> {
        let p = Position::new(self.path.clone(), 0, 0);
        self.source = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Io(p, format!("module '{}' unreadable: {}", self.filename, e)))?;
        Ok(())
    }

    fn imports(&self) -> Vec<QualifiedString> {
        let mut out = Vec::new();
        if let Some(u) = &self.unit {
            collect_imports(&u.decls, &mut out);
        }
        out
    }

    fn values(&self) -> Vec<QualifiedString> {
        let mut out = Vec::new();
        if let Some(u) = &self.unit {
            collect_values(&u.decls, &mut out);
        }
        out
    }

    fn exports(&self) -> Vec<TermRef> {
        self.combinators.clone()
    }

    fn syntactical(&mut self, options: &Options) -> Result<()> {
        if options.dump_tokens {
            for t in crate::lexer::tokenize(&self.filename, &self.source)? {
                print!("{:?}:{} ", t.kind, t.text);
            }
            println!();
        }
        let unit = parser::parse_unit(&self.filename, &self.source)?;
        if options.dump_parse {
            print!("{}", unit);
        }
        self.source = String::new();
        self.unit = Some(unit);
        Ok(())
    }

    fn declarations(&mut self, env: &mut NamespaceEnv, _machine: &Machine) -> Result<()> {
        declare_unit(env, self.unit_mut()?)
    }

    fn semantical(&mut self, env: &NamespaceEnv, options: &Options) -> Result<()> {
        let unit = self.unit_mut()?;
        let mut usings = Vec::new();
        identify_unit(env, unit, &mut usings)?;
        if options.dump_identified {
            print!("{}", unit);
        }
        Ok(())
    }

    fn desugar(&mut self, options: &Options) -> Result<()> {
        let unit = self.unit_mut()?;
        desugar_unit(unit);
        if options.dump_desugared {
            print!("{}", unit);
        }
        Ok(())
    }

    fn lift(&mut self, options: &Options) -> Result<()> {
        let unit = self.unit_mut()?;
        lift_unit(unit);
        if options.dump_lifted {
            print!("{}", unit);
        }
        Ok(())
    }

    fn datagen(&mut self, machine: &Machine) -> Result<()> {
        let unit = self.unit_mut()?;
        let mut oo = emit_data(machine, unit);
        self.combinators.append(&mut oo);
        Ok(())
    }

    fn codegen(&mut self, machine: &Machine, options: &Options) -> Result<()> {
        let unit = self.unit_mut()?.clone();
        let oo = emit_code(machine, &unit)?;
        if options.dump_bytecode {
            for o in &oo {
                if let Ok(s) = disassemble(machine, o) {
                    print!("{}", s);
                }
            }
        }
        self.combinators.extend(oo);
        Ok(())
    }
}

fn collect_imports(decls: &[Decl], out: &mut Vec<QualifiedString>) {
    for d in decls {
        match d {
            Decl::Import(p, s) => out.push(QualifiedString {
                position: p.clone(),
                string: s.clone(),
            }),
            Decl::Namespace(_, _, dd) => collect_imports(dd, out),
            _ => {}
        }
    }
}

fn collect_values(decls: &[Decl], out: &mut Vec<QualifiedString>) {
    for d in decls {
        match d {
            Decl::Val(p, n, _) => {
                if let Expr::Combinator(_, parts, name) = n {
                    out.push(QualifiedString {
                        position: p.clone(),
                        string: Expr::fq_name(parts, name),
                    });
                }
            }
            Decl::Namespace(_, _, dd) => collect_values(dd, out),
            _ => {}
        }
    }
}

/// The module manager: transitive loading, ordering, staged processing.
pub struct ModuleManager {
    options: Options,
    machine: Arc<Machine>,
    env: NamespaceEnv,
    modules: Vec<Box<dyn Module>>,
    loading: Vec<Box<dyn Module>>,
}

impl ModuleManager {
    /// Create the manager and bring up the internal modules.
    pub fn new(options: Options, machine: Arc<Machine>) -> Result<Self> {
        let mut mm = ModuleManager {
            options,
            machine,
            env: NamespaceEnv::new(),
            modules: Vec::new(),
            loading: Vec::new(),
        };
        for m in crate::builtins::internal_modules() {
            mm.loading.push(m);
        }
        for m in &mut mm.loading {
            m.load(&mm.machine)?;
        }
        mm.process()?;
        mm.flush();
        Ok(mm)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    pub fn env(&self) -> &NamespaceEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut NamespaceEnv {
        &mut self.env
    }

    /// All `val` names declared by loaded modules, in load order.
    pub fn values(&self) -> Vec<QualifiedString> {
        let mut out = Vec::new();
        for m in &self.modules {
            out.extend(m.values());
        }
        out
    }

    /// Make a module and its transitive imports available. Idempotent per
    /// absolute path.
    pub fn load(&mut self, p: &Position, filename: &str) -> Result<()> {
        self.preload(p, filename)?;
        self.transitive_closure()?;
        self.reverse();
        self.process()?;
        self.flush();
        Ok(())
    }

    fn search(&self, filename: &str) -> Option<String> {
        let here = Path::new(filename);
        if here.exists() {
            return here.canonicalize().ok().map(|p| p.display().to_string());
        }
        for dir in &self.options.include_path {
            let candidate = dir.join(filename);
            if candidate.exists() {
                return candidate.canonicalize().ok().map(|p| p.display().to_string());
            }
        }
        None
    }

    fn already_loaded(&self, path: &str) -> bool {
        self.modules.iter().any(|m| m.path() == path)
            || self.loading.iter().any(|m| m.path() == path)
    }

    fn preload(&mut self, p: &Position, filename: &str) -> Result<()> {
        let found = self.search(filename).ok_or_else(|| {
            Error::Io(p.clone(), format!("file \"{}\" not found", filename))
        })?;
        if self.already_loaded(&found) {
            return Ok(());
        }
        let mut m: Box<dyn Module> = if SourceModule::filetype(filename) {
            SourceModule::new(&found, filename)
        } else if DynamicModule::filetype(filename) {
            DynamicModule::new(&found, filename)
        } else {
            return Err(Error::Io(
                p.clone(),
                format!("file \"{}\" has wrong extension", filename),
            ));
        };
        debug!(module = filename, path = %found, "preload");
        m.load(&self.machine)?;
        self.loading.push(m);
        Ok(())
    }

    /// Drain the loading queue: parse each module so its imports are known
    /// and preload them in turn.
    fn transitive_closure(&mut self) -> Result<()> {
        let mut n = 0;
        while n < self.loading.len() {
            self.loading[n].syntactical(&self.options)?;
            let imports = self.loading[n].imports();
            for i in imports {
                self.preload(&i.position, &i.string)?;
            }
            n += 1;
        }
        Ok(())
    }

    /// Leaves precede roots when the stages run.
    fn reverse(&mut self) {
        self.loading.reverse();
    }

    /// Apply each pipeline stage to every queued module before the next
    /// stage begins. The machine lock serializes table mutation against
    /// concurrent reducers.
    fn process(&mut self) -> Result<()> {
        let _guard = self.machine.lock();
        for m in &mut self.loading {
            m.declarations(&mut self.env, &self.machine)?;
        }
        for m in &mut self.loading {
            m.semantical(&self.env, &self.options)?;
        }
        for m in &mut self.loading {
            m.desugar(&self.options)?;
        }
        for m in &mut self.loading {
            m.lift(&self.options)?;
        }
        for m in &mut self.loading {
            m.datagen(&self.machine)?;
        }
        for m in &mut self.loading {
            m.codegen(&self.machine, &self.options)?;
        }
        Ok(())
    }

    fn flush(&mut self) {
        for m in self.loading.drain(..) {
            self.machine.register_module(ModuleInfo {
                name: m.filename().to_string(),
                path: m.path().to_string(),
                imports: m.imports().iter().map(|i| i.string.clone()).collect(),
                exports: m.exports(),
            });
            self.modules.push(m);
        }
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        for m in &mut self.modules {
            m.unload();
        }
    }
}
