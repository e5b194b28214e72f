//! Data and code emission: the pattern-match compiler and the body emitter
//! that turns desugared, lifted definitions into bytecode combinators.
//!
//! Calling convention: register 0 holds the incoming thunk; the prologue
//! copies `rt, rti, k, exc` into registers 1..4. Each alternative extracts
//! its arguments with `TAKEX`, tests patterns left-to-right, and on success
//! builds the next thunk, threading surplus application arguments through
//! with `CONCATX`. Nested redexes get their own thunks, chained so that
//! evaluation runs left-to-right, innermost first. A call with fewer
//! arguments than every alternative needs is a partial application and
//! evaluates to its own spine; the fall-through of the match applies the
//! global failure combinator to the original thunk.

use std::collections::HashMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::ast::{Alternative, Decl, Expr, Match, Unit};
use crate::bytecode::coder::Coder;
use crate::bytecode::opcodes::Reg;
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::term::{combinator, BytecodeBody, Combinator, TermRef};

/// The data-emission stage: install every declared constructor and report
/// the installed terms.
pub fn emit_data(machine: &Machine, unit: &Unit) -> Vec<TermRef> {
    let mut out = Vec::new();
    emit_data_decls(machine, &unit.decls, &mut out);
    out
}

fn emit_data_decls(machine: &Machine, decls: &[Decl], out: &mut Vec<TermRef>) {
    for d in decls {
        match d {
            Decl::Data(_, names) => {
                for n in names {
                    if let Expr::Combinator(_, parts, name) = n {
                        let fq = Expr::fq_name(parts, name);
                        let c = machine.create_data(&fq);
                        machine.define_data(c.clone());
                        out.push(c);
                    }
                }
            }
            Decl::Namespace(_, _, dd) => emit_data_decls(machine, dd, out),
            _ => {}
        }
    }
}

/// The code-emission stage: compile every definition and `val` body and
/// install the bytecode combinators.
pub fn emit_code(machine: &Machine, unit: &Unit) -> Result<Vec<TermRef>> {
    let mut out = Vec::new();
    emit_code_decls(machine, &unit.decls, &mut out)?;
    Ok(out)
}

fn emit_code_decls(machine: &Machine, decls: &[Decl], out: &mut Vec<TermRef>) -> Result<()> {
    for d in decls {
        match d {
            Decl::Def(_, n, body) | Decl::Val(_, n, body) => {
                if let Expr::Combinator(_, parts, name) = n {
                    let fq = Expr::fq_name(parts, name);
                    let c = emit_def(machine, &fq, body)?;
                    machine.define_data(c.clone());
                    out.push(c);
                }
            }
            Decl::Namespace(_, _, dd) => emit_code_decls(machine, dd, out)?,
            _ => {}
        }
    }
    Ok(())
}

/// Compile one definition body into a bytecode combinator. A body that is
/// not a match compiles as a single zero-pattern alternative.
pub fn emit_def(machine: &Machine, fq: &str, body: &Expr) -> Result<TermRef> {
    let m = match body {
        Expr::Lambda(_, m) => m.clone(),
        e => Match {
            alternatives: vec![Alternative {
                patterns: Vec::new(),
                guard: None,
                body: e.clone(),
            }],
        },
    };
    let mut coder = Coder::new(machine);
    emit_match(machine, &mut coder, &m)?;
    let (code, data) = coder.finish();
    Ok(combinator(Combinator::Bytecode(BytecodeBody {
        symbol: machine.enter_symbol(fq),
        code: Arc::new(code),
        data: Arc::new(data),
    })))
}

// registers fixed by the calling convention
const R_THUNK: Reg = 0;
const R_RT: Reg = 1;
const R_RTI: Reg = 2;
const R_K: Reg = 3;
const R_EXC: Reg = 4;

type Env = HashMap<String, Reg>;

fn emit_match(machine: &Machine, coder: &mut Coder, m: &Match) -> Result<()> {
    // r0 is the thunk; r1..r4 the caller context
    coder.generate_registers(5);
    coder.emit_takex(R_RT, R_EXC, R_THUNK, 0);

    // a call shorter than every alternative is a partial application
    let min_arity = m
        .alternatives
        .iter()
        .map(|a| a.patterns.len())
        .min()
        .unwrap_or(0);
    let partial = if min_arity > 0 {
        let l = coder.generate_label();
        let mark = coder.peek_register();
        let probe = coder.generate_registers(min_arity as u32);
        coder.emit_takex(probe, probe + min_arity as u32 - 1, R_THUNK, 5);
        coder.emit_fail(l);
        coder.restore_register(mark);
        Some(l)
    } else {
        None
    };

    for a in &m.alternatives {
        emit_alternative(machine, coder, a)?;
    }

    // fall-through: apply the failure combinator to the original thunk
    {
        let fail = machine.get_combinator("System::fail");
        let rf = coder.generate_register();
        let d = coder.emit_constant(fail);
        coder.emit_data(rf, d);
        let block = coder.generate_registers(6);
        coder.emit_mov(block, R_RT);
        coder.emit_mov(block + 1, R_RTI);
        coder.emit_mov(block + 2, R_K);
        coder.emit_mov(block + 3, R_EXC);
        coder.emit_mov(block + 4, rf);
        coder.emit_mov(block + 5, R_THUNK);
        let t = coder.generate_register();
        coder.emit_array(t, block, block + 5);
        coder.emit_return(t);
    }

    // partial application: write the application spine back and continue
    if let Some(l) = partial {
        coder.emit_label(l);
        let empty = coder.generate_register();
        coder.emit_array(empty, 1, 0);
        let spine = coder.generate_register();
        coder.emit_concatx(spine, empty, R_THUNK, 4);
        coder.emit_set(R_RT, R_RTI, spine);
        coder.emit_return(R_K);
    }
    Ok(())
}

fn emit_alternative(machine: &Machine, coder: &mut Coder, a: &Alternative) -> Result<()> {
    let mark = coder.peek_register();
    let next = coder.generate_label();
    let mut env = Env::new();

    let n = a.patterns.len();
    if n > 0 {
        let args = coder.generate_registers(n as u32);
        coder.emit_takex(args, args + n as u32 - 1, R_THUNK, 5);
        coder.emit_fail(next);
        for (i, p) in a.patterns.iter().enumerate() {
            emit_pattern(machine, coder, &mut env, args + i as u32, p, next)?;
        }
    }

    if let Some(g) = &a.guard {
        let mut pendings = Vec::new();
        let rg = emit_value(machine, coder, &mut env, g, &mut pendings)?;
        if !pendings.is_empty() {
            return Err(Error::Semantical(
                g.position(),
                "guard must not require reduction".to_string(),
            ));
        }
        let rt = coder.generate_register();
        let d = coder.emit_constant(machine.create_true());
        coder.emit_data(rt, d);
        coder.emit_test(rg, rt);
        coder.emit_fail(next);
    }

    let first = emit_body(machine, coder, &mut env, &a.body, (5 + n) as u16)?;
    coder.emit_return(first);

    coder.emit_label(next);
    coder.restore_register(mark);
    Ok(())
}

fn emit_pattern(
    machine: &Machine,
    coder: &mut Coder,
    env: &mut Env,
    reg: Reg,
    p: &Expr,
    fail: u32,
) -> Result<()> {
    match p {
        Expr::Wildcard(_) => Ok(()),
        Expr::Variable(_, n) => {
            env.insert(n.clone(), reg);
            Ok(())
        }
        Expr::Integer(_, n) => emit_literal_test(machine, coder, reg, machine.create_integer(*n), fail),
        Expr::Float(_, f) => emit_literal_test(machine, coder, reg, machine.create_float(*f), fail),
        Expr::Char(_, c) => emit_literal_test(machine, coder, reg, machine.create_char(*c), fail),
        Expr::Text(_, s) => {
            emit_literal_test(machine, coder, reg, machine.create_text(s.clone()), fail)
        }
        Expr::Combinator(_, parts, n) => {
            let fq = Expr::fq_name(parts, n);
            emit_literal_test(machine, coder, reg, machine.get_combinator(&fq), fail)
        }
        Expr::Application(pos, ee) => {
            let (head, args) = match ee.split_first() {
                Some(x) => x,
                None => return Ok(()),
            };
            let fq = match head {
                Expr::Combinator(_, parts, n) => Expr::fq_name(parts, n),
                _ => {
                    return Err(Error::Internal(
                        pos.clone(),
                        "constructor expected in pattern".to_string(),
                    ))
                }
            };
            let rc = coder.generate_register();
            let d = coder.emit_constant(machine.get_combinator(&fq));
            coder.emit_data(rc, d);
            coder.emit_tag(reg, rc);
            coder.emit_fail(fail);
            // the spine is constructor plus arguments, matched exactly
            let k = args.len() as u32;
            let sub = coder.generate_registers(k + 1);
            coder.emit_split(sub, sub + k, reg);
            coder.emit_fail(fail);
            for (i, q) in args.iter().enumerate() {
                emit_pattern(machine, coder, env, sub + 1 + i as u32, q, fail)?;
            }
            Ok(())
        }
        other => Err(Error::Internal(
            other.position(),
            "unexpected pattern after desugaring".to_string(),
        )),
    }
}

fn emit_literal_test(
    machine: &Machine,
    coder: &mut Coder,
    reg: Reg,
    value: TermRef,
    fail: u32,
) -> Result<()> {
    let _ = machine;
    let r = coder.generate_register();
    let d = coder.emit_constant(value);
    coder.emit_data(r, d);
    coder.emit_test(reg, r);
    coder.emit_fail(fail);
    Ok(())
}

/// A nested redex waiting to be wired: it writes into `holder[index]`
/// (`holder` `None` meaning the enclosing thunk under construction).
struct Child {
    holder: Option<Reg>,
    index: u32,
    expr: Expr,
}

/// Flatten nested application heads: `((f x) y)` is `f x y`.
fn flatten(e: &Expr) -> Vec<Expr> {
    match e {
        Expr::Application(_, ee) => {
            let mut out = Vec::new();
            let mut first = true;
            for x in ee {
                if first {
                    out.extend(flatten(x));
                    first = false;
                } else {
                    out.push(x.clone());
                }
            }
            out
        }
        e => vec![e.clone()],
    }
}

/// An application is a redex unless its head is a data constructor; an
/// unknown head (a variable) must be assumed reducible.
fn is_redex(machine: &Machine, e: &Expr) -> bool {
    match e {
        Expr::Application(_, _) => {
            let ee = flatten(e);
            match ee.first() {
                Some(Expr::Combinator(_, parts, n)) => {
                    let s = machine.enter_symbol(&Expr::fq_name(parts, n));
                    !machine.is_data_symbol(s)
                }
                Some(Expr::Variable(_, _)) => true,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Whether an expression in argument position needs its own thunk. On top
/// of redex applications, a bare reference to anything but a data
/// constructor reduces eagerly: constants and `val` bindings yield their
/// value, functions survive through the partial-application path.
fn needs_reduction(machine: &Machine, e: &Expr) -> bool {
    match e {
        Expr::Combinator(_, parts, n) => {
            let s = machine.enter_symbol(&Expr::fq_name(parts, n));
            !machine.is_data_symbol(s)
        }
        e => is_redex(machine, e),
    }
}

/// Emit an expression as a value: literals and combinator references load
/// from the data section, variables read their register, constructor spines
/// build in place with holes for nested redexes.
fn emit_value(
    machine: &Machine,
    coder: &mut Coder,
    env: &mut Env,
    e: &Expr,
    pendings: &mut Vec<Child>,
) -> Result<Reg> {
    match e {
        Expr::Integer(_, n) => emit_load(coder, machine.create_integer(*n)),
        Expr::Float(_, f) => emit_load(coder, machine.create_float(*f)),
        Expr::Char(_, c) => emit_load(coder, machine.create_char(*c)),
        Expr::Text(_, s) => emit_load(coder, machine.create_text(s.clone())),
        Expr::Combinator(_, parts, n) => {
            let fq = Expr::fq_name(parts, n);
            emit_load(coder, machine.get_combinator(&fq))
        }
        Expr::Variable(p, n) => env.get(n).copied().ok_or_else(|| {
            Error::Internal(p.clone(), format!("unbound variable '{}' at emission", n))
        }),
        Expr::Application(_, _) => {
            let ee = flatten(e);
            // a constructor spine; redex elements become holes, collected in
            // source order so effects run left to right
            let mut parts: SmallVec<[Option<Reg>; 8]> = SmallVec::new();
            let mut local: Vec<Child> = Vec::new();
            for (i, x) in ee.iter().enumerate() {
                if needs_reduction(machine, x) {
                    parts.push(None);
                    local.push(Child {
                        holder: None, // this spine, patched below
                        index: i as u32,
                        expr: x.clone(),
                    });
                } else {
                    let before = pendings.len();
                    let r = emit_value(machine, coder, env, x, pendings)?;
                    parts.push(Some(r));
                    local.extend(pendings.drain(before..));
                }
            }
            let block = coder.generate_registers(parts.len() as u32);
            for (i, part) in parts.iter().enumerate() {
                match part {
                    Some(r) => coder.emit_mov(block + i as u32, *r),
                    None => coder.emit_nil(block + i as u32),
                }
            }
            let s = coder.generate_register();
            coder.emit_array(s, block, block + parts.len() as u32 - 1);
            for mut c in local {
                if c.holder.is_none() {
                    c.holder = Some(s);
                }
                pendings.push(c);
            }
            Ok(s)
        }
        other => Err(Error::Internal(
            other.position(),
            "unexpected expression after lifting".to_string(),
        )),
    }
}

fn emit_load(coder: &mut Coder, value: TermRef) -> Result<Reg> {
    let r = coder.generate_register();
    let d = coder.emit_constant(value);
    coder.emit_data(r, d);
    Ok(r)
}

/// Emit an alternative's body: build the result thunk wired to the caller,
/// thread surplus arguments, wire nested redexes, and return the first
/// thunk to run.
fn emit_body(
    machine: &Machine,
    coder: &mut Coder,
    env: &mut Env,
    body: &Expr,
    drop_index: u16,
) -> Result<Reg> {
    let elements = if is_redex(machine, body) {
        flatten(body)
    } else {
        vec![body.clone()]
    };
    emit_thunk(
        machine,
        coder,
        env,
        R_RT,
        R_RTI,
        R_K,
        &elements,
        Some(drop_index),
    )
}

/// Build one thunk `[rt, rti, k, exc] ++ elements ++ surplus` and wire its
/// nested redexes. Children are chained right-to-left so the leftmost
/// innermost redex runs first and the thunk itself runs last.
fn emit_thunk(
    machine: &Machine,
    coder: &mut Coder,
    env: &mut Env,
    rt: Reg,
    rti: Reg,
    k: Reg,
    elements: &[Expr],
    extra_drop: Option<u16>,
) -> Result<Reg> {
    let mut parts: SmallVec<[Option<Reg>; 8]> = SmallVec::new();
    let mut children: Vec<Child> = Vec::new();
    for (i, x) in elements.iter().enumerate() {
        // the head reduces in place when the thunk runs; arguments that are
        // themselves reducible get their own thunks
        if i > 0 && needs_reduction(machine, x) || i == 0 && is_redex(machine, x) {
            parts.push(None);
            children.push(Child {
                holder: None,
                index: 4 + i as u32,
                expr: x.clone(),
            });
        } else {
            let mut pendings = Vec::new();
            let r = emit_value(machine, coder, env, x, &mut pendings)?;
            parts.push(Some(r));
            children.extend(pendings);
        }
    }

    let count = 4 + parts.len() as u32;
    let block = coder.generate_registers(count);
    coder.emit_mov(block, rt);
    coder.emit_mov(block + 1, rti);
    coder.emit_mov(block + 2, k);
    coder.emit_mov(block + 3, R_EXC);
    for (i, part) in parts.iter().enumerate() {
        match part {
            Some(r) => coder.emit_mov(block + 4 + i as u32, *r),
            None => coder.emit_nil(block + 4 + i as u32),
        }
    }
    let mut t = coder.generate_register();
    coder.emit_array(t, block, block + count - 1);
    if let Some(d) = extra_drop {
        let t2 = coder.generate_register();
        coder.emit_concatx(t2, t, R_THUNK, d);
        t = t2;
    }

    let mut next = t;
    for child in children.iter().rev() {
        let holder = child.holder.unwrap_or(t);
        let rti_c = emit_load(coder, machine.create_integer(child.index as i64))?;
        let elements = flatten(&child.expr);
        next = emit_thunk(machine, coder, env, holder, rti_c, next, &elements, None)?;
    }
    Ok(next)
}
