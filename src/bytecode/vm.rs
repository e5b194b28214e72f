//! The bytecode interpreter: one fetch/decode/execute loop per combinator
//! invocation, run as that combinator's reduction step.
//!
//! Register 0 holds the incoming thunk. The code's obligation is to build
//! the next thunk and `RETURN` it; non-reducible heads of the thunks it
//! constructs perform the actual result writes.

use tracing::trace;

use crate::machine::Machine;
use crate::term::{self, compare_slots, head_symbol, BytecodeBody, Slot, TermRef};

use super::coder::{fetch_u16, fetch_u32};
use super::opcodes::{max_register, Opcode};

struct Registers {
    regs: Vec<Slot>,
}

impl Registers {
    fn new(n: usize) -> Self {
        Registers {
            regs: vec![None; n],
        }
    }

    #[inline]
    fn get(&self, n: u32) -> Slot {
        self.regs.get(n as usize).cloned().flatten()
    }

    #[inline]
    fn set(&mut self, n: u32, o: Slot) {
        let n = n as usize;
        if n >= self.regs.len() {
            self.regs.resize(n + 1, None);
        }
        self.regs[n] = o;
    }
}

/// Execute a bytecode combinator on a thunk; returns the next thunk, or
/// `None` to stop the trampoline. Malformed code delivers a runtime
/// exception through the thunk's exception slot.
pub fn execute(machine: &Machine, body: &BytecodeBody, thunk: &TermRef) -> Option<TermRef> {
    let code: &[u8] = &body.code;
    let mut reg = Registers::new(max_register(code) as usize + 1);
    reg.set(0, Some(thunk.clone()));
    let mut pc: usize = 0;
    let mut flag = false;

    let raise = |msg: &str| -> Option<TermRef> {
        let exc = thunk.as_array().and_then(|a| a.get(3));
        machine.deliver_exception(&exc, machine.create_text(msg))
    };

    loop {
        let op = match code.get(pc).copied().and_then(Opcode::from_byte) {
            Some(op) => op,
            None => return raise("invalid opcode"),
        };
        if pc + op.size() > code.len() {
            return raise("truncated instruction");
        }
        pc += 1;
        match op {
            Opcode::Nil => {
                let x = fetch_u32(code, pc);
                pc += 4;
                reg.set(x, None);
            }
            Opcode::Mov => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                pc += 8;
                reg.set(x, reg.get(y));
            }
            Opcode::Data => {
                let x = fetch_u32(code, pc);
                let i = fetch_u32(code, pc + 4);
                pc += 8;
                let d = match body.data.get(i as usize) {
                    Some(d) => *d,
                    None => return raise("data index out of range"),
                };
                reg.set(x, machine.get_data(d));
            }
            Opcode::Set => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                let z = fetch_u32(code, pc + 8);
                pc += 12;
                let (x0, y0, z0) = (reg.get(x), reg.get(y), reg.get(z));
                match (x0.as_ref().and_then(|t| t.as_array()), y0.and_then(|t| t.as_integer())) {
                    (Some(cell), Some(n)) => cell.set(n as usize, z0),
                    _ => return raise("set expects an array and an index"),
                }
            }
            Opcode::Takex => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                let z = fetch_u32(code, pc + 8);
                let i = fetch_u16(code, pc + 12) as i64;
                pc += 14;
                match reg.get(z).as_ref().and_then(|t| t.as_array()) {
                    Some(cell) => {
                        let n = (y as i64) - (x as i64) + 1;
                        flag = n <= cell.len() as i64 - i;
                        if flag {
                            for r in x..=y {
                                reg.set(r, cell.get(((r - x) as i64 + i) as usize));
                            }
                        }
                    }
                    None => flag = false,
                }
            }
            Opcode::Split => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                let z = fetch_u32(code, pc + 8);
                pc += 12;
                match reg.get(z).as_ref().and_then(|t| t.as_array()) {
                    Some(cell) => {
                        flag = (y as i64) - (x as i64) + 1 == cell.len() as i64;
                        if flag {
                            for r in x..=y {
                                reg.set(r, cell.get((r - x) as usize));
                            }
                        }
                    }
                    None => flag = false,
                }
            }
            Opcode::Array => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                let z = fetch_u32(code, pc + 8);
                pc += 12;
                let mut slots = Vec::new();
                if y <= z {
                    for r in y..=z {
                        slots.push(reg.get(r));
                    }
                }
                reg.set(x, Some(term::array(slots)));
            }
            Opcode::Concatx => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                let z = fetch_u32(code, pc + 8);
                let i = fetch_u16(code, pc + 12) as usize;
                pc += 14;
                let y0 = reg.get(y);
                let z0 = reg.get(z);
                let zc = match z0.as_ref().and_then(|t| t.as_array()) {
                    Some(c) => c,
                    None => return raise("concatx expects an array"),
                };
                match y0.as_ref().and_then(|t| t.as_array()) {
                    Some(yc) => {
                        if i < zc.len() {
                            let sz = yc.len() + zc.len() - i;
                            if sz > 1 {
                                let mut slots = yc.to_vec();
                                for n in i..zc.len() {
                                    slots.push(zc.get(n));
                                }
                                reg.set(x, Some(term::array(slots)));
                            } else {
                                reg.set(x, zc.get(i));
                            }
                        } else if yc.len() == 1 {
                            // a one-element prefix with nothing to append
                            // collapses to the element itself
                            reg.set(x, yc.get(0));
                        } else {
                            reg.set(x, y0.clone());
                        }
                    }
                    None => {
                        if i < zc.len() {
                            let sz = 1 + zc.len() - i;
                            if sz > 1 {
                                let mut slots = vec![y0.clone()];
                                for n in i..zc.len() {
                                    slots.push(zc.get(n));
                                }
                                reg.set(x, Some(term::array(slots)));
                            } else {
                                reg.set(x, zc.get(i));
                            }
                        } else {
                            reg.set(x, y0.clone());
                        }
                    }
                }
            }
            Opcode::Test => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                pc += 8;
                flag = compare_slots(&reg.get(x), &reg.get(y)) == std::cmp::Ordering::Equal;
            }
            Opcode::Tag => {
                let x = fetch_u32(code, pc);
                let y = fetch_u32(code, pc + 4);
                pc += 8;
                let s0 = reg.get(x).as_ref().and_then(head_symbol);
                let s1 = reg.get(y).as_ref().and_then(head_symbol);
                flag = s0.is_some() && s0 == s1;
            }
            Opcode::Fail => {
                let l = fetch_u32(code, pc);
                pc += 4;
                if !flag {
                    pc = l as usize;
                }
                flag = false;
            }
            Opcode::Return => {
                let x = fetch_u32(code, pc);
                let next = reg.get(x);
                trace!(combinator = %machine.symbol_text(body.symbol), "return");
                return next;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::coder::Coder;
    use crate::machine::Machine;
    use crate::term::{array_of, combinator, Combinator};
    use std::sync::Arc;

    fn bytecode(machine: &Machine, name: &str, build: impl FnOnce(&mut Coder)) -> TermRef {
        let mut c = Coder::new(machine);
        build(&mut c);
        let (code, data) = c.finish();
        combinator(Combinator::Bytecode(BytecodeBody {
            symbol: machine.enter_symbol(name),
            code: Arc::new(code),
            data: Arc::new(data),
        }))
    }

    #[test]
    fn test_constant_combinator() {
        // compiled form of `def c42 = 42`: build [rt rti k exc 42], return it
        let m = Machine::new();
        let c42 = bytecode(&m, "Test::c42", |c| {
            c.emit_takex(1, 4, 0, 0);
            let d = c.emit_constant(m.create_integer(42));
            c.emit_data(5, d);
            let t = 6;
            c.emit_array(t, 1, 5);
            c.emit_return(t);
        });
        let r = m.reduce(c42);
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(42));
    }

    #[test]
    fn test_identity_with_split() {
        // compiled form of `def i = [ X -> X ]`
        let m = Machine::new();
        let id = bytecode(&m, "Test::i", |c| {
            c.emit_takex(1, 4, 0, 0);
            let bad = c.generate_label();
            c.emit_takex(5, 5, 0, 5);
            c.emit_fail(bad);
            c.emit_mov(6, 1);
            c.emit_mov(7, 2);
            c.emit_mov(8, 3);
            c.emit_mov(9, 4);
            c.emit_mov(10, 5);
            c.emit_array(11, 6, 10);
            c.emit_concatx(12, 11, 0, 6);
            c.emit_return(12);
            c.emit_label(bad);
            c.emit_nil(13);
            c.emit_return(13);
        });
        let app = array_of(vec![id, m.create_integer(5)]);
        let r = m.reduce(app);
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(5));
    }

    #[test]
    fn test_takex_flag_on_short_thunk() {
        let m = Machine::new();
        // expects one argument; applied to none the takex fails and the
        // fall-through returns a nil thunk, stopping the trampoline
        let f = bytecode(&m, "Test::wants_arg", |c| {
            c.emit_takex(1, 4, 0, 0);
            let bad = c.generate_label();
            c.emit_takex(5, 5, 0, 5);
            c.emit_fail(bad);
            c.emit_return(5);
            c.emit_label(bad);
            c.emit_nil(6);
            c.emit_return(6);
        });
        let r = m.reduce(f);
        assert!(r.result.is_none());
    }
}
