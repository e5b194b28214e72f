//! The disassembler: the canonical textual form of a compiled combinator,
//! both a debugging aid and the persistent on-disk representation.

use std::fmt::Write;

use crate::machine::Machine;
use crate::term::{Combinator, Term, TermRef};

use super::coder::decode;
use super::opcodes::Operand;

/// Render a combinator to its textual form. Bytecode combinators produce the
/// full `bytecode 01 … end` listing; 0-ary data constructors the one-line
/// `data 01 Name end` form.
pub fn disassemble(machine: &Machine, o: &TermRef) -> Result<String, String> {
    match &**o {
        Term::Combinator(Combinator::Data(s)) => {
            Ok(format!("data 01 {} end\n", machine.symbol_text(*s)))
        }
        Term::Combinator(Combinator::Bytecode(body)) => {
            let mut out = String::new();
            out.push_str("bytecode 01\n");
            let _ = writeln!(out, "  {}", machine.symbol_text(body.symbol));
            out.push_str("code\n");
            let mut pc = 0;
            while pc < body.code.len() {
                let (op, vals, next) = match decode(&body.code, pc) {
                    Some(d) => d,
                    None => return Err("undecodable instruction".to_string()),
                };
                let _ = write!(out, "  0x{:x} {}", pc, op.mnemonic());
                for (operand, v) in op.operands().iter().zip(vals.iter()) {
                    match operand {
                        Operand::Reg => {
                            let _ = write!(out, " r{}", v);
                        }
                        Operand::I32 | Operand::Idx => {
                            let _ = write!(out, " {}", v);
                        }
                        Operand::Label => {
                            let _ = write!(out, " 0x{:x}", v);
                        }
                    }
                }
                out.push('\n');
                pc = next;
            }
            out.push_str("data\n");
            for (n, d) in body.data.iter().enumerate() {
                let t = machine
                    .get_data(*d)
                    .ok_or_else(|| format!("dangling data id {}", d))?;
                let marker = match &*t {
                    Term::Integer(_) => "i",
                    Term::Float(_) => "f",
                    Term::Char(_) => "c",
                    Term::Text(_) => "t",
                    Term::Combinator(_) => "o",
                    _ => return Err("array in data section".to_string()),
                };
                let _ = writeln!(out, "  {} {} {} {}", marker, n, d, machine.render_term(&t));
            }
            out.push_str("end\n");
            Ok(out)
        }
        _ => Err("cannot disassemble".to_string()),
    }
}

/// One-line rendering of a single instruction, for traces and tests.
pub fn disassemble_instruction(code: &[u8], pc: usize) -> Option<(String, usize)> {
    let (op, vals, next) = decode(code, pc)?;
    let mut s = op.mnemonic().to_string();
    for v in vals {
        let _ = write!(s, " {}", v);
    }
    Some((s, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::coder::Coder;
    use crate::term::{combinator, BytecodeBody};
    use std::sync::Arc;

    #[test]
    fn test_disassemble_data_constructor() {
        let m = Machine::new();
        let c = m.create_data2("Shape", "leaf");
        assert_eq!(disassemble(&m, &c).unwrap(), "data 01 Shape::leaf end\n");
    }

    #[test]
    fn test_disassemble_listing_shape() {
        let m = Machine::new();
        let mut c = Coder::new(&m);
        c.emit_takex(1, 4, 0, 0);
        let d = c.emit_constant(m.create_integer(42));
        c.emit_data(5, d);
        c.emit_array(6, 1, 5);
        c.emit_return(6);
        let (code, data) = c.finish();
        let b = combinator(crate::term::Combinator::Bytecode(BytecodeBody {
            symbol: m.enter_symbol("Test::c42"),
            code: Arc::new(code),
            data: Arc::new(data),
        }));
        let s = disassemble(&m, &b).unwrap();
        assert!(s.starts_with("bytecode 01\n  Test::c42\ncode\n"));
        assert!(s.contains("takex r1 r4 r0 0"));
        assert!(s.contains("\ndata\n"));
        assert!(s.contains(" i 0 "));
        assert!(s.ends_with("end\n"));
    }

    #[test]
    fn test_cannot_disassemble_literal() {
        let m = Machine::new();
        assert!(disassemble(&m, &m.create_integer(1)).is_err());
    }
}
