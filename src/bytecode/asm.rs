//! The assembler: parses the textual form produced by the disassembler back
//! into a combinator. Together they make the disassembly text the canonical
//! persistent artifact of a compiled combinator.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lexer::{TokenKind, Tokens};
use crate::machine::Machine;
use crate::term::{combinator, BytecodeBody, Combinator, DataId, TermRef};

use super::coder::Coder;
use super::opcodes::{Opcode, Operand};

pub struct Assembler<'m> {
    machine: &'m Machine,
    tokens: Tokens,
}

impl<'m> Assembler<'m> {
    pub fn new(machine: &'m Machine, source: &str) -> Result<Self> {
        Ok(Assembler {
            machine,
            tokens: Tokens::from_source("assembly", source)?,
        })
    }

    fn syntax_error(&self, msg: impl Into<String>) -> Error {
        Error::Syntactical(self.tokens.position(), msg.into())
    }

    fn force_text(&mut self, s: &str) -> Result<()> {
        if self.tokens.is_text(s) {
            self.tokens.skip();
            Ok(())
        } else {
            Err(self.syntax_error(format!("'{}' expected", s)))
        }
    }

    fn fetch_combinator(&mut self) -> Result<String> {
        let mut s = String::new();
        match self.tokens.kind() {
            TokenKind::Uppercase | TokenKind::Lowercase | TokenKind::Operator
            | TokenKind::Eq | TokenKind::Bar => {
                s.push_str(self.tokens.text());
                self.tokens.skip();
            }
            _ => return Err(self.syntax_error("combinator expected")),
        }
        while self.tokens.is_kind(TokenKind::DColon) {
            self.tokens.skip();
            s.push_str("::");
            match self.tokens.kind() {
                TokenKind::Uppercase | TokenKind::Lowercase | TokenKind::Operator
                | TokenKind::Eq | TokenKind::Bar => {
                    s.push_str(self.tokens.text());
                    self.tokens.skip();
                }
                _ => return Err(self.syntax_error("combinator expected")),
            }
        }
        Ok(s)
    }

    fn fetch_register(&mut self) -> Result<u32> {
        let t = self.tokens.text().to_string();
        if let Some(digits) = t.strip_prefix('r') {
            if let Ok(r) = digits.parse::<u32>() {
                self.tokens.skip();
                return Ok(r);
            }
        }
        Err(self.syntax_error("register expected"))
    }

    fn fetch_u32(&mut self) -> Result<u32> {
        let t = self.tokens.text().to_string();
        match self.tokens.kind() {
            TokenKind::Integer => {
                self.tokens.skip();
                t.parse::<u32>()
                    .map_err(|_| self.syntax_error("number expected"))
            }
            TokenKind::HexInteger => {
                self.tokens.skip();
                u32::from_str_radix(t.trim_start_matches("0x"), 16)
                    .map_err(|_| self.syntax_error("number expected"))
            }
            _ => Err(self.syntax_error("number expected")),
        }
    }

    fn fetch_integer(&mut self) -> Result<i64> {
        let negative = self.tokens.is_kind(TokenKind::Operator) && self.tokens.is_text("-");
        if negative {
            self.tokens.skip();
        }
        let t = self.tokens.text().to_string();
        let n = match self.tokens.kind() {
            TokenKind::Integer => t
                .parse::<i64>()
                .map_err(|_| self.syntax_error("integer expected"))?,
            TokenKind::HexInteger => i64::from_str_radix(t.trim_start_matches("0x"), 16)
                .map_err(|_| self.syntax_error("integer expected"))?,
            _ => return Err(self.syntax_error("integer expected")),
        };
        self.tokens.skip();
        Ok(if negative { -n } else { n })
    }

    fn fetch_float(&mut self) -> Result<f64> {
        let negative = self.tokens.is_kind(TokenKind::Operator) && self.tokens.is_text("-");
        if negative {
            self.tokens.skip();
        }
        let t = self.tokens.text().to_string();
        let f = match self.tokens.kind() {
            TokenKind::Float | TokenKind::Integer => t
                .parse::<f64>()
                .map_err(|_| self.syntax_error("float expected"))?,
            _ => return Err(self.syntax_error("float expected")),
        };
        self.tokens.skip();
        Ok(if negative { -f } else { f })
    }

    /// Assemble one combinator: either the one-line data form or a full
    /// bytecode listing.
    pub fn assemble(&mut self) -> Result<TermRef> {
        if self.tokens.is_text("data") {
            self.tokens.skip();
            self.force_text("01")?;
            let name = self.fetch_combinator()?;
            self.force_text("end")?;
            return Ok(self.machine.create_data(&name));
        }

        self.force_text("bytecode")?;
        self.force_text("01")?;
        let name = self.fetch_combinator()?;
        self.force_text("code")?;

        let mut coder = Coder::new(self.machine);
        while !self.tokens.is_text("data") {
            if self.tokens.is_kind(TokenKind::Eof) {
                return Err(self.syntax_error("'data' expected"));
            }
            // each line leads with its code offset
            let _pc = self.fetch_u32()?;
            let op = Opcode::from_mnemonic(self.tokens.text())
                .ok_or_else(|| self.syntax_error("instruction expected"))?;
            self.tokens.skip();
            let mut vals = Vec::with_capacity(4);
            for operand in op.operands() {
                let v = match operand {
                    Operand::Reg => self.fetch_register()?,
                    Operand::I32 | Operand::Idx | Operand::Label => self.fetch_u32()?,
                };
                vals.push(v);
            }
            match op {
                Opcode::Nil => coder.emit_nil(vals[0]),
                Opcode::Mov => coder.emit_mov(vals[0], vals[1]),
                Opcode::Data => coder.emit_data(vals[0], vals[1]),
                Opcode::Set => coder.emit_set(vals[0], vals[1], vals[2]),
                Opcode::Takex => coder.emit_takex(vals[0], vals[1], vals[2], vals[3] as u16),
                Opcode::Split => coder.emit_split(vals[0], vals[1], vals[2]),
                Opcode::Array => coder.emit_array(vals[0], vals[1], vals[2]),
                Opcode::Concatx => coder.emit_concatx(vals[0], vals[1], vals[2], vals[3] as u16),
                Opcode::Test => coder.emit_test(vals[0], vals[1]),
                Opcode::Tag => coder.emit_tag(vals[0], vals[1]),
                Opcode::Fail => coder.emit_fail(vals[0]),
                Opcode::Return => coder.emit_return(vals[0]),
            }
        }
        self.force_text("data")?;

        let mut data: Vec<DataId> = Vec::new();
        while !self.tokens.is_text("end") {
            if self.tokens.is_kind(TokenKind::Eof) {
                return Err(self.syntax_error("'end' expected"));
            }
            let marker = self.tokens.text().to_string();
            self.tokens.skip();
            // local slot and machine data id, informational in the listing
            let _slot = self.fetch_u32()?;
            let _id = self.fetch_u32()?;
            let o = match marker.as_str() {
                "i" => self.machine.create_integer(self.fetch_integer()?),
                "f" => self.machine.create_float(self.fetch_float()?),
                "c" => {
                    let t = self.tokens.force(TokenKind::Char)?;
                    self.machine
                        .create_char(t.text.chars().next().unwrap_or('?'))
                }
                "t" => {
                    let t = self.tokens.force(TokenKind::Text)?;
                    self.machine.create_text(t.text)
                }
                "o" => {
                    let n = self.fetch_combinator()?;
                    self.machine.get_combinator(&n)
                }
                _ => return Err(self.syntax_error("data entry expected")),
            };
            data.push(self.machine.enter_data(o));
        }
        self.force_text("end")?;

        let (code, _) = coder.finish();
        Ok(combinator(Combinator::Bytecode(BytecodeBody {
            symbol: self.machine.enter_symbol(&name),
            code: Arc::new(code),
            data: Arc::new(data),
        })))
    }
}

/// Assemble a textual combinator form against a machine.
pub fn assemble(machine: &Machine, source: &str) -> Result<TermRef> {
    Assembler::new(machine, source)?.assemble()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::disasm::disassemble;
    use crate::term::{array_of, Term};

    #[test]
    fn test_assemble_data_form() {
        let m = Machine::new();
        let c = assemble(&m, "data 01 Shape::leaf end").unwrap();
        match &*c {
            Term::Combinator(Combinator::Data(s)) => {
                assert_eq!(m.symbol_text(*s), "Shape::leaf");
            }
            _ => panic!("expected data combinator"),
        }
    }

    #[test]
    fn test_assemble_constant_combinator() {
        let m = Machine::new();
        let src = "\
bytecode 01
  Test::c42
code
  0x0 takex r1 r4 r0 0
  0xf data r5 0
  0x18 array r6 r1 r5
  0x25 return r6
data
  i 0 99 42
end
";
        let c = assemble(&m, src).unwrap();
        let r = m.reduce(c);
        assert!(!r.exception);
        assert_eq!(r.result.unwrap().as_integer(), Some(42));
    }

    #[test]
    fn test_disassemble_assemble_roundtrip() {
        let m = Machine::new();
        let src = "\
bytecode 01
  Test::i
code
  0x0 takex r1 r4 r0 0
  0xf takex r5 r5 r0 5
  0x1e fail 0x41
  0x23 mov r6 r1
  0x2c mov r7 r2
  0x35 array r8 r6 r7
  0x42 return r8
data
end
";
        // assemble, disassemble, assemble again: listings agree
        let c0 = assemble(&m, src).unwrap();
        let d0 = disassemble(&m, &c0).unwrap();
        let c1 = assemble(&m, &d0).unwrap();
        let d1 = disassemble(&m, &c1).unwrap();
        assert_eq!(d0, d1);
    }

    #[test]
    fn test_assemble_rejects_garbage() {
        let m = Machine::new();
        assert!(assemble(&m, "bytecode 02").is_err());
        assert!(assemble(&m, "bytecode 01\n Test::x\ncode\n 0x0 frobnicate r1\ndata\nend").is_err());
    }

    #[test]
    fn test_negative_data_entry() {
        let m = Machine::new();
        let src = "\
bytecode 01
  Test::neg
code
  0x0 takex r1 r4 r0 0
  0xf data r5 0
  0x18 array r6 r1 r5
  0x25 return r6
data
  i 0 0 -7
end
";
        let c = assemble(&m, src).unwrap();
        let r = m.reduce(array_of(vec![c]));
        assert_eq!(r.result.unwrap().as_integer(), Some(-7));
    }
}
