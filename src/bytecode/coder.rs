//! The code emitter.
//!
//! A `Coder` accumulates one combinator's code and per-combinator data
//! table. Registers and labels are handed out monotonically; label operands
//! are symbolic during emission and patched to absolute byte offsets by a
//! single relocation pass.

use std::collections::HashMap;

use crate::machine::Machine;
use crate::term::{DataId, TermRef};

use super::opcodes::{Label, Opcode, Operand, Reg};

pub struct Coder<'m> {
    machine: &'m Machine,
    code: Vec<u8>,
    data: Vec<DataId>,
    label_counter: Label,
    register_counter: Reg,
    labels: HashMap<Label, u32>,
}

impl<'m> Coder<'m> {
    pub fn new(machine: &'m Machine) -> Self {
        Coder {
            machine,
            code: Vec::new(),
            data: Vec::new(),
            label_counter: 0,
            register_counter: 0,
            labels: HashMap::new(),
        }
    }

    pub fn machine(&self) -> &Machine {
        self.machine
    }

    /// Relocate and take the finished code and data sections.
    pub fn finish(mut self) -> (Vec<u8>, Vec<DataId>) {
        self.relabel();
        (self.code, self.data)
    }

    pub fn generate_label(&mut self) -> Label {
        let l = self.label_counter;
        self.label_counter += 1;
        l
    }

    pub fn generate_register(&mut self) -> Reg {
        let r = self.register_counter;
        self.register_counter += 1;
        r
    }

    /// A block of `n` consecutive registers; returns the first.
    pub fn generate_registers(&mut self, n: u32) -> Reg {
        let r = self.register_counter;
        self.register_counter += n;
        r
    }

    pub fn peek_register(&self) -> Reg {
        self.register_counter
    }

    /// Roll the allocator back to a mark taken with `peek_register`.
    pub fn restore_register(&mut self, r: Reg) {
        self.register_counter = r;
    }

    // primitive emit

    fn emit_i8(&mut self, b: u8) {
        self.code.push(b);
    }

    fn emit_i16(&mut self, n: u16) {
        self.code.extend_from_slice(&n.to_be_bytes());
    }

    fn emit_i32(&mut self, n: u32) {
        self.code.extend_from_slice(&n.to_be_bytes());
    }

    fn emit_op(&mut self, op: Opcode) {
        self.emit_i8(op as u8);
    }

    // instruction emit

    pub fn emit_nil(&mut self, x: Reg) {
        self.emit_op(Opcode::Nil);
        self.emit_i32(x);
    }

    pub fn emit_mov(&mut self, x: Reg, y: Reg) {
        self.emit_op(Opcode::Mov);
        self.emit_i32(x);
        self.emit_i32(y);
    }

    pub fn emit_data(&mut self, x: Reg, i: u32) {
        self.emit_op(Opcode::Data);
        self.emit_i32(x);
        self.emit_i32(i);
    }

    pub fn emit_set(&mut self, x: Reg, y: Reg, z: Reg) {
        self.emit_op(Opcode::Set);
        self.emit_i32(x);
        self.emit_i32(y);
        self.emit_i32(z);
    }

    pub fn emit_takex(&mut self, x: Reg, y: Reg, z: Reg, i: u16) {
        self.emit_op(Opcode::Takex);
        self.emit_i32(x);
        self.emit_i32(y);
        self.emit_i32(z);
        self.emit_i16(i);
    }

    pub fn emit_split(&mut self, x: Reg, y: Reg, z: Reg) {
        self.emit_op(Opcode::Split);
        self.emit_i32(x);
        self.emit_i32(y);
        self.emit_i32(z);
    }

    pub fn emit_array(&mut self, x: Reg, y: Reg, z: Reg) {
        self.emit_op(Opcode::Array);
        self.emit_i32(x);
        self.emit_i32(y);
        self.emit_i32(z);
    }

    pub fn emit_concatx(&mut self, x: Reg, y: Reg, z: Reg, i: u16) {
        self.emit_op(Opcode::Concatx);
        self.emit_i32(x);
        self.emit_i32(y);
        self.emit_i32(z);
        self.emit_i16(i);
    }

    pub fn emit_test(&mut self, x: Reg, y: Reg) {
        self.emit_op(Opcode::Test);
        self.emit_i32(x);
        self.emit_i32(y);
    }

    pub fn emit_tag(&mut self, x: Reg, y: Reg) {
        self.emit_op(Opcode::Tag);
        self.emit_i32(x);
        self.emit_i32(y);
    }

    pub fn emit_fail(&mut self, l: Label) {
        self.emit_op(Opcode::Fail);
        self.emit_i32(l);
    }

    pub fn emit_return(&mut self, x: Reg) {
        self.emit_op(Opcode::Return);
        self.emit_i32(x);
    }

    /// Bind a label to the current code offset.
    pub fn emit_label(&mut self, l: Label) {
        self.labels.insert(l, self.code.len() as u32);
    }

    /// Intern a constant in the machine data table and record it in this
    /// combinator's data section; returns the local index.
    pub fn emit_constant(&mut self, o: TermRef) -> u32 {
        let d = self.machine.enter_data(o);
        self.data.push(d);
        (self.data.len() - 1) as u32
    }

    /// Record an already-interned machine data id; returns the local index.
    pub fn emit_data_id(&mut self, d: DataId) -> u32 {
        self.data.push(d);
        (self.data.len() - 1) as u32
    }

    /// Patch every `FAIL` operand from a symbolic label to the absolute
    /// byte offset it was bound to.
    fn relabel(&mut self) {
        let mut pc = 0;
        while pc < self.code.len() {
            let op = match Opcode::from_byte(self.code[pc]) {
                Some(op) => op,
                None => return,
            };
            if op == Opcode::Fail {
                let at = pc + 1;
                let l0 = u32::from_be_bytes([
                    self.code[at],
                    self.code[at + 1],
                    self.code[at + 2],
                    self.code[at + 3],
                ]);
                let l1 = self.labels.get(&l0).copied().unwrap_or(l0);
                self.code[at..at + 4].copy_from_slice(&l1.to_be_bytes());
            }
            pc += op.size();
        }
    }
}

/// Read one big-endian u32 operand.
pub fn fetch_u32(code: &[u8], pc: usize) -> u32 {
    u32::from_be_bytes([code[pc], code[pc + 1], code[pc + 2], code[pc + 3]])
}

/// Read one big-endian u16 operand.
pub fn fetch_u16(code: &[u8], pc: usize) -> u16 {
    u16::from_be_bytes([code[pc], code[pc + 1]])
}

/// Decode the instruction at `pc`: opcode and operand values, plus the next
/// pc. Shared by the interpreter's slow path, the disassembler, and tests.
pub fn decode(code: &[u8], pc: usize) -> Option<(Opcode, Vec<u32>, usize)> {
    let op = Opcode::from_byte(*code.get(pc)?)?;
    if pc + op.size() > code.len() {
        return None;
    }
    let mut vals = Vec::with_capacity(4);
    let mut at = pc + 1;
    for operand in op.operands() {
        match operand {
            Operand::Reg | Operand::I32 | Operand::Label => {
                vals.push(fetch_u32(code, at));
            }
            Operand::Idx => {
                vals.push(fetch_u16(code, at) as u32);
            }
        }
        at += operand.width();
    }
    Some((op, vals, at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;

    #[test]
    fn test_relabel_patches_fail() {
        let m = Machine::new();
        let mut c = Coder::new(&m);
        let l = c.generate_label();
        c.emit_fail(l);
        c.emit_nil(0);
        c.emit_label(l);
        c.emit_return(0);
        let (code, _) = c.finish();
        let (op, vals, _) = decode(&code, 0).unwrap();
        assert_eq!(op, Opcode::Fail);
        // fail(5 bytes) + nil(5 bytes) = offset 10
        assert_eq!(vals[0], 10);
    }

    #[test]
    fn test_register_restore() {
        let m = Machine::new();
        let mut c = Coder::new(&m);
        let mark = c.peek_register();
        let _ = c.generate_register();
        let _ = c.generate_register();
        c.restore_register(mark);
        assert_eq!(c.generate_register(), mark);
    }

    #[test]
    fn test_constants_are_local_indices(){
        let m = Machine::new();
        let mut c = Coder::new(&m);
        let i0 = c.emit_constant(m.create_integer(5));
        let i1 = c.emit_constant(m.create_integer(5));
        // duplicates get distinct local slots backed by one machine entry
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);
    }
}
