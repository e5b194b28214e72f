//! The register-based bytecode: instruction set, emitter, interpreter, and
//! the textual (dis)assembler that doubles as the persistent representation
//! of a compiled combinator.

pub mod asm;
pub mod coder;
pub mod disasm;
pub mod opcodes;
pub mod vm;

pub use asm::assemble;
pub use coder::Coder;
pub use disasm::disassemble;
pub use opcodes::{Opcode, Operand};
