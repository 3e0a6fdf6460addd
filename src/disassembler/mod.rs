//! Binary IL instruction decoding.
//!
//! This module provides the opcode tables and the stateful [`InstructionReader`]
//! that walks a method body's block tree with an explicit enter/leave discipline,
//! decoding one logical instruction at a time.
//!
//! # Key Types
//! - [`InstructionReader`] - the cursor over a method body's sequences
//! - [`Instruction`] - one decoded logical instruction, prefixes folded in
//! - [`OpCode`] / [`OPCODES`] / [`OPCODES_FE`] - the closed opcode tables
//! - [`Bookmark`] - a saved cursor state for revisiting an instruction
//!
//! # Example
//! ```rust
//! use cilforge::metadata::method::MethodBody;
//! use cilforge::disassembler::{InstructionReader, OpCode};
//!
//! let mut body = MethodBody::with_il("answer", vec![0x02, 0x2A]); // ldarg.0, ret
//! let root = body.create_block();
//! body.set_root_block(root)?;
//! let seq = body.create_original_sequence(0, 2);
//! body.add_instruction_sequence(root, seq)?;
//!
//! let mut reader = InstructionReader::new(&body, &[]);
//! reader.enter_instruction_block(root)?;
//! reader.enter_instruction_sequence(seq)?;
//! assert!(reader.read_instruction()?);
//! assert_eq!(reader.current_instruction().unwrap().opcode, OpCode::Ldarg_0);
//! # Ok::<(), cilforge::Error>(())
//! ```

mod opcodes;
mod reader;

pub use opcodes::{
    Immediate, Instruction, OpCode, OpCodeEntry, Operand, OperandKind, PrefixFlags, OPCODES,
    OPCODES_FE, SEQUENCE_POINT_CODE, TWO_BYTE_ESCAPE,
};
pub use reader::{Bookmark, InstructionReader};
