//! The structural model of a method body.
//!
//! A method body is a tree of lexical [`InstructionBlock`]s over a flat arena owned
//! by the [`MethodBody`]. Each block owns EITHER child blocks OR instruction
//! sequences, never both; blocks optionally own local-variable symbols and exception
//! handlers whose protected region is the block itself. Instruction sequences are
//! doubly-linked siblings, giving O(1) structural edits (split, move, insert)
//! without renumbering.
//!
//! Blocks and sequences are addressed by dense arena tokens ([`BlockId`],
//! [`SequenceId`]) assigned by the body's factory methods; tokens are never
//! renumbered, even after a block is detached.

mod block;
mod body;
mod exceptions;
mod sequence;
mod symbols;

pub use block::{BlockChildren, BlockPosition, InstructionBlock, RangeRelation};
pub use body::{BlockId, HandlerId, MethodBody, SequenceId};
pub use exceptions::{ExceptionHandler, ExceptionHandlerKind, HandlerRole};
pub use sequence::{InstructionSequence, SequenceContent, SequenceIter};
pub use symbols::{LocalVariableSymbol, SequencePoint};
