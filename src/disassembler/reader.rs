//! The stateful instruction reader.
//!
//! A reader is a single-method, single-threaded cursor over a method body's block
//! tree. Navigation follows an explicit enter/leave stack discipline mirroring a
//! stack walk of the tree; [`InstructionReader::jump_to_instruction_block`] computes
//! the common ancestor and issues the minimal leave/enter sequence. Within a sequence,
//! [`InstructionReader::read_instruction`] decodes one logical instruction at a
//! time, accumulating prefixes, consuming sequence-point pseudo-instructions
//! transparently and attaching scheduled sequence points from the symbol provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::disassembler::opcodes::{
    Immediate, Instruction, OpCode, OpCodeEntry, Operand, OperandKind, PrefixFlags, OPCODES,
    OPCODES_FE, SEQUENCE_POINT_CODE, TWO_BYTE_ESCAPE,
};
use crate::file::io::read_le_at;
use crate::metadata::method::{
    BlockId, LocalVariableSymbol, MethodBody, SequenceContent, SequenceId, SequencePoint,
};
use crate::metadata::token::Token;
use crate::Result;

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// A saved cursor state, valid only for the sequence and reader it was taken from.
///
/// Restoring a bookmark re-decodes the instruction at the saved position, leaving
/// the reader positioned ON the bookmarked instruction.
#[derive(Debug, Clone)]
pub struct Bookmark {
    reader_id: u64,
    sequence: SequenceId,
    position: usize,
    next_seq_point: usize,
    last_seq_point: Option<SequencePoint>,
}

/// One lexical scope frame of local-variable symbols.
struct ScopeFrame {
    block: Option<BlockId>,
    symbols: HashMap<u16, Arc<LocalVariableSymbol>>,
    /// Synthesized defaults, cached so repeated queries for the same ordinal
    /// within one frame return the identical symbol object.
    synthesized: HashMap<u16, Arc<LocalVariableSymbol>>,
}

enum ActiveBuffer {
    None,
    /// Offset-addressed range of the method's original IL.
    Original { start: u32, end: u32 },
    /// An in-memory modified buffer.
    Modified(Arc<[u8]>),
}

/// A stateful cursor decoding the binary instruction stream of one method body.
pub struct InstructionReader<'a> {
    body: &'a MethodBody,
    seq_points: &'a [SequencePoint],
    resolve_symbols: bool,
    reader_id: u64,
    block_stack: Vec<BlockId>,
    scopes: Vec<ScopeFrame>,
    sequence: Option<SequenceId>,
    buffer: ActiveBuffer,
    /// Cursor within the active buffer.
    position: usize,
    /// Index of the next scheduled sequence point, `seq_points.len()` for none.
    next_seq_point: usize,
    last_seq_point: Option<SequencePoint>,
    current: Option<Instruction>,
    /// Pre-decode state of the current instruction, snapshot for bookmarks.
    current_start: usize,
    current_seq_state: (usize, Option<SequencePoint>),
}

impl<'a> InstructionReader<'a> {
    /// Creates a reader over `body`, with the symbol provider's ordered sequence
    /// points.
    #[must_use]
    pub fn new(body: &'a MethodBody, seq_points: &'a [SequencePoint]) -> Self {
        InstructionReader {
            body,
            seq_points,
            resolve_symbols: false,
            reader_id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            block_stack: Vec::new(),
            scopes: Vec::new(),
            sequence: None,
            buffer: ActiveBuffer::None,
            position: 0,
            next_seq_point: 0,
            last_seq_point: None,
            current: None,
            current_start: 0,
            current_seq_state: (0, None),
        }
    }

    /// Enables local-variable symbol resolution for this reader instance.
    #[must_use]
    pub fn with_symbol_resolution(mut self) -> Self {
        self.resolve_symbols = true;
        self.scopes.push(ScopeFrame {
            block: None,
            symbols: HashMap::new(),
            synthesized: HashMap::new(),
        });
        self
    }

    /// The method body this reader walks.
    #[must_use]
    pub fn body(&self) -> &MethodBody {
        self.body
    }

    /// The block the reader currently sits in, if any.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.block_stack.last().copied()
    }

    /// The last decoded instruction, if the reader is positioned on one.
    #[must_use]
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.current.as_ref()
    }

    fn discipline_error(&self, message: String) -> crate::Error {
        crate::Error::ReaderDiscipline(format!(
            "{} (method '{}')",
            message,
            self.body.method_name()
        ))
    }

    /// Enters a block; the reader must currently sit exactly at the target's parent
    /// (or nowhere, for the root block).
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] on any stack-order violation
    pub fn enter_instruction_block(&mut self, block: BlockId) -> Result<()> {
        if self.sequence.is_some() {
            return Err(self.discipline_error(format!(
                "Cannot enter block {block:?} while a sequence is active"
            )));
        }
        match self.block_stack.last() {
            None => {
                if self.body.root_block() != Some(block) {
                    return Err(self.discipline_error(format!(
                        "Block {block:?} is not the root of the method body"
                    )));
                }
            }
            Some(&top) => {
                if self.body.block(block).parent() != Some(top) {
                    return Err(self.discipline_error(format!(
                        "Block {block:?} is not a child of the current block {top:?}"
                    )));
                }
            }
        }

        self.block_stack.push(block);
        if self.resolve_symbols && !self.body.block(block).locals().is_empty() {
            // Copy the enclosing scope's bindings and overlay this block's own;
            // inner declarations shadow outer ones.
            let mut symbols = self
                .scopes
                .last()
                .map(|frame| frame.symbols.clone())
                .unwrap_or_default();
            for local in self.body.block(block).locals() {
                symbols.insert(local.ordinal, Arc::new(local.clone()));
            }
            self.scopes.push(ScopeFrame {
                block: Some(block),
                symbols,
                synthesized: HashMap::new(),
            });
        }
        Ok(())
    }

    /// Leaves a block; the reader must currently sit exactly in it.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] on any stack-order violation
    pub fn leave_instruction_block(&mut self, block: BlockId) -> Result<()> {
        if self.sequence.is_some() {
            return Err(self.discipline_error(format!(
                "Cannot leave block {block:?} while a sequence is active"
            )));
        }
        if self.block_stack.last() != Some(&block) {
            return Err(self.discipline_error(format!(
                "Block {block:?} is not the current block"
            )));
        }

        self.block_stack.pop();
        if self
            .scopes
            .last()
            .is_some_and(|frame| frame.block == Some(block))
        {
            self.scopes.pop();
        }
        Ok(())
    }

    /// Moves the reader to `target` by the minimal sequence of leave/enter calls.
    ///
    /// Computes the common ancestor of the current position and the target,
    /// leaves up to it and enters down to the target - equivalent to, but cheaper
    /// than, leaving to the root and re-entering from scratch.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] if a sequence is active or the target
    ///   is not reachable from the reader's tree
    pub fn jump_to_instruction_block(&mut self, target: BlockId) -> Result<()> {
        if self.sequence.is_some() {
            return Err(self.discipline_error(format!(
                "Cannot jump to block {target:?} while a sequence is active"
            )));
        }

        let chain = self.body.ancestors_to_root(target);
        // ancestors_to_root returns target-first; walk root-first below.
        let root = *chain.last().expect("chain contains the target itself");
        if self.body.root_block() != Some(root) {
            return Err(self.discipline_error(format!(
                "Block {target:?} is not part of this method body's tree"
            )));
        }

        match self.current_block() {
            None => {
                for &block in chain.iter().rev() {
                    self.enter_instruction_block(block)?;
                }
            }
            Some(current) => {
                let ancestor = self
                    .body
                    .find_common_ancestor(current, target)
                    .ok_or_else(|| {
                        self.discipline_error(format!(
                            "Blocks {current:?} and {target:?} share no common ancestor"
                        ))
                    })?;

                while let Some(top) = self.current_block() {
                    if top == ancestor {
                        break;
                    }
                    self.leave_instruction_block(top)?;
                }
                for &block in chain.iter().rev() {
                    if self.block_stack.contains(&block) {
                        continue;
                    }
                    self.enter_instruction_block(block)?;
                }
            }
        }
        Ok(())
    }

    /// Binds the byte cursor to a sequence of the current block and primes the
    /// sequence-point lookahead.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] if another sequence is active or the
    ///   sequence does not belong to the current block
    pub fn enter_instruction_sequence(&mut self, sequence: SequenceId) -> Result<()> {
        if self.sequence.is_some() {
            return Err(self.discipline_error(
                "Cannot enter a sequence while another sequence is active".to_string(),
            ));
        }
        let node = self.body.sequence(sequence);
        if node.block() != self.current_block() {
            return Err(self.discipline_error(format!(
                "Sequence {sequence:?} does not belong to the current block"
            )));
        }

        self.buffer = match node.content() {
            SequenceContent::Original { start, end } => {
                // Prime the lookahead: the first scheduled point at or after the
                // sequence's start offset.
                self.next_seq_point = self
                    .seq_points
                    .iter()
                    .position(|point| point.offset >= *start)
                    .unwrap_or(self.seq_points.len());
                ActiveBuffer::Original {
                    start: *start,
                    end: *end,
                }
            }
            SequenceContent::Modified(bytes) => {
                self.next_seq_point = self.seq_points.len();
                ActiveBuffer::Modified(bytes.clone())
            }
        };
        self.sequence = Some(sequence);
        self.position = 0;
        self.last_seq_point = None;
        self.current = None;
        Ok(())
    }

    /// Unbinds the byte cursor from the active sequence.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] if `sequence` is not the active one
    pub fn leave_instruction_sequence(&mut self, sequence: SequenceId) -> Result<()> {
        if self.sequence != Some(sequence) {
            return Err(self.discipline_error(format!(
                "Sequence {sequence:?} is not the active sequence"
            )));
        }
        self.sequence = None;
        self.buffer = ActiveBuffer::None;
        self.position = 0;
        self.current = None;
        Ok(())
    }

    fn active_bytes(&self) -> &[u8] {
        match &self.buffer {
            ActiveBuffer::None => &[],
            ActiveBuffer::Original { start, end } => {
                &self.body.il()[*start as usize..*end as usize]
            }
            ActiveBuffer::Modified(bytes) => bytes,
        }
    }

    fn corruption_error(&self, message: &str) -> crate::Error {
        let sequence = self
            .sequence
            .map_or_else(|| "<none>".to_string(), |seq| format!("{seq:?}"));
        malformed_error!(
            "{} (method '{}', sequence {}, offset {})",
            message,
            self.body.method_name(),
            sequence,
            self.position
        )
    }

    fn read<T: crate::file::io::CilIO>(&mut self) -> Result<T> {
        let bytes = match &self.buffer {
            ActiveBuffer::None => &[][..],
            ActiveBuffer::Original { start, end } => {
                &self.body.il()[*start as usize..*end as usize]
            }
            ActiveBuffer::Modified(bytes) => bytes,
        };
        // A short buffer mid-instruction is binary corruption, not end-of-data.
        let mut position = self.position;
        match read_le_at::<T>(bytes, &mut position) {
            Ok(value) => {
                self.position = position;
                Ok(value)
            }
            Err(_) => Err(self.corruption_error("Instruction stream ends mid-read")),
        }
    }

    /// Decodes the next logical instruction of the active sequence.
    ///
    /// Returns `Ok(false)` at the end of the sequence. Sequence-point
    /// pseudo-instructions and true prefixes are consumed transparently: the
    /// decoded instruction carries them as metadata.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] if no sequence is active
    /// - [`crate::Error::Malformed`] on invalid opcodes or a truncated stream
    pub fn read_instruction(&mut self) -> Result<bool> {
        if self.sequence.is_none() {
            return Err(self
                .discipline_error("Cannot read an instruction outside a sequence".to_string()));
        }
        if self.position >= self.active_bytes().len() {
            return Ok(false);
        }

        let start = self.position;
        self.current_start = start;
        self.current_seq_state = (self.next_seq_point, self.last_seq_point);

        let mut prefixes = PrefixFlags::empty();
        let mut unaligned = None;
        let mut constrained = None;
        let mut pending_point: Option<SequencePoint> = None;

        // Decode loop: sequence points and prefixes accumulate until a real
        // opcode terminates it.
        let entry: &OpCodeEntry = loop {
            let first = self.read::<u8>()?;
            if first == TWO_BYTE_ESCAPE {
                let second = self.read::<u8>()?;
                if second == SEQUENCE_POINT_CODE {
                    let ordinal = self.read::<i16>()?;
                    #[allow(clippy::cast_possible_truncation)]
                    let offset = start as u32;
                    pending_point = Some(SequencePoint { offset, ordinal });
                    continue;
                }
                let Some(entry) = OPCODES_FE.get(second as usize) else {
                    return Err(self.corruption_error(&format!(
                        "Invalid opcode: FE {second:02X}"
                    )));
                };
                if entry.mnemonic.is_empty() {
                    return Err(
                        self.corruption_error(&format!("Reserved opcode: FE {second:02X}"))
                    );
                }
                if entry.code.is_prefix() {
                    match entry.code {
                        OpCode::Tail => prefixes |= PrefixFlags::TAIL,
                        OpCode::Volatile => prefixes |= PrefixFlags::VOLATILE,
                        OpCode::Readonly => prefixes |= PrefixFlags::READONLY,
                        OpCode::Unaligned => {
                            prefixes |= PrefixFlags::UNALIGNED;
                            unaligned = Some(self.read::<u8>()?);
                        }
                        OpCode::Constrained => {
                            prefixes |= PrefixFlags::CONSTRAINED;
                            constrained = Some(Token::new(self.read::<u32>()?));
                        }
                        _ => unreachable!("is_prefix covers exactly these opcodes"),
                    }
                    continue;
                }
                break entry;
            }

            let entry = &OPCODES[first as usize];
            if entry.mnemonic.is_empty() {
                return Err(self.corruption_error(&format!("Invalid opcode: {first:02X}")));
            }
            break entry;
        };

        let operand = match entry.operand {
            OperandKind::None => Operand::None,
            OperandKind::Int8 => Operand::Immediate(Immediate::Int8(self.read::<i8>()?)),
            OperandKind::UInt8 => Operand::Immediate(Immediate::UInt8(self.read::<u8>()?)),
            OperandKind::UInt16 => Operand::Immediate(Immediate::UInt16(self.read::<u16>()?)),
            OperandKind::Int32 => Operand::Immediate(Immediate::Int32(self.read::<i32>()?)),
            OperandKind::Int64 => Operand::Immediate(Immediate::Int64(self.read::<i64>()?)),
            OperandKind::Float32 => Operand::Immediate(Immediate::Float32(self.read::<f32>()?)),
            OperandKind::Float64 => Operand::Immediate(Immediate::Float64(self.read::<f64>()?)),
            OperandKind::Token => Operand::Token(Token::new(self.read::<u32>()?)),
            OperandKind::BranchTarget8 => Operand::BranchTarget(i32::from(self.read::<i8>()?)),
            OperandKind::BranchTarget32 => Operand::BranchTarget(self.read::<i32>()?),
            OperandKind::Switch => {
                let count = self.read::<u32>()?;
                let mut targets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    targets.push(self.read::<i32>()?);
                }
                Operand::Switch(targets)
            }
        };

        // Attach the scheduled sequence point once its offset is reached.
        let mut sequence_point = pending_point;
        if let ActiveBuffer::Original { start: base, .. } = &self.buffer {
            #[allow(clippy::cast_possible_truncation)]
            let absolute = *base + start as u32;
            if let Some(point) = self.seq_points.get(self.next_seq_point) {
                if point.offset <= absolute {
                    sequence_point = Some(*point);
                    self.last_seq_point = Some(*point);
                    self.next_seq_point += 1;
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let instruction = Instruction {
            opcode: entry.code,
            mnemonic: entry.mnemonic,
            offset: start as u32,
            size: (self.position - start) as u32,
            prefixes,
            unaligned,
            constrained,
            operand,
            sequence_point,
        };
        self.current = Some(instruction);
        Ok(true)
    }

    /// Resolves a local-variable ordinal in the current scope.
    ///
    /// With `synthesize`, an undeclared ordinal yields a default symbol that is
    /// cached within the current scope frame, so repeated queries return the
    /// identical object.
    #[must_use]
    pub fn lookup_local_symbol(
        &mut self,
        ordinal: u16,
        synthesize: bool,
    ) -> Option<Arc<LocalVariableSymbol>> {
        if !self.resolve_symbols {
            return None;
        }
        let frame = self.scopes.last_mut()?;
        if let Some(symbol) = frame.symbols.get(&ordinal) {
            return Some(symbol.clone());
        }
        if !synthesize {
            return None;
        }
        Some(
            frame
                .synthesized
                .entry(ordinal)
                .or_insert_with(|| LocalVariableSymbol::synthesized(ordinal))
                .clone(),
        )
    }

    /// Snapshots the full cursor state at the current instruction.
    ///
    /// # Errors
    /// - [`crate::Error::ReaderDiscipline`] if the reader is not positioned on an
    ///   instruction inside a sequence
    pub fn create_bookmark(&self) -> Result<Bookmark> {
        let sequence = self.sequence.ok_or_else(|| {
            self.discipline_error("Cannot bookmark outside a sequence".to_string())
        })?;
        if self.current.is_none() {
            return Err(
                self.discipline_error("Cannot bookmark before reading an instruction".to_string())
            );
        }
        Ok(Bookmark {
            reader_id: self.reader_id,
            sequence,
            position: self.current_start,
            next_seq_point: self.current_seq_state.0,
            last_seq_point: self.current_seq_state.1,
        })
    }

    /// Restores a bookmark taken by this reader in the active sequence and
    /// re-decodes the bookmarked instruction.
    ///
    /// # Errors
    /// - [`crate::Error::BookmarkMismatch`] for a bookmark from another reader or
    ///   sequence
    pub fn go_to_bookmark(&mut self, bookmark: &Bookmark) -> Result<()> {
        if bookmark.reader_id != self.reader_id || self.sequence != Some(bookmark.sequence) {
            return Err(crate::Error::BookmarkMismatch);
        }

        self.position = bookmark.position;
        self.next_seq_point = bookmark.next_seq_point;
        self.last_seq_point = bookmark.last_seq_point;
        self.current = None;
        if !self.read_instruction()? {
            return Err(self.corruption_error("Bookmarked position has no instruction"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::BlockPosition;

    fn linear_body(il: Vec<u8>) -> (MethodBody, BlockId, SequenceId) {
        let len = il.len();
        let mut body = MethodBody::with_il("demo", il);
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        #[allow(clippy::cast_possible_truncation)]
        let seq = body.create_original_sequence(0, len as u32);
        body.add_instruction_sequence(root, seq).unwrap();
        (body, root, seq)
    }

    #[test]
    fn decode_trivial_method() {
        // ldarg.0, ret
        let (body, root, seq) = linear_body(vec![0x02, 0x2A]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        assert!(reader.read_instruction().unwrap());
        let first = reader.current_instruction().unwrap();
        assert_eq!(first.opcode, OpCode::Ldarg_0);
        assert_eq!(first.operand, Operand::None);
        assert_eq!(first.size, 1);

        assert!(reader.read_instruction().unwrap());
        let second = reader.current_instruction().unwrap();
        assert_eq!(second.opcode, OpCode::Ret);
        assert_eq!(second.operand, Operand::None);

        // End of sequence.
        assert!(!reader.read_instruction().unwrap());
    }

    #[test]
    fn decode_operands() {
        // ldc.i4.s -3; ldstr <token>; br.s +4
        let (body, root, seq) = linear_body(vec![
            0x1F, 0xFD, // ldc.i4.s -3
            0x72, 0x01, 0x00, 0x00, 0x70, // ldstr 0x70000001
            0x2B, 0x04, // br.s +4
        ]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        assert_eq!(
            reader.current_instruction().unwrap().operand,
            Operand::Immediate(Immediate::Int8(-3))
        );

        reader.read_instruction().unwrap();
        assert_eq!(
            reader.current_instruction().unwrap().operand,
            Operand::Token(Token::new(0x70000001))
        );

        reader.read_instruction().unwrap();
        assert_eq!(
            reader.current_instruction().unwrap().operand,
            Operand::BranchTarget(4)
        );
    }

    #[test]
    fn decode_switch_table() {
        let (body, root, seq) = linear_body(vec![
            0x45, 0x02, 0x00, 0x00, 0x00, // switch, 2 cases
            0x0A, 0x00, 0x00, 0x00, // +10
            0x14, 0x00, 0x00, 0x00, // +20
            0x2A, // ret
        ]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        let instruction = reader.current_instruction().unwrap();
        assert_eq!(instruction.opcode, OpCode::Switch);
        assert_eq!(instruction.operand, Operand::Switch(vec![10, 20]));
        assert_eq!(instruction.size, 13);
    }

    #[test]
    fn prefixes_fold_into_instruction() {
        // volatile. ldind.i4; tail. call <token>; ret
        let (body, root, seq) = linear_body(vec![
            0xFE, 0x13, 0x4A, // volatile. ldind.i4
            0xFE, 0x14, 0x28, 0x01, 0x00, 0x00, 0x0A, // tail. call
            0x2A, // ret
        ]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        let first = reader.current_instruction().unwrap();
        assert_eq!(first.opcode, OpCode::Ldind_I4);
        assert!(first.prefixes.contains(PrefixFlags::VOLATILE));
        assert_eq!(first.size, 3);

        reader.read_instruction().unwrap();
        let second = reader.current_instruction().unwrap();
        assert_eq!(second.opcode, OpCode::Call);
        assert!(second.prefixes.contains(PrefixFlags::TAIL));
        assert_eq!(second.operand, Operand::Token(Token::new(0x0A000001)));
    }

    #[test]
    fn unaligned_and_constrained_side_data() {
        let (body, root, seq) = linear_body(vec![
            0xFE, 0x12, 0x02, 0x4A, // unaligned. 2, ldind.i4
            0xFE, 0x16, 0x01, 0x00, 0x00, 0x1B, 0x6F, 0x02, 0x00, 0x00,
            0x0A, // constrained. <spec>, callvirt
        ]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        let first = reader.current_instruction().unwrap();
        assert_eq!(first.unaligned, Some(2));
        assert!(first.prefixes.contains(PrefixFlags::UNALIGNED));

        reader.read_instruction().unwrap();
        let second = reader.current_instruction().unwrap();
        assert_eq!(second.opcode, OpCode::Callvirt);
        assert_eq!(second.constrained, Some(Token::new(0x1B000001)));
    }

    #[test]
    fn invalid_opcode_is_corruption() {
        let (body, root, seq) = linear_body(vec![0x24]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        let error = reader.read_instruction().unwrap_err();
        assert!(matches!(error, crate::Error::Malformed { .. }));
        assert!(error.to_string().contains("demo"));
    }

    #[test]
    fn truncated_operand_is_corruption() {
        // ldc.i4 with only 2 of 4 operand bytes
        let (body, root, seq) = linear_body(vec![0x20, 0x01, 0x02]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        assert!(matches!(
            reader.read_instruction(),
            Err(crate::Error::Malformed { .. })
        ));
    }

    #[test]
    fn stack_discipline_enforced() {
        let mut body = MethodBody::new("demo");
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let child = body.create_block();
        body.add_child_block(root, child, BlockPosition::After, None)
            .unwrap();

        let mut reader = InstructionReader::new(&body, &[]);

        // Entering a non-root block first violates the discipline.
        assert!(matches!(
            reader.enter_instruction_block(child),
            Err(crate::Error::ReaderDiscipline(_))
        ));

        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_block(child).unwrap();

        // Leaving out of order violates it too.
        assert!(matches!(
            reader.leave_instruction_block(root),
            Err(crate::Error::ReaderDiscipline(_))
        ));
        reader.leave_instruction_block(child).unwrap();
        reader.leave_instruction_block(root).unwrap();
    }

    #[test]
    fn jump_issues_minimal_moves() {
        let mut body = MethodBody::new("demo");
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let left = body.create_block();
        let right = body.create_block();
        let leaf = body.create_block();
        body.add_child_block(root, left, BlockPosition::After, None)
            .unwrap();
        body.add_child_block(root, right, BlockPosition::After, None)
            .unwrap();
        body.add_child_block(left, leaf, BlockPosition::After, None)
            .unwrap();

        let mut reader = InstructionReader::new(&body, &[]);
        reader.jump_to_instruction_block(leaf).unwrap();
        assert_eq!(reader.current_block(), Some(leaf));

        reader.jump_to_instruction_block(right).unwrap();
        assert_eq!(reader.current_block(), Some(right));

        reader.jump_to_instruction_block(root).unwrap();
        assert_eq!(reader.current_block(), Some(root));
    }

    #[test]
    fn sequence_points_attach_to_instructions() {
        // nop at 0, ldarg.0 at 1, ret at 2
        let (body, root, seq) = linear_body(vec![0x00, 0x02, 0x2A]);
        let points = [
            SequencePoint { offset: 0, ordinal: 0 },
            SequencePoint { offset: 2, ordinal: 1 },
        ];
        let mut reader = InstructionReader::new(&body, &points);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        assert_eq!(
            reader.current_instruction().unwrap().sequence_point,
            Some(points[0])
        );

        reader.read_instruction().unwrap();
        assert_eq!(reader.current_instruction().unwrap().sequence_point, None);

        reader.read_instruction().unwrap();
        assert_eq!(
            reader.current_instruction().unwrap().sequence_point,
            Some(points[1])
        );
    }

    #[test]
    fn modified_sequence_embeds_pseudo_points() {
        let mut body = MethodBody::new("demo");
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        // sequence-point ordinal 3, then ret; a hidden point before nop.
        let seq = body.create_modified_sequence(vec![
            0xFE, 0x20, 0x03, 0x00, // sequence point, ordinal 3
            0x2A, // ret
            0xFE, 0x20, 0xFF, 0xFF, // hidden sequence point
            0x00, // nop
        ]);
        body.add_instruction_sequence(root, seq).unwrap();

        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        reader.read_instruction().unwrap();
        let first = reader.current_instruction().unwrap();
        assert_eq!(first.opcode, OpCode::Ret);
        let point = first.sequence_point.unwrap();
        assert_eq!(point.ordinal, 3);
        assert!(!point.is_hidden());
        // The pseudo-instruction bytes count into the logical instruction.
        assert_eq!(first.size, 5);

        reader.read_instruction().unwrap();
        let second = reader.current_instruction().unwrap();
        assert_eq!(second.opcode, OpCode::Nop);
        assert!(second.sequence_point.unwrap().is_hidden());
    }

    #[test]
    fn bookmark_restores_state() {
        // Five one-byte instructions.
        let (body, root, seq) = linear_body(vec![0x00, 0x02, 0x25, 0x26, 0x2A]);
        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(seq).unwrap();

        for _ in 0..3 {
            reader.read_instruction().unwrap();
        }
        let third = reader.current_instruction().unwrap().clone();
        let bookmark = reader.create_bookmark().unwrap();

        reader.read_instruction().unwrap();
        reader.read_instruction().unwrap();
        assert_eq!(reader.current_instruction().unwrap().opcode, OpCode::Ret);

        reader.go_to_bookmark(&bookmark).unwrap();
        let restored = reader.current_instruction().unwrap();
        assert_eq!(restored.opcode, third.opcode);
        assert_eq!(restored.offset, third.offset);
    }

    #[test]
    fn bookmark_rejected_across_sequences_and_readers() {
        let mut body = MethodBody::with_il("demo", vec![0x00, 0x2A]);
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let first = body.create_original_sequence(0, 1);
        let second = body.create_original_sequence(1, 2);
        body.add_instruction_sequence(root, first).unwrap();
        body.add_instruction_sequence(root, second).unwrap();

        let mut reader = InstructionReader::new(&body, &[]);
        reader.enter_instruction_block(root).unwrap();
        reader.enter_instruction_sequence(first).unwrap();
        reader.read_instruction().unwrap();
        let bookmark = reader.create_bookmark().unwrap();

        // A different sequence rejects the bookmark.
        reader.leave_instruction_sequence(first).unwrap();
        reader.enter_instruction_sequence(second).unwrap();
        assert!(matches!(
            reader.go_to_bookmark(&bookmark),
            Err(crate::Error::BookmarkMismatch)
        ));

        // A different reader instance rejects it too, even in the right sequence.
        let mut other = InstructionReader::new(&body, &[]);
        other.enter_instruction_block(root).unwrap();
        other.enter_instruction_sequence(first).unwrap();
        assert!(matches!(
            other.go_to_bookmark(&bookmark),
            Err(crate::Error::BookmarkMismatch)
        ));

        // The owning reader, back in the owning sequence, restores it fine.
        reader.leave_instruction_sequence(second).unwrap();
        reader.enter_instruction_sequence(first).unwrap();
        assert!(reader.go_to_bookmark(&bookmark).is_ok());
        assert_eq!(reader.current_instruction().unwrap().opcode, OpCode::Nop);
    }

    #[test]
    fn local_symbols_shadow_and_synthesize() {
        let mut body = MethodBody::with_il("demo", vec![0x00]);
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let inner = body.create_block();
        body.add_child_block(root, inner, BlockPosition::After, None)
            .unwrap();
        body.declare_local_symbol(root, 0, "outer");
        body.declare_local_symbol(inner, 0, "shadowed");
        body.declare_local_symbol(inner, 1, "extra");

        let mut reader = InstructionReader::new(&body, &[]).with_symbol_resolution();
        reader.enter_instruction_block(root).unwrap();
        assert_eq!(
            reader.lookup_local_symbol(0, false).unwrap().name,
            "outer"
        );

        reader.enter_instruction_block(inner).unwrap();
        assert_eq!(
            reader.lookup_local_symbol(0, false).unwrap().name,
            "shadowed"
        );
        assert_eq!(reader.lookup_local_symbol(1, false).unwrap().name, "extra");

        // Undeclared ordinal: no symbol without synthesis, identity-stable with it.
        assert!(reader.lookup_local_symbol(9, false).is_none());
        let synthesized = reader.lookup_local_symbol(9, true).unwrap();
        let again = reader.lookup_local_symbol(9, true).unwrap();
        assert!(Arc::ptr_eq(&synthesized, &again));
        assert_eq!(synthesized.name, "V_9");

        // Leaving the scope pops the shadowing frame.
        reader.leave_instruction_block(inner).unwrap();
        assert_eq!(
            reader.lookup_local_symbol(0, false).unwrap().name,
            "outer"
        );
    }
}
