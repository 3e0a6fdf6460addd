use std::fmt;
use std::sync::Arc;

use crate::metadata::method::block::InstructionBlock;
use crate::metadata::method::exceptions::ExceptionHandler;
use crate::metadata::method::sequence::{InstructionSequence, SequenceContent};
use crate::metadata::method::symbols::LocalVariableSymbol;
use crate::Result;

/// Dense arena token of an instruction block within its method body.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// Dense arena token of an instruction sequence within its method body.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceId(pub(crate) u32);

/// Dense arena token of an exception handler within its method body.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u32);

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block#{}", self.0)
    }
}

impl fmt::Debug for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence#{}", self.0)
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler#{}", self.0)
    }
}

/// The structural model of one method body.
///
/// Owns the arena of blocks, sequences and exception handlers; all tree mutation
/// goes through methods on this type, taking arena tokens as handles. Tokens are
/// assigned monotonically by the factory methods and never renumbered - a detached
/// block keeps its token and simply becomes unreachable from the root.
pub struct MethodBody {
    method_name: String,
    /// The original binary IL of the method; empty for bodies built from scratch.
    il: Arc<[u8]>,
    /// Maximum number of items on the operand stack.
    pub max_stack: u16,
    /// Whether locals are zero-initialized on entry.
    pub init_locals: bool,
    pub(crate) blocks: Vec<InstructionBlock>,
    pub(crate) seqs: Vec<InstructionSequence>,
    pub(crate) handlers: Vec<ExceptionHandler>,
    pub(crate) root: Option<BlockId>,
}

impl MethodBody {
    /// Creates an empty body for a method built from scratch.
    #[must_use]
    pub fn new(method_name: impl Into<String>) -> Self {
        MethodBody::with_il(method_name, Vec::new())
    }

    /// Creates a body over the method's original binary IL.
    #[must_use]
    pub fn with_il(method_name: impl Into<String>, il: Vec<u8>) -> Self {
        MethodBody {
            method_name: method_name.into(),
            il: il.into(),
            max_stack: 0,
            init_locals: false,
            blocks: Vec::new(),
            seqs: Vec::new(),
            handlers: Vec::new(),
            root: None,
        }
    }

    /// The name of the owning method, used in diagnostics.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The original binary IL buffer.
    #[must_use]
    pub fn il(&self) -> &Arc<[u8]> {
        &self.il
    }

    /// The root instruction block, once attached.
    #[must_use]
    pub fn root_block(&self) -> Option<BlockId> {
        self.root
    }

    /// Creates a detached block with no binary provenance.
    pub fn create_block(&mut self) -> BlockId {
        self.create_block_spanning(0, 0)
    }

    /// Creates a detached block remembering the `[start, end)` offsets it was read
    /// from. The offsets are provenance only: they drive the one-time construction
    /// of the tree from raw clause offsets and are never consulted afterwards.
    pub fn create_block_spanning(&mut self, start_offset: u32, end_offset: u32) -> BlockId {
        #[allow(clippy::cast_possible_truncation)]
        let token = BlockId(self.blocks.len() as u32);
        self.blocks
            .push(InstructionBlock::new(token, start_offset, end_offset));
        token
    }

    pub(crate) fn create_sequence(&mut self, content: SequenceContent) -> SequenceId {
        #[allow(clippy::cast_possible_truncation)]
        let token = SequenceId(self.seqs.len() as u32);
        self.seqs.push(InstructionSequence {
            token,
            block: None,
            prev: None,
            next: None,
            content,
        });
        token
    }

    /// Attaches a parentless block as the root of the body.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the block already has a parent
    pub fn set_root_block(&mut self, block: BlockId) -> Result<()> {
        if self.block(block).parent.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {block:?} already has a parent and cannot become the root"
            )));
        }
        self.root = Some(block);
        Ok(())
    }

    /// Read access to a block node.
    ///
    /// # Panics
    /// Panics if the token does not belong to this body's arena.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &InstructionBlock {
        &self.blocks[id.0 as usize]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut InstructionBlock {
        &mut self.blocks[id.0 as usize]
    }

    /// Read access to a sequence node.
    ///
    /// # Panics
    /// Panics if the token does not belong to this body's arena.
    #[must_use]
    pub fn sequence(&self, id: SequenceId) -> &InstructionSequence {
        &self.seqs[id.0 as usize]
    }

    pub(crate) fn sequence_mut(&mut self, id: SequenceId) -> &mut InstructionSequence {
        &mut self.seqs[id.0 as usize]
    }

    /// Read access to an exception handler.
    ///
    /// # Panics
    /// Panics if the token does not belong to this body's arena.
    #[must_use]
    pub fn handler(&self, id: HandlerId) -> &ExceptionHandler {
        &self.handlers[id.0 as usize]
    }

    pub(crate) fn handler_mut(&mut self, id: HandlerId) -> &mut ExceptionHandler {
        &mut self.handlers[id.0 as usize]
    }

    /// Declares a local-variable symbol within a block's lexical scope.
    ///
    /// Descendant scopes inherit the binding unless they shadow the ordinal.
    pub fn declare_local_symbol(&mut self, block: BlockId, ordinal: u16, name: impl Into<String>) {
        self.block_mut(block)
            .locals
            .push(LocalVariableSymbol::new(ordinal, name));
    }
}
