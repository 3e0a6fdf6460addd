use std::sync::Arc;

use crate::metadata::method::body::{BlockId, MethodBody, SequenceId};
use crate::Result;

/// The bytes an instruction sequence decodes from.
#[derive(Debug, Clone)]
pub enum SequenceContent {
    /// A contiguous `[start, end)` byte range of the method's original IL buffer.
    Original {
        /// Start offset into the original buffer.
        start: u32,
        /// End offset (exclusive).
        end: u32,
    },
    /// A raw buffer rewritten in memory.
    Modified(Arc<[u8]>),
}

/// A contiguous run of binary instructions inside one block.
///
/// Sequences belong to exactly one block at a time and are ordered in a doubly
/// linked sibling list, allowing O(1) split, move and insert without renumbering.
#[derive(Debug)]
pub struct InstructionSequence {
    pub(crate) token: SequenceId,
    pub(crate) block: Option<BlockId>,
    pub(crate) prev: Option<SequenceId>,
    pub(crate) next: Option<SequenceId>,
    pub(crate) content: SequenceContent,
}

impl InstructionSequence {
    /// The arena token of this sequence.
    #[must_use]
    pub fn token(&self) -> SequenceId {
        self.token
    }

    /// The block currently owning this sequence, if attached.
    #[must_use]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// The previous sibling sequence.
    #[must_use]
    pub fn previous_sequence(&self) -> Option<SequenceId> {
        self.prev
    }

    /// The next sibling sequence.
    #[must_use]
    pub fn next_sequence(&self) -> Option<SequenceId> {
        self.next
    }

    /// The bytes this sequence decodes from.
    #[must_use]
    pub fn content(&self) -> &SequenceContent {
        &self.content
    }

    /// Whether this sequence was rewritten in memory.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        matches!(self.content, SequenceContent::Modified(_))
    }
}

impl MethodBody {
    /// Creates a detached sequence over a `[start, end)` range of the original IL.
    pub fn create_original_sequence(&mut self, start: u32, end: u32) -> SequenceId {
        self.create_sequence(SequenceContent::Original { start, end })
    }

    /// Creates a detached sequence over an in-memory buffer.
    pub fn create_modified_sequence(&mut self, bytes: impl Into<Arc<[u8]>>) -> SequenceId {
        self.create_sequence(SequenceContent::Modified(bytes.into()))
    }

    /// Replaces a sequence's bytes with an in-memory buffer.
    pub fn rewrite_sequence(&mut self, sequence: SequenceId, bytes: impl Into<Arc<[u8]>>) {
        self.sequence_mut(sequence).content = SequenceContent::Modified(bytes.into());
    }

    /// Appends a detached sequence to a block.
    ///
    /// The mutual exclusion invariant applies: a block holding child blocks cannot
    /// also hold instruction sequences.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the sequence is attached or the block
    ///   holds child blocks
    pub fn add_instruction_sequence(
        &mut self,
        block: BlockId,
        sequence: SequenceId,
    ) -> Result<()> {
        self.insert_sequence_after(block, sequence, self.block(block).last_sequence)
    }

    /// Inserts a detached sequence into `block` directly after `reference`, or at
    /// the front when `reference` is `None`.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the sequence is attached, the block
    ///   holds child blocks, or `reference` belongs to another block
    pub fn insert_sequence_after(
        &mut self,
        block: BlockId,
        sequence: SequenceId,
        reference: Option<SequenceId>,
    ) -> Result<()> {
        if self.sequence(sequence).block.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Sequence {sequence:?} is already attached to a block"
            )));
        }
        if self.block(block).first_child.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {block:?} holds child blocks and cannot hold instruction sequences"
            )));
        }
        if let Some(reference) = reference {
            if self.sequence(reference).block != Some(block) {
                return Err(crate::Error::BlockConstraint(format!(
                    "Reference sequence {reference:?} does not belong to block {block:?}"
                )));
            }
        }

        let next = match reference {
            Some(reference) => self.sequence(reference).next,
            None => self.block(block).first_sequence,
        };

        {
            let node = self.sequence_mut(sequence);
            node.block = Some(block);
            node.prev = reference;
            node.next = next;
        }
        match reference {
            Some(reference) => self.sequence_mut(reference).next = Some(sequence),
            None => self.block_mut(block).first_sequence = Some(sequence),
        }
        match next {
            Some(next) => self.sequence_mut(next).prev = Some(sequence),
            None => self.block_mut(block).last_sequence = Some(sequence),
        }
        Ok(())
    }

    /// Detaches a sequence from its owning block in O(1).
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the sequence is not attached
    pub fn detach_sequence(&mut self, sequence: SequenceId) -> Result<()> {
        let (block, prev, next) = {
            let node = self.sequence(sequence);
            match node.block {
                Some(block) => (block, node.prev, node.next),
                None => {
                    return Err(crate::Error::BlockConstraint(format!(
                        "Sequence {sequence:?} is not attached to a block"
                    )))
                }
            }
        };

        match prev {
            Some(prev) => self.sequence_mut(prev).next = next,
            None => self.block_mut(block).first_sequence = next,
        }
        match next {
            Some(next) => self.sequence_mut(next).prev = prev,
            None => self.block_mut(block).last_sequence = prev,
        }

        let node = self.sequence_mut(sequence);
        node.block = None;
        node.prev = None;
        node.next = None;
        Ok(())
    }

    /// Iterates the sequences of a block in sibling order.
    #[must_use]
    pub fn sequences(&self, block: BlockId) -> SequenceIter<'_> {
        SequenceIter {
            body: self,
            next: self.block(block).first_sequence,
        }
    }
}

/// Iterator over the sequences of one block, in order.
pub struct SequenceIter<'a> {
    body: &'a MethodBody,
    next: Option<SequenceId>,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = &'a InstructionSequence;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let node = self.body.sequence(current);
        self.next = node.next;
        Some(node)
    }
}
