use crate::metadata::method::body::{BlockId, HandlerId, MethodBody, SequenceId};
use crate::metadata::method::exceptions::HandlerRole;
use crate::metadata::method::symbols::LocalVariableSymbol;
use crate::Result;

/// Placement of a block relative to a reference sibling.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockPosition {
    /// Insert before the reference sibling (or at the front without one).
    Before,
    /// Insert after the reference sibling (or at the end without one).
    After,
}

/// Classification of one block's binary offset range against a queried range.
///
/// Pure interval arithmetic, used only while building the block tree from the raw
/// exception-handler and lexical-scope clause offsets of the binary format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RangeRelation {
    /// The ranges are identical.
    IsEqual,
    /// The block's range strictly contains the queried range.
    Contains,
    /// The block's range is strictly contained in the queried range.
    IsContained,
    /// The ranges overlap without containment.
    Intersects,
    /// The ranges do not overlap.
    IsDisjoint,
}

/// A node in the strictly-binary-partitioned lexical tree of a method body.
///
/// A block owns EITHER a list of child blocks OR a list of instruction sequences,
/// never both; the invariant is enforced on every mutation. Parent and sibling
/// links are weak back-references over arena tokens - the arena owns the lifetime.
#[derive(Debug)]
pub struct InstructionBlock {
    pub(crate) token: BlockId,
    pub(crate) parent: Option<BlockId>,
    pub(crate) prev_sibling: Option<BlockId>,
    pub(crate) next_sibling: Option<BlockId>,
    pub(crate) first_child: Option<BlockId>,
    pub(crate) last_child: Option<BlockId>,
    pub(crate) first_sequence: Option<SequenceId>,
    pub(crate) last_sequence: Option<SequenceId>,
    /// Binary provenance, retained after construction but never consulted again.
    pub(crate) start_offset: u32,
    pub(crate) end_offset: u32,
    pub(crate) locals: Vec<LocalVariableSymbol>,
    /// Handlers whose protected region is this block.
    pub(crate) handlers: Vec<HandlerId>,
    /// Set while this block is the handler or filter body of an exception handler.
    pub(crate) handler_role: Option<(HandlerId, HandlerRole)>,
}

impl InstructionBlock {
    pub(crate) fn new(token: BlockId, start_offset: u32, end_offset: u32) -> Self {
        InstructionBlock {
            token,
            parent: None,
            prev_sibling: None,
            next_sibling: None,
            first_child: None,
            last_child: None,
            first_sequence: None,
            last_sequence: None,
            start_offset,
            end_offset,
            locals: Vec::new(),
            handlers: Vec::new(),
            handler_role: None,
        }
    }

    /// The arena token of this block.
    #[must_use]
    pub fn token(&self) -> BlockId {
        self.token
    }

    /// The parent block, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// The binary offset this block starts at (provenance only).
    #[must_use]
    pub fn start_offset(&self) -> u32 {
        self.start_offset
    }

    /// The binary offset this block ends before (provenance only).
    #[must_use]
    pub fn end_offset(&self) -> u32 {
        self.end_offset
    }

    /// Whether the block currently holds child blocks.
    #[must_use]
    pub fn has_children_blocks(&self) -> bool {
        self.first_child.is_some()
    }

    /// Whether the block currently holds instruction sequences.
    #[must_use]
    pub fn has_instruction_sequences(&self) -> bool {
        self.first_sequence.is_some()
    }

    /// The local-variable symbols declared at this lexical level.
    #[must_use]
    pub fn locals(&self) -> &[LocalVariableSymbol] {
        &self.locals
    }

    /// The handlers whose protected region is this block.
    #[must_use]
    pub fn exception_handlers(&self) -> &[HandlerId] {
        &self.handlers
    }

    /// The handler this block serves as handler or filter body for, if any.
    #[must_use]
    pub fn is_exception_handler(&self) -> Option<(HandlerId, HandlerRole)> {
        self.handler_role
    }

    /// Classifies this block's `[start, end)` range against a queried range.
    #[must_use]
    pub fn compares(&self, start_offset: u32, end_offset: u32) -> RangeRelation {
        let (a, b) = (self.start_offset, self.end_offset);
        let (c, d) = (start_offset, end_offset);

        if a == c && b == d {
            RangeRelation::IsEqual
        } else if a <= c && d <= b {
            RangeRelation::Contains
        } else if c <= a && b <= d {
            RangeRelation::IsContained
        } else if b <= c || d <= a {
            RangeRelation::IsDisjoint
        } else {
            RangeRelation::Intersects
        }
    }
}

impl MethodBody {
    /// Attaches a parentless block as a child of `parent`, positioned relative to
    /// `reference` (or at the matching end when `reference` is `None`).
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if `child` already has a parent, if
    ///   `parent` holds instruction sequences, or if `reference` is not a child of
    ///   `parent`
    pub fn add_child_block(
        &mut self,
        parent: BlockId,
        child: BlockId,
        position: BlockPosition,
        reference: Option<BlockId>,
    ) -> Result<()> {
        if self.block(child).parent.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {child:?} already has a parent"
            )));
        }
        if self.block(parent).has_instruction_sequences() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {parent:?} holds instruction sequences and cannot hold child blocks"
            )));
        }
        if let Some(reference) = reference {
            if self.block(reference).parent != Some(parent) {
                return Err(crate::Error::BlockConstraint(format!(
                    "Reference block {reference:?} is not a child of {parent:?}"
                )));
            }
        }

        // Resolve the neighbors of the insertion point.
        let (prev, next) = match (position, reference) {
            (BlockPosition::Before, Some(reference)) => {
                (self.block(reference).prev_sibling, Some(reference))
            }
            (BlockPosition::After, Some(reference)) => {
                (Some(reference), self.block(reference).next_sibling)
            }
            (BlockPosition::Before, None) => (None, self.block(parent).first_child),
            (BlockPosition::After, None) => (self.block(parent).last_child, None),
        };

        {
            let node = self.block_mut(child);
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = next;
        }
        match prev {
            Some(prev) => self.block_mut(prev).next_sibling = Some(child),
            None => self.block_mut(parent).first_child = Some(child),
        }
        match next {
            Some(next) => self.block_mut(next).prev_sibling = Some(child),
            None => self.block_mut(parent).last_child = Some(child),
        }
        Ok(())
    }

    /// Detaches a block from its parent.
    ///
    /// A block serving as handler or filter body of an exception handler can only be
    /// moved as part of moving the owning handler, never detached directly.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the block has no parent or is a
    ///   handler/filter body
    pub fn detach_block(&mut self, block: BlockId) -> Result<()> {
        if self.block(block).handler_role.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {block:?} is the body of an exception handler and cannot be detached"
            )));
        }
        let (parent, prev, next) = {
            let node = self.block(block);
            match node.parent {
                Some(parent) => (parent, node.prev_sibling, node.next_sibling),
                None => {
                    return Err(crate::Error::BlockConstraint(format!(
                        "Block {block:?} has no parent to detach from"
                    )))
                }
            }
        };

        match prev {
            Some(prev) => self.block_mut(prev).next_sibling = next,
            None => self.block_mut(parent).first_child = next,
        }
        match next {
            Some(next) => self.block_mut(next).prev_sibling = prev,
            None => self.block_mut(parent).last_child = prev,
        }

        let node = self.block_mut(block);
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        Ok(())
    }

    /// Inserts a new intermediate parent between a block and its current parent.
    ///
    /// The block's local-variable symbols and exception handlers transfer to the
    /// new parent: both are associated with lexical position, and nesting changes
    /// what "this level" means. Sibling ordering is undisturbed. Nesting the root
    /// re-roots the body at the new parent.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the block is a handler/filter body
    pub fn nest(&mut self, block: BlockId) -> Result<BlockId> {
        if self.block(block).handler_role.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {block:?} is the body of an exception handler and cannot be nested"
            )));
        }

        let (start, end) = {
            let node = self.block(block);
            (node.start_offset, node.end_offset)
        };
        let wrapper = self.create_block_spanning(start, end);

        let (parent, prev, next) = {
            let node = self.block(block);
            (node.parent, node.prev_sibling, node.next_sibling)
        };

        // Take the block's exact place in its sibling list.
        {
            let node = self.block_mut(wrapper);
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = next;
        }
        if let Some(parent) = parent {
            match prev {
                Some(prev) => self.block_mut(prev).next_sibling = Some(wrapper),
                None => self.block_mut(parent).first_child = Some(wrapper),
            }
            match next {
                Some(next) => self.block_mut(next).prev_sibling = Some(wrapper),
                None => self.block_mut(parent).last_child = Some(wrapper),
            }
        }
        if self.root == Some(block) {
            self.root = Some(wrapper);
        }

        // Reparent the block under the wrapper.
        {
            let node = self.block_mut(block);
            node.parent = Some(wrapper);
            node.prev_sibling = None;
            node.next_sibling = None;
        }
        {
            let node = self.block_mut(wrapper);
            node.first_child = Some(block);
            node.last_child = Some(block);
        }

        // Lexical state moves up to the new level.
        let locals = std::mem::take(&mut self.block_mut(block).locals);
        let handlers = std::mem::take(&mut self.block_mut(block).handlers);
        for &handler in &handlers {
            self.handler_mut(handler).protected = wrapper;
        }
        let node = self.block_mut(wrapper);
        node.locals = locals;
        node.handlers = handlers;

        Ok(wrapper)
    }

    /// Finds the deepest common ancestor of two blocks.
    ///
    /// Walks both ancestor chains to the root into two explicit stacks and pops in
    /// lockstep while they agree; returns `None` when the roots already differ.
    #[must_use]
    pub fn find_common_ancestor(&self, a: BlockId, b: BlockId) -> Option<BlockId> {
        let mut stack_a = self.ancestors_to_root(a);
        let mut stack_b = self.ancestors_to_root(b);

        let mut common = None;
        while let (Some(from_a), Some(from_b)) = (stack_a.pop(), stack_b.pop()) {
            if from_a != from_b {
                break;
            }
            common = Some(from_a);
        }
        common
    }

    pub(crate) fn ancestors_to_root(&self, block: BlockId) -> Vec<BlockId> {
        let mut chain = vec![block];
        let mut current = block;
        while let Some(parent) = self.block(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Splits a block after one of its sequences.
    ///
    /// Creates a new sibling block directly after the owner and moves every
    /// sequence strictly after `sequence` (in original order) into it, leaving
    /// `sequence` and everything before it in place. Supports inserting new branch
    /// targets mid-block.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] if the sequence is unattached or its
    ///   block is the root (the root cannot gain a sibling)
    pub fn split_block_after_sequence(&mut self, sequence: SequenceId) -> Result<BlockId> {
        let block = self.sequence(sequence).block.ok_or_else(|| {
            crate::Error::BlockConstraint(format!(
                "Sequence {sequence:?} is not attached to a block"
            ))
        })?;
        let Some(parent) = self.block(block).parent else {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {block:?} is the root and cannot be split"
            )));
        };

        let end = self.block(block).end_offset;
        let sibling = self.create_block_spanning(end, end);
        self.add_child_block(parent, sibling, BlockPosition::After, Some(block))?;

        // Move the tail, preserving order.
        let mut cursor = self.sequence(sequence).next;
        while let Some(moving) = cursor {
            let after = self.sequence(moving).next;
            self.detach_sequence(moving)?;
            self.add_instruction_sequence(sibling, moving)?;
            cursor = after;
        }
        Ok(sibling)
    }

    /// Iterates the children of a block in sibling order.
    #[must_use]
    pub fn child_blocks(&self, block: BlockId) -> BlockChildren<'_> {
        BlockChildren {
            body: self,
            next: self.block(block).first_child,
        }
    }
}

/// Iterator over the children of one block, in order.
pub struct BlockChildren<'a> {
    body: &'a MethodBody,
    next: Option<BlockId>,
}

impl<'a> Iterator for BlockChildren<'a> {
    type Item = &'a InstructionBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let node = self.body.block(current);
        self.next = node.next_sibling;
        Some(node)
    }
}
