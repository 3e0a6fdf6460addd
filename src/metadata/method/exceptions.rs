use crate::metadata::method::block::BlockPosition;
use crate::metadata::method::body::{BlockId, HandlerId, MethodBody};
use crate::metadata::signatures::TypeSigRc;
use crate::Result;

/// The kind of an exception handling clause.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExceptionHandlerKind {
    /// A typed catch clause; requires a catch type and no filter block.
    Catch,
    /// A finally clause, running on every exit path.
    Finally,
    /// A fault clause, running only on exceptional exit.
    Fault,
    /// A filter clause; requires a filter block and no catch type.
    Filter,
}

/// Which role a block plays in an exception handler.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandlerRole {
    /// The block is the handler body.
    Handler,
    /// The block is the filter body.
    Filter,
}

/// An exception handler attached to a protected block.
///
/// The protected region is the block the handler is attached to; the handler (and
/// filter) bodies live at the same nesting level as what they protect, by
/// construction of the binary format.
#[derive(Debug)]
pub struct ExceptionHandler {
    pub(crate) token: HandlerId,
    pub(crate) kind: ExceptionHandlerKind,
    pub(crate) protected: BlockId,
    pub(crate) handler: BlockId,
    pub(crate) filter: Option<BlockId>,
    pub(crate) catch_type: Option<TypeSigRc>,
}

impl ExceptionHandler {
    /// The arena token of this handler.
    #[must_use]
    pub fn token(&self) -> HandlerId {
        self.token
    }

    /// The clause kind.
    #[must_use]
    pub fn kind(&self) -> ExceptionHandlerKind {
        self.kind
    }

    /// The protected block.
    #[must_use]
    pub fn protected_block(&self) -> BlockId {
        self.protected
    }

    /// The handler body block.
    #[must_use]
    pub fn handler_block(&self) -> BlockId {
        self.handler
    }

    /// The filter body block, for [`ExceptionHandlerKind::Filter`] clauses.
    #[must_use]
    pub fn filter_block(&self) -> Option<BlockId> {
        self.filter
    }

    /// The caught exception type, for [`ExceptionHandlerKind::Catch`] clauses.
    #[must_use]
    pub fn catch_type(&self) -> Option<&TypeSigRc> {
        self.catch_type.as_ref()
    }
}

impl MethodBody {
    /// Attaches a typed catch handler to `protected`.
    ///
    /// # Errors
    /// See [`MethodBody::attach_handler`] for the validation rules.
    pub fn add_exception_handler_catch(
        &mut self,
        protected: BlockId,
        handler: BlockId,
        catch_type: TypeSigRc,
    ) -> Result<HandlerId> {
        self.attach_handler(
            ExceptionHandlerKind::Catch,
            protected,
            handler,
            None,
            Some(catch_type),
        )
    }

    /// Attaches a finally handler to `protected`.
    ///
    /// # Errors
    /// See [`MethodBody::attach_handler`] for the validation rules.
    pub fn add_exception_handler_finally(
        &mut self,
        protected: BlockId,
        handler: BlockId,
    ) -> Result<HandlerId> {
        self.attach_handler(ExceptionHandlerKind::Finally, protected, handler, None, None)
    }

    /// Attaches a fault handler to `protected`.
    ///
    /// # Errors
    /// See [`MethodBody::attach_handler`] for the validation rules.
    pub fn add_exception_handler_fault(
        &mut self,
        protected: BlockId,
        handler: BlockId,
    ) -> Result<HandlerId> {
        self.attach_handler(ExceptionHandlerKind::Fault, protected, handler, None, None)
    }

    /// Attaches a filter handler to `protected`.
    ///
    /// # Errors
    /// See [`MethodBody::attach_handler`] for the validation rules.
    pub fn add_exception_handler_filter(
        &mut self,
        protected: BlockId,
        handler: BlockId,
        filter: BlockId,
    ) -> Result<HandlerId> {
        self.attach_handler(
            ExceptionHandlerKind::Filter,
            protected,
            handler,
            Some(filter),
            None,
        )
    }

    /// Validates and records an exception handler.
    ///
    /// The protected block must be attached; handler and filter bodies must be
    /// siblings of the protected block - a still-parentless body is auto-attached
    /// at that level, directly after the protected block.
    ///
    /// # Errors
    /// - [`crate::Error::BlockConstraint`] when the protected block has no parent,
    ///   a body block is already serving another handler, or a body block sits at a
    ///   different nesting level
    fn attach_handler(
        &mut self,
        kind: ExceptionHandlerKind,
        protected: BlockId,
        handler: BlockId,
        filter: Option<BlockId>,
        catch_type: Option<TypeSigRc>,
    ) -> Result<HandlerId> {
        let parent = self.block(protected).parent.ok_or_else(|| {
            crate::Error::BlockConstraint(format!(
                "Protected block {protected:?} has no parent; a handler body cannot be its sibling"
            ))
        })?;

        self.adopt_handler_body(parent, protected, handler)?;
        if let Some(filter) = filter {
            self.adopt_handler_body(parent, protected, filter)?;
        }

        #[allow(clippy::cast_possible_truncation)]
        let token = HandlerId(self.handlers.len() as u32);
        self.handlers.push(ExceptionHandler {
            token,
            kind,
            protected,
            handler,
            filter,
            catch_type,
        });

        self.block_mut(handler).handler_role = Some((token, HandlerRole::Handler));
        if let Some(filter) = filter {
            self.block_mut(filter).handler_role = Some((token, HandlerRole::Filter));
        }
        self.block_mut(protected).handlers.push(token);
        Ok(token)
    }

    fn adopt_handler_body(
        &mut self,
        parent: BlockId,
        protected: BlockId,
        body_block: BlockId,
    ) -> Result<()> {
        if self.block(body_block).handler_role.is_some() {
            return Err(crate::Error::BlockConstraint(format!(
                "Block {body_block:?} already serves an exception handler"
            )));
        }
        match self.block(body_block).parent {
            None => self.add_child_block(
                parent,
                body_block,
                BlockPosition::After,
                Some(protected),
            ),
            Some(existing) if existing == parent => Ok(()),
            Some(_) => Err(crate::Error::BlockConstraint(format!(
                "Handler body {body_block:?} is not a sibling of the protected block {protected:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::metadata::signatures::{IntrinsicKind, TypeSig};

    fn body_with_protected() -> (MethodBody, BlockId, BlockId) {
        let mut body = MethodBody::new("demo");
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let protected = body.create_block();
        body.add_child_block(root, protected, BlockPosition::After, None)
            .unwrap();
        (body, root, protected)
    }

    #[test]
    fn catch_handler_auto_attaches_body() {
        let (mut body, root, protected) = body_with_protected();
        let handler_block = body.create_block();
        let exception_type = Arc::new(TypeSig::Intrinsic(IntrinsicKind::Object));

        let handler = body
            .add_exception_handler_catch(protected, handler_block, exception_type)
            .unwrap();

        // The body was adopted as a sibling of the protected block.
        assert_eq!(body.block(handler_block).parent(), Some(root));
        let clause = body.handler(handler);
        assert_eq!(clause.kind(), ExceptionHandlerKind::Catch);
        assert_eq!(clause.protected_block(), protected);
        assert!(clause.catch_type().is_some());
        assert!(clause.filter_block().is_none());

        // Back-reference set.
        assert_eq!(
            body.block(handler_block).is_exception_handler(),
            Some((handler, HandlerRole::Handler))
        );
        assert_eq!(body.block(protected).exception_handlers(), &[handler]);
    }

    #[test]
    fn filter_handler_records_filter_block() {
        let (mut body, _root, protected) = body_with_protected();
        let handler_block = body.create_block();
        let filter_block = body.create_block();

        let handler = body
            .add_exception_handler_filter(protected, handler_block, filter_block)
            .unwrap();

        let clause = body.handler(handler);
        assert_eq!(clause.kind(), ExceptionHandlerKind::Filter);
        assert_eq!(clause.filter_block(), Some(filter_block));
        assert!(clause.catch_type().is_none());
        assert_eq!(
            body.block(filter_block).is_exception_handler(),
            Some((handler, HandlerRole::Filter))
        );
    }

    #[test]
    fn handler_body_at_wrong_level_is_rejected() {
        let (mut body, root, protected) = body_with_protected();
        let elsewhere = body.create_block();
        body.add_child_block(root, elsewhere, BlockPosition::After, None)
            .unwrap();
        let misplaced = body.create_block();
        body.add_child_block(elsewhere, misplaced, BlockPosition::After, None)
            .unwrap();

        let result = body.add_exception_handler_finally(protected, misplaced);
        assert!(matches!(result, Err(crate::Error::BlockConstraint(_))));
    }

    #[test]
    fn protected_root_is_rejected() {
        let mut body = MethodBody::new("demo");
        let root = body.create_block();
        body.set_root_block(root).unwrap();
        let handler_block = body.create_block();

        let result = body.add_exception_handler_finally(root, handler_block);
        assert!(matches!(result, Err(crate::Error::BlockConstraint(_))));
    }

    #[test]
    fn handler_body_cannot_be_detached() {
        let (mut body, _root, protected) = body_with_protected();
        let handler_block = body.create_block();
        body.add_exception_handler_finally(protected, handler_block)
            .unwrap();

        assert!(matches!(
            body.detach_block(handler_block),
            Err(crate::Error::BlockConstraint(_))
        ));
    }

    #[test]
    fn handler_body_cannot_serve_twice() {
        let (mut body, _root, protected) = body_with_protected();
        let handler_block = body.create_block();
        body.add_exception_handler_finally(protected, handler_block)
            .unwrap();

        let result = body.add_exception_handler_fault(protected, handler_block);
        assert!(matches!(result, Err(crate::Error::BlockConstraint(_))));
    }

    #[test]
    fn nest_repoints_protected_region() {
        let (mut body, _root, protected) = body_with_protected();
        let handler_block = body.create_block();
        let handler = body
            .add_exception_handler_finally(protected, handler_block)
            .unwrap();

        let wrapper = body.nest(protected).unwrap();
        assert_eq!(body.handler(handler).protected_block(), wrapper);
        assert!(body.block(protected).exception_handlers().is_empty());
        assert_eq!(body.block(wrapper).exception_handlers(), &[handler]);
    }
}
