//! The type and method signature model.
//!
//! Signatures are structural descriptions of type and method shapes, independent of any
//! single declaration's token. Every variant of [`TypeSig`] implements one common
//! capability set, exposed on the shared handles through [`TypeSigOps`] and
//! [`MethodSigOps`]:
//!
//! - structural equality at two strengths ([`TypeSig::matches`]) - strict identity for
//!   canonical deduplication, reference matching for binding lookups
//! - generic substitution ([`TypeSigOps::map_generic_arguments`]) with a guaranteed
//!   pointer-equality short-circuit for signatures free of generic parameters
//! - assignability ([`TypeSigOps::is_assignable_to`]) including generic-parameter
//!   constraint rules
//! - cross-module translation ([`TypeSigOps::translate`])
//! - canonical hashing ([`TypeSig::canonical_hash`]) consistent with strict equality
//!
//! The variant set is closed: it mirrors a closed binary format and there is no need
//! for extensibility beyond it.

mod assignable;
mod compare;
mod substitute;
mod translate;
mod types;

pub use assignable::{ConstraintSource, NoConstraints};
pub use compare::SignatureComparison;
pub use types::{
    ArrayDimension, GenericParameterKind, IntrinsicKind, MethodSig, MethodSigRc, NakedTypeOptions,
    NamedTypeKind, TypeSig, TypeSigRc,
};

use crate::metadata::generics::GenericMap;
use crate::metadata::module::CilModule;
use crate::metadata::tables::BindingOptions;
use crate::Result;

/// The cross-cutting capability set of a shared type signature.
///
/// Implemented for [`TypeSigRc`]; the operations that must preserve or compare
/// object identity live here rather than on [`TypeSig`] itself, so they can hand
/// back the receiver's own `Arc` when nothing changed.
pub trait TypeSigOps: Sized {
    /// Strips cosmetic wrappers (pinned markers, custom modifiers) per `options`.
    ///
    /// Identity types return themselves; the stripping recurses through nested
    /// wrappers until a non-wrapper signature is reached.
    #[must_use]
    fn naked(&self, options: NakedTypeOptions) -> &Self;

    /// Applies `map` to this signature, resolving every generic parameter it binds.
    ///
    /// Substitution is total: unbound ordinals resolve to their identity
    /// placeholder and out-of-range ordinals are left untouched rather than
    /// failing. A substituted type specification loses its wrapper - the result is
    /// a new construction that has not been registered as a specification in any
    /// module.
    ///
    /// Returns the receiver `Arc` unchanged (pointer-equal) when nothing was
    /// substituted.
    #[must_use]
    fn map_generic_arguments(&self, map: &GenericMap) -> Self;

    /// Translates this signature into `target`, producing an equivalent signature
    /// valid in a different module of the same logical domain.
    ///
    /// # Errors
    /// Propagates binding failures while re-binding named components in the target
    /// module.
    fn translate(&self, target: &CilModule) -> Result<Self>;

    /// Whether a value of this signature's shape can bind to a slot of `target`'s.
    ///
    /// Both sides are substituted through `map` before comparison. The predicate is
    /// monotonic, so rule evaluation never backtracks.
    #[must_use]
    fn is_assignable_to(
        &self,
        target: &Self,
        map: &GenericMap,
        options: BindingOptions,
        constraints: &dyn ConstraintSource,
    ) -> bool;
}

impl TypeSigOps for TypeSigRc {
    fn naked(&self, options: NakedTypeOptions) -> &TypeSigRc {
        types::naked(self, options)
    }

    fn map_generic_arguments(&self, map: &GenericMap) -> TypeSigRc {
        substitute::map_type_generic_arguments(self, map)
    }

    fn translate(&self, target: &CilModule) -> Result<TypeSigRc> {
        translate::translate_type(self, target)
    }

    fn is_assignable_to(
        &self,
        target: &TypeSigRc,
        map: &GenericMap,
        options: BindingOptions,
        constraints: &dyn ConstraintSource,
    ) -> bool {
        assignable::is_assignable(self, target, map, options, constraints)
    }
}

/// The cross-cutting capability set of a shared method signature.
pub trait MethodSigOps: Sized {
    /// Applies `map` to the return type, parameters and vararg tail.
    ///
    /// Returns the receiver `Arc` unchanged when nothing was substituted.
    #[must_use]
    fn map_generic_arguments(&self, map: &GenericMap) -> Self;

    /// Translates this method signature into `target`, rebuilding the return type,
    /// parameters and vararg tail.
    ///
    /// # Errors
    /// Propagates binding failures while re-binding named components.
    fn translate(&self, target: &CilModule) -> Result<Self>;
}

impl MethodSigOps for MethodSigRc {
    fn map_generic_arguments(&self, map: &GenericMap) -> MethodSigRc {
        substitute::map_method_generic_arguments(self, map)
    }

    fn translate(&self, target: &CilModule) -> Result<MethodSigRc> {
        translate::translate_method(self, target)
    }
}
