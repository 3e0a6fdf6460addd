//! The generic substitution algebra.
//!
//! A [`GenericMap`] is an immutable pair of ordered substitution lists - one for
//! type-level generic parameters, one for method-level ones - optionally chained to a
//! parent map for nested generic contexts. Substitution through
//! [`crate::metadata::signatures::TypeSigOps::map_generic_arguments`] is *total*: an
//! ordinal with no binding resolves to its identity placeholder instead of failing,
//! which is essential for partially-instantiated contexts.

use std::sync::Arc;

use crate::metadata::cache::DeclarationCache;
use crate::metadata::signatures::{GenericParameterKind, TypeSig, TypeSigRc};
use crate::Result;

/// An immutable substitution table for generic parameters.
///
/// The empty map acts as the identity element: every lookup falls through to the
/// module's preallocated placeholder singletons, so substituting through it leaves any
/// signature strictly equal to itself.
#[derive(Debug, Clone, Default)]
pub struct GenericMap {
    type_args: Vec<TypeSigRc>,
    method_args: Vec<TypeSigRc>,
    parent: Option<Arc<GenericMap>>,
}

impl GenericMap {
    /// The identity map: no substitutions at either level.
    #[must_use]
    pub fn identity() -> GenericMap {
        GenericMap::default()
    }

    /// Creates a map from explicit type-argument and method-argument lists.
    #[must_use]
    pub fn new(type_args: Vec<TypeSigRc>, method_args: Vec<TypeSigRc>) -> GenericMap {
        GenericMap {
            type_args,
            method_args,
            parent: None,
        }
    }

    /// Chains a child argument list onto a parent map for a nested generic context.
    #[must_use]
    pub fn with_parent(
        parent: Arc<GenericMap>,
        type_args: Vec<TypeSigRc>,
        method_args: Vec<TypeSigRc>,
    ) -> GenericMap {
        GenericMap {
            type_args,
            method_args,
            parent: Some(parent),
        }
    }

    /// Returns a map with the method-argument component stripped at every level.
    ///
    /// Used for contexts that must not leak method generics into a type-only
    /// position.
    #[must_use]
    pub fn type_context(&self) -> GenericMap {
        GenericMap {
            type_args: self.type_args.clone(),
            method_args: Vec::new(),
            parent: self
                .parent
                .as_ref()
                .map(|parent| Arc::new(parent.type_context())),
        }
    }

    /// Whether this map (including its parent chain) holds no substitutions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_args.is_empty()
            && self.method_args.is_empty()
            && self.parent.as_ref().map_or(true, |parent| parent.is_empty())
    }

    /// Looks up the substitution for an ordinal, consulting the parent chain.
    ///
    /// Returns `None` when the ordinal is unbound at every level; substitution
    /// treats that as identity.
    #[must_use]
    pub fn get(&self, kind: GenericParameterKind, ordinal: u16) -> Option<TypeSigRc> {
        let local = match kind {
            GenericParameterKind::Type => &self.type_args,
            GenericParameterKind::Method => &self.method_args,
        };
        if let Some(sig) = local.get(ordinal as usize) {
            return Some(sig.clone());
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.get(kind, ordinal))
    }

    /// Resolves an ordinal to its substitution or, when unbound, to the module's
    /// identity placeholder singleton.
    ///
    /// # Errors
    /// Fails only when the ordinal exceeds the fixed placeholder bound of the
    /// declaration cache.
    pub fn generic_parameter(
        &self,
        kind: GenericParameterKind,
        ordinal: u16,
        cache: &DeclarationCache,
    ) -> Result<TypeSigRc> {
        match self.get(kind, ordinal) {
            Some(sig) => Ok(sig),
            None => cache.generic_parameter(ordinal, kind),
        }
    }
}

impl TypeSig {
    /// Whether this signature mentions any generic parameter, at any depth.
    ///
    /// Substitution callers rely on this to detect signatures that substitution
    /// provably leaves untouched.
    #[must_use]
    pub fn references_generic_arguments(&self) -> bool {
        match self {
            TypeSig::GenericParam { .. } => true,
            TypeSig::Intrinsic(_) | TypeSig::Named { .. } => false,
            TypeSig::Spec { inner, .. } | TypeSig::Pinned(inner) => {
                inner.references_generic_arguments()
            }
            TypeSig::Modified {
                modifier, inner, ..
            } => modifier.references_generic_arguments() || inner.references_generic_arguments(),
            TypeSig::GenericInst { definition, args } => {
                definition.references_generic_arguments()
                    || args.iter().any(|arg| arg.references_generic_arguments())
            }
            TypeSig::Array { element, .. } => element.references_generic_arguments(),
            TypeSig::Pointer { element, .. } => element.references_generic_arguments(),
            TypeSig::FnPtr(sig) => sig.references_generic_arguments(),
        }
    }
}

impl crate::metadata::signatures::MethodSig {
    /// Whether any component of this method signature mentions a generic parameter.
    ///
    /// The logical OR over the return type, the fixed parameters and - if the
    /// calling convention is vararg - the variable parameters.
    #[must_use]
    pub fn references_generic_arguments(&self) -> bool {
        self.return_type.references_generic_arguments()
            || self
                .params
                .iter()
                .any(|param| param.references_generic_arguments())
            || (self.vararg
                && self
                    .varargs
                    .iter()
                    .any(|vararg| vararg.references_generic_arguments()))
    }
}
