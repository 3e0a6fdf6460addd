//! The per-module declaration cache.
//!
//! Every module owns one [`DeclarationCache`] built at module construction. It holds
//! the canonical singletons that the rest of the model relies on being
//! reference-comparable:
//!
//! - one [`TypeSig::Intrinsic`] per primitive kind,
//! - one [`TypeSig::GenericParam`] placeholder per kind and ordinal, preallocated up
//!   to the fixed maximum of [`MAX_GENERIC_PARAMETER_ORDINAL`],
//! - the resolved tokens of well-known provider items, keyed by the closed
//!   [`WellKnownItem`] enum,
//! - a memoized name-to-signature lookup map.

use dashmap::DashMap;
use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::signatures::{GenericParameterKind, IntrinsicKind, TypeSig, TypeSigRc};
use crate::metadata::tables::BindingOptions;
use crate::metadata::token::Token;
use crate::Result;

/// The fixed upper bound (exclusive) for preallocated generic-parameter ordinals.
///
/// This is a hard design limit: requesting an ordinal at or beyond this bound is an
/// error, not a recoverable condition.
pub const MAX_GENERIC_PARAMETER_ORDINAL: usize = 256;

/// The closed set of provider-resolved singleton items a module may need.
///
/// Each variant names one fixed, stateless lookup (for example "find
/// `GetTypeFromHandle` on the platform's reflection type"); the resolved token is
/// memoized per module.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum WellKnownItem {
    /// `System.Type::GetTypeFromHandle(RuntimeTypeHandle)`
    TypeGetTypeFromHandle,
    /// `System.Reflection.MethodBase::GetMethodFromHandle(RuntimeMethodHandle)`
    MethodBaseGetMethodFromHandle,
    /// `System.Reflection.FieldInfo::GetFieldFromHandle(RuntimeFieldHandle)`
    FieldInfoGetFieldFromHandle,
    /// The parameterless `System.Object` constructor
    ObjectConstructor,
}

/// Per-module memoized factory for intrinsic types, generic-parameter placeholders
/// and provider-keyed singleton objects.
pub struct DeclarationCache {
    /// Intrinsic singletons, indexed by `IntrinsicKind` discriminant.
    intrinsics: Vec<TypeSigRc>,
    /// Type-level generic parameter placeholders, indexed by ordinal.
    type_params: Vec<TypeSigRc>,
    /// Method-level generic parameter placeholders, indexed by ordinal.
    method_params: Vec<TypeSigRc>,
    /// Resolved well-known items; only successful resolutions are stored.
    well_known: DashMap<WellKnownItem, Token>,
    /// Memoized name lookups, keyed by full name and binding option bits.
    types_by_name: DashMap<(String, u32), TypeSigRc>,
}

impl DeclarationCache {
    /// Builds a cache with every intrinsic and generic-parameter singleton preloaded.
    #[must_use]
    pub fn new() -> Self {
        let mut intrinsics = Vec::with_capacity(IntrinsicKind::COUNT);
        for kind in IntrinsicKind::iter() {
            intrinsics.push(Arc::new(TypeSig::Intrinsic(kind)));
        }

        let mut type_params = Vec::with_capacity(MAX_GENERIC_PARAMETER_ORDINAL);
        let mut method_params = Vec::with_capacity(MAX_GENERIC_PARAMETER_ORDINAL);
        for ordinal in 0..MAX_GENERIC_PARAMETER_ORDINAL {
            #[allow(clippy::cast_possible_truncation)]
            let ordinal = ordinal as u16;
            type_params.push(Arc::new(TypeSig::GenericParam {
                kind: GenericParameterKind::Type,
                ordinal,
            }));
            method_params.push(Arc::new(TypeSig::GenericParam {
                kind: GenericParameterKind::Method,
                ordinal,
            }));
        }

        DeclarationCache {
            intrinsics,
            type_params,
            method_params,
            well_known: DashMap::new(),
            types_by_name: DashMap::new(),
        }
    }

    /// O(1) lookup of the intrinsic singleton for `kind`. Never fails.
    #[must_use]
    pub fn intrinsic(&self, kind: IntrinsicKind) -> TypeSigRc {
        self.intrinsics[kind as usize].clone()
    }

    /// O(1) lookup of the generic-parameter placeholder singleton.
    ///
    /// The same `(kind, ordinal)` pair always returns the identical object, making
    /// placeholders reference-comparable within one module.
    ///
    /// # Errors
    /// Returns [`crate::Error::GenericParameterBound`] when `ordinal` is at or beyond
    /// [`MAX_GENERIC_PARAMETER_ORDINAL`].
    pub fn generic_parameter(
        &self,
        ordinal: u16,
        kind: GenericParameterKind,
    ) -> Result<TypeSigRc> {
        // Strict bound: ordinal == 256 is already out of range.
        if usize::from(ordinal) >= MAX_GENERIC_PARAMETER_ORDINAL {
            return Err(crate::Error::GenericParameterBound(ordinal));
        }

        let slot = match kind {
            GenericParameterKind::Type => &self.type_params[usize::from(ordinal)],
            GenericParameterKind::Method => &self.method_params[usize::from(ordinal)],
        };
        Ok(slot.clone())
    }

    /// Memoized type lookup by full name and binding options.
    ///
    /// On the first miss the supplied resolver (typically the module's type-finder)
    /// runs and a successful result is cached. A failing resolution is never cached -
    /// re-querying a failing lookup redoes the work every time, which avoids pinning
    /// transient failures.
    ///
    /// # Errors
    /// Propagates the resolver's error on a miss that fails to resolve.
    pub fn type_by_name<F>(
        &self,
        full_name: &str,
        options: BindingOptions,
        resolve: F,
    ) -> Result<TypeSigRc>
    where
        F: FnOnce() -> Result<TypeSigRc>,
    {
        let key = (full_name.to_string(), u32::from(options.bits()));
        if let Some(hit) = self.types_by_name.get(&key) {
            return Ok(hit.clone());
        }

        let resolved = resolve()?;
        self.types_by_name.insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Memoized resolution of a well-known provider item.
    ///
    /// Keyed by the item itself rather than the identity of the resolver, so distinct
    /// call sites share one resolution per module.
    ///
    /// # Errors
    /// Propagates the resolver's error; failures are not cached.
    pub fn well_known<F>(&self, item: WellKnownItem, resolve: F) -> Result<Token>
    where
        F: FnOnce() -> Result<Token>,
    {
        if let Some(hit) = self.well_known.get(&item) {
            return Ok(*hit);
        }

        let token = resolve()?;
        self.well_known.insert(item, token);
        Ok(token)
    }

    /// Empties the memoized name-lookup map.
    ///
    /// The intrinsic, generic-parameter and well-known tables survive a clear.
    pub fn clear(&self) {
        self.types_by_name.clear();
    }
}

impl Default for DeclarationCache {
    fn default() -> Self {
        DeclarationCache::new()
    }
}
