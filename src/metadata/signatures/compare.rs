//! Structural equality and canonical hashing for signatures.
//!
//! Equality has two strengths. *Strict* comparison is full structural identity and is
//! the basis of canonical deduplication; it compares pinned markers and custom
//! modifiers. *Reference* matching is the relaxed form used by binding lookups: it
//! ignores detail that does not affect call-site compatibility.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::metadata::signatures::types::{ArrayDimension, MethodSig, TypeSig};

/// The strength of a structural signature comparison.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SignatureComparison {
    /// Full structural identity, including pinning and custom modifiers.
    Strict,
    /// Binding compatibility; cosmetic wrappers are ignored.
    Reference,
}

/// Compares two dimension lists, treating missing trailing entries as unbounded.
///
/// Rank-1 shorthand arrays carry an empty dimension list and must compare equal to an
/// explicit single-entry list of unbounded dimensions.
fn dimensions_match(rank: u32, a: &[ArrayDimension], b: &[ArrayDimension]) -> bool {
    let unbounded = ArrayDimension::default();
    for i in 0..rank as usize {
        let lhs = a.get(i).unwrap_or(&unbounded);
        let rhs = b.get(i).unwrap_or(&unbounded);
        if lhs != rhs {
            return false;
        }
    }
    true
}

impl TypeSig {
    /// Structural comparison at the requested strength.
    ///
    /// Strict comparison is an equivalence relation consistent with
    /// [`TypeSig::canonical_hash`]; reference matching additionally identifies
    /// signatures that differ only in pinning or custom modifiers.
    #[must_use]
    pub fn matches(&self, other: &TypeSig, comparison: SignatureComparison) -> bool {
        if comparison == SignatureComparison::Reference {
            // Cosmetic wrappers never affect call-site compatibility.
            let lhs = reference_view(self);
            let rhs = reference_view(other);
            if !std::ptr::eq(lhs, self) || !std::ptr::eq(rhs, other) {
                return lhs.matches(rhs, comparison);
            }
        }

        match (self, other) {
            (TypeSig::Intrinsic(a), TypeSig::Intrinsic(b)) => a == b,
            (
                TypeSig::Named {
                    kind: ak,
                    namespace: ans,
                    name: an,
                    value_type: av,
                    ..
                },
                TypeSig::Named {
                    kind: bk,
                    namespace: bns,
                    name: bn,
                    value_type: bv,
                    ..
                },
            ) => {
                let names_match = ans == bns && an == bn && av == bv;
                match comparison {
                    SignatureComparison::Strict => names_match && ak == bk,
                    SignatureComparison::Reference => names_match,
                }
            }
            (TypeSig::Spec { inner: a, .. }, TypeSig::Spec { inner: b, .. }) => {
                a.matches(b, comparison)
            }
            // A specification is transparent for binding purposes.
            (TypeSig::Spec { inner, .. }, _) if comparison == SignatureComparison::Reference => {
                inner.matches(other, comparison)
            }
            (_, TypeSig::Spec { inner, .. }) if comparison == SignatureComparison::Reference => {
                self.matches(inner, comparison)
            }
            (
                TypeSig::GenericParam {
                    kind: ak,
                    ordinal: ao,
                },
                TypeSig::GenericParam {
                    kind: bk,
                    ordinal: bo,
                },
            ) => ak == bk && ao == bo,
            (
                TypeSig::GenericInst {
                    definition: ad,
                    args: aa,
                },
                TypeSig::GenericInst {
                    definition: bd,
                    args: ba,
                },
            ) => {
                ad.matches(bd, comparison)
                    && aa.len() == ba.len()
                    && aa.iter().zip(ba).all(|(x, y)| x.matches(y, comparison))
            }
            (
                TypeSig::Array {
                    element: ae,
                    rank: ar,
                    dimensions: ad,
                },
                TypeSig::Array {
                    element: be,
                    rank: br,
                    dimensions: bd,
                },
            ) => ar == br && dimensions_match(*ar, ad, bd) && ae.matches(be, comparison),
            (
                TypeSig::Pointer {
                    element: ae,
                    by_ref: ab,
                },
                TypeSig::Pointer {
                    element: be,
                    by_ref: bb,
                },
            ) => ab == bb && ae.matches(be, comparison),
            (TypeSig::Pinned(a), TypeSig::Pinned(b)) => a.matches(b, comparison),
            (
                TypeSig::Modified {
                    required: ar,
                    modifier: am,
                    inner: ai,
                },
                TypeSig::Modified {
                    required: br,
                    modifier: bm,
                    inner: bi,
                },
            ) => ar == br && am.matches(bm, comparison) && ai.matches(bi, comparison),
            (TypeSig::FnPtr(a), TypeSig::FnPtr(b)) => a.matches(b, comparison),
            _ => false,
        }
    }

    /// A hash of the structural identity of this signature.
    ///
    /// Consistent with strict equality: strictly equal signatures hash to the same
    /// value. Used by the type-spec and method-spec deduplication indices.
    #[must_use]
    pub fn canonical_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, hasher: &mut impl Hasher) {
        std::mem::discriminant(self).hash(hasher);
        match self {
            TypeSig::Intrinsic(kind) => kind.hash(hasher),
            TypeSig::Named {
                kind,
                namespace,
                name,
                value_type,
                ..
            } => {
                kind.hash(hasher);
                namespace.hash(hasher);
                name.hash(hasher);
                value_type.hash(hasher);
            }
            TypeSig::Spec { inner, .. } => inner.hash_into(hasher),
            TypeSig::GenericParam { kind, ordinal } => {
                kind.hash(hasher);
                ordinal.hash(hasher);
            }
            TypeSig::GenericInst { definition, args } => {
                definition.hash_into(hasher);
                args.len().hash(hasher);
                for arg in args {
                    arg.hash_into(hasher);
                }
            }
            TypeSig::Array {
                element,
                rank,
                dimensions,
            } => {
                rank.hash(hasher);
                // Trailing unbounded dimensions are identity-neutral so the rank-1
                // shorthand hashes like its explicit form.
                let unbounded = ArrayDimension::default();
                for i in 0..*rank as usize {
                    dimensions.get(i).unwrap_or(&unbounded).hash(hasher);
                }
                element.hash_into(hasher);
            }
            TypeSig::Pointer { element, by_ref } => {
                by_ref.hash(hasher);
                element.hash_into(hasher);
            }
            TypeSig::Pinned(inner) => inner.hash_into(hasher),
            TypeSig::Modified {
                required,
                modifier,
                inner,
            } => {
                required.hash(hasher);
                modifier.hash_into(hasher);
                inner.hash_into(hasher);
            }
            TypeSig::FnPtr(sig) => sig.hash_into(hasher),
        }
    }
}

/// Strips cosmetic wrappers for reference-strength comparison.
fn reference_view(sig: &TypeSig) -> &TypeSig {
    match sig {
        TypeSig::Pinned(inner) => reference_view(inner),
        TypeSig::Modified { inner, .. } => reference_view(inner),
        _ => sig,
    }
}

impl PartialEq for TypeSig {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other, SignatureComparison::Strict)
    }
}

impl Eq for TypeSig {}

impl MethodSig {
    /// Structural comparison at the requested strength.
    #[must_use]
    pub fn matches(&self, other: &MethodSig, comparison: SignatureComparison) -> bool {
        self.has_this == other.has_this
            && self.explicit_this == other.explicit_this
            && self.vararg == other.vararg
            && self.generic_arity == other.generic_arity
            && self.return_type.matches(&other.return_type, comparison)
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.matches(b, comparison))
            && self.varargs.len() == other.varargs.len()
            && self
                .varargs
                .iter()
                .zip(&other.varargs)
                .all(|(a, b)| a.matches(b, comparison))
    }

    /// A hash of the structural identity of this signature, consistent with strict
    /// equality.
    #[must_use]
    pub fn canonical_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into(&self, hasher: &mut impl Hasher) {
        self.has_this.hash(hasher);
        self.explicit_this.hash(hasher);
        self.vararg.hash(hasher);
        self.generic_arity.hash(hasher);
        self.return_type.hash_into(hasher);
        self.params.len().hash(hasher);
        for param in &self.params {
            param.hash_into(hasher);
        }
        for vararg in &self.varargs {
            vararg.hash_into(hasher);
        }
    }
}

impl PartialEq for MethodSig {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other, SignatureComparison::Strict)
    }
}

impl Eq for MethodSig {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::signatures::types::{IntrinsicKind, NamedTypeKind, TypeSigRc};
    use crate::metadata::token::Token;

    fn int32() -> TypeSigRc {
        Arc::new(TypeSig::Intrinsic(IntrinsicKind::I4))
    }

    fn named(kind: NamedTypeKind, token: u32, name: &str) -> TypeSig {
        TypeSig::Named {
            kind,
            token: Token::new(token),
            namespace: "System".into(),
            name: name.into(),
            value_type: false,
        }
    }

    #[test]
    fn intrinsics_compare_by_kind() {
        let a = TypeSig::Intrinsic(IntrinsicKind::I4);
        let b = TypeSig::Intrinsic(IntrinsicKind::I4);
        let c = TypeSig::Intrinsic(IntrinsicKind::I8);

        assert!(a.matches(&b, SignatureComparison::Strict));
        assert!(!a.matches(&c, SignatureComparison::Strict));
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn named_ignores_token_compares_names() {
        let a = named(NamedTypeKind::Definition, 0x02000001, "Uri");
        let b = named(NamedTypeKind::Definition, 0x02000007, "Uri");
        assert!(a.matches(&b, SignatureComparison::Strict));
        assert_eq!(a.canonical_hash(), b.canonical_hash());
    }

    #[test]
    fn named_def_vs_ref_strict_and_reference() {
        let def = named(NamedTypeKind::Definition, 0x02000001, "Uri");
        let reference = named(NamedTypeKind::Reference, 0x01000001, "Uri");

        assert!(!def.matches(&reference, SignatureComparison::Strict));
        assert!(def.matches(&reference, SignatureComparison::Reference));
    }

    #[test]
    fn pinned_ignored_by_reference_matching() {
        let plain = int32();
        let pinned = TypeSig::Pinned(plain.clone());

        assert!(!pinned.matches(&plain, SignatureComparison::Strict));
        assert!(pinned.matches(&plain, SignatureComparison::Reference));
    }

    #[test]
    fn modifiers_ignored_by_reference_matching() {
        let plain = int32();
        let modified = TypeSig::Modified {
            required: false,
            modifier: Arc::new(named(NamedTypeKind::Reference, 0x01000002, "IsConst")),
            inner: plain.clone(),
        };

        assert!(!modified.matches(&plain, SignatureComparison::Strict));
        assert!(modified.matches(&plain, SignatureComparison::Reference));
    }

    #[test]
    fn vector_shorthand_equals_explicit_single_dimension() {
        let shorthand = TypeSig::vector(int32());
        let explicit = TypeSig::Array {
            element: int32(),
            rank: 1,
            dimensions: vec![ArrayDimension::default()],
        };

        assert!(shorthand.matches(&explicit, SignatureComparison::Strict));
        assert_eq!(shorthand.canonical_hash(), explicit.canonical_hash());
    }

    #[test]
    fn array_dimension_mismatch() {
        let bounded = TypeSig::Array {
            element: int32(),
            rank: 1,
            dimensions: vec![ArrayDimension {
                lower_bound: Some(0),
                size: Some(16),
            }],
        };
        let unbounded = TypeSig::vector(int32());

        assert!(!bounded.matches(&unbounded, SignatureComparison::Strict));
    }

    #[test]
    fn spec_transparent_for_reference_matching() {
        let inner = int32();
        let spec = TypeSig::Spec {
            token: Token::new(0x1B000001),
            inner: inner.clone(),
        };

        assert!(!spec.matches(&inner, SignatureComparison::Strict));
        assert!(spec.matches(&inner, SignatureComparison::Reference));
    }

    #[test]
    fn method_sig_matches_and_hash() {
        let sig = MethodSig {
            has_this: true,
            explicit_this: false,
            vararg: false,
            generic_arity: 0,
            return_type: Arc::new(TypeSig::Intrinsic(IntrinsicKind::Void)),
            params: vec![int32(), int32()],
            varargs: Vec::new(),
        };
        let same = sig.clone();
        assert!(sig.matches(&same, SignatureComparison::Strict));
        assert_eq!(sig.canonical_hash(), same.canonical_hash());

        let mut different = sig.clone();
        different.params.pop();
        assert!(!sig.matches(&different, SignatureComparison::Strict));
    }
}
