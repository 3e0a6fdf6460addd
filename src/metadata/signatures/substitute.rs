//! Generic-argument substitution across the signature model.
//!
//! [`crate::metadata::signatures::TypeSigOps::map_generic_arguments`] applies a
//! [`GenericMap`] recursively through every composite signature: array elements,
//! pointer targets, generic-instance arguments, method return and parameter types.
//! When a signature provably contains no generic parameter the substitution
//! short-circuits and returns the SAME `Arc`, not a copy - callers rely on pointer
//! equality to detect that no substitution occurred.

use std::sync::Arc;

use crate::metadata::generics::GenericMap;
use crate::metadata::signatures::compare::SignatureComparison;
use crate::metadata::signatures::types::{MethodSig, MethodSigRc, TypeSig, TypeSigRc};

pub(crate) fn map_type_generic_arguments(sig: &TypeSigRc, map: &GenericMap) -> TypeSigRc {
    if !sig.references_generic_arguments() || map.is_empty() {
        return sig.clone();
    }

    match sig.as_ref() {
        TypeSig::GenericParam { kind, ordinal } => match map.get(*kind, *ordinal) {
            Some(substituted) => {
                if substituted.matches(sig, SignatureComparison::Strict) {
                    sig.clone()
                } else {
                    substituted
                }
            }
            None => sig.clone(),
        },
        TypeSig::Spec { inner, .. } => {
            let mapped = map_type_generic_arguments(inner, map);
            if Arc::ptr_eq(&mapped, inner) {
                sig.clone()
            } else {
                mapped
            }
        }
        TypeSig::GenericInst { definition, args } => {
            let mapped_definition = map_type_generic_arguments(definition, map);
            let mapped_args: Vec<TypeSigRc> = args
                .iter()
                .map(|arg| map_type_generic_arguments(arg, map))
                .collect();

            let unchanged = Arc::ptr_eq(&mapped_definition, definition)
                && mapped_args
                    .iter()
                    .zip(args)
                    .all(|(mapped, original)| Arc::ptr_eq(mapped, original));
            if unchanged {
                sig.clone()
            } else {
                Arc::new(TypeSig::GenericInst {
                    definition: mapped_definition,
                    args: mapped_args,
                })
            }
        }
        TypeSig::Array {
            element,
            rank,
            dimensions,
        } => {
            let mapped = map_type_generic_arguments(element, map);
            if Arc::ptr_eq(&mapped, element) {
                sig.clone()
            } else {
                Arc::new(TypeSig::Array {
                    element: mapped,
                    rank: *rank,
                    dimensions: dimensions.clone(),
                })
            }
        }
        TypeSig::Pointer { element, by_ref } => {
            let mapped = map_type_generic_arguments(element, map);
            if Arc::ptr_eq(&mapped, element) {
                sig.clone()
            } else {
                Arc::new(TypeSig::Pointer {
                    element: mapped,
                    by_ref: *by_ref,
                })
            }
        }
        TypeSig::Pinned(inner) => {
            let mapped = map_type_generic_arguments(inner, map);
            if Arc::ptr_eq(&mapped, inner) {
                sig.clone()
            } else {
                Arc::new(TypeSig::Pinned(mapped))
            }
        }
        TypeSig::Modified {
            required,
            modifier,
            inner,
        } => {
            let mapped_modifier = map_type_generic_arguments(modifier, map);
            let mapped_inner = map_type_generic_arguments(inner, map);
            if Arc::ptr_eq(&mapped_modifier, modifier) && Arc::ptr_eq(&mapped_inner, inner) {
                sig.clone()
            } else {
                Arc::new(TypeSig::Modified {
                    required: *required,
                    modifier: mapped_modifier,
                    inner: mapped_inner,
                })
            }
        }
        TypeSig::FnPtr(method) => {
            let mapped = map_method_generic_arguments(method, map);
            if Arc::ptr_eq(&mapped, method) {
                sig.clone()
            } else {
                Arc::new(TypeSig::FnPtr(mapped))
            }
        }
        // No generic parameter can hide in these; the short-circuit above
        // already returned.
        TypeSig::Intrinsic(_) | TypeSig::Named { .. } => sig.clone(),
    }
}

pub(crate) fn map_method_generic_arguments(sig: &MethodSigRc, map: &GenericMap) -> MethodSigRc {
    if !sig.references_generic_arguments() || map.is_empty() {
        return sig.clone();
    }

    let return_type = map_type_generic_arguments(&sig.return_type, map);
    let params: Vec<TypeSigRc> = sig
        .params
        .iter()
        .map(|param| map_type_generic_arguments(param, map))
        .collect();
    let varargs: Vec<TypeSigRc> = sig
        .varargs
        .iter()
        .map(|vararg| map_type_generic_arguments(vararg, map))
        .collect();

    let unchanged = Arc::ptr_eq(&return_type, &sig.return_type)
        && params
            .iter()
            .zip(&sig.params)
            .all(|(mapped, original)| Arc::ptr_eq(mapped, original))
        && varargs
            .iter()
            .zip(&sig.varargs)
            .all(|(mapped, original)| Arc::ptr_eq(mapped, original));
    if unchanged {
        return sig.clone();
    }

    Arc::new(MethodSig {
        has_this: sig.has_this,
        explicit_this: sig.explicit_this,
        vararg: sig.vararg,
        generic_arity: sig.generic_arity,
        return_type,
        params,
        varargs,
    })
}
