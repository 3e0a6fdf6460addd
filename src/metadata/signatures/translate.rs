//! Cross-module signature translation.
//!
//! [`crate::metadata::signatures::TypeSigOps::translate`] produces an equivalent
//! signature valid in a different module of the same logical domain. Module-local
//! signatures - intrinsics and generic-parameter placeholders - translate to the
//! target's singletons; named types re-bind by namespace and name (a matching
//! definition wins over a reference); composites recursively translate their
//! components and rebuild.
//!
//! Round-tripping holds: translating a signature to another module and back yields
//! a strictly equal signature.

use std::sync::Arc;

use crate::metadata::module::CilModule;
use crate::metadata::signatures::types::{MethodSig, MethodSigRc, TypeSig, TypeSigRc};
use crate::metadata::tables::{BindingOptions, Declaration, ResolutionScope};
use crate::Result;

pub(crate) fn translate_type(sig: &TypeSigRc, target: &CilModule) -> Result<TypeSigRc> {
    match sig.as_ref() {
        // Module-local singletons: take the target's identity object.
        TypeSig::Intrinsic(kind) => Ok(target.cache().intrinsic(*kind)),
        TypeSig::GenericParam { kind, ordinal } => {
            target.cache().generic_parameter(*ordinal, *kind)
        }
        TypeSig::Named {
            namespace,
            name,
            value_type,
            ..
        } => {
            let full_name = if namespace.is_empty() {
                name.clone()
            } else {
                format!("{namespace}.{name}")
            };
            if let Some(def) = target.find_type_def(&full_name) {
                return Ok(def.signature());
            }

            let type_ref = target
                .type_ref(
                    namespace,
                    name,
                    ResolutionScope::AssemblyRef(String::new()),
                    BindingOptions::DEFAULT,
                )?
                .ok_or_else(|| crate::Error::MemberNotFound {
                    owner: target.name().to_string(),
                    name: full_name,
                })?;
            if *value_type {
                // Carry the encoding so equality survives the round trip.
                Ok(Arc::new(TypeSig::Named {
                    kind: crate::metadata::signatures::NamedTypeKind::Reference,
                    token: type_ref.token(),
                    namespace: type_ref.namespace.clone(),
                    name: type_ref.name.clone(),
                    value_type: true,
                }))
            } else {
                Ok(type_ref.signature())
            }
        }
        TypeSig::Spec { inner, .. } => {
            let translated = translate_type(inner, target)?;
            let spec = target
                .type_specs()
                .spec(target.tables(), &translated, BindingOptions::DEFAULT)?
                .ok_or_else(|| crate::Error::MemberNotFound {
                    owner: target.name().to_string(),
                    name: translated.to_string(),
                })?;
            Ok(Arc::new(TypeSig::Spec {
                token: spec.token(),
                inner: translated,
            }))
        }
        TypeSig::GenericInst { definition, args } => {
            let definition = translate_type(definition, target)?;
            let args = args
                .iter()
                .map(|arg| translate_type(arg, target))
                .collect::<Result<Vec<TypeSigRc>>>()?;
            Ok(Arc::new(TypeSig::GenericInst { definition, args }))
        }
        TypeSig::Array {
            element,
            rank,
            dimensions,
        } => Ok(Arc::new(TypeSig::Array {
            element: translate_type(element, target)?,
            rank: *rank,
            dimensions: dimensions.clone(),
        })),
        TypeSig::Pointer { element, by_ref } => Ok(Arc::new(TypeSig::Pointer {
            element: translate_type(element, target)?,
            by_ref: *by_ref,
        })),
        TypeSig::Pinned(inner) => Ok(Arc::new(TypeSig::Pinned(translate_type(inner, target)?))),
        TypeSig::Modified {
            required,
            modifier,
            inner,
        } => Ok(Arc::new(TypeSig::Modified {
            required: *required,
            modifier: translate_type(modifier, target)?,
            inner: translate_type(inner, target)?,
        })),
        TypeSig::FnPtr(method) => Ok(Arc::new(TypeSig::FnPtr(translate_method(
            method, target,
        )?))),
    }
}

pub(crate) fn translate_method(sig: &MethodSigRc, target: &CilModule) -> Result<MethodSigRc> {
    Ok(Arc::new(MethodSig {
        has_this: sig.has_this,
        explicit_this: sig.explicit_this,
        vararg: sig.vararg,
        generic_arity: sig.generic_arity,
        return_type: translate_type(&sig.return_type, target)?,
        params: sig
            .params
            .iter()
            .map(|param| translate_type(param, target))
            .collect::<Result<Vec<TypeSigRc>>>()?,
        varargs: sig
            .varargs
            .iter()
            .map(|vararg| translate_type(vararg, target))
            .collect::<Result<Vec<TypeSigRc>>>()?,
    }))
}
