use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use strum::{EnumCount, EnumIter};

use crate::metadata::token::Token;

/// A shared, immutable type signature.
pub type TypeSigRc = Arc<TypeSig>;

/// A shared, immutable method signature.
pub type MethodSigRc = Arc<MethodSig>;

/// The intrinsic (primitive) types with dedicated shorthand encodings.
///
/// Intrinsics are distinct from their boxed class representations; binding against
/// members of a primitive requires the full named-class form (see
/// [`crate::metadata::tables::BindingOptions::DISALLOW_INTRINSIC_SUBSTITUTION`]).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount)]
pub enum IntrinsicKind {
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// System.Object
    Object,
    /// System.String
    String,
    /// Typed reference, carrying both a value and its type
    TypedRef,
}

impl IntrinsicKind {
    /// The namespace and name of the boxed class form of this intrinsic.
    #[must_use]
    pub fn class_name(&self) -> (&'static str, &'static str) {
        match self {
            IntrinsicKind::Void => ("System", "Void"),
            IntrinsicKind::Boolean => ("System", "Boolean"),
            IntrinsicKind::Char => ("System", "Char"),
            IntrinsicKind::I1 => ("System", "SByte"),
            IntrinsicKind::U1 => ("System", "Byte"),
            IntrinsicKind::I2 => ("System", "Int16"),
            IntrinsicKind::U2 => ("System", "UInt16"),
            IntrinsicKind::I4 => ("System", "Int32"),
            IntrinsicKind::U4 => ("System", "UInt32"),
            IntrinsicKind::I8 => ("System", "Int64"),
            IntrinsicKind::U8 => ("System", "UInt64"),
            IntrinsicKind::R4 => ("System", "Single"),
            IntrinsicKind::R8 => ("System", "Double"),
            IntrinsicKind::I => ("System", "IntPtr"),
            IntrinsicKind::U => ("System", "UIntPtr"),
            IntrinsicKind::Object => ("System", "Object"),
            IntrinsicKind::String => ("System", "String"),
            IntrinsicKind::TypedRef => ("System", "TypedReference"),
        }
    }

    /// The IL keyword for this intrinsic.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            IntrinsicKind::Void => "void",
            IntrinsicKind::Boolean => "bool",
            IntrinsicKind::Char => "char",
            IntrinsicKind::I1 => "int8",
            IntrinsicKind::U1 => "uint8",
            IntrinsicKind::I2 => "int16",
            IntrinsicKind::U2 => "uint16",
            IntrinsicKind::I4 => "int32",
            IntrinsicKind::U4 => "uint32",
            IntrinsicKind::I8 => "int64",
            IntrinsicKind::U8 => "uint64",
            IntrinsicKind::R4 => "float32",
            IntrinsicKind::R8 => "float64",
            IntrinsicKind::I => "native int",
            IntrinsicKind::U => "native uint",
            IntrinsicKind::Object => "object",
            IntrinsicKind::String => "string",
            IntrinsicKind::TypedRef => "typedref",
        }
    }

    /// Whether this intrinsic is a value type (as opposed to object/string).
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        !matches!(self, IntrinsicKind::Object | IntrinsicKind::String)
    }

    /// Maps the namespace-qualified class name of a primitive back to its intrinsic
    /// kind, if the name names one.
    #[must_use]
    pub fn from_full_name(full_name: &str) -> Option<IntrinsicKind> {
        use strum::IntoEnumIterator;

        let rest = full_name.strip_prefix("System.")?;
        IntrinsicKind::iter().find(|kind| kind.class_name().1 == rest)
    }
}

/// Whether a generic parameter belongs to a type or to a method.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum GenericParameterKind {
    /// A generic parameter of a type (`!n` in IL)
    Type,
    /// A generic parameter of a method (`!!n` in IL)
    Method,
}

/// Whether a named type signature points at a definition in its home module or a
/// reference to another module.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum NamedTypeKind {
    /// The type is defined in the signature's home module
    Definition,
    /// The type lives in another module and is addressed through a type reference
    Reference,
}

/// A single dimension of an array
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct ArrayDimension {
    /// The lower bound of this dimension (lowest index that can be used to access an element)
    pub lower_bound: Option<i32>,
    /// The size of this dimension; `None` means unlimited
    pub size: Option<u32>,
}

bitflags! {
    /// Controls which cosmetic wrappers [`TypeSig::naked`] strips.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NakedTypeOptions: u8 {
        /// Strip pinned markers
        const IGNORE_PINNED = 0x01;
        /// Strip optional custom modifiers
        const IGNORE_OPTIONAL_MODIFIERS = 0x02;
        /// Strip required custom modifiers
        const IGNORE_REQUIRED_MODIFIERS = 0x04;
        /// Strip every cosmetic wrapper
        const IGNORE_ALL = 0x07;
    }
}

/// A type signature.
///
/// The closed set of variants mirrors the shapes the binary format can encode. Every
/// signature belongs to one home module but is translatable to any other module of the
/// same domain via [`crate::metadata::signatures::TypeSigOps::translate`].
#[derive(Debug, Clone)]
pub enum TypeSig {
    /// A built-in primitive with a dedicated shorthand encoding
    Intrinsic(IntrinsicKind),
    /// A named type definition or reference
    Named {
        /// Definition in the home module, or reference into another module
        kind: NamedTypeKind,
        /// Token of the backing declaration in the home module
        token: Token,
        /// Namespace of the type; empty for the global namespace
        namespace: String,
        /// Simple name of the type
        name: String,
        /// Encoded as a value type rather than a class
        value_type: bool,
    },
    /// A type specification: any signature wrapped to give it a token
    Spec {
        /// Token of the type-spec declaration in the home module
        token: Token,
        /// The wrapped signature
        inner: TypeSigRc,
    },
    /// A generic parameter placeholder
    GenericParam {
        /// Type-level or method-level parameter
        kind: GenericParameterKind,
        /// Zero-based ordinal
        ordinal: u16,
    },
    /// A generic type instantiation
    GenericInst {
        /// The generic type definition being instantiated
        definition: TypeSigRc,
        /// The type arguments, in declaration order
        args: Vec<TypeSigRc>,
    },
    /// An array type
    Array {
        /// The element type
        element: TypeSigRc,
        /// Number of dimensions
        rank: u32,
        /// Explicit dimension descriptors; may hold fewer entries than `rank`,
        /// missing trailing dimensions are unbounded
        dimensions: Vec<ArrayDimension>,
    },
    /// A pointer or by-reference type
    Pointer {
        /// The target type
        element: TypeSigRc,
        /// Managed by-reference (`&`) rather than unmanaged pointer (`*`)
        by_ref: bool,
    },
    /// A pinned local type
    Pinned(TypeSigRc),
    /// A custom-modified type
    Modified {
        /// Required (`modreq`) or optional (`modopt`) modifier
        required: bool,
        /// The modifier type
        modifier: TypeSigRc,
        /// The modified type
        inner: TypeSigRc,
    },
    /// A function pointer type
    FnPtr(MethodSigRc),
}

/// A method signature: calling convention, return type, parameters and the optional
/// vararg tail.
#[derive(Debug, Clone)]
pub struct MethodSig {
    /// The method takes a `this` pointer
    pub has_this: bool,
    /// The `this` pointer is explicitly present in the parameter list
    pub explicit_this: bool,
    /// The method uses the vararg calling convention
    pub vararg: bool,
    /// Number of generic parameters of the method; zero for non-generic methods
    pub generic_arity: u32,
    /// The return type
    pub return_type: TypeSigRc,
    /// The fixed parameters, in order
    pub params: Vec<TypeSigRc>,
    /// The variable parameters after the sentinel; only meaningful when `vararg`
    pub varargs: Vec<TypeSigRc>,
}

impl TypeSig {
    /// Shorthand constructor for a rank-1 unbounded array of `element`.
    ///
    /// The result compares equal to an explicit single-entry array of the same
    /// element type.
    #[must_use]
    pub fn vector(element: TypeSigRc) -> TypeSig {
        TypeSig::Array {
            element,
            rank: 1,
            dimensions: Vec::new(),
        }
    }

    /// The namespace-qualified display name of a named signature, or `None` for
    /// structural variants.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        match self {
            TypeSig::Named {
                namespace, name, ..
            } => {
                if namespace.is_empty() {
                    Some(name.clone())
                } else {
                    Some(format!("{namespace}.{name}"))
                }
            }
            TypeSig::Intrinsic(kind) => {
                let (ns, name) = kind.class_name();
                Some(format!("{ns}.{name}"))
            }
            _ => None,
        }
    }

    /// Whether this signature is (after stripping wrappers) a reference type.
    ///
    /// Used by assignability: reference types are unconditionally assignable to
    /// `object` unless the caller disallows it.
    #[must_use]
    pub fn is_reference_type(&self) -> bool {
        match self {
            TypeSig::Intrinsic(kind) => !kind.is_value_type(),
            TypeSig::Named { value_type, .. } => !value_type,
            TypeSig::Array { .. } => true,
            TypeSig::GenericInst { definition, .. } => definition.is_reference_type(),
            TypeSig::Spec { inner, .. } | TypeSig::Pinned(inner) => inner.is_reference_type(),
            TypeSig::Modified { inner, .. } => inner.is_reference_type(),
            _ => false,
        }
    }

    /// Writes an IL-style reference to this type into `out`.
    ///
    /// This is the stable, side-effect-free formatting hook consumed by text emitters;
    /// [`fmt::Display`] delegates to it.
    ///
    /// # Errors
    /// Propagates formatter errors from `out`.
    pub fn write_ref(&self, out: &mut impl fmt::Write) -> fmt::Result {
        match self {
            TypeSig::Intrinsic(kind) => out.write_str(kind.keyword()),
            TypeSig::Named {
                namespace, name, ..
            } => {
                if namespace.is_empty() {
                    out.write_str(name)
                } else {
                    write!(out, "{namespace}.{name}")
                }
            }
            TypeSig::Spec { inner, .. } => inner.write_ref(out),
            TypeSig::GenericParam { kind, ordinal } => match kind {
                GenericParameterKind::Type => write!(out, "!{ordinal}"),
                GenericParameterKind::Method => write!(out, "!!{ordinal}"),
            },
            TypeSig::GenericInst { definition, args } => {
                definition.write_ref(out)?;
                out.write_char('<')?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    arg.write_ref(out)?;
                }
                out.write_char('>')
            }
            TypeSig::Array {
                element,
                rank,
                dimensions,
            } => {
                element.write_ref(out)?;
                out.write_char('[')?;
                for i in 0..*rank {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    if let Some(dim) = dimensions.get(i as usize) {
                        match (dim.lower_bound, dim.size) {
                            (Some(lo), Some(size)) => {
                                write!(out, "{}...{}", lo, i64::from(lo) + i64::from(size) - 1)?;
                            }
                            (Some(lo), None) => write!(out, "{lo}...")?,
                            (None, Some(size)) => write!(out, "{size}")?,
                            (None, None) => {}
                        }
                    }
                }
                out.write_char(']')
            }
            TypeSig::Pointer { element, by_ref } => {
                element.write_ref(out)?;
                out.write_char(if *by_ref { '&' } else { '*' })
            }
            TypeSig::Pinned(inner) => {
                inner.write_ref(out)?;
                out.write_str(" pinned")
            }
            TypeSig::Modified {
                required,
                modifier,
                inner,
            } => {
                inner.write_ref(out)?;
                out.write_str(if *required { " modreq(" } else { " modopt(" })?;
                modifier.write_ref(out)?;
                out.write_char(')')
            }
            TypeSig::FnPtr(sig) => {
                out.write_str("method ")?;
                sig.return_type.write_ref(out)?;
                out.write_str(" *(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    param.write_ref(out)?;
                }
                out.write_char(')')
            }
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_ref(f)
    }
}

/// Strips cosmetic wrappers per `options`; see
/// [`crate::metadata::signatures::TypeSigOps::naked`].
pub(crate) fn naked<'a>(sig: &'a TypeSigRc, options: NakedTypeOptions) -> &'a TypeSigRc {
    match sig.as_ref() {
        TypeSig::Pinned(inner) if options.contains(NakedTypeOptions::IGNORE_PINNED) => {
            naked(inner, options)
        }
        TypeSig::Modified {
            required, inner, ..
        } => {
            let strip = if *required {
                options.contains(NakedTypeOptions::IGNORE_REQUIRED_MODIFIERS)
            } else {
                options.contains(NakedTypeOptions::IGNORE_OPTIONAL_MODIFIERS)
            };
            if strip {
                naked(inner, options)
            } else {
                sig
            }
        }
        _ => sig,
    }
}
