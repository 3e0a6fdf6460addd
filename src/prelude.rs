//! # cilforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and
//! traits of the library. Import it to get quick access to the essentials for
//! building and transforming module metadata and method bodies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilforge operations
pub use crate::Error;

/// The result type used throughout cilforge
pub use crate::Result;

/// Low-level byte cursor
pub use crate::Parser;

// ================================================================================================
// Metadata System - Core Types
// ================================================================================================

/// Metadata token types for referencing table entries
pub use crate::metadata::token::{Token, TokenCell, TokenKind};

/// The module context and its tag dictionaries
pub use crate::metadata::module::{CilModule, TagDictionary, TagId, TypeFinder};

/// The per-module declaration cache
pub use crate::metadata::cache::{DeclarationCache, WellKnownItem, MAX_GENERIC_PARAMETER_ORDINAL};

/// The generic substitution algebra
pub use crate::metadata::generics::GenericMap;

// ================================================================================================
// Signatures
// ================================================================================================

/// The signature model
pub use crate::metadata::signatures::{
    ArrayDimension, ConstraintSource, GenericParameterKind, IntrinsicKind, MethodSig, MethodSigOps,
    MethodSigRc, NakedTypeOptions, NamedTypeKind, NoConstraints, SignatureComparison, TypeSig,
    TypeSigOps, TypeSigRc,
};

// ================================================================================================
// Declaration Tables and Collections
// ================================================================================================

/// Binding options and the binding collections
pub use crate::metadata::tables::{
    BindingOptions, FieldRefCollection, GenericContext, GenericParamCollection,
    MethodSpecCollection, TypeSpecCollection,
};

/// Owned declarations
pub use crate::metadata::tables::{
    CustomStringDecl, CustomStringRc, Declaration, FieldRefDecl, FieldRefRc,
    GenericParamAttributes, GenericParamDecl, GenericParamRc, MethodDefDecl, MethodDefRc,
    MethodSpecDecl, MethodSpecRc, ResolutionScope, TypeDefDecl, TypeDefRc, TypeRefDecl, TypeRefRc,
    TypeSpecDecl, TypeSpecRc,
};

/// The table infrastructure
pub use crate::metadata::tables::{
    DeclarationTable, ModuleTables, RowResolver, UserStringTable, WEAK_ROW_BASE,
};

// ================================================================================================
// Method Bodies
// ================================================================================================

/// The instruction-block tree of a method body
pub use crate::metadata::method::{
    BlockId, BlockPosition, ExceptionHandler, ExceptionHandlerKind, HandlerId, HandlerRole,
    InstructionBlock, InstructionSequence, LocalVariableSymbol, MethodBody, RangeRelation,
    SequenceContent, SequenceId, SequencePoint,
};

// ================================================================================================
// Disassembler
// ================================================================================================

/// IL instruction decoding
pub use crate::disassembler::{
    Bookmark, Immediate, Instruction, InstructionReader, OpCode, Operand, OperandKind, PrefixFlags,
    OPCODES, OPCODES_FE,
};
