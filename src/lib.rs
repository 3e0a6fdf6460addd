// Copyright 2026 The cilforge contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # cilforge
//!
//! A read/write in-memory object model for the metadata and method bodies of
//! CIL-like managed modules: types, members, generic parameters and IL instruction
//! streams organized as metadata tables addressed by typed tokens.
//!
//! `cilforge` is a library layer. It does not parse PE images, bind assemblies or
//! emit binaries - those collaborators reach the model through narrow hooks (row
//! resolvers, type finders, symbol providers) and consume it through stable
//! traversal APIs.
//!
//! ## What's inside
//!
//! - **Typed tokens and declaration tables** - per-kind growable tables with lazy
//!   resolution-on-miss, strong and weak references, weak-to-strong promotion and
//!   removal with tombstones ([`metadata::tables`])
//! - **A canonical signature model** - one closed set of type/method signature
//!   variants with two-strength structural equality, canonical hashing,
//!   assignability, cross-module translation and generic substitution
//!   ([`metadata::signatures`])
//! - **A generic substitution algebra** - immutable, chainable substitution maps
//!   applied uniformly across every signature kind ([`metadata::generics`])
//! - **A per-module declaration cache** - intrinsic singletons, preallocated
//!   generic-parameter placeholders and memoized lookups ([`metadata::cache`])
//! - **Binding collections** - get-or-create lookups parameterized by
//!   [`metadata::tables::BindingOptions`] over fields, generic parameters, method
//!   specs and type specs
//! - **The instruction-block tree** - nested lexical blocks owning either child
//!   blocks or instruction sequences, local-variable symbols and exception
//!   handlers ([`metadata::method`])
//! - **The instruction reader** - a stack-disciplined cursor decoding binary IL
//!   with prefix accumulation, sequence points and bookmarks ([`disassembler`])
//!
//! ## Quick start
//!
//! ```rust
//! use cilforge::prelude::*;
//!
//! let module = CilModule::new("demo.dll");
//! let int32 = module.cache().intrinsic(IntrinsicKind::I4);
//!
//! // Bind a field on a type reference; a second binding returns the same object.
//! let uri = module
//!     .type_ref("System", "Uri", ResolutionScope::AssemblyRef("System".into()),
//!               BindingOptions::DEFAULT)?
//!     .unwrap();
//! let field = uri.get_field(module.tables(), "m_flags", &int32, BindingOptions::DEFAULT)?;
//! assert!(field.is_some());
//! # Ok::<(), cilforge::Error>(())
//! ```
//!
//! ## Concurrency model
//!
//! The model is mutable, owner-scoped and meant for an external single-writer
//! discipline: a module is built, transformed and emitted by one logical pass at a
//! time. The only explicitly synchronized resource is the per-module tag-dictionary
//! registry. There is no cancellation and no timeout - operations are bounded by
//! input size and run to completion or fail fast with a structural error.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types and traits.
pub mod prelude;

/// Binary IL instruction decoding: opcode tables and the stateful reader.
pub mod disassembler;

/// The metadata object model: tokens, tables, signatures, generics and bodies.
pub mod metadata;

pub use error::Error;
pub use file::Parser;

/// The result type used throughout cilforge.
pub type Result<T> = std::result::Result<T, Error>;
