//! The metadata object model.
//!
//! This module holds the in-memory representation of a module's metadata: typed
//! tokens ([`token`]), the module context ([`module`]), the declaration cache
//! ([`cache`]), the generic substitution algebra ([`generics`]), the signature model
//! ([`signatures`]), the per-kind declaration tables and binding collections
//! ([`tables`]) and the method-body instruction-block tree ([`method`]).

pub mod cache;
pub mod generics;
pub mod method;
pub mod module;
pub mod signatures;
pub mod tables;
pub mod token;
