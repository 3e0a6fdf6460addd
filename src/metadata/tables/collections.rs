//! Owner-scoped declaration collections with get-or-create binding semantics.
//!
//! Every named or keyed sub-collection follows one binding protocol parameterized by
//! [`BindingOptions`]: find the requested declaration; if found with a compatible
//! signature, return it; if found with an incompatible signature, raise (or return
//! `None` under [`BindingOptions::DONT_THROW`]); if absent and the existence policy
//! permits creation, construct, register with the owning module's tables and insert.
//!
//! Collections backed by an external reader load lazily: the first access triggers a
//! one-time import pass, after which the in-memory list serves every lookup.
//! Module-rooted top-level collections are not lazily loaded.

use std::sync::{Arc, OnceLock, RwLock};

use dashmap::DashMap;

use crate::metadata::signatures::{
    ConstraintSource, GenericParameterKind, SignatureComparison, TypeSigRc,
};
use crate::metadata::tables::binding::BindingOptions;
use crate::metadata::tables::decls::{
    Declaration, FieldRefDecl, FieldRefRc, GenericParamDecl, GenericParamRc, MethodSpecDecl,
    MethodSpecRc, TypeSpecDecl, TypeSpecRc,
};
use crate::metadata::tables::ModuleTables;
use crate::metadata::token::Token;
use crate::Result;

/// A one-time import pass populating a lazily-loaded collection from its reader.
pub type CollectionLoader<T> = Box<dyn Fn() -> Result<Vec<Arc<T>>> + Send + Sync>;

/// Outcome helper: apply the error-behavior axis to a binding failure.
fn binding_failure<T>(options: BindingOptions, error: crate::Error) -> Result<Option<T>> {
    if options.contains(BindingOptions::DONT_THROW) {
        Ok(None)
    } else {
        Err(error)
    }
}

/// Register a freshly-created declaration per the existence axis.
fn register<T: Declaration>(
    tables_entry: &crate::metadata::tables::table::DeclarationTable<T>,
    decl: &Arc<T>,
    options: BindingOptions,
) -> Result<()> {
    if options.contains(BindingOptions::WEAK_REFERENCE) {
        tables_entry.add_weak(decl)?;
    } else {
        tables_entry.add(decl)?;
    }
    Ok(())
}

/// Field references bound against one owning type reference.
pub struct FieldRefCollection {
    fields: boxcar::Vec<FieldRefRc>,
    loaded: OnceLock<()>,
    loader: RwLock<Option<CollectionLoader<FieldRefDecl>>>,
}

impl FieldRefCollection {
    /// Creates an empty, eagerly-available collection.
    #[must_use]
    pub fn new() -> Self {
        FieldRefCollection {
            fields: boxcar::Vec::new(),
            loaded: OnceLock::new(),
            loader: RwLock::new(None),
        }
    }

    /// Registers the one-time import pass backing this collection.
    pub fn set_loader(&self, loader: CollectionLoader<FieldRefDecl>) {
        *write_lock!(self.loader) = Some(loader);
    }

    /// Whether this collection is backed by a lazy reader.
    #[must_use]
    pub fn supports_lazy_loading(&self) -> bool {
        self.loaded.get().is_none() && read_lock!(self.loader).is_some()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded.get().is_some() {
            return Ok(());
        }
        let loader = write_lock!(self.loader).take();
        if let Some(loader) = loader {
            for decl in loader()? {
                self.fields.push(decl);
            }
        }
        let _ = self.loaded.set(());
        Ok(())
    }

    /// Number of fields currently bound.
    ///
    /// # Errors
    /// Propagates a failing lazy import.
    pub fn count(&self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(self.fields.count())
    }

    /// Binds a field by name and type.
    ///
    /// The representative binding algorithm: find by name; if found and the type
    /// matches by reference, return it; if found with a different type, fail with
    /// "same name, different type" (or `None` under
    /// [`BindingOptions::DONT_THROW`]); if absent and the existence policy permits
    /// creation, construct and insert.
    ///
    /// # Errors
    /// - [`crate::Error::MemberSignatureMismatch`] on a same-name/different-type hit
    /// - [`crate::Error::MemberNotFound`] when absent and creation is forbidden
    pub fn field(
        &self,
        tables: &ModuleTables,
        owner_name: &str,
        owner_token: Token,
        name: &str,
        field_type: &TypeSigRc,
        options: BindingOptions,
    ) -> Result<Option<FieldRefRc>> {
        options.validate()?;
        self.ensure_loaded()?;

        for (_, existing) in self.fields.iter() {
            if existing.name != name {
                continue;
            }
            if existing
                .field_type
                .matches(field_type, SignatureComparison::Reference)
            {
                return Ok(Some(existing.clone()));
            }
            return binding_failure(
                options,
                crate::Error::MemberSignatureMismatch {
                    owner: owner_name.to_string(),
                    name: name.to_string(),
                },
            );
        }

        if !options.allows_creation() {
            return binding_failure(
                options,
                crate::Error::MemberNotFound {
                    owner: owner_name.to_string(),
                    name: name.to_string(),
                },
            );
        }

        let decl = Arc::new(FieldRefDecl::new(name, field_type.clone(), owner_token));
        register(&tables.field_refs, &decl, options)?;
        self.fields.push(decl.clone());
        Ok(Some(decl))
    }
}

impl Default for FieldRefCollection {
    fn default() -> Self {
        FieldRefCollection::new()
    }
}

/// The ordered generic parameters declared by one type or method.
pub struct GenericParamCollection {
    kind: GenericParameterKind,
    params: boxcar::Vec<GenericParamRc>,
    loaded: OnceLock<()>,
    loader: RwLock<Option<CollectionLoader<GenericParamDecl>>>,
}

impl GenericParamCollection {
    /// Creates an empty collection for parameters of `kind`.
    #[must_use]
    pub fn new(kind: GenericParameterKind) -> Self {
        GenericParamCollection {
            kind,
            params: boxcar::Vec::new(),
            loaded: OnceLock::new(),
            loader: RwLock::new(None),
        }
    }

    /// The parameter kind this collection holds.
    #[must_use]
    pub fn param_kind(&self) -> GenericParameterKind {
        self.kind
    }

    /// Registers the one-time import pass backing this collection.
    pub fn set_loader(&self, loader: CollectionLoader<GenericParamDecl>) {
        *write_lock!(self.loader) = Some(loader);
    }

    /// Whether this collection is backed by a lazy reader.
    #[must_use]
    pub fn supports_lazy_loading(&self) -> bool {
        self.loaded.get().is_none() && read_lock!(self.loader).is_some()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded.get().is_some() {
            return Ok(());
        }
        let loader = write_lock!(self.loader).take();
        if let Some(loader) = loader {
            for decl in loader()? {
                self.params.push(decl);
            }
        }
        let _ = self.loaded.set(());
        Ok(())
    }

    /// Attaches a new parameter declaration and registers it with the module.
    ///
    /// # Errors
    /// Propagates table attachment failures.
    pub fn add(&self, tables: &ModuleTables, decl: GenericParamDecl) -> Result<GenericParamRc> {
        self.ensure_loaded()?;
        let decl = Arc::new(decl);
        tables.generic_params.add(&decl)?;
        self.params.push(decl.clone());
        Ok(decl)
    }

    /// The parameter at `ordinal`, if declared.
    ///
    /// # Errors
    /// Propagates a failing lazy import.
    pub fn param(&self, ordinal: u16) -> Result<Option<GenericParamRc>> {
        self.ensure_loaded()?;
        // Ordinals are dense and insertion-ordered, so position equals ordinal;
        // still verify against the declaration to stay robust under odd imports.
        for (_, param) in self.params.iter() {
            if param.number == ordinal {
                return Ok(Some(param.clone()));
            }
        }
        Ok(None)
    }

    /// Number of declared parameters.
    ///
    /// # Errors
    /// Propagates a failing lazy import.
    pub fn count(&self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(self.params.count())
    }
}

/// Constraint lookup over the type-level and method-level generic parameters in
/// scope at a use site.
pub struct GenericContext<'a> {
    /// Parameters of the declaring type, if any.
    pub type_params: Option<&'a GenericParamCollection>,
    /// Parameters of the declaring method, if any.
    pub method_params: Option<&'a GenericParamCollection>,
}

impl GenericContext<'_> {
    fn collection(&self, kind: GenericParameterKind) -> Option<&GenericParamCollection> {
        match kind {
            GenericParameterKind::Type => self.type_params,
            GenericParameterKind::Method => self.method_params,
        }
    }
}

impl ConstraintSource for GenericContext<'_> {
    fn has_reference_type_constraint(&self, kind: GenericParameterKind, ordinal: u16) -> bool {
        self.collection(kind)
            .and_then(|params| params.param(ordinal).ok().flatten())
            .map_or(false, |param| param.has_reference_type_constraint())
    }

    fn constraints(&self, kind: GenericParameterKind, ordinal: u16) -> Vec<TypeSigRc> {
        self.collection(kind)
            .and_then(|params| params.param(ordinal).ok().flatten())
            .map_or_else(Vec::new, |param| {
                param.constraints.iter().map(|(_, c)| c.clone()).collect()
            })
    }
}

/// Generic instantiations of one method, matched by positional argument list.
pub struct MethodSpecCollection {
    specs: boxcar::Vec<MethodSpecRc>,
    loaded: OnceLock<()>,
    loader: RwLock<Option<CollectionLoader<MethodSpecDecl>>>,
}

impl MethodSpecCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        MethodSpecCollection {
            specs: boxcar::Vec::new(),
            loaded: OnceLock::new(),
            loader: RwLock::new(None),
        }
    }

    /// Registers the one-time import pass backing this collection.
    pub fn set_loader(&self, loader: CollectionLoader<MethodSpecDecl>) {
        *write_lock!(self.loader) = Some(loader);
    }

    /// Whether this collection is backed by a lazy reader.
    #[must_use]
    pub fn supports_lazy_loading(&self) -> bool {
        self.loaded.get().is_none() && read_lock!(self.loader).is_some()
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded.get().is_some() {
            return Ok(());
        }
        let loader = write_lock!(self.loader).take();
        if let Some(loader) = loader {
            for decl in loader()? {
                self.specs.push(decl);
            }
        }
        let _ = self.loaded.set(());
        Ok(())
    }

    /// Binds an instantiation by its full generic-argument list.
    ///
    /// Every argument must match positionally by reference, not just the count.
    ///
    /// # Errors
    /// [`crate::Error::MemberNotFound`] when absent and creation is forbidden.
    pub fn instance(
        &self,
        tables: &ModuleTables,
        method: Token,
        method_name: &str,
        generic_args: &[TypeSigRc],
        options: BindingOptions,
    ) -> Result<Option<MethodSpecRc>> {
        options.validate()?;
        self.ensure_loaded()?;

        for (_, existing) in self.specs.iter() {
            if existing.generic_args.len() != generic_args.len() {
                continue;
            }
            let all_match = existing
                .generic_args
                .iter()
                .zip(generic_args)
                .all(|(a, b)| a.matches(b, SignatureComparison::Reference));
            if all_match {
                return Ok(Some(existing.clone()));
            }
        }

        if !options.allows_creation() {
            return binding_failure(
                options,
                crate::Error::MemberNotFound {
                    owner: method_name.to_string(),
                    name: format!("<{} generic arguments>", generic_args.len()),
                },
            );
        }

        let decl = Arc::new(MethodSpecDecl::new(method, generic_args.to_vec()));
        register(&tables.method_specs, &decl, options)?;
        self.specs.push(decl.clone());
        Ok(Some(decl))
    }

    /// Number of instantiations currently bound.
    ///
    /// # Errors
    /// Propagates a failing lazy import.
    pub fn count(&self) -> Result<usize> {
        self.ensure_loaded()?;
        Ok(self.specs.count())
    }
}

impl Default for MethodSpecCollection {
    fn default() -> Self {
        MethodSpecCollection::new()
    }
}

/// The module-scoped type specifications, deduplicated by canonical hash.
pub struct TypeSpecCollection {
    by_hash: DashMap<u64, Vec<TypeSpecRc>>,
}

impl TypeSpecCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        TypeSpecCollection {
            by_hash: DashMap::new(),
        }
    }

    /// Binds the specification for a constructed type signature.
    ///
    /// Strict equality decides identity; the canonical-hash index keeps the scan
    /// bounded to structural collisions.
    ///
    /// # Errors
    /// [`crate::Error::MemberNotFound`] when absent and creation is forbidden.
    pub fn spec(
        &self,
        tables: &ModuleTables,
        signature: &TypeSigRc,
        options: BindingOptions,
    ) -> Result<Option<TypeSpecRc>> {
        options.validate()?;
        let hash = signature.canonical_hash();

        if let Some(candidates) = self.by_hash.get(&hash) {
            for candidate in candidates.iter() {
                if candidate
                    .signature
                    .matches(signature, SignatureComparison::Strict)
                {
                    return Ok(Some(candidate.clone()));
                }
            }
        }

        if !options.allows_creation() {
            return binding_failure(
                options,
                crate::Error::MemberNotFound {
                    owner: "module".to_string(),
                    name: signature.to_string(),
                },
            );
        }

        let decl = Arc::new(TypeSpecDecl::new(signature.clone()));
        register(&tables.type_specs, &decl, options)?;
        self.by_hash.entry(hash).or_default().push(decl.clone());
        Ok(Some(decl))
    }

    /// Number of distinct specifications.
    #[must_use]
    pub fn count(&self) -> usize {
        self.by_hash.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Default for TypeSpecCollection {
    fn default() -> Self {
        TypeSpecCollection::new()
    }
}
