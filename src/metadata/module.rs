//! The module context object.
//!
//! A [`CilModule`] owns every piece of per-module state: the declaration tables, the
//! declaration cache, the module-scoped type-spec collection, the name indices and
//! the tag-dictionary registry. There are no ambient globals - every lookup takes the
//! owning module explicitly, and dropping the module cascades to everything it owns.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use uguid::Guid;

use crate::metadata::cache::DeclarationCache;
use crate::metadata::signatures::{IntrinsicKind, TypeSigRc};
use crate::metadata::tables::{
    BindingOptions, Declaration, ModuleTables, ResolutionScope, TypeDefDecl, TypeDefRc,
    TypeRefDecl, TypeRefRc, TypeSpecCollection,
};
use crate::metadata::token::Token;
use crate::Result;

/// The capability identifier of a tag dictionary.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct TagId(u32);

/// An out-of-band annotation store, keyed by declaration token.
pub type TagDictionary = DashMap<Token, Box<dyn Any + Send + Sync>>;

/// The external type finder: resolves a textual cross-module name to an in-model
/// signature, honoring the binding-option axes.
pub type TypeFinder = Box<dyn Fn(&str, BindingOptions) -> Result<TypeSigRc> + Send + Sync>;

/// An in-memory module: the root context of the object model.
pub struct CilModule {
    name: String,
    mvid: Guid,
    tables: ModuleTables,
    cache: DeclarationCache,
    type_specs: TypeSpecCollection,
    /// Full-name index over the module-rooted types; never lazily loaded.
    type_defs_by_name: DashMap<String, Token>,
    /// Full-name index over type references.
    type_refs_by_name: DashMap<String, Token>,
    type_finder: RwLock<Option<TypeFinder>>,
    /// The one explicitly synchronized resource: tag dictionaries may see their
    /// first use from multiple annotation producers.
    tags: Mutex<HashMap<TagId, Arc<TagDictionary>>>,
    next_tag_id: AtomicU32,
}

impl CilModule {
    /// Creates an empty module with a zero MVID.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        CilModule::with_mvid(name, Guid::ZERO)
    }

    /// Creates an empty module with an explicit module version id.
    #[must_use]
    pub fn with_mvid(name: impl Into<String>, mvid: Guid) -> Self {
        CilModule {
            name: name.into(),
            mvid,
            tables: ModuleTables::new(),
            cache: DeclarationCache::new(),
            type_specs: TypeSpecCollection::new(),
            type_defs_by_name: DashMap::new(),
            type_refs_by_name: DashMap::new(),
            type_finder: RwLock::new(None),
            tags: Mutex::new(HashMap::new()),
            next_tag_id: AtomicU32::new(1),
        }
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module version id.
    #[must_use]
    pub fn mvid(&self) -> Guid {
        self.mvid
    }

    /// The per-kind declaration tables.
    #[must_use]
    pub fn tables(&self) -> &ModuleTables {
        &self.tables
    }

    /// The declaration cache.
    #[must_use]
    pub fn cache(&self) -> &DeclarationCache {
        &self.cache
    }

    /// The module-scoped type specifications.
    #[must_use]
    pub fn type_specs(&self) -> &TypeSpecCollection {
        &self.type_specs
    }

    /// Registers the external resolver used by [`CilModule::type_by_name`] for
    /// names this module does not define.
    pub fn set_type_finder(&self, finder: TypeFinder) {
        *write_lock!(self.type_finder) = Some(finder);
    }

    /// Attaches a type definition to this module.
    ///
    /// # Errors
    /// Propagates table attachment failures.
    pub fn add_type_def(&self, decl: TypeDefDecl) -> Result<TypeDefRc> {
        let full_name = decl.full_name();
        let decl = Arc::new(decl);
        let token = self.tables.type_defs.add(&decl)?;
        self.type_defs_by_name.insert(full_name, token);
        Ok(decl)
    }

    /// Finds a type definition by its namespace-qualified name.
    #[must_use]
    pub fn find_type_def(&self, full_name: &str) -> Option<TypeDefRc> {
        let token = *self.type_defs_by_name.get(full_name)?;
        self.tables.type_defs.get(token).ok()
    }

    /// Gets or creates a type reference by name.
    ///
    /// # Errors
    /// - [`crate::Error::MemberNotFound`] under
    ///   [`BindingOptions::ONLY_EXISTING`] when absent (or `Ok(None)` with
    ///   [`BindingOptions::DONT_THROW`])
    pub fn type_ref(
        &self,
        namespace: &str,
        name: &str,
        scope: ResolutionScope,
        options: BindingOptions,
    ) -> Result<Option<TypeRefRc>> {
        let full_name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{namespace}.{name}")
        };

        if let Some(token) = self.type_refs_by_name.get(&full_name) {
            return Ok(Some(self.tables.type_refs.get(*token)?));
        }

        if !options.allows_creation() {
            if options.contains(BindingOptions::DONT_THROW) {
                return Ok(None);
            }
            return Err(crate::Error::MemberNotFound {
                owner: self.name.clone(),
                name: full_name,
            });
        }

        let decl = Arc::new(TypeRefDecl::new(namespace, name, scope));
        let token = if options.contains(BindingOptions::WEAK_REFERENCE) {
            self.tables.type_refs.add_weak(&decl)?
        } else {
            self.tables.type_refs.add(&decl)?
        };
        self.type_refs_by_name.insert(full_name, token);
        Ok(Some(decl))
    }

    /// Resolves a textual type name to a signature, memoized per `(name, options)`.
    ///
    /// Primitive class names resolve to their intrinsic shorthand singletons unless
    /// [`BindingOptions::DISALLOW_INTRINSIC_SUBSTITUTION`] forces the full
    /// named-class form - required when binding members of a primitive. Local type
    /// definitions are consulted next, then the registered external finder. Only
    /// successful resolutions are cached; a failing lookup is recomputed every time.
    ///
    /// # Errors
    /// - [`crate::Error::MemberNotFound`] when nothing resolves the name
    pub fn type_by_name(&self, full_name: &str, options: BindingOptions) -> Result<TypeSigRc> {
        self.cache.type_by_name(full_name, options, || {
            if !options.contains(BindingOptions::DISALLOW_INTRINSIC_SUBSTITUTION) {
                if let Some(kind) = IntrinsicKind::from_full_name(full_name) {
                    return Ok(self.cache.intrinsic(kind));
                }
            }

            if let Some(def) = self.find_type_def(full_name) {
                return Ok(def.signature());
            }

            let guard = read_lock!(self.type_finder);
            match guard.as_ref() {
                Some(finder) => finder(full_name, options),
                None => Err(crate::Error::MemberNotFound {
                    owner: self.name.clone(),
                    name: full_name.to_string(),
                }),
            }
        })
    }

    /// Allocates a fresh tag-dictionary capability identifier.
    pub fn allocate_tag_id(&self) -> TagId {
        TagId(self.next_tag_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Gets or creates the tag dictionary for a capability identifier.
    ///
    /// Creation takes the registry lock and double-checks presence before
    /// inserting, tolerating concurrent first-use from multiple producers.
    pub fn tag_dictionary(&self, id: TagId) -> Arc<TagDictionary> {
        {
            let registry = lock!(self.tags);
            if let Some(existing) = registry.get(&id) {
                return existing.clone();
            }
        }

        let mut registry = lock!(self.tags);
        if let Some(existing) = registry.get(&id) {
            return existing.clone();
        }
        let fresh: Arc<TagDictionary> = Arc::new(DashMap::new());
        registry.insert(id, fresh.clone());
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::TypeSig;

    #[test]
    fn add_and_find_type_def() {
        let module = CilModule::new("library.dll");

        let def = module
            .add_type_def(TypeDefDecl::new("Widgets", "Gadget", false))
            .unwrap();
        assert!(!def.token().is_null());

        let found = module.find_type_def("Widgets.Gadget").unwrap();
        assert!(Arc::ptr_eq(&found, &def));
        assert!(module.find_type_def("Widgets.Missing").is_none());
    }

    #[test]
    fn type_ref_get_or_create() {
        let module = CilModule::new("library.dll");
        let scope = ResolutionScope::AssemblyRef("mscorlib".into());

        // Absent and creation forbidden.
        let missing = module.type_ref(
            "System",
            "Uri",
            scope.clone(),
            BindingOptions::ONLY_EXISTING | BindingOptions::DONT_THROW,
        );
        assert!(matches!(missing, Ok(None)));

        // Created on demand, then reused.
        let created = module
            .type_ref("System", "Uri", scope.clone(), BindingOptions::DEFAULT)
            .unwrap()
            .unwrap();
        let again = module
            .type_ref("System", "Uri", scope, BindingOptions::DEFAULT)
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&created, &again));
    }

    #[test]
    fn type_by_name_intrinsic_substitution() {
        let module = CilModule::new("library.dll");

        let intrinsic = module
            .type_by_name("System.Int32", BindingOptions::DEFAULT)
            .unwrap();
        assert!(matches!(
            *intrinsic,
            TypeSig::Intrinsic(IntrinsicKind::I4)
        ));

        // The boxed class form is not known locally and no finder is registered.
        let boxed = module.type_by_name(
            "System.Int32",
            BindingOptions::DISALLOW_INTRINSIC_SUBSTITUTION,
        );
        assert!(boxed.is_err());
    }

    #[test]
    fn type_by_name_uses_finder_for_foreign_names() {
        let module = CilModule::new("library.dll");
        module.set_type_finder(Box::new(|name, _options| {
            if name == "External.Thing" {
                Ok(Arc::new(TypeSig::Intrinsic(IntrinsicKind::Object)))
            } else {
                Err(crate::Error::MemberNotFound {
                    owner: "resolver".into(),
                    name: name.to_string(),
                })
            }
        }));

        assert!(module
            .type_by_name("External.Thing", BindingOptions::DEFAULT)
            .is_ok());
        assert!(module
            .type_by_name("External.Missing", BindingOptions::DEFAULT)
            .is_err());
    }

    #[test]
    fn tag_dictionaries_are_per_id_singletons() {
        let module = CilModule::new("library.dll");
        let id_a = module.allocate_tag_id();
        let id_b = module.allocate_tag_id();
        assert_ne!(id_a, id_b);

        let dict_a = module.tag_dictionary(id_a);
        let dict_a_again = module.tag_dictionary(id_a);
        let dict_b = module.tag_dictionary(id_b);

        assert!(Arc::ptr_eq(&dict_a, &dict_a_again));
        assert!(!Arc::ptr_eq(&dict_a, &dict_b));

        dict_a.insert(Token::new(0x02000001), Box::new(42u32));
        let stored = dict_a_again.get(&Token::new(0x02000001)).unwrap();
        assert_eq!(stored.downcast_ref::<u32>(), Some(&42));
    }
}
