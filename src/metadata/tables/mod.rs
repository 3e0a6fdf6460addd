//! Metadata declaration tables, owned declarations and binding collections.
//!
//! Table lookups yield tokens; tokens resolve to declarations through the per-kind
//! [`DeclarationTable`]s (lazily, via registered row resolvers); declarations expose
//! signatures built from the signature model. The [`BindingOptions`]-driven
//! collections layer get-or-create semantics on top.

pub(crate) mod binding;
pub(crate) mod collections;
pub(crate) mod decls;
pub(crate) mod strings;
pub(crate) mod table;

pub use binding::BindingOptions;
pub use collections::{
    CollectionLoader, FieldRefCollection, GenericContext, GenericParamCollection,
    MethodSpecCollection, TypeSpecCollection,
};
pub use decls::{
    CustomStringDecl, CustomStringRc, Declaration, FieldRefDecl, FieldRefRc,
    GenericParamAttributes, GenericParamDecl, GenericParamRc, MethodDefDecl, MethodDefRc,
    MethodSpecDecl, MethodSpecRc, ResolutionScope, TypeDefDecl, TypeDefRc, TypeRefDecl, TypeRefRc,
    TypeSpecDecl, TypeSpecRc,
};
pub use strings::UserStringTable;
pub use table::{DeclarationTable, RowResolver, WEAK_ROW_BASE};

/// The per-kind declaration tables of one module.
///
/// Constructed with the module and torn down with it; every lookup takes the owning
/// tables explicitly - there is no ambient global state.
pub struct ModuleTables {
    /// Types defined in the module.
    pub type_defs: DeclarationTable<TypeDefDecl>,
    /// References to types in other modules.
    pub type_refs: DeclarationTable<TypeRefDecl>,
    /// Constructed type signatures with tokens.
    pub type_specs: DeclarationTable<TypeSpecDecl>,
    /// References to fields of types in other scopes.
    pub field_refs: DeclarationTable<FieldRefDecl>,
    /// Methods defined in the module.
    pub method_defs: DeclarationTable<MethodDefDecl>,
    /// Generic method instantiations.
    pub method_specs: DeclarationTable<MethodSpecDecl>,
    /// Generic parameters of types and methods.
    pub generic_params: DeclarationTable<GenericParamDecl>,
    /// Interned user string literals.
    pub user_strings: UserStringTable,
}

impl ModuleTables {
    /// Creates the empty table set for a fresh module.
    #[must_use]
    pub fn new() -> Self {
        use crate::metadata::token::TokenKind;

        ModuleTables {
            type_defs: DeclarationTable::new(TokenKind::TypeDef),
            type_refs: DeclarationTable::new(TokenKind::TypeRef),
            type_specs: DeclarationTable::new(TokenKind::TypeSpec),
            field_refs: DeclarationTable::new(TokenKind::FieldRef),
            method_defs: DeclarationTable::new(TokenKind::MethodDef),
            method_specs: DeclarationTable::new(TokenKind::MethodSpec),
            generic_params: DeclarationTable::new(TokenKind::GenericParam),
            user_strings: UserStringTable::new(),
        }
    }
}

impl Default for ModuleTables {
    fn default() -> Self {
        ModuleTables::new()
    }
}
