use std::sync::Arc;

use bitflags::bitflags;
use widestring::Utf16String;

use crate::metadata::signatures::{
    GenericParameterKind, MethodSigRc, NamedTypeKind, TypeSig, TypeSigRc,
};
use crate::metadata::tables::collections::{
    FieldRefCollection, GenericParamCollection, MethodSpecCollection,
};
use crate::metadata::token::{Token, TokenCell, TokenKind};

/// A reference-counted type definition declaration.
pub type TypeDefRc = Arc<TypeDefDecl>;
/// A reference-counted type reference declaration.
pub type TypeRefRc = Arc<TypeRefDecl>;
/// A reference-counted type specification declaration.
pub type TypeSpecRc = Arc<TypeSpecDecl>;
/// A reference-counted field reference declaration.
pub type FieldRefRc = Arc<FieldRefDecl>;
/// A reference-counted method definition declaration.
pub type MethodDefRc = Arc<MethodDefDecl>;
/// A reference-counted method specification declaration.
pub type MethodSpecRc = Arc<MethodSpecDecl>;
/// A reference-counted generic parameter declaration.
pub type GenericParamRc = Arc<GenericParamDecl>;
/// A reference-counted interned user string declaration.
pub type CustomStringRc = Arc<CustomStringDecl>;

/// Common surface of every declaration stored in the metadata tables.
///
/// A declaration is identified by its token once attached to a module; detached or
/// newly-constructed declarations carry the null token in their [`TokenCell`].
pub trait Declaration: Send + Sync + 'static {
    /// The table kind this declaration belongs to.
    fn kind(&self) -> TokenKind;

    /// The mutable token slot of this declaration.
    fn token_cell(&self) -> &TokenCell;

    /// A human-readable name for diagnostics.
    fn display_name(&self) -> String;

    /// The current token; null while detached.
    fn token(&self) -> Token {
        self.token_cell().get()
    }
}

bitflags! {
    /// Attributes of a generic parameter declaration (variance and constraints).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GenericParamAttributes: u16 {
        /// The parameter is covariant
        const COVARIANT = 0x0001;
        /// The parameter is contravariant
        const CONTRAVARIANT = 0x0002;
        /// The parameter carries the reference-type (`class`) constraint
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// The parameter carries the non-nullable value-type (`struct`) constraint
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// The parameter carries the default-constructor (`new()`) constraint
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

/// The scope a type reference resolves through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionScope {
    /// The current module
    CurrentModule,
    /// Another module of the same assembly, by name
    ModuleRef(String),
    /// Another assembly, by display name
    AssemblyRef(String),
    /// Nested inside another type reference
    Nested(Token),
}

/// A type defined within this module.
pub struct TypeDefDecl {
    /// Token slot; assigned when the definition is attached to its module.
    pub token: TokenCell,
    /// Namespace of the type; empty for the global namespace.
    pub namespace: String,
    /// Simple name of the type.
    pub name: String,
    /// The type is a value type rather than a class.
    pub is_value_type: bool,
    /// Generic parameters declared by this type.
    pub generic_params: GenericParamCollection,
}

impl TypeDefDecl {
    /// Creates a detached type definition.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, is_value_type: bool) -> Self {
        TypeDefDecl {
            token: TokenCell::new(),
            namespace: namespace.into(),
            name: name.into(),
            is_value_type,
            generic_params: GenericParamCollection::new(GenericParameterKind::Type),
        }
    }

    /// The signature form of this definition.
    #[must_use]
    pub fn signature(&self) -> TypeSigRc {
        Arc::new(TypeSig::Named {
            kind: NamedTypeKind::Definition,
            token: self.token.get(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            value_type: self.is_value_type,
        })
    }

    /// The namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl Declaration for TypeDefDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::TypeDef
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.full_name()
    }
}

/// A reference to a type defined in another module.
pub struct TypeRefDecl {
    /// Token slot; assigned when the reference is attached to its module.
    pub token: TokenCell,
    /// Namespace of the type; empty for the global namespace.
    pub namespace: String,
    /// Simple name of the type.
    pub name: String,
    /// The type is a value type rather than a class.
    pub is_value_type: bool,
    /// Where the reference resolves.
    pub resolution_scope: ResolutionScope,
    /// Field references bound against this type.
    pub field_refs: FieldRefCollection,
}

impl TypeRefDecl {
    /// Creates a detached type reference.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        resolution_scope: ResolutionScope,
    ) -> Self {
        TypeRefDecl {
            token: TokenCell::new(),
            namespace: namespace.into(),
            name: name.into(),
            is_value_type: false,
            resolution_scope,
            field_refs: FieldRefCollection::new(),
        }
    }

    /// The signature form of this reference.
    #[must_use]
    pub fn signature(&self) -> TypeSigRc {
        Arc::new(TypeSig::Named {
            kind: NamedTypeKind::Reference,
            token: self.token.get(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            value_type: self.is_value_type,
        })
    }

    /// The namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Binds a field of this type by name and type.
    ///
    /// # Errors
    /// See [`FieldRefCollection::field`] for the binding outcomes.
    pub fn get_field(
        &self,
        tables: &crate::metadata::tables::ModuleTables,
        name: &str,
        field_type: &TypeSigRc,
        options: crate::metadata::tables::BindingOptions,
    ) -> crate::Result<Option<Arc<FieldRefDecl>>> {
        self.field_refs.field(
            tables,
            &self.full_name(),
            self.token.get(),
            name,
            field_type,
            options,
        )
    }
}

impl Declaration for TypeRefDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::TypeRef
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.full_name()
    }
}

/// A type specification: a constructed type signature given a token of its own.
pub struct TypeSpecDecl {
    /// Token slot; assigned when the specification is attached to its module.
    pub token: TokenCell,
    /// The wrapped signature.
    pub signature: TypeSigRc,
}

impl TypeSpecDecl {
    /// Creates a detached type specification over `signature`.
    #[must_use]
    pub fn new(signature: TypeSigRc) -> Self {
        TypeSpecDecl {
            token: TokenCell::new(),
            signature,
        }
    }
}

impl Declaration for TypeSpecDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::TypeSpec
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.signature.to_string()
    }
}

/// A reference to a field of a type in another scope.
#[derive(Debug)]
pub struct FieldRefDecl {
    /// Token slot; assigned when the reference is attached to its module.
    pub token: TokenCell,
    /// Name of the field.
    pub name: String,
    /// The field's type signature.
    pub field_type: TypeSigRc,
    /// Token of the declaring type reference; a weak back-reference, the table owns
    /// the lifetime.
    pub declaring_type: Token,
}

impl FieldRefDecl {
    /// Creates a detached field reference.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: TypeSigRc, declaring_type: Token) -> Self {
        FieldRefDecl {
            token: TokenCell::new(),
            name: name.into(),
            field_type,
            declaring_type,
        }
    }
}

impl Declaration for FieldRefDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::FieldRef
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// A method defined within this module.
pub struct MethodDefDecl {
    /// Token slot; assigned when the definition is attached to its module.
    pub token: TokenCell,
    /// Name of the method.
    pub name: String,
    /// The method's signature.
    pub signature: MethodSigRc,
    /// Generic parameters declared by this method.
    pub generic_params: GenericParamCollection,
    /// Generic instantiations of this method.
    pub method_specs: MethodSpecCollection,
}

impl MethodDefDecl {
    /// Creates a detached method definition.
    #[must_use]
    pub fn new(name: impl Into<String>, signature: MethodSigRc) -> Self {
        MethodDefDecl {
            token: TokenCell::new(),
            name: name.into(),
            signature,
            generic_params: GenericParamCollection::new(GenericParameterKind::Method),
            method_specs: MethodSpecCollection::new(),
        }
    }
}

impl Declaration for MethodDefDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::MethodDef
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// A generic method instantiation: a method plus a positional type-argument list.
pub struct MethodSpecDecl {
    /// Token slot; assigned when the specification is attached to its module.
    pub token: TokenCell,
    /// Token of the instantiated generic method.
    pub method: Token,
    /// The type arguments, in declaration order.
    pub generic_args: Vec<TypeSigRc>,
}

impl MethodSpecDecl {
    /// Creates a detached method specification.
    #[must_use]
    pub fn new(method: Token, generic_args: Vec<TypeSigRc>) -> Self {
        MethodSpecDecl {
            token: TokenCell::new(),
            method,
            generic_args,
        }
    }
}

impl Declaration for MethodSpecDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::MethodSpec
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        format!("{}<{} args>", self.method, self.generic_args.len())
    }
}

/// A generic parameter declared by a type or method.
pub struct GenericParamDecl {
    /// Token slot; assigned when the parameter is attached to its module.
    pub token: TokenCell,
    /// Zero-based ordinal, numbered left-to-right.
    pub number: u16,
    /// Variance and special-constraint attributes.
    pub flags: GenericParamAttributes,
    /// Type-level or method-level parameter.
    pub param_kind: GenericParameterKind,
    /// Name of the generic parameter.
    pub name: String,
    /// Explicit type constraints that apply to this parameter.
    pub constraints: boxcar::Vec<TypeSigRc>,
}

impl GenericParamDecl {
    /// Creates a detached generic parameter.
    #[must_use]
    pub fn new(
        number: u16,
        param_kind: GenericParameterKind,
        name: impl Into<String>,
        flags: GenericParamAttributes,
    ) -> Self {
        GenericParamDecl {
            token: TokenCell::new(),
            number,
            flags,
            param_kind,
            name: name.into(),
            constraints: boxcar::Vec::new(),
        }
    }

    /// Whether the parameter carries the reference-type constraint.
    #[must_use]
    pub fn has_reference_type_constraint(&self) -> bool {
        self.flags
            .contains(GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT)
    }
}

impl Declaration for GenericParamDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::GenericParam
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// An interned user string literal, addressed by token.
pub struct CustomStringDecl {
    /// Token slot; assigned at interning time.
    pub token: TokenCell,
    /// The UTF-16 value of the literal.
    pub value: Utf16String,
}

impl CustomStringDecl {
    /// Creates a detached user string declaration.
    #[must_use]
    pub fn new(value: Utf16String) -> Self {
        CustomStringDecl {
            token: TokenCell::new(),
            value,
        }
    }
}

impl Declaration for CustomStringDecl {
    fn kind(&self) -> TokenKind {
        TokenKind::UserString
    }

    fn token_cell(&self) -> &TokenCell {
        &self.token
    }

    fn display_name(&self) -> String {
        self.value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::signatures::IntrinsicKind;

    #[test]
    fn type_def_signature_reflects_names() {
        let def = TypeDefDecl::new("System", "Uri", false);
        assert_eq!(def.full_name(), "System.Uri");
        assert!(def.token().is_null());

        match def.signature().as_ref() {
            TypeSig::Named {
                kind,
                namespace,
                name,
                value_type,
                ..
            } => {
                assert_eq!(*kind, NamedTypeKind::Definition);
                assert_eq!(namespace, "System");
                assert_eq!(name, "Uri");
                assert!(!value_type);
            }
            other => panic!("expected named signature, got {other:?}"),
        }
    }

    #[test]
    fn global_namespace_full_name() {
        let def = TypeDefDecl::new("", "Orphan", true);
        assert_eq!(def.full_name(), "Orphan");
        assert_eq!(def.display_name(), "Orphan");
    }

    #[test]
    fn generic_param_reference_constraint_flag() {
        let plain = GenericParamDecl::new(
            0,
            GenericParameterKind::Type,
            "T",
            GenericParamAttributes::empty(),
        );
        assert!(!plain.has_reference_type_constraint());

        let constrained = GenericParamDecl::new(
            1,
            GenericParameterKind::Type,
            "TClass",
            GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT,
        );
        assert!(constrained.has_reference_type_constraint());
    }

    #[test]
    fn field_ref_display() {
        let field = FieldRefDecl::new(
            "m_count",
            Arc::new(TypeSig::Intrinsic(IntrinsicKind::I4)),
            Token::new(0x01000001),
        );
        assert_eq!(field.display_name(), "m_count");
        assert_eq!(field.kind(), TokenKind::FieldRef);
    }

    #[test]
    fn custom_string_roundtrip() {
        let decl = CustomStringDecl::new(Utf16String::from_str("hello"));
        assert_eq!(decl.display_name(), "hello");
        assert_eq!(decl.kind(), TokenKind::UserString);
    }
}
