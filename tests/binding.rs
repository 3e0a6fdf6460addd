//! Integration tests for the binding protocol across modules, tables and
//! collections.
//!
//! These exercise realistic get-or-create scenarios: speculative lookups, weak
//! references with later promotion, and the deduplication indices of type and
//! method specifications.

use std::sync::Arc;

use cilforge::prelude::*;

fn new_module() -> CilModule {
    CilModule::new("scenario.dll")
}

/// A field bound by name and type is created on miss, and a second binding with a
/// different type under DONT_THROW returns `None` rather than raising.
#[test]
fn field_binding_creates_on_miss() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);
    let string = module.cache().intrinsic(IntrinsicKind::String);

    let uri = module
        .type_ref(
            "System",
            "Uri",
            ResolutionScope::AssemblyRef("System".into()),
            BindingOptions::DEFAULT,
        )?
        .expect("created on demand");

    // Created on miss, with a real token.
    let field = uri
        .get_field(module.tables(), "X", &int32, BindingOptions::DEFAULT)?
        .expect("created on demand");
    assert_eq!(field.name, "X");
    assert!(!field.token().is_null());

    // Same name, same type: the same object comes back.
    let again = uri
        .get_field(module.tables(), "X", &int32, BindingOptions::DEFAULT)?
        .unwrap();
    assert!(Arc::ptr_eq(&field, &again));

    // Same name, different type: null under DONT_THROW...
    let mismatch = uri.get_field(
        module.tables(),
        "X",
        &string,
        BindingOptions::DONT_THROW,
    )?;
    assert!(mismatch.is_none());

    // ...and a descriptive binding error without it.
    let error = uri
        .get_field(module.tables(), "X", &string, BindingOptions::DEFAULT)
        .unwrap_err();
    assert!(matches!(error, Error::MemberSignatureMismatch { .. }));
    Ok(())
}

/// ONLY_EXISTING forbids creation; DONT_THROW turns the failure into `None`.
#[test]
fn only_existing_respects_error_axis() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);

    let uri = module
        .type_ref(
            "System",
            "Uri",
            ResolutionScope::AssemblyRef("System".into()),
            BindingOptions::DEFAULT,
        )?
        .unwrap();

    let missing = uri.get_field(
        module.tables(),
        "Absent",
        &int32,
        BindingOptions::ONLY_EXISTING | BindingOptions::DONT_THROW,
    )?;
    assert!(missing.is_none());

    let error = uri
        .get_field(
            module.tables(),
            "Absent",
            &int32,
            BindingOptions::ONLY_EXISTING,
        )
        .unwrap_err();
    assert!(matches!(error, Error::MemberNotFound { .. }));
    Ok(())
}

/// Weakly-created declarations live in the pseudo-table until promoted, keeping
/// their identity across the promotion.
#[test]
fn weak_field_promotion() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);

    let uri = module
        .type_ref(
            "System",
            "Uri",
            ResolutionScope::AssemblyRef("System".into()),
            BindingOptions::DEFAULT,
        )?
        .unwrap();

    let field = uri
        .get_field(
            module.tables(),
            "m_syntax",
            &int32,
            BindingOptions::WEAK_REFERENCE,
        )?
        .unwrap();
    let weak_token = field.token();
    assert!(weak_token.row() >= WEAK_ROW_BASE);
    assert!(module.tables().field_refs.iter().is_empty());

    let strong_token = module.tables().field_refs.promote(&field)?;
    assert!(strong_token.row() < WEAK_ROW_BASE);
    assert_ne!(weak_token, strong_token);

    // The binding still returns the same declaration.
    let again = uri
        .get_field(module.tables(), "m_syntax", &int32, BindingOptions::DEFAULT)?
        .unwrap();
    assert!(Arc::ptr_eq(&field, &again));
    assert_eq!(again.token(), strong_token);
    Ok(())
}

/// Token monotonicity and tombstone behavior across a table's lifetime.
#[test]
fn token_monotonicity_and_tombstones() -> Result<()> {
    let module = new_module();
    let tables = module.tables();

    let decls: Vec<TypeRefRc> = (0..4)
        .map(|i| {
            Arc::new(TypeRefDecl::new(
                "System",
                format!("T{i}"),
                ResolutionScope::CurrentModule,
            ))
        })
        .collect();
    for (i, decl) in decls.iter().enumerate() {
        let token = tables.type_refs.add(decl)?;
        assert_eq!(token.row() as usize, i + 1);
    }

    let removed = &decls[1];
    let removed_token = removed.token();
    tables.type_refs.remove(removed)?;
    assert!(removed.token().is_null());
    assert!(matches!(
        tables.type_refs.get(removed_token),
        Err(Error::TokenTombstoned(_))
    ));

    // The freed index is never reassigned.
    let fresh = Arc::new(TypeRefDecl::new(
        "System",
        "Fresh",
        ResolutionScope::CurrentModule,
    ));
    let token = tables.type_refs.add(&fresh)?;
    assert_eq!(token.row(), 5);
    Ok(())
}

/// Method specifications match their whole argument list positionally.
#[test]
fn method_spec_binding_matches_full_argument_list() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);
    let string = module.cache().intrinsic(IntrinsicKind::String);

    let method = Arc::new(MethodDefDecl::new(
        "Create",
        Arc::new(MethodSig {
            has_this: false,
            explicit_this: false,
            vararg: false,
            generic_arity: 2,
            return_type: module.cache().intrinsic(IntrinsicKind::Void),
            params: Vec::new(),
            varargs: Vec::new(),
        }),
    ));
    module.tables().method_defs.add(&method)?;

    let args = vec![int32.clone(), string.clone()];
    let spec = method
        .method_specs
        .instance(
            module.tables(),
            method.token(),
            &method.name,
            &args,
            BindingOptions::DEFAULT,
        )?
        .unwrap();

    // Same arguments: deduplicated.
    let again = method
        .method_specs
        .instance(
            module.tables(),
            method.token(),
            &method.name,
            &args,
            BindingOptions::DEFAULT,
        )?
        .unwrap();
    assert!(Arc::ptr_eq(&spec, &again));

    // Same count, different argument: a distinct instantiation.
    let other_args = vec![int32.clone(), int32.clone()];
    let other = method
        .method_specs
        .instance(
            module.tables(),
            method.token(),
            &method.name,
            &other_args,
            BindingOptions::DEFAULT,
        )?
        .unwrap();
    assert!(!Arc::ptr_eq(&spec, &other));
    assert_eq!(method.method_specs.count()?, 2);
    Ok(())
}

/// Type specifications deduplicate by strict structural identity.
#[test]
fn type_spec_deduplication() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);

    let vector: TypeSigRc = Arc::new(TypeSig::vector(int32.clone()));
    let spec = module
        .type_specs()
        .spec(module.tables(), &vector, BindingOptions::DEFAULT)?
        .unwrap();

    // A structurally equal signature binds to the same specification.
    let explicit: TypeSigRc = Arc::new(TypeSig::Array {
        element: int32.clone(),
        rank: 1,
        dimensions: vec![ArrayDimension::default()],
    });
    let same = module
        .type_specs()
        .spec(module.tables(), &explicit, BindingOptions::DEFAULT)?
        .unwrap();
    assert!(Arc::ptr_eq(&spec, &same));

    // ONLY_EXISTING finds it without creating.
    let found = module.type_specs().spec(
        module.tables(),
        &vector,
        BindingOptions::ONLY_EXISTING,
    )?;
    assert!(found.is_some());
    assert_eq!(module.type_specs().count(), 1);
    Ok(())
}

/// Lazily-backed collections import exactly once, before the first real use.
#[test]
fn lazy_collection_imports_once() -> Result<()> {
    let module = new_module();
    let int32 = module.cache().intrinsic(IntrinsicKind::I4);

    let uri = module
        .type_ref(
            "System",
            "Uri",
            ResolutionScope::AssemblyRef("System".into()),
            BindingOptions::DEFAULT,
        )?
        .unwrap();

    let seeded = Arc::new(FieldRefDecl::new(
        "m_string",
        int32.clone(),
        uri.token(),
    ));
    module.tables().field_refs.add(&seeded)?;
    let loaded = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    {
        let seeded = seeded.clone();
        let loaded = loaded.clone();
        uri.field_refs.set_loader(Box::new(move || {
            loaded.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![seeded.clone()])
        }));
    }
    assert!(uri.field_refs.supports_lazy_loading());

    // The import runs on first access and the seeded field is found, not recreated.
    let found = uri
        .get_field(module.tables(), "m_string", &int32, BindingOptions::DEFAULT)?
        .unwrap();
    assert!(Arc::ptr_eq(&found, &seeded));

    uri.get_field(module.tables(), "m_string", &int32, BindingOptions::DEFAULT)?;
    assert_eq!(loaded.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(!uri.field_refs.supports_lazy_loading());
    Ok(())
}

/// User strings intern by value and resolve by token.
#[test]
fn user_string_interning() -> Result<()> {
    let module = new_module();
    let strings = &module.tables().user_strings;

    let hello = strings.intern("hello")?;
    let again = strings.intern("hello")?;
    let other = strings.intern("goodbye")?;

    assert_eq!(hello.token(), again.token());
    assert_ne!(hello.token(), other.token());

    let resolved = strings.get(hello.token())?;
    assert_eq!(resolved.value.to_string(), "hello");
    Ok(())
}
