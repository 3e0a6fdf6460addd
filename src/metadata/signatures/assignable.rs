//! Assignability checks across the signature model.
//!
//! Assignability is the binding-time "can a value of this shape flow into that
//! slot" predicate. For generic parameters the rule order matters and the first
//! matching rule wins: identity, then the reference-type-constraint shortcut to
//! `object`, then the explicit constraints. Constraint checks chain with
//! [`BindingOptions::DISALLOW_UNCONDITIONAL_OBJECT_ASSIGNABILITY`] once inside a
//! constraint to avoid infinite widening.

use crate::metadata::generics::GenericMap;
use crate::metadata::signatures::compare::SignatureComparison;
use crate::metadata::signatures::substitute::map_type_generic_arguments;
use crate::metadata::signatures::types::{
    naked, GenericParameterKind, IntrinsicKind, NakedTypeOptions, TypeSig, TypeSigRc,
};
use crate::metadata::tables::BindingOptions;

/// Supplies constraint information for the generic parameters in scope.
///
/// Implemented by owner-scoped generic-parameter collections; contexts without any
/// parameters in scope use [`NoConstraints`].
pub trait ConstraintSource {
    /// Whether the parameter carries the reference-type (`class`) constraint.
    fn has_reference_type_constraint(&self, kind: GenericParameterKind, ordinal: u16) -> bool;

    /// The explicit type constraints of the parameter, in declaration order.
    fn constraints(&self, kind: GenericParameterKind, ordinal: u16) -> Vec<TypeSigRc>;
}

/// A [`ConstraintSource`] for contexts with no generic parameters in scope.
pub struct NoConstraints;

impl ConstraintSource for NoConstraints {
    fn has_reference_type_constraint(&self, _kind: GenericParameterKind, _ordinal: u16) -> bool {
        false
    }

    fn constraints(&self, _kind: GenericParameterKind, _ordinal: u16) -> Vec<TypeSigRc> {
        Vec::new()
    }
}

fn is_object(sig: &TypeSig) -> bool {
    matches!(sig, TypeSig::Intrinsic(IntrinsicKind::Object))
}

pub(crate) fn is_assignable(
    sig: &TypeSigRc,
    target: &TypeSigRc,
    map: &GenericMap,
    options: BindingOptions,
    constraints: &dyn ConstraintSource,
) -> bool {
    let source = map_type_generic_arguments(sig, map);
    let target = map_type_generic_arguments(target, map);

    let source = naked(&source, NakedTypeOptions::IGNORE_ALL);
    let target = naked(&target, NakedTypeOptions::IGNORE_ALL);

    // Identity always wins.
    if source.matches(target, SignatureComparison::Reference) {
        return true;
    }

    let allow_object_top =
        !options.contains(BindingOptions::DISALLOW_UNCONDITIONAL_OBJECT_ASSIGNABILITY);

    match source.as_ref() {
        TypeSig::GenericParam { kind, ordinal } => {
            // Reference-type-constraint shortcut to object.
            if allow_object_top
                && is_object(target)
                && constraints.has_reference_type_constraint(*kind, *ordinal)
            {
                return true;
            }

            // Any explicit constraint that reaches the target makes the
            // parameter assignable; the object-top rule is disabled while
            // chasing constraints.
            let chained = options | BindingOptions::DISALLOW_UNCONDITIONAL_OBJECT_ASSIGNABILITY;
            constraints
                .constraints(*kind, *ordinal)
                .iter()
                .any(|constraint| is_assignable(constraint, target, map, chained, constraints))
        }
        TypeSig::Array {
            element,
            rank,
            dimensions,
        } => {
            if allow_object_top && is_object(target) {
                return true;
            }
            match target.as_ref() {
                TypeSig::Array {
                    element: target_element,
                    rank: target_rank,
                    dimensions: target_dimensions,
                } => {
                    rank == target_rank
                        && dimensions == target_dimensions
                        && is_assignable(element, target_element, map, options, constraints)
                }
                _ => false,
            }
        }
        _ => {
            // Every reference type flows into object unless disallowed.
            allow_object_top && is_object(target) && source.is_reference_type()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::signatures::TypeSigOps;

    struct FixedConstraints {
        reference_type: bool,
        constraints: Vec<TypeSigRc>,
    }

    impl ConstraintSource for FixedConstraints {
        fn has_reference_type_constraint(
            &self,
            _kind: GenericParameterKind,
            _ordinal: u16,
        ) -> bool {
            self.reference_type
        }

        fn constraints(&self, _kind: GenericParameterKind, _ordinal: u16) -> Vec<TypeSigRc> {
            self.constraints.clone()
        }
    }

    fn int32() -> TypeSigRc {
        Arc::new(TypeSig::Intrinsic(IntrinsicKind::I4))
    }

    fn object() -> TypeSigRc {
        Arc::new(TypeSig::Intrinsic(IntrinsicKind::Object))
    }

    fn string() -> TypeSigRc {
        Arc::new(TypeSig::Intrinsic(IntrinsicKind::String))
    }

    fn type_param(ordinal: u16) -> TypeSigRc {
        Arc::new(TypeSig::GenericParam {
            kind: GenericParameterKind::Type,
            ordinal,
        })
    }

    #[test]
    fn identity_is_assignable() {
        let map = GenericMap::identity();
        assert!(int32().is_assignable_to(&int32(), &map, BindingOptions::DEFAULT, &NoConstraints));
        assert!(
            !int32().is_assignable_to(&string(), &map, BindingOptions::DEFAULT, &NoConstraints)
        );
    }

    #[test]
    fn reference_types_flow_into_object() {
        let map = GenericMap::identity();
        assert!(
            string().is_assignable_to(&object(), &map, BindingOptions::DEFAULT, &NoConstraints)
        );

        let vector: TypeSigRc = Arc::new(TypeSig::vector(int32()));
        assert!(vector.is_assignable_to(&object(), &map, BindingOptions::DEFAULT, &NoConstraints));

        // Value types do not.
        assert!(
            !int32().is_assignable_to(&object(), &map, BindingOptions::DEFAULT, &NoConstraints)
        );
    }

    #[test]
    fn object_top_can_be_disallowed() {
        let map = GenericMap::identity();
        assert!(!string().is_assignable_to(
            &object(),
            &map,
            BindingOptions::DISALLOW_UNCONDITIONAL_OBJECT_ASSIGNABILITY,
            &NoConstraints
        ));
    }

    #[test]
    fn generic_param_reference_constraint_reaches_object() {
        let map = GenericMap::identity();

        let constrained = FixedConstraints {
            reference_type: true,
            constraints: Vec::new(),
        };
        assert!(type_param(0).is_assignable_to(
            &object(),
            &map,
            BindingOptions::DEFAULT,
            &constrained
        ));

        let unconstrained = FixedConstraints {
            reference_type: false,
            constraints: Vec::new(),
        };
        assert!(!type_param(0).is_assignable_to(
            &object(),
            &map,
            BindingOptions::DEFAULT,
            &unconstrained
        ));
    }

    #[test]
    fn generic_param_explicit_constraint_matches_target() {
        let map = GenericMap::identity();

        let constrained = FixedConstraints {
            reference_type: false,
            constraints: vec![string()],
        };
        assert!(type_param(0).is_assignable_to(
            &string(),
            &map,
            BindingOptions::DEFAULT,
            &constrained
        ));
        assert!(!type_param(0).is_assignable_to(
            &int32(),
            &map,
            BindingOptions::DEFAULT,
            &constrained
        ));
    }

    #[test]
    fn constraint_chain_disables_object_top() {
        let map = GenericMap::identity();

        // The constraint is a reference type, which WOULD reach object through the
        // unconditional rule; inside a constraint chain that rule is off, so only
        // identity counts.
        let constrained = FixedConstraints {
            reference_type: false,
            constraints: vec![string()],
        };
        assert!(!type_param(0).is_assignable_to(
            &object(),
            &map,
            BindingOptions::DEFAULT,
            &constrained
        ));
    }

    #[test]
    fn substituted_parameter_compares_as_its_argument() {
        let map = GenericMap::new(vec![int32()], Vec::new());
        assert!(type_param(0).is_assignable_to(
            &int32(),
            &map,
            BindingOptions::DEFAULT,
            &NoConstraints
        ));
    }

    #[test]
    fn array_element_assignability() {
        let map = GenericMap::identity();
        let strings: TypeSigRc = Arc::new(TypeSig::vector(string()));
        let objects: TypeSigRc = Arc::new(TypeSig::vector(object()));

        assert!(strings.is_assignable_to(&objects, &map, BindingOptions::DEFAULT, &NoConstraints));
        assert!(!objects.is_assignable_to(&strings, &map, BindingOptions::DEFAULT, &NoConstraints));
    }
}
