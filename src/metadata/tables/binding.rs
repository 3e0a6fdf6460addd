//! Binding options for declaration lookups.
//!
//! Every named or keyed sub-collection (fields, generic parameters, method specs,
//! type specs) follows one binding protocol parameterized by [`BindingOptions`], a
//! flag set with independent axes:
//!
//! - *Existence*: default get-or-create, [`BindingOptions::ONLY_EXISTING`], or
//!   [`BindingOptions::WEAK_REFERENCE`]
//! - *Error behavior*: [`BindingOptions::DONT_THROW`] converts binding errors into
//!   `Ok(None)` returns for speculative lookups
//! - *Genericity*: [`BindingOptions::REQUIRE_GENERIC_DEFINITION`] vs.
//!   [`BindingOptions::REQUIRE_GENERIC_INSTANCE`], mutually exclusive, mandatory
//!   whenever the queried member belongs to a generic declaring type or method
//! - *Substitution*: [`BindingOptions::DISALLOW_INTRINSIC_SUBSTITUTION`] forces a
//!   primitive's full named-class form

use bitflags::bitflags;

bitflags! {
    /// Flags steering the behavior of binding lookups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindingOptions: u16 {
        /// Get-or-create: missing declarations are constructed and inserted.
        const DEFAULT = 0x0000;
        /// Fail (or return `None` under [`BindingOptions::DONT_THROW`]) when the
        /// declaration does not already exist.
        const ONLY_EXISTING = 0x0001;
        /// Create missing declarations as weakly referenced.
        const WEAK_REFERENCE = 0x0002;
        /// Return `None` instead of raising a binding error.
        const DONT_THROW = 0x0004;
        /// The queried member must be bound against the generic definition.
        const REQUIRE_GENERIC_DEFINITION = 0x0008;
        /// The queried member must be bound against a generic instance.
        const REQUIRE_GENERIC_INSTANCE = 0x0010;
        /// Resolve a primitive through its full named-class form rather than its
        /// intrinsic shorthand. Required when binding *members* of a primitive,
        /// since accessor methods are defined on the boxed class.
        const DISALLOW_INTRINSIC_SUBSTITUTION = 0x0020;
        /// Forbid the unconditional "anything assignable to object" rule during
        /// assignability checks; set automatically while checking generic-parameter
        /// constraints to avoid infinite widening.
        const DISALLOW_UNCONDITIONAL_OBJECT_ASSIGNABILITY = 0x0040;
    }
}

impl BindingOptions {
    /// Whether missing declarations may be created under these options.
    #[must_use]
    pub fn allows_creation(&self) -> bool {
        !self.contains(BindingOptions::ONLY_EXISTING)
    }

    /// Rejects contradictory flag combinations.
    ///
    /// The genericity axis is mutually exclusive; asking for both the generic
    /// definition and a generic instance is a programming error, not a failed
    /// lookup, so it raises regardless of [`BindingOptions::DONT_THROW`].
    ///
    /// # Errors
    /// - [`crate::Error::BindingConflict`] when both genericity flags are set
    pub fn validate(&self) -> crate::Result<()> {
        if self.contains(
            BindingOptions::REQUIRE_GENERIC_DEFINITION | BindingOptions::REQUIRE_GENERIC_INSTANCE,
        ) {
            return Err(crate::Error::BindingConflict(
                "REQUIRE_GENERIC_DEFINITION and REQUIRE_GENERIC_INSTANCE are mutually exclusive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BindingOptions {
    fn default() -> Self {
        BindingOptions::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_creation() {
        assert!(BindingOptions::DEFAULT.allows_creation());
        assert!(BindingOptions::WEAK_REFERENCE.allows_creation());
        assert!(!BindingOptions::ONLY_EXISTING.allows_creation());
    }

    #[test]
    fn axes_compose() {
        let options = BindingOptions::ONLY_EXISTING | BindingOptions::DONT_THROW;
        assert!(options.contains(BindingOptions::ONLY_EXISTING));
        assert!(options.contains(BindingOptions::DONT_THROW));
        assert!(!options.contains(BindingOptions::REQUIRE_GENERIC_INSTANCE));
    }

    #[test]
    fn genericity_axis_is_exclusive() {
        assert!(BindingOptions::REQUIRE_GENERIC_DEFINITION.validate().is_ok());
        assert!(BindingOptions::REQUIRE_GENERIC_INSTANCE.validate().is_ok());

        let conflicting =
            BindingOptions::REQUIRE_GENERIC_DEFINITION | BindingOptions::REQUIRE_GENERIC_INSTANCE;
        assert!(matches!(
            conflicting.validate(),
            Err(crate::Error::BindingConflict(_))
        ));
    }
}
