use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The taxonomy follows the three failure classes of the object model:
///
/// # Binding errors (recoverable)
///
/// Raised by lookups that bind names, signatures or generic-argument lists to declarations.
/// Every binding operation also accepts [`crate::metadata::tables::BindingOptions::DONT_THROW`],
/// which converts this class into an `Ok(None)` return for speculative lookups.
///
/// - [`Error::MemberNotFound`] - Requested declaration not present and creation not permitted
/// - [`Error::MemberSignatureMismatch`] - Found by name, but with an incompatible signature
/// - [`Error::AmbiguousMatch`] - More than one candidate satisfied the lookup
///
/// # Structural/usage errors (programming errors)
///
/// Violations of the model's own invariants. These are fatal and carry a descriptive message;
/// they are never caught internally.
///
/// - [`Error::TokenAlreadyAssigned`] - Attaching a declaration that already has a token
/// - [`Error::TokenDetached`] - Operating on a declaration with the null token
/// - [`Error::TokenNotFound`] - No declaration exists for the given token
/// - [`Error::TokenTombstoned`] - The token was removed and can never be resurrected
/// - [`Error::GenericParameterBound`] - Generic-parameter ordinal beyond the fixed maximum
/// - [`Error::BlockConstraint`] - Instruction-block tree invariant violated
/// - [`Error::ReaderDiscipline`] - Instruction reader enter/leave order violated
/// - [`Error::BookmarkMismatch`] - Bookmark restored into the wrong sequence or reader
///
/// # Binary corruption errors (fatal, externally caused)
///
/// - [`Error::Malformed`] - Corrupted instruction stream or metadata blob
/// - [`Error::OutOfBounds`] - Attempted to read beyond buffer boundaries
/// - [`Error::Empty`] - Empty input provided
#[derive(Error, Debug)]
pub enum Error {
    /// The binary data is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A requested member declaration was not found.
    ///
    /// Raised by binding lookups whose existence policy forbids creation. The fields
    /// name the owner and the member so the caller can diagnose the failed binding.
    #[error("Member '{name}' not found on '{owner}'")]
    MemberNotFound {
        /// Display name of the owning declaration
        owner: String,
        /// Name of the member that was requested
        name: String,
    },

    /// A member with the requested name exists, but its signature does not match.
    #[error("Member '{name}' on '{owner}' exists with a different signature")]
    MemberSignatureMismatch {
        /// Display name of the owning declaration
        owner: String,
        /// Name of the member that was requested
        name: String,
    },

    /// More than one declaration satisfied a binding lookup.
    #[error("Ambiguous match - {0}")]
    AmbiguousMatch(String),

    /// The binding options combine flags that contradict each other.
    ///
    /// The genericity axis is mutually exclusive: a lookup asks for the generic
    /// definition or for a generic instance, never both.
    #[error("{0}")]
    BindingConflict(String),

    /// Failed to find a declaration for the given token.
    ///
    /// Tokens observed in well-formed binary data always resolve; hitting this error
    /// means the token was fabricated or the owning table was never populated.
    #[error("Failed to find a declaration for token {0}")]
    TokenNotFound(Token),

    /// The slot for this token holds a tombstone.
    ///
    /// Removed declarations permanently waste their index; a tombstoned token is
    /// never reused or resurrected.
    #[error("Token {0} has been removed and cannot be accessed")]
    TokenTombstoned(Token),

    /// Attempted to attach a declaration that already carries a token.
    #[error("Declaration already owns token {0}")]
    TokenAlreadyAssigned(Token),

    /// The operation requires an attached declaration, but the token is null.
    #[error("Declaration is detached (null token)")]
    TokenDetached,

    /// Generic-parameter ordinal beyond the preallocated maximum.
    ///
    /// The declaration cache preallocates 256 placeholder singletons per kind; this
    /// is a hard design limit, not a recoverable condition.
    #[error("Generic parameter ordinal {0} exceeds the fixed maximum of 256")]
    GenericParameterBound(u16),

    /// An instruction-block tree invariant was violated.
    ///
    /// Covers the child-blocks-XOR-sequences exclusivity rule, detaching a block that
    /// is the root of an exception handler, splitting the root block, and handler
    /// siblinghood validation.
    #[error("{0}")]
    BlockConstraint(String),

    /// The instruction reader was driven out of its enter/leave stack discipline.
    #[error("{0}")]
    ReaderDiscipline(String),

    /// A bookmark was restored into a different sequence or reader than it was taken from.
    #[error("Bookmark does not belong to this reader and sequence")]
    BookmarkMismatch,

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,
}
