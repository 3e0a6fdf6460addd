//! Local-variable symbols and debugging sequence points.

use std::sync::Arc;

/// A name binding for a local variable ordinal, valid within one lexical scope and
/// inherited by descendant scopes unless shadowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableSymbol {
    /// The local variable slot this symbol names.
    pub ordinal: u16,
    /// The symbol name.
    pub name: String,
}

impl LocalVariableSymbol {
    /// Creates a symbol binding.
    #[must_use]
    pub fn new(ordinal: u16, name: impl Into<String>) -> Self {
        LocalVariableSymbol {
            ordinal,
            name: name.into(),
        }
    }

    /// Synthesizes the default symbol for an undeclared ordinal.
    #[must_use]
    pub fn synthesized(ordinal: u16) -> Arc<Self> {
        Arc::new(LocalVariableSymbol {
            ordinal,
            name: format!("V_{ordinal}"),
        })
    }
}

/// A debug-info marker associating an instruction offset with a source location.
///
/// Sequence points are supplied by an external symbol provider as an ordered array
/// per method; the instruction reader attaches them to the instruction at or after
/// their offset. An ordinal of `-1` marks a hidden sequence point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePoint {
    /// Byte offset of the instruction this point is attached to.
    pub offset: u32,
    /// Index into the symbol provider's document/line table; `-1` for hidden.
    pub ordinal: i16,
}

impl SequencePoint {
    /// Whether this sequence point carries no visible source location.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.ordinal < 0
    }
}
