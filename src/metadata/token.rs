//! Metadata tokens: typed `(kind, row)` identifiers of declarations.
//!
//! A [`Token`] addresses one declaration within a module's metadata tables. The
//! null token is the sentinel carried by detached declarations; attaching a
//! declaration to a table assigns it a non-null token that stays unique within its
//! kind for the lifetime of the module.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use strum::{EnumCount, EnumIter};

/// The declaration kinds a [`Token`] can address.
///
/// Each variant corresponds to one metadata table; the numeric values are the
/// table numbers of the binary format, so the high byte of a raw token value
/// converts directly into a `TokenKind`.
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TokenKind {
    /// `Module` (0x00) - The module declaration itself.
    Module = 0x00,
    /// `TypeRef` (0x01) - References to types defined in other modules.
    TypeRef = 0x01,
    /// `TypeDef` (0x02) - Types defined within this module.
    TypeDef = 0x02,
    /// `FieldDef` (0x04) - Field definitions within types.
    FieldDef = 0x04,
    /// `MethodDef` (0x06) - Method definitions within types.
    MethodDef = 0x06,
    /// `Param` (0x08) - Method parameter declarations.
    Param = 0x08,
    /// `FieldRef` (0x0A) - References to fields of types in other scopes.
    FieldRef = 0x0A,
    /// `Property` (0x17) - Property declarations.
    Property = 0x17,
    /// `TypeSpec` (0x1B) - Type specifications wrapping constructed type signatures.
    TypeSpec = 0x1B,
    /// `GenericParam` (0x2A) - Generic parameter declarations of types and methods.
    GenericParam = 0x2A,
    /// `MethodSpec` (0x2B) - Generic method instantiations.
    MethodSpec = 0x2B,
    /// `UserString` (0x70) - Interned user string literals.
    UserString = 0x70,
}

impl TokenKind {
    /// Converts a raw table byte into a `TokenKind`, if it names a known table.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<TokenKind> {
        match value {
            0x00 => Some(TokenKind::Module),
            0x01 => Some(TokenKind::TypeRef),
            0x02 => Some(TokenKind::TypeDef),
            0x04 => Some(TokenKind::FieldDef),
            0x06 => Some(TokenKind::MethodDef),
            0x08 => Some(TokenKind::Param),
            0x0A => Some(TokenKind::FieldRef),
            0x17 => Some(TokenKind::Property),
            0x1B => Some(TokenKind::TypeSpec),
            0x2A => Some(TokenKind::GenericParam),
            0x2B => Some(TokenKind::MethodSpec),
            0x70 => Some(TokenKind::UserString),
            _ => None,
        }
    }
}

/// A metadata token identifying a declaration within a module.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the declaration kind
/// - The low 24 bits (bits 0-23) indicate the row index within that kind's table
///
/// Row indices are 1-based; the all-zero value is the null sentinel carried by
/// detached declarations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// The null token sentinel.
    pub const NULL: Token = Token(0);

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a kind and a 1-based row index.
    #[must_use]
    pub fn from_parts(kind: TokenKind, row: u32) -> Self {
        Token(((kind as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the declaration kind from the token (high byte), if known.
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_byte((self.0 >> 24) as u8)
    }

    /// Extracts the raw table byte from the token.
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is the null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// The mutable token slot carried by every declaration.
///
/// A freshly constructed declaration holds the null token; attaching it to a
/// table assigns a real token, and removing it from the table nulls the slot
/// again. The raw value is atomic so declarations can stay `Sync` without a
/// lock around a single word.
#[derive(Debug, Default)]
pub struct TokenCell {
    raw: AtomicU32,
}

impl TokenCell {
    /// Creates a cell holding the null token.
    #[must_use]
    pub fn new() -> Self {
        TokenCell {
            raw: AtomicU32::new(0),
        }
    }

    /// Creates a cell already holding `token`.
    #[must_use]
    pub fn with_token(token: Token) -> Self {
        TokenCell {
            raw: AtomicU32::new(token.0),
        }
    }

    /// Reads the current token.
    #[must_use]
    pub fn get(&self) -> Token {
        Token(self.raw.load(Ordering::Acquire))
    }

    /// Stores a new token value.
    pub fn set(&self, token: Token) {
        self.raw.store(token.0, Ordering::Release);
    }

    /// Resets the cell back to the null token.
    pub fn clear(&self) {
        self.raw.store(0, Ordering::Release);
    }

    /// Returns true while the cell holds the null token.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.raw.load(Ordering::Acquire) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_new() {
        let token = Token::new(0x06000001);
        assert_eq!(token.value(), 0x06000001);
    }

    #[test]
    fn test_token_from_parts() {
        let token = Token::from_parts(TokenKind::TypeDef, 5);
        assert_eq!(token.value(), 0x02000005);
        assert_eq!(token.kind(), Some(TokenKind::TypeDef));
        assert_eq!(token.row(), 5);
    }

    #[test]
    fn test_token_kind() {
        assert_eq!(Token(0x06000001).kind(), Some(TokenKind::MethodDef));
        assert_eq!(Token(0x02000005).kind(), Some(TokenKind::TypeDef));
        assert_eq!(Token(0x70000001).kind(), Some(TokenKind::UserString));
        assert_eq!(Token(0xFF000001).kind(), None);
    }

    #[test]
    fn test_token_row() {
        assert_eq!(Token(0x06000001).row(), 1);
        assert_eq!(Token(0x02000005).row(), 5);
        assert_eq!(Token(0x06FFFFFF).row(), 0x00FFFFFF);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0x00000000).is_null());
        assert!(Token::NULL.is_null());
        assert!(!Token(0x06000001).is_null());
    }

    #[test]
    fn test_token_from_conversion() {
        let value = 0x06000001u32;
        let token: Token = value.into();
        assert_eq!(token.value(), value);

        let back_to_u32: u32 = token.into();
        assert_eq!(back_to_u32, value);
    }

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token(0x06000001)), "0x06000001");
        assert_eq!(format!("{}", Token(0x00000000)), "0x00000000");
    }

    #[test]
    fn test_token_debug() {
        let debug_str = format!("{:?}", Token(0x06000001));
        assert!(debug_str.contains("Token(0x06000001"));
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }

    #[test]
    fn test_token_ordering() {
        let token1 = Token(0x06000001);
        let token2 = Token(0x06000002);
        let token3 = Token(0x07000001);

        assert!(token1 < token2);
        assert!(token2 < token3);
        assert!(token1 < token3);
    }

    #[test]
    fn test_token_hash() {
        let mut map = HashMap::new();
        map.insert(Token(0x06000001), "Method1");
        map.insert(Token(0x06000002), "Method2");

        assert_eq!(map.get(&Token(0x06000001)), Some(&"Method1"));
        assert_eq!(map.get(&Token(0x06000002)), Some(&"Method2"));
    }

    #[test]
    fn test_token_kind_from_byte_roundtrip() {
        use strum::IntoEnumIterator;

        for kind in TokenKind::iter() {
            assert_eq!(TokenKind::from_byte(kind as u8), Some(kind));
        }
        assert_eq!(TokenKind::from_byte(0x03), None);
    }

    #[test]
    fn test_token_cell_lifecycle() {
        let cell = TokenCell::new();
        assert!(cell.is_null());

        cell.set(Token(0x0A000001));
        assert!(!cell.is_null());
        assert_eq!(cell.get(), Token(0x0A000001));

        cell.clear();
        assert!(cell.is_null());
        assert_eq!(cell.get(), Token::NULL);
    }
}
