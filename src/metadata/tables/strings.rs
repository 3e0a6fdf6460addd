//! The interned user-string table.
//!
//! User string literals are addressed by token and interned by value: the first
//! occurrence of a value creates a [`CustomStringDecl`], and subsequent equal values
//! reuse the same token.

use std::sync::Arc;

use dashmap::DashMap;
use widestring::Utf16String;

use crate::metadata::tables::decls::{CustomStringDecl, CustomStringRc};
use crate::metadata::tables::table::DeclarationTable;
use crate::metadata::token::{Token, TokenKind};
use crate::Result;

/// Token-addressed, value-interned storage for user string literals.
pub struct UserStringTable {
    table: DeclarationTable<CustomStringDecl>,
    by_value: DashMap<Utf16String, Token>,
}

impl UserStringTable {
    /// Creates an empty user-string table.
    #[must_use]
    pub fn new() -> Self {
        UserStringTable {
            table: DeclarationTable::new(TokenKind::UserString),
            by_value: DashMap::new(),
        }
    }

    /// Interns `value`, returning the existing declaration for equal values.
    ///
    /// # Errors
    /// Propagates table attachment failures.
    pub fn intern(&self, value: &str) -> Result<CustomStringRc> {
        let utf16 = Utf16String::from_str(value);
        if let Some(token) = self.by_value.get(&utf16) {
            return self.table.get(*token);
        }

        let decl = Arc::new(CustomStringDecl::new(utf16.clone()));
        let token = self.table.add(&decl)?;
        self.by_value.insert(utf16, token);
        Ok(decl)
    }

    /// Resolves a user-string token.
    ///
    /// # Errors
    /// Returns [`crate::Error::TokenNotFound`] for unknown tokens.
    pub fn get(&self, token: Token) -> Result<CustomStringRc> {
        self.table.get(token)
    }

    /// Number of distinct interned values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no values have been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for UserStringTable {
    fn default() -> Self {
        UserStringTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::decls::Declaration;

    #[test]
    fn interning_reuses_tokens_for_equal_values() {
        let strings = UserStringTable::new();

        let first = strings.intern("hello").unwrap();
        let second = strings.intern("hello").unwrap();
        let other = strings.intern("world").unwrap();

        assert_eq!(first.token(), second.token());
        assert!(Arc::ptr_eq(&first, &second));
        assert_ne!(first.token(), other.token());
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn lookup_by_token() {
        let strings = UserStringTable::new();
        let decl = strings.intern("payload").unwrap();

        let found = strings.get(decl.token()).unwrap();
        assert_eq!(found.value.to_string(), "payload");

        assert!(strings.get(Token::new(0x70000099)).is_err());
    }

    #[test]
    fn empty_string_interns() {
        let strings = UserStringTable::new();
        let decl = strings.intern("").unwrap();
        assert_eq!(decl.value.to_string(), "");
        assert_eq!(strings.intern("").unwrap().token(), decl.token());
    }
}
