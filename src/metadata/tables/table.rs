//! The per-kind declaration tables.
//!
//! One growable [`DeclarationTable`] exists per token kind. Slots are indexed by row;
//! a slot may be absent (not yet resolved - resolved lazily on first access through
//! the registered row resolver), hold a live declaration, or hold a tombstone after
//! removal. Once tombstoned, a token is never reused or resurrected.
//!
//! Weakly-referenced declarations live in the upper half of the 24-bit row space - a
//! dumping ground for declarations that may or may not end up emitted - and can be
//! promoted into the real row range, re-assigning their token at promotion time.
//!
//! Table growth is append-only; there is no compaction, so a removed slot permanently
//! wastes its index. Stable token numbering outweighs density.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_skiplist::SkipMap;

use crate::metadata::tables::decls::Declaration;
use crate::metadata::token::{Token, TokenCell, TokenKind};
use crate::Result;

/// First row index of the weak pseudo-table range.
pub const WEAK_ROW_BASE: u32 = 0x0080_0000;

/// The resolver invoked on a lazy miss; an external collaborator that parses the
/// binary format. Must be idempotent per token.
pub type RowResolver<T> = Box<dyn Fn(Token) -> Result<Arc<T>> + Send + Sync>;

enum Slot<T> {
    Resolved(Arc<T>),
    Tombstone,
}

/// A growable, token-indexed table of declarations of one kind.
pub struct DeclarationTable<T: Declaration> {
    kind: TokenKind,
    slots: SkipMap<u32, Slot<T>>,
    /// Next strong row to assign; rows are 1-based.
    next_row: AtomicU32,
    /// Next weak pseudo-row to assign.
    next_weak_row: AtomicU32,
    /// Rows known to exist in the underlying binary and resolvable on demand.
    lazy_row_count: AtomicU32,
    resolver: RwLock<Option<RowResolver<T>>>,
}

impl<T: Declaration> DeclarationTable<T> {
    /// Creates an empty table for `kind`.
    #[must_use]
    pub fn new(kind: TokenKind) -> Self {
        DeclarationTable {
            kind,
            slots: SkipMap::new(),
            next_row: AtomicU32::new(1),
            next_weak_row: AtomicU32::new(WEAK_ROW_BASE),
            lazy_row_count: AtomicU32::new(0),
            resolver: RwLock::new(None),
        }
    }

    /// The token kind this table stores.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Registers the lazy row resolver and the number of rows present in the
    /// underlying binary.
    ///
    /// Rows `1..=row_count` resolve on first access; the next strong row assigned by
    /// [`DeclarationTable::add`] starts after them.
    pub fn set_resolver(&self, row_count: u32, resolver: RowResolver<T>) {
        self.lazy_row_count.store(row_count, Ordering::Release);
        self.next_row.store(row_count + 1, Ordering::Release);
        *write_lock!(self.resolver) = Some(resolver);
    }

    fn check_kind(&self, token: Token) -> Result<()> {
        if token.kind() != Some(self.kind) {
            return Err(crate::Error::TokenNotFound(token));
        }
        Ok(())
    }

    /// Resolves `token` to its declaration.
    ///
    /// An empty slot within the lazily-resolvable range invokes the registered
    /// resolver; the token is assumed well-formed because it was observed in
    /// well-formed binary data, so resolution failure is fatal, not recoverable.
    ///
    /// # Errors
    /// - [`crate::Error::TokenTombstoned`] for removed rows
    /// - [`crate::Error::TokenNotFound`] for null, foreign-kind or unknown tokens
    /// - the resolver's error when lazy resolution fails
    pub fn get(&self, token: Token) -> Result<Arc<T>> {
        if token.is_null() {
            return Err(crate::Error::TokenNotFound(token));
        }
        self.check_kind(token)?;

        let row = token.row();
        if let Some(entry) = self.slots.get(&row) {
            return match entry.value() {
                Slot::Resolved(decl) => Ok(decl.clone()),
                Slot::Tombstone => Err(crate::Error::TokenTombstoned(token)),
            };
        }

        if row <= self.lazy_row_count.load(Ordering::Acquire) {
            let resolved = {
                let guard = read_lock!(self.resolver);
                match guard.as_ref() {
                    Some(resolver) => resolver(token)?,
                    None => return Err(crate::Error::TokenNotFound(token)),
                }
            };
            resolved.token_cell().set(token);
            let entry = self
                .slots
                .get_or_insert_with(row, || Slot::Resolved(resolved));
            return match entry.value() {
                Slot::Resolved(decl) => Ok(decl.clone()),
                Slot::Tombstone => Err(crate::Error::TokenTombstoned(token)),
            };
        }

        Err(crate::Error::TokenNotFound(token))
    }

    /// Attaches a strongly-referenced declaration, assigning the next sequential row.
    ///
    /// # Errors
    /// Returns [`crate::Error::TokenAlreadyAssigned`] if the declaration already has
    /// a token - a programming error, not a user error.
    pub fn add(&self, decl: &Arc<T>) -> Result<Token> {
        self.attach(decl, &self.next_row)
    }

    /// Attaches a weakly-referenced declaration into the weak pseudo-table.
    ///
    /// # Errors
    /// Returns [`crate::Error::TokenAlreadyAssigned`] if the declaration already has
    /// a token.
    pub fn add_weak(&self, decl: &Arc<T>) -> Result<Token> {
        self.attach(decl, &self.next_weak_row)
    }

    fn attach(&self, decl: &Arc<T>, counter: &AtomicU32) -> Result<Token> {
        let cell: &TokenCell = decl.token_cell();
        if !cell.is_null() {
            return Err(crate::Error::TokenAlreadyAssigned(cell.get()));
        }

        let row = counter.fetch_add(1, Ordering::AcqRel);
        let token = Token::from_parts(self.kind, row);
        cell.set(token);
        self.slots.insert(row, Slot::Resolved(decl.clone()));
        Ok(token)
    }

    /// Promotes a weakly-referenced declaration into the strong row range,
    /// re-assigning its token.
    ///
    /// # Errors
    /// - [`crate::Error::TokenDetached`] if the declaration has no token
    /// - [`crate::Error::TokenAlreadyAssigned`] if it already holds a strong token
    pub fn promote(&self, decl: &Arc<T>) -> Result<Token> {
        let cell = decl.token_cell();
        let current = cell.get();
        if current.is_null() {
            return Err(crate::Error::TokenDetached);
        }
        if current.row() < WEAK_ROW_BASE {
            return Err(crate::Error::TokenAlreadyAssigned(current));
        }
        self.check_kind(current)?;

        // The abandoned weak row is dead for good.
        self.slots.remove(&current.row());
        self.slots.insert(current.row(), Slot::Tombstone);

        let row = self.next_row.fetch_add(1, Ordering::AcqRel);
        let token = Token::from_parts(self.kind, row);
        cell.set(token);
        self.slots.insert(row, Slot::Resolved(decl.clone()));
        Ok(token)
    }

    /// Removes a declaration, tombstoning its slot and nulling its token.
    ///
    /// The index is never reassigned by subsequent adds.
    ///
    /// # Errors
    /// - [`crate::Error::TokenDetached`] if the declaration has no token
    /// - [`crate::Error::TokenNotFound`] if the token belongs to another table
    pub fn remove(&self, decl: &Arc<T>) -> Result<()> {
        let cell = decl.token_cell();
        let token = cell.get();
        if token.is_null() {
            return Err(crate::Error::TokenDetached);
        }
        self.check_kind(token)?;

        let row = token.row();
        self.slots.remove(&row);
        self.slots.insert(row, Slot::Tombstone);
        cell.clear();
        Ok(())
    }

    /// Iterates the strongly-referenced declarations in row order, skipping
    /// tombstones and the weak pseudo-table.
    pub fn iter(&self) -> Vec<(Token, Arc<T>)> {
        self.slots
            .iter()
            .take_while(|entry| *entry.key() < WEAK_ROW_BASE)
            .filter_map(|entry| match entry.value() {
                Slot::Resolved(decl) => {
                    Some((Token::from_parts(self.kind, *entry.key()), decl.clone()))
                }
                Slot::Tombstone => None,
            })
            .collect()
    }

    /// Iterates the weak pseudo-table.
    pub fn iter_weak(&self) -> Vec<(Token, Arc<T>)> {
        self.slots
            .range(WEAK_ROW_BASE..)
            .filter_map(|entry| match entry.value() {
                Slot::Resolved(decl) => {
                    Some((Token::from_parts(self.kind, *entry.key()), decl.clone()))
                }
                Slot::Tombstone => None,
            })
            .collect()
    }

    /// Number of live strongly-referenced declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().len()
    }

    /// Whether the table holds no live strongly-referenced declarations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::decls::TypeRefDecl;
    use crate::metadata::tables::ResolutionScope;

    fn type_ref(name: &str) -> Arc<TypeRefDecl> {
        Arc::new(TypeRefDecl::new(
            "System",
            name,
            ResolutionScope::AssemblyRef("mscorlib".into()),
        ))
    }

    #[test]
    fn add_assigns_sequential_rows() {
        let table = DeclarationTable::new(TokenKind::TypeRef);

        for expected_row in 1..=3u32 {
            let decl = type_ref(&format!("T{expected_row}"));
            let token = table.add(&decl).unwrap();
            assert_eq!(token.row(), expected_row);
            assert_eq!(decl.token(), token);
        }
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn add_rejects_attached_declaration() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let decl = type_ref("Uri");

        table.add(&decl).unwrap();
        let result = table.add(&decl);
        assert!(matches!(
            result,
            Err(crate::Error::TokenAlreadyAssigned(_))
        ));
    }

    #[test]
    fn get_returns_attached_declaration() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let decl = type_ref("Uri");
        let token = table.add(&decl).unwrap();

        let found = table.get(token).unwrap();
        assert!(Arc::ptr_eq(&found, &decl));
    }

    #[test]
    fn get_rejects_null_and_foreign_tokens() {
        let table: DeclarationTable<TypeRefDecl> = DeclarationTable::new(TokenKind::TypeRef);
        assert!(table.get(Token::NULL).is_err());
        assert!(table.get(Token::new(0x02000001)).is_err());
        assert!(table.get(Token::new(0x01000005)).is_err());
    }

    #[test]
    fn remove_tombstones_and_detaches() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let decl = type_ref("Uri");
        let token = table.add(&decl).unwrap();

        table.remove(&decl).unwrap();
        assert!(decl.token().is_null());
        assert!(matches!(
            table.get(token),
            Err(crate::Error::TokenTombstoned(_))
        ));

        // Removing again fails: the declaration is detached.
        assert!(matches!(
            table.remove(&decl),
            Err(crate::Error::TokenDetached)
        ));
    }

    #[test]
    fn removed_row_is_never_reassigned() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let first = type_ref("First");
        let removed_token = table.add(&first).unwrap();
        table.remove(&first).unwrap();

        let second = type_ref("Second");
        let token = table.add(&second).unwrap();
        assert_ne!(token.row(), removed_token.row());
    }

    #[test]
    fn enumeration_skips_tombstones() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let keep = type_ref("Keep");
        let drop = type_ref("Drop");
        table.add(&keep).unwrap();
        table.add(&drop).unwrap();
        table.remove(&drop).unwrap();

        let live = table.iter();
        assert_eq!(live.len(), 1);
        assert!(Arc::ptr_eq(&live[0].1, &keep));
    }

    #[test]
    fn weak_rows_live_in_pseudo_table() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let weak = type_ref("Weak");
        let token = table.add_weak(&weak).unwrap();

        assert!(token.row() >= WEAK_ROW_BASE);
        assert!(table.iter().is_empty());
        assert_eq!(table.iter_weak().len(), 1);

        // Addressable before promotion.
        let found = table.get(token).unwrap();
        assert!(Arc::ptr_eq(&found, &weak));
    }

    #[test]
    fn promotion_reassigns_token() {
        let table = DeclarationTable::new(TokenKind::TypeRef);
        let weak = type_ref("Weak");
        let weak_token = table.add_weak(&weak).unwrap();

        let strong_token = table.promote(&weak).unwrap();
        assert!(strong_token.row() < WEAK_ROW_BASE);
        assert_eq!(weak.token(), strong_token);

        // The old weak token is dead.
        assert!(matches!(
            table.get(weak_token),
            Err(crate::Error::TokenTombstoned(_))
        ));

        // Identity preserved through promotion.
        let found = table.get(strong_token).unwrap();
        assert!(Arc::ptr_eq(&found, &weak));

        // Promoting a strong declaration is a usage error.
        assert!(matches!(
            table.promote(&weak),
            Err(crate::Error::TokenAlreadyAssigned(_))
        ));
    }

    #[test]
    fn lazy_resolution_on_miss() {
        let table: DeclarationTable<TypeRefDecl> = DeclarationTable::new(TokenKind::TypeRef);
        table.set_resolver(
            2,
            Box::new(|token| {
                Ok(Arc::new(TypeRefDecl::new(
                    "System",
                    format!("Lazy{}", token.row()),
                    ResolutionScope::CurrentModule,
                )))
            }),
        );

        let token = Token::from_parts(TokenKind::TypeRef, 2);
        let decl = table.get(token).unwrap();
        assert_eq!(decl.name, "Lazy2");
        assert_eq!(decl.token(), token);

        // Resolution happens once; repeated gets return the same instance.
        let again = table.get(token).unwrap();
        assert!(Arc::ptr_eq(&again, &decl));

        // Beyond the known row count nothing resolves.
        assert!(table.get(Token::from_parts(TokenKind::TypeRef, 3)).is_err());

        // New strong rows start after the lazily-resolvable range.
        let fresh = type_ref("Fresh");
        let fresh_token = table.add(&fresh).unwrap();
        assert_eq!(fresh_token.row(), 3);
    }
}
