//! The symbol store and its ordered sets.
//!
//! Every terminal, nonterminal, and named regex definition is interned once;
//! identity is (kind, name). Each symbol gets a monotonically increasing
//! `order` which doubles as its arena index and as the sort key of
//! [`SymbolSet`]. Marker terminals created during lookahead construction
//! live in the arena without a name-table entry, so they compare and sort
//! like any other symbol.

use crate::regex::TreeNode;
use crate::types::Map;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolId(u32);

impl SymbolId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Definition,
    Terminal,
    Nonterminal,
}

/// Special-handling flag bits for tokens.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TokenFlags(u16);

impl TokenFlags {
    pub const INSTALL: TokenFlags = TokenFlags(0x0001);
    pub const LEFT: TokenFlags = TokenFlags(0x0002);
    pub const RIGHT: TokenFlags = TokenFlags(0x0004);
    pub const NONE: TokenFlags = TokenFlags(0x0008);
    pub const CASE: TokenFlags = TokenFlags(0x0010);
    pub const ALIAS: TokenFlags = TokenFlags(0x0020);
    pub const EMPTY: TokenFlags = TokenFlags(0x0040);

    pub const ASSOCIATIVITY: TokenFlags = TokenFlags(0x0002 | 0x0004 | 0x0008);

    pub fn contains(self, other: TokenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TokenFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: TokenFlags) {
        self.0 |= other.0;
    }

    pub fn mask(self, other: TokenFlags) -> TokenFlags {
        TokenFlags(self.0 & other.0)
    }
}

/// Values carried by a terminal or nonterminal.
#[derive(Debug, Clone)]
pub struct TokenValue {
    /// Token number handed to the scanner and parser. 0 marks an
    /// ignored-regex placeholder.
    pub token: i32,
    pub flags: TokenFlags,
    /// Precedence for ambiguity resolution.
    pub precedence: i32,
    /// Error repair insertion cost.
    pub insert: i32,
    /// Error repair deletion cost.
    pub delete: i32,
}

impl Default for TokenValue {
    fn default() -> Self {
        TokenValue {
            token: 0,
            flags: TokenFlags::default(),
            precedence: 0,
            insert: 1,
            delete: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SymbolValue {
    Token(TokenValue),
    /// The regex tree of a DEFINE entry.
    Tree(Option<TreeNode>),
}

#[derive(Debug, Clone)]
pub struct SymbolData {
    pub name: String,
    pub kind: SymbolKind,
    /// Base terminal when this symbol is an alias.
    pub alias: Option<SymbolId>,
    pub value: SymbolValue,
}

/// What [`SymbolTable::lookup`] should do when the name is missing or
/// present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LookupAction {
    Lookup,
    Insert,
    Delete,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    arena: Vec<SymbolData>,
    names: Map<(SymbolKind, String), SymbolId>,
}

impl SymbolTable {
    /// Find, intern, or remove a symbol by (name, kind).
    pub fn lookup(&mut self, name: &str, kind: SymbolKind, action: LookupAction) -> Option<SymbolId> {
        let key = (kind, name.to_owned());
        match (self.names.get(&key), action) {
            (Some(&id), LookupAction::Delete) => {
                // The arena entry stays so that outstanding ids remain
                // valid; only the name binding goes away.
                self.names.swap_remove(&key);
                Some(id)
            }
            (Some(&id), _) => Some(id),
            (None, LookupAction::Insert) => {
                let value = match kind {
                    SymbolKind::Definition => SymbolValue::Tree(None),
                    _ => SymbolValue::Token(TokenValue::default()),
                };
                let id = self.alloc(name, kind, value);
                self.names.insert(key, id);
                Some(id)
            }
            (None, _) => None,
        }
    }

    /// Allocate a symbol with the next `order`, outside the name table.
    /// Lookahead construction uses this for its marker terminals.
    pub fn alloc(&mut self, name: &str, kind: SymbolKind, value: SymbolValue) -> SymbolId {
        let id = SymbolId(self.arena.len() as u32);
        self.arena.push(SymbolData {
            name: name.to_owned(),
            kind,
            alias: None,
            value,
        });
        id
    }

    pub fn get(&self, id: SymbolId) -> &SymbolData {
        &self.arena[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolData {
        &mut self.arena[id.0 as usize]
    }

    /// Token values of a terminal or nonterminal.
    pub fn token(&self, id: SymbolId) -> &TokenValue {
        match &self.get(id).value {
            SymbolValue::Token(value) => value,
            SymbolValue::Tree(_) => panic!("definition symbol has no token value"),
        }
    }

    pub fn token_mut(&mut self, id: SymbolId) -> &mut TokenValue {
        match &mut self.get_mut(id).value {
            SymbolValue::Token(value) => value,
            SymbolValue::Tree(_) => panic!("definition symbol has no token value"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &SymbolData)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(i, data)| (SymbolId(i as u32), data))
    }
}

/// An ordered set of symbols, sorted by `order`. Union and intersection are
/// linear merges; membership is a binary search.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SymbolSet {
    items: Vec<SymbolId>,
}

impl SymbolSet {
    pub fn new() -> Self {
        SymbolSet::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.items.iter().copied()
    }

    pub fn as_slice(&self) -> &[SymbolId] {
        &self.items
    }

    pub fn find(&self, id: SymbolId) -> Option<usize> {
        self.items.binary_search(&id).ok()
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.find(id).is_some()
    }

    pub fn insert(&mut self, id: SymbolId) -> bool {
        match self.items.binary_search(&id) {
            Ok(_) => false,
            Err(at) => {
                self.items.insert(at, id);
                true
            }
        }
    }

    pub fn delete(&mut self, id: SymbolId) -> bool {
        match self.items.binary_search(&id) {
            Ok(at) => {
                self.items.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    pub fn union(&self, other: &SymbolSet) -> SymbolSet {
        let mut merged = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.items.len() && j < other.items.len() {
            match self.items[i].cmp(&other.items[j]) {
                std::cmp::Ordering::Less => {
                    merged.push(self.items[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(other.items[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(self.items[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.items[i..]);
        merged.extend_from_slice(&other.items[j..]);
        SymbolSet { items: merged }
    }

    pub fn union_with(&mut self, other: &SymbolSet) -> bool {
        if other.items.iter().all(|id| self.contains(*id)) {
            return false;
        }
        *self = self.union(other);
        true
    }

    pub fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        let mut merged = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.items.len() && j < other.items.len() {
            match self.items[i].cmp(&other.items[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    merged.push(self.items[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        SymbolSet { items: merged }
    }

    pub fn intersects(&self, other: &SymbolSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.items.len() && j < other.items.len() {
            match self.items[i].cmp(&other.items[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

impl FromIterator<SymbolId> for SymbolSet {
    fn from_iter<I: IntoIterator<Item = SymbolId>>(iter: I) -> Self {
        let mut set = SymbolSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// An ordered set of small integers with the same merge-based operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IntSet {
    items: Vec<usize>,
}

impl IntSet {
    pub fn new() -> Self {
        IntSet::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }

    pub fn get(&self, index: usize) -> usize {
        self.items[index]
    }

    pub fn contains(&self, value: usize) -> bool {
        self.items.binary_search(&value).is_ok()
    }

    pub fn insert(&mut self, value: usize) -> bool {
        match self.items.binary_search(&value) {
            Ok(_) => false,
            Err(at) => {
                self.items.insert(at, value);
                true
            }
        }
    }

    pub fn union(&self, other: &IntSet) -> IntSet {
        let mut merged: Vec<usize> = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.items.len() && j < other.items.len() {
            match self.items[i].cmp(&other.items[j]) {
                std::cmp::Ordering::Less => {
                    merged.push(self.items[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(other.items[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(self.items[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.items[i..]);
        merged.extend_from_slice(&other.items[j..]);
        IntSet { items: merged }
    }
}

impl FromIterator<usize> for IntSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IntSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u32]) -> SymbolSet {
        ids.iter().map(|&raw| SymbolId::from_raw(raw)).collect()
    }

    #[test]
    fn sets_stay_sorted() {
        let mut s = set(&[5, 1, 3, 3]);
        assert_eq!(s.as_slice(), &[1, 3, 5].map(SymbolId::from_raw));
        assert!(s.insert(SymbolId::from_raw(2)));
        assert!(!s.insert(SymbolId::from_raw(2)));
        assert!(s.delete(SymbolId::from_raw(3)));
        assert_eq!(s.as_slice(), &[1, 2, 5].map(SymbolId::from_raw));
    }

    #[test]
    fn union_and_intersect_are_merges() {
        let a = set(&[1, 3, 5, 9]);
        let b = set(&[2, 3, 9, 12]);
        assert_eq!(a.union(&b), set(&[1, 2, 3, 5, 9, 12]));
        assert_eq!(a.intersect(&b), set(&[3, 9]));
        assert!(a.intersects(&b));
        assert!(!set(&[1, 5]).intersects(&set(&[2, 4])));
    }

    #[test]
    fn lookup_is_keyed_by_kind_and_name(){
        let mut table = SymbolTable::default();
        let t = table
            .lookup("x", SymbolKind::Terminal, LookupAction::Insert)
            .unwrap();
        let n = table
            .lookup("x", SymbolKind::Nonterminal, LookupAction::Insert)
            .unwrap();
        assert_ne!(t, n);
        assert_eq!(
            table.lookup("x", SymbolKind::Terminal, LookupAction::Lookup),
            Some(t)
        );
        table.lookup("x", SymbolKind::Terminal, LookupAction::Delete);
        assert_eq!(
            table.lookup("x", SymbolKind::Terminal, LookupAction::Lookup),
            None
        );
    }
}
