//! The canonical schema catalog.
//!
//! A [`Catalog`] is a snapshot of one database's schema, identical in shape
//! whether it was parsed from desired-state SQL or introspected from a live
//! connection. Catalogs are built once per plan/apply cycle and never
//! mutated afterwards — the differ only reads them.

use std::collections::{BTreeMap, BTreeSet};

pub mod assemble;
pub mod types;

#[cfg(test)]
pub mod builder;

pub use types::*;

/// One database's schema state. Maps are keyed by qualified name so every
/// iteration order — and therefore every diff — is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: BTreeSet<String>,
    extensions: BTreeMap<String, Extension>,
    enums: BTreeMap<String, EnumType>,
    sequences: BTreeMap<String, Sequence>,
    tables: BTreeMap<String, Table>,
    views: BTreeMap<String, View>,
    /// Keyed by [`Function::signature`] so overloads coexist.
    functions: BTreeMap<String, Function>,
    /// Keyed by [`Trigger::key`] (trigger names are unique per table).
    triggers: BTreeMap<String, Trigger>,
    comments: BTreeMap<CommentKey, String>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    // --- schemas ---

    pub fn schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.as_str())
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains(name)
    }

    pub(crate) fn insert_schema(&mut self, name: impl Into<String>) {
        self.schemas.insert(name.into());
    }

    // --- extensions ---

    pub fn extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.values()
    }

    pub fn get_extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.get(name)
    }

    pub(crate) fn insert_extension(&mut self, ext: Extension) -> Option<Extension> {
        self.extensions.insert(ext.name.clone(), ext)
    }

    // --- enums ---

    pub fn enums(&self) -> impl Iterator<Item = &EnumType> {
        self.enums.values()
    }

    pub fn get_enum(&self, key: &str) -> Option<&EnumType> {
        self.enums.get(key)
    }

    pub(crate) fn insert_enum(&mut self, e: EnumType) -> Option<EnumType> {
        self.enums.insert(e.name.key(), e)
    }

    /// True if any table column uses the given enum type.
    pub fn enum_in_use(&self, enum_key: &str) -> bool {
        let bare = enum_key.rsplit('.').next().unwrap_or(enum_key);
        self.tables.values().any(|t| {
            t.columns.iter().any(|c| {
                let tn = c.type_name.name();
                tn == enum_key || tn == bare
            })
        })
    }

    // --- sequences ---

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    pub fn get_sequence(&self, key: &str) -> Option<&Sequence> {
        self.sequences.get(key)
    }

    pub(crate) fn insert_sequence(&mut self, s: Sequence) -> Option<Sequence> {
        self.sequences.insert(s.name.key(), s)
    }

    // --- tables ---

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn get_table(&self, key: &str) -> Option<&Table> {
        self.tables.get(key)
    }

    pub fn has_table(&self, key: &str) -> bool {
        self.tables.contains_key(key)
    }

    pub(crate) fn insert_table(&mut self, t: Table) -> Option<Table> {
        self.tables.insert(t.name.key(), t)
    }

    pub(crate) fn get_table_mut(&mut self, key: &str) -> Option<&mut Table> {
        self.tables.get_mut(key)
    }

    // --- views ---

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.values()
    }

    pub fn get_view(&self, key: &str) -> Option<&View> {
        self.views.get(key)
    }

    pub(crate) fn insert_view(&mut self, v: View) -> Option<View> {
        self.views.insert(v.name.key(), v)
    }

    // --- functions ---

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn get_function(&self, signature: &str) -> Option<&Function> {
        self.functions.get(signature)
    }

    pub(crate) fn insert_function(&mut self, f: Function) -> Option<Function> {
        self.functions.insert(f.signature(), f)
    }

    // --- triggers ---

    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.values()
    }

    pub fn get_trigger(&self, key: &str) -> Option<&Trigger> {
        self.triggers.get(key)
    }

    pub(crate) fn insert_trigger(&mut self, t: Trigger) -> Option<Trigger> {
        self.triggers.insert(t.key(), t)
    }

    // --- comments ---

    pub fn comments(&self) -> impl Iterator<Item = (&CommentKey, &str)> {
        self.comments.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn get_comment(&self, key: &CommentKey) -> Option<&str> {
        self.comments.get(key).map(|s| s.as_str())
    }

    pub(crate) fn insert_comment(&mut self, key: CommentKey, text: String) -> Option<String> {
        self.comments.insert(key, text)
    }

    /// True when the catalog holds no objects at all. An empty desired
    /// catalog means: reconcile everything away.
    pub fn is_empty(&self) -> bool {
        self.schemas.iter().all(|s| s == "public")
            && self.extensions.is_empty()
            && self.enums.is_empty()
            && self.sequences.is_empty()
            && self.tables.is_empty()
            && self.views.is_empty()
            && self.functions.is_empty()
            && self.triggers.is_empty()
            && self.comments.is_empty()
    }
}
