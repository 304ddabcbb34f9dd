//! Name-grouped view over the fields of a structure.
//!
//! [`FieldMap`] groups the children of a structure by field name using an
//! [`IndexMap`], keeping first-emission order for iteration. Comparing two
//! maps ignores group order, which is what makes structure equality tolerant
//! of decorators that reorder emissions; within a group the original order
//! is kept, so repeated names still compare positionally.
//!
//! ## Examples
//!
//! ```rust
//! use sinkchain::to_element;
//!
//! let tree = to_element(&vec![1i32]).unwrap();
//! assert!(tree.field_map().is_none());
//! ```

use crate::Element;
use indexmap::IndexMap;

/// Fields of one structure, grouped by name in first-emission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap<'a>(IndexMap<&'a str, Vec<&'a Element>>);

impl<'a> FieldMap<'a> {
    /// Groups the given fields by name. Unnamed children share the `""` group.
    #[must_use]
    pub fn from_fields(fields: &'a [Element]) -> Self {
        let mut groups: IndexMap<&'a str, Vec<&'a Element>> = IndexMap::with_capacity(fields.len());
        for field in fields {
            groups
                .entry(field.field_name().unwrap_or(""))
                .or_default()
                .push(field);
        }
        FieldMap(groups)
    }

    /// Returns every field emitted under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[&'a Element]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Returns the first field emitted under `name`.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&'a Element> {
        self.0.get(name).and_then(|group| group.first().copied())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of distinct field names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the field names, in first-emission order.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.0.keys().copied()
    }

    /// Returns an iterator over `(name, group)` pairs, in first-emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &[&'a Element])> + '_ {
        self.0.iter().map(|(name, group)| (*name, group.as_slice()))
    }
}
