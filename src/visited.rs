//! Registry of objects already seen during one traversal.
//!
//! The [`VisitedRegistry`] backs cycle detection. Its behavior is fixed once
//! at construction by a [`RegistryPolicy`]:
//!
//! - [`Equality::Reference`] compares object addresses.
//! - [`Equality::Value`] compares the owned [`EqualityKey`] an object exposes
//!   through its [`ObjectId`]; objects without a key fall back to addresses.
//! - [`Indexing::Hashed`] partitions entries into buckets by hash, then scans
//!   the bucket.
//! - [`Indexing::Linear`] scans every entry in insertion order.
//!
//! Addresses are only meaningful while the traversed graph is alive and not
//! moved, which holds for the duration of one synchronous traversal. Values
//! created on the fly by a strategy (rather than borrowed from the graph) may
//! share an address with an earlier temporary; give such values a key and use
//! [`Equality::Value`].
//!
//! ```rust
//! use sinkchain::{ObjectId, RegistryPolicy, VisitedRegistry};
//!
//! let a = String::from("a");
//! let b = String::from("a");
//!
//! let mut by_reference = VisitedRegistry::new(RegistryPolicy::reference());
//! assert!(by_reference.add(ObjectId::of(&a)));
//! assert!(!by_reference.add(ObjectId::of(&a)));
//! assert!(by_reference.add(ObjectId::of(&b)));
//!
//! let mut by_value = VisitedRegistry::new(RegistryPolicy::value());
//! assert!(by_value.add(ObjectId::of(&a).with_key(a.clone())));
//! assert!(!by_value.add(ObjectId::of(&b).with_key(b.clone())));
//! ```

use crate::Descriptor;
use indexmap::IndexMap;
use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

trait DynKey: Any + fmt::Debug {
    fn dyn_eq(&self, other: &dyn DynKey) -> bool;
    fn dyn_hash(&self) -> u64;
    fn as_any(&self) -> &dyn Any;
}

impl<T> DynKey for T
where
    T: Any + Eq + Hash + fmt::Debug,
{
    fn dyn_eq(&self, other: &dyn DynKey) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map_or(false, |other| self == other)
    }

    fn dyn_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An owned value standing for an object's own equality contract.
#[derive(Debug)]
pub struct EqualityKey(Box<dyn DynKey>);

impl EqualityKey {
    pub fn new<K>(key: K) -> Self
    where
        K: Any + Eq + Hash + fmt::Debug,
    {
        EqualityKey(Box::new(key))
    }

    #[must_use]
    pub fn hash_code(&self) -> u64 {
        self.0.dyn_hash()
    }
}

impl PartialEq for EqualityKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

/// Identity of one object as seen by the registry.
#[derive(Debug)]
pub struct ObjectId {
    address: usize,
    schema: usize,
    key: Option<EqualityKey>,
}

impl ObjectId {
    /// Identifies `value` by its address.
    #[must_use]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        ObjectId {
            address: value as *const T as *const () as usize,
            schema: 0,
            key: None,
        }
    }

    /// Tags the id with the descriptor of the object's type.
    ///
    /// A structure and its first field can share an address; tagged ids only
    /// match when their descriptors are the same.
    #[must_use]
    pub fn with_schema(mut self, descriptor: &Descriptor) -> Self {
        self.schema = descriptor as *const Descriptor as usize;
        self
    }

    /// Attaches an equality key, used under [`Equality::Value`].
    #[must_use]
    pub fn with_key<K>(mut self, key: K) -> Self
    where
        K: Any + Eq + Hash + fmt::Debug,
    {
        self.key = Some(EqualityKey::new(key));
        self
    }

    #[must_use]
    pub fn address(&self) -> usize {
        self.address
    }

    #[must_use]
    pub fn key(&self) -> Option<&EqualityKey> {
        self.key.as_ref()
    }
}

/// How two objects are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Equality {
    #[default]
    Reference,
    Value,
}

/// How candidates are located.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Indexing {
    #[default]
    Hashed,
    Linear,
}

/// Comparison and indexing strategy of a [`VisitedRegistry`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryPolicy {
    pub equality: Equality,
    pub indexing: Indexing,
}

impl RegistryPolicy {
    /// Reference equality with hashed buckets.
    #[must_use]
    pub fn reference() -> Self {
        RegistryPolicy {
            equality: Equality::Reference,
            indexing: Indexing::Hashed,
        }
    }

    /// Value equality with hashed buckets.
    #[must_use]
    pub fn value() -> Self {
        RegistryPolicy {
            equality: Equality::Value,
            indexing: Indexing::Hashed,
        }
    }

    #[must_use]
    pub fn with_indexing(mut self, indexing: Indexing) -> Self {
        self.indexing = indexing;
        self
    }
}

#[derive(Debug)]
enum Storage {
    Hashed(IndexMap<u64, Vec<ObjectId>>),
    Linear(Vec<ObjectId>),
}

/// Set of objects seen so far in one traversal.
#[derive(Debug)]
pub struct VisitedRegistry {
    equality: Equality,
    storage: Storage,
    len: usize,
}

impl VisitedRegistry {
    #[must_use]
    pub fn new(policy: RegistryPolicy) -> Self {
        let storage = match policy.indexing {
            Indexing::Hashed => Storage::Hashed(IndexMap::new()),
            Indexing::Linear => Storage::Linear(Vec::new()),
        };
        VisitedRegistry {
            equality: policy.equality,
            storage,
            len: 0,
        }
    }

    /// Inserts `id`; returns `false` if an equal object was already present.
    pub fn add(&mut self, id: ObjectId) -> bool {
        if self.has(&id) {
            return false;
        }
        let hash = self.hash_of(&id);
        match &mut self.storage {
            Storage::Hashed(buckets) => buckets.entry(hash).or_default().push(id),
            Storage::Linear(entries) => entries.push(id),
        }
        self.len += 1;
        true
    }

    /// Returns `true` if an equal object was already added.
    #[must_use]
    pub fn has(&self, id: &ObjectId) -> bool {
        match &self.storage {
            Storage::Hashed(buckets) => buckets
                .get(&self.hash_of(id))
                .map_or(false, |bucket| bucket.iter().any(|seen| self.matches(seen, id))),
            Storage::Linear(entries) => entries.iter().any(|seen| self.matches(seen, id)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Hashed(buckets) => buckets.clear(),
            Storage::Linear(entries) => entries.clear(),
        }
        self.len = 0;
    }

    fn matches(&self, seen: &ObjectId, candidate: &ObjectId) -> bool {
        match (self.equality, &seen.key, &candidate.key) {
            (Equality::Value, Some(a), Some(b)) => a == b,
            (Equality::Value, Some(_), None) | (Equality::Value, None, Some(_)) => false,
            _ => seen.address == candidate.address && seen.schema == candidate.schema,
        }
    }

    fn hash_of(&self, id: &ObjectId) -> u64 {
        match (self.equality, &id.key) {
            (Equality::Value, Some(key)) => key.hash_code(),
            _ => {
                let mut hasher = DefaultHasher::new();
                id.address.hash(&mut hasher);
                hasher.finish()
            }
        }
    }
}

impl Default for VisitedRegistry {
    fn default() -> Self {
        Self::new(RegistryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policies() -> Vec<RegistryPolicy> {
        vec![
            RegistryPolicy::reference(),
            RegistryPolicy::reference().with_indexing(Indexing::Linear),
            RegistryPolicy::value(),
            RegistryPolicy::value().with_indexing(Indexing::Linear),
        ]
    }

    #[test]
    fn test_add_reports_first_sighting() {
        for policy in policies() {
            let values = [1u32, 2, 3];
            let mut registry = VisitedRegistry::new(policy);
            for value in &values {
                assert!(registry.add(ObjectId::of(value)), "{:?}", policy);
            }
            for value in &values {
                assert!(!registry.add(ObjectId::of(value)), "{:?}", policy);
                assert!(registry.has(&ObjectId::of(value)));
            }
            assert_eq!(registry.len(), 3);
        }
    }

    #[test]
    fn test_has_does_not_insert() {
        let value = 5u8;
        let mut registry = VisitedRegistry::default();
        assert!(!registry.has(&ObjectId::of(&value)));
        assert!(registry.is_empty());
        assert!(registry.add(ObjectId::of(&value)));
    }

    #[test]
    fn test_value_equality_uses_keys() {
        let a = String::from("same");
        let b = String::from("same");

        let mut registry = VisitedRegistry::new(RegistryPolicy::value());
        assert!(registry.add(ObjectId::of(&a).with_key(a.clone())));
        assert!(!registry.add(ObjectId::of(&b).with_key(b.clone())));

        // Keys of different types never match.
        assert!(registry.add(ObjectId::of(&b).with_key(7u64)));
    }

    #[test]
    fn test_reference_equality_ignores_keys() {
        let a = String::from("same");
        let b = String::from("same");

        let mut registry = VisitedRegistry::new(RegistryPolicy::reference());
        assert!(registry.add(ObjectId::of(&a).with_key(a.clone())));
        assert!(registry.add(ObjectId::of(&b).with_key(b.clone())));
    }

    #[test]
    fn test_value_equality_without_key_falls_back_to_address() {
        let a = 1i32;
        let b = 1i32;
        let mut registry = VisitedRegistry::new(RegistryPolicy::value());
        assert!(registry.add(ObjectId::of(&a)));
        assert!(registry.add(ObjectId::of(&b)));
        assert!(!registry.add(ObjectId::of(&a)));
    }

    #[test]
    fn test_schema_separates_shared_addresses() {
        struct Outer {
            first: u64,
        }
        let outer = Outer { first: 1 };
        let outer_schema = Descriptor::structure("Outer");
        let field_schema = Descriptor::structure("u64");

        let mut registry = VisitedRegistry::default();
        assert!(registry.add(ObjectId::of(&outer).with_schema(&outer_schema)));
        assert!(registry.add(ObjectId::of(&outer.first).with_schema(&field_schema)));
        assert!(!registry.add(ObjectId::of(&outer).with_schema(&outer_schema)));
    }

    #[test]
    fn test_clear() {
        let value = 1i32;
        let mut registry = VisitedRegistry::new(RegistryPolicy::reference().with_indexing(Indexing::Linear));
        registry.add(ObjectId::of(&value));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.add(ObjectId::of(&value)));
    }
}
