//! Cycle detection.
//!
//! [`CycleGuard`] wraps a sink and consults a shared [`VisitedRegistry`] on
//! every nested value handed to `encode_value` or `write_value_field`. The
//! first sighting of an object is forwarded; any later sighting is dropped
//! without a trace in the output, so a back-edge of a cyclic graph simply
//! disappears from the result.
//!
//! Every guard spawned below the root shares the root guard's registry.
//! The root value itself is encoded directly by the caller and is therefore
//! not registered; use [`CycleGuard::seeded`] when the root can recur.
//!
//! ```rust
//! use sinkchain::{CycleGuard, Encode, RegistryPolicy, TreeSink};
//!
//! let shared = std::rc::Rc::new(String::from("x"));
//! let pair = vec![shared.clone(), shared];
//!
//! let mut guard = CycleGuard::with_policy(TreeSink::new(), RegistryPolicy::reference());
//! pair.encode(&mut guard).unwrap();
//! let tree = guard.into_inner().finish().unwrap();
//! assert_eq!(tree.items().map(<[_]>::len), Some(1));
//! ```

use crate::{
    Descriptor, Encode, ObjectId, Primitive, RegistryPolicy, Result, StructureSink, ValueSink,
    VisitedRegistry,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Registry shared by every guard of one traversal.
pub type SharedRegistry = Rc<RefCell<VisitedRegistry>>;

fn first_sighting(registry: &SharedRegistry, value: &dyn Encode) -> bool {
    match value.identity() {
        Some(id) => registry.borrow_mut().add(id),
        None => true,
    }
}

/// Decorator dropping values already seen in the current traversal.
#[derive(Debug)]
pub struct CycleGuard<S> {
    inner: S,
    registry: SharedRegistry,
}

impl<S: ValueSink> CycleGuard<S> {
    /// Guards `inner` with a fresh registry using the default policy.
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, RegistryPolicy::default())
    }

    pub fn with_policy(inner: S, policy: RegistryPolicy) -> Self {
        Self::shared(inner, Rc::new(RefCell::new(VisitedRegistry::new(policy))))
    }

    /// Guards `inner` with a registry already holding `root`.
    pub fn seeded(inner: S, root: &dyn Encode, policy: RegistryPolicy) -> Self {
        let guard = Self::with_policy(inner, policy);
        first_sighting(&guard.registry, root);
        guard
    }

    /// Guards `inner` with an existing registry.
    pub fn shared(inner: S, registry: SharedRegistry) -> Self {
        CycleGuard { inner, registry }
    }

    #[must_use]
    pub fn registry(&self) -> SharedRegistry {
        Rc::clone(&self.registry)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// A value whose strategy drives a guarded sink.
struct Guarded<'v> {
    value: &'v dyn Encode,
    registry: &'v SharedRegistry,
}

impl Encode for Guarded<'_> {
    fn descriptor(&self) -> &'static Descriptor {
        self.value.descriptor()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        self.value
            .encode(&mut CycleGuard::shared(sink, Rc::clone(self.registry)))
    }

    fn identity(&self) -> Option<ObjectId> {
        self.value.identity()
    }

    fn visible_to(&self, consumer: &str) -> bool {
        self.value.visible_to(consumer)
    }

    fn decorated(&self) -> Option<&dyn Encode> {
        Some(self.value)
    }
}

impl<S: ValueSink> ValueSink for CycleGuard<S> {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        self.inner.encode_primitive(value)
    }

    fn encode_null(&mut self) -> Result<()> {
        self.inner.encode_null()
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        self.inner.encode_enum(descriptor, variant)
    }

    fn encode_inline(&mut self, descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        let inner = self.inner.encode_inline(descriptor)?;
        Ok(Box::new(CycleGuard::shared(inner, Rc::clone(&self.registry))))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_structure(descriptor)?;
        Ok(Box::new(GuardedStructure {
            inner,
            registry: Rc::clone(&self.registry),
        }))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_collection(descriptor, size)?;
        Ok(Box::new(GuardedStructure {
            inner,
            registry: Rc::clone(&self.registry),
        }))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        if !first_sighting(&self.registry, value) {
            trace!(
                type_name = value.descriptor().serial_name(),
                "dropping revisited value"
            );
            return Ok(());
        }
        self.inner.encode_value(&Guarded {
            value,
            registry: &self.registry,
        })
    }
}

/// Structure sink counterpart of [`CycleGuard`].
#[derive(Debug)]
struct GuardedStructure<'a> {
    inner: Box<dyn StructureSink + 'a>,
    registry: SharedRegistry,
}

impl StructureSink for GuardedStructure<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        self.inner.write_primitive_field(descriptor, index, value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        let inner = self.inner.write_inline_field(descriptor, index)?;
        Ok(Box::new(CycleGuard::shared(inner, Rc::clone(&self.registry))))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        if !first_sighting(&self.registry, value) {
            trace!(
                structure = descriptor.serial_name(),
                index,
                "dropping revisited field"
            );
            return Ok(());
        }
        self.inner.write_value_field(
            descriptor,
            index,
            &Guarded {
                value,
                registry: &self.registry,
            },
        )
    }

    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()> {
        self.inner.end_structure(descriptor)
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        self.inner.should_encode_default(descriptor, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Describe, Indexing, TreeSink};

    #[test]
    fn test_repeated_item_is_dropped() {
        let shared = Rc::new(3i32);
        let items = vec![Rc::clone(&shared), Rc::new(4), shared];

        let mut guard = CycleGuard::new(TreeSink::new());
        items.encode(&mut guard).unwrap();
        let registry = guard.registry();
        let tree = guard.into_inner().finish().unwrap();

        let values: Vec<_> = tree
            .items()
            .unwrap()
            .iter()
            .filter_map(|item| item.as_primitive().and_then(Primitive::as_i64))
            .collect();
        assert_eq!(values, vec![3, 4]);
        assert_eq!(registry.borrow().len(), 2);
    }

    #[test]
    fn test_null_is_never_registered() {
        let items: Vec<Option<Rc<i32>>> = vec![None, None];
        let mut guard = CycleGuard::with_policy(
            TreeSink::new(),
            RegistryPolicy::reference().with_indexing(Indexing::Linear),
        );
        items.encode(&mut guard).unwrap();
        assert!(guard.registry().borrow().is_empty());
        let tree = guard.into_inner().finish().unwrap();
        assert_eq!(tree.items().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_seeded_root_is_registered() {
        let root = 1i32;
        let guard = CycleGuard::seeded(TreeSink::new(), &root, RegistryPolicy::default());
        assert!(guard.registry().borrow().has(&root.identity().unwrap()));
    }

    #[test]
    fn test_nested_guards_share_registry() {
        let leaf = Rc::new(String::from("leaf"));
        let nested = vec![vec![Rc::clone(&leaf)], vec![Rc::clone(&leaf)]];

        let mut guard = CycleGuard::new(TreeSink::new());
        guard.encode_value(&nested).unwrap();
        let tree = guard.into_inner().finish().unwrap();

        let inner: Vec<_> = tree
            .items()
            .unwrap()
            .iter()
            .map(|list| list.items().map_or(0, <[_]>::len))
            .collect();
        assert_eq!(inner, vec![1, 0]);
        assert_eq!(tree.type_name(), Some(<Vec<Vec<Rc<String>>>>::describe().serial_name()));
    }
}
