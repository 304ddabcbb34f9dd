//! Field suppression.
//!
//! A [`FieldFilter`] pairs two predicates:
//!
//! - the static filter sees only the schema position `(descriptor, index)`
//!   and runs before the value is touched; it also decides whether a nested
//!   structure is started at all (`index` is `None` for the type itself);
//! - the contextual filter additionally sees the value.
//!
//! A field is written only when both accept it. A rejected field is skipped
//! without driving its value; a rejected structure start hands the producer a
//! [`NoopSink`] so it still sees a well-formed sink.
//!
//! [`FieldFilter::by_identifier`] builds the allow/deny policy for one
//! consumer identifier from the markers on fields and their types.
//!
//! ```rust
//! use sinkchain::{Encode, FieldFilter, FilterSink, TreeSink};
//!
//! let skip_first = FieldFilter::new(|_, index| index != Some(0), |_, _, _| true);
//! let mut sink = FilterSink::new(TreeSink::new(), skip_first);
//! vec![1i32, 2].encode(&mut sink).unwrap();
//!
//! let tree = sink.into_inner().finish().unwrap();
//! assert_eq!(tree.items().map(<[_]>::len), Some(1));
//! ```

use crate::{
    Descriptor, Encode, Marker, NoopSink, ObjectId, Primitive, Result, StructureSink, ValueSink,
};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Predicate over a schema position.
pub type StaticFilter = Rc<dyn Fn(&Descriptor, Option<usize>) -> bool>;

/// Predicate over a schema position and the value found there.
pub type ContextualFilter = Rc<dyn Fn(&Descriptor, Option<usize>, &dyn Encode) -> bool>;

/// Static and contextual predicates deciding which fields are written.
#[derive(Clone)]
pub struct FieldFilter {
    label: String,
    static_filter: StaticFilter,
    contextual_filter: ContextualFilter,
}

impl FieldFilter {
    pub fn new<F, G>(static_filter: F, contextual_filter: G) -> Self
    where
        F: Fn(&Descriptor, Option<usize>) -> bool + 'static,
        G: Fn(&Descriptor, Option<usize>, &dyn Encode) -> bool + 'static,
    {
        FieldFilter {
            label: "custom".to_string(),
            static_filter: Rc::new(static_filter),
            contextual_filter: Rc::new(contextual_filter),
        }
    }

    /// Accepts everything.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::new(|_, _| true, |_, _, _| true).labelled("allow-all")
    }

    /// Marker policy for consumer `id`.
    ///
    /// A field is written iff `id` appears in no applicable `Deny` marker
    /// and either appears in some applicable `Allow` marker or no `Allow`
    /// marker applies. Markers on the field and on the field's type both
    /// apply. Values may additionally veto themselves through
    /// [`Encode::visible_to`].
    #[must_use]
    pub fn by_identifier(id: &str) -> Self {
        let static_id = id.to_string();
        let contextual_id = id.to_string();
        Self::new(
            move |descriptor, index| identifier_admits(&static_id, applicable_markers(descriptor, index)),
            move |_, _, value| value.visible_to(&contextual_id),
        )
        .labelled(&format!("identifier({})", id))
    }

    #[must_use]
    pub fn labelled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the static predicate.
    #[must_use]
    pub fn admits_position(&self, descriptor: &Descriptor, index: Option<usize>) -> bool {
        (self.static_filter)(descriptor, index)
    }

    /// Runs both predicates.
    #[must_use]
    pub fn admits(&self, descriptor: &Descriptor, index: Option<usize>, value: &dyn Encode) -> bool {
        self.admits_position(descriptor, index) && (self.contextual_filter)(descriptor, index, value)
    }
}

impl fmt::Debug for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldFilter").field(&self.label).finish()
    }
}

fn applicable_markers(descriptor: &Descriptor, index: Option<usize>) -> impl Iterator<Item = &Marker> {
    let (own, typed): (&[Marker], &[Marker]) = match index {
        Some(index) => (
            descriptor.field_markers(index),
            descriptor
                .field_descriptor(index)
                .map_or(&[][..], Descriptor::markers),
        ),
        None => (descriptor.markers(), &[][..]),
    };
    own.iter().chain(typed.iter())
}

fn identifier_admits<'m>(id: &str, markers: impl Iterator<Item = &'m Marker>) -> bool {
    let mut allow_present = false;
    let mut allowed = false;
    for marker in markers {
        match marker {
            Marker::Deny(ids) if ids.iter().any(|denied| denied == id) => return false,
            Marker::Allow(ids) => {
                allow_present = true;
                allowed |= ids.iter().any(|listed| listed == id);
            }
            _ => {}
        }
    }
    allowed || !allow_present
}

/// Decorator writing only the fields admitted by a [`FieldFilter`].
#[derive(Debug)]
pub struct FilterSink<S> {
    inner: S,
    filter: FieldFilter,
}

impl<S: ValueSink> FilterSink<S> {
    pub fn new(inner: S, filter: FieldFilter) -> Self {
        FilterSink { inner, filter }
    }

    pub fn by_identifier(inner: S, id: &str) -> Self {
        Self::new(inner, FieldFilter::by_identifier(id))
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// A value whose strategy drives a filtered sink.
struct Filtered<'v> {
    value: &'v dyn Encode,
    filter: &'v FieldFilter,
}

impl Encode for Filtered<'_> {
    fn descriptor(&self) -> &'static Descriptor {
        self.value.descriptor()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        self.value
            .encode(&mut FilterSink::new(sink, self.filter.clone()))
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

impl<S: ValueSink> ValueSink for FilterSink<S> {
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
        Ok(Box::new(FilterSink::new(inner, self.filter.clone())))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        if !self.filter.admits_position(descriptor, None) {
            trace!(filter = self.filter.label(), type_name = descriptor.serial_name(), "structure filtered");
            return Ok(Box::new(NoopSink));
        }
        let inner = self.inner.begin_structure(descriptor)?;
        Ok(Box::new(FilteredStructure {
            inner,
            filter: self.filter.clone(),
        }))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        if !self.filter.admits_position(descriptor, None) {
            trace!(filter = self.filter.label(), type_name = descriptor.serial_name(), "collection filtered");
            return Ok(Box::new(NoopSink));
        }
        let inner = self.inner.begin_collection(descriptor, size)?;
        Ok(Box::new(FilteredStructure {
            inner,
            filter: self.filter.clone(),
        }))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        if !self.filter.admits(value.descriptor(), None, value) {
            trace!(
                filter = self.filter.label(),
                type_name = value.descriptor().serial_name(),
                "value filtered"
            );
            return Ok(());
        }
        self.inner.encode_value(&Filtered {
            value,
            filter: &self.filter,
        })
    }
}

#[derive(Debug)]
struct FilteredStructure<'a> {
    inner: Box<dyn StructureSink + 'a>,
    filter: FieldFilter,
}

impl FilteredStructure<'_> {
    fn skip(&self, descriptor: &'static Descriptor, index: usize) {
        trace!(
            filter = self.filter.label(),
            structure = descriptor.serial_name(),
            field = descriptor.field_name(index).unwrap_or("<item>"),
            index,
            "field filtered"
        );
    }
}

impl StructureSink for FilteredStructure<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        if !self.filter.admits(descriptor, Some(index), &value) {
            self.skip(descriptor, index);
            return Ok(());
        }
        self.inner.write_primitive_field(descriptor, index, value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        if !self.filter.admits_position(descriptor, Some(index)) {
            self.skip(descriptor, index);
            return Ok(Box::new(NoopSink));
        }
        let inner = self.inner.write_inline_field(descriptor, index)?;
        Ok(Box::new(FilterSink::new(inner, self.filter.clone())))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        if !self.filter.admits(descriptor, Some(index), value) {
            self.skip(descriptor, index);
            return Ok(());
        }
        self.inner.write_value_field(
            descriptor,
            index,
            &Filtered {
                value,
                filter: &self.filter,
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
