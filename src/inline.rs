//! Splicing inline-marked fields into their parent.
//!
//! When a field carries [`Marker::Inline`](crate::Marker::Inline), the
//! structure it holds is not written as a nested node. Its `begin_structure`
//! hands back a view of the parent's structure sink, so its fields land next
//! to the parent's own fields, and its `end_structure` is absorbed because the
//! parent's driver ends the parent once.
//!
//! A marked field holding a primitive or an enum is written as an ordinary
//! field; a marked field holding null is omitted; a marked field holding a
//! collection is an [`Error::UnsupportedOperation`].

use crate::{Descriptor, Encode, Error, ObjectId, Primitive, Result, StructureSink, ValueSink};
use std::fmt;
use tracing::{debug, trace};

/// Decorator honoring inline markers.
#[derive(Debug)]
pub struct InlineSink<S> {
    inner: S,
}

impl<S: ValueSink> InlineSink<S> {
    pub fn new(inner: S) -> Self {
        InlineSink { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

struct Inlining<'v> {
    value: &'v dyn Encode,
}

impl Encode for Inlining<'_> {
    fn descriptor(&self) -> &'static Descriptor {
        self.value.descriptor()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        self.value.encode(&mut InlineSink::new(sink))
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

impl<S: ValueSink> ValueSink for InlineSink<S> {
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
        Ok(Box::new(InlineSink::new(inner)))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_structure(descriptor)?;
        Ok(Box::new(InlineStructure { inner }))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_collection(descriptor, size)?;
        Ok(Box::new(InlineStructure { inner }))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        self.inner.encode_value(&Inlining { value })
    }
}

#[derive(Debug)]
struct InlineStructure<'a> {
    inner: Box<dyn StructureSink + 'a>,
}

impl StructureSink for InlineStructure<'_> {
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
        Ok(Box::new(InlineSink::new(inner)))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        if descriptor.field(index).map_or(false, |field| field.is_inline()) {
            debug!(
                structure = descriptor.serial_name(),
                field = descriptor.field_name(index),
                "splicing inline field into parent"
            );
            let mut target = InlineTarget {
                parent: self,
                descriptor,
                index,
            };
            return value.encode(&mut target);
        }
        self.inner
            .write_value_field(descriptor, index, &Inlining { value })
    }

    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()> {
        self.inner.end_structure(descriptor)
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        self.inner.should_encode_default(descriptor, index)
    }
}

/// Value sink standing in for an inline-marked field.
struct InlineTarget<'p> {
    parent: &'p mut dyn StructureSink,
    descriptor: &'static Descriptor,
    index: usize,
}

impl fmt::Debug for InlineTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineTarget")
            .field("structure", &self.descriptor.serial_name())
            .field("index", &self.index)
            .field("parent", &self.parent)
            .finish()
    }
}

impl ValueSink for InlineTarget<'_> {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        self.parent
            .write_primitive_field(self.descriptor, self.index, value)
    }

    fn encode_null(&mut self) -> Result<()> {
        trace!(
            structure = self.descriptor.serial_name(),
            index = self.index,
            "inline field is null, omitted"
        );
        Ok(())
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        let name = descriptor.variant_name(variant).ok_or_else(|| {
            Error::protocol(&format!(
                "variant {} out of range for {}",
                variant,
                descriptor.serial_name()
            ))
        })?;
        self.parent.write_str_field(self.descriptor, self.index, name)
    }

    fn encode_inline(&mut self, _descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        Ok(Box::new(InlineTarget {
            parent: &mut *self.parent,
            descriptor: self.descriptor,
            index: self.index,
        }))
    }

    fn begin_structure(
        &mut self,
        _descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        Ok(Box::new(Spliced {
            parent: &mut *self.parent,
            ended: false,
        }))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        _size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        Err(Error::unsupported(&format!(
            "inlining collection {} into {}",
            descriptor.serial_name(),
            self.descriptor.serial_name()
        )))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        value.encode(self)
    }
}

/// The parent's structure sink, seen from inside the inlined value.
#[derive(Debug)]
struct Spliced<'p> {
    parent: &'p mut dyn StructureSink,
    ended: bool,
}

impl Spliced<'_> {
    fn check_open(&self) -> Result<()> {
        if self.ended {
            return Err(Error::protocol("field written after end_structure of an inlined value"));
        }
        Ok(())
    }
}

impl StructureSink for Spliced<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        self.check_open()?;
        self.parent.write_primitive_field(descriptor, index, value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        self.check_open()?;
        self.parent.write_inline_field(descriptor, index)
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        self.check_open()?;
        self.parent.write_value_field(descriptor, index, value)
    }

    fn end_structure(&mut self, _descriptor: &'static Descriptor) -> Result<()> {
        if self.ended {
            return Err(Error::protocol("end_structure called twice"));
        }
        self.ended = true;
        Ok(())
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        self.parent.should_encode_default(descriptor, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Describe, DescriptorCell, FieldDescriptor, Marker, TreeSink};

    struct Identity {
        id: String,
        name: String,
    }

    struct Record {
        identity: Option<Identity>,
        tags: Vec<String>,
        score: i32,
    }

    impl Describe for Identity {
        fn describe() -> &'static Descriptor {
            static CELL: DescriptorCell = DescriptorCell::new();
            CELL.get_or_init(|| {
                Descriptor::structure("Identity")
                    .with_field(FieldDescriptor::new::<String>("id"))
                    .with_field(FieldDescriptor::new::<String>("name"))
            })
        }
    }

    impl Encode for Identity {
        fn descriptor(&self) -> &'static Descriptor {
            Self::describe()
        }

        fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
            let descriptor = Self::describe();
            let mut fields = sink.begin_structure(descriptor)?;
            fields.write_str_field(descriptor, 0, &self.id)?;
            fields.write_str_field(descriptor, 1, &self.name)?;
            fields.end_structure(descriptor)
        }
    }

    impl Describe for Record {
        fn describe() -> &'static Descriptor {
            static CELL: DescriptorCell = DescriptorCell::new();
            CELL.get_or_init(|| {
                Descriptor::structure("Record")
                    .with_field(FieldDescriptor::new::<Identity>("identity").with_marker(Marker::Inline))
                    .with_field(FieldDescriptor::new::<Vec<String>>("tags"))
                    .with_field(FieldDescriptor::new::<i32>("score").with_marker(Marker::Inline))
            })
        }
    }

    impl Encode for Record {
        fn descriptor(&self) -> &'static Descriptor {
            Self::describe()
        }

        fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
            let descriptor = Self::describe();
            let mut fields = sink.begin_structure(descriptor)?;
            fields.write_value_field(descriptor, 0, &self.identity)?;
            fields.write_value_field(descriptor, 1, &self.tags)?;
            fields.write_value_field(descriptor, 2, &self.score)?;
            fields.end_structure(descriptor)
        }
    }

    fn encode(record: &Record) -> crate::Element {
        let mut sink = InlineSink::new(TreeSink::new());
        record.encode(&mut sink).unwrap();
        sink.into_inner().finish().unwrap()
    }

    #[test]
    fn test_structure_fields_are_spliced() {
        let tree = encode(&Record {
            identity: Some(Identity {
                id: "u1".to_string(),
                name: "Ada".to_string(),
            }),
            tags: vec!["x".to_string()],
            score: 7,
        });
        let names: Vec<_> = tree
            .fields()
            .unwrap()
            .iter()
            .filter_map(crate::Element::field_name)
            .collect();
        assert_eq!(names, vec!["id", "name", "tags", "score"]);
        assert!(tree.field("identity").is_none());
        assert_eq!(tree.field("score").and_then(crate::Element::as_primitive), Some(&Primitive::I32(7)));
        assert!(tree.field("tags").unwrap().is_collection());
    }

    #[test]
    fn test_null_inline_field_is_omitted() {
        let tree = encode(&Record {
            identity: None,
            tags: Vec::new(),
            score: 1,
        });
        assert_eq!(tree.fields().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_spliced_end_is_absorbed_once() {
        let descriptor = Identity::describe();
        let mut parent = crate::NoopSink;
        let mut spliced = Spliced {
            parent: &mut parent,
            ended: false,
        };
        spliced.end_structure(descriptor).unwrap();
        assert!(spliced.write_str_field(descriptor, 0, "late").unwrap_err().is_protocol_violation());
    }

    #[test]
    fn test_inline_collection_is_unsupported() {
        let descriptor = Record::describe();
        let mut parent = crate::NoopSink;
        let mut target = InlineTarget {
            parent: &mut parent,
            descriptor,
            index: 1,
        };
        let err = vec![1i32].encode(&mut target).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }
}
