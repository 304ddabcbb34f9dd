//! The push-based event protocol.
//!
//! A producer drives a [`ValueSink`] with exactly one call: a primitive, a
//! null, an enum variant, a nested value, or the start of a structure or
//! collection. Starting a structure returns a [`StructureSink`], which
//! accepts any number of indexed field writes followed by exactly one
//! [`end_structure`](StructureSink::end_structure).
//!
//! Producers are values implementing [`Encode`]: the value strategy that
//! knows how to drive a sink for its type, together with the schema
//! [`Descriptor`] and the identity used for cycle detection.
//!
//! Every call completes synchronously (recursing into nested sinks as
//! needed) before it returns. Call stack depth equals nesting depth.
//!
//! ## Decorators
//!
//! Decorators wrap an inner sink, forward every call, and override the ones
//! they intercept. To stay in control of nested values they wrap the value
//! handed to `write_value_field`/`encode_value` as well, so that when the
//! inner sink lets the value drive a fresh child sink, the decorator gets to
//! wrap that child too.
//!
//! ```rust
//! use sinkchain::{Encode, TreeSink, ValueSink};
//!
//! let mut sink = TreeSink::new();
//! sink.encode_i32(42).unwrap();
//! let tree = sink.finish().unwrap();
//! assert_eq!(tree.as_primitive().and_then(|p| p.as_i64()), Some(42));
//! ```

use crate::{Descriptor, Error, ObjectId, Primitive, Result};
use std::fmt;

/// Receives exactly one value.
///
/// `Debug` output of a sink describes the decorator chain it belongs to.
pub trait ValueSink: fmt::Debug {
    /// Writes a primitive. The typed `encode_*` methods funnel into this one.
    fn encode_primitive(&mut self, value: Primitive) -> Result<()>;

    /// Writes an explicit absence.
    fn encode_null(&mut self) -> Result<()>;

    /// Writes enum variant `variant` of `descriptor` by name.
    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()>;

    /// Returns a sink for a value whose wrapper level is not materialized.
    fn encode_inline(&mut self, descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        Err(Error::unsupported(&format!(
            "inline encoding of {} by {:?}",
            descriptor.serial_name(),
            self
        )))
    }

    /// Starts a structure.
    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>>;

    /// Starts a collection of `size` items.
    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>>;

    /// Writes a nested value through its own strategy.
    ///
    /// Implementations without interception simply call `value.encode(self)`.
    fn encode_value(&mut self, value: &dyn Encode) -> Result<()>;

    fn encode_bool(&mut self, value: bool) -> Result<()> {
        self.encode_primitive(Primitive::Bool(value))
    }

    fn encode_i8(&mut self, value: i8) -> Result<()> {
        self.encode_primitive(Primitive::I8(value))
    }

    fn encode_i16(&mut self, value: i16) -> Result<()> {
        self.encode_primitive(Primitive::I16(value))
    }

    fn encode_i32(&mut self, value: i32) -> Result<()> {
        self.encode_primitive(Primitive::I32(value))
    }

    fn encode_i64(&mut self, value: i64) -> Result<()> {
        self.encode_primitive(Primitive::I64(value))
    }

    fn encode_f32(&mut self, value: f32) -> Result<()> {
        self.encode_primitive(Primitive::F32(value))
    }

    fn encode_f64(&mut self, value: f64) -> Result<()> {
        self.encode_primitive(Primitive::F64(value))
    }

    fn encode_char(&mut self, value: char) -> Result<()> {
        self.encode_primitive(Primitive::Char(value))
    }

    fn encode_str(&mut self, value: &str) -> Result<()> {
        self.encode_primitive(Primitive::String(value.to_string()))
    }
}

/// Receives the indexed fields of one structure or collection.
///
/// `descriptor` is the descriptor of the enclosing structure; `index` is
/// author-supplied and need not be sequential.
pub trait StructureSink: fmt::Debug {
    /// Writes a primitive field. The typed `write_*_field` methods funnel into this one.
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()>;

    /// Returns a sink for a field written without an extra wrapping level.
    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>>;

    /// Writes a nested value field through the value's own strategy.
    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()>;

    /// Finishes the structure. No call may follow.
    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()>;

    /// Whether a field still holding its default value should be written.
    fn should_encode_default(&self, _descriptor: &'static Descriptor, _index: usize) -> bool {
        true
    }

    fn write_bool_field(&mut self, descriptor: &'static Descriptor, index: usize, value: bool) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::Bool(value))
    }

    fn write_i8_field(&mut self, descriptor: &'static Descriptor, index: usize, value: i8) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::I8(value))
    }

    fn write_i16_field(&mut self, descriptor: &'static Descriptor, index: usize, value: i16) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::I16(value))
    }

    fn write_i32_field(&mut self, descriptor: &'static Descriptor, index: usize, value: i32) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::I32(value))
    }

    fn write_i64_field(&mut self, descriptor: &'static Descriptor, index: usize, value: i64) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::I64(value))
    }

    fn write_f32_field(&mut self, descriptor: &'static Descriptor, index: usize, value: f32) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::F32(value))
    }

    fn write_f64_field(&mut self, descriptor: &'static Descriptor, index: usize, value: f64) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::F64(value))
    }

    fn write_char_field(&mut self, descriptor: &'static Descriptor, index: usize, value: char) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::Char(value))
    }

    fn write_str_field(&mut self, descriptor: &'static Descriptor, index: usize, value: &str) -> Result<()> {
        self.write_primitive_field(descriptor, index, Primitive::String(value.to_string()))
    }
}

/// A value together with the strategy that drives a sink for it.
pub trait Encode {
    /// Schema descriptor of this value's type.
    fn descriptor(&self) -> &'static Descriptor;

    /// Drives `sink` with exactly one value.
    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()>;

    /// Identity for cycle detection; `None` for null.
    ///
    /// Wrappers and smart pointers should delegate to the value they point
    /// to, so that every path to one object yields the same identity.
    /// Zero-sized values have no identity.
    fn identity(&self) -> Option<ObjectId> {
        if std::mem::size_of_val(self) == 0 {
            return None;
        }
        Some(ObjectId::of(self).with_schema(self.descriptor()))
    }

    /// Per-consumer visibility veto, consulted by identifier filters.
    fn visible_to(&self, _consumer: &str) -> bool {
        true
    }

    /// The value this one wraps, when it is a pipeline decorator's carrier.
    ///
    /// Decorators re-wrap nested values so that the value's strategy drives
    /// a decorated sink. Plain values return `None`.
    fn decorated(&self) -> Option<&dyn Encode> {
        None
    }
}

/// Strips every decorator carrier from `value`.
pub fn undecorated(mut value: &dyn Encode) -> &dyn Encode {
    while let Some(inner) = value.decorated() {
        value = inner;
    }
    value
}

impl<S: ValueSink + ?Sized> ValueSink for &mut S {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        (**self).encode_primitive(value)
    }

    fn encode_null(&mut self) -> Result<()> {
        (**self).encode_null()
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        (**self).encode_enum(descriptor, variant)
    }

    fn encode_inline(&mut self, descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        (**self).encode_inline(descriptor)
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        (**self).begin_structure(descriptor)
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        (**self).begin_collection(descriptor, size)
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        (**self).encode_value(value)
    }
}

impl<S: ValueSink + ?Sized> ValueSink for Box<S> {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        (**self).encode_primitive(value)
    }

    fn encode_null(&mut self) -> Result<()> {
        (**self).encode_null()
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        (**self).encode_enum(descriptor, variant)
    }

    fn encode_inline(&mut self, descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        (**self).encode_inline(descriptor)
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        (**self).begin_structure(descriptor)
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        (**self).begin_collection(descriptor, size)
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        (**self).encode_value(value)
    }
}

impl<S: StructureSink + ?Sized> StructureSink for Box<S> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        (**self).write_primitive_field(descriptor, index, value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        (**self).write_inline_field(descriptor, index)
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        (**self).write_value_field(descriptor, index, value)
    }

    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()> {
        (**self).end_structure(descriptor)
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        (**self).should_encode_default(descriptor, index)
    }
}

impl<S: StructureSink + ?Sized> StructureSink for &mut S {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        (**self).write_primitive_field(descriptor, index, value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        (**self).write_inline_field(descriptor, index)
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        (**self).write_value_field(descriptor, index, value)
    }

    fn end_structure(&mut self, descriptor: &'static Descriptor) -> Result<()> {
        (**self).end_structure(descriptor)
    }

    fn should_encode_default(&self, descriptor: &'static Descriptor, index: usize) -> bool {
        (**self).should_encode_default(descriptor, index)
    }
}

/// Swallows every call while still handing out well-formed nested sinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ValueSink for NoopSink {
    fn encode_primitive(&mut self, _value: Primitive) -> Result<()> {
        Ok(())
    }

    fn encode_null(&mut self) -> Result<()> {
        Ok(())
    }

    fn encode_enum(&mut self, _descriptor: &'static Descriptor, _variant: usize) -> Result<()> {
        Ok(())
    }

    fn encode_inline(&mut self, _descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        Ok(Box::new(NoopSink))
    }

    fn begin_structure(
        &mut self,
        _descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        Ok(Box::new(NoopSink))
    }

    fn begin_collection(
        &mut self,
        _descriptor: &'static Descriptor,
        _size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        Ok(Box::new(NoopSink))
    }

    fn encode_value(&mut self, _value: &dyn Encode) -> Result<()> {
        Ok(())
    }
}

impl StructureSink for NoopSink {
    fn write_primitive_field(
        &mut self,
        _descriptor: &'static Descriptor,
        _index: usize,
        _value: Primitive,
    ) -> Result<()> {
        Ok(())
    }

    fn write_inline_field(
        &mut self,
        _descriptor: &'static Descriptor,
        _index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        Ok(Box::new(NoopSink))
    }

    fn write_value_field(
        &mut self,
        _descriptor: &'static Descriptor,
        _index: usize,
        _value: &dyn Encode,
    ) -> Result<()> {
        Ok(())
    }

    fn end_structure(&mut self, _descriptor: &'static Descriptor) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Describe;

    #[test]
    fn test_noop_accepts_everything() {
        let descriptor = <Vec<i32>>::describe();
        let mut sink = NoopSink;
        let mut structure = sink.begin_collection(descriptor, 2).unwrap();
        structure.write_i32_field(descriptor, 0, 1).unwrap();
        structure
            .write_value_field(descriptor, 1, &vec![1i32, 2])
            .unwrap();
        structure.end_structure(descriptor).unwrap();
    }

    #[test]
    fn test_default_inline_is_unsupported() {
        #[derive(Debug)]
        struct Leaf;

        impl ValueSink for Leaf {
            fn encode_primitive(&mut self, _value: Primitive) -> Result<()> {
                Ok(())
            }
            fn encode_null(&mut self) -> Result<()> {
                Ok(())
            }
            fn encode_enum(&mut self, _d: &'static Descriptor, _v: usize) -> Result<()> {
                Ok(())
            }
            fn begin_structure(&mut self, _d: &'static Descriptor) -> Result<Box<dyn StructureSink + '_>> {
                Ok(Box::new(NoopSink))
            }
            fn begin_collection(
                &mut self,
                _d: &'static Descriptor,
                _size: usize,
            ) -> Result<Box<dyn StructureSink + '_>> {
                Ok(Box::new(NoopSink))
            }
            fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
                value.encode(self)
            }
        }

        let err = Leaf.encode_inline(i32::describe()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }
}
