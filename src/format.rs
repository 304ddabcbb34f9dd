//! Alternate codecs and the format-override sink.
//!
//! A field carrying [`Marker::Format`](crate::Marker::Format) is not written
//! through the protocol. Instead the named [`AlternateCodec`] encodes the
//! field's value in full, and its output replaces the field: a string is
//! written as a string field, bytes as a nested collection of `i8`.
//!
//! The codec sees the field's own value with every upstream decorator
//! stripped, so filters and cycle guards of the surrounding traversal do not
//! reach into the encoded subtree.
//!
//! Codecs are looked up in a [`FormatRegistry`] when the marked field is
//! reached, so a missing or unusable codec only fails the traversal that
//! actually meets it.
//!
//! ```rust
//! use sinkchain::{Encode, FormatOverrideSink, FormatRegistry, JsonCodec, TreeSink};
//!
//! let formats = FormatRegistry::new().with("json", JsonCodec::text());
//! let mut sink = FormatOverrideSink::new(TreeSink::new(), formats);
//! vec![1i32, 2].encode(&mut sink).unwrap();
//! // No field of a vector carries a format marker.
//! assert_eq!(sink.into_inner().finish().unwrap().node_count(), 3);
//! ```

use crate::sink::undecorated;
use crate::{
    Describe, Descriptor, DescriptorCell, Encode, Error, ObjectId, Primitive, Result,
    StructureSink, ValueSink,
};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// An external codec able to encode a whole value to text or bytes.
///
/// Each capability returns `None` when the codec does not provide it.
pub trait AlternateCodec: fmt::Debug {
    fn encode_to_string(&self, _value: &dyn Encode) -> Option<Result<String>> {
        None
    }

    fn encode_to_bytes(&self, _value: &dyn Encode) -> Option<Result<Vec<u8>>> {
        None
    }
}

/// Format identifier to codec mapping, kept in registration order.
#[derive(Clone, Debug, Default)]
pub struct FormatRegistry {
    codecs: IndexMap<String, Rc<dyn AlternateCodec>>,
}

impl FormatRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry with `codec` registered under `id`.
    #[must_use]
    pub fn with<C: AlternateCodec + 'static>(mut self, id: &str, codec: C) -> Self {
        self.register(id, codec);
        self
    }

    /// Registers `codec` under `id`, replacing any previous codec.
    pub fn register<C: AlternateCodec + 'static>(&mut self, id: &str, codec: C) {
        self.codecs.insert(id.to_string(), Rc::new(codec));
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Rc<dyn AlternateCodec>> {
        self.codecs.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.codecs.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Renders the value's tree as JSON, as text or as UTF-8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JsonCodec {
    binary: bool,
}

impl JsonCodec {
    #[must_use]
    pub fn text() -> Self {
        JsonCodec { binary: false }
    }

    #[must_use]
    pub fn binary() -> Self {
        JsonCodec { binary: true }
    }
}

impl AlternateCodec for JsonCodec {
    fn encode_to_string(&self, value: &dyn Encode) -> Option<Result<String>> {
        if self.binary {
            return None;
        }
        Some(crate::to_element(value).and_then(|tree| Ok(serde_json::to_string(&tree)?)))
    }

    fn encode_to_bytes(&self, value: &dyn Encode) -> Option<Result<Vec<u8>>> {
        if !self.binary {
            return None;
        }
        Some(crate::to_element(value).and_then(|tree| Ok(serde_json::to_vec(&tree)?)))
    }
}

/// Renders the value's tree in its compact text form.
///
/// For a scalar this is the plain value, so a string field comes out
/// unchanged and a number comes out as its decimal text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeTextCodec;

impl AlternateCodec for TreeTextCodec {
    fn encode_to_string(&self, value: &dyn Encode) -> Option<Result<String>> {
        Some(crate::to_element(value).map(|tree| tree.to_compact_string()))
    }
}

/// Byte payload written as a collection of `i8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteArray<'b>(pub &'b [u8]);

impl Describe for ByteArray<'_> {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| Descriptor::collection("ByteArray", i8::describe))
    }
}

impl Encode for ByteArray<'_> {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut items = sink.begin_collection(descriptor, self.0.len())?;
        for (index, byte) in self.0.iter().enumerate() {
            items.write_i8_field(descriptor, index, i8::from_ne_bytes([*byte]))?;
        }
        items.end_structure(descriptor)
    }

    // Produced on the fly; its address says nothing about the source graph.
    fn identity(&self) -> Option<ObjectId> {
        None
    }
}

/// Decorator routing format-marked fields through alternate codecs.
#[derive(Debug)]
pub struct FormatOverrideSink<S> {
    inner: S,
    formats: Rc<FormatRegistry>,
}

impl<S: ValueSink> FormatOverrideSink<S> {
    pub fn new(inner: S, formats: FormatRegistry) -> Self {
        Self::shared(inner, Rc::new(formats))
    }

    pub fn shared(inner: S, formats: Rc<FormatRegistry>) -> Self {
        FormatOverrideSink { inner, formats }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

struct Overridable<'v> {
    value: &'v dyn Encode,
    formats: &'v Rc<FormatRegistry>,
}

impl Encode for Overridable<'_> {
    fn descriptor(&self) -> &'static Descriptor {
        self.value.descriptor()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        self.value
            .encode(&mut FormatOverrideSink::shared(sink, Rc::clone(self.formats)))
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

impl<S: ValueSink> ValueSink for FormatOverrideSink<S> {
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
        Ok(Box::new(FormatOverrideSink::shared(inner, Rc::clone(&self.formats))))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_structure(descriptor)?;
        Ok(Box::new(FormatStructure {
            inner,
            formats: Rc::clone(&self.formats),
        }))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let inner = self.inner.begin_collection(descriptor, size)?;
        Ok(Box::new(FormatStructure {
            inner,
            formats: Rc::clone(&self.formats),
        }))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        self.inner.encode_value(&Overridable {
            value,
            formats: &self.formats,
        })
    }
}

#[derive(Debug)]
struct FormatStructure<'a> {
    inner: Box<dyn StructureSink + 'a>,
    formats: Rc<FormatRegistry>,
}

impl FormatStructure<'_> {
    fn write_override(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        format: &str,
        value: &dyn Encode,
    ) -> Result<()> {
        let field = descriptor.field_name(index).unwrap_or("<item>");
        if format.is_empty() {
            return Err(Error::configuration(&format!(
                "empty format identifier on {}.{}",
                descriptor.serial_name(),
                field
            )));
        }
        let codec = self.formats.get(format).cloned().ok_or_else(|| {
            Error::configuration(&format!(
                "unknown format `{}` on {}.{}",
                format,
                descriptor.serial_name(),
                field
            ))
        })?;

        debug!(format, structure = descriptor.serial_name(), field, "encoding field with alternate codec");
        let value = undecorated(value);
        if let Some(text) = codec.encode_to_string(value) {
            return self.inner.write_str_field(descriptor, index, &text?);
        }
        if let Some(bytes) = codec.encode_to_bytes(value) {
            let bytes = bytes?;
            return self
                .inner
                .write_value_field(descriptor, index, &ByteArray(&bytes));
        }
        Err(Error::configuration(&format!(
            "format `{}` encodes neither strings nor bytes",
            format
        )))
    }
}

impl StructureSink for FormatStructure<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        match descriptor.field_format(index) {
            Some(format) => self.write_override(descriptor, index, format, &value),
            None => self.inner.write_primitive_field(descriptor, index, value),
        }
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        let inner = self.inner.write_inline_field(descriptor, index)?;
        Ok(Box::new(FormatOverrideSink::shared(inner, Rc::clone(&self.formats))))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        if let Some(format) = descriptor.field_format(index) {
            return self.write_override(descriptor, index, format, value);
        }
        self.inner.write_value_field(
            descriptor,
            index,
            &Overridable {
                value,
                formats: &self.formats,
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
    use crate::{to_element, Element, FieldDescriptor, Marker, TreeSink};

    #[derive(Debug)]
    struct Mute;

    impl AlternateCodec for Mute {}

    struct Wrapper {
        id: i32,
        payload: Vec<i32>,
    }

    impl Describe for Wrapper {
        fn describe() -> &'static Descriptor {
            static CELL: DescriptorCell = DescriptorCell::new();
            CELL.get_or_init(|| {
                Descriptor::structure("Wrapper")
                    .with_field(FieldDescriptor::new::<i32>("id").with_marker(Marker::Format("text".to_string())))
                    .with_field(FieldDescriptor::new::<Vec<i32>>("payload").with_marker(Marker::Format("json".to_string())))
            })
        }
    }

    impl Encode for Wrapper {
        fn descriptor(&self) -> &'static Descriptor {
            Self::describe()
        }

        fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
            let descriptor = Self::describe();
            let mut fields = sink.begin_structure(descriptor)?;
            fields.write_i32_field(descriptor, 0, self.id)?;
            fields.write_value_field(descriptor, 1, &self.payload)?;
            fields.end_structure(descriptor)
        }
    }

    fn encode_with(formats: FormatRegistry) -> Result<Element> {
        let value = Wrapper {
            id: 42,
            payload: vec![1, 2],
        };
        let mut sink = FormatOverrideSink::new(TreeSink::new(), formats);
        value.encode(&mut sink)?;
        sink.into_inner().finish()
    }

    #[test]
    fn test_string_codecs_replace_fields() {
        let tree = encode_with(
            FormatRegistry::new()
                .with("text", TreeTextCodec)
                .with("json", JsonCodec::text()),
        )
        .unwrap();
        let id = tree.field("id").unwrap();
        assert_eq!(id.as_primitive().and_then(Primitive::as_str), Some("42"));
        assert_eq!(id.kind_name(), "Property");
        let payload = tree.field("payload").unwrap();
        assert_eq!(payload.as_primitive().and_then(Primitive::as_str), Some("[1,2]"));
    }

    #[test]
    fn test_binary_codec_writes_byte_collection() {
        let tree = encode_with(
            FormatRegistry::new()
                .with("text", TreeTextCodec)
                .with("json", JsonCodec::binary()),
        )
        .unwrap();
        let payload = tree.field("payload").unwrap();
        assert_eq!(payload.type_name(), Some("ByteArray"));
        let bytes: Vec<u8> = payload
            .items()
            .unwrap()
            .iter()
            .filter_map(|item| item.as_primitive().and_then(Primitive::as_i64))
            .map(|b| b as u8)
            .collect();
        assert_eq!(bytes, b"[1,2]".to_vec());
    }

    #[test]
    fn test_unknown_format_is_configuration_error() {
        let err = encode_with(FormatRegistry::new().with("text", TreeTextCodec)).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("json")));
    }

    #[test]
    fn test_codec_without_capability_fails() {
        let err = encode_with(FormatRegistry::new().with("text", Mute).with("json", Mute)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_tree_text_of_scalar_is_display() {
        let text = TreeTextCodec.encode_to_string(&3.5f64).unwrap().unwrap();
        assert_eq!(text, 3.5f64.to_string());
        assert_eq!(to_element(&ByteArray(&[255, 1])).unwrap().node_count(), 3);
    }
}
