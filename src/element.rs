//! Generic element tree produced by a traversal.
//!
//! This module provides the [`Element`] enum, a tagged union that reifies an
//! arbitrary object graph into an inspectable structure, and [`Primitive`],
//! the raw leaf value carried by scalars.
//!
//! ## Core Types
//!
//! - [`Element`]: structure, collection, scalar or null node
//! - [`Primitive`]: the raw value of a scalar (bool, integers, floats, char, string)
//! - [`NodeMeta`]: type name and position in the parent, carried by every node
//!
//! ## Equality
//!
//! Structures compare their fields grouped by name, so two structures built
//! from the same fields in a different emission order are equal. Collections
//! compare their items in order. Field indices are not part of equality.
//!
//! ```rust
//! use sinkchain::{Element, FieldPosition, NodeMeta, Primitive, ScalarRole};
//!
//! let id = |index| Element::Scalar {
//!     meta: NodeMeta::new(Some("String")).at(FieldPosition::named(index, "id")),
//!     role: ScalarRole::Property,
//!     value: Primitive::from("id0"),
//! };
//! let flag = |index| Element::Scalar {
//!     meta: NodeMeta::new(Some("bool")).at(FieldPosition::named(index, "flag")),
//!     role: ScalarRole::Property,
//!     value: Primitive::from(true),
//! };
//!
//! let a = Element::Structure { meta: NodeMeta::new(Some("Node")), fields: vec![id(0), flag(1)] };
//! let b = Element::Structure { meta: NodeMeta::new(Some("Node")), fields: vec![flag(1), id(0)] };
//! assert_eq!(a, b);
//! ```

use crate::map::FieldMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// The kind of a primitive value, as exposed by schema descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    String,
}

impl PrimitiveKind {
    /// Returns the serial name used for this kind in descriptors and dumps.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
            PrimitiveKind::String => "String",
        }
    }
}

/// A raw leaf value.
///
/// # Examples
///
/// ```rust
/// use sinkchain::{Primitive, PrimitiveKind};
///
/// let value = Primitive::from(42i32);
/// assert_eq!(value.kind(), PrimitiveKind::I32);
/// assert_eq!(value.as_i64(), Some(42));
/// assert_eq!(Primitive::from("id0").as_str(), Some("id0"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
}

impl Primitive {
    /// Returns the kind of this primitive.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Bool(_) => PrimitiveKind::Bool,
            Primitive::I8(_) => PrimitiveKind::I8,
            Primitive::I16(_) => PrimitiveKind::I16,
            Primitive::I32(_) => PrimitiveKind::I32,
            Primitive::I64(_) => PrimitiveKind::I64,
            Primitive::F32(_) => PrimitiveKind::F32,
            Primitive::F64(_) => PrimitiveKind::F64,
            Primitive::Char(_) => PrimitiveKind::Char,
            Primitive::String(_) => PrimitiveKind::String,
        }
    }

    /// Returns the serial type name of this primitive.
    #[inline]
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns any integer kind widened to `i64`.
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Primitive::I8(v) => Some(i64::from(*v)),
            Primitive::I16(v) => Some(i64::from(*v)),
            Primitive::I32(v) => Some(i64::from(*v)),
            Primitive::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any numeric kind as `f64`.
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Primitive::F32(v) => Some(f64::from(*v)),
            Primitive::F64(v) => Some(*v),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(b) => write!(f, "{}", b),
            Primitive::I8(v) => write!(f, "{}", v),
            Primitive::I16(v) => write!(f, "{}", v),
            Primitive::I32(v) => write!(f, "{}", v),
            Primitive::I64(v) => write!(f, "{}", v),
            Primitive::F32(v) => write!(f, "{}", v),
            Primitive::F64(v) => write!(f, "{}", v),
            Primitive::Char(c) => write!(f, "{}", c),
            Primitive::String(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Primitive {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Primitive::Bool(b) => serializer.serialize_bool(*b),
            Primitive::I8(v) => serializer.serialize_i8(*v),
            Primitive::I16(v) => serializer.serialize_i16(*v),
            Primitive::I32(v) => serializer.serialize_i32(*v),
            Primitive::I64(v) => serializer.serialize_i64(*v),
            Primitive::F32(v) => serializer.serialize_f32(*v),
            Primitive::F64(v) => serializer.serialize_f64(*v),
            Primitive::Char(c) => serializer.serialize_char(*c),
            Primitive::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<i8> for Primitive {
    fn from(value: i8) -> Self {
        Primitive::I8(value)
    }
}

impl From<i16> for Primitive {
    fn from(value: i16) -> Self {
        Primitive::I16(value)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::I32(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::I64(value)
    }
}

impl From<u8> for Primitive {
    fn from(value: u8) -> Self {
        Primitive::I16(i16::from(value))
    }
}

impl From<u16> for Primitive {
    fn from(value: u16) -> Self {
        Primitive::I32(i32::from(value))
    }
}

impl From<u32> for Primitive {
    fn from(value: u32) -> Self {
        Primitive::I64(i64::from(value))
    }
}

impl From<f32> for Primitive {
    fn from(value: f32) -> Self {
        Primitive::F32(value)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::F64(value)
    }
}

impl From<char> for Primitive {
    fn from(value: char) -> Self {
        Primitive::Char(value)
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::String(value)
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::String(value.to_string())
    }
}

/// Position of a node inside its immediate parent.
///
/// Structure fields carry a name; collection items only carry their index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPosition {
    pub index: usize,
    pub name: Option<String>,
}

impl FieldPosition {
    #[must_use]
    pub fn named(index: usize, name: &str) -> Self {
        FieldPosition {
            index,
            name: Some(name.to_string()),
        }
    }

    #[must_use]
    pub fn item(index: usize) -> Self {
        FieldPosition { index, name: None }
    }
}

/// Metadata carried by every node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMeta {
    /// Serial name of the originating schema, if known.
    pub type_name: Option<String>,
    /// Position in the immediate parent; `None` for the root.
    pub position: Option<FieldPosition>,
}

impl NodeMeta {
    #[must_use]
    pub fn new(type_name: Option<&str>) -> Self {
        NodeMeta {
            type_name: type_name.map(str::to_string),
            position: None,
        }
    }

    /// Returns a copy placed at the given position.
    #[must_use]
    pub fn at(mut self, position: FieldPosition) -> Self {
        self.position = Some(position);
        self
    }

    #[inline]
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.position.as_ref().and_then(|p| p.name.as_deref())
    }

    #[inline]
    #[must_use]
    pub fn field_index(&self) -> Option<usize> {
        self.position.as_ref().map(|p| p.index)
    }

    // Indices are author-supplied and deliberately excluded.
    fn same_node(&self, other: &NodeMeta) -> bool {
        self.type_name == other.type_name && self.field_name() == other.field_name()
    }
}

/// Whether a scalar is attached to a named field or stands alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarRole {
    /// A leaf written as a named structure field.
    Property,
    /// A top-level value or a collection item.
    StandaloneValue,
}

/// A node of the materialized value tree.
///
/// Trees are built incrementally by [`TreeSink`](crate::TreeSink) or the
/// [builders](crate::builder) and are immutable once handed out.
#[derive(Clone, Debug)]
pub enum Element {
    Structure {
        meta: NodeMeta,
        fields: Vec<Element>,
    },
    Collection {
        meta: NodeMeta,
        items: Vec<Element>,
    },
    Scalar {
        meta: NodeMeta,
        role: ScalarRole,
        value: Primitive,
    },
    Null {
        meta: NodeMeta,
    },
}

impl Element {
    /// Returns the metadata of this node.
    #[inline]
    #[must_use]
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Element::Structure { meta, .. }
            | Element::Collection { meta, .. }
            | Element::Scalar { meta, .. }
            | Element::Null { meta } => meta,
        }
    }

    #[inline]
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.meta().type_name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.meta().field_name()
    }

    #[inline]
    #[must_use]
    pub fn field_index(&self) -> Option<usize> {
        self.meta().field_index()
    }

    /// Returns the label used for this node in textual dumps.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Element::Structure { .. } => "Structure",
            Element::Collection { .. } => "Collection",
            Element::Scalar {
                role: ScalarRole::Property,
                ..
            } => "Property",
            Element::Scalar {
                role: ScalarRole::StandaloneValue,
                ..
            } => "StandaloneValue",
            Element::Null { .. } => "Null",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self, Element::Structure { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Element::Collection { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Element::Scalar { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Element::Null { .. })
    }

    /// If this is a scalar, returns its raw value.
    #[inline]
    #[must_use]
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Element::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// If this is a structure, returns its fields in emission order.
    #[inline]
    #[must_use]
    pub fn fields(&self) -> Option<&[Element]> {
        match self {
            Element::Structure { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// If this is a collection, returns its items.
    #[inline]
    #[must_use]
    pub fn items(&self) -> Option<&[Element]> {
        match self {
            Element::Collection { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Returns the first field with the given name, if this is a structure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::{to_element, Element};
    ///
    /// let tree = to_element(&vec![1i32, 2]).unwrap();
    /// assert!(tree.field("id").is_none());
    /// assert_eq!(tree.items().map(<[Element]>::len), Some(2));
    /// ```
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Element> {
        self.fields()?
            .iter()
            .find(|field| field.field_name() == Some(name))
    }

    /// Groups the fields of a structure by name.
    #[must_use]
    pub fn field_map(&self) -> Option<FieldMap<'_>> {
        self.fields().map(FieldMap::from_fields)
    }

    /// Counts the nodes of this tree, this node included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + match self {
            Element::Structure { fields: children, .. }
            | Element::Collection {
                items: children, ..
            } => children.iter().map(Element::node_count).sum(),
            _ => 0,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Element::Structure { meta: a, fields: fa },
                Element::Structure { meta: b, fields: fb },
            ) => a.same_node(b) && FieldMap::from_fields(fa) == FieldMap::from_fields(fb),
            (
                Element::Collection { meta: a, items: ia },
                Element::Collection { meta: b, items: ib },
            ) => a.same_node(b) && ia == ib,
            (
                Element::Scalar {
                    meta: a,
                    role: ra,
                    value: va,
                },
                Element::Scalar {
                    meta: b,
                    role: rb,
                    value: vb,
                },
            ) => a.same_node(b) && ra == rb && va == vb,
            (Element::Null { meta: a }, Element::Null { meta: b }) => a.same_node(b),
            _ => false,
        }
    }
}

impl Serialize for Element {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Element::Structure { fields, .. } => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (i, field) in fields.iter().enumerate() {
                    match field.field_name() {
                        Some(name) => map.serialize_entry(name, field)?,
                        None => map.serialize_entry(&i.to_string(), field)?,
                    }
                }
                map.end()
            }
            Element::Collection { items, .. } => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Element::Scalar { value, .. } => value.serialize(serializer),
            Element::Null { .. } => serializer.serialize_unit(),
        }
    }
}
