//! Reading values back out of a finished element tree.
//!
//! [`ElementReader`] is a cursor over an [`Element`] that checks node kinds
//! and type names as it descends, raising [`Error::SchemaMismatch`] when the
//! tree does not have the expected shape.
//!
//! The reader is also a [`serde::Deserializer`], so any `Deserialize` type
//! can be rebuilt from a tree with [`from_element`]:
//!
//! ```rust
//! use sinkchain::{from_element, to_element};
//!
//! let tree = to_element(&vec![Some(1i32), None, Some(3)]).unwrap();
//! let values: Vec<Option<i32>> = from_element(&tree).unwrap();
//! assert_eq!(values, vec![Some(1), None, Some(3)]);
//! ```
//!
//! Fields dropped by a cycle guard or a filter are absent from the tree, so
//! they read back as missing rather than null.

use crate::{Element, Error, Primitive, Result};
use serde::de::{self, DeserializeOwned, IntoDeserializer};
use serde::forward_to_deserialize_any;
use tracing::trace;

/// Rebuilds a `Deserialize` value from an element tree.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] when a struct's type name differs from
/// the tree node's, or when a node has the wrong kind for the target type.
pub fn from_element<T: DeserializeOwned>(element: &Element) -> Result<T> {
    T::deserialize(ElementReader::new(element))
}

/// A read cursor positioned on one node of a finished tree.
#[derive(Clone, Copy, Debug)]
pub struct ElementReader<'a> {
    element: &'a Element,
}

impl<'a> ElementReader<'a> {
    #[must_use]
    pub fn new(element: &'a Element) -> Self {
        ElementReader { element }
    }

    /// Returns the node under the cursor.
    #[must_use]
    pub fn element(&self) -> &'a Element {
        self.element
    }

    #[must_use]
    pub fn type_name(&self) -> Option<&'a str> {
        self.element.type_name()
    }

    /// Checks that the node carries the type name `name`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sinkchain::{to_element, ElementReader, Error};
    ///
    /// let tree = to_element(&vec![1i32]).unwrap();
    /// let reader = ElementReader::new(&tree);
    /// assert!(reader.expect_type("Vec<i32>").is_ok());
    /// assert!(matches!(reader.expect_type("Node"), Err(Error::SchemaMismatch { .. })));
    /// ```
    pub fn expect_type(self, name: &str) -> Result<Self> {
        match self.element.type_name() {
            Some(found) if found == name => Ok(self),
            found => Err(Error::schema_mismatch(name, found.unwrap_or("untyped node"))),
        }
    }

    /// Moves to the first field named `name`.
    pub fn field(self, name: &str) -> Result<Self> {
        self.optional_field(name)?.ok_or_else(|| {
            Error::schema_mismatch(&format!("field `{}`", name), &describe(self.element))
        })
    }

    /// Moves to the field named `name`, or `None` when the structure omits it.
    pub fn optional_field(self, name: &str) -> Result<Option<Self>> {
        let fields = self
            .element
            .fields()
            .ok_or_else(|| self.kind_mismatch("Structure"))?;
        Ok(fields
            .iter()
            .find(|field| field.field_name() == Some(name))
            .map(ElementReader::new))
    }

    /// Moves to item `index` of a collection.
    pub fn item(self, index: usize) -> Result<Self> {
        let items = self
            .element
            .items()
            .ok_or_else(|| self.kind_mismatch("Collection"))?;
        items.get(index).map(ElementReader::new).ok_or_else(|| {
            Error::schema_mismatch(
                &format!("item {}", index),
                &format!("{} items", items.len()),
            )
        })
    }

    /// Returns a cursor for each item of a collection.
    pub fn items(self) -> Result<Vec<Self>> {
        let items = self
            .element
            .items()
            .ok_or_else(|| self.kind_mismatch("Collection"))?;
        Ok(items.iter().map(ElementReader::new).collect())
    }

    pub fn as_str(self) -> Result<&'a str> {
        self.primitive("String")?
            .as_str()
            .ok_or_else(|| self.kind_mismatch("String"))
    }

    /// Reads any integer scalar widened to `i64`.
    pub fn as_i64(self) -> Result<i64> {
        self.primitive("integer")?
            .as_i64()
            .ok_or_else(|| self.kind_mismatch("integer"))
    }

    /// Reads any numeric scalar as `f64`.
    pub fn as_f64(self) -> Result<f64> {
        self.primitive("number")?
            .as_f64()
            .ok_or_else(|| self.kind_mismatch("number"))
    }

    pub fn as_bool(self) -> Result<bool> {
        self.primitive("bool")?
            .as_bool()
            .ok_or_else(|| self.kind_mismatch("bool"))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.element.is_null()
    }

    fn primitive(self, expected: &str) -> Result<&'a Primitive> {
        self.element
            .as_primitive()
            .ok_or_else(|| self.kind_mismatch(expected))
    }

    fn kind_mismatch(self, expected: &str) -> Error {
        Error::schema_mismatch(expected, &describe(self.element))
    }
}

fn describe(element: &Element) -> String {
    format!(
        "{}({})",
        element.kind_name(),
        element.type_name().unwrap_or_default()
    )
}

impl<'de> de::Deserializer<'de> for ElementReader<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.element {
            Element::Null { .. } => visitor.visit_unit(),
            Element::Scalar { value, .. } => match value {
                Primitive::Bool(b) => visitor.visit_bool(*b),
                Primitive::I8(v) => visitor.visit_i8(*v),
                Primitive::I16(v) => visitor.visit_i16(*v),
                Primitive::I32(v) => visitor.visit_i32(*v),
                Primitive::I64(v) => visitor.visit_i64(*v),
                Primitive::F32(v) => visitor.visit_f32(*v),
                Primitive::F64(v) => visitor.visit_f64(*v),
                Primitive::Char(c) => visitor.visit_char(*c),
                Primitive::String(s) => visitor.visit_borrowed_str(s),
            },
            Element::Collection { items, .. } => visitor.visit_seq(ItemAccess {
                items: items.iter(),
            }),
            Element::Structure { fields, .. } => visitor.visit_map(FieldAccess {
                fields: fields.iter(),
                pending: None,
            }),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if self.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if !self.element.is_structure() {
            return Err(self.kind_mismatch(name));
        }
        if let Some(found) = self.type_name() {
            if found != name {
                return Err(Error::schema_mismatch(name, found));
            }
        }
        trace!(type_name = name, "reading structure");
        self.deserialize_any(visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let variant = self.as_str().map_err(|_| self.kind_mismatch(name))?;
        visitor.visit_enum(variant.into_deserializer())
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map
        identifier ignored_any
    }
}

struct ItemAccess<'de> {
    items: std::slice::Iter<'de, Element>,
}

impl<'de> de::SeqAccess<'de> for ItemAccess<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(item) => seed.deserialize(ElementReader::new(item)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct FieldAccess<'de> {
    fields: std::slice::Iter<'de, Element>,
    pending: Option<&'de Element>,
}

impl<'de> de::MapAccess<'de> for FieldAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        let Some(field) = self.fields.next() else {
            return Ok(None);
        };
        self.pending = Some(field);
        match field.field_name() {
            Some(name) => seed.deserialize(name.into_deserializer()).map(Some),
            None => seed
                .deserialize(field.field_index().unwrap_or_default().to_string().into_deserializer())
                .map(Some),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        let field = self
            .pending
            .take()
            .ok_or_else(|| Error::protocol("map value requested before its key"))?;
        seed.deserialize(ElementReader::new(field))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CollectionBuilder, StructureBuilder};
    use crate::{FieldPosition, NodeMeta, ScalarRole};
    use serde::Deserialize;

    fn scalar(name: &str, index: usize, value: Primitive) -> Element {
        Element::Scalar {
            meta: NodeMeta::new(Some(value.type_name())).at(FieldPosition::named(index, name)),
            role: ScalarRole::Property,
            value,
        }
    }

    fn user() -> Element {
        let mut tags = CollectionBuilder::new(Some("Vec<String>")).at(FieldPosition::named(2, "tags"));
        tags.push(Element::Scalar {
            meta: NodeMeta::new(Some("String")).at(FieldPosition::item(0)),
            role: ScalarRole::StandaloneValue,
            value: Primitive::from("admin"),
        });
        let mut root = StructureBuilder::new(Some("User"));
        root.push(scalar("name", 0, Primitive::from("Ada")))
            .push(scalar("age", 1, Primitive::I32(36)))
            .push(tags.build().unwrap())
            .push(Element::Null {
                meta: NodeMeta::new(Some("String")).at(FieldPosition::named(3, "nickname")),
            });
        root.build().unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u8,
        tags: Vec<String>,
        nickname: Option<String>,
    }

    #[test]
    fn test_cursor_navigation() {
        let tree = user();
        let reader = ElementReader::new(&tree).expect_type("User").unwrap();
        assert_eq!(reader.field("name").unwrap().as_str().unwrap(), "Ada");
        assert_eq!(reader.field("age").unwrap().as_i64().unwrap(), 36);
        assert_eq!(reader.field("age").unwrap().as_f64().unwrap(), 36.0);
        assert_eq!(reader.field("tags").unwrap().item(0).unwrap().as_str().unwrap(), "admin");
        assert_eq!(reader.field("tags").unwrap().items().unwrap().len(), 1);
        assert!(reader.field("nickname").unwrap().is_null());
        assert!(reader.optional_field("missing").unwrap().is_none());
    }

    #[test]
    fn test_mismatches_are_reported() {
        let tree = user();
        let reader = ElementReader::new(&tree);
        let err = reader.expect_type("Account").unwrap_err();
        assert_eq!(err, Error::schema_mismatch("Account", "User"));
        assert!(matches!(reader.field("missing"), Err(Error::SchemaMismatch { .. })));
        assert!(matches!(reader.item(0), Err(Error::SchemaMismatch { .. })));
        assert!(matches!(reader.field("name").unwrap().as_bool(), Err(Error::SchemaMismatch { .. })));
        assert!(matches!(reader.field("tags").unwrap().item(5), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_deserialize_struct() {
        let user: User = from_element(&user()).unwrap();
        assert_eq!(
            user,
            User {
                name: "Ada".to_string(),
                age: 36,
                tags: vec!["admin".to_string()],
                nickname: None,
            }
        );
    }

    #[test]
    fn test_deserialize_checks_type_name() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Account {
            name: String,
        }

        let err = from_element::<Account>(&user()).unwrap_err();
        assert_eq!(err, Error::schema_mismatch("Account", "User"));
    }
}
