//! Incremental builders for structure and collection nodes.
//!
//! Builders accumulate children in emission order and finalize into an
//! immutable [`Element`] on `build()`. A child can also be supplied as a
//! deferred producer with `push_deferred`; deferred children keep their slot
//! in the sequence and are all resolved before the node is finalized.
//!
//! ```rust
//! use sinkchain::builder::CollectionBuilder;
//! use sinkchain::{Element, NodeMeta, Primitive, ScalarRole};
//!
//! let scalar = |value: i32| Element::Scalar {
//!     meta: NodeMeta::new(Some("i32")),
//!     role: ScalarRole::StandaloneValue,
//!     value: Primitive::from(value),
//! };
//!
//! let mut builder = CollectionBuilder::new(Some("Vec<i32>"));
//! builder.push(scalar(1));
//! builder.push_deferred(move || Ok(scalar(2)));
//! builder.push(scalar(3));
//!
//! let tree = builder.build().unwrap();
//! let values: Vec<_> = tree.items().unwrap().iter().filter_map(Element::as_primitive).collect();
//! assert_eq!(values, vec![&Primitive::I32(1), &Primitive::I32(2), &Primitive::I32(3)]);
//! ```

use crate::{Element, FieldPosition, NodeMeta, Result};
use std::fmt;

enum Pending<'a> {
    Ready(Element),
    Deferred(Box<dyn FnOnce() -> Result<Element> + 'a>),
}

impl fmt::Debug for Pending<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pending::Ready(element) => f.debug_tuple("Ready").field(element).finish(),
            Pending::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

#[derive(Debug, Default)]
struct Children<'a>(Vec<Pending<'a>>);

impl<'a> Children<'a> {
    fn push(&mut self, element: Element) {
        self.0.push(Pending::Ready(element));
    }

    fn push_deferred<F>(&mut self, producer: F)
    where
        F: FnOnce() -> Result<Element> + 'a,
    {
        self.0.push(Pending::Deferred(Box::new(producer)));
    }

    fn resolve(self) -> Result<Vec<Element>> {
        self.0
            .into_iter()
            .map(|pending| match pending {
                Pending::Ready(element) => Ok(element),
                Pending::Deferred(producer) => producer(),
            })
            .collect()
    }
}

/// Builder for [`Element::Structure`] nodes.
#[derive(Debug)]
pub struct StructureBuilder<'a> {
    meta: NodeMeta,
    fields: Children<'a>,
}

impl<'a> StructureBuilder<'a> {
    #[must_use]
    pub fn new(type_name: Option<&str>) -> Self {
        StructureBuilder {
            meta: NodeMeta::new(type_name),
            fields: Children::default(),
        }
    }

    /// Places the finished node at `position` in its parent.
    #[must_use]
    pub fn at(mut self, position: FieldPosition) -> Self {
        self.meta.position = Some(position);
        self
    }

    /// Appends a field. The element should carry its own field position.
    pub fn push(&mut self, field: Element) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Appends a field produced when the structure is built.
    pub fn push_deferred<F>(&mut self, producer: F) -> &mut Self
    where
        F: FnOnce() -> Result<Element> + 'a,
    {
        self.fields.push_deferred(producer);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.0.is_empty()
    }

    /// Resolves deferred fields in order and finalizes the node.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a deferred producer.
    pub fn build(self) -> Result<Element> {
        Ok(Element::Structure {
            meta: self.meta,
            fields: self.fields.resolve()?,
        })
    }
}

/// Builder for [`Element::Collection`] nodes.
#[derive(Debug)]
pub struct CollectionBuilder<'a> {
    meta: NodeMeta,
    items: Children<'a>,
}

impl<'a> CollectionBuilder<'a> {
    #[must_use]
    pub fn new(type_name: Option<&str>) -> Self {
        CollectionBuilder {
            meta: NodeMeta::new(type_name),
            items: Children::default(),
        }
    }

    /// Places the finished node at `position` in its parent.
    #[must_use]
    pub fn at(mut self, position: FieldPosition) -> Self {
        self.meta.position = Some(position);
        self
    }

    pub fn push(&mut self, item: Element) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn push_deferred<F>(&mut self, producer: F) -> &mut Self
    where
        F: FnOnce() -> Result<Element> + 'a,
    {
        self.items.push_deferred(producer);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.0.is_empty()
    }

    /// Resolves deferred items in order and finalizes the node.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a deferred producer.
    pub fn build(self) -> Result<Element> {
        Ok(Element::Collection {
            meta: self.meta,
            items: self.items.resolve()?,
        })
    }
}

/// Either kind of builder, as kept on the tree sink's stack.
#[derive(Debug)]
pub(crate) enum NodeBuilder {
    Structure(StructureBuilder<'static>),
    Collection(CollectionBuilder<'static>),
}

impl NodeBuilder {
    pub(crate) fn push(&mut self, element: Element) {
        match self {
            NodeBuilder::Structure(builder) => {
                builder.push(element);
            }
            NodeBuilder::Collection(builder) => {
                builder.push(element);
            }
        }
    }

    pub(crate) fn build(self) -> Result<Element> {
        match self {
            NodeBuilder::Structure(builder) => builder.build(),
            NodeBuilder::Collection(builder) => builder.build(),
        }
    }
}
