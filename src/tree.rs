//! Materializing sink.
//!
//! [`TreeSink`] terminates a chain: it turns the event stream into an
//! [`Element`] tree. Entering a structure or collection pushes a builder onto
//! a stack; the matching `end_structure` pops it, finalizes the node and
//! appends it to the enclosing builder, or keeps it as the result when it is
//! the root. Leaves are appended to the builder on top of the stack.
//!
//! ## Usage
//!
//! Most users should go through [`to_element`](crate::to_element). For
//! direct use, drive the sink and call [`finish`](TreeSink::finish):
//!
//! ```rust
//! use sinkchain::{Describe, StructureSink, TreeSink, ValueSink};
//!
//! let descriptor = <Vec<i32>>::describe();
//! let mut sink = TreeSink::new();
//! let mut items = sink.begin_collection(descriptor, 2).unwrap();
//! items.write_i32_field(descriptor, 0, 1).unwrap();
//! items.write_i32_field(descriptor, 1, 2).unwrap();
//! items.end_structure(descriptor).unwrap();
//! drop(items);
//!
//! let tree = sink.finish().unwrap();
//! assert_eq!(tree.items().map(<[_]>::len), Some(2));
//! ```

use crate::builder::{CollectionBuilder, NodeBuilder, StructureBuilder};
use crate::{
    Descriptor, Element, Encode, Error, FieldPosition, NodeMeta, Primitive, Result, ScalarRole,
    StructureSink, ValueSink,
};
use std::fmt;

/// Where the next node lands: its position in the parent and its type name.
#[derive(Clone, Debug, Default)]
struct Slot {
    position: Option<FieldPosition>,
    type_name: Option<String>,
}

impl Slot {
    fn meta(&self, type_name: Option<&str>) -> NodeMeta {
        let meta = NodeMeta::new(type_name.or(self.type_name.as_deref()));
        match &self.position {
            Some(position) => meta.at(position.clone()),
            None => meta,
        }
    }

    fn role(&self) -> ScalarRole {
        match &self.position {
            Some(FieldPosition { name: Some(_), .. }) => ScalarRole::Property,
            _ => ScalarRole::StandaloneValue,
        }
    }
}

#[derive(Debug, Default)]
struct TreeState {
    stack: Vec<NodeBuilder>,
    result: Option<Element>,
    root_claimed: bool,
}

impl TreeState {
    fn claim_root(&mut self) -> Result<()> {
        if self.root_claimed {
            return Err(Error::protocol("the root value was already written"));
        }
        self.root_claimed = true;
        Ok(())
    }

    fn attach(&mut self, element: Element) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => parent.push(element),
            None => {
                self.claim_root()?;
                self.result = Some(element);
            }
        }
        Ok(())
    }

    fn open(&mut self, builder: NodeBuilder) -> Result<usize> {
        if self.stack.is_empty() {
            self.claim_root()?;
        }
        self.stack.push(builder);
        Ok(self.stack.len())
    }

    fn close(&mut self, depth: usize) -> Result<()> {
        if self.stack.len() != depth {
            return Err(Error::protocol("end_structure called while a nested structure is still open"));
        }
        let builder = self
            .stack
            .pop()
            .ok_or_else(|| Error::protocol("end_structure called without an open structure"))?;
        let element = builder.build()?;
        match self.stack.last_mut() {
            Some(parent) => parent.push(element),
            None => self.result = Some(element),
        }
        Ok(())
    }
}

/// A sink that builds an [`Element`] tree.
#[derive(Default)]
pub struct TreeSink {
    state: TreeState,
}

impl TreeSink {
    #[must_use]
    pub fn new() -> Self {
        TreeSink::default()
    }

    /// Returns `true` once a complete root value has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.result.is_some() && self.state.stack.is_empty()
    }

    /// Returns the finished tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteTraversal`] if nothing was written, and a
    /// protocol violation if a structure is still open.
    pub fn finish(self) -> Result<Element> {
        if !self.state.stack.is_empty() {
            return Err(Error::protocol("finish called inside an open structure"));
        }
        self.state.result.ok_or(Error::IncompleteTraversal)
    }

    /// Like [`finish`](Self::finish), but reads an empty sink as a null root.
    ///
    /// A filter that rejects the root value never reaches the tree sink
    /// behind it; for such a sink the hidden root is `Element::Null`.
    ///
    /// # Errors
    ///
    /// Returns a protocol violation if a structure is still open.
    pub fn finish_or_null(self) -> Result<Element> {
        if !self.state.stack.is_empty() {
            return Err(Error::protocol("finish called inside an open structure"));
        }
        Ok(self.state.result.unwrap_or(Element::Null {
            meta: NodeMeta::default(),
        }))
    }

    fn root(&mut self) -> TreeField<'_> {
        TreeField {
            state: &mut self.state,
            slot: Slot::default(),
            used: false,
        }
    }
}

impl fmt::Debug for TreeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeSink")
            .field("depth", &self.state.stack.len())
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl ValueSink for TreeSink {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        self.root().encode_primitive(value)
    }

    fn encode_null(&mut self) -> Result<()> {
        self.root().encode_null()
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        self.root().encode_enum(descriptor, variant)
    }

    fn encode_inline(&mut self, _descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        Ok(Box::new(self.root()))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let depth = self
            .state
            .open(NodeBuilder::Structure(StructureBuilder::new(Some(descriptor.serial_name()))))?;
        Ok(Box::new(TreeStructure::new(&mut self.state, depth, false)))
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        _size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let depth = self
            .state
            .open(NodeBuilder::Collection(CollectionBuilder::new(Some(descriptor.serial_name()))))?;
        Ok(Box::new(TreeStructure::new(&mut self.state, depth, true)))
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        value.encode(self)
    }
}

/// Value sink for one field or item of an open structure.
struct TreeField<'a> {
    state: &'a mut TreeState,
    slot: Slot,
    used: bool,
}

impl TreeField<'_> {
    fn claim(&mut self) -> Result<()> {
        if self.used {
            return Err(Error::protocol("value sink already received a value"));
        }
        self.used = true;
        Ok(())
    }

    fn open(&mut self, builder: NodeBuilder, collection: bool) -> Result<Box<dyn StructureSink + '_>> {
        self.claim()?;
        let depth = self.state.open(builder)?;
        Ok(Box::new(TreeStructure::new(&mut *self.state, depth, collection)))
    }
}

impl fmt::Debug for TreeField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeField")
            .field("position", &self.slot.position)
            .field("used", &self.used)
            .finish()
    }
}

impl ValueSink for TreeField<'_> {
    fn encode_primitive(&mut self, value: Primitive) -> Result<()> {
        self.claim()?;
        let element = Element::Scalar {
            meta: self.slot.meta(Some(value.type_name())),
            role: self.slot.role(),
            value,
        };
        self.state.attach(element)
    }

    fn encode_null(&mut self) -> Result<()> {
        self.claim()?;
        let element = Element::Null {
            meta: self.slot.meta(None),
        };
        self.state.attach(element)
    }

    fn encode_enum(&mut self, descriptor: &'static Descriptor, variant: usize) -> Result<()> {
        let name = descriptor.variant_name(variant).ok_or_else(|| {
            Error::protocol(&format!(
                "variant {} out of range for {}",
                variant,
                descriptor.serial_name()
            ))
        })?;
        self.claim()?;
        let element = Element::Scalar {
            meta: self.slot.meta(Some(descriptor.serial_name())),
            role: self.slot.role(),
            value: Primitive::from(name),
        };
        self.state.attach(element)
    }

    fn encode_inline(&mut self, _descriptor: &'static Descriptor) -> Result<Box<dyn ValueSink + '_>> {
        self.claim()?;
        Ok(Box::new(TreeField {
            state: &mut *self.state,
            slot: self.slot.clone(),
            used: false,
        }))
    }

    fn begin_structure(
        &mut self,
        descriptor: &'static Descriptor,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let mut builder = StructureBuilder::new(Some(descriptor.serial_name()));
        if let Some(position) = self.slot.position.clone() {
            builder = builder.at(position);
        }
        self.open(NodeBuilder::Structure(builder), false)
    }

    fn begin_collection(
        &mut self,
        descriptor: &'static Descriptor,
        _size: usize,
    ) -> Result<Box<dyn StructureSink + '_>> {
        let mut builder = CollectionBuilder::new(Some(descriptor.serial_name()));
        if let Some(position) = self.slot.position.clone() {
            builder = builder.at(position);
        }
        self.open(NodeBuilder::Collection(builder), true)
    }

    fn encode_value(&mut self, value: &dyn Encode) -> Result<()> {
        value.encode(self)
    }
}

/// Structure sink appending to the builder at `depth` on the stack.
struct TreeStructure<'a> {
    state: &'a mut TreeState,
    depth: usize,
    collection: bool,
    ended: bool,
}

impl<'a> TreeStructure<'a> {
    fn new(state: &'a mut TreeState, depth: usize, collection: bool) -> Self {
        TreeStructure {
            state,
            depth,
            collection,
            ended: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.ended {
            return Err(Error::protocol("field written after end_structure"));
        }
        if self.state.stack.len() != self.depth {
            return Err(Error::protocol("field written while a nested structure is still open"));
        }
        Ok(())
    }

    fn position(&self, descriptor: &'static Descriptor, index: usize) -> FieldPosition {
        match descriptor.field_name(index) {
            Some(name) if !self.collection => FieldPosition::named(index, name),
            _ => FieldPosition::item(index),
        }
    }

    fn field(&mut self, descriptor: &'static Descriptor, index: usize, type_name: Option<&str>) -> TreeField<'_> {
        let slot = Slot {
            position: Some(self.position(descriptor, index)),
            type_name: type_name.map(str::to_string),
        };
        TreeField {
            state: &mut *self.state,
            slot,
            used: false,
        }
    }
}

impl fmt::Debug for TreeStructure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeStructure")
            .field("depth", &self.depth)
            .field("collection", &self.collection)
            .field("ended", &self.ended)
            .finish()
    }
}

impl StructureSink for TreeStructure<'_> {
    fn write_primitive_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: Primitive,
    ) -> Result<()> {
        self.check_open()?;
        self.field(descriptor, index, None).encode_primitive(value)
    }

    fn write_inline_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
    ) -> Result<Box<dyn ValueSink + '_>> {
        self.check_open()?;
        let type_name = descriptor.field_descriptor(index).map(Descriptor::serial_name);
        Ok(Box::new(self.field(descriptor, index, type_name)))
    }

    fn write_value_field(
        &mut self,
        descriptor: &'static Descriptor,
        index: usize,
        value: &dyn Encode,
    ) -> Result<()> {
        self.check_open()?;
        let mut field = self.field(descriptor, index, Some(value.descriptor().serial_name()));
        value.encode(&mut field)
    }

    fn end_structure(&mut self, _descriptor: &'static Descriptor) -> Result<()> {
        if self.ended {
            return Err(Error::protocol("end_structure called twice"));
        }
        self.state.close(self.depth)?;
        self.ended = true;
        Ok(())
    }
}
