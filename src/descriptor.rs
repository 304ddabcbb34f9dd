//! Schema descriptors and their declarative markers.
//!
//! A [`Descriptor`] tells the pipeline what a value looks like: its serial
//! name, its kind, the names and types of its fields, and the [`Marker`]s
//! attached to the type and to each field. Sinks read markers lazily, field by
//! field, while the traversal runs.
//!
//! Descriptors are `'static`. Types expose theirs through [`Describe`] and
//! store it in a [`DescriptorCell`] (or a [`GenericDescriptorCell`] for
//! generic types). Field types are referenced through function pointers, so
//! recursive schemas need no special handling.
//!
//! ## Examples
//!
//! ```rust
//! use sinkchain::{Describe, Descriptor, DescriptorCell, FieldDescriptor, Marker};
//!
//! struct User;
//!
//! impl Describe for User {
//!     fn describe() -> &'static Descriptor {
//!         static CELL: DescriptorCell = DescriptorCell::new();
//!         CELL.get_or_init(|| {
//!             Descriptor::structure("User")
//!                 .with_field(FieldDescriptor::new::<String>("id"))
//!                 .with_field(
//!                     FieldDescriptor::new::<String>("email")
//!                         .with_marker(Marker::Deny(vec!["public".to_string()])),
//!                 )
//!         })
//!     }
//! }
//!
//! let descriptor = User::describe();
//! assert_eq!(descriptor.field_count(), 2);
//! assert_eq!(descriptor.field_name(1), Some("email"));
//! assert_eq!(descriptor.field_markers(1).len(), 1);
//! ```

use crate::element::PrimitiveKind;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Reference to a type's descriptor, resolved on demand.
pub type DescriptorFn = fn() -> &'static Descriptor;

/// A declarative flag or configuration value attached to a type or field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    /// Consumers allowed to see the annotated field or type.
    Allow(Vec<String>),
    /// Consumers that must not see the annotated field or type.
    Deny(Vec<String>),
    /// Encode the annotated field with the named alternate codec.
    Format(String),
    /// Splice the annotated field's structure into its parent.
    Inline,
    /// Any other marker, kept as a name and a list of values.
    Custom { name: String, values: Vec<String> },
}

impl Marker {
    /// Returns the kind name of this marker.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Marker::Allow(_) => "allow",
            Marker::Deny(_) => "deny",
            Marker::Format(_) => "format",
            Marker::Inline => "inline",
            Marker::Custom { name, .. } => name,
        }
    }

    /// Returns the string values associated with this marker.
    #[must_use]
    pub fn values(&self) -> &[String] {
        match self {
            Marker::Allow(values) | Marker::Deny(values) => values,
            Marker::Format(id) => std::slice::from_ref(id),
            Marker::Inline => &[],
            Marker::Custom { values, .. } => values,
        }
    }
}

/// The shape of a described type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Primitive(PrimitiveKind),
    Structure,
    Collection,
    Enum { variants: Vec<String> },
}

/// One field of a structure descriptor.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    type_of: DescriptorFn,
    markers: Vec<Marker>,
}

impl FieldDescriptor {
    /// Creates a field of type `T`.
    #[must_use]
    pub fn new<T: Describe + ?Sized>(name: &str) -> Self {
        Self::with_type(name, T::describe)
    }

    /// Creates a field whose type is resolved by `type_of`.
    #[must_use]
    pub fn with_type(name: &str, type_of: DescriptorFn) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            type_of,
            markers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the descriptor of this field's type.
    #[must_use]
    pub fn descriptor(&self) -> &'static Descriptor {
        (self.type_of)()
    }

    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Inline))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The field type is not resolved here; it may be the enclosing type.
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

/// Schema metadata describing a type, its fields and their markers.
#[derive(Clone)]
pub struct Descriptor {
    serial_name: String,
    kind: Kind,
    fields: Vec<FieldDescriptor>,
    markers: Vec<Marker>,
    element: Option<DescriptorFn>,
}

impl Descriptor {
    /// Creates a descriptor for a primitive kind.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::of_kind(kind.type_name(), Kind::Primitive(kind))
    }

    /// Creates a structure descriptor without fields.
    #[must_use]
    pub fn structure(serial_name: &str) -> Self {
        Self::of_kind(serial_name, Kind::Structure)
    }

    /// Creates a collection descriptor whose items are described by `element`.
    #[must_use]
    pub fn collection(serial_name: &str, element: DescriptorFn) -> Self {
        let mut descriptor = Self::of_kind(serial_name, Kind::Collection);
        descriptor.element = Some(element);
        descriptor
    }

    /// Creates an enum descriptor with the given variant names.
    #[must_use]
    pub fn enumeration(serial_name: &str, variants: &[&str]) -> Self {
        Self::of_kind(
            serial_name,
            Kind::Enum {
                variants: variants.iter().map(|v| v.to_string()).collect(),
            },
        )
    }

    fn of_kind(serial_name: &str, kind: Kind) -> Self {
        Descriptor {
            serial_name: serial_name.to_string(),
            kind,
            fields: Vec::new(),
            markers: Vec::new(),
            element: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    #[must_use]
    pub fn serial_name(&self) -> &str {
        &self.serial_name
    }

    #[must_use]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    #[must_use]
    pub fn is_structure(&self) -> bool {
        self.kind == Kind::Structure
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.kind == Kind::Collection
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    #[must_use]
    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.field(index).map(FieldDescriptor::name)
    }

    /// Returns the index of the field called `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Resolves the descriptor of field `index`.
    ///
    /// For collections every index resolves to the item descriptor.
    #[must_use]
    pub fn field_descriptor(&self, index: usize) -> Option<&'static Descriptor> {
        match self.field(index) {
            Some(field) => Some(field.descriptor()),
            None => self.element_descriptor(),
        }
    }

    /// Returns the markers attached to field `index`; empty when out of range.
    #[must_use]
    pub fn field_markers(&self, index: usize) -> &[Marker] {
        self.field(index).map(FieldDescriptor::markers).unwrap_or(&[])
    }

    /// Returns the markers attached to the type itself.
    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Returns the item descriptor of a collection.
    #[must_use]
    pub fn element_descriptor(&self) -> Option<&'static Descriptor> {
        self.element.map(|element| element())
    }

    /// Returns the name of enum variant `index`.
    #[must_use]
    pub fn variant_name(&self, index: usize) -> Option<&str> {
        match &self.kind {
            Kind::Enum { variants } => variants.get(index).map(String::as_str),
            _ => None,
        }
    }

    /// Returns the first `Format` marker on field `index`, if any.
    #[must_use]
    pub fn field_format(&self, index: usize) -> Option<&str> {
        self.field_markers(index).iter().find_map(|m| match m {
            Marker::Format(id) => Some(id.as_str()),
            _ => None,
        })
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("serial_name", &self.serial_name)
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .field("markers", &self.markers)
            .finish()
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
            || (self.serial_name == other.serial_name && self.kind == other.kind)
    }
}

/// Types with a static schema descriptor.
pub trait Describe {
    fn describe() -> &'static Descriptor;
}

/// Static storage for the descriptor of a non-generic type.
pub struct DescriptorCell(OnceLock<Descriptor>);

impl DescriptorCell {
    #[inline]
    pub const fn new() -> Self {
        DescriptorCell(OnceLock::new())
    }

    /// Returns the stored descriptor, initializing it with `f` on first use.
    #[inline]
    pub fn get_or_init<F>(&self, f: F) -> &Descriptor
    where
        F: FnOnce() -> Descriptor,
    {
        self.0.get_or_init(f)
    }
}

impl Default for DescriptorCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Static storage for descriptors of generic types.
///
/// A `static` inside a generic function is shared by every instantiation, so
/// descriptors are keyed by the [`TypeId`] of the described type and leaked
/// once per type.
pub struct GenericDescriptorCell(OnceLock<RwLock<HashMap<TypeId, &'static Descriptor>>>);

impl GenericDescriptorCell {
    #[inline]
    pub const fn new() -> Self {
        GenericDescriptorCell(OnceLock::new())
    }

    /// Returns the descriptor stored for `G`, creating it with `f` on first use.
    pub fn get_or_insert<G: Any + ?Sized>(&self, f: impl FnOnce() -> Descriptor) -> &'static Descriptor {
        let map = self.0.get_or_init(|| RwLock::new(HashMap::new()));
        let type_id = TypeId::of::<G>();

        let existing = map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .copied();
        if let Some(descriptor) = existing {
            return descriptor;
        }

        // Built outside the lock: `f` may describe other generic types.
        let descriptor = f();
        let mut guard = map.write().unwrap_or_else(PoisonError::into_inner);
        let stored: &'static Descriptor = *guard
            .entry(type_id)
            .or_insert_with(|| Box::leak(Box::new(descriptor)));
        stored
    }
}

impl Default for GenericDescriptorCell {
    fn default() -> Self {
        Self::new()
    }
}
