//! # sinkchain
//!
//! A push-based serialization pipeline. Values drive a small visitor
//! protocol ([`ValueSink`] / [`StructureSink`]); composable decorators reshape
//! the event stream on its way to a sink that materializes it as a generic,
//! inspectable [`Element`] tree.
//!
//! ## Key Features
//!
//! - **Element trees**: structures, collections, scalars and nulls, with
//!   field-order-insensitive structural equality
//! - **Cycle breaking**: [`CycleGuard`] drops back-edges of cyclic graphs
//! - **Fan-out**: [`FanOutSink`] replays one traversal into several sinks
//! - **Filtering**: [`FilterSink`] with per-consumer allow/deny markers
//! - **Format overrides**: [`FormatOverrideSink`] hands marked fields to an
//!   [`AlternateCodec`]
//! - **Inlining**: [`InlineSink`] splices marked fields into their parent
//! - **Reading back**: [`ElementReader`] and [`from_element`]
//!
//! ## Quick Start
//!
//! A type takes part in the pipeline by describing its schema and driving a
//! sink:
//!
//! ```rust
//! use sinkchain::{
//!     to_element, Describe, Descriptor, DescriptorCell, Encode, FieldDescriptor, Result,
//!     ValueSink,
//! };
//!
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Describe for Point {
//!     fn describe() -> &'static Descriptor {
//!         static CELL: DescriptorCell = DescriptorCell::new();
//!         CELL.get_or_init(|| {
//!             Descriptor::structure("Point")
//!                 .with_field(FieldDescriptor::new::<i32>("x"))
//!                 .with_field(FieldDescriptor::new::<i32>("y"))
//!         })
//!     }
//! }
//!
//! impl Encode for Point {
//!     fn descriptor(&self) -> &'static Descriptor {
//!         Self::describe()
//!     }
//!
//!     fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
//!         let descriptor = Self::describe();
//!         let mut fields = sink.begin_structure(descriptor)?;
//!         fields.write_i32_field(descriptor, 0, self.x)?;
//!         fields.write_i32_field(descriptor, 1, self.y)?;
//!         fields.end_structure(descriptor)
//!     }
//! }
//!
//! let tree = to_element(&Point { x: 1, y: 2 }).unwrap();
//! assert_eq!(tree.to_compact_string(), "Point{x=1, y=2}");
//! assert_eq!(
//!     tree.to_pretty_string(),
//!     "Structure(Point)\n  Property(i32)#x : 1\n  Property(i32)#y : 2"
//! );
//! ```
//!
//! ### One traversal, several consumers
//!
//! ```rust
//! use sinkchain::{to_elements_for, PipelineOptions};
//!
//! let trees = to_elements_for(&vec![1i32, 2], &["id1", "id2"], PipelineOptions::new()).unwrap();
//! assert_eq!(trees.len(), 2);
//! assert_eq!(trees[0], trees[1]);
//! ```
//!
//! ## Execution Model
//!
//! Everything is synchronous and single-threaded. Nesting depth of the value
//! graph becomes call stack depth, so graphs that may contain cycles must be
//! traversed with a cycle guard. Decorators and tree sinks belong to one
//! traversal and are not shared between traversals.

pub mod builder;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod fanout;
pub mod filter;
pub mod format;
pub mod guard;
mod impls;
pub mod inline;
pub mod map;
pub mod options;
mod print;
pub mod reader;
pub mod sink;
pub mod tree;
pub mod visited;

pub use builder::{CollectionBuilder, StructureBuilder};
pub use descriptor::{
    Describe, Descriptor, DescriptorCell, DescriptorFn, FieldDescriptor, GenericDescriptorCell,
    Kind, Marker,
};
pub use element::{Element, FieldPosition, NodeMeta, Primitive, PrimitiveKind, ScalarRole};
pub use error::{Error, Result};
pub use fanout::{FanOutSink, FanOutStructure};
pub use filter::{ContextualFilter, FieldFilter, FilterSink, StaticFilter};
pub use format::{AlternateCodec, ByteArray, FormatOverrideSink, FormatRegistry, JsonCodec, TreeTextCodec};
pub use guard::{CycleGuard, SharedRegistry};
pub use impls::primitive_descriptor;
pub use inline::InlineSink;
pub use map::FieldMap;
pub use options::PipelineOptions;
pub use reader::{from_element, ElementReader};
pub use sink::{undecorated, Encode, NoopSink, StructureSink, ValueSink};
pub use tree::TreeSink;
pub use visited::{Equality, EqualityKey, Indexing, ObjectId, RegistryPolicy, VisitedRegistry};

use std::rc::Rc;
use tracing::debug;

/// Materializes `value` as an element tree with default options.
///
/// # Examples
///
/// ```rust
/// use sinkchain::to_element;
///
/// let tree = to_element("hello").unwrap();
/// assert_eq!(tree.as_primitive().and_then(|p| p.as_str()), Some("hello"));
/// ```
///
/// # Errors
///
/// Returns the first error raised by the value's strategy or by a sink.
pub fn to_element<T>(value: &T) -> Result<Element>
where
    T: ?Sized + Encode,
{
    to_element_with_options(value, PipelineOptions::default())
}

/// Materializes `value` through the decorator chain configured by `options`.
///
/// When `options` names a consumer whose filter hides the root value, the
/// result is a null tree.
///
/// # Examples
///
/// ```rust
/// use sinkchain::{to_element_with_options, PipelineOptions};
///
/// let options = PipelineOptions::new().with_seeded_root(true);
/// let tree = to_element_with_options(&vec![7i32], options).unwrap();
/// assert_eq!(tree.to_compact_string(), "[7]");
/// ```
///
/// # Errors
///
/// Returns the first error raised by the value's strategy or by a sink.
pub fn to_element_with_options<T>(value: &T, options: PipelineOptions) -> Result<Element>
where
    T: ?Sized + Encode,
{
    let root: &dyn Encode = &value;
    let formats = Rc::new(options.formats.clone());
    let mut tree = TreeSink::new();
    {
        let mut sink = assemble(&mut tree, root, options.consumer.as_deref(), &options, &formats);
        root.encode(&mut sink)?;
    }
    if options.consumer.is_some() {
        tree.finish_or_null()
    } else {
        tree.finish()
    }
}

/// Drives one traversal of `value` into one tree per consumer identifier.
///
/// Each consumer gets its own chain behind a [`FanOutSink`]: an identifier
/// filter for that consumer, then the guard, format and inline stages
/// configured by `options`, then a private [`TreeSink`]. Trees are returned
/// in the order of `consumers`; `options.consumer` is not used. A consumer
/// whose filter hides the root value gets a null tree.
///
/// # Examples
///
/// ```rust
/// use sinkchain::{to_elements_for, PipelineOptions};
///
/// let trees = to_elements_for("shared", &["a", "b", "c"], PipelineOptions::new()).unwrap();
/// assert!(trees.iter().all(|tree| tree.to_compact_string() == "shared"));
/// ```
///
/// # Errors
///
/// Returns the first error raised by the value's strategy or by any sink.
pub fn to_elements_for<T>(
    value: &T,
    consumers: &[&str],
    options: PipelineOptions,
) -> Result<Vec<Element>>
where
    T: ?Sized + Encode,
{
    let root: &dyn Encode = &value;
    let formats = Rc::new(options.formats.clone());
    let mut trees: Vec<TreeSink> = consumers.iter().map(|_| TreeSink::new()).collect();
    {
        let delegates = trees
            .iter_mut()
            .zip(consumers)
            .map(|(tree, id)| assemble(tree, root, Some(*id), &options, &formats))
            .collect();
        let mut fan_out = FanOutSink::new(delegates);
        root.encode(&mut fan_out)?;
    }
    trees.into_iter().map(TreeSink::finish_or_null).collect()
}

/// Builds one delegate chain ending in `tree`.
fn assemble<'a>(
    tree: &'a mut TreeSink,
    root: &dyn Encode,
    consumer: Option<&str>,
    options: &PipelineOptions,
    formats: &Rc<FormatRegistry>,
) -> Box<dyn ValueSink + 'a> {
    let policy = options.guard_policy();
    debug!(
        consumer = consumer.unwrap_or("*"),
        guarded = policy.is_some(),
        seeded = options.seeded_root,
        inline = options.inline,
        formats = formats.len(),
        "assembling pipeline"
    );

    let mut sink: Box<dyn ValueSink + 'a> = Box::new(tree);
    if options.inline {
        sink = Box::new(InlineSink::new(sink));
    }
    sink = Box::new(FormatOverrideSink::shared(sink, Rc::clone(formats)));
    if let Some(policy) = policy {
        sink = if options.seeded_root {
            Box::new(CycleGuard::seeded(sink, root, policy))
        } else {
            Box::new(CycleGuard::with_policy(sink, policy))
        };
    }
    if let Some(id) = consumer {
        sink = Box::new(FilterSink::by_identifier(sink, id));
    }
    sink
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_root() {
        let tree = to_element(&42i32).unwrap();
        assert_eq!(tree.kind_name(), "StandaloneValue");
        assert_eq!(tree.type_name(), Some("i32"));
        assert_eq!(tree.as_primitive(), Some(&Primitive::I32(42)));
    }

    #[test]
    fn test_null_root() {
        let tree = to_element(&None::<String>).unwrap();
        assert!(tree.is_null());
        assert_eq!(tree.type_name(), None);
    }

    #[test]
    fn test_nested_collections() {
        let tree = to_element(&vec![vec![1i32], vec![2, 3]]).unwrap();
        assert_eq!(tree.to_compact_string(), "[[1], [2, 3]]");
        assert_eq!(tree.node_count(), 6);
    }

    #[test]
    fn test_fan_out_without_consumers() {
        let trees = to_elements_for(&1i32, &[], PipelineOptions::new()).unwrap();
        assert!(trees.is_empty());
    }

    #[test]
    fn test_mutably_borrowed_cell_fails() {
        let cell = std::cell::RefCell::new(5i32);
        let _guard = cell.borrow_mut();
        let err = to_element(&cell).unwrap_err();
        assert!(err.is_protocol_violation());
    }
}
