//! Textual dumps of element trees.
//!
//! The pretty form prints one node per line, indented by two spaces per
//! level, as `<kind>(<type_name>)#<field> : <value>`. Collection items print
//! their index as `#[i]`; the root has no field part; structures and
//! collections have no value part. The compact form renders a tree on one
//! line and is what [`TreeTextCodec`](crate::TreeTextCodec) emits.
//!
//! ```rust
//! use sinkchain::to_element;
//!
//! let tree = to_element(&vec![Some(1i32), None]).unwrap();
//! assert_eq!(
//!     tree.to_pretty_string(),
//!     "Collection(Vec<i32>)\n  StandaloneValue(i32)#[0] : 1\n  Null(i32)#[1] : null"
//! );
//! assert_eq!(tree.to_compact_string(), "[1, null]");
//! ```

use crate::{Element, Primitive};
use std::fmt;

const INDENT: usize = 2;

impl Element {
    /// Renders the indented one-node-per-line dump.
    #[must_use]
    pub fn to_pretty_string(&self) -> String {
        let mut output = String::with_capacity(64);
        write_node(&mut output, self, 0);
        output
    }

    /// Renders the tree on one line: scalars as their plain value,
    /// structures as `Type{field=value, ..}`, collections as `[a, b]`.
    #[must_use]
    pub fn to_compact_string(&self) -> String {
        let mut output = String::with_capacity(32);
        write_compact(&mut output, self);
        output
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pretty_string())
    }
}

fn write_node(output: &mut String, element: &Element, indent_level: usize) {
    if indent_level > 0 {
        output.push('\n');
        output.push_str(&" ".repeat(indent_level * INDENT));
    }

    output.push_str(element.kind_name());
    output.push('(');
    output.push_str(element.type_name().unwrap_or_default());
    output.push(')');

    if let Some(position) = &element.meta().position {
        output.push('#');
        match &position.name {
            Some(name) => output.push_str(name),
            None => {
                output.push('[');
                output.push_str(&position.index.to_string());
                output.push(']');
            }
        }
    }

    match element {
        Element::Structure { fields: children, .. }
        | Element::Collection {
            items: children, ..
        } => {
            for child in children {
                write_node(output, child, indent_level + 1);
            }
        }
        Element::Scalar { value, .. } => {
            output.push_str(" : ");
            write_quoted(output, value);
        }
        Element::Null { .. } => output.push_str(" : null"),
    }
}

fn write_quoted(output: &mut String, value: &Primitive) {
    match value {
        Primitive::String(s) => output.push_str(&format!("{:?}", s)),
        Primitive::Char(c) => output.push_str(&format!("{:?}", c)),
        other => output.push_str(&other.to_string()),
    }
}

fn write_compact(output: &mut String, element: &Element) {
    match element {
        Element::Structure { fields, .. } => {
            output.push_str(element.type_name().unwrap_or_default());
            output.push('{');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    output.push_str(", ");
                }
                match field.field_name() {
                    Some(name) => output.push_str(name),
                    None => output.push_str(&field.field_index().unwrap_or(i).to_string()),
                }
                output.push('=');
                write_compact(output, field);
            }
            output.push('}');
        }
        Element::Collection { items, .. } => {
            output.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    output.push_str(", ");
                }
                write_compact(output, item);
            }
            output.push(']');
        }
        Element::Scalar { value, .. } => output.push_str(&value.to_string()),
        Element::Null { .. } => output.push_str("null"),
    }
}
