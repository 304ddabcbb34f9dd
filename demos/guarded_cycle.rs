//! Breaking a reference cycle with a cycle guard.
//!
//! Run with: cargo run --example guarded_cycle

use sinkchain::{
    to_element_with_options, Describe, Descriptor, DescriptorCell, Encode, FieldDescriptor,
    PipelineOptions, RegistryPolicy, Result, ValueSink,
};
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

struct Node {
    id: String,
    next: RefCell<Option<Rc<Node>>>,
}

impl Describe for Node {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Node")
                .with_field(FieldDescriptor::new::<String>("id"))
                .with_field(FieldDescriptor::new::<Node>("next"))
        })
    }
}

impl Encode for Node {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.id)?;
        fields.write_value_field(descriptor, 1, &self.next)?;
        fields.end_structure(descriptor)
    }
}

fn node(id: &str) -> Rc<Node> {
    Rc::new(Node {
        id: id.to_string(),
        next: RefCell::new(None),
    })
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let a = node("a");
    let b = node("b");
    let c = node("c");
    *a.next.borrow_mut() = Some(Rc::clone(&b));
    *b.next.borrow_mut() = Some(Rc::clone(&c));
    *c.next.borrow_mut() = Some(Rc::clone(&a));

    // Seeding the registry with the root drops the edge from `c` back to `a`.
    let options = PipelineOptions::new()
        .with_cycle_guard(RegistryPolicy::reference())
        .with_seeded_root(true);
    let tree = to_element_with_options(&*a, options)?;

    println!("Compact:");
    println!("{}\n", tree.to_compact_string());

    println!("Pretty:");
    println!("{}", tree);

    // Break the ring so the nodes can be dropped.
    for n in [&a, &b, &c] {
        n.next.borrow_mut().take();
    }
    Ok(())
}
