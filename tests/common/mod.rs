//! Model types shared by the integration suites.

#![allow(dead_code)]

use sinkchain::{
    Describe, Descriptor, DescriptorCell, Encode, FieldDescriptor, Marker, ObjectId, Result,
    ValueSink,
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sinkchain=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

/// A linked node; `nested` may point back up the chain.
#[derive(Debug)]
pub struct Node {
    pub id: String,
    pub nested: RefCell<Option<Rc<Node>>>,
}

impl Node {
    pub fn new(id: &str) -> Rc<Node> {
        Rc::new(Node {
            id: id.to_string(),
            nested: RefCell::new(None),
        })
    }

    pub fn link(&self, next: &Rc<Node>) {
        *self.nested.borrow_mut() = Some(Rc::clone(next));
    }
}

/// Builds `id0 -> id1 -> .. -> id{len-1} -> id0`.
pub fn ring(len: usize) -> Vec<Rc<Node>> {
    let nodes: Vec<_> = (0..len).map(|i| Node::new(&format!("id{}", i))).collect();
    for (i, node) in nodes.iter().enumerate() {
        node.link(&nodes[(i + 1) % len]);
    }
    nodes
}

/// Breaks the ring so the nodes can be dropped.
pub fn unlink(nodes: &[Rc<Node>]) {
    for node in nodes {
        node.nested.borrow_mut().take();
    }
}

impl Describe for Node {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Node")
                .with_field(FieldDescriptor::new::<String>("id"))
                .with_field(FieldDescriptor::new::<Node>("nested"))
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
        fields.write_value_field(descriptor, 1, &self.nested)?;
        fields.end_structure(descriptor)
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub id: String,
    pub name: String,
}

impl Describe for Header {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Header")
                .with_field(FieldDescriptor::new::<String>("id"))
                .with_field(FieldDescriptor::new::<String>("name"))
        })
    }
}

impl Encode for Header {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.id)?;
        fields.write_str_field(descriptor, 1, &self.name)?;
        fields.end_structure(descriptor)
    }
}

/// A record whose `header` is spliced into it.
#[derive(Debug, Clone)]
pub struct Profile {
    pub header: Header,
    pub age: i32,
}

impl Describe for Profile {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Profile")
                .with_field(FieldDescriptor::new::<Header>("header").with_marker(Marker::Inline))
                .with_field(FieldDescriptor::new::<i32>("age"))
        })
    }
}

impl Encode for Profile {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_value_field(descriptor, 0, &self.header)?;
        fields.write_i32_field(descriptor, 1, self.age)?;
        fields.end_structure(descriptor)
    }
}

/// A string hidden from the `guest` consumer wherever it appears.
#[derive(Debug, Clone)]
pub struct Secret(pub String);

impl Describe for Secret {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| Descriptor::structure("Secret"))
    }
}

impl Encode for Secret {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        sink.encode_str(&self.0)
    }

    fn visible_to(&self, consumer: &str) -> bool {
        consumer != "guest"
    }
}

/// `restricted` carries `allow = [id2]` and `deny = [id1]`.
#[derive(Debug, Clone)]
pub struct Report {
    pub restricted: String,
    pub open: String,
    pub note: Secret,
}

impl Describe for Report {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Report")
                .with_field(
                    FieldDescriptor::new::<String>("restricted")
                        .with_marker(Marker::Allow(vec!["id2".to_string()]))
                        .with_marker(Marker::Deny(vec!["id1".to_string()])),
                )
                .with_field(FieldDescriptor::new::<String>("open"))
                .with_field(FieldDescriptor::new::<Secret>("note"))
        })
    }
}

impl Encode for Report {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.restricted)?;
        fields.write_str_field(descriptor, 1, &self.open)?;
        fields.write_value_field(descriptor, 2, &self.note)?;
        fields.end_structure(descriptor)
    }
}

/// A label compared by content under value equality.
#[derive(Debug, Clone)]
pub struct Tag(pub String);

impl Describe for Tag {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| Descriptor::structure("Tag"))
    }
}

impl Encode for Tag {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        sink.encode_str(&self.0)
    }

    fn identity(&self) -> Option<ObjectId> {
        Some(
            ObjectId::of(self)
                .with_schema(self.descriptor())
                .with_key(self.0.clone()),
        )
    }
}

/// Fields routed through alternate codecs by format id.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub count: i32,
    pub samples: Vec<i32>,
    pub raw: Vec<i32>,
}

impl Describe for Measurement {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Measurement")
                .with_field(
                    FieldDescriptor::new::<i32>("count").with_marker(Marker::Format("text".to_string())),
                )
                .with_field(
                    FieldDescriptor::new::<Vec<i32>>("samples")
                        .with_marker(Marker::Format("json".to_string())),
                )
                .with_field(
                    FieldDescriptor::new::<Vec<i32>>("raw")
                        .with_marker(Marker::Format("json-bytes".to_string())),
                )
        })
    }
}

impl Encode for Measurement {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_i32_field(descriptor, 0, self.count)?;
        fields.write_value_field(descriptor, 1, &self.samples)?;
        fields.write_value_field(descriptor, 2, &self.raw)?;
        fields.end_structure(descriptor)
    }
}

/// `secret` carries `deny = [guest]`; `header` may be shared with an outer value.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub public: String,
    pub secret: String,
    pub header: Rc<Header>,
}

impl Describe for Bundle {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Bundle")
                .with_field(FieldDescriptor::new::<String>("public"))
                .with_field(
                    FieldDescriptor::new::<String>("secret")
                        .with_marker(Marker::Deny(vec!["guest".to_string()])),
                )
                .with_field(FieldDescriptor::new::<Header>("header"))
        })
    }
}

impl Encode for Bundle {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.public)?;
        fields.write_str_field(descriptor, 1, &self.secret)?;
        fields.write_value_field(descriptor, 2, &self.header)?;
        fields.end_structure(descriptor)
    }
}

/// Writes `header`, then `payload` through the `json` format.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub header: Rc<Header>,
    pub payload: Bundle,
}

impl Describe for Envelope {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Envelope")
                .with_field(FieldDescriptor::new::<Header>("header"))
                .with_field(
                    FieldDescriptor::new::<Bundle>("payload")
                        .with_marker(Marker::Format("json".to_string())),
                )
        })
    }
}

impl Encode for Envelope {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_value_field(descriptor, 0, &self.header)?;
        fields.write_value_field(descriptor, 1, &self.payload)?;
        fields.end_structure(descriptor)
    }
}

/// A type only the `admin` consumer may see.
#[derive(Debug, Clone)]
pub struct AdminNote(pub String);

impl Describe for AdminNote {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("AdminNote")
                .with_marker(Marker::Allow(vec!["admin".to_string()]))
                .with_field(FieldDescriptor::new::<String>("text"))
        })
    }
}

impl Encode for AdminNote {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.0)?;
        fields.end_structure(descriptor)
    }
}

/// A field whose format marker names no format.
#[derive(Debug, Clone)]
pub struct Blank {
    pub value: i32,
}

impl Describe for Blank {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Blank")
                .with_field(FieldDescriptor::new::<i32>("value").with_marker(Marker::Format(String::new())))
        })
    }
}

impl Encode for Blank {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_i32_field(descriptor, 0, self.value)?;
        fields.end_structure(descriptor)
    }
}
