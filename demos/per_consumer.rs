//! One traversal, one tree per consumer.
//!
//! Run with: cargo run --example per_consumer

use sinkchain::{
    to_elements_for, Describe, Descriptor, DescriptorCell, Encode, FieldDescriptor, Marker,
    PipelineOptions, Result, ValueSink,
};
use std::error::Error;

struct Employee {
    name: String,
    team: String,
    salary: i64,
}

impl Describe for Employee {
    fn describe() -> &'static Descriptor {
        static CELL: DescriptorCell = DescriptorCell::new();
        CELL.get_or_init(|| {
            Descriptor::structure("Employee")
                .with_field(FieldDescriptor::new::<String>("name"))
                .with_field(
                    FieldDescriptor::new::<String>("team")
                        .with_marker(Marker::Deny(vec!["public".to_string()])),
                )
                .with_field(
                    FieldDescriptor::new::<i64>("salary")
                        .with_marker(Marker::Allow(vec!["payroll".to_string()])),
                )
        })
    }
}

impl Encode for Employee {
    fn descriptor(&self) -> &'static Descriptor {
        Self::describe()
    }

    fn encode(&self, sink: &mut dyn ValueSink) -> Result<()> {
        let descriptor = Self::describe();
        let mut fields = sink.begin_structure(descriptor)?;
        fields.write_str_field(descriptor, 0, &self.name)?;
        fields.write_str_field(descriptor, 1, &self.team)?;
        fields.write_i64_field(descriptor, 2, self.salary)?;
        fields.end_structure(descriptor)
    }
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let employee = Employee {
        name: "Ada".to_string(),
        team: "Engines".to_string(),
        salary: 120_000,
    };

    let consumers = ["public", "staff", "payroll"];
    let trees = to_elements_for(&employee, &consumers, PipelineOptions::new())?;

    for (consumer, tree) in consumers.iter().zip(&trees) {
        println!("{}: {}", consumer, tree.to_compact_string());
        println!("{}\n", serde_json::to_string(tree)?);
    }
    Ok(())
}
