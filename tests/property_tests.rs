//! Property-based tests for tree equality and the decorator invariants.

mod common;

use proptest::prelude::*;
use sinkchain::{
    to_element, to_element_with_options, CollectionBuilder, Element, Encode, FanOutSink,
    FieldFilter, FieldPosition, FilterSink, NodeMeta, PipelineOptions, Primitive, RegistryPolicy,
    ScalarRole, StructureBuilder, TreeSink,
};
use std::collections::BTreeMap;

fn property(index: usize, name: &str, value: i32) -> Element {
    Element::Scalar {
        meta: NodeMeta::new(Some("i32")).at(FieldPosition::named(index, name)),
        role: ScalarRole::Property,
        value: Primitive::I32(value),
    }
}

fn structure(fields: &[(usize, String, i32)]) -> Element {
    let mut builder = StructureBuilder::new(Some("Record"));
    for (index, name, value) in fields {
        builder.push(property(*index, name, *value));
    }
    builder.build().unwrap()
}

fn collection(values: &[i32]) -> Element {
    let mut builder = CollectionBuilder::new(Some("Vec<i32>"));
    for (index, value) in values.iter().enumerate() {
        builder.push(Element::Scalar {
            meta: NodeMeta::new(Some("i32")).at(FieldPosition::item(index)),
            role: ScalarRole::StandaloneValue,
            value: Primitive::I32(*value),
        });
    }
    builder.build().unwrap()
}

fn fan_out_trees<T: Encode + ?Sized>(value: &T, delegates: usize) -> Vec<Element> {
    let mut sinks: Vec<TreeSink> = (0..delegates).map(|_| TreeSink::new()).collect();
    {
        let mut fan_out = FanOutSink::default();
        for sink in sinks.iter_mut() {
            fan_out = fan_out.plus(sink);
        }
        value.encode(&mut fan_out).unwrap();
    }
    sinks.into_iter().map(|sink| sink.finish().unwrap()).collect()
}

fn skipping(skip: Vec<usize>) -> FieldFilter {
    FieldFilter::new(
        move |_, index| index.map_or(true, |i| !skip.contains(&i)),
        |_, _, _| true,
    )
}

fn filtered<T: Encode + ?Sized>(value: &T, filter: FieldFilter, layers: usize, outer: Option<FieldFilter>) -> Element {
    let mut tree = TreeSink::new();
    {
        let mut sink: Box<dyn sinkchain::ValueSink + '_> = Box::new(&mut tree);
        for _ in 0..layers {
            sink = Box::new(FilterSink::new(sink, filter.clone()));
        }
        if let Some(outer) = outer {
            sink = Box::new(FilterSink::new(sink, outer));
        }
        value.encode(&mut sink).unwrap();
    }
    tree.finish().unwrap()
}

proptest! {
    #[test]
    fn prop_structure_equality_ignores_field_order(
        fields in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..8),
        rotation in 0usize..8,
    ) {
        let fields: Vec<(usize, String, i32)> = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| (i, name, value))
            .collect();
        let mut reordered = fields.clone();
        reordered.reverse();
        if !reordered.is_empty() {
            let by = rotation % reordered.len();
            reordered.rotate_left(by);
        }
        prop_assert_eq!(structure(&fields), structure(&reordered));
    }

    #[test]
    fn prop_structure_equality_sees_values(
        fields in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 1..8),
    ) {
        let fields: Vec<(usize, String, i32)> = fields
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| (i, name, value))
            .collect();
        let mut changed = fields.clone();
        changed[0].2 = changed[0].2.wrapping_add(1);
        prop_assert_ne!(structure(&fields), structure(&changed));
    }

    #[test]
    fn prop_collection_equality_is_ordered(values in prop::collection::vec(any::<i32>(), 0..12)) {
        let mut reversed = values.clone();
        reversed.reverse();
        prop_assert_eq!(collection(&values) == collection(&reversed), values == reversed);
    }

    #[test]
    fn prop_fan_out_is_deterministic(
        values in prop::collection::vec(prop::collection::vec(proptest::option::of(any::<i64>()), 0..5), 0..5),
        delegates in 1usize..5,
    ) {
        let expected = to_element(&values).unwrap();
        let trees = fan_out_trees(&values, delegates);
        prop_assert_eq!(trees.len(), delegates);
        for tree in &trees {
            prop_assert_eq!(tree, &expected);
        }
    }

    #[test]
    fn prop_filter_is_idempotent(
        values in prop::collection::vec(prop::collection::vec(any::<i32>(), 0..4), 0..6),
        skip in prop::collection::vec(0usize..6, 0..4),
    ) {
        let filter = skipping(skip);
        let once = filtered(&values, filter.clone(), 1, None);
        let twice = filtered(&values, filter.clone(), 2, None);
        let widened = filtered(&values, filter, 1, Some(FieldFilter::allow_all()));
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(&once, &widened);
    }

    #[test]
    fn prop_cycles_terminate(len in 1usize..10) {
        let nodes = common::ring(len);
        let options = PipelineOptions::new()
            .with_cycle_guard(RegistryPolicy::reference())
            .with_seeded_root(true);
        let tree = to_element_with_options(&*nodes[0], options).unwrap();
        common::unlink(&nodes);
        prop_assert_eq!(tree.node_count(), 2 * len);
    }

    #[test]
    fn prop_dump_is_deterministic(values in prop::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..6)) {
        let fields: Vec<(usize, String, i32)> = values
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| (i, name, value))
            .collect();
        let tree = structure(&fields);
        prop_assert_eq!(tree.to_pretty_string(), structure(&fields).to_pretty_string());
        prop_assert_eq!(tree.to_pretty_string().lines().count(), fields.len() + 1);
    }
}

#[test]
fn test_field_names_group_duplicates() {
    let mut builder = StructureBuilder::new(Some("Record"));
    builder.push(property(0, "a", 1)).push(property(1, "a", 2));
    let left = builder.build().unwrap();

    let mut builder = StructureBuilder::new(Some("Record"));
    builder.push(property(1, "a", 2)).push(property(0, "a", 1));
    let right = builder.build().unwrap();

    // Values under one name keep their relative order.
    assert_ne!(left, right);
    let map: BTreeMap<_, _> = left.field_map().unwrap().iter().map(|(k, v)| (k, v.len())).collect();
    assert_eq!(map.get("a"), Some(&2));
}
