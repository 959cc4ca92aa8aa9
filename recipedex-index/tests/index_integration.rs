// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for the content index and craftability resolver

use proptest::prelude::*;
use recipedex_core::{ContentItem, Ingredient, RecordId, TransformationRecord};
use recipedex_index::{evaluate, ContentIndex, CraftabilityResolver, IndexError, ItemCounts};
use std::collections::BTreeSet;
use std::sync::Arc;

const POOL: &[&str] = &["ore", "ingot", "coal", "plank", "stick", "sand", "glass"];

fn ids(records: &[Arc<TransformationRecord>]) -> BTreeSet<RecordId> {
    records.iter().map(|r| r.id()).collect()
}

fn slot_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..POOL.len(), 0..3)
}

fn record_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<Vec<usize>>)> {
    (
        prop::collection::vec(slot_strategy(), 1..4),
        prop::collection::vec(slot_strategy(), 0..3),
    )
}

fn build(inputs: &[Vec<usize>], outputs: &[Vec<usize>]) -> Arc<TransformationRecord> {
    let slot = |alts: &Vec<usize>| -> Ingredient {
        alts.iter().map(|i| ContentItem::item(POOL[*i])).collect()
    };
    Arc::new(
        TransformationRecord::builder("test")
            .inputs(inputs.iter().map(slot))
            .outputs(outputs.iter().map(slot))
            .build(),
    )
}

proptest! {
    /// After freezing, each reverse lookup returns exactly the valid records
    /// that mention the queried item on that side.
    #[test]
    fn prop_freeze_matches_linear_scan(shapes in prop::collection::vec(record_strategy(), 0..24)) {
        let index = ContentIndex::new();
        let records: Vec<_> = shapes.iter().map(|(i, o)| build(i, o)).collect();
        for r in &records {
            index.add(Arc::clone(r));
        }
        index.end_reload().unwrap();

        for name in POOL {
            let item = ContentItem::item(*name);
            let expected_in: BTreeSet<_> = records
                .iter()
                .filter(|r| r.is_valid() && r.consumes(&item))
                .map(|r| r.id())
                .collect();
            let expected_out: BTreeSet<_> = records
                .iter()
                .filter(|r| r.is_valid() && r.produces(&item))
                .map(|r| r.id())
                .collect();

            let by_input = index.by_input_fuzzy(&item);
            let by_output = index.by_output_fuzzy(&item);
            prop_assert_eq!(by_input.len(), expected_in.len());
            prop_assert_eq!(by_output.len(), expected_out.len());
            prop_assert_eq!(ids(&by_input), expected_in);
            prop_assert_eq!(ids(&by_output), expected_out);
        }
    }

    /// Amount and payload never change which records a lookup finds.
    #[test]
    fn prop_lookup_ignores_amount_and_data(amount in 1u64..64, tag in "[a-z]{1,8}") {
        let index = ContentIndex::new();
        let r = build(&[vec![0]], &[vec![1]]);
        index.add(Arc::clone(&r));
        index.end_reload().unwrap();

        let query = ContentItem::item("ore").with_amount(amount).with_data("nbt", tag);
        prop_assert_eq!(ids(&index.by_input_fuzzy(&query)), ids(&[r]));
    }
}

/// Removing a record that was never added changes nothing
#[test]
fn test_remove_absent_record() {
    let index = ContentIndex::new();
    let kept = build(&[vec![0]], &[vec![1]]);
    index.add(Arc::clone(&kept));
    index.end_reload().unwrap();

    let stranger = build(&[vec![0]], &[vec![1]]);
    assert!(!index.remove(&stranger));
    assert!(!index.remove(&stranger));

    assert_eq!(ids(&index.by_input_fuzzy(&ContentItem::item("ore"))), ids(&[Arc::clone(&kept)]));
    assert_eq!(index.by_category(&"test".into()).len(), 1);
    assert!(index.is_cached(&kept));
}

/// Removing twice only succeeds once
#[test]
fn test_remove_twice() {
    let index = ContentIndex::new();
    let r = build(&[vec![0]], &[vec![1]]);
    index.add(Arc::clone(&r));

    assert!(index.remove(&r));
    assert!(!index.remove(&r));
    index.end_reload().unwrap();
    assert!(index.is_empty());
}

/// Freezing twice is reported and keeps the frozen contents
#[test]
fn test_double_end_reload() {
    let index = ContentIndex::new();
    index.add(build(&[vec![0]], &[vec![1]]));
    index.end_reload().unwrap();

    assert!(matches!(index.end_reload(), Err(IndexError::AlreadyFrozen { .. })));
    assert_eq!(index.by_output_fuzzy(&ContentItem::item("ingot")).len(), 1);
}

/// First-fit always consumes the declared-first alternative
#[test]
fn test_first_fit_is_deterministic() {
    let record = TransformationRecord::builder("craft")
        .input(Ingredient::new(vec![ContentItem::item("a"), ContentItem::item("b")]))
        .build();
    let counts: ItemCounts = vec![ContentItem::item("a"), ContentItem::item("b")]
        .into_iter()
        .collect();

    let traces: Vec<_> = (0..8).map(|_| evaluate(&record, &counts).consumed).collect();
    assert!(traces.iter().all(|t| t == &traces[0]));
    assert_eq!(traces[0][0].item, ContentItem::item("a"));
}

/// Records with only trivial inputs are never craftable
#[test]
fn test_empty_requirements_never_craftable() {
    let resolver = CraftabilityResolver::open();
    let generous: ItemCounts = POOL
        .iter()
        .map(|id| ContentItem::item(*id).with_amount(1_000))
        .collect();

    let shapes = [
        TransformationRecord::builder("smelt").build(),
        TransformationRecord::builder("smelt").input(Ingredient::empty()).build(),
        TransformationRecord::builder("smelt")
            .input(Ingredient::empty())
            .input(Ingredient::of(ContentItem::empty()))
            .output(ContentItem::item("slag"))
            .build(),
    ];
    for record in &shapes {
        assert!(!resolver.is_craftable(record, &generous));
        assert!(!resolver.is_craftable(record, &ItemCounts::new()));
    }
}

/// Ore smelts into ingot; the empty-input slag record is dropped and never craftable
#[test]
fn test_smelting_scenario() {
    let index = ContentIndex::new();
    let from_a = Arc::new(
        TransformationRecord::builder("smelt")
            .input(ContentItem::item("ore"))
            .output(ContentItem::item("ingot"))
            .build(),
    );
    let from_b = Arc::new(
        TransformationRecord::builder("smelt")
            .input(Ingredient::empty())
            .output(ContentItem::item("slag"))
            .build(),
    );
    index.add(Arc::clone(&from_a));
    index.add(Arc::clone(&from_b));
    let report = index.end_reload().unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.dropped_total(), 1);

    assert_eq!(
        ids(&index.by_output_fuzzy(&ContentItem::item("ingot"))),
        ids(&[Arc::clone(&from_a)])
    );

    let resolver = CraftabilityResolver::open();
    assert!(!resolver.is_craftable(&from_b, &ItemCounts::new()));

    let counts: ItemCounts = std::iter::once(ContentItem::item("ore")).collect();
    assert!(resolver.is_craftable(&from_a, &counts));
    let outcome = evaluate(&from_a, &counts);
    assert!(outcome.craftable);
    assert_eq!(outcome.remaining.get(&ContentItem::item("ore")), 0);
}

/// Content added after freezing is queryable immediately and removable
#[test]
fn test_live_mutation_after_freeze() {
    let index = ContentIndex::new();
    index.end_reload().unwrap();

    let pushed = build(&[vec![5]], &[vec![6]]);
    index.add(Arc::clone(&pushed));
    assert_eq!(ids(&index.by_output_fuzzy(&ContentItem::item("glass"))), ids(&[Arc::clone(&pushed)]));

    assert!(index.remove(&pushed));
    assert!(index.by_output_fuzzy(&ContentItem::item("glass")).is_empty());
    assert!(index.by_input_fuzzy(&ContentItem::item("sand")).is_empty());
}

/// Concurrent live reads and writes stay consistent
#[test]
fn test_concurrent_live_updates() {
    let index = Arc::new(ContentIndex::new());
    index.end_reload().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let r = build(&[vec![2]], &[vec![3]]);
                    index.add(Arc::clone(&r));
                    let _ = index.by_input_fuzzy(&ContentItem::item("coal"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.by_input_fuzzy(&ContentItem::item("coal")).len(), 200);
    assert_eq!(index.len(), 200);
}
