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

//! Craftability resolution
//!
//! Matching is first-fit: each input slot takes the first declared alternative
//! whose fuzzy hash still has enough quantity in a working copy of the counts.
//! The caller owns the counts and is responsible for calling
//! [`CraftabilityResolver::invalidate`] when they change or the index reloads.

use crate::content_index::ContentIndex;
use dashmap::DashSet;
use recipedex_core::{
    Availability, CategoryCatalog, CategoryId, ContentItem, FuzzyHash, RecordId,
    TransformationRecord,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Multiset of on-hand items keyed by fuzzy hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCounts(HashMap<FuzzyHash, u64>);

impl ItemCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of amounts per fuzzy identity. Empty items are ignored.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ContentItem>) -> Self {
        let mut counts = Self::new();
        for item in items {
            counts.insert(item);
        }
        counts
    }

    /// Adds the item's amount.
    pub fn insert(&mut self, item: &ContentItem) {
        if let Some(hash) = item.fuzzy_hash() {
            *self.0.entry(hash).or_insert(0) += item.amount;
        }
    }

    /// Overwrites the quantity on hand for the item's identity.
    pub fn set(&mut self, item: &ContentItem, quantity: u64) {
        if let Some(hash) = item.fuzzy_hash() {
            self.0.insert(hash, quantity);
        }
    }

    pub fn get(&self, item: &ContentItem) -> u64 {
        item.fuzzy_hash().map(|h| self.get_hash(h)).unwrap_or(0)
    }

    pub fn get_hash(&self, hash: FuzzyHash) -> u64 {
        self.0.get(&hash).copied().unwrap_or(0)
    }

    /// Decrements `hash` by `amount` if enough is available.
    pub fn take(&mut self, hash: FuzzyHash, amount: u64) -> bool {
        match self.0.get_mut(&hash) {
            Some(available) if *available >= amount => {
                *available -= amount;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ContentItem> for ItemCounts {
    fn from_iter<I: IntoIterator<Item = ContentItem>>(iter: I) -> Self {
        let mut counts = Self::new();
        for item in iter {
            counts.insert(&item);
        }
        counts
    }
}

/// One slot satisfied by one alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    pub slot: usize,
    pub item: ContentItem,
    pub hash: FuzzyHash,
    pub amount: u64,
}

/// Result of matching one record against a set of counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftOutcome {
    pub craftable: bool,
    /// Consumption trace in slot order.
    pub consumed: Vec<Consumption>,
    /// Working copy after consumption.
    pub remaining: ItemCounts,
}

/// Match `record` against `counts` without touching any cache.
///
/// Trivial slots are skipped. A record is only craftable if every slot is
/// satisfied and at least one slot consumed something, so a record with no
/// non-trivial input is never craftable.
pub fn evaluate(record: &TransformationRecord, counts: &ItemCounts) -> CraftOutcome {
    let mut remaining = counts.clone();
    let mut consumed = Vec::new();

    for (slot, ingredient) in record.inputs().iter().enumerate() {
        if ingredient.is_trivial() {
            continue;
        }

        let matched = ingredient.non_empty().find_map(|alt| {
            let hash = alt.fuzzy_hash()?;
            remaining.take(hash, alt.amount).then(|| Consumption {
                slot,
                item: alt.clone(),
                hash,
                amount: alt.amount,
            })
        });

        match matched {
            Some(consumption) => consumed.push(consumption),
            None => {
                return CraftOutcome {
                    craftable: false,
                    consumed,
                    remaining,
                }
            }
        }
    }

    CraftOutcome {
        craftable: !consumed.is_empty(),
        consumed,
        remaining,
    }
}

/// Catalog that treats every category as registered with inventory stock.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCatalog;

impl CategoryCatalog for OpenCatalog {
    fn is_registered(&self, _id: &CategoryId) -> bool {
        true
    }

    fn availability(&self, _id: &CategoryId) -> Option<Availability> {
        Some(Availability::Inventory)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub craftable: usize,
    pub uncraftable: usize,
    pub reachable_outputs: usize,
}

/// Memoising craftability checks.
///
/// Verdicts are stored per record in two disjoint concurrent sets; reachable
/// output hashes are stored separately. All of it is valid only for the counts
/// and index generation it was computed against.
pub struct CraftabilityResolver {
    catalog: Arc<dyn CategoryCatalog>,
    craftable: DashSet<RecordId>,
    uncraftable: DashSet<RecordId>,
    reachable: DashSet<FuzzyHash>,
}

impl CraftabilityResolver {
    pub fn new(catalog: Arc<dyn CategoryCatalog>) -> Self {
        Self {
            catalog,
            craftable: DashSet::new(),
            uncraftable: DashSet::new(),
            reachable: DashSet::new(),
        }
    }

    /// Resolver over [`OpenCatalog`].
    pub fn open() -> Self {
        Self::new(Arc::new(OpenCatalog))
    }

    fn has_stock_source(&self, category: &CategoryId) -> bool {
        matches!(
            self.catalog.availability(category),
            Some(Availability::Inventory)
        )
    }

    /// Cached craftability verdict.
    pub fn is_craftable(&self, record: &TransformationRecord, counts: &ItemCounts) -> bool {
        if let Some(verdict) = self.cached_verdict(record.id()) {
            return verdict;
        }

        let verdict = self.explain(record, counts).craftable;
        if verdict {
            self.craftable.insert(record.id());
        } else {
            self.uncraftable.insert(record.id());
        }
        verdict
    }

    /// Uncached evaluation that honours category availability.
    pub fn explain(&self, record: &TransformationRecord, counts: &ItemCounts) -> CraftOutcome {
        if !self.has_stock_source(record.category()) {
            tracing::trace!(
                category = %record.category(),
                record = %record.id(),
                "No availability source, treating as not craftable"
            );
            return CraftOutcome {
                craftable: false,
                consumed: Vec::new(),
                remaining: counts.clone(),
            };
        }
        evaluate(record, counts)
    }

    /// Whether any indexed record producing `item` is craftable.
    pub fn can_produce(&self, item: &ContentItem, index: &ContentIndex, counts: &ItemCounts) -> bool {
        let Some(hash) = item.fuzzy_hash() else {
            return false;
        };
        if self.reachable.contains(&hash) {
            return true;
        }

        let reachable = index
            .by_output_fuzzy(item)
            .iter()
            .any(|record| self.is_craftable(record, counts));
        if reachable {
            self.reachable.insert(hash);
        }
        reachable
    }

    pub fn cached_verdict(&self, id: RecordId) -> Option<bool> {
        if self.craftable.contains(&id) {
            Some(true)
        } else if self.uncraftable.contains(&id) {
            Some(false)
        } else {
            None
        }
    }

    /// Forget every verdict and reachable output.
    pub fn invalidate(&self) {
        self.craftable.clear();
        self.uncraftable.clear();
        self.reachable.clear();
        tracing::debug!("Craftability cache invalidated");
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            craftable: self.craftable.len(),
            uncraftable: self.uncraftable.len(),
            reachable_outputs: self.reachable.len(),
        }
    }
}

impl std::fmt::Debug for CraftabilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraftabilityResolver")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipedex_core::Ingredient;

    struct ClosedCatalog;

    impl CategoryCatalog for ClosedCatalog {
        fn is_registered(&self, id: &CategoryId) -> bool {
            id.as_str() != "unknown"
        }

        fn availability(&self, id: &CategoryId) -> Option<Availability> {
            match id.as_str() {
                "unknown" => None,
                "info" => Some(Availability::Unavailable),
                _ => Some(Availability::Inventory),
            }
        }
    }

    fn counts(entries: &[(&str, u64)]) -> ItemCounts {
        entries
            .iter()
            .map(|(id, n)| ContentItem::item(*id).with_amount(*n))
            .collect()
    }

    #[test]
    fn test_first_fit_prefers_declared_order() {
        let record = TransformationRecord::builder("craft")
            .input(Ingredient::new(vec![
                ContentItem::item("oak"),
                ContentItem::item("birch"),
            ]))
            .output(ContentItem::item("stick"))
            .build();
        let available = counts(&[("oak", 1), ("birch", 1)]);

        let first = evaluate(&record, &available);
        let second = evaluate(&record, &available);

        assert!(first.craftable);
        assert_eq!(first.consumed.len(), 1);
        assert_eq!(first.consumed[0].item.id, "oak");
        assert_eq!(first.consumed, second.consumed);
        assert_eq!(first.remaining.get(&ContentItem::item("oak")), 0);
        assert_eq!(first.remaining.get(&ContentItem::item("birch")), 1);
        // the caller's counts are untouched
        assert_eq!(available.get(&ContentItem::item("oak")), 1);
    }

    #[test]
    fn test_falls_through_to_later_alternative() {
        let record = TransformationRecord::builder("craft")
            .input(Ingredient::new(vec![
                ContentItem::item("oak").with_amount(2),
                ContentItem::item("birch"),
            ]))
            .build();

        let outcome = evaluate(&record, &counts(&[("oak", 1), ("birch", 1)]));
        assert!(outcome.craftable);
        assert_eq!(outcome.consumed[0].item.id, "birch");
    }

    #[test]
    fn test_slots_compete_for_the_same_stock() {
        let record = TransformationRecord::builder("craft")
            .input(ContentItem::item("plank"))
            .input(ContentItem::item("plank"))
            .build();

        assert!(!evaluate(&record, &counts(&[("plank", 1)])).craftable);
        assert!(evaluate(&record, &counts(&[("plank", 2)])).craftable);
    }

    #[test]
    fn test_trivial_slots_do_not_count() {
        let only_empty = TransformationRecord::builder("craft")
            .input(Ingredient::empty())
            .input(Ingredient::of(ContentItem::empty()))
            .output(ContentItem::item("air"))
            .build();
        assert!(!evaluate(&only_empty, &counts(&[("anything", 64)])).craftable);

        let mixed = TransformationRecord::builder("craft")
            .input(Ingredient::empty())
            .input(ContentItem::item("ore"))
            .build();
        assert!(evaluate(&mixed, &counts(&[("ore", 1)])).craftable);
    }

    #[test]
    fn test_unavailable_category_is_not_craftable() {
        let resolver = CraftabilityResolver::new(Arc::new(ClosedCatalog));
        let available = counts(&[("ore", 4)]);

        for category in ["unknown", "info"] {
            let record = TransformationRecord::builder(category)
                .input(ContentItem::item("ore"))
                .build();
            assert!(!resolver.is_craftable(&record, &available));
        }
    }

    #[test]
    fn test_verdicts_are_memoised_until_invalidated() {
        let resolver = CraftabilityResolver::open();
        let record = TransformationRecord::builder("smelt")
            .input(ContentItem::item("ore"))
            .build();

        assert!(!resolver.is_craftable(&record, &ItemCounts::new()));
        // stale verdict until the caller invalidates
        assert!(!resolver.is_craftable(&record, &counts(&[("ore", 1)])));
        assert_eq!(resolver.cached_verdict(record.id()), Some(false));

        resolver.invalidate();
        assert_eq!(resolver.cached_verdict(record.id()), None);
        assert!(resolver.is_craftable(&record, &counts(&[("ore", 1)])));
        assert_eq!(resolver.stats().craftable, 1);
    }

    #[test]
    fn test_can_produce_remembers_reachable_outputs() {
        let index = ContentIndex::new();
        index.add(Arc::new(
            TransformationRecord::builder("smelt")
                .input(ContentItem::item("ore"))
                .output(ContentItem::item("ingot"))
                .build(),
        ));
        index.end_reload().unwrap();

        let resolver = CraftabilityResolver::open();
        let ingot = ContentItem::item("ingot");

        assert!(!resolver.can_produce(&ingot, &index, &ItemCounts::new()));
        resolver.invalidate();
        assert!(resolver.can_produce(&ingot, &index, &counts(&[("ore", 1)])));
        assert_eq!(resolver.stats().reachable_outputs, 1);
        assert!(resolver.can_produce(&ingot, &index, &ItemCounts::new()));
        assert!(!resolver.can_produce(&ContentItem::empty(), &index, &ItemCounts::new()));
    }
}
