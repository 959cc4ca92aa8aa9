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

//! Fuzzy-hash multimap from items to the records that mention them.

use recipedex_core::{ContentItem, FuzzyHash, RecordId, TransformationRecord};
use std::collections::HashMap;
use std::sync::Arc;

/// Records sharing one fuzzy identity. Distinct identities can collide on the
/// hash, so a bucket holds one posting per identity.
struct Posting {
    key: ContentItem,
    records: Vec<Arc<TransformationRecord>>,
}

#[derive(Default)]
pub(crate) struct ReverseIndex {
    buckets: HashMap<FuzzyHash, Vec<Posting>>,
}

/// Distinct fuzzy identities among `items`, first occurrence kept.
fn distinct<'a>(items: impl Iterator<Item = &'a ContentItem>) -> Vec<(FuzzyHash, &'a ContentItem)> {
    let mut out: Vec<(FuzzyHash, &ContentItem)> = Vec::new();
    for item in items {
        let Some(hash) = item.fuzzy_hash() else {
            continue;
        };
        if !out.iter().any(|(h, seen)| *h == hash && seen.fuzzy_eq(item)) {
            out.push((hash, item));
        }
    }
    out
}

impl ReverseIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::with_capacity(capacity),
        }
    }

    /// Associates `record` with each distinct item. A record is listed at most
    /// once per identity even if several of its slots mention it.
    pub(crate) fn insert<'a>(
        &mut self,
        items: impl Iterator<Item = &'a ContentItem>,
        record: &Arc<TransformationRecord>,
    ) {
        for (hash, item) in distinct(items) {
            let bucket = self.buckets.entry(hash).or_default();
            match bucket.iter_mut().find(|p| p.key.fuzzy_eq(item)) {
                Some(posting) => posting.records.push(Arc::clone(record)),
                None => bucket.push(Posting {
                    key: item.clone().with_amount(1),
                    records: vec![Arc::clone(record)],
                }),
            }
        }
    }

    pub(crate) fn remove<'a>(&mut self, items: impl Iterator<Item = &'a ContentItem>, id: RecordId) {
        for (hash, item) in distinct(items) {
            let Some(bucket) = self.buckets.get_mut(&hash) else {
                continue;
            };
            if let Some(posting) = bucket.iter_mut().find(|p| p.key.fuzzy_eq(item)) {
                posting.records.retain(|r| r.id() != id);
            }
            bucket.retain(|p| !p.records.is_empty());
            if bucket.is_empty() {
                self.buckets.remove(&hash);
            }
        }
    }

    pub(crate) fn get(&self, item: &ContentItem) -> Vec<Arc<TransformationRecord>> {
        let Some(hash) = item.fuzzy_hash() else {
            return Vec::new();
        };
        self.buckets
            .get(&hash)
            .and_then(|bucket| bucket.iter().find(|p| p.key.fuzzy_eq(item)))
            .map(|p| p.records.clone())
            .unwrap_or_default()
    }

    /// Number of distinct item identities.
    pub(crate) fn key_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(inputs: &[&str]) -> Arc<TransformationRecord> {
        let mut builder = TransformationRecord::builder("test");
        for id in inputs {
            builder = builder.input(ContentItem::item(*id));
        }
        Arc::new(builder.build())
    }

    #[test]
    fn test_record_listed_once_per_identity() {
        let mut index = ReverseIndex::default();
        let r = record(&["stick", "stick", "plank"]);
        index.insert(r.input_items(), &r);

        assert_eq!(index.get(&ContentItem::item("stick")).len(), 1);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn test_remove_drops_empty_buckets() {
        let mut index = ReverseIndex::default();
        let r = record(&["ore"]);
        index.insert(r.input_items(), &r);
        index.remove(r.input_items(), r.id());

        assert!(index.get(&ContentItem::item("ore")).is_empty());
        assert_eq!(index.key_count(), 0);
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let mut index = ReverseIndex::default();
        let r = record(&["ore"]);
        index.insert(r.input_items(), &r);

        assert!(index.get(&ContentItem::empty()).is_empty());
    }
}
