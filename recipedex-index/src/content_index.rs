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

//! Bidirectional record index with a staging and a frozen mode.

use crate::error::{IndexError, IndexResult};
use crate::reverse::ReverseIndex;
use parking_lot::RwLock;
use recipedex_core::{CategoryId, ContentItem, RecordId, TransformationRecord};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Why a staged record was left out of the frozen index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// No input slot has a non-empty alternative.
    EmptyInputs,
    /// The record's category is not registered.
    UnregisteredCategory,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::EmptyInputs => f.write_str("empty inputs"),
            DropReason::UnregisteredCategory => f.write_str("unregistered category"),
        }
    }
}

/// Outcome of freezing one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreezeReport {
    pub generation: u64,
    /// Records now present in the reverse maps.
    pub indexed: usize,
    /// Dropped records per category and reason.
    pub dropped: BTreeMap<(CategoryId, DropReason), usize>,
    pub elapsed_us: u64,
}

impl FreezeReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub generation: u64,
    pub frozen: bool,
    pub staged: usize,
    pub indexed: usize,
    pub categories: usize,
    pub input_keys: usize,
    pub output_keys: usize,
}

/// Records registered but not yet reverse-indexed.
///
/// Removal leaves a tombstone so it stays O(1); tombstones are compacted once
/// they outnumber live records.
#[derive(Default)]
struct StagingSet {
    slots: Vec<Option<Arc<TransformationRecord>>>,
    positions: HashMap<RecordId, usize>,
}

impl StagingSet {
    /// Re-adding a staged id moves the record to the end.
    fn push(&mut self, record: Arc<TransformationRecord>) {
        let id = record.id();
        if let Some(pos) = self.positions.insert(id, self.slots.len()) {
            self.slots[pos] = None;
        }
        self.slots.push(Some(record));
        self.compact_if_sparse();
    }

    fn remove(&mut self, id: RecordId) -> Option<Arc<TransformationRecord>> {
        let pos = self.positions.remove(&id)?;
        let record = self.slots[pos].take();
        self.compact_if_sparse();
        record
    }

    fn compact_if_sparse(&mut self) {
        if self.slots.len() > 32 && self.slots.len() > 2 * self.positions.len() {
            self.compact();
        }
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (pos, record) in self.slots.iter().flatten().enumerate() {
            self.positions.insert(record.id(), pos);
        }
    }

    fn contains(&self, id: RecordId) -> bool {
        self.positions.contains_key(&id)
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<TransformationRecord>> + '_ {
        self.slots.iter().flatten()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn take(&mut self) -> Vec<Arc<TransformationRecord>> {
        self.positions.clear();
        std::mem::take(&mut self.slots).into_iter().flatten().collect()
    }
}

/// Query-optimised structures built once per generation.
#[derive(Default)]
struct FrozenIndex {
    members: HashMap<RecordId, Arc<TransformationRecord>>,
    by_category: HashMap<CategoryId, Vec<Arc<TransformationRecord>>>,
    by_input: ReverseIndex,
    by_output: ReverseIndex,
}

impl FrozenIndex {
    /// Re-inserting an indexed id replaces it rather than duplicating postings.
    fn insert(&mut self, record: Arc<TransformationRecord>) {
        self.remove(record.id());
        self.by_input.insert(record.input_items(), &record);
        self.by_output.insert(record.output_items(), &record);
        self.by_category
            .entry(record.category().clone())
            .or_default()
            .push(Arc::clone(&record));
        self.members.insert(record.id(), record);
    }

    fn remove(&mut self, id: RecordId) -> Option<Arc<TransformationRecord>> {
        let record = self.members.remove(&id)?;
        self.by_input.remove(record.input_items(), id);
        self.by_output.remove(record.output_items(), id);
        if let Some(list) = self.by_category.get_mut(record.category()) {
            list.retain(|r| r.id() != id);
            if list.is_empty() {
                self.by_category.remove(record.category());
            }
        }
        Some(record)
    }
}

enum IndexState {
    Staging(StagingSet),
    Frozen(FrozenIndex),
}

struct Inner {
    generation: u64,
    state: IndexState,
}

/// Bidirectional cache between records and the items they consume/produce.
///
/// A record lives in exactly one of the staging set or the frozen structures.
/// `reset` discards both and starts a new generation; nothing from an earlier
/// generation survives into the next.
pub struct ContentIndex {
    inner: RwLock<Inner>,
}

impl Default for ContentIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentIndex {
    /// Create an empty index in staging mode at generation 0.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                generation: 0,
                state: IndexState::Staging(StagingSet::default()),
            }),
        }
    }

    /// Discard everything and start staging for `generation`.
    pub fn reset(&self, generation: u64) {
        let mut inner = self.inner.write();
        inner.generation = generation;
        inner.state = IndexState::Staging(StagingSet::default());
        tracing::debug!(generation, "Content index reset to staging");
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Fails when the index has moved on to a different generation.
    pub fn check_generation(&self, expected: u64) -> IndexResult<()> {
        let current = self.generation();
        if current == expected {
            Ok(())
        } else {
            Err(IndexError::StaleGeneration {
                requested: expected,
                current,
            })
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.inner.read().state, IndexState::Frozen(_))
    }

    /// Insert into staging, or straight into the frozen maps after freezing.
    ///
    /// Records are keyed by id: distinct records with equal content are all
    /// kept, while adding the same id again replaces the earlier entry.
    pub fn add(&self, record: Arc<TransformationRecord>) {
        let mut inner = self.inner.write();
        Self::insert_into(&mut inner, record);
    }

    /// Like [`ContentIndex::add`], but only while the index is still at
    /// `generation`. The check and the insert happen under one write lock, so
    /// a concurrent [`ContentIndex::reset`] either wipes the record or rejects it.
    pub fn add_if(&self, generation: u64, record: Arc<TransformationRecord>) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        Self::insert_into(&mut inner, record);
        true
    }

    fn insert_into(inner: &mut Inner, record: Arc<TransformationRecord>) {
        match &mut inner.state {
            IndexState::Staging(staging) => staging.push(record),
            IndexState::Frozen(frozen) => frozen.insert(record),
        }
    }

    /// Remove a record from whichever set holds it.
    pub fn remove(&self, record: &TransformationRecord) -> bool {
        self.remove_by_id(record.id()).is_some()
    }

    pub fn remove_by_id(&self, id: RecordId) -> Option<Arc<TransformationRecord>> {
        let mut inner = self.inner.write();
        match &mut inner.state {
            IndexState::Staging(staging) => staging.remove(id),
            IndexState::Frozen(frozen) => frozen.remove(id),
        }
    }

    /// Freeze with the built-in shape validation only.
    pub fn end_reload(&self) -> IndexResult<FreezeReport> {
        self.end_reload_with(|_| None)
    }

    /// Promote every staged record into the frozen structures.
    ///
    /// Records failing shape validation, or for which `reject` returns a reason,
    /// are dropped and counted per category. Calling this on a frozen index is
    /// reported as [`IndexError::AlreadyFrozen`] and leaves the index untouched.
    pub fn end_reload_with<F>(&self, reject: F) -> IndexResult<FreezeReport>
    where
        F: Fn(&TransformationRecord) -> Option<DropReason>,
    {
        let start = Instant::now();
        let mut inner = self.inner.write();
        let generation = inner.generation;

        let staged = match &mut inner.state {
            IndexState::Staging(staging) => staging.take(),
            IndexState::Frozen(_) => {
                tracing::error!(generation, "end_reload called on an already frozen index");
                return Err(IndexError::AlreadyFrozen { generation });
            }
        };

        let mut report = FreezeReport {
            generation,
            ..FreezeReport::default()
        };
        let mut frozen = FrozenIndex {
            members: HashMap::with_capacity(staged.len()),
            by_category: HashMap::new(),
            by_input: ReverseIndex::with_capacity(staged.len()),
            by_output: ReverseIndex::with_capacity(staged.len()),
        };

        for record in staged {
            let reason = if record.is_valid() {
                reject(&record)
            } else {
                Some(DropReason::EmptyInputs)
            };
            match reason {
                Some(reason) => {
                    *report
                        .dropped
                        .entry((record.category().clone(), reason))
                        .or_insert(0) += 1;
                }
                None => frozen.insert(record),
            }
        }

        report.indexed = frozen.members.len();
        inner.state = IndexState::Frozen(frozen);
        report.elapsed_us = start.elapsed().as_micros() as u64;

        for ((category, reason), count) in &report.dropped {
            tracing::warn!(
                category = %category,
                reason = %reason,
                count = count,
                "Dropped records while freezing index"
            );
        }
        tracing::info!(
            generation,
            indexed = report.indexed,
            dropped = report.dropped_total(),
            elapsed_us = report.elapsed_us,
            "Content index frozen"
        );

        Ok(report)
    }

    /// Records of a category in insertion order.
    ///
    /// While staging this scans the staging set.
    pub fn by_category(&self, category: &CategoryId) -> Vec<Arc<TransformationRecord>> {
        let inner = self.inner.read();
        match &inner.state {
            IndexState::Staging(staging) => staging
                .iter()
                .filter(|r| r.category() == category)
                .cloned()
                .collect(),
            IndexState::Frozen(frozen) => frozen
                .by_category
                .get(category)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Records whose inputs mention an item fuzzy-equal to `item`.
    /// Empty while staging; see [`ContentIndex::scan`].
    pub fn by_input_fuzzy(&self, item: &ContentItem) -> Vec<Arc<TransformationRecord>> {
        match &self.inner.read().state {
            IndexState::Staging(_) => Vec::new(),
            IndexState::Frozen(frozen) => frozen.by_input.get(item),
        }
    }

    /// Records whose outputs mention an item fuzzy-equal to `item`.
    pub fn by_output_fuzzy(&self, item: &ContentItem) -> Vec<Arc<TransformationRecord>> {
        match &self.inner.read().state {
            IndexState::Staging(_) => Vec::new(),
            IndexState::Frozen(frozen) => frozen.by_output.get(item),
        }
    }

    pub fn contains(&self, id: RecordId) -> bool {
        match &self.inner.read().state {
            IndexState::Staging(staging) => staging.contains(id),
            IndexState::Frozen(frozen) => frozen.members.contains_key(&id),
        }
    }

    /// Whether `record` participates in the reverse maps.
    pub fn is_cached(&self, record: &TransformationRecord) -> bool {
        match &self.inner.read().state {
            IndexState::Staging(_) => false,
            IndexState::Frozen(frozen) => frozen.members.contains_key(&record.id()),
        }
    }

    /// Linear scan over every record currently held, staged or frozen.
    ///
    /// Staged records come back in insertion order; frozen ones grouped by
    /// category in identifier order, each group in insertion order.
    pub fn scan<P>(&self, predicate: P) -> Vec<Arc<TransformationRecord>>
    where
        P: Fn(&TransformationRecord) -> bool,
    {
        let inner = self.inner.read();
        match &inner.state {
            IndexState::Staging(staging) => staging
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
            IndexState::Frozen(frozen) => {
                let mut groups: Vec<_> = frozen.by_category.iter().collect();
                groups.sort_by(|a, b| a.0.cmp(b.0));
                groups
                    .into_iter()
                    .flat_map(|(_, records)| records)
                    .filter(|r| predicate(r))
                    .cloned()
                    .collect()
            }
        }
    }

    /// Every record currently held.
    pub fn records(&self) -> Vec<Arc<TransformationRecord>> {
        self.scan(|_| true)
    }

    pub fn len(&self) -> usize {
        match &self.inner.read().state {
            IndexState::Staging(staging) => staging.len(),
            IndexState::Frozen(frozen) => frozen.members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        match &inner.state {
            IndexState::Staging(staging) => IndexStats {
                generation: inner.generation,
                frozen: false,
                staged: staging.len(),
                ..IndexStats::default()
            },
            IndexState::Frozen(frozen) => IndexStats {
                generation: inner.generation,
                frozen: true,
                staged: 0,
                indexed: frozen.members.len(),
                categories: frozen.by_category.len(),
                input_keys: frozen.by_input.key_count(),
                output_keys: frozen.by_output.key_count(),
            },
        }
    }
}
