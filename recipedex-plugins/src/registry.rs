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

//! Record registry facade over the content index.
//!
//! Contributors never see the index directly. During a `Start` stage each one
//! gets a [`RecordScope`] bound to the running cycle; the scope merges records
//! by location key, remembers where each record came from, and drops additions
//! once its cycle was interrupted or superseded.

use crate::category_registry::CategoryRegistry;
use crate::contributor::Contributor;
use crate::error::ReloadResult;
use crate::reloadable::{ReloadContext, Reloadable};
use dashmap::DashMap;
use parking_lot::Mutex;
use recipedex_core::{
    CategoryCatalog, CategoryId, ContentItem, IndexConfig, LocationKey, RecordId, ReloadStage,
    TransformationRecord,
};
use recipedex_index::{
    ContentIndex, CraftabilityResolver, DropReason, FreezeReport, IndexStats, ItemCounts,
    ResolverStats,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Who registered a record, kept for the lifetime of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOrigin {
    pub contributor: String,
    pub stage: ReloadStage,
    pub generation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub index: IndexStats,
    pub categories: usize,
    pub origins: usize,
    pub resolver: ResolverStats,
    pub last_freeze: Option<FreezeReport>,
}

pub struct RecordRegistry {
    index: Arc<ContentIndex>,
    resolver: CraftabilityResolver,
    categories: Arc<CategoryRegistry>,
    config: IndexConfig,
    origins: DashMap<RecordId, RecordOrigin>,
    /// Also serialises scoped inserts against `start_reload`.
    locations: Mutex<HashMap<(CategoryId, LocationKey), RecordId>>,
    /// Generation whose `Start` stage ran to completion.
    completed_start: Mutex<Option<u64>>,
    last_freeze: Mutex<Option<FreezeReport>>,
}

impl RecordRegistry {
    pub fn new(categories: Arc<CategoryRegistry>, config: IndexConfig) -> Self {
        let catalog: Arc<dyn CategoryCatalog> = Arc::clone(&categories) as Arc<dyn CategoryCatalog>;
        Self {
            index: Arc::new(ContentIndex::new()),
            resolver: CraftabilityResolver::new(catalog),
            categories,
            config,
            origins: DashMap::new(),
            locations: Mutex::new(HashMap::new()),
            completed_start: Mutex::new(None),
            last_freeze: Mutex::new(None),
        }
    }

    pub fn index(&self) -> &Arc<ContentIndex> {
        &self.index
    }

    pub fn resolver(&self) -> &CraftabilityResolver {
        &self.resolver
    }

    pub fn categories(&self) -> &Arc<CategoryRegistry> {
        &self.categories
    }

    /// Add a record outside any contributor, e.g. a server-pushed update.
    pub fn add(&self, record: TransformationRecord) -> RecordId {
        let record = Arc::new(record);
        let mut locations = self.locations.lock();
        self.index.add(Arc::clone(&record));
        self.commit(&mut locations, &record, None)
    }

    /// Insert on behalf of a cycle. Rejected once the cycle was interrupted or
    /// the index moved to another generation.
    fn insert_scoped(
        &self,
        record: Arc<TransformationRecord>,
        ctx: &ReloadContext,
        origin: RecordOrigin,
    ) -> Option<RecordId> {
        let mut locations = self.locations.lock();
        if ctx.is_interrupted() || !self.index.add_if(ctx.generation(), Arc::clone(&record)) {
            return None;
        }
        Some(self.commit(&mut locations, &record, Some(origin)))
    }

    /// Location merge and origin bookkeeping for a record already in the index.
    fn commit(
        &self,
        locations: &mut HashMap<(CategoryId, LocationKey), RecordId>,
        record: &TransformationRecord,
        origin: Option<RecordOrigin>,
    ) -> RecordId {
        let id = record.id();
        if let Some(location) = record.location() {
            let key = (record.category().clone(), location.clone());
            if let Some(previous) = locations.insert(key, id).filter(|previous| *previous != id) {
                if self.index.remove_by_id(previous).is_some() {
                    tracing::debug!(
                        category = %record.category(),
                        location = %location,
                        "Later registration replaced record at the same location"
                    );
                }
                self.origins.remove(&previous);
            }
        }
        if let Some(origin) = origin {
            self.origins.insert(id, origin);
        }
        self.invalidate_if_frozen();
        id
    }

    /// Live mutation after a freeze makes memoised verdicts unreliable.
    fn invalidate_if_frozen(&self) {
        if self.index.is_frozen() {
            self.resolver.invalidate();
        }
    }

    /// Remove a record from the index and forget its origin and location.
    pub fn remove(&self, record: &TransformationRecord) -> bool {
        let removed = self.index.remove(record);
        if removed {
            self.invalidate_if_frozen();
            self.origins.remove(&record.id());
            if let Some(location) = record.location() {
                let mut locations = self.locations.lock();
                let key = (record.category().clone(), location.clone());
                if locations.get(&key) == Some(&record.id()) {
                    locations.remove(&key);
                }
            }
        }
        removed
    }

    pub fn by_category(&self, category: &CategoryId) -> Vec<Arc<TransformationRecord>> {
        self.index.by_category(category)
    }

    /// Records producing `item`. Falls back to a scan while staging.
    pub fn recipes_for(&self, item: &ContentItem) -> Vec<Arc<TransformationRecord>> {
        if self.index.is_frozen() {
            self.index.by_output_fuzzy(item)
        } else {
            self.index.scan(|r| r.produces(item))
        }
    }

    /// Records consuming `item`. Falls back to a scan while staging.
    pub fn usages_for(&self, item: &ContentItem) -> Vec<Arc<TransformationRecord>> {
        if self.index.is_frozen() {
            self.index.by_input_fuzzy(item)
        } else {
            self.index.scan(|r| r.consumes(item))
        }
    }

    pub fn is_craftable(&self, record: &TransformationRecord, counts: &ItemCounts) -> bool {
        self.resolver.is_craftable(record, counts)
    }

    pub fn can_produce(&self, item: &ContentItem, counts: &ItemCounts) -> bool {
        self.resolver.can_produce(item, &self.index, counts)
    }

    pub fn origin(&self, id: RecordId) -> Option<RecordOrigin> {
        self.origins.get(&id).map(|entry| entry.value().clone())
    }

    pub fn last_freeze(&self) -> Option<FreezeReport> {
        self.last_freeze.lock().clone()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            index: self.index.stats(),
            categories: self.categories.len(),
            origins: self.origins.len(),
            resolver: self.resolver.stats(),
            last_freeze: self.last_freeze(),
        }
    }

    /// `None` when the generation never finished its `Start` stage; a partial
    /// staging set is never committed.
    fn freeze(&self, ctx: &ReloadContext) -> ReloadResult<Option<FreezeReport>> {
        if *self.completed_start.lock() != Some(ctx.generation()) {
            tracing::debug!(
                generation = ctx.generation(),
                "Start stage did not complete for this generation, not freezing"
            );
            return Ok(None);
        }
        self.index.check_generation(ctx.generation())?;
        let categories = &self.categories;
        let report = if self.config.drop_unregistered_categories {
            self.index.end_reload_with(|record| {
                (!categories.is_registered(record.category()))
                    .then_some(DropReason::UnregisteredCategory)
            })?
        } else {
            self.index.end_reload()?
        };

        // dropped records keep no origin
        self.origins.retain(|id, _| self.index.contains(*id));
        self.resolver.invalidate();
        *self.last_freeze.lock() = Some(report.clone());
        Ok(Some(report))
    }
}

impl Reloadable for RecordRegistry {
    fn name(&self) -> &str {
        "records"
    }

    fn start_reload(&self, ctx: &ReloadContext) -> anyhow::Result<()> {
        if ctx.stage() != ReloadStage::Start || ctx.is_interrupted() {
            return Ok(());
        }
        if ctx.generation() < self.index.generation() {
            tracing::debug!(
                generation = ctx.generation(),
                current = self.index.generation(),
                "Ignoring reset from a superseded cycle"
            );
            return Ok(());
        }

        let mut locations = self.locations.lock();
        self.index.reset(ctx.generation());
        self.origins.clear();
        locations.clear();
        self.resolver.invalidate();
        *self.completed_start.lock() = None;
        *self.last_freeze.lock() = None;
        Ok(())
    }

    fn accept_contributor(
        &self,
        contributor: &dyn Contributor,
        ctx: &ReloadContext,
    ) -> anyhow::Result<()> {
        if ctx.stage() != ReloadStage::Start {
            return Ok(());
        }
        let scope = RecordScope::new(self, contributor.id(), ctx);
        contributor.register_into(&scope)
    }

    fn end_reload(&self, ctx: &ReloadContext) -> anyhow::Result<()> {
        if ctx.stage() != ReloadStage::End {
            return Ok(());
        }
        self.freeze(ctx)?;
        Ok(())
    }

    /// Runs only once every contributor was offered to every reloadable.
    fn post_stage(&self, ctx: &ReloadContext) -> anyhow::Result<()> {
        if ctx.stage() == ReloadStage::Start && ctx.generation() == self.index.generation() {
            *self.completed_start.lock() = Some(ctx.generation());
        }
        Ok(())
    }

    fn main_thread_sensitive(&self, stage: ReloadStage) -> bool {
        stage == ReloadStage::Start
    }
}

/// Registration handle given to one contributor for one cycle.
pub struct RecordScope<'a> {
    registry: &'a RecordRegistry,
    contributor: &'a str,
    ctx: &'a ReloadContext,
}

impl<'a> RecordScope<'a> {
    pub fn new(registry: &'a RecordRegistry, contributor: &'a str, ctx: &'a ReloadContext) -> Self {
        Self {
            registry,
            contributor,
            ctx,
        }
    }

    pub fn contributor(&self) -> &str {
        self.contributor
    }

    pub fn stage(&self) -> ReloadStage {
        self.ctx.stage()
    }

    pub fn generation(&self) -> u64 {
        self.ctx.generation()
    }

    /// False once the cycle was interrupted or a newer cycle started.
    pub fn is_live(&self) -> bool {
        !self.ctx.is_interrupted() && self.registry.index.generation() == self.ctx.generation()
    }

    /// Cancellation point for long-running contributors.
    pub fn check(&self) -> ReloadResult<()> {
        self.ctx.check()
    }

    pub fn is_category_registered(&self, category: &CategoryId) -> bool {
        self.registry.categories.is_registered(category)
    }

    /// Register a record. `None` if the cycle is no longer live.
    pub fn add(&self, record: TransformationRecord) -> Option<RecordId> {
        let origin = RecordOrigin {
            contributor: self.contributor.to_string(),
            stage: self.ctx.stage(),
            generation: self.ctx.generation(),
        };
        let id = self.registry.insert_scoped(Arc::new(record), self.ctx, origin);
        if id.is_none() {
            tracing::trace!(
                contributor = %self.contributor,
                generation = self.ctx.generation(),
                "Discarding record from a stale cycle"
            );
        }
        id
    }

    /// Returns how many records were accepted.
    pub fn add_all(&self, records: impl IntoIterator<Item = TransformationRecord>) -> usize {
        records
            .into_iter()
            .filter_map(|record| self.add(record))
            .count()
    }

    pub fn remove(&self, record: &TransformationRecord) -> bool {
        self.is_live() && self.registry.remove(record)
    }

    /// Records registered so far in this cycle for `category`.
    pub fn by_category(&self, category: &CategoryId) -> Vec<Arc<TransformationRecord>> {
        self.registry.by_category(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipedex_core::CategoryConfig;

    struct Smelter {
        location: Option<&'static str>,
        output: &'static str,
    }

    impl Contributor for Smelter {
        fn id(&self) -> &str {
            "smelter"
        }

        fn register_into(&self, records: &RecordScope<'_>) -> anyhow::Result<()> {
            let mut builder = TransformationRecord::builder("smelt")
                .input(ContentItem::item("ore"))
                .output(ContentItem::item(self.output));
            if let Some(location) = self.location {
                builder = builder.location(location);
            }
            records.add(builder.build());
            Ok(())
        }
    }

    fn registry() -> RecordRegistry {
        let categories = Arc::new(CategoryRegistry::new());
        categories.register(CategoryConfig::new("smelt"));
        RecordRegistry::new(categories, IndexConfig::default())
    }

    fn start(registry: &RecordRegistry, generation: u64) -> ReloadContext {
        let ctx = ReloadContext::detached(generation, ReloadStage::Start);
        registry.start_reload(&ctx).unwrap();
        ctx
    }

    fn end(registry: &RecordRegistry, generation: u64) {
        registry
            .post_stage(&ReloadContext::detached(generation, ReloadStage::Start))
            .unwrap();
        registry
            .end_reload(&ReloadContext::detached(generation, ReloadStage::End))
            .unwrap();
    }

    #[test]
    fn test_origin_is_recorded() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: None, output: "ingot" }, &ctx)
            .unwrap();
        end(&registry, 1);

        let recipes = registry.recipes_for(&ContentItem::item("ingot"));
        let record = &recipes[0];
        let origin = registry.origin(record.id()).unwrap();
        assert_eq!(origin.contributor, "smelter");
        assert_eq!(origin.generation, 1);
    }

    #[test]
    fn test_location_key_later_wins() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: Some("smelt/ore"), output: "ingot" }, &ctx)
            .unwrap();
        registry
            .accept_contributor(&Smelter { location: Some("smelt/ore"), output: "nugget" }, &ctx)
            .unwrap();
        end(&registry, 1);

        assert!(registry.recipes_for(&ContentItem::item("ingot")).is_empty());
        assert_eq!(registry.recipes_for(&ContentItem::item("nugget")).len(), 1);
        assert_eq!(registry.by_category(&"smelt".into()).len(), 1);
        assert_eq!(registry.stats().origins, 1);
    }

    #[test]
    fn test_staging_queries_scan() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: None, output: "ingot" }, &ctx)
            .unwrap();

        assert!(!registry.index().is_frozen());
        assert_eq!(registry.recipes_for(&ContentItem::item("ingot")).len(), 1);
        assert_eq!(registry.usages_for(&ContentItem::item("ore")).len(), 1);
    }

    #[test]
    fn test_unregistered_category_dropped_at_freeze() {
        let registry = registry();
        let ctx = start(&registry, 1);
        let scope = RecordScope::new(&registry, "misc", &ctx);
        scope.add(
            TransformationRecord::builder("ghost")
                .input(ContentItem::item("ore"))
                .build(),
        );
        end(&registry, 1);

        let freeze = registry.last_freeze().unwrap();
        assert_eq!(
            freeze
                .dropped
                .get(&(CategoryId::from("ghost"), DropReason::UnregisteredCategory)),
            Some(&1)
        );
        assert!(registry.usages_for(&ContentItem::item("ore")).is_empty());
        assert_eq!(registry.stats().origins, 0);
    }

    #[test]
    fn test_stale_scope_discards_records() {
        let registry = registry();
        let old = start(&registry, 1);
        start(&registry, 2);

        let scope = RecordScope::new(&registry, "late", &old);
        assert!(!scope.is_live());
        assert!(scope
            .add(TransformationRecord::builder("smelt").input(ContentItem::item("ore")).build())
            .is_none());
        assert!(registry.index().is_empty());
    }

    #[test]
    fn test_superseded_reset_is_ignored() {
        let registry = registry();
        start(&registry, 5);
        start(&registry, 4);
        assert_eq!(registry.index().generation(), 5);
    }

    #[test]
    fn test_craftability_through_facade() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: None, output: "ingot" }, &ctx)
            .unwrap();
        end(&registry, 1);

        let counts = ItemCounts::from_items([&ContentItem::item("ore")]);
        assert!(registry.can_produce(&ContentItem::item("ingot"), &counts));
        let recipes = registry.recipes_for(&ContentItem::item("ingot"));
        let record = &recipes[0];
        assert!(registry.is_craftable(record, &counts));
    }

    #[test]
    fn test_second_freeze_fails() {
        let registry = registry();
        start(&registry, 1);
        end(&registry, 1);

        let err = registry
            .end_reload(&ReloadContext::detached(1, ReloadStage::End))
            .unwrap_err();
        assert!(err.to_string().contains("already frozen"));
    }

    #[test]
    fn test_incomplete_start_is_never_frozen() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: None, output: "partial" }, &ctx)
            .unwrap();

        registry
            .end_reload(&ReloadContext::detached(1, ReloadStage::End))
            .unwrap();
        assert!(!registry.index().is_frozen());
        assert!(registry.last_freeze().is_none());

        // a later cycle that completes still freezes normally
        start(&registry, 2);
        end(&registry, 2);
        assert!(registry.index().is_frozen());
    }

    #[test]
    fn test_interrupted_scope_discards_records() {
        let registry = registry();
        let interrupt = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ctx = ReloadContext::new(1, ReloadStage::Start, Arc::clone(&interrupt));
        registry.start_reload(&ctx).unwrap();

        let scope = RecordScope::new(&registry, "late", &ctx);
        interrupt.store(true, std::sync::atomic::Ordering::Release);
        assert!(scope
            .add(TransformationRecord::builder("smelt").input(ContentItem::item("ore")).build())
            .is_none());
        assert!(registry.index().is_empty());
        assert_eq!(registry.stats().origins, 0);
    }

    #[test]
    fn test_live_mutation_invalidates_craftability() {
        let registry = registry();
        let ctx = start(&registry, 1);
        registry
            .accept_contributor(&Smelter { location: None, output: "ingot" }, &ctx)
            .unwrap();
        end(&registry, 1);

        let ingot = ContentItem::item("ingot");
        let counts = ItemCounts::from_items([&ContentItem::item("ore")]);
        assert!(registry.can_produce(&ingot, &counts));

        let recipes = registry.recipes_for(&ingot);
        assert!(registry.remove(&recipes[0]));
        assert!(registry.recipes_for(&ingot).is_empty());
        assert!(!registry.can_produce(&ingot, &counts));
        assert_eq!(registry.resolver().cached_verdict(recipes[0].id()), None);

        registry.add(
            TransformationRecord::builder("smelt")
                .input(ContentItem::item("ore"))
                .output(ContentItem::item("ingot"))
                .build(),
        );
        assert!(registry.can_produce(&ingot, &counts));
    }
}
