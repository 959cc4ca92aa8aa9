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

//! Category configurations registered by contributors.

use crate::contributor::Contributor;
use crate::reloadable::{ReloadContext, Reloadable};
use dashmap::DashMap;
use parking_lot::RwLock;
use recipedex_core::{Availability, CategoryCatalog, CategoryConfig, CategoryId, ReloadStage};

/// Registered categories for the current cycle.
///
/// Cleared when a `Start` stage begins and filled by
/// [`Contributor::register_categories`]. Later registrations of the same
/// identifier replace earlier ones.
#[derive(Default)]
pub struct CategoryRegistry {
    categories: DashMap<CategoryId, CategoryConfig>,
    /// Generation of the cycle currently filling the table. Scoped
    /// registrations hold the read side, resets the write side.
    generation: RwLock<u64>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced configuration, if any.
    pub fn register(&self, config: CategoryConfig) -> Option<CategoryConfig> {
        let previous = self.categories.insert(config.id.clone(), config);
        if let Some(previous) = &previous {
            tracing::debug!(category = %previous.id, "Category configuration replaced");
        }
        previous
    }

    /// Register on behalf of a cycle; false once the cycle is stale.
    fn register_scoped(&self, config: CategoryConfig, ctx: &ReloadContext) -> bool {
        let generation = self.generation.read();
        if ctx.is_interrupted() || *generation != ctx.generation() {
            return false;
        }
        self.register(config);
        true
    }

    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    pub fn get(&self, id: &CategoryId) -> Option<CategoryConfig> {
        self.categories.get(id).map(|entry| entry.value().clone())
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<CategoryId> {
        let mut ids: Vec<_> = self.categories.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn clear(&self) {
        self.categories.clear();
    }
}

impl CategoryCatalog for CategoryRegistry {
    fn is_registered(&self, id: &CategoryId) -> bool {
        self.categories.contains_key(id)
    }

    fn availability(&self, id: &CategoryId) -> Option<Availability> {
        self.categories.get(id).map(|entry| entry.availability)
    }
}

impl Reloadable for CategoryRegistry {
    fn name(&self) -> &str {
        "categories"
    }

    fn start_reload(&self, ctx: &ReloadContext) -> anyhow::Result<()> {
        if ctx.stage() != ReloadStage::Start || ctx.is_interrupted() {
            return Ok(());
        }
        let mut generation = self.generation.write();
        if ctx.generation() < *generation {
            tracing::debug!(
                generation = ctx.generation(),
                current = *generation,
                "Ignoring category reset from a superseded cycle"
            );
            return Ok(());
        }
        *generation = ctx.generation();
        self.clear();
        Ok(())
    }

    fn accept_contributor(
        &self,
        contributor: &dyn Contributor,
        ctx: &ReloadContext,
    ) -> anyhow::Result<()> {
        if ctx.stage() != ReloadStage::Start || ctx.is_interrupted() {
            return Ok(());
        }
        contributor.register_categories(&CategoryScope::new(self, contributor.id(), ctx))
    }

    fn end_reload(&self, ctx: &ReloadContext) -> anyhow::Result<()> {
        if ctx.stage() == ReloadStage::End {
            tracing::debug!(categories = self.len(), "Categories settled");
        }
        Ok(())
    }
}

/// Category registration handle given to one contributor for one cycle.
pub struct CategoryScope<'a> {
    registry: &'a CategoryRegistry,
    contributor: &'a str,
    ctx: &'a ReloadContext,
}

impl<'a> CategoryScope<'a> {
    pub fn new(registry: &'a CategoryRegistry, contributor: &'a str, ctx: &'a ReloadContext) -> Self {
        Self {
            registry,
            contributor,
            ctx,
        }
    }

    pub fn contributor(&self) -> &str {
        self.contributor
    }

    pub fn generation(&self) -> u64 {
        self.ctx.generation()
    }

    pub fn is_live(&self) -> bool {
        !self.ctx.is_interrupted() && self.registry.generation() == self.ctx.generation()
    }

    /// False, and nothing registered, once the cycle is no longer live.
    pub fn register(&self, config: CategoryConfig) -> bool {
        let id = config.id.clone();
        let accepted = self.registry.register_scoped(config, self.ctx);
        if !accepted {
            tracing::trace!(
                contributor = %self.contributor,
                category = %id,
                generation = self.ctx.generation(),
                "Discarding category from a stale cycle"
            );
        }
        accepted
    }

    pub fn is_registered(&self, id: &CategoryId) -> bool {
        self.registry.is_registered(id)
    }
}
