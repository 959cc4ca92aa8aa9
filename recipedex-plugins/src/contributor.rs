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

//! Content contributors and their invocation order.

use crate::category_registry::CategoryScope;
use crate::error::{ReloadError, ReloadResult};
use crate::registry::RecordScope;
use parking_lot::RwLock;
use recipedex_core::ReloadStage;
use std::sync::Arc;

/// An independently versioned module that supplies content.
///
/// Every callback may fail or panic; the orchestrator isolates each call so
/// one misbehaving contributor cannot stop the rest of a reload.
pub trait Contributor: Send + Sync {
    /// Stable identifier used in logs and reports.
    fn id(&self) -> &str;

    /// Higher priorities run first.
    fn priority(&self) -> f64 {
        0.0
    }

    /// Registration must run on the host's main thread.
    fn needs_main_thread(&self) -> bool {
        false
    }

    fn pre_stage(&self, _stage: ReloadStage) -> anyhow::Result<()> {
        Ok(())
    }

    fn register_categories(&self, _categories: &CategoryScope<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn register_into(&self, _records: &RecordScope<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn post_stage(&self, _stage: ReloadStage) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Registered contributors in registration order.
#[derive(Default)]
pub struct ContributorRegistry {
    entries: RwLock<Vec<Arc<dyn Contributor>>>,
}

impl ContributorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a contributor. Identifiers must be unique.
    pub fn register(&self, contributor: Arc<dyn Contributor>) -> ReloadResult<()> {
        let mut entries = self.entries.write();
        if entries.iter().any(|c| c.id() == contributor.id()) {
            return Err(ReloadError::DuplicateContributor(contributor.id().to_string()));
        }
        tracing::debug!(
            contributor = %contributor.id(),
            priority = contributor.priority(),
            "Registered contributor"
        );
        entries.push(contributor);
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|c| c.id() != id);
        entries.len() != before
    }

    /// Invocation order: stable sort by ascending priority, then the whole
    /// list reversed. Priorities descend and, within one priority, later
    /// registrations run before earlier ones.
    pub fn ordered(&self) -> Vec<Arc<dyn Contributor>> {
        let mut ordered = self.entries.read().clone();
        ordered.sort_by(|a, b| a.priority().total_cmp(&b.priority()));
        ordered.reverse();
        ordered
    }

    pub fn ids(&self) -> Vec<String> {
        self.ordered().iter().map(|c| c.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, f64);

    impl Contributor for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn priority(&self) -> f64 {
            self.1
        }
    }

    fn registry(entries: &[(&'static str, f64)]) -> ContributorRegistry {
        let registry = ContributorRegistry::new();
        for (id, priority) in entries {
            registry.register(Arc::new(Named(*id, *priority))).unwrap();
        }
        registry
    }

    #[test]
    fn test_same_priority_later_registration_first() {
        let registry = registry(&[("p1", 10.0), ("p2", 10.0), ("p3", 5.0)]);
        assert_eq!(registry.ids(), vec!["p2", "p1", "p3"]);
    }

    #[test]
    fn test_descending_priority() {
        let registry = registry(&[("low", -1.0), ("high", 100.0), ("mid", 0.5)]);
        assert_eq!(registry.ids(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let registry = registry(&[("a", 0.0)]);
        let err = registry.register(Arc::new(Named("a", 1.0))).unwrap_err();
        assert!(matches!(err, ReloadError::DuplicateContributor(id) if id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = registry(&[("a", 0.0), ("b", 0.0)]);
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.ids(), vec!["b"]);
    }
}
