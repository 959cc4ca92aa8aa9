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

//! Ingredient slots.

use crate::item::ContentItem;
use serde::{Deserialize, Serialize};

/// An ordered list of alternatives, any one of which satisfies the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ingredient(Vec<ContentItem>);

impl Ingredient {
    pub fn new(alternatives: Vec<ContentItem>) -> Self {
        Self(alternatives)
    }

    /// Slot satisfied by exactly one item.
    pub fn of(item: ContentItem) -> Self {
        Self(vec![item])
    }

    /// Slot with no alternatives.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// All alternatives in declaration order, including empty values.
    pub fn alternatives(&self) -> &[ContentItem] {
        &self.0
    }

    /// Non-empty alternatives in declaration order.
    pub fn non_empty(&self) -> impl Iterator<Item = &ContentItem> + '_ {
        self.0.iter().filter(|item| !item.is_empty())
    }

    /// A slot with no non-empty alternative is satisfied without consuming anything.
    pub fn is_trivial(&self) -> bool {
        self.non_empty().next().is_none()
    }

    /// Whether any alternative is fuzzy-equal to `item`.
    pub fn matches(&self, item: &ContentItem) -> bool {
        !item.is_empty() && self.non_empty().any(|alt| alt.fuzzy_eq(item))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ContentItem> for Ingredient {
    fn from(item: ContentItem) -> Self {
        Self::of(item)
    }
}

impl From<Vec<ContentItem>> for Ingredient {
    fn from(alternatives: Vec<ContentItem>) -> Self {
        Self::new(alternatives)
    }
}

impl FromIterator<ContentItem> for Ingredient {
    fn from_iter<I: IntoIterator<Item = ContentItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_slots() {
        assert!(Ingredient::empty().is_trivial());
        assert!(Ingredient::of(ContentItem::empty()).is_trivial());
        assert!(!Ingredient::of(ContentItem::item("ore")).is_trivial());
    }

    #[test]
    fn test_non_empty_skips_empty_values() {
        let slot = Ingredient::new(vec![
            ContentItem::empty(),
            ContentItem::item("coal"),
            ContentItem::item("charcoal"),
        ]);

        let ids: Vec<_> = slot.non_empty().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["coal", "charcoal"]);
        assert_eq!(slot.len(), 3);
    }

    #[test]
    fn test_matches_is_fuzzy() {
        let slot = Ingredient::of(ContentItem::item("plank").with_data("wood", "oak"));

        assert!(slot.matches(&ContentItem::item("plank").with_amount(4)));
        assert!(!slot.matches(&ContentItem::item("stick")));
        assert!(!slot.matches(&ContentItem::empty()));
    }
}
