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

//! Transformation records.
//!
//! A record maps an ordered list of input slots to an ordered list of output
//! slots within a category. Records are immutable once built and are shared
//! as `Arc<TransformationRecord>` between the index, the resolver and callers.

use crate::category::CategoryId;
use crate::ingredient::Ingredient;
use crate::item::ContentItem;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identity of a record instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key identifying the same logical record across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    /// Grid recipe.
    Crafting {
        width: u8,
        height: u8,
        #[serde(default)]
        shapeless: bool,
    },
    /// Machine recipe that takes time.
    Processing {
        #[serde(default)]
        duration_ticks: u32,
    },
    /// Informational mapping with no particular shape.
    Info,
}

impl Default for RecordKind {
    fn default() -> Self {
        RecordKind::Info
    }
}

impl RecordKind {
    /// Key under which external serializers handle this shape.
    pub fn serializer_id(&self) -> &'static str {
        match self {
            RecordKind::Crafting { .. } => "recipedex:crafting",
            RecordKind::Processing { .. } => "recipedex:processing",
            RecordKind::Info => "recipedex:info",
        }
    }
}

/// Opaque back-reference to whatever the contributor built the record from.
pub type RecordSource = Arc<dyn Any + Send + Sync>;

/// An input→output mapping.
#[derive(Clone)]
pub struct TransformationRecord {
    id: RecordId,
    category: CategoryId,
    kind: RecordKind,
    inputs: Vec<Ingredient>,
    outputs: Vec<Ingredient>,
    location: Option<LocationKey>,
    origin: Option<RecordSource>,
}

impl TransformationRecord {
    pub fn builder(category: impl Into<CategoryId>) -> RecordBuilder {
        RecordBuilder::new(category.into())
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn category(&self) -> &CategoryId {
        &self.category
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    /// The required entries, in declaration order.
    pub fn inputs(&self) -> &[Ingredient] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Ingredient] {
        &self.outputs
    }

    pub fn location(&self) -> Option<&LocationKey> {
        self.location.as_ref()
    }

    /// Diagnostics only; never consulted for matching.
    pub fn origin(&self) -> Option<&RecordSource> {
        self.origin.as_ref()
    }

    /// Downcasts the origin to the contributor's own type.
    pub fn origin_as<T: Any>(&self) -> Option<&T> {
        self.origin.as_ref().and_then(|o| o.downcast_ref::<T>())
    }

    /// A record needs at least one non-trivial input slot. An empty requirement
    /// list marks an incomplete record, not a free one.
    pub fn is_valid(&self) -> bool {
        self.inputs.iter().any(|slot| !slot.is_trivial())
    }

    /// Non-empty input items across all slots.
    pub fn input_items(&self) -> impl Iterator<Item = &ContentItem> + '_ {
        self.inputs.iter().flat_map(|slot| slot.non_empty())
    }

    /// Non-empty output items across all slots.
    pub fn output_items(&self) -> impl Iterator<Item = &ContentItem> + '_ {
        self.outputs.iter().flat_map(|slot| slot.non_empty())
    }

    pub fn consumes(&self, item: &ContentItem) -> bool {
        self.inputs.iter().any(|slot| slot.matches(item))
    }

    pub fn produces(&self, item: &ContentItem) -> bool {
        self.outputs.iter().any(|slot| slot.matches(item))
    }
}

impl fmt::Debug for TransformationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformationRecord")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("location", &self.location)
            .field("has_origin", &self.origin.is_some())
            .finish()
    }
}

/// Builder for [`TransformationRecord`].
pub struct RecordBuilder {
    category: CategoryId,
    kind: RecordKind,
    inputs: Vec<Ingredient>,
    outputs: Vec<Ingredient>,
    location: Option<LocationKey>,
    origin: Option<RecordSource>,
}

impl RecordBuilder {
    fn new(category: CategoryId) -> Self {
        Self {
            category,
            kind: RecordKind::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            location: None,
            origin: None,
        }
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn input(mut self, slot: impl Into<Ingredient>) -> Self {
        self.inputs.push(slot.into());
        self
    }

    pub fn inputs(mut self, slots: impl IntoIterator<Item = Ingredient>) -> Self {
        self.inputs.extend(slots);
        self
    }

    pub fn output(mut self, slot: impl Into<Ingredient>) -> Self {
        self.outputs.push(slot.into());
        self
    }

    pub fn outputs(mut self, slots: impl IntoIterator<Item = Ingredient>) -> Self {
        self.outputs.extend(slots);
        self
    }

    pub fn location(mut self, key: impl Into<String>) -> Self {
        self.location = Some(LocationKey::new(key));
        self
    }

    pub fn origin<T: Any + Send + Sync>(mut self, origin: T) -> Self {
        self.origin = Some(Arc::new(origin));
        self
    }

    pub fn build(self) -> TransformationRecord {
        TransformationRecord {
            id: RecordId::new(),
            category: self.category,
            kind: self.kind,
            inputs: self.inputs,
            outputs: self.outputs,
            location: self.location,
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smelt(input: &str, output: &str) -> TransformationRecord {
        TransformationRecord::builder("smelt")
            .kind(RecordKind::Processing { duration_ticks: 200 })
            .input(ContentItem::item(input))
            .output(ContentItem::item(output))
            .build()
    }

    #[test]
    fn test_validity_requires_non_trivial_input() {
        assert!(smelt("ore", "ingot").is_valid());

        let empty_inputs = TransformationRecord::builder("smelt")
            .input(Ingredient::empty())
            .output(ContentItem::item("slag"))
            .build();
        assert!(!empty_inputs.is_valid());

        let no_inputs = TransformationRecord::builder("smelt")
            .output(ContentItem::item("slag"))
            .build();
        assert!(!no_inputs.is_valid());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(smelt("ore", "ingot").id(), smelt("ore", "ingot").id());
    }

    #[test]
    fn test_consumes_and_produces() {
        let record = smelt("ore", "ingot");
        assert!(record.consumes(&ContentItem::item("ore").with_amount(5)));
        assert!(!record.consumes(&ContentItem::item("ingot")));
        assert!(record.produces(&ContentItem::item("ingot")));
    }

    #[test]
    fn test_origin_downcast() {
        #[derive(Debug, PartialEq)]
        struct RawRecipe(&'static str);

        let record = TransformationRecord::builder("smelt")
            .input(ContentItem::item("ore"))
            .origin(RawRecipe("furnace.json"))
            .build();

        assert_eq!(record.origin_as::<RawRecipe>(), Some(&RawRecipe("furnace.json")));
        assert!(record.origin_as::<String>().is_none());
    }

    #[test]
    fn test_serializer_ids() {
        let crafting = RecordKind::Crafting {
            width: 3,
            height: 3,
            shapeless: false,
        };
        assert_eq!(crafting.serializer_id(), "recipedex:crafting");
        assert_eq!(RecordKind::Info.serializer_id(), "recipedex:info");
    }
}
