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

//! Recipedex Core
//!
//! Data model shared by the content index, the craftability resolver and the
//! reload orchestrator:
//!
//! - **ContentItem**: opaque, hashable content value with exact and fuzzy identity
//! - **Ingredient**: ordered list of interchangeable alternatives for one slot
//! - **TransformationRecord**: category + input slots + output slots
//! - **Category**: identifier plus externally supplied configuration
//! - **ReloadStage**: the stages a content reload is split into
//!
//! The core never interprets item payloads. Two items are *exactly* equal when
//! they are structurally identical and *fuzzy* equal when they share kind and
//! identifier, which is the equality used for lookups and craftability.

pub mod category;
pub mod config;
pub mod error;
pub mod ingredient;
pub mod item;
pub mod record;
pub mod stage;

pub use category::{Availability, CategoryCatalog, CategoryConfig, CategoryId};
pub use config::{IndexConfig, RecipedexConfig, ReloadConfig};
pub use error::{CoreError, CoreResult};
pub use ingredient::Ingredient;
pub use item::{ContentItem, ExactHash, FuzzyHash, ItemKind};
pub use record::{LocationKey, RecordBuilder, RecordId, RecordKind, TransformationRecord};
pub use stage::ReloadStage;

/// Identifier used for items when no kind is given.
pub const DEFAULT_ITEM_KIND: &str = "item";
