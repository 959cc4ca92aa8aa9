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

//! Recipedex Index Layer
//!
//! Lookup structures for transformation records.
//!
//! ## Content Index
//!
//! [`ContentIndex`] has two modes per reload cycle:
//!
//! - **Staging**: records stream in during registration and are only appended
//!   to a list. Nothing is hashed yet.
//! - **Frozen**: at `end_reload` every staged record is walked once and the
//!   forward (by category) and reverse (by input/output fuzzy hash) maps are
//!   built. Later `add`/`remove` calls update those maps one record at a time.
//!
//! Reverse lookups hash the query item and compare fuzzy identity only inside
//! the matching bucket, so their cost does not grow with the number of records.
//!
//! ## Craftability
//!
//! [`CraftabilityResolver`] answers "can this record be performed with these
//! on-hand counts" with first-fit slot matching and memoised verdicts.

pub mod content_index;
pub mod craftable;
pub mod error;
mod reverse;

pub use content_index::{ContentIndex, DropReason, FreezeReport, IndexStats};
pub use craftable::{
    evaluate, Consumption, CraftOutcome, CraftabilityResolver, ItemCounts, OpenCatalog,
    ResolverStats,
};
pub use error::{IndexError, IndexResult};
