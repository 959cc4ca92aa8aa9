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

//! Index error types

use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// `end_reload` was called on an index that is already frozen.
    #[error("Index generation {generation} is already frozen")]
    AlreadyFrozen { generation: u64 },

    /// A freeze was requested for a cycle that has been superseded.
    #[error("Stale generation {requested}, index is at generation {current}")]
    StaleGeneration { requested: u64, current: u64 },
}
