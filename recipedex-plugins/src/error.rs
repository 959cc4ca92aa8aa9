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

//! Reload error types

use crate::state::InvalidTransition;
use recipedex_core::CoreError;
use recipedex_index::IndexError;
use thiserror::Error;

/// Result type for reload operations
pub type ReloadResult<T> = Result<T, ReloadError>;

/// Errors surfaced by the orchestrator and the registries.
///
/// Contributor and reloadable failures never escape a cycle; they are logged
/// and collected in the cycle's report instead.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The running cycle was asked to stop. Not a defect.
    #[error("Reload interrupted")]
    Interrupted,

    #[error("Contributor already registered: {0}")]
    DuplicateContributor(String),

    #[error("Main thread hand-off failed: {0}")]
    HandOff(String),

    #[error("Failed to spawn reload worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ReloadError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReloadError::Interrupted)
    }
}
