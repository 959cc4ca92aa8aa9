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

//! Reload stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reload is split into stages; a full reload runs every stage in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStage {
    /// Content is discarded and re-registered.
    Start,
    /// Late adjustments, then the index is frozen.
    End,
}

impl ReloadStage {
    pub const ALL: [ReloadStage; 2] = [ReloadStage::Start, ReloadStage::End];

    /// Stages covered by a request; `None` means a full reload.
    pub fn plan(requested: Option<ReloadStage>) -> Vec<ReloadStage> {
        match requested {
            Some(stage) => vec![stage],
            None => Self::ALL.to_vec(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReloadStage::Start => "start",
            ReloadStage::End => "end",
        }
    }
}

impl fmt::Display for ReloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan() {
        assert_eq!(ReloadStage::plan(None), vec![ReloadStage::Start, ReloadStage::End]);
        assert_eq!(ReloadStage::plan(Some(ReloadStage::End)), vec![ReloadStage::End]);
    }
}
