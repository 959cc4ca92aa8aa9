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

//! Record categories.

use crate::ingredient::Ingredient;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier grouping records of the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Where current stock for craftability checks comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Stock is the caller's on-hand item counts.
    #[default]
    Inventory,
    /// No contributor can report stock for this category.
    Unavailable,
}

/// Category configuration supplied by contributors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub id: CategoryId,
    #[serde(default)]
    pub title: String,
    /// Blocks/machines that perform records of this category.
    #[serde(default)]
    pub workstations: Vec<Ingredient>,
    #[serde(default)]
    pub availability: Availability,
}

impl CategoryConfig {
    pub fn new(id: impl Into<CategoryId>) -> Self {
        let id = id.into();
        Self {
            title: id.to_string(),
            id,
            workstations: Vec::new(),
            availability: Availability::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_workstation(mut self, workstation: impl Into<Ingredient>) -> Self {
        self.workstations.push(workstation.into());
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }
}

/// Read side of whatever holds the registered categories.
pub trait CategoryCatalog: Send + Sync {
    /// Whether the category is currently registered.
    fn is_registered(&self, id: &CategoryId) -> bool;

    /// Availability source of the category, `None` if it is not registered.
    fn availability(&self, id: &CategoryId) -> Option<Availability>;
}
