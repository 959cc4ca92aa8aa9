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

//! Content items and their exact/fuzzy identities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Type tag of a content item ("item", "fluid", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemKind {
    fn default() -> Self {
        Self(crate::DEFAULT_ITEM_KIND.to_string())
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash over the fuzzy identity (kind + identifier) of a non-empty item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuzzyHash(pub u64);

/// Hash over the full structure of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExactHash(pub u64);

impl fmt::Display for FuzzyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn default_amount() -> u64 {
    1
}

/// An opaque content value.
///
/// `PartialEq`/`Hash` are the *exact* identity: every field participates.
/// [`ContentItem::fuzzy_eq`] and [`ContentItem::fuzzy_hash`] ignore the amount
/// and the payload, so exact equality always implies fuzzy equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_amount")]
    pub amount: u64,
    /// Transient metadata; never part of the fuzzy identity.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl ContentItem {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            amount: 1,
            data: BTreeMap::new(),
        }
    }

    /// Item of the default kind.
    pub fn item(id: impl Into<String>) -> Self {
        Self::new(ItemKind::default(), id)
    }

    /// The distinguished empty value.
    pub fn empty() -> Self {
        Self {
            kind: ItemKind::default(),
            id: String::new(),
            amount: 0,
            data: BTreeMap::new(),
        }
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Empty items have no identity or a zero amount.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() || self.amount == 0
    }

    /// Fuzzy equality. The empty value only matches another empty value.
    pub fn fuzzy_eq(&self, other: &ContentItem) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => true,
            (false, false) => self.kind == other.kind && self.id == other.id,
            _ => false,
        }
    }

    /// Fuzzy hash, or `None` for the empty value which has no fuzzy identity.
    pub fn fuzzy_hash(&self) -> Option<FuzzyHash> {
        if self.is_empty() {
            return None;
        }
        let mut hasher = XxHash64::with_seed(0);
        self.kind.hash(&mut hasher);
        self.id.hash(&mut hasher);
        Some(FuzzyHash(hasher.finish()))
    }

    pub fn exact_hash(&self) -> ExactHash {
        let mut hasher = XxHash64::with_seed(0);
        self.hash(&mut hasher);
        ExactHash(hasher.finish())
    }
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<empty>");
        }
        if self.kind.as_str() != crate::DEFAULT_ITEM_KIND {
            write!(f, "{}@", self.kind)?;
        }
        write!(f, "{}", self.id)?;
        if self.amount != 1 {
            write!(f, " x{}", self.amount)?;
        }
        Ok(())
    }
}
