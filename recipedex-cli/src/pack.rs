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

//! TOML record packs loaded as contributors.
//!
//! ```toml
//! priority = 10.0
//!
//! [[categories]]
//! id = "smelt"
//! title = "Smelting"
//! workstations = [["furnace"]]
//!
//! [[records]]
//! category = "smelt"
//! location = "smelt/iron"
//! kind = { type = "processing", duration_ticks = 200 }
//! inputs = [["iron_ore", "raw_iron"]]
//! outputs = [[{ id = "iron_ingot", amount = 1 }]]
//! ```
//!
//! Every slot is a list of alternatives. An item is either a bare string
//! (`"ore"`, or `"fluid@water"` for a non-default kind) or a table.

use anyhow::Context;
use parking_lot::RwLock;
use recipedex_core::{
    Availability, CategoryConfig, ContentItem, Ingredient, ItemKind, RecordKind, ReloadStage,
    TransformationRecord,
};
use recipedex_plugins::{CategoryScope, Contributor, RecordScope};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Records registered between cancellation checks.
const CHECK_EVERY: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemSpec {
    Name(String),
    Full(ContentItem),
}

impl ItemSpec {
    pub fn into_item(self) -> ContentItem {
        match self {
            ItemSpec::Name(name) => parse_item(&name),
            ItemSpec::Full(item) => item,
        }
    }
}

/// `kind@id` or a bare id of the default kind.
pub fn parse_item(s: &str) -> ContentItem {
    match s.split_once('@') {
        Some((kind, id)) if !kind.is_empty() => ContentItem::new(ItemKind::new(kind), id),
        _ => ContentItem::item(s),
    }
}

fn slot(alternatives: Vec<ItemSpec>) -> Ingredient {
    alternatives.into_iter().map(ItemSpec::into_item).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDef {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub workstations: Vec<Vec<ItemSpec>>,
    #[serde(default)]
    pub availability: Availability,
}

impl CategoryDef {
    fn to_config(&self) -> CategoryConfig {
        let mut config = CategoryConfig::new(self.id.as_str()).with_availability(self.availability);
        if let Some(title) = &self.title {
            config = config.with_title(title.as_str());
        }
        for workstation in &self.workstations {
            config = config.with_workstation(slot(workstation.clone()));
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordDef {
    pub category: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub inputs: Vec<Vec<ItemSpec>>,
    #[serde(default)]
    pub outputs: Vec<Vec<ItemSpec>>,
}

/// Where a record came from, attached as the record's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub path: PathBuf,
    pub index: usize,
}

impl RecordDef {
    fn to_record(&self, path: &Path, index: usize) -> TransformationRecord {
        let mut builder = TransformationRecord::builder(self.category.as_str())
            .kind(self.kind.clone())
            .inputs(self.inputs.iter().cloned().map(slot))
            .outputs(self.outputs.iter().cloned().map(slot))
            .origin(PackEntry {
                path: path.to_path_buf(),
                index,
            });
        if let Some(location) = &self.location {
            builder = builder.location(location.as_str());
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub main_thread: bool,
    #[serde(default)]
    pub categories: Vec<CategoryDef>,
    #[serde(default)]
    pub records: Vec<RecordDef>,
}

impl RecordPack {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read record pack {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse record pack {}", path.display()))
    }
}

/// A record pack on disk. The file is read again at the start of every
/// `Start` stage, so edits are picked up by the next reload.
pub struct FileContributor {
    id: String,
    path: PathBuf,
    priority: f64,
    main_thread: bool,
    pack: RwLock<RecordPack>,
}

impl FileContributor {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let pack = RecordPack::load(path)?;
        let id = pack.id.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        Ok(Self {
            id,
            path: path.to_path_buf(),
            priority: pack.priority,
            main_thread: pack.main_thread,
            pack: RwLock::new(pack),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Contributor for FileContributor {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> f64 {
        self.priority
    }

    fn needs_main_thread(&self) -> bool {
        self.main_thread
    }

    fn pre_stage(&self, stage: ReloadStage) -> anyhow::Result<()> {
        if stage == ReloadStage::Start {
            let pack = RecordPack::load(&self.path)?;
            tracing::debug!(
                contributor = %self.id,
                categories = pack.categories.len(),
                records = pack.records.len(),
                "Reloaded record pack"
            );
            *self.pack.write() = pack;
        }
        Ok(())
    }

    fn register_categories(&self, categories: &CategoryScope<'_>) -> anyhow::Result<()> {
        for def in &self.pack.read().categories {
            categories.register(def.to_config());
        }
        Ok(())
    }

    fn register_into(&self, records: &RecordScope<'_>) -> anyhow::Result<()> {
        let pack = self.pack.read();
        let mut added = 0;
        for (index, def) in pack.records.iter().enumerate() {
            if index % CHECK_EVERY == 0 {
                records.check()?;
            }
            if records.add(def.to_record(&self.path, index)).is_some() {
                added += 1;
            }
        }
        tracing::debug!(contributor = %self.id, added, "Registered pack records");
        Ok(())
    }
}
