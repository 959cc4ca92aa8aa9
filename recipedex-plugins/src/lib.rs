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

//! Recipedex Plugins
//!
//! Contributors supply categories and records; reloadables are the
//! subsystems those contributions land in. The [`ReloadOrchestrator`] replays
//! every contributor against every reloadable whenever content reloads.
//!
//! ## Ordering
//!
//! Contributors run by descending priority. Within one priority the most
//! recently registered contributor runs first, which lets a later plugin
//! override an earlier one.
//!
//! ## Threading
//!
//! Reloads run on one dedicated worker (`reload.background = true`) or on the
//! caller. Work that must happen on the host's main thread is queued on the
//! [`MainThreadExecutor`] and drained by [`HostEvent::Tick`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use recipedex_core::RecipedexConfig;
//! use recipedex_plugins::{HostEvent, RecipeSession};
//!
//! let session = RecipeSession::new(RecipedexConfig::default());
//! session.register_contributor(Arc::new(MyPack))?;
//! session.handle(HostEvent::ConnectionEstablished)?;
//! session.run_until_idle(Duration::from_secs(30));
//! ```

pub mod category_registry;
pub mod contributor;
pub mod error;
pub mod main_thread;
pub mod orchestrator;
pub mod registry;
pub mod reloadable;
pub mod session;
pub mod state;

pub use category_registry::{CategoryRegistry, CategoryScope};
pub use contributor::{Contributor, ContributorRegistry};
pub use error::{ReloadError, ReloadResult};
pub use main_thread::MainThreadExecutor;
pub use orchestrator::{HookFailure, ReloadOrchestrator, ReloadReport};
pub use registry::{RecordOrigin, RecordRegistry, RecordScope, RegistryStats};
pub use reloadable::{Phase, ReloadContext, Reloadable};
pub use session::{HostEvent, RecipeSession};
pub use state::{InvalidTransition, ReloadEvent, ReloadState};
