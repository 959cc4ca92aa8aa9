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

//! Reload cycle state machine.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadState {
    #[default]
    Idle,
    Pre,
    Registering,
    Ending,
    /// Absorbing for the cycle that entered it; only a new cycle leaves it.
    Interrupted,
}

impl ReloadState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ReloadState::Pre | ReloadState::Registering | ReloadState::Ending
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReloadState::Idle => "idle",
            ReloadState::Pre => "pre",
            ReloadState::Registering => "registering",
            ReloadState::Ending => "ending",
            ReloadState::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadEvent {
    Begin,
    Register,
    End,
    Finish,
    Interrupt,
}

#[derive(Debug, Error)]
#[error("Invalid reload transition: {current:?} -> {event:?}")]
pub struct InvalidTransition {
    pub current: ReloadState,
    pub event: ReloadEvent,
}

impl ReloadState {
    pub fn transition(self, event: ReloadEvent) -> Result<ReloadState, InvalidTransition> {
        use ReloadEvent::*;
        use ReloadState::*;

        let next = match (self, event) {
            (Idle, Begin) | (Interrupted, Begin) => Pre,
            (Pre, Register) => Registering,
            (Registering, End) => Ending,
            (Ending, Finish) => Idle,
            (s, Interrupt) if s.is_running() => Interrupted,
            (Interrupted, Interrupt) => Interrupted,
            _ => {
                return Err(InvalidTransition {
                    current: self,
                    event,
                })
            }
        };

        Ok(next)
    }
}
