//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Archetype behaviors
//!
//! A [`Behavior`] supplies the per-intention and per-event hooks of one
//! controller archetype. Hooks that an archetype does not override fall back to
//! the [`reactive`] baseline, and overrides delegate to it explicitly for the
//! cases they do not change.

pub mod autonomous;
pub mod player;
pub mod reactive;
pub mod summon;

pub use autonomous::AutonomousBehavior;
pub use player::PlayerBehavior;
pub use summon::SummonBehavior;

use crate::ai::controller::ControllerCore;
use crate::ai::error::AiResult;
use crate::ai::intention::{Event, Intention};
use crate::world::{Character, CharacterKind};

/// Controller archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    /// Baseline; reacts to stimuli and never schedules itself
    Reactive,
    /// Hostile NPC with a think loop and a hostility ledger
    Autonomous,
    /// Player character with a one-slot intention buffer
    PlayerDirected,
    /// Owner-following summon
    Summon,
}

/// Hooks for one controller archetype
pub trait Behavior: Send {
    fn kind(&self) -> BehaviorKind;

    fn on_intention(&mut self, core: &mut ControllerCore, intention: &Intention) -> AiResult<()> {
        reactive::on_intention(core, intention)
    }

    fn on_event(&mut self, core: &mut ControllerCore, event: &Event) -> AiResult<()> {
        reactive::on_event(core, event)
    }

    /// Periodic avoid tick; only summons use it
    fn on_avoid(&mut self, _core: &mut ControllerCore) -> AiResult<()> {
        Ok(())
    }

    /// Store an intention to resume once the current one completes
    fn set_next_intention(&mut self, _intention: Intention) {}

    fn next_intention(&self) -> Option<&Intention> {
        None
    }

    /// Toggle owner following
    fn set_follow_status(&mut self, _core: &mut ControllerCore, _follow: bool) -> AiResult<()> {
        Ok(())
    }

    /// The controller is being detached
    fn on_detach(&mut self, _core: &mut ControllerCore) {}
}

/// Baseline behavior for characters without a richer archetype
#[derive(Debug, Default)]
pub struct ReactiveBehavior;

impl Behavior for ReactiveBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Reactive
    }
}

/// Pick the behavior for a character
pub fn for_character(actor: &dyn Character) -> Box<dyn Behavior> {
    match actor.kind() {
        CharacterKind::Player => Box::new(PlayerBehavior::new()),
        CharacterKind::Summon => Box::new(SummonBehavior::new()),
        CharacterKind::Npc if actor.npc().is_some() => Box::new(AutonomousBehavior::new()),
        CharacterKind::Npc | CharacterKind::Door => Box::new(ReactiveBehavior),
    }
}
