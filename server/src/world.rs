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

//! Narrow interfaces to the rest of the world
//!
//! The controllers decide; they do not render, path-find, resolve damage or
//! index space. Each of those concerns is reached through one small trait, and
//! [`AiContext`] bundles the implementations a controller runs against.
//!
//! # Collaborators
//!
//! - [`KnownObjects`]: spatial knowledge and lookup of characters and controllers
//! - [`Geodata`]: line of sight and walkability
//! - [`Scheduler`]: delayed and periodic callbacks
//! - [`Actuator`]: the combat, skill and movement engines
//! - [`ClientSink`]: fire-and-forget client broadcasts
//! - [`QuestHooks`]: optional scripting notifications

pub mod character;
pub mod position;
pub mod profile;
pub mod scheduler;
pub mod skill;

pub use character::{Character, CharacterKind, ObjectId, Status};
pub use position::Position;
pub use profile::{AiType, NpcProfile, NpcRank, NpcRole};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use skill::{Skill, SkillId, SkillKind, SkillTarget};

use crate::ai::controller::AiHandle;
use crate::config::AiConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

/// Spatial knowledge
pub trait KnownObjects: Send + Sync {
    /// Resolve a character by id, if it still exists
    fn character(&self, id: ObjectId) -> Option<Arc<dyn Character>>;

    /// Characters `actor` knows about within `radius`
    fn known_characters_in_radius(
        &self,
        actor: &dyn Character,
        radius: i32,
    ) -> Vec<Arc<dyn Character>>;

    /// Every character `actor` knows about
    fn known_characters(&self, actor: &dyn Character) -> Vec<Arc<dyn Character>> {
        self.known_characters_in_radius(actor, i32::MAX)
    }

    /// Whether `object` is inside `actor`'s knowledge radius
    fn is_known(&self, actor: &dyn Character, object: ObjectId) -> bool;

    /// Position of any object, including items and props that are not characters
    fn locate(&self, object: ObjectId) -> Option<Position> {
        self.character(object).map(|c| c.position())
    }

    /// The controller attached to a character, if any
    fn controller(&self, id: ObjectId) -> Option<AiHandle>;
}

/// Line of sight and walkability
pub trait Geodata: Send + Sync {
    fn can_see(&self, from: &dyn Character, to: &dyn Character) -> bool;
    fn can_move_to(&self, from: Position, to: Position) -> bool;
}

/// Engines that carry out what the controllers decide.
///
/// Every call is fire-and-forget; outcomes come back as events.
pub trait Actuator: Send + Sync {
    fn do_attack(&self, actor: &dyn Character, target: &dyn Character);
    fn do_cast(&self, actor: &dyn Character, skill: &Skill, target: Option<&dyn Character>);
    fn abort_attack(&self, actor: &dyn Character);
    fn abort_cast(&self, actor: &dyn Character);
    fn move_to(&self, actor: &dyn Character, destination: Position);
    fn stop_move(&self, actor: &dyn Character);
    fn pick_up(&self, actor: &dyn Character, object: ObjectId);
    fn interact(&self, actor: &dyn Character, object: ObjectId);
    fn sit(&self, actor: &dyn Character);
    fn stand(&self, actor: &dyn Character);
}

/// Client broadcasts; no return contract
#[cfg_attr(test, mockall::automock)]
pub trait ClientSink: Send + Sync {
    fn move_to_location(&self, actor: ObjectId, destination: Position);
    fn move_to_pawn(&self, actor: ObjectId, target: ObjectId, offset: i32);
    fn stop_move(&self, actor: ObjectId, position: Position);
    fn auto_attack_start(&self, actor: ObjectId);
    fn auto_attack_stop(&self, actor: ObjectId);
    fn die(&self, actor: ObjectId);
    fn action_failed(&self, actor: ObjectId);
}

/// Scripting notifications; the controllers never wait on them
pub trait QuestHooks: Send + Sync {
    fn on_aggro_range_enter(&self, _npc: ObjectId, _target: ObjectId) {}
    fn on_faction_call(&self, _npc: ObjectId, _caller: ObjectId, _attacker: ObjectId) {}
    fn on_attack_act(&self, _npc: ObjectId, _target: ObjectId) {}
}

/// Hooks that ignore everything
#[derive(Debug, Default)]
pub struct NoQuestHooks;

impl QuestHooks for NoQuestHooks {}

/// Shared source of randomness for the heuristics
pub struct Dice {
    rng: Mutex<StdRng>,
}

impl Dice {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// True with probability `p`; exact for 0 and 1
    pub fn chance(&self, p: f64) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.with(|rng| rng.random_bool(p))
        }
    }

    /// True once in `n`; never for `n == 0`
    pub fn one_in(&self, n: u32) -> bool {
        match n {
            0 => false,
            1 => true,
            _ => self.with(|rng| rng.random_range(0..n) == 0),
        }
    }

    /// Uniform integer in `[low, high]`
    pub fn between(&self, low: i32, high: i32) -> i32 {
        if low >= high {
            low
        } else {
            self.with(|rng| rng.random_range(low..=high))
        }
    }

    /// Uniform index below `len`
    pub fn index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.with(|rng| rng.random_range(0..len)))
        }
    }
}

/// Everything a controller needs from outside itself
pub struct AiContext {
    pub config: AiConfig,
    pub world: Arc<dyn KnownObjects>,
    pub geo: Arc<dyn Geodata>,
    pub scheduler: Arc<dyn Scheduler>,
    pub actuator: Arc<dyn Actuator>,
    pub client: Arc<dyn ClientSink>,
    pub quests: Arc<dyn QuestHooks>,
    pub dice: Dice,
}

impl AiContext {
    pub fn new(
        config: AiConfig,
        world: Arc<dyn KnownObjects>,
        geo: Arc<dyn Geodata>,
        scheduler: Arc<dyn Scheduler>,
        actuator: Arc<dyn Actuator>,
        client: Arc<dyn ClientSink>,
    ) -> Self {
        Self {
            config,
            world,
            geo,
            scheduler,
            actuator,
            client,
            quests: Arc::new(NoQuestHooks),
            dice: Dice::from_entropy(),
        }
    }

    pub fn with_quest_hooks(mut self, quests: Arc<dyn QuestHooks>) -> Self {
        self.quests = quests;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.dice = Dice::seeded(seed);
        self
    }
}
