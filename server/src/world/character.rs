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

//! The character contract the controllers drive
//!
//! A `Character` is whatever the world uses to represent a living actor. The
//! controllers only read it and toggle its gait; everything else goes through
//! the collaborator traits in [`crate::world`].

use super::position::Position;
use super::profile::NpcProfile;
use super::skill::{Skill, SkillId};
use flagset::{FlagSet, flags};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable identifier of any world object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub uuid::Uuid);

impl ObjectId {
    /// Create a new random identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

flags! {
    /// Runtime conditions of a character
    pub enum Status: u32 {
        Dead,
        FakeDead,
        Invisible,
        GmInvisible,
        Invulnerable,
        Teleporting,
        Stunned,
        Paralyzed,
        Sleeping,
        Rooted,
        Confused,
        Afraid,
        Muted,
        PhysicalMuted,
        Resting,
        Running,
        SilentMoving,
        InPeaceZone,
        Casting,
        Attacking,
    }
}

/// Broad family of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterKind {
    Player,
    Summon,
    Npc,
    Door,
}

/// A living actor as seen by the controllers
pub trait Character: Send + Sync {
    fn id(&self) -> ObjectId;
    fn name(&self) -> String;
    fn kind(&self) -> CharacterKind;

    /// Template data, present for NPCs only
    fn npc(&self) -> Option<Arc<NpcProfile>>;

    /// Owner of a summon
    fn owner(&self) -> Option<ObjectId>;

    /// Leader of a minion
    fn leader(&self) -> Option<ObjectId>;

    /// The player ultimately controlling this character: itself for players,
    /// the owner for summons, nothing for NPCs
    fn acting_player(&self) -> Option<ObjectId>;

    fn position(&self) -> Position;
    fn heading(&self) -> u16;
    fn collision_radius(&self) -> i32;

    /// Reach of the equipped weapon
    fn physical_range(&self) -> i32;

    fn hp(&self) -> f64;
    fn max_hp(&self) -> f64;
    fn mp(&self) -> f64;

    fn status(&self) -> FlagSet<Status>;

    /// Switch between running and walking gait
    fn set_running(&self, running: bool);

    /// Outlaw rating; guards hunt characters above zero
    fn karma(&self) -> i32;

    fn faction(&self) -> Option<String>;

    fn is_skill_disabled(&self, skill: &Skill) -> bool;

    /// True when an effect from `skill_id` is already on this character
    fn has_effect(&self, skill_id: SkillId) -> bool;

    /// Whether `attacker` may hit this character without an explicit command
    fn is_auto_attackable_by(&self, attacker: &dyn Character) -> bool;

    fn has_status(&self, status: Status) -> bool {
        self.status().contains(status)
    }

    fn is_dead(&self) -> bool {
        self.has_status(Status::Dead)
    }

    fn is_alike_dead(&self) -> bool {
        let status = self.status();
        status.contains(Status::Dead) || status.contains(Status::FakeDead)
    }

    fn is_visible(&self) -> bool {
        !self.has_status(Status::Invisible)
    }

    /// Present in the world; despawned characters receive no events
    fn is_spawned(&self) -> bool {
        true
    }

    fn is_teleporting(&self) -> bool {
        self.has_status(Status::Teleporting)
    }

    fn is_movement_disabled(&self) -> bool {
        let status = self.status();
        [
            Status::Dead,
            Status::FakeDead,
            Status::Stunned,
            Status::Paralyzed,
            Status::Sleeping,
            Status::Rooted,
            Status::Teleporting,
        ]
        .into_iter()
        .any(|s| status.contains(s))
    }

    fn is_attacking_disabled(&self) -> bool {
        let status = self.status();
        [
            Status::Dead,
            Status::FakeDead,
            Status::Stunned,
            Status::Paralyzed,
            Status::Sleeping,
            Status::Afraid,
        ]
        .into_iter()
        .any(|s| status.contains(s))
    }

    fn is_casting_now(&self) -> bool {
        self.has_status(Status::Casting)
    }

    fn is_attacking_now(&self) -> bool {
        self.has_status(Status::Attacking)
    }

    fn hp_ratio(&self) -> f64 {
        let max = self.max_hp();
        if max <= 0.0 { 0.0 } else { self.hp() / max }
    }

    fn is_player(&self) -> bool {
        self.kind() == CharacterKind::Player
    }

    fn is_summon(&self) -> bool {
        self.kind() == CharacterKind::Summon
    }

    fn is_door(&self) -> bool {
        self.kind() == CharacterKind::Door
    }

    fn is_npc(&self) -> bool {
        self.kind() == CharacterKind::Npc
    }
}

impl std::fmt::Debug for dyn Character {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Character")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
