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

//! [`Character`] view over a sandbox entity

use super::components::{Conditions, Effects, Placement, Prowess, Reputation, Vitals};
use crate::world::{
    Character, CharacterKind, NpcProfile, ObjectId, Position, Scheduler, Skill, SkillId, Status,
};
use flagset::FlagSet;
use std::sync::{Arc, RwLock};

/// Handle to one actor in the sandbox world.
///
/// Immutable facts are cached on the handle. Everything else is read from the
/// ECS on each call, so a despawned actor reads as empty and reports
/// [`Character::is_spawned`] false.
pub struct SandboxActor {
    id: ObjectId,
    entity: hecs::Entity,
    name: String,
    kind: CharacterKind,
    profile: Option<Arc<NpcProfile>>,
    owner: Option<ObjectId>,
    leader: Option<ObjectId>,
    faction: Option<String>,
    collision_radius: i32,
    physical_range: i32,
    entities: Arc<RwLock<hecs::World>>,
    clock: Arc<dyn Scheduler>,
}

/// Construction data for a [`SandboxActor`]
pub(crate) struct ActorFacts {
    pub id: ObjectId,
    pub name: String,
    pub kind: CharacterKind,
    pub profile: Option<Arc<NpcProfile>>,
    pub owner: Option<ObjectId>,
    pub leader: Option<ObjectId>,
    pub faction: Option<String>,
    pub collision_radius: i32,
    pub physical_range: i32,
}

impl SandboxActor {
    pub(crate) fn new(
        facts: ActorFacts,
        entity: hecs::Entity,
        entities: Arc<RwLock<hecs::World>>,
        clock: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            id: facts.id,
            entity,
            name: facts.name,
            kind: facts.kind,
            profile: facts.profile,
            owner: facts.owner,
            leader: facts.leader,
            faction: facts.faction,
            collision_radius: facts.collision_radius,
            physical_range: facts.physical_range,
            entities,
            clock,
        }
    }

    pub fn entity(&self) -> hecs::Entity {
        self.entity
    }

    fn read<C: hecs::Component, R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let world = self.entities.read().unwrap_or_else(|e| e.into_inner());
        world.get::<&C>(self.entity).ok().map(|c| f(&c))
    }

    fn write<C: hecs::Component, R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let world = self.entities.write().unwrap_or_else(|e| e.into_inner());
        world.get::<&mut C>(self.entity).ok().map(|mut c| f(&mut c))
    }

    pub fn is_moving(&self) -> bool {
        let now = self.clock.now();
        self.read(|p: &Placement| p.is_moving(now)).unwrap_or(false)
    }

    pub fn power(&self) -> f64 {
        self.read(|p: &Prowess| p.power).unwrap_or(0.0)
    }
}

impl Character for SandboxActor {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> CharacterKind {
        self.kind
    }

    fn npc(&self) -> Option<Arc<NpcProfile>> {
        self.profile.clone()
    }

    fn owner(&self) -> Option<ObjectId> {
        self.owner
    }

    fn leader(&self) -> Option<ObjectId> {
        self.leader
    }

    fn acting_player(&self) -> Option<ObjectId> {
        match self.kind {
            CharacterKind::Player => Some(self.id),
            CharacterKind::Summon => self.owner,
            CharacterKind::Npc | CharacterKind::Door => None,
        }
    }

    fn position(&self) -> Position {
        let now = self.clock.now();
        self.read(|p: &Placement| p.position(now)).unwrap_or_default()
    }

    fn heading(&self) -> u16 {
        self.read(|p: &Placement| p.heading).unwrap_or(0)
    }

    fn collision_radius(&self) -> i32 {
        self.collision_radius
    }

    fn physical_range(&self) -> i32 {
        self.physical_range
    }

    fn hp(&self) -> f64 {
        self.read(|v: &Vitals| v.hp).unwrap_or(0.0)
    }

    fn max_hp(&self) -> f64 {
        self.read(|v: &Vitals| v.max_hp).unwrap_or(0.0)
    }

    fn mp(&self) -> f64 {
        self.read(|v: &Vitals| v.mp).unwrap_or(0.0)
    }

    fn status(&self) -> FlagSet<Status> {
        self.read(|c: &Conditions| c.0).unwrap_or_default()
    }

    fn set_running(&self, running: bool) {
        self.write(|c: &mut Conditions| {
            if running {
                c.0 |= Status::Running;
            } else {
                c.0 -= Status::Running;
            }
        });
    }

    fn karma(&self) -> i32 {
        self.read(|r: &Reputation| r.karma).unwrap_or(0)
    }

    fn faction(&self) -> Option<String> {
        self.faction.clone()
    }

    fn is_skill_disabled(&self, skill: &Skill) -> bool {
        self.read(|e: &Effects| e.disabled.contains(&skill.id))
            .unwrap_or(true)
    }

    fn has_effect(&self, skill_id: SkillId) -> bool {
        self.read(|e: &Effects| e.active.contains(&skill_id))
            .unwrap_or(false)
    }

    /// NPCs hunt player-controlled characters and are hunted by them; players
    /// only fight each other when the victim is an outlaw
    fn is_auto_attackable_by(&self, attacker: &dyn Character) -> bool {
        if self.is_alike_dead() || self.has_status(Status::Invulnerable) || self.is_door() {
            return false;
        }
        match (self.acting_player(), attacker.acting_player()) {
            (Some(mine), Some(theirs)) => mine != theirs && self.karma() > 0,
            (Some(_), None) | (None, Some(_)) => true,
            (None, None) => false,
        }
    }

    fn is_spawned(&self) -> bool {
        let world = self.entities.read().unwrap_or_else(|e| e.into_inner());
        world.contains(self.entity)
    }
}
