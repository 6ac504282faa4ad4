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

//! Components stored on sandbox actors
//!
//! Data that never changes after spawn (name, kind, template) is also cached
//! on the [`SandboxActor`](super::actor::SandboxActor) handle; everything the
//! engine mutates lives only here.

use crate::world::{CharacterKind, NpcProfile, ObjectId, Position, SkillId, Status};
use flagset::FlagSet;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Who an entity is
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: ObjectId,
    pub name: String,
    pub kind: CharacterKind,
}

/// NPC template
#[derive(Debug, Clone)]
pub struct Template(pub Arc<NpcProfile>);

/// Where an entity stands, or the straight line it is walking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub origin: Position,
    pub destination: Option<Position>,
    /// Scheduler time the current leg started
    pub departed: Duration,
    /// Units per second along the current leg
    pub speed: f64,
    pub heading: u16,
}

impl Placement {
    pub fn at(position: Position, heading: u16) -> Self {
        Self {
            origin: position,
            destination: None,
            departed: Duration::ZERO,
            speed: 0.0,
            heading,
        }
    }

    /// Interpolated position at `now`
    pub fn position(&self, now: Duration) -> Position {
        let Some(destination) = self.destination else {
            return self.origin;
        };
        let total = self.origin.distance_2d(&destination);
        let travelled = now.saturating_sub(self.departed).as_secs_f64() * self.speed;
        if travelled >= total {
            destination
        } else {
            self.origin.toward(&destination, total - travelled)
        }
    }

    pub fn is_moving(&self, now: Duration) -> bool {
        self.destination.is_some_and(|d| self.position(now) != d)
    }

    /// Freeze wherever the entity is at `now`
    pub fn settle(&mut self, now: Duration) {
        self.origin = self.position(now);
        self.destination = None;
        self.speed = 0.0;
    }

    /// Start a new leg; returns the travel time
    pub fn depart(&mut self, now: Duration, destination: Position, speed: f64) -> Duration {
        self.settle(now);
        let distance = self.origin.distance_2d(&destination);
        if distance > 0.0 {
            self.heading = self.origin.heading_to(&destination);
        }
        self.destination = Some(destination);
        self.departed = now;
        self.speed = speed.max(1.0);
        Duration::from_secs_f64(distance / self.speed)
    }

    /// Jump to `position`, abandoning any leg
    pub fn place(&mut self, position: Position) {
        self.origin = position;
        self.destination = None;
        self.speed = 0.0;
    }
}

/// Health and mana pools
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub hp: f64,
    pub max_hp: f64,
    pub mp: f64,
    pub max_mp: f64,
}

impl Vitals {
    pub fn new(max_hp: f64, max_mp: f64) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            mp: max_mp,
            max_mp,
        }
    }

    /// Apply damage; true when it was lethal
    pub fn damage(&mut self, amount: f64) -> bool {
        let was_alive = self.hp > 0.0;
        self.hp = (self.hp - amount.max(0.0)).max(0.0);
        was_alive && self.hp <= 0.0
    }

    pub fn heal(&mut self, amount: f64) {
        self.hp = (self.hp + amount.max(0.0)).min(self.max_hp);
    }

    /// Pay for a skill; false when the pools cannot cover it
    pub fn spend(&mut self, mp: f64, hp: f64) -> bool {
        if self.mp < mp || self.hp <= hp {
            return false;
        }
        self.mp -= mp;
        self.hp -= hp;
        true
    }
}

/// Runtime status flags
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conditions(pub FlagSet<Status>);

/// Combat and locomotion numbers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prowess {
    /// Damage of one swing
    pub power: f64,
    /// Time from swing to hit
    pub attack_speed: Duration,
    pub walk_speed: f64,
    pub run_speed: f64,
}

/// Outlaw rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reputation {
    pub karma: i32,
}

/// Skill effects on the entity and skills it may not use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    pub active: HashSet<SkillId>,
    pub disabled: HashSet<SkillId>,
}
