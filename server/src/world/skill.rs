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

//! Skill descriptors consumed by the controllers
//!
//! The skill engine owns the effects; the controllers only need enough of a
//! description to decide which skill to try and whether it can be tried now.

use serde::{Deserialize, Serialize};

pub type SkillId = u32;

/// What a skill does, from the point of view of target selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillKind {
    PhysicalAttack,
    MagicAttack,
    Heal,
    Buff,
    Debuff,
    /// Sacrifices the caster; only considered at low health
    Suicide,
    Other,
}

/// Who a skill lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillTarget {
    /// The caster
    OneSelf,
    /// A single selected target
    One,
    /// The caster's party or faction around it
    Party,
    /// Everything around the caster
    Aura,
    /// Everything around the selected target
    Area,
}

/// A castable skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub level: u32,
    pub name: String,
    pub kind: SkillKind,
    pub target: SkillTarget,
    /// Maximum distance from caster to target, `-1` for self-centred skills
    pub cast_range: i32,
    /// Radius of area skills
    pub radius: i32,
    pub mp_cost: f64,
    pub hp_cost: f64,
    pub hit_time_ms: u64,
    pub magic: bool,
}

impl Skill {
    pub fn new(id: SkillId, name: impl Into<String>, kind: SkillKind, target: SkillTarget) -> Self {
        let magic = matches!(
            kind,
            SkillKind::MagicAttack | SkillKind::Heal | SkillKind::Buff | SkillKind::Debuff
        );
        Self {
            id,
            level: 1,
            name: name.into(),
            kind,
            target,
            cast_range: if target == SkillTarget::OneSelf { -1 } else { 600 },
            radius: 0,
            mp_cost: 0.0,
            hp_cost: 0.0,
            hit_time_ms: 1000,
            magic,
        }
    }

    pub fn with_cast_range(mut self, range: i32) -> Self {
        self.cast_range = range;
        self
    }

    pub fn with_radius(mut self, radius: i32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_mp_cost(mut self, cost: f64) -> Self {
        self.mp_cost = cost;
        self
    }

    pub fn with_hp_cost(mut self, cost: f64) -> Self {
        self.hp_cost = cost;
        self
    }

    pub fn with_hit_time(mut self, hit_time_ms: u64) -> Self {
        self.hit_time_ms = hit_time_ms;
        self
    }

    pub fn is_magic(&self) -> bool {
        self.magic
    }

    pub fn is_offensive(&self) -> bool {
        matches!(
            self.kind,
            SkillKind::PhysicalAttack | SkillKind::MagicAttack | SkillKind::Debuff | SkillKind::Suicide
        )
    }

    pub fn is_area(&self) -> bool {
        matches!(self.target, SkillTarget::Aura | SkillTarget::Area | SkillTarget::Party)
    }

    /// Distance the caster must close to before casting on a target
    pub fn effective_range(&self) -> i32 {
        match self.target {
            SkillTarget::Aura | SkillTarget::Party => self.radius,
            SkillTarget::OneSelf => 0,
            _ => self.cast_range.max(0),
        }
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}:{})", self.name, self.id, self.level)
    }
}
