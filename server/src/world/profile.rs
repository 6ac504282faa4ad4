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

//! Static NPC template data the autonomous controller reads

use super::position::Position;
use super::skill::{Skill, SkillKind};
use serde::{Deserialize, Serialize};

/// Combat archetype, drives skill and flee heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiType {
    #[default]
    Fighter,
    Archer,
    Mage,
    Healer,
    Balanced,
}

impl AiType {
    /// Casters try a skill every tick instead of rolling for it
    pub fn is_caster(&self) -> bool {
        matches!(self, AiType::Mage | AiType::Healer)
    }
}

/// Power tier of an NPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NpcRank {
    #[default]
    Normal,
    Raid,
    RaidMinion,
}

impl NpcRank {
    pub fn is_raid(&self) -> bool {
        matches!(self, NpcRank::Raid | NpcRank::RaidMinion)
    }
}

/// Target eligibility family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NpcRole {
    /// Generic monster, aggressive or passive
    #[default]
    Monster,
    /// Town guard; hunts flagged players and aggressive monsters
    Guard,
    /// Belongs to a faction and fights other factions
    FactionMob,
}

/// Template data for a hostile NPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcProfile {
    pub template: String,
    pub ai_type: AiType,
    pub rank: NpcRank,
    pub role: NpcRole,
    pub aggressive: bool,
    pub aggro_range: i32,
    /// Clan used for calling help
    pub clan: Option<String>,
    pub clan_range: i32,
    /// Faction used by faction mobs to pick enemies
    pub faction: Option<String>,
    pub can_see_silent_movement: bool,
    /// Static NPCs never wander or chase
    pub can_move: bool,
    pub spawn: Position,
    pub skills: Vec<Skill>,
}

impl NpcProfile {
    pub fn new(template: impl Into<String>, spawn: Position) -> Self {
        Self {
            template: template.into(),
            ai_type: AiType::default(),
            rank: NpcRank::default(),
            role: NpcRole::default(),
            aggressive: false,
            aggro_range: 0,
            clan: None,
            clan_range: 0,
            faction: None,
            can_see_silent_movement: false,
            can_move: true,
            spawn,
            skills: Vec::new(),
        }
    }

    pub fn aggressive(mut self, aggro_range: i32) -> Self {
        self.aggressive = true;
        self.aggro_range = aggro_range;
        self
    }

    pub fn with_ai_type(mut self, ai_type: AiType) -> Self {
        self.ai_type = ai_type;
        self
    }

    pub fn with_rank(mut self, rank: NpcRank) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_role(mut self, role: NpcRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_clan(mut self, clan: impl Into<String>, range: i32) -> Self {
        self.clan = Some(clan.into());
        self.clan_range = range;
        self
    }

    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn stationary(mut self) -> Self {
        self.can_move = false;
        self
    }

    pub fn skills_of(&self, kind: SkillKind) -> impl Iterator<Item = &Skill> {
        self.skills.iter().filter(move |s| s.kind == kind)
    }

    pub fn has_skill_of(&self, kind: SkillKind) -> bool {
        self.skills.iter().any(|s| s.kind == kind)
    }
}
