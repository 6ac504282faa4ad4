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

//! Skill selection for hostile NPCs
//!
//! Checked in priority order: suicide, self heal, ally heal, debuff, then an
//! offensive skill picked by distance. Every pick is issued as a `Cast`
//! intention so the usual approach and resource checks apply.

use crate::ai::behavior::reactive;
use crate::ai::controller::ControllerCore;
use crate::ai::intention::Intention;
use crate::world::{AiType, Character, NpcProfile, ObjectId, Skill, SkillKind, SkillTarget, Status};
use std::sync::Arc;

/// Skills reaching no further than this count as short range
const SHORT_RANGE: i32 = 200;

/// Whether this tick should try a skill at all
pub fn wants_skill(core: &ControllerCore, profile: &NpcProfile) -> bool {
    if profile.skills.is_empty() {
        return false;
    }
    match profile.ai_type {
        AiType::Mage | AiType::Healer => !core.actor().has_status(Status::Muted),
        AiType::Fighter | AiType::Archer | AiType::Balanced => {
            core.ctx().dice.chance(core.config().melee_skill_chance)
        }
    }
}

fn usable(actor: &dyn Character, skill: &Skill) -> bool {
    !reactive::skill_blocked(actor, skill) && reactive::can_afford(actor, skill)
}

fn cast(core: &mut ControllerCore, skill: &Skill, target: Option<ObjectId>) {
    tracing::debug!(actor = %core.id(), skill = %skill.name, target = ?target, "Skill chosen");
    core.set_intention(Intention::Cast {
        skill: skill.clone(),
        target,
    });
}

fn in_reach(actor: &dyn Character, target: &dyn Character, range: i32) -> bool {
    let reach = range + actor.collision_radius() + target.collision_radius();
    actor.position().is_within(&target.position(), reach as f64)
}

/// Try one skill against `victim`; true when a cast was issued
pub fn try_skills(core: &mut ControllerCore, profile: &NpcProfile, victim: &Arc<dyn Character>) -> bool {
    let actor = core.actor().clone();
    let hp_ratio = actor.hp_ratio();

    if hp_ratio < core.config().suicide_hp_ratio {
        let pick = profile
            .skills_of(SkillKind::Suicide)
            .find(|s| usable(actor.as_ref(), s) && in_reach(actor.as_ref(), victim.as_ref(), s.radius.max(s.effective_range())))
            .cloned();
        if let Some(skill) = pick {
            cast(core, &skill, Some(victim.id()));
            return true;
        }
    }

    if hp_ratio < core.config().heal_hp_ratio {
        let pick = profile
            .skills_of(SkillKind::Heal)
            .find(|s| usable(actor.as_ref(), s))
            .cloned();
        if let Some(skill) = pick {
            let target = match skill.target {
                SkillTarget::One => Some(actor.id()),
                _ => None,
            };
            cast(core, &skill, target);
            return true;
        }
    }

    if heal_allies(core, profile) {
        return true;
    }

    if core.ctx().dice.chance(core.config().debuff_chance) {
        let pick = profile
            .skills_of(SkillKind::Debuff)
            .find(|s| {
                usable(actor.as_ref(), s)
                    && !victim.has_effect(s.id)
                    && in_reach(actor.as_ref(), victim.as_ref(), s.effective_range())
            })
            .cloned();
        if let Some(skill) = pick {
            cast(core, &skill, Some(victim.id()));
            return true;
        }
    }

    offensive(core, profile, victim)
}

fn heal_allies(core: &mut ControllerCore, profile: &NpcProfile) -> bool {
    let Some(clan) = profile.clan.as_deref() else {
        return false;
    };
    if !profile.has_skill_of(SkillKind::Heal) {
        return false;
    }
    let actor = core.actor().clone();
    let ctx = core.ctx().clone();
    let threshold = ctx.config.heal_hp_ratio;
    let wounded: Vec<Arc<dyn Character>> = ctx
        .world
        .known_characters_in_radius(actor.as_ref(), profile.clan_range)
        .into_iter()
        .filter(|ally| ally.id() != actor.id() && !ally.is_alike_dead() && ally.hp_ratio() < threshold)
        .filter(|ally| ally.npc().is_some_and(|p| p.clan.as_deref() == Some(clan)))
        .filter(|ally| ctx.geo.can_see(actor.as_ref(), ally.as_ref()))
        .collect();
    if wounded.is_empty() {
        return false;
    }

    for skill in profile.skills_of(SkillKind::Heal).filter(|s| usable(actor.as_ref(), s)) {
        match skill.target {
            SkillTarget::One => {
                if let Some(ally) = wounded.first() {
                    cast(core, skill, Some(ally.id()));
                    return true;
                }
            }
            SkillTarget::Party | SkillTarget::Aura => {
                if wounded.iter().any(|ally| in_reach(actor.as_ref(), ally.as_ref(), skill.radius)) {
                    cast(core, skill, None);
                    return true;
                }
            }
            SkillTarget::OneSelf | SkillTarget::Area => {}
        }
    }
    false
}

fn offensive(core: &mut ControllerCore, profile: &NpcProfile, victim: &Arc<dyn Character>) -> bool {
    let actor = core.actor().clone();
    let ctx = core.ctx().clone();
    let confused = actor.has_status(Status::Confused);
    let close = in_reach(actor.as_ref(), victim.as_ref(), actor.physical_range());

    let candidates: Vec<&Skill> = profile
        .skills
        .iter()
        .filter(|s| matches!(s.kind, SkillKind::PhysicalAttack | SkillKind::MagicAttack))
        .filter(|s| usable(actor.as_ref(), s))
        .filter(|s| (s.effective_range() <= SHORT_RANGE) == close)
        .filter(|s| !confused || !s.is_area() || ctx.dice.chance(ctx.config.confused_area_chance))
        .collect();

    let Some(index) = ctx.dice.index(candidates.len()) else {
        return false;
    };
    let skill = candidates[index].clone();
    let target = match skill.target {
        SkillTarget::Aura | SkillTarget::OneSelf => None,
        _ => Some(victim.id()),
    };
    cast(core, &skill, target);
    true
}

/// Cast a missing self buff while idle; true when a cast was issued
pub fn cast_self_buff(core: &mut ControllerCore, profile: &NpcProfile) -> bool {
    let actor = core.actor().clone();
    let pick = profile
        .skills_of(SkillKind::Buff)
        .find(|s| usable(actor.as_ref(), s) && !actor.has_effect(s.id))
        .cloned();
    match pick {
        Some(skill) => {
            let target = match skill.target {
                SkillTarget::One => Some(actor.id()),
                _ => None,
            };
            cast(core, &skill, target);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::sandbox::{ActorSpec, Sandbox};
    use crate::world::Position;

    #[test]
    fn test_casters_skip_skills_when_muted() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let shaman = sandbox.spawn(ActorSpec::npc(
            "Shaman",
            NpcProfile::new("shaman", Position::new(0, 0, 0))
                .with_ai_type(AiType::Mage)
                .with_skill(Skill::new(1, "Bolt", SkillKind::MagicAttack, SkillTarget::One)),
        ));
        let handle = sandbox.controller(shaman).unwrap();
        let wants = |h: &crate::ai::controller::AiHandle| {
            h.with_controller(|c| {
                let profile = c.core().actor().npc().unwrap();
                wants_skill(c.core(), &profile)
            })
        };

        assert!(wants(&handle));
        sandbox.set_status(shaman, Status::Muted, true);
        assert!(!wants(&handle));
    }

    #[test]
    fn test_fighters_roll_for_skills() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let brute = sandbox.spawn(ActorSpec::npc(
            "Brute",
            NpcProfile::new("brute", Position::new(0, 0, 0))
                .with_skill(Skill::new(2, "Smash", SkillKind::PhysicalAttack, SkillTarget::One)),
        ));
        let handle = sandbox.controller(brute).unwrap();
        let wants = handle.with_controller(|c| {
            let profile = c.core().actor().npc().unwrap();
            wants_skill(c.core(), &profile)
        });
        assert!(!wants);
    }

    #[test]
    fn test_long_range_skill_picked_at_distance() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let smash = Skill::new(2, "Smash", SkillKind::PhysicalAttack, SkillTarget::One).with_cast_range(40);
        let bolt = Skill::new(3, "Bolt", SkillKind::MagicAttack, SkillTarget::One).with_cast_range(600);
        let shaman = sandbox.spawn(ActorSpec::npc(
            "Shaman",
            NpcProfile::new("shaman", Position::new(0, 0, 0))
                .with_ai_type(AiType::Mage)
                .with_skill(smash)
                .with_skill(bolt.clone()),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(400, 0, 0)));
        let victim = sandbox.character(player).unwrap();
        let handle = sandbox.controller(shaman).unwrap();

        let issued = handle.with_controller(|c| {
            let core = c.core_mut();
            let profile = core.actor().npc().unwrap();
            try_skills(core, &profile, &victim)
        });
        assert!(issued);
        // The queued cast is drained by the next stimulus
        handle.notify_event(crate::ai::intention::Event::UserCommand);
        assert_eq!(handle.skill().map(|s| s.id), Some(bolt.id));
    }

    /// Run one skill pick for `npc` against `player`; the chosen skill id
    fn pick(sandbox: &Sandbox, npc: ObjectId, player: ObjectId) -> Option<u32> {
        let victim = sandbox.character(player).unwrap();
        let handle = sandbox.controller(npc).unwrap();
        let issued = handle.with_controller(|c| {
            let core = c.core_mut();
            let profile = core.actor().npc().unwrap();
            try_skills(core, &profile, &victim)
        });
        if !issued {
            return None;
        }
        handle.notify_event(crate::ai::intention::Event::UserCommand);
        handle.skill().map(|s| s.id)
    }

    fn zealot(sandbox: &Sandbox) -> (ObjectId, ObjectId) {
        let zealot = sandbox.spawn(ActorSpec::npc(
            "Zealot",
            NpcProfile::new("zealot", Position::new(0, 0, 0))
                .with_ai_type(AiType::Mage)
                .with_skill(Skill::new(7, "Mend", SkillKind::Heal, SkillTarget::One))
                .with_skill(Skill::new(8, "Martyrdom", SkillKind::Suicide, SkillTarget::Aura).with_radius(150)),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        (zealot, player)
    }

    #[test]
    fn test_dying_npc_prefers_suicide_over_healing() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let (zealot, player) = zealot(&sandbox);
        sandbox.set_hp(zealot, 100.0);

        assert_eq!(pick(&sandbox, zealot, player), Some(8));
    }

    #[test]
    fn test_wounded_npc_heals_itself() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let (zealot, player) = zealot(&sandbox);
        sandbox.set_hp(zealot, 300.0);

        assert_eq!(pick(&sandbox, zealot, player), Some(7));
    }

    #[test]
    fn test_healer_tends_wounded_clan_member() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let healer = sandbox.spawn(ActorSpec::npc(
            "Healer",
            NpcProfile::new("orc", Position::new(0, 0, 0))
                .with_ai_type(AiType::Healer)
                .with_clan("orcs", 800)
                .with_skill(Skill::new(7, "Mend", SkillKind::Heal, SkillTarget::One)),
        ));
        let brute = sandbox.spawn(ActorSpec::npc(
            "Brute",
            NpcProfile::new("orc", Position::new(100, 0, 0)).with_clan("orcs", 800),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));

        // Nobody hurt and no attack skills: nothing to cast
        assert_eq!(pick(&sandbox, healer, player), None);

        sandbox.set_hp(brute, 200.0);
        assert_eq!(pick(&sandbox, healer, player), Some(7));
    }

    #[test]
    fn test_debuff_precedes_attack_skills() {
        let hexer = |sandbox: &Sandbox| {
            sandbox.spawn(ActorSpec::npc(
                "Hexer",
                NpcProfile::new("hexer", Position::new(0, 0, 0))
                    .with_ai_type(AiType::Mage)
                    .with_skill(Skill::new(2, "Smash", SkillKind::PhysicalAttack, SkillTarget::One).with_cast_range(40))
                    .with_skill(Skill::new(9, "Weaken", SkillKind::Debuff, SkillTarget::One)),
            ))
        };

        let sandbox = Sandbox::builder()
            .config(AiConfig {
                debuff_chance: 1.0,
                ..AiConfig::deterministic()
            })
            .build();
        let npc = hexer(&sandbox);
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        assert_eq!(pick(&sandbox, npc, player), Some(9));

        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let npc = hexer(&sandbox);
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        assert_eq!(pick(&sandbox, npc, player), Some(2));
    }
}
