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

//! Target eligibility and re-targeting for hostile NPCs

use crate::ai::controller::ControllerCore;
use crate::ai::intention::{Event, Intention};
use crate::world::{Character, NpcProfile, NpcRole, ObjectId, Status};
use std::sync::Arc;

/// Whether this NPC would start a fight with `target` unprovoked
pub fn auto_attack_condition(
    core: &ControllerCore,
    profile: &NpcProfile,
    target: &dyn Character,
) -> bool {
    let actor = core.actor();
    let ctx = core.ctx();

    if target.id() == actor.id()
        || target.is_door()
        || target.is_alike_dead()
        || !target.is_visible()
    {
        return false;
    }
    if is_gm_hidden(core, target) {
        return false;
    }
    if !actor
        .position()
        .is_within(&target.position(), profile.aggro_range as f64)
    {
        return false;
    }

    let controlled = target.acting_player().is_some();
    if controlled
        && target.has_status(Status::SilentMoving)
        && !profile.rank.is_raid()
        && !profile.can_see_silent_movement
    {
        return false;
    }
    if let (Some(mine), Some(theirs)) = (profile.faction.as_deref(), target.faction()) {
        if mine == theirs {
            return false;
        }
    }

    let visible = || ctx.geo.can_see(actor.as_ref(), target);
    match profile.role {
        NpcRole::Guard => {
            if controlled {
                acting_karma(core, target) > 0 && visible()
            } else {
                target
                    .npc()
                    .is_some_and(|other| other.aggressive && other.role == NpcRole::Monster)
                    && visible()
            }
        }
        NpcRole::FactionMob => match target.npc() {
            Some(other) => {
                other.faction.is_some() && profile.faction.is_some() && other.faction != profile.faction && visible()
            }
            None => {
                profile.aggressive
                    && !target.has_status(Status::InPeaceZone)
                    && target.is_auto_attackable_by(actor.as_ref())
                    && visible()
            }
        },
        NpcRole::Monster => {
            controlled
                && profile.aggressive
                && !target.has_status(Status::InPeaceZone)
                && target.is_auto_attackable_by(actor.as_ref())
                && visible()
        }
    }
}

fn is_gm_hidden(core: &ControllerCore, target: &dyn Character) -> bool {
    if target.has_status(Status::GmInvisible) {
        return true;
    }
    target
        .acting_player()
        .filter(|player| *player != target.id())
        .and_then(|player| core.resolve(player))
        .is_some_and(|player| player.has_status(Status::GmInvisible))
}

fn acting_karma(core: &ControllerCore, target: &dyn Character) -> i32 {
    match target.acting_player() {
        Some(player) if player == target.id() => target.karma(),
        Some(player) => core.resolve(player).map_or(0, |p| p.karma()),
        None => 0,
    }
}

/// Pick a replacement target after the current one was lost.
///
/// Ledger entries are preferred and receive the previous top hate (never less
/// than the configured floor). Non-guards fall back to scanning their
/// surroundings. Returns the new target, already registered in the ledger.
pub fn target_reconsider(
    core: &mut ControllerCore,
    profile: &NpcProfile,
    range: i32,
    range_check: bool,
) -> Option<ObjectId> {
    let ledger = core.ledger()?.clone();
    let actor = core.actor().clone();
    let ctx = core.ctx().clone();

    let previous = core.most_hated();
    let transfer = previous
        .map(|id| core.hating(id))
        .unwrap_or(0)
        .max(ctx.config.reconsider_hate_floor);

    for id in ledger.hateful_targets(&ctx, actor.as_ref()) {
        if id == actor.id() {
            continue;
        }
        let Some(candidate) = core.resolve_live(id) else {
            continue;
        };
        if !ctx.geo.can_see(actor.as_ref(), candidate.as_ref()) {
            continue;
        }
        if range_check
            && !actor
                .position()
                .is_within(&candidate.position(), range as f64)
        {
            continue;
        }
        core.add_damage_hate(candidate.as_ref(), 0, transfer);
        return Some(id);
    }

    if profile.role == NpcRole::Guard {
        return None;
    }
    let nearby = if range_check {
        ctx.world.known_characters_in_radius(actor.as_ref(), range)
    } else {
        ctx.world.known_characters(actor.as_ref())
    };
    for candidate in nearby {
        if !auto_attack_condition(core, profile, candidate.as_ref()) {
            continue;
        }
        core.add_damage_hate(candidate.as_ref(), 0, 1);
        return Some(candidate.id());
    }
    None
}

/// Chaos re-targeting: a random hateful or eligible target other than the
/// current one, carrying over the current top hate
pub fn aggro_reconsider(core: &mut ControllerCore, profile: &NpcProfile) -> Option<ObjectId> {
    let ledger = core.ledger()?.clone();
    let actor = core.actor().clone();
    let ctx = core.ctx().clone();
    let current = core.attack_target();

    let transfer = current
        .or_else(|| core.most_hated())
        .map(|id| core.hating(id))
        .unwrap_or(0)
        .max(ctx.config.reconsider_hate_floor);

    let mut candidates: Vec<Arc<dyn Character>> = ledger
        .hateful_targets(&ctx, actor.as_ref())
        .into_iter()
        .filter(|id| Some(*id) != current && *id != actor.id())
        .filter_map(|id| core.resolve_live(id))
        .collect();
    for nearby in ctx
        .world
        .known_characters_in_radius(actor.as_ref(), profile.aggro_range)
    {
        if Some(nearby.id()) == current || candidates.iter().any(|c| c.id() == nearby.id()) {
            continue;
        }
        if auto_attack_condition(core, profile, nearby.as_ref()) {
            candidates.push(nearby);
        }
    }

    let pick = candidates.get(ctx.dice.index(candidates.len())?)?.clone();
    core.add_damage_hate(pick.as_ref(), 0, transfer);
    tracing::debug!(actor = %actor.id(), target = %pick.id(), "Chaos re-target");
    Some(pick.id())
}

/// Ask idle clan members that can see the fight for help
pub fn call_clan(core: &ControllerCore, profile: &NpcProfile, victim: &dyn Character) {
    let Some(clan) = profile.clan.as_deref() else {
        return;
    };
    let actor = core.actor();
    let ctx = core.ctx();
    for ally in ctx
        .world
        .known_characters_in_radius(actor.as_ref(), profile.clan_range)
    {
        if ally.id() == actor.id() || ally.is_alike_dead() {
            continue;
        }
        let Some(ally_profile) = ally.npc() else {
            continue;
        };
        if ally_profile.clan.as_deref() != Some(clan) {
            continue;
        }
        if !ctx.geo.can_see(ally.as_ref(), victim) {
            continue;
        }
        core.notify_other_if(
            ally.id(),
            Event::Aggression {
                attacker: victim.id(),
                amount: 1,
            },
            |intention| matches!(intention, Intention::Idle | Intention::Active),
        );
        ctx.quests.on_faction_call(ally.id(), actor.id(), victim.id());
    }
}
