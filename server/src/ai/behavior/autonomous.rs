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

//! Hostile NPC archetype
//!
//! Autonomous NPCs own a think task that runs while they are anything but
//! idle. Each tick either patrols (`Active`: decay the aggro bias, scan for
//! targets, wander, follow a leader or walk home) or fights (`Attack`: keep the
//! target fresh, call the clan, pick skills, reposition and swing).
//!
//! Targets come from the actor's [`HostilityLedger`](crate::ai::ledger::HostilityLedger).

pub mod skills;
pub mod targeting;

use crate::ai::behavior::{Behavior, BehaviorKind, reactive};
use crate::ai::controller::ControllerCore;
use crate::ai::error::AiResult;
use crate::ai::intention::{Event, Intention, IntentionKind};
use crate::world::{AiType, Character, NpcProfile, NpcRank, NpcRole, ObjectId, Position, Status};
use std::sync::Arc;
use std::time::Duration;

/// Targets closer than this, plus both collision radii, count as melee range
const MELEE_DISTANCE: f64 = 60.0;

/// Guards further than this from their post walk back
const GUARD_POST_TOLERANCE: f64 = 50.0;

/// Half a turn in heading units
const HALF_TURN: u16 = 32768;

/// Behavior of a hostile NPC
#[derive(Debug, Default)]
pub struct AutonomousBehavior {
    /// Engagement deadline, on the scheduler's clock
    attack_deadline: Duration,
    /// Fight ticks since the last chaos re-target
    chaos: u32,
    returning_home: bool,
    /// Walk home once the pending `Active` is committed
    leash_pending: bool,
}

impl AutonomousBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_think_task(core: &mut ControllerCore) {
        if !core.has_think_task() {
            core.start_think_task();
        }
    }

    fn renew_deadline(&mut self, core: &ControllerCore) {
        self.attack_deadline = core.ctx().scheduler.now() + core.config().attack_timeout();
    }

    // ---------------------------------------------------------------------
    // Intentions
    // ---------------------------------------------------------------------

    fn on_idle(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        if Self::should_stay_active(core) {
            return self.on_active(core);
        }
        reactive::on_idle(core)?;
        core.stop_think_task();
        self.chaos = 0;
        Ok(())
    }

    /// Players nearby or far from home: idling is not allowed
    fn should_stay_active(core: &ControllerCore) -> bool {
        let actor = core.actor();
        if actor.is_alike_dead() {
            return false;
        }
        let players_nearby = core
            .ctx()
            .world
            .known_characters(actor.as_ref())
            .iter()
            .any(|c| c.is_player());
        let drifted = actor.npc().is_some_and(|profile| {
            let limit = 2.0 * core.config().max_drift_range as f64;
            actor.position().distance_2d(&profile.spawn) > limit
        });
        players_nearby || drifted
    }

    fn on_active(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        if *core.intention() != Intention::Active {
            reactive::enter_active(core);
        }
        Self::ensure_think_task(core);
        if std::mem::take(&mut self.leash_pending) {
            if let Some(profile) = core.actor().npc() {
                self.return_home(core, &profile);
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    fn think(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let actor = core.actor().clone();
        if actor.is_alike_dead()
            || actor.has_status(Status::Stunned)
            || actor.has_status(Status::Paralyzed)
            || actor.has_status(Status::Sleeping)
        {
            return Ok(());
        }
        if !core.begin_thinking() {
            return Ok(());
        }
        let result = match core.intention().kind() {
            IntentionKind::Active => self.think_active(core),
            IntentionKind::Attack => self.think_attack(core),
            IntentionKind::Cast => self.think_cast(core),
            _ => Ok(()),
        };
        core.end_thinking();
        result
    }

    fn on_attacked(&mut self, core: &mut ControllerCore, attacker: ObjectId) -> AiResult<()> {
        self.renew_deadline(core);
        if let Some(ledger) = core.ledger() {
            if ledger.global_aggro() < 0 {
                ledger.set_global_aggro(0);
            }
        }
        let Some(source) = core.resolve(attacker) else {
            return reactive::on_attacked(core, attacker);
        };
        let actor = core.actor().clone();

        core.add_damage_hate(source.as_ref(), 0, 1);
        actor.set_running(true);
        let retarget = match core.intention() {
            Intention::Attack(_) => core.most_hated().is_some_and(|top| Some(top) != core.attack_target()),
            _ => true,
        };
        if retarget {
            let target = core.most_hated().unwrap_or(attacker);
            core.set_intention(Intention::Attack(target));
        }
        Self::rally_group(core, attacker);
        reactive::on_attacked(core, attacker)
    }

    /// Minions defend their leader and the leader defends its minions
    fn rally_group(core: &ControllerCore, attacker: ObjectId) {
        let actor = core.actor();
        let assist = Event::Aggression { attacker, amount: 1 };
        if let Some(leader) = actor.leader() {
            core.notify_other(leader, assist.clone());
        }
        for minion in core.ctx().world.known_characters(actor.as_ref()) {
            if minion.leader() == Some(actor.id()) && !minion.is_alike_dead() {
                core.notify_other_if(minion.id(), assist.clone(), |intention| {
                    !matches!(intention, Intention::Attack(_))
                });
            }
        }
    }

    fn on_aggression(&mut self, core: &mut ControllerCore, attacker: ObjectId, amount: i64) -> AiResult<()> {
        let Some(source) = core.resolve(attacker) else {
            return Ok(());
        };
        if source.is_alike_dead() || attacker == core.id() {
            return Ok(());
        }
        core.add_damage_hate(source.as_ref(), 0, amount);
        if core.intention().kind() != IntentionKind::Attack {
            self.renew_deadline(core);
            core.actor().set_running(true);
            core.set_intention(Intention::Attack(attacker));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Patrol
    // ---------------------------------------------------------------------

    fn think_active(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let actor = core.actor().clone();
        let Some(profile) = actor.npc() else {
            return Ok(());
        };
        let Some(ledger) = core.ledger().cloned() else {
            return Ok(());
        };
        let ctx = core.ctx().clone();

        let bias = ledger.decay_global_aggro();
        let walking_home = self.returning_home && core.is_moving();
        if bias >= 0 && !walking_home {
            for candidate in ctx
                .world
                .known_characters_in_radius(actor.as_ref(), profile.aggro_range)
            {
                if !targeting::auto_attack_condition(core, &profile, candidate.as_ref()) {
                    continue;
                }
                if core.hating(candidate.id()) == 0 {
                    if candidate.acting_player().is_some() {
                        ctx.quests.on_aggro_range_enter(actor.id(), candidate.id());
                    }
                    core.add_damage_hate(candidate.as_ref(), 0, 1);
                }
            }

            let hated = if actor.has_status(Status::Confused) {
                core.attack_target()
            } else {
                core.most_hated()
            };
            if let Some(hated) = hated {
                if core.hating(hated) + bias as i64 > 0 {
                    tracing::debug!(actor = %actor.id(), target = %hated, "Target acquired");
                    self.renew_deadline(core);
                    actor.set_running(true);
                    core.set_intention(Intention::Attack(hated));
                    return Ok(());
                }
            }
        }

        self.idle_movement(core, &profile);
        Ok(())
    }

    fn idle_movement(&mut self, core: &mut ControllerCore, profile: &Arc<NpcProfile>) {
        let actor = core.actor().clone();
        let ctx = core.ctx().clone();

        if profile.role == NpcRole::Guard {
            if actor.position().distance_2d(&profile.spawn) > GUARD_POST_TOLERANCE && !core.is_moving() {
                self.return_home(core, profile);
            }
            return;
        }

        if let Some(leader) = actor.leader().and_then(|id| core.resolve(id)) {
            if !leader.is_alike_dead() {
                self.follow_leader(core, profile, leader.as_ref());
                return;
            }
        }

        if !profile.can_move || actor.is_movement_disabled() {
            return;
        }
        if self.returning_home && core.is_moving() {
            return;
        }
        let drift = ctx.config.max_drift_range;
        if actor.position().distance_2d(&profile.spawn) > drift as f64 {
            self.return_home(core, profile);
            return;
        }

        if !ctx.dice.one_in(ctx.config.random_walk_rate) {
            return;
        }
        if skills::cast_self_buff(core, profile) {
            return;
        }
        let candidate = profile
            .spawn
            .offset(ctx.dice.between(-drift, drift), ctx.dice.between(-drift, drift));
        let spread = profile.spawn.distance_2d(&candidate);
        let destination = if spread > drift as f64 {
            profile.spawn.toward(&candidate, spread - drift as f64)
        } else {
            candidate
        };
        if ctx.geo.can_move_to(actor.position(), destination) {
            actor.set_running(false);
            core.move_to(destination);
        }
    }

    fn follow_leader(&mut self, core: &mut ControllerCore, profile: &NpcProfile, leader: &dyn Character) {
        let actor = core.actor().clone();
        let ctx = core.ctx().clone();
        let mut offset = ctx.config.minion_follow_offset;
        if profile.rank == NpcRank::RaidMinion {
            offset = offset * 5 / 2;
        }

        if actor.position().is_within(&leader.position(), offset as f64) {
            if ctx.dice.one_in(ctx.config.random_walk_rate) {
                skills::cast_self_buff(core, profile);
            }
            return;
        }
        if actor.is_movement_disabled() {
            return;
        }
        actor.set_running(leader.has_status(Status::Running));
        let jitter = ctx.dice.between(-8192, 8192);
        let behind = leader.heading().wrapping_add(HALF_TURN).wrapping_add(jitter as u16);
        let destination = leader.position().project(behind, (offset / 2) as f64);
        if ctx.geo.can_move_to(actor.position(), destination) {
            core.move_to(destination);
        }
    }

    fn return_home(&mut self, core: &mut ControllerCore, profile: &NpcProfile) {
        if let Some(ledger) = core.ledger() {
            ledger.clear();
        }
        core.actor().set_running(false);
        self.returning_home = core.move_to(profile.spawn);
        tracing::debug!(actor = %core.id(), home = ?profile.spawn, "Returning home");
    }

    // ---------------------------------------------------------------------
    // Fighting
    // ---------------------------------------------------------------------

    fn think_attack(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let actor = core.actor().clone();
        let Some(profile) = actor.npc() else {
            return Ok(());
        };
        if actor.is_casting_now() {
            return Ok(());
        }
        let ctx = core.ctx().clone();

        let current = core.attack_target().or_else(|| core.intention().target());
        let victim = current.and_then(|id| core.resolve_live(id));
        let timed_out = victim.as_ref().is_some_and(|v| {
            ctx.scheduler.now() > self.attack_deadline
                && (!profile.aggressive
                    || actor.position().distance_2d(&v.position()) > 2.0 * profile.aggro_range as f64)
        });
        let victim = match victim {
            Some(victim) if !timed_out => victim,
            _ => return self.lose_target(core, &profile, current),
        };

        if actor.leader().is_none()
            && profile.can_move
            && actor.position().distance_2d(&profile.spawn) > ctx.config.leash_range as f64
        {
            tracing::debug!(actor = %actor.id(), "Leashed");
            core.set_attack_target(None);
            self.leash_pending = true;
            core.set_intention(Intention::Active);
            return Ok(());
        }

        if !actor.has_status(Status::Confused) {
            if let Some(top) = core.most_hated() {
                if top != victim.id() {
                    self.renew_deadline(core);
                    core.set_intention(Intention::Attack(top));
                    return Ok(());
                }
            }
        }

        targeting::call_clan(core, &profile, victim.as_ref());

        if profile.rank.is_raid() && self.roll_chaos(core, &profile) {
            return Ok(());
        }

        if skills::wants_skill(core, &profile) && skills::try_skills(core, &profile, &victim) {
            return Ok(());
        }

        if actor.is_movement_disabled() {
            return self.melee_in_place(core, &profile, victim);
        }

        let combined = (actor.collision_radius() + victim.collision_radius()) as f64;
        if self.reposition(core, victim.as_ref(), combined) {
            return Ok(());
        }

        let distance = actor.position().distance_2d(&victim.position());
        if distance <= MELEE_DISTANCE + combined {
            let flee = match profile.ai_type {
                AiType::Archer => ctx.dice.chance(ctx.config.archer_flee_chance),
                AiType::Mage | AiType::Healer => true,
                AiType::Fighter | AiType::Balanced => false,
            };
            if flee && Self::flee(core, victim.as_ref()) {
                return Ok(());
            }
        }

        Self::melee(core, victim.as_ref());
        Ok(())
    }

    /// The target is gone or the engagement timed out
    fn lose_target(&mut self, core: &mut ControllerCore, profile: &NpcProfile, lost: Option<ObjectId>) -> AiResult<()> {
        if let (Some(id), Some(ledger)) = (lost, core.ledger()) {
            ledger.stop_hating(id);
        }
        if let Some(next) = targeting::target_reconsider(core, profile, profile.aggro_range, true) {
            self.renew_deadline(core);
            core.set_intention(Intention::Attack(next));
            return Ok(());
        }
        tracing::debug!(actor = %core.id(), "Target lost, back to patrol");
        core.set_attack_target(None);
        core.actor().set_running(false);
        core.set_intention(Intention::Active);
        Ok(())
    }

    fn roll_chaos(&mut self, core: &mut ControllerCore, profile: &NpcProfile) -> bool {
        self.chaos += 1;
        if self.chaos <= core.config().chaos_threshold {
            return false;
        }
        let actor = core.actor().clone();
        let has_minions = core
            .ctx()
            .world
            .known_characters(actor.as_ref())
            .iter()
            .any(|c| c.leader() == Some(actor.id()) && !c.is_alike_dead());
        let weight = if profile.rank == NpcRank::RaidMinion || has_minions {
            2.0
        } else {
            1.0
        };
        let chance = (1.0 - actor.hp_ratio() * weight).clamp(0.0, 1.0);
        if !core.ctx().dice.chance(chance) {
            return false;
        }
        self.chaos = 0;
        match targeting::aggro_reconsider(core, profile) {
            Some(target) => {
                self.renew_deadline(core);
                core.set_intention(Intention::Attack(target));
                true
            }
            None => false,
        }
    }

    /// Rooted or otherwise stuck: hit whatever is in reach
    fn melee_in_place(
        &mut self,
        core: &mut ControllerCore,
        profile: &NpcProfile,
        victim: Arc<dyn Character>,
    ) -> AiResult<()> {
        let actor = core.actor().clone();
        let range = actor.physical_range();
        let reach = |c: &dyn Character| {
            let reach = range + actor.collision_radius() + c.collision_radius();
            actor.position().is_within(&c.position(), reach as f64)
        };
        if reach(victim.as_ref()) {
            Self::melee(core, victim.as_ref());
            return Ok(());
        }
        let Some(next) = targeting::target_reconsider(core, profile, range + actor.collision_radius() * 2, true) else {
            return Ok(());
        };
        let Some(next_victim) = core.resolve_live(next) else {
            return Ok(());
        };
        if reach(next_victim.as_ref()) {
            core.change_intention(Intention::Attack(next));
            core.set_attack_target(Some(next));
            core.set_target(Some(next));
            Self::melee(core, next_victim.as_ref());
        }
        Ok(())
    }

    /// Step aside when another NPC overlaps us; true when crowded
    fn reposition(&mut self, core: &mut ControllerCore, victim: &dyn Character, combined: f64) -> bool {
        let actor = core.actor().clone();
        let ctx = core.ctx().clone();
        if !ctx.dice.chance(ctx.config.reposition_chance) {
            return false;
        }
        let crowded = ctx
            .world
            .known_characters_in_radius(actor.as_ref(), actor.collision_radius())
            .iter()
            .any(|c| c.is_npc() && c.id() != actor.id() && c.id() != victim.id());
        if !crowded {
            return false;
        }
        let step = |dice: &crate::world::Dice| {
            let distance = combined as i32 + dice.between(0, 40);
            if dice.chance(0.5) { distance } else { -distance }
        };
        let destination = victim.position().offset(step(&ctx.dice), step(&ctx.dice));
        if ctx.geo.can_move_to(actor.position(), destination) {
            core.move_to(destination);
        }
        true
    }

    fn flee(core: &mut ControllerCore, victim: &dyn Character) -> bool {
        let actor = core.actor().clone();
        let ctx = core.ctx().clone();
        let here = actor.position();
        let destination = here.away_from(&victim.position(), ctx.config.flee_distance as f64);
        if !ctx.geo.can_move_to(here, destination) {
            return false;
        }
        core.move_to(destination)
    }

    fn melee(core: &mut ControllerCore, victim: &dyn Character) {
        let actor = core.actor().clone();
        if core.maybe_move_to_pawn(victim, actor.physical_range()) {
            return;
        }
        core.client_start_auto_attack();
        core.ctx().actuator.do_attack(actor.as_ref(), victim);
        core.ctx().quests.on_attack_act(actor.id(), victim.id());
    }

    fn think_cast(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let Intention::Cast { skill, target } = core.intention().clone() else {
            return Ok(());
        };
        let actor = core.actor().clone();
        if actor.is_casting_now() {
            return Ok(());
        }
        let victim = match target {
            Some(id) => match core.resolve_live(id) {
                Some(victim) => Some(victim),
                None => {
                    core.set_cast_target(None);
                    core.set_skill(None);
                    core.set_intention(Intention::Active);
                    return Ok(());
                }
            },
            None => None,
        };
        if let Some(victim) = victim.as_ref().filter(|v| v.id() != actor.id()) {
            if core.maybe_move_to_pawn(victim.as_ref(), skill.effective_range()) {
                return Ok(());
            }
        }
        core.stop_move();
        core.set_intention(Intention::Active);
        core.ctx()
            .actuator
            .do_cast(actor.as_ref(), &skill, victim.as_deref());
        Ok(())
    }
}

impl Behavior for AutonomousBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Autonomous
    }

    fn on_intention(&mut self, core: &mut ControllerCore, intention: &Intention) -> AiResult<()> {
        match intention {
            Intention::Idle => self.on_idle(core),
            Intention::Active => self.on_active(core),
            Intention::Attack(target) => {
                self.renew_deadline(core);
                reactive::on_attack(core, *target)?;
                Self::ensure_think_task(core);
                Ok(())
            }
            other => {
                reactive::on_intention(core, other)?;
                Self::ensure_think_task(core);
                Ok(())
            }
        }
    }

    fn on_event(&mut self, core: &mut ControllerCore, event: &Event) -> AiResult<()> {
        match event {
            Event::Think => self.think(core),
            Event::Attacked(attacker) => self.on_attacked(core, *attacker),
            Event::Aggression { attacker, amount } => self.on_aggression(core, *attacker, *amount),
            Event::Arrived => {
                self.returning_home = false;
                reactive::on_arrived(core)
            }
            Event::Dead => {
                self.chaos = 0;
                self.returning_home = false;
                self.leash_pending = false;
                reactive::on_dead(core)
            }
            Event::FinishCasting => {
                core.set_skill(None);
                Ok(())
            }
            other => reactive::on_event(core, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::controller::AiHandle;
    use crate::config::AiConfig;
    use crate::sandbox::{ActorSpec, Notification, Sandbox};
    use crate::world::ManualScheduler;

    fn wolf(sandbox: &Sandbox) -> ObjectId {
        sandbox.spawn(ActorSpec::npc(
            "Wolf",
            NpcProfile::new("wolf", Position::new(0, 0, 0)).aggressive(500),
        ))
    }

    #[test]
    fn test_idle_without_players_stops_thinking() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let id = wolf(&sandbox);
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Active);
        assert!(handle.has_think_task());
        handle.set_intention(Intention::Idle);
        assert_eq!(handle.intention(), Intention::Idle);
        assert!(!handle.has_think_task());
    }

    #[test]
    fn test_idle_with_players_stays_active() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let id = wolf(&sandbox);
        sandbox.spawn(ActorSpec::player("Alice", Position::new(1200, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Idle);
        assert_eq!(handle.intention(), Intention::Active);
        assert!(handle.has_think_task());
    }

    #[test]
    fn test_attacked_npc_fights_back() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let id = sandbox.spawn(ActorSpec::npc(
            "Deer",
            NpcProfile::new("deer", Position::new(0, 0, 0)),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(50, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(player));
        assert_eq!(handle.intention(), Intention::Attack(player));
        assert_eq!(handle.hating(player), 1);
        assert_eq!(handle.global_aggro(), Some(0));
    }

    #[test]
    fn test_most_hated_takes_over() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let id = wolf(&sandbox);
        let first = sandbox.spawn(ActorSpec::player("First", Position::new(40, 0, 0)));
        let second = sandbox.spawn(ActorSpec::player("Second", Position::new(0, 40, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(first));
        assert_eq!(handle.intention(), Intention::Attack(first));

        handle.add_damage_hate(second, 100, 500);
        handle.notify_event(Event::Attacked(second));
        assert_eq!(handle.intention(), Intention::Attack(second));
    }

    #[test]
    fn test_leash_sends_npc_home() {
        let scheduler = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .config(AiConfig::deterministic())
            .scheduler(Arc::clone(&scheduler))
            .build();
        let id = wolf(&sandbox);
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(50, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(player));
        sandbox.teleport(id, Position::new(4000, 0, 0));
        sandbox.teleport(player, Position::new(4050, 0, 0));
        scheduler.advance(Duration::from_millis(1000));

        assert_eq!(handle.intention(), Intention::Active);
        assert_eq!(handle.hate_list().len(), 0);
        assert!(handle.is_moving());
    }

    #[test]
    fn test_clan_member_answers_call() {
        let scheduler = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .config(AiConfig::deterministic())
            .scheduler(Arc::clone(&scheduler))
            .build();
        let caller = sandbox.spawn(ActorSpec::npc(
            "Scout",
            NpcProfile::new("orc", Position::new(0, 0, 0)).with_clan("orcs", 800),
        ));
        let ally = sandbox.spawn(ActorSpec::npc(
            "Brute",
            NpcProfile::new("orc", Position::new(300, 0, 0)).with_clan("orcs", 800),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));

        sandbox.controller(caller).unwrap().notify_event(Event::Attacked(player));
        scheduler.advance(Duration::from_millis(1000));

        let ally = sandbox.controller(ally).unwrap();
        assert_eq!(ally.intention(), Intention::Attack(player));
        assert!(ally.hating(player) >= 1);
    }

    const TICK: Duration = Duration::from_millis(1000);

    fn manual(config: AiConfig) -> (Arc<ManualScheduler>, Sandbox) {
        let scheduler = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .config(config)
            .scheduler(Arc::clone(&scheduler))
            .build();
        (scheduler, sandbox)
    }

    fn swinging(sandbox: &Sandbox, id: ObjectId) -> bool {
        sandbox.character(id).unwrap().has_status(Status::Attacking)
    }

    fn fled(sandbox: &Sandbox, id: ObjectId) -> bool {
        sandbox
            .notifications(id)
            .iter()
            .any(|n| matches!(n, Notification::MoveToLocation(p) if p.x < 0))
    }

    #[test]
    fn test_passive_npc_gives_up_after_timeout() {
        let (scheduler, sandbox) = manual(AiConfig::deterministic());
        let id = sandbox.spawn(ActorSpec::npc(
            "Deer",
            NpcProfile::new("deer", Position::new(0, 0, 0)),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(50, 0, 0)).with_hp(1_000_000.0));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(player));
        scheduler.advance(Duration::from_secs(119));
        assert_eq!(handle.intention(), Intention::Attack(player));

        scheduler.advance(Duration::from_secs(6));
        assert_eq!(handle.intention(), Intention::Active);
        assert_eq!(handle.hating(player), 0);
    }

    #[test]
    fn test_aggressive_npc_keeps_nearby_target_past_timeout() {
        let (scheduler, sandbox) = manual(AiConfig::deterministic());
        let id = wolf(&sandbox);
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(900, 0, 0)));
        let handle = sandbox.controller(id).unwrap();
        sandbox.set_status(id, Status::Rooted, true);

        handle.notify_event(Event::Attacked(player));
        scheduler.advance(Duration::from_secs(125));
        assert_eq!(handle.intention(), Intention::Attack(player));

        // Beyond twice the aggro range the timeout applies
        sandbox.teleport(player, Position::new(1500, 0, 0));
        scheduler.advance(TICK);
        assert_eq!(handle.intention(), Intention::Active);
        assert_eq!(handle.hating(player), 0);
    }

    fn raid_fight(rank: NpcRank) -> (Sandbox, AiHandle, ObjectId, ObjectId) {
        let (scheduler, sandbox) = manual(AiConfig::deterministic());
        let boss = sandbox.spawn(ActorSpec::npc(
            "Boss",
            NpcProfile::new("boss", Position::new(0, 0, 0))
                .aggressive(500)
                .with_rank(rank),
        ));
        let first = sandbox.spawn(ActorSpec::player("First", Position::new(40, 0, 0)).with_hp(1_000_000.0));
        let second = sandbox.spawn(ActorSpec::player("Second", Position::new(0, 40, 0)).with_hp(1_000_000.0));
        sandbox.set_hp(boss, 8.0);
        let handle = sandbox.controller(boss).unwrap();

        handle.notify_event(Event::Attacked(first));
        assert_eq!(handle.intention(), Intention::Attack(first));
        scheduler.advance(TICK * 15);
        (sandbox, handle, first, second)
    }

    #[test]
    fn test_wounded_raid_boss_switches_targets_at_random() {
        let (_sandbox, handle, _first, second) = raid_fight(NpcRank::Raid);
        assert!(handle.hating(second) >= 2000);
    }

    #[test]
    fn test_ordinary_npc_keeps_its_target() {
        let (_sandbox, handle, first, second) = raid_fight(NpcRank::Normal);
        assert_eq!(handle.intention(), Intention::Attack(first));
        assert_eq!(handle.hating(second), 0);
    }

    fn skirmisher(sandbox: &Sandbox, ai_type: AiType) -> (ObjectId, ObjectId) {
        let id = sandbox.spawn(ActorSpec::npc(
            "Skirmisher",
            NpcProfile::new("skirmisher", Position::new(0, 0, 0)).with_ai_type(ai_type),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        sandbox.controller(id).unwrap().notify_event(Event::Attacked(player));
        (id, player)
    }

    #[test]
    fn test_archer_backs_away_in_melee_range() {
        let (_scheduler, sandbox) = manual(AiConfig {
            archer_flee_chance: 1.0,
            ..AiConfig::deterministic()
        });
        let (id, _) = skirmisher(&sandbox, AiType::Archer);

        assert!(fled(&sandbox, id));
        assert!(sandbox.controller(id).unwrap().is_moving());
        assert!(!swinging(&sandbox, id));
    }

    #[test]
    fn test_casters_always_back_away() {
        for ai_type in [AiType::Mage, AiType::Healer] {
            let (_scheduler, sandbox) = manual(AiConfig::deterministic());
            let (id, _) = skirmisher(&sandbox, ai_type);
            assert!(fled(&sandbox, id), "{:?} stood its ground", ai_type);
            assert!(!swinging(&sandbox, id));
        }
    }

    #[test]
    fn test_fighter_stands_and_swings() {
        let (_scheduler, sandbox) = manual(AiConfig {
            archer_flee_chance: 1.0,
            ..AiConfig::deterministic()
        });
        let (id, _) = skirmisher(&sandbox, AiType::Fighter);

        assert!(!fled(&sandbox, id));
        assert!(swinging(&sandbox, id));
    }

    #[test]
    fn test_crowded_npc_steps_aside() {
        let (_scheduler, sandbox) = manual(AiConfig {
            reposition_chance: 1.0,
            ..AiConfig::deterministic()
        });
        let id = wolf(&sandbox);
        sandbox.spawn(ActorSpec::npc("Cub", NpcProfile::new("wolf", Position::new(5, 0, 0))));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(player));
        assert_eq!(handle.intention(), Intention::Attack(player));
        assert!(handle.is_moving());
        assert!(!swinging(&sandbox, id));
    }

    #[test]
    fn test_rooted_npc_swings_in_place() {
        let (_scheduler, sandbox) = manual(AiConfig::deterministic());
        let id = wolf(&sandbox);
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(40, 0, 0)));
        let handle = sandbox.controller(id).unwrap();
        sandbox.set_status(id, Status::Rooted, true);

        handle.notify_event(Event::Attacked(player));
        assert!(swinging(&sandbox, id));
        assert!(!handle.is_moving());
    }

    #[test]
    fn test_rooted_npc_turns_on_whoever_is_in_reach() {
        let (_scheduler, sandbox) = manual(AiConfig::deterministic());
        let id = wolf(&sandbox);
        let far = sandbox.spawn(ActorSpec::player("Far", Position::new(200, 0, 0)));
        let near = sandbox.spawn(ActorSpec::player("Near", Position::new(0, 40, 0)));
        let handle = sandbox.controller(id).unwrap();
        sandbox.set_status(id, Status::Rooted, true);

        handle.notify_event(Event::Attacked(far));
        assert_eq!(handle.intention(), Intention::Attack(near));
        assert_eq!(handle.attack_target(), Some(near));
        assert!(swinging(&sandbox, id));
        assert!(!handle.is_moving());
    }

    #[test]
    fn test_confused_npc_ignores_hate_shifts() {
        let (scheduler, sandbox) = manual(AiConfig::deterministic());
        let id = wolf(&sandbox);
        let first = sandbox.spawn(ActorSpec::player("First", Position::new(40, 0, 0)));
        let second = sandbox.spawn(ActorSpec::player("Second", Position::new(0, 40, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.notify_event(Event::Attacked(first));
        handle.add_damage_hate(second, 0, 500);
        sandbox.set_status(id, Status::Confused, true);
        scheduler.advance(TICK);
        assert_eq!(handle.intention(), Intention::Attack(first));

        sandbox.set_status(id, Status::Confused, false);
        scheduler.advance(TICK);
        assert_eq!(handle.intention(), Intention::Attack(second));
    }
}
