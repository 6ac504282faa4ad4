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

//! Movement and combat simulation behind the [`Actuator`] trait
//!
//! Every command starts a timed action on the scheduler and reports back to
//! the controllers with an event once it completes:
//!
//! - a walk ends with `Arrived` (or `ArrivedBlocked` at the terrain boundary)
//! - a swing lands after the attacker's attack speed, then `ReadyToAct`
//! - a cast resolves after its hit time, then `FinishCasting`
//!
//! Commands are issued while the caller holds its own controller, so nothing
//! here locks a controller directly. Completions run on the scheduler with no
//! locks held.

use super::SandboxWorld;
use super::actor::SandboxActor;
use super::components::{Conditions, Effects, Placement, Prowess, Vitals};
use super::terrain::OpenTerrain;
use crate::ai::intention::Event;
use crate::world::{
    Actuator, Character, Geodata, KnownObjects, ObjectId, Position, Scheduler, Skill, SkillId,
    SkillKind, SkillTarget,
    Status, TaskHandle,
};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Extra reach granted when a swing lands, for targets that stepped back
const SWING_SLACK: i32 = 30;

/// Damage of an offensive skill relative to a plain swing
const SKILL_POWER: f64 = 2.0;

/// Damage of a self-destruct skill relative to a plain swing
const SUICIDE_POWER: f64 = 4.0;

/// How long buffs and debuffs stay on
const EFFECT_DURATION: Duration = Duration::from_secs(30);

pub struct SandboxEngine {
    this: Weak<SandboxEngine>,
    world: Weak<SandboxWorld>,
    terrain: Arc<OpenTerrain>,
    scheduler: Arc<dyn Scheduler>,
    arrivals: DashMap<ObjectId, TaskHandle>,
    swings: DashMap<ObjectId, TaskHandle>,
    casts: DashMap<ObjectId, TaskHandle>,
    pick_ups: DashMap<ObjectId, Vec<ObjectId>>,
    interactions: DashMap<ObjectId, Vec<ObjectId>>,
}

impl SandboxEngine {
    pub(crate) fn new(
        world: Weak<SandboxWorld>,
        terrain: Arc<OpenTerrain>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            world,
            terrain,
            scheduler,
            arrivals: DashMap::new(),
            swings: DashMap::new(),
            casts: DashMap::new(),
            pick_ups: DashMap::new(),
            interactions: DashMap::new(),
        })
    }

    /// Objects `actor` picked up, in order
    pub fn picked_up(&self, actor: ObjectId) -> Vec<ObjectId> {
        self.pick_ups
            .get(&actor)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Objects `actor` interacted with, in order
    pub fn interacted(&self, actor: ObjectId) -> Vec<ObjectId> {
        self.interactions
            .get(&actor)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// Run `f` on the engine from a scheduled task
    fn later(&self, delay: Duration, f: impl FnOnce(&SandboxEngine) + Send + 'static) -> TaskHandle {
        let this = self.this.clone();
        self.scheduler.schedule_once(
            delay,
            Box::new(move || {
                if let Some(engine) = this.upgrade() {
                    f(&engine);
                }
            }),
        )
    }

    fn cancel(slot: &DashMap<ObjectId, TaskHandle>, actor: ObjectId) {
        if let Some((_, task)) = slot.remove(&actor) {
            task.cancel();
        }
    }

    fn notify(world: &SandboxWorld, actor: ObjectId, event: Event) {
        if let Some(handle) = world.controller(actor) {
            handle.notify_event(event);
        }
    }

    /// Stop every timed action of `actor`
    pub(crate) fn halt(&self, actor: ObjectId) {
        Self::cancel(&self.arrivals, actor);
        Self::cancel(&self.swings, actor);
        Self::cancel(&self.casts, actor);
    }

    /// Teleport: drop the current leg; true when the actor was walking
    pub(crate) fn interrupt_move(&self, actor: ObjectId) -> bool {
        match self.arrivals.remove(&actor) {
            Some((_, task)) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn forget(&self, actor: ObjectId) {
        self.halt(actor);
        self.pick_ups.remove(&actor);
        self.interactions.remove(&actor);
    }

    // ---------------------------------------------------------------------
    // Completions
    // ---------------------------------------------------------------------

    fn arrive(&self, actor: ObjectId, destination: Position, blocked: bool) {
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let current = world
            .update(actor, |p: &mut Placement| {
                if p.destination == Some(destination) {
                    p.place(destination);
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if !current {
            return;
        }
        self.arrivals.remove(&actor);
        let event = if blocked {
            Event::ArrivedBlocked(destination)
        } else {
            Event::Arrived
        };
        Self::notify(&world, actor, event);
    }

    fn land_swing(&self, attacker: ObjectId, victim: ObjectId) {
        self.swings.remove(&attacker);
        let Some(world) = self.world.upgrade() else {
            return;
        };
        world.update(attacker, |c: &mut Conditions| c.0 -= Status::Attacking);
        let (Some(striker), Some(target)) = (world.actor(attacker), world.actor(victim)) else {
            return;
        };
        if striker.is_alike_dead() {
            return;
        }
        let reach = striker.physical_range()
            + striker.collision_radius()
            + target.collision_radius()
            + SWING_SLACK;
        if !target.is_alike_dead() && striker.position().is_within(&target.position(), reach as f64) {
            self.strike(&world, &striker, &target, striker.power());
        } else {
            tracing::trace!(attacker = %attacker, victim = %victim, "Swing missed");
            Self::notify(&world, victim, Event::Evaded(attacker));
        }
        Self::notify(&world, attacker, Event::ReadyToAct);
    }

    /// Deal damage, credit the attacker in the victim's ledger and tell the victim
    fn strike(&self, world: &SandboxWorld, attacker: &SandboxActor, victim: &SandboxActor, amount: f64) {
        if victim.has_status(Status::Invulnerable) {
            Self::notify(world, victim.id(), Event::Attacked(attacker.id()));
            return;
        }
        let Some(lethal) = world.update(victim.id(), |v: &mut Vitals| v.damage(amount)) else {
            return;
        };
        metrics::counter!("sandbox.hits").increment(1);
        tracing::trace!(attacker = %attacker.id(), victim = %victim.id(), amount, "Hit");
        if let Some(handle) = world.controller(victim.id()) {
            let points = amount.round() as i64;
            handle.add_damage_hate(attacker.id(), points, points);
            handle.notify_event(Event::Attacked(attacker.id()));
        }
        if lethal {
            self.kill(world, victim.id());
        }
    }

    /// Hostile skill without damage: hate and an attack notification
    fn provoke(&self, world: &SandboxWorld, caster: &SandboxActor, victim: &SandboxActor) {
        if let Some(handle) = world.controller(victim.id()) {
            let points = caster.power().round() as i64;
            handle.add_damage_hate(caster.id(), 0, points);
            handle.notify_event(Event::Attacked(caster.id()));
        }
    }

    /// Kill `actor`; an actor that is already dead is left alone
    pub(crate) fn kill(&self, world: &SandboxWorld, actor: ObjectId) {
        let dead = world.read(actor, |c: &Conditions| c.0.contains(Status::Dead));
        if dead != Some(false) {
            return;
        }
        self.halt(actor);
        let now = self.scheduler.now();
        world.update(actor, |p: &mut Placement| p.settle(now));
        world.update(actor, |v: &mut Vitals| v.hp = 0.0);
        world.update(actor, |c: &mut Conditions| {
            c.0 |= Status::Dead;
            c.0 -= Status::Attacking;
            c.0 -= Status::Casting;
            c.0 -= Status::Running;
        });
        metrics::counter!("sandbox.deaths").increment(1);
        tracing::info!(actor = %actor, "Actor died");
        Self::notify(world, actor, Event::Dead);
    }

    fn finish_cast(&self, caster: ObjectId, skill: Skill, target: Option<ObjectId>) {
        self.casts.remove(&caster);
        let Some(world) = self.world.upgrade() else {
            return;
        };
        world.update(caster, |c: &mut Conditions| c.0 -= Status::Casting);
        let Some(actor) = world.actor(caster) else {
            return;
        };
        if !actor.is_alike_dead() {
            self.apply_skill(&world, &actor, &skill, target);
        }
        Self::notify(&world, caster, Event::FinishCasting);
    }

    fn affected(
        &self,
        world: &SandboxWorld,
        caster: &Arc<SandboxActor>,
        skill: &Skill,
        target: Option<ObjectId>,
    ) -> Vec<Arc<SandboxActor>> {
        let chosen = target.and_then(|id| world.actor(id));
        match skill.target {
            SkillTarget::OneSelf => vec![Arc::clone(caster)],
            SkillTarget::One => match chosen {
                Some(actor) => vec![actor],
                None if !skill.is_offensive() => vec![Arc::clone(caster)],
                None => Vec::new(),
            },
            SkillTarget::Party | SkillTarget::Aura | SkillTarget::Area => {
                let center = match (skill.target, chosen.as_ref()) {
                    (SkillTarget::Area, Some(actor)) => actor.position(),
                    _ => caster.position(),
                };
                let hostile_side = caster.acting_player().is_some();
                world
                    .actors()
                    .into_iter()
                    .filter(|a| !a.is_alike_dead() && a.position().is_within(&center, skill.radius as f64))
                    .filter(|a| {
                        if skill.is_offensive() {
                            a.id() != caster.id() && a.is_auto_attackable_by(caster.as_ref())
                        } else {
                            a.acting_player().is_some() == hostile_side
                        }
                    })
                    .collect()
            }
        }
    }

    fn apply_skill(&self, world: &SandboxWorld, caster: &Arc<SandboxActor>, skill: &Skill, target: Option<ObjectId>) {
        let victims = self.affected(world, caster, skill, target);
        tracing::debug!(caster = %caster.id(), skill = %skill.name, affected = victims.len(), "Skill resolved");
        match skill.kind {
            SkillKind::PhysicalAttack | SkillKind::MagicAttack => {
                for victim in &victims {
                    self.strike(world, caster, victim, caster.power() * SKILL_POWER);
                }
            }
            SkillKind::Debuff => {
                for victim in &victims {
                    self.add_effect(world, victim.id(), skill.id);
                    self.provoke(world, caster, victim);
                }
            }
            SkillKind::Heal => {
                let amount = caster.power() * SKILL_POWER;
                for victim in &victims {
                    world.update(victim.id(), |v: &mut Vitals| v.heal(amount));
                }
            }
            SkillKind::Buff => {
                for victim in &victims {
                    self.add_effect(world, victim.id(), skill.id);
                }
            }
            SkillKind::Suicide => {
                for victim in &victims {
                    self.strike(world, caster, victim, caster.power() * SUICIDE_POWER);
                }
                self.kill(world, caster.id());
            }
            SkillKind::Other => {}
        }
    }

    fn add_effect(&self, world: &SandboxWorld, actor: ObjectId, skill: SkillId) {
        world.update(actor, |e: &mut Effects| e.active.insert(skill));
        self.later(EFFECT_DURATION, move |engine| {
            if let Some(world) = engine.world.upgrade() {
                world.update(actor, |e: &mut Effects| e.active.remove(&skill));
            }
        });
    }
}

impl Actuator for SandboxEngine {
    fn do_attack(&self, actor: &dyn Character, target: &dyn Character) {
        let (attacker, victim) = (actor.id(), target.id());
        if self.swings.contains_key(&attacker) {
            return;
        }
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let Some(speed) = world.read(attacker, |p: &Prowess| p.attack_speed) else {
            return;
        };
        world.update(attacker, |c: &mut Conditions| c.0 |= Status::Attacking);
        let task = self.later(speed, move |engine| engine.land_swing(attacker, victim));
        self.swings.insert(attacker, task);
    }

    fn do_cast(&self, actor: &dyn Character, skill: &Skill, target: Option<&dyn Character>) {
        let caster = actor.id();
        if self.casts.contains_key(&caster) {
            return;
        }
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let paid = world
            .update(caster, |v: &mut Vitals| v.spend(skill.mp_cost, skill.hp_cost))
            .unwrap_or(false);
        if !paid {
            tracing::debug!(caster = %caster, skill = %skill.name, "Cast fizzled");
            self.later(Duration::ZERO, move |engine| {
                if let Some(world) = engine.world.upgrade() {
                    Self::notify(&world, caster, Event::FinishCasting);
                }
            });
            return;
        }
        world.update(caster, |c: &mut Conditions| c.0 |= Status::Casting);
        let skill = skill.clone();
        let target = target.map(|t| t.id());
        let hit_time = Duration::from_millis(skill.hit_time_ms);
        let task = self.later(hit_time, move |engine| engine.finish_cast(caster, skill, target));
        self.casts.insert(caster, task);
    }

    fn abort_attack(&self, actor: &dyn Character) {
        Self::cancel(&self.swings, actor.id());
        if let Some(world) = self.world.upgrade() {
            world.update(actor.id(), |c: &mut Conditions| c.0 -= Status::Attacking);
        }
    }

    fn abort_cast(&self, actor: &dyn Character) {
        Self::cancel(&self.casts, actor.id());
        if let Some(world) = self.world.upgrade() {
            world.update(actor.id(), |c: &mut Conditions| c.0 -= Status::Casting);
        }
    }

    fn move_to(&self, actor: &dyn Character, destination: Position) {
        let Some(world) = self.world.upgrade() else {
            return;
        };
        let id = actor.id();
        let from = actor.position();
        let blocked = !self.terrain.can_move_to(from, destination);
        let stop = if blocked {
            self.terrain.last_walkable(from, destination)
        } else {
            destination
        };
        let running = actor.has_status(Status::Running);
        let Some(speed) = world.read(id, |p: &Prowess| if running { p.run_speed } else { p.walk_speed }) else {
            return;
        };
        let now = self.scheduler.now();
        let Some(travel) = world.update(id, |p: &mut Placement| p.depart(now, stop, speed)) else {
            return;
        };
        Self::cancel(&self.arrivals, id);
        let task = self.later(travel, move |engine| engine.arrive(id, stop, blocked));
        self.arrivals.insert(id, task);
    }

    fn stop_move(&self, actor: &dyn Character) {
        Self::cancel(&self.arrivals, actor.id());
        if let Some(world) = self.world.upgrade() {
            let now = self.scheduler.now();
            world.update(actor.id(), |p: &mut Placement| p.settle(now));
        }
    }

    fn pick_up(&self, actor: &dyn Character, object: ObjectId) {
        tracing::debug!(actor = %actor.id(), object = %object, "Picked up");
        self.pick_ups.entry(actor.id()).or_default().push(object);
    }

    fn interact(&self, actor: &dyn Character, object: ObjectId) {
        tracing::debug!(actor = %actor.id(), object = %object, "Interacted");
        self.interactions.entry(actor.id()).or_default().push(object);
    }

    fn sit(&self, actor: &dyn Character) {
        if let Some(world) = self.world.upgrade() {
            world.update(actor.id(), |c: &mut Conditions| c.0 |= Status::Resting);
        }
    }

    fn stand(&self, actor: &dyn Character) {
        if let Some(world) = self.world.upgrade() {
            world.update(actor.id(), |c: &mut Conditions| c.0 -= Status::Resting);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AiConfig;
    use crate::sandbox::{ActorSpec, Notification, Sandbox};
    use crate::world::{
        Actuator, Character, ManualScheduler, NpcProfile, Position, Skill, SkillKind, SkillTarget,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn sandbox() -> (Sandbox, Arc<ManualScheduler>) {
        let clock = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .config(AiConfig::deterministic())
            .scheduler(Arc::clone(&clock))
            .build();
        (sandbox, clock)
    }

    #[test]
    fn test_suicide_blast_strikes_hostiles_and_kills_caster_once() {
        let (sandbox, clock) = sandbox();
        let blast = Skill::new(9, "Self Destruct", SkillKind::Suicide, SkillTarget::Aura).with_radius(150);
        let bomber = sandbox.spawn(ActorSpec::npc(
            "Bomber",
            NpcProfile::new("bomber", Position::new(0, 0, 0)).with_skill(blast.clone()),
        ));
        let ally = sandbox.spawn(ActorSpec::npc(
            "Ally",
            NpcProfile::new("ally", Position::new(40, 0, 0)),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(20, 0, 0)));

        let caster = sandbox.character(bomber).unwrap();
        let victim = sandbox.character(player).unwrap();
        sandbox
            .engine()
            .do_cast(caster.as_ref(), &blast, Some(victim.as_ref()));
        clock.advance(Duration::from_millis(blast.hit_time_ms));

        assert_eq!(victim.hp(), 1000.0 - 4.0 * 20.0);
        assert_eq!(sandbox.character(ally).unwrap().hp(), 800.0);
        assert!(caster.is_dead());
        let deaths = sandbox
            .notifications(bomber)
            .iter()
            .filter(|n| **n == Notification::Die)
            .count();
        assert_eq!(deaths, 1);
    }

    #[test]
    fn test_kill_ignores_the_dead() {
        let (sandbox, _clock) = sandbox();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        sandbox.kill(id);
        sandbox.kill(id);

        let deaths = sandbox
            .notifications(id)
            .iter()
            .filter(|n| **n == Notification::Die)
            .count();
        assert_eq!(deaths, 1);
    }
}
