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

//! Baseline hooks shared by every archetype
//!
//! Nothing here schedules a think task. The baseline only reacts: it commits
//! intentions, moves toward targets, toggles the client-visible attack stance
//! and re-raises status effects as a fresh stimulus.

use crate::ai::controller::ControllerCore;
use crate::ai::error::{AiError, AiResult};
use crate::ai::intention::{DeferredAction, Event, EventKind, Intention, IntentionKind};
use crate::world::{Character, ObjectId, Position, Skill, Status};

/// How close an actor must be to pick up or interact with an object
pub const INTERACTION_DISTANCE: i32 = 36;

pub fn on_intention(core: &mut ControllerCore, intention: &Intention) -> AiResult<()> {
    match intention {
        Intention::Idle => on_idle(core),
        Intention::Active => on_active(core),
        Intention::Rest => on_rest(core),
        Intention::Attack(target) => on_attack(core, *target),
        Intention::Cast { skill, target } => on_cast(core, skill, *target),
        Intention::MoveTo(destination) => on_move_to(core, *destination),
        Intention::Follow(target) => on_follow(core, *target),
        Intention::PickUp(object) => on_pick_up(core, *object),
        Intention::Interact(object) => on_interact(core, *object),
    }
}

pub fn on_event(core: &mut ControllerCore, event: &Event) -> AiResult<()> {
    match event {
        Event::Think => on_think(core),
        Event::Attacked(attacker) => on_attacked(core, *attacker),
        Event::Stunned(_)
        | Event::Paralyzed(_)
        | Event::Sleeping(_)
        | Event::Rooted(_)
        | Event::Confused(_)
        | Event::Muted(_) => on_impaired(core, event.source()),
        Event::Afraid(_) => on_afraid(core, event.source()),
        Event::ReadyToAct => {
            core.notify_event(Event::Think);
            Ok(())
        }
        Event::Arrived => on_arrived(core),
        Event::ArrivedBlocked(at) => on_arrived_blocked(core, *at),
        Event::ForgetObject(object) => on_forget_object(core, *object),
        Event::Cancel => on_cancel(core),
        Event::Dead => on_dead(core),
        Event::FakeDeath => on_fake_death(core),
        Event::FinishCasting => on_finish_casting(core),
        Event::Aggression { .. } | Event::Evaded(_) | Event::UserCommand => Ok(()),
    }
}

/// Resting by intention or by posture
pub fn is_resting(core: &ControllerCore) -> bool {
    *core.intention() == Intention::Rest || core.actor().has_status(Status::Resting)
}

/// Skill cannot be used right now because of reuse or silence
pub fn skill_blocked(actor: &dyn Character, skill: &Skill) -> bool {
    actor.is_skill_disabled(skill)
        || (skill.is_magic() && actor.has_status(Status::Muted))
        || (!skill.is_magic() && actor.has_status(Status::PhysicalMuted))
}

/// Enough mana and health to pay for `skill`
pub fn can_afford(actor: &dyn Character, skill: &Skill) -> bool {
    actor.mp() >= skill.mp_cost && actor.hp() > skill.hp_cost
}

fn stand_up(core: &mut ControllerCore) {
    if core.actor().has_status(Status::Resting) {
        core.ctx().actuator.stand(core.actor().as_ref());
    }
}

fn reraise(core: &mut ControllerCore, by: Option<ObjectId>) {
    match by {
        Some(source) => core.notify_event(Event::Attacked(source)),
        None => core.notify_event(Event::Think),
    }
}

// -------------------------------------------------------------------------
// Intentions
// -------------------------------------------------------------------------

pub fn on_idle(core: &mut ControllerCore) -> AiResult<()> {
    stand_up(core);
    core.change_intention(Intention::Idle);
    core.clear_targets();
    core.stop_move();
    core.client_stop_auto_attack();
    Ok(())
}

pub fn on_active(core: &mut ControllerCore) -> AiResult<()> {
    if *core.intention() == Intention::Active {
        return Ok(());
    }
    enter_active(core);
    core.notify_event(Event::Think);
    Ok(())
}

/// Commit `Active` and drop everything the previous intention was doing
pub fn enter_active(core: &mut ControllerCore) {
    stand_up(core);
    core.change_intention(Intention::Active);
    core.clear_targets();
    core.stop_move();
    core.client_stop_auto_attack();
}

pub fn on_rest(core: &mut ControllerCore) -> AiResult<()> {
    if *core.intention() == Intention::Rest {
        return Ok(());
    }
    if core.actor().is_casting_now() || core.actor().is_attacking_disabled() {
        return Err(AiError::invalid(IntentionKind::Rest, "actor cannot sit now"));
    }
    core.change_intention(Intention::Rest);
    core.clear_targets();
    core.stop_move();
    core.client_stop_auto_attack();
    core.ctx().actuator.sit(core.actor().as_ref());
    Ok(())
}

pub fn on_attack(core: &mut ControllerCore, target: ObjectId) -> AiResult<()> {
    if is_resting(core) {
        return Err(AiError::invalid(IntentionKind::Attack, "actor is resting"));
    }
    let actor = core.actor().clone();
    if actor.has_status(Status::Afraid) {
        return Err(AiError::invalid(IntentionKind::Attack, "actor is afraid"));
    }
    if actor.is_attacking_disabled() {
        return Err(AiError::invalid(IntentionKind::Attack, "actor cannot attack"));
    }
    if actor.is_casting_now() {
        return Err(AiError::invalid(IntentionKind::Attack, "actor is casting"));
    }
    if target == actor.id() {
        return Err(AiError::invalid(IntentionKind::Attack, "actor cannot attack itself"));
    }
    if core.resolve(target).is_none() {
        return Err(AiError::StaleReference(target));
    }

    if matches!(core.intention(), Intention::Attack(_)) && core.attack_target() == Some(target) {
        return Err(AiError::invalid(
            IntentionKind::Attack,
            "already attacking that target",
        ));
    }

    core.change_intention(Intention::Attack(target));
    core.set_attack_target(Some(target));
    core.set_target(Some(target));
    core.stop_follow();
    core.notify_event(Event::Think);
    Ok(())
}

pub fn on_cast(core: &mut ControllerCore, skill: &Skill, target: Option<ObjectId>) -> AiResult<()> {
    let actor = core.actor().clone();
    if is_resting(core) && skill.is_magic() {
        return Err(AiError::invalid(IntentionKind::Cast, "actor is resting"));
    }
    if actor.is_alike_dead()
        || actor.has_status(Status::Stunned)
        || actor.has_status(Status::Paralyzed)
        || actor.has_status(Status::Sleeping)
    {
        return Err(AiError::invalid(IntentionKind::Cast, "actor cannot act"));
    }
    if actor.is_casting_now() {
        return Err(AiError::invalid(IntentionKind::Cast, "actor is already casting"));
    }
    if skill_blocked(actor.as_ref(), skill) {
        core.set_skill(None);
        return Err(AiError::MissingPrecondition("skill is disabled"));
    }
    if !can_afford(actor.as_ref(), skill) {
        core.set_skill(None);
        return Err(AiError::MissingPrecondition("not enough resources"));
    }
    if let Some(id) = target.filter(|id| *id != actor.id()) {
        if core.resolve(id).is_none() {
            return Err(AiError::StaleReference(id));
        }
    }

    if actor.is_attacking_now() && skill.hit_time_ms > core.config().cast_abort_hit_threshold_ms {
        core.ctx().actuator.abort_attack(actor.as_ref());
    }
    core.set_skill(Some(skill.clone()));
    core.set_cast_target(target);
    if let Some(id) = target {
        core.set_target(Some(id));
    }
    core.change_intention(Intention::Cast {
        skill: skill.clone(),
        target,
    });
    core.notify_event(Event::Think);
    Ok(())
}

pub fn on_move_to(core: &mut ControllerCore, destination: Position) -> AiResult<()> {
    if is_resting(core) {
        return Err(AiError::invalid(IntentionKind::MoveTo, "actor is resting"));
    }
    let actor = core.actor().clone();
    if actor.is_casting_now() {
        return Err(AiError::invalid(IntentionKind::MoveTo, "actor is casting"));
    }
    if actor.is_movement_disabled() {
        return Err(AiError::invalid(IntentionKind::MoveTo, "movement is disabled"));
    }
    core.change_intention(Intention::MoveTo(destination));
    core.clear_route();
    core.client_stop_auto_attack();
    if actor.is_attacking_now() {
        core.ctx().actuator.abort_attack(actor.as_ref());
    }
    core.move_to(destination);
    Ok(())
}

pub fn on_follow(core: &mut ControllerCore, target: ObjectId) -> AiResult<()> {
    if is_resting(core) {
        return Err(AiError::invalid(IntentionKind::Follow, "actor is resting"));
    }
    let actor = core.actor().clone();
    if actor.is_movement_disabled() {
        return Err(AiError::invalid(IntentionKind::Follow, "movement is disabled"));
    }
    if target == actor.id() {
        return Err(AiError::invalid(IntentionKind::Follow, "actor cannot follow itself"));
    }
    if core.resolve(target).is_none() {
        return Err(AiError::StaleReference(target));
    }
    if *core.intention() == Intention::Follow(target) && core.follow_target() == Some(target) {
        return Ok(());
    }
    core.change_intention(Intention::Follow(target));
    core.client_stop_auto_attack();
    core.start_follow(target, None);
    Ok(())
}

pub fn on_pick_up(core: &mut ControllerCore, object: ObjectId) -> AiResult<()> {
    approach_object(core, IntentionKind::PickUp, object, move |core| {
        core.ctx().actuator.pick_up(core.actor().as_ref(), object);
        core.set_intention(Intention::Idle);
        Ok(())
    })
}

pub fn on_interact(core: &mut ControllerCore, object: ObjectId) -> AiResult<()> {
    approach_object(core, IntentionKind::Interact, object, move |core| {
        core.ctx().actuator.interact(core.actor().as_ref(), object);
        core.set_intention(Intention::Idle);
        Ok(())
    })
}

/// Walk up to `object` and run `action` once arrived
fn approach_object(
    core: &mut ControllerCore,
    kind: IntentionKind,
    object: ObjectId,
    action: impl FnOnce(&mut ControllerCore) -> AiResult<()> + Send + 'static,
) -> AiResult<()> {
    if is_resting(core) {
        return Err(AiError::invalid(kind, "actor is resting"));
    }
    let actor = core.actor().clone();
    if actor.is_casting_now() {
        return Err(AiError::invalid(kind, "actor is casting"));
    }
    let Some(position) = core.ctx().world.locate(object) else {
        return Err(AiError::StaleReference(object));
    };

    let intention = match kind {
        IntentionKind::PickUp => Intention::PickUp(object),
        _ => Intention::Interact(object),
    };
    core.change_intention(intention);
    core.set_target(Some(object));
    core.client_stop_auto_attack();
    core.set_deferred(DeferredAction::new(EventKind::Arrived, kind, action));

    if !core.maybe_move_to_position(position, INTERACTION_DISTANCE) {
        core.notify_event(Event::Arrived);
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Events
// -------------------------------------------------------------------------

pub fn on_think(core: &mut ControllerCore) -> AiResult<()> {
    match core.intention().clone() {
        Intention::Attack(target) => think_attack(core, target),
        Intention::Cast { skill, target } => think_cast(core, &skill, target),
        _ => Ok(()),
    }
}

/// Close in on the attack target and swing
pub fn think_attack(core: &mut ControllerCore, target: ObjectId) -> AiResult<()> {
    let Some(victim) = core.resolve_live(target) else {
        return Err(AiError::StaleReference(target));
    };
    let actor = core.actor().clone();
    if actor.is_attacking_disabled() {
        return Ok(());
    }
    if core.maybe_move_to_pawn(victim.as_ref(), actor.physical_range()) {
        return Ok(());
    }
    core.stop_move();
    core.client_start_auto_attack();
    core.ctx().actuator.do_attack(actor.as_ref(), victim.as_ref());
    Ok(())
}

/// Close in on the cast target and start the cast
pub fn think_cast(core: &mut ControllerCore, skill: &Skill, target: Option<ObjectId>) -> AiResult<()> {
    let actor = core.actor().clone();
    let victim = match target {
        Some(id) => match core.resolve_live(id) {
            Some(victim) => Some(victim),
            None => {
                core.set_skill(None);
                return Err(AiError::StaleReference(id));
            }
        },
        None => None,
    };
    if actor.is_casting_now() {
        return Ok(());
    }
    if let Some(victim) = victim.as_ref().filter(|v| v.id() != actor.id()) {
        if core.maybe_move_to_pawn(victim.as_ref(), skill.effective_range()) {
            return Ok(());
        }
    }
    if skill.hit_time_ms > core.config().cast_abort_hit_threshold_ms {
        core.stop_move();
    }
    core.ctx()
        .actuator
        .do_cast(actor.as_ref(), skill, victim.as_deref());
    Ok(())
}

pub fn on_attacked(core: &mut ControllerCore, _attacker: ObjectId) -> AiResult<()> {
    if !core.actor().is_attacking_disabled() {
        core.client_start_auto_attack();
    }
    Ok(())
}

/// Stun, paralysis, sleep, root, confusion and silence
pub fn on_impaired(core: &mut ControllerCore, by: Option<ObjectId>) -> AiResult<()> {
    let actor = core.actor().clone();
    core.client_stop_auto_attack();
    core.stop_move();
    if actor.is_attacking_now() && actor.is_attacking_disabled() {
        core.ctx().actuator.abort_attack(actor.as_ref());
    }
    reraise(core, by);
    Ok(())
}

pub fn on_afraid(core: &mut ControllerCore, by: Option<ObjectId>) -> AiResult<()> {
    let actor = core.actor().clone();
    core.client_stop_auto_attack();
    if actor.is_attacking_now() {
        core.ctx().actuator.abort_attack(actor.as_ref());
    }
    let Some(source) = by.and_then(|id| core.resolve(id)) else {
        core.stop_move();
        return Ok(());
    };
    if actor.is_movement_disabled() {
        return Ok(());
    }

    let here = actor.position();
    let distance = core.config().fear_distance as f64;
    let destination = here.away_from(&source.position(), distance);
    if core.ctx().geo.can_move_to(here, destination) {
        core.move_to(destination);
    }
    Ok(())
}

pub fn on_arrived(core: &mut ControllerCore) -> AiResult<()> {
    if core.advance_route() {
        return Ok(());
    }
    core.client_stopped_moving();
    if let Intention::MoveTo(_) = core.intention() {
        core.set_intention(Intention::Active);
    }
    core.notify_event(Event::Think);
    Ok(())
}

pub fn on_arrived_blocked(core: &mut ControllerCore, at: Position) -> AiResult<()> {
    if matches!(core.intention().kind(), IntentionKind::MoveTo | IntentionKind::Cast) {
        core.set_intention(Intention::Active);
    }
    core.stop_move_at(Some(at));
    core.notify_event(Event::Think);
    Ok(())
}

pub fn on_forget_object(core: &mut ControllerCore, object: ObjectId) -> AiResult<()> {
    let actor = core.actor().clone();
    if object == actor.id() || actor.owner() == Some(object) {
        core.clear_targets();
        core.set_skill(None);
        core.stop_follow();
        core.stop_move();
        core.client_stop_auto_attack();
        core.clear_deferred();
        core.change_intention(Intention::Idle);
        return Ok(());
    }

    let mut lost = core.intention().target() == Some(object);
    if core.target() == Some(object) {
        core.set_target(None);
    }
    if core.attack_target() == Some(object) {
        core.set_attack_target(None);
        lost = true;
    }
    if core.cast_target() == Some(object) {
        core.set_cast_target(None);
        core.set_skill(None);
        lost = true;
    }
    if core.follow_target() == Some(object) {
        core.stop_follow();
        lost = true;
    }
    if lost && !matches!(core.intention(), Intention::Idle | Intention::Active) {
        core.set_intention(Intention::Active);
    }
    Ok(())
}

pub fn on_cancel(core: &mut ControllerCore) -> AiResult<()> {
    let actor = core.actor().clone();
    if actor.is_casting_now() {
        core.ctx().actuator.abort_cast(actor.as_ref());
    }
    core.stop_follow();
    core.client_stop_auto_attack();
    if let Intention::Cast { .. } = core.intention() {
        core.set_skill(None);
        core.set_intention(Intention::Active);
    }
    core.notify_event(Event::Think);
    Ok(())
}

pub fn on_dead(core: &mut ControllerCore) -> AiResult<()> {
    let actor = core.actor().clone();
    core.stop_follow();
    core.stop_think_task();
    core.stop_avoid_task();
    core.clear_deferred();
    core.client_notify_dead();
    core.clear_targets();
    core.set_skill(None);
    core.change_intention(Intention::Idle);
    if actor.acting_player().is_none() {
        actor.set_running(false);
    }
    if let Some(ledger) = core.ledger() {
        ledger.clear();
    }
    tracing::debug!(actor = %actor.id(), "Controller saw death");
    Ok(())
}

pub fn on_fake_death(core: &mut ControllerCore) -> AiResult<()> {
    core.stop_follow();
    core.stop_move();
    core.client_stop_auto_attack();
    core.change_intention(Intention::Idle);
    core.clear_targets();
    Ok(())
}

pub fn on_finish_casting(core: &mut ControllerCore) -> AiResult<()> {
    core.set_skill(None);
    if let Intention::Cast { .. } = core.intention() {
        core.set_intention(Intention::Active);
    }
    Ok(())
}
