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

//! Summon archetype
//!
//! Layered on the player-directed archetype: a summon follows its owner
//! whenever it would otherwise go active, resumes its last attack after
//! casting, and runs an avoid task that sidesteps attackers while it waits
//! near the owner.

use crate::ai::behavior::{Behavior, BehaviorKind, PlayerBehavior, reactive};
use crate::ai::controller::ControllerCore;
use crate::ai::error::AiResult;
use crate::ai::intention::{Event, Intention, IntentionKind};
use crate::world::{Character, ObjectId};

/// Random spread, in heading units, around the avoid direction
const AVOID_SPREAD: i32 = 16384;

#[derive(Debug)]
pub struct SummonBehavior {
    directed: PlayerBehavior,
    follow_owner: bool,
    /// Target to resume once a cast finishes
    last_attack: Option<ObjectId>,
    start_avoid: bool,
    last_owner_hp: Option<f64>,
}

impl Default for SummonBehavior {
    fn default() -> Self {
        Self {
            directed: PlayerBehavior::new(),
            follow_owner: true,
            last_attack: None,
            start_avoid: false,
            last_owner_hp: None,
        }
    }
}

impl SummonBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follows_owner(&self) -> bool {
        self.follow_owner
    }

    fn on_active(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let owner = core.actor().owner();
        match owner {
            Some(owner) if self.follow_owner && core.resolve(owner).is_some() => {
                core.set_intention(Intention::Follow(owner));
                Ok(())
            }
            _ => reactive::on_active(core),
        }
    }

    fn sync_avoid_task(core: &mut ControllerCore) {
        let wants = matches!(core.intention().kind(), IntentionKind::Active | IntentionKind::Follow);
        if wants && !core.has_avoid_task() {
            core.start_avoid_task();
        } else if !wants && core.has_avoid_task() {
            core.stop_avoid_task();
        }
    }

    /// Raise the avoid flag when the attacker is not the owner and the owner
    /// is close enough to dodge around
    fn consider_avoid(&mut self, core: &ControllerCore, attacker: ObjectId) {
        let Some(owner) = core.actor().owner().and_then(|id| core.resolve(id)) else {
            return;
        };
        if owner.id() == attacker {
            return;
        }
        let radius = 2.0 * core.config().avoid_radius as f64;
        if core.actor().position().is_within(&owner.position(), radius) {
            self.start_avoid = true;
        }
    }

    fn restore_follow(&mut self, core: &mut ControllerCore) {
        let buffered = self.directed.take_next_intention();
        if let Some(target) = self.last_attack.take() {
            if core.resolve_live(target).is_some() {
                core.set_intention(Intention::Attack(target));
                return;
            }
        }
        if let Some(next) = buffered.filter(|next| next.kind() != IntentionKind::Cast) {
            core.set_intention(next);
            return;
        }
        self.apply_follow_status(core);
    }

    fn apply_follow_status(&mut self, core: &mut ControllerCore) {
        match core.actor().owner() {
            Some(owner) if self.follow_owner => core.set_intention(Intention::Follow(owner)),
            _ => core.set_intention(Intention::Idle),
        }
    }
}

impl Behavior for SummonBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Summon
    }

    fn on_intention(&mut self, core: &mut ControllerCore, intention: &Intention) -> AiResult<()> {
        let result = match intention {
            Intention::Idle => {
                core.stop_follow();
                self.follow_owner = false;
                self.directed.on_intention(core, intention)
            }
            Intention::Active => self.on_active(core),
            Intention::Cast { .. } => {
                if let Intention::Attack(target) = core.intention() {
                    self.last_attack = Some(*target);
                }
                self.directed.on_intention(core, intention)
            }
            other => self.directed.on_intention(core, other),
        };
        Self::sync_avoid_task(core);
        result
    }

    fn on_event(&mut self, core: &mut ControllerCore, event: &Event) -> AiResult<()> {
        match event {
            Event::FinishCasting => {
                core.set_skill(None);
                if let Intention::Cast { .. } = core.intention() {
                    self.restore_follow(core);
                }
                Ok(())
            }
            Event::Attacked(attacker) => {
                self.consider_avoid(core, *attacker);
                self.directed.on_event(core, event)
            }
            Event::Evaded(attacker) => {
                self.consider_avoid(core, *attacker);
                Ok(())
            }
            Event::Dead => {
                core.stop_avoid_task();
                self.start_avoid = false;
                self.directed.on_event(core, event)
            }
            other => self.directed.on_event(core, other),
        }
    }

    fn on_avoid(&mut self, core: &mut ControllerCore) -> AiResult<()> {
        let actor = core.actor().clone();
        let Some(owner) = actor.owner().and_then(|id| core.resolve(id)) else {
            return Ok(());
        };

        let owner_hp = owner.hp();
        if self.last_owner_hp.is_some_and(|previous| owner_hp < previous) {
            self.start_avoid = true;
        }
        self.last_owner_hp = Some(owner_hp);

        if !std::mem::take(&mut self.start_avoid) {
            return Ok(());
        }
        if core.is_moving() || actor.is_alike_dead() || actor.is_movement_disabled() {
            return Ok(());
        }

        let ctx = core.ctx().clone();
        let spread = ctx.dice.between(-AVOID_SPREAD, AVOID_SPREAD);
        let heading = actor
            .position()
            .heading_to(&owner.position())
            .wrapping_add(spread as u16);
        let destination = owner
            .position()
            .project(heading, ctx.config.avoid_radius as f64);
        if ctx.geo.can_move_to(actor.position(), destination) {
            tracing::trace!(actor = %actor.id(), "Summon sidestepping");
            core.move_to(destination);
        }
        Ok(())
    }

    fn set_follow_status(&mut self, core: &mut ControllerCore, follow: bool) -> AiResult<()> {
        self.follow_owner = follow;
        if matches!(
            core.intention().kind(),
            IntentionKind::Active | IntentionKind::Follow | IntentionKind::Idle | IntentionKind::MoveTo | IntentionKind::PickUp
        ) {
            self.apply_follow_status(core);
        }
        Ok(())
    }

    fn set_next_intention(&mut self, intention: Intention) {
        self.directed.set_next_intention(intention);
    }

    fn next_intention(&self) -> Option<&Intention> {
        self.directed.next_intention()
    }

    fn on_detach(&mut self, core: &mut ControllerCore) {
        core.stop_avoid_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ActorSpec, Sandbox};
    use crate::world::{ManualScheduler, Position, Skill, SkillKind, SkillTarget, Status};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_active_summon_follows_owner() {
        let sandbox = Sandbox::builder().build();
        let owner = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let pet = sandbox.spawn(ActorSpec::summon("Kitten", owner, Position::new(100, 0, 0)));
        let handle = sandbox.controller(pet).unwrap();

        handle.set_intention(Intention::Active);
        assert_eq!(handle.intention(), Intention::Follow(owner));
        assert!(handle.is_following());
        assert!(handle.has_avoid_task());
    }

    #[test]
    fn test_follow_status_toggle() {
        let sandbox = Sandbox::builder().build();
        let owner = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let pet = sandbox.spawn(ActorSpec::summon("Kitten", owner, Position::new(100, 0, 0)));
        let handle = sandbox.controller(pet).unwrap();

        handle.set_intention(Intention::Active);
        handle.set_follow_status(false);
        assert_eq!(handle.intention(), Intention::Idle);
        assert!(!handle.is_following());
        assert!(!handle.has_avoid_task());

        handle.set_follow_status(true);
        assert_eq!(handle.intention(), Intention::Follow(owner));
    }

    #[test]
    fn test_cast_resumes_attack() {
        let sandbox = Sandbox::builder().build();
        let owner = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let foe = sandbox.spawn(ActorSpec::player("Foe", Position::new(130, 0, 0)));
        let pet = sandbox.spawn(ActorSpec::summon("Kitten", owner, Position::new(100, 0, 0)));
        let handle = sandbox.controller(pet).unwrap();

        handle.set_intention(Intention::Attack(foe));
        handle.set_intention(Intention::Cast {
            skill: Skill::new(21, "Roar", SkillKind::Buff, SkillTarget::OneSelf),
            target: None,
        });
        sandbox.set_status(pet, Status::Casting, false);
        handle.notify_event(Event::FinishCasting);
        assert_eq!(handle.intention(), Intention::Attack(foe));
    }

    #[test]
    fn test_attacked_summon_sidesteps() {
        let scheduler = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder().scheduler(Arc::clone(&scheduler)).build();
        let owner = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let foe = sandbox.spawn(ActorSpec::player("Foe", Position::new(300, 0, 0)));
        let pet = sandbox.spawn(ActorSpec::summon("Kitten", owner, Position::new(60, 0, 0)));
        let handle = sandbox.controller(pet).unwrap();

        handle.set_intention(Intention::Active);
        assert!(handle.has_avoid_task());
        // Within follow range; the follow task has nothing to do
        scheduler.run_pending();
        assert!(!handle.is_moving());

        handle.notify_event(Event::Evaded(foe));
        scheduler.advance(Duration::from_millis(100));
        assert!(handle.is_moving());
    }
}
