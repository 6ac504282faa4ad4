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

//! Player-directed archetype
//!
//! Players never schedule their own thinking; every decision starts from a
//! client command. The only extra state is a one-slot buffer that remembers
//! what the player was doing before a cast, so the cast can interrupt an
//! attack or a walk and the player resumes it afterwards.

use crate::ai::behavior::{Behavior, BehaviorKind, reactive};
use crate::ai::controller::ControllerCore;
use crate::ai::error::AiResult;
use crate::ai::intention::{Event, Intention, IntentionKind};

#[derive(Debug, Default)]
pub struct PlayerBehavior {
    next_intention: Option<Intention>,
}

impl PlayerBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn take_next_intention(&mut self) -> Option<Intention> {
        self.next_intention.take()
    }

    fn resumable(intention: &Intention) -> bool {
        matches!(
            intention.kind(),
            IntentionKind::Attack
                | IntentionKind::Follow
                | IntentionKind::MoveTo
                | IntentionKind::PickUp
                | IntentionKind::Interact
        )
    }
}

impl Behavior for PlayerBehavior {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::PlayerDirected
    }

    fn on_intention(&mut self, core: &mut ControllerCore, intention: &Intention) -> AiResult<()> {
        match intention {
            Intention::Cast { .. } => {
                if self.next_intention.is_none() && Self::resumable(core.intention()) {
                    self.next_intention = Some(core.intention().clone());
                }
            }
            _ => self.next_intention = None,
        }
        reactive::on_intention(core, intention)
    }

    fn on_event(&mut self, core: &mut ControllerCore, event: &Event) -> AiResult<()> {
        match event {
            Event::FinishCasting => {
                core.set_skill(None);
                if let Intention::Cast { .. } = core.intention() {
                    match self.next_intention.take() {
                        Some(next) if next.kind() != IntentionKind::Cast => core.set_intention(next),
                        _ => core.set_intention(Intention::Idle),
                    }
                }
                Ok(())
            }
            Event::ReadyToAct => {
                if let Some(next) = self.next_intention.take() {
                    core.set_intention(next);
                }
                reactive::on_event(core, event)
            }
            other => reactive::on_event(core, other),
        }
    }

    fn set_next_intention(&mut self, intention: Intention) {
        self.next_intention = Some(intention);
    }

    fn next_intention(&self) -> Option<&Intention> {
        self.next_intention.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ActorSpec, Sandbox};
    use crate::world::{Position, Skill, SkillKind, SkillTarget};

    fn buff() -> Skill {
        Skill::new(11, "Haste", SkillKind::Buff, SkillTarget::OneSelf)
    }

    #[test]
    fn test_cast_saves_previous_attack() {
        let sandbox = Sandbox::builder().build();
        let foe = sandbox.spawn(ActorSpec::player("Foe", Position::new(30, 0, 0)));
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Attack(foe));
        handle.set_intention(Intention::Cast {
            skill: buff(),
            target: None,
        });
        assert_eq!(handle.intention().kind(), IntentionKind::Cast);
        assert_eq!(handle.next_intention(), Some(Intention::Attack(foe)));
    }

    #[test]
    fn test_finish_casting_resumes_buffered_intention() {
        let sandbox = Sandbox::builder().build();
        let foe = sandbox.spawn(ActorSpec::player("Foe", Position::new(30, 0, 0)));
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Attack(foe));
        handle.set_intention(Intention::Cast {
            skill: buff(),
            target: None,
        });
        sandbox.set_status(id, crate::world::Status::Casting, false);
        handle.notify_event(Event::FinishCasting);

        assert_eq!(handle.intention(), Intention::Attack(foe));
        assert_eq!(handle.next_intention(), None);
    }

    #[test]
    fn test_finish_casting_without_buffer_goes_idle() {
        let sandbox = Sandbox::builder().build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Cast {
            skill: buff(),
            target: None,
        });
        sandbox.set_status(id, crate::world::Status::Casting, false);
        handle.notify_event(Event::FinishCasting);
        assert_eq!(handle.intention(), Intention::Idle);
    }

    #[test]
    fn test_other_intentions_clear_buffer() {
        let sandbox = Sandbox::builder().build();
        let foe = sandbox.spawn(ActorSpec::player("Foe", Position::new(30, 0, 0)));
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_next_intention(Intention::Attack(foe));
        handle.set_intention(Intention::Idle);
        assert_eq!(handle.next_intention(), None);
    }

    #[test]
    fn test_players_never_schedule_thinking() {
        let sandbox = Sandbox::builder().build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::Active);
        assert!(!handle.has_think_task());
        assert_eq!(handle.behavior_kind(), BehaviorKind::PlayerDirected);
    }
}
