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

//! Intentions, events and deferred actions
//!
//! An [`Intention`] is an actor's single current long-term goal. It is replaced,
//! never queued. An [`Event`] is a transient stimulus delivered once and then
//! forgotten. A [`DeferredAction`] pairs the two: run something when a given
//! event arrives while a given intention is still current.

use crate::ai::controller::ControllerCore;
use crate::ai::error::AiResult;
use crate::world::{ObjectId, Position, Skill};
use enum_kinds::EnumKind;

/// Long-term goal of an actor
#[derive(Debug, Clone, PartialEq, Default, EnumKind)]
#[enum_kind(IntentionKind, derive(Hash, PartialOrd, Ord))]
pub enum Intention {
    /// Do nothing; no thinking
    #[default]
    Idle,
    /// Alert; patrol, wander and scan for targets
    Active,
    /// Sitting down
    Rest,
    Attack(ObjectId),
    Cast {
        skill: Skill,
        target: Option<ObjectId>,
    },
    MoveTo(Position),
    Follow(ObjectId),
    PickUp(ObjectId),
    Interact(ObjectId),
}

impl Intention {
    pub fn kind(&self) -> IntentionKind {
        IntentionKind::from(self)
    }

    /// Object the intention is aimed at, if any
    pub fn target(&self) -> Option<ObjectId> {
        match self {
            Intention::Attack(target)
            | Intention::Follow(target)
            | Intention::PickUp(target)
            | Intention::Interact(target) => Some(*target),
            Intention::Cast { target, .. } => *target,
            _ => None,
        }
    }

    /// Intentions that keep a running follow task alive
    pub fn keeps_follow(&self) -> bool {
        matches!(self, Intention::Follow(_) | Intention::Attack(_))
    }
}

/// Transient stimulus
#[derive(Debug, Clone, PartialEq, EnumKind)]
#[enum_kind(EventKind, derive(Hash, PartialOrd, Ord))]
pub enum Event {
    /// Re-evaluate
    Think,
    /// Hit by an attacker
    Attacked(ObjectId),
    /// Hate generated without damage, e.g. a taunt or a faction call
    Aggression { attacker: ObjectId, amount: i64 },
    Stunned(Option<ObjectId>),
    Paralyzed(Option<ObjectId>),
    Sleeping(Option<ObjectId>),
    Rooted(Option<ObjectId>),
    Confused(Option<ObjectId>),
    Muted(Option<ObjectId>),
    Afraid(Option<ObjectId>),
    /// An attack from this character missed
    Evaded(ObjectId),
    /// The previous action finished; the actor can act again
    ReadyToAct,
    /// A player command arrived
    UserCommand,
    /// Movement reached its destination
    Arrived,
    /// Movement stopped early at the given point
    ArrivedBlocked(Position),
    /// An object left the actor's knowledge
    ForgetObject(ObjectId),
    Cancel,
    Dead,
    FakeDeath,
    FinishCasting,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }

    /// Source character of a status or combat event
    pub fn source(&self) -> Option<ObjectId> {
        match self {
            Event::Attacked(id) | Event::Evaded(id) | Event::ForgetObject(id) => Some(*id),
            Event::Aggression { attacker, .. } => Some(*attacker),
            Event::Stunned(by)
            | Event::Paralyzed(by)
            | Event::Sleeping(by)
            | Event::Rooted(by)
            | Event::Confused(by)
            | Event::Muted(by)
            | Event::Afraid(by) => *by,
            _ => None,
        }
    }
}

/// Callback run by a [`DeferredAction`]
pub type DeferredFn = Box<dyn FnOnce(&mut ControllerCore) -> AiResult<()> + Send>;

/// One-shot action armed for an (event, intention) pair
pub struct DeferredAction {
    event: EventKind,
    guard: IntentionKind,
    action: DeferredFn,
}

impl DeferredAction {
    pub fn new(
        event: EventKind,
        guard: IntentionKind,
        action: impl FnOnce(&mut ControllerCore) -> AiResult<()> + Send + 'static,
    ) -> Self {
        Self {
            event,
            guard,
            action: Box::new(action),
        }
    }

    pub fn event(&self) -> EventKind {
        self.event
    }

    pub fn guard(&self) -> IntentionKind {
        self.guard
    }

    /// Whether this action fires for `event` while `current` is the intention
    pub fn matches(&self, event: EventKind, current: IntentionKind) -> bool {
        self.event == event && self.guard == current
    }

    pub(crate) fn into_action(self) -> DeferredFn {
        self.action
    }
}

impl std::fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredAction")
            .field("event", &self.event)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}
