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

//! Client and quest sinks that remember what they were told

use crate::world::{ClientSink, ObjectId, Position, QuestHooks};
use dashmap::DashMap;
use std::sync::Mutex;

/// One client broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    MoveToLocation(Position),
    MoveToPawn { target: ObjectId, offset: i32 },
    StopMove(Position),
    AutoAttackStart,
    AutoAttackStop,
    Die,
    ActionFailed,
}

/// [`ClientSink`] keeping every broadcast per actor
#[derive(Debug, Default)]
pub struct RecordingClient {
    log: DashMap<ObjectId, Vec<Notification>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, actor: ObjectId, notification: Notification) {
        tracing::trace!(actor = %actor, ?notification, "Client notified");
        self.log.entry(actor).or_default().push(notification);
    }

    /// Broadcasts sent for `actor`, oldest first
    pub fn notifications(&self, actor: ObjectId) -> Vec<Notification> {
        self.log
            .get(&actor)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Broadcasts sent for every actor
    pub fn total(&self) -> usize {
        self.log.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn forget(&self, actor: ObjectId) {
        self.log.remove(&actor);
    }
}

impl ClientSink for RecordingClient {
    fn move_to_location(&self, actor: ObjectId, destination: Position) {
        self.record(actor, Notification::MoveToLocation(destination));
    }

    fn move_to_pawn(&self, actor: ObjectId, target: ObjectId, offset: i32) {
        self.record(actor, Notification::MoveToPawn { target, offset });
    }

    fn stop_move(&self, actor: ObjectId, position: Position) {
        self.record(actor, Notification::StopMove(position));
    }

    fn auto_attack_start(&self, actor: ObjectId) {
        self.record(actor, Notification::AutoAttackStart);
    }

    fn auto_attack_stop(&self, actor: ObjectId) {
        self.record(actor, Notification::AutoAttackStop);
    }

    fn die(&self, actor: ObjectId) {
        self.record(actor, Notification::Die);
    }

    fn action_failed(&self, actor: ObjectId) {
        self.record(actor, Notification::ActionFailed);
    }
}

/// One scripting callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestCall {
    AggroRangeEnter { npc: ObjectId, target: ObjectId },
    FactionCall { npc: ObjectId, caller: ObjectId, attacker: ObjectId },
    AttackAct { npc: ObjectId, target: ObjectId },
}

/// [`QuestHooks`] keeping every callback in order
#[derive(Debug, Default)]
pub struct QuestLog {
    calls: Mutex<Vec<QuestCall>>,
}

impl QuestLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: QuestCall) {
        tracing::trace!(?call, "Quest hook");
        metrics::counter!("sandbox.quest_calls").increment(1);
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<QuestCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl QuestHooks for QuestLog {
    fn on_aggro_range_enter(&self, npc: ObjectId, target: ObjectId) {
        self.record(QuestCall::AggroRangeEnter { npc, target });
    }

    fn on_faction_call(&self, npc: ObjectId, caller: ObjectId, attacker: ObjectId) {
        self.record(QuestCall::FactionCall {
            npc,
            caller,
            attacker,
        });
    }

    fn on_attack_act(&self, npc: ObjectId, target: ObjectId) {
        self.record(QuestCall::AttackAct { npc, target });
    }
}
