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

//! Integration tests for autonomous NPCs: acquisition, pursuit and recovery

use std::sync::Arc;
use std::time::Duration;
use wyldlands_ai::ai::{AiHandle, Intention, IntentionKind};
use wyldlands_ai::config::AiConfig;
use wyldlands_ai::sandbox::{ActorSpec, Notification, QuestCall, Sandbox};
use wyldlands_ai::world::{
    Character, ManualScheduler, NpcProfile, NpcRole, ObjectId, Position, Status,
};

const TICK: Duration = Duration::from_millis(1000);

fn sandbox() -> (Sandbox, Arc<ManualScheduler>) {
    let clock = Arc::new(ManualScheduler::new());
    let sandbox = Sandbox::builder()
        .config(AiConfig::deterministic())
        .scheduler(Arc::clone(&clock))
        .build();
    (sandbox, clock)
}

/// Let the spawn aggro bias wear off
fn settle(clock: &ManualScheduler) {
    for _ in 0..10 {
        clock.advance(TICK);
    }
}

fn wolf(sandbox: &Sandbox) -> (ObjectId, AiHandle) {
    let id = sandbox.spawn(ActorSpec::npc(
        "Wolf",
        NpcProfile::new("wolf", Position::new(0, 0, 0)).aggressive(500),
    ));
    (id, sandbox.controller(id).unwrap())
}

#[test]
fn test_wolf_acquires_player_entering_aggro_range() {
    let (sandbox, clock) = sandbox();
    let (wolf, handle) = wolf(&sandbox);
    let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(2000, 0, 0)));
    assert_eq!(handle.intention(), Intention::Active);

    settle(&clock);
    assert_eq!(handle.global_aggro(), Some(0));
    assert_eq!(handle.intention(), Intention::Active);

    sandbox.teleport(player, Position::new(300, 0, 0));
    clock.advance(TICK);

    assert_eq!(handle.intention(), Intention::Attack(player));
    assert!(handle.hating(player) >= 1);
    assert!(sandbox.quest_calls().contains(&QuestCall::AggroRangeEnter {
        npc: wolf,
        target: player,
    }));
    assert!(sandbox.character(wolf).unwrap().has_status(Status::Running));
}

#[test]
fn test_spawn_bias_holds_back_nearby_player() {
    let (sandbox, clock) = sandbox();
    let (_, handle) = wolf(&sandbox);
    let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(300, 0, 0)));

    for _ in 0..9 {
        clock.advance(TICK);
        assert_eq!(handle.intention(), Intention::Active);
        assert_eq!(handle.hating(player), 0);
    }
    assert_eq!(handle.global_aggro(), Some(-1));

    clock.advance(TICK);
    assert_eq!(handle.intention(), Intention::Attack(player));
    assert_eq!(handle.hating(player), 1);
}

#[test]
fn test_wolf_gives_up_on_dead_target() {
    let (sandbox, clock) = sandbox();
    let (wolf, handle) = wolf(&sandbox);
    let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(2000, 0, 0)));
    settle(&clock);
    sandbox.teleport(player, Position::new(300, 0, 0));
    clock.advance(TICK);
    assert_eq!(handle.intention(), Intention::Attack(player));

    sandbox.set_status(player, Status::Dead, true);
    clock.advance(TICK);

    assert_eq!(handle.intention(), Intention::Active);
    assert_eq!(handle.hating(player), 0);
    assert_eq!(handle.attack_target(), None);
    assert!(!sandbox.character(wolf).unwrap().has_status(Status::Running));
}

#[test]
fn test_wolf_hunts_player_down() {
    let (sandbox, clock) = sandbox();
    let (wolf, handle) = wolf(&sandbox);
    let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(2000, 0, 0)).with_hp(50.0));
    settle(&clock);
    sandbox.teleport(player, Position::new(300, 0, 0));

    clock.advance(Duration::from_secs(30));

    let victim = sandbox.character(player).unwrap();
    assert!(victim.is_dead());
    assert!(sandbox.notifications(player).contains(&Notification::Die));
    assert!(sandbox.notifications(wolf).contains(&Notification::AutoAttackStart));
    assert_eq!(handle.intention(), Intention::Active);
    assert_eq!(sandbox.census().players, (0, 1));
}

#[test]
fn test_guard_only_hunts_flagged_players() {
    let (sandbox, clock) = sandbox();
    let guard = sandbox.spawn(ActorSpec::npc(
        "Guard",
        NpcProfile::new("guard", Position::new(0, 0, 0))
            .with_role(NpcRole::Guard)
            .aggressive(500),
    ));
    let innocent = sandbox.spawn(ActorSpec::player("Alice", Position::new(250, 0, 0)));
    let outlaw = sandbox.spawn(ActorSpec::player("Mordred", Position::new(2000, 0, 0)).with_karma(300));
    let handle = sandbox.controller(guard).unwrap();

    settle(&clock);
    assert_eq!(handle.intention(), Intention::Active);
    assert_eq!(handle.hating(innocent), 0);

    sandbox.teleport(outlaw, Position::new(300, 0, 0));
    clock.advance(TICK);
    assert_eq!(handle.intention(), Intention::Attack(outlaw));
    assert_eq!(handle.hating(innocent), 0);
}

#[test]
fn test_rival_factions_fight() {
    let (sandbox, clock) = sandbox();
    let orc = sandbox.spawn(ActorSpec::npc(
        "Orc",
        NpcProfile::new("orc", Position::new(0, 0, 0))
            .with_role(NpcRole::FactionMob)
            .with_faction("orcs")
            .aggressive(500),
    ));
    let elf = sandbox.spawn(ActorSpec::npc(
        "Elf",
        NpcProfile::new("elf", Position::new(300, 0, 0))
            .with_role(NpcRole::FactionMob)
            .with_faction("elves")
            .aggressive(500),
    ));
    let kin = sandbox.spawn(ActorSpec::npc(
        "Orc Scout",
        NpcProfile::new("orc", Position::new(-200, 0, 0))
            .with_role(NpcRole::FactionMob)
            .with_faction("orcs"),
    ));
    // Someone has to be watching or the NPCs stay idle
    sandbox.spawn(ActorSpec::player("Watcher", Position::new(0, 3000, 0)));

    settle(&clock);
    clock.advance(TICK);

    let orc_handle = sandbox.controller(orc).unwrap();
    assert_eq!(orc_handle.intention(), Intention::Attack(elf));
    assert_eq!(orc_handle.hating(kin), 0);
    assert_eq!(
        sandbox.controller(elf).unwrap().intention().kind(),
        IntentionKind::Attack
    );
}

#[test]
fn test_minion_keeps_up_with_leader() {
    let (sandbox, clock) = sandbox();
    let leader = sandbox.spawn(ActorSpec::npc(
        "Chieftain",
        NpcProfile::new("chieftain", Position::new(0, 0, 0)).stationary(),
    ));
    let minion = sandbox.spawn(
        ActorSpec::npc("Runt", NpcProfile::new("runt", Position::new(50, 0, 0))).with_leader(leader),
    );
    sandbox.spawn(ActorSpec::player("Watcher", Position::new(0, 3000, 0)));

    sandbox.teleport(leader, Position::new(1000, 0, 0));
    clock.advance(Duration::from_secs(20));

    let gap = sandbox
        .character(minion)
        .unwrap()
        .position()
        .distance_2d(&sandbox.character(leader).unwrap().position());
    assert!(gap <= 200.0, "minion trails by {}", gap);
}

#[test]
fn test_idle_npc_wakes_for_arriving_player() {
    let (sandbox, clock) = sandbox();
    let (_, handle) = wolf(&sandbox);
    assert_eq!(handle.intention(), Intention::Idle);

    clock.advance(Duration::from_secs(5));
    assert!(!handle.has_think_task());

    sandbox.spawn(ActorSpec::player("Alice", Position::new(1200, 0, 0)));
    assert_eq!(handle.intention(), Intention::Active);
    assert!(handle.has_think_task());
}
