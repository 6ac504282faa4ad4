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

//! Integration tests for hostility ledgers driven through live controllers

use std::sync::Arc;
use std::time::Duration;
use wyldlands_ai::ai::{Intention, LedgerSignal};
use wyldlands_ai::config::AiConfig;
use wyldlands_ai::sandbox::{ActorSpec, Sandbox};
use wyldlands_ai::world::{ManualScheduler, NpcProfile, ObjectId, Position, Status};

struct Arena {
    sandbox: Sandbox,
    clock: Arc<ManualScheduler>,
    wolf: ObjectId,
}

/// A lone wolf with no players around, so it idles
fn arena() -> Arena {
    let clock = Arc::new(ManualScheduler::new());
    let sandbox = Sandbox::builder()
        .config(AiConfig::deterministic())
        .scheduler(Arc::clone(&clock))
        .build();
    let wolf = sandbox.spawn(ActorSpec::npc(
        "Wolf",
        NpcProfile::new("wolf", Position::new(0, 0, 0)).aggressive(500),
    ));
    Arena { sandbox, clock, wolf }
}

#[test]
fn test_first_hate_wakes_idle_npc() {
    let arena = arena();
    let rabbit = arena.sandbox.spawn(ActorSpec::npc(
        "Rabbit",
        NpcProfile::new("rabbit", Position::new(60, 0, 0)),
    ));
    let handle = arena.sandbox.controller(arena.wolf).unwrap();
    assert_eq!(handle.intention(), Intention::Idle);

    let signal = handle.add_damage_hate(rabbit, 5, 5);
    assert_eq!(signal, LedgerSignal::BecameHateful);
    assert_eq!(handle.intention(), Intention::Active);
    assert!(handle.has_think_task());

    assert_eq!(handle.add_damage_hate(rabbit, 5, 5), LedgerSignal::Unchanged);
    assert_eq!(handle.hating(rabbit), 10);
}

#[test]
fn test_exhausted_ledger_sends_npc_back_to_patrol() {
    let arena = arena();
    let player = arena
        .sandbox
        .spawn(ActorSpec::player("Alice", Position::new(200, 0, 0)));
    let handle = arena.sandbox.controller(arena.wolf).unwrap();

    handle.add_damage_hate(player, 10, 40);
    handle.set_intention(Intention::Attack(player));
    assert_eq!(handle.intention(), Intention::Attack(player));

    assert_eq!(handle.reduce_hate(Some(player), 100), LedgerSignal::Exhausted);
    assert_eq!(handle.intention(), Intention::Active);
    assert_eq!(handle.attack_target(), None);
    assert!(handle.hate_list().is_empty());
    assert_eq!(
        handle.global_aggro(),
        Some(AiConfig::deterministic().exhausted_aggro_bias)
    );
}

#[test]
fn test_fallen_and_vanished_attackers_heal_out() {
    let arena = arena();
    let alice = arena
        .sandbox
        .spawn(ActorSpec::player("Alice", Position::new(100, 0, 0)));
    let bob = arena
        .sandbox
        .spawn(ActorSpec::player("Bob", Position::new(-100, 0, 0)));
    let handle = arena.sandbox.controller(arena.wolf).unwrap();

    handle.add_damage_hate(alice, 10, 50);
    handle.add_damage_hate(bob, 10, 30);
    assert_eq!(handle.most_hated(), Some(alice));

    arena.sandbox.set_status(alice, Status::Dead, true);
    assert_eq!(handle.hating(alice), 0);
    assert_eq!(handle.most_hated(), Some(bob));

    assert!(arena.sandbox.despawn(bob));
    assert_eq!(handle.hating(bob), 0);
    assert_eq!(handle.most_hated(), None);

    // Entries survive with zeroed hate until the ledger is cleared
    assert_eq!(handle.hate_list().len(), 2);
    handle.clear_hate();
    assert!(handle.hate_list().is_empty());
}

#[test]
fn test_swings_credit_damage_and_hate() {
    let arena = arena();
    let player = arena
        .sandbox
        .spawn(ActorSpec::player("Alice", Position::new(30, 0, 0)).with_power(25.0));
    let hero = arena.sandbox.controller(player).unwrap();
    let wolf = arena.sandbox.controller(arena.wolf).unwrap();

    hero.set_intention(Intention::Attack(arena.wolf));
    arena.clock.advance(Duration::from_millis(500));

    let list = wolf.hate_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].attacker, player);
    assert_eq!(list[0].damage, 25);
    assert!(list[0].hate >= 25);
    assert_eq!(wolf.intention(), Intention::Attack(player));
}

#[test]
fn test_stop_hating_lets_npc_give_up() {
    let arena = arena();
    let player = arena
        .sandbox
        .spawn(ActorSpec::player("Alice", Position::new(3000, 0, 0)));
    let handle = arena.sandbox.controller(arena.wolf).unwrap();

    handle.add_damage_hate(player, 0, 10);
    handle.set_intention(Intention::Attack(player));
    handle.stop_hating(player);
    assert_eq!(handle.hating(player), 0);

    // The next think finds nothing worth chasing outside aggro range
    arena.sandbox.set_status(player, Status::Invisible, true);
    arena.clock.advance(Duration::from_secs(1));
    assert_eq!(handle.intention(), Intention::Active);
    assert!(!arena.sandbox.character(arena.wolf).unwrap().has_status(Status::Running));
}
