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

//! In-memory world for running controllers without a game server
//!
//! The sandbox keeps its actors in a `hecs` world and implements every
//! collaborator trait the controllers need: [`KnownObjects`] here,
//! [`Geodata`](crate::world::Geodata) in [`terrain`], the
//! [`Actuator`](crate::world::Actuator) in [`engine`] and recording client and
//! quest sinks in [`recorder`]. Tests drive it through a
//! [`ManualScheduler`]; the binary runs it in real time.
//!
//! # Locking
//!
//! Controllers read the ECS while holding their own lock, so the sandbox
//! never calls into a controller while it holds the ECS lock.

pub mod actor;
pub mod components;
pub mod engine;
pub mod recorder;
pub mod terrain;

pub use actor::SandboxActor;
pub use engine::SandboxEngine;
pub use recorder::{Notification, QuestCall, QuestLog, RecordingClient};
pub use terrain::OpenTerrain;

use crate::ai::controller::{AiHandle, Controller};
use crate::ai::intention::{Event, Intention};
use crate::config::AiConfig;
use crate::world::{
    Actuator, AiContext, Character, CharacterKind, ClientSink, Geodata, KnownObjects,
    ManualScheduler, NpcProfile, ObjectId, Position, QuestHooks, Scheduler, SkillId, Status,
};
use actor::ActorFacts;
use components::{Conditions, Effects, Identity, Placement, Prowess, Reputation, Template, Vitals};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// How far an actor can see other actors
pub const DEFAULT_KNOWLEDGE_RADIUS: i32 = 4000;

/// Everything needed to put one actor into the sandbox
#[derive(Debug, Clone)]
pub struct ActorSpec {
    name: String,
    kind: CharacterKind,
    position: Position,
    heading: u16,
    profile: Option<NpcProfile>,
    owner: Option<ObjectId>,
    leader: Option<ObjectId>,
    faction: Option<String>,
    karma: i32,
    max_hp: f64,
    max_mp: f64,
    collision_radius: i32,
    physical_range: i32,
    power: f64,
    attack_speed: Duration,
    walk_speed: f64,
    run_speed: f64,
}

impl ActorSpec {
    fn base(name: impl Into<String>, kind: CharacterKind, position: Position) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            heading: 0,
            profile: None,
            owner: None,
            leader: None,
            faction: None,
            karma: 0,
            max_hp: 1000.0,
            max_mp: 500.0,
            collision_radius: 10,
            physical_range: 40,
            power: 25.0,
            attack_speed: Duration::from_millis(500),
            walk_speed: 80.0,
            run_speed: 160.0,
        }
    }

    pub fn player(name: impl Into<String>, position: Position) -> Self {
        Self::base(name, CharacterKind::Player, position)
    }

    /// NPC standing at its template's spawn point
    pub fn npc(name: impl Into<String>, profile: NpcProfile) -> Self {
        let mut blueprint = Self::base(name, CharacterKind::Npc, profile.spawn);
        blueprint.faction = profile.faction.clone();
        blueprint.max_hp = 800.0;
        blueprint.max_mp = 300.0;
        blueprint.power = 20.0;
        blueprint.profile = Some(profile);
        blueprint
    }

    pub fn summon(name: impl Into<String>, owner: ObjectId, position: Position) -> Self {
        let mut blueprint = Self::base(name, CharacterKind::Summon, position);
        blueprint.owner = Some(owner);
        blueprint.max_hp = 600.0;
        blueprint.power = 15.0;
        blueprint
    }

    pub fn with_karma(mut self, karma: i32) -> Self {
        self.karma = karma;
        self
    }

    pub fn with_leader(mut self, leader: ObjectId) -> Self {
        self.leader = Some(leader);
        self
    }

    pub fn with_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }

    pub fn with_heading(mut self, heading: u16) -> Self {
        self.heading = heading;
        self
    }

    pub fn with_hp(mut self, max_hp: f64) -> Self {
        self.max_hp = max_hp;
        self
    }

    pub fn with_mp(mut self, max_mp: f64) -> Self {
        self.max_mp = max_mp;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn with_attack_speed(mut self, attack_speed: Duration) -> Self {
        self.attack_speed = attack_speed;
        self
    }

    pub fn with_physical_range(mut self, range: i32) -> Self {
        self.physical_range = range;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CharacterKind {
        self.kind
    }
}

/// Actor registry: the ECS, the character handles and their controllers
pub struct SandboxWorld {
    entities: Arc<RwLock<hecs::World>>,
    actors: DashMap<ObjectId, Arc<SandboxActor>>,
    controllers: DashMap<ObjectId, AiHandle>,
    clock: Arc<dyn Scheduler>,
    knowledge_radius: i32,
}

impl SandboxWorld {
    fn new(clock: Arc<dyn Scheduler>, knowledge_radius: i32) -> Self {
        Self {
            entities: Arc::new(RwLock::new(hecs::World::new())),
            actors: DashMap::new(),
            controllers: DashMap::new(),
            clock,
            knowledge_radius,
        }
    }

    pub fn actor(&self, id: ObjectId) -> Option<Arc<SandboxActor>> {
        self.actors.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Snapshot of every spawned actor
    pub fn actors(&self) -> Vec<Arc<SandboxActor>> {
        self.actors.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Read one component of `id`
    pub fn read<C: hecs::Component, R>(&self, id: ObjectId, f: impl FnOnce(&C) -> R) -> Option<R> {
        let entity = self.actor(id)?.entity();
        let world = self.entities.read().unwrap_or_else(|e| e.into_inner());
        world.get::<&C>(entity).ok().map(|c| f(&c))
    }

    /// Mutate one component of `id`
    pub fn update<C: hecs::Component, R>(&self, id: ObjectId, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let entity = self.actor(id)?.entity();
        let world = self.entities.write().unwrap_or_else(|e| e.into_inner());
        world.get::<&mut C>(entity).ok().map(|mut c| f(&mut c))
    }

    fn insert(&self, blueprint: ActorSpec) -> Arc<SandboxActor> {
        let id = ObjectId::new();
        let profile = blueprint.profile.map(Arc::new);
        let entity = {
            let mut world = self.entities.write().unwrap_or_else(|e| e.into_inner());
            let entity = world.spawn((
                Identity {
                    id,
                    name: blueprint.name.clone(),
                    kind: blueprint.kind,
                },
                Placement::at(blueprint.position, blueprint.heading),
                Vitals::new(blueprint.max_hp, blueprint.max_mp),
                Conditions::default(),
                Prowess {
                    power: blueprint.power,
                    attack_speed: blueprint.attack_speed,
                    walk_speed: blueprint.walk_speed,
                    run_speed: blueprint.run_speed,
                },
                Reputation { karma: blueprint.karma },
                Effects::default(),
            ));
            if let Some(profile) = &profile {
                // Freshly spawned; cannot fail
                let _ = world.insert_one(entity, Template(Arc::clone(profile)));
            }
            entity
        };
        let actor = Arc::new(SandboxActor::new(
            ActorFacts {
                id,
                name: blueprint.name,
                kind: blueprint.kind,
                profile,
                owner: blueprint.owner,
                leader: blueprint.leader,
                faction: blueprint.faction,
                collision_radius: blueprint.collision_radius,
                physical_range: blueprint.physical_range,
            },
            entity,
            Arc::clone(&self.entities),
            Arc::clone(&self.clock),
        ));
        self.actors.insert(id, Arc::clone(&actor));
        actor
    }

    fn remove(&self, id: ObjectId) -> bool {
        let Some((_, actor)) = self.actors.remove(&id) else {
            return false;
        };
        self.controllers.remove(&id);
        let mut world = self.entities.write().unwrap_or_else(|e| e.into_inner());
        world.despawn(actor.entity()).is_ok()
    }

    /// Living and dead actors per kind
    pub fn census(&self) -> Census {
        let world = self.entities.read().unwrap_or_else(|e| e.into_inner());
        let mut census = Census::default();
        for (identity, conditions) in world.query::<(&Identity, &Conditions)>().iter() {
            let dead = conditions.0.contains(Status::Dead);
            let slot = match identity.kind {
                CharacterKind::Player => &mut census.players,
                CharacterKind::Summon => &mut census.summons,
                CharacterKind::Npc | CharacterKind::Door => &mut census.npcs,
            };
            if dead {
                slot.1 += 1;
            } else {
                slot.0 += 1;
            }
        }
        census
    }
}

impl KnownObjects for SandboxWorld {
    fn character(&self, id: ObjectId) -> Option<Arc<dyn Character>> {
        self.actor(id).map(|a| a as Arc<dyn Character>)
    }

    /// Nearest first
    fn known_characters_in_radius(&self, actor: &dyn Character, radius: i32) -> Vec<Arc<dyn Character>> {
        let here = actor.position();
        let range = radius.min(self.knowledge_radius) as f64;
        let mut known: Vec<(f64, Arc<SandboxActor>)> = self
            .actors()
            .into_iter()
            .filter(|other| other.id() != actor.id())
            .map(|other| (here.distance_2d(&other.position()), other))
            .filter(|(distance, _)| *distance <= range)
            .collect();
        known.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id().cmp(&b.1.id())));
        known
            .into_iter()
            .map(|(_, other)| other as Arc<dyn Character>)
            .collect()
    }

    fn is_known(&self, actor: &dyn Character, object: ObjectId) -> bool {
        if object == actor.id() {
            return true;
        }
        self.actor(object).is_some_and(|other| {
            actor
                .position()
                .is_within(&other.position(), self.knowledge_radius as f64)
        })
    }

    fn controller(&self, id: ObjectId) -> Option<AiHandle> {
        self.controllers.get(&id).map(|e| e.value().clone())
    }
}

/// Living and dead actor counts, as `(alive, dead)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub players: (usize, usize),
    pub summons: (usize, usize),
    pub npcs: (usize, usize),
}

/// Builder for [`Sandbox`]
pub struct SandboxBuilder {
    config: AiConfig,
    seed: Option<u64>,
    clock: Option<Arc<ManualScheduler>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    terrain: OpenTerrain,
    knowledge_radius: i32,
}

impl Default for SandboxBuilder {
    fn default() -> Self {
        Self {
            config: AiConfig::default(),
            seed: None,
            clock: None,
            scheduler: None,
            terrain: OpenTerrain::unbounded(),
            knowledge_radius: DEFAULT_KNOWLEDGE_RADIUS,
        }
    }
}

impl SandboxBuilder {
    pub fn config(mut self, config: AiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Drive the sandbox from a virtual clock
    pub fn scheduler(mut self, clock: Arc<ManualScheduler>) -> Self {
        self.scheduler = Some(Arc::clone(&clock) as Arc<dyn Scheduler>);
        self.clock = Some(clock);
        self
    }

    /// Drive the sandbox from any scheduler, typically a `TokioScheduler`
    pub fn runtime_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self.clock = None;
        self
    }

    /// Confine walking to a disc
    pub fn arena(mut self, center: Position, radius: i32) -> Self {
        self.terrain = OpenTerrain::bounded(center, radius);
        self
    }

    pub fn knowledge_radius(mut self, radius: i32) -> Self {
        self.knowledge_radius = radius.max(0);
        self
    }

    pub fn build(self) -> Sandbox {
        let (scheduler, clock) = match (self.scheduler, self.clock) {
            (Some(scheduler), clock) => (scheduler, clock),
            (None, _) => {
                let clock = Arc::new(ManualScheduler::new());
                (Arc::clone(&clock) as Arc<dyn Scheduler>, Some(clock))
            }
        };
        let world = Arc::new(SandboxWorld::new(Arc::clone(&scheduler), self.knowledge_radius));
        let terrain = Arc::new(self.terrain);
        let engine = SandboxEngine::new(Arc::downgrade(&world), Arc::clone(&terrain), Arc::clone(&scheduler));
        let client = Arc::new(RecordingClient::new());
        let wiring = Wiring {
            world,
            engine,
            terrain,
            quests: Arc::new(QuestLog::new()),
            scheduler,
            config: self.config,
            seed: self.seed,
        };
        let context = Arc::new(wiring.context(Arc::clone(&client) as Arc<dyn ClientSink>));
        Sandbox {
            wiring,
            client,
            clock,
            context,
        }
    }
}

/// Collaborators shared by every context the sandbox hands out
struct Wiring {
    world: Arc<SandboxWorld>,
    engine: Arc<SandboxEngine>,
    terrain: Arc<OpenTerrain>,
    quests: Arc<QuestLog>,
    scheduler: Arc<dyn Scheduler>,
    config: AiConfig,
    seed: Option<u64>,
}

impl Wiring {
    fn context(&self, client: Arc<dyn ClientSink>) -> AiContext {
        let ctx = AiContext::new(
            self.config.clone(),
            Arc::clone(&self.world) as Arc<dyn KnownObjects>,
            Arc::clone(&self.terrain) as Arc<dyn Geodata>,
            Arc::clone(&self.scheduler),
            Arc::clone(&self.engine) as Arc<dyn Actuator>,
            client,
        )
        .with_quest_hooks(Arc::clone(&self.quests) as Arc<dyn QuestHooks>);
        match self.seed {
            Some(seed) => ctx.with_seed(seed),
            None => ctx,
        }
    }
}

/// A running sandbox world
pub struct Sandbox {
    wiring: Wiring,
    client: Arc<RecordingClient>,
    clock: Option<Arc<ManualScheduler>>,
    context: Arc<AiContext>,
}

impl Sandbox {
    pub fn builder() -> SandboxBuilder {
        SandboxBuilder::default()
    }

    /// The context every sandbox controller runs against
    pub fn context(&self) -> Arc<AiContext> {
        Arc::clone(&self.context)
    }

    /// A fresh context that broadcasts to `client` instead of the recorder
    pub fn context_with_client(&self, client: Arc<dyn ClientSink>) -> AiContext {
        self.wiring.context(client)
    }

    pub fn world(&self) -> &Arc<SandboxWorld> {
        &self.wiring.world
    }

    pub fn engine(&self) -> &Arc<SandboxEngine> {
        &self.wiring.engine
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.wiring.scheduler)
    }

    /// The virtual clock, when the sandbox runs on one
    pub fn clock(&self) -> Option<Arc<ManualScheduler>> {
        self.clock.clone()
    }

    /// Add an actor and attach its default controller.
    ///
    /// NPCs start idle and wake up once a player is around; a player arriving
    /// wakes the idle NPCs that can see it.
    pub fn spawn(&self, blueprint: ActorSpec) -> ObjectId {
        let actor = self.wiring.world.insert(blueprint);
        let id = actor.id();
        let handle = Controller::attach_default(actor.clone() as Arc<dyn Character>, self.context());
        self.wiring.world.controllers.insert(id, handle.clone());
        tracing::debug!(actor = %id, name = %actor.name(), kind = ?actor.kind(), "Spawned");

        match actor.kind() {
            CharacterKind::Npc => handle.set_intention(Intention::Idle),
            CharacterKind::Player => self.wake_neighbours(actor.as_ref()),
            CharacterKind::Summon | CharacterKind::Door => {}
        }
        id
    }

    /// Activate idle NPCs that know about `player`
    fn wake_neighbours(&self, player: &dyn Character) {
        let sleepers: Vec<AiHandle> = self
            .wiring
            .world
            .known_characters(player)
            .into_iter()
            .filter(|c| c.is_npc() && !c.is_alike_dead())
            .filter_map(|c| self.wiring.world.controller(c.id()))
            .collect();
        for handle in sleepers {
            if handle.intention() == Intention::Idle {
                handle.set_intention(Intention::Active);
            }
        }
    }

    /// Remove an actor; its controller is detached and sees no further events
    pub fn despawn(&self, id: ObjectId) -> bool {
        if let Some(handle) = self.wiring.world.controller(id) {
            handle.stop_ai_task();
        }
        self.wiring.engine.forget(id);
        self.client.forget(id);
        let removed = self.wiring.world.remove(id);
        if removed {
            tracing::debug!(actor = %id, "Despawned");
        }
        removed
    }

    /// Move an actor instantly; a walk in progress ends where it lands
    pub fn teleport(&self, id: ObjectId, position: Position) {
        let Some(actor) = self.wiring.world.actor(id) else {
            return;
        };
        let was_walking = self.wiring.engine.interrupt_move(id);
        self.wiring.world.update(id, |p: &mut Placement| p.place(position));
        tracing::debug!(actor = %id, to = %position, "Teleported");
        if was_walking {
            if let Some(handle) = self.wiring.world.controller(id) {
                handle.notify_event(Event::Arrived);
            }
        }
        if actor.is_player() {
            self.wake_neighbours(actor.as_ref());
        }
    }

    /// Raise or clear a status flag without telling the controller
    pub fn set_status(&self, id: ObjectId, status: Status, on: bool) {
        self.wiring.world.update(id, |c: &mut Conditions| {
            if on {
                c.0 |= status;
            } else {
                c.0 -= status;
            }
        });
    }

    pub fn set_hp(&self, id: ObjectId, hp: f64) {
        self.wiring.world.update(id, |v: &mut Vitals| v.hp = hp.clamp(0.0, v.max_hp));
    }

    pub fn set_skill_disabled(&self, id: ObjectId, skill: SkillId, disabled: bool) {
        self.wiring.world.update(id, |e: &mut Effects| {
            if disabled {
                e.disabled.insert(skill);
            } else {
                e.disabled.remove(&skill);
            }
        });
    }

    /// Kill an actor the way combat would, telling its controller
    pub fn kill(&self, id: ObjectId) {
        self.wiring.engine.kill(&self.wiring.world, id);
    }

    pub fn character(&self, id: ObjectId) -> Option<Arc<dyn Character>> {
        self.wiring.world.character(id)
    }

    pub fn controller(&self, id: ObjectId) -> Option<AiHandle> {
        self.wiring.world.controller(id)
    }

    /// Every spawned actor id
    pub fn actor_ids(&self) -> Vec<ObjectId> {
        self.wiring.world.actors().iter().map(|a| a.id()).collect()
    }

    pub fn picked_up(&self, id: ObjectId) -> Vec<ObjectId> {
        self.wiring.engine.picked_up(id)
    }

    pub fn interacted(&self, id: ObjectId) -> Vec<ObjectId> {
        self.wiring.engine.interacted(id)
    }

    pub fn notifications(&self, id: ObjectId) -> Vec<Notification> {
        self.client.notifications(id)
    }

    pub fn quest_calls(&self) -> Vec<QuestCall> {
        self.wiring.quests.calls()
    }

    pub fn census(&self) -> Census {
        self.wiring.world.census()
    }

    /// Detach every controller and drop the registries
    pub fn shutdown(&self) {
        let handles: Vec<AiHandle> = self
            .wiring
            .world
            .controllers
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for handle in &handles {
            handle.stop_ai_task();
            self.wiring.engine.halt(handle.id());
        }
        self.wiring.world.controllers.clear();
        self.wiring.world.actors.clear();
        tracing::debug!(controllers = handles.len(), "Sandbox shut down");
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::behavior::BehaviorKind;

    #[test]
    fn test_spawn_attaches_matching_behaviors() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let pet = sandbox.spawn(ActorSpec::summon("Kitten", player, Position::new(20, 0, 0)));
        let wolf = sandbox.spawn(ActorSpec::npc(
            "Wolf",
            NpcProfile::new("wolf", Position::new(100, 0, 0)),
        ));

        let kind = |id| sandbox.controller(id).unwrap().behavior_kind();
        assert_eq!(kind(player), BehaviorKind::PlayerDirected);
        assert_eq!(kind(pet), BehaviorKind::Summon);
        assert_eq!(kind(wolf), BehaviorKind::Autonomous);
        assert!(sandbox.controller(wolf).unwrap().ledger().is_some());
        assert!(sandbox.controller(player).unwrap().ledger().is_none());

        let census = sandbox.census();
        assert_eq!(census.players, (1, 0));
        assert_eq!(census.summons, (1, 0));
        assert_eq!(census.npcs, (1, 0));
    }

    #[test]
    fn test_arriving_player_wakes_npcs() {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let wolf = sandbox.spawn(ActorSpec::npc(
            "Wolf",
            NpcProfile::new("wolf", Position::new(0, 0, 0)).aggressive(300),
        ));
        let handle = sandbox.controller(wolf).unwrap();
        assert_eq!(handle.intention(), Intention::Idle);
        assert!(!handle.has_think_task());

        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(50_000, 0, 0)));
        assert_eq!(handle.intention(), Intention::Idle);

        sandbox.teleport(player, Position::new(2000, 0, 0));
        assert_eq!(handle.intention(), Intention::Active);
        assert!(handle.has_think_task());
    }

    #[test]
    fn test_knowledge_is_sorted_and_bounded() {
        let sandbox = Sandbox::builder().knowledge_radius(1000).build();
        let me = sandbox.spawn(ActorSpec::player("Me", Position::new(0, 0, 0)));
        let far = sandbox.spawn(ActorSpec::player("Far", Position::new(800, 0, 0)));
        let near = sandbox.spawn(ActorSpec::player("Near", Position::new(100, 0, 0)));
        let gone = sandbox.spawn(ActorSpec::player("Gone", Position::new(5000, 0, 0)));

        let actor = sandbox.character(me).unwrap();
        let world = sandbox.world();
        let ids: Vec<ObjectId> = world
            .known_characters(actor.as_ref())
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(ids, vec![near, far]);
        assert!(!world.is_known(actor.as_ref(), gone));
        assert!(world.is_known(actor.as_ref(), me));
        assert_eq!(world.known_characters_in_radius(actor.as_ref(), 200).len(), 1);
    }

    #[test]
    fn test_walk_arrives_on_the_clock() {
        let clock = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder().scheduler(Arc::clone(&clock)).build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        // Walking speed is 80 units per second
        handle.set_intention(Intention::MoveTo(Position::new(160, 0, 0)));
        clock.advance(Duration::from_secs(1));
        assert_eq!(sandbox.character(id).unwrap().position(), Position::new(80, 0, 0));
        assert!(handle.is_moving());

        clock.advance(Duration::from_secs(1));
        assert_eq!(sandbox.character(id).unwrap().position(), Position::new(160, 0, 0));
        assert!(!handle.is_moving());
        assert_eq!(handle.intention(), Intention::Active);
    }

    #[test]
    fn test_boundary_blocks_walk() {
        let clock = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .scheduler(Arc::clone(&clock))
            .arena(Position::new(0, 0, 0), 100)
            .build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let handle = sandbox.controller(id).unwrap();

        handle.set_intention(Intention::MoveTo(Position::new(400, 0, 0)));
        clock.advance(Duration::from_secs(10));
        assert_eq!(handle.intention(), Intention::Active);
        assert!(!handle.is_moving());
        let stop = sandbox.character(id).unwrap().position();
        assert!(stop.x <= 100 && stop.x > 90, "stopped at {}", stop);
        assert!(sandbox
            .notifications(id)
            .iter()
            .any(|n| matches!(n, Notification::StopMove(_))));
    }

    #[test]
    fn test_swing_damages_and_records_hate() {
        let clock = Arc::new(ManualScheduler::new());
        let sandbox = Sandbox::builder()
            .config(AiConfig::deterministic())
            .scheduler(Arc::clone(&clock))
            .build();
        let wolf = sandbox.spawn(ActorSpec::npc(
            "Wolf",
            NpcProfile::new("wolf", Position::new(30, 0, 0)),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)).with_power(40.0));
        let handle = sandbox.controller(player).unwrap();

        handle.set_intention(Intention::Attack(wolf));
        assert!(handle.is_auto_attacking());
        clock.advance(Duration::from_millis(500));

        let victim = sandbox.character(wolf).unwrap();
        assert!(victim.hp() <= 760.0);
        let npc = sandbox.controller(wolf).unwrap();
        assert!(npc.hating(player) >= 40);
        assert_eq!(npc.intention(), Intention::Attack(player));
    }

    #[test]
    fn test_kill_notifies_controller() {
        let sandbox = Sandbox::builder().build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        sandbox.kill(id);

        let actor = sandbox.character(id).unwrap();
        assert!(actor.is_dead());
        assert_eq!(actor.hp(), 0.0);
        assert!(sandbox.notifications(id).contains(&Notification::Die));
        assert_eq!(sandbox.census().players, (0, 1));
    }

    #[test]
    fn test_despawn_detaches() {
        let sandbox = Sandbox::builder().build();
        let id = sandbox.spawn(ActorSpec::player("Alice", Position::new(0, 0, 0)));
        let actor = sandbox.character(id).unwrap();
        let handle = sandbox.controller(id).unwrap();

        assert!(sandbox.despawn(id));
        assert!(!actor.is_spawned());
        assert!(sandbox.character(id).is_none());
        assert!(sandbox.controller(id).is_none());
        assert!(!handle.is_attached());
        assert!(!sandbox.despawn(id));
    }
}
