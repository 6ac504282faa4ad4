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

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wyldlands_ai::ai::Intention;
use wyldlands_ai::config::{Arguments, Configuration, SandboxConfig};
use wyldlands_ai::sandbox::{ActorSpec, Sandbox};
use wyldlands_ai::world::{
    AiType, Character, KnownObjects, NpcProfile, NpcRole, ObjectId, Position, Scheduler, Skill,
    SkillKind, SkillTarget, TokioScheduler,
};

/// Center of the arena
const CENTER: Position = Position::new(0, 0, 0);

/// How often idle players pick a new fight
const COMMAND_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load arguments from the command line
    let arguments: Arguments = Parser::parse();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .with_ansi(true)
        .init();

    // Load environment variables from .env file if specified
    if let Some(ref env_file) = arguments.env_file {
        if std::path::Path::new(env_file).exists() {
            tracing::debug!("Loading environment variables from file: {}", env_file);
            dotenv::from_filename(env_file).ok();
        }
    } else {
        tracing::debug!("Loading environment variables from default file");
        dotenv::dotenv().ok();
    }

    // Load configuration from a file with environment variable substitution
    let config = Configuration::load(&arguments.config_file)?;
    tracing::debug!("Configuration loaded: {:?}", config);
    tracing::info!("Opening arena {}...", config.sandbox.world_name.as_str());

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new());
    let mut builder = Sandbox::builder()
        .config(config.ai.clone())
        .runtime_scheduler(Arc::clone(&scheduler))
        .arena(CENTER, config.sandbox.arena_radius);
    if let Some(seed) = config.sandbox.seed {
        builder = builder.seed(seed);
    }
    let sandbox = builder.build();
    let players = populate(&sandbox, &config.sandbox);
    tracing::info!(
        npcs = config.sandbox.npc_count,
        players = players.len(),
        "Arena populated"
    );

    let mut ticker = tokio::time::interval(COMMAND_INTERVAL);
    let deadline = tokio::time::sleep(Duration::from_secs(config.sandbox.duration_secs));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                command_players(&sandbox, &players);
                report(&sandbox, scheduler.now());
            }
            _ = &mut deadline => {
                tracing::info!("Arena time is up");
                break;
            }
            result = &mut interrupt => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for ctrl-c: {}", e);
                }
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    report(&sandbox, scheduler.now());
    tracing::info!(quest_calls = sandbox.quest_calls().len(), "Closing arena");
    sandbox.shutdown();
    Ok(())
}

/// Spread NPCs on an outer ring and players, each with a pet, on an inner one
fn populate(sandbox: &Sandbox, settings: &SandboxConfig) -> Vec<ObjectId> {
    let outer = settings.arena_radius as f64 * 0.6;
    let inner = settings.arena_radius as f64 * 0.2;

    for index in 0..settings.npc_count {
        let heading = ring_heading(index, settings.npc_count);
        let (name, profile) = roster(index, CENTER.project(heading, outer));
        sandbox.spawn(ActorSpec::npc(name, profile));
    }

    let mut players = Vec::with_capacity(settings.player_count);
    for index in 0..settings.player_count {
        let heading = ring_heading(index, settings.player_count);
        let spot = CENTER.project(heading, inner);
        let player = sandbox.spawn(ActorSpec::player(format!("Hero {}", index + 1), spot).with_power(35.0));
        sandbox.spawn(ActorSpec::summon(
            format!("Familiar {}", index + 1),
            player,
            spot.offset(40, 0),
        ));
        if let Some(handle) = sandbox.controller(player) {
            handle.set_intention(Intention::Active);
        }
        players.push(player);
    }
    for pet in sandbox.actor_ids() {
        if let Some(handle) = sandbox.controller(pet).filter(|h| h.actor().is_summon()) {
            handle.set_intention(Intention::Active);
        }
    }
    players
}

fn ring_heading(index: usize, count: usize) -> u16 {
    ((index as u64 * 65536) / count.max(1) as u64) as u16
}

/// Rotating cast of NPC templates
fn roster(index: usize, spawn: Position) -> (String, NpcProfile) {
    match index % 4 {
        0 => (
            format!("Grey Wolf {}", index / 4 + 1),
            NpcProfile::new("grey_wolf", spawn)
                .aggressive(400)
                .with_clan("pack", 800),
        ),
        1 => (
            format!("Hedge Mage {}", index / 4 + 1),
            NpcProfile::new("hedge_mage", spawn)
                .with_ai_type(AiType::Mage)
                .aggressive(500)
                .with_skill(
                    Skill::new(101, "Fire Bolt", SkillKind::MagicAttack, SkillTarget::One)
                        .with_cast_range(600)
                        .with_mp_cost(20.0)
                        .with_hit_time(800),
                )
                .with_skill(
                    Skill::new(102, "Mend", SkillKind::Heal, SkillTarget::OneSelf)
                        .with_mp_cost(30.0)
                        .with_hit_time(1200),
                ),
        ),
        2 => (
            format!("Gate Guard {}", index / 4 + 1),
            NpcProfile::new("gate_guard", spawn)
                .with_role(NpcRole::Guard)
                .aggressive(600),
        ),
        _ => (
            format!("Cave Brute {}", index / 4 + 1),
            NpcProfile::new("cave_brute", spawn).with_skill(
                Skill::new(103, "Crush", SkillKind::PhysicalAttack, SkillTarget::One)
                    .with_cast_range(40)
                    .with_mp_cost(10.0)
                    .with_hit_time(600),
            ),
        ),
    }
}

/// Send every idle living player after the nearest living NPC
fn command_players(sandbox: &Sandbox, players: &[ObjectId]) {
    for &id in players {
        let (Some(player), Some(handle)) = (sandbox.character(id), sandbox.controller(id)) else {
            continue;
        };
        if player.is_alike_dead() {
            continue;
        }
        let engaged = handle
            .attack_target()
            .and_then(|target| sandbox.character(target))
            .is_some_and(|target| !target.is_alike_dead());
        if engaged {
            continue;
        }
        let prey = sandbox
            .world()
            .known_characters(player.as_ref())
            .into_iter()
            .find(|c| c.is_npc() && !c.is_alike_dead());
        if let Some(prey) = prey {
            tracing::info!(player = %player.name(), target = %prey.name(), "Player engaging");
            handle.set_intention(Intention::Attack(prey.id()));
        }
    }
}

fn report(sandbox: &Sandbox, elapsed: Duration) {
    let census = sandbox.census();
    tracing::info!(
        elapsed = ?elapsed,
        players = census.players.0,
        summons = census.summons.0,
        npcs = census.npcs.0,
        fallen = census.players.1 + census.summons.1 + census.npcs.1,
        "Arena status"
    );
    for id in sandbox.actor_ids() {
        if let (Some(actor), Some(handle)) = (sandbox.character(id), sandbox.controller(id)) {
            tracing::debug!(
                name = %actor.name(),
                hp = actor.hp(),
                intention = ?handle.intention().kind(),
                "Actor"
            );
        }
    }
}
