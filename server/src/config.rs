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

use crate::ai::error::AiError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "server/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "server/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, AiError> {
        let conf = serde_yaml::from_reader(
            std::fs::File::open(path)
                .map_err(|e| AiError::Config(format!("Failed to open config file: {}", e)))?,
        )
        .map_err(|e| AiError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(conf)
    }
}

/// Tuning table for every controller.
///
/// Values are copied from long-running live tuning; treat them as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Period of the autonomous think tick
    pub think_interval_ms: u64,
    /// Follow re-evaluation period
    pub follow_interval_ms: u64,
    /// Follow re-evaluation period while attacking
    pub follow_attack_interval_ms: u64,
    /// Summon avoid tick period
    pub avoid_interval_ms: u64,
    /// Distance a summon steps aside when avoiding
    pub avoid_radius: i32,

    /// Global aggro bias on spawn; one point decays per think tick
    pub spawn_aggro_bias: i32,
    /// Global aggro bias after the hate list is exhausted
    pub exhausted_aggro_bias: i32,
    /// Engagement timeout before a non-aggressive NPC gives up
    pub attack_timeout_ms: u64,

    /// Hate and damage saturation cap
    pub hate_cap: i64,
    /// Minimum hate transferred onto a reconsidered target
    pub reconsider_hate_floor: i64,

    /// One in `random_walk_rate` idle ticks wanders or self-buffs
    pub random_walk_rate: u32,
    /// How far an idle NPC may drift from its spawn point
    pub max_drift_range: i32,
    /// How far a fighting NPC may chase before walking home
    pub leash_range: i32,
    /// Distance a minion keeps from its leader
    pub minion_follow_offset: i32,

    /// Per-tick chance a melee archetype tries a skill
    pub melee_skill_chance: f64,
    /// Chance a debuff is tried when one is available
    pub debuff_chance: f64,
    /// Chance of a lateral step to avoid attacker stacking
    pub reposition_chance: f64,
    /// Chance an archer flees a target in melee range
    pub archer_flee_chance: f64,
    /// Chance a confused NPC keeps an area skill
    pub confused_area_chance: f64,
    /// HP ratio under which a suicide skill is considered
    pub suicide_hp_ratio: f64,
    /// HP ratio under which heals are considered
    pub heal_hp_ratio: f64,
    /// Distance a ranged archetype flees
    pub flee_distance: i32,
    /// Distance a feared actor runs
    pub fear_distance: i32,

    /// Ticks a raid-tier NPC fights before chaos re-targeting is rolled
    pub chaos_threshold: u32,

    /// Skills with a longer hit time abort an in-progress swing
    pub cast_abort_hit_threshold_ms: u64,

    /// Upper bound on queued follow-up stimuli per controller call
    pub max_dispatch_depth: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            think_interval_ms: 1000,
            follow_interval_ms: 1000,
            follow_attack_interval_ms: 500,
            avoid_interval_ms: 100,
            avoid_radius: 70,
            spawn_aggro_bias: -10,
            exhausted_aggro_bias: -25,
            attack_timeout_ms: 120_000,
            hate_cap: 999_999_999,
            reconsider_hate_floor: 2000,
            random_walk_rate: 30,
            max_drift_range: 300,
            leash_range: 3000,
            minion_follow_offset: 200,
            melee_skill_chance: 0.10,
            debuff_chance: 0.10,
            reposition_chance: 0.03,
            archer_flee_chance: 0.25,
            confused_area_chance: 1.0 / 3.0,
            suicide_hp_ratio: 0.15,
            heal_hp_ratio: 0.5,
            flee_distance: 300,
            fear_distance: 500,
            chaos_threshold: 10,
            cast_abort_hit_threshold_ms: 50,
            max_dispatch_depth: 64,
        }
    }
}

impl AiConfig {
    pub fn think_interval(&self) -> Duration {
        Duration::from_millis(self.think_interval_ms)
    }

    pub fn follow_interval(&self, attacking: bool) -> Duration {
        Duration::from_millis(if attacking {
            self.follow_attack_interval_ms
        } else {
            self.follow_interval_ms
        })
    }

    pub fn avoid_interval(&self) -> Duration {
        Duration::from_millis(self.avoid_interval_ms)
    }

    pub fn attack_timeout(&self) -> Duration {
        Duration::from_millis(self.attack_timeout_ms)
    }

    /// Table with every probability forced to zero; used to make tests deterministic
    pub fn deterministic() -> Self {
        Self {
            random_walk_rate: 0,
            melee_skill_chance: 0.0,
            debuff_chance: 0.0,
            reposition_chance: 0.0,
            archer_flee_chance: 0.0,
            confused_area_chance: 0.0,
            ..Self::default()
        }
    }
}

/// Sandbox arena settings used by the binary
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub world_name: EnvField<String>,
    pub duration_secs: u64,
    pub npc_count: usize,
    pub player_count: usize,
    pub arena_radius: i32,
    pub seed: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            world_name: EnvField::from("Sandbox".to_string()),
            duration_secs: 30,
            npc_count: 6,
            player_count: 2,
            arena_radius: 1500,
            seed: None,
        }
    }
}
