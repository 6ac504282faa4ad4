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

//! Hostility ledger: who a hostile NPC hates, and how much
//!
//! Every hostile NPC owns one ledger. Attackers are keyed by their stable
//! [`ObjectId`]; each entry carries saturating hate and damage counters.
//!
//! # Self-healing reads
//!
//! There is no sweep. Whenever an entry is read through [`HostilityLedger::hating`]
//! or scanned by [`HostilityLedger::most_hated`], the attacker is resolved and the
//! entry's hate is zeroed if the attacker is dead-alike, invisible or no longer
//! known to the owner. Entries are physically removed only by [`HostilityLedger::clear`].
//!
//! # Concurrency
//!
//! Entries live in a [`DashMap`], so combat threads may add hate while the
//! owner is thinking. Scans snapshot the keys first and never hold a shard lock
//! while resolving characters.
//!
//! # Global aggro
//!
//! The ledger also carries the owner's global aggro bias. It starts negative on
//! spawn, decays one point per think tick, and is pushed back down when the hate
//! list is exhausted. Target acquisition from the nearby scan only happens once
//! the bias has recovered to zero.

use crate::config::AiConfig;
use crate::world::{AiContext, Character, ObjectId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, Ordering};

/// One attacker's standing in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggroInfo {
    pub attacker: ObjectId,
    pub hate: i64,
    pub damage: i64,
}

impl AggroInfo {
    fn new(attacker: ObjectId) -> Self {
        Self {
            attacker,
            hate: 0,
            damage: 0,
        }
    }

    fn add_hate(&mut self, amount: i64, cap: i64) {
        self.hate = self.hate.saturating_add(amount).clamp(0, cap);
    }

    fn add_damage(&mut self, amount: i64, cap: i64) {
        self.damage = self.damage.saturating_add(amount).clamp(0, cap);
    }
}

/// Side effects a ledger mutation asks the owner's controller to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerSignal {
    /// Nothing for the controller to do
    Unchanged,
    /// Total hate went from zero to positive; an idle owner should become active
    BecameHateful,
    /// No hateful entry remains; the owner should give up and patrol
    Exhausted,
}

/// Per-NPC hate tracking
#[derive(Debug)]
pub struct HostilityLedger {
    owner: ObjectId,
    entries: DashMap<ObjectId, AggroInfo>,
    global_aggro: AtomicI32,
    cap: i64,
    exhausted_bias: i32,
}

impl HostilityLedger {
    pub fn new(owner: ObjectId, config: &AiConfig) -> Self {
        Self {
            owner,
            entries: DashMap::new(),
            global_aggro: AtomicI32::new(config.spawn_aggro_bias),
            cap: config.hate_cap.max(1),
            exhausted_bias: config.exhausted_aggro_bias,
        }
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, attacker: ObjectId) -> bool {
        self.entries.contains_key(&attacker)
    }

    /// Raw entry, without self-healing
    pub fn entry(&self, attacker: ObjectId) -> Option<AggroInfo> {
        self.entries.get(&attacker).map(|e| *e.value())
    }

    fn raw_total_hate(&self) -> i64 {
        self.entries
            .iter()
            .fold(0i64, |acc, e| acc.saturating_add(e.value().hate))
    }

    /// Create or update the entry for `attacker`
    ///
    /// Zero hate from an attacker with no controlling player is raised to one so
    /// the entry can ever promote the owner out of idle. Zero hate from a
    /// player-controlled attacker notifies the aggro-range quest hook instead.
    pub fn add_damage_hate(
        &self,
        ctx: &AiContext,
        attacker: &dyn Character,
        damage: i64,
        hate: i64,
    ) -> LedgerSignal {
        let mut hate = hate.max(0);
        if hate == 0 {
            if attacker.acting_player().is_some() {
                ctx.quests.on_aggro_range_enter(self.owner, attacker.id());
            } else {
                hate = 1;
            }
        }

        let before = self.raw_total_hate();
        {
            let mut entry = self
                .entries
                .entry(attacker.id())
                .or_insert_with(|| AggroInfo::new(attacker.id()));
            entry.add_damage(damage.max(0), self.cap);
            entry.add_hate(hate, self.cap);
        }

        if before == 0 && hate > 0 {
            tracing::trace!(owner = %self.owner, attacker = %attacker.id(), hate, "Ledger became hateful");
            LedgerSignal::BecameHateful
        } else {
            LedgerSignal::Unchanged
        }
    }

    /// Current hate toward `attacker`, zeroing the entry first if the attacker
    /// has become an invalid target
    pub fn hating(&self, ctx: &AiContext, owner: &dyn Character, attacker: ObjectId) -> i64 {
        let hate = match self.entries.get(&attacker) {
            Some(entry) => entry.hate,
            None => return 0,
        };
        if hate == 0 {
            return 0;
        }

        let valid = match ctx.world.character(attacker) {
            Some(character) => {
                !character.is_alike_dead()
                    && character.is_visible()
                    && ctx.world.is_known(owner, attacker)
            }
            None => false,
        };

        if valid {
            hate
        } else {
            if let Some(mut entry) = self.entries.get_mut(&attacker) {
                entry.hate = 0;
            }
            tracing::trace!(owner = %self.owner, attacker = %attacker, "Zeroed stale ledger entry");
            0
        }
    }

    /// Attacker with strictly the greatest healed hate
    pub fn most_hated(&self, ctx: &AiContext, owner: &dyn Character) -> Option<ObjectId> {
        if owner.is_alike_dead() || self.entries.is_empty() {
            return None;
        }
        let ids: Vec<ObjectId> = self.entries.iter().map(|e| *e.key()).collect();
        let mut best: Option<(ObjectId, i64)> = None;
        for id in ids {
            let hate = self.hating(ctx, owner, id);
            if hate > best.map_or(0, |(_, h)| h) {
                best = Some((id, hate));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Every attacker with positive healed hate, most hated first
    pub fn hateful_targets(&self, ctx: &AiContext, owner: &dyn Character) -> Vec<ObjectId> {
        let ids: Vec<ObjectId> = self.entries.iter().map(|e| *e.key()).collect();
        let mut scored: Vec<(ObjectId, i64)> = ids
            .into_iter()
            .map(|id| (id, self.hating(ctx, owner, id)))
            .filter(|(_, hate)| *hate > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Snapshot of every entry, most hated first
    pub fn hate_list(&self) -> Vec<AggroInfo> {
        let mut list: Vec<AggroInfo> = self.entries.iter().map(|e| *e.value()).collect();
        list.sort_by(|a, b| b.hate.cmp(&a.hate).then(b.damage.cmp(&a.damage)));
        list
    }

    /// Attacker that dealt the most damage; used for reward distribution
    pub fn top_damage_dealer(&self) -> Option<ObjectId> {
        self.entries
            .iter()
            .filter(|e| e.value().damage > 0)
            .max_by_key(|e| e.value().damage)
            .map(|e| *e.key())
    }

    /// Subtract hate from one attacker, or from everyone when `target` is `None`
    ///
    /// Returns [`LedgerSignal::Exhausted`] when no hateful entry is left; the
    /// ledger has then already cleared itself and suppressed the global aggro.
    pub fn reduce_hate(
        &self,
        ctx: &AiContext,
        owner: &dyn Character,
        target: Option<ObjectId>,
        amount: i64,
    ) -> LedgerSignal {
        let amount = amount.max(0);
        match target {
            None => {
                let Some(most_hated) = self.most_hated(ctx, owner) else {
                    self.set_global_aggro(self.exhausted_bias);
                    return LedgerSignal::Unchanged;
                };
                for mut entry in self.entries.iter_mut() {
                    entry.add_hate(-amount, self.cap);
                }
                if self.hating(ctx, owner, most_hated) <= 0 {
                    self.exhaust();
                    return LedgerSignal::Exhausted;
                }
                LedgerSignal::Unchanged
            }
            Some(target) => {
                let remaining = match self.entries.get_mut(&target) {
                    Some(mut entry) => {
                        entry.add_hate(-amount, self.cap);
                        entry.hate
                    }
                    None => return LedgerSignal::Unchanged,
                };
                if remaining <= 0 && self.most_hated(ctx, owner).is_none() {
                    self.exhaust();
                    return LedgerSignal::Exhausted;
                }
                LedgerSignal::Unchanged
            }
        }
    }

    fn exhaust(&self) {
        self.set_global_aggro(self.exhausted_bias);
        self.entries.clear();
        tracing::debug!(owner = %self.owner, "Hate list exhausted");
    }

    /// Zero an attacker's hate; the entry itself stays
    pub fn stop_hating(&self, target: ObjectId) {
        if let Some(mut entry) = self.entries.get_mut(&target) {
            entry.hate = 0;
        }
    }

    /// Move `hate` onto `target`, creating its entry if needed
    pub fn set_hate(&self, target: ObjectId, hate: i64) {
        let mut entry = self
            .entries
            .entry(target)
            .or_insert_with(|| AggroInfo::new(target));
        entry.hate = hate.clamp(0, self.cap);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn global_aggro(&self) -> i32 {
        self.global_aggro.load(Ordering::SeqCst)
    }

    pub fn set_global_aggro(&self, value: i32) {
        self.global_aggro.store(value, Ordering::SeqCst);
    }

    /// Move the global aggro one point toward zero; returns the new value
    pub fn decay_global_aggro(&self) -> i32 {
        let mut current = self.global_aggro.load(Ordering::SeqCst);
        loop {
            let next = current - current.signum();
            match self.global_aggro.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ActorSpec, Sandbox};
    use crate::world::{NpcProfile, Position, Status};

    fn setup() -> (Sandbox, ObjectId, ObjectId, ObjectId) {
        let sandbox = Sandbox::builder().config(AiConfig::deterministic()).build();
        let npc = sandbox.spawn(ActorSpec::npc(
            "Wolf",
            NpcProfile::new("wolf", Position::new(0, 0, 0)).aggressive(500),
        ));
        let player = sandbox.spawn(ActorSpec::player("Alice", Position::new(100, 0, 0)));
        let critter = sandbox.spawn(ActorSpec::npc(
            "Rabbit",
            NpcProfile::new("rabbit", Position::new(50, 0, 0)),
        ));
        (sandbox, npc, player, critter)
    }

    #[test]
    fn test_add_damage_hate_saturates() {
        let (sandbox, npc, player, _) = setup();
        let ctx = sandbox.context();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        let attacker = sandbox.character(player).unwrap();

        for _ in 0..4 {
            ledger.add_damage_hate(&ctx, attacker.as_ref(), i64::MAX / 2, i64::MAX / 2);
        }
        let entry = ledger.entry(player).unwrap();
        assert_eq!(entry.hate, ctx.config.hate_cap);
        assert_eq!(entry.damage, ctx.config.hate_cap);

        ledger.add_damage_hate(&ctx, attacker.as_ref(), -50, -50);
        let entry = ledger.entry(player).unwrap();
        assert!(entry.hate >= 0 && entry.damage >= 0);
        assert_eq!(entry.hate, ctx.config.hate_cap);
    }

    #[test]
    fn test_zero_hate_forced_for_npc_attackers_only() {
        let (sandbox, npc, player, critter) = setup();
        let ctx = sandbox.context();
        let ledger = HostilityLedger::new(npc, &ctx.config);

        let signal = ledger.add_damage_hate(
            &ctx,
            sandbox.character(critter).unwrap().as_ref(),
            0,
            0,
        );
        assert_eq!(signal, LedgerSignal::BecameHateful);
        assert_eq!(ledger.entry(critter).unwrap().hate, 1);

        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 0, 0);
        assert_eq!(ledger.entry(player).unwrap().hate, 0);
    }

    #[test]
    fn test_most_hated_is_strictly_greatest() {
        let (sandbox, npc, player, critter) = setup();
        let ctx = sandbox.context();
        let owner = sandbox.character(npc).unwrap();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        assert_eq!(ledger.most_hated(&ctx, owner.as_ref()), None);

        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 10, 30);
        ledger.add_damage_hate(&ctx, sandbox.character(critter).unwrap().as_ref(), 10, 20);
        assert_eq!(ledger.most_hated(&ctx, owner.as_ref()), Some(player));

        sandbox.set_status(npc, Status::Dead, true);
        assert_eq!(ledger.most_hated(&ctx, owner.as_ref()), None);
    }

    #[test]
    fn test_self_healing_on_invisibility() {
        let (sandbox, npc, player, _) = setup();
        let ctx = sandbox.context();
        let owner = sandbox.character(npc).unwrap();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 10, 40);
        assert_eq!(ledger.hating(&ctx, owner.as_ref(), player), 40);

        sandbox.set_status(player, Status::Invisible, true);
        assert_eq!(ledger.hating(&ctx, owner.as_ref(), player), 0);

        // The entry stays but its hate is gone for good
        sandbox.set_status(player, Status::Invisible, false);
        assert!(ledger.contains(player));
        assert_eq!(ledger.hating(&ctx, owner.as_ref(), player), 0);
    }

    #[test]
    fn test_self_healing_on_leaving_knowledge() {
        let (sandbox, npc, player, _) = setup();
        let ctx = sandbox.context();
        let owner = sandbox.character(npc).unwrap();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 10, 40);

        sandbox.teleport(player, Position::new(100_000, 0, 0));
        assert_eq!(ledger.hating(&ctx, owner.as_ref(), player), 0);
        assert_eq!(ledger.entry(player).unwrap().hate, 0);
    }

    #[test]
    fn test_reduce_hate_targeted_exhausts() {
        let (sandbox, npc, player, _) = setup();
        let ctx = sandbox.context();
        let owner = sandbox.character(npc).unwrap();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        ledger.set_global_aggro(0);
        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 10, 40);

        assert_eq!(
            ledger.reduce_hate(&ctx, owner.as_ref(), Some(player), 10),
            LedgerSignal::Unchanged
        );
        assert_eq!(ledger.entry(player).unwrap().hate, 30);

        assert_eq!(
            ledger.reduce_hate(&ctx, owner.as_ref(), Some(player), 100),
            LedgerSignal::Exhausted
        );
        assert!(ledger.is_empty());
        assert_eq!(ledger.global_aggro(), ctx.config.exhausted_aggro_bias);
    }

    #[test]
    fn test_reduce_hate_untargeted_is_uniform() {
        let (sandbox, npc, player, critter) = setup();
        let ctx = sandbox.context();
        let owner = sandbox.character(npc).unwrap();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 0, 50);
        ledger.add_damage_hate(&ctx, sandbox.character(critter).unwrap().as_ref(), 0, 20);

        assert_eq!(
            ledger.reduce_hate(&ctx, owner.as_ref(), None, 15),
            LedgerSignal::Unchanged
        );
        assert_eq!(ledger.entry(player).unwrap().hate, 35);
        assert_eq!(ledger.entry(critter).unwrap().hate, 5);

        assert_eq!(
            ledger.reduce_hate(&ctx, owner.as_ref(), None, 100),
            LedgerSignal::Exhausted
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_stop_hating_keeps_entry() {
        let (sandbox, npc, player, _) = setup();
        let ctx = sandbox.context();
        let ledger = HostilityLedger::new(npc, &ctx.config);
        ledger.add_damage_hate(&ctx, sandbox.character(player).unwrap().as_ref(), 25, 40);
        ledger.stop_hating(player);

        let entry = ledger.entry(player).unwrap();
        assert_eq!(entry.hate, 0);
        assert_eq!(entry.damage, 25);
        assert_eq!(ledger.top_damage_dealer(), Some(player));

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_global_aggro_decay() {
        let ledger = HostilityLedger::new(ObjectId::new(), &AiConfig::default());
        assert_eq!(ledger.global_aggro(), -10);
        for _ in 0..9 {
            ledger.decay_global_aggro();
        }
        assert_eq!(ledger.decay_global_aggro(), 0);
        assert_eq!(ledger.decay_global_aggro(), 0);

        ledger.set_global_aggro(2);
        assert_eq!(ledger.decay_global_aggro(), 1);
    }

    #[test]
    fn test_concurrent_inserts() {
        let (sandbox, npc, _, _) = setup();
        let ctx = sandbox.context();
        let ledger = std::sync::Arc::new(HostilityLedger::new(npc, &ctx.config));
        let attackers: Vec<ObjectId> = (0..8)
            .map(|i| {
                sandbox.spawn(ActorSpec::player(
                    format!("Raider{}", i),
                    Position::new(10 * i, 0, 0),
                ))
            })
            .collect();

        std::thread::scope(|scope| {
            for &attacker in &attackers {
                let ledger = std::sync::Arc::clone(&ledger);
                let ctx = ctx.clone();
                let character = sandbox.character(attacker).unwrap();
                scope.spawn(move || {
                    for _ in 0..100 {
                        ledger.add_damage_hate(&ctx, character.as_ref(), 1, 1);
                    }
                });
            }
        });

        assert_eq!(ledger.len(), attackers.len());
        for attacker in attackers {
            assert_eq!(ledger.entry(attacker).unwrap().hate, 100);
        }
    }
}
