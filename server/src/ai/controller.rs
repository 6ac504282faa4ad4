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

//! Per-actor controller
//!
//! A [`Controller`] owns one actor's current [`Intention`], its target
//! references, its client-visible movement and attack-stance flags and its
//! timers. Stimuli arrive through [`Controller::set_intention`] and
//! [`Controller::notify_event`] and are handed to the actor's [`Behavior`].
//!
//! # Serialization
//!
//! Every controller lives behind a mutex ([`SharedController`]), so two
//! stimuli for the same actor never interleave. Hooks never lock anything:
//!
//! - Follow-up stimuli raised inside a hook are queued on the
//!   [`ControllerCore`] and drained, in order, before the outer call returns.
//! - Stimuli for *other* actors are delivered through the scheduler with a
//!   zero delay, so no controller ever waits on another.
//!
//! # Timers
//!
//! Each controller owns at most one think task, one follow task and one avoid
//! task. Starting any of them cancels the previous handle in that slot first.
//! Ticks reach the controller through a weak reference and run under
//! `catch_unwind`; a panicking tick is logged and the busy flags are cleared.

use crate::ai::behavior::{self, Behavior, BehaviorKind};
use crate::ai::error::{AiError, AiResult};
use crate::ai::intention::{DeferredAction, Event, Intention};
use crate::ai::ledger::{AggroInfo, HostilityLedger, LedgerSignal};
use crate::config::AiConfig;
use crate::world::{AiContext, Character, ObjectId, Position, Skill, TaskHandle};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::Duration;

/// Distance kept from a followed character when no range is given
pub const DEFAULT_FOLLOW_RANGE: i32 = 70;

/// A followed character further than this is given up on
const FOLLOW_LOST_RANGE: f64 = 3000.0;

/// A pawn further than this is given up on while approaching it
const PAWN_LOST_RANGE: f64 = 2000.0;

/// Extra reach allowed while a follow task is chasing a moving pawn
const MOVING_PAWN_SLACK: i32 = 100;

/// A controller behind its lock
pub type SharedController = Arc<Mutex<Controller>>;

/// Queued stimulus
#[derive(Debug, Clone, PartialEq)]
enum Stimulus {
    Intention(Intention),
    Event(Event),
}

/// Periodic callbacks a controller may own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Think,
    Follow,
    Avoid,
}

/// State shared by every behavior: the part of a controller hooks may touch
pub struct ControllerCore {
    actor: Arc<dyn Character>,
    ctx: Arc<AiContext>,
    this: Weak<Mutex<Controller>>,
    ledger: Option<Arc<HostilityLedger>>,

    intention: Intention,
    target: Option<ObjectId>,
    attack_target: Option<ObjectId>,
    cast_target: Option<ObjectId>,
    follow_target: Option<ObjectId>,
    follow_range: Option<i32>,
    skill: Option<Skill>,

    client_moving: bool,
    moving_to_pawn: Option<(ObjectId, i32)>,
    client_auto_attacking: bool,
    route: VecDeque<Position>,

    follow_task: Option<TaskHandle>,
    think_task: Option<TaskHandle>,
    avoid_task: Option<TaskHandle>,
    thinking: bool,

    deferred: Option<DeferredAction>,
    pending: VecDeque<Stimulus>,
    attached: bool,
}

impl ControllerCore {
    fn new(
        actor: Arc<dyn Character>,
        ctx: Arc<AiContext>,
        this: Weak<Mutex<Controller>>,
        ledger: Option<Arc<HostilityLedger>>,
    ) -> Self {
        Self {
            actor,
            ctx,
            this,
            ledger,
            intention: Intention::Idle,
            target: None,
            attack_target: None,
            cast_target: None,
            follow_target: None,
            follow_range: None,
            skill: None,
            client_moving: false,
            moving_to_pawn: None,
            client_auto_attacking: false,
            route: VecDeque::new(),
            follow_task: None,
            think_task: None,
            avoid_task: None,
            thinking: false,
            deferred: None,
            pending: VecDeque::new(),
            attached: true,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.actor.id()
    }

    pub fn actor(&self) -> &Arc<dyn Character> {
        &self.actor
    }

    pub fn ctx(&self) -> &Arc<AiContext> {
        &self.ctx
    }

    pub fn config(&self) -> &AiConfig {
        &self.ctx.config
    }

    pub fn ledger(&self) -> Option<&Arc<HostilityLedger>> {
        self.ledger.as_ref()
    }

    pub fn intention(&self) -> &Intention {
        &self.intention
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Resolve any character by id
    pub fn resolve(&self, id: ObjectId) -> Option<Arc<dyn Character>> {
        self.ctx.world.character(id)
    }

    /// Resolve a reference, treating dead-alike, invisible and unknown
    /// characters as gone
    pub fn resolve_live(&self, id: ObjectId) -> Option<Arc<dyn Character>> {
        if id == self.id() {
            return Some(Arc::clone(&self.actor));
        }
        self.resolve(id).filter(|c| {
            !c.is_alike_dead() && c.is_visible() && self.ctx.world.is_known(self.actor.as_ref(), id)
        })
    }

    /// Commit a new intention without dispatching it
    pub fn change_intention(&mut self, intention: Intention) {
        if self.intention != intention {
            tracing::debug!(
                actor = %self.id(),
                from = ?self.intention.kind(),
                to = ?intention.kind(),
                "Intention changed"
            );
            metrics::counter!("ai.intention_changes").increment(1);
        }
        self.intention = intention;
    }

    /// Queue an intention change for dispatch after the current hook
    pub fn set_intention(&mut self, intention: Intention) {
        self.pending.push_back(Stimulus::Intention(intention));
    }

    /// Queue an event for dispatch after the current hook
    pub fn notify_event(&mut self, event: Event) {
        self.pending.push_back(Stimulus::Event(event));
    }

    pub fn target(&self) -> Option<ObjectId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<ObjectId>) {
        self.target = target;
    }

    pub fn attack_target(&self) -> Option<ObjectId> {
        self.attack_target
    }

    pub fn set_attack_target(&mut self, target: Option<ObjectId>) {
        self.attack_target = target;
    }

    pub fn cast_target(&self) -> Option<ObjectId> {
        self.cast_target
    }

    pub fn set_cast_target(&mut self, target: Option<ObjectId>) {
        self.cast_target = target;
    }

    pub fn follow_target(&self) -> Option<ObjectId> {
        self.follow_target
    }

    pub fn skill(&self) -> Option<&Skill> {
        self.skill.as_ref()
    }

    pub fn set_skill(&mut self, skill: Option<Skill>) {
        self.skill = skill;
    }

    /// Drop the selected, attack and cast targets
    pub fn clear_targets(&mut self) {
        self.target = None;
        self.attack_target = None;
        self.cast_target = None;
    }

    /// Arm the single deferred action, replacing any previous one
    pub fn set_deferred(&mut self, action: DeferredAction) {
        if let Some(previous) = self.deferred.replace(action) {
            tracing::trace!(actor = %self.id(), replaced = ?previous, "Deferred action replaced");
        }
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    pub fn clear_deferred(&mut self) {
        self.deferred = None;
    }

    // ---------------------------------------------------------------------
    // Movement
    // ---------------------------------------------------------------------

    /// Whether the client believes the actor is moving
    pub fn is_moving(&self) -> bool {
        self.client_moving
    }

    pub fn route(&self) -> &VecDeque<Position> {
        &self.route
    }

    pub fn clear_route(&mut self) {
        self.route.clear();
    }

    /// Start moving toward `destination`; returns false when movement is disabled
    pub fn move_to(&mut self, destination: Position) -> bool {
        if self.actor.is_movement_disabled() {
            self.client_action_failed();
            return false;
        }
        self.client_moving = true;
        self.moving_to_pawn = None;
        self.ctx.actuator.move_to(self.actor.as_ref(), destination);
        self.ctx.client.move_to_location(self.id(), destination);
        true
    }

    /// Start moving toward another character, stopping `offset` short of it
    pub fn move_to_pawn(&mut self, target: ObjectId, offset: i32) -> bool {
        if self.actor.is_movement_disabled() {
            self.client_action_failed();
            return false;
        }
        let Some(pawn) = self.resolve(target) else {
            return false;
        };
        let destination = self
            .actor
            .position()
            .toward(&pawn.position(), offset.max(0) as f64);
        let broadcast = !(self.client_moving && self.moving_to_pawn == Some((target, offset)));
        self.client_moving = true;
        self.moving_to_pawn = Some((target, offset));
        self.ctx.actuator.move_to(self.actor.as_ref(), destination);
        if broadcast {
            self.ctx.client.move_to_pawn(self.id(), target, offset);
        }
        true
    }

    /// Continue along a multi-point route; false when the route is finished
    pub fn advance_route(&mut self) -> bool {
        match self.route.pop_front() {
            Some(next) => self.move_to(next),
            None => false,
        }
    }

    /// Stop moving, server and client side
    pub fn stop_move(&mut self) {
        self.stop_move_at(None);
    }

    /// Stop moving and tell the client where the actor ended up
    pub fn stop_move_at(&mut self, at: Option<Position>) {
        self.route.clear();
        self.moving_to_pawn = None;
        let was_moving = self.client_moving;
        self.client_moving = false;
        if was_moving {
            self.ctx.actuator.stop_move(self.actor.as_ref());
        }
        if was_moving || at.is_some() {
            let position = at.unwrap_or_else(|| self.actor.position());
            self.ctx.client.stop_move(self.id(), position);
        }
    }

    /// Movement ended on its own; no broadcast needed
    pub fn client_stopped_moving(&mut self) {
        self.client_moving = false;
        self.moving_to_pawn = None;
    }

    /// Approach `target` until within `offset` plus both collision radii.
    ///
    /// Returns true while the actor still has to move, false once it is in
    /// reach. Negative offsets mean "no range requirement".
    pub fn maybe_move_to_pawn(&mut self, target: &dyn Character, offset: i32) -> bool {
        if offset < 0 {
            return false;
        }
        let reach = offset + self.actor.collision_radius() + target.collision_radius();
        let here = self.actor.position();
        let there = target.position();
        if here.is_within(&there, reach as f64) {
            if self.follow_target.is_some() {
                self.stop_follow();
            }
            return false;
        }

        if self.follow_target.is_some() {
            if !here.is_within(&there, PAWN_LOST_RANGE) {
                self.stop_follow();
                self.set_intention(Intention::Idle);
                return true;
            }
            if !here.is_within(&there, (reach + MOVING_PAWN_SLACK) as f64) {
                return true;
            }
            self.stop_follow();
            return false;
        }

        if self.actor.is_movement_disabled() {
            if matches!(self.intention, Intention::Attack(_)) {
                self.set_intention(Intention::Idle);
            }
            return true;
        }

        self.start_follow(target.id(), Some(reach.max(5)));
        self.move_to_pawn(target.id(), reach);
        true
    }

    /// Approach a fixed point until within `offset`; true while moving
    pub fn maybe_move_to_position(&mut self, position: Position, offset: i32) -> bool {
        let here = self.actor.position();
        if here.is_within(&position, offset as f64) {
            return false;
        }
        let destination = here.toward(&position, offset as f64);
        self.move_to(destination)
    }

    // ---------------------------------------------------------------------
    // Client notifications
    // ---------------------------------------------------------------------

    pub fn is_auto_attacking(&self) -> bool {
        self.client_auto_attacking
    }

    pub fn client_start_auto_attack(&mut self) {
        if !self.client_auto_attacking {
            self.client_auto_attacking = true;
            self.ctx.client.auto_attack_start(self.id());
        }
    }

    pub fn client_stop_auto_attack(&mut self) {
        if self.client_auto_attacking {
            self.client_auto_attacking = false;
            self.ctx.client.auto_attack_stop(self.id());
        }
    }

    pub fn client_notify_dead(&mut self) {
        self.client_auto_attacking = false;
        self.client_moving = false;
        self.moving_to_pawn = None;
        self.route.clear();
        self.ctx.client.die(self.id());
    }

    /// Only player-controlled actors are told that an action failed
    pub fn client_action_failed(&self) {
        if self.actor.acting_player().is_some() {
            self.ctx.client.action_failed(self.id());
        }
    }

    // ---------------------------------------------------------------------
    // Timers
    // ---------------------------------------------------------------------

    fn schedule_tick(&self, kind: TickKind, initial: Duration, period: Duration) -> TaskHandle {
        let controller = self.this.clone();
        self.ctx.scheduler.schedule_repeating(
            initial,
            period,
            Box::new(move || {
                if let Some(shared) = controller.upgrade() {
                    let mut controller = shared.lock().unwrap_or_else(|e| e.into_inner());
                    controller.run_tick(kind);
                }
            }),
        )
    }

    /// Begin following `target`, replacing any running follow task
    pub fn start_follow(&mut self, target: ObjectId, range: Option<i32>) {
        if let Some(previous) = self.follow_task.take() {
            previous.cancel();
        }
        let attacking = range.is_some() || matches!(self.intention, Intention::Attack(_));
        let period = self.ctx.config.follow_interval(attacking);
        self.follow_target = Some(target);
        self.follow_range = range;
        self.follow_task = Some(self.schedule_tick(TickKind::Follow, Duration::ZERO, period));
        tracing::trace!(actor = %self.id(), target = %target, ?range, "Follow started");
    }

    /// Cancel the follow task and forget the follow target
    pub fn stop_follow(&mut self) {
        if let Some(task) = self.follow_task.take() {
            task.cancel();
            tracing::trace!(actor = %self.id(), "Follow stopped");
        }
        self.follow_target = None;
        self.follow_range = None;
    }

    pub fn is_following(&self) -> bool {
        self.follow_task.is_some()
    }

    fn follow_tick(&mut self) -> AiResult<()> {
        if self.follow_task.is_none() {
            return Ok(());
        }
        let range = self.follow_range.unwrap_or(DEFAULT_FOLLOW_RANGE);
        let Some(target) = self.follow_target.and_then(|id| self.resolve(id)) else {
            self.stop_follow();
            self.set_intention(Intention::Idle);
            return Ok(());
        };

        let here = self.actor.position();
        let there = target.position();
        if !here.is_within(&there, range as f64) {
            if !here.is_within(&there, FOLLOW_LOST_RANGE) {
                tracing::debug!(actor = %self.id(), target = %target.id(), "Follow target out of reach");
                self.stop_follow();
                self.set_intention(Intention::Idle);
                return Ok(());
            }
            self.move_to_pawn(target.id(), range);
        }
        Ok(())
    }

    /// Install the periodic think task, replacing any existing one
    pub fn start_think_task(&mut self) {
        if let Some(previous) = self.think_task.take() {
            previous.cancel();
        }
        let period = self.ctx.config.think_interval();
        self.think_task = Some(self.schedule_tick(TickKind::Think, period, period));
    }

    pub fn stop_think_task(&mut self) {
        if let Some(task) = self.think_task.take() {
            task.cancel();
        }
    }

    pub fn has_think_task(&self) -> bool {
        self.think_task.is_some()
    }

    /// Install the periodic avoid task, replacing any existing one
    pub fn start_avoid_task(&mut self) {
        if let Some(previous) = self.avoid_task.take() {
            previous.cancel();
        }
        let period = self.ctx.config.avoid_interval();
        self.avoid_task = Some(self.schedule_tick(TickKind::Avoid, period, period));
    }

    pub fn stop_avoid_task(&mut self) {
        if let Some(task) = self.avoid_task.take() {
            task.cancel();
        }
    }

    pub fn has_avoid_task(&self) -> bool {
        self.avoid_task.is_some()
    }

    /// Claim the thinking flag; false drops an overlapping think
    pub fn begin_thinking(&mut self) -> bool {
        if self.thinking {
            metrics::counter!("ai.dropped_ticks").increment(1);
            tracing::trace!(actor = %self.id(), "Overlapping think dropped");
            return false;
        }
        self.thinking = true;
        true
    }

    pub fn end_thinking(&mut self) {
        self.thinking = false;
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    // ---------------------------------------------------------------------
    // Other actors
    // ---------------------------------------------------------------------

    /// Deliver an event to another actor on the scheduler
    pub fn notify_other(&self, target: ObjectId, event: Event) {
        self.notify_other_if(target, event, |_| true);
    }

    /// Deliver an event to another actor if its intention passes `guard` on arrival
    pub fn notify_other_if(&self, target: ObjectId, event: Event, guard: fn(&Intention) -> bool) {
        let world = Arc::clone(&self.ctx.world);
        self.ctx.scheduler.schedule_once(
            Duration::ZERO,
            Box::new(move || {
                if let Some(handle) = world.controller(target) {
                    handle.notify_event_if(guard, event);
                }
            }),
        );
    }

    // ---------------------------------------------------------------------
    // Hostility
    // ---------------------------------------------------------------------

    /// Most hated attacker in this actor's ledger
    pub fn most_hated(&self) -> Option<ObjectId> {
        self.ledger
            .as_ref()
            .and_then(|ledger| ledger.most_hated(&self.ctx, self.actor.as_ref()))
    }

    /// Healed hate toward `attacker`
    pub fn hating(&self, attacker: ObjectId) -> i64 {
        self.ledger
            .as_ref()
            .map_or(0, |ledger| ledger.hating(&self.ctx, self.actor.as_ref(), attacker))
    }

    /// Add to this actor's own ledger and apply the outcome
    pub fn add_damage_hate(&mut self, attacker: &dyn Character, damage: i64, hate: i64) {
        let Some(ledger) = self.ledger.clone() else {
            return;
        };
        let signal = ledger.add_damage_hate(&self.ctx, attacker, damage, hate);
        self.apply_ledger_signal(signal);
    }

    /// Translate a ledger outcome into intentions
    pub fn apply_ledger_signal(&mut self, signal: LedgerSignal) {
        match signal {
            LedgerSignal::Unchanged => {}
            LedgerSignal::BecameHateful => {
                if self.intention == Intention::Idle {
                    self.set_intention(Intention::Active);
                }
            }
            LedgerSignal::Exhausted => {
                self.attack_target = None;
                self.target = None;
                self.actor.set_running(false);
                if self.intention != Intention::Active {
                    self.set_intention(Intention::Active);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Failure handling
    // ---------------------------------------------------------------------

    fn absorb(&mut self, err: AiError) {
        if err.is_user_visible() {
            tracing::debug!(actor = %self.id(), error = %err, "Action rejected");
            self.client_action_failed();
            return;
        }
        match err {
            AiError::StaleReference(id) => {
                tracing::debug!(actor = %self.id(), target = %id, "Target lost");
                if self.target == Some(id) {
                    self.target = None;
                }
                if self.attack_target == Some(id) {
                    self.attack_target = None;
                }
                if self.cast_target == Some(id) {
                    self.cast_target = None;
                    self.skill = None;
                }
                if self.follow_target == Some(id) {
                    self.stop_follow();
                }
                if !matches!(self.intention, Intention::Idle | Intention::Active) {
                    self.set_intention(Intention::Active);
                }
            }
            AiError::Detached => {
                tracing::trace!(actor = %self.id(), "Stimulus for detached controller ignored");
            }
            other => {
                tracing::error!(actor = %self.id(), error = %other, "Controller failure");
                metrics::counter!("ai.task_failures").increment(1);
            }
        }
    }

    fn recover_busy_flags(&mut self) {
        self.thinking = false;
        self.pending.clear();
        if self.actor.is_casting_now() {
            self.ctx.actuator.abort_cast(self.actor.as_ref());
        }
        self.skill = None;
        self.cast_target = None;
    }
}

/// Controller: shared state plus the archetype behavior driving it
pub struct Controller {
    core: ControllerCore,
    behavior: Box<dyn Behavior>,
}

impl Controller {
    /// Build a controller for `actor` with the behavior matching its kind
    pub fn attach_default(actor: Arc<dyn Character>, ctx: Arc<AiContext>) -> AiHandle {
        let behavior = behavior::for_character(actor.as_ref());
        Self::attach(actor, ctx, behavior)
    }

    /// Build a controller for `actor` driven by `behavior`
    pub fn attach(
        actor: Arc<dyn Character>,
        ctx: Arc<AiContext>,
        behavior: Box<dyn Behavior>,
    ) -> AiHandle {
        let ledger = actor
            .npc()
            .map(|_| Arc::new(HostilityLedger::new(actor.id(), &ctx.config)));
        let kind = behavior.kind();
        let controller = Arc::new_cyclic(|this| {
            Mutex::new(Controller {
                core: ControllerCore::new(
                    Arc::clone(&actor),
                    Arc::clone(&ctx),
                    this.clone(),
                    ledger.clone(),
                ),
                behavior,
            })
        });
        tracing::debug!(actor = %actor.id(), behavior = ?kind, "Controller attached");
        AiHandle {
            actor,
            controller,
            ledger,
            ctx,
        }
    }

    pub fn core(&self) -> &ControllerCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut ControllerCore {
        &mut self.core
    }

    pub fn behavior_kind(&self) -> BehaviorKind {
        self.behavior.kind()
    }

    pub fn set_intention(&mut self, intention: Intention) {
        self.core.pending.push_back(Stimulus::Intention(intention));
        self.drain();
    }

    pub fn notify_event(&mut self, event: Event) {
        self.core.pending.push_back(Stimulus::Event(event));
        self.drain();
    }

    pub fn apply_ledger_signal(&mut self, signal: LedgerSignal) {
        self.core.apply_ledger_signal(signal);
        self.drain();
    }

    pub fn set_next_intention(&mut self, intention: Intention) {
        self.behavior.set_next_intention(intention);
    }

    pub fn next_intention(&self) -> Option<Intention> {
        self.behavior.next_intention().cloned()
    }

    pub fn set_follow_status(&mut self, follow: bool) {
        let result = self.behavior.set_follow_status(&mut self.core, follow);
        if let Err(err) = result {
            self.core.absorb(err);
        }
        self.drain();
    }

    /// Cancel every timer and stop reacting to stimuli
    pub fn stop_ai_task(&mut self) {
        self.core.stop_follow();
        self.core.stop_think_task();
        self.core.stop_avoid_task();
        self.core.deferred = None;
        self.core.pending.clear();
        self.core.thinking = false;
        self.behavior.on_detach(&mut self.core);
        self.core.attached = false;
        tracing::debug!(actor = %self.core.id(), "Controller detached");
    }

    fn drain(&mut self) {
        let limit = self.core.ctx.config.max_dispatch_depth.max(1);
        let mut dispatched = 0usize;
        while let Some(stimulus) = self.core.pending.pop_front() {
            if dispatched >= limit {
                tracing::warn!(
                    actor = %self.core.id(),
                    dropped = self.core.pending.len() + 1,
                    "Dispatch depth exceeded, dropping queued stimuli"
                );
                metrics::counter!("ai.dispatch_overflows").increment(1);
                self.core.pending.clear();
                break;
            }
            dispatched += 1;
            let result = match stimulus {
                Stimulus::Intention(intention) => self.dispatch_intention(intention),
                Stimulus::Event(event) => self.dispatch_event(event),
            };
            if let Err(err) = result {
                self.core.absorb(err);
            }
        }
    }

    fn dispatch_intention(&mut self, intention: Intention) -> AiResult<()> {
        if !self.core.attached {
            return Err(AiError::Detached);
        }
        if !intention.keeps_follow() {
            self.core.stop_follow();
        }
        if let Some(dropped) = self.core.deferred.take() {
            tracing::trace!(actor = %self.core.id(), ?dropped, "Deferred action cleared");
        }
        self.behavior.on_intention(&mut self.core, &intention)
    }

    fn dispatch_event(&mut self, event: Event) -> AiResult<()> {
        if !self.core.attached {
            return Ok(());
        }
        if !self.core.actor.is_spawned() && !self.core.actor.is_teleporting() {
            return Ok(());
        }
        self.behavior.on_event(&mut self.core, &event)?;

        let current = self.core.intention.kind();
        let fires = self
            .core
            .deferred
            .as_ref()
            .is_some_and(|deferred| deferred.matches(event.kind(), current));
        if fires {
            if let Some(deferred) = self.core.deferred.take() {
                tracing::trace!(actor = %self.core.id(), event = ?event.kind(), "Deferred action fired");
                (deferred.into_action())(&mut self.core)?;
            }
        }
        Ok(())
    }

    fn run_tick(&mut self, kind: TickKind) {
        if !self.core.attached {
            return;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let result = match kind {
                TickKind::Think => {
                    metrics::counter!("ai.think_ticks").increment(1);
                    self.dispatch_event(Event::Think)
                }
                TickKind::Follow => self.core.follow_tick(),
                TickKind::Avoid => self.behavior.on_avoid(&mut self.core),
            };
            if let Err(err) = result {
                self.core.absorb(err);
            }
            self.drain();
        }));

        if let Err(panic) = outcome {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(actor = %self.core.id(), tick = ?kind, "Controller tick panicked");
            self.core.recover_busy_flags();
            self.core
                .absorb(AiError::TaskFailed(format!("{:?} tick: {}", kind, message)));
        }
    }
}

/// Public face of one actor's controller
#[derive(Clone)]
pub struct AiHandle {
    actor: Arc<dyn Character>,
    controller: SharedController,
    ledger: Option<Arc<HostilityLedger>>,
    ctx: Arc<AiContext>,
}

impl std::fmt::Debug for AiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiHandle")
            .field("actor", &self.actor.id())
            .finish_non_exhaustive()
    }
}

impl AiHandle {
    pub fn id(&self) -> ObjectId {
        self.actor.id()
    }

    pub fn actor(&self) -> &Arc<dyn Character> {
        &self.actor
    }

    fn lock(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with the controller locked
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut Controller) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_intention(&self, intention: Intention) {
        self.lock().set_intention(intention);
    }

    pub fn notify_event(&self, event: Event) {
        self.lock().notify_event(event);
    }

    /// Deliver `event` only if the current intention passes `guard`
    pub fn notify_event_if(&self, guard: impl FnOnce(&Intention) -> bool, event: Event) {
        let mut controller = self.lock();
        if guard(controller.core.intention()) {
            controller.notify_event(event);
        }
    }

    pub fn intention(&self) -> Intention {
        self.lock().core.intention.clone()
    }

    pub fn target(&self) -> Option<ObjectId> {
        self.lock().core.target
    }

    pub fn attack_target(&self) -> Option<ObjectId> {
        self.lock().core.attack_target
    }

    pub fn cast_target(&self) -> Option<ObjectId> {
        self.lock().core.cast_target
    }

    pub fn follow_target(&self) -> Option<ObjectId> {
        self.lock().core.follow_target
    }

    pub fn is_following(&self) -> bool {
        self.lock().core.is_following()
    }

    pub fn is_moving(&self) -> bool {
        self.lock().core.client_moving
    }

    pub fn is_auto_attacking(&self) -> bool {
        self.lock().core.client_auto_attacking
    }

    pub fn has_think_task(&self) -> bool {
        self.lock().core.has_think_task()
    }

    pub fn has_avoid_task(&self) -> bool {
        self.lock().core.has_avoid_task()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().core.attached
    }

    pub fn behavior_kind(&self) -> BehaviorKind {
        self.lock().behavior_kind()
    }

    pub fn skill(&self) -> Option<Skill> {
        self.lock().core.skill.clone()
    }

    pub fn set_deferred(&self, action: DeferredAction) {
        self.lock().core.set_deferred(action);
    }

    pub fn has_deferred(&self) -> bool {
        self.lock().core.has_deferred()
    }

    pub fn start_follow(&self, target: ObjectId, range: Option<i32>) {
        self.lock().core.start_follow(target, range);
    }

    pub fn stop_follow(&self) {
        self.lock().core.stop_follow();
    }

    /// Walk a multi-point route; later points are reached through `Arrived`
    pub fn move_route(&self, points: impl IntoIterator<Item = Position>) {
        let mut route: VecDeque<Position> = points.into_iter().collect();
        let Some(first) = route.pop_front() else {
            return;
        };
        let mut controller = self.lock();
        controller.set_intention(Intention::MoveTo(first));
        if controller.core.intention == Intention::MoveTo(first) {
            controller.core.route = route;
        }
    }

    pub fn set_next_intention(&self, intention: Intention) {
        self.lock().set_next_intention(intention);
    }

    pub fn next_intention(&self) -> Option<Intention> {
        self.lock().next_intention()
    }

    /// Toggle owner following for summons
    pub fn set_follow_status(&self, follow: bool) {
        self.lock().set_follow_status(follow);
    }

    pub fn stop_ai_task(&self) {
        self.lock().stop_ai_task();
    }

    // ---------------------------------------------------------------------
    // Ledger
    // ---------------------------------------------------------------------

    pub fn ledger(&self) -> Option<&Arc<HostilityLedger>> {
        self.ledger.as_ref()
    }

    /// Record damage and hate from `attacker`
    pub fn add_damage_hate(&self, attacker: ObjectId, damage: i64, hate: i64) -> LedgerSignal {
        let Some(ledger) = &self.ledger else {
            return LedgerSignal::Unchanged;
        };
        let Some(attacker) = self.ctx.world.character(attacker) else {
            return LedgerSignal::Unchanged;
        };
        let signal = ledger.add_damage_hate(&self.ctx, attacker.as_ref(), damage, hate);
        self.apply_signal(signal);
        signal
    }

    pub fn reduce_hate(&self, target: Option<ObjectId>, amount: i64) -> LedgerSignal {
        let Some(ledger) = &self.ledger else {
            return LedgerSignal::Unchanged;
        };
        let signal = ledger.reduce_hate(&self.ctx, self.actor.as_ref(), target, amount);
        self.apply_signal(signal);
        signal
    }

    pub fn stop_hating(&self, target: ObjectId) {
        if let Some(ledger) = &self.ledger {
            ledger.stop_hating(target);
        }
    }

    pub fn clear_hate(&self) {
        if let Some(ledger) = &self.ledger {
            ledger.clear();
        }
    }

    pub fn hating(&self, attacker: ObjectId) -> i64 {
        self.ledger
            .as_ref()
            .map_or(0, |ledger| ledger.hating(&self.ctx, self.actor.as_ref(), attacker))
    }

    pub fn most_hated(&self) -> Option<ObjectId> {
        self.ledger
            .as_ref()
            .and_then(|ledger| ledger.most_hated(&self.ctx, self.actor.as_ref()))
    }

    pub fn hate_list(&self) -> Vec<AggroInfo> {
        self.ledger
            .as_ref()
            .map(|ledger| ledger.hate_list())
            .unwrap_or_default()
    }

    pub fn global_aggro(&self) -> Option<i32> {
        self.ledger.as_ref().map(|ledger| ledger.global_aggro())
    }

    /// Apply a ledger outcome now, or on the scheduler when the controller is
    /// busy (for instance when called from inside one of its own hooks)
    fn apply_signal(&self, signal: LedgerSignal) {
        if signal == LedgerSignal::Unchanged {
            return;
        }
        match self.controller.try_lock() {
            Ok(mut controller) => controller.apply_ledger_signal(signal),
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().apply_ledger_signal(signal)
            }
            Err(TryLockError::WouldBlock) => {
                let controller = Arc::downgrade(&self.controller);
                self.ctx.scheduler.schedule_once(
                    Duration::ZERO,
                    Box::new(move || {
                        if let Some(shared) = controller.upgrade() {
                            shared
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .apply_ledger_signal(signal);
                        }
                    }),
                );
            }
        }
    }
}
