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

//! Actor decision making
//!
//! Every living actor in the world gets one [`controller::Controller`]. The
//! controller holds the actor's current [`intention::Intention`] and reacts to
//! [`intention::Event`]s by handing them to the actor's [`behavior::Behavior`].
//! Hostile NPCs additionally keep a [`ledger::HostilityLedger`] of who hurt them.

pub mod behavior;
pub mod controller;
pub mod error;
pub mod intention;
pub mod ledger;

pub use behavior::{Behavior, BehaviorKind};
pub use controller::{AiHandle, Controller, ControllerCore};
pub use error::{AiError, AiResult};
pub use intention::{DeferredAction, Event, EventKind, Intention, IntentionKind};
pub use ledger::{AggroInfo, HostilityLedger, LedgerSignal};
