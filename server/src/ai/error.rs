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

//! Controller error taxonomy

use crate::ai::intention::IntentionKind;
use crate::world::ObjectId;
use thiserror::Error;

/// Errors raised by behavior hooks.
///
/// None of these are fatal. The controller's dispatch loop absorbs every one of
/// them: the worst outcome is an actor falling back to idle or patrol.
#[derive(Debug, Error)]
pub enum AiError {
    /// The requested intention cannot start in the actor's current state.
    #[error("Cannot start {requested:?}: {reason}")]
    InvalidTransition {
        requested: IntentionKind,
        reason: &'static str,
    },

    /// A resource or capability required for the action is missing.
    #[error("Missing precondition: {0}")]
    MissingPrecondition(&'static str),

    /// A referenced object died, teleported or left the knowledge radius.
    #[error("Stale reference to {0}")]
    StaleReference(ObjectId),

    /// A scheduled tick failed.
    #[error("Scheduled task failed: {0}")]
    TaskFailed(String),

    /// The controller has been detached from its actor.
    #[error("Controller detached")]
    Detached,

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn invalid(requested: IntentionKind, reason: &'static str) -> Self {
        AiError::InvalidTransition { requested, reason }
    }

    /// Whether a player-controlled actor should be told its action failed
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            AiError::InvalidTransition { .. } | AiError::MissingPrecondition(_)
        )
    }
}

/// Result type for controller operations.
pub type AiResult<T> = Result<T, AiError>;
