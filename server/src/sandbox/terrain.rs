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

//! Flat, obstacle-free terrain with an optional circular boundary

use crate::world::{Character, Geodata, Position};

/// Bisection steps used to find where a blocked path ends
const BOUNDARY_STEPS: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTerrain {
    bounds: Option<(Position, i32)>,
}

impl OpenTerrain {
    /// Unbounded plane
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Plane ending `radius` units from `center`
    pub fn bounded(center: Position, radius: i32) -> Self {
        Self {
            bounds: Some((center, radius.max(0))),
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        match self.bounds {
            Some((center, radius)) => center.is_within(&position, radius as f64),
            None => true,
        }
    }

    /// Furthest point on the straight line from `from` to `to` that is still
    /// walkable; `from` itself when nothing is
    pub fn last_walkable(&self, from: Position, to: Position) -> Position {
        if self.contains(to) {
            return to;
        }
        if !self.contains(from) {
            return from;
        }
        // Point `d` units out from `from`
        let along = |d: f64| to.toward(&from, d);
        let (mut good, mut bad) = (0.0, from.distance_2d(&to));
        for _ in 0..BOUNDARY_STEPS {
            let mid = (good + bad) / 2.0;
            if self.contains(along(mid)) {
                good = mid;
            } else {
                bad = mid;
            }
        }
        along(good)
    }
}

impl Geodata for OpenTerrain {
    fn can_see(&self, from: &dyn Character, to: &dyn Character) -> bool {
        self.contains(from.position()) && self.contains(to.position())
    }

    fn can_move_to(&self, from: Position, to: Position) -> bool {
        self.contains(from) && self.contains(to)
    }
}
