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

//! World coordinates and headings

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of heading units in a full circle
pub const HEADING_UNITS: f64 = 65536.0;

/// A point in world space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Planar distance, ignoring height
    pub fn distance_2d(&self, other: &Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Full 3D distance
    pub fn distance(&self, other: &Position) -> f64 {
        let dz = (self.z - other.z) as f64;
        let planar = self.distance_2d(other);
        (planar * planar + dz * dz).sqrt()
    }

    /// True when `other` lies inside `range` on the plane
    pub fn is_within(&self, other: &Position, range: f64) -> bool {
        self.distance_2d(other) <= range
    }

    /// Heading (0..65535) pointing from this position toward `other`
    pub fn heading_to(&self, other: &Position) -> u16 {
        let angle = ((other.y - self.y) as f64).atan2((other.x - self.x) as f64);
        heading_from_radians(angle)
    }

    /// Point `distance` units along the line from here toward `target`, stopping
    /// `offset` units short of it. Returns `self` when already closer than `offset`.
    pub fn toward(&self, target: &Position, offset: f64) -> Position {
        let total = self.distance_2d(target);
        if total <= offset || total == 0.0 {
            return *self;
        }
        let ratio = (total - offset) / total;
        Position::new(
            self.x + ((target.x - self.x) as f64 * ratio) as i32,
            self.y + ((target.y - self.y) as f64 * ratio) as i32,
            self.z + ((target.z - self.z) as f64 * ratio) as i32,
        )
    }

    /// Point `distance` units directly away from `threat`
    pub fn away_from(&self, threat: &Position, distance: f64) -> Position {
        let mut dx = (self.x - threat.x) as f64;
        let mut dy = (self.y - threat.y) as f64;
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0.0 {
            dx = 1.0;
            dy = 0.0;
        } else {
            dx /= len;
            dy /= len;
        }
        Position::new(
            self.x + (dx * distance) as i32,
            self.y + (dy * distance) as i32,
            self.z,
        )
    }

    /// Point at `distance` along `heading`
    pub fn project(&self, heading: u16, distance: f64) -> Position {
        let angle = radians_from_heading(heading);
        Position::new(
            self.x + (angle.cos() * distance) as i32,
            self.y + (angle.sin() * distance) as i32,
            self.z,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Position {
        Position::new(self.x + dx, self.y + dy, self.z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

pub fn heading_from_radians(angle: f64) -> u16 {
    let mut turns = angle / (2.0 * PI);
    if turns < 0.0 {
        turns += 1.0;
    }
    ((turns * HEADING_UNITS) as u32 % HEADING_UNITS as u32) as u16
}

pub fn radians_from_heading(heading: u16) -> f64 {
    heading as f64 / HEADING_UNITS * 2.0 * PI
}
