use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stimulus within the experiment's stimulus set.
pub type StimulusId = u32;

/// Spatial placement of a stimulus, serialized as `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Placement {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Screen-plane projection used for hit testing.
    pub fn screen_point(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }
}

impl From<[f32; 3]> for Placement {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Placement> for [f32; 3] {
    fn from(p: Placement) -> Self {
        [p.x, p.y, p.z]
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// A position in screen space reported by a pointer or gaze source.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: ScreenPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A stimulus that a presenter has put on screen.
///
/// `slot` is unique among the handles returned during one trial and is what
/// the dwell modality compares to detect a change of target.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusHandle {
    pub slot: usize,
    pub id: StimulusId,
    pub placement: Placement,
}

impl StimulusHandle {
    pub fn new(slot: usize, id: StimulusId, placement: Placement) -> Self {
        Self {
            slot,
            id,
            placement,
        }
    }
}
