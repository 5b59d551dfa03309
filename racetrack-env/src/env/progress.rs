//! Per-episode bookkeeping.
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::geometry::Vec2;

/// Counters and checkpoint state for the running episode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeProgress {
    pub step: u32,
    pub episode_time: f64,
    /// Next checkpoint to reach. Only grows within an episode, and every
    /// index below it has been reached.
    pub checkpoint_index: usize,
    pub collisions: u32,
    /// Distance to the current target after the previous step.
    pub prev_distance: Option<f64>,
    /// Speed after the previous step; `None` right after reset.
    pub last_velocity: Option<f64>,
}

impl EpisodeProgress {
    /// Current target: the next checkpoint, the last one once all are
    /// reached, or `None` for a track without checkpoints.
    #[must_use]
    pub fn target(&self, checkpoints: &[Vec2]) -> Option<Vec2> {
        checkpoints
            .get(self.checkpoint_index)
            .or_else(|| checkpoints.last())
            .copied()
    }

    /// Indices of the checkpoints reached so far.
    #[must_use]
    pub const fn reached(&self) -> Range<usize> {
        0..self.checkpoint_index
    }

    #[must_use]
    pub const fn finished_course(&self, total: usize) -> bool {
        total > 0 && self.checkpoint_index >= total
    }

    /// Distance closed toward `target` since the previous step, in units of
    /// `max_speed`. Updates the stored distance.
    pub fn advance_toward(&mut self, position: Vec2, target: Option<Vec2>, max_speed: f64) -> f64 {
        let Some(target) = target else {
            self.prev_distance = None;
            return 0.0;
        };
        let distance = position.distance(target);
        let delta = self
            .prev_distance
            .map_or(0.0, |prev| (prev - distance) / max_speed);
        self.prev_distance = Some(distance);
        delta
    }
}
