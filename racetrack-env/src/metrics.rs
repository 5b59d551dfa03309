//! Episode-level statistics.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::env::{EpisodeEnd, StepOutcome};
use crate::numbers::usize_to_f64;

/// Summary of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub reward: f64,
    pub steps: u32,
    pub checkpoints: usize,
    pub collisions: u32,
    pub episode_time: f64,
    pub success: bool,
    pub end: Option<EpisodeEnd>,
}

/// Accumulates step outcomes into an [`EpisodeRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeTally {
    reward: f64,
    steps: u32,
    checkpoints: usize,
    collisions: u32,
    episode_time: f64,
    end: Option<EpisodeEnd>,
}

impl EpisodeTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, outcome: &StepOutcome) {
        self.reward += outcome.reward;
        self.steps = self.steps.saturating_add(1);
        self.checkpoints = outcome.info.progress;
        self.collisions = outcome.info.collisions;
        self.episode_time = outcome.info.episode_time;
        if outcome.end.is_some() {
            self.end = outcome.end;
        }
    }

    #[must_use]
    pub const fn reward(&self) -> f64 {
        self.reward
    }

    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Close the tally. Success means every checkpoint was reached.
    #[must_use]
    pub fn finish(self) -> EpisodeRecord {
        EpisodeRecord {
            reward: self.reward,
            steps: self.steps,
            checkpoints: self.checkpoints,
            collisions: self.collisions,
            episode_time: self.episode_time,
            success: self.end == Some(EpisodeEnd::Completed),
            end: self.end,
        }
    }
}

/// Rolling window of recent episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeLedger {
    records: VecDeque<EpisodeRecord>,
    capacity: usize,
}

impl EpisodeLedger {
    pub const DEFAULT_CAPACITY: usize = 100;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: EpisodeRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &EpisodeRecord> {
        self.records.iter()
    }

    /// Trailing moving average of rewards (`valid` mode): one value per full
    /// window, empty when fewer than `window` episodes are stored.
    #[must_use]
    pub fn moving_average(&self, window: usize) -> Vec<f64> {
        if window == 0 || self.records.len() < window {
            return Vec::new();
        }
        let rewards: Vec<f64> = self.records.iter().map(|r| r.reward).collect();
        rewards
            .windows(window)
            .map(|w| w.iter().sum::<f64>() / usize_to_f64(window))
            .collect()
    }

    /// Share of stored episodes that reached every checkpoint; 0 when empty.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let successes = self.records.iter().filter(|r| r.success).count();
        usize_to_f64(successes) / usize_to_f64(self.records.len())
    }

    #[must_use]
    pub fn mean_reward(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().map(|r| r.reward).sum::<f64>() / usize_to_f64(self.records.len())
    }

    #[must_use]
    pub fn best_reward(&self) -> Option<f64> {
        self.records.iter().map(|r| r.reward).reduce(f64::max)
    }
}

impl Default for EpisodeLedger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
