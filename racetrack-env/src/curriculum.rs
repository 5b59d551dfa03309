//! Staged training curriculum with progression criteria.
//!
//! Phases ship as a static JSON asset. A [`CurriculumTracker`] records
//! episode outcomes for the current phase and reports when the trailing
//! window meets both the success-rate and the mean-reward thresholds.
use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;
use crate::metrics::EpisodeRecord;
use crate::numbers::usize_to_f64;
use crate::track::MapKind;

const DEFAULT_CURRICULUM_DATA: &str = include_str!("../assets/curriculum.json");

/// One stage of the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumPhase {
    pub id: u32,
    pub name: String,
    pub map: MapKind,
    #[serde(default)]
    pub description: String,
    /// Size of the trailing evaluation window.
    #[serde(default = "CurriculumPhase::default_min_episodes")]
    pub min_episodes: usize,
    #[serde(default = "CurriculumPhase::default_success_rate_threshold")]
    pub success_rate_threshold: f64,
    #[serde(default = "CurriculumPhase::default_reward_threshold")]
    pub reward_threshold: f64,
    #[serde(default = "EnvConfig::default_max_steps")]
    pub max_episode_steps: u32,
    #[serde(default = "EnvConfig::default_max_episode_time")]
    pub max_episode_time: f64,
}

impl CurriculumPhase {
    const fn default_min_episodes() -> usize {
        5
    }

    const fn default_success_rate_threshold() -> f64 {
        0.6
    }

    const fn default_reward_threshold() -> f64 {
        50.0
    }
}

/// Ordered list of phases.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curriculum {
    #[serde(default)]
    pub phases: Vec<CurriculumPhase>,
}

impl Curriculum {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_CURRICULUM_DATA).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a curriculum.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}

/// Snapshot of progress within the current phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase_id: u32,
    pub phase_name: String,
    pub total_episodes: usize,
    pub recent_success_rate: f64,
    pub success_rate_required: f64,
    pub avg_reward: f64,
    pub reward_threshold: f64,
    pub episodes_needed: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PhaseEpisode {
    phase: usize,
    reward: f64,
    success: bool,
}

/// In-memory progression through a [`Curriculum`].
#[derive(Debug, Clone)]
pub struct CurriculumTracker {
    curriculum: Curriculum,
    current: usize,
    episodes: Vec<PhaseEpisode>,
}

impl CurriculumTracker {
    #[must_use]
    pub const fn new(curriculum: Curriculum) -> Self {
        Self {
            curriculum,
            current: 0,
            episodes: Vec::new(),
        }
    }

    /// The active phase; the last one once the curriculum is exhausted.
    #[must_use]
    pub fn current_phase(&self) -> Option<&CurriculumPhase> {
        self.curriculum
            .phases
            .get(self.current)
            .or_else(|| self.curriculum.phases.last())
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    pub fn record(&mut self, record: &EpisodeRecord) {
        self.episodes.push(PhaseEpisode {
            phase: self.current,
            reward: record.reward,
            success: record.success,
        });
    }

    /// Window statistics over the last `min_episodes` episodes of this phase.
    #[must_use]
    pub fn phase_report(&self) -> Option<PhaseReport> {
        let phase = self.current_phase()?;
        let in_phase: Vec<&PhaseEpisode> = self
            .episodes
            .iter()
            .filter(|e| e.phase == self.current)
            .collect();
        let start = in_phase.len().saturating_sub(phase.min_episodes);
        let recent = &in_phase[start..];
        let (success_rate, avg_reward) = if recent.is_empty() {
            (0.0, 0.0)
        } else {
            let n = usize_to_f64(recent.len());
            let successes = recent.iter().filter(|e| e.success).count();
            (
                usize_to_f64(successes) / n,
                recent.iter().map(|e| e.reward).sum::<f64>() / n,
            )
        };
        let completed = in_phase.len() >= phase.min_episodes
            && success_rate >= phase.success_rate_threshold
            && avg_reward >= phase.reward_threshold;
        Some(PhaseReport {
            phase_id: phase.id,
            phase_name: phase.name.clone(),
            total_episodes: in_phase.len(),
            recent_success_rate: success_rate,
            success_rate_required: phase.success_rate_threshold,
            avg_reward,
            reward_threshold: phase.reward_threshold,
            episodes_needed: phase.min_episodes,
            completed,
        })
    }

    #[must_use]
    pub fn is_phase_complete(&self) -> bool {
        self.phase_report().is_some_and(|report| report.completed)
    }

    /// Move to the next phase; `false` when already at the last one.
    pub fn advance(&mut self) -> bool {
        if self.current + 1 >= self.curriculum.phases.len() {
            return false;
        }
        self.current += 1;
        log::debug!("curriculum advanced to phase {}", self.current);
        true
    }

    /// `base` with the current phase's map and episode limits applied.
    #[must_use]
    pub fn apply_to(&self, base: &EnvConfig) -> EnvConfig {
        let Some(phase) = self.current_phase() else {
            return base.clone();
        };
        EnvConfig {
            map: phase.map,
            max_steps: phase.max_episode_steps,
            max_episode_time: phase.max_episode_time,
            ..base.clone()
        }
    }
}
