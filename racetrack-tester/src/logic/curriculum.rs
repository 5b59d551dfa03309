use log::info;
use racetrack_env::{Curriculum, CurriculumTracker, EnvConfig, EnvError, PhaseReport, RaceEnv};
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::logic::policy::DriverKind;
use crate::logic::simulation::drive_episode;

/// Outcome of driving the seeker through the built-in curriculum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumRun {
    pub seed: u64,
    pub episodes_run: usize,
    pub phases_completed: usize,
    pub final_phase: String,
    pub graduated: bool,
    /// One report per phase visited; the last may be incomplete.
    pub reports: Vec<PhaseReport>,
}

/// Run up to `budget` seeker episodes, advancing phases as their criteria
/// are met. Each phase gets a fresh environment seeded `seed + phase`.
///
/// # Errors
///
/// Returns the first environment error.
pub fn run_curriculum(base: &EnvConfig, seed: u64, budget: usize) -> Result<CurriculumRun, EnvError> {
    let mut tracker = CurriculumTracker::new(Curriculum::load_from_static());
    let mut env = phase_env(&tracker, base, seed)?;
    let mut policy = DriverKind::Seeker.create_policy(seed);
    let mut hasher = XxHash64::with_seed(seed);
    let mut reports = Vec::new();
    let mut episodes_run = 0;
    let mut graduated = false;

    while episodes_run < budget {
        let record = drive_episode(&mut env, policy.as_mut(), &mut hasher)?;
        episodes_run += 1;
        tracker.record(&record);
        if !tracker.is_phase_complete() {
            continue;
        }
        if let Some(report) = tracker.phase_report() {
            info!(
                "phase '{}' complete after {} episodes (success {:.0}%, reward {:.1})",
                report.phase_name,
                report.total_episodes,
                report.recent_success_rate * 100.0,
                report.avg_reward
            );
            reports.push(report);
        }
        if !tracker.advance() {
            graduated = true;
            break;
        }
        env = phase_env(&tracker, base, seed)?;
    }

    if !graduated {
        reports.extend(tracker.phase_report());
    }
    let phases_completed = reports.iter().filter(|r| r.completed).count();
    Ok(CurriculumRun {
        seed,
        episodes_run,
        phases_completed,
        final_phase: tracker
            .current_phase()
            .map_or_else(String::new, |phase| phase.name.clone()),
        graduated,
        reports,
    })
}

fn phase_env(tracker: &CurriculumTracker, base: &EnvConfig, seed: u64) -> Result<RaceEnv, EnvError> {
    let offset = u64::try_from(tracker.current_index()).unwrap_or(u64::MAX);
    let config = EnvConfig {
        seed: seed.wrapping_add(offset),
        ..tracker.apply_to(base)
    };
    RaceEnv::new(config)
}
