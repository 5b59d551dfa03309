use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use super::{CurriculumRun, ScenarioResult};

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    scenarios: &'a [ScenarioResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    curriculum: Option<&'a CurriculumRun>,
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    curriculum: Option<&CurriculumRun>,
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Racetrack Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=================================".cyan())?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = total - passed;

    writeln!(out, "Total scenarios: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", failed.to_string().red())?;
    if total > 0 {
        #[allow(clippy::cast_precision_loss)]
        let success_rate = (passed as f64 / total as f64) * 100.0;
        writeln!(out, "Success rate: {success_rate:.1}%")?;
    }
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(out, "{} {} (seed {})", status, result.scenario_name.bold(), result.seed)?;
        writeln!(
            out,
            "   Episodes: {}/{} completed the course",
            result.successful_episodes, result.episodes_run
        )?;
        writeln!(
            out,
            "   Reward: mean {:.2}, best {}",
            result.mean_reward,
            result
                .best_reward
                .map_or_else(|| "-".to_string(), |r| format!("{r:.2}"))
        )?;
        writeln!(
            out,
            "   Steps: mean {:.1}, checkpoints {}",
            result.mean_steps, result.checkpoints_reached
        )?;
        writeln!(out, "   Ends: {}", format_end_reasons(result))?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    if let Some(run) = curriculum {
        writeln!(out, "{}", "🎓 Curriculum".bright_yellow().bold())?;
        writeln!(out, "{}", "=============".yellow())?;
        writeln!(
            out,
            "Episodes: {}, phases completed: {}, final phase: {}{}",
            run.episodes_run,
            run.phases_completed,
            run.final_phase,
            if run.graduated { " (graduated)" } else { "" }
        )?;
        for report in &run.reports {
            let mark = if report.completed { "✅" } else { "⏳" };
            writeln!(
                out,
                "  {mark} {}: {} episodes, success {:.0}% (need {:.0}%), reward {:.1} (need {:.1})",
                report.phase_name,
                report.total_episodes,
                report.recent_success_rate * 100.0,
                report.success_rate_required * 100.0,
                report.avg_reward,
                report.reward_threshold
            )?;
        }
    }
    Ok(())
}

pub fn generate_json_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    curriculum: Option<&CurriculumRun>,
) -> Result<()> {
    let report = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        scenarios: results,
        curriculum,
    };
    let json_output = serde_json::to_string_pretty(&report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    curriculum: Option<&CurriculumRun>,
) -> Result<()> {
    writeln!(out, "# Racetrack Test Results\n")?;
    writeln!(out, "_Generated {}_\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}\n", total - passed)?;

    if !results.is_empty() {
        writeln!(out, "## Scenarios\n")?;
        writeln!(
            out,
            "| Status | Scenario | Seed | Episodes | Completed | Mean reward | Mean steps | Ends |"
        )?;
        writeln!(out, "|---|---|---|---|---|---|---|---|")?;
        for result in results {
            let status = if result.passed { "✅" } else { "❌" };
            writeln!(
                out,
                "| {status} | {} | {} | {} | {} | {:.2} | {:.1} | {} |",
                result.scenario_name,
                result.seed,
                result.episodes_run,
                result.successful_episodes,
                result.mean_reward,
                result.mean_steps,
                format_end_reasons(result)
            )?;
        }
        writeln!(out)?;
    }

    let failing: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "## Failures\n")?;
        for result in failing {
            writeln!(out, "### {} (seed {})\n", result.scenario_name, result.seed)?;
            for failure in &result.failures {
                writeln!(out, "- {failure}")?;
            }
            writeln!(out)?;
        }
    }

    if let Some(run) = curriculum {
        writeln!(out, "## Curriculum\n")?;
        writeln!(
            out,
            "- **Episodes**: {}\n- **Phases completed**: {}\n- **Final phase**: {}\n",
            run.episodes_run, run.phases_completed, run.final_phase
        )?;
        writeln!(out, "| Phase | Episodes | Success rate | Avg reward | Completed |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for report in &run.reports {
            writeln!(
                out,
                "| {} | {} | {:.0}% | {:.1} | {} |",
                report.phase_name,
                report.total_episodes,
                report.recent_success_rate * 100.0,
                report.avg_reward,
                if report.completed { "yes" } else { "no" }
            )?;
        }
    }
    Ok(())
}

fn format_end_reasons(result: &ScenarioResult) -> String {
    if result.end_reasons.is_empty() {
        return "-".to_string();
    }
    result
        .end_reasons
        .iter()
        .map(|(reason, count)| format!("{reason}×{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "corridor/seeker".to_string(),
            map: "corridor".to_string(),
            driver: "seeker".to_string(),
            seed: 42,
            passed,
            episodes_run: 2,
            successful_episodes: 1,
            failures: if passed {
                Vec::new()
            } else {
                vec!["replay diverged".to_string()]
            },
            mean_reward: 12.5,
            best_reward: Some(30.0),
            mean_steps: 48.0,
            checkpoints_reached: 1,
            end_reasons: BTreeMap::from([
                ("completed".to_string(), 1),
                ("left_track".to_string(), 1),
            ]),
            digest: Some("00000000deadbeef".to_string()),
            duration: Duration::from_millis(3),
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn json_report_wraps_scenarios() {
        let text = render(|out| generate_json_report(out, &[sample_result(true)], None));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["scenarios"][0]["scenario_name"], "corridor/seeker");
        assert!(value.get("curriculum").is_none());
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn markdown_lists_failures() {
        let text = render(|out| {
            generate_markdown_report(out, &[sample_result(true), sample_result(false)], None)
        });
        assert!(text.contains("# Racetrack Test Results"));
        assert!(text.contains("## Failures"));
        assert!(text.contains("replay diverged"));
        assert!(text.contains("completed×1, left_track×1"));
    }

    #[test]
    fn console_handles_empty_results() {
        let text = render(|out| generate_console_report(out, &[], None, Duration::ZERO));
        assert!(text.contains("Total scenarios: 0"));
        assert!(!text.contains("Success rate"));
    }
}
