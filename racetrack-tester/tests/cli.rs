use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "racetrack-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_list_drivers_writes_output() {
    let exe = env!("CARGO_BIN_EXE_racetrack-tester");
    let output_path = temp_path("list");
    let status = Command::new(exe)
        .args(["--list-drivers", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("Available drivers"));
    assert!(content.contains("seeker"));
}

#[test]
fn cli_runs_matrix_with_json_report() {
    let exe = env!("CARGO_BIN_EXE_racetrack-tester");
    let output_path = temp_path("run");
    let output = Command::new(exe)
        .args([
            "--maps",
            "corridor,open",
            "--drivers",
            "throttle,random",
            "--seeds",
            "1,2",
            "--episodes",
            "1",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .output()
        .expect("run cli");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("json report");
    let scenarios = report["scenarios"].as_array().expect("scenario list");
    assert_eq!(scenarios.len(), 8);
    assert!(scenarios.iter().all(|s| s["passed"] == true));
}

#[test]
fn cli_curriculum_markdown_report() {
    let exe = env!("CARGO_BIN_EXE_racetrack-tester");
    let output_path = temp_path("curriculum");
    let status = Command::new(exe)
        .args([
            "--maps",
            "corridor",
            "--drivers",
            "seeker",
            "--episodes",
            "1",
            "--curriculum",
            "--curriculum-episodes",
            "2",
            "--report",
            "markdown",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.contains("# Racetrack Test Results"));
    assert!(content.contains("## Curriculum"));
    assert!(content.contains("Beginner"));
}

#[test]
fn cli_rejects_unknown_shaper() {
    let exe = env!("CARGO_BIN_EXE_racetrack-tester");
    let output = Command::new(exe)
        .args(["--shaper", "turbo", "--report", "json"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown shaper"));
}
