//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use bandscore_core::band::Band;
use bandscore_core::engine::NO_AUDIO_MESSAGE;
use bandscore_core::model::Criterion;
use bandscore_core::report::{AnswerReport, SessionReport, SessionSummary};
use bandscore_core::results::{CriterionSummary, OverallEvaluationResult};

fn bandscore() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("bandscore").unwrap()
}

/// A temp dir with `bandscore.toml` and `answers/example.json`.
fn initialized_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    bandscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
    dir
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect()
}

#[test]
fn help_output() {
    bandscore()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IELTS Speaking answer evaluator"));
}

#[test]
fn version_output() {
    bandscore()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bandscore"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    bandscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created bandscore.toml"))
        .stdout(predicate::str::contains("Created answers/example.json"));

    assert!(dir.path().join("bandscore.toml").exists());
    assert!(dir.path().join("answers/example.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = initialized_dir();

    bandscore()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_example_answer() {
    let dir = initialized_dir();

    bandscore()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--answer")
        .arg("answers/example.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Answer: example (19 words)"))
        .stdout(predicate::str::contains("All answers valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("bad.json"),
        r#"{"id": "bad", "transcript": "hello there", "words": [
            {"text": "hello", "start": 1.0, "end": 0.5, "confidence": 1.4}
        ]}"#,
    )
    .unwrap();

    bandscore()
        .arg("validate")
        .arg("--answer")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[bad] WARNING"))
        .stdout(predicate::str::contains("ends before it starts"))
        .stdout(predicate::str::contains("outside [0, 1]"));
}

#[test]
fn validate_nonexistent_file() {
    bandscore()
        .arg("validate")
        .arg("--answer")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn score_example_offline() {
    let dir = initialized_dir();
    let out = dir.path().join("out");

    bandscore()
        .current_dir(dir.path())
        .arg("score")
        .arg("--answer")
        .arg("answers/example.json")
        .arg("--format")
        .arg("all")
        .arg("--output")
        .arg(&out)
        .arg("--seed")
        .arg("7")
        .assert()
        .success()
        .stderr(predicate::str::contains("Overall band"));

    let json = files_with_extension(&out, "json");
    assert_eq!(json.len(), 1);
    assert_eq!(files_with_extension(&out, "html").len(), 1);
    assert_eq!(files_with_extension(&out, "md").len(), 1);

    let report = AnswerReport::load_json(&json[0]).unwrap();
    assert_eq!(report.answer_id, "example");
    assert_eq!(report.results.len(), 4);
    for result in &report.results {
        assert!(!result.is_empty(), "{} was not scored", result.criterion);
    }
}

#[test]
fn score_selected_criteria() {
    let dir = initialized_dir();
    let out = dir.path().join("out");

    bandscore()
        .current_dir(dir.path())
        .args(["score", "--answer", "answers/example.json", "--criteria", "fluency,lexical"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Overall band").not());

    let json = files_with_extension(&out, "json");
    let report = AnswerReport::load_json(&json[0]).unwrap();
    let criteria: Vec<Criterion> = report.results.iter().map(|r| r.criterion).collect();
    assert_eq!(criteria, vec![Criterion::Fluency, Criterion::Lexical]);
}

#[test]
fn score_unknown_backend() {
    let dir = initialized_dir();

    bandscore()
        .current_dir(dir.path())
        .args(["score", "--answer", "answers/example.json", "--backend", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown grammar backend 'nope'"));
}

#[test]
fn score_rejects_unknown_format() {
    let dir = initialized_dir();

    bandscore()
        .current_dir(dir.path())
        .args(["score", "--answer", "answers/example.json", "--format", "sarif"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn session_scores_every_answer() {
    let dir = initialized_dir();
    let answers = dir.path().join("answers");

    // A second answer without alignment: pronunciation cannot be scored.
    let mut second: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(answers.join("example.json")).unwrap())
            .unwrap();
    second["id"] = "q2".into();
    second.as_object_mut().unwrap().remove("alignment");
    std::fs::write(answers.join("q2.json"), second.to_string()).unwrap();

    std::fs::write(
        dir.path().join("session.toml"),
        r#"
[session]
id = "mock-1"
name = "Mock Test 1"
candidate = "cand-7"

[[answers]]
file = "answers/example.json"

[[answers]]
file = "answers/q2.json"
"#,
    )
    .unwrap();

    let out = dir.path().join("out");
    bandscore()
        .current_dir(dir.path())
        .args(["session", "--manifest", "session.toml", "--format", "json,html", "--seed", "3"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Complete: 2/2 scored, 0 failed"));

    assert_eq!(files_with_extension(&out, "html").len(), 1);
    let json = files_with_extension(&out, "json");
    assert_eq!(json.len(), 1);
    assert!(json[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("session-mock-1-"));

    let report = SessionReport::load_json(&json[0]).unwrap();
    assert_eq!(report.session.candidate.as_deref(), Some("cand-7"));
    assert_eq!(report.answers.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.answers[0].answer_id, "example");
    let pronunciation = report.answers[1]
        .result(Criterion::Pronunciation)
        .unwrap();
    assert_eq!(pronunciation.readable_feedback, NO_AUDIO_MESSAGE);
}

#[test]
fn backends_marks_active() {
    let dir = initialized_dir();

    bandscore()
        .current_dir(dir.path())
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded"))
        .stdout(predicate::str::contains("*"));
}

/// A session report with the given criterion bands and a fixed overall band.
fn session_report(bands: [f64; 4]) -> SessionReport {
    let criteria: Vec<CriterionSummary> = Criterion::ALL
        .into_iter()
        .zip(bands)
        .map(|(criterion, band)| CriterionSummary {
            criterion,
            band: Band::from_score(band),
            feedback: String::new(),
            answers: 1,
        })
        .collect();
    SessionReport {
        id: uuid::Uuid::new_v4(),
        created_at: chrono::Utc::now(),
        session: SessionSummary {
            id: "mock".into(),
            name: "Mock".into(),
            candidate: None,
            answer_count: 1,
        },
        answers: vec![],
        failed: vec![],
        overall: OverallEvaluationResult {
            overall_band: Band::from_score(6.0),
            overall_feedback: String::new(),
            criteria,
        },
        duration_ms: 1,
    }
}

fn write_reports(dir: &Path, baseline: [f64; 4], current: [f64; 4]) -> (PathBuf, PathBuf) {
    let baseline_path = dir.join("baseline.json");
    let current_path = dir.join("current.json");
    session_report(baseline).save_json(&baseline_path).unwrap();
    session_report(current).save_json(&current_path).unwrap();
    (baseline_path, current_path)
}

#[test]
fn compare_reports() {
    let dir = TempDir::new().unwrap();
    let (baseline, current) = write_reports(dir.path(), [7.0, 6.0, 6.0, 6.0], [6.0, 6.0, 6.5, 6.0]);

    bandscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .assert()
        .success()
        .stdout(predicate::str::contains("Band comparison for Mock"))
        .stdout(predicate::str::contains("Fluency & Coherence dropped 1.0 bands (7.0 -> 6.0)"))
        .stdout(predicate::str::contains("Lexical Resource rose 0.5 bands (6.0 -> 6.5)"))
        .stdout(predicate::str::contains("1 regressions, 1 improvements at a 0.5-band threshold"));
}

#[test]
fn compare_names_the_candidate_and_skips_unshared_criteria() {
    let dir = TempDir::new().unwrap();
    let baseline_path = dir.path().join("baseline.json");
    let current_path = dir.path().join("current.json");

    let mut baseline = session_report([6.0, 6.0, 6.0, 6.0]);
    baseline.session.candidate = Some("cand-7".into());
    let mut current = session_report([6.0, 6.0, 6.0, 5.0]);
    current.session.candidate = Some("cand-7".into());
    current
        .overall
        .criteria
        .retain(|s| s.criterion != Criterion::Pronunciation);
    baseline.save_json(&baseline_path).unwrap();
    current.save_json(&current_path).unwrap();

    bandscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline_path)
        .arg("--current")
        .arg(&current_path)
        .arg("--fail-on-regression")
        .assert()
        .success()
        .stdout(predicate::str::contains("Band comparison for Mock (candidate cand-7)"))
        .stdout(predicate::str::contains("not assessed in both"))
        .stdout(predicate::str::contains("0 regressions, 0 improvements"));
}

#[test]
fn compare_fail_on_regression() {
    let dir = TempDir::new().unwrap();
    let (baseline, current) = write_reports(dir.path(), [7.0, 6.0, 6.0, 6.0], [6.0, 6.0, 6.0, 6.0]);

    bandscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .arg("--fail-on-regression")
        .assert()
        .code(1);
}

#[test]
fn compare_markdown_format() {
    let dir = TempDir::new().unwrap();
    let (baseline, current) = write_reports(dir.path(), [6.0, 6.0, 6.0, 6.0], [7.0, 6.0, 6.0, 6.0]);

    bandscore()
        .arg("compare")
        .arg("--baseline")
        .arg(&baseline)
        .arg("--current")
        .arg(&current)
        .args(["--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("### Improvements"))
        .stdout(predicate::str::contains("| fluency | 6.0 | 7.0 | +1.0 |"));
}

#[test]
fn compare_nonexistent_report() {
    bandscore()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}
