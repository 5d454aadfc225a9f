//! Integration tests for `satbench run`.
//!
//! The solver is a small `sh` script that answers from markers embedded in
//! each case file, so these tests only run on unix.

#![cfg(unix)]
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FAKE_SOLVER: &str = r#"input=$(cat)
case "$input" in
  *expect-timeout*) sleep 30 ;;
  *expect-unsat*) echo "c done"; echo "UNSAT" ;;
  *expect-garbage*) echo "no idea" ;;
  *) echo "c comment"; echo "IS SAT"; echo "v 1 -2 3 0" ;;
esac"#;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// 3 satisfiable cases at 91 clauses and 2 unsatisfiable at 218.
fn small_corpus(root: &Path) {
    for i in 1..=3 {
        write(root, &format!("91_clauses/uf20-0{i}.cnf"), "p cnf 20 91\n");
    }
    for i in 1..=2 {
        write(
            root,
            &format!("218_clauses/unsatisfiable/uuf50-0{i}.cnf"),
            "c expect-unsat\np cnf 50 218\n",
        );
    }
}

fn satbench() -> Command {
    Command::cargo_bin("satbench").expect("failed to find satbench binary")
}

fn with_fake_solver(cmd: &mut Command) -> &mut Command {
    cmd.args(["--", "sh", "-c", FAKE_SOLVER])
}

fn read_report(path: &Path) -> serde_json::Value {
    let content = fs::read_to_string(path).expect("report should exist");
    serde_json::from_str(&content).expect("report should be valid JSON")
}

#[test]
fn test_run_small_corpus() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    small_corpus(&corpus);
    let out = temp_dir.path().join("results/report.json");

    let mut cmd = satbench();
    cmd.arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--timeout")
        .arg("20");
    with_fake_solver(&mut cmd)
        .assert()
        .success()
        .stderr(predicate::str::contains("....."))
        .stderr(predicate::str::contains("report written to"));

    let report = read_report(&out);
    assert_eq!(report["schema"], "satbench.report.v1");
    assert_eq!(report["cases"], 5);
    assert_eq!(report["interrupted"], false);
    assert_eq!(report["solver"]["timeout_secs"], 20.0);

    let sat = &report["results"]["91_clauses"]["satisfiable"];
    assert_eq!(sat["total"], 3);
    assert_eq!(sat["correct"], 3);
    assert_eq!(sat["timeouts"], 0);
    assert_eq!(sat["accuracy"], 100.0);

    let unsat = &report["results"]["218_clauses"]["unsatisfiable"];
    assert_eq!(unsat["total"], 2);
    assert_eq!(unsat["accuracy"], 100.0);

    assert_eq!(report["results"].as_object().unwrap().len(), 2);
}

#[test]
fn test_run_timeout_records_exact_budget() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    write(&corpus, "500_clauses/unsatisfiable/hard.cnf", "c expect-timeout\n");
    let out = temp_dir.path().join("report.json");

    let mut cmd = satbench();
    cmd.arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--timeout")
        .arg("1");
    with_fake_solver(&mut cmd).assert().success();

    let g = &read_report(&out)["results"]["500_clauses"]["unsatisfiable"];
    assert_eq!(g["timeouts"], 1);
    assert_eq!(g["correct"], 0);
    assert_eq!(g["average_time"], 1.0);
    assert_eq!(g["median_time"], 1.0);
    assert_eq!(g["accuracy"], 0.0);
}

#[test]
fn test_run_with_jobs_counts_incorrect() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    small_corpus(&corpus);
    write(&corpus, "91_clauses/noise.cnf", "c expect-garbage\n");
    let out = temp_dir.path().join("report.json");

    let mut cmd = satbench();
    cmd.arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--jobs")
        .arg("3");
    with_fake_solver(&mut cmd).assert().success();

    let report = read_report(&out);
    assert_eq!(report["solver"]["jobs"], 3);
    let sat = &report["results"]["91_clauses"]["satisfiable"];
    assert_eq!(sat["total"], 4);
    assert_eq!(sat["incorrect"], 1);
    assert_eq!(sat["accuracy"], 75.0);
}

#[test]
fn test_run_compact_output_is_single_line() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    small_corpus(&corpus);
    let out = temp_dir.path().join("report.json");

    let mut cmd = satbench();
    cmd.arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--compact");
    with_fake_solver(&mut cmd).assert().success();

    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(content.trim_end().lines().count(), 1);
}

#[test]
fn test_run_reads_defaults_from_config_in_cwd() {
    let temp_dir = tempdir().unwrap();
    small_corpus(&temp_dir.path().join("corpus"));
    fs::write(temp_dir.path().join("solver.sh"), FAKE_SOLVER).unwrap();
    fs::write(
        temp_dir.path().join("satbench.toml"),
        r#"[defaults]
timeout = "15s"
jobs = 2
corpus_dir = "corpus"
out = "out/results.json"
solver = ["sh", "solver.sh"]
"#,
    )
    .unwrap();

    satbench()
        .current_dir(temp_dir.path())
        .arg("run")
        .assert()
        .success();

    let report = read_report(&temp_dir.path().join("out/results.json"));
    assert_eq!(report["solver"]["timeout_secs"], 15.0);
    assert_eq!(report["solver"]["jobs"], 2);
    assert_eq!(report["solver"]["command"][1], "solver.sh");
    assert_eq!(report["cases"], 5);
}

#[test]
fn test_run_cli_flags_override_config() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    small_corpus(&corpus);
    let config = temp_dir.path().join("custom.toml");
    fs::write(&config, "[defaults]\ntimeout = \"15s\"\njobs = 4\n").unwrap();
    let out = temp_dir.path().join("report.json");

    let mut cmd = satbench();
    cmd.arg("--config")
        .arg(&config)
        .arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--timeout")
        .arg("3");
    with_fake_solver(&mut cmd).assert().success();

    let report = read_report(&out);
    assert_eq!(report["solver"]["timeout_secs"], 3.0);
    assert_eq!(report["solver"]["jobs"], 4);
}

#[test]
fn test_run_missing_corpus_fails() {
    let temp_dir = tempdir().unwrap();
    let out = temp_dir.path().join("report.json");

    let mut cmd = satbench();
    cmd.arg("run")
        .arg("--corpus")
        .arg(temp_dir.path().join("absent"))
        .arg("--out")
        .arg(&out);
    with_fake_solver(&mut cmd)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to scan corpus"));

    assert!(!out.exists());
}

#[test]
fn test_run_unspawnable_solver_fails() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    small_corpus(&corpus);
    let out = temp_dir.path().join("report.json");

    satbench()
        .arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .arg("--")
        .arg("/definitely/not/a/solver")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to spawn"));

    assert!(!out.exists());
}

#[test]
fn test_run_rejects_bad_timeout() {
    satbench()
        .args(["run", "--timeout", "whenever", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid duration"));
}

#[test]
fn test_run_rejects_zero_jobs() {
    satbench()
        .args(["run", "--jobs", "0", "--", "true"])
        .assert()
        .failure();
}

#[test]
fn test_run_bad_config_fails() {
    let temp_dir = tempdir().unwrap();
    let config = temp_dir.path().join("broken.toml");
    fs::write(&config, "[defaults\n").unwrap();

    satbench()
        .arg("--config")
        .arg(&config)
        .args(["run", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse config"));
}

#[test]
fn test_run_finds_marker_after_long_comment_output() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    write(&corpus, "91_clauses/chatty.cnf", "p cnf 20 91\n");
    let out = temp_dir.path().join("report.json");

    // Well over 64 KiB of `c` lines before the answer.
    let chatty = r#"cat >/dev/null
i=0
while [ $i -lt 3000 ]; do
  echo "c restart $i: learnt clauses pending, trail reorganised"
  i=$((i + 1))
done
echo "IS SAT""#;

    satbench()
        .arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .args(["--timeout", "30", "--", "sh", "-c", chatty])
        .assert()
        .success();

    let g = &read_report(&out)["results"]["91_clauses"]["satisfiable"];
    assert_eq!(g["correct"], 1);
    assert_eq!(g["incorrect"], 0);
}

#[test]
fn test_run_background_child_cannot_outlast_timeout() {
    let temp_dir = tempdir().unwrap();
    let corpus = temp_dir.path().join("benchmarks");
    write(&corpus, "91_clauses/a.cnf", "p cnf 20 91\n");
    let out = temp_dir.path().join("report.json");

    let start = std::time::Instant::now();
    satbench()
        .arg("run")
        .arg("--corpus")
        .arg(&corpus)
        .arg("--out")
        .arg(&out)
        .args([
            "--timeout",
            "1",
            "--",
            "sh",
            "-c",
            "cat >/dev/null; sleep 30 & echo 'IS SAT'",
        ])
        .assert()
        .success();
    assert!(start.elapsed() < std::time::Duration::from_secs(15));

    let g = &read_report(&out)["results"]["91_clauses"]["satisfiable"];
    assert_eq!(g["timeouts"], 1);
    assert_eq!(g["correct"], 0);
    assert_eq!(g["average_time"], 1.0);
}

#[test]
fn test_run_rejects_out_of_range_timeout() {
    satbench()
        .args(["run", "--timeout", "1e30", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeout out of range"));

    let temp_dir = tempdir().unwrap();
    fs::write(
        temp_dir.path().join("satbench.toml"),
        "[defaults]\ntimeout = \"1e30\"\n",
    )
    .unwrap();
    satbench()
        .current_dir(temp_dir.path())
        .args(["run", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timeout out of range"));
}
