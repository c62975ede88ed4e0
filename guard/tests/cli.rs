//! CLI tests for the `guard` binary.
//!
//! Spawns the binary against a temp route and checks exit codes and the
//! `passed:`/`reason:` lines shell judges rely on.

use std::process::{Command, Output};

use guard::exit_codes;
use guard::test_support::TestRoute;

fn guard_cmd(repo: &TestRoute, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_guard"))
        .arg("--route")
        .arg(repo.path())
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("run guard")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn route_with(guard: &str) -> TestRoute {
    let repo = TestRoute::new().expect("route");
    repo.write_stone("1.vision", Some(guard)).expect("stone");
    repo.write_file("1.vision.md", "# vision\n").expect("artifact");
    repo
}

#[test]
fn eval_allowed_exits_zero() {
    let repo = route_with("reviews = [\"echo '0 blockers'\"]\njudges = [\"reviewed?\"]\n");
    let output = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(output.status.code(), Some(exit_codes::ALLOWED));
    assert!(stdout(&output).contains("allowed: 1.vision"));
}

#[test]
fn eval_blocked_exits_with_blocked_code() {
    let repo = route_with("reviews = [\"echo '2 blockers'\"]\n");
    let output = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert!(stdout(&output).contains("reason: too many blockers: 2 > 0 allowed"));
}

#[test]
fn unknown_stone_is_invalid() {
    let repo = TestRoute::new().expect("route");
    let output = guard_cmd(&repo, &["eval", "9.missing"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("stone not found"));
}

#[test]
fn usage_errors_are_invalid() {
    let repo = TestRoute::new().expect("route");
    let output = guard_cmd(&repo, &["eval"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn approve_flips_approved_judge() {
    let repo = route_with("judges = [\"approved?\"]\n");

    let before = guard_cmd(&repo, &["judge", "approved?", "1.vision"]);
    assert_eq!(before.status.code(), Some(exit_codes::BLOCKED));
    assert!(stdout(&before).starts_with("passed: false\n"));

    let approve = guard_cmd(&repo, &["approve", "1.vision", "--by", "tester"]);
    assert_eq!(approve.status.code(), Some(exit_codes::ALLOWED));

    let after = guard_cmd(&repo, &["judge", "approved?", "1.vision"]);
    assert_eq!(after.status.code(), Some(exit_codes::ALLOWED));
    assert!(stdout(&after).starts_with("passed: true\n"));

    let eval = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(eval.status.code(), Some(exit_codes::ALLOWED));
}

#[test]
fn judge_reviewed_uses_recorded_reviews_and_flags() {
    let repo = route_with("reviews = [\"echo '1 blocker'\"]\n");
    let eval = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(eval.status.code(), Some(exit_codes::BLOCKED));

    let strict = guard_cmd(&repo, &["judge", "reviewed?", "1.vision"]);
    assert_eq!(strict.status.code(), Some(exit_codes::BLOCKED));
    assert!(stdout(&strict).contains("reason: too many blockers: 1 > 0 allowed"));

    let lenient = guard_cmd(
        &repo,
        &["judge", "reviewed?", "1.vision", "--allow-blockers", "1"],
    );
    assert_eq!(lenient.status.code(), Some(exit_codes::ALLOWED));
}

#[test]
fn unknown_mechanism_is_invalid() {
    let repo = route_with("");
    let output = guard_cmd(&repo, &["judge", "signed?", "1.vision"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn promise_then_eval_passes() {
    let repo = route_with("promises = [\"self-review\"]\n");
    let blocked = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(blocked.status.code(), Some(exit_codes::BLOCKED));

    let promise = guard_cmd(&repo, &["promise", "1.vision", "self-review"]);
    assert_eq!(promise.status.code(), Some(exit_codes::ALLOWED));

    let allowed = guard_cmd(&repo, &["eval", "1.vision"]);
    assert_eq!(allowed.status.code(), Some(exit_codes::ALLOWED));
}

#[test]
fn hash_prints_both_hashes() {
    let repo = route_with("");
    let output = guard_cmd(&repo, &["hash", "1.vision"]);
    assert_eq!(output.status.code(), Some(exit_codes::ALLOWED));
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("review: "));
    assert!(lines[1].starts_with("judge: "));
    assert_eq!(lines[0].len(), "review: ".len() + 16);
}

#[test]
fn init_writes_config_once() {
    let repo = TestRoute::new().expect("route");
    let first = guard_cmd(&repo, &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::ALLOWED));
    assert!(repo.path().join("guard.toml").is_file());

    let again = guard_cmd(&repo, &["init"]);
    assert_eq!(again.status.code(), Some(exit_codes::INVALID));
    let forced = guard_cmd(&repo, &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::ALLOWED));
}

#[test]
fn list_marks_guarded_stones() {
    let repo = route_with("");
    repo.write_stone("2.plan", None).expect("stone");
    let output = guard_cmd(&repo, &["list"]);
    assert_eq!(stdout(&output), "1.vision\tguarded\n2.plan\topen\n");
}
