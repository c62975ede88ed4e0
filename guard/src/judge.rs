//! Judge runner.
//!
//! Judges are keyed by both the review-input-hash and the judge-input-hash, so
//! a new approval or promise re-runs them even when content is unchanged.
//! Only passed artifacts are reused; a failure is always observed again.

use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::context::GuardContext;
use crate::core::keys::JudgeKey;
use crate::core::mechanism::{JudgeCommand, Mechanism, classify_judge};
use crate::core::parse::{Footer, has_passed_marker, parse_judge_verdict};
use crate::core::policy::{Thresholds, judge_approved, judge_reviewed};
use crate::core::template::{TemplateVars, render};
use crate::core::types::{
    Guard, GuardProgressEvent, GuardStep, JudgeArtifact, StepOutcome, Stone, Verdict,
};
use crate::io::commands::CommandRunner;
use crate::io::hashing::compute_judge_input_hash;
use crate::io::ledger::get_approval;
use crate::io::route::Route;
use crate::io::store::ArtifactStore;
use crate::progress::ProgressSink;
use crate::review::step_index;

/// Classify every judge template; an unknown mechanism is an input error.
pub fn classify_judges(guard: &Guard, defaults: Thresholds) -> Result<Vec<JudgeCommand>> {
    guard
        .judges
        .iter()
        .enumerate()
        .map(|(position, template)| {
            classify_judge(template, defaults)
                .with_context(|| format!("judge j{} ({template:?})", position + 1))
        })
        .collect()
}

/// Run (or reuse) every judge of `stone` against the reviews at `review_hash`.
///
/// `review_iteration` is recorded in filenames to tie each judge to the
/// review pass it observed; a passed judge is only reused for that same pass.
#[instrument(skip_all, fields(stone = %stone.name, review_hash = %review_hash))]
pub fn run_judges<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    stone: &Stone,
    review_hash: &str,
    review_iteration: u32,
) -> Result<Vec<JudgeArtifact>> {
    let Some(guard) = &stone.guard else {
        return Ok(Vec::new());
    };
    let commands = classify_judges(guard, ctx.config.thresholds())?;
    let judge_hash = compute_judge_input_hash(ctx.route, &stone.name, review_hash)?;
    let store = ctx.store();

    let mut judge_iteration = None;
    let mut artifacts = Vec::with_capacity(commands.len());
    for (position, command) in commands.iter().enumerate() {
        let index = step_index(position)?;
        let step = GuardStep::judge(index);
        if let Some(existing) = store.find_passed_judge(
            &stone.name,
            review_hash,
            review_iteration,
            &judge_hash,
            index,
        )? {
            debug!(%step, judge_iteration = existing.judge_iteration, "reusing passed judge");
            ctx.progress
                .on_progress(&GuardProgressEvent::cached(&stone.name, step));
            artifacts.push(existing);
            continue;
        }

        let iteration = match judge_iteration {
            Some(n) => n,
            None => {
                let n = store.next_judge_iteration(&stone.name, review_hash, &judge_hash)?;
                judge_iteration = Some(n);
                n
            }
        };
        let key = JudgeKey {
            stone: stone.name.clone(),
            review_iteration,
            judge_iteration: iteration,
            review_hash: review_hash.to_string(),
            judge_hash: judge_hash.clone(),
            index,
        };
        artifacts.push(run_judge(ctx, &store, stone, step, command, key)?);
    }
    Ok(artifacts)
}

fn run_judge<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    store: &ArtifactStore,
    stone: &Stone,
    step: GuardStep,
    command: &JudgeCommand,
    key: JudgeKey,
) -> Result<JudgeArtifact> {
    let path = store.path_for(&key.file_name());
    store.ensure_dir()?;

    let began_at = SystemTime::now();
    ctx.progress
        .on_progress(&GuardProgressEvent::began(&stone.name, step, began_at));

    let (verdict, contents) = match command {
        JudgeCommand::Builtin(mechanism) => {
            let verdict = evaluate_mechanism(ctx.route, stone, *mechanism, &key.review_hash)?;
            let body = format!(
                "# {mechanism}\n\npassed: {}\nreason: {}\n",
                verdict.passed,
                verdict.reason.as_deref().unwrap_or("")
            );
            let footer = Footer::for_judge(&verdict);
            (verdict, format!("{body}{}", footer.render()))
        }
        JudgeCommand::Shell(template) => {
            let route_arg = ctx.route_arg();
            let output_arg = path.to_string_lossy();
            let rendered = render(
                template,
                &TemplateVars {
                    stone: &stone.name,
                    route: &route_arg,
                    hash: &key.judge_hash,
                    output: &output_arg,
                },
            );
            let output = ctx.execute(rendered);
            let body = ctx.artifact_body(&path, &output);
            let mut verdict = parse_judge_verdict(&body, Some(output.success()));
            if !verdict.passed && verdict.reason.is_none() {
                verdict.reason = Some(if has_passed_marker(&body) {
                    "judge reported passed: false without a reason".to_string()
                } else {
                    output.exit_summary(&ctx.config.limits())
                });
            }
            let footer = Footer {
                exit_code: output.exit_code,
                timed_out: output.timed_out,
                ..Footer::for_judge(&verdict)
            };
            (verdict, format!("{body}{}", footer.render()))
        }
    };

    store
        .write(&path, &contents)
        .with_context(|| format!("record judge {step} for {}", stone.name))?;
    info!(
        %step,
        judge_iteration = key.judge_iteration,
        passed = verdict.passed,
        reason = verdict.reason.as_deref().unwrap_or(""),
        "judge recorded"
    );
    ctx.progress.on_progress(&GuardProgressEvent::finished(
        &stone.name,
        step,
        began_at,
        SystemTime::now(),
        StepOutcome {
            path: path.clone(),
            review: None,
            judge: Some(verdict.clone()),
        },
    ));

    Ok(JudgeArtifact {
        stone: key.stone,
        review_hash: key.review_hash,
        judge_hash: key.judge_hash,
        review_iteration: key.review_iteration,
        judge_iteration: key.judge_iteration,
        index: key.index,
        path,
        passed: verdict.passed,
        reason: verdict.reason,
    })
}

/// Evaluate a built-in mechanism against the recorded state of `stone`.
///
/// `reviewed?` sums the latest review per declared review command at
/// `review_hash`; `approved?` checks for an approval file.
pub fn evaluate_mechanism(
    route: &Route,
    stone: &Stone,
    mechanism: Mechanism,
    review_hash: &str,
) -> Result<Verdict> {
    match mechanism {
        Mechanism::Approved => Ok(judge_approved(get_approval(route, &stone.name)?.as_ref())),
        Mechanism::Reviewed(thresholds) => {
            let declared = stone.guard.as_ref().map_or(0, |g| g.reviews.len());
            let reviews: Vec<_> = ArtifactStore::new(route)
                .latest_reviews(&stone.name, review_hash)?
                .into_iter()
                .filter(|review| usize::try_from(review.index).is_ok_and(|i| i <= declared))
                .collect();
            Ok(judge_reviewed(&reviews, thresholds))
        }
    }
}
