//! Review runner.
//!
//! Each review command runs at most once per review-input-hash: an existing
//! artifact for (stone, hash, index) is reused without executing anything.

use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::context::GuardContext;
use crate::core::keys::ReviewKey;
use crate::core::parse::{Footer, parse_review_counts};
use crate::core::template::{TemplateVars, render};
use crate::core::types::{GuardProgressEvent, GuardStep, ReviewArtifact, StepOutcome, Stone};
use crate::io::commands::CommandRunner;
use crate::io::hashing::compute_review_input_hash;
use crate::io::store::ArtifactStore;
use crate::progress::ProgressSink;

/// Knobs for a review pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewOptions {
    /// Ignore cached artifacts and run every review again at the same hash.
    pub rerun: bool,
}

/// Hash the stone's artifacts and run (or reuse) every review.
pub fn run_reviews<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    stone: &Stone,
) -> Result<Vec<ReviewArtifact>> {
    let hash = compute_review_input_hash(ctx.route, stone)?;
    run_reviews_at(ctx, stone, &hash, ReviewOptions::default())
}

/// Run (or reuse) every review of `stone` at an already computed hash.
///
/// Returns one artifact per review command, in declared order.
#[instrument(skip_all, fields(stone = %stone.name, hash = %hash))]
pub fn run_reviews_at<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    stone: &Stone,
    hash: &str,
    options: ReviewOptions,
) -> Result<Vec<ReviewArtifact>> {
    let Some(guard) = &stone.guard else {
        return Ok(Vec::new());
    };
    let store = ctx.store();
    let mut artifacts = Vec::with_capacity(guard.reviews.len());
    for (position, template) in guard.reviews.iter().enumerate() {
        let index = step_index(position)?;
        let step = GuardStep::review(index);
        if !options.rerun
            && let Some(existing) = store.find_review(&stone.name, hash, index)?
        {
            debug!(%step, iteration = existing.iteration, "reusing review");
            ctx.progress
                .on_progress(&GuardProgressEvent::cached(&stone.name, step));
            artifacts.push(existing);
            continue;
        }
        artifacts.push(run_review(ctx, &store, stone, hash, step, template)?);
    }
    Ok(artifacts)
}

fn run_review<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    store: &ArtifactStore,
    stone: &Stone,
    hash: &str,
    step: GuardStep,
    template: &str,
) -> Result<ReviewArtifact> {
    let key = ReviewKey {
        stone: stone.name.clone(),
        iteration: store.next_review_iteration(&stone.name, hash)?,
        hash: hash.to_string(),
        index: step.index,
    };
    let path = store.path_for(&key.file_name());
    store.ensure_dir()?;

    let route_arg = ctx.route_arg();
    let output_arg = path.to_string_lossy();
    let command = render(
        template,
        &TemplateVars {
            stone: &stone.name,
            route: &route_arg,
            hash,
            output: &output_arg,
        },
    );

    let began_at = SystemTime::now();
    ctx.progress
        .on_progress(&GuardProgressEvent::began(&stone.name, step, began_at));
    let output = ctx.execute(command);

    let body = ctx.artifact_body(&path, &output);
    let mut counts = parse_review_counts(&body);
    if !output.success() {
        counts.blockers = counts.blockers.max(1);
    }
    let footer = Footer {
        exit_code: output.exit_code,
        timed_out: output.timed_out,
        ..Footer::for_review(counts)
    };
    store
        .write(&path, &format!("{body}{}", footer.render()))
        .with_context(|| format!("record review {step} for {}", stone.name))?;

    info!(
        %step,
        iteration = key.iteration,
        blockers = counts.blockers,
        nitpicks = counts.nitpicks,
        success = output.success(),
        "review recorded"
    );
    ctx.progress.on_progress(&GuardProgressEvent::finished(
        &stone.name,
        step,
        began_at,
        SystemTime::now(),
        StepOutcome {
            path: path.clone(),
            review: Some(counts),
            judge: None,
        },
    ));

    Ok(ReviewArtifact {
        stone: key.stone,
        hash: key.hash,
        iteration: key.iteration,
        index: key.index,
        path,
        blockers: counts.blockers,
        nitpicks: counts.nitpicks,
    })
}

/// 1-based command index for a position in a guard list.
pub(crate) fn step_index(position: usize) -> Result<u32> {
    u32::try_from(position + 1).context("too many guard commands")
}
