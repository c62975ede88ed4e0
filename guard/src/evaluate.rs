//! Guard evaluation for one stone: reviews, then judges, then passage.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::context::GuardContext;
use crate::core::mechanism::{JudgeCommand, Mechanism};
use crate::core::policy::{PolicyInput, decide_passage, evaluate_policy};
use crate::core::types::{JudgeArtifact, Passage, ReviewArtifact};
use crate::io::commands::CommandRunner;
use crate::io::hashing::compute_review_input_hash;
use crate::io::ledger::{get_approval, get_promises, has_invalidated_promise};
use crate::judge::{classify_judges, run_judges};
use crate::progress::ProgressSink;
use crate::review::{ReviewOptions, run_reviews_at};

/// Options for [`evaluate_guard`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    /// Re-run reviews even when artifacts exist at the current hash.
    pub rerun: bool,
}

/// Result of evaluating a stone's guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEvaluation {
    pub stone: String,
    /// `None` when the stone has no guard.
    pub review_hash: Option<String>,
    pub reviews: Vec<ReviewArtifact>,
    pub judges: Vec<JudgeArtifact>,
    pub passage: Passage,
}

/// Evaluate whether `stone_name` may be passed.
///
/// Input errors (unknown stone, bad guard, unknown mechanism, empty artifact
/// set) are returned before any command runs. Command failures are recorded in
/// artifacts and surface as a blocked passage.
#[instrument(skip(ctx, options))]
pub fn evaluate_guard<R: CommandRunner, P: ProgressSink>(
    ctx: &GuardContext<'_, R, P>,
    stone_name: &str,
    options: EvaluateOptions,
) -> Result<GuardEvaluation> {
    let stone = ctx.route.load_stone(stone_name)?;
    let Some(guard) = &stone.guard else {
        info!("stone has no guard, passage allowed");
        return Ok(GuardEvaluation {
            stone: stone.name.clone(),
            review_hash: None,
            reviews: Vec::new(),
            judges: Vec::new(),
            passage: Passage::allowed(),
        });
    };

    let thresholds = ctx.config.thresholds();
    let commands = classify_judges(guard, thresholds)?;
    let review_hash = compute_review_input_hash(ctx.route, &stone)?;

    let reviews = run_reviews_at(
        ctx,
        &stone,
        &review_hash,
        ReviewOptions {
            rerun: options.rerun,
        },
    )?;
    let review_iteration = reviews.iter().map(|r| r.iteration).max().unwrap_or(0);
    let judges = run_judges(ctx, &stone, &review_hash, review_iteration)?;

    let promises = get_promises(ctx.route, &stone.name, &review_hash)?;
    let mut invalidated = Vec::new();
    for slug in &guard.promises {
        if promises.iter().any(|p| &p.slug == slug) {
            continue;
        }
        if has_invalidated_promise(ctx.route, &stone.name, slug, &review_hash)? {
            warn!(slug = %slug, "promise was made for older content");
            invalidated.push(slug.clone());
        }
    }
    let approval = get_approval(ctx.route, &stone.name)?;

    let judged_reviews = commands
        .iter()
        .any(|c| matches!(c, JudgeCommand::Builtin(Mechanism::Reviewed(_))));
    let require_approval = commands
        .iter()
        .any(|c| matches!(c, JudgeCommand::Builtin(Mechanism::Approved)));
    let policy = evaluate_policy(&PolicyInput {
        reviews: &reviews,
        thresholds: (!judged_reviews).then_some(thresholds),
        require_approval,
        approval: approval.as_ref(),
        required_promises: &guard.promises,
        promises: &promises,
        invalidated_promises: &invalidated,
    });
    let passage = decide_passage(&policy, &judges);

    if passage.allowed {
        info!(hash = %review_hash, "passage allowed");
    } else {
        info!(
            hash = %review_hash,
            reason = passage.reason.as_deref().unwrap_or(""),
            "passage blocked"
        );
    }
    Ok(GuardEvaluation {
        stone: stone.name.clone(),
        review_hash: Some(review_hash),
        reviews,
        judges,
        passage,
    })
}
