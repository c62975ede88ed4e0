//! Passage policy: review thresholds, approval and promises.
//!
//! Pure functions over already-loaded artifacts. The first failing condition
//! becomes the reason string.

use crate::core::format::count_label;
use crate::core::types::{
    ApprovalArtifact, JudgeArtifact, Passage, PromiseArtifact, ReviewArtifact, ReviewCounts,
    Verdict,
};

/// Maximum tolerated blocker/nitpick totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub allow_blockers: u32,
    pub allow_nitpicks: u32,
}

/// Sum counts across review artifacts.
pub fn sum_counts(reviews: &[ReviewArtifact]) -> ReviewCounts {
    reviews.iter().fold(ReviewCounts::default(), |acc, review| ReviewCounts {
        blockers: acc.blockers.saturating_add(review.blockers),
        nitpicks: acc.nitpicks.saturating_add(review.nitpicks),
    })
}

/// The `reviewed?` mechanism.
pub fn judge_reviewed(reviews: &[ReviewArtifact], thresholds: Thresholds) -> Verdict {
    let totals = sum_counts(reviews);
    if totals.blockers > thresholds.allow_blockers {
        return Verdict::fail(format!(
            "too many blockers: {} > {} allowed",
            totals.blockers, thresholds.allow_blockers
        ));
    }
    if totals.nitpicks > thresholds.allow_nitpicks {
        return Verdict::fail(format!(
            "too many nitpicks: {} > {} allowed",
            totals.nitpicks, thresholds.allow_nitpicks
        ));
    }
    Verdict::pass(format!(
        "{} and {} within thresholds",
        count_label(totals.blockers, "blocker"),
        count_label(totals.nitpicks, "nitpick")
    ))
}

/// The `approved?` mechanism.
pub fn judge_approved(approval: Option<&ApprovalArtifact>) -> Verdict {
    match approval {
        Some(_) => Verdict::pass("approved"),
        None => Verdict::fail("not yet approved by a human"),
    }
}

/// Inputs for the combined policy decision.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub reviews: &'a [ReviewArtifact],
    /// `None` when a `reviewed?` judge owns the threshold decision.
    pub thresholds: Option<Thresholds>,
    pub require_approval: bool,
    pub approval: Option<&'a ApprovalArtifact>,
    pub required_promises: &'a [String],
    /// Promises recorded at the current review-input-hash.
    pub promises: &'a [PromiseArtifact],
    /// Required slugs that were promised under an older hash.
    pub invalidated_promises: &'a [String],
}

/// Combine review totals, approval and promises into one verdict.
pub fn evaluate_policy(input: &PolicyInput<'_>) -> Verdict {
    if let Some(thresholds) = input.thresholds {
        let verdict = judge_reviewed(input.reviews, thresholds);
        if !verdict.passed {
            return verdict;
        }
    }
    if input.require_approval && input.approval.is_none() {
        return judge_approved(None);
    }
    for slug in input.required_promises {
        if input.promises.iter().any(|p| &p.slug == slug) {
            continue;
        }
        if input.invalidated_promises.contains(slug) {
            return Verdict::fail(format!(
                "self-review '{slug}' was promised before the content changed; promise it again"
            ));
        }
        return Verdict::fail(format!("self-review '{slug}' has not been promised"));
    }
    Verdict::pass("policy satisfied")
}

/// Final passage: the policy must pass and every judge artifact must pass.
pub fn decide_passage(policy: &Verdict, judges: &[JudgeArtifact]) -> Passage {
    if !policy.passed {
        return Passage::blocked(
            policy
                .reason
                .clone()
                .unwrap_or_else(|| "policy failed".to_string()),
        );
    }
    match judges.iter().find(|judge| !judge.passed) {
        Some(judge) => Passage::blocked(match &judge.reason {
            Some(reason) => format!("judge j{} failed: {reason}", judge.index),
            None => format!("judge j{} failed", judge.index),
        }),
        None => Passage::allowed(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn review(index: u32, blockers: u32, nitpicks: u32) -> ReviewArtifact {
        ReviewArtifact {
            stone: "1.vision".to_string(),
            hash: "abcd".to_string(),
            iteration: 1,
            index,
            path: PathBuf::from(format!("r{index}.md")),
            blockers,
            nitpicks,
        }
    }

    fn judge(index: u32, passed: bool, reason: Option<&str>) -> JudgeArtifact {
        JudgeArtifact {
            stone: "1.vision".to_string(),
            review_hash: "abcd".to_string(),
            judge_hash: "ef01".to_string(),
            review_iteration: 1,
            judge_iteration: 1,
            index,
            path: PathBuf::from(format!("j{index}.md")),
            passed,
            reason: reason.map(str::to_string),
        }
    }

    fn input<'a>(reviews: &'a [ReviewArtifact]) -> PolicyInput<'a> {
        PolicyInput {
            reviews,
            thresholds: Some(Thresholds::default()),
            require_approval: false,
            approval: None,
            required_promises: &[],
            promises: &[],
            invalidated_promises: &[],
        }
    }

    #[test]
    fn reviewed_fails_when_blockers_exceed_threshold() {
        let verdict = judge_reviewed(&[review(1, 1, 0)], Thresholds::default());
        assert!(!verdict.passed);
        assert!(verdict.reason.as_deref().unwrap_or_default().contains("1 > 0"));
    }

    #[test]
    fn reviewed_passes_clean_reviews() {
        let verdict = judge_reviewed(&[review(1, 0, 0)], Thresholds::default());
        assert!(verdict.passed);
    }

    #[test]
    fn reviewed_sums_across_reviews() {
        let thresholds = Thresholds {
            allow_blockers: 0,
            allow_nitpicks: 2,
        };
        let verdict = judge_reviewed(&[review(1, 0, 2), review(2, 0, 1)], thresholds);
        assert!(!verdict.passed);
        assert!(verdict.reason.unwrap_or_default().contains("3 > 2"));
    }

    #[test]
    fn approved_requires_artifact() {
        let approval = ApprovalArtifact {
            stone: "1.vision".to_string(),
            path: PathBuf::from("1.vision.guard.approved.md"),
        };
        assert!(judge_approved(Some(&approval)).passed);
        assert!(!judge_approved(None).passed);
    }

    #[test]
    fn policy_reports_first_failing_condition() {
        let reviews = [review(1, 2, 0)];
        let mut policy = input(&reviews);
        policy.require_approval = true;
        let verdict = evaluate_policy(&policy);
        assert!(verdict.reason.unwrap_or_default().contains("blockers"));

        let clean = [review(1, 0, 0)];
        let mut policy = input(&clean);
        policy.require_approval = true;
        let verdict = evaluate_policy(&policy);
        assert!(verdict.reason.unwrap_or_default().contains("approved"));
    }

    #[test]
    fn policy_skips_thresholds_owned_by_judge() {
        let reviews = [review(1, 5, 5)];
        let mut policy = input(&reviews);
        policy.thresholds = None;
        assert!(evaluate_policy(&policy).passed);
    }

    #[test]
    fn policy_flags_stale_promises() {
        let required = vec!["self-review".to_string()];
        let reviews = [];
        let mut policy = input(&reviews);
        policy.required_promises = &required;
        let verdict = evaluate_policy(&policy);
        assert!(verdict.reason.unwrap_or_default().contains("not been promised"));

        policy.invalidated_promises = &required;
        let verdict = evaluate_policy(&policy);
        assert!(verdict.reason.unwrap_or_default().contains("before the content changed"));
    }

    #[test]
    fn passage_requires_every_judge() {
        let policy = Verdict::pass("ok");
        assert!(decide_passage(&policy, &[judge(1, true, None)]).allowed);

        let passage = decide_passage(
            &policy,
            &[judge(1, true, None), judge(2, false, Some("missing tests"))],
        );
        assert!(!passage.allowed);
        assert_eq!(passage.reason.as_deref(), Some("judge j2 failed: missing tests"));
    }

    #[test]
    fn passage_blocked_by_policy_has_reason() {
        let passage = decide_passage(&Verdict::fail("too many blockers: 1 > 0 allowed"), &[]);
        assert!(!passage.allowed);
        assert!(passage.reason.is_some());
    }
}
