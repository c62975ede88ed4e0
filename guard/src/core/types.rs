//! Shared deterministic types for guard evaluation.
//!
//! These types define stable contracts between the hash engine, the artifact
//! store, the runners and the progress emitter. They carry no I/O handles.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Default artifact glob used when a guard declares none.
pub const DEFAULT_ARTIFACT_GLOB: &str = "$stone*.md";

/// A named milestone in a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stone {
    /// Unique slug, e.g. `1.vision`.
    pub name: String,
    /// Location of the stone's definition file (`<route>/<name>.stone`).
    pub path: PathBuf,
    pub guard: Option<Guard>,
}

/// Gate specification attached to a stone (`<route>/<name>.guard`, TOML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Guard {
    /// Glob patterns (relative to the route) whose files make up the stone's content.
    pub artifacts: Vec<String>,
    /// Review command templates, 1-indexed by position.
    pub reviews: Vec<String>,
    /// Judge command templates or built-in mechanisms, 1-indexed by position.
    pub judges: Vec<String>,
    /// Self-review slugs that must be promised at the current content hash.
    pub promises: Vec<String>,
}

impl Guard {
    /// Artifact globs with the default applied when none are declared.
    pub fn artifact_patterns(&self) -> Vec<String> {
        if self.artifacts.is_empty() {
            vec![DEFAULT_ARTIFACT_GLOB.to_string()]
        } else {
            self.artifacts.clone()
        }
    }
}

/// Which runner a progress step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Review,
    Judge,
}

impl Phase {
    /// Single-letter prefix used for command indices (`r1`, `j2`).
    pub fn index_prefix(self) -> char {
        match self {
            Phase::Review => 'r',
            Phase::Judge => 'j',
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Review => f.write_str("review"),
            Phase::Judge => f.write_str("judge"),
        }
    }
}

/// A single review or judge command position within a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuardStep {
    pub phase: Phase,
    /// 1-based position in `guard.reviews` or `guard.judges`.
    pub index: u32,
}

impl GuardStep {
    pub fn review(index: u32) -> Self {
        Self {
            phase: Phase::Review,
            index,
        }
    }

    pub fn judge(index: u32) -> Self {
        Self {
            phase: Phase::Judge,
            index,
        }
    }
}

impl fmt::Display for GuardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.phase, self.phase.index_prefix(), self.index)
    }
}

/// Blocker and nitpick counts reported by a review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCounts {
    pub blockers: u32,
    pub nitpicks: u32,
}

/// Pass/fail decision with an optional explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reason: Option<String>,
}

impl Verdict {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: Some(reason.into()),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

/// One recorded review execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewArtifact {
    pub stone: String,
    /// Review-input-hash at the time of the run.
    pub hash: String,
    pub iteration: u32,
    pub index: u32,
    pub path: PathBuf,
    pub blockers: u32,
    pub nitpicks: u32,
}

impl ReviewArtifact {
    pub fn counts(&self) -> ReviewCounts {
        ReviewCounts {
            blockers: self.blockers,
            nitpicks: self.nitpicks,
        }
    }
}

/// One recorded judge execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeArtifact {
    pub stone: String,
    pub review_hash: String,
    pub judge_hash: String,
    pub review_iteration: u32,
    pub judge_iteration: u32,
    pub index: u32,
    pub path: PathBuf,
    pub passed: bool,
    pub reason: Option<String>,
}

/// Record that self-review `slug` was completed at a given review-input-hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseArtifact {
    pub stone: String,
    pub slug: String,
    pub hash: String,
    pub path: PathBuf,
}

/// Human sign-off for a stone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalArtifact {
    pub stone: String,
    pub path: PathBuf,
}

/// Timing of an executing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflight {
    pub began_at: SystemTime,
    pub ended_at: Option<SystemTime>,
}

/// Terminal result of an executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub path: PathBuf,
    pub review: Option<ReviewCounts>,
    pub judge: Option<Verdict>,
}

/// Lifecycle position derived from which event fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    /// No execution happened; a prior artifact was reused.
    Cached,
    /// The command is running.
    Active,
    /// The command finished and its artifact is recorded.
    Done,
}

/// Ephemeral progress notification for one guard step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardProgressEvent {
    pub stone: String,
    pub step: GuardStep,
    pub inflight: Option<Inflight>,
    pub outcome: Option<StepOutcome>,
}

impl GuardProgressEvent {
    pub fn cached(stone: &str, step: GuardStep) -> Self {
        Self {
            stone: stone.to_string(),
            step,
            inflight: None,
            outcome: None,
        }
    }

    pub fn began(stone: &str, step: GuardStep, began_at: SystemTime) -> Self {
        Self {
            stone: stone.to_string(),
            step,
            inflight: Some(Inflight {
                began_at,
                ended_at: None,
            }),
            outcome: None,
        }
    }

    pub fn finished(
        stone: &str,
        step: GuardStep,
        began_at: SystemTime,
        ended_at: SystemTime,
        outcome: StepOutcome,
    ) -> Self {
        Self {
            stone: stone.to_string(),
            step,
            inflight: Some(Inflight {
                began_at,
                ended_at: Some(ended_at),
            }),
            outcome: Some(outcome),
        }
    }

    pub fn state(&self) -> ProgressState {
        match (&self.inflight, &self.outcome) {
            (_, Some(_)) => ProgressState::Done,
            (Some(_), None) => ProgressState::Active,
            (None, None) => ProgressState::Cached,
        }
    }
}

/// Overall allowed/blocked verdict for a stone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub allowed: bool,
    /// Always present when blocked.
    pub reason: Option<String>,
}

impl Passage {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}
