//! Review-input and judge-input hashes computed from files on disk.

use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

use crate::core::hash::{HashInput, judge_input_hash, review_input_hash};
use crate::core::template::{TemplateVars, render};
use crate::core::types::Stone;
use crate::io::files::{enumerate, portable};
use crate::io::ledger::ledger_state;
use crate::io::route::Route;

/// Hash the files matched by the stone's artifact globs.
///
/// A glob set matching nothing is an input error: an empty hash input almost
/// always means a misconfigured guard.
#[instrument(skip_all, fields(stone = %stone.name))]
pub fn compute_review_input_hash(route: &Route, stone: &Stone) -> Result<String> {
    let patterns: Vec<String> = stone
        .guard
        .clone()
        .unwrap_or_default()
        .artifact_patterns()
        .iter()
        .map(|pattern| {
            render(
                pattern,
                &TemplateVars {
                    stone: &stone.name,
                    ..TemplateVars::default()
                },
            )
        })
        .collect();

    let files = enumerate(route.root(), &patterns)?;
    if files.is_empty() {
        bail!(
            "no artifact files for stone {} match {:?} in {}",
            stone.name,
            patterns,
            route.root().display()
        );
    }

    let mut inputs = Vec::with_capacity(files.len());
    for rel in &files {
        let path = route.root().join(rel);
        let bytes = fs::read(&path).with_context(|| format!("read artifact {}", path.display()))?;
        inputs.push(HashInput {
            rel_path: portable(rel),
            bytes,
        });
    }
    let hash = review_input_hash(&inputs);
    debug!(files = files.len(), hash = %hash, "computed review-input-hash");
    Ok(hash)
}

/// Chain `review_hash` with the stone's current approval and promise state.
pub fn compute_judge_input_hash(route: &Route, stone: &str, review_hash: &str) -> Result<String> {
    let ledger = ledger_state(route, stone, review_hash)?;
    let hash = judge_input_hash(review_hash, &ledger);
    debug!(
        stone,
        approved = ledger.approved,
        promised = ledger.promised.len(),
        hash = %hash,
        "computed judge-input-hash"
    );
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Guard;
    use crate::io::ledger::{set_approved, set_promised};

    fn setup(guard: Option<Guard>) -> (tempfile::TempDir, Route, Stone) {
        let temp = tempfile::tempdir().expect("tempdir");
        let route = Route::open(temp.path()).expect("route");
        let stone = Stone {
            name: "1.vision".to_string(),
            path: temp.path().join("1.vision.stone"),
            guard,
        };
        (temp, route, stone)
    }

    #[test]
    fn default_glob_covers_stone_markdown() {
        let (temp, route, stone) = setup(None);
        fs::write(temp.path().join("1.vision.md"), "v1").expect("write");
        let before = compute_review_input_hash(&route, &stone).expect("hash");
        fs::write(temp.path().join("1.vision.md"), "v2").expect("write");
        let after = compute_review_input_hash(&route, &stone).expect("hash");
        assert_ne!(before, after);
    }

    #[test]
    fn store_writes_do_not_change_hash() {
        let guard = Guard {
            artifacts: vec!["**/*.md".to_string()],
            ..Guard::default()
        };
        let (temp, route, stone) = setup(Some(guard));
        fs::write(temp.path().join("1.vision.md"), "v1").expect("write");
        let before = compute_review_input_hash(&route, &stone).expect("hash");
        set_approved(&route, "1.vision", "tester").expect("approve");
        assert_eq!(compute_review_input_hash(&route, &stone).expect("hash"), before);
    }

    #[test]
    fn empty_match_is_input_error() {
        let (_temp, route, stone) = setup(None);
        let err = compute_review_input_hash(&route, &stone).unwrap_err();
        assert!(err.to_string().contains("no artifact files"));
    }

    #[test]
    fn judge_hash_tracks_ledger() {
        let (_temp, route, _stone) = setup(None);
        let base = compute_judge_input_hash(&route, "1.vision", "aaaa").expect("hash");
        assert_eq!(
            compute_judge_input_hash(&route, "1.vision", "aaaa").expect("hash"),
            base
        );
        set_promised(&route, "1.vision", "self-review", "aaaa").expect("promise");
        let promised = compute_judge_input_hash(&route, "1.vision", "aaaa").expect("hash");
        assert_ne!(promised, base);
        set_approved(&route, "1.vision", "tester").expect("approve");
        assert_ne!(
            compute_judge_input_hash(&route, "1.vision", "aaaa").expect("hash"),
            promised
        );
    }
}
