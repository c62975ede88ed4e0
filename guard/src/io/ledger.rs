//! Promise and approval records.
//!
//! Promises are keyed by the review-input-hash, so changing any artifact makes
//! earlier promises invisible without deleting them. Approval is one file per
//! stone; its presence feeds the judge-input-hash instead.

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::core::hash::LedgerState;
use crate::core::keys::{PromiseKey, approval_file_name, validate_slug};
use crate::core::types::{ApprovalArtifact, PromiseArtifact};
use crate::io::route::Route;
use crate::io::store::ArtifactStore;

/// Record that self-review `slug` was completed for `stone` at `hash`.
///
/// Idempotent: an existing promise for the same key is returned untouched.
pub fn set_promised(route: &Route, stone: &str, slug: &str, hash: &str) -> Result<PromiseArtifact> {
    validate_slug(slug)?;
    let store = ArtifactStore::new(route);
    let key = PromiseKey {
        stone: stone.to_string(),
        slug: slug.to_string(),
        hash: hash.to_string(),
    };
    let path = store.path_for(&key.file_name());
    if path.is_file() {
        debug!(stone, slug, hash, "promise already recorded");
    } else {
        let body = format!(
            "# promise\n\nself-review `{slug}` completed for `{stone}` at `{hash}`\n\npromised_at: {}\n",
            now_rfc3339()
        );
        store.write(&path, &body)?;
        info!(stone, slug, hash, "recorded promise");
    }
    Ok(PromiseArtifact {
        stone: key.stone,
        slug: key.slug,
        hash: key.hash,
        path,
    })
}

/// Promises recorded at exactly `hash`, sorted by slug.
pub fn get_promises(route: &Route, stone: &str, hash: &str) -> Result<Vec<PromiseArtifact>> {
    let store = ArtifactStore::new(route);
    let mut promises: Vec<PromiseArtifact> = store
        .promise_keys(stone)?
        .into_iter()
        .filter(|key| key.hash == hash)
        .map(|key| {
            let path = store.path_for(&key.file_name());
            PromiseArtifact {
                stone: key.stone,
                slug: key.slug,
                hash: key.hash,
                path,
            }
        })
        .collect();
    promises.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(promises)
}

/// True when `slug` was promised under some hash other than `current_hash`.
pub fn has_invalidated_promise(
    route: &Route,
    stone: &str,
    slug: &str,
    current_hash: &str,
) -> Result<bool> {
    let store = ArtifactStore::new(route);
    Ok(store
        .promise_keys(stone)?
        .iter()
        .any(|key| key.slug == slug && key.hash != current_hash))
}

/// Approval for `stone`, if a human has signed off.
pub fn get_approval(route: &Route, stone: &str) -> Result<Option<ApprovalArtifact>> {
    let path = ArtifactStore::new(route).path_for(&approval_file_name(stone));
    Ok(path.is_file().then(|| ApprovalArtifact {
        stone: stone.to_string(),
        path,
    }))
}

/// Record human approval for `stone`. Idempotent.
pub fn set_approved(route: &Route, stone: &str, approver: &str) -> Result<ApprovalArtifact> {
    if let Some(existing) = get_approval(route, stone)? {
        debug!(stone, "approval already recorded");
        return Ok(existing);
    }
    let store = ArtifactStore::new(route);
    let path = store.path_for(&approval_file_name(stone));
    let body = format!(
        "# approval\n\n`{stone}` approved by {approver}\n\napproved_at: {}\n",
        now_rfc3339()
    );
    store.write(&path, &body)?;
    info!(stone, approver, "recorded approval");
    Ok(ApprovalArtifact {
        stone: stone.to_string(),
        path,
    })
}

/// Ledger facts folded into the judge-input-hash.
pub fn ledger_state(route: &Route, stone: &str, review_hash: &str) -> Result<LedgerState> {
    Ok(LedgerState {
        approved: get_approval(route, stone)?.is_some(),
        promised: get_promises(route, stone, review_hash)?
            .into_iter()
            .map(|p| p.slug)
            .collect(),
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
