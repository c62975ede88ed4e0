//! Content hashing for cache keys.
//!
//! The review-input-hash covers a stone's artifact files; the judge-input-hash
//! chains it with the approval/promise ledger so approval changes alone force
//! judges to re-run.

use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a rendered hash (16 hex chars).
const HASH_BYTES: usize = 8;

/// One artifact file contributing to the review-input-hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashInput {
    /// Path relative to the route, with `/` separators.
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// Ledger facts that feed the judge-input-hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub approved: bool,
    /// Slugs promised at the current review-input-hash.
    pub promised: Vec<String>,
}

/// Hash artifact files in sorted path order.
///
/// Each path and body is length-prefixed so moving bytes between files changes
/// the result. Input order does not matter.
pub fn review_input_hash(inputs: &[HashInput]) -> String {
    let mut sorted: Vec<&HashInput> = inputs.iter().collect();
    sorted.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hasher = Sha256::new();
    for input in sorted {
        update_framed(&mut hasher, input.rel_path.as_bytes());
        update_framed(&mut hasher, &input.bytes);
    }
    finish(hasher)
}

/// Chain the review-input-hash with the ledger state.
pub fn judge_input_hash(review_hash: &str, ledger: &LedgerState) -> String {
    let mut promised = ledger.promised.clone();
    promised.sort();
    promised.dedup();

    let mut hasher = Sha256::new();
    update_framed(&mut hasher, b"review");
    update_framed(&mut hasher, review_hash.as_bytes());
    update_framed(&mut hasher, b"approved");
    update_framed(&mut hasher, if ledger.approved { b"1" } else { b"0" });
    for slug in &promised {
        update_framed(&mut hasher, b"promise");
        update_framed(&mut hasher, slug.as_bytes());
    }
    finish(hasher)
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn finish(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    hex::encode(&digest[..HASH_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(path: &str, body: &str) -> HashInput {
        HashInput {
            rel_path: path.to_string(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn review_hash_is_short_and_stable() {
        let inputs = vec![input("a.md", "Hello, world!")];
        let hash = review_input_hash(&inputs);
        assert_eq!(hash, review_input_hash(&inputs));
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn review_hash_ignores_enumeration_order() {
        let forward = vec![input("a.md", "alpha"), input("b.md", "beta")];
        let backward = vec![input("b.md", "beta"), input("a.md", "alpha")];
        assert_eq!(review_input_hash(&forward), review_input_hash(&backward));
    }

    #[test]
    fn review_hash_changes_with_content() {
        let before = vec![input("a.md", "alpha")];
        let after = vec![input("a.md", "alpha!")];
        assert_ne!(review_input_hash(&before), review_input_hash(&after));
    }

    #[test]
    fn review_hash_frames_file_boundaries() {
        let split = vec![input("a.md", "ab"), input("b.md", "c")];
        let moved = vec![input("a.md", "a"), input("b.md", "bc")];
        assert_ne!(review_input_hash(&split), review_input_hash(&moved));
    }

    #[test]
    fn judge_hash_changes_on_approval_only() {
        let pending = LedgerState::default();
        let approved = LedgerState {
            approved: true,
            ..LedgerState::default()
        };
        assert_ne!(
            judge_input_hash("abcd", &pending),
            judge_input_hash("abcd", &approved)
        );
        assert_eq!(
            judge_input_hash("abcd", &pending),
            judge_input_hash("abcd", &LedgerState::default())
        );
    }

    #[test]
    fn judge_hash_sorts_promises() {
        let a = LedgerState {
            approved: false,
            promised: vec!["x".to_string(), "y".to_string()],
        };
        let b = LedgerState {
            approved: false,
            promised: vec!["y".to_string(), "x".to_string()],
        };
        assert_eq!(judge_input_hash("h", &a), judge_input_hash("h", &b));
        assert_ne!(
            judge_input_hash("h", &a),
            judge_input_hash("h", &LedgerState::default())
        );
    }
}
