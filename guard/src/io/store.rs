//! Flat, append-only artifact store under `<route>/.route/`.
//!
//! Filenames are derived from [`ReviewKey`]/[`JudgeKey`]/[`PromiseKey`] and
//! parsed back into keys when scanning; contents carry the outcome. Existing
//! artifacts are never rewritten or deleted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::core::keys::{JudgeKey, PromiseKey, ReviewKey};
use crate::core::parse::{parse_judge_verdict, parse_review_counts};
use crate::core::types::{JudgeArtifact, ReviewArtifact};
use crate::io::route::Route;

/// Handle to a route's artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(route: &Route) -> Self {
        Self {
            dir: route.store_dir(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Scan the store, keeping entries whose filename parses as `K`.
    fn scan<K>(&self, parse: impl Fn(&str) -> Option<K>) -> Result<Vec<(K, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in
            fs::read_dir(&self.dir).with_context(|| format!("read {}", self.dir.display()))?
        {
            let entry = entry.with_context(|| format!("read entry in {}", self.dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = parse(name) {
                found.push((key, entry.path()));
            }
        }
        Ok(found)
    }

    pub fn review_keys(&self, stone: &str) -> Result<Vec<ReviewKey>> {
        Ok(self
            .scan(ReviewKey::parse)?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.stone == stone)
            .collect())
    }

    pub fn judge_keys(&self, stone: &str) -> Result<Vec<JudgeKey>> {
        Ok(self
            .scan(JudgeKey::parse)?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.stone == stone)
            .collect())
    }

    pub fn promise_keys(&self, stone: &str) -> Result<Vec<PromiseKey>> {
        Ok(self
            .scan(PromiseKey::parse)?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key.stone == stone)
            .collect())
    }

    /// Latest review artifact for identity (stone, hash, index), if any.
    pub fn find_review(&self, stone: &str, hash: &str, index: u32) -> Result<Option<ReviewArtifact>> {
        let latest = self
            .review_keys(stone)?
            .into_iter()
            .filter(|key| key.hash == hash && key.index == index)
            .max_by_key(|key| key.iteration);
        match latest {
            Some(key) => {
                trace!(file = %key.file_name(), "review cache hit");
                self.load_review(&key).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Latest review artifact per index at `hash`, ordered by index.
    pub fn latest_reviews(&self, stone: &str, hash: &str) -> Result<Vec<ReviewArtifact>> {
        let mut keys: Vec<ReviewKey> = self
            .review_keys(stone)?
            .into_iter()
            .filter(|key| key.hash == hash)
            .collect();
        keys.sort_by(|a, b| a.index.cmp(&b.index).then(b.iteration.cmp(&a.iteration)));
        keys.dedup_by_key(|key| key.index);
        keys.iter().map(|key| self.load_review(key)).collect()
    }

    /// Next review iteration at `hash`: one past the highest seen.
    pub fn next_review_iteration(&self, stone: &str, hash: &str) -> Result<u32> {
        let max = self
            .review_keys(stone)?
            .into_iter()
            .filter(|key| key.hash == hash)
            .map(|key| key.iteration)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Most recent passed judge artifact that observed review pass
    /// `review_iteration` at `review_hash`, with the same judge hash and index.
    ///
    /// Failed artifacts are skipped so failures are always re-observed. A judge
    /// from an earlier review pass never matches, so re-running reviews at an
    /// unchanged hash forces judges to look at the new results.
    pub fn find_passed_judge(
        &self,
        stone: &str,
        review_hash: &str,
        review_iteration: u32,
        judge_hash: &str,
        index: u32,
    ) -> Result<Option<JudgeArtifact>> {
        let mut keys: Vec<JudgeKey> = self
            .judge_keys(stone)?
            .into_iter()
            .filter(|key| {
                key.review_hash == review_hash
                    && key.review_iteration == review_iteration
                    && key.judge_hash == judge_hash
                    && key.index == index
            })
            .collect();
        keys.sort_by(|a, b| b.judge_iteration.cmp(&a.judge_iteration));
        for key in keys {
            let artifact = self.load_judge(&key)?;
            if artifact.passed {
                trace!(file = %key.file_name(), "judge cache hit");
                return Ok(Some(artifact));
            }
            debug!(file = %key.file_name(), "prior judge failed, not reusable");
        }
        Ok(None)
    }

    /// Next judge iteration for the (stone, review hash, judge hash) triple.
    ///
    /// The review iteration is not part of this key, so judge iterations keep
    /// climbing across review re-runs at the same hashes.
    pub fn next_judge_iteration(
        &self,
        stone: &str,
        review_hash: &str,
        judge_hash: &str,
    ) -> Result<u32> {
        let max = self
            .judge_keys(stone)?
            .into_iter()
            .filter(|key| key.review_hash == review_hash && key.judge_hash == judge_hash)
            .map(|key| key.judge_iteration)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    pub fn load_review(&self, key: &ReviewKey) -> Result<ReviewArtifact> {
        let path = self.path_for(&key.file_name());
        let content = read_text(&path)?;
        let counts = parse_review_counts(&content);
        Ok(ReviewArtifact {
            stone: key.stone.clone(),
            hash: key.hash.clone(),
            iteration: key.iteration,
            index: key.index,
            path,
            blockers: counts.blockers,
            nitpicks: counts.nitpicks,
        })
    }

    pub fn load_judge(&self, key: &JudgeKey) -> Result<JudgeArtifact> {
        let path = self.path_for(&key.file_name());
        let content = read_text(&path)?;
        let verdict = parse_judge_verdict(&content, None);
        Ok(JudgeArtifact {
            stone: key.stone.clone(),
            review_hash: key.review_hash.clone(),
            judge_hash: key.judge_hash.clone(),
            review_iteration: key.review_iteration,
            judge_iteration: key.judge_iteration,
            index: key.index,
            path,
            passed: verdict.passed,
            reason: verdict.reason,
        })
    }

    /// Create the store directory so commands can write to `$output`.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create artifact dir {}", self.dir.display()))
    }

    /// Write an artifact file, creating the store directory if needed.
    pub fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.ensure_dir()?;
        fs::write(path, contents).with_context(|| format!("write artifact {}", path.display()))
    }
}

/// Read an artifact as text, replacing invalid UTF-8.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read artifact {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
