//! Composite keys for artifacts stored under `.route/`.
//!
//! Each key is the identity of one artifact; its filename is derived from the
//! key and parsed back by splitting fixed segments off the right-hand end, so
//! stone names may themselves contain dots (`1.vision`).

use anyhow::{Result, bail};

const EXT: &str = ".md";
const REVIEW_MARKER: &str = ".guard.review";
const JUDGE_MARKER: &str = ".guard.judge";
const PROMISE_MARKER: &str = ".guard.promise";
const APPROVAL_SUFFIX: &str = ".guard.approved.md";

/// Identity of a review artifact.
///
/// Filename: `{stone}.guard.review.i{iteration}.{hash}.r{index}.md`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewKey {
    pub stone: String,
    pub iteration: u32,
    pub hash: String,
    pub index: u32,
}

impl ReviewKey {
    pub fn file_name(&self) -> String {
        format!(
            "{}{REVIEW_MARKER}.i{}.{}.r{}{EXT}",
            self.stone, self.iteration, self.hash, self.index
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(EXT)?;
        let mut parts = stem.rsplitn(4, '.');
        let index = parse_prefixed(parts.next()?, 'r')?;
        let hash = parts.next().filter(|h| is_hash(h))?;
        let iteration = parse_prefixed(parts.next()?, 'i')?;
        let stone = parts.next()?.strip_suffix(REVIEW_MARKER)?;
        if stone.is_empty() {
            return None;
        }
        Some(Self {
            stone: stone.to_string(),
            iteration,
            hash: hash.to_string(),
            index,
        })
    }
}

/// Identity of a judge artifact.
///
/// Filename:
/// `{stone}.guard.judge.i{review_iteration}p{judge_iteration}.{review_hash}.{judge_hash}.j{index}.md`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JudgeKey {
    pub stone: String,
    pub review_iteration: u32,
    pub judge_iteration: u32,
    pub review_hash: String,
    pub judge_hash: String,
    pub index: u32,
}

impl JudgeKey {
    pub fn file_name(&self) -> String {
        format!(
            "{}{JUDGE_MARKER}.i{}p{}.{}.{}.j{}{EXT}",
            self.stone,
            self.review_iteration,
            self.judge_iteration,
            self.review_hash,
            self.judge_hash,
            self.index
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(EXT)?;
        let mut parts = stem.rsplitn(5, '.');
        let index = parse_prefixed(parts.next()?, 'j')?;
        let judge_hash = parts.next().filter(|h| is_hash(h))?;
        let review_hash = parts.next().filter(|h| is_hash(h))?;
        let (review_iteration, judge_iteration) = parts
            .next()?
            .strip_prefix('i')?
            .split_once('p')
            .and_then(|(ri, ji)| Some((parse_number(ri)?, parse_number(ji)?)))?;
        let stone = parts.next()?.strip_suffix(JUDGE_MARKER)?;
        if stone.is_empty() {
            return None;
        }
        Some(Self {
            stone: stone.to_string(),
            review_iteration,
            judge_iteration,
            review_hash: review_hash.to_string(),
            judge_hash: judge_hash.to_string(),
            index,
        })
    }
}

/// Identity of a promise artifact.
///
/// Filename: `{stone}.guard.promise.{slug}.{hash}.md`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PromiseKey {
    pub stone: String,
    pub slug: String,
    pub hash: String,
}

impl PromiseKey {
    pub fn file_name(&self) -> String {
        format!(
            "{}{PROMISE_MARKER}.{}.{}{EXT}",
            self.stone, self.slug, self.hash
        )
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(EXT)?;
        let mut parts = stem.rsplitn(3, '.');
        let hash = parts.next().filter(|h| is_hash(h))?;
        let slug = parts.next().filter(|s| is_slug(s))?;
        let stone = parts.next()?.strip_suffix(PROMISE_MARKER)?;
        if stone.is_empty() {
            return None;
        }
        Some(Self {
            stone: stone.to_string(),
            slug: slug.to_string(),
            hash: hash.to_string(),
        })
    }
}

/// Fixed approval filename for a stone.
pub fn approval_file_name(stone: &str) -> String {
    format!("{stone}{APPROVAL_SUFFIX}")
}

/// Reject stone names that cannot be embedded in a flat filename.
pub fn validate_stone_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("stone name must not be empty");
    }
    if name.starts_with('.') || name.ends_with('.') {
        bail!("stone name must not start or end with '.': {name}");
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace())
    {
        bail!("stone name must not contain path separators or whitespace: {name}");
    }
    Ok(())
}

/// Promise slugs are a single filename segment: `[A-Za-z0-9_-]+`.
pub fn validate_slug(slug: &str) -> Result<()> {
    if !is_slug(slug) {
        bail!("invalid promise slug {slug:?} (expected letters, digits, '-' or '_')");
    }
    Ok(())
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_hash(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_prefixed(segment: &str, prefix: char) -> Option<u32> {
    parse_number(segment.strip_prefix(prefix)?)
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
