//! Extraction of review counts and judge verdicts from command output.
//!
//! A structured footer `<!-- guard: {json} -->` takes precedence. Without one,
//! free-form text is scanned with conservative case-insensitive patterns
//! where the first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::types::{ReviewCounts, Verdict};

static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*<!--\s*guard:\s*(\{.*\})\s*-->\s*$").expect("valid regex")
});
static BLOCKERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+blockers?\b").expect("valid regex"));
static NITPICKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+nitpicks?\b").expect("valid regex"));
static PASSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)passed:\s*(true|false)\b").expect("valid regex"));
static REASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)reason:[ \t]*(\S.*)$").expect("valid regex"));

/// Machine-readable outcome appended to artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nitpicks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl Footer {
    pub fn for_review(counts: ReviewCounts) -> Self {
        Self {
            blockers: Some(counts.blockers),
            nitpicks: Some(counts.nitpicks),
            ..Self::default()
        }
    }

    pub fn for_judge(verdict: &Verdict) -> Self {
        Self {
            passed: Some(verdict.passed),
            reason: verdict.reason.clone(),
            ..Self::default()
        }
    }

    /// Render as a single markdown comment line (with trailing newline).
    pub fn render(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("<!-- guard: {json} -->\n")
    }
}

/// Find the last well-formed footer in `content`.
pub fn find_footer(content: &str) -> Option<Footer> {
    let raw = FOOTER_RE.captures_iter(content).last()?.get(1)?.as_str();
    match serde_json::from_str(raw) {
        Ok(footer) => Some(footer),
        Err(err) => {
            warn!(err = %err, "ignoring malformed guard footer");
            None
        }
    }
}

/// Parse blocker/nitpick counts; absence of a match means zero.
pub fn parse_review_counts(content: &str) -> ReviewCounts {
    if let Some(footer) = find_footer(content)
        && (footer.blockers.is_some() || footer.nitpicks.is_some())
    {
        return ReviewCounts {
            blockers: footer.blockers.unwrap_or(0),
            nitpicks: footer.nitpicks.unwrap_or(0),
        };
    }
    ReviewCounts {
        blockers: first_count(&BLOCKERS_RE, content),
        nitpicks: first_count(&NITPICKS_RE, content),
    }
}

/// Parse a judge verdict.
///
/// An explicit `passed:` marker wins over `exit_success`; with neither the
/// judge fails.
pub fn parse_judge_verdict(content: &str, exit_success: Option<bool>) -> Verdict {
    if let Some(footer) = find_footer(content)
        && let Some(passed) = footer.passed
    {
        return Verdict {
            passed,
            reason: footer.reason,
        };
    }

    let marker = PASSED_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("true"));
    let reason = REASON_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty());

    Verdict {
        passed: marker.or(exit_success).unwrap_or(false),
        reason,
    }
}

/// Whether `content` carries an explicit `passed:` marker or footer verdict.
pub fn has_passed_marker(content: &str) -> bool {
    find_footer(content).is_some_and(|f| f.passed.is_some()) || PASSED_RE.is_match(content)
}

fn first_count(re: &Regex, content: &str) -> u32 {
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_free_text() {
        let counts = parse_review_counts("## summary\n2 Blockers\n1 nitpick\n");
        assert_eq!(
            counts,
            ReviewCounts {
                blockers: 2,
                nitpicks: 1
            }
        );
    }

    #[test]
    fn counts_default_to_zero() {
        assert_eq!(parse_review_counts("looks good"), ReviewCounts::default());
    }

    #[test]
    fn first_count_match_wins() {
        let counts = parse_review_counts("0 blockers\nlater: 5 blockers");
        assert_eq!(counts.blockers, 0);
    }

    #[test]
    fn footer_overrides_free_text() {
        let content = format!(
            "0 blockers\n{}",
            Footer::for_review(ReviewCounts {
                blockers: 3,
                nitpicks: 0
            })
            .render()
        );
        assert_eq!(parse_review_counts(&content).blockers, 3);
    }

    #[test]
    fn malformed_footer_falls_back_to_text() {
        let content = "1 blocker\n<!-- guard: {not json} -->\n";
        assert_eq!(parse_review_counts(content).blockers, 1);
    }

    #[test]
    fn explicit_passed_marker_beats_exit_code() {
        let verdict = parse_judge_verdict("passed: false\nreason: too many blockers\n", Some(true));
        assert!(!verdict.passed);
        assert_eq!(verdict.reason.as_deref(), Some("too many blockers"));

        let verdict = parse_judge_verdict("PASSED: TRUE", Some(false));
        assert!(verdict.passed);
    }

    #[test]
    fn verdict_falls_back_to_exit_code() {
        assert!(parse_judge_verdict("all good", Some(true)).passed);
        assert!(!parse_judge_verdict("all good", Some(false)).passed);
        assert!(!parse_judge_verdict("all good", None).passed);
    }

    #[test]
    fn judge_footer_round_trips_reason() {
        let rendered = Footer::for_judge(&Verdict::fail("approval missing")).render();
        let verdict = parse_judge_verdict(&rendered, Some(true));
        assert_eq!(verdict, Verdict::fail("approval missing"));
        assert!(has_passed_marker(&rendered));
        assert!(!has_passed_marker("nothing here"));
    }
}
