//! Small text helpers shared by policy reasons and progress lines.

use std::time::Duration;

/// `"1 blocker"`, `"0 blockers"`, `"3 blockers"`.
pub fn count_label(count: u32, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Elapsed time as seconds with one decimal (`"2.4s"`).
pub fn elapsed_label(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
