//! Guard evaluation and caching engine for route stones.
//!
//! A stone's guard lists review commands, judge commands and required
//! self-review promises. Evaluation hashes the stone's artifact files, runs
//! each review at most once per hash, runs judges keyed by that hash plus the
//! approval/promise ledger, and decides whether the stone may be passed.
//!
//! - **[`core`]**: Pure logic (hashing, filename keys, parsing, policy).
//! - **[`io`]**: Filesystem, artifact store, ledger and child processes.
//!
//! [`evaluate`] coordinates the [`review`] and [`judge`] runners; [`progress`]
//! renders their events for a terminal.

pub mod context;
pub mod core;
pub mod evaluate;
pub mod exit_codes;
pub mod io;
pub mod judge;
pub mod logging;
pub mod progress;
pub mod review;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
