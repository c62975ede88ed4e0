//! Side-effecting helpers: filesystem, artifact store, child processes.

pub mod commands;
pub mod config;
pub mod files;
pub mod hashing;
pub mod ledger;
pub mod process;
pub mod route;
pub mod store;
