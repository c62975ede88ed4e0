//! `guard` CLI: evaluate stone guards and record approvals and promises.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use guard::context::GuardContext;
use guard::core::mechanism::{Mechanism, MechanismName};
use guard::core::policy::Thresholds;
use guard::evaluate::{EvaluateOptions, evaluate_guard};
use guard::exit_codes;
use guard::io::commands::ShellRunner;
use guard::io::config::{GuardConfig, write_config};
use guard::io::hashing::{compute_judge_input_hash, compute_review_input_hash};
use guard::io::ledger::{set_approved, set_promised};
use guard::io::route::Route;
use guard::judge::evaluate_mechanism;
use guard::logging;
use guard::progress::ProgressEmitter;

#[derive(Parser)]
#[command(
    name = "guard",
    version,
    about = "Cached review and judge gates for route stones"
)]
struct Cli {
    /// Route directory containing `.stone` and `.guard` files.
    #[arg(long, global = true, default_value = ".")]
    route: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run reviews and judges; exit 0 if the stone may be passed, 2 if blocked.
    Eval {
        stone: String,
        /// Re-run reviews even if artifacts exist for the current content.
        #[arg(long)]
        rerun: bool,
    },
    /// Record human approval for a stone.
    Approve {
        stone: String,
        /// Name recorded in the approval file (defaults to `$USER`).
        #[arg(long)]
        by: Option<String>,
    },
    /// Record that a self-review was completed for the stone's current content.
    Promise { stone: String, slug: String },
    /// Evaluate a built-in mechanism (`approved?` or `reviewed?`) and print its verdict.
    Judge {
        mechanism: String,
        stone: String,
        #[arg(long)]
        allow_blockers: Option<u32>,
        #[arg(long)]
        allow_nitpicks: Option<u32>,
    },
    /// Print the review-input-hash and judge-input-hash of a stone.
    Hash { stone: String },
    /// Write a default `guard.toml` into the route.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// List stones in the route.
    List,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::ALLOWED
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let route = Route::open(&cli.route)?;
    match cli.command {
        Command::Eval { stone, rerun } => cmd_eval(&route, &stone, rerun),
        Command::Approve { stone, by } => {
            route.load_stone(&stone)?;
            let by = by
                .or_else(|| std::env::var("USER").ok())
                .unwrap_or_else(|| "human".to_string());
            let approval = set_approved(&route, &stone, &by)?;
            println!("{}", approval.path.display());
            Ok(exit_codes::ALLOWED)
        }
        Command::Promise { stone, slug } => {
            let loaded = route.load_stone(&stone)?;
            let hash = compute_review_input_hash(&route, &loaded)?;
            let promise = set_promised(&route, &stone, &slug, &hash)?;
            println!("{}", promise.path.display());
            Ok(exit_codes::ALLOWED)
        }
        Command::Judge {
            mechanism,
            stone,
            allow_blockers,
            allow_nitpicks,
        } => {
            let defaults = route.load_config()?.thresholds();
            let thresholds = Thresholds {
                allow_blockers: allow_blockers.unwrap_or(defaults.allow_blockers),
                allow_nitpicks: allow_nitpicks.unwrap_or(defaults.allow_nitpicks),
            };
            cmd_judge(&route, &mechanism, &stone, thresholds)
        }
        Command::Hash { stone } => {
            let loaded = route.load_stone(&stone)?;
            let review_hash = compute_review_input_hash(&route, &loaded)?;
            let judge_hash = compute_judge_input_hash(&route, &stone, &review_hash)?;
            println!("review: {review_hash}");
            println!("judge: {judge_hash}");
            Ok(exit_codes::ALLOWED)
        }
        Command::Init { force } => {
            let path = route.config_path();
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_config(&path, &GuardConfig::default())?;
            println!("{}", path.display());
            Ok(exit_codes::ALLOWED)
        }
        Command::List => {
            for name in route.stone_names()? {
                let marker = if route.guard_path(&name).is_file() {
                    "guarded"
                } else {
                    "open"
                };
                println!("{name}\t{marker}");
            }
            Ok(exit_codes::ALLOWED)
        }
    }
}

fn cmd_eval(route: &Route, stone: &str, rerun: bool) -> Result<i32> {
    let config = route.load_config()?;
    let progress = ProgressEmitter::stderr();
    let ctx = GuardContext::new(route, &config, &ShellRunner, &progress);
    let evaluation = evaluate_guard(&ctx, stone, EvaluateOptions { rerun });
    progress.done();
    let evaluation = evaluation?;

    if evaluation.passage.allowed {
        println!("allowed: {}", evaluation.stone);
        Ok(exit_codes::ALLOWED)
    } else {
        let reason = evaluation.passage.reason.as_deref().unwrap_or("blocked");
        println!("blocked: {}", evaluation.stone);
        println!("reason: {reason}");
        Ok(exit_codes::BLOCKED)
    }
}

fn cmd_judge(route: &Route, mechanism: &str, stone: &str, thresholds: Thresholds) -> Result<i32> {
    let mechanism = match mechanism.parse::<MechanismName>()? {
        MechanismName::Approved => Mechanism::Approved,
        MechanismName::Reviewed => Mechanism::Reviewed(thresholds),
    };
    let loaded = route.load_stone(stone)?;
    let review_hash = compute_review_input_hash(route, &loaded)?;
    let verdict = evaluate_mechanism(route, &loaded, mechanism, &review_hash)?;
    println!("passed: {}", verdict.passed);
    if let Some(reason) = &verdict.reason {
        println!("reason: {reason}");
    }
    Ok(if verdict.passed {
        exit_codes::ALLOWED
    } else {
        exit_codes::BLOCKED
    })
}
