//! Built-in judge mechanisms (`approved?`, `reviewed?`).
//!
//! A judge template whose first word ends in `?` names a mechanism evaluated
//! in-process instead of a shell command.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};

use crate::core::policy::Thresholds;

/// Deterministic judge evaluated without spawning a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Approved,
    Reviewed(Thresholds),
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Approved => f.write_str("approved?"),
            Mechanism::Reviewed(t) => write!(
                f,
                "reviewed? --allow-blockers {} --allow-nitpicks {}",
                t.allow_blockers, t.allow_nitpicks
            ),
        }
    }
}

/// Mechanism name without arguments, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismName {
    Approved,
    Reviewed,
}

impl FromStr for MechanismName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approved?" => Ok(MechanismName::Approved),
            "reviewed?" => Ok(MechanismName::Reviewed),
            other => Err(anyhow!(
                "unrecognized judge mechanism {other:?} (expected approved? or reviewed?)"
            )),
        }
    }
}

/// How a judge template is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeCommand {
    Builtin(Mechanism),
    Shell(String),
}

/// Classify a judge template, parsing mechanism arguments.
///
/// `defaults` supplies thresholds for `reviewed?` when flags are omitted.
pub fn classify_judge(template: &str, defaults: Thresholds) -> Result<JudgeCommand> {
    let mut words = template.split_whitespace();
    let Some(first) = words.next() else {
        bail!("judge command is empty");
    };
    if !first.ends_with('?') {
        return Ok(JudgeCommand::Shell(template.to_string()));
    }

    let name: MechanismName = first.parse()?;
    let args: Vec<&str> = words.collect();
    let mechanism = match name {
        MechanismName::Approved => {
            if !args.is_empty() {
                bail!("approved? takes no arguments (got {:?})", args.join(" "));
            }
            Mechanism::Approved
        }
        MechanismName::Reviewed => Mechanism::Reviewed(parse_thresholds(&args, defaults)?),
    };
    Ok(JudgeCommand::Builtin(mechanism))
}

fn parse_thresholds(args: &[&str], defaults: Thresholds) -> Result<Thresholds> {
    let mut thresholds = defaults;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (*arg, None),
        };
        let value = match inline {
            Some(value) => value,
            None => iter
                .next()
                .copied()
                .with_context(|| format!("reviewed? flag {flag} needs a value"))?,
        };
        let parsed: u32 = value
            .parse()
            .with_context(|| format!("reviewed? flag {flag} expects a number, got {value:?}"))?;
        match flag {
            "--allow-blockers" => thresholds.allow_blockers = parsed,
            "--allow-nitpicks" => thresholds.allow_nitpicks = parsed,
            other => bail!("reviewed? does not accept {other}"),
        }
    }
    Ok(thresholds)
}
