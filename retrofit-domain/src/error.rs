use retrofit_types::RangeError;
use retrofit_types::syntax::Loc;
use thiserror::Error;

/// Startup-time failure: the catalogue or the requested target is inconsistent.
///
/// Raised before any module is processed, never per module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("fixer '{fixer}' depends on unknown fixer '{dependency}'")]
    UnknownDependency { fixer: String, dependency: String },

    #[error("dependency cycle between fixers: {}", members.join(" -> "))]
    DependencyCycle { members: Vec<String> },

    #[error("fixer '{id}' is declared more than once")]
    DuplicateFixer { id: String },

    #[error("unknown fixer '{id}'")]
    UnknownFixer { id: String },

    #[error("cannot disable '{dependency}': enabled fixer '{fixer}' depends on it")]
    DisabledDependency { fixer: String, dependency: String },
}

/// Per-module failure that signals a catalogue defect rather than bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error(
        "module '{module}' did not settle within {limit} passes (still rewriting: {})",
        fixers.join(", ")
    )]
    PassLimitExceeded {
        module: String,
        limit: u32,
        fixers: Vec<String>,
    },

    #[error("fixer '{fixer}' produced a {produced} replacement for a {expected} node")]
    ReplacementMismatch {
        fixer: &'static str,
        expected: &'static str,
        produced: &'static str,
    },
}

/// A fixer matched a node but cannot rewrite this particular shape.
///
/// `loc` points at the offending sub-node; when absent the matched node's
/// location is used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FixError {
    pub message: String,
    pub loc: Option<Loc>,
}

impl FixError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            loc: None,
        }
    }

    pub fn at(message: impl Into<String>, loc: Loc) -> Self {
        Self {
            message: message.into(),
            loc: Some(loc),
        }
    }
}
