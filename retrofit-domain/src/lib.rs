//! Domain logic: the fixer catalogue, its dependency order, the fixpoint executor
//! that applies it to one module, and the checker that verifies the result.
//!
//! This crate owns *what* gets rewritten and when. Loading trees, rendering them
//! and writing output belong to `retrofit-core`.

mod checkers;
mod context;
mod error;
mod executor;
mod fixers;
mod path;
mod registry;
mod walk;

pub use checkers::{Checker, Rule, RuleCtx, RuleMeta, builtin_rule_metas};
pub use context::{BuildContext, ImportPolicy};
pub use error::{ConfigError, FixError, InternalError};
pub use executor::{ExecReport, Executor, MAX_PASSES};
pub use fixers::{
    FixCtx, Fixer, FixerMeta, Replacement, Rewrite, Shim, ShimKind, Target, builtin_fixer_metas,
    builtin_fixers,
};
pub use path::{Frame, ModuleFacts, NodePath, Scope};
pub use registry::{FixerPlan, Registry};
