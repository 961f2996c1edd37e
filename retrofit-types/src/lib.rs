//! Shared DTOs (schemas-as-code) for the retrofit workspace.
//!
//! # Design constraints
//! - The syntax tree is a closed grammar: fixers and checkers match on it exhaustively.
//! - Trees and reports are serialized with serde so an external parser can hand them over as JSON.
//! - Prefer adding optional fields over changing semantics.

pub mod diagnostic;
pub mod report;
pub mod syntax;
pub mod version;

pub use diagnostic::{Diagnostic, DiagnosticKind, LineMap, ModuleId};
pub use version::{RangeError, Version, VersionError, VersionRange};

/// Schema identifiers.
pub mod schema {
    pub const RETROFIT_REPORT_V1: &str = "retrofit.report.v1";
}
