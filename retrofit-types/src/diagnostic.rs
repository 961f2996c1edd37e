use crate::syntax::Loc;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A fixer matched a node but could not rewrite it.
    FixError,
    /// A construct unsupported by the target range survived the fix phase.
    CheckError,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::FixError => f.write_str("fix error"),
            DiagnosticKind::CheckError => f.write_str("check error"),
        }
    }
}

/// A located problem in one module.
///
/// Lines and columns are 1-based in source coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub rule: String,
    pub module: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn is_fix_error(&self) -> bool {
        self.kind == DiagnosticKind::FixError
    }

    pub fn is_check_error(&self) -> bool {
        self.kind == DiagnosticKind::CheckError
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}] {}",
            self.module, self.line, self.column, self.kind, self.rule, self.message
        )
    }
}

/// Identity of the module being transformed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,
}

impl ModuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn with_path(name: impl Into<String>, path: Utf8PathBuf) -> Self {
        Self {
            name: name.into(),
            path: Some(path),
        }
    }

    /// Label used in diagnostics: the path when known, otherwise the module name.
    pub fn label(&self) -> String {
        match &self.path {
            Some(path) => path.to_string(),
            None => self.name.clone(),
        }
    }
}

/// Maps tree locations onto source coordinates.
///
/// Parsers that strip a leading header report lines relative to the stripped text;
/// `line_offset` restores them. Tree columns are 0-based, diagnostic columns 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMap {
    #[serde(default)]
    pub line_offset: u32,
}

impl LineMap {
    pub fn new(line_offset: u32) -> Self {
        Self { line_offset }
    }

    /// Returns `(line, column)`, both clamped to at least 1.
    pub fn locate(&self, loc: Loc) -> (u32, u32) {
        let line = loc.line.saturating_add(self.line_offset).max(1);
        let column = loc.col.saturating_add(1).max(1);
        (line, column)
    }
}
