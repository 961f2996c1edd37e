use crate::diagnostic::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Machine-readable outcome of one transpile run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranspileReport {
    pub schema: String,
    pub tool: ReportToolInfo,
    pub target: ReportTarget,
    pub run: ReportRunInfo,

    #[serde(default)]
    pub modules: Vec<ModuleReport>,

    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTarget {
    pub min: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,

    /// Fixer ids that ran, in execution order.
    #[serde(default)]
    pub fixers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRunInfo {
    pub started_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Output produced and no diagnostics.
    Clean,
    /// Output produced with diagnostics attached.
    Diagnostics,
    /// Output served from the cache.
    Cached,
    /// The module could not be processed at all.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub module: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub status: ModuleStatus,

    #[serde(default)]
    pub passes: u32,

    /// Rewrites applied per fixer id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewrites: BTreeMap<String, u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub modules: u64,
    pub fix_errors: u64,
    pub check_errors: u64,
    pub failed: u64,
}

impl ReportSummary {
    pub fn from_modules(modules: &[ModuleReport]) -> Self {
        let mut summary = ReportSummary {
            modules: modules.len() as u64,
            ..ReportSummary::default()
        };
        for module in modules {
            if module.status == ModuleStatus::Failed {
                summary.failed += 1;
            }
            for diag in &module.diagnostics {
                if diag.is_fix_error() {
                    summary.fix_errors += 1;
                } else {
                    summary.check_errors += 1;
                }
            }
        }
        summary
    }

    pub fn has_diagnostics(&self) -> bool {
        self.fix_errors + self.check_errors > 0
    }
}
