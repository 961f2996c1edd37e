//! Rendering helpers: syntax trees back to source text, and markdown summaries of reports.

mod source;

pub use source::{render_expr, render_module, render_stmt};

use retrofit_types::report::{ModuleStatus, TranspileReport};

pub fn render_report_md(report: &TranspileReport) -> String {
    let mut out = String::new();
    out.push_str("# retrofit report\n\n");
    match &report.target.max {
        Some(max) => out.push_str(&format!("- Target: {}..={}\n", report.target.min, max)),
        None => out.push_str(&format!("- Target: >={}\n", report.target.min)),
    }
    out.push_str(&format!(
        "- Modules: {} (failed {})\n",
        report.summary.modules, report.summary.failed
    ));
    out.push_str(&format!(
        "- Fix errors: {}\n- Check errors: {}\n\n",
        report.summary.fix_errors, report.summary.check_errors
    ));

    out.push_str("## Modules\n\n");
    if report.modules.is_empty() {
        out.push_str("_No modules processed._\n");
        return out;
    }

    for module in &report.modules {
        out.push_str(&format!(
            "### {}\n\n- Status: `{}`\n- Passes: {}\n",
            module.module,
            status_label(module.status),
            module.passes
        ));
        if let Some(err) = &module.error {
            out.push_str(&format!("- Error: {}\n", err));
        }
        if !module.rewrites.is_empty() {
            out.push_str("\n**Rewrites**\n\n");
            for (fixer, count) in &module.rewrites {
                out.push_str(&format!("- `{}` × {}\n", fixer, count));
            }
        }
        if !module.diagnostics.is_empty() {
            out.push_str("\n**Diagnostics**\n\n");
            for d in &module.diagnostics {
                out.push_str(&format!(
                    "- {}:{} `{}` {}\n",
                    d.line, d.column, d.rule, d.message
                ));
            }
        }
        out.push('\n');
    }

    out
}

fn status_label(s: ModuleStatus) -> &'static str {
    match s {
        ModuleStatus::Clean => "clean",
        ModuleStatus::Diagnostics => "diagnostics",
        ModuleStatus::Cached => "cached",
        ModuleStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_types::report::{ModuleReport, ReportRunInfo, ReportSummary, ReportTarget, ReportToolInfo};
    use retrofit_types::{Diagnostic, DiagnosticKind};
    use std::collections::BTreeMap;

    fn report(modules: Vec<ModuleReport>) -> TranspileReport {
        TranspileReport {
            schema: retrofit_types::schema::RETROFIT_REPORT_V1.to_string(),
            tool: ReportToolInfo {
                name: "retrofit".to_string(),
                version: "0.0.0".to_string(),
            },
            target: ReportTarget {
                min: "2.7".to_string(),
                max: None,
                fixers: Vec::new(),
            },
            run: ReportRunInfo {
                started_at: "2024-01-01T00:00:00Z".to_string(),
                ended_at: None,
                duration_ms: None,
            },
            summary: ReportSummary::from_modules(&modules),
            modules,
        }
    }

    #[test]
    fn empty_report_says_so() {
        let md = render_report_md(&report(Vec::new()));
        assert!(md.contains("- Target: >=2.7"));
        assert!(md.contains("_No modules processed._"));
    }

    #[test]
    fn lists_rewrites_and_diagnostics() {
        let mut rewrites = BTreeMap::new();
        rewrites.insert("syntax.fstring".to_string(), 2);
        let md = render_report_md(&report(vec![ModuleReport {
            module: "pkg.mod".to_string(),
            path: None,
            status: ModuleStatus::Diagnostics,
            passes: 2,
            rewrites,
            diagnostics: vec![Diagnostic {
                kind: DiagnosticKind::CheckError,
                rule: "syntax.async".to_string(),
                module: "pkg.mod".to_string(),
                line: 4,
                column: 1,
                message: "async def requires 3.5".to_string(),
            }],
            error: None,
        }]));
        assert!(md.contains("### pkg.mod"));
        assert!(md.contains("- `syntax.fstring` × 2"));
        assert!(md.contains("- 4:1 `syntax.async` async def requires 3.5"));
        assert!(md.contains("- Check errors: 1"));
    }
}
