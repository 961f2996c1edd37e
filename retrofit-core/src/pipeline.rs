//! Fix, check and render pipeline over every loaded module.
//!
//! Each module gets its own tree and [`BuildContext`]; only the immutable
//! builtin registry is shared.

use crate::ports::{LoadedModule, ModuleSource, OutputCache, WritePort};
use crate::settings::TranspileSettings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use diffy::PatchFormatter;
use retrofit_domain::{
    BuildContext, Checker, ConfigError, ExecReport, Executor, FixerPlan, ImportPolicy,
    InternalError, Registry,
};
use retrofit_render::{render_module, render_report_md};
use retrofit_types::report::{
    ModuleReport, ModuleStatus, ReportRunInfo, ReportSummary, ReportTarget, ReportToolInfo,
    TranspileReport,
};
use retrofit_types::syntax::Module;
use retrofit_types::{Diagnostic, LineMap, ModuleId, Version};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

pub const CODING_LINE: &str = "# -*- coding: utf-8 -*-";

/// Error type for pipeline results. Any of these means no module output.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Executor(#[from] InternalError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<retrofit_types::RangeError> for ToolError {
    fn from(err: retrofit_types::RangeError) -> Self {
        ToolError::Config(ConfigError::from(err))
    }
}

/// Result of [`transpile_module`].
#[derive(Debug, Clone)]
pub struct Transpiled {
    pub tree: Module,
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
    pub exec: ExecReport,
}

/// Executor, then checker, then header normalization, then render.
pub fn transpile_module(
    plan: &FixerPlan<'_>,
    checker: &Checker,
    settings: &TranspileSettings,
    id: ModuleId,
    lines: LineMap,
    mut tree: Module,
) -> Result<Transpiled, InternalError> {
    let mut cx = BuildContext::new(plan.range(), id)
        .with_lines(lines)
        .with_policy(ImportPolicy::from_backports(settings.backports.clone()));

    let exec = Executor::new(plan).run(&mut tree, &mut cx)?;
    checker.check(&tree, &mut cx);

    if settings.coding_header && plan.range().min() < Version::new(3, 0) {
        ensure_coding_header(&mut tree);
    }

    Ok(Transpiled {
        output: render_module(&tree),
        tree,
        diagnostics: cx.into_diagnostics(),
        exec,
    })
}

/// 2.x reads source as ASCII unless one of the first two lines declares an
/// encoding.
fn ensure_coding_header(module: &mut Module) {
    if module.header.iter().take(2).any(|line| is_coding_line(line)) {
        return;
    }
    let at = usize::from(module.header.first().is_some_and(|l| l.starts_with("#!")));
    module.header.insert(at, CODING_LINE.to_string());
}

fn is_coding_line(line: &str) -> bool {
    line.trim_start().starts_with('#') && (line.contains("coding:") || line.contains("coding="))
}

/// One module after the run.
#[derive(Debug, Clone)]
pub struct ModuleOutcome {
    pub id: ModuleId,
    pub output_path: Utf8PathBuf,
    /// Input tree rendered as is, for diffs.
    pub original: Option<String>,
    pub output: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub status: ModuleStatus,
}

/// Outcome of [`run`].
pub struct RunOutcome {
    pub modules: Vec<ModuleOutcome>,
    pub report: TranspileReport,
}

impl RunOutcome {
    pub fn has_diagnostics(&self) -> bool {
        self.report.summary.has_diagnostics()
    }

    pub fn has_failures(&self) -> bool {
        self.report.summary.failed > 0
    }
}

/// Run the pipeline over every module `source` yields.
///
/// The catalogue and the target range are validated before any module is
/// touched. Writing outputs is left to the caller, see [`write_outputs`].
pub fn run(
    settings: &TranspileSettings,
    source: &dyn ModuleSource,
    cache: Option<&dyn OutputCache>,
    tool: ReportToolInfo,
) -> Result<RunOutcome, ToolError> {
    let started = Utc::now();
    let range = settings.range()?;
    let registry = Registry::builtin()?;
    let plan = registry.plan_with(range, &settings.disable)?;
    let checker = Checker::new();
    let fingerprint = settings.fingerprint(&tool.version);

    debug!(floor = %range.min(), fixers = plan.len(), "resolved fixer plan");

    let loaded = source.load_modules().context("load modules")?;
    let mut modules = Vec::with_capacity(loaded.len());
    let mut reports = Vec::with_capacity(loaded.len());
    for module in loaded {
        let (outcome, report) = run_one(settings, &plan, &checker, cache, &fingerprint, module)?;
        modules.push(outcome);
        reports.push(report);
    }

    let ended = Utc::now();
    let summary = ReportSummary::from_modules(&reports);
    info!(
        modules = summary.modules,
        fix_errors = summary.fix_errors,
        check_errors = summary.check_errors,
        failed = summary.failed,
        "transpile finished"
    );

    let report = TranspileReport {
        schema: retrofit_types::schema::RETROFIT_REPORT_V1.to_string(),
        tool,
        target: ReportTarget {
            min: range.min().to_string(),
            max: range.max().map(|v| v.to_string()),
            fixers: plan.ids().iter().map(|id| id.to_string()).collect(),
        },
        run: ReportRunInfo {
            started_at: started.to_rfc3339(),
            ended_at: Some(ended.to_rfc3339()),
            duration_ms: u64::try_from((ended - started).num_milliseconds()).ok(),
        },
        modules: reports,
        summary,
    };

    Ok(RunOutcome { modules, report })
}

fn run_one(
    settings: &TranspileSettings,
    plan: &FixerPlan<'_>,
    checker: &Checker,
    cache: Option<&dyn OutputCache>,
    fingerprint: &str,
    module: LoadedModule,
) -> Result<(ModuleOutcome, ModuleReport), ToolError> {
    let LoadedModule {
        id,
        output_path,
        lines,
        bytes,
        tree,
    } = module;

    let mut report = ModuleReport {
        module: id.name.clone(),
        path: Some(output_path.to_string()),
        status: ModuleStatus::Failed,
        passes: 0,
        rewrites: Default::default(),
        diagnostics: Vec::new(),
        error: None,
    };

    let tree = match tree {
        Ok(tree) => tree,
        Err(err) => {
            warn!(module = %id.name, error = %err, "module not loaded");
            report.error = Some(err.to_string());
            let outcome = ModuleOutcome {
                id,
                output_path,
                original: None,
                output: None,
                diagnostics: Vec::new(),
                status: ModuleStatus::Failed,
            };
            return Ok((outcome, report));
        }
    };
    let original = render_module(&tree);

    let key = cache.map(|_| cache_key(fingerprint, &bytes));
    if let (Some(cache), Some(key)) = (cache, key.as_deref())
        && let Some(output) = cache.get(key)
    {
        debug!(module = %id.name, key, "cache hit");
        report.status = ModuleStatus::Cached;
        let outcome = ModuleOutcome {
            id,
            output_path,
            original: Some(original),
            output: Some(output),
            diagnostics: Vec::new(),
            status: ModuleStatus::Cached,
        };
        return Ok((outcome, report));
    }

    let done = transpile_module(plan, checker, settings, id.clone(), lines, tree)?;
    let status = if done.diagnostics.is_empty() {
        ModuleStatus::Clean
    } else {
        ModuleStatus::Diagnostics
    };

    if status == ModuleStatus::Clean
        && let (Some(cache), Some(key)) = (cache, key.as_deref())
        && let Err(err) = cache.put(key, &done.output)
    {
        warn!(module = %id.name, error = %format!("{err:#}"), "cache write failed");
    }

    report.status = status;
    report.passes = done.exec.passes;
    report.rewrites = done
        .exec
        .rewrites
        .iter()
        .map(|(id, n)| (id.to_string(), *n as u64))
        .collect();
    report.diagnostics = done.diagnostics.clone();

    let outcome = ModuleOutcome {
        id,
        output_path,
        original: Some(original),
        output: Some(done.output),
        diagnostics: done.diagnostics,
        status,
    };
    Ok((outcome, report))
}

fn cache_key(fingerprint: &str, tree_bytes: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(fingerprint.len() + 1 + tree_bytes.len());
    bytes.extend_from_slice(fingerprint.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(tree_bytes);
    sha256_hex(&bytes)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Write the rendered module files under `out_dir`.
///
/// Modules with diagnostics are skipped unless `include_diagnostics` is set.
/// Returns the paths written.
pub fn write_outputs(
    outcome: &RunOutcome,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
    include_diagnostics: bool,
) -> anyhow::Result<Vec<Utf8PathBuf>> {
    writer.create_dir_all(out_dir)?;
    let mut written = Vec::new();
    for module in &outcome.modules {
        let Some(output) = &module.output else {
            continue;
        };
        if !module.diagnostics.is_empty() && !include_diagnostics {
            debug!(module = %module.id.name, "skipping output with diagnostics");
            continue;
        }
        let path = out_dir.join(&module.output_path);
        writer.write_file(&path, output.as_bytes())?;
        written.push(path);
    }
    Ok(written)
}

/// Write `report.json` and `report.md` into `out_dir`.
pub fn write_report(
    report: &TranspileReport,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    writer.write_file(&out_dir.join("report.json"), json.as_bytes())?;
    writer.write_file(&out_dir.join("report.md"), render_report_md(report).as_bytes())?;
    Ok(())
}

/// Unified diff of every module whose output differs from its input.
pub fn render_diff(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let formatter = PatchFormatter::new();
    for module in &outcome.modules {
        let (Some(old), Some(new)) = (&module.original, &module.output) else {
            continue;
        };
        if old == new {
            continue;
        }
        out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", module.output_path));
        let patch = diffy::create_patch(old, new);
        let body = formatter.fmt_patch(&patch).to_string();
        // diffy emits its own `---`/`+++` pair first.
        for line in body.lines().skip(2) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}
