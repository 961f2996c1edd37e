mod config;
mod explain;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use retrofit_core::adapters::{FsModuleSource, FsWritePort, TranspileCache};
use retrofit_core::pipeline::{self, RunOutcome};
use retrofit_core::ports::OutputCache;
use retrofit_core::settings::TranspileSettings;
use retrofit_domain::Registry;
use retrofit_types::report::{ModuleStatus, ReportToolInfo};
use retrofit_types::{Version, VersionRange};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "retrofit",
    version,
    about = "Rewrites parsed modules so they run on older interpreter versions."
)]
struct Cli {
    /// Config file (default: ./retrofit.toml when present).
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fix, check and write every input module.
    Fix(FixArgs),
    /// Fix and check without writing anything.
    Check(CheckArgs),
    /// List fixers and check rules with the version each one targets.
    ListFixers(ListFixersArgs),
    /// Explain what a fixer or check rule does.
    Explain(ExplainArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Syntax tree files (`*.json`) or directories scanned for them.
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    /// Oldest interpreter version the output must run on.
    #[arg(long)]
    target: Option<Version>,

    /// Newest interpreter version the output must run on.
    #[arg(long)]
    max_target: Option<Version>,

    /// Switch off a fixer (repeatable).
    #[arg(long)]
    disable: Vec<String>,

    /// Same-name backport installed on the target (repeatable, enables strict mode).
    #[arg(long = "backport")]
    backports: Vec<String>,

    /// Do not read or write the transpile cache.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Do not add a source encoding declaration for 2.x targets.
    #[arg(long, default_value_t = false)]
    no_coding_header: bool,
}

impl TargetArgs {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            target: self.target,
            max_target: self.max_target,
            disable: self.disable.clone(),
            backports: self.backports.clone(),
            no_cache: self.no_cache,
            no_coding_header: self.no_coding_header,
        }
    }
}

#[derive(Debug, Parser)]
struct FixArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Output directory for rewritten modules.
    #[arg(long, default_value = "retrofit-out")]
    out_dir: Utf8PathBuf,

    /// Print a unified diff of every changed module.
    #[arg(long, default_value_t = false)]
    diff: bool,

    /// Directory for report.json and report.md.
    #[arg(long)]
    report: Option<Utf8PathBuf>,

    /// Also write modules that have diagnostics.
    #[arg(long, default_value_t = false)]
    write_with_diagnostics: bool,
}

#[derive(Debug, Parser)]
struct CheckArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Parser)]
struct ListFixersArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Mark which entries are active for this target floor.
    #[arg(long)]
    target: Option<Version>,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Fixer or rule id (e.g. "syntax.fstring", "imports.queue").
    id: String,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// 0 clean, 2 diagnostics present, 1 configuration, internal or I/O error.
fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Fix(args) => cmd_fix(cli.config, args),
        Command::Check(args) => cmd_check(cli.config, args),
        Command::ListFixers(args) => cmd_list_fixers(args).map(|()| ExitCode::SUCCESS),
        Command::Explain(args) => cmd_explain(args).map(|()| ExitCode::SUCCESS),
    }
}

fn tool_info() -> ReportToolInfo {
    ReportToolInfo {
        name: "retrofit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn load_settings(
    config_path: Option<Utf8PathBuf>,
    args: &TargetArgs,
) -> anyhow::Result<TranspileSettings> {
    let cwd = Utf8PathBuf::try_from(std::env::current_dir().context("current dir")?)
        .context("current dir is not UTF-8")?;
    let file_config =
        config::load_or_default(config_path.as_deref(), &cwd).context("load retrofit.toml")?;
    let settings = ConfigMerger::new(file_config).merge(&args.overrides());
    debug!(
        "merged config: target={}, max_target={:?}, disable={:?}, backports={:?}, cache={}",
        settings.target,
        settings.max_target,
        settings.disable,
        settings.backports,
        settings.cache.enabled
    );
    Ok(settings)
}

fn run_pipeline(settings: &TranspileSettings, args: &TargetArgs) -> anyhow::Result<RunOutcome> {
    let source = FsModuleSource::new(args.inputs.clone());
    let cache = settings
        .cache
        .enabled
        .then(|| TranspileCache::new(settings.cache.dir.clone()));
    let outcome = pipeline::run(
        settings,
        &source,
        cache.as_ref().map(|c| c as &dyn OutputCache),
        tool_info(),
    )?;
    Ok(outcome)
}

fn print_problems(outcome: &RunOutcome) {
    for module in &outcome.report.modules {
        if module.status == ModuleStatus::Failed {
            eprintln!(
                "{}: failed: {}",
                module.path.as_deref().unwrap_or(&module.module),
                module.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    for module in &outcome.modules {
        for diagnostic in &module.diagnostics {
            println!("{diagnostic}");
        }
    }
}

fn print_summary(outcome: &RunOutcome) {
    let summary = &outcome.report.summary;
    println!(
        "retrofit: {} module(s), {} fix error(s), {} check error(s), {} failed",
        summary.modules, summary.fix_errors, summary.check_errors, summary.failed
    );
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if outcome.has_failures() {
        ExitCode::from(1)
    } else if outcome.has_diagnostics() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_fix(config_path: Option<Utf8PathBuf>, args: FixArgs) -> anyhow::Result<ExitCode> {
    let settings = load_settings(config_path, &args.target)?;
    let outcome = run_pipeline(&settings, &args.target)?;

    print_problems(&outcome);
    if args.diff {
        print!("{}", pipeline::render_diff(&outcome));
    }

    let written = pipeline::write_outputs(
        &outcome,
        &args.out_dir,
        &FsWritePort,
        args.write_with_diagnostics,
    )
    .with_context(|| format!("write outputs to {}", args.out_dir))?;
    info!(count = written.len(), out_dir = %args.out_dir, "wrote modules");

    if let Some(report_dir) = &args.report {
        pipeline::write_report(&outcome.report, report_dir, &FsWritePort)
            .with_context(|| format!("write report to {}", report_dir))?;
    }

    print_summary(&outcome);
    Ok(exit_code(&outcome))
}

fn cmd_check(config_path: Option<Utf8PathBuf>, args: CheckArgs) -> anyhow::Result<ExitCode> {
    let settings = load_settings(config_path, &args.target)?;
    let outcome = run_pipeline(&settings, &args.target)?;

    match args.format {
        OutputFormat::Text => {
            print_problems(&outcome);
            print_summary(&outcome);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
    }
    Ok(exit_code(&outcome))
}

fn cmd_list_fixers(args: ListFixersArgs) -> anyhow::Result<()> {
    // Fails here on a broken catalogue, before anything is listed.
    Registry::builtin()?;
    let range = args.target.map(VersionRange::from_floor);
    let entries = explain::all();

    match args.format {
        OutputFormat::Text => {
            println!("Available fixers and rules:\n");
            println!("  {:<36} {:<6} {:<20} DEPENDS ON", "ID", "SINCE", "KIND");
            println!("  {:<36} {:<6} {:<20} ----------", "--", "-----", "----");
            for entry in &entries {
                let marker = match range {
                    Some(range) if entry.active_for(range) => "*",
                    _ => " ",
                };
                println!(
                    "{marker} {:<36} {:<6} {:<20} {}",
                    entry.id,
                    entry.introduced.to_string(),
                    entry.kind(),
                    entry.depends_on().join(", ")
                );
            }
            println!();
            if let Some(range) = range {
                println!("* active for target {}", range.min());
            }
            println!("Use 'retrofit explain <id>' for details.");
        }
        OutputFormat::Json => {
            let items: Vec<_> = entries
                .iter()
                .map(|e| {
                    let mut item = serde_json::json!({
                        "id": e.id,
                        "since": e.introduced.to_string(),
                        "kind": e.kind(),
                        "depends_on": e.depends_on(),
                        "description": e.description,
                    });
                    if let Some(range) = range {
                        item["active"] = serde_json::json!(e.active_for(range));
                    }
                    item
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    let Some(entry) = explain::lookup(&args.id) else {
        let available = explain::list_ids().join(", ");
        anyhow::bail!("Unknown fixer or rule: '{}'\n\nAvailable: {}", args.id, available);
    };

    println!("================================================================================");
    println!("{}", entry.id);
    println!("================================================================================");
    println!();
    println!("Kind:    {}", entry.kind());
    println!("Since:   {}", entry.introduced);
    println!(
        "Active:  when the target floor is below {}",
        entry.introduced
    );
    println!();

    println!("DESCRIPTION");
    println!("--------------------------------------------------------------------------------");
    println!("{}", entry.description);
    println!();

    let depends_on = entry.depends_on();
    let dependents = explain::dependents(entry.id);
    if !depends_on.is_empty() || !dependents.is_empty() {
        println!("ORDERING");
        println!("--------------------------------------------------------------------------------");
        for dep in depends_on {
            println!("  runs after  {dep}");
        }
        for dep in dependents {
            println!("  runs before {dep}");
        }
        println!();
    }

    if entry.fixer.is_none() {
        println!("No rewrite exists for this construct; the check rule reports it.");
    } else if entry.rule.is_some() {
        println!("If the rewrite fails or is disabled, the check rule of the same id reports it.");
    }
    Ok(())
}
