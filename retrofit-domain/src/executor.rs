//! Fixpoint driver: runs a [`FixerPlan`] over one module until a full pass
//! changes nothing.

use crate::context::BuildContext;
use crate::error::InternalError;
use crate::fixers::{FixCtx, Fixer, Replacement, Rewrite, Shim, ShimKind, Target};
use crate::path::{Frame, ModuleFacts, NodePath};
use crate::registry::FixerPlan;
use crate::walk::{ChildMut, expr_children_mut, stmt_children_mut};
use retrofit_render::render_stmt;
use retrofit_types::DiagnosticKind;
use retrofit_types::VersionRange;
use retrofit_types::syntax::{Expr, Loc, Module, Stmt, StmtKind, docstring_len};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Passes allowed before a module is declared non-terminating.
pub const MAX_PASSES: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Idle,
    Scanning,
    Matched,
    Rewriting,
    Settled,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecReport {
    /// Full-tree passes, including the final one that changed nothing.
    pub passes: u32,
    /// Node rewrites per fixer id, summed over all passes.
    pub rewrites: BTreeMap<&'static str, usize>,
    /// Matches that kept the node and only requested shims, per fixer id.
    pub shim_requests: BTreeMap<&'static str, usize>,
}

impl ExecReport {
    pub fn total_rewrites(&self) -> usize {
        self.rewrites.values().sum()
    }
}

pub struct Executor<'p, 'r> {
    plan: &'p FixerPlan<'r>,
    limit: u32,
}

impl<'p, 'r> Executor<'p, 'r> {
    pub fn new(plan: &'p FixerPlan<'r>) -> Self {
        Self {
            plan,
            limit: MAX_PASSES,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Rewrites `module` in place. Fix errors go to `cx`; only a runaway
    /// catalogue or a malformed rewrite aborts the module.
    pub fn run(&self, module: &mut Module, cx: &mut BuildContext) -> Result<ExecReport, InternalError> {
        let label = cx.module.label();
        let mut report = ExecReport::default();
        let mut failed: BTreeSet<(&'static str, Loc)> = BTreeSet::new();
        let mut last_rewriters: Vec<String> = Vec::new();
        transition(&label, ExecState::Idle);

        for pass_no in 1..=self.limit {
            report.passes = pass_no;
            transition(&label, ExecState::Scanning);

            let mut pass = Pass {
                fixers: self.plan.fixers(),
                range: self.plan.range(),
                path: NodePath::new(ModuleFacts::scan(module)),
                failed: &mut failed,
                cx: &mut *cx,
                label: &label,
                shims: BTreeMap::new(),
                rewrites: BTreeMap::new(),
                shim_requests: BTreeMap::new(),
                changed: false,
                error: None,
            };
            pass.visit_suite(&mut module.body, 0, true);

            let Pass {
                shims,
                rewrites,
                shim_requests,
                changed,
                error,
                ..
            } = pass;
            if let Some(err) = error {
                transition(&label, ExecState::Failed);
                return Err(err);
            }
            let inserted = insert_shims(module, shims.into_values());
            debug!(
                module = %label,
                pass = pass_no,
                rewrites = rewrites.values().sum::<usize>(),
                shims = inserted,
                "pass finished"
            );

            last_rewriters = rewrites.keys().map(|id| id.to_string()).collect();
            for (id, n) in rewrites {
                *report.rewrites.entry(id).or_default() += n;
            }
            for (id, n) in shim_requests {
                *report.shim_requests.entry(id).or_default() += n;
            }
            if !changed && inserted == 0 {
                transition(&label, ExecState::Settled);
                return Ok(report);
            }
        }

        transition(&label, ExecState::Failed);
        Err(InternalError::PassLimitExceeded {
            module: label,
            limit: self.limit,
            fixers: last_rewriters,
        })
    }
}

fn transition(module: &str, state: ExecState) {
    trace!(module, ?state, "executor state");
}

enum Outcome {
    NoMatch,
    Failed,
    Keep,
    Replaced(usize, Replacement),
}

/// State of one full-tree pass.
struct Pass<'a, 'r> {
    fixers: &'a [&'r dyn Fixer],
    range: VersionRange,
    path: NodePath,
    failed: &'a mut BTreeSet<(&'static str, Loc)>,
    cx: &'a mut BuildContext,
    label: &'a str,
    shims: BTreeMap<String, Shim>,
    rewrites: BTreeMap<&'static str, usize>,
    shim_requests: BTreeMap<&'static str, usize>,
    changed: bool,
    error: Option<InternalError>,
}

impl Pass<'_, '_> {
    fn within(&mut self, frame: Option<Frame>, f: impl FnOnce(&mut Self)) {
        let pushed = frame.is_some();
        if let Some(frame) = frame {
            self.path.push(frame);
        }
        f(self);
        if pushed {
            self.path.pop();
        }
    }

    /// Tests fixers from index `min` on; the first match wins.
    fn try_fixers(&mut self, target: Target<'_>, min: usize) -> Outcome {
        let loc = target.loc();
        let fcx = FixCtx {
            range: self.range,
            path: &self.path,
        };
        for (idx, fixer) in self.fixers.iter().enumerate().skip(min) {
            let id = fixer.meta().id;
            if self.failed.contains(&(id, loc)) || !fixer.matches(target, &fcx) {
                continue;
            }
            trace!(module = self.label, fixer = id, line = loc.line, state = ?ExecState::Matched, "fixer matched");
            trace!(module = self.label, fixer = id, state = ?ExecState::Rewriting, "rewriting");

            return match fixer.rewrite(target, &fcx) {
                Ok(Rewrite { replacement, shims }) => {
                    let requested_shims = !shims.is_empty();
                    for shim in shims {
                        self.shims.entry(shim.id.clone()).or_insert(shim);
                    }
                    if matches!(
                        (&replacement, target),
                        (Replacement::Expr(_), Target::Stmt(_))
                            | (Replacement::Stmts(_), Target::Expr(_))
                    ) {
                        self.error = Some(InternalError::ReplacementMismatch {
                            fixer: id,
                            expected: target.kind_name(),
                            produced: replacement.kind_name(),
                        });
                        return Outcome::Failed;
                    }
                    match replacement {
                        Replacement::Keep => {
                            if requested_shims {
                                *self.shim_requests.entry(id).or_default() += 1;
                            }
                            Outcome::Keep
                        }
                        replacement => {
                            self.changed = true;
                            *self.rewrites.entry(id).or_default() += 1;
                            Outcome::Replaced(idx, replacement)
                        }
                    }
                }
                Err(err) => {
                    debug!(module = self.label, fixer = id, error = %err, "fixer failed");
                    self.failed.insert((id, loc));
                    self.cx.record_failed_rewrite(id, loc);
                    self.cx.push(
                        DiagnosticKind::FixError,
                        id,
                        err.loc.unwrap_or(loc),
                        err.message,
                    );
                    Outcome::Failed
                }
            };
        }
        Outcome::NoMatch
    }

    fn visit_suite(&mut self, suite: &mut Vec<Stmt>, min: usize, module_level: bool) {
        let original = std::mem::take(suite);
        let first_loc = original.first().map(|s| s.loc);
        let mut out = Vec::with_capacity(original.len());
        for stmt in original {
            if self.error.is_some() {
                out.push(stmt);
            } else {
                self.visit_stmt(stmt, min, &mut out);
            }
        }
        if out.is_empty()
            && !module_level
            && let Some(loc) = first_loc
        {
            out.push(Stmt::new(StmtKind::Pass, loc));
        }
        *suite = out;
    }

    fn visit_stmt(&mut self, mut stmt: Stmt, min: usize, out: &mut Vec<Stmt>) {
        match self.try_fixers(Target::Stmt(&stmt), min) {
            Outcome::NoMatch | Outcome::Failed | Outcome::Keep => {
                self.visit_stmt_children(&mut stmt, min);
                out.push(stmt);
            }
            Outcome::Replaced(idx, Replacement::Stmts(stmts)) => {
                for mut s in stmts {
                    self.visit_stmt_children(&mut s, idx + 1);
                    out.push(s);
                }
            }
            // Mismatches were already recorded as internal errors.
            Outcome::Replaced(_, _) => out.push(stmt),
        }
    }

    fn visit_stmt_children(&mut self, stmt: &mut Stmt, min: usize) {
        if self.error.is_some() {
            return;
        }
        stmt_children_mut(stmt, &mut |child| match child {
            ChildMut::Suite(body, frame) => {
                self.within(frame, |this| this.visit_suite(body, min, false))
            }
            ChildMut::Expr(e, frame) => self.within(frame, |this| this.visit_expr(e, min)),
        });
    }

    fn visit_expr(&mut self, expr: &mut Expr, min: usize) {
        if self.error.is_some() {
            return;
        }
        let next_min = match self.try_fixers(Target::Expr(expr), min) {
            Outcome::NoMatch | Outcome::Failed | Outcome::Keep => min,
            Outcome::Replaced(idx, Replacement::Expr(replacement)) => {
                *expr = replacement;
                idx + 1
            }
            Outcome::Replaced(_, _) => return,
        };
        expr_children_mut(expr, &mut |child| match child {
            ChildMut::Suite(body, frame) => {
                self.within(frame, |this| this.visit_suite(body, next_min, false))
            }
            ChildMut::Expr(e, frame) => self.within(frame, |this| this.visit_expr(e, next_min)),
        });
    }
}

fn is_import_like(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Import { .. } | StmtKind::ImportFrom { .. } => true,
        StmtKind::Try { body, handlers, .. } => {
            let simple = |s: &Stmt| {
                matches!(
                    s.kind,
                    StmtKind::Import { .. }
                        | StmtKind::ImportFrom { .. }
                        | StmtKind::Assign { .. }
                        | StmtKind::Pass
                )
            };
            body.iter().all(simple) && handlers.iter().all(|h| h.body.iter().all(simple))
        }
        _ => false,
    }
}

/// Inserts shims not yet present at module level; returns how many statements
/// were added.
fn insert_shims(module: &mut Module, shims: impl IntoIterator<Item = Shim>) -> usize {
    let mut shims: Vec<Shim> = shims.into_iter().collect();
    shims.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

    let futures: BTreeSet<String> = module.future_names().into_iter().map(str::to_string).collect();
    let existing: BTreeSet<String> = module.body.iter().map(render_stmt).collect();

    let mut by_kind: BTreeMap<ShimKind, Vec<Stmt>> = BTreeMap::new();
    for shim in shims {
        let fresh: Vec<Stmt> = match shim.kind {
            ShimKind::Future => {
                let name = shim.id.strip_prefix("__future__.").unwrap_or(&shim.id);
                if futures.contains(name) {
                    continue;
                }
                shim.stmts
            }
            ShimKind::Import | ShimKind::Helper => shim
                .stmts
                .into_iter()
                .filter(|s| !existing.contains(&render_stmt(s)))
                .collect(),
        };
        by_kind.entry(shim.kind).or_default().extend(fresh);
    }

    let doc = docstring_len(&module.body);
    let mut at = doc
        + module.body[doc..]
            .iter()
            .take_while(|s| s.is_future_import())
            .count();
    let mut inserted = 0;
    for (kind, stmts) in by_kind {
        if kind == ShimKind::Helper {
            at += module.body[at..].iter().take_while(|s| is_import_like(s)).count();
        }
        let n = stmts.len();
        module.body.splice(at..at, stmts);
        at += n;
        inserted += n;
    }
    inserted
}
