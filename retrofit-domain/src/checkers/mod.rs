//! Post-fix verification: re-walks the settled tree and reports every construct
//! the target range cannot run.

use crate::context::{BuildContext, ImportPolicy};
use crate::fixers::Target;
use crate::path::{Frame, ModuleFacts, NodePath};
use crate::walk::{Child, expr_children, stmt_children};
use retrofit_types::syntax::{Expr, Loc, Module, Stmt};
use retrofit_types::{DiagnosticKind, Version, VersionRange};
use tracing::debug;

mod imports;
mod rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMeta {
    pub id: &'static str,
    /// Version that introduced the forbidden construct.
    pub introduced: Version,
    pub description: &'static str,
}

/// What a rule sees besides the node.
pub struct RuleCtx<'a> {
    pub range: VersionRange,
    pub path: &'a NodePath,
    pub policy: &'a ImportPolicy,
}

pub trait Rule: Send + Sync {
    fn meta(&self) -> RuleMeta;

    /// Names the offending construct at `target`, if any.
    fn check(&self, target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String>;

    fn message(&self, what: String, range: VersionRange) -> String {
        format!(
            "{what} requires {}, target floor is {}",
            self.meta().introduced,
            range.min()
        )
    }
}

pub struct Checker {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker {
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn metas(&self) -> Vec<RuleMeta> {
        self.rules.iter().map(|r| r.meta()).collect()
    }

    /// Appends a check error to `cx` for each violation and returns how many
    /// were added. Violations already reported as fix errors by the fixer of
    /// the same id at the same place are skipped.
    pub fn check(&self, module: &Module, cx: &mut BuildContext) -> usize {
        let active: Vec<&dyn Rule> = self
            .rules
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| !cx.range.supports(r.meta().introduced))
            .collect();
        if active.is_empty() {
            return 0;
        }

        let mut walk = CheckWalk {
            rules: &active,
            range: cx.range,
            policy: &cx.policy,
            path: NodePath::new(ModuleFacts::scan(module)),
            found: Vec::new(),
        };
        walk.suite(&module.body);
        let found = walk.found;

        let mut added = 0;
        for (id, loc, message) in found {
            if cx.has_fix_error(id, loc) {
                continue;
            }
            cx.push(DiagnosticKind::CheckError, id, loc, message);
            added += 1;
        }
        debug!(module = %cx.module.label(), violations = added, "check finished");
        added
    }
}

pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    let mut out = rules::shape_rules();
    out.extend(imports::import_rules());
    out
}

pub fn builtin_rule_metas() -> Vec<RuleMeta> {
    builtin_rules().iter().map(|r| r.meta()).collect()
}

struct CheckWalk<'a> {
    rules: &'a [&'a dyn Rule],
    range: VersionRange,
    policy: &'a ImportPolicy,
    path: NodePath,
    found: Vec<(&'static str, Loc, String)>,
}

impl CheckWalk<'_> {
    fn test(&mut self, target: Target<'_>) {
        let cx = RuleCtx {
            range: self.range,
            path: &self.path,
            policy: self.policy,
        };
        for rule in self.rules {
            if let Some(what) = rule.check(target, &cx) {
                let message = rule.message(what, self.range);
                self.found.push((rule.meta().id, target.loc(), message));
            }
        }
    }

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

    fn suite(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.test(Target::Stmt(stmt));
        stmt_children(stmt, &mut |child| self.child(child));
    }

    fn expr(&mut self, expr: &Expr) {
        self.test(Target::Expr(expr));
        expr_children(expr, &mut |child| self.child(child));
    }

    fn child(&mut self, child: Child<'_>) {
        match child {
            Child::Suite(body, frame) => self.within(frame, |w| w.suite(body)),
            Child::Expr(e, frame) => self.within(frame, |w| w.expr(e)),
        }
    }
}
