use retrofit_types::syntax::Loc;
use retrofit_types::{Diagnostic, DiagnosticKind, LineMap, ModuleId, VersionRange};
use std::collections::BTreeSet;

/// Which same-named backport modules the caller has installed.
///
/// `Lenient` only warns about imports that might resolve to a backport; `Strict`
/// reports them unless listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    #[default]
    Lenient,
    Strict(BTreeSet<String>),
}

impl ImportPolicy {
    pub fn from_backports(backports: Option<Vec<String>>) -> Self {
        match backports {
            Some(names) => ImportPolicy::Strict(names.into_iter().collect()),
            None => ImportPolicy::Lenient,
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, ImportPolicy::Strict(_))
    }

    pub fn allows(&self, module: &str) -> bool {
        match self {
            ImportPolicy::Lenient => false,
            ImportPolicy::Strict(names) => names.contains(module),
        }
    }
}

/// State for one module's fix + check run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub range: VersionRange,
    pub module: ModuleId,
    pub lines: LineMap,
    pub policy: ImportPolicy,
    diagnostics: Vec<Diagnostic>,
    /// (fixer id, matched node) for every rewrite that failed.
    failed_rewrites: BTreeSet<(String, Loc)>,
}

impl BuildContext {
    pub fn new(range: VersionRange, module: ModuleId) -> Self {
        Self {
            range,
            module,
            lines: LineMap::default(),
            policy: ImportPolicy::default(),
            diagnostics: Vec::new(),
            failed_rewrites: BTreeSet::new(),
        }
    }

    pub fn with_lines(mut self, lines: LineMap) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_policy(mut self, policy: ImportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn push(&mut self, kind: DiagnosticKind, rule: &str, loc: Loc, message: impl Into<String>) {
        let (line, column) = self.lines.locate(loc);
        self.diagnostics.push(Diagnostic {
            kind,
            rule: rule.to_string(),
            module: self.module.label(),
            line,
            column,
            message: message.into(),
        });
    }

    /// Diagnostics in discovery order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub(crate) fn record_failed_rewrite(&mut self, fixer: &str, matched: Loc) {
        self.failed_rewrites.insert((fixer.to_string(), matched));
    }

    /// Whether `fixer` failed on the node at `matched`. The fix error itself
    /// may point at a sub-node.
    pub fn rewrite_failed(&self, fixer: &str, matched: Loc) -> bool {
        self.failed_rewrites
            .iter()
            .any(|(id, loc)| id == fixer && *loc == matched)
    }

    /// A violation of `rule` at `loc` already covered by a fix error.
    pub(crate) fn has_fix_error(&self, rule: &str, loc: Loc) -> bool {
        if self.rewrite_failed(rule, loc) {
            return true;
        }
        let (line, column) = self.lines.locate(loc);
        self.diagnostics
            .iter()
            .any(|d| d.is_fix_error() && d.rule == rule && d.line == line && d.column == column)
    }

    /// Consumes the context, returning diagnostics ordered by line, then column,
    /// then discovery order.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut out = self.diagnostics;
        out.sort_by_key(|d| (d.line, d.column));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_types::Version;

    #[test]
    fn diagnostics_sort_by_position_keeping_discovery_order() {
        let mut ctx = BuildContext::new(
            VersionRange::from_floor(Version::new(2, 7)),
            ModuleId::new("m"),
        );
        ctx.push(DiagnosticKind::CheckError, "b", Loc::new(5, 0), "late");
        ctx.push(DiagnosticKind::FixError, "a", Loc::new(2, 4), "first");
        ctx.push(DiagnosticKind::CheckError, "c", Loc::new(2, 4), "second");
        ctx.push(DiagnosticKind::CheckError, "d", Loc::new(2, 0), "early");

        let rules: Vec<String> = ctx.into_diagnostics().into_iter().map(|d| d.rule).collect();
        assert_eq!(rules, vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn positions_go_through_the_line_map() {
        let mut ctx = BuildContext::new(
            VersionRange::from_floor(Version::new(2, 7)),
            ModuleId::new("m"),
        )
        .with_lines(LineMap::new(1));
        ctx.push(DiagnosticKind::FixError, "r", Loc::new(3, 2), "x");
        assert!(ctx.has_fix_error("r", Loc::new(3, 2)));
        assert!(!ctx.has_fix_error("other", Loc::new(3, 2)));
        let d = &ctx.diagnostics()[0];
        assert_eq!((d.line, d.column), (4, 3));
    }

    #[test]
    fn failed_rewrite_covers_its_matched_node() {
        let mut ctx = BuildContext::new(
            VersionRange::from_floor(Version::new(2, 7)),
            ModuleId::new("m"),
        );
        ctx.push(DiagnosticKind::FixError, "r", Loc::new(1, 12), "sub-node");
        ctx.record_failed_rewrite("r", Loc::new(1, 0));
        assert!(ctx.rewrite_failed("r", Loc::new(1, 0)));
        assert!(ctx.has_fix_error("r", Loc::new(1, 0)));
        assert!(!ctx.has_fix_error("r", Loc::new(2, 0)));
        assert!(!ctx.has_fix_error("other", Loc::new(1, 0)));
    }

    #[test]
    fn strict_policy_allows_only_listed_backports() {
        let policy = ImportPolicy::from_backports(Some(vec!["enum".to_string()]));
        assert!(policy.is_strict());
        assert!(policy.allows("enum"));
        assert!(!policy.allows("typing"));
        assert!(!ImportPolicy::Lenient.allows("enum"));
    }
}
