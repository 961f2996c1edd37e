use super::{Rule, RuleCtx, RuleMeta};
use crate::fixers::{RENAMED_MODULES, RenamedModule, Target};
use retrofit_types::syntax::{Stmt, StmtKind};
use retrofit_types::{Version, VersionRange};
use tracing::warn;

pub(super) fn import_rules() -> Vec<Box<dyn Rule>> {
    let mut out: Vec<Box<dyn Rule>> = RENAMED_MODULES
        .iter()
        .map(|renamed| Box::new(RenamedImportRule(renamed)) as Box<dyn Rule>)
        .collect();
    out.push(Box::new(UnusableModulesRule));
    out
}

/// Modules bound by an import statement, including `from pkg import sub`
/// spelled as `pkg.sub`.
fn imported_modules(stmt: &Stmt) -> Vec<String> {
    match &stmt.kind {
        StmtKind::Import { names } => names.iter().map(|a| a.name.clone()).collect(),
        StmtKind::ImportFrom {
            module: Some(module),
            names,
            level: 0,
        } => std::iter::once(module.clone())
            .chain(names.iter().map(|a| format!("{module}.{}", a.name)))
            .collect(),
        _ => Vec::new(),
    }
}

fn is_within(imported: &str, module: &str) -> bool {
    imported == module
        || imported
            .strip_prefix(module)
            .is_some_and(|rest| rest.starts_with('.'))
}

struct RenamedImportRule(&'static RenamedModule);

impl Rule for RenamedImportRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta {
            id: self.0.id,
            introduced: Version::new(3, 0),
            description: "imports of renamed standard library modules without a fallback",
        }
    }

    fn check(&self, target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
        let Target::Stmt(stmt) = target else {
            return None;
        };
        if cx.path.in_import_guard() {
            return None;
        }
        let new = self.0.new;
        let hit = match &stmt.kind {
            StmtKind::Import { names } => names.iter().any(|a| a.name == new),
            StmtKind::ImportFrom {
                module: Some(module),
                level: 0,
                ..
            } => module == new,
            _ => false,
        };
        hit.then(|| format!("unguarded import of '{new}'"))
    }
}

#[derive(Debug, Clone, Copy)]
enum Backport {
    None,
    Named(&'static str),
    /// Installs under the standard library name.
    SameName(&'static str),
}

struct NewModule {
    name: &'static str,
    since: Version,
    backport: Backport,
}

const fn new_module(name: &'static str, major: u16, minor: u16, backport: Backport) -> NewModule {
    NewModule {
        name,
        since: Version::new(major, minor),
        backport,
    }
}

static NEW_MODULES: &[NewModule] = &[
    new_module("asyncio", 3, 4, Backport::None),
    new_module("zipapp", 3, 5, Backport::None),
    new_module("csv", 3, 0, Backport::Named("backports.csv")),
    new_module("selectors", 3, 4, Backport::Named("selectors2")),
    new_module("pathlib", 3, 4, Backport::Named("pathlib2")),
    new_module("importlib.resources", 3, 7, Backport::Named("importlib_resources")),
    new_module("inspect", 3, 6, Backport::Named("inspect2")),
    new_module("lzma", 3, 3, Backport::SameName("backports.lzma")),
    new_module("ipaddress", 3, 4, Backport::SameName("py2-ipaddress")),
    new_module("enum", 3, 4, Backport::SameName("enum34")),
    new_module("typing", 3, 5, Backport::SameName("typing")),
    new_module("secrets", 3, 6, Backport::SameName("python2-secrets")),
    new_module("statistics", 3, 4, Backport::SameName("statistics")),
    new_module("dataclasses", 3, 7, Backport::SameName("dataclasses")),
    new_module("contextvars", 3, 7, Backport::SameName("contextvars")),
];

/// Module-level imports of standard library modules the floor lacks.
struct UnusableModulesRule;

impl UnusableModulesRule {
    const RULE_ID: &'static str = "imports.unusable_modules";

    fn prohibited(&self, imported: &str, cx: &RuleCtx<'_>) -> Option<&'static NewModule> {
        let floor = cx.range.min();
        let found = NEW_MODULES
            .iter()
            .filter(|m| m.since > floor)
            .find(|m| is_within(imported, m.name))?;
        if cx.policy.allows(found.name) {
            return None;
        }
        if let Backport::SameName(package) = found.backport
            && !cx.policy.is_strict()
        {
            warn!(
                module = found.name,
                package,
                floor = %floor,
                "import needs a backport installed under the same name"
            );
            return None;
        }
        Some(found)
    }
}

impl Rule for UnusableModulesRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta {
            id: Self::RULE_ID,
            introduced: Version::new(3, 7),
            description: "top-level imports of standard library modules newer than the floor",
        }
    }

    fn check(&self, target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
        let Target::Stmt(stmt) = target else {
            return None;
        };
        if !cx.path.is_module_level() || cx.path.in_import_guard() {
            return None;
        }
        let (imported, module) = imported_modules(stmt)
            .into_iter()
            .find_map(|imported| self.prohibited(&imported, cx).map(|m| (imported, m)))?;

        let advice = match module.backport {
            Backport::None => "No backport for this package is known.".to_string(),
            Backport::Named(package) | Backport::SameName(package) => {
                format!("Use 'https://pypi.org/project/{package}' instead.")
            }
        };
        Some(format!(
            "Prohibited import '{imported}' (only available since python {}). {advice}",
            module.since
        ))
    }

    fn message(&self, what: String, _range: VersionRange) -> String {
        what
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ImportPolicy;
    use crate::path::{Frame, NodePath};
    use pretty_assertions::assert_eq;
    use retrofit_types::syntax::build::*;

    fn check(stmt: &Stmt, floor: (u16, u16), policy: &ImportPolicy, path: &NodePath) -> Option<String> {
        let cx = RuleCtx {
            range: VersionRange::from_floor(Version::new(floor.0, floor.1)),
            path,
            policy,
        };
        UnusableModulesRule.check(Target::Stmt(stmt), &cx)
    }

    #[test]
    fn module_without_backport() {
        let msg = check(&import("asyncio"), (2, 7), &ImportPolicy::Lenient, &NodePath::default());
        assert_eq!(
            msg.as_deref(),
            Some(
                "Prohibited import 'asyncio' (only available since python 3.4). \
                 No backport for this package is known."
            )
        );
        assert_eq!(
            check(&import("asyncio"), (3, 4), &ImportPolicy::Lenient, &NodePath::default()),
            None
        );
    }

    #[test]
    fn differently_named_backport_is_suggested() {
        let stmt = import_from("pathlib", &["Path"]);
        let msg = check(&stmt, (2, 7), &ImportPolicy::Lenient, &NodePath::default());
        assert_eq!(
            msg.as_deref(),
            Some(
                "Prohibited import 'pathlib' (only available since python 3.4). \
                 Use 'https://pypi.org/project/pathlib2' instead."
            )
        );
    }

    #[test]
    fn submodule_imports_count() {
        let stmt = import_from("importlib", &["resources"]);
        let msg = check(&stmt, (3, 6), &ImportPolicy::Lenient, &NodePath::default());
        assert!(msg.is_some_and(|m| m.contains("'importlib.resources'")));
        assert_eq!(
            check(&import("importlib"), (3, 6), &ImportPolicy::Lenient, &NodePath::default()),
            None
        );
    }

    #[test]
    fn same_named_backport_depends_on_policy() {
        let stmt = import("enum");
        assert_eq!(check(&stmt, (2, 7), &ImportPolicy::Lenient, &NodePath::default()), None);

        let strict = ImportPolicy::from_backports(Some(vec!["typing".to_string()]));
        let msg = check(&stmt, (2, 7), &strict, &NodePath::default());
        assert!(msg.is_some_and(|m| m.contains("enum34")));

        let allowed = ImportPolicy::from_backports(Some(vec!["enum".to_string()]));
        assert_eq!(check(&stmt, (2, 7), &allowed, &NodePath::default()), None);
    }

    #[test]
    fn strict_policy_accepts_any_listed_module() {
        let allowed = ImportPolicy::from_backports(Some(vec!["pathlib".to_string()]));
        assert_eq!(check(&import("pathlib"), (2, 7), &allowed, &NodePath::default()), None);
        assert_eq!(
            check(&import_from("pathlib", &["Path"]), (2, 7), &allowed, &NodePath::default()),
            None
        );
        assert!(check(&import("asyncio"), (2, 7), &allowed, &NodePath::default()).is_some());
    }

    #[test]
    fn guarded_and_nested_imports_are_ignored() {
        let mut guarded = NodePath::default();
        guarded.push(Frame::ImportGuard);
        assert_eq!(check(&import("asyncio"), (2, 7), &ImportPolicy::Lenient, &guarded), None);

        let mut nested = NodePath::default();
        nested.push(Frame::Function {
            name: "run".to_string(),
            first_param: None,
        });
        assert_eq!(check(&import("asyncio"), (2, 7), &ImportPolicy::Lenient, &nested), None);
    }

    #[test]
    fn renamed_import_rule_respects_guards() {
        let rule = RenamedImportRule(&RENAMED_MODULES[0]);
        let policy = ImportPolicy::Lenient;
        let mut path = NodePath::default();
        let cx = |path: &NodePath| -> Option<String> {
            let cx = RuleCtx {
                range: VersionRange::from_floor(Version::new(2, 7)),
                path,
                policy: &policy,
            };
            rule.check(Target::Stmt(&import("queue")), &cx)
        };
        assert_eq!(cx(&path).as_deref(), Some("unguarded import of 'queue'"));
        path.push(Frame::ImportGuard);
        assert_eq!(cx(&path), None);
    }
}
