//! Lookup for the `retrofit explain` and `retrofit list-fixers` commands.
//!
//! Fixers and check rules share ids: a fixer removes a construct and the rule
//! of the same id reports it when it survives. Checker-only rules have no fixer.

use retrofit_domain::{FixerMeta, RuleMeta, builtin_fixer_metas, builtin_rule_metas};
use retrofit_types::{Version, VersionRange};

#[derive(Debug, Clone)]
pub struct Explanation {
    pub id: &'static str,
    pub introduced: Version,
    pub description: &'static str,
    pub fixer: Option<FixerMeta>,
    pub rule: Option<RuleMeta>,
}

impl Explanation {
    pub fn kind(&self) -> &'static str {
        match (&self.fixer, &self.rule) {
            (Some(_), Some(_)) => "fixer + check rule",
            (Some(_), None) => "fixer",
            _ => "check rule",
        }
    }

    pub fn depends_on(&self) -> &'static [&'static str] {
        self.fixer.as_ref().map(|f| f.depends_on).unwrap_or(&[])
    }

    /// Whether this id does anything for output that must run on `range`.
    pub fn active_for(&self, range: VersionRange) -> bool {
        !range.supports(self.introduced)
    }
}

/// Every fixer in declaration order, then the checker-only rules.
pub fn all() -> Vec<Explanation> {
    let rules = builtin_rule_metas();
    let mut out: Vec<Explanation> = builtin_fixer_metas()
        .into_iter()
        .map(|fixer| Explanation {
            id: fixer.id,
            introduced: fixer.introduced,
            description: fixer.description,
            rule: rules.iter().find(|r| r.id == fixer.id).copied(),
            fixer: Some(fixer),
        })
        .collect();
    for rule in rules {
        if out.iter().all(|e| e.id != rule.id) {
            out.push(Explanation {
                id: rule.id,
                introduced: rule.introduced,
                description: rule.description,
                fixer: None,
                rule: Some(rule),
            });
        }
    }
    out
}

pub fn lookup(id: &str) -> Option<Explanation> {
    all().into_iter().find(|e| e.id == id)
}

pub fn list_ids() -> Vec<&'static str> {
    all().iter().map(|e| e.id).collect()
}

/// Ids that depend on `id`.
pub fn dependents(id: &str) -> Vec<&'static str> {
    builtin_fixer_metas()
        .into_iter()
        .filter(|f| f.depends_on.contains(&id))
        .map(|f| f.id)
        .collect()
}
