//! Process-wide fixer catalogue, ordered once by declared dependencies.

use crate::error::ConfigError;
use crate::fixers::{self, Fixer, FixerMeta};
use retrofit_types::VersionRange;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

pub struct Registry {
    /// Fixers in resolved order.
    fixers: Vec<Box<dyn Fixer>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl Registry {
    /// Validates the catalogue and orders it so every fixer follows its
    /// dependencies. Unconstrained fixers keep declaration order.
    pub fn new(fixers: Vec<Box<dyn Fixer>>) -> Result<Self, ConfigError> {
        let metas: Vec<FixerMeta> = fixers.iter().map(|f| f.meta()).collect();
        let order = resolve(&metas)?;

        let mut slots: Vec<Option<Box<dyn Fixer>>> = fixers.into_iter().map(Some).collect();
        let fixers = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();
        Ok(Self { fixers })
    }

    /// The builtin catalogue, validated on first use.
    pub fn builtin() -> Result<&'static Registry, ConfigError> {
        static BUILTIN: OnceLock<Result<Registry, ConfigError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Registry::new(fixers::builtin_fixers()))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn len(&self) -> usize {
        self.fixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fixers.iter().map(|f| f.meta().id)
    }

    pub fn metas(&self) -> Vec<FixerMeta> {
        self.fixers.iter().map(|f| f.meta()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&dyn Fixer> {
        self.fixers
            .iter()
            .find(|f| f.meta().id == id)
            .map(|f| f.as_ref())
    }

    /// Fixers that must run for `range`, in resolved order.
    pub fn plan(&self, range: VersionRange) -> FixerPlan<'_> {
        FixerPlan {
            range,
            fixers: self
                .fixers
                .iter()
                .map(|f| f.as_ref())
                .filter(|f| !range.supports(f.meta().introduced))
                .collect(),
        }
    }

    /// Like [`Registry::plan`] with some fixers switched off. Disabling a fixer
    /// that an active fixer depends on is rejected.
    pub fn plan_with(
        &self,
        range: VersionRange,
        disabled: &[String],
    ) -> Result<FixerPlan<'_>, ConfigError> {
        for id in disabled {
            if self.get(id).is_none() {
                return Err(ConfigError::UnknownFixer { id: id.clone() });
            }
        }
        let disabled: BTreeSet<&str> = disabled.iter().map(String::as_str).collect();
        let mut plan = self.plan(range);
        plan.fixers.retain(|f| !disabled.contains(f.meta().id));

        for fixer in &plan.fixers {
            let meta = fixer.meta();
            if let Some(dep) = meta.depends_on.iter().find(|d| disabled.contains(*d)) {
                return Err(ConfigError::DisabledDependency {
                    fixer: meta.id.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
        Ok(plan)
    }
}

/// Kahn's algorithm over declaration indices; the smallest ready index goes next.
fn resolve(metas: &[FixerMeta]) -> Result<Vec<usize>, ConfigError> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for (idx, meta) in metas.iter().enumerate() {
        if index.insert(meta.id, idx).is_some() {
            return Err(ConfigError::DuplicateFixer {
                id: meta.id.to_string(),
            });
        }
    }

    let mut deps: Vec<BTreeSet<usize>> = Vec::with_capacity(metas.len());
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); metas.len()];
    for (idx, meta) in metas.iter().enumerate() {
        let mut set = BTreeSet::new();
        for dep in meta.depends_on {
            let Some(&dep_idx) = index.get(dep) else {
                return Err(ConfigError::UnknownDependency {
                    fixer: meta.id.to_string(),
                    dependency: dep.to_string(),
                });
            };
            if set.insert(dep_idx) {
                dependents[dep_idx].push(idx);
            }
        }
        deps.push(set);
    }

    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..metas.len()).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(metas.len());
    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for &next in &dependents[idx] {
            pending[next] -= 1;
            if pending[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < metas.len() {
        return Err(ConfigError::DependencyCycle {
            members: find_cycle(metas, &deps, &pending),
        });
    }
    Ok(order)
}

/// Every unresolved fixer has an unresolved dependency, so following them from
/// the first one must revisit a node.
fn find_cycle(metas: &[FixerMeta], deps: &[BTreeSet<usize>], pending: &[usize]) -> Vec<String> {
    let Some(start) = (0..metas.len()).find(|&i| pending[i] > 0) else {
        return Vec::new();
    };
    let mut trail = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&d| pending[d] > 0) else {
            return trail.iter().map(|&i| metas[i].id.to_string()).collect();
        };
        if let Some(pos) = trail.iter().position(|&i| i == next) {
            let mut members: Vec<String> =
                trail[pos..].iter().map(|&i| metas[i].id.to_string()).collect();
            members.push(metas[next].id.to_string());
            return members;
        }
        trail.push(next);
        current = next;
    }
}

/// The fixers active for one target range.
#[derive(Clone)]
pub struct FixerPlan<'r> {
    range: VersionRange,
    fixers: Vec<&'r dyn Fixer>,
}

impl std::fmt::Debug for FixerPlan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixerPlan")
            .field("range", &self.range)
            .field("fixers", &self.ids())
            .finish()
    }
}

impl<'r> FixerPlan<'r> {
    pub fn range(&self) -> VersionRange {
        self.range
    }

    pub fn fixers(&self) -> &[&'r dyn Fixer] {
        &self.fixers
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.fixers.iter().map(|f| f.meta().id).collect()
    }

    pub fn len(&self) -> usize {
        self.fixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixers.is_empty()
    }

    /// The same plan without `id`, bypassing dependency checks.
    pub fn without(&self, id: &str) -> Self {
        Self {
            range: self.range,
            fixers: self
                .fixers
                .iter()
                .copied()
                .filter(|f| f.meta().id != id)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FixError;
    use crate::fixers::{FixCtx, Rewrite, Target};
    use pretty_assertions::assert_eq;
    use retrofit_types::Version;

    struct Stub(&'static str, &'static [&'static str]);

    impl Fixer for Stub {
        fn meta(&self) -> FixerMeta {
            FixerMeta {
                id: self.0,
                introduced: Version::new(3, 0),
                depends_on: self.1,
                description: "stub",
            }
        }

        fn matches(&self, _target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
            false
        }

        fn rewrite(&self, _target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
            Ok(Rewrite::keep())
        }
    }

    fn registry(stubs: Vec<Stub>) -> Result<Registry, ConfigError> {
        Registry::new(
            stubs
                .into_iter()
                .map(|s| Box::new(s) as Box<dyn Fixer>)
                .collect(),
        )
    }

    #[test]
    fn dependencies_come_first_and_ties_keep_declaration_order() {
        let reg = registry(vec![
            Stub("c", &["b"]),
            Stub("a", &[]),
            Stub("b", &[]),
            Stub("d", &[]),
        ])
        .expect("valid catalogue");
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn unknown_dependency_is_config_error() {
        let err = registry(vec![Stub("a", &["missing"])]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                fixer: "a".to_string(),
                dependency: "missing".to_string(),
            }
        );
    }

    #[test]
    fn cycle_names_its_members() {
        let err = registry(vec![
            Stub("free", &[]),
            Stub("a", &["b"]),
            Stub("b", &["c"]),
            Stub("c", &["a"]),
        ])
        .unwrap_err();
        let ConfigError::DependencyCycle { members } = err else {
            panic!("cycle expected, got {err:?}");
        };
        assert_eq!(members, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = registry(vec![Stub("a", &[]), Stub("a", &[])]).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateFixer { id: "a".to_string() });
    }

    #[test]
    fn builtin_catalogue_resolves() {
        let reg = Registry::builtin().expect("builtin catalogue");
        let ids: Vec<&str> = reg.ids().collect();
        let pos = |id: &str| ids.iter().position(|x| *x == id).expect(id);
        assert!(pos("annotations.postponed") < pos("future.annotations"));
        assert!(pos("annotations.function") < pos("syntax.keyword_only_args"));
        assert!(pos("classes.metaclass_keyword") < pos("classes.new_style"));
    }

    #[test]
    fn plan_skips_fixers_at_or_below_the_floor() {
        let reg = Registry::builtin().expect("builtin catalogue");
        let plan = reg.plan(VersionRange::from_floor(Version::new(3, 6)));
        let ids = plan.ids();
        assert!(ids.contains(&"syntax.named_expr"));
        assert!(ids.contains(&"future.annotations"));
        assert!(!ids.contains(&"syntax.fstring"));
        assert!(!ids.contains(&"imports.queue"));
        let shown = format!("{plan:?}");
        assert!(shown.contains("syntax.named_expr"), "{shown}");

        let modern = reg.plan(VersionRange::from_floor(Version::new(3, 9)));
        assert!(modern.is_empty());
    }

    #[test]
    fn disabling_a_needed_dependency_is_rejected() {
        let reg = Registry::builtin().expect("builtin catalogue");
        let range = VersionRange::from_floor(Version::new(2, 7));

        let err = reg
            .plan_with(range, &["annotations.function".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DisabledDependency { .. }));

        let err = reg.plan_with(range, &["nope".to_string()]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownFixer { id: "nope".to_string() });

        let plan = reg
            .plan_with(
                range,
                &[
                    "annotations.function".to_string(),
                    "syntax.keyword_only_args".to_string(),
                ],
            )
            .expect("both disabled");
        assert!(!plan.ids().contains(&"annotations.function"));
    }
}
