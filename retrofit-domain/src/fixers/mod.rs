use crate::error::FixError;
use crate::path::NodePath;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Expr, ExprKind, Loc, Stmt, StmtKind};
use retrofit_types::{Version, VersionRange};

mod annotations;
mod builtins;
mod classes;
mod fstring;
mod future;
mod imports;
mod named_expr;
mod signature;
mod super_call;
mod unpacking;

pub(crate) use annotations::is_named_tuple_base;
pub(crate) use builtins::OPEN_PY3_KEYWORDS;
pub(crate) use future::{CONTENT_FUTURES, ContentFuture};
pub(crate) use imports::{RENAMED_MODULES, RenamedModule};
pub(crate) use unpacking::{needs_keyword_fix, needs_positional_fix};

/// Static description of a fixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixerMeta {
    pub id: &'static str,
    /// Version that introduced the construct this fixer removes.
    pub introduced: Version,
    /// Fixers that must run before this one.
    pub depends_on: &'static [&'static str],
    pub description: &'static str,
}

/// The node a fixer is asked about.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl Target<'_> {
    pub fn loc(&self) -> Loc {
        match self {
            Target::Stmt(s) => s.loc,
            Target::Expr(e) => e.loc,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Target::Stmt(_) => "statement",
            Target::Expr(_) => "expression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Zero or more sibling statements in place of the matched statement.
    Stmts(Vec<Stmt>),
    Expr(Expr),
    /// Leave the node as is; only the shims matter.
    Keep,
}

impl Replacement {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Replacement::Stmts(_) => "statement",
            Replacement::Expr(_) => "expression",
            Replacement::Keep => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShimKind {
    Future,
    Import,
    Helper,
}

/// Module-level declaration requested by a rewrite, inserted once per module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shim {
    pub id: String,
    pub kind: ShimKind,
    pub stmts: Vec<Stmt>,
}

impl Shim {
    pub fn future(name: &str) -> Self {
        Self {
            id: format!("__future__.{name}"),
            kind: ShimKind::Future,
            stmts: vec![import_from("__future__", &[name])],
        }
    }

    pub fn import(module: &str) -> Self {
        Self {
            id: format!("import.{module}"),
            kind: ShimKind::Import,
            stmts: vec![import(module)],
        }
    }

    pub fn guarded_import(id: &str, stmt: Stmt) -> Self {
        Self {
            id: id.to_string(),
            kind: ShimKind::Import,
            stmts: vec![stmt],
        }
    }

    pub fn helper(id: &str, stmts: Vec<Stmt>) -> Self {
        Self {
            id: id.to_string(),
            kind: ShimKind::Helper,
            stmts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub replacement: Replacement,
    pub shims: Vec<Shim>,
}

impl Rewrite {
    pub fn stmts(stmts: Vec<Stmt>) -> Self {
        Self {
            replacement: Replacement::Stmts(stmts),
            shims: Vec::new(),
        }
    }

    pub fn stmt(stmt: Stmt) -> Self {
        Self::stmts(vec![stmt])
    }

    pub fn remove() -> Self {
        Self::stmts(Vec::new())
    }

    pub fn expr(expr: Expr) -> Self {
        Self {
            replacement: Replacement::Expr(expr),
            shims: Vec::new(),
        }
    }

    pub fn keep() -> Self {
        Self {
            replacement: Replacement::Keep,
            shims: Vec::new(),
        }
    }

    pub fn with_shim(mut self, shim: Shim) -> Self {
        self.shims.push(shim);
        self
    }
}

/// What a fixer sees besides the node: the target range and the ancestor path.
pub struct FixCtx<'a> {
    pub range: VersionRange,
    pub path: &'a NodePath,
}

pub trait Fixer: Send + Sync {
    fn meta(&self) -> FixerMeta;

    /// Pure shape test. Must not depend on anything but the node and `cx`.
    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool;

    fn rewrite(&self, target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError>;
}

/// The builtin catalogue, in declaration order.
pub fn builtin_fixers() -> Vec<Box<dyn Fixer>> {
    let mut fixers: Vec<Box<dyn Fixer>> = vec![
        Box::new(future::GeneratorStopFixer),
        Box::new(annotations::PostponedAnnotationsFixer),
        Box::new(future::AnnotationsFutureFixer),
        Box::new(annotations::NamedTupleClassFixer),
        Box::new(annotations::VariableAnnotationsFixer),
        Box::new(annotations::FunctionAnnotationsFixer),
        Box::new(signature::KeywordOnlyArgsFixer),
        Box::new(signature::PositionalOnlyFixer),
        Box::new(named_expr::NamedExprFixer),
        Box::new(fstring::FStringFixer),
        Box::new(unpacking::UnpackingFixer),
        Box::new(super_call::SuperNoArgsFixer),
        Box::new(classes::MetaclassKeywordFixer),
        Box::new(classes::NewStyleClassFixer),
    ];
    fixers.extend(
        RENAMED_MODULES
            .iter()
            .map(|renamed| Box::new(imports::RenamedModuleFixer(renamed)) as Box<dyn Fixer>),
    );
    fixers.push(Box::new(builtins::LazyIteratorsFixer));
    fixers.push(Box::new(builtins::OpenEncodingFixer));
    fixers.push(Box::new(future::PrintFunctionFixer));
    fixers.push(Box::new(future::DivisionFixer));
    fixers.extend(
        CONTENT_FUTURES
            .iter()
            .map(|future| Box::new(future::ContentFutureFixer(future)) as Box<dyn Fixer>),
    );
    fixers
}

pub fn builtin_fixer_metas() -> Vec<FixerMeta> {
    builtin_fixers().iter().map(|f| f.meta()).collect()
}

pub(crate) fn is_name_call<'a>(expr: &'a Expr, names: &[&str]) -> Option<&'a str> {
    match &expr.kind {
        ExprKind::Call { func, .. } => func.as_name().filter(|n| names.contains(n)),
        _ => None,
    }
}

/// Index after the docstring, for inserting statements at the top of a body.
fn body_start(body: &[Stmt]) -> usize {
    retrofit_types::syntax::docstring_len(body)
}

pub(crate) fn stmt_kind<'a>(target: Target<'a>) -> Option<&'a StmtKind> {
    match target {
        Target::Stmt(s) => Some(&s.kind),
        Target::Expr(_) => None,
    }
}

pub(crate) fn expr_kind<'a>(target: Target<'a>) -> Option<&'a ExprKind> {
    match target {
        Target::Expr(e) => Some(&e.kind),
        Target::Stmt(_) => None,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::path::{Frame, ModuleFacts};
    use retrofit_types::Version;

    pub fn range(major: u16, minor: u16) -> VersionRange {
        VersionRange::from_floor(Version::new(major, minor))
    }

    pub fn path_with(frames: Vec<Frame>, facts: ModuleFacts) -> NodePath {
        let mut path = NodePath::new(facts);
        for frame in frames {
            path.push(frame);
        }
        path
    }

    pub fn rewrite_stmt(
        fixer: &dyn Fixer,
        stmt: &Stmt,
        range: VersionRange,
        path: &NodePath,
    ) -> Option<Result<Rewrite, FixError>> {
        let cx = FixCtx { range, path };
        let target = Target::Stmt(stmt);
        fixer
            .matches(target, &cx)
            .then(|| fixer.rewrite(target, &cx))
    }

    pub fn rewrite_expr(
        fixer: &dyn Fixer,
        expr: &Expr,
        range: VersionRange,
        path: &NodePath,
    ) -> Option<Result<Rewrite, FixError>> {
        let cx = FixCtx { range, path };
        let target = Target::Expr(expr);
        fixer
            .matches(target, &cx)
            .then(|| fixer.rewrite(target, &cx))
    }

    pub fn render(rewrite: &Rewrite) -> String {
        match &rewrite.replacement {
            Replacement::Stmts(stmts) => stmts.iter().map(retrofit_render::render_stmt).collect(),
            Replacement::Expr(e) => retrofit_render::render_expr(e),
            Replacement::Keep => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn builtin_ids_are_unique_and_dependencies_known() {
        let metas = builtin_fixer_metas();
        let ids: BTreeSet<&str> = metas.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), metas.len());
        for meta in &metas {
            for dep in meta.depends_on {
                assert!(ids.contains(dep), "{} depends on unknown {}", meta.id, dep);
            }
        }
    }

    #[test]
    fn catalogue_lists_renamed_modules_between_class_and_builtin_fixers() {
        let ids: Vec<&str> = builtin_fixer_metas().iter().map(|m| m.id).collect();
        let new_style = ids.iter().position(|id| *id == "classes.new_style");
        let queue = ids.iter().position(|id| *id == "imports.queue");
        let lazy = ids.iter().position(|id| *id == "builtins.lazy_iterators");
        assert!(new_style < queue && queue < lazy);
        assert_eq!(
            ids.len(),
            14 + RENAMED_MODULES.len() + 4 + CONTENT_FUTURES.len()
        );
    }
}
