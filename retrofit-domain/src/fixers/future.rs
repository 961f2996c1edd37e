use super::{FixCtx, Fixer, FixerMeta, Rewrite, Shim, Target, expr_kind, is_name_call, stmt_kind};
use crate::error::FixError;
use crate::path::{NodePath, Scope};
use retrofit_types::Version;
use retrofit_types::syntax::{BinOpKind, Constant, ExprKind, Stmt, StmtKind};

fn imports_future(target: Target<'_>, name: &str) -> bool {
    match target {
        Target::Stmt(stmt) => {
            stmt.is_future_import()
                && matches!(&stmt.kind, StmtKind::ImportFrom { names, .. } if names.iter().any(|a| a.name == name))
        }
        Target::Expr(_) => false,
    }
}

/// Removes `name` from a `from __future__ import ...` statement, dropping the
/// statement when nothing is left.
fn drop_future_name(stmt: &Stmt, name: &str) -> Rewrite {
    let mut out = stmt.clone();
    if let StmtKind::ImportFrom { names, .. } = &mut out.kind {
        names.retain(|a| a.name != name);
        if names.is_empty() {
            return Rewrite::remove();
        }
    }
    Rewrite::stmt(out)
}

pub struct GeneratorStopFixer;

impl GeneratorStopFixer {
    const FIX_ID: &'static str = "future.generator_stop";
}

impl Fixer for GeneratorStopFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 5),
            depends_on: &[],
            description: "Drops the generator_stop future import, unknown before 3.5",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        imports_future(target, "generator_stop")
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        match target {
            Target::Stmt(stmt) => Ok(drop_future_name(stmt, "generator_stop")),
            Target::Expr(_) => Err(FixError::new("expected an import statement")),
        }
    }
}

pub struct AnnotationsFutureFixer;

impl AnnotationsFutureFixer {
    const FIX_ID: &'static str = "future.annotations";
}

impl Fixer for AnnotationsFutureFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 7),
            depends_on: &["annotations.postponed"],
            description: "Drops the annotations future import once annotations are quoted",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        imports_future(target, "annotations")
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        match target {
            Target::Stmt(stmt) => Ok(drop_future_name(stmt, "annotations")),
            Target::Expr(_) => Err(FixError::new("expected an import statement")),
        }
    }
}

/// Requests a `from __future__ import <name>` shim; fails if the floor predates
/// the future itself.
fn request_future(name: &str, available: Version, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
    if cx.range.min() < available {
        return Err(FixError::new(format!(
            "'from __future__ import {name}' requires {available}, target floor is {}",
            cx.range.min()
        )));
    }
    Ok(Rewrite::keep().with_shim(Shim::future(name)))
}

pub struct PrintFunctionFixer;

impl PrintFunctionFixer {
    const FIX_ID: &'static str = "future.print_function";
}

impl Fixer for PrintFunctionFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Calls to print() need the print_function future before 3.0",
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        if cx.path.facts().has_future("print_function") {
            return false;
        }
        matches!(target, Target::Expr(e) if is_name_call(e, &["print"]).is_some())
    }

    fn rewrite(&self, _target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        request_future("print_function", Version::new(2, 6), cx)
    }
}

pub struct DivisionFixer;

impl DivisionFixer {
    const FIX_ID: &'static str = "future.division";
}

impl Fixer for DivisionFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "True division with / needs the division future before 3.0",
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        if cx.path.facts().has_future("division") {
            return false;
        }
        matches!(
            expr_kind(target),
            Some(ExprKind::BinOp {
                op: BinOpKind::Div,
                ..
            })
        ) || matches!(
            stmt_kind(target),
            Some(StmtKind::AugAssign {
                op: BinOpKind::Div,
                ..
            })
        )
    }

    fn rewrite(&self, _target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        request_future("division", Version::new(2, 2), cx)
    }
}

/// A future whose semantics the output needs as soon as the module contains a
/// construct that behaves differently without it.
pub(crate) struct ContentFuture {
    pub id: &'static str,
    pub future: &'static str,
    /// First version where the future's behaviour is the default.
    pub introduced: Version,
    /// First version that accepts the future import.
    pub available: Version,
    pub description: &'static str,
    /// What the checker calls the construct.
    pub construct: &'static str,
    pub uses: fn(Target<'_>, &NodePath) -> bool,
}

impl ContentFuture {
    /// True if `target` needs the future and the module does not import it yet.
    pub(crate) fn needed(&self, target: Target<'_>, path: &NodePath) -> bool {
        !path.facts().has_future(self.future) && (self.uses)(target, path)
    }
}

fn str_literal(target: Target<'_>, _path: &NodePath) -> bool {
    matches!(
        expr_kind(target),
        Some(ExprKind::Constant {
            value: Constant::Str(_)
        })
    )
}

fn absolute_import(target: Target<'_>, _path: &NodePath) -> bool {
    match stmt_kind(target) {
        Some(StmtKind::Import { .. }) => true,
        Some(StmtKind::ImportFrom {
            module: Some(module),
            level: 0,
            ..
        }) => module != "__future__",
        _ => false,
    }
}

fn with_statement(target: Target<'_>, _path: &NodePath) -> bool {
    matches!(
        stmt_kind(target),
        Some(StmtKind::With {
            is_async: false,
            ..
        })
    )
}

fn generator(target: Target<'_>, _path: &NodePath) -> bool {
    matches!(expr_kind(target), Some(ExprKind::Yield { .. }))
}

fn nested_scope(target: Target<'_>, path: &NodePath) -> bool {
    let defines_scope = matches!(stmt_kind(target), Some(StmtKind::FunctionDef(_)))
        || matches!(expr_kind(target), Some(ExprKind::Lambda { .. }));
    defines_scope && path.scope() == Scope::Function
}

pub(crate) static CONTENT_FUTURES: &[ContentFuture] = &[
    ContentFuture {
        id: "future.unicode_literals",
        future: "unicode_literals",
        introduced: Version::new(3, 0),
        available: Version::new(2, 6),
        description: "String literals need the unicode_literals future to stay text before 3.0",
        construct: "str literal",
        uses: str_literal,
    },
    ContentFuture {
        id: "future.absolute_import",
        future: "absolute_import",
        introduced: Version::new(3, 0),
        available: Version::new(2, 5),
        description: "Imports need the absolute_import future to skip implicit relative lookup before 3.0",
        construct: "import",
        uses: absolute_import,
    },
    ContentFuture {
        id: "future.with_statement",
        future: "with_statement",
        introduced: Version::new(2, 6),
        available: Version::new(2, 5),
        description: "The with statement needs the with_statement future on 2.5",
        construct: "with statement",
        uses: with_statement,
    },
    ContentFuture {
        id: "future.generators",
        future: "generators",
        introduced: Version::new(2, 3),
        available: Version::new(2, 2),
        description: "yield needs the generators future on 2.2",
        construct: "yield",
        uses: generator,
    },
    ContentFuture {
        id: "future.nested_scopes",
        future: "nested_scopes",
        introduced: Version::new(2, 2),
        available: Version::new(2, 1),
        description: "Nested functions need the nested_scopes future to see enclosing names on 2.1",
        construct: "nested function",
        uses: nested_scope,
    },
];

/// Requests the future of a [`ContentFuture`] wherever its construct appears.
pub struct ContentFutureFixer(pub(crate) &'static ContentFuture);

impl Fixer for ContentFutureFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: self.0.id,
            introduced: self.0.introduced,
            depends_on: &[],
            description: self.0.description,
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        self.0.needed(target, cx.path)
    }

    fn rewrite(&self, _target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        request_future(self.0.future, self.0.available, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::Replacement;
    use crate::fixers::testing::*;
    use crate::path::{Frame, ModuleFacts};
    use retrofit_types::syntax::build::*;

    #[test]
    fn generator_stop_is_dropped_from_shared_import() {
        let stmt = import_from("__future__", &["generator_stop", "division"]);
        let rw = rewrite_stmt(&GeneratorStopFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "from __future__ import division\n");
    }

    #[test]
    fn lone_future_import_is_removed() {
        let stmt = import_from("__future__", &["annotations"]);
        let rw = rewrite_stmt(&AnnotationsFutureFixer, &stmt, range(3, 6), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(rw.replacement, Replacement::Stmts(vec![]));
    }

    #[test]
    fn print_requests_future_shim_once_facts_lack_it() {
        let e = call(name("print"), vec![string("hi")]);
        let rw = rewrite_expr(&PrintFunctionFixer, &e, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(rw.replacement, Replacement::Keep);
        assert_eq!(rw.shims, vec![Shim::future("print_function")]);

        let mut facts = ModuleFacts::default();
        facts.futures.insert("print_function".to_string());
        let path = NodePath::new(facts);
        assert!(rewrite_expr(&PrintFunctionFixer, &e, range(2, 7), &path).is_none());
    }

    #[test]
    fn print_future_unavailable_before_2_6() {
        let e = call(name("print"), vec![]);
        let err = rewrite_expr(&PrintFunctionFixer, &e, range(2, 5), &NodePath::default())
            .expect("match")
            .unwrap_err();
        assert!(err.message.contains("requires 2.6"));
    }

    #[test]
    fn division_matches_binop_and_augmented_assignment() {
        let div = binop(name("a"), BinOpKind::Div, name("b"));
        assert!(rewrite_expr(&DivisionFixer, &div, range(2, 7), &NodePath::default()).is_some());

        let floor = binop(name("a"), BinOpKind::FloorDiv, name("b"));
        assert!(rewrite_expr(&DivisionFixer, &floor, range(2, 7), &NodePath::default()).is_none());

        let aug = Stmt::new(
            StmtKind::AugAssign {
                target: name("a"),
                op: BinOpKind::Div,
                value: num("2"),
            },
            Default::default(),
        );
        assert!(rewrite_stmt(&DivisionFixer, &aug, range(2, 7), &NodePath::default()).is_some());
    }

    fn content_future(id: &str) -> ContentFutureFixer {
        ContentFutureFixer(CONTENT_FUTURES.iter().find(|f| f.id == id).expect(id))
    }

    #[test]
    fn str_literals_request_unicode_literals_but_bytes_do_not() {
        let fixer = content_future("future.unicode_literals");
        let rw = rewrite_expr(&fixer, &string("a"), range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(rw.replacement, Replacement::Keep);
        assert_eq!(rw.shims, vec![Shim::future("unicode_literals")]);

        let bytes = retrofit_types::syntax::Expr::new(
            ExprKind::Constant {
                value: Constant::Bytes("a".to_string()),
            },
            Default::default(),
        );
        assert!(rewrite_expr(&fixer, &bytes, range(2, 7), &NodePath::default()).is_none());

        let err = rewrite_expr(&fixer, &string("a"), range(2, 5), &NodePath::default())
            .expect("match")
            .unwrap_err();
        assert!(err.message.contains("requires 2.6"));
    }

    #[test]
    fn absolute_import_skips_relative_and_future_imports() {
        let fixer = content_future("future.absolute_import");
        let path = NodePath::default();
        assert!(rewrite_stmt(&fixer, &import("json"), range(2, 7), &path).is_some());
        assert!(rewrite_stmt(&fixer, &import_from("os", &["path"]), range(2, 7), &path).is_some());
        assert!(
            rewrite_stmt(&fixer, &import_from("__future__", &["division"]), range(2, 7), &path)
                .is_none()
        );

        let relative = Stmt::new(
            StmtKind::ImportFrom {
                module: Some("sibling".to_string()),
                names: vec![],
                level: 1,
            },
            Default::default(),
        );
        assert!(rewrite_stmt(&fixer, &relative, range(2, 7), &path).is_none());

        let mut facts = ModuleFacts::default();
        facts.futures.insert("absolute_import".to_string());
        assert!(rewrite_stmt(&fixer, &import("json"), range(2, 7), &NodePath::new(facts)).is_none());
    }

    #[test]
    fn only_nested_functions_need_nested_scopes() {
        let fixer = content_future("future.nested_scopes");
        let inner = func("inner", params(&[]), vec![pass()]);
        assert!(rewrite_stmt(&fixer, &inner, range(2, 1), &NodePath::default()).is_none());

        let nested = path_with(
            vec![Frame::Function {
                name: "outer".to_string(),
                first_param: None,
            }],
            ModuleFacts::default(),
        );
        let rw = rewrite_stmt(&fixer, &inner, range(2, 1), &nested)
            .expect("match")
            .expect("rewrite");
        assert_eq!(rw.shims, vec![Shim::future("nested_scopes")]);
    }

    #[test]
    fn content_futures_are_importable_before_they_become_default() {
        for future in CONTENT_FUTURES {
            assert!(future.available < future.introduced, "{}", future.id);
            assert_eq!(future.id, format!("future.{}", future.future));
        }
    }
}
