use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target, stmt_kind};
use crate::error::FixError;
use crate::path::Scope;
use crate::walk::relocate_stmt;
use retrofit_render::render_expr;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Expr, FunctionDef, Stmt, StmtKind};

fn is_unquoted(annotation: &Expr) -> bool {
    annotation.as_str().is_none()
}

fn quote(annotation: &mut Expr) {
    if is_unquoted(annotation) {
        *annotation = string(&render_expr(annotation)).located(annotation.loc);
    }
}

fn has_annotations(def: &FunctionDef) -> bool {
    def.returns.is_some() || def.args.all_args().any(|a| a.annotation.is_some())
}

fn has_unquoted_annotations(def: &FunctionDef) -> bool {
    def.returns.as_deref().is_some_and(is_unquoted)
        || def
            .args
            .all_args()
            .any(|a| a.annotation.as_ref().is_some_and(is_unquoted))
}

pub(crate) fn is_named_tuple_base(base: &Expr) -> bool {
    base.dotted_name()
        .is_some_and(|n| n == "NamedTuple" || n.ends_with(".NamedTuple"))
}

/// Quotes annotations while `from __future__ import annotations` is in effect, so
/// that dropping the future import keeps forward references valid.
pub struct PostponedAnnotationsFixer;

impl PostponedAnnotationsFixer {
    const FIX_ID: &'static str = "annotations.postponed";
}

impl Fixer for PostponedAnnotationsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 7),
            depends_on: &[],
            description: "Quotes annotations that relied on postponed evaluation (PEP 563)",
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        if !cx.path.facts().has_future("annotations") {
            return false;
        }
        match stmt_kind(target) {
            Some(StmtKind::FunctionDef(def)) => has_unquoted_annotations(def),
            Some(StmtKind::AnnAssign { annotation, .. }) => is_unquoted(annotation),
            _ => false,
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected a statement"));
        };
        let mut out = stmt.clone();
        match &mut out.kind {
            StmtKind::FunctionDef(def) => {
                if let Some(returns) = &mut def.returns {
                    quote(returns);
                }
                for arg in def.args.all_args_mut() {
                    if let Some(ann) = &mut arg.annotation {
                        quote(ann);
                    }
                }
            }
            StmtKind::AnnAssign { annotation, .. } => quote(annotation),
            _ => return Err(FixError::new("expected an annotated definition")),
        }
        Ok(Rewrite::stmt(out))
    }
}

/// `class P(NamedTuple): a: int` → `P = NamedTuple("P", [("a", int)])`.
pub struct NamedTupleClassFixer;

impl NamedTupleClassFixer {
    const FIX_ID: &'static str = "annotations.named_tuple_class";
}

impl Fixer for NamedTupleClassFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 6),
            depends_on: &[],
            description: "Turns class-syntax NamedTuple definitions into the functional form",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(
            stmt_kind(target),
            Some(StmtKind::ClassDef(def)) if def.bases.iter().any(is_named_tuple_base)
        )
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(Stmt {
            kind: StmtKind::ClassDef(def),
            loc,
        }) = target
        else {
            return Err(FixError::new("expected a class definition"));
        };
        if def.bases.len() != 1 || !def.keywords.is_empty() {
            return Err(FixError::new(format!(
                "NamedTuple class '{}' has extra bases or keywords",
                def.name
            )));
        }
        if let Some(deco) = def.decorators.first() {
            return Err(FixError::at(
                format!("decorated NamedTuple class '{}'", def.name),
                deco.loc,
            ));
        }

        let mut fields = Vec::new();
        for stmt in &def.body {
            match &stmt.kind {
                _ if stmt.is_docstring() => {}
                StmtKind::Pass => {}
                StmtKind::AnnAssign {
                    target,
                    annotation,
                    value,
                } => {
                    let Some(field) = target.as_name() else {
                        return Err(FixError::at("NamedTuple field must be a plain name", target.loc));
                    };
                    if let Some(value) = value {
                        return Err(FixError::at(
                            format!("NamedTuple field '{field}' has a default value"),
                            value.loc,
                        ));
                    }
                    fields.push(tuple(vec![string(field), annotation.clone()]));
                }
                _ => {
                    return Err(FixError::at(
                        format!("NamedTuple class '{}' may only contain field annotations", def.name),
                        stmt.loc,
                    ));
                }
            }
        }

        let mut out = assign(
            name(&def.name),
            call(def.bases[0].clone(), vec![string(&def.name), list(fields)]),
        );
        relocate_stmt(&mut out, *loc);
        Ok(Rewrite::stmt(out))
    }
}

/// `x: T = v` → `x = v`; bare `x: T` becomes `x = None` outside functions and
/// disappears inside them.
pub struct VariableAnnotationsFixer;

impl VariableAnnotationsFixer {
    const FIX_ID: &'static str = "annotations.variable";
}

impl Fixer for VariableAnnotationsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 6),
            depends_on: &["annotations.named_tuple_class"],
            description: "Removes variable annotations (PEP 526)",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(stmt_kind(target), Some(StmtKind::AnnAssign { .. }))
    }

    fn rewrite(&self, target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(Stmt {
            kind: StmtKind::AnnAssign { target, value, .. },
            loc,
        }) = target
        else {
            return Err(FixError::new("expected an annotated assignment"));
        };
        let mut out = match value {
            Some(value) => assign(target.clone(), value.clone()),
            None if target.as_name().is_some() && cx.path.scope() != Scope::Function => {
                assign(target.clone(), none())
            }
            None => return Ok(Rewrite::remove()),
        };
        relocate_stmt(&mut out, *loc);
        Ok(Rewrite::stmt(out))
    }
}

pub struct FunctionAnnotationsFixer;

impl FunctionAnnotationsFixer {
    const FIX_ID: &'static str = "annotations.function";
}

impl Fixer for FunctionAnnotationsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Strips parameter and return annotations",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(stmt_kind(target), Some(StmtKind::FunctionDef(def)) if has_annotations(def))
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected a function definition"));
        };
        let mut out = stmt.clone();
        if let StmtKind::FunctionDef(def) = &mut out.kind {
            def.returns = None;
            for arg in def.args.all_args_mut() {
                arg.annotation = None;
            }
        }
        Ok(Rewrite::stmt(out))
    }
}
