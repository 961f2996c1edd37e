use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target, body_start};
use crate::error::FixError;
use crate::walk::relocate_stmt;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Arguments, BinOpKind, Constant, Expr, ExprKind, StmtKind, UnaryOpKind};

fn is_literal(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Constant { .. } => true,
        ExprKind::UnaryOp {
            op: UnaryOpKind::USub | UnaryOpKind::UAdd,
            operand,
        } => matches!(
            operand.kind,
            ExprKind::Constant {
                value: Constant::Num(_)
            }
        ),
        ExprKind::Tuple { elts } => elts.iter().all(is_literal),
        _ => false,
    }
}

fn fresh_kwargs_name(args: &Arguments) -> String {
    let mut candidate = "kwargs".to_string();
    while args.all_args().any(|a| a.name == candidate) {
        candidate.insert(0, '_');
    }
    candidate
}

/// Keyword-only parameters become pops from `**kwargs` at the top of the body.
pub struct KeywordOnlyArgsFixer;

impl KeywordOnlyArgsFixer {
    const FIX_ID: &'static str = "syntax.keyword_only_args";
}

impl Fixer for KeywordOnlyArgsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &["annotations.function"],
            description: "Rewrites keyword-only parameters (PEP 3102) into **kwargs pops",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        match target {
            Target::Stmt(stmt) => {
                matches!(&stmt.kind, StmtKind::FunctionDef(def) if !def.args.kwonly.is_empty())
            }
            Target::Expr(e) => {
                matches!(&e.kind, ExprKind::Lambda { args, .. } if !args.kwonly.is_empty())
            }
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let stmt = match target {
            Target::Stmt(stmt) => stmt,
            Target::Expr(e) => {
                return Err(FixError::at(
                    "keyword-only parameters of a lambda cannot be rewritten",
                    e.loc,
                ));
            }
        };
        let StmtKind::FunctionDef(def) = &stmt.kind else {
            return Err(FixError::new("expected a function definition"));
        };

        for (arg, default) in def.args.kwonly.iter().zip(&def.args.kw_defaults) {
            if let Some(default) = default
                && !is_literal(default)
            {
                return Err(FixError::at(
                    format!(
                        "default of keyword-only parameter '{}' is not a literal",
                        arg.name
                    ),
                    default.loc,
                ));
            }
        }

        let mut out = stmt.clone();
        let StmtKind::FunctionDef(def) = &mut out.kind else {
            return Err(FixError::new("expected a function definition"));
        };

        let introduced_kwargs = def.args.kwarg.is_none();
        let kwargs = match &def.args.kwarg {
            Some(kwarg) => kwarg.name.clone(),
            None => fresh_kwargs_name(&def.args),
        };

        let kwonly = std::mem::take(&mut def.args.kwonly);
        let mut defaults = std::mem::take(&mut def.args.kw_defaults).into_iter();
        let mut prologue = Vec::new();
        for param in kwonly {
            let mut pop_args = vec![string(&param.name)];
            if let Some(Some(default)) = defaults.next() {
                pop_args.push(default);
            }
            prologue.push(assign(
                name(&param.name),
                call(attr(name(&kwargs), "pop"), pop_args),
            ));
        }
        if introduced_kwargs {
            def.args.kwarg = Some(arg(&kwargs));
            let message = binop(
                string(&format!("{}() got unexpected keyword arguments: ", def.name)),
                BinOpKind::Add,
                call(attr(string(", "), "join"), vec![name(&kwargs)]),
            );
            prologue.push(if_(
                name(&kwargs),
                vec![raise(call(name("TypeError"), vec![message]))],
                vec![],
            ));
        }
        for s in &mut prologue {
            relocate_stmt(s, stmt.loc);
        }

        let at = body_start(&def.body);
        def.body.splice(at..at, prologue);
        Ok(Rewrite::stmt(out))
    }
}

/// `def f(a, /, b)` → `def f(a, b)`, for definitions and lambdas.
pub struct PositionalOnlyFixer;

impl PositionalOnlyFixer {
    const FIX_ID: &'static str = "syntax.positional_only";
}

fn flatten_posonly(args: &mut Arguments) {
    let mut merged = std::mem::take(&mut args.posonly);
    merged.append(&mut args.args);
    args.args = merged;
}

impl Fixer for PositionalOnlyFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 8),
            depends_on: &[],
            description: "Turns positional-only parameters (PEP 570) into ordinary ones",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        match target {
            Target::Stmt(stmt) => {
                matches!(&stmt.kind, StmtKind::FunctionDef(def) if !def.args.posonly.is_empty())
            }
            Target::Expr(e) => {
                matches!(&e.kind, ExprKind::Lambda { args, .. } if !args.posonly.is_empty())
            }
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        match target {
            Target::Stmt(stmt) => {
                let mut out = stmt.clone();
                if let StmtKind::FunctionDef(def) = &mut out.kind {
                    flatten_posonly(&mut def.args);
                }
                Ok(Rewrite::stmt(out))
            }
            Target::Expr(e) => {
                let mut out = e.clone();
                if let ExprKind::Lambda { args, .. } = &mut out.kind {
                    flatten_posonly(args);
                }
                Ok(Rewrite::expr(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::testing::*;
    use crate::path::NodePath;
    use pretty_assertions::assert_eq;
    use retrofit_types::syntax::{Loc, Stmt};

    fn kwonly_func(defaults: Vec<Option<Expr>>, kwarg: Option<&str>) -> Stmt {
        let mut args = params(&["a"]);
        args.kwonly = vec![arg("b"), arg("c")];
        args.kw_defaults = defaults;
        args.kwarg = kwarg.map(arg);
        func("f", args, vec![expr_stmt(string("doc")), ret(Some(name("b")))])
    }

    #[test]
    fn keyword_only_params_pop_from_existing_kwargs() {
        let stmt = kwonly_func(vec![None, Some(num("1"))], Some("kw"));
        let rw = rewrite_stmt(&KeywordOnlyArgsFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(
            render(&rw),
            "def f(a, **kw):\n    \"doc\"\n    b = kw.pop(\"b\")\n    c = kw.pop(\"c\", 1)\n    return b\n"
        );
    }

    #[test]
    fn keyword_only_params_introduce_kwargs_and_reject_extras() {
        let stmt = kwonly_func(vec![None, None], None);
        let rw = rewrite_stmt(&KeywordOnlyArgsFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        let text = render(&rw);
        assert!(text.starts_with("def f(a, **kwargs):\n"));
        assert!(text.contains("    if kwargs:\n        raise TypeError("));
    }

    #[test]
    fn non_literal_default_is_located_fix_error() {
        let stmt = kwonly_func(vec![None, Some(call(name("make"), vec![]).at(1, 14))], None);
        let err = rewrite_stmt(&KeywordOnlyArgsFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .unwrap_err();
        assert_eq!(err.loc, Some(Loc::new(1, 14)));
        assert!(err.message.contains("'c'"));
    }

    #[test]
    fn fresh_kwargs_name_avoids_collisions() {
        let mut args = params(&["kwargs"]);
        args.kwonly = vec![arg("_kwargs")];
        assert_eq!(fresh_kwargs_name(&args), "__kwargs");
    }

    #[test]
    fn positional_only_marker_is_removed() {
        let mut args = params(&["b"]);
        args.posonly = vec![arg("a")];
        let stmt = func("f", args.clone(), vec![pass()]);
        let rw = rewrite_stmt(&PositionalOnlyFixer, &stmt, range(3, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "def f(a, b):\n    pass\n");

        let l = lambda(args, name("a"));
        let rw = rewrite_expr(&PositionalOnlyFixer, &l, range(3, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "lambda a, b: a");
    }
}
