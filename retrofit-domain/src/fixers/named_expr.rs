use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target};
use crate::error::FixError;
use crate::walk::{ChildMut, any_expr, expr_children_mut};
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Expr, ExprKind, Stmt, StmtKind, UnaryOpKind};

fn is_walrus(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::NamedExpr { .. })
}

/// Expressions evaluated by the statement itself, excluding nested suites.
fn own_exprs(kind: &StmtKind) -> Vec<&Expr> {
    match kind {
        StmtKind::Expr { value }
        | StmtKind::Assign { value, .. }
        | StmtKind::AugAssign { value, .. } => vec![value],
        StmtKind::AnnAssign { value, .. } | StmtKind::Return { value } => {
            value.iter().collect()
        }
        StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
        StmtKind::For { iter, .. } => vec![iter],
        StmtKind::With { items, .. } => items.iter().map(|i| &i.context).collect(),
        StmtKind::Raise { exc, .. } => exc.iter().collect(),
        StmtKind::Assert { test, .. } => vec![test],
        _ => Vec::new(),
    }
}

fn own_exprs_mut(kind: &mut StmtKind) -> Vec<&mut Expr> {
    match kind {
        StmtKind::Expr { value }
        | StmtKind::Assign { value, .. }
        | StmtKind::AugAssign { value, .. } => vec![value],
        StmtKind::AnnAssign { value, .. } | StmtKind::Return { value } => {
            value.iter_mut().collect()
        }
        StmtKind::If { test, .. } | StmtKind::While { test, .. } => vec![test],
        StmtKind::For { iter, .. } => vec![iter],
        StmtKind::With { items, .. } => items.iter_mut().map(|i| &mut i.context).collect(),
        StmtKind::Raise { exc, .. } => exc.iter_mut().collect(),
        StmtKind::Assert { test, .. } => vec![test],
        _ => Vec::new(),
    }
}

fn has_walrus(e: &Expr) -> bool {
    any_expr(e, &mut |node| is_walrus(node))
}

fn reject_nested(e: &Expr, what: &str) -> Result<(), FixError> {
    let mut loc = None;
    any_expr(e, &mut |node| {
        if is_walrus(node) {
            loc = Some(node.loc);
        }
        loc.is_some()
    });
    match loc {
        Some(loc) => Err(FixError::at(
            format!("assignment expression inside a {what} cannot be hoisted"),
            loc,
        )),
        None => Ok(()),
    }
}

/// Moves every assignment expression in `expr` into `out`, leaving its target
/// name behind. `conditional` marks positions that may not be evaluated.
fn hoist(expr: &mut Expr, conditional: bool, out: &mut Vec<Stmt>) -> Result<(), FixError> {
    match &mut expr.kind {
        ExprKind::NamedExpr { target, value } => {
            if conditional {
                return Err(FixError::at(
                    "conditionally evaluated assignment expression cannot be hoisted",
                    expr.loc,
                ));
            }
            hoist(value, false, out)?;
            let target = (**target).clone();
            let value = std::mem::replace(value.as_mut(), none());
            let mut stmt = assign(target.clone(), value);
            stmt.loc = expr.loc;
            out.push(stmt);
            *expr = Expr::new(target.kind, expr.loc);
            Ok(())
        }
        ExprKind::BoolOp { values, .. } => {
            for (i, v) in values.iter_mut().enumerate() {
                hoist(v, conditional || i > 0, out)?;
            }
            Ok(())
        }
        ExprKind::IfExp { test, body, orelse } => {
            hoist(test, conditional, out)?;
            hoist(body, true, out)?;
            hoist(orelse, true, out)
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            hoist(left, conditional, out)?;
            for (i, c) in comparators.iter_mut().enumerate() {
                hoist(c, conditional || i > 0, out)?;
            }
            Ok(())
        }
        ExprKind::Lambda { .. } => reject_nested(expr, "lambda"),
        ExprKind::ListComp { .. } | ExprKind::GeneratorExp { .. } => {
            reject_nested(expr, "comprehension")
        }
        _ => {
            let mut result = Ok(());
            expr_children_mut(expr, &mut |child| {
                if result.is_ok()
                    && let ChildMut::Expr(e, _) = child
                {
                    result = hoist(e, conditional, out);
                }
            });
            result
        }
    }
}

/// Hoists `(name := value)` into a preceding assignment.
pub struct NamedExprFixer;

impl NamedExprFixer {
    const FIX_ID: &'static str = "syntax.named_expr";
}

impl Fixer for NamedExprFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 8),
            depends_on: &[],
            description: "Hoists assignment expressions (PEP 572) into plain assignments",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        match target {
            Target::Stmt(stmt) => own_exprs(&stmt.kind)
                .into_iter()
                .any(has_walrus),
            Target::Expr(_) => false,
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected a statement"));
        };
        let mut out = stmt.clone();
        let mut hoisted = Vec::new();

        if let StmtKind::While { test, body, orelse } = &mut out.kind {
            if !orelse.is_empty() {
                return Err(FixError::new(
                    "while loop with an else clause cannot take a hoisted condition",
                ));
            }
            let mut prologue = Vec::new();
            hoist(test, false, &mut prologue)?;
            let condition = std::mem::replace(test, boolean(true).located(stmt.loc));
            let mut exit = if_(unary(UnaryOpKind::Not, condition), vec![brk()], vec![]);
            exit.loc = stmt.loc;
            prologue.push(exit);
            body.splice(0..0, prologue);
            return Ok(Rewrite::stmt(out));
        }

        for e in own_exprs_mut(&mut out.kind) {
            hoist(e, false, &mut hoisted)?;
        }
        hoisted.push(out);
        Ok(Rewrite::stmts(hoisted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::testing::*;
    use crate::path::NodePath;
    use pretty_assertions::assert_eq;
    use retrofit_types::syntax::{BoolOpKind, CmpOpKind, Loc};

    fn rewrite(stmt: &Stmt) -> Result<Rewrite, FixError> {
        rewrite_stmt(&NamedExprFixer, stmt, range(3, 6), &NodePath::default()).expect("match")
    }

    #[test]
    fn if_test_walrus_is_hoisted_before_the_statement() {
        let stmt = if_(
            compare(
                named_expr("n", call(name("len"), vec![name("a")])),
                CmpOpKind::Gt,
                num("10"),
            ),
            vec![expr_stmt(call(name("print"), vec![name("n")]))],
            vec![],
        );
        let rw = rewrite(&stmt).expect("rewrite");
        assert_eq!(
            render(&rw),
            "n = len(a)\nif n > 10:\n    print(n)\n"
        );
    }

    #[test]
    fn while_test_walrus_moves_into_loop_body() {
        let stmt = while_(
            named_expr("line", call(name("read"), vec![])),
            vec![expr_stmt(call(name("handle"), vec![name("line")]))],
            vec![],
        );
        let rw = rewrite(&stmt).expect("rewrite");
        assert_eq!(
            render(&rw),
            "while True:\n    line = read()\n    if not line:\n        break\n    handle(line)\n"
        );
    }

    #[test]
    fn nested_walrus_hoists_inner_first() {
        let stmt = expr_stmt(call(
            name("f"),
            vec![named_expr("a", named_expr("b", num("1")))],
        ));
        let rw = rewrite(&stmt).expect("rewrite");
        assert_eq!(render(&rw), "b = 1\na = b\nf(a)\n");
    }

    #[test]
    fn short_circuit_operand_is_fix_error() {
        let stmt = if_(
            bool_op(
                BoolOpKind::And,
                vec![name("ok"), named_expr("m", call(name("g"), vec![])).at(4, 12)],
            ),
            vec![pass()],
            vec![],
        );
        let err = rewrite(&stmt).unwrap_err();
        assert_eq!(err.loc, Some(Loc::new(4, 12)));
    }

    #[test]
    fn walrus_in_comprehension_is_fix_error() {
        let stmt = expr_stmt(list_comp(
            named_expr("y", name("x")).at(2, 3),
            name("x"),
            name("xs"),
        ));
        let err = rewrite(&stmt).unwrap_err();
        assert_eq!(err.loc, Some(Loc::new(2, 3)));
        assert!(err.message.contains("comprehension"));
    }

    #[test]
    fn statements_without_walrus_do_not_match() {
        let stmt = if_(name("x"), vec![expr_stmt(named_expr("y", num("1")))], vec![]);
        // The nested statement is matched on its own.
        assert!(rewrite_stmt(&NamedExprFixer, &stmt, range(3, 6), &NodePath::default()).is_none());
    }
}
