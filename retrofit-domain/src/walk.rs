//! Exhaustive child enumeration over the closed grammar.
//!
//! Each child is reported with the [`Frame`] a walker should push while inside it.
//! Expressions evaluated in the enclosing scope (decorators, defaults, bases,
//! annotations) carry no frame.

use crate::path::Frame;
use retrofit_types::syntax::*;

pub(crate) enum Child<'a> {
    Suite(&'a [Stmt], Option<Frame>),
    Expr(&'a Expr, Option<Frame>),
}

pub(crate) enum ChildMut<'a> {
    Suite(&'a mut Vec<Stmt>, Option<Frame>),
    Expr(&'a mut Expr, Option<Frame>),
}

fn function_frame(def: &FunctionDef) -> Frame {
    Frame::Function {
        name: def.name.clone(),
        first_param: def.args.first_positional().map(str::to_string),
    }
}

fn class_frame(def: &ClassDef) -> Frame {
    Frame::Class {
        name: def.name.clone(),
    }
}

fn guard_frame(handlers: &[ExceptHandler]) -> Option<Frame> {
    handlers
        .iter()
        .any(ExceptHandler::catches_import_error)
        .then_some(Frame::ImportGuard)
}

pub(crate) fn stmt_children<'a>(stmt: &'a Stmt, visit: &mut dyn FnMut(Child<'a>)) {
    fn e<'a>(visit: &mut dyn FnMut(Child<'a>), expr: &'a Expr) {
        visit(Child::Expr(expr, None))
    }
    fn target<'a>(visit: &mut dyn FnMut(Child<'a>), expr: &'a Expr) {
        visit(Child::Expr(expr, Some(Frame::Target)))
    }
    match &stmt.kind {
        StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global { .. }
        | StmtKind::Nonlocal { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
        StmtKind::FunctionDef(def) => {
            for deco in &def.decorators {
                e(visit, deco);
            }
            arguments_children(&def.args, visit);
            if let Some(returns) = &def.returns {
                e(visit, returns);
            }
            visit(Child::Suite(&def.body, Some(function_frame(def))));
        }
        StmtKind::ClassDef(def) => {
            for deco in &def.decorators {
                e(visit, deco);
            }
            for base in &def.bases {
                e(visit, base);
            }
            for kw in &def.keywords {
                e(visit, &kw.value);
            }
            visit(Child::Suite(&def.body, Some(class_frame(def))));
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                e(visit, value);
            }
        }
        StmtKind::Assign { targets, value } => {
            for t in targets {
                target(visit, t);
            }
            e(visit, value);
        }
        StmtKind::AnnAssign {
            target: t,
            annotation,
            value,
        } => {
            target(visit, t);
            e(visit, annotation);
            if let Some(value) = value {
                e(visit, value);
            }
        }
        StmtKind::AugAssign { target: t, value, .. } => {
            target(visit, t);
            e(visit, value);
        }
        StmtKind::Expr { value } => e(visit, value),
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            e(visit, test);
            visit(Child::Suite(body, None));
            visit(Child::Suite(orelse, None));
        }
        StmtKind::For {
            target: t,
            iter,
            body,
            orelse,
            ..
        } => {
            target(visit, t);
            e(visit, iter);
            visit(Child::Suite(body, None));
            visit(Child::Suite(orelse, None));
        }
        StmtKind::With { items, body, .. } => {
            for item in items {
                e(visit, &item.context);
                if let Some(vars) = &item.vars {
                    target(visit, vars);
                }
            }
            visit(Child::Suite(body, None));
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            visit(Child::Suite(body, guard_frame(handlers)));
            for handler in handlers {
                if let Some(ty) = &handler.exc_type {
                    e(visit, ty);
                }
                visit(Child::Suite(&handler.body, None));
            }
            visit(Child::Suite(orelse, None));
            visit(Child::Suite(finalbody, None));
        }
        StmtKind::Raise { exc, cause } => {
            for value in [exc, cause].into_iter().flatten() {
                e(visit, value);
            }
        }
        StmtKind::Delete { targets } => {
            for t in targets {
                target(visit, t);
            }
        }
        StmtKind::Assert { test, msg } => {
            e(visit, test);
            if let Some(msg) = msg {
                e(visit, msg);
            }
        }
    }
}

fn arguments_children<'a>(args: &'a Arguments, visit: &mut dyn FnMut(Child<'a>)) {
    for arg in args.all_args() {
        if let Some(ann) = &arg.annotation {
            visit(Child::Expr(ann, None));
        }
    }
    for d in &args.defaults {
        visit(Child::Expr(d, None));
    }
    for d in args.kw_defaults.iter().flatten() {
        visit(Child::Expr(d, None));
    }
}

pub(crate) fn expr_children<'a>(expr: &'a Expr, visit: &mut dyn FnMut(Child<'a>)) {
    fn e<'a>(visit: &mut dyn FnMut(Child<'a>), expr: &'a Expr) {
        visit(Child::Expr(expr, None))
    }
    match &expr.kind {
        ExprKind::Name { .. } | ExprKind::Constant { .. } => {}
        ExprKind::JoinedStr { values } => {
            for v in values {
                e(visit, v);
            }
        }
        ExprKind::FormattedValue {
            value, format_spec, ..
        } => {
            e(visit, value);
            if let Some(spec) = format_spec {
                e(visit, spec);
            }
        }
        ExprKind::Attribute { value, .. }
        | ExprKind::Starred { value }
        | ExprKind::Await { value }
        | ExprKind::YieldFrom { value } => e(visit, value),
        ExprKind::UnaryOp { operand, .. } => e(visit, operand),
        ExprKind::Subscript { value, slice } => {
            e(visit, value);
            e(visit, slice);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                e(visit, part);
            }
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            e(visit, func);
            for a in args {
                e(visit, a);
            }
            for k in keywords {
                e(visit, &k.value);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            e(visit, left);
            e(visit, right);
        }
        ExprKind::BoolOp { values, .. } => {
            for v in values {
                e(visit, v);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            e(visit, left);
            for c in comparators {
                e(visit, c);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            e(visit, test);
            e(visit, body);
            e(visit, orelse);
        }
        ExprKind::Lambda { args, body } => {
            for d in args.defaults.iter().chain(args.kw_defaults.iter().flatten()) {
                e(visit, d);
            }
            visit(Child::Expr(body, Some(Frame::Lambda)));
        }
        ExprKind::NamedExpr { target, value } => {
            visit(Child::Expr(target, Some(Frame::Target)));
            e(visit, value);
        }
        ExprKind::Yield { value } => {
            if let Some(value) = value {
                e(visit, value);
            }
        }
        ExprKind::List { elts } | ExprKind::Tuple { elts } | ExprKind::Set { elts } => {
            for v in elts {
                e(visit, v);
            }
        }
        ExprKind::Dict { keys, values } => {
            for (k, v) in keys.iter().zip(values) {
                if let Some(k) = k {
                    e(visit, k);
                }
                e(visit, v);
            }
        }
        ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
            for g in generators {
                visit(Child::Expr(&g.target, Some(Frame::Target)));
                visit(Child::Expr(&g.iter, Some(Frame::Comprehension)));
                for cond in &g.ifs {
                    visit(Child::Expr(cond, Some(Frame::Comprehension)));
                }
            }
            visit(Child::Expr(elt, Some(Frame::Comprehension)));
        }
    }
}

pub(crate) fn stmt_children_mut<'a>(stmt: &'a mut Stmt, visit: &mut dyn FnMut(ChildMut<'a>)) {
    fn e<'a>(visit: &mut dyn FnMut(ChildMut<'a>), expr: &'a mut Expr) {
        visit(ChildMut::Expr(expr, None))
    }
    fn target<'a>(visit: &mut dyn FnMut(ChildMut<'a>), expr: &'a mut Expr) {
        visit(ChildMut::Expr(expr, Some(Frame::Target)))
    }
    match &mut stmt.kind {
        StmtKind::Import { .. }
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global { .. }
        | StmtKind::Nonlocal { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
        StmtKind::FunctionDef(def) => {
            let frame = function_frame(def);
            for deco in &mut def.decorators {
                e(visit, deco);
            }
            arguments_children_mut(&mut def.args, visit);
            if let Some(returns) = &mut def.returns {
                e(visit, returns);
            }
            visit(ChildMut::Suite(&mut def.body, Some(frame)));
        }
        StmtKind::ClassDef(def) => {
            let frame = class_frame(def);
            for deco in &mut def.decorators {
                e(visit, deco);
            }
            for base in &mut def.bases {
                e(visit, base);
            }
            for kw in &mut def.keywords {
                e(visit, &mut kw.value);
            }
            visit(ChildMut::Suite(&mut def.body, Some(frame)));
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                e(visit, value);
            }
        }
        StmtKind::Assign { targets, value } => {
            for t in targets {
                target(visit, t);
            }
            e(visit, value);
        }
        StmtKind::AnnAssign {
            target: t,
            annotation,
            value,
        } => {
            target(visit, t);
            e(visit, annotation);
            if let Some(value) = value {
                e(visit, value);
            }
        }
        StmtKind::AugAssign { target: t, value, .. } => {
            target(visit, t);
            e(visit, value);
        }
        StmtKind::Expr { value } => e(visit, value),
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            e(visit, test);
            visit(ChildMut::Suite(body, None));
            visit(ChildMut::Suite(orelse, None));
        }
        StmtKind::For {
            target: t,
            iter,
            body,
            orelse,
            ..
        } => {
            target(visit, t);
            e(visit, iter);
            visit(ChildMut::Suite(body, None));
            visit(ChildMut::Suite(orelse, None));
        }
        StmtKind::With { items, body, .. } => {
            for item in items {
                e(visit, &mut item.context);
                if let Some(vars) = &mut item.vars {
                    target(visit, vars);
                }
            }
            visit(ChildMut::Suite(body, None));
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            let frame = guard_frame(handlers);
            visit(ChildMut::Suite(body, frame));
            for handler in handlers {
                if let Some(ty) = &mut handler.exc_type {
                    e(visit, ty);
                }
                visit(ChildMut::Suite(&mut handler.body, None));
            }
            visit(ChildMut::Suite(orelse, None));
            visit(ChildMut::Suite(finalbody, None));
        }
        StmtKind::Raise { exc, cause } => {
            for value in [exc, cause].into_iter().flatten() {
                e(visit, value);
            }
        }
        StmtKind::Delete { targets } => {
            for t in targets {
                target(visit, t);
            }
        }
        StmtKind::Assert { test, msg } => {
            e(visit, test);
            if let Some(msg) = msg {
                e(visit, msg);
            }
        }
    }
}

fn arguments_children_mut<'a>(args: &'a mut Arguments, visit: &mut dyn FnMut(ChildMut<'a>)) {
    let Arguments {
        posonly,
        args: positional,
        vararg,
        kwonly,
        kw_defaults,
        kwarg,
        defaults,
    } = args;
    let params = posonly
        .iter_mut()
        .chain(positional.iter_mut())
        .chain(vararg.iter_mut())
        .chain(kwonly.iter_mut())
        .chain(kwarg.iter_mut());
    for arg in params {
        if let Some(ann) = &mut arg.annotation {
            visit(ChildMut::Expr(ann, None));
        }
    }
    for d in defaults {
        visit(ChildMut::Expr(d, None));
    }
    for d in kw_defaults.iter_mut().flatten() {
        visit(ChildMut::Expr(d, None));
    }
}

pub(crate) fn expr_children_mut<'a>(expr: &'a mut Expr, visit: &mut dyn FnMut(ChildMut<'a>)) {
    fn e<'a>(visit: &mut dyn FnMut(ChildMut<'a>), expr: &'a mut Expr) {
        visit(ChildMut::Expr(expr, None))
    }
    match &mut expr.kind {
        ExprKind::Name { .. } | ExprKind::Constant { .. } => {}
        ExprKind::JoinedStr { values } => {
            for v in values {
                e(visit, v);
            }
        }
        ExprKind::FormattedValue {
            value, format_spec, ..
        } => {
            e(visit, value);
            if let Some(spec) = format_spec {
                e(visit, spec);
            }
        }
        ExprKind::Attribute { value, .. }
        | ExprKind::Starred { value }
        | ExprKind::Await { value }
        | ExprKind::YieldFrom { value } => e(visit, value),
        ExprKind::UnaryOp { operand, .. } => e(visit, operand),
        ExprKind::Subscript { value, slice } => {
            e(visit, value);
            e(visit, slice);
        }
        ExprKind::Slice { lower, upper, step } => {
            for part in [lower, upper, step].into_iter().flatten() {
                e(visit, part);
            }
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            e(visit, func);
            for a in args {
                e(visit, a);
            }
            for k in keywords {
                e(visit, &mut k.value);
            }
        }
        ExprKind::BinOp { left, right, .. } => {
            e(visit, left);
            e(visit, right);
        }
        ExprKind::BoolOp { values, .. } => {
            for v in values {
                e(visit, v);
            }
        }
        ExprKind::Compare {
            left, comparators, ..
        } => {
            e(visit, left);
            for c in comparators {
                e(visit, c);
            }
        }
        ExprKind::IfExp { test, body, orelse } => {
            e(visit, test);
            e(visit, body);
            e(visit, orelse);
        }
        ExprKind::Lambda { args, body } => {
            let Arguments {
                defaults,
                kw_defaults,
                ..
            } = &mut **args;
            for d in defaults.iter_mut().chain(kw_defaults.iter_mut().flatten()) {
                e(visit, d);
            }
            visit(ChildMut::Expr(body, Some(Frame::Lambda)));
        }
        ExprKind::NamedExpr { target, value } => {
            visit(ChildMut::Expr(target, Some(Frame::Target)));
            e(visit, value);
        }
        ExprKind::Yield { value } => {
            if let Some(value) = value {
                e(visit, value);
            }
        }
        ExprKind::List { elts } | ExprKind::Tuple { elts } | ExprKind::Set { elts } => {
            for v in elts {
                e(visit, v);
            }
        }
        ExprKind::Dict { keys, values } => {
            for (k, v) in keys.iter_mut().zip(values) {
                if let Some(k) = k {
                    e(visit, k);
                }
                e(visit, v);
            }
        }
        ExprKind::ListComp { elt, generators } | ExprKind::GeneratorExp { elt, generators } => {
            for g in generators {
                visit(ChildMut::Expr(&mut g.target, Some(Frame::Target)));
                visit(ChildMut::Expr(&mut g.iter, Some(Frame::Comprehension)));
                for cond in &mut g.ifs {
                    visit(ChildMut::Expr(cond, Some(Frame::Comprehension)));
                }
            }
            visit(ChildMut::Expr(elt, Some(Frame::Comprehension)));
        }
    }
}

/// Gives every node in the subtree that still has the default location `loc`.
pub(crate) fn relocate_stmt(stmt: &mut Stmt, loc: Loc) {
    if stmt.loc == Loc::default() {
        stmt.loc = loc;
    }
    if let StmtKind::Try { handlers, .. } = &mut stmt.kind {
        for handler in handlers.iter_mut() {
            if handler.loc == Loc::default() {
                handler.loc = loc;
            }
        }
    }
    stmt_children_mut(stmt, &mut |child| match child {
        ChildMut::Suite(body, _) => body.iter_mut().for_each(|s| relocate_stmt(s, loc)),
        ChildMut::Expr(e, _) => relocate_expr(e, loc),
    });
}

pub(crate) fn relocate_expr(expr: &mut Expr, loc: Loc) {
    if expr.loc == Loc::default() {
        expr.loc = loc;
    }
    expr_children_mut(expr, &mut |child| match child {
        ChildMut::Suite(body, _) => body.iter_mut().for_each(|s| relocate_stmt(s, loc)),
        ChildMut::Expr(e, _) => relocate_expr(e, loc),
    });
}

/// Calls `f` on every expression in the subtree, pre-order, without crossing
/// into nested statement suites.
pub(crate) fn any_expr(expr: &Expr, f: &mut dyn FnMut(&Expr) -> bool) -> bool {
    if f(expr) {
        return true;
    }
    let mut found = false;
    expr_children(expr, &mut |child| {
        if !found && let Child::Expr(e, _) = child {
            found = any_expr(e, f);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_types::syntax::build::*;

    #[test]
    fn relocate_fills_only_default_locations() {
        let mut stmt = assign(name("x"), call(name("f"), vec![name("y").at(9, 9)]));
        relocate_stmt(&mut stmt, Loc::new(3, 4));
        assert_eq!(stmt.loc, Loc::new(3, 4));
        let StmtKind::Assign { targets, value } = &stmt.kind else {
            panic!("assign expected");
        };
        assert_eq!(targets[0].loc, Loc::new(3, 4));
        let ExprKind::Call { args, .. } = &value.kind else {
            panic!("call expected");
        };
        assert_eq!(args[0].loc, Loc::new(9, 9));
    }

    #[test]
    fn try_body_gets_guard_frame_only_for_import_handlers() {
        let guarded = try_except(vec![import("queue")], name("ImportError"), vec![pass()]);
        let mut frames = Vec::new();
        stmt_children(&guarded, &mut |child| {
            if let Child::Suite(_, frame) = child {
                frames.push(frame);
            }
        });
        assert_eq!(frames[0], Some(Frame::ImportGuard));

        let other = try_except(vec![import("queue")], name("KeyError"), vec![pass()]);
        let mut first = None;
        stmt_children(&other, &mut |child| {
            if let Child::Suite(_, frame) = child
                && first.is_none()
            {
                first = Some(frame);
            }
        });
        assert_eq!(first, Some(None));
    }

    #[test]
    fn any_expr_finds_nested_nodes() {
        let e = call(name("f"), vec![binop(name("a"), BinOpKind::Div, name("b"))]);
        assert!(any_expr(&e, &mut |x| matches!(
            x.kind,
            ExprKind::BinOp {
                op: BinOpKind::Div,
                ..
            }
        )));
        assert!(!any_expr(&e, &mut |x| x.as_name() == Some("zzz")));
    }
}
