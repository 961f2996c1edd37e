//! Terse constructors for syntax nodes.
//!
//! Nodes are created at the default location; chain `.at(line, col)` to place them.

use super::*;

pub fn module(body: Vec<Stmt>) -> Module {
    Module::new(body)
}

fn e(kind: ExprKind) -> Expr {
    Expr::new(kind, Loc::default())
}

fn s(kind: StmtKind) -> Stmt {
    Stmt::new(kind, Loc::default())
}

pub fn name(id: &str) -> Expr {
    e(ExprKind::Name { id: id.to_string() })
}

pub fn constant(value: Constant) -> Expr {
    e(ExprKind::Constant { value })
}

pub fn string(value: &str) -> Expr {
    constant(Constant::Str(value.to_string()))
}

pub fn num(text: &str) -> Expr {
    constant(Constant::Num(text.to_string()))
}

pub fn none() -> Expr {
    constant(Constant::None)
}

pub fn boolean(value: bool) -> Expr {
    constant(Constant::Bool(value))
}

pub fn attr(value: Expr, attr: &str) -> Expr {
    e(ExprKind::Attribute {
        value: Box::new(value),
        attr: attr.to_string(),
    })
}

pub fn subscript(value: Expr, slice: Expr) -> Expr {
    e(ExprKind::Subscript {
        value: Box::new(value),
        slice: Box::new(slice),
    })
}

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    call_kw(func, args, Vec::new())
}

pub fn call_kw(func: Expr, args: Vec<Expr>, keywords: Vec<Keyword>) -> Expr {
    e(ExprKind::Call {
        func: Box::new(func),
        args,
        keywords,
    })
}

pub fn kw(arg: &str, value: Expr) -> Keyword {
    Keyword {
        arg: Some(arg.to_string()),
        value,
    }
}

pub fn kw_unpack(value: Expr) -> Keyword {
    Keyword { arg: None, value }
}

pub fn starred(value: Expr) -> Expr {
    e(ExprKind::Starred {
        value: Box::new(value),
    })
}

pub fn binop(left: Expr, op: BinOpKind, right: Expr) -> Expr {
    e(ExprKind::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

pub fn unary(op: UnaryOpKind, operand: Expr) -> Expr {
    e(ExprKind::UnaryOp {
        op,
        operand: Box::new(operand),
    })
}

pub fn compare(left: Expr, op: CmpOpKind, right: Expr) -> Expr {
    e(ExprKind::Compare {
        left: Box::new(left),
        ops: vec![op],
        comparators: vec![right],
    })
}

pub fn bool_op(op: BoolOpKind, values: Vec<Expr>) -> Expr {
    e(ExprKind::BoolOp { op, values })
}

pub fn named_expr(target: &str, value: Expr) -> Expr {
    e(ExprKind::NamedExpr {
        target: Box::new(name(target)),
        value: Box::new(value),
    })
}

pub fn list(elts: Vec<Expr>) -> Expr {
    e(ExprKind::List { elts })
}

pub fn tuple(elts: Vec<Expr>) -> Expr {
    e(ExprKind::Tuple { elts })
}

pub fn set(elts: Vec<Expr>) -> Expr {
    e(ExprKind::Set { elts })
}

pub fn dict(entries: Vec<(Option<Expr>, Expr)>) -> Expr {
    let (keys, values) = entries.into_iter().unzip();
    e(ExprKind::Dict { keys, values })
}

pub fn fstring(values: Vec<Expr>) -> Expr {
    e(ExprKind::JoinedStr { values })
}

pub fn formatted(value: Expr, conversion: Option<char>, format_spec: Option<Expr>) -> Expr {
    e(ExprKind::FormattedValue {
        value: Box::new(value),
        conversion,
        format_spec: format_spec.map(Box::new),
    })
}

pub fn lambda(args: Arguments, body: Expr) -> Expr {
    e(ExprKind::Lambda {
        args: Box::new(args),
        body: Box::new(body),
    })
}

pub fn list_comp(elt: Expr, target: Expr, iter: Expr) -> Expr {
    e(ExprKind::ListComp {
        elt: Box::new(elt),
        generators: vec![Comprehension {
            target,
            iter,
            ifs: Vec::new(),
            is_async: false,
        }],
    })
}

pub fn arg(name: &str) -> Arg {
    Arg {
        name: name.to_string(),
        annotation: None,
    }
}

pub fn arg_ann(name: &str, annotation: Expr) -> Arg {
    Arg {
        name: name.to_string(),
        annotation: Some(annotation),
    }
}

pub fn params(names: &[&str]) -> Arguments {
    Arguments {
        args: names.iter().map(|n| arg(n)).collect(),
        ..Arguments::default()
    }
}

pub fn expr_stmt(value: Expr) -> Stmt {
    s(StmtKind::Expr { value })
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    s(StmtKind::Assign {
        targets: vec![target],
        value,
    })
}

pub fn ann_assign(target: Expr, annotation: Expr, value: Option<Expr>) -> Stmt {
    s(StmtKind::AnnAssign {
        target,
        annotation,
        value,
    })
}

pub fn ret(value: Option<Expr>) -> Stmt {
    s(StmtKind::Return { value })
}

pub fn if_(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
    s(StmtKind::If { test, body, orelse })
}

pub fn while_(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
    s(StmtKind::While { test, body, orelse })
}

pub fn pass() -> Stmt {
    s(StmtKind::Pass)
}

pub fn brk() -> Stmt {
    s(StmtKind::Break)
}

pub fn raise(exc: Expr) -> Stmt {
    s(StmtKind::Raise {
        exc: Some(exc),
        cause: None,
    })
}

pub fn for_(target: Expr, iter: Expr, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::For {
        target,
        iter,
        body,
        orelse: Vec::new(),
        is_async: false,
    })
}

pub fn import(module: &str) -> Stmt {
    s(StmtKind::Import {
        names: vec![alias(module, None)],
    })
}

pub fn import_as(module: &str, asname: &str) -> Stmt {
    s(StmtKind::Import {
        names: vec![alias(module, Some(asname))],
    })
}

pub fn import_from(module: &str, names: &[&str]) -> Stmt {
    s(StmtKind::ImportFrom {
        module: Some(module.to_string()),
        names: names.iter().map(|n| alias(n, None)).collect(),
        level: 0,
    })
}

pub fn alias(name: &str, asname: Option<&str>) -> Alias {
    Alias {
        name: name.to_string(),
        asname: asname.map(str::to_string),
    }
}

pub fn try_except(body: Vec<Stmt>, exc_type: Expr, handler_body: Vec<Stmt>) -> Stmt {
    s(StmtKind::Try {
        body,
        handlers: vec![ExceptHandler {
            loc: Loc::default(),
            exc_type: Some(exc_type),
            name: None,
            body: handler_body,
        }],
        orelse: Vec::new(),
        finalbody: Vec::new(),
    })
}

pub fn func(name: &str, args: Arguments, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::FunctionDef(FunctionDef {
        name: name.to_string(),
        args,
        body,
        decorators: Vec::new(),
        returns: None,
        is_async: false,
    }))
}

pub fn class(name: &str, bases: Vec<Expr>, body: Vec<Stmt>) -> Stmt {
    class_kw(name, bases, Vec::new(), body)
}

pub fn class_kw(name: &str, bases: Vec<Expr>, keywords: Vec<Keyword>, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::ClassDef(ClassDef {
        name: name.to_string(),
        bases,
        keywords,
        body,
        decorators: Vec::new(),
    }))
}
