//! Syntax tree → source text.

use retrofit_types::syntax::*;

const INDENT: &str = "    ";

// Binding strength, loosest first. A child rendered below the strength its
// position requires is wrapped in parentheses.
const P_TEST: u8 = 0;
const P_LAMBDA: u8 = 1;
const P_IFEXP: u8 = 2;
const P_OR: u8 = 3;
const P_AND: u8 = 4;
const P_NOT: u8 = 5;
const P_CMP: u8 = 6;
const P_BOR: u8 = 7;
const P_BXOR: u8 = 8;
const P_BAND: u8 = 9;
const P_SHIFT: u8 = 10;
const P_ARITH: u8 = 11;
const P_TERM: u8 = 12;
const P_UNARY: u8 = 13;
const P_POWER: u8 = 14;
const P_AWAIT: u8 = 15;
const P_ATOM: u8 = 16;

pub fn render_module(module: &Module) -> String {
    let mut w = Writer::default();
    for line in &module.header {
        w.out.push_str(line);
        w.out.push('\n');
    }
    for (i, stmt) in module.body.iter().enumerate() {
        let is_def = matches!(
            stmt.kind,
            StmtKind::FunctionDef(_) | StmtKind::ClassDef(_)
        );
        if i > 0 && is_def {
            w.out.push('\n');
        }
        w.stmt(stmt, 0);
    }
    w.out
}

pub fn render_expr(expr: &Expr) -> String {
    let r = Exprs { quote: '"' };
    r.expr(expr, P_TEST)
}

pub fn render_stmt(stmt: &Stmt) -> String {
    let mut w = Writer::default();
    w.stmt(stmt, 0);
    w.out
}

#[derive(Default)]
struct Writer {
    out: String,
}

impl Writer {
    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn suite(&mut self, body: &[Stmt], depth: usize) {
        if body.is_empty() {
            self.line(depth, "pass");
            return;
        }
        for stmt in body {
            self.stmt(stmt, depth);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, depth: usize) {
        let r = Exprs { quote: '"' };
        match &stmt.kind {
            StmtKind::Import { names } => {
                self.line(depth, &format!("import {}", aliases(names)));
            }
            StmtKind::ImportFrom {
                module,
                names,
                level,
            } => {
                let dots = ".".repeat(*level as usize);
                let from = format!("{dots}{}", module.as_deref().unwrap_or(""));
                self.line(depth, &format!("from {from} import {}", aliases(names)));
            }
            StmtKind::FunctionDef(def) => {
                for deco in &def.decorators {
                    self.line(depth, &format!("@{}", r.expr(deco, P_TEST)));
                }
                let prefix = if def.is_async { "async def" } else { "def" };
                let returns = def
                    .returns
                    .as_ref()
                    .map(|ret| format!(" -> {}", r.expr(ret, P_TEST)))
                    .unwrap_or_default();
                self.line(
                    depth,
                    &format!(
                        "{prefix} {}({}){returns}:",
                        def.name,
                        r.arguments(&def.args, true)
                    ),
                );
                self.suite(&def.body, depth + 1);
            }
            StmtKind::ClassDef(def) => {
                for deco in &def.decorators {
                    self.line(depth, &format!("@{}", r.expr(deco, P_TEST)));
                }
                let mut parts: Vec<String> =
                    def.bases.iter().map(|b| r.expr(b, P_TEST)).collect();
                parts.extend(def.keywords.iter().map(|k| r.keyword(k)));
                if parts.is_empty() {
                    self.line(depth, &format!("class {}:", def.name));
                } else {
                    self.line(depth, &format!("class {}({}):", def.name, parts.join(", ")));
                }
                self.suite(&def.body, depth + 1);
            }
            StmtKind::Return { value } => match value {
                Some(value) => self.line(depth, &format!("return {}", r.expr(value, P_TEST))),
                None => self.line(depth, "return"),
            },
            StmtKind::Assign { targets, value } => {
                let mut text = String::new();
                for target in targets {
                    text.push_str(&r.expr(target, P_TEST));
                    text.push_str(" = ");
                }
                text.push_str(&r.stmt_value(value));
                self.line(depth, &text);
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let mut text = format!(
                    "{}: {}",
                    r.expr(target, P_TEST),
                    r.expr(annotation, P_TEST)
                );
                if let Some(value) = value {
                    text.push_str(" = ");
                    text.push_str(&r.stmt_value(value));
                }
                self.line(depth, &text);
            }
            StmtKind::AugAssign { target, op, value } => {
                self.line(
                    depth,
                    &format!(
                        "{} {}= {}",
                        r.expr(target, P_TEST),
                        binop_symbol(*op),
                        r.stmt_value(value)
                    ),
                );
            }
            StmtKind::Expr { value } => self.line(depth, &r.stmt_value(value)),
            StmtKind::If { test, body, orelse } => {
                self.line(depth, &format!("if {}:", r.expr(test, P_TEST)));
                self.suite(body, depth + 1);
                self.orelse_chain(orelse, depth);
            }
            StmtKind::While { test, body, orelse } => {
                self.line(depth, &format!("while {}:", r.expr(test, P_TEST)));
                self.suite(body, depth + 1);
                if !orelse.is_empty() {
                    self.line(depth, "else:");
                    self.suite(orelse, depth + 1);
                }
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                is_async,
            } => {
                let prefix = if *is_async { "async for" } else { "for" };
                self.line(
                    depth,
                    &format!(
                        "{prefix} {} in {}:",
                        r.expr(target, P_BOR),
                        r.expr(iter, P_TEST)
                    ),
                );
                self.suite(body, depth + 1);
                if !orelse.is_empty() {
                    self.line(depth, "else:");
                    self.suite(orelse, depth + 1);
                }
            }
            StmtKind::With {
                items,
                body,
                is_async,
            } => {
                let prefix = if *is_async { "async with" } else { "with" };
                let items: Vec<String> = items
                    .iter()
                    .map(|item| match &item.vars {
                        Some(vars) => format!(
                            "{} as {}",
                            r.expr(&item.context, P_TEST),
                            r.expr(vars, P_BOR)
                        ),
                        None => r.expr(&item.context, P_TEST),
                    })
                    .collect();
                self.line(depth, &format!("{prefix} {}:", items.join(", ")));
                self.suite(body, depth + 1);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                self.line(depth, "try:");
                self.suite(body, depth + 1);
                for handler in handlers {
                    let head = match (&handler.exc_type, &handler.name) {
                        (None, _) => "except:".to_string(),
                        (Some(ty), None) => format!("except {}:", r.expr(ty, P_TEST)),
                        (Some(ty), Some(name)) => {
                            format!("except {} as {name}:", r.expr(ty, P_TEST))
                        }
                    };
                    self.line(depth, &head);
                    self.suite(&handler.body, depth + 1);
                }
                if !orelse.is_empty() {
                    self.line(depth, "else:");
                    self.suite(orelse, depth + 1);
                }
                if !finalbody.is_empty() || handlers.is_empty() {
                    self.line(depth, "finally:");
                    self.suite(finalbody, depth + 1);
                }
            }
            StmtKind::Raise { exc, cause } => {
                let text = match (exc, cause) {
                    (None, _) => "raise".to_string(),
                    (Some(exc), None) => format!("raise {}", r.expr(exc, P_TEST)),
                    (Some(exc), Some(cause)) => format!(
                        "raise {} from {}",
                        r.expr(exc, P_TEST),
                        r.expr(cause, P_TEST)
                    ),
                };
                self.line(depth, &text);
            }
            StmtKind::Global { names } => self.line(depth, &format!("global {}", names.join(", "))),
            StmtKind::Nonlocal { names } => {
                self.line(depth, &format!("nonlocal {}", names.join(", ")))
            }
            StmtKind::Delete { targets } => {
                let targets: Vec<String> = targets.iter().map(|t| r.expr(t, P_BOR)).collect();
                self.line(depth, &format!("del {}", targets.join(", ")));
            }
            StmtKind::Assert { test, msg } => {
                let text = match msg {
                    Some(msg) => format!(
                        "assert {}, {}",
                        r.expr(test, P_TEST),
                        r.expr(msg, P_TEST)
                    ),
                    None => format!("assert {}", r.expr(test, P_TEST)),
                };
                self.line(depth, &text);
            }
            StmtKind::Pass => self.line(depth, "pass"),
            StmtKind::Break => self.line(depth, "break"),
            StmtKind::Continue => self.line(depth, "continue"),
        }
    }

    fn orelse_chain(&mut self, orelse: &[Stmt], depth: usize) {
        let r = Exprs { quote: '"' };
        match orelse {
            [] => {}
            [
                Stmt {
                    kind: StmtKind::If { test, body, orelse },
                    ..
                },
            ] => {
                self.line(depth, &format!("elif {}:", r.expr(test, P_TEST)));
                self.suite(body, depth + 1);
                self.orelse_chain(orelse, depth);
            }
            _ => {
                self.line(depth, "else:");
                self.suite(orelse, depth + 1);
            }
        }
    }
}

fn aliases(names: &[Alias]) -> String {
    names
        .iter()
        .map(|a| match &a.asname {
            Some(asname) => format!("{} as {asname}", a.name),
            None => a.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expression renderer. `quote` is the delimiter for string literals; inside a
/// formatted string it flips to `'` so nested literals stay parseable.
#[derive(Clone, Copy)]
struct Exprs {
    quote: char,
}

impl Exprs {
    /// Right-hand side of an assignment or an expression statement: a bare
    /// `yield` is allowed here and nowhere else.
    fn stmt_value(&self, value: &Expr) -> String {
        match &value.kind {
            ExprKind::Yield { .. } | ExprKind::YieldFrom { .. } => self.yield_expr(value),
            _ => self.expr(value, P_TEST),
        }
    }

    fn expr(&self, e: &Expr, min: u8) -> String {
        let (text, prec) = self.expr_prec(e);
        if prec < min {
            format!("({text})")
        } else {
            text
        }
    }

    fn yield_expr(&self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Yield { value: Some(v) } => format!("yield {}", self.expr(v, P_TEST)),
            ExprKind::Yield { value: None } => "yield".to_string(),
            ExprKind::YieldFrom { value } => format!("yield from {}", self.expr(value, P_TEST)),
            _ => self.expr(e, P_TEST),
        }
    }

    fn expr_prec(&self, e: &Expr) -> (String, u8) {
        match &e.kind {
            ExprKind::Name { id } => (id.clone(), P_ATOM),
            ExprKind::Constant { value } => (self.constant(value), P_ATOM),
            ExprKind::JoinedStr { values } => (self.joined_str(values), P_ATOM),
            ExprKind::FormattedValue { .. } => (self.joined_str(std::slice::from_ref(e)), P_ATOM),
            ExprKind::Attribute { value, attr } => {
                (format!("{}.{attr}", self.primary(value)), P_ATOM)
            }
            ExprKind::Subscript { value, slice } => {
                let index = match &slice.kind {
                    ExprKind::Tuple { elts } if !elts.is_empty() => self.items(elts),
                    _ => self.expr(slice, P_TEST),
                };
                (format!("{}[{index}]", self.primary(value)), P_ATOM)
            }
            ExprKind::Slice { lower, upper, step } => {
                let part = |p: &Option<Box<Expr>>| {
                    p.as_ref()
                        .map(|p| self.expr(p, P_TEST))
                        .unwrap_or_default()
                };
                let mut text = format!("{}:{}", part(lower), part(upper));
                if step.is_some() {
                    text.push(':');
                    text.push_str(&part(step));
                }
                (text, P_ATOM)
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| self.expr(a, P_LAMBDA)).collect();
                parts.extend(keywords.iter().map(|k| self.keyword(k)));
                (
                    format!("{}({})", self.primary(func), parts.join(", ")),
                    P_ATOM,
                )
            }
            ExprKind::Starred { value } => (format!("*{}", self.expr(value, P_BOR)), P_BOR),
            ExprKind::BinOp { left, op, right } => {
                let prec = binop_prec(*op);
                let text = if *op == BinOpKind::Pow {
                    format!(
                        "{} ** {}",
                        self.expr(left, P_AWAIT),
                        self.expr(right, P_UNARY)
                    )
                } else {
                    format!(
                        "{} {} {}",
                        self.expr(left, prec),
                        binop_symbol(*op),
                        self.expr(right, prec + 1)
                    )
                };
                (text, prec)
            }
            ExprKind::UnaryOp { op, operand } => match op {
                UnaryOpKind::Not => (format!("not {}", self.expr(operand, P_NOT)), P_NOT),
                UnaryOpKind::Invert => (format!("~{}", self.expr(operand, P_UNARY)), P_UNARY),
                UnaryOpKind::UAdd => (format!("+{}", self.expr(operand, P_UNARY)), P_UNARY),
                UnaryOpKind::USub => (format!("-{}", self.expr(operand, P_UNARY)), P_UNARY),
            },
            ExprKind::BoolOp { op, values } => {
                let (word, prec) = match op {
                    BoolOpKind::And => (" and ", P_AND),
                    BoolOpKind::Or => (" or ", P_OR),
                };
                let parts: Vec<String> = values.iter().map(|v| self.expr(v, prec + 1)).collect();
                (parts.join(word), prec)
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut text = self.expr(left, P_BOR);
                for (op, right) in ops.iter().zip(comparators) {
                    text.push(' ');
                    text.push_str(cmp_symbol(*op));
                    text.push(' ');
                    text.push_str(&self.expr(right, P_BOR));
                }
                (text, P_CMP)
            }
            ExprKind::IfExp { test, body, orelse } => (
                format!(
                    "{} if {} else {}",
                    self.expr(body, P_OR),
                    self.expr(test, P_OR),
                    self.expr(orelse, P_IFEXP)
                ),
                P_IFEXP,
            ),
            ExprKind::Lambda { args, body } => {
                let params = self.arguments(args, false);
                let head = if params.is_empty() {
                    "lambda".to_string()
                } else {
                    format!("lambda {params}")
                };
                (format!("{head}: {}", self.expr(body, P_LAMBDA)), P_LAMBDA)
            }
            // Assignment expressions are always parenthesized.
            ExprKind::NamedExpr { target, value } => (
                format!(
                    "({} := {})",
                    self.expr(target, P_ATOM),
                    self.expr(value, P_LAMBDA)
                ),
                P_ATOM,
            ),
            ExprKind::Await { value } => (format!("await {}", self.primary(value)), P_AWAIT),
            ExprKind::Yield { .. } | ExprKind::YieldFrom { .. } => {
                (format!("({})", self.yield_expr(e)), P_ATOM)
            }
            ExprKind::List { elts } => (format!("[{}]", self.items(elts)), P_ATOM),
            ExprKind::Tuple { elts } => {
                let text = match elts.as_slice() {
                    [] => "()".to_string(),
                    [one] => format!("({},)", self.expr(one, P_LAMBDA)),
                    _ => format!("({})", self.items(elts)),
                };
                (text, P_ATOM)
            }
            ExprKind::Set { elts } => {
                if elts.is_empty() {
                    ("set()".to_string(), P_ATOM)
                } else {
                    (format!("{{{}}}", self.items(elts)), P_ATOM)
                }
            }
            ExprKind::Dict { keys, values } => {
                let parts: Vec<String> = keys
                    .iter()
                    .zip(values)
                    .map(|(k, v)| match k {
                        Some(k) => format!("{}: {}", self.expr(k, P_IFEXP), self.expr(v, P_LAMBDA)),
                        None => format!("**{}", self.expr(v, P_BOR)),
                    })
                    .collect();
                (format!("{{{}}}", parts.join(", ")), P_ATOM)
            }
            ExprKind::ListComp { elt, generators } => (
                format!(
                    "[{}{}]",
                    self.expr(elt, P_LAMBDA),
                    self.generators(generators)
                ),
                P_ATOM,
            ),
            ExprKind::GeneratorExp { elt, generators } => (
                format!(
                    "({}{})",
                    self.expr(elt, P_LAMBDA),
                    self.generators(generators)
                ),
                P_ATOM,
            ),
        }
    }

    /// Operand of `.attr`, `[...]`, `(...)` and `await`.
    fn primary(&self, e: &Expr) -> String {
        match &e.kind {
            ExprKind::Constant {
                value: Constant::Num(_),
            } => format!("({})", self.expr(e, P_TEST)),
            _ => self.expr(e, P_ATOM),
        }
    }

    fn items(&self, elts: &[Expr]) -> String {
        elts.iter()
            .map(|e| self.expr(e, P_LAMBDA))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn keyword(&self, k: &Keyword) -> String {
        match &k.arg {
            Some(arg) => format!("{arg}={}", self.expr(&k.value, P_LAMBDA)),
            None => format!("**{}", self.expr(&k.value, P_BOR)),
        }
    }

    fn generators(&self, generators: &[Comprehension]) -> String {
        let mut text = String::new();
        for g in generators {
            text.push_str(if g.is_async { " async for " } else { " for " });
            text.push_str(&self.expr(&g.target, P_BOR));
            text.push_str(" in ");
            text.push_str(&self.expr(&g.iter, P_OR));
            for cond in &g.ifs {
                text.push_str(" if ");
                text.push_str(&self.expr(cond, P_OR));
            }
        }
        text
    }

    fn arguments(&self, args: &Arguments, annotations: bool) -> String {
        let param = |arg: &Arg, default: Option<&Expr>| {
            let ann = match (&arg.annotation, annotations) {
                (Some(ann), true) => Some(self.expr(ann, P_TEST)),
                _ => None,
            };
            match (ann, default) {
                (Some(ann), Some(d)) => format!("{}: {ann} = {}", arg.name, self.expr(d, P_LAMBDA)),
                (Some(ann), None) => format!("{}: {ann}", arg.name),
                (None, Some(d)) => format!("{}={}", arg.name, self.expr(d, P_LAMBDA)),
                (None, None) => arg.name.clone(),
            }
        };
        let star = |prefix: &str, arg: &Arg| match (&arg.annotation, annotations) {
            (Some(ann), true) => format!("{prefix}{}: {}", arg.name, self.expr(ann, P_TEST)),
            _ => format!("{prefix}{}", arg.name),
        };

        let positional = args.posonly.len() + args.args.len();
        let first_default = positional.saturating_sub(args.defaults.len());
        let default_for = |i: usize| {
            if i >= first_default {
                args.defaults.get(i - first_default)
            } else {
                None
            }
        };

        let mut parts = Vec::new();
        for (i, arg) in args.posonly.iter().enumerate() {
            parts.push(param(arg, default_for(i)));
        }
        if !args.posonly.is_empty() {
            parts.push("/".to_string());
        }
        for (i, arg) in args.args.iter().enumerate() {
            parts.push(param(arg, default_for(args.posonly.len() + i)));
        }
        match &args.vararg {
            Some(vararg) => parts.push(star("*", vararg)),
            None if !args.kwonly.is_empty() => parts.push("*".to_string()),
            None => {}
        }
        for (i, arg) in args.kwonly.iter().enumerate() {
            let default = args.kw_defaults.get(i).and_then(Option::as_ref);
            parts.push(param(arg, default));
        }
        if let Some(kwarg) = &args.kwarg {
            parts.push(star("**", kwarg));
        }
        parts.join(", ")
    }

    fn constant(&self, c: &Constant) -> String {
        match c {
            Constant::None => "None".to_string(),
            Constant::Bool(true) => "True".to_string(),
            Constant::Bool(false) => "False".to_string(),
            Constant::Num(text) => text.clone(),
            Constant::Str(s) => quote_str(s, self.quote, false),
            Constant::Bytes(s) => format!("b{}", quote_str(s, self.quote, true)),
            Constant::Ellipsis => "...".to_string(),
        }
    }

    fn joined_str(&self, values: &[Expr]) -> String {
        let body = self.fstring_body(values);
        format!("f{q}{body}{q}", q = self.quote)
    }

    fn fstring_body(&self, values: &[Expr]) -> String {
        let inner = Exprs { quote: '\'' };
        let mut body = String::new();
        for part in values {
            match &part.kind {
                ExprKind::Constant {
                    value: Constant::Str(s),
                } => {
                    let escaped = escape(s, self.quote, false);
                    body.push_str(&escaped.replace('{', "{{").replace('}', "}}"));
                }
                ExprKind::FormattedValue {
                    value,
                    conversion,
                    format_spec,
                } => {
                    let text = inner.expr(value, P_IFEXP);
                    body.push('{');
                    if text.starts_with('{') {
                        body.push(' ');
                    }
                    body.push_str(&text);
                    if let Some(conv) = conversion {
                        body.push('!');
                        body.push(*conv);
                    }
                    if let Some(spec) = format_spec {
                        body.push(':');
                        match &spec.kind {
                            ExprKind::JoinedStr { values } => {
                                body.push_str(&self.fstring_body(values))
                            }
                            ExprKind::Constant {
                                value: Constant::Str(s),
                            } => body.push_str(&escape(s, self.quote, false)),
                            _ => body.push_str(&inner.expr(spec, P_TEST)),
                        }
                    }
                    body.push('}');
                }
                _ => {
                    body.push('{');
                    body.push_str(&inner.expr(part, P_IFEXP));
                    body.push('}');
                }
            }
        }
        body
    }
}

fn quote_str(s: &str, quote: char, bytes: bool) -> String {
    format!("{quote}{}{quote}", escape(s, quote, bytes))
}

fn escape(s: &str, quote: char, bytes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if bytes && (c as u32) > 0x7f && (c as u32) < 0x100 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

fn binop_prec(op: BinOpKind) -> u8 {
    match op {
        BinOpKind::BitOr => P_BOR,
        BinOpKind::BitXor => P_BXOR,
        BinOpKind::BitAnd => P_BAND,
        BinOpKind::LShift | BinOpKind::RShift => P_SHIFT,
        BinOpKind::Add | BinOpKind::Sub => P_ARITH,
        BinOpKind::Mult
        | BinOpKind::MatMult
        | BinOpKind::Div
        | BinOpKind::FloorDiv
        | BinOpKind::Mod => P_TERM,
        BinOpKind::Pow => P_POWER,
    }
}

pub(crate) fn binop_symbol(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mult => "*",
        BinOpKind::MatMult => "@",
        BinOpKind::Div => "/",
        BinOpKind::FloorDiv => "//",
        BinOpKind::Mod => "%",
        BinOpKind::Pow => "**",
        BinOpKind::LShift => "<<",
        BinOpKind::RShift => ">>",
        BinOpKind::BitOr => "|",
        BinOpKind::BitXor => "^",
        BinOpKind::BitAnd => "&",
    }
}

fn cmp_symbol(op: CmpOpKind) -> &'static str {
    match op {
        CmpOpKind::Eq => "==",
        CmpOpKind::NotEq => "!=",
        CmpOpKind::Lt => "<",
        CmpOpKind::LtEq => "<=",
        CmpOpKind::Gt => ">",
        CmpOpKind::GtEq => ">=",
        CmpOpKind::Is => "is",
        CmpOpKind::IsNot => "is not",
        CmpOpKind::In => "in",
        CmpOpKind::NotIn => "not in",
    }
}
