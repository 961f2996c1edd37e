//! Forbidden shapes, one per fixer plus the constructs nothing can rewrite.

use super::{Rule, RuleCtx, RuleMeta};
use crate::fixers::{
    CONTENT_FUTURES, ContentFuture, OPEN_PY3_KEYWORDS, Target, expr_kind, is_name_call, is_named_tuple_base, needs_keyword_fix,
    needs_positional_fix, stmt_kind,
};
use crate::walk::any_expr;
use retrofit_types::Version;
use retrofit_types::syntax::{Arguments, BinOpKind, Expr, ExprKind, Stmt, StmtKind};

type Test = fn(Target<'_>, &RuleCtx<'_>) -> Option<String>;

/// A rule that is nothing but a predicate over one node.
pub(super) struct ShapeRule {
    meta: RuleMeta,
    test: Test,
}

impl ShapeRule {
    const fn new(
        id: &'static str,
        introduced: Version,
        description: &'static str,
        test: Test,
    ) -> Self {
        Self {
            meta: RuleMeta {
                id,
                introduced,
                description,
            },
            test,
        }
    }
}

impl Rule for ShapeRule {
    fn meta(&self) -> RuleMeta {
        self.meta
    }

    fn check(&self, target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
        (self.test)(target, cx)
    }
}

pub(super) fn shape_rules() -> Vec<Box<dyn Rule>> {
    const V3_0: Version = Version::new(3, 0);
    const V3_3: Version = Version::new(3, 3);
    const V3_5: Version = Version::new(3, 5);
    const V3_6: Version = Version::new(3, 6);
    const V3_7: Version = Version::new(3, 7);
    const V3_8: Version = Version::new(3, 8);

    let table = [
        ShapeRule::new(
            "future.generator_stop",
            V3_5,
            "the generator_stop future import",
            generator_stop_future,
        ),
        ShapeRule::new(
            "annotations.postponed",
            V3_7,
            "unquoted forward references in annotations",
            forward_reference,
        ),
        ShapeRule::new(
            "future.annotations",
            V3_7,
            "the annotations future import",
            annotations_future,
        ),
        ShapeRule::new(
            "annotations.named_tuple_class",
            V3_6,
            "class-syntax NamedTuple definitions",
            named_tuple_class,
        ),
        ShapeRule::new(
            "annotations.variable",
            V3_6,
            "variable annotations",
            variable_annotation,
        ),
        ShapeRule::new(
            "annotations.function",
            V3_0,
            "parameter and return annotations",
            function_annotations,
        ),
        ShapeRule::new(
            "syntax.keyword_only_args",
            V3_0,
            "keyword-only parameters",
            keyword_only,
        ),
        ShapeRule::new(
            "syntax.positional_only",
            V3_8,
            "positional-only parameters",
            positional_only,
        ),
        ShapeRule::new(
            "syntax.named_expr",
            V3_8,
            "assignment expressions",
            named_expr,
        ),
        ShapeRule::new("syntax.fstring", V3_6, "formatted string literals", fstring),
        ShapeRule::new(
            "syntax.unpacking_generalizations",
            V3_5,
            "additional unpacking in calls and displays",
            unpacking,
        ),
        ShapeRule::new(
            "syntax.super_no_args",
            V3_0,
            "zero-argument super()",
            super_no_args,
        ),
        ShapeRule::new(
            "classes.metaclass_keyword",
            V3_0,
            "keywords in class bases",
            class_keywords,
        ),
        ShapeRule::new(
            "classes.new_style",
            V3_0,
            "classes without an explicit base",
            implicit_base,
        ),
        ShapeRule::new(
            "builtins.lazy_iterators",
            V3_0,
            "map, zip and filter returning iterators",
            lazy_builtin,
        ),
        ShapeRule::new(
            "builtins.open_encoding",
            V3_0,
            "open() with text-mode keywords",
            open_encoding,
        ),
        ShapeRule::new(
            "future.print_function",
            V3_0,
            "print() without the print_function future",
            print_call,
        ),
        ShapeRule::new(
            "future.division",
            V3_0,
            "true division without the division future",
            true_division,
        ),
        ShapeRule::new("syntax.async", V3_5, "async and await", async_syntax),
        ShapeRule::new("syntax.yield_from", V3_3, "yield from", yield_from),
        ShapeRule::new("syntax.matmul", V3_5, "the @ operator", matmul),
        ShapeRule::new("syntax.nonlocal", V3_0, "nonlocal declarations", nonlocal),
        ShapeRule::new(
            "syntax.starred_assignment",
            V3_0,
            "starred assignment targets",
            starred_assignment,
        ),
    ];
    let mut out: Vec<Box<dyn Rule>> = table
        .into_iter()
        .map(|rule| Box::new(rule) as Box<dyn Rule>)
        .collect();
    out.extend(
        CONTENT_FUTURES
            .iter()
            .map(|future| Box::new(FutureRule(future)) as Box<dyn Rule>),
    );
    out
}

/// A construct whose meaning depends on a future the module does not import.
struct FutureRule(&'static ContentFuture);

impl Rule for FutureRule {
    fn meta(&self) -> RuleMeta {
        RuleMeta {
            id: self.0.id,
            introduced: self.0.introduced,
            description: self.0.description,
        }
    }

    fn check(&self, target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
        self.0
            .needed(target, cx.path)
            .then(|| format!("{} without the {} future", self.0.construct, self.0.future))
    }
}

fn imports_future(target: Target<'_>, name: &str) -> bool {
    matches!(
        target,
        Target::Stmt(stmt) if stmt.is_future_import() && matches!(
            &stmt.kind,
            StmtKind::ImportFrom { names, .. } if names.iter().any(|a| a.name == name)
        )
    )
}

fn generator_stop_future(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    imports_future(target, "generator_stop")
        .then(|| "'from __future__ import generator_stop'".to_string())
}

fn annotations_future(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    imports_future(target, "annotations").then(|| "'from __future__ import annotations'".to_string())
}

/// First name in `annotation` that is not bound yet where the annotation is
/// evaluated: an enclosing class, or a module class defined on or after `line`.
fn unbound_reference(annotation: &Expr, line: u32, cx: &RuleCtx<'_>) -> Option<String> {
    if annotation.as_str().is_some() {
        return None;
    }
    let mut found = None;
    any_expr(annotation, &mut |e| {
        let Some(id) = e.as_name() else {
            return false;
        };
        let enclosing = cx.path.class_names().any(|c| c == id);
        let later = cx
            .path
            .facts()
            .classes
            .get(id)
            .is_some_and(|&defined| defined >= line);
        if enclosing || later {
            found = Some(id.to_string());
        }
        found.is_some()
    });
    found
}

fn forward_reference(target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
    let Target::Stmt(stmt) = target else {
        return None;
    };
    let line = stmt.loc.line;
    let name = match &stmt.kind {
        StmtKind::FunctionDef(def) => def
            .returns
            .as_deref()
            .into_iter()
            .chain(def.args.all_args().filter_map(|a| a.annotation.as_ref()))
            .find_map(|ann| unbound_reference(ann, line, cx)),
        StmtKind::AnnAssign { annotation, .. } => unbound_reference(annotation, line, cx),
        _ => None,
    }?;
    Some(format!("forward reference to '{name}' in an annotation"))
}

fn named_tuple_class(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match stmt_kind(target) {
        Some(StmtKind::ClassDef(def)) if def.bases.iter().any(is_named_tuple_base) => {
            Some(format!("class-syntax NamedTuple '{}'", def.name))
        }
        _ => None,
    }
}

fn variable_annotation(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    matches!(stmt_kind(target), Some(StmtKind::AnnAssign { .. }))
        .then(|| "variable annotation".to_string())
}

fn function_annotations(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match stmt_kind(target) {
        Some(StmtKind::FunctionDef(def))
            if def.returns.is_some() || def.args.all_args().any(|a| a.annotation.is_some()) =>
        {
            Some(format!("annotations on function '{}'", def.name))
        }
        _ => None,
    }
}

/// Parameters of a def (with its name) or a lambda.
fn signature<'a>(target: Target<'a>) -> Option<(&'a Arguments, String)> {
    match target {
        Target::Stmt(Stmt {
            kind: StmtKind::FunctionDef(def),
            ..
        }) => Some((&def.args, format!("'{}'", def.name))),
        Target::Expr(Expr {
            kind: ExprKind::Lambda { args, .. },
            ..
        }) => Some((args, "a lambda".to_string())),
        _ => None,
    }
}

fn keyword_only(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let (args, owner) = signature(target)?;
    (!args.kwonly.is_empty()).then(|| format!("keyword-only parameters of {owner}"))
}

fn positional_only(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let (args, owner) = signature(target)?;
    (!args.posonly.is_empty()).then(|| format!("positional-only parameters of {owner}"))
}

fn named_expr(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    matches!(expr_kind(target), Some(ExprKind::NamedExpr { .. }))
        .then(|| "assignment expression".to_string())
}

fn fstring(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    matches!(expr_kind(target), Some(ExprKind::JoinedStr { .. }))
        .then(|| "formatted string literal".to_string())
}

fn unpacking(target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
    let starred = |elts: &[Expr]| elts.iter().any(|e| matches!(e.kind, ExprKind::Starred { .. }));
    let what = match expr_kind(target)? {
        ExprKind::Call { args, keywords, .. }
            if needs_positional_fix(args) || needs_keyword_fix(keywords) =>
        {
            "repeated unpacking in a call"
        }
        ExprKind::List { elts } | ExprKind::Tuple { elts } | ExprKind::Set { elts }
            if !cx.path.in_target() && starred(elts) =>
        {
            "unpacking inside a display"
        }
        ExprKind::Dict { keys, .. } if keys.iter().any(Option::is_none) => {
            "unpacking inside a dict display"
        }
        _ => return None,
    };
    Some(what.to_string())
}

fn super_no_args(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match expr_kind(target)? {
        ExprKind::Call {
            func,
            args,
            keywords,
        } if func.as_name() == Some("super") && args.is_empty() && keywords.is_empty() => {
            Some("super() without arguments".to_string())
        }
        _ => None,
    }
}

fn class_keywords(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match stmt_kind(target) {
        Some(StmtKind::ClassDef(def)) if !def.keywords.is_empty() => {
            Some(format!("keywords in the bases of class '{}'", def.name))
        }
        _ => None,
    }
}

fn implicit_base(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match stmt_kind(target) {
        Some(StmtKind::ClassDef(def)) if def.bases.is_empty() => {
            Some(format!("class '{}' without an explicit base", def.name))
        }
        _ => None,
    }
}

fn lazy_builtin(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let Target::Expr(e) = target else {
        return None;
    };
    is_name_call(e, &["map", "zip", "filter"]).map(|name| format!("iterator-returning {name}()"))
}

fn open_encoding(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let Target::Expr(e) = target else {
        return None;
    };
    is_name_call(e, &["open"])?;
    let ExprKind::Call { args, keywords, .. } = &e.kind else {
        return None;
    };
    if let Some(k) = keywords
        .iter()
        .filter_map(|k| k.arg.as_deref())
        .find(|k| OPEN_PY3_KEYWORDS.contains(k))
    {
        return Some(format!("open() with '{k}'"));
    }
    (args.len() >= 4).then(|| "open() with more than three positional arguments".to_string())
}

fn print_call(target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
    if cx.path.facts().has_future("print_function") {
        return None;
    }
    let Target::Expr(e) = target else {
        return None;
    };
    is_name_call(e, &["print"]).map(|_| "print() as a function".to_string())
}

fn true_division(target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
    if cx.path.facts().has_future("division") {
        return None;
    }
    let is_div = matches!(
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
    );
    is_div.then(|| "true division".to_string())
}

fn async_syntax(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let what = match target {
        Target::Stmt(stmt) => match &stmt.kind {
            StmtKind::FunctionDef(def) if def.is_async => "'async def'",
            StmtKind::For { is_async: true, .. } => "'async for'",
            StmtKind::With { is_async: true, .. } => "'async with'",
            _ => return None,
        },
        Target::Expr(e) => match &e.kind {
            ExprKind::Await { .. } => "'await'",
            ExprKind::ListComp { generators, .. } | ExprKind::GeneratorExp { generators, .. }
                if generators.iter().any(|g| g.is_async) =>
            {
                "asynchronous comprehension"
            }
            _ => return None,
        },
    };
    Some(what.to_string())
}

fn yield_from(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    matches!(expr_kind(target), Some(ExprKind::YieldFrom { .. })).then(|| "'yield from'".to_string())
}

fn matmul(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    let found = matches!(
        expr_kind(target),
        Some(ExprKind::BinOp {
            op: BinOpKind::MatMult,
            ..
        })
    ) || matches!(
        stmt_kind(target),
        Some(StmtKind::AugAssign {
            op: BinOpKind::MatMult,
            ..
        })
    );
    found.then(|| "matrix multiplication operator".to_string())
}

fn nonlocal(target: Target<'_>, _cx: &RuleCtx<'_>) -> Option<String> {
    match stmt_kind(target) {
        Some(StmtKind::Nonlocal { names }) => Some(format!("'nonlocal {}'", names.join(", "))),
        _ => None,
    }
}

fn starred_assignment(target: Target<'_>, cx: &RuleCtx<'_>) -> Option<String> {
    if !cx.path.in_target() {
        return None;
    }
    match expr_kind(target)? {
        ExprKind::Tuple { elts } | ExprKind::List { elts }
            if elts.iter().any(|e| matches!(e.kind, ExprKind::Starred { .. })) =>
        {
            Some("starred assignment target".to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ImportPolicy;
    use crate::path::{Frame, ModuleFacts, NodePath};
    use retrofit_types::VersionRange;
    use retrofit_types::syntax::build::*;

    fn rule(id: &str) -> Box<dyn Rule> {
        shape_rules()
            .into_iter()
            .find(|r| r.meta().id == id)
            .expect(id)
    }

    fn check(id: &str, target: Target<'_>, path: &NodePath) -> Option<String> {
        let cx = RuleCtx {
            range: VersionRange::from_floor(Version::new(2, 7)),
            path,
            policy: &ImportPolicy::Lenient,
        };
        rule(id).check(target, &cx)
    }

    #[test]
    fn forward_reference_to_enclosing_class() {
        let mut args = params(&["self"]);
        args.args.push(arg_ann("other", name("Node")));
        let method = func("link", args, vec![pass()]).at(3, 4);

        let mut path = NodePath::new(ModuleFacts::default());
        assert_eq!(check("annotations.postponed", Target::Stmt(&method), &path), None);

        path.push(Frame::Class {
            name: "Node".to_string(),
        });
        assert_eq!(
            check("annotations.postponed", Target::Stmt(&method), &path).as_deref(),
            Some("forward reference to 'Node' in an annotation")
        );
    }

    #[test]
    fn reference_to_an_earlier_module_class_is_bound() {
        let mut facts = ModuleFacts::default();
        facts.classes.insert("Early".to_string(), 1);
        facts.classes.insert("Late".to_string(), 20);
        let path = NodePath::new(facts);

        let early = ann_assign(name("x"), name("Early"), None).at(10, 0);
        assert_eq!(check("annotations.postponed", Target::Stmt(&early), &path), None);

        let late = ann_assign(name("x"), subscript(name("List"), name("Late")), None).at(10, 0);
        assert!(check("annotations.postponed", Target::Stmt(&late), &path).is_some());

        let quoted = ann_assign(name("x"), string("Late"), None).at(10, 0);
        assert_eq!(check("annotations.postponed", Target::Stmt(&quoted), &path), None);
    }

    #[test]
    fn starred_only_counts_in_assignment_targets() {
        let target = tuple(vec![name("a"), starred(name("rest"))]);
        let plain = NodePath::default();
        assert_eq!(check("syntax.starred_assignment", Target::Expr(&target), &plain), None);

        let mut in_target = NodePath::default();
        in_target.push(Frame::Target);
        assert!(check("syntax.starred_assignment", Target::Expr(&target), &in_target).is_some());
        assert_eq!(
            check("syntax.unpacking_generalizations", Target::Expr(&target), &in_target),
            None
        );
    }

    #[test]
    fn division_is_allowed_under_the_future_import() {
        let div = binop(name("a"), BinOpKind::Div, name("b"));
        assert!(check("future.division", Target::Expr(&div), &NodePath::default()).is_some());

        let mut facts = ModuleFacts::default();
        facts.futures.insert("division".to_string());
        assert_eq!(
            check("future.division", Target::Expr(&div), &NodePath::new(facts)),
            None
        );
    }

    #[test]
    fn str_literal_needs_unicode_literals() {
        let lit = string("text");
        assert_eq!(
            check("future.unicode_literals", Target::Expr(&lit), &NodePath::default()).as_deref(),
            Some("str literal without the unicode_literals future")
        );

        let mut facts = ModuleFacts::default();
        facts.futures.insert("unicode_literals".to_string());
        assert_eq!(
            check("future.unicode_literals", Target::Expr(&lit), &NodePath::new(facts)),
            None
        );
    }

    #[test]
    fn open_reports_the_offending_keyword() {
        let e = call_kw(name("open"), vec![name("p")], vec![kw("newline", string(""))]);
        assert_eq!(
            check("builtins.open_encoding", Target::Expr(&e), &NodePath::default()).as_deref(),
            Some("open() with 'newline'")
        );
    }

    #[test]
    fn message_names_version_and_floor() {
        let r = rule("syntax.yield_from");
        let message = r.message(
            "'yield from'".to_string(),
            VersionRange::from_floor(Version::new(2, 7)),
        );
        assert_eq!(message, "'yield from' requires 3.3, target floor is 2.7");
    }
}
