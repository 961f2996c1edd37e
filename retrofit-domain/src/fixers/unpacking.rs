use super::{FixCtx, Fixer, FixerMeta, Rewrite, Shim, Target};
use crate::error::FixError;
use crate::walk::relocate_expr;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Arguments, BinOpKind, Expr, ExprKind, Keyword};

const MERGE_DICTS: &str = "_retrofit_merge_dicts";

fn merge_dicts_shim() -> Shim {
    let args = Arguments {
        vararg: Some(arg("dicts")),
        ..Arguments::default()
    };
    Shim::helper(
        "helper.merge_dicts",
        vec![func(
            MERGE_DICTS,
            args,
            vec![
                assign(name("result"), dict(vec![])),
                for_(
                    name("d"),
                    name("dicts"),
                    vec![expr_stmt(call(attr(name("result"), "update"), vec![name("d")]))],
                ),
                ret(Some(name("result"))),
            ],
        )],
    )
}

fn is_starred(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Starred { .. })
}

pub(crate) fn needs_positional_fix(args: &[Expr]) -> bool {
    let Some(first) = args.iter().position(is_starred) else {
        return false;
    };
    args.len() - first > 1
}

pub(crate) fn needs_keyword_fix(keywords: &[Keyword]) -> bool {
    let Some(first) = keywords.iter().position(|k| k.arg.is_none()) else {
        return false;
    };
    keywords.len() - first > 1
}

/// `1, *a, 2` → `[1] + list(a) + [2]`.
fn concat(elts: &[Expr]) -> Expr {
    let mut segments = Vec::new();
    let mut pending = Vec::new();
    for e in elts {
        match &e.kind {
            ExprKind::Starred { value } => {
                if !pending.is_empty() {
                    segments.push(list(std::mem::take(&mut pending)));
                }
                segments.push(call(name("list"), vec![(**value).clone()]));
            }
            _ => pending.push(e.clone()),
        }
    }
    if !pending.is_empty() {
        segments.push(list(pending));
    }
    segments
        .into_iter()
        .reduce(|acc, seg| binop(acc, BinOpKind::Add, seg))
        .unwrap_or_else(|| list(vec![]))
}

/// Consecutive keyed entries become dict displays; each unkeyed entry is a
/// mapping passed as is.
fn merge_call(entries: Vec<(Option<Expr>, Expr)>) -> Expr {
    let mut parts = Vec::new();
    let mut pending = Vec::new();
    for (key, value) in entries {
        match key {
            Some(key) => pending.push((Some(key), value)),
            None => {
                if !pending.is_empty() {
                    parts.push(dict(std::mem::take(&mut pending)));
                }
                parts.push(value);
            }
        }
    }
    if !pending.is_empty() {
        parts.push(dict(pending));
    }
    call(name(MERGE_DICTS), parts)
}

/// Generalized unpacking (PEP 448): several `*`/`**` in one call, and
/// starred items in displays.
pub struct UnpackingFixer;

impl UnpackingFixer {
    const FIX_ID: &'static str = "syntax.unpacking_generalizations";
}

impl Fixer for UnpackingFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 5),
            depends_on: &[],
            description: "Rewrites additional unpacking generalizations (PEP 448)",
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        let Target::Expr(e) = target else {
            return false;
        };
        match &e.kind {
            ExprKind::Call { args, keywords, .. } => {
                needs_positional_fix(args) || needs_keyword_fix(keywords)
            }
            ExprKind::List { elts } | ExprKind::Tuple { elts } | ExprKind::Set { elts } => {
                !cx.path.in_target() && elts.iter().any(is_starred)
            }
            ExprKind::Dict { keys, .. } => keys.iter().any(Option::is_none),
            _ => false,
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Expr(e) = target else {
            return Err(FixError::new("expected an expression"));
        };
        let mut shim = None;
        let mut out = match &e.kind {
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let args = if needs_positional_fix(args) {
                    let first = args.iter().position(is_starred).unwrap_or(args.len());
                    let mut head = args[..first].to_vec();
                    head.push(starred(concat(&args[first..])));
                    head
                } else {
                    args.clone()
                };
                let keywords = if needs_keyword_fix(keywords) {
                    let first = keywords
                        .iter()
                        .position(|k| k.arg.is_none())
                        .unwrap_or(keywords.len());
                    let mut head = keywords[..first].to_vec();
                    let entries = keywords[first..]
                        .iter()
                        .map(|k| (k.arg.as_deref().map(string), k.value.clone()))
                        .collect();
                    head.push(kw_unpack(merge_call(entries)));
                    shim = Some(merge_dicts_shim());
                    head
                } else {
                    keywords.clone()
                };
                call_kw((**func).clone(), args, keywords)
            }
            ExprKind::List { elts } => concat(elts),
            ExprKind::Tuple { elts } => call(name("tuple"), vec![concat(elts)]),
            ExprKind::Set { elts } => call(name("set"), vec![concat(elts)]),
            ExprKind::Dict { keys, values } => {
                shim = Some(merge_dicts_shim());
                merge_call(keys.iter().cloned().zip(values.iter().cloned()).collect())
            }
            _ => return Err(FixError::new("expected a call or a display")),
        };
        relocate_expr(&mut out, e.loc);
        let rewrite = Rewrite::expr(out);
        Ok(match shim {
            Some(shim) => rewrite.with_shim(shim),
            None => rewrite,
        })
    }
}
