use super::{FixCtx, Fixer, FixerMeta, Rewrite, Shim, Target, is_name_call};
use crate::error::FixError;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Expr, ExprKind};

const LAZY: &[(&str, &str)] = &[("map", "imap"), ("zip", "izip"), ("filter", "ifilter")];

fn lazy_name(builtin: &str) -> Option<&'static str> {
    LAZY.iter()
        .find(|(name, _)| *name == builtin)
        .map(|(_, lazy)| *lazy)
}

/// `try: from itertools import imap` with the builtin as fallback on Python 3.
fn lazy_shim(builtin: &str, lazy: &str) -> Shim {
    Shim::guarded_import(
        &format!("itertools.{lazy}"),
        try_except(
            vec![import_from("itertools", &[lazy])],
            name("ImportError"),
            vec![assign(name(lazy), name(builtin))],
        ),
    )
}

fn with_func(call_expr: &Expr, func: Expr) -> Expr {
    let mut out = call_expr.clone();
    if let ExprKind::Call { func: f, .. } = &mut out.kind {
        **f = func.located(call_expr.loc);
    }
    out
}

/// `map`/`zip`/`filter` return iterators; use the itertools variants before 3.0.
pub struct LazyIteratorsFixer;

impl LazyIteratorsFixer {
    const FIX_ID: &'static str = "builtins.lazy_iterators";
}

impl Fixer for LazyIteratorsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Keeps map, zip and filter lazy by using the itertools variants",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(target, Target::Expr(e) if is_name_call(e, &["map", "zip", "filter"]).is_some())
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Expr(e) = target else {
            return Err(FixError::new("expected a call"));
        };
        let Some((builtin, lazy)) = is_name_call(e, &["map", "zip", "filter"])
            .and_then(|b| lazy_name(b).map(|lazy| (b, lazy)))
        else {
            return Err(FixError::new("expected a call to map, zip or filter"));
        };
        Ok(Rewrite::expr(with_func(e, name(lazy))).with_shim(lazy_shim(builtin, lazy)))
    }
}

pub(crate) const OPEN_PY3_KEYWORDS: &[&str] = &["encoding", "errors", "newline", "closefd", "opener"];

/// `open(path, encoding=...)` → `io.open(path, encoding=...)`.
pub struct OpenEncodingFixer;

impl OpenEncodingFixer {
    const FIX_ID: &'static str = "builtins.open_encoding";
}

impl Fixer for OpenEncodingFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Routes open() calls with text-mode arguments through io.open",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        let Target::Expr(e) = target else {
            return false;
        };
        if is_name_call(e, &["open"]).is_none() {
            return false;
        }
        match &e.kind {
            ExprKind::Call { args, keywords, .. } => {
                args.len() >= 4
                    || keywords
                        .iter()
                        .filter_map(|k| k.arg.as_deref())
                        .any(|k| OPEN_PY3_KEYWORDS.contains(&k))
            }
            _ => false,
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Expr(e) = target else {
            return Err(FixError::new("expected a call"));
        };
        let func = attr(name("io").located(e.loc), "open");
        Ok(Rewrite::expr(with_func(e, func)).with_shim(Shim::import("io")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::testing::*;
    use crate::path::NodePath;
    use pretty_assertions::assert_eq;

    #[test]
    fn map_becomes_imap_with_guarded_shim() {
        let e = call(name("map"), vec![name("str"), name("xs")]);
        let rw = rewrite_expr(&LazyIteratorsFixer, &e, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "imap(str, xs)");
        assert_eq!(rw.shims.len(), 1);
        assert_eq!(rw.shims[0].id, "itertools.imap");
        assert_eq!(
            retrofit_render::render_stmt(&rw.shims[0].stmts[0]),
            "try:\n    from itertools import imap\nexcept ImportError:\n    imap = map\n"
        );
    }

    #[test]
    fn attribute_calls_are_not_builtins() {
        let e = call(attr(name("pool"), "map"), vec![name("f"), name("xs")]);
        assert!(rewrite_expr(&LazyIteratorsFixer, &e, range(2, 7), &NodePath::default()).is_none());
    }

    #[test]
    fn open_with_encoding_uses_io_open() {
        let e = call_kw(
            name("open"),
            vec![name("path")],
            vec![kw("encoding", string("utf-8"))],
        );
        let rw = rewrite_expr(&OpenEncodingFixer, &e, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "io.open(path, encoding=\"utf-8\")");
        assert_eq!(rw.shims, vec![Shim::import("io")]);
    }

    #[test]
    fn plain_open_is_left_alone() {
        let e = call(name("open"), vec![name("path"), string("rb")]);
        assert!(rewrite_expr(&OpenEncodingFixer, &e, range(2, 7), &NodePath::default()).is_none());
    }
}
