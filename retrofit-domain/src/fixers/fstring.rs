use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target, expr_kind};
use crate::error::FixError;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Constant, Expr, ExprKind};

/// `str.format` template under construction, with explicit field indices.
#[derive(Default)]
struct Template {
    text: String,
    args: Vec<Expr>,
}

impl Template {
    fn literal(&mut self, s: &str) {
        for c in s.chars() {
            match c {
                '{' => self.text.push_str("{{"),
                '}' => self.text.push_str("}}"),
                c => self.text.push(c),
            }
        }
    }

    fn part(&mut self, part: &Expr, cx: &FixCtx<'_>) -> Result<(), FixError> {
        match &part.kind {
            ExprKind::Constant {
                value: Constant::Str(s),
            } => {
                self.literal(s);
                Ok(())
            }
            ExprKind::FormattedValue {
                value,
                conversion,
                format_spec,
            } => self.field(value, *conversion, format_spec.as_deref(), cx),
            _ => Err(FixError::at("unexpected part in formatted string", part.loc)),
        }
    }

    fn field(
        &mut self,
        value: &Expr,
        conversion: Option<char>,
        spec: Option<&Expr>,
        cx: &FixCtx<'_>,
    ) -> Result<(), FixError> {
        let index = self.args.len();
        self.args.push(value.clone());
        self.text.push_str(&format!("{{{index}"));
        if let Some(conversion) = conversion {
            if conversion == 'a' && cx.range.min() < Version::new(3, 0) {
                return Err(FixError::at(
                    "the !a conversion has no equivalent before 3.0",
                    value.loc,
                ));
            }
            self.text.push('!');
            self.text.push(conversion);
        }
        if let Some(spec) = spec {
            self.text.push(':');
            match &spec.kind {
                ExprKind::JoinedStr { values } => {
                    for part in values {
                        self.part(part, cx)?;
                    }
                }
                _ => self.part(spec, cx)?,
            }
        }
        self.text.push('}');
        Ok(())
    }
}

/// `f"{a!r:>{w}}"` → `"{0!r:>{1}}".format(a, w)`.
pub struct FStringFixer;

impl FStringFixer {
    const FIX_ID: &'static str = "syntax.fstring";
}

impl Fixer for FStringFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 6),
            depends_on: &[],
            description: "Rewrites formatted string literals (PEP 498) into str.format calls",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(expr_kind(target), Some(ExprKind::JoinedStr { .. }))
    }

    fn rewrite(&self, target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Expr(e) = target else {
            return Err(FixError::new("expected an expression"));
        };
        let ExprKind::JoinedStr { values } = &e.kind else {
            return Err(FixError::new("expected a formatted string"));
        };

        let has_fields = values
            .iter()
            .any(|v| matches!(v.kind, ExprKind::FormattedValue { .. }));
        if !has_fields {
            let text: String = values.iter().filter_map(Expr::as_str).collect();
            return Ok(Rewrite::expr(string(&text).located(e.loc)));
        }

        let mut template = Template::default();
        for part in values {
            template.part(part, cx)?;
        }
        let format = attr(string(&template.text).located(e.loc), "format").located(e.loc);
        Ok(Rewrite::expr(call(format, template.args).located(e.loc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::testing::*;
    use crate::path::NodePath;
    use pretty_assertions::assert_eq;
    use retrofit_types::syntax::Loc;

    #[test]
    fn fields_get_explicit_indices_and_braces_are_doubled() {
        let e = fstring(vec![
            string("Hello "),
            formatted(name("who"), Some('r'), Some(fstring(vec![string(">10")]))),
            string(" {x} "),
            formatted(
                name("v"),
                None,
                Some(fstring(vec![formatted(name("w"), None, None)])),
            ),
        ]);
        let rw = rewrite_expr(&FStringFixer, &e, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(
            render(&rw),
            "\"Hello {0!r:>10} {{x}} {1:{2}}\".format(who, v, w)"
        );
    }

    #[test]
    fn literal_only_fstring_becomes_plain_string() {
        let e = fstring(vec![string("plain {text}")]);
        let rw = rewrite_expr(&FStringFixer, &e, range(3, 5), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "\"plain {text}\"");
    }

    #[test]
    fn ascii_conversion_needs_python_3() {
        let e = fstring(vec![formatted(name("v").at(1, 4), Some('a'), None)]);
        let err = rewrite_expr(&FStringFixer, &e, range(2, 7), &NodePath::default())
            .expect("match")
            .unwrap_err();
        assert_eq!(err.loc, Some(Loc::new(1, 4)));

        assert!(
            rewrite_expr(&FStringFixer, &e, range(3, 4), &NodePath::default())
                .expect("match")
                .is_ok()
        );
    }
}
