use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target, body_start, stmt_kind};
use crate::error::FixError;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::StmtKind;

/// `class A(metaclass=M)` → `class A: __metaclass__ = M`.
pub struct MetaclassKeywordFixer;

impl MetaclassKeywordFixer {
    const FIX_ID: &'static str = "classes.metaclass_keyword";
}

impl Fixer for MetaclassKeywordFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Moves the metaclass keyword into a __metaclass__ class attribute",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(stmt_kind(target), Some(StmtKind::ClassDef(def)) if !def.keywords.is_empty())
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected a class definition"));
        };
        let mut out = stmt.clone();
        let StmtKind::ClassDef(def) = &mut out.kind else {
            return Err(FixError::new("expected a class definition"));
        };

        let keywords = std::mem::take(&mut def.keywords);
        let mut metaclass = None;
        for k in keywords {
            match k.arg.as_deref() {
                Some("metaclass") => metaclass = Some(k.value),
                Some(other) => {
                    return Err(FixError::at(
                        format!("class keyword '{other}' has no equivalent before 3.0"),
                        k.value.loc,
                    ));
                }
                None => {
                    return Err(FixError::at(
                        "class keyword unpacking has no equivalent before 3.0",
                        k.value.loc,
                    ));
                }
            }
        }
        if let Some(metaclass) = metaclass {
            let mut declaration = assign(name("__metaclass__").located(metaclass.loc), metaclass);
            declaration.loc = stmt.loc;
            let at = body_start(&def.body);
            def.body.insert(at, declaration);
            def.body.retain(|s| !matches!(s.kind, StmtKind::Pass));
        }
        Ok(Rewrite::stmt(out))
    }
}

/// Classes without bases inherit from `object` explicitly.
pub struct NewStyleClassFixer;

impl NewStyleClassFixer {
    const FIX_ID: &'static str = "classes.new_style";
}

impl Fixer for NewStyleClassFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &["classes.metaclass_keyword"],
            description: "Adds an explicit object base to classes without bases",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(stmt_kind(target), Some(StmtKind::ClassDef(def)) if def.bases.is_empty())
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected a class definition"));
        };
        let mut out = stmt.clone();
        if let StmtKind::ClassDef(def) = &mut out.kind {
            def.bases.push(name("object").located(stmt.loc));
        }
        Ok(Rewrite::stmt(out))
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
    fn metaclass_keyword_becomes_class_attribute_after_docstring() {
        let stmt = class_kw(
            "A",
            vec![name("Base")],
            vec![kw("metaclass", name("Meta"))],
            vec![expr_stmt(string("doc")), pass()],
        );
        let rw = rewrite_stmt(&MetaclassKeywordFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(
            render(&rw),
            "class A(Base):\n    \"doc\"\n    __metaclass__ = Meta\n"
        );
    }

    #[test]
    fn other_class_keywords_are_fix_errors() {
        let stmt = class_kw(
            "A",
            vec![],
            vec![kw("metaclass", name("Meta")), kw("total", boolean(false).at(3, 30))],
            vec![pass()],
        );
        let err = rewrite_stmt(&MetaclassKeywordFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .unwrap_err();
        assert_eq!(err.loc, Some(Loc::new(3, 30)));
        assert!(err.message.contains("'total'"));
    }

    #[test]
    fn bare_class_gets_object_base() {
        let stmt = class("A", vec![], vec![pass()]);
        let rw = rewrite_stmt(&NewStyleClassFixer, &stmt, range(2, 7), &NodePath::default())
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "class A(object):\n    pass\n");

        let derived = class("B", vec![name("A")], vec![pass()]);
        assert!(
            rewrite_stmt(&NewStyleClassFixer, &derived, range(2, 7), &NodePath::default())
                .is_none()
        );
    }
}
