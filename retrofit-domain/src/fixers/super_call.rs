use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target};
use crate::error::FixError;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::ExprKind;

/// `super()` → `super(Class, self)` inside a method.
pub struct SuperNoArgsFixer;

impl SuperNoArgsFixer {
    const FIX_ID: &'static str = "syntax.super_no_args";
}

impl Fixer for SuperNoArgsFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: Self::FIX_ID,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Spells out the arguments of zero-argument super() calls",
        }
    }

    fn matches(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> bool {
        matches!(
            target,
            Target::Expr(e) if matches!(
                &e.kind,
                ExprKind::Call { func, args, keywords }
                    if func.as_name() == Some("super") && args.is_empty() && keywords.is_empty()
            )
        )
    }

    fn rewrite(&self, target: Target<'_>, cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let loc = target.loc();
        let Some((class, first_param)) = cx.path.enclosing_method() else {
            return Err(FixError::at("super() outside of a method body", loc));
        };
        let Some(first_param) = first_param else {
            return Err(FixError::at(
                format!("super() in a method of '{class}' that takes no parameters"),
                loc,
            ));
        };
        let out = call(
            name("super").located(loc),
            vec![name(class).located(loc), name(first_param).located(loc)],
        )
        .located(loc);
        Ok(Rewrite::expr(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixers::testing::*;
    use crate::path::{Frame, ModuleFacts};
    use pretty_assertions::assert_eq;

    fn method_path(first_param: Option<&str>, extra: Vec<Frame>) -> crate::path::NodePath {
        let mut frames = vec![
            Frame::Class {
                name: "Child".to_string(),
            },
            Frame::Function {
                name: "__init__".to_string(),
                first_param: first_param.map(str::to_string),
            },
        ];
        frames.extend(extra);
        path_with(frames, ModuleFacts::default())
    }

    #[test]
    fn super_gets_class_and_first_parameter() {
        let e = call(name("super"), vec![]);
        let rw = rewrite_expr(&SuperNoArgsFixer, &e, range(2, 7), &method_path(Some("self"), vec![]))
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "super(Child, self)");
    }

    #[test]
    fn lambda_inside_method_still_resolves() {
        let e = call(name("super"), vec![]);
        let path = method_path(Some("cls"), vec![Frame::Lambda]);
        let rw = rewrite_expr(&SuperNoArgsFixer, &e, range(2, 7), &path)
            .expect("match")
            .expect("rewrite");
        assert_eq!(render(&rw), "super(Child, cls)");
    }

    #[test]
    fn super_outside_method_or_without_params_is_fix_error() {
        let e = call(name("super"), vec![]).at(7, 8);
        let top = path_with(vec![], ModuleFacts::default());
        let err = rewrite_expr(&SuperNoArgsFixer, &e, range(2, 7), &top)
            .expect("match")
            .unwrap_err();
        assert!(err.message.contains("outside of a method"));

        let err = rewrite_expr(&SuperNoArgsFixer, &e, range(2, 7), &method_path(None, vec![]))
            .expect("match")
            .unwrap_err();
        assert!(err.message.contains("'Child'"));
    }

    #[test]
    fn explicit_super_arguments_do_not_match() {
        let e = call(name("super"), vec![name("A"), name("self")]);
        assert!(
            rewrite_expr(&SuperNoArgsFixer, &e, range(2, 7), &method_path(Some("self"), vec![]))
                .is_none()
        );
    }
}
