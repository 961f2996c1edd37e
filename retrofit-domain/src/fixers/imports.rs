use super::{FixCtx, Fixer, FixerMeta, Rewrite, Target};
use crate::error::FixError;
use crate::walk::relocate_stmt;
use retrofit_types::Version;
use retrofit_types::syntax::build::*;
use retrofit_types::syntax::{Alias, Stmt, StmtKind};

/// A standard library module that Python 3 renamed.
#[derive(Debug)]
pub(crate) struct RenamedModule {
    pub id: &'static str,
    pub new: &'static str,
    pub old: &'static str,
}

pub(crate) static RENAMED_MODULES: &[RenamedModule] = &[
    RenamedModule {
        id: "imports.queue",
        new: "queue",
        old: "Queue",
    },
    RenamedModule {
        id: "imports.configparser",
        new: "configparser",
        old: "ConfigParser",
    },
    RenamedModule {
        id: "imports.copyreg",
        new: "copyreg",
        old: "copy_reg",
    },
    RenamedModule {
        id: "imports.socketserver",
        new: "socketserver",
        old: "SocketServer",
    },
    RenamedModule {
        id: "imports.reprlib",
        new: "reprlib",
        old: "repr",
    },
    RenamedModule {
        id: "imports.thread",
        new: "_thread",
        old: "thread",
    },
    RenamedModule {
        id: "imports.winreg",
        new: "winreg",
        old: "_winreg",
    },
    RenamedModule {
        id: "imports.builtins",
        new: "builtins",
        old: "__builtin__",
    },
];

/// Wraps imports of a renamed module in `try: ... except ImportError:` with the
/// old name as fallback.
pub(crate) struct RenamedModuleFixer(pub &'static RenamedModule);

impl RenamedModuleFixer {
    fn imports_new(&self, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Import { names } => names.iter().any(|a| a.name == self.0.new),
            StmtKind::ImportFrom {
                module: Some(module),
                level: 0,
                ..
            } => module == self.0.new,
            _ => false,
        }
    }

    fn guarded(&self, primary: Stmt, fallback: Stmt) -> Stmt {
        try_except(vec![primary], name("ImportError"), vec![fallback])
    }
}

impl Fixer for RenamedModuleFixer {
    fn meta(&self) -> FixerMeta {
        FixerMeta {
            id: self.0.id,
            introduced: Version::new(3, 0),
            depends_on: &[],
            description: "Falls back to the Python 2 name of a renamed standard library module",
        }
    }

    fn matches(&self, target: Target<'_>, cx: &FixCtx<'_>) -> bool {
        match target {
            Target::Stmt(stmt) => !cx.path.in_import_guard() && self.imports_new(stmt),
            Target::Expr(_) => false,
        }
    }

    fn rewrite(&self, target: Target<'_>, _cx: &FixCtx<'_>) -> Result<Rewrite, FixError> {
        let Target::Stmt(stmt) = target else {
            return Err(FixError::new("expected an import statement"));
        };
        let RenamedModule { new, old, .. } = *self.0;

        let mut out = match &stmt.kind {
            StmtKind::Import { names } => {
                let (renamed, others): (Vec<&Alias>, Vec<&Alias>) =
                    names.iter().partition(|a| a.name == new);
                let mut out = Vec::new();
                if !others.is_empty() {
                    out.push(Stmt::new(
                        StmtKind::Import {
                            names: others.into_iter().cloned().collect(),
                        },
                        stmt.loc,
                    ));
                }
                for alias in renamed {
                    let bound = alias.asname.as_deref().unwrap_or(new);
                    let primary = match &alias.asname {
                        Some(asname) => import_as(new, asname),
                        None => import(new),
                    };
                    out.push(self.guarded(primary, import_as(old, bound)));
                }
                out
            }
            StmtKind::ImportFrom { names, .. } => {
                let fallback = Stmt::new(
                    StmtKind::ImportFrom {
                        module: Some(old.to_string()),
                        names: names.clone(),
                        level: 0,
                    },
                    stmt.loc,
                );
                vec![self.guarded(stmt.clone(), fallback)]
            }
            _ => return Err(FixError::new("expected an import statement")),
        };
        for s in &mut out {
            relocate_stmt(s, stmt.loc);
        }
        Ok(Rewrite::stmts(out))
    }
}
