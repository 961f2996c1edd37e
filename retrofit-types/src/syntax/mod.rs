//! Closed syntax tree consumed and produced by the fixer pipeline.
//!
//! Every node exclusively owns its children. There are no parent pointers: code that needs
//! ancestor context computes it while walking.
//!
//! The serde shape is `{"type": "<snake_case kind>", "loc": {...}, ...fields}` so an external
//! parser can emit trees as JSON.

pub mod build;

use serde::{Deserialize, Serialize};

/// Source position as reported by the parser: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Loc {
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Leading comment lines (shebang, coding declaration, license banner), without newlines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<String>,

    #[serde(default)]
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            header: Vec::new(),
            body,
        }
    }

    /// Names imported by the leading `from __future__ import ...` block.
    pub fn future_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for stmt in self.body.iter().skip(docstring_len(&self.body)) {
            match &stmt.kind {
                StmtKind::ImportFrom {
                    module: Some(module),
                    names,
                    level: 0,
                } if module == "__future__" => {
                    out.extend(names.iter().map(|a| a.name.as_str()));
                }
                _ => break,
            }
        }
        out
    }
}

/// 1 when the suite starts with a docstring, 0 otherwise.
pub fn docstring_len(body: &[Stmt]) -> usize {
    match body.first() {
        Some(stmt) if stmt.is_docstring() => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub loc: Loc,
    #[serde(flatten)]
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: Loc) -> Self {
        Self { loc, kind }
    }

    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.loc = Loc::new(line, col);
        self
    }

    pub fn is_docstring(&self) -> bool {
        matches!(
            &self.kind,
            StmtKind::Expr { value } if matches!(value.kind, ExprKind::Constant { value: Constant::Str(_) })
        )
    }

    pub fn is_future_import(&self) -> bool {
        matches!(
            &self.kind,
            StmtKind::ImportFrom { module: Some(m), level: 0, .. } if m == "__future__"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StmtKind {
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        #[serde(default)]
        level: u32,
    },
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return {
        value: Option<Expr>,
    },
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
    },
    AugAssign {
        target: Expr,
        op: BinOpKind,
        value: Expr,
    },
    Expr {
        value: Expr,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
        #[serde(default)]
        is_async: bool,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        #[serde(default)]
        is_async: bool,
    },
    Try {
        body: Vec<Stmt>,
        #[serde(default)]
        handlers: Vec<ExceptHandler>,
        #[serde(default)]
        orelse: Vec<Stmt>,
        #[serde(default)]
        finalbody: Vec<Stmt>,
    },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    Delete {
        targets: Vec<Expr>,
    },
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub args: Arguments,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub decorators: Vec<Expr>,
    pub returns: Option<Box<Expr>>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub bases: Vec<Expr>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub decorators: Vec<Expr>,
}

/// Parameter list of a function or lambda.
///
/// `defaults` align with the tail of `posonly ++ args`; `kw_defaults` align one-to-one with
/// `kwonly` (`None` = required).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub posonly: Vec<Arg>,
    #[serde(default)]
    pub args: Vec<Arg>,
    pub vararg: Option<Arg>,
    #[serde(default)]
    pub kwonly: Vec<Arg>,
    #[serde(default)]
    pub kw_defaults: Vec<Option<Expr>>,
    pub kwarg: Option<Arg>,
    #[serde(default)]
    pub defaults: Vec<Expr>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.posonly.is_empty()
            && self.args.is_empty()
            && self.vararg.is_none()
            && self.kwonly.is_empty()
            && self.kwarg.is_none()
    }

    /// Name of the first positional parameter (`self`/`cls` in methods).
    pub fn first_positional(&self) -> Option<&str> {
        self.posonly
            .first()
            .or_else(|| self.args.first())
            .map(|a| a.name.as_str())
    }

    pub fn all_args(&self) -> impl Iterator<Item = &Arg> {
        self.posonly
            .iter()
            .chain(self.args.iter())
            .chain(self.vararg.iter())
            .chain(self.kwonly.iter())
            .chain(self.kwarg.iter())
    }

    pub fn all_args_mut(&mut self) -> impl Iterator<Item = &mut Arg> {
        self.posonly
            .iter_mut()
            .chain(self.args.iter_mut())
            .chain(self.vararg.iter_mut())
            .chain(self.kwonly.iter_mut())
            .chain(self.kwarg.iter_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    pub annotation: Option<Expr>,
}

/// Call/class keyword argument. `arg: None` is a `**mapping` unpacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithItem {
    pub context: Expr,
    pub vars: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptHandler {
    #[serde(default)]
    pub loc: Loc,
    pub exc_type: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

impl ExceptHandler {
    /// True when the handler catches `ImportError` (alone, in a tuple, or bare `except:`).
    pub fn catches_import_error(&self) -> bool {
        fn is_import_error(e: &Expr) -> bool {
            match &e.kind {
                ExprKind::Name { id } => {
                    id == "ImportError" || id == "ModuleNotFoundError" || id == "Exception"
                }
                ExprKind::Tuple { elts } => elts.iter().any(is_import_error),
                _ => false,
            }
        }
        self.exc_type.as_ref().is_none_or(is_import_error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    #[serde(default)]
    pub ifs: Vec<Expr>,
    #[serde(default)]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub loc: Loc,
    #[serde(flatten)]
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Loc) -> Self {
        Self { loc, kind }
    }

    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.loc = Loc::new(line, col);
        self
    }

    /// Sets `loc` if the node still carries the default location.
    pub fn located(mut self, loc: Loc) -> Self {
        if self.loc == Loc::default() {
            self.loc = loc;
        }
        self
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name { id } => Some(id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Constant {
                value: Constant::Str(s),
            } => Some(s),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Constant { .. })
    }

    /// Dotted name for `a`, `a.b`, `a.b.c`; `None` for anything else.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Name { id } => Some(id.clone()),
            ExprKind::Attribute { value, attr } => {
                value.dotted_name().map(|base| format!("{base}.{attr}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprKind {
    Name {
        id: String,
    },
    Constant {
        value: Constant,
    },
    /// Formatted string literal; `values` are `Constant::Str` and `FormattedValue` parts.
    JoinedStr {
        values: Vec<Expr>,
    },
    FormattedValue {
        value: Box<Expr>,
        conversion: Option<char>,
        format_spec: Option<Box<Expr>>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    /// `lower:upper:step`; only valid as (part of) a subscript.
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call {
        func: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default)]
        keywords: Vec<Keyword>,
    },
    Starred {
        value: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOpKind,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },
    BoolOp {
        op: BoolOpKind,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOpKind>,
        comparators: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        args: Box<Arguments>,
        body: Box<Expr>,
    },
    NamedExpr {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Await {
        value: Box<Expr>,
    },
    Yield {
        value: Option<Box<Expr>>,
    },
    YieldFrom {
        value: Box<Expr>,
    },
    List {
        elts: Vec<Expr>,
    },
    Tuple {
        elts: Vec<Expr>,
    },
    Set {
        elts: Vec<Expr>,
    },
    /// `keys[i] == None` marks `**values[i]`.
    Dict {
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constant {
    None,
    Bool(bool),
    /// Numeric literal, kept as its source text.
    Num(String),
    Str(String),
    Bytes(String),
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOpKind {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOpKind {
    Invert,
    Not,
    UAdd,
    USub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOpKind {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Is,
    IsNot,
    In,
    NotIn,
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn future_names_stop_at_first_regular_statement() {
        let module = module(vec![
            expr_stmt(string("doc")),
            import_from("__future__", &["annotations", "division"]),
            import("os"),
            import_from("__future__", &["print_function"]),
        ]);
        assert_eq!(module.future_names(), vec!["annotations", "division"]);
    }

    #[test]
    fn handler_recognizes_import_error_guards() {
        let handler = |exc_type: Option<Expr>| ExceptHandler {
            loc: Loc::default(),
            exc_type,
            name: None,
            body: vec![pass()],
        };
        assert!(handler(None).catches_import_error());
        assert!(handler(Some(name("ImportError"))).catches_import_error());
        assert!(
            handler(Some(tuple(vec![name("KeyError"), name("ImportError")])))
                .catches_import_error()
        );
        assert!(!handler(Some(name("KeyError"))).catches_import_error());
    }

    #[test]
    fn dotted_name_follows_attribute_chains() {
        assert_eq!(
            attr(attr(name("a"), "b"), "c").dotted_name().as_deref(),
            Some("a.b.c")
        );
        assert_eq!(call(name("f"), vec![]).dotted_name(), None);
    }
}
