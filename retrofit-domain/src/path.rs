//! Transient ancestor context.
//!
//! Nodes never store their parent. Walkers push a [`Frame`] when they descend into
//! a scope-like construct and pop it on the way out, so fixers and rules can ask
//! "which class encloses this method?" without back-references in the tree.

use retrofit_types::syntax::{Module, StmtKind};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Class {
        name: String,
    },
    Function {
        name: String,
        first_param: Option<String>,
    },
    Lambda,
    Comprehension,
    /// Body of a `try` whose handlers catch `ImportError`.
    ImportGuard,
    /// Assignment, loop or `with` target position.
    Target,
}

/// Module-wide facts, snapshotted once per pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFacts {
    /// Names imported from `__future__` in the leading block.
    pub futures: BTreeSet<String>,
    /// Module-level class definitions and the line each starts on.
    pub classes: BTreeMap<String, u32>,
}

impl ModuleFacts {
    pub fn scan(module: &Module) -> Self {
        let futures = module
            .future_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut classes = BTreeMap::new();
        for stmt in &module.body {
            if let StmtKind::ClassDef(def) = &stmt.kind {
                classes.entry(def.name.clone()).or_insert(stmt.loc.line);
            }
        }
        Self { futures, classes }
    }

    pub fn has_future(&self, name: &str) -> bool {
        self.futures.contains(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Module,
    Class,
    Function,
}

#[derive(Debug, Clone, Default)]
pub struct NodePath {
    frames: Vec<Frame>,
    facts: ModuleFacts,
}

impl NodePath {
    pub fn new(facts: ModuleFacts) -> Self {
        Self {
            frames: Vec::new(),
            facts,
        }
    }

    pub fn facts(&self) -> &ModuleFacts {
        &self.facts
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn is_module_level(&self) -> bool {
        self.scope() == Scope::Module
    }

    /// Innermost named scope; lambdas and comprehensions count as functions.
    pub fn scope(&self) -> Scope {
        for frame in self.frames.iter().rev() {
            match frame {
                Frame::Class { .. } => return Scope::Class,
                Frame::Function { .. } | Frame::Lambda | Frame::Comprehension => {
                    return Scope::Function;
                }
                Frame::ImportGuard | Frame::Target => {}
            }
        }
        Scope::Module
    }

    pub fn in_import_guard(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::ImportGuard))
    }

    pub fn in_target(&self) -> bool {
        matches!(self.frames.last(), Some(Frame::Target))
    }

    /// Names of all enclosing classes, innermost last.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.frames.iter().filter_map(|f| match f {
            Frame::Class { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// `(class name, first parameter)` of the method whose body encloses the
    /// current node. Lambdas and comprehensions are looked through; a nested
    /// function is not a method.
    pub fn enclosing_method(&self) -> Option<(&str, Option<&str>)> {
        let mut frames = self.frames.iter().rev().filter(|f| {
            !matches!(
                f,
                Frame::Lambda | Frame::Comprehension | Frame::ImportGuard | Frame::Target
            )
        });
        let Some(Frame::Function { first_param, .. }) = frames.next() else {
            return None;
        };
        match frames.next() {
            Some(Frame::Class { name }) => Some((name.as_str(), first_param.as_deref())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_types::syntax::build::*;

    fn class_frame(name: &str) -> Frame {
        Frame::Class {
            name: name.to_string(),
        }
    }

    fn fn_frame(name: &str, first: Option<&str>) -> Frame {
        Frame::Function {
            name: name.to_string(),
            first_param: first.map(str::to_string),
        }
    }

    #[test]
    fn enclosing_method_requires_class_parent() {
        let mut path = NodePath::default();
        path.push(class_frame("A"));
        path.push(fn_frame("m", Some("self")));
        path.push(Frame::Lambda);
        assert_eq!(path.enclosing_method(), Some(("A", Some("self"))));

        path.pop();
        path.push(fn_frame("inner", None));
        assert_eq!(path.enclosing_method(), None);
    }

    #[test]
    fn scope_skips_guards_and_targets() {
        let mut path = NodePath::default();
        assert!(path.is_module_level());
        path.push(Frame::ImportGuard);
        assert!(path.is_module_level());
        assert!(path.in_import_guard());
        path.push(class_frame("A"));
        assert_eq!(path.scope(), Scope::Class);
        path.push(fn_frame("f", None));
        path.push(Frame::Target);
        assert_eq!(path.scope(), Scope::Function);
        assert!(path.in_target());
    }

    #[test]
    fn facts_record_futures_and_module_classes() {
        let m = module(vec![
            import_from("__future__", &["annotations"]).at(1, 0),
            class("A", vec![], vec![class("Inner", vec![], vec![pass()])]).at(3, 0),
            class("B", vec![], vec![pass()]).at(7, 0),
        ]);
        let facts = ModuleFacts::scan(&m);
        assert!(facts.has_future("annotations"));
        assert_eq!(facts.classes.get("A"), Some(&3));
        assert_eq!(facts.classes.get("B"), Some(&7));
        assert!(!facts.classes.contains_key("Inner"));
    }
}
