//! Descriptor syntax tree.
//!
//! A build file is a sequence of statement nodes. Every node carries its source
//! span and the comments attached to it by the parser, which the merge layer must
//! carry through untouched. Keep markers (`# keep`, `# keep: reason`) are
//! recognised when a comment is created, so nothing downstream has to look at
//! comment text again.

use serde::Serialize;

pub mod parser;
pub mod printer;

pub use parser::parse;
pub use printer::{format_file, format_node};

// ============================================================================
// SPANS AND COMMENTS
// ============================================================================

/// Byte range of a node in its source file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A single `#` comment, including the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub text: String,
    keep: bool,
    opening: bool,
}

impl Comment {
    /// Creates a comment, adding the `# ` prefix when `text` lacks one.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.starts_with('#') {
            text.trim_end().to_string()
        } else {
            format!("# {}", text.trim_end())
        };
        let keep = is_keep_marker(&text);
        Self {
            text,
            keep,
            opening: false,
        }
    }

    /// Marks a comment that sat after the opening bracket of its container.
    /// It still belongs to the first element but prints on the bracket line.
    pub fn on_opening_line(mut self) -> Self {
        self.opening = true;
        self
    }

    pub fn is_opening(&self) -> bool {
        self.opening
    }

    /// True if this comment is a keep marker.
    pub fn is_keep(&self) -> bool {
        self.keep
    }

    /// The comment body without the leading `#` and surrounding whitespace.
    pub fn body(&self) -> &str {
        self.text.strip_prefix('#').unwrap_or(&self.text).trim()
    }
}

fn is_keep_marker(text: &str) -> bool {
    let body = text.strip_prefix('#').unwrap_or(text).trim();
    body == "keep" || body.starts_with("keep: ")
}

/// Comments attached to a node.
///
/// `before` holds whole-line comments directly above the node, `suffix` the
/// comments that follow it on its last line, and `after` the comments that
/// trail the node's contents (for example lines before the closing bracket of
/// a list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Comments {
    pub before: Vec<Comment>,
    pub suffix: Vec<Comment>,
    pub after: Vec<Comment>,
}

impl Comments {
    /// True if a keep marker is attached before the node or on its last line.
    pub fn keep(&self) -> bool {
        self.before.iter().chain(&self.suffix).any(Comment::is_keep)
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.suffix.is_empty() && self.after.is_empty()
    }

    /// Appends the comments of `other` that are not already present.
    pub fn union(&mut self, other: &Comments) {
        fn extend(into: &mut Vec<Comment>, from: &[Comment]) {
            for c in from {
                if !into.contains(c) {
                    into.push(c.clone());
                }
            }
        }
        extend(&mut self.before, &other.before);
        extend(&mut self.suffix, &other.suffix);
        extend(&mut self.after, &other.after);
    }
}

// ============================================================================
// NODES
// ============================================================================

/// A syntax node: an expression plus its comments and span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub expr: Expr,
    pub comments: Comments,
    pub span: Span,
}

/// The closed set of node kinds understood by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expr {
    Ident(String),
    /// A string literal, stored unescaped.
    String(String),
    /// A numeric literal, stored as written.
    Number(String),
    List {
        items: Vec<Node>,
        multiline: bool,
    },
    /// Entries are always `KeyValue` nodes.
    Dict {
        entries: Vec<Node>,
    },
    KeyValue {
        key: Box<Node>,
        value: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// Top-level assignment or keyword argument.
    Assign {
        op: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Binary {
        op: String,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Dot {
        object: Box<Node>,
        name: String,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },
    /// A free-standing block of comments at file level, held in `before`.
    CommentBlock,
}

impl Node {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            comments: Comments::default(),
            span: Span::default(),
        }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(Expr::Ident(name.into()))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Expr::String(value.into()))
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self::new(Expr::Number(text.into()))
    }

    /// A list literal; lists with more than one element print one per line.
    pub fn list(items: Vec<Node>) -> Self {
        let multiline = items.len() > 1;
        Self::new(Expr::List { items, multiline })
    }

    pub fn dict(entries: Vec<Node>) -> Self {
        Self::new(Expr::Dict { entries })
    }

    pub fn key_value(key: Node, value: Node) -> Self {
        Self::new(Expr::KeyValue {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn call(callee: &str, args: Vec<Node>) -> Self {
        Self::new(Expr::Call {
            callee: Box::new(callee_node(callee)),
            args,
        })
    }

    /// A keyword argument `key = value`.
    pub fn keyword(key: impl Into<String>, value: Node) -> Self {
        Self::new(Expr::Assign {
            op: "=".to_string(),
            lhs: Box::new(Self::ident(key)),
            rhs: Box::new(value),
        })
    }

    pub fn binary(op: &str, lhs: Node, rhs: Node) -> Self {
        Self::new(Expr::Binary {
            op: op.to_string(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn with_comments(mut self, comments: Comments) -> Self {
        self.comments = comments;
        self
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.expr {
            Expr::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.expr {
            Expr::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn list_items(&self) -> Option<&[Node]> {
        match &self.expr {
            Expr::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.expr, Expr::List { .. })
    }

    /// The dotted name of a call's callee, e.g. `select` or `native.cc_library`.
    pub fn callee_name(&self) -> Option<String> {
        match &self.expr {
            Expr::Call { callee, .. } => dotted_name(callee),
            _ => None,
        }
    }

    pub fn is_call_to(&self, name: &str) -> bool {
        self.callee_name().as_deref() == Some(name)
    }

    /// Immediate children in source order. Call callees are not included.
    pub fn children(&self) -> Vec<&Node> {
        match &self.expr {
            Expr::List { items, .. } => items.iter().collect(),
            Expr::Dict { entries } => entries.iter().collect(),
            Expr::Call { args, .. } => args.iter().collect(),
            Expr::KeyValue { key, value } => vec![key, value],
            Expr::Assign { lhs, rhs, .. } | Expr::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Expr::Dot { object, .. } => vec![object],
            Expr::Index { object, index } => vec![object, index],
            Expr::Ident(_)
            | Expr::String(_)
            | Expr::Number(_)
            | Expr::CommentBlock => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        match &mut self.expr {
            Expr::List { items, .. } => items.iter_mut().collect(),
            Expr::Dict { entries } => entries.iter_mut().collect(),
            Expr::Call { args, .. } => args.iter_mut().collect(),
            Expr::KeyValue { key, value } => vec![key.as_mut(), value.as_mut()],
            Expr::Assign { lhs, rhs, .. } | Expr::Binary { lhs, rhs, .. } => {
                vec![lhs.as_mut(), rhs.as_mut()]
            }
            Expr::Dot { object, .. } => vec![object.as_mut()],
            Expr::Index { object, index } => vec![object.as_mut(), index.as_mut()],
            Expr::Ident(_)
            | Expr::String(_)
            | Expr::Number(_)
            | Expr::CommentBlock => Vec::new(),
        }
    }

    /// Visits this node and all descendants, parents first. Callees are visited
    /// as well.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Node)) {
        f(self);
        if let Expr::Call { callee, .. } = &self.expr {
            callee.walk(f);
        }
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Node)) {
        f(self);
        if let Expr::Call { callee, .. } = &mut self.expr {
            callee.walk_mut(f);
        }
        for child in self.children_mut() {
            child.walk_mut(f);
        }
    }
}

/// Builds the callee expression for a dotted name such as `native.cc_library`.
pub fn callee_node(name: &str) -> Node {
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or_default();
    parts.fold(Node::ident(first), |object, part| {
        Node::new(Expr::Dot {
            object: Box::new(object),
            name: part.to_string(),
        })
    })
}

/// Renders an identifier or a chain of attribute accesses as `a.b.c`.
pub fn dotted_name(node: &Node) -> Option<String> {
    match &node.expr {
        Expr::Ident(name) => Some(name.clone()),
        Expr::Dot { object, name } => dotted_name(object).map(|o| format!("{o}.{name}")),
        _ => None,
    }
}

// ============================================================================
// FILES
// ============================================================================

/// A parsed build file: top-level statements plus the comments that trail the
/// last one.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SyntaxFile {
    pub stmts: Vec<Node>,
    pub trailing: Vec<Comment>,
}
