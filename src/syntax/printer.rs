//! Deterministic pretty printer for descriptor trees.
//!
//! Layout rules:
//! - top-level statements are separated by a blank line, except runs of
//!   `load` statements which stay together;
//! - top-level rule calls print one argument per line with a trailing comma;
//! - lists print on one line unless they were multi-line in the source, hold
//!   more than one generated element, or carry comments;
//! - non-empty dicts always print one entry per line.

use crate::syntax::{Comment, Expr, Node, SyntaxFile};

const INDENT: usize = 4;

/// Formats a whole file. The result always ends with a newline unless the file
/// is empty.
pub fn format_file(file: &SyntaxFile) -> String {
    let mut out = String::new();
    let mut prev: Option<&Node> = None;

    for stmt in &file.stmts {
        if let Some(prev) = prev {
            let load_run =
                prev.is_call_to("load") && stmt.is_call_to("load") && stmt.comments.before.is_empty();
            if !load_run {
                out.push('\n');
            }
        }
        format_stmt(&mut out, stmt);
        prev = Some(stmt);
    }

    if !file.trailing.is_empty() {
        if !file.stmts.is_empty() {
            out.push('\n');
        }
        write_comment_lines(&mut out, &file.trailing, 0);
    }
    out
}

/// Formats a single expression as it would appear at the top level, without its
/// attached `before` and `suffix` comments.
pub fn format_node(node: &Node) -> String {
    let mut out = String::new();
    write_expr(&mut out, node, 0, true);
    out
}

fn format_stmt(out: &mut String, stmt: &Node) {
    write_comment_lines(out, &stmt.comments.before, 0);
    if matches!(stmt.expr, Expr::CommentBlock) {
        return;
    }
    write_expr(out, stmt, 0, true);
    write_suffix(out, &stmt.comments.suffix);
    out.push('\n');
}

fn write_comment_lines<'a>(
    out: &mut String,
    comments: impl IntoIterator<Item = &'a Comment>,
    indent: usize,
) {
    for c in comments {
        push_indent(out, indent);
        out.push_str(&c.text);
        out.push('\n');
    }
}

fn write_suffix(out: &mut String, comments: &[Comment]) {
    for c in comments {
        out.push_str("  ");
        out.push_str(&c.text);
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

/// Suffix comments of an element, including those attached to the value of a
/// `key = value` or `key: value` pair.
fn element_suffix(node: &Node) -> Vec<&Comment> {
    let mut all: Vec<&Comment> = node.comments.suffix.iter().collect();
    match &node.expr {
        Expr::Assign { rhs: value, .. } | Expr::KeyValue { value, .. } => {
            all.extend(value.comments.suffix.iter());
        }
        _ => {}
    }
    all
}

fn has_comments(node: &Node) -> bool {
    !node.comments.before.is_empty() || !element_suffix(node).is_empty()
}

/// Breaks after the opening bracket and writes one element per line.
fn write_elements(out: &mut String, items: &[Node], after: &[Comment], indent: usize) {
    let opening = items.first().map(|first| &first.comments.before);
    for c in opening.into_iter().flatten().filter(|c| c.is_opening()) {
        out.push_str("  ");
        out.push_str(&c.text);
    }
    out.push('\n');

    let inner = indent + INDENT;
    for (i, item) in items.iter().enumerate() {
        let before = item.comments.before.iter().filter(|c| i > 0 || !c.is_opening());
        write_comment_lines(out, before, inner);
        push_indent(out, inner);
        write_expr(out, item, inner, false);
        out.push(',');
        for c in element_suffix(item) {
            out.push_str("  ");
            out.push_str(&c.text);
        }
        out.push('\n');
    }
    write_comment_lines(out, after, inner);
    push_indent(out, indent);
}

fn write_inline(out: &mut String, items: &[Node], indent: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, indent, false);
    }
}

fn write_expr(out: &mut String, node: &Node, indent: usize, top: bool) {
    match &node.expr {
        Expr::Ident(name) => out.push_str(name),
        Expr::Number(text) => out.push_str(text),
        Expr::String(value) => write_quoted(out, value),

        Expr::List { items, multiline } => {
            let after = &node.comments.after;
            let broken = *multiline || !after.is_empty() || items.iter().any(has_comments);
            out.push('[');
            if broken && !(items.is_empty() && after.is_empty()) {
                write_elements(out, items, after, indent);
            } else {
                write_inline(out, items, indent);
            }
            out.push(']');
        }

        Expr::Dict { entries } => {
            out.push('{');
            if !entries.is_empty() || !node.comments.after.is_empty() {
                write_elements(out, entries, &node.comments.after, indent);
            }
            out.push('}');
        }

        Expr::KeyValue { key, value } => {
            write_expr(out, key, indent, false);
            out.push_str(": ");
            write_expr(out, value, indent, false);
        }

        Expr::Call { callee, args } => {
            write_expr(out, callee, indent, false);
            out.push('(');
            let after = &node.comments.after;
            let commented = !after.is_empty() || args.iter().any(has_comments);
            let keyworded = args.iter().any(|a| matches!(a.expr, Expr::Assign { .. }));
            let broken = commented || (top && keyworded && !node.is_call_to("load"));
            if broken {
                write_elements(out, args, after, indent);
            } else {
                write_inline(out, args, indent);
            }
            out.push(')');
        }

        Expr::Assign { op, lhs, rhs } => {
            write_expr(out, lhs, indent, false);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            write_expr(out, rhs, indent, false);
        }

        Expr::Binary { op, lhs, rhs } => {
            write_expr(out, lhs, indent, false);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            write_expr(out, rhs, indent, false);
        }

        Expr::Dot { object, name } => {
            write_expr(out, object, indent, false);
            out.push('.');
            out.push_str(name);
        }

        Expr::Index { object, index } => {
            write_expr(out, object, indent, false);
            out.push('[');
            write_expr(out, index, indent, false);
            out.push(']');
        }

        Expr::CommentBlock => {}
    }
}

fn write_quoted(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}
