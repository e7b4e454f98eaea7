//! Build file parser.
//!
//! Parsing runs in two passes. The pest grammar builds the node tree while
//! skipping comments; a second pass scans the source for comments and attaches
//! each one to the innermost node it belongs to:
//!
//! - a comment on the line where a node ends becomes that node's `suffix`;
//! - whole-line comments become `before` comments of the next sibling, as
//!   does a comment after an opening bracket, which remembers its line;
//! - comments after the last sibling of a container become its `after`
//!   comments, or the file's trailing comments at top level.
//!
//! At top level, comment groups separated from the next statement by a blank
//! line become free-standing [`Expr::CommentBlock`] statements.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::errors::ParseError;
use crate::syntax::{Comment, Comments, Expr, Node, Span, SyntaxFile};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct DescriptorParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses `source` into a syntax tree. `name` is used in diagnostics.
pub fn parse(name: &str, source: &str) -> Result<SyntaxFile, ParseError> {
    let ctx = Ctx { name, source };
    let mut pairs =
        DescriptorParser::parse(Rule::file, source).map_err(|e| ctx.convert_error(e))?;
    let file = ctx.next(&mut pairs, "file", Span::default())?;

    let mut stmts = Vec::new();
    for pair in file.into_inner() {
        if pair.as_rule() != Rule::EOI {
            stmts.push(ctx.build(pair)?);
        }
    }

    let lines = LineIndex::new(source);
    let comments = scan_comments(source, &lines);
    let trailing = attach_file(&mut stmts, comments, &lines);
    Ok(SyntaxFile { stmts, trailing })
}

// ============================================================================
// TREE BUILDING
// ============================================================================

struct Ctx<'s> {
    name: &'s str,
    source: &'s str,
}

impl<'s> Ctx<'s> {
    fn build(&self, pair: Pair<'_, Rule>) -> Result<Node, ParseError> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::assignment => {
                let mut inner = pair.into_inner();
                let lhs = self.build(self.next(&mut inner, "assignment target", span)?)?;
                let op = self
                    .next(&mut inner, "assignment operator", span)?
                    .as_str()
                    .to_string();
                let rhs = self.build(self.next(&mut inner, "assigned value", span)?)?;
                Ok(joined(lhs, rhs, |lhs, rhs| Expr::Assign { op, lhs, rhs }))
            }

            Rule::keyword => {
                let mut inner = pair.into_inner();
                let key = self.build(self.next(&mut inner, "argument name", span)?)?;
                let value = self.build(self.next(&mut inner, "argument value", span)?)?;
                Ok(joined(key, value, |lhs, rhs| Expr::Assign {
                    op: "=".to_string(),
                    lhs,
                    rhs,
                }))
            }

            Rule::expr => {
                let mut inner = pair.into_inner();
                let mut acc = self.build(self.next(&mut inner, "operand", span)?)?;
                while let Some(op) = inner.next() {
                    let op = op.as_str().to_string();
                    let rhs = self.build(self.next(&mut inner, "right operand", span)?)?;
                    acc = joined(acc, rhs, |lhs, rhs| Expr::Binary { op, lhs, rhs });
                }
                Ok(acc)
            }

            Rule::primary => {
                let mut inner = pair.into_inner();
                let mut acc = self.build(self.next(&mut inner, "operand", span)?)?;
                for postfix in inner {
                    let postfix_span = span_of(&postfix);
                    let start = acc.span.start;
                    let expr = match postfix.as_rule() {
                        Rule::call_args => Expr::Call {
                            callee: Box::new(acc),
                            args: self.build_all(postfix.into_inner())?,
                        },
                        Rule::dot => {
                            let name = self
                                .next(&mut postfix.into_inner(), "attribute name", postfix_span)?
                                .as_str()
                                .to_string();
                            Expr::Dot {
                                object: Box::new(acc),
                                name,
                            }
                        }
                        Rule::index => {
                            let index = self.build(self.next(
                                &mut postfix.into_inner(),
                                "index expression",
                                postfix_span,
                            )?)?;
                            Expr::Index {
                                object: Box::new(acc),
                                index: Box::new(index),
                            }
                        }
                        other => {
                            return Err(self.error(format!("unexpected {other:?}"), postfix_span))
                        }
                    };
                    acc = spanned(expr, start, postfix_span.end);
                }
                Ok(acc)
            }

            Rule::list => {
                let multiline = pair.as_str().contains('\n');
                let items = self.build_all(pair.into_inner())?;
                Ok(spanned(Expr::List { items, multiline }, span.start, span.end))
            }

            Rule::dict => {
                let entries = self.build_all(pair.into_inner())?;
                Ok(spanned(Expr::Dict { entries }, span.start, span.end))
            }

            Rule::entry => {
                let mut inner = pair.into_inner();
                let key = self.build(self.next(&mut inner, "dict key", span)?)?;
                let value = self.build(self.next(&mut inner, "dict value", span)?)?;
                Ok(joined(key, value, |key, value| Expr::KeyValue { key, value }))
            }

            Rule::ident => Ok(spanned(
                Expr::Ident(pair.as_str().to_string()),
                span.start,
                span.end,
            )),

            Rule::number => Ok(spanned(
                Expr::Number(pair.as_str().to_string()),
                span.start,
                span.end,
            )),

            Rule::string => Ok(spanned(
                Expr::String(unescape_string(pair.as_str())),
                span.start,
                span.end,
            )),

            rule => Err(self.error(format!("unsupported construct: {rule:?}"), span)),
        }
    }

    fn build_all(&self, pairs: Pairs<'_, Rule>) -> Result<Vec<Node>, ParseError> {
        pairs.map(|p| self.build(p)).collect()
    }

    fn next<'i>(
        &self,
        pairs: &mut Pairs<'i, Rule>,
        element: &str,
        span: Span,
    ) -> Result<Pair<'i, Rule>, ParseError> {
        pairs
            .next()
            .ok_or_else(|| self.error(format!("missing {element}"), span))
    }

    fn error(&self, message: String, span: Span) -> ParseError {
        ParseError::new(self.name, self.source, message, span)
    }

    fn convert_error(&self, error: pest::error::Error<Rule>) -> ParseError {
        let span = match error.location {
            pest::error::InputLocation::Pos(pos) => Span {
                start: pos,
                end: pos,
            },
            pest::error::InputLocation::Span((start, end)) => Span { start, end },
        };
        if let Some(construct) = unsupported_construct(self.source, span.start) {
            return self.error(format!("unsupported construct: {construct}"), span);
        }
        let message = match &error.variant {
            pest::error::ErrorVariant::ParsingError { positives, .. }
                if positives.contains(&Rule::EOI) =>
            {
                "unexpected input after statement".to_string()
            }
            pest::error::ErrorVariant::ParsingError { .. } => "syntax error".to_string(),
            pest::error::ErrorVariant::CustomError { message } => message.clone(),
        };
        self.error(message, span)
    }
}

/// Names the language feature at `pos` that build files may use but this
/// grammar does not cover.
fn unsupported_construct(source: &str, pos: usize) -> Option<&'static str> {
    let pos = pos.min(source.len());
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = source[line_start..].trim_start();
    let rest = source.get(pos..)?.trim_start();

    let keyword = |text: &str, word: &str| {
        text.strip_prefix(word)
            .is_some_and(|after| after.starts_with(|c: char| !c.is_ascii_alphanumeric() && c != '_'))
    };

    if keyword(line, "def") {
        Some("function definitions (def)")
    } else if keyword(line, "if") || keyword(line, "elif") || keyword(line, "else") {
        Some("if statements")
    } else if keyword(line, "for") && line.ends_with(':') {
        Some("for loops")
    } else if rest.starts_with("**") {
        Some("keyword argument unpacking (**)")
    } else if rest.starts_with('*') {
        Some("argument unpacking (*)")
    } else if ["==", "!=", "<=", ">=", "<", ">"].iter().any(|op| rest.starts_with(op)) {
        Some("comparison operators")
    } else if keyword(rest, "for") {
        Some("comprehensions")
    } else if keyword(rest, "if") {
        Some("conditional expressions")
    } else if keyword(rest, "lambda") || keyword(line, "lambda") {
        Some("lambda expressions")
    } else if keyword(rest, "and") || keyword(rest, "or") || keyword(rest, "in") {
        Some("boolean and membership operators")
    } else {
        None
    }
}

fn span_of(pair: &Pair<'_, Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn spanned(expr: Expr, start: usize, end: usize) -> Node {
    Node {
        expr,
        comments: Comments::default(),
        span: Span { start, end },
    }
}

// Rule spans from pest may run over trailing whitespace and comments, so
// composite nodes take their extent from their first and last child.
fn joined(lhs: Node, rhs: Node, make: impl FnOnce(Box<Node>, Box<Node>) -> Expr) -> Node {
    let (start, end) = (lhs.span.start, rhs.span.end);
    spanned(make(Box::new(lhs), Box::new(rhs)), start, end)
}

fn unescape_string(text: &str) -> String {
    let (raw, quoted) = match text.strip_prefix('r') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let inner = quoted.get(1..quoted.len().saturating_sub(1)).unwrap_or("");
    if raw {
        return inner.to_string();
    }

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

// ============================================================================
// COMMENT ATTACHMENT
// ============================================================================

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        }
    }

    fn start_of(&self, line: usize) -> usize {
        self.starts.get(line).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct RawComment {
    offset: usize,
    line: usize,
    text: String,
    standalone: bool,
}

impl RawComment {
    fn into_comment(self) -> Comment {
        Comment::new(self.text)
    }

    /// A leading comment that shares its line with code is on the opening
    /// line of the enclosing container.
    fn into_leading(self) -> Comment {
        let standalone = self.standalone;
        let comment = self.into_comment();
        if standalone {
            comment
        } else {
            comment.on_opening_line()
        }
    }
}

fn scan_comments(source: &str, lines: &LineIndex) -> Vec<RawComment> {
    let mut out = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = source.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q || ch == '\n' {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '#' => {
                let end = source[i..].find('\n').map_or(source.len(), |n| i + n);
                let line = lines.line_of(i);
                let standalone = source[lines.start_of(line)..i].trim().is_empty();
                out.push(RawComment {
                    offset: i,
                    line,
                    text: source[i..end].trim_end().to_string(),
                    standalone,
                });
                while chars.peek().is_some_and(|&(j, _)| j < end) {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    out
}

struct Slots {
    before: Vec<Vec<RawComment>>,
    suffix: Vec<Vec<RawComment>>,
    inside: Vec<Vec<RawComment>>,
    trailing: Vec<RawComment>,
}

fn distribute(spans: &[Span], comments: Vec<RawComment>, lines: &LineIndex) -> Slots {
    let mut slots = Slots {
        before: vec![Vec::new(); spans.len()],
        suffix: vec![Vec::new(); spans.len()],
        inside: vec![Vec::new(); spans.len()],
        trailing: Vec::new(),
    };

    for c in comments {
        if let Some(i) = spans
            .iter()
            .position(|s| s.start <= c.offset && c.offset < s.end)
        {
            slots.inside[i].push(c);
            continue;
        }
        if let Some(j) = spans.iter().rposition(|s| s.end <= c.offset) {
            if !c.standalone && lines.line_of(spans[j].end.saturating_sub(1)) == c.line {
                slots.suffix[j].push(c);
                continue;
            }
        }
        match spans.iter().position(|s| s.start > c.offset) {
            Some(k) => slots.before[k].push(c),
            None => slots.trailing.push(c),
        }
    }
    slots
}

fn attach(node: &mut Node, comments: Vec<RawComment>, lines: &LineIndex) {
    if comments.is_empty() {
        return;
    }
    let spans: Vec<Span> = node.children().iter().map(|c| c.span).collect();
    let mut slots = distribute(&spans, comments, lines);

    for (i, child) in node.children_mut().into_iter().enumerate() {
        child.comments.before.extend(
            std::mem::take(&mut slots.before[i])
                .into_iter()
                .map(RawComment::into_leading),
        );
        child.comments.suffix.extend(
            std::mem::take(&mut slots.suffix[i])
                .into_iter()
                .map(RawComment::into_comment),
        );
        attach(child, std::mem::take(&mut slots.inside[i]), lines);
    }
    node.comments
        .after
        .extend(slots.trailing.into_iter().map(RawComment::into_comment));
}

fn attach_file(stmts: &mut Vec<Node>, comments: Vec<RawComment>, lines: &LineIndex) -> Vec<Comment> {
    let spans: Vec<Span> = stmts.iter().map(|s| s.span).collect();
    let mut slots = distribute(&spans, comments, lines);

    let mut out = Vec::with_capacity(stmts.len());
    for (i, mut stmt) in std::mem::take(stmts).into_iter().enumerate() {
        let stmt_line = lines.line_of(stmt.span.start);
        let (blocks, attached) = split_comment_blocks(std::mem::take(&mut slots.before[i]), stmt_line);
        out.extend(blocks);
        stmt.comments
            .before
            .extend(attached.into_iter().map(RawComment::into_comment));
        stmt.comments.suffix.extend(
            std::mem::take(&mut slots.suffix[i])
                .into_iter()
                .map(RawComment::into_comment),
        );
        attach(&mut stmt, std::mem::take(&mut slots.inside[i]), lines);
        out.push(stmt);
    }
    *stmts = out;

    slots
        .trailing
        .into_iter()
        .map(RawComment::into_comment)
        .collect()
}

/// Splits the comments above a statement into detached blocks and the group
/// that sits directly on top of the statement.
fn split_comment_blocks(comments: Vec<RawComment>, next_line: usize) -> (Vec<Node>, Vec<RawComment>) {
    let mut groups: Vec<Vec<RawComment>> = Vec::new();
    for c in comments {
        match groups.last_mut() {
            Some(group) if group.last().is_some_and(|l| l.line + 1 == c.line) => group.push(c),
            _ => groups.push(vec![c]),
        }
    }

    let adjacent = groups
        .last()
        .and_then(|g| g.last())
        .is_some_and(|l| l.line + 1 == next_line);
    let attached = if adjacent {
        groups.pop().unwrap_or_default()
    } else {
        Vec::new()
    };

    let blocks = groups.into_iter().map(comment_block).collect();
    (blocks, attached)
}

fn comment_block(group: Vec<RawComment>) -> Node {
    let start = group.first().map_or(0, |c| c.offset);
    let end = group.last().map_or(0, |c| c.offset + c.text.len());
    let mut node = spanned(Expr::CommentBlock, start, end);
    node.comments.before = group.into_iter().map(RawComment::into_comment).collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> SyntaxFile {
        match parse("BUILD", src) {
            Ok(file) => file,
            Err(e) => panic!("parse failed: {e}"),
        }
    }

    fn keyword<'a>(call: &'a Node, key: &str) -> &'a Node {
        let Expr::Call { args, .. } = &call.expr else {
            panic!("expected a call");
        };
        args.iter()
            .find(|a| matches!(&a.expr, Expr::Assign { lhs, .. } if lhs.as_ident() == Some(key)))
            .unwrap_or_else(|| panic!("no keyword {key}"))
    }

    fn rhs(assign: &Node) -> &Node {
        match &assign.expr {
            Expr::Assign { rhs, .. } => rhs,
            _ => panic!("expected an assignment"),
        }
    }

    #[test]
    fn test_empty_input() {
        let file = parse_ok("");
        assert!(file.stmts.is_empty());
        assert!(file.trailing.is_empty());
    }

    #[test]
    fn test_simple_rule() {
        let file = parse_ok("go_library(\n    name = \"lib\",\n    srcs = [\"a.go\"],\n)\n");
        assert_eq!(file.stmts.len(), 1);
        let call = &file.stmts[0];
        assert_eq!(call.callee_name().as_deref(), Some("go_library"));
        assert_eq!(rhs(keyword(call, "name")).as_str(), Some("lib"));
        let srcs = rhs(keyword(call, "srcs"));
        assert_eq!(srcs.list_items().map(|i| i.len()), Some(1));
    }

    #[test]
    fn test_rule_suffix_keep() {
        let file = parse_ok("go_library(\n    name = \"lib\",\n)  # keep\n");
        assert!(file.stmts[0].comments.keep());
    }

    #[test]
    fn test_single_line_rule_suffix_keep() {
        let file = parse_ok("go_library(name = \"lib\")  # keep\n");
        assert!(file.stmts[0].comments.keep());
        assert!(!keyword(&file.stmts[0], "name").comments.keep());
    }

    #[test]
    fn test_opening_line_comment_is_not_rule_level() {
        let file = parse_ok("go_library(  # keep\n    name = \"lib\",\n)\n");
        assert!(!file.stmts[0].comments.keep());
        assert!(keyword(&file.stmts[0], "name").comments.keep());
    }

    #[test]
    fn test_comment_after_rule_goes_to_next_statement() {
        let file = parse_ok("a(name = \"a\")\n# keep\nb(name = \"b\")\n");
        assert_eq!(file.stmts.len(), 2);
        assert!(!file.stmts[0].comments.keep());
        assert!(file.stmts[1].comments.keep());
    }

    #[test]
    fn test_list_element_comments() {
        let src = "x(\n    srcs = [\n        \"a.go\",\n        \"b.go\",  # keep\n        # trailing\n    ],\n)\n";
        let file = parse_ok(src);
        let srcs = rhs(keyword(&file.stmts[0], "srcs"));
        let items = srcs.list_items().unwrap_or_default();
        assert!(!items[0].comments.keep());
        assert!(items[1].comments.keep());
        assert_eq!(srcs.comments.after.len(), 1);
        assert!(matches!(srcs.expr, Expr::List { multiline: true, .. }));
    }

    #[test]
    fn test_attribute_suffix_keep() {
        let src = "x(\n    srcs = [\n        \"a.go\",\n    ],  # keep\n)\n";
        let file = parse_ok(src);
        assert!(keyword(&file.stmts[0], "srcs").comments.keep());
    }

    #[test]
    fn test_header_comment_block() {
        let src = "# Copyright header\n\nload(\"@x//:def.bzl\", \"y\")\n";
        let file = parse_ok(src);
        assert_eq!(file.stmts.len(), 2);
        assert!(matches!(file.stmts[0].expr, Expr::CommentBlock));
        assert!(file.stmts[1].comments.before.is_empty());
    }

    #[test]
    fn test_hash_inside_string_is_not_a_comment() {
        let file = parse_ok("x(name = \"a#b\")\n");
        assert!(file.stmts[0].comments.is_empty());
        assert_eq!(rhs(keyword(&file.stmts[0], "name")).as_str(), Some("a#b"));
    }

    #[test]
    fn test_select_and_binary() {
        let src = "x(\n    srcs = [\"a.go\"] + select({\n        \"linux\": [\"l.go\"],\n        \"//conditions:default\": [],\n    }),\n)\n";
        let file = parse_ok(src);
        let srcs = rhs(keyword(&file.stmts[0], "srcs"));
        let Expr::Binary { op, rhs: sel, .. } = &srcs.expr else {
            panic!("expected binary");
        };
        assert_eq!(op, "+");
        assert!(sel.is_call_to("select"));
    }

    #[test]
    fn test_string_escapes() {
        let file = parse_ok(r#"x = "a\"b\n""#);
        assert_eq!(rhs(&file.stmts[0]).as_str(), Some("a\"b\n"));
    }

    fn unsupported(src: &str) -> String {
        match parse("BUILD", src) {
            Ok(_) => panic!("expected {src:?} to be rejected"),
            Err(e) => e.message,
        }
    }

    #[test]
    fn test_unsupported_constructs_are_named() {
        assert_eq!(
            unsupported("go_library(**kwargs)\n"),
            "unsupported construct: keyword argument unpacking (**)"
        );
        assert_eq!(
            unsupported("x = [s for s in SRCS]\n"),
            "unsupported construct: comprehensions"
        );
        assert_eq!(
            unsupported("def macro(name):\n    pass\n"),
            "unsupported construct: function definitions (def)"
        );
        assert_eq!(
            unsupported("x(a == b)\n"),
            "unsupported construct: comparison operators"
        );
    }

    #[test]
    fn test_unmatched_paren() {
        assert!(parse("BUILD", "go_library(name = \"x\"").is_err());
    }
}
