//! Attribute value model.
//!
//! Mergeable attribute values are read into a [`Composite`]: an optional
//! generic list plus up to three `select` dicts keyed by OS, architecture and
//! OS/architecture pair, joined with `+` in the source. Merging works part by
//! part and the result is turned back into an expression with [`make_expr`].

use std::collections::{BTreeMap, HashMap};

use crate::config::{PlatformClass, Platforms};
use crate::errors::ShapeError;
use crate::syntax::{Comments, Expr, Node};

pub const DEFAULT_CASE: &str = "//conditions:default";

// ============================================================================
// COMPOSITE VALUES
// ============================================================================

/// `generic + select(os) + select(arch) + select(platform)`, any part optional.
/// The select parts hold the dict argument, not the call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composite {
    pub generic: Option<Node>,
    pub os: Option<Node>,
    pub arch: Option<Node>,
    pub platform: Option<Node>,
}

impl Composite {
    pub fn is_empty(&self) -> bool {
        self.generic.is_none() && self.os.is_none() && self.arch.is_none() && self.platform.is_none()
    }

    fn slot(&mut self, class: PlatformClass) -> &mut Option<Node> {
        match class {
            PlatformClass::Os => &mut self.os,
            PlatformClass::Arch => &mut self.arch,
            PlatformClass::Platform => &mut self.platform,
        }
    }

    fn dicts(&self) -> impl Iterator<Item = &Node> {
        [&self.os, &self.arch, &self.platform]
            .into_iter()
            .filter_map(Option::as_ref)
    }
}

fn collect_parts<'a>(node: &'a Node, parts: &mut Vec<&'a Node>) {
    match &node.expr {
        Expr::Binary { op, lhs, rhs } if op == "+" => {
            collect_parts(lhs, parts);
            collect_parts(rhs, parts);
        }
        _ => parts.push(node),
    }
}

/// Reads `node` as a composite value.
///
/// A `select` call with anything other than a single dict argument is a
/// structural error; every other mismatch is reported as malformed.
pub fn extract(node: &Node, platforms: &Platforms) -> Result<Composite, ShapeError> {
    let mut parts = Vec::new();
    collect_parts(node, &mut parts);

    let mut out = Composite::default();
    for part in parts {
        match &part.expr {
            Expr::List { .. } => {
                if out.generic.is_some() {
                    return Err(ShapeError::Malformed("more than one list in value".into()));
                }
                out.generic = Some(part.clone());
            }
            Expr::Call { args, .. } if part.is_call_to("select") => {
                let dict = match args.as_slice() {
                    [arg] if matches!(arg.expr, Expr::Dict { .. }) => arg,
                    [_] => {
                        return Err(ShapeError::Structural(
                            "select() argument must be a dict literal".into(),
                        ))
                    }
                    _ => {
                        return Err(ShapeError::Structural(format!(
                            "select() takes exactly one argument, got {}",
                            args.len()
                        )))
                    }
                };
                let class = classify_dict(dict, platforms)?;
                let slot = out.slot(class);
                if slot.is_some() {
                    return Err(ShapeError::Malformed(format!(
                        "more than one {class:?} select in value"
                    )));
                }
                *slot = Some(dict.clone());
            }
            Expr::Call { .. } => {
                let callee = part.callee_name().unwrap_or_default();
                return Err(ShapeError::Malformed(format!("unexpected call to {callee}()")));
            }
            _ => {
                return Err(ShapeError::Malformed(
                    "expected a list or select() in value".into(),
                ))
            }
        }
    }
    Ok(out)
}

fn dict_entries(dict: &Node) -> &[Node] {
    match &dict.expr {
        Expr::Dict { entries } => entries,
        _ => &[],
    }
}

fn entry_parts(entry: &Node) -> Result<(&str, &Node), ShapeError> {
    match &entry.expr {
        Expr::KeyValue { key, value } => key
            .as_str()
            .map(|k| (k, value.as_ref()))
            .ok_or_else(|| ShapeError::Malformed("select() keys must be strings".into())),
        _ => Err(ShapeError::Malformed("select() dict entry expected".into())),
    }
}

fn classify_dict(dict: &Node, platforms: &Platforms) -> Result<PlatformClass, ShapeError> {
    let mut class = None;
    for entry in dict_entries(dict) {
        let (key, _) = entry_parts(entry)?;
        if key == DEFAULT_CASE {
            continue;
        }
        let this = platforms
            .classify(key)
            .ok_or_else(|| ShapeError::Malformed(format!("unknown platform {key:?}")))?;
        match class {
            None => class = Some(this),
            Some(c) if c == this => {}
            Some(_) => {
                return Err(ShapeError::Malformed(
                    "select() mixes keys of different platform kinds".into(),
                ))
            }
        }
    }
    Ok(class.unwrap_or(PlatformClass::Platform))
}

/// Builds the expression for a composite value, or `None` if it has no
/// parts. Parts are joined in the order generic, os, arch, platform. A
/// non-empty generic list followed by a `select` is broken over lines.
pub fn make_expr(c: Composite) -> Option<Node> {
    join_parts(c, true)
}

fn join_parts(c: Composite, break_generic: bool) -> Option<Node> {
    let selects = [c.os, c.arch, c.platform]
        .into_iter()
        .flatten()
        .map(|dict| Node::call("select", vec![dict]));
    let mut parts: Vec<Node> = c.generic.into_iter().chain(selects).collect();

    if break_generic && parts.len() > 1 {
        if let Some(Expr::List { items, multiline }) = parts.first_mut().map(|p| &mut p.expr) {
            *multiline = !items.is_empty();
        }
    }

    let mut parts = parts.into_iter();
    let first = parts.next()?;
    Some(parts.fold(first, |acc, part| Node::binary("+", acc, part)))
}

// ============================================================================
// MERGING
// ============================================================================

/// A single-argument call wrapping a string, other than `select` and `glob`,
/// e.g. `Label("//x")`.
pub fn wrapped_scalar(node: &Node) -> Option<(String, &str)> {
    let Expr::Call { args, .. } = &node.expr else {
        return None;
    };
    let callee = node.callee_name()?;
    if callee == "select" || callee == "glob" {
        return None;
    }
    match args.as_slice() {
        [arg] => arg.as_str().map(|s| (callee, s)),
        _ => None,
    }
}

/// Identity of a list element for merging. Elements without one never match.
fn element_key(node: &Node) -> Option<String> {
    match &node.expr {
        Expr::String(s) => Some(s.clone()),
        Expr::Call { .. } => wrapped_scalar(node).map(|(callee, v)| format!("{callee}({v:?})")),
        _ => None,
    }
}

fn is_scalar(node: &Node) -> bool {
    matches!(
        node.expr,
        Expr::String(_) | Expr::Number(_) | Expr::Ident(_)
    ) || wrapped_scalar(node).is_some()
}

fn list_parts(node: Option<&Node>) -> (&[Node], bool) {
    match node.map(|n| &n.expr) {
        Some(Expr::List { items, multiline }) => (items, *multiline),
        _ => (&[], false),
    }
}

/// Merges two lists.
///
/// Old elements survive, in place, if they are kept or regenerated; generated
/// elements not already present follow in generated order. Returns `None` when
/// nothing remains. If `old` is not a list the generated value wins.
pub fn merge_list(gen: Option<&Node>, old: Option<&Node>) -> Option<Node> {
    let Some(old_node) = old.filter(|n| n.is_list()) else {
        return gen.filter(|g| !g.list_items().is_some_and(<[Node]>::is_empty)).cloned();
    };
    let (gen_items, gen_multiline) = list_parts(gen);
    let (old_items, old_multiline) = list_parts(Some(old_node));

    let wanted: Vec<String> = gen_items.iter().filter_map(element_key).collect();
    let mut consumed: Vec<String> = Vec::new();
    let mut merged = Vec::new();
    let mut keep_seen = false;

    for item in old_items {
        let key = element_key(item);
        let kept = item.comments.keep();
        let regenerated = key.as_ref().is_some_and(|k| wanted.contains(k));
        let duplicate = key.as_ref().is_some_and(|k| consumed.contains(k));
        if kept || (regenerated && !duplicate) {
            keep_seen |= kept;
            if let Some(k) = key {
                consumed.push(k);
            }
            merged.push(item.clone());
        }
    }
    for item in gen_items {
        match element_key(item) {
            Some(k) if consumed.contains(&k) => {}
            Some(k) => {
                consumed.push(k);
                merged.push(item.clone());
            }
            None => merged.push(item.clone()),
        }
    }

    if merged.is_empty() {
        return None;
    }
    Some(Node {
        expr: Expr::List {
            items: merged,
            multiline: gen_multiline || old_multiline || keep_seen,
        },
        comments: old_node.comments.clone(),
        span: old_node.span,
    })
}

struct DictEntry<'a> {
    key: String,
    old: Option<&'a Node>,
    gen: Option<&'a Node>,
    comments: Comments,
}

/// Merges two `select` dicts key by key with [`merge_list`].
///
/// The default case survives as `[]` if either input has it. Other keys are
/// sorted, the default case goes last. The result is `None` when only an empty
/// default case would remain.
pub fn merge_dict(gen: Option<&Node>, old: Option<&Node>) -> Result<Option<Node>, ShapeError> {
    let mut entries: Vec<DictEntry<'_>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (is_gen, dict) in [(false, old), (true, gen)] {
        let Some(dict) = dict else { continue };
        let mut seen = Vec::new();
        for entry in dict_entries(dict) {
            let (key, value) = entry_parts(entry)?;
            if seen.contains(&key) {
                return Err(ShapeError::Malformed(format!("duplicate select() key {key:?}")));
            }
            seen.push(key);
            let i = *index.entry(key.to_string()).or_insert_with(|| {
                entries.push(DictEntry {
                    key: key.to_string(),
                    old: None,
                    gen: None,
                    comments: entry.comments.clone(),
                });
                entries.len() - 1
            });
            if is_gen {
                entries[i].gen = Some(value);
            } else {
                entries[i].old = Some(value);
            }
        }
    }

    let mut default = None;
    let mut merged: Vec<(String, Node, Comments)> = Vec::new();
    for e in entries {
        let value = merge_list(e.gen, e.old);
        if e.key == DEFAULT_CASE {
            default = Some((value.unwrap_or_else(|| Node::list(Vec::new())), e.comments));
        } else if let Some(value) = value {
            merged.push((e.key, value, e.comments));
        }
    }

    let default_empty = default
        .as_ref()
        .map_or(true, |(v, _)| v.list_items().is_some_and(<[Node]>::is_empty));
    if merged.is_empty() && default_empty {
        return Ok(None);
    }

    merged.sort_by(|a, b| a.0.cmp(&b.0));
    if let Some((value, comments)) = default {
        merged.push((DEFAULT_CASE.to_string(), value, comments));
    }

    let entries = merged
        .into_iter()
        .map(|(key, value, comments)| {
            Node::key_value(Node::string(key), value).with_comments(comments)
        })
        .collect();
    let comments = old.or(gen).map(|d| d.comments.clone()).unwrap_or_default();
    Ok(Some(Node::dict(entries).with_comments(comments)))
}

fn merge_composite(gen: Composite, old: Composite) -> Result<Composite, ShapeError> {
    Ok(Composite {
        generic: merge_list(gen.generic.as_ref(), old.generic.as_ref()),
        os: merge_dict(gen.os.as_ref(), old.os.as_ref())?,
        arch: merge_dict(gen.arch.as_ref(), old.arch.as_ref())?,
        platform: merge_dict(gen.platform.as_ref(), old.platform.as_ref())?,
    })
}

/// Merges a generated attribute value into an existing one.
///
/// A scalar generated value replaces the old value. An absent generated value
/// deletes an old scalar. Anything else is merged as a composite; `None` means
/// the attribute should be removed.
pub fn merge_expr(
    gen: Option<&Node>,
    old: Option<&Node>,
    platforms: &Platforms,
) -> Result<Option<Node>, ShapeError> {
    let merged = match (gen, old) {
        (None, None) => return Ok(None),
        (None, Some(old)) if is_scalar(old) => return Ok(None),
        (Some(gen), _) if is_scalar(gen) => Some(gen.clone()),
        _ => {
            let gen_parts = gen.map(|g| extract(g, platforms)).transpose()?.unwrap_or_default();
            let old_parts = old.map(|o| extract(o, platforms)).transpose()?.unwrap_or_default();
            // An existing generic list keeps its own layout.
            let fresh_generic = old_parts.generic.is_none();
            join_parts(merge_composite(gen_parts, old_parts)?, fresh_generic)
        }
    };

    Ok(merged.map(|mut node| {
        if let Some(old) = old {
            node.comments = old.comments.clone();
        }
        node
    }))
}

/// Collapses a composite value of plain strings into one sorted list.
/// Returns the input unchanged when any leaf is not a string.
pub fn flatten(node: &Node, platforms: &Platforms) -> Node {
    let Ok(c) = extract(node, platforms) else {
        return node.clone();
    };

    let mut lists: Vec<&Node> = c.generic.iter().collect();
    for dict in c.dicts() {
        for entry in dict_entries(dict) {
            match entry_parts(entry) {
                Ok((_, value)) if value.is_list() => lists.push(value),
                _ => return node.clone(),
            }
        }
    }

    let mut out: Vec<Node> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for item in lists.iter().flat_map(|l| l.list_items().unwrap_or_default()) {
        let Some(value) = item.as_str() else {
            return node.clone();
        };
        match seen.get(value).copied() {
            Some(i) => out[i].comments.union(&item.comments),
            None => {
                seen.insert(value.to_string(), out.len());
                out.push(item.clone());
            }
        }
    }

    sort_labels(&mut out);
    Node::list(out).with_comments(node.comments.clone())
}

// ============================================================================
// SORTING
// ============================================================================

/// Sort key for label-like list elements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    phase: u8,
    segments: Vec<String>,
    value: String,
    index: usize,
}

fn phase_of(value: &str) -> u8 {
    if value.starts_with(':') {
        1
    } else if value.starts_with("//") {
        2
    } else if value.starts_with('@') {
        3
    } else {
        0
    }
}

/// Plain names sort before `:name`, then `//pkg` paths, then `@repo` labels,
/// then wrapped calls; ties break on `.`/`:` segments, raw value, and
/// finally `index`.
pub fn label_sort_key(node: &Node, index: usize) -> SortKey {
    let (phase, value) = match node.as_str() {
        Some(s) => (phase_of(s), s.to_string()),
        None => match wrapped_scalar(node) {
            Some((_, v)) => (4, v.to_string()),
            None => (5, String::new()),
        },
    };
    let segments = value
        .split(|c| c == '.' || c == ':')
        .map(str::to_string)
        .collect();
    SortKey {
        phase,
        segments,
        value,
        index,
    }
}

pub fn sort_labels(items: &mut Vec<Node>) {
    let mut keyed: Vec<(SortKey, Node)> = std::mem::take(items)
        .into_iter()
        .enumerate()
        .map(|(i, n)| (label_sort_key(&n, i), n))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    items.extend(keyed.into_iter().map(|(_, n)| n));
}

// ============================================================================
// NATIVE VALUES
// ============================================================================

/// Native attribute values, converted to expressions by [`AttrValue::into_node`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<AttrValue>),
    Dict(BTreeMap<String, AttrValue>),
    Glob {
        patterns: Vec<String>,
        excludes: Vec<String>,
    },
    /// `select({...})`; the default case is printed last.
    Select(BTreeMap<String, AttrValue>),
    Composite(Composite),
    Expr(Node),
}

fn string_list(items: Vec<String>) -> Node {
    Node::list(items.into_iter().map(Node::string).collect())
}

impl AttrValue {
    pub fn into_node(self) -> Node {
        match self {
            AttrValue::Str(s) => Node::string(s),
            AttrValue::Bool(b) => Node::ident(if b { "True" } else { "False" }),
            AttrValue::Int(i) => Node::number(i.to_string()),
            AttrValue::List(items) => Node::list(items.into_iter().map(AttrValue::into_node).collect()),
            AttrValue::Dict(map) => Node::dict(
                map.into_iter()
                    .map(|(k, v)| Node::key_value(Node::string(k), v.into_node()))
                    .collect(),
            ),
            AttrValue::Glob { patterns, excludes } => {
                let mut args = vec![string_list(patterns)];
                if !excludes.is_empty() {
                    args.push(Node::keyword("exclude", string_list(excludes)));
                }
                Node::call("glob", args)
            }
            AttrValue::Select(mut cases) => {
                let default = cases.remove(DEFAULT_CASE);
                let mut entries: Vec<Node> = cases
                    .into_iter()
                    .map(|(k, v)| Node::key_value(Node::string(k), v.into_node()))
                    .collect();
                if let Some(v) = default {
                    entries.push(Node::key_value(Node::string(DEFAULT_CASE), v.into_node()));
                }
                Node::call("select", vec![Node::dict(entries)])
            }
            AttrValue::Composite(c) => make_expr(c).unwrap_or_else(|| Node::list(Vec::new())),
            AttrValue::Expr(node) => node,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        AttrValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Node> for AttrValue {
    fn from(node: Node) -> Self {
        AttrValue::Expr(node)
    }
}

impl From<Composite> for AttrValue {
    fn from(c: Composite) -> Self {
        AttrValue::Composite(c)
    }
}
