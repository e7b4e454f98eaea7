//! Rule, load and file views over the syntax tree.
//!
//! A [`File`] owns its statements as typed [`Stmt`]s. Deletions and insertions
//! are deferred: [`Rule::delete`], [`Load::delete`], [`File::insert_rule`] and
//! [`File::insert_load`] only record the change, and [`File::sync`] applies all
//! of them at once. Until then `rules()` and `loads()` still report deleted
//! statements and omit inserted ones, and [`RuleId`]/[`LoadId`] values are only
//! meaningful between two syncs.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::KindInfo;
use crate::errors::{ParseError, PrivateKeyError};
use crate::syntax::{self, callee_node, Comment, Comments, Expr, Node, SyntaxFile};
use crate::value::AttrValue;

// ============================================================================
// RULES
// ============================================================================

/// A keyword argument of a rule. `comments` belong to the `key = value`
/// argument as a whole; the value node carries its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attr {
    pub value: Node,
    pub comments: Comments,
}

impl Attr {
    pub fn new(value: Node) -> Self {
        Self {
            value,
            comments: Comments::default(),
        }
    }
}

/// One rule call, e.g. `go_library(name = "lib", ...)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    kind: String,
    #[serde(skip)]
    callee: Node,
    args: Vec<Node>,
    attrs: IndexMap<String, Attr>,
    #[serde(skip)]
    private: BTreeMap<String, serde_json::Value>,
    pub comments: Comments,
    #[serde(skip)]
    deleted: bool,
}

impl Rule {
    pub fn new(kind: &str, name: &str) -> Self {
        let mut rule = Self {
            kind: kind.to_string(),
            callee: callee_node(kind),
            args: Vec::new(),
            attrs: IndexMap::new(),
            private: BTreeMap::new(),
            comments: Comments::default(),
            deleted: false,
        };
        if !name.is_empty() {
            rule.set_attr("name", name);
        }
        rule
    }

    /// Reads a call statement as a rule. Calls with a non-name callee,
    /// repeated keywords or positional arguments after keywords are returned
    /// unchanged as `Err`.
    pub fn from_node(node: Node) -> Result<Rule, Node> {
        let kind = match node.callee_name() {
            Some(kind) if has_rule_arguments(&node) => kind,
            _ => return Err(node),
        };
        let (callee, args, comments) = match node {
            Node {
                expr: Expr::Call { callee, args },
                comments,
                ..
            } => (callee, args, comments),
            other => return Err(other),
        };
        let mut rule = Rule {
            kind,
            callee: *callee,
            args: Vec::new(),
            attrs: IndexMap::new(),
            private: BTreeMap::new(),
            comments,
            deleted: false,
        };
        for arg in args {
            match arg.expr {
                Expr::Assign { lhs, rhs, .. } => {
                    let key = lhs.as_ident().unwrap_or_default().to_string();
                    rule.attrs.insert(
                        key,
                        Attr {
                            value: *rhs,
                            comments: arg.comments,
                        },
                    );
                }
                expr => rule.args.push(Node {
                    expr,
                    comments: arg.comments,
                    span: arg.span,
                }),
            }
        }
        Ok(rule)
    }

    pub fn to_node(&self) -> Node {
        let mut args = self.args.clone();
        for (key, attr) in &self.attrs {
            args.push(Node::keyword(key.clone(), attr.value.clone()).with_comments(attr.comments.clone()));
        }
        Node::new(Expr::Call {
            callee: Box::new(self.callee.clone()),
            args,
        })
        .with_comments(self.comments.clone())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: &str) {
        self.kind = kind.to_string();
        self.callee = callee_node(kind);
    }

    /// The `name` attribute, else the first positional string argument, else
    /// the empty string.
    pub fn name(&self) -> &str {
        self.attr_string("name")
            .or_else(|| self.args.first().and_then(Node::as_str))
            .unwrap_or("")
    }

    pub fn attr(&self, key: &str) -> Option<&Node> {
        self.attrs.get(key).map(|a| &a.value)
    }

    pub fn attr_mut(&mut self, key: &str) -> Option<&mut Attr> {
        self.attrs.get_mut(key)
    }

    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Node::as_str)
    }

    /// The string elements of a list attribute.
    pub fn attr_strings(&self, key: &str) -> Option<Vec<&str>> {
        self.attr(key)
            .and_then(Node::list_items)
            .map(|items| items.iter().filter_map(Node::as_str).collect())
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn attr_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.attrs.iter().map(|(k, a)| (k.as_str(), a))
    }

    /// Sets an attribute value. An existing attribute keeps its position and
    /// its comments; a new `name` goes first, anything else last.
    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        let value = value.into().into_node();
        match self.attrs.get_mut(key) {
            Some(attr) => attr.value = value,
            None => self.insert_attr(key, Attr::new(value)),
        }
    }

    /// Inserts `attr` with its comments, replacing any existing attribute.
    pub fn insert_attr(&mut self, key: &str, attr: Attr) {
        if key == "name" && !self.attrs.contains_key(key) {
            self.attrs.shift_insert(0, key.to_string(), attr);
        } else {
            self.attrs.insert(key.to_string(), attr);
        }
    }

    pub fn del_attr(&mut self, key: &str) -> Option<Attr> {
        self.attrs.shift_remove(key)
    }

    /// Private attributes are never printed.
    pub fn private_attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.private.get(key)
    }

    /// Stores a private attribute. The key must start with `_`.
    pub fn set_private_attr(
        &mut self,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<(), PrivateKeyError> {
        if !key.starts_with('_') {
            return Err(PrivateKeyError(key.to_string()));
        }
        self.private.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Copies every private attribute of `other`, overwriting equal keys.
    pub fn copy_private_attrs(&mut self, other: &Rule) {
        self.private
            .extend(other.private.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// True if a keep marker sits directly above the rule or on its last line.
    pub fn should_keep(&self) -> bool {
        self.comments.keep()
    }

    pub fn attr_kept(&self, key: &str) -> bool {
        self.attrs
            .get(key)
            .is_some_and(|a| a.comments.keep() || a.value.comments.keep())
    }

    /// True if none of the kind's non-empty attributes carries a value.
    /// Kinds without a non-empty policy are never empty.
    pub fn is_empty(&self, info: &KindInfo) -> bool {
        if info.non_empty_attrs.is_empty() {
            return false;
        }
        !self.attrs.iter().any(|(key, attr)| {
            key != "name"
                && key != "visibility"
                && info.non_empty_attrs.contains(key)
                && !is_empty_value(&attr.value)
        })
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Positional arguments first, then keywords without repeats.
fn has_rule_arguments(node: &Node) -> bool {
    let Expr::Call { args, .. } = &node.expr else {
        return false;
    };
    let mut keys: Vec<&str> = Vec::new();
    args.iter().all(|arg| match keyword_of(arg) {
        Some(key) => {
            let fresh = !keys.contains(&key);
            keys.push(key);
            fresh
        }
        None => keys.is_empty(),
    })
}

fn keyword_of(arg: &Node) -> Option<&str> {
    match &arg.expr {
        Expr::Assign { op, lhs, .. } if op == "=" => lhs.as_ident(),
        _ => None,
    }
}

fn is_empty_value(node: &Node) -> bool {
    match &node.expr {
        Expr::List { items, .. } => items.is_empty(),
        Expr::Dict { entries } => entries.is_empty(),
        _ => false,
    }
}

// ============================================================================
// LOADS
// ============================================================================

/// A loaded symbol. `local` differs from `remote` for `local = "remote"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSymbol {
    pub local: String,
    pub remote: String,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Load {
    module: String,
    module_comments: Comments,
    symbols: Vec<LoadSymbol>,
    pub comments: Comments,
    #[serde(skip)]
    deleted: bool,
}

impl Load {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            module_comments: Comments::default(),
            symbols: Vec::new(),
            comments: Comments::default(),
            deleted: false,
        }
    }

    /// Reads a `load(...)` call. Anything that is not a string module followed
    /// by string or `local = "remote"` arguments comes back as `Err`.
    pub fn from_node(node: Node) -> Result<Load, Node> {
        let valid = match &node.expr {
            Expr::Call { args, .. } if node.is_call_to("load") => {
                args.first().is_some_and(|m| m.as_str().is_some())
                    && args[1..].iter().all(|a| match &a.expr {
                        Expr::String(_) => true,
                        Expr::Assign { op, lhs, rhs } => {
                            op == "=" && lhs.as_ident().is_some() && rhs.as_str().is_some()
                        }
                        _ => false,
                    })
            }
            _ => false,
        };
        if !valid {
            return Err(node);
        }

        let (args, comments) = match node {
            Node {
                expr: Expr::Call { args, .. },
                comments,
                ..
            } => (args, comments),
            other => return Err(other),
        };
        let mut args = args.into_iter();
        let (module, module_comments) = match args.next() {
            Some(Node {
                expr: Expr::String(m),
                comments,
                ..
            }) => (m, comments),
            _ => (String::new(), Comments::default()),
        };
        let symbols = args
            .map(|arg| match arg.expr {
                Expr::Assign { lhs, rhs, .. } => LoadSymbol {
                    local: lhs.as_ident().unwrap_or_default().to_string(),
                    remote: rhs.as_str().unwrap_or_default().to_string(),
                    comments: arg.comments,
                },
                Expr::String(s) => LoadSymbol {
                    local: s.clone(),
                    remote: s,
                    comments: arg.comments,
                },
                _ => LoadSymbol {
                    local: String::new(),
                    remote: String::new(),
                    comments: arg.comments,
                },
            })
            .collect();
        Ok(Load {
            module,
            module_comments,
            symbols,
            comments,
            deleted: false,
        })
    }

    pub fn to_node(&self) -> Node {
        let mut args = vec![Node::string(self.module.clone()).with_comments(self.module_comments.clone())];
        for sym in &self.symbols {
            let arg = if sym.local == sym.remote {
                Node::string(sym.local.clone())
            } else {
                Node::keyword(sym.local.clone(), Node::string(sym.remote.clone()))
            };
            args.push(arg.with_comments(sym.comments.clone()));
        }
        Node::call("load", args).with_comments(self.comments.clone())
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Local names bound by this load.
    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|s| s.local.as_str())
    }

    pub fn has(&self, sym: &str) -> bool {
        self.symbols.iter().any(|s| s.local == sym)
    }

    /// Adds `sym` before the first symbol that sorts after it.
    pub fn add(&mut self, sym: &str) {
        if self.has(sym) {
            return;
        }
        let at = self
            .symbols
            .iter()
            .position(|s| s.local.as_str() > sym)
            .unwrap_or(self.symbols.len());
        self.symbols.insert(
            at,
            LoadSymbol {
                local: sym.to_string(),
                remote: sym.to_string(),
                comments: Comments::default(),
            },
        );
    }

    pub fn remove(&mut self, sym: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|s| s.local != sym);
        self.symbols.len() != before
    }

    /// Drops repeated bindings of the same local name, keeping the first.
    pub fn dedup(&mut self) -> bool {
        let before = self.symbols.len();
        let mut seen = HashSet::new();
        self.symbols.retain(|s| seen.insert(s.local.clone()));
        self.symbols.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

// ============================================================================
// DIRECTIVES
// ============================================================================

/// `# <prefix>:<key> <value>` comments found at the top level of a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: Vec<(String, String)>,
}

impl Directives {
    pub fn scan(file: &SyntaxFile, prefix: &str) -> Self {
        let marker = format!("{prefix}:");
        let comments = file
            .stmts
            .iter()
            .flat_map(|s| s.comments.before.iter().chain(&s.comments.suffix))
            .chain(&file.trailing);

        let entries = comments
            .filter_map(|c| {
                let rest = c.body().strip_prefix(&marker)?;
                let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { entries }
    }

    /// The last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// True if the file opts out of merging with an `ignore` directive.
    pub fn is_ignored(&self) -> bool {
        self.has("ignore")
    }
}

// ============================================================================
// FILES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Rule(Rule),
    Load(Load),
    Other(Node),
}

impl Stmt {
    fn from_node(node: Node) -> Stmt {
        if node.is_call_to("load") {
            return match Load::from_node(node) {
                Ok(load) => Stmt::Load(load),
                Err(node) => Stmt::Other(node),
            };
        }
        if matches!(node.expr, Expr::Call { .. }) {
            return match Rule::from_node(node) {
                Ok(rule) => Stmt::Rule(rule),
                Err(node) => Stmt::Other(node),
            };
        }
        Stmt::Other(node)
    }

    pub fn to_node(&self) -> Node {
        match self {
            Stmt::Rule(r) => r.to_node(),
            Stmt::Load(l) => l.to_node(),
            Stmt::Other(n) => n.clone(),
        }
    }

    fn is_deleted(&self) -> bool {
        match self {
            Stmt::Rule(r) => r.is_deleted(),
            Stmt::Load(l) => l.is_deleted(),
            Stmt::Other(_) => false,
        }
    }

    /// True if this statement is a call to `name`.
    pub fn is_call_to(&self, name: &str) -> bool {
        match self {
            Stmt::Rule(r) => r.kind() == name,
            Stmt::Load(_) => name == "load",
            Stmt::Other(n) => n.is_call_to(name),
        }
    }
}

/// Index of a rule statement, valid until the next [`File::sync`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(usize);

/// Index of a load statement, valid until the next [`File::sync`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadId(usize);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    /// Path used in diagnostics.
    pub path: String,
    /// Package of the file, e.g. `foo/bar` for `foo/bar/BUILD`.
    pub pkg: String,
    stmts: Vec<Stmt>,
    inserts: Vec<(usize, Stmt)>,
    trailing: Vec<Comment>,
    directives: Directives,
}

impl File {
    pub fn new(path: &str, pkg: &str) -> Self {
        Self {
            path: path.to_string(),
            pkg: pkg.to_string(),
            ..Self::default()
        }
    }

    pub fn parse(path: &str, pkg: &str, source: &str, prefix: &str) -> Result<File, ParseError> {
        let syntax = syntax::parse(path, source)?;
        Ok(Self::from_syntax(path, pkg, syntax, prefix))
    }

    pub fn from_syntax(path: &str, pkg: &str, file: SyntaxFile, prefix: &str) -> Self {
        let directives = Directives::scan(&file, prefix);
        Self {
            path: path.to_string(),
            pkg: pkg.to_string(),
            stmts: file.stmts.into_iter().map(Stmt::from_node).collect(),
            inserts: Vec::new(),
            trailing: file.trailing,
            directives,
        }
    }

    /// The file as it will look after the next sync.
    pub fn to_syntax(&self) -> SyntaxFile {
        let mut stmts = Vec::with_capacity(self.stmts.len() + self.inserts.len());
        for i in 0..=self.stmts.len() {
            stmts.extend(
                self.inserts
                    .iter()
                    .filter(|(at, _)| *at == i)
                    .filter(|(_, s)| !s.is_deleted())
                    .map(|(_, s)| s.to_node()),
            );
            if let Some(stmt) = self.stmts.get(i).filter(|s| !s.is_deleted()) {
                stmts.push(stmt.to_node());
            }
        }
        SyntaxFile {
            stmts,
            trailing: self.trailing.clone(),
        }
    }

    pub fn format(&self) -> String {
        syntax::format_file(&self.to_syntax())
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.stmts
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Stmt::Rule(_)))
            .map(|(i, _)| RuleId(i))
            .collect()
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        match self.stmts.get(id.0) {
            Some(Stmt::Rule(r)) => Some(r),
            _ => None,
        }
    }

    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        match self.stmts.get_mut(id.0) {
            Some(Stmt::Rule(r)) => Some(r),
            _ => None,
        }
    }

    /// Rules in file order, including deleted ones until the next sync.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Rule(r) => Some(r),
            _ => None,
        })
    }

    pub fn rules_mut(&mut self) -> impl Iterator<Item = &mut Rule> {
        self.stmts.iter_mut().filter_map(|s| match s {
            Stmt::Rule(r) => Some(r),
            _ => None,
        })
    }

    pub fn load_ids(&self) -> Vec<LoadId> {
        self.stmts
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Stmt::Load(_)))
            .map(|(i, _)| LoadId(i))
            .collect()
    }

    pub fn load(&self, id: LoadId) -> Option<&Load> {
        match self.stmts.get(id.0) {
            Some(Stmt::Load(l)) => Some(l),
            _ => None,
        }
    }

    pub fn load_mut(&mut self, id: LoadId) -> Option<&mut Load> {
        match self.stmts.get_mut(id.0) {
            Some(Stmt::Load(l)) => Some(l),
            _ => None,
        }
    }

    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Load(l) => Some(l),
            _ => None,
        })
    }

    /// Appends `rule` at the end of the file on the next sync.
    pub fn insert_rule(&mut self, rule: Rule) {
        self.inserts.push((self.stmts.len(), Stmt::Rule(rule)));
    }

    /// Inserts `load` before statement `index` on the next sync. Loads inserted
    /// at the same index keep their insertion order.
    pub fn insert_load(&mut self, load: Load, index: usize) {
        let index = index.min(self.stmts.len());
        self.inserts.push((index, Stmt::Load(load)));
    }

    /// Applies pending deletions and insertions.
    pub fn sync(&mut self) {
        let mut inserts = std::mem::take(&mut self.inserts);
        // Stable sort keeps insertion order among equal indices.
        inserts.sort_by_key(|(at, _)| *at);
        let mut inserts = inserts.into_iter().peekable();

        let old = std::mem::take(&mut self.stmts);
        let len = old.len();
        let mut stmts = Vec::with_capacity(len);
        for (i, stmt) in old.into_iter().enumerate() {
            while let Some((_, s)) = inserts.next_if(|(at, _)| *at <= i) {
                stmts.push(s);
            }
            stmts.push(stmt);
        }
        stmts.extend(inserts.filter(|(at, _)| *at >= len).map(|(_, s)| s));
        stmts.retain(|s| !s.is_deleted());
        self.stmts = stmts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;

    fn file(src: &str) -> File {
        File::parse("BUILD", "pkg", src, "rulemerge").unwrap()
    }

    #[test]
    fn rule_view() {
        let f = file(
            "go_library(\n    name = \"lib\",\n    srcs = [\"a.go\", \"b.go\"],\n    importpath = \"example.com/lib\",\n)\n",
        );
        let rule = f.rules().next().unwrap();
        assert_eq!(rule.kind(), "go_library");
        assert_eq!(rule.name(), "lib");
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["a.go", "b.go"]));
        assert_eq!(rule.attr_keys().collect::<Vec<_>>(), vec!["name", "srcs", "importpath"]);
    }

    #[test]
    fn positional_name() {
        let f = file("go_repository(\"com_github_x\", importpath = \"github.com/x\")\n");
        assert_eq!(f.rules().next().unwrap().name(), "com_github_x");
    }

    #[test]
    fn duplicate_keywords_are_not_rules() {
        let f = file("foo(name = \"a\", name = \"b\")\n");
        assert_eq!(f.rules().count(), 0);
        assert!(matches!(f.stmts()[0], Stmt::Other(_)));
    }

    #[test]
    fn set_attr_places_name_first() {
        let mut rule = Rule::new("go_test", "");
        rule.set_attr("srcs", vec!["a_test.go"]);
        rule.set_attr("name", "t");
        assert_eq!(rule.attr_keys().collect::<Vec<_>>(), vec!["name", "srcs"]);
        rule.set_attr("srcs", vec!["b_test.go"]);
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["b_test.go"]));
    }

    #[test]
    fn private_attrs_are_not_printed() {
        let mut f = File::new("BUILD", "pkg");
        let mut rule = Rule::new("go_library", "lib");
        rule.set_private_attr("_imports", vec!["fmt"]).unwrap();
        assert!(rule.private_attr("_imports").is_some());
        assert_eq!(
            rule.set_private_attr("imports", vec!["os"]),
            Err(PrivateKeyError("imports".to_string()))
        );
        assert!(rule.private_attr("imports").is_none());
        f.insert_rule(rule);
        f.sync();
        assert!(!f.format().contains("imports"));
    }

    #[test]
    fn keep_on_attribute() {
        let f = file("x(\n    name = \"x\",\n    srcs = [\"a.go\"],  # keep\n    deps = [\n        \":y\",  # keep\n    ],\n)\n");
        let rule = f.rules().next().unwrap();
        assert!(!rule.should_keep());
        assert!(rule.attr_kept("srcs"));
        assert!(!rule.attr_kept("deps"));
    }

    #[test]
    fn emptiness_follows_policy() {
        let config = MergeConfig::go_defaults();
        let mut rule = Rule::new("go_test", "go_default_test");
        rule.set_attr("size", "small");
        assert!(rule.is_empty(config.kind("go_test")));
        rule.set_attr("srcs", Vec::<String>::new());
        assert!(rule.is_empty(config.kind("go_test")));
        rule.set_attr("srcs", vec!["a_test.go"]);
        assert!(!rule.is_empty(config.kind("go_test")));
        assert!(!Rule::new("cc_library", "x").is_empty(config.kind("cc_library")));
    }

    #[test]
    fn deferred_deletion_and_insertion() {
        let mut f = file("a(name = \"a\")\n\nb(name = \"b\")\n");
        let ids = f.rule_ids();
        f.rule_mut(ids[0]).unwrap().delete();
        f.insert_rule(Rule::new("c", "c"));
        assert_eq!(f.rules().count(), 2);
        f.sync();
        let names: Vec<&str> = f.rules().map(Rule::name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn load_insertion_order() {
        let mut f = file("x(name = \"x\")\n");
        f.insert_load(Load::new("//b:b.bzl"), 0);
        f.insert_load(Load::new("//a:a.bzl"), 0);
        f.sync();
        let modules: Vec<&str> = f.loads().map(Load::module).collect();
        assert_eq!(modules, vec!["//b:b.bzl", "//a:a.bzl"]);
        assert!(matches!(f.stmts()[2], Stmt::Rule(_)));
    }

    #[test]
    fn load_symbols() {
        let f = file("load(\"@x//:def.bzl\", \"b\", my_c = \"c\")\n");
        let mut load = f.loads().next().unwrap().clone();
        assert!(load.has("b"));
        assert!(load.has("my_c"));
        load.add("a");
        load.add("b");
        assert_eq!(load.symbol_names().collect::<Vec<_>>(), vec!["a", "b", "my_c"]);
        assert!(load.remove("b"));
        assert_eq!(
            syntax::format_node(&load.to_node()),
            "load(\"@x//:def.bzl\", \"a\", my_c = \"c\")"
        );
    }

    #[test]
    fn directives() {
        let f = file("# rulemerge:ignore\n# rulemerge:prefix example.com/x\n\nx(name = \"x\")\n");
        let d = f.directives();
        assert!(d.is_ignored());
        assert_eq!(d.get("prefix"), Some("example.com/x"));
        assert!(!file("# gazelle:ignore\n").directives().is_ignored());
    }
}
