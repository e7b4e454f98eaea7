//! Keeping `load` statements in line with the symbols a file uses.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::LoadInfo;
use crate::rule::{File, Load, LoadId, Stmt};
use crate::syntax::{Expr, Node};

/// Rewrites the loads of `file` so each known source provides exactly the
/// symbols the file uses.
///
/// Sources are processed in `known` order. The first load of a source gains
/// missing symbols and loses unused ones; later loads of the same source only
/// lose symbols and are deleted once empty. Symbols the source does not
/// declare are never removed, and a symbol loaded from a module not in
/// `known` is left to that load. A source with no load yet gets a new one
/// after the existing loads.
pub fn fix_loads(file: &mut File, known: &[LoadInfo]) {
    file.sync();

    let owner = symbol_owners(known);
    let known_modules: HashSet<&str> = known.iter().map(|l| l.name.as_str()).collect();
    let foreign: HashSet<String> = file
        .loads()
        .filter(|l| !known_modules.contains(l.module()))
        .flat_map(|l| l.symbol_names().map(str::to_string))
        .collect();
    let used = used_symbols(file);

    let mut created: Vec<(Load, usize)> = Vec::new();
    for (index, source) in known.iter().enumerate() {
        let owned: Vec<&str> = source
            .symbols
            .iter()
            .map(String::as_str)
            .filter(|s| owner.get(s) == Some(&index))
            .collect();
        let wanted: BTreeSet<&str> = owned
            .iter()
            .copied()
            .filter(|s| used.contains(*s) && !foreign.contains(*s))
            .collect();

        let ids: Vec<LoadId> = file
            .load_ids()
            .into_iter()
            .filter(|&id| file.load(id).is_some_and(|l| l.module() == source.name))
            .collect();

        match ids.split_first() {
            Some((&first, rest)) => {
                if let Some(load) = file.load_mut(first) {
                    reconcile(load, &owned, &wanted, true);
                }
                for &id in rest {
                    if let Some(load) = file.load_mut(id) {
                        reconcile(load, &owned, &BTreeSet::new(), false);
                    }
                }
            }
            None if !wanted.is_empty() => {
                let mut load = Load::new(&source.name);
                for sym in &wanted {
                    load.add(sym);
                }
                let at = new_load_index(file, &source.after);
                debug!(module = source.name.as_str(), at, "creating load");
                created.push((load, at));
            }
            None => {}
        }
    }

    for (load, at) in created {
        file.insert_load(load, at);
    }
    file.sync();
}

/// Maps each symbol to the first source that declares it.
fn symbol_owners(known: &[LoadInfo]) -> HashMap<&str, usize> {
    let mut owner = HashMap::new();
    for (i, source) in known.iter().enumerate() {
        for sym in &source.symbols {
            owner.entry(sym.as_str()).or_insert(i);
        }
    }
    owner
}

fn reconcile(load: &mut Load, owned: &[&str], wanted: &BTreeSet<&str>, add: bool) {
    for sym in owned {
        if !wanted.contains(sym) && load.remove(sym) {
            debug!(module = load.module(), symbol = *sym, "removing unused symbol");
        }
    }
    if add {
        load.dedup();
        for sym in wanted {
            load.add(sym);
        }
    }
    if load.is_empty() {
        load.delete();
    }
}

/// Names called anywhere in the file, plus bare identifiers passed as
/// positional arguments, as in `wrapper(go_library, ...)`.
fn used_symbols(file: &File) -> HashSet<String> {
    let mut used = HashSet::new();
    for stmt in file.stmts() {
        let node = match stmt {
            Stmt::Load(_) => continue,
            Stmt::Rule(r) if r.is_deleted() => continue,
            Stmt::Rule(r) => r.to_node(),
            Stmt::Other(n) => n.clone(),
        };
        node.walk(&mut |n: &Node| {
            if let Expr::Call { callee, args } = &n.expr {
                if let Some(name) = callee.as_ident() {
                    used.insert(name.to_string());
                }
                for arg in args {
                    if let Some(name) = arg.as_ident() {
                        used.insert(name.to_string());
                    }
                }
            }
        });
    }
    used
}

/// Where a new load goes: below leading comment blocks and existing loads,
/// and below any call to one of `after`.
fn new_load_index(file: &File, after: &[String]) -> usize {
    let stmts = file.stmts();
    let mut index = stmts
        .iter()
        .take_while(|s| matches!(s, Stmt::Other(n) if matches!(n.expr, Expr::CommentBlock)))
        .count();
    if let Some(last) = stmts
        .iter()
        .rposition(|s| matches!(s, Stmt::Load(l) if !l.is_deleted()))
    {
        index = index.max(last + 1);
    }
    for (i, stmt) in stmts.iter().enumerate() {
        if after.iter().any(|a| stmt.is_call_to(a)) {
            index = index.max(i + 1);
        }
    }
    index
}
