//! One-time rewrites of legacy rule shapes, run before merging.

use tracing::debug;

use crate::config::{AttrMigration, FixupConfig, Platforms};
use crate::rule::{Attr, File, Rule};
use crate::syntax::{Expr, Node};
use crate::value::flatten;

/// Applies kind renames, then attribute migrations, then flattening to every
/// rule in `file` that is not kept. Returns the number of changes made.
pub fn apply_fixups(file: &mut File, fixups: &FixupConfig, platforms: &Platforms) -> usize {
    if fixups.is_empty() {
        return 0;
    }
    let mut changes = 0;
    for rule in file.rules_mut() {
        if rule.should_keep() || rule.is_deleted() {
            continue;
        }

        if let Some(kind) = fixups.kind_renames.get(rule.kind()) {
            debug!(from = rule.kind(), to = kind.as_str(), name = rule.name(), "renaming kind");
            rule.set_kind(kind);
            changes += 1;
        }

        let kind = rule.kind().to_string();
        for migration in fixups.attr_migrations.iter().filter(|m| m.kind == kind) {
            if migrate(rule, migration) {
                changes += 1;
            }
        }

        for flat in fixups.flatten.iter().filter(|f| f.kind == kind) {
            for key in &flat.attrs {
                if rule.attr_kept(key) {
                    continue;
                }
                let Some(attr) = rule.attr_mut(key) else {
                    continue;
                };
                let flattened = flatten(&attr.value, platforms);
                if flattened != attr.value {
                    attr.value = flattened;
                    changes += 1;
                }
            }
        }
    }
    changes
}

fn migrate(rule: &mut Rule, m: &AttrMigration) -> bool {
    if !rule.has_attr(&m.from) || rule.attr_kept(&m.from) {
        return false;
    }
    let target_is_list = rule.attr(&m.to).map(Node::is_list);
    match (target_is_list, m.into_list) {
        (None, _) => {}
        (Some(true), true) => {}
        _ => return false,
    }
    let Some(from) = rule.del_attr(&m.from) else {
        return false;
    };
    debug!(kind = rule.kind(), name = rule.name(), from = m.from.as_str(), to = m.to.as_str(), "migrating attribute");

    if !m.into_list {
        rule.insert_attr(&m.to, from);
        return true;
    }

    let element = from.value;
    match rule.attr_mut(&m.to) {
        Some(Attr {
            value: Node {
                expr: Expr::List { items, .. },
                ..
            },
            ..
        }) => {
            if !items.contains(&element) {
                items.push(element);
            }
        }
        _ => {
            let list = if element.is_list() {
                element
            } else {
                Node::list(vec![element])
            };
            rule.insert_attr(
                &m.to,
                Attr {
                    value: list,
                    comments: from.comments,
                },
            );
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlattenRule, MergeConfig};

    fn parse(src: &str) -> File {
        File::parse("BUILD", "pkg", src, "rulemerge").unwrap()
    }

    #[test]
    fn library_becomes_embed() {
        let config = MergeConfig::go_defaults();
        let mut file = parse("go_test(\n    name = \"t\",\n    library = \":go_default_library\",\n)\n");
        assert_eq!(apply_fixups(&mut file, &config.fixups, &config.platforms), 1);
        let rule = file.rules().next().unwrap();
        assert!(!rule.has_attr("library"));
        assert_eq!(rule.attr_strings("embed"), Some(vec![":go_default_library"]));
    }

    #[test]
    fn library_appends_to_existing_embed() {
        let config = MergeConfig::go_defaults();
        let mut file = parse("go_test(\n    name = \"t\",\n    embed = [\":a\"],\n    library = \":b\",\n)\n");
        apply_fixups(&mut file, &config.fixups, &config.platforms);
        let rule = file.rules().next().unwrap();
        assert_eq!(rule.attr_strings("embed"), Some(vec![":a", ":b"]));
    }

    #[test]
    fn kept_rules_are_skipped() {
        let config = MergeConfig::go_defaults();
        let mut file = parse("# keep\ngo_test(\n    name = \"t\",\n    library = \":b\",\n)\n");
        assert_eq!(apply_fixups(&mut file, &config.fixups, &config.platforms), 0);
        assert!(file.rules().next().unwrap().has_attr("library"));
    }

    #[test]
    fn renames_and_flattens() {
        let mut fixups = FixupConfig::default();
        fixups
            .kind_renames
            .insert("cgo_library".to_string(), "go_library".to_string());
        fixups.flatten.push(FlattenRule {
            kind: "go_library".to_string(),
            attrs: vec!["srcs".to_string()],
        });
        let mut file = parse(
            "cgo_library(\n    name = \"c\",\n    srcs = [\"b.go\"] + select({\"linux\": [\"a.go\"]}),\n)\n",
        );
        assert_eq!(apply_fixups(&mut file, &fixups, &Platforms::default()), 2);
        let rule = file.rules().next().unwrap();
        assert_eq!(rule.kind(), "go_library");
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["a.go", "b.go"]));
    }
}
