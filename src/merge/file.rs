//! Merging a whole generated rule set into a file.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::MergeConfig;
use crate::errors::DiagnosticSink;
use crate::label::Label;
use crate::merge::matcher::match_rule;
use crate::merge::rules::{merge_rules, MergeContext, MergeOutcome};
use crate::merge::MergePhase;
use crate::rule::{File, Rule, RuleId};
use crate::syntax::{Expr, Node};

/// What [`merge_file`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// The file carries an `ignore` directive and was not touched.
    pub ignored: bool,
    pub merged: usize,
    pub appended: usize,
    pub deleted: usize,
    /// Generated rules dropped because matching failed.
    pub skipped: usize,
}

enum Target {
    Merge(RuleId),
    Append,
    Skip,
}

/// Merges `gen_rules` into `file`.
///
/// Rules in `empty_rules` are merged first and deleted when nothing is left
/// in them. Each generated rule is then merged into its match or appended to
/// the file. When a generated rule matches an existing rule of another name,
/// references to the generated name inside generated rules are rewritten to
/// the existing name before anything is merged.
pub fn merge_file(
    file: &mut File,
    empty_rules: &[Rule],
    gen_rules: Vec<Rule>,
    phase: MergePhase,
    config: &MergeConfig,
    sink: &mut dyn DiagnosticSink,
) -> MergeReport {
    let mut report = MergeReport::default();
    if file.directives().is_ignored() {
        info!(path = file.path.as_str(), "file is ignored");
        report.ignored = true;
        return report;
    }

    let path = file.path.clone();
    let ctx = MergeContext {
        path: &path,
        platforms: &config.platforms,
    };

    // Empty rules. Failed matches are expected here and only logged.
    for empty in empty_rules {
        let info = config.kind(empty.kind());
        let id = {
            let ids = file.rule_ids();
            let candidates = live_rules(file, &ids);
            match match_rule(&candidates.iter().map(|(_, r)| *r).collect::<Vec<_>>(), empty, info) {
                Ok(Some(i)) => candidates[i].0,
                Ok(None) => continue,
                Err(err) => {
                    debug!(path = path.as_str(), "no match for empty rule: {err}");
                    continue;
                }
            }
        };
        if let Some(old) = file.rule_mut(id) {
            if merge_rules(empty, old, phase.attrs(info), info, &ctx, sink) == MergeOutcome::Deleted {
                report.deleted += 1;
            }
        }
    }
    file.sync();

    // Match every generated rule before merging any of them.
    let ids = file.rule_ids();
    let mut targets = Vec::with_capacity(gen_rules.len());
    let mut substitutions: HashMap<String, String> = HashMap::new();
    {
        let candidates = live_rules(file, &ids);
        let rules: Vec<&Rule> = candidates.iter().map(|(_, r)| *r).collect();
        for gen in &gen_rules {
            match match_rule(&rules, gen, config.kind(gen.kind())) {
                Ok(Some(i)) => {
                    let (id, old) = candidates[i];
                    if !gen.name().is_empty() && old.name() != gen.name() {
                        substitutions.insert(gen.name().to_string(), old.name().to_string());
                    }
                    targets.push(Target::Merge(id));
                }
                Ok(None) => targets.push(Target::Append),
                Err(err) => {
                    sink.report(err);
                    targets.push(Target::Skip);
                }
            }
        }
    }

    let mut gen_rules = gen_rules;
    if !substitutions.is_empty() {
        for gen in &mut gen_rules {
            substitute_references(gen, &substitutions, &file.pkg, config);
        }
    }

    for (gen, target) in gen_rules.into_iter().zip(targets) {
        match target {
            Target::Merge(id) => {
                let info = config.kind(gen.kind());
                let Some(old) = file.rule_mut(id) else {
                    continue;
                };
                match merge_rules(&gen, old, phase.attrs(info), info, &ctx, sink) {
                    MergeOutcome::Deleted => report.deleted += 1,
                    MergeOutcome::Merged => report.merged += 1,
                    MergeOutcome::Kept => {}
                }
            }
            Target::Append => {
                debug!(kind = gen.kind(), name = gen.name(), "appending new rule");
                file.insert_rule(gen);
                report.appended += 1;
            }
            Target::Skip => report.skipped += 1,
        }
    }
    file.sync();

    debug!(path = path.as_str(), ?report, "merged file");
    report
}

fn live_rules<'f>(file: &'f File, ids: &[RuleId]) -> Vec<(RuleId, &'f Rule)> {
    ids.iter()
        .filter_map(|&id| file.rule(id).map(|r| (id, r)))
        .filter(|(_, r)| !r.is_deleted())
        .collect()
}

/// Rewrites `:name` and `//<pkg>:name` references in the kind's substitute
/// attributes of `rule`.
fn substitute_references(
    rule: &mut Rule,
    substitutions: &HashMap<String, String>,
    pkg: &str,
    config: &MergeConfig,
) {
    let info = config.kind(rule.kind());
    for key in &info.substitute_attrs {
        let Some(attr) = rule.attr_mut(key) else {
            continue;
        };
        attr.value.walk_mut(&mut |node: &mut Node| {
            let Expr::String(value) = &mut node.expr else {
                return;
            };
            let Ok(label) = Label::parse(value) else {
                return;
            };
            if !label.repo.is_empty() || !label.is_same_package(pkg) {
                return;
            }
            if let Some(renamed) = substitutions.get(&label.name) {
                *value = if label.relative {
                    format!(":{renamed}")
                } else {
                    format!("//{}:{renamed}", label.pkg)
                };
            }
        });
    }
}
