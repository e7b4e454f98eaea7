//! Finding the existing rule a generated rule corresponds to.

use tracing::trace;

use crate::config::KindInfo;
use crate::errors::MergeError;
use crate::rule::Rule;
use crate::syntax::format_node;

/// Returns the index in `candidates` of the rule matching `target`.
///
/// Rules are matched, in order of preference:
/// 1. by name, which requires the kinds to agree;
/// 2. by each of the kind's match attributes that `target` sets;
/// 3. for `match_any` kinds, by being the only rule of that kind.
///
/// More than one equally good candidate is an error, as is a name match with
/// a different kind. `Ok(None)` means `target` is new.
pub fn match_rule(
    candidates: &[&Rule],
    target: &Rule,
    info: &KindInfo,
) -> Result<Option<usize>, MergeError> {
    let kind = target.kind();
    let name = target.name();

    if !name.is_empty() {
        let named: Vec<usize> = positions(candidates, |c| c.name() == name);
        match named.as_slice() {
            [] => {}
            [i] => {
                let existing = candidates[*i];
                if existing.kind() == kind {
                    trace!(kind, name, "matched by name");
                    return Ok(Some(*i));
                }
                return Err(kind_conflict(target, existing));
            }
            many => {
                if let Some(other) = many.iter().map(|&i| candidates[i]).find(|c| c.kind() != kind) {
                    return Err(kind_conflict(target, other));
                }
                return Err(MergeError::AmbiguousMatch {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    reason: format!("{} existing rules are named {name:?}", many.len()),
                });
            }
        }
    }

    for attr in &info.match_attrs {
        let Some(want) = target.attr(attr).map(format_node) else {
            continue;
        };
        let hits = positions(candidates, |c| {
            c.kind() == kind && c.attr(attr).is_some_and(|v| format_node(v) == want)
        });
        match hits.as_slice() {
            [] => continue,
            [i] => {
                trace!(kind, name, attr = attr.as_str(), "matched by attribute");
                return Ok(Some(*i));
            }
            many => {
                return Err(MergeError::AmbiguousMatch {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    reason: format!("{} existing rules have {attr} = {want}", many.len()),
                })
            }
        }
    }

    if info.match_any {
        let same_kind = positions(candidates, |c| c.kind() == kind);
        match same_kind.as_slice() {
            [] => {}
            [i] => {
                trace!(kind, name, "matched as the only rule of its kind");
                return Ok(Some(*i));
            }
            many => {
                return Err(MergeError::AmbiguousMatch {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    reason: format!("{} existing rules have kind {kind}", many.len()),
                })
            }
        }
    }

    Ok(None)
}

fn positions(candidates: &[&Rule], pred: impl Fn(&Rule) -> bool) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect()
}

fn kind_conflict(target: &Rule, existing: &Rule) -> MergeError {
    MergeError::KindConflict {
        kind: target.kind().to_string(),
        name: target.name().to_string(),
        existing_kind: existing.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::errors::ErrorClass;

    fn lib(name: &str, importpath: &str) -> Rule {
        let mut r = Rule::new("go_library", name);
        r.set_attr("importpath", importpath);
        r
    }

    #[test]
    fn name_match_wins_over_attributes() {
        let config = MergeConfig::go_defaults();
        let a = lib("a", "example.com/x");
        let b = lib("b", "example.com/y");
        let target = lib("b", "example.com/x");
        let got = match_rule(&[&a, &b], &target, config.kind("go_library")).unwrap();
        assert_eq!(got, Some(1));
    }

    #[test]
    fn attribute_match() {
        let config = MergeConfig::go_defaults();
        let old = lib("custom_name", "example.com/x");
        let target = lib("go_default_library", "example.com/x");
        let got = match_rule(&[&old], &target, config.kind("go_library")).unwrap();
        assert_eq!(got, Some(0));
    }

    #[test]
    fn attribute_requires_target_value() {
        let config = MergeConfig::go_defaults();
        let old = lib("custom_name", "example.com/x");
        let target = Rule::new("go_library", "go_default_library");
        let got = match_rule(&[&old], &target, config.kind("go_library")).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn match_any_singleton() {
        let config = MergeConfig::go_defaults();
        let old = Rule::new("go_test", "my_test");
        let target = Rule::new("go_test", "go_default_test");
        assert_eq!(
            match_rule(&[&old], &target, config.kind("go_test")).unwrap(),
            Some(0)
        );

        let other = Rule::new("go_test", "other_test");
        let err = match_rule(&[&old, &other], &target, config.kind("go_test")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Ambiguous);
    }

    #[test]
    fn name_with_other_kind_conflicts() {
        let config = MergeConfig::go_defaults();
        let old = Rule::new("go_binary", "x");
        let target = Rule::new("go_library", "x");
        let err = match_rule(&[&old], &target, config.kind("go_library")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::KindConflict);
    }

    #[test]
    fn duplicate_names_of_mixed_kinds_conflict() {
        let config = MergeConfig::go_defaults();
        let a = Rule::new("go_library", "x");
        let b = Rule::new("go_binary", "x");
        let target = Rule::new("go_library", "x");
        for order in [[&a, &b], [&b, &a]] {
            let err = match_rule(&order, &target, config.kind("go_library")).unwrap_err();
            assert_eq!(err.class(), ErrorClass::KindConflict);
        }
    }

    #[test]
    fn duplicate_names_of_one_kind_are_ambiguous() {
        let config = MergeConfig::go_defaults();
        let a = Rule::new("go_library", "x");
        let b = Rule::new("go_library", "x");
        let target = Rule::new("go_library", "x");
        let err = match_rule(&[&a, &b], &target, config.kind("go_library")).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Ambiguous);
    }

    #[test]
    fn no_match() {
        let config = MergeConfig::go_defaults();
        let old = Rule::new("go_library", "a");
        let target = Rule::new("go_library", "b");
        assert_eq!(
            match_rule(&[&old], &target, config.kind("go_library")).unwrap(),
            None
        );
    }
}
