//! Merging one generated rule into its existing counterpart.

use im::OrdSet;
use tracing::debug;

use crate::config::{KindInfo, Platforms};
use crate::errors::{DiagnosticSink, MergeError};
use crate::rule::Rule;
use crate::value::merge_expr;

/// Where a merge happens, for diagnostics and value classification.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub path: &'a str,
    pub platforms: &'a Platforms,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The existing rule is kept and was not touched.
    Kept,
    Merged,
    /// The merged rule was empty and has been marked deleted.
    Deleted,
}

/// Merges `gen` into `old` in place.
///
/// Attributes of `old` that are kept or not in `mergeable` stay as they are.
/// Mergeable attributes are combined with [`merge_expr`], and removed when
/// nothing is left. Attributes only `gen` has are copied over, as are all of
/// `gen`'s private attributes. A value that cannot be merged is reported to
/// `sink` and left unchanged.
pub fn merge_rules(
    gen: &Rule,
    old: &mut Rule,
    mergeable: &OrdSet<String>,
    info: &KindInfo,
    ctx: &MergeContext<'_>,
    sink: &mut dyn DiagnosticSink,
) -> MergeOutcome {
    if old.should_keep() {
        debug!(kind = old.kind(), name = old.name(), "rule is kept");
        return MergeOutcome::Kept;
    }

    let keys: Vec<String> = old.attr_keys().map(str::to_string).collect();
    for key in keys {
        if old.attr_kept(&key) || !mergeable.contains(&key) {
            continue;
        }
        match merge_expr(gen.attr(&key), old.attr(&key), ctx.platforms) {
            Ok(Some(value)) => {
                if let Some(attr) = old.attr_mut(&key) {
                    attr.value = value;
                }
            }
            Ok(None) => {
                debug!(kind = old.kind(), name = old.name(), attr = key.as_str(), "attribute removed");
                old.del_attr(&key);
            }
            Err(shape) => sink.report(MergeError::from_shape(
                shape,
                ctx.path,
                old.kind(),
                old.name(),
                &key,
            )),
        }
    }

    for (key, attr) in gen.attrs() {
        if !old.has_attr(key) {
            old.insert_attr(key, attr.clone());
        }
    }

    old.copy_private_attrs(gen);

    if old.is_empty(info) {
        debug!(kind = old.kind(), name = old.name(), "rule is empty after merge");
        old.delete();
        return MergeOutcome::Deleted;
    }
    MergeOutcome::Merged
}
