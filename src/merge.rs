//! Merging generated rules into existing build files.
//!
//! [`merge_file`] drives the whole process for one file: it folds empty rules
//! into the file, then matches every generated rule against the existing ones
//! with [`match_rule`] and combines matched pairs with [`merge_rules`].
//! [`fix_loads`] runs afterwards to bring `load` statements in line with the
//! rules that remain.

pub mod file;
pub mod loads;
pub mod matcher;
pub mod rules;

pub use file::{merge_file, MergeReport};
pub use loads::fix_loads;
pub use matcher::match_rule;
pub use rules::{merge_rules, MergeContext, MergeOutcome};

use im::OrdSet;

use crate::config::KindInfo;

/// Which attribute set of a kind is merged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MergePhase {
    /// Before dependency resolution: `mergeable_attrs`.
    #[default]
    PreResolve,
    /// After dependency resolution: `resolve_attrs`.
    PostResolve,
}

impl MergePhase {
    pub fn attrs(self, info: &KindInfo) -> &OrdSet<String> {
        match self {
            MergePhase::PreResolve => &info.mergeable_attrs,
            MergePhase::PostResolve => &info.resolve_attrs,
        }
    }
}
