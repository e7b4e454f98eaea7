//! Merging generated build rules into hand-edited build files.
//!
//! A build file is parsed into a [`syntax::SyntaxFile`], wrapped as a
//! [`rule::File`] of rules and loads, and then updated in place:
//! [`merge::merge_file`] folds generated rules into the existing ones while
//! respecting `# keep` comments, and [`merge::fix_loads`] brings `load`
//! statements in line with the rules that remain.

pub mod cli;
pub mod config;
pub mod errors;
pub mod fixups;
pub mod label;
pub mod merge;
pub mod rule;
pub mod syntax;
pub mod value;

pub use config::{KindInfo, LoadInfo, MergeConfig};
pub use errors::{DiagnosticSink, Diagnostics, ErrorClass, MergeError, ParseError};
pub use merge::{fix_loads, merge_file, MergePhase, MergeReport};
pub use rule::{File, Load, Rule};
