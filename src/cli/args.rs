//! Command-line arguments and subcommands.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::merge::MergePhase;

#[derive(Debug, Parser)]
#[command(
    name = "rulemerge",
    version,
    about = "Merge generated build rules into hand-edited build files."
)]
pub struct Args {
    /// Log more. Repeat for debug and trace output.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge the rules of a generated file into an existing build file.
    Merge {
        /// The existing build file.
        #[arg(required = true)]
        file: PathBuf,
        /// A build file holding the generated rules.
        #[arg(long = "gen", value_name = "FILE")]
        generated: PathBuf,
        /// A build file holding rules to delete when nothing is left of them.
        #[arg(long, value_name = "FILE")]
        empty: Option<PathBuf>,
        /// A YAML merge configuration. Defaults to the built-in Go catalogue.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// The package the file belongs to, used to rewrite renamed labels.
        #[arg(long, default_value = "")]
        pkg: String,
        #[arg(long, value_enum, default_value_t = Phase::Pre)]
        phase: Phase,
        /// Apply legacy fixups before merging.
        #[arg(long)]
        fix: bool,
        /// Write the result back instead of printing it.
        #[arg(long, conflicts_with = "diff")]
        write: bool,
        /// Print a diff against the existing file.
        #[arg(long)]
        diff: bool,
    },
    /// Bring load statements in line with the symbols each file uses.
    FixLoads {
        /// Build files, or directories to search for BUILD and BUILD.bazel files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Write changed files back instead of printing diffs.
        #[arg(long)]
        write: bool,
    },
    /// Reformat a build file.
    Format {
        #[arg(required = true)]
        file: PathBuf,
        #[arg(long)]
        write: bool,
    },
    /// Print the syntax tree of a build file as JSON.
    Ast {
        #[arg(required = true)]
        file: PathBuf,
    },
}

/// Which attribute set of each kind is merged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Phase {
    /// Before dependency resolution.
    Pre,
    /// After dependency resolution.
    Post,
}

impl From<Phase> for MergePhase {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Pre => MergePhase::PreResolve,
            Phase::Post => MergePhase::PostResolve,
        }
    }
}
