//! The rulemerge command line.
//!
//! Every subcommand reads build files from disk, runs one library operation
//! on them, and prints or writes the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::cli::args::{Args, Command, Phase};
use crate::config::MergeConfig;
use crate::errors::LogSink;
use crate::fixups::apply_fixups;
use crate::merge::{fix_loads, merge_file};
use crate::rule::{File, Rule};
use crate::syntax;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Merge {
            file,
            generated,
            empty,
            config,
            pkg,
            phase,
            fix,
            write,
            diff,
        } => handle_merge(MergeArgs {
            file,
            generated,
            empty,
            config,
            pkg,
            phase,
            fix,
            write,
            diff,
        }),
        Command::FixLoads {
            paths,
            config,
            write,
        } => handle_fix_loads(&paths, config.as_deref(), write),
        Command::Format { file, write } => handle_format(&file, write),
        Command::Ast { file } => handle_ast(&file),
    };

    if let Err(report) = result {
        eprintln!("{report:?}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when run from a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

// ============================================================================
// SUBCOMMANDS
// ============================================================================

struct MergeArgs {
    file: PathBuf,
    generated: PathBuf,
    empty: Option<PathBuf>,
    config: Option<PathBuf>,
    pkg: String,
    phase: Phase,
    fix: bool,
    write: bool,
    diff: bool,
}

fn handle_merge(args: MergeArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (before, mut file) = read_build_file(&args.file, &args.pkg, &config)?;
    let generated = read_rules(&args.generated, &args.pkg, &config)?;
    let empty = match &args.empty {
        Some(path) => read_rules(path, &args.pkg, &config)?,
        None => Vec::new(),
    };

    if args.fix {
        let changes = apply_fixups(&mut file, &config.fixups, &config.platforms);
        debug!(changes, "applied fixups");
    }

    let report = merge_file(
        &mut file,
        &empty,
        generated,
        args.phase.into(),
        &config,
        &mut LogSink,
    );
    output::print_report(&display(&args.file), &report).into_diagnostic()?;
    if report.ignored {
        return emit(&args.file, &before, &before, args.write, args.diff);
    }
    fix_loads(&mut file, &config.loads);
    emit(&args.file, &before, &file.format(), args.write, args.diff)
}

fn handle_fix_loads(paths: &[PathBuf], config: Option<&Path>, write: bool) -> Result<()> {
    let config = load_config(config)?;
    for path in build_files(paths) {
        let (before, mut file) = read_build_file(&path, "", &config)?;
        if file.directives().is_ignored() {
            debug!(path = %path.display(), "file is ignored");
            continue;
        }
        fix_loads(&mut file, &config.loads);
        emit(&path, &before, &file.format(), write, !write)?;
    }
    Ok(())
}

fn handle_format(path: &Path, write: bool) -> Result<()> {
    let source = read(path)?;
    let tree = syntax::parse(&display(path), &source)?;
    emit(path, &source, &syntax::format_file(&tree), write, false)
}

fn handle_ast(path: &Path) -> Result<()> {
    let source = read(path)?;
    let tree = syntax::parse(&display(path), &source)?;
    let json = serde_json::to_string_pretty(&tree).into_diagnostic()?;
    output::print_text(&format!("{json}\n")).into_diagnostic()
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<MergeConfig> {
    match path {
        Some(path) => Ok(MergeConfig::load(path)?),
        None => Ok(MergeConfig::go_defaults()),
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("cannot read {}", path.display()))
}

fn read_build_file(path: &Path, pkg: &str, config: &MergeConfig) -> Result<(String, File)> {
    let source = read(path)?;
    let file = File::parse(&display(path), pkg, &source, &config.directive_prefix)?;
    Ok((source, file))
}

fn read_rules(path: &Path, pkg: &str, config: &MergeConfig) -> Result<Vec<Rule>> {
    let (_, file) = read_build_file(path, pkg, config)?;
    Ok(file.rules().cloned().collect())
}

/// Expands directories into the build files beneath them, in path order.
fn build_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let found = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| matches!(entry.file_name().to_str(), Some("BUILD" | "BUILD.bazel")))
            .map(|entry| entry.into_path());
        files.extend(found);
    }
    files
}

fn emit(path: &Path, before: &str, after: &str, write: bool, diff: bool) -> Result<()> {
    if write {
        if before != after {
            fs::write(path, after)
                .into_diagnostic()
                .wrap_err_with(|| format!("cannot write {}", path.display()))?;
        }
        return Ok(());
    }
    if diff {
        return output::print_diff(&display(path), before, after).into_diagnostic();
    }
    output::print_text(after).into_diagnostic()
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
