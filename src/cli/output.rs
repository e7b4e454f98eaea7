//! User-facing output for the CLI.
//!
//! Results go to stdout, summaries to stderr. Color is used only when the
//! stream is a terminal.

use std::io::{self, IsTerminal, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::merge::MergeReport;

// ============================================================================
// STREAMS
// ============================================================================

fn stdout() -> StandardStream {
    let choice = if io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn stderr() -> StandardStream {
    let choice = if io::stderr().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stderr(choice)
}

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints a line diff of `before` against `after`, headed by `path`.
/// Prints nothing when the two are equal.
pub fn print_diff(path: &str, before: &str, after: &str) -> io::Result<()> {
    if before == after {
        return Ok(());
    }
    let mut out = stdout();
    out.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(out, "--- {path}")?;
    writeln!(out, "+++ {path}")?;
    out.reset()?;
    let changeset = Changeset::new(before.trim_end(), after.trim_end(), "\n");
    write_diff(&mut out, &changeset.diffs)
}

/// Writes `text` to stdout unchanged.
pub fn print_text(text: &str) -> io::Result<()> {
    let mut out = stdout();
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// Prints a one-line summary of a file merge on stderr.
pub fn print_report(path: &str, report: &MergeReport) -> io::Result<()> {
    let mut err = stderr();
    if report.ignored {
        err.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(err, "{path}: ignored")?;
        return err.reset();
    }
    err.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(err, "{path}:")?;
    err.reset()?;
    writeln!(
        err,
        " {} merged, {} appended, {} deleted, {} skipped",
        report.merged, report.appended, report.deleted, report.skipped
    )
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn write_diff(out: &mut StandardStream, diffs: &[Difference]) -> io::Result<()> {
    for diff in diffs {
        match diff {
            Difference::Same(text) => {
                out.reset()?;
                for line in text.lines() {
                    writeln!(out, " {line}")?;
                }
            }
            Difference::Add(text) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                for line in text.lines() {
                    writeln!(out, "+{line}")?;
                }
            }
            Difference::Rem(text) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                for line in text.lines() {
                    writeln!(out, "-{line}")?;
                }
            }
        }
    }
    out.reset()
}
