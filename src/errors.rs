//! Error types and diagnostic reporting.
//!
//! Merge errors never abort a file merge. They are handed to a
//! [`DiagnosticSink`] supplied by the caller, and the affected rule or
//! attribute is left as it was in the existing file. Parse and configuration
//! errors are ordinary `Result` errors rendered through miette.

use std::path::PathBuf;
use std::sync::Arc;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::syntax::Span;

// ============================================================================
// MERGE ERRORS
// ============================================================================

/// Errors surfaced while matching and merging rules.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("ambiguous match for {kind} \"{name}\": {reason}")]
    #[diagnostic(
        code(rulemerge::merge::ambiguous),
        help("give the existing rules distinct names or mark the intended one with `# keep`")
    )]
    AmbiguousMatch {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("rule \"{name}\" already exists with kind {existing_kind}, cannot merge a {kind} into it")]
    #[diagnostic(
        code(rulemerge::merge::kind_conflict),
        help("rename the existing rule or mark it with `# keep`")
    )]
    KindConflict {
        kind: String,
        name: String,
        existing_kind: String,
    },

    #[error("{path}: attribute {attr} of {kind} \"{name}\" was left unchanged: {reason}")]
    #[diagnostic(code(rulemerge::value::malformed))]
    MalformedExpression {
        path: String,
        kind: String,
        name: String,
        attr: String,
        reason: String,
    },

    #[error("{path}: attribute {attr} of {kind} \"{name}\" has an invalid shape: {reason}")]
    #[diagnostic(
        code(rulemerge::value::structural),
        help("the generated value breaks the select() contract; this is a generator bug")
    )]
    StructuralInvariant {
        path: String,
        kind: String,
        name: String,
        attr: String,
        reason: String,
    },
}

/// Coarse classification of a [`MergeError`], stable across runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Ambiguous,
    KindConflict,
    Malformed,
    Structural,
}

impl MergeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MergeError::AmbiguousMatch { .. } => ErrorClass::Ambiguous,
            MergeError::KindConflict { .. } => ErrorClass::KindConflict,
            MergeError::MalformedExpression { .. } => ErrorClass::Malformed,
            MergeError::StructuralInvariant { .. } => ErrorClass::Structural,
        }
    }

    /// Lifts a value-level shape error into a merge error for one attribute.
    pub fn from_shape(error: ShapeError, path: &str, kind: &str, name: &str, attr: &str) -> Self {
        let (path, kind, name, attr) = (
            path.to_string(),
            kind.to_string(),
            name.to_string(),
            attr.to_string(),
        );
        match error {
            ShapeError::Malformed(reason) => MergeError::MalformedExpression {
                path,
                kind,
                name,
                attr,
                reason,
            },
            ShapeError::Structural(reason) => MergeError::StructuralInvariant {
                path,
                kind,
                name,
                attr,
                reason,
            },
        }
    }
}

/// Why an expression does not fit the list + select composite shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("{0}")]
    Malformed(String),
    #[error("{0}")]
    Structural(String),
}

// ============================================================================
// PARSE, KEY AND CONFIG ERRORS
// ============================================================================

#[derive(Error, Diagnostic, Debug)]
#[error("Parse error: {message}")]
#[diagnostic(code(rulemerge::parse))]
pub struct ParseError {
    pub message: String,
    #[source_code]
    pub src: Arc<NamedSource<String>>,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(name: &str, source: &str, message: impl Into<String>, span: Span) -> Self {
        let len = span.end.saturating_sub(span.start);
        Self {
            message: message.into(),
            src: Arc::new(NamedSource::new(name, source.to_string())),
            span: (span.start, len).into(),
        }
    }
}

/// A private attribute key without the leading underscore.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("private attribute key {0:?} must start with an underscore")]
#[diagnostic(code(rulemerge::private_key))]
pub struct PrivateKeyError(pub String);

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("cannot read {}", path.display())]
    #[diagnostic(code(rulemerge::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    #[diagnostic(code(rulemerge::config::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// DIAGNOSTIC SINKS
// ============================================================================

/// Receives recoverable merge errors.
pub trait DiagnosticSink {
    fn report(&mut self, error: MergeError);
}

/// Collects every reported error, in report order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub errors: Vec<MergeError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn classes(&self) -> Vec<ErrorClass> {
        self.errors.iter().map(MergeError::class).collect()
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, error: MergeError) {
        self.errors.push(error);
    }
}

/// Forwards errors to `tracing`. Structural violations log at error level.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, error: MergeError) {
        match error.class() {
            ErrorClass::Structural => tracing::error!(class = ?error.class(), "{error}"),
            class => tracing::warn!(?class, "{error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_errors_keep_their_class() {
        let e = MergeError::from_shape(
            ShapeError::Structural("select() takes one argument".into()),
            "pkg/BUILD",
            "go_library",
            "lib",
            "srcs",
        );
        assert_eq!(e.class(), ErrorClass::Structural);
        assert!(e.to_string().contains("srcs"));

        let e = MergeError::from_shape(ShapeError::Malformed("x".into()), "", "k", "n", "a");
        assert_eq!(e.class(), ErrorClass::Malformed);
    }

    #[test]
    fn diagnostics_collect_in_order() {
        let mut sink = Diagnostics::new();
        sink.report(MergeError::AmbiguousMatch {
            kind: "go_library".into(),
            name: "x".into(),
            reason: "two rules".into(),
        });
        sink.report(MergeError::KindConflict {
            kind: "go_library".into(),
            name: "x".into(),
            existing_kind: "go_binary".into(),
        });
        assert_eq!(
            sink.classes(),
            vec![ErrorClass::Ambiguous, ErrorClass::KindConflict]
        );
    }

    #[test]
    fn parse_error_span() {
        let e = ParseError::new("BUILD", "x(", "unclosed call", Span { start: 1, end: 2 });
        assert_eq!(e.span.offset(), 1);
        assert_eq!(e.span.len(), 1);
    }
}
