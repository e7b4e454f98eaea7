//! Build labels.
//!
//! Only the parts of label syntax the merge engine relies on are supported:
//! `@repo//pkg:name`, `@@repo//pkg:name`, `//pkg:name`, `//pkg`, `:name` and a
//! bare `name`. The latter two are package-relative.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@{1,2}([A-Za-z0-9_.~+\-]*))?(?://([^:]*))?(?::(.+))?$")
        .expect("static label pattern")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid label {0:?}")]
pub struct LabelError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    pub repo: String,
    pub pkg: String,
    pub name: String,
    /// True for `:name` and bare `name` forms.
    pub relative: bool,
}

impl Label {
    pub fn parse(text: &str) -> Result<Label, LabelError> {
        let invalid = || LabelError(text.to_string());
        if text.is_empty() {
            return Err(invalid());
        }

        if !text.starts_with('@') && !text.starts_with("//") && !text.starts_with(':') {
            if text.contains(':') || text.contains("//") {
                return Err(invalid());
            }
            return Ok(Label {
                repo: String::new(),
                pkg: String::new(),
                name: text.to_string(),
                relative: true,
            });
        }

        let caps = LABEL.captures(text).ok_or_else(invalid)?;
        let repo = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let pkg = caps.get(2).map(|m| m.as_str().to_string());
        let name = caps.get(3).map(|m| m.as_str().to_string());

        match (pkg, name) {
            (None, Some(name)) if text.starts_with(':') => Ok(Label {
                repo,
                pkg: String::new(),
                name,
                relative: true,
            }),
            (Some(pkg), Some(name)) => Ok(Label {
                repo,
                pkg,
                name,
                relative: false,
            }),
            (Some(pkg), None) => {
                let name = match pkg.rsplit('/').next() {
                    Some(last) if !last.is_empty() => last.to_string(),
                    _ if !repo.is_empty() => repo.clone(),
                    _ => return Err(invalid()),
                };
                Ok(Label {
                    repo,
                    pkg,
                    name,
                    relative: false,
                })
            }
            // `@repo` alone names the repository's root target.
            (None, None) if !repo.is_empty() => Ok(Label {
                name: repo.clone(),
                repo,
                pkg: String::new(),
                relative: false,
            }),
            _ => Err(invalid()),
        }
    }

    /// True if this label points into package `pkg` of the main repository.
    pub fn is_same_package(&self, pkg: &str) -> bool {
        self.relative || (self.repo.is_empty() && self.pkg == pkg)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}:{}", self.pkg, self.name)
    }
}

/// The target name of a label-like string, without parsing it fully.
pub fn name_of(text: &str) -> &str {
    match text.rfind(':') {
        Some(i) => &text[i + 1..],
        None => text.rsplit('/').next().unwrap_or(text),
    }
}
