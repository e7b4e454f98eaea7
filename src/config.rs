//! Merge configuration.
//!
//! Everything the engine needs to know about rule kinds and load sources is
//! carried in a [`MergeConfig`] built once by the caller and passed by
//! reference. It can be read from YAML or taken from [`MergeConfig::go_defaults`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use im::OrdSet;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::label;

pub const DEFAULT_DIRECTIVE_PREFIX: &str = "rulemerge";

/// Per-kind merge policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindInfo {
    /// At most one rule of this kind is expected per file, so a lone
    /// candidate of the same kind matches regardless of name.
    pub match_any: bool,
    /// Attributes that identify a rule when names differ, tried in order.
    pub match_attrs: Vec<String>,
    /// Attributes whose presence keeps a rule from being deleted as empty.
    pub non_empty_attrs: OrdSet<String>,
    /// Attributes merged before dependency resolution.
    pub mergeable_attrs: OrdSet<String>,
    /// Attributes merged after dependency resolution.
    pub resolve_attrs: OrdSet<String>,
    /// Attributes that may hold same-package references to other rules.
    pub substitute_attrs: OrdSet<String>,
}

fn set(items: &[&str]) -> OrdSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// A known load source and the symbols it provides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadInfo {
    pub name: String,
    pub symbols: Vec<String>,
    /// A new load of this source goes after any statement calling one of these.
    #[serde(default)]
    pub after: Vec<String>,
}

impl LoadInfo {
    fn new(name: &str, symbols: &[&str], after: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            after: after.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// PLATFORMS
// ============================================================================

/// How a `select` key scopes its value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlatformClass {
    Os,
    Arch,
    /// An `os_arch` pair.
    Platform,
}

/// Known operating systems and architectures used to classify `select` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Platforms {
    pub os: BTreeSet<String>,
    pub arch: BTreeSet<String>,
}

impl Default for Platforms {
    fn default() -> Self {
        const OS: &[&str] = &[
            "aix", "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux",
            "netbsd", "openbsd", "plan9", "solaris", "windows",
        ];
        const ARCH: &[&str] = &[
            "386", "amd64", "arm", "arm64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
            "ppc64le", "riscv64", "s390x", "wasm",
        ];
        Self {
            os: OS.iter().map(|s| s.to_string()).collect(),
            arch: ARCH.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Platforms {
    /// Classifies a `select` key by its target name, e.g.
    /// `@io_bazel_rules_go//go/platform:linux_amd64` is a platform key.
    pub fn classify(&self, key: &str) -> Option<PlatformClass> {
        let name = label::name_of(key);
        if self.os.contains(name) {
            return Some(PlatformClass::Os);
        }
        if self.arch.contains(name) {
            return Some(PlatformClass::Arch);
        }
        let (os, arch) = name.split_once('_')?;
        (self.os.contains(os) && self.arch.contains(arch)).then_some(PlatformClass::Platform)
    }
}

// ============================================================================
// FIXUPS
// ============================================================================

/// Moves attribute `from` to `to` on rules of `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttrMigration {
    pub kind: String,
    pub from: String,
    pub to: String,
    /// Wrap a scalar value in a list, appending to an existing list in `to`.
    #[serde(default)]
    pub into_list: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlattenRule {
    pub kind: String,
    pub attrs: Vec<String>,
}

/// One-time structural rewrites applied before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixupConfig {
    pub kind_renames: BTreeMap<String, String>,
    pub attr_migrations: Vec<AttrMigration>,
    pub flatten: Vec<FlattenRule>,
}

impl FixupConfig {
    pub fn is_empty(&self) -> bool {
        self.kind_renames.is_empty() && self.attr_migrations.is_empty() && self.flatten.is_empty()
    }
}

// ============================================================================
// MERGE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub kinds: BTreeMap<String, KindInfo>,
    /// Known load sources, in the order new loads are created.
    pub loads: Vec<LoadInfo>,
    pub platforms: Platforms,
    /// Directive comments look like `# <prefix>:<key> <value>`.
    pub directive_prefix: String,
    pub fixups: FixupConfig,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            kinds: BTreeMap::new(),
            loads: Vec::new(),
            platforms: Platforms::default(),
            directive_prefix: DEFAULT_DIRECTIVE_PREFIX.to_string(),
            fixups: FixupConfig::default(),
        }
    }
}

static EMPTY_KIND: Lazy<KindInfo> = Lazy::new(KindInfo::default);

impl MergeConfig {
    /// Policy for `kind`. Unknown kinds get an empty policy: nothing is
    /// mergeable and rules of that kind are never considered empty.
    pub fn kind(&self, kind: &str) -> &KindInfo {
        self.kinds.get(kind).unwrap_or(&EMPTY_KIND)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// The Go rule catalogue.
    pub fn go_defaults() -> Self {
        let go_common_merge = [
            "cgo", "clinkopts", "copts", "embed", "embedsrcs", "srcs",
        ];
        let mut kinds = BTreeMap::new();

        kinds.insert(
            "filegroup".to_string(),
            KindInfo {
                non_empty_attrs: set(&["srcs"]),
                mergeable_attrs: set(&["srcs"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "go_binary".to_string(),
            KindInfo {
                match_any: true,
                non_empty_attrs: set(&["deps", "embed", "srcs"]),
                mergeable_attrs: set(&go_common_merge).update("importpath".to_string()),
                resolve_attrs: set(&["deps"]),
                substitute_attrs: set(&["embed"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "go_library".to_string(),
            KindInfo {
                match_attrs: vec!["importpath".to_string()],
                non_empty_attrs: set(&["deps", "embed", "srcs"]),
                mergeable_attrs: set(&go_common_merge)
                    .update("importmap".to_string())
                    .update("importpath".to_string()),
                resolve_attrs: set(&["deps"]),
                substitute_attrs: set(&["embed"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "go_test".to_string(),
            KindInfo {
                match_any: true,
                non_empty_attrs: set(&["deps", "embed", "srcs"]),
                mergeable_attrs: set(&go_common_merge),
                resolve_attrs: set(&["deps"]),
                substitute_attrs: set(&["embed"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "go_proto_library".to_string(),
            KindInfo {
                match_attrs: vec!["importpath".to_string()],
                non_empty_attrs: set(&["deps", "embed", "proto", "srcs"]),
                mergeable_attrs: set(&["compilers", "importmap", "importpath", "proto"]),
                resolve_attrs: set(&["deps"]),
                substitute_attrs: set(&["proto"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "proto_library".to_string(),
            KindInfo {
                non_empty_attrs: set(&["srcs"]),
                mergeable_attrs: set(&["import_prefix", "srcs", "strip_import_prefix"]),
                resolve_attrs: set(&["deps"]),
                ..KindInfo::default()
            },
        );
        kinds.insert(
            "go_repository".to_string(),
            KindInfo {
                match_attrs: vec!["importpath".to_string()],
                mergeable_attrs: set(&[
                    "commit", "importpath", "remote", "replace", "sum", "tag", "vcs", "version",
                ]),
                ..KindInfo::default()
            },
        );

        let loads = vec![
            LoadInfo::new(
                "@io_bazel_rules_go//go:def.bzl",
                &["go_binary", "go_library", "go_source", "go_test", "go_tool_library"],
                &[],
            ),
            LoadInfo::new(
                "@io_bazel_rules_go//proto:def.bzl",
                &["go_grpc_library", "go_proto_library"],
                &[],
            ),
            LoadInfo::new("@rules_proto//proto:defs.bzl", &["proto_library"], &[]),
            LoadInfo::new(
                "@bazel_gazelle//:deps.bzl",
                &["go_repository"],
                &["go_rules_dependencies", "go_register_toolchains", "gazelle_dependencies"],
            ),
        ];

        let fixups = FixupConfig {
            attr_migrations: ["go_binary", "go_library", "go_test"]
                .iter()
                .map(|kind| AttrMigration {
                    kind: kind.to_string(),
                    from: "library".to_string(),
                    to: "embed".to_string(),
                    into_list: true,
                })
                .collect(),
            ..FixupConfig::default()
        };

        Self {
            kinds,
            loads,
            fixups,
            ..Self::default()
        }
    }
}
