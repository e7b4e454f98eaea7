use pretty_assertions::assert_eq;
use rulemerge::{
    fix_loads, merge_file, Diagnostics, ErrorClass, File, LoadInfo, MergeConfig, MergePhase,
    MergeReport, Rule,
};

fn parse(src: &str) -> File {
    match File::parse("pkg/BUILD.bazel", "pkg", src, "rulemerge") {
        Ok(file) => file,
        Err(e) => panic!("parse failed: {e}"),
    }
}

fn rules(src: &str) -> Vec<Rule> {
    parse(src).rules().cloned().collect()
}

fn merge(old: &str, empty: &str, gen: &str) -> (String, MergeReport, Diagnostics) {
    let config = MergeConfig::go_defaults();
    let mut file = parse(old);
    let mut sink = Diagnostics::new();
    let report = merge_file(
        &mut file,
        &rules(empty),
        rules(gen),
        MergePhase::PreResolve,
        &config,
        &mut sink,
    );
    (file.format(), report, sink)
}

#[test]
fn kept_list_element_survives_union() {
    let old = r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "b.go",  # keep
    ],
)
"#;
    let gen = r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "c.go",
    ],
)
"#;
    let (out, report, sink) = merge(old, "", gen);
    assert!(sink.is_empty());
    assert_eq!(report.merged, 1);
    assert_eq!(
        out,
        r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "b.go",  # keep
        "c.go",
    ],
)
"#
    );
}

#[test]
fn empty_candidate_without_content_is_deleted() {
    let old = r#"go_test(
    name = "go_default_test",
    size = "small",
)
"#;
    let (out, report, _) = merge(old, "go_test(name = \"go_default_test\")\n", "");
    assert_eq!(report.deleted, 1);
    assert_eq!(out, "");
}

#[test]
fn duplicate_names_of_different_kinds_skip_the_rule() {
    let old = r#"go_library(
    name = "x",
    srcs = ["x.go"],
)

go_binary(
    name = "x",
    srcs = ["main.go"],
)

filegroup(
    name = "all",
    srcs = ["old.txt"],
)
"#;
    let gen = r#"go_library(
    name = "x",
    srcs = ["other.go"],
)

filegroup(
    name = "all",
    srcs = ["new.txt"],
)
"#;
    let (out, report, sink) = merge(old, "", gen);
    assert_eq!(sink.classes(), vec![ErrorClass::KindConflict]);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.merged, 1);
    assert!(out.contains("srcs = [\"x.go\"],"), "{out}");
    assert!(out.contains("srcs = [\"main.go\"],"), "{out}");
    assert!(out.contains("srcs = [\"new.txt\"],"), "{out}");
    assert!(!out.contains("other.go"), "{out}");
}

#[test]
fn kept_select_case_survives_and_default_is_retained() {
    let old = r#"go_library(
    name = "go_default_library",
    srcs = select({
        "linux": [
            "a.go",  # keep
        ],
        "//conditions:default": [],
    }),
)
"#;
    let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["b.go"],
)
"#;
    let (out, _, sink) = merge(old, "", gen);
    assert!(sink.is_empty());
    assert!(
        out.contains(
            r#"    srcs = [
        "b.go",
    ] + select({
        "linux": [
            "a.go",  # keep
        ],
        "//conditions:default": [],
    }),
"#
        ),
        "{out}"
    );
}

#[test]
fn merging_a_file_into_itself_changes_nothing() {
    let src = r#"load("@io_bazel_rules_go//go:def.bzl", "go_library", "go_test")

go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "b.go",
    ],
    importpath = "example.com/pkg",
    visibility = ["//visibility:public"],
    deps = ["//other:go_default_library"],
)

go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
    embed = [":go_default_library"],
)
"#;
    let config = MergeConfig::go_defaults();
    let mut file = parse(src);
    let mut sink = Diagnostics::new();
    let report = merge_file(
        &mut file,
        &[],
        rules(src),
        MergePhase::PreResolve,
        &config,
        &mut sink,
    );
    fix_loads(&mut file, &config.loads);
    assert!(sink.is_empty());
    assert_eq!(report.merged, 2);
    assert_eq!(report.appended, 0);
    assert_eq!(file.format(), src);
}

#[test]
fn merging_selects_into_themselves_changes_nothing() {
    let src = r#"load("@io_bazel_rules_go//go:def.bzl", "go_library")

go_library(
    name = "go_default_library",
    srcs = ["a.go"] + select({
        "@io_bazel_rules_go//go/platform:linux": ["l.go"],
        "//conditions:default": [],
    }),
    importpath = "example.com/pkg",
)

go_library(
    name = "extra",
    srcs = ["b.go"] + select({
        "@io_bazel_rules_go//go/platform:darwin": [
            "d.go",  # keep
        ],
        "//conditions:default": [],
    }),
    importpath = "example.com/pkg/extra",
)
"#;
    assert_eq!(parse(src).format(), src);

    let config = MergeConfig::go_defaults();
    let mut file = parse(src);
    let mut sink = Diagnostics::new();
    let report = merge_file(
        &mut file,
        &[],
        rules(src),
        MergePhase::PreResolve,
        &config,
        &mut sink,
    );
    fix_loads(&mut file, &config.loads);
    assert!(sink.is_empty());
    assert_eq!(report.merged, 2);
    assert_eq!(file.format(), src);
}

#[test]
fn kept_rule_ignores_generated_and_empty_rules() {
    let old = r#"# keep
go_library(
    name = "go_default_library",
    srcs = ["a.go"],
)
"#;
    let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["z.go"],
)
"#;
    let (out, report, _) = merge(old, gen, gen);
    assert_eq!(out, old);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.merged, 0);
}

#[test]
fn empty_candidate_removes_stale_content() {
    let old = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"],
)

go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
)
"#;
    let (out, report, _) = merge(old, "go_test(name = \"go_default_test\")\n", "");
    assert_eq!(report.deleted, 1);
    assert_eq!(
        out,
        "go_library(\n    name = \"go_default_library\",\n    srcs = [\"a.go\"],\n)\n"
    );
}

#[test]
fn new_rules_are_appended_in_order() {
    let old = "filegroup(\n    name = \"all\",\n    srcs = [\"a.txt\"],\n)\n";
    let gen = r#"go_binary(
    name = "bin",
    srcs = ["main.go"],
)

go_test(
    name = "bin_test",
    srcs = ["main_test.go"],
)
"#;
    let (out, report, _) = merge(old, "", gen);
    assert_eq!(report.appended, 2);
    let bin = out.find("go_binary(").unwrap_or(usize::MAX);
    let test = out.find("go_test(").unwrap_or(0);
    assert!(out.starts_with("filegroup("), "{out}");
    assert!(bin < test, "{out}");
}

#[test]
fn renamed_library_references_follow_the_existing_name() {
    let old = r#"go_library(
    name = "lib",
    srcs = ["a.go"],
    importpath = "example.com/pkg",
)

go_test(
    name = "lib_test",
    srcs = ["a_test.go"],
    embed = [":lib"],
)
"#;
    let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"],
    importpath = "example.com/pkg",
)

go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
    embed = [":go_default_library"],
)
"#;
    let (out, report, sink) = merge(old, "", gen);
    assert!(sink.is_empty());
    assert_eq!(report.merged, 2);
    assert!(out.contains("embed = [\":lib\"],"), "{out}");
    assert!(!out.contains("go_default"), "{out}");
}

#[test]
fn post_resolve_phase_merges_only_dependencies() {
    let old = r#"go_library(
    name = "go_default_library",
    srcs = ["a.go"],
    deps = ["//old:go_default_library"],
)
"#;
    let gen = r#"go_library(
    name = "go_default_library",
    srcs = ["b.go"],
    deps = ["//new:go_default_library"],
)
"#;
    let config = MergeConfig::go_defaults();
    let mut file = parse(old);
    let mut sink = Diagnostics::new();
    merge_file(
        &mut file,
        &[],
        rules(gen),
        MergePhase::PostResolve,
        &config,
        &mut sink,
    );
    let rule = file.rules().next().cloned().unwrap_or_else(|| Rule::new("", ""));
    assert_eq!(rule.attr_strings("srcs"), Some(vec!["a.go"]));
    assert_eq!(rule.attr_strings("deps"), Some(vec!["//new:go_default_library"]));
}

#[test]
fn load_follows_merged_rules() {
    let old = r#"load("@io_bazel_rules_go//go:def.bzl", "go_binary")

go_binary(
    name = "bin",
    srcs = ["main.go"],
)
"#;
    let gen = r#"go_binary(
    name = "bin",
    srcs = ["main.go"],
)

go_library(
    name = "go_default_library",
    srcs = ["lib.go"],
)
"#;
    let config = MergeConfig::go_defaults();
    let mut file = parse(old);
    let mut sink = Diagnostics::new();
    merge_file(
        &mut file,
        &[],
        rules(gen),
        MergePhase::PreResolve,
        &config,
        &mut sink,
    );
    fix_loads(&mut file, &config.loads);
    assert!(
        file.format()
            .starts_with("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_binary\", \"go_library\")\n"),
        "{}",
        file.format()
    );
}

#[test]
fn unknown_kind_policy_comes_from_yaml() {
    let yaml = r#"
kinds:
  custom_rule:
    match_any: true
    non_empty_attrs: [srcs]
    mergeable_attrs: [srcs]
loads:
  - name: "//tools:custom.bzl"
    symbols: [custom_rule]
"#;
    let config = match MergeConfig::from_yaml_str(yaml) {
        Ok(config) => config,
        Err(e) => panic!("bad config: {e}"),
    };
    let known: &[LoadInfo] = &config.loads;
    let mut file = parse("custom_rule(\n    name = \"old\",\n    srcs = [\"a\"],\n)\n");
    let mut sink = Diagnostics::new();
    let gen = rules("custom_rule(\n    name = \"new\",\n    srcs = [\"b\"],\n)\n");
    let report = merge_file(&mut file, &[], gen, MergePhase::PreResolve, &config, &mut sink);
    fix_loads(&mut file, known);
    assert_eq!(report.merged, 1);
    assert_eq!(
        file.format(),
        "load(\"//tools:custom.bzl\", \"custom_rule\")\n\ncustom_rule(\n    name = \"old\",\n    srcs = [\"b\"],\n)\n"
    );
}
