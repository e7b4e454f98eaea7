use pretty_assertions::assert_eq;
use rulemerge::{fix_loads, File, LoadInfo, MergeConfig};

fn fixed(src: &str, known: &[LoadInfo]) -> String {
    let mut file = match File::parse("BUILD", "", src, "rulemerge") {
        Ok(file) => file,
        Err(e) => panic!("parse failed: {e}"),
    };
    fix_loads(&mut file, known);
    file.format()
}

fn known(yaml: &str) -> Vec<LoadInfo> {
    match MergeConfig::from_yaml_str(yaml) {
        Ok(config) => config.loads,
        Err(e) => panic!("bad config: {e}"),
    }
}

const SRC_LOADS: &str = r#"
loads:
  - name: "@src"
    symbols: [foo_binary, foo_library]
"#;

#[test]
fn unused_symbol_is_swapped_for_the_used_one() {
    let out = fixed(
        "load(\"@src\", \"foo_binary\")\n\nfoo_library(\n    name = \"x\",\n)\n",
        &known(SRC_LOADS),
    );
    assert_eq!(
        out,
        "load(\"@src\", \"foo_library\")\n\nfoo_library(\n    name = \"x\",\n)\n"
    );
}

#[test]
fn loaded_symbols_equal_used_symbols() {
    let config = MergeConfig::go_defaults();
    let src = r#"load("@io_bazel_rules_go//go:def.bzl", "go_binary", "go_library", "go_test", "go_test")
load("@rules_proto//proto:defs.bzl", "proto_library")
load("//tools:local.bzl", "local_rule")

go_library(
    name = "go_default_library",
    srcs = ["a.go"],
)

go_test(
    name = "go_default_test",
    srcs = ["a_test.go"],
)

local_rule(
    name = "local",
)
"#;
    let mut file = match File::parse("BUILD", "", src, "rulemerge") {
        Ok(file) => file,
        Err(e) => panic!("parse failed: {e}"),
    };
    fix_loads(&mut file, &config.loads);

    let loads: Vec<(String, Vec<String>)> = file
        .loads()
        .map(|l| {
            (
                l.module().to_string(),
                l.symbol_names().map(str::to_string).collect(),
            )
        })
        .collect();
    assert_eq!(
        loads,
        vec![
            (
                "@io_bazel_rules_go//go:def.bzl".to_string(),
                vec!["go_library".to_string(), "go_test".to_string()]
            ),
            ("//tools:local.bzl".to_string(), vec!["local_rule".to_string()]),
        ]
    );
}

#[test]
fn fixing_twice_is_stable() {
    let config = MergeConfig::go_defaults();
    let src = "# Generated.\n\ngo_binary(\n    name = \"bin\",\n    srcs = [\"main.go\"],\n)\n\nproto_library(\n    name = \"p\",\n    srcs = [\"p.proto\"],\n)\n";
    let once = fixed(src, &config.loads);
    assert!(once.starts_with(
        "# Generated.\n\nload(\"@io_bazel_rules_go//go:def.bzl\", \"go_binary\")\nload(\"@rules_proto//proto:defs.bzl\", \"proto_library\")\n\ngo_binary("
    ), "{once}");
    assert_eq!(fixed(&once, &config.loads), once);
}

#[test]
fn load_comments_survive_symbol_changes() {
    let src = "# Rules.\nload(\"@src\", \"foo_binary\")\n\nfoo_binary(\n    name = \"b\",\n)\n\nfoo_library(\n    name = \"l\",\n)\n";
    let out = fixed(src, &known(SRC_LOADS));
    assert!(
        out.starts_with("# Rules.\nload(\"@src\", \"foo_binary\", \"foo_library\")\n"),
        "{out}"
    );
}
