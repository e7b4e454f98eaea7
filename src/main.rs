fn main() {
    rulemerge::cli::run();
}
