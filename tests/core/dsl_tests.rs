use archon::core::dsl::{compile_ast, parse_rule, parse_rules, Effect};
use archon::core::dsl::glob::path_glob_match;
use archon::core::taxonomy::CapabilityType;

#[test]
fn parse_then_compile_produces_stable_ir_hash_regardless_of_id() {
    let ast = parse_rule(r#"allow fs.read where capability.params.path matches "./docs/**""#)
        .expect("valid rule");
    let a = compile_ast(ast.clone(), "drr:1");
    let b = compile_ast(ast, "drr:7");
    assert_eq!(a.ir_hash, b.ir_hash);
    assert_eq!(a.capability_type, CapabilityType::FsRead);
    assert_eq!(a.effect, Effect::Allow);
}

#[test]
fn compiled_condition_glob_matches_the_same_candidates_the_dsl_describes() {
    let ast = parse_rule(r#"allow fs.read where capability.params.path matches "./docs/**""#)
        .expect("valid rule");
    let compiled = compile_ast(ast, "drr:1");
    let cond = &compiled.conditions[0];
    assert!(path_glob_match(&cond.value, "./docs/a/b.md"));
    assert!(!path_glob_match(&cond.value, "./src/x.ts"));
}

#[test]
fn bulk_parse_rejects_whole_batch_on_one_bad_line_with_correct_line_number() {
    let source = "allow fs.read\ndeny net.post.http\nnonsense exec.run\n";
    let err = parse_rules(source).unwrap_err();
    assert_eq!(
        format!("{err}"),
        "DSL parse error at 3:1: expected 'allow' or 'deny'"
    );
}

#[test]
fn multi_condition_rule_compiles_with_both_conditions_present() {
    let rules = parse_rules(
        "deny fs.write where capability.params.path matches \"**/secrets/**\" and capability.params.path matches \"*.env\"\n",
    )
    .expect("valid batch");
    assert_eq!(rules.len(), 1);
    let compiled = compile_ast(rules.into_iter().next().unwrap(), "drr:1");
    assert_eq!(compiled.conditions.len(), 2);
    assert_eq!(compiled.effect, Effect::Deny);
}
