//! The restriction DSL: a small, deliberately non-Turing-complete language
//! for expressing `allow`/`deny` rules over capability invocations
//! (spec §4.2).
//!
//! ```text
//! rule := ("allow" | "deny") <capability_type> ["where" <cond> ("and" <cond>)*]
//! cond := <dotted_field> "matches" <glob_literal>
//! ```
//!
//! Source text flows `parse -> compile`: [`parser::parse_rule`] produces a
//! [`ast::RestrictionAst`], and [`compiler::compile_ast`] turns that into a
//! [`compiler::CompiledDrr`] carrying a content-addressed `ir_hash`.

pub mod ast;
pub mod compiler;
pub mod glob;
pub mod parser;

pub use ast::{Condition, Effect, Op, RestrictionAst};
pub use compiler::{compile, compile_ast, CompiledDrr, StructuredRestrictionRule};
pub use parser::{parse_rule, parse_rules};

/// Grammar version of the restriction DSL. Folded into `config_hash` so a
/// grammar change is visible in `RS_hash` even for projects whose own rules
/// never change.
pub const DSL_GRAMMAR_VERSION: &str = "v1";
