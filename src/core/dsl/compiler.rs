//! Compiles parsed/structured restriction rules to their canonical,
//! content-addressed form (spec §4.2, §4.5).
//!
//! A compiled rule's `ir_hash` is computed over its semantic content only —
//! capability type, effect, and conditions sorted into a canonical order —
//! never its `id`. Two rules authored differently (DSL text vs. the
//! structured `restrict add` form) that mean the same thing compile to the
//! same `ir_hash`, which is what lets the snapshot builder deduplicate
//! equivalent restrictions from different sources.

use crate::core::dsl::ast::{Condition, Effect, RestrictionAst};
use crate::core::taxonomy::CapabilityType;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// A restriction rule authored directly in structured form (the non-DSL
/// path used by `restrict add`), sharing its conditions' shape with the DSL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredRestrictionRule {
    pub capability_type: CapabilityType,
    pub effect: Effect,
    pub conditions: Vec<Condition>,
}

impl From<RestrictionAst> for StructuredRestrictionRule {
    fn from(ast: RestrictionAst) -> Self {
        Self {
            capability_type: ast.capability_type,
            effect: ast.effect,
            conditions: ast.conditions,
        }
    }
}

/// A compiled restriction rule: a `drr:N` id paired with its canonical,
/// content-addressed IR. The id is assigned by the restriction registry at
/// insertion time and is never part of `ir_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledDrr {
    pub id: String,
    pub capability_type: CapabilityType,
    pub effect: Effect,
    pub conditions: Vec<Condition>,
    pub ir_hash: String,
}

/// Canonical JSON for the hashable content of a rule: capability type,
/// effect, and conditions sorted by `(field, op, value)`. Excludes `id`.
fn canonical_ir(capability_type: CapabilityType, effect: Effect, conditions: &[Condition]) -> serde_json::Value {
    let mut sorted = conditions.to_vec();
    sorted.sort_by(|a, b| (&a.field, a.op, &a.value).cmp(&(&b.field, b.op, &b.value)));
    json!({
        "capabilityType": capability_type.as_str(),
        "effect": effect.as_str(),
        "conditions": sorted.iter().map(|c| json!({
            "field": c.field,
            "op": c.op.as_str(),
            "value": c.value,
        })).collect::<Vec<_>>(),
    })
}

fn hash_ir(value: &serde_json::Value) -> String {
    let canonical =
        serde_json::to_vec(value).expect("canonical IR value is always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Compile a structured rule (DSL-parsed or directly authored) into its
/// canonical IR, assigning it the given registry id.
pub fn compile(rule: StructuredRestrictionRule, id: impl Into<String>) -> CompiledDrr {
    let ir = canonical_ir(rule.capability_type, rule.effect, &rule.conditions);
    let ir_hash = hash_ir(&ir);
    let mut conditions = rule.conditions;
    conditions.sort_by(|a, b| (&a.field, a.op, &a.value).cmp(&(&b.field, b.op, &b.value)));
    CompiledDrr {
        id: id.into(),
        capability_type: rule.capability_type,
        effect: rule.effect,
        conditions,
        ir_hash,
    }
}

/// Compile a DSL-parsed rule directly.
pub fn compile_ast(ast: RestrictionAst, id: impl Into<String>) -> CompiledDrr {
    compile(ast.into(), id)
}
