//! AST for the restriction DSL (spec §4.2).
//!
//! `rule := ("allow" | "deny") <capability_type> ["where" <cond> ("and" <cond>)*]`
//! `cond := <dotted_field> <op> <literal>`
//!
//! v0.1 supports only the `matches` operator against string glob literals,
//! and only fields under the `capability.params.*` prefix. There is no
//! function call, arithmetic, or disjunction within a rule — the language is
//! deliberately not Turing-complete.

use crate::core::taxonomy::CapabilityType;
use serde::{Deserialize, Serialize};

/// Whether a rule permits or denies matching actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

/// A condition operator. Only `matches` exists in v0.1; the enum still
/// exists (rather than hardcoding the op) so a future version can add
/// operators without reshaping every condition's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Matches,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Matches => "matches",
        }
    }
}

/// A single `field op literal` condition. Conditions within a rule compose
/// by conjunction (AND) — there is no OR within a rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Condition {
    /// Dotted field path; v0.1 only accepts the `capability.params.*` prefix.
    pub field: String,
    pub op: Op,
    /// The glob literal (path glob or host glob depending on field/type).
    pub value: String,
}

impl Condition {
    /// The prefix every condition field must carry in v0.1.
    pub const FIELD_PREFIX: &'static str = "capability.params.";

    /// The param name this condition reaches into, e.g. `"path"` for
    /// `capability.params.path`.
    pub fn param_name(&self) -> Option<&str> {
        self.field.strip_prefix(Self::FIELD_PREFIX)
    }
}

/// A parsed restriction rule, prior to id assignment and compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionAst {
    pub capability_type: CapabilityType,
    pub effect: Effect,
    pub conditions: Vec<Condition>,
}
