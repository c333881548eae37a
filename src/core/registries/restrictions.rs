//! Restriction registry (C4): the operator-authored `StructuredRestrictionRule`
//! store, with a monotonic `drr:N` id counter that never recycles across
//! `clear` calls.

use crate::core::dsl::{compile, CompiledDrr, StructuredRestrictionRule};
use crate::core::error::ArchonError;
use crate::core::state_io::StateIO;
use serde::{Deserialize, Serialize};

const RESTRICTIONS_FILE: &str = "state/restrictions.json";

/// A restriction rule as persisted: its assigned `drr:N` id plus content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRestriction {
    pub id: String,
    #[serde(flatten)]
    pub rule: StructuredRestrictionRule,
}

pub(crate) fn drr_sequence(id: &str) -> u64 {
    id.strip_prefix("drr:")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub struct RestrictionRegistry {
    rules: Vec<StoredRestriction>,
    next_seq: u64,
}

impl Default for RestrictionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RestrictionRegistry {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            next_seq: 1,
        }
    }

    /// Rehydrate rules from persisted state. The counter resumes at one
    /// past the highest persisted sequence number, so it never regresses
    /// below what has already been handed out.
    pub fn apply_persisted_state(&mut self, state: &dyn StateIO) -> Result<(), ArchonError> {
        let rules: Vec<StoredRestriction> = state.read_json(RESTRICTIONS_FILE, Vec::new())?;
        self.next_seq = rules
            .iter()
            .map(|r| drr_sequence(&r.id) + 1)
            .max()
            .unwrap_or(1)
            .max(self.next_seq);
        self.rules = rules;
        Ok(())
    }

    /// Append one rule, assigning it the next `drr:N` id.
    pub fn add(
        &mut self,
        rule: StructuredRestrictionRule,
        state: &dyn StateIO,
    ) -> Result<String, ArchonError> {
        let id = format!("drr:{}", self.next_seq);
        self.next_seq += 1;
        self.rules.push(StoredRestriction {
            id: id.clone(),
            rule,
        });
        self.persist(state)?;
        Ok(id)
    }

    /// Replace the full rule set (used by `set_restrictions` proposals).
    /// The counter is not reset — new ids continue from where it left off.
    pub fn replace_all(
        &mut self,
        rules: Vec<StructuredRestrictionRule>,
        state: &dyn StateIO,
    ) -> Result<Vec<String>, ArchonError> {
        self.rules.clear();
        let mut ids = Vec::with_capacity(rules.len());
        for rule in rules {
            let id = format!("drr:{}", self.next_seq);
            self.next_seq += 1;
            ids.push(id.clone());
            self.rules.push(StoredRestriction { id, rule });
        }
        self.persist(state)?;
        Ok(ids)
    }

    /// Clear every rule. The id counter is never recycled — the next `add`
    /// after a `clear` still continues from the prior high-water mark.
    pub fn clear(&mut self, state: &dyn StateIO) -> Result<(), ArchonError> {
        self.rules.clear();
        self.persist(state)
    }

    fn persist(&self, state: &dyn StateIO) -> Result<(), ArchonError> {
        state.write_json(RESTRICTIONS_FILE, &self.rules)
    }

    pub fn list(&self) -> &[StoredRestriction] {
        &self.rules
    }

    /// Compile every stored rule to its canonical IR, sorted by id.
    pub fn compile_all(&self) -> Vec<CompiledDrr> {
        let mut compiled: Vec<CompiledDrr> = self
            .rules
            .iter()
            .map(|r| compile(r.rule.clone(), r.id.clone()))
            .collect();
        compiled.sort_by_key(|c| drr_sequence(&c.id));
        compiled
    }
}
