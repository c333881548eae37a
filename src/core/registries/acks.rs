//! Ack store (C4): append-only typed-acknowledgment and hazard-pair
//! confirmation events, plus the project-scoped ack epoch.
//!
//! `acknowledgments.jsonl` and `hazard-acks.jsonl` are append-only; the only
//! mutation ever made to an existing line is the one-shot `rs_hash_after`
//! patch applied after a governance commit, which is why both are rewritten
//! wholesale rather than streamed — `StateIO` has no in-place line edit.

use crate::core::error::ArchonError;
use crate::core::state_io::StateIO;
use crate::core::taxonomy::{CapabilityType, RiskTier};
use serde::{Deserialize, Serialize};

const ACKNOWLEDGMENTS_FILE: &str = "state/acknowledgments.jsonl";
const HAZARD_ACKS_FILE: &str = "state/hazard-acks.jsonl";

/// A T3 typed-acknowledgment event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckEvent {
    pub id: String,
    pub timestamp: String,
    pub capability_type: CapabilityType,
    pub tier: RiskTier,
    pub phrase: String,
    pub rs_hash_after: Option<String>,
}

/// A hazard-pair confirmation event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HazardAckEvent {
    pub id: String,
    pub timestamp: String,
    pub pair_a: CapabilityType,
    pub pair_b: CapabilityType,
    pub description: String,
    pub rs_hash_after: Option<String>,
}

fn read_lines(state: &dyn StateIO, log_name: &str) -> Result<Vec<String>, ArchonError> {
    let raw = state.read_log_raw(log_name)?;
    Ok(raw.lines().map(|l| l.to_string()).collect())
}

fn parse_events<T: serde::de::DeserializeOwned>(lines: &[String]) -> Vec<T> {
    lines
        .iter()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

fn rewrite(state: &dyn StateIO, log_name: &str, lines: &[String]) -> Result<(), ArchonError> {
    state.overwrite_log(log_name, lines)
}

/// Tracks acknowledgment events and the monotonic ack epoch derived from
/// their total count.
pub struct AckStore;

impl AckStore {
    pub fn new() -> Self {
        Self
    }

    /// Total count across both ack logs — the project's ack epoch.
    pub fn ack_epoch(&self, state: &dyn StateIO) -> Result<u64, ArchonError> {
        let acks = read_lines(state, ACKNOWLEDGMENTS_FILE)?;
        let hazards = read_lines(state, HAZARD_ACKS_FILE)?;
        Ok((acks.len() + hazards.len()) as u64)
    }

    pub fn append_ack(&self, event: &AckEvent, state: &dyn StateIO) -> Result<(), ArchonError> {
        let line = serde_json::to_string(event)?;
        state.append_line(ACKNOWLEDGMENTS_FILE, &line)
    }

    pub fn append_hazard_ack(
        &self,
        event: &HazardAckEvent,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        let line = serde_json::to_string(event)?;
        state.append_line(HAZARD_ACKS_FILE, &line)
    }

    pub fn list_acks(&self, state: &dyn StateIO) -> Result<Vec<AckEvent>, ArchonError> {
        Ok(parse_events(&read_lines(state, ACKNOWLEDGMENTS_FILE)?))
    }

    pub fn list_hazard_acks(&self, state: &dyn StateIO) -> Result<Vec<HazardAckEvent>, ArchonError> {
        Ok(parse_events(&read_lines(state, HAZARD_ACKS_FILE)?))
    }

    /// Patch `rs_hash_after` onto the ack or hazard-ack event with id
    /// `event_id`. One-shot and idempotent: re-patching with the same hash
    /// is a no-op; patching an event that already carries a different hash
    /// leaves it untouched (the first patch wins).
    pub fn patch_rs_hash_after(
        &self,
        event_id: &str,
        rs_hash: &str,
        state: &dyn StateIO,
    ) -> Result<bool, ArchonError> {
        if self.patch_acks(event_id, rs_hash, state)? {
            return Ok(true);
        }
        self.patch_hazard_acks(event_id, rs_hash, state)
    }

    fn patch_acks(
        &self,
        event_id: &str,
        rs_hash: &str,
        state: &dyn StateIO,
    ) -> Result<bool, ArchonError> {
        let mut events = self.list_acks(state)?;
        let Some(event) = events.iter_mut().find(|e| e.id == event_id) else {
            return Ok(false);
        };
        if event.rs_hash_after.is_some() {
            return Ok(true);
        }
        event.rs_hash_after = Some(rs_hash.to_string());
        let lines: Vec<String> = events
            .iter()
            .map(|e| serde_json::to_string(e).expect("ack event always serializable"))
            .collect();
        rewrite(state, ACKNOWLEDGMENTS_FILE, &lines)?;
        Ok(true)
    }

    fn patch_hazard_acks(
        &self,
        event_id: &str,
        rs_hash: &str,
        state: &dyn StateIO,
    ) -> Result<bool, ArchonError> {
        let mut events = self.list_hazard_acks(state)?;
        let Some(event) = events.iter_mut().find(|e| e.id == event_id) else {
            return Ok(false);
        };
        if event.rs_hash_after.is_some() {
            return Ok(true);
        }
        event.rs_hash_after = Some(rs_hash.to_string());
        let lines: Vec<String> = events
            .iter()
            .map(|e| serde_json::to_string(e).expect("hazard ack event always serializable"))
            .collect();
        rewrite(state, HAZARD_ACKS_FILE, &lines)?;
        Ok(true)
    }
}

impl Default for AckStore {
    fn default() -> Self {
        Self::new()
    }
}
