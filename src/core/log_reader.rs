//! Log reader & drift detector (C10, spec §4.10).
//!
//! `read_log` is schema-agnostic — it parses whatever JSONL lines a caller
//! hands it (`decisions.jsonl`, `proposal-events.jsonl`, or a concatenation
//! of both) and pulls out the handful of fields drift detection needs
//! (`event_id`, `timestamp`, optionally `rs_hash` and `proposal_id`/
//! `transition`), tolerating lines that carry none of the optional ones.
//! Grounded in the teacher's `flight_recorder.rs` `read_events`/timeline-sort
//! pattern, generalized with the dedupe, out-of-order, and drift layers the
//! teacher's reader (read-only, non-deduping) never needed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One parsed line, keeping only the fields drift detection cares about.
/// Any other fields on the line are dropped — this reader is not a general
/// JSONL pretty-printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub event_id: String,
    pub timestamp: String,
    pub rs_hash: Option<String>,
    pub proposal_id: Option<String>,
    pub transition: Option<String>,
}

/// Stats from one `read_log` call (LOGR-U1..U5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStats {
    pub parse_errors: usize,
    pub duplicates: usize,
    pub partial_trailing_line: bool,
    pub out_of_order: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub events: Vec<LogEvent>,
    pub stats: ReadStats,
}

fn parse_line(line: &str) -> Option<LogEvent> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let event_id = value.get("event_id")?.as_str()?.to_string();
    let timestamp = value.get("timestamp")?.as_str()?.to_string();
    let rs_hash = value
        .get("rs_hash")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let proposal_id = value
        .get("proposal_id")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let transition = value
        .get("transition")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Some(LogEvent {
        event_id,
        timestamp,
        rs_hash,
        proposal_id,
        transition,
    })
}

/// `readLog(raw_text) -> {events[], stats}` per LOGR-U1..U6.
///
/// - Malformed lines are dropped and counted (`parse_errors`).
/// - Events are deduplicated by `event_id`; first occurrence wins.
/// - A trailing line with no terminating `\n` is dropped and flagged
///   (`partial_trailing_line`), since it may be a torn write.
/// - `out_of_order` is set once more than one timestamp regression is
///   observed across file order (a single clock-skew hiccup is tolerated).
/// - Output is sorted by `(timestamp asc, event_id asc)`.
pub fn read_log(raw: &str) -> ReadResult {
    if raw.is_empty() {
        return ReadResult::default();
    }

    let partial_trailing_line = !raw.ends_with('\n');
    let mut lines: Vec<&str> = raw.lines().collect();
    if partial_trailing_line && !lines.is_empty() {
        lines.pop();
    }

    let mut stats = ReadStats {
        partial_trailing_line,
        ..Default::default()
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut parsed: Vec<LogEvent> = Vec::new();
    let mut last_timestamp: Option<&str> = None;
    let mut regressions = 0usize;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(event) => {
                if let Some(prev) = last_timestamp {
                    if event.timestamp.as_str() < prev {
                        regressions += 1;
                    }
                }
                last_timestamp = None; // set below via owned value after move
                if seen.contains(&event.event_id) {
                    stats.duplicates += 1;
                } else {
                    seen.insert(event.event_id.clone());
                    parsed.push(event);
                }
            }
            None => stats.parse_errors += 1,
        }
        last_timestamp = parsed.last().map(|e| e.timestamp.as_str());
    }

    stats.out_of_order = regressions > 1;

    parsed.sort_by(|a, b| (a.timestamp.as_str(), a.event_id.as_str()).cmp(&(b.timestamp.as_str(), b.event_id.as_str())));

    ReadResult {
        events: parsed,
        stats,
    }
}

/// Monotonic drift level; `None < Unknown < Conflict`, never downgrades
/// across the reasons that feed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    None,
    Unknown,
    Conflict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftMetrics {
    pub rs_hash_discontinuities: usize,
    pub conflicting_proposal_ids: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftResult {
    pub status: DriftStatus,
    pub reasons: Vec<String>,
    pub metrics: DriftMetrics,
}

const TERMINAL_TRANSITIONS: [&str; 3] = ["applied", "rejected", "failed"];

/// `detectDrift(readResult) -> {status, reasons, metrics}`.
///
/// Duplicates/parse errors/a partial trailing line/out-of-order all elevate
/// to `unknown`. An `rs_hash` discontinuity count of 3 or more (an
/// oscillation back to a previously seen hash counts double), or the same
/// `proposal_id` reaching two distinct terminal transitions, elevates to
/// `conflict`.
pub fn detect_drift(result: &ReadResult) -> DriftResult {
    let mut reasons = Vec::new();
    let mut status = DriftStatus::None;

    if result.stats.duplicates > 0 {
        reasons.push(format!("{} duplicate event id(s)", result.stats.duplicates));
        status = status.max(DriftStatus::Unknown);
    }
    if result.stats.parse_errors > 0 {
        reasons.push(format!("{} line(s) failed to parse", result.stats.parse_errors));
        status = status.max(DriftStatus::Unknown);
    }
    if result.stats.partial_trailing_line {
        reasons.push("partial trailing line dropped".to_string());
        status = status.max(DriftStatus::Unknown);
    }
    if result.stats.out_of_order {
        reasons.push("more than one timestamp regression observed".to_string());
        status = status.max(DriftStatus::Unknown);
    }

    let rs_hash_discontinuities = count_rs_hash_discontinuities(result);
    if rs_hash_discontinuities >= 3 {
        reasons.push(format!(
            "{rs_hash_discontinuities} rs_hash discontinuities across the log"
        ));
        status = status.max(DriftStatus::Conflict);
    }

    let conflicting_proposal_ids = count_conflicting_proposal_ids(result);
    if conflicting_proposal_ids > 0 {
        reasons.push(format!(
            "{conflicting_proposal_ids} proposal id(s) reached two distinct terminal states"
        ));
        status = status.max(DriftStatus::Conflict);
    }

    DriftResult {
        status,
        reasons,
        metrics: DriftMetrics {
            rs_hash_discontinuities,
            conflicting_proposal_ids,
        },
    }
}

/// Count of `rs_hash` changes across events in sorted order. A change back
/// to a hash already seen earlier in the sequence (an oscillation) counts
/// twice, since it represents two discontinuities: leaving the hash, then
/// returning to it.
fn count_rs_hash_discontinuities(result: &ReadResult) -> usize {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut last: Option<&str> = None;
    let mut count = 0;

    for event in &result.events {
        let Some(hash) = event.rs_hash.as_deref() else {
            continue;
        };
        if let Some(prev) = last {
            if prev != hash {
                count += 1;
                if seen.contains(hash) {
                    count += 1;
                }
            }
        }
        seen.insert(hash);
        last = Some(hash);
    }
    count
}

/// Count of distinct `proposal_id`s whose events include two or more
/// distinct terminal transitions (`applied`, `rejected`, `failed`).
fn count_conflicting_proposal_ids(result: &ReadResult) -> usize {
    let mut terminal_by_proposal: HashMap<&str, HashSet<&str>> = HashMap::new();
    for event in &result.events {
        let (Some(proposal_id), Some(transition)) =
            (event.proposal_id.as_deref(), event.transition.as_deref())
        else {
            continue;
        };
        if TERMINAL_TRANSITIONS.contains(&transition) {
            terminal_by_proposal
                .entry(proposal_id)
                .or_default()
                .insert(transition);
        }
    }
    terminal_by_proposal
        .values()
        .filter(|states| states.len() > 1)
        .count()
}
