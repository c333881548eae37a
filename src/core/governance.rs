//! Governance application (C9, spec §4.9): the atomic commit path for
//! enabling a capability.
//!
//! `apply_enable_capability` stages every write in memory first and only
//! touches the registries/ack store once every check has passed — on any
//! error, zero mutations occur and `ack_epoch` is the unchanged value.

use crate::core::error::ArchonError;
use crate::core::registries::{
    AckEvent, AckStore, CapabilityRegistry, Confirmed, HazardAckEvent, ModuleRegistry,
};
use crate::core::state_io::StateIO;
use crate::core::taxonomy::{build_expected_ack_phrase, triggered_hazard_pairs, typed_ack_required, CapabilityType};
use crate::core::time::{Clock, IdGenerator};

/// Operator-supplied inputs to an enable-capability application.
#[derive(Debug, Clone, Default)]
pub struct EnableCapabilityOptions {
    pub typed_ack_phrase: Option<String>,
    pub hazard_confirmed_pairs: Vec<(CapabilityType, CapabilityType)>,
}

/// Result of a successful (or failed) `apply_enable_capability` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub applied: bool,
    pub ack_epoch: u64,
    pub ack_event_id: Option<String>,
    pub hazard_event_ids: Vec<String>,
}

fn pair_confirmed(confirmed: &[(CapabilityType, CapabilityType)], a: CapabilityType, b: CapabilityType) -> bool {
    confirmed
        .iter()
        .any(|(x, y)| (*x == a && *y == b) || (*x == b && *y == a))
}

/// Enable `ty` against the given registries. Validation order exactly per
/// spec: module-declares-type, T3 typed-ack byte-exact match, hazard-pair
/// confirmation, then a single atomic commit.
#[allow(clippy::too_many_arguments)]
pub fn apply_enable_capability(
    ty: CapabilityType,
    opts: &EnableCapabilityOptions,
    module_registry: &ModuleRegistry,
    capability_registry: &mut CapabilityRegistry,
    ack_store: &AckStore,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    state: &dyn StateIO,
) -> Result<ApplyResult, ArchonError> {
    let unchanged_epoch = ack_store.ack_epoch(state)?;

    if module_registry.enabled_modules_declaring(ty).is_empty() {
        return Err(ArchonError::TaxonomyViolation(format!(
            "no enabled module declares type {ty}"
        )));
    }

    let tier = ty.tier();
    if typed_ack_required(tier) {
        let expected = build_expected_ack_phrase(tier, ty);
        match &opts.typed_ack_phrase {
            Some(phrase) if phrase == &expected => {}
            _ => return Err(ArchonError::AckPhraseMismatch { expected }),
        }
    }

    let already_enabled = capability_registry.list_enabled_capabilities();
    let triggered = triggered_hazard_pairs(ty, &already_enabled);
    for pair in &triggered {
        let partner = pair.partner_of(ty).expect("triggered pair always involves ty");
        if !pair_confirmed(&opts.hazard_confirmed_pairs, ty, partner) {
            return Err(ArchonError::HazardUnconfirmed(format!(
                "{} + {}: {}",
                ty, partner, pair.description
            )));
        }
    }

    // Every check passed — commit.
    let mut ack_event_id = None;
    if typed_ack_required(tier) {
        let event_id = ids.next_id();
        let event = AckEvent {
            id: event_id.clone(),
            timestamp: clock.now_iso8601(),
            capability_type: ty,
            tier,
            phrase: opts.typed_ack_phrase.clone().unwrap_or_default(),
            rs_hash_after: None,
        };
        ack_store.append_ack(&event, state)?;
        ack_event_id = Some(event_id);
    }

    let mut hazard_event_ids = Vec::new();
    for pair in &triggered {
        let partner = pair.partner_of(ty).expect("triggered pair always involves ty");
        let event_id = ids.next_id();
        let event = HazardAckEvent {
            id: event_id.clone(),
            timestamp: clock.now_iso8601(),
            pair_a: ty,
            pair_b: partner,
            description: pair.description.to_string(),
            rs_hash_after: None,
        };
        ack_store.append_hazard_ack(&event, state)?;
        hazard_event_ids.push(event_id);
    }

    capability_registry.enable_capability(ty, state)?;
    let new_epoch = ack_store.ack_epoch(state)?;
    debug_assert!(new_epoch >= unchanged_epoch);

    Ok(ApplyResult {
        applied: true,
        ack_epoch: new_epoch,
        ack_event_id,
        hazard_event_ids,
    })
}

/// Disable `module_id`, cascading to disable any capability uniquely
/// declared by it (no other enabled module still declares it) — spec §9's
/// resolved cascade behavior, preserving deny-by-default (I1).
pub fn apply_disable_module(
    module_id: &str,
    module_registry: &mut ModuleRegistry,
    capability_registry: &mut CapabilityRegistry,
    _confirmed: Confirmed,
    state: &dyn StateIO,
) -> Result<Vec<CapabilityType>, ArchonError> {
    let Some(manifest) = module_registry.manifest(module_id) else {
        return Err(ArchonError::ModuleNotRegistered(module_id.to_string()));
    };
    let declared: Vec<CapabilityType> = manifest
        .capability_descriptors
        .iter()
        .map(|d| d.capability_type)
        .collect();

    module_registry.disable(module_id, Confirmed::attest(), state)?;

    let mut cascaded = Vec::new();
    for ty in declared {
        if module_registry.enabled_modules_declaring(ty).is_empty() {
            capability_registry.disable_capability(ty, state)?;
            cascaded.push(ty);
        }
    }
    Ok(cascaded)
}
