use archon::core::taxonomy::{
    build_expected_ack_phrase, hazard_matrix, triggered_hazard_pairs, typed_ack_required,
    CapabilityType, RiskTier, ALL_CAPABILITY_TYPES,
};

#[test]
fn every_capability_type_round_trips_through_wire_form() {
    for ty in ALL_CAPABILITY_TYPES {
        let wire = ty.as_str();
        assert_eq!(CapabilityType::parse(wire), Some(ty), "failed to round-trip {wire}");
    }
}

#[test]
fn unknown_wire_string_does_not_parse() {
    assert_eq!(CapabilityType::parse("fs.teleport"), None);
    assert_eq!(CapabilityType::parse(""), None);
}

#[test]
fn family_predicates_partition_the_taxonomy() {
    for ty in ALL_CAPABILITY_TYPES {
        let flags = [ty.is_fs(), ty.is_net(), ty.is_exec()];
        assert!(flags.iter().filter(|f| **f).count() <= 1, "{ty} claims more than one family");
    }
    assert!(CapabilityType::FsRead.is_fs());
    assert!(CapabilityType::NetFetchHttp.is_net());
    assert!(CapabilityType::ExecRun.is_exec());
    assert!(!CapabilityType::SecretsUse.is_fs());
    assert!(!CapabilityType::SecretsUse.is_net());
    assert!(!CapabilityType::SecretsUse.is_exec());
}

#[test]
fn typed_ack_is_required_only_at_tier_t3() {
    assert!(!typed_ack_required(RiskTier::T0));
    assert!(!typed_ack_required(RiskTier::T1));
    assert!(!typed_ack_required(RiskTier::T2));
    assert!(typed_ack_required(RiskTier::T3));
}

#[test]
fn expected_ack_phrase_names_tier_and_type() {
    let phrase = build_expected_ack_phrase(RiskTier::T3, CapabilityType::ExecRunPrivileged);
    assert_eq!(phrase, "I ACCEPT T3 RISK (exec.run_privileged)");
}

#[test]
fn hazard_matrix_pairs_are_symmetric() {
    for pair in hazard_matrix() {
        assert!(pair.matches(pair.a, pair.b));
        assert!(pair.matches(pair.b, pair.a));
        assert_eq!(pair.partner_of(pair.a), Some(pair.b));
        assert_eq!(pair.partner_of(pair.b), Some(pair.a));
    }
}

#[test]
fn triggered_hazard_pairs_finds_only_already_enabled_partners() {
    let already_enabled = [CapabilityType::NetFetchRawSocket];
    let triggered = triggered_hazard_pairs(CapabilityType::ExecRun, &already_enabled);
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].partner_of(CapabilityType::ExecRun), Some(CapabilityType::NetFetchRawSocket));

    let none_enabled: [CapabilityType; 0] = [];
    assert!(triggered_hazard_pairs(CapabilityType::ExecRun, &none_enabled).is_empty());
}
