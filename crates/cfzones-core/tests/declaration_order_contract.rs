//! Contract Test: Declaration Order
//!
//! Constraints verified:
//! - A zone is declared before its settings, and its settings before any
//!   record of that zone
//! - Every settings/record request references the id the declarer assigned
//!   to its zone
//! - The walk is deterministic: the same configuration yields the same
//!   sequence of requests
//!
//! If this test fails, a record could be sent to a provider before the zone
//! it lives in exists.

mod common;

use cfzones_core::declaration::{ResourceKind, ResourceRequest};
use cfzones_core::outputs::ZONE_IDS;
use cfzones_core::{RecordingDeclarer, run};
use common::*;
use std::collections::HashMap;

#[tokio::test]
async fn zone_settings_follow_zone_creation() {
    let declarer = RecordingDeclarer::new();
    run(&full_config(), &declarer).await.expect("run succeeds");

    let requests = declarer.requests();
    for (i, request) in requests.iter().enumerate() {
        if request.kind() == ResourceKind::ZoneSettings {
            assert!(i > 0, "settings declared first");
            let previous = &requests[i - 1];
            assert_eq!(previous.kind(), ResourceKind::Zone);
            assert_eq!(previous.identity, request.identity);
        }
    }
}

#[tokio::test]
async fn records_reference_previously_declared_zones() {
    let declarer = RecordingDeclarer::new();
    run(&full_config(), &declarer).await.expect("run succeeds");

    // zone id -> has its settings been declared yet
    let mut zones: HashMap<String, bool> = HashMap::new();
    for request in declarer.requests() {
        match request.kind() {
            ResourceKind::Zone => {
                let id = format!("plan:zone:{}", request.identity);
                assert!(zones.insert(id, false).is_none(), "zone declared twice");
            }
            ResourceKind::ZoneSettings => {
                let zone_id = request.zone_id().expect("settings reference a zone");
                let settled = zones
                    .get_mut(zone_id)
                    .expect("settings reference an already declared zone");
                *settled = true;
            }
            ResourceKind::DnsRecord => {
                let zone_id = request.zone_id().expect("records reference a zone");
                assert_eq!(
                    zones.get(zone_id),
                    Some(&true),
                    "{} declared before its zone was settled",
                    request.identity
                );
            }
        }
    }
    assert_eq!(zones.len(), 3);
}

#[tokio::test]
async fn full_config_declares_expected_sequence() {
    let declarer = RecordingDeclarer::new();
    let summary = run(&full_config(), &declarer).await.expect("run succeeds");

    let identities: Vec<String> = declarer
        .requests()
        .into_iter()
        .map(|r| format!("{}:{}", r.kind(), r.identity))
        .collect();

    assert_eq!(
        identities,
        vec![
            "zone:main-com",
            "zone_settings:main-com",
            "dns_record:main-com-web-v4",
            "dns_record:main-com-web-v6",
            "dns_record:main-com-www",
            "dns_record:main-com-apex",
            "dns_record:main-com-@-sip",
            "zone:main-net",
            "zone_settings:main-net",
            "dns_record:main-net-web-v4",
            "dns_record:main-net-web-v6",
            "dns_record:main-net-www",
            "dns_record:main-net-apex",
            "dns_record:main-net-@-sip",
            "zone:lab-dev",
            "zone_settings:lab-dev",
            "dns_record:lab-dev-ci-v4",
        ]
    );

    assert_eq!(summary.tally.count(ResourceKind::Zone), 3);
    assert_eq!(summary.tally.count(ResourceKind::ZoneSettings), 3);
    assert_eq!(summary.tally.count(ResourceKind::DnsRecord), 11);
    assert_eq!(summary.tally.total(), 17);
}

#[tokio::test]
async fn alias_targets_use_owning_domain() {
    let declarer = RecordingDeclarer::new();
    run(&full_config(), &declarer).await.expect("run succeeds");

    let by_identity: HashMap<String, ResourceRequest> = declarer
        .requests()
        .into_iter()
        .filter(|r| r.kind() == ResourceKind::DnsRecord)
        .map(|r| (r.identity.clone(), r))
        .collect();

    let www_com = by_identity["main-com-www"].fields();
    assert_eq!(www_com["value"], "web.example.com");
    assert_eq!(www_com["type"], "CNAME");
    assert_eq!(www_com["proxied"], true);

    let www_net = by_identity["main-net-www"].fields();
    assert_eq!(www_net["value"], "web.example.net");

    let apex = by_identity["main-com-apex"].fields();
    assert_eq!(apex["name"], "@");
    assert_eq!(apex["proxied"], false);

    let sip = by_identity["main-com-@-sip"].fields();
    assert_eq!(sip["type"], "SRV");
    assert_eq!(sip["data"]["port"], 5060);
    assert_eq!(sip["data"]["target"], "sip.example.com");
}

#[tokio::test]
async fn web_host_scenario() {
    let declarer = RecordingDeclarer::new();
    run(&web_config(), &declarer).await.expect("run succeeds");

    let records: Vec<_> = declarer
        .requests()
        .into_iter()
        .filter(|r| r.kind() == ResourceKind::DnsRecord)
        .collect();
    assert_eq!(records.len(), 2);

    let v4 = records[0].fields();
    assert_eq!(records[0].identity, "z1-d1-web-v4");
    assert_eq!(v4["name"], "web");
    assert_eq!(v4["value"], "203.0.113.5");
    assert_eq!(v4["type"], "A");

    let v6 = records[1].fields();
    assert_eq!(records[1].identity, "z1-d1-web-v6");
    assert_eq!(v6["name"], "web");
    assert_eq!(v6["value"], "2001:db8::1");
    assert_eq!(v6["type"], "AAAA");
}

#[tokio::test]
async fn zone_ids_are_exported_from_declarer() {
    let declarer = ExistingDeclarer::new();
    let summary = run(&full_config(), &declarer).await.expect("run succeeds");

    let zone_ids = summary.outputs.group(ZONE_IDS).expect("zone ids exported");
    assert_eq!(zone_ids.len(), 3);
    assert_eq!(zone_ids["main-com"], "cf-main-com");
    assert_eq!(zone_ids["lab-dev"], "cf-lab-dev");

    // Records point at the id the declarer handed back, not a derived one
    let first_record = declarer
        .declared()
        .into_iter()
        .find(|r| r.kind() == ResourceKind::DnsRecord)
        .expect("a record was declared");
    assert_eq!(first_record.zone_id(), Some("cf-main-com"));

    assert_eq!(summary.tally.unchanged, 17);
    assert_eq!(summary.tally.planned, 0);
}

#[tokio::test]
async fn walk_is_deterministic() {
    let first = RecordingDeclarer::new();
    let second = RecordingDeclarer::new();

    run(&full_config(), &first).await.expect("run succeeds");
    run(&full_config(), &second).await.expect("run succeeds");

    assert_eq!(first.requests(), second.requests());
}
