//! Test doubles and common fixtures for declaration contract tests

#![allow(dead_code)]

use cfzones_core::config::{Alias, Host, Service, Zone, ZonesConfig};
use cfzones_core::declaration::{DeclareOutcome, Declared, ResourceRequest};
use cfzones_core::traits::ResourceDeclarer;
use cfzones_core::{Error, RecordingDeclarer, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A declarer that records like [`RecordingDeclarer`] but fails on one call
///
/// Calls are counted from 1. Every call, including the failing one, is
/// counted; only successful calls reach the recorder.
pub struct FailingDeclarer {
    fail_on_call: usize,
    calls: Arc<AtomicUsize>,
    recorder: RecordingDeclarer,
}

impl FailingDeclarer {
    pub fn new(fail_on_call: usize) -> Self {
        Self {
            fail_on_call,
            calls: Arc::new(AtomicUsize::new(0)),
            recorder: RecordingDeclarer::new(),
        }
    }

    /// Number of times declare() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that were declared successfully
    pub fn declared(&self) -> Vec<ResourceRequest> {
        self.recorder.requests()
    }
}

#[async_trait::async_trait]
impl ResourceDeclarer for FailingDeclarer {
    async fn declare(&self, request: &ResourceRequest) -> Result<Declared> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(Error::provider(
                "test",
                format!("rejected {} on call {}", request.identity, call),
            ));
        }
        self.recorder.declare(request).await
    }

    fn declarer_name(&self) -> &'static str {
        "failing"
    }
}

/// A declarer that reports pre-existing resources as unchanged and
/// assigns provider-style zone ids
pub struct ExistingDeclarer {
    recorder: RecordingDeclarer,
}

impl ExistingDeclarer {
    pub fn new() -> Self {
        Self {
            recorder: RecordingDeclarer::new(),
        }
    }

    pub fn declared(&self) -> Vec<ResourceRequest> {
        self.recorder.requests()
    }
}

#[async_trait::async_trait]
impl ResourceDeclarer for ExistingDeclarer {
    async fn declare(&self, request: &ResourceRequest) -> Result<Declared> {
        let recorded = self.recorder.declare(request).await?;
        Ok(Declared {
            id: format!("cf-{}", recorded.identity),
            outcome: DeclareOutcome::Unchanged,
            ..recorded
        })
    }

    fn declarer_name(&self) -> &'static str {
        "existing"
    }
}

/// The web host scenario: one zone, one domain, a dual-stack host
pub fn web_config() -> ZonesConfig {
    ZonesConfig::new(vec![
        Zone::new("z1").with_domain("d1", "example.com").with_host(
            Host::new("web", "web")
                .with_address("v4", "203.0.113.5")
                .with_address("v6", "2001:db8::1"),
        ),
    ])
}

/// Two zones, one with two domains, with every record kind
pub fn full_config() -> ZonesConfig {
    let sip = Service {
        id: "sip".into(),
        service: "_sip".into(),
        proto: "_tcp".into(),
        name: "@".into(),
        prio: 10,
        weight: 5,
        host: "sip.example.com".into(),
        port: 5060,
    };

    ZonesConfig::new(vec![
        Zone::new("main")
            .with_domain("com", "example.com")
            .with_domain("net", "example.net")
            .with_host(
                Host::new("web", "web")
                    .with_address("v4", "203.0.113.5")
                    .with_address("v6", "2001:db8::1"),
            )
            .with_alias(Alias::new("www", "www", "web.@").with_proxied(true))
            .with_alias(Alias::new("apex", "", "web.@"))
            .with_service(sip),
        Zone::new("lab")
            .with_domain("dev", "example.dev")
            .with_host(Host::new("ci", "ci").with_address("v4", "198.51.100.7")),
    ])
}
