//! Run driver
//!
//! Sequences the mapper over every zone of a configuration, in
//! configuration order, and reports what was declared.

use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::config::ZonesConfig;
use crate::error::Result;
use crate::mapper::{DeclarationContext, DeclarationTally, setup_zone};
use crate::outputs::Outputs;
use crate::traits::ResourceDeclarer;

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Values exported during the run (zone ids)
    pub outputs: Outputs,
    /// What was declared
    pub tally: DeclarationTally,
    pub elapsed: Duration,
}

/// Declare every zone of `config` through `declarer`
///
/// The configuration is validated again before anything is declared, so a
/// tree built in code gets the same checks as a loaded one. The first error
/// aborts the run and is returned unchanged.
pub async fn run(config: &ZonesConfig, declarer: &dyn ResourceDeclarer) -> Result<RunSummary> {
    config.validate()?;

    let started = Instant::now();
    info!(
        "Declaring {} zone(s) over {} domain(s) via {}",
        config.zones.len(),
        config.domain_count(),
        declarer.declarer_name()
    );

    let mut ctx = DeclarationContext::new(declarer);
    for zone in &config.zones {
        if let Err(e) = setup_zone(&mut ctx, zone).await {
            error!("Zone {} failed: {}", zone.id, e);
            return Err(e);
        }
    }

    let (outputs, tally) = ctx.into_parts();
    let summary = RunSummary {
        outputs,
        tally,
        elapsed: started.elapsed(),
    };

    info!(
        "Declared {} resource(s): {} created, {} updated, {} unchanged, {} planned ({:?})",
        summary.tally.total(),
        summary.tally.created,
        summary.tally.updated,
        summary.tally.unchanged,
        summary.tally.planned,
        summary.elapsed
    );

    Ok(summary)
}
