//! Bounded parallel reconciliation.
//!
//! Units are independent, so they run on a rayon pool of `jobs` threads. A
//! failing unit never stops its siblings; results are collected and sorted
//! once every unit has finished.

use super::subscription::{LogSubscription, ReconcileContext};
use super::types::{ApplyResult, ReconcileReport, UnitReport};
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Reconcile every unit with at most `jobs` in flight.
pub fn reconcile(
    units: &[LogSubscription],
    ctx: &ReconcileContext,
    jobs: usize,
) -> Result<ReconcileReport> {
    let jobs = jobs.max(1);
    log::debug!(
        "reconciling {} log group(s) with {jobs} worker(s){}",
        units.len(),
        if ctx.dry_run { " (dry run)" } else { "" }
    );

    let reports = if jobs == 1 || units.len() <= 1 {
        units.iter().map(|unit| run_unit(unit, ctx)).collect()
    } else {
        reconcile_parallel(units, ctx, jobs)?
    };

    Ok(ReconcileReport::new(reports, ctx.dry_run))
}

fn reconcile_parallel(
    units: &[LogSubscription],
    ctx: &ReconcileContext,
    jobs: usize,
) -> Result<Vec<UnitReport>> {
    let results: Arc<Mutex<Vec<UnitReport>>> =
        Arc::new(Mutex::new(Vec::with_capacity(units.len())));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;

    pool.install(|| {
        units.par_iter().for_each(|unit| {
            let report = run_unit(unit, ctx);
            results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(report);
        });
    });

    let results = Arc::try_unwrap(results)
        .map_err(|_| Error::WorkerPool("reconciliation results still shared".to_string()))?
        .into_inner()
        .unwrap_or_else(|e| e.into_inner());
    Ok(results)
}

fn run_unit(unit: &LogSubscription, ctx: &ReconcileContext) -> UnitReport {
    let result = unit.apply(ctx);
    if let ApplyResult::Skipped { reason } = &result {
        log::debug!("{}: skipped ({reason})", unit.id());
    }
    UnitReport {
        keys: unit.keys.clone(),
        log_group: unit.log_group.to_string(),
        result,
    }
}
