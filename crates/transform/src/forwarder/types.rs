//! Result types for log subscription reconciliation.

use crate::error::ReconcileFailure;
use serde::Serialize;

/// Outcome of reconciling one log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Already subscribed
    NoChange,
    /// Log group was created, then subscribed
    Created,
    /// Subscription filter was added to an existing log group
    Modified,
    /// Nothing could be done (log group not deployed yet)
    Skipped { reason: String },
    /// A remote call failed
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

/// Counts per outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ReconcileSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified
    }

    /// Check if reconciliation was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of log groups processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }
}

/// Outcome for one log group and the functions that own it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub keys: Vec<String>,
    pub log_group: String,
    #[serde(flatten)]
    pub result: ApplyResult,
}

/// Outcome of a whole reconciliation, sorted by function key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub units: Vec<UnitReport>,
    pub summary: ReconcileSummary,
    pub dry_run: bool,
}

impl ReconcileReport {
    pub(crate) fn new(mut units: Vec<UnitReport>, dry_run: bool) -> Self {
        units.sort_by(|a, b| a.keys.cmp(&b.keys));
        let mut summary = ReconcileSummary::default();
        for unit in &units {
            summary.add_result(&unit.result);
        }
        Self {
            units,
            summary,
            dry_run,
        }
    }

    /// Failed units, in report order.
    pub fn failures(&self) -> Vec<ReconcileFailure> {
        self.units
            .iter()
            .filter_map(|unit| match &unit.result {
                ApplyResult::Failed { error } => Some(ReconcileFailure {
                    key: unit.keys.join(", "),
                    log_group: unit.log_group.clone(),
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(key: &str, result: ApplyResult) -> UnitReport {
        UnitReport {
            keys: vec![key.to_string()],
            log_group: format!("/aws/lambda/{key}"),
            result,
        }
    }

    #[test]
    fn test_report_sorted_and_summarized() {
        let report = ReconcileReport::new(
            vec![
                unit("Worker", ApplyResult::Failed { error: "boom".to_string() }),
                unit("Api", ApplyResult::Created),
                unit("Cron", ApplyResult::Skipped { reason: "not deployed".to_string() }),
            ],
            false,
        );

        let keys: Vec<_> = report.units.iter().map(|u| u.keys[0].as_str()).collect();
        assert_eq!(keys, ["Api", "Cron", "Worker"]);
        assert_eq!(report.summary.total(), 3);
        assert_eq!(report.summary.total_changes(), 1);
        assert!(!report.summary.is_success());

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].key, "Worker");
        assert_eq!(failures[0].error, "boom");
    }

    #[test]
    fn test_apply_result_predicates() {
        assert!(ApplyResult::Modified.is_change());
        assert!(!ApplyResult::NoChange.is_change());
        assert!(ApplyResult::Skipped { reason: String::new() }.is_success());
        assert!(!ApplyResult::Failed { error: String::new() }.is_success());
    }

    #[test]
    fn test_unit_report_serializes_flat() {
        let json = serde_json::to_value(unit("Api", ApplyResult::Modified)).unwrap();
        assert_eq!(json["result"], "modified");
        assert_eq!(json["log_group"], "/aws/lambda/Api");
    }
}
