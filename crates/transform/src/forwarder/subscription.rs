//! One log group converging onto the forwarder.

use super::naming::{LogGroupDefinition, LogGroupName};
use super::types::ApplyResult;
use logkit::backend::MAX_SUBSCRIPTION_FILTERS;
use logkit::{Client, LogGroup};

/// Shared inputs for every unit of one reconciliation.
#[derive(Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub client: &'a Client,
    /// Destination every log group must deliver to
    pub destination_arn: &'a str,
    /// Name for filters created by this run
    pub filter_name: &'a str,
    /// Only describe; report what would change
    pub dry_run: bool,
}

/// A log group and the functions that write to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSubscription {
    pub keys: Vec<String>,
    pub log_group: LogGroupName,
}

impl LogSubscription {
    /// Group definitions by log group so each group is reconciled once.
    pub fn plan(definitions: &[LogGroupDefinition]) -> Vec<LogSubscription> {
        let mut units: Vec<LogSubscription> = Vec::new();
        for def in definitions {
            match units.iter_mut().find(|u| u.log_group == def.log_group_name) {
                Some(unit) => unit.keys.push(def.key.clone()),
                None => units.push(LogSubscription {
                    keys: vec![def.key.clone()],
                    log_group: def.log_group_name.clone(),
                }),
            }
        }
        units
    }

    /// Identifier used in logs and reports.
    pub fn id(&self) -> String {
        self.keys.join(", ")
    }

    /// Reconcile this log group. Remote errors become [`ApplyResult::Failed`].
    pub fn apply(&self, ctx: &ReconcileContext) -> ApplyResult {
        match self.try_apply(ctx) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("{}: {} failed: {e}", self.id(), self.log_group);
                ApplyResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn try_apply(&self, ctx: &ReconcileContext) -> logkit::Result<ApplyResult> {
        let candidates: Vec<LogGroup> = ctx
            .client
            .describe_log_groups(&self.log_group.query())?
            .into_iter()
            .filter(|group| self.log_group.matches(&group.log_group_name))
            .collect();

        let existing = match select_newest(candidates) {
            Ok(existing) => existing,
            Err(names) => {
                log::warn!("{}: cannot tell which log group to subscribe", self.id());
                return Ok(ApplyResult::Failed {
                    error: format!(
                        "ambiguous log group for {}: {}",
                        self.log_group,
                        names.join(", ")
                    ),
                });
            }
        };

        if let Some(name) = existing {
            let changed = self.ensure_filter(ctx, &name)?;
            return Ok(if changed {
                ApplyResult::Modified
            } else {
                ApplyResult::NoChange
            });
        }

        match &self.log_group {
            LogGroupName::Generated { .. } => {
                log::warn!(
                    "{}: no log group matches {}; deploy the function before subscribing it",
                    self.id(),
                    self.log_group
                );
                Ok(ApplyResult::Skipped {
                    reason: format!("no log group matches {}", self.log_group),
                })
            }
            LogGroupName::Exact(name) => {
                if ctx.dry_run {
                    log::info!("{}: would create {name} and subscribe it", self.id());
                    return Ok(ApplyResult::Created);
                }
                if ctx.client.ensure_log_group(name)? {
                    log::info!("{}: created log group {name}", self.id());
                }
                self.ensure_filter(ctx, name)?;
                Ok(ApplyResult::Created)
            }
        }
    }

    /// Subscribe one log group unless a filter already targets the forwarder.
    ///
    /// Returns whether a filter was (or, in a dry run, would be) written.
    fn ensure_filter(&self, ctx: &ReconcileContext, log_group: &str) -> logkit::Result<bool> {
        let filters = ctx.client.describe_subscription_filters(log_group)?;
        if filters.iter().any(|f| f.targets(ctx.destination_arn)) {
            log::debug!("{log_group} already delivers to {}", ctx.destination_arn);
            return Ok(false);
        }

        let replaces = filters.iter().any(|f| f.filter_name == ctx.filter_name);
        if !replaces && filters.len() >= MAX_SUBSCRIPTION_FILTERS {
            return Err(logkit::Error::LimitExceeded {
                message: format!(
                    "{log_group} already has {} subscription filters ({})",
                    filters.len(),
                    filters
                        .iter()
                        .map(|f| f.filter_name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        if ctx.dry_run {
            log::info!("{}: would subscribe {log_group}", self.id());
            return Ok(true);
        }
        ctx.client
            .put_subscription_filter(log_group, ctx.filter_name, ctx.destination_arn, "")?;
        log::info!("{}: subscribed {log_group}", self.id());
        Ok(true)
    }
}

/// The most recently created of the matching log groups.
///
/// A redeployed function leaves its old log group behind, so the newest one is
/// current. Fails with the candidate names when the newest cannot be told apart.
fn select_newest(mut groups: Vec<LogGroup>) -> Result<Option<String>, Vec<String>> {
    groups.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
    let tied = groups.len() > 1 && groups[0].creation_time == groups[1].creation_time;
    let mut names = groups.into_iter().map(|g| g.log_group_name);
    if tied {
        return Err(names.collect());
    }
    Ok(names.next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logkit::backend::{Call, MockBackend, MockFailure, Operation};
    use logkit::{RetryConfig, SubscriptionFilter};

    const DEST: &str = "arn:aws:lambda:us-east-1:123456789012:function:forwarder";

    fn client(mock: &MockBackend) -> Client {
        Client::with_backend(Box::new(mock.clone())).with_retry(RetryConfig::no_retry())
    }

    fn ctx(client: &Client, dry_run: bool) -> ReconcileContext<'_> {
        ReconcileContext {
            client,
            destination_arn: DEST,
            filter_name: "datadog-forwarder",
            dry_run,
        }
    }

    fn exact(key: &str, name: &str) -> LogSubscription {
        LogSubscription {
            keys: vec![key.to_string()],
            log_group: LogGroupName::Exact(name.to_string()),
        }
    }

    #[test]
    fn test_existing_group_is_not_created() {
        let mock = MockBackend::new();
        mock.add_log_group("/aws/lambda/api");
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(mock.count(Operation::CreateLogGroup), 0);
        assert_eq!(mock.count(Operation::PutSubscriptionFilter), 1);
        assert!(mock.filters("/aws/lambda/api")[0].targets(DEST));
    }

    #[test]
    fn test_missing_group_is_created_then_subscribed() {
        let mock = MockBackend::new();
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Created);
        assert!(mock.has_log_group("/aws/lambda/api"));
        assert_eq!(mock.filters("/aws/lambda/api").len(), 1);
    }

    #[test]
    fn test_matching_filter_means_no_put() {
        let mock = MockBackend::new();
        mock.add_subscription_filter(SubscriptionFilter::new(
            "custom-name",
            "/aws/lambda/api",
            DEST,
            "",
        ));
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::NoChange);
        assert_eq!(mock.count(Operation::PutSubscriptionFilter), 0);
    }

    #[test]
    fn test_exact_name_ignores_longer_names() {
        let mock = MockBackend::new();
        mock.add_log_group("/aws/lambda/api-v2");
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Created);
        assert!(mock.filters("/aws/lambda/api-v2").is_empty());
    }

    fn generated(stack: &str, key: &str) -> LogSubscription {
        LogSubscription {
            keys: vec![key.to_string()],
            log_group: LogGroupName::generated(stack, key),
        }
    }

    fn created_at(name: &str, creation_time: Option<i64>) -> LogGroup {
        LogGroup {
            creation_time,
            ..LogGroup::named(name)
        }
    }

    #[test]
    fn test_generated_without_match_is_skipped() {
        let mock = MockBackend::new();
        let client = client(&mock);

        let result = generated("shop", "Api").apply(&ctx(&client, false));
        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert_eq!(mock.count(Operation::CreateLogGroup), 0);
    }

    #[test]
    fn test_generated_match_is_subscribed() {
        let mock = MockBackend::new();
        mock.add_log_group("/aws/lambda/shop-Api-1A2B3C4D");
        let client = client(&mock);

        let result = generated("shop", "Api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(mock.filters("/aws/lambda/shop-Api-1A2B3C4D").len(), 1);
    }

    #[test]
    fn test_other_stack_sharing_the_prefix_is_left_alone() {
        let mock = MockBackend::new();
        // Function `Worker` of a stack named `shop-Api`.
        mock.add_log_group("/aws/lambda/shop-Api-Worker-9Z8Y7X6W");
        let client = client(&mock);

        let result = generated("shop", "Api").apply(&ctx(&client, false));
        assert!(matches!(result, ApplyResult::Skipped { .. }));
        assert!(mock.filters("/aws/lambda/shop-Api-Worker-9Z8Y7X6W").is_empty());
        assert_eq!(mock.count(Operation::PutSubscriptionFilter), 0);
    }

    #[test]
    fn test_only_newest_generated_group_is_subscribed() {
        let mock = MockBackend::new();
        mock.add_log_group("/aws/lambda/shop-Api-OLD111");
        mock.add_log_group("/aws/lambda/shop-Api-NEW222");
        let client = client(&mock);

        let result = generated("shop", "Api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Modified);
        assert_eq!(mock.filters("/aws/lambda/shop-Api-NEW222").len(), 1);
        assert!(mock.filters("/aws/lambda/shop-Api-OLD111").is_empty());
        assert_eq!(mock.count(Operation::PutSubscriptionFilter), 1);
    }

    #[test]
    fn test_select_newest() {
        assert_eq!(select_newest(Vec::new()), Ok(None));
        assert_eq!(
            select_newest(vec![
                created_at("/aws/lambda/shop-Api-A", Some(10)),
                created_at("/aws/lambda/shop-Api-B", Some(30)),
                created_at("/aws/lambda/shop-Api-C", Some(20)),
            ]),
            Ok(Some("/aws/lambda/shop-Api-B".to_string()))
        );
    }

    #[test]
    fn test_select_newest_tie_is_ambiguous() {
        let err = select_newest(vec![
            created_at("/aws/lambda/shop-Api-A", None),
            created_at("/aws/lambda/shop-Api-B", None),
        ])
        .unwrap_err();
        assert_eq!(err, ["/aws/lambda/shop-Api-A", "/aws/lambda/shop-Api-B"]);

        assert!(
            select_newest(vec![
                created_at("/aws/lambda/shop-Api-A", Some(5)),
                created_at("/aws/lambda/shop-Api-B", Some(5)),
                created_at("/aws/lambda/shop-Api-C", Some(1)),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_filter_limit_is_a_failure() {
        let mock = MockBackend::new();
        for name in ["a", "b"] {
            mock.add_subscription_filter(SubscriptionFilter::new(
                name,
                "/aws/lambda/api",
                format!("arn:other:{name}"),
                "",
            ));
        }
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        match result {
            ApplyResult::Failed { error } => assert!(error.starts_with("limit exceeded")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(mock.count(Operation::PutSubscriptionFilter), 0);
    }

    #[test]
    fn test_same_filter_name_is_replaced() {
        let mock = MockBackend::new();
        mock.add_subscription_filter(SubscriptionFilter::new("a", "/aws/lambda/api", "arn:a", ""));
        mock.add_subscription_filter(SubscriptionFilter::new(
            "datadog-forwarder",
            "/aws/lambda/api",
            "arn:old-forwarder",
            "",
        ));
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert_eq!(result, ApplyResult::Modified);
        let filters = mock.filters("/aws/lambda/api");
        assert_eq!(filters.len(), 2);
        assert!(filters[1].targets(DEST));
    }

    #[test]
    fn test_dry_run_only_describes() {
        let mock = MockBackend::new();
        mock.add_log_group("/aws/lambda/worker");
        let client = client(&mock);

        assert_eq!(
            exact("Api", "/aws/lambda/api").apply(&ctx(&client, true)),
            ApplyResult::Created
        );
        assert_eq!(
            exact("Worker", "/aws/lambda/worker").apply(&ctx(&client, true)),
            ApplyResult::Modified
        );
        assert!(mock.calls().iter().all(|c| matches!(
            c,
            Call::DescribeLogGroups { .. } | Call::DescribeSubscriptionFilters { .. }
        )));
        assert!(!mock.has_log_group("/aws/lambda/api"));
    }

    #[test]
    fn test_remote_error_is_captured() {
        let mock = MockBackend::new();
        mock.fail(
            Operation::DescribeLogGroups,
            "/aws/lambda/api",
            MockFailure::AccessDenied,
        );
        let client = client(&mock);

        let result = exact("Api", "/aws/lambda/api").apply(&ctx(&client, false));
        assert!(matches!(
            result,
            ApplyResult::Failed { ref error } if error.starts_with("access denied")
        ));
    }

    #[test]
    fn test_plan_groups_shared_log_groups() {
        let defs = vec![
            LogGroupDefinition {
                key: "A".to_string(),
                log_group_resource: None,
                log_group_name: LogGroupName::Exact("/aws/lambda/shared".to_string()),
            },
            LogGroupDefinition {
                key: "B".to_string(),
                log_group_resource: None,
                log_group_name: LogGroupName::Exact("/aws/lambda/b".to_string()),
            },
            LogGroupDefinition {
                key: "C".to_string(),
                log_group_resource: Some("SharedLogs".to_string()),
                log_group_name: LogGroupName::Exact("/aws/lambda/shared".to_string()),
            },
        ];

        let units = LogSubscription::plan(&defs);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].keys, ["A", "C"]);
        assert_eq!(units[0].id(), "A, C");
    }
}
