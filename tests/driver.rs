//! End-to-end driver tests: rules file, state file and in-memory store.

#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rulesync::{DesiredState, Driver, Error, StateFile};
use rulesync_core::{InMemoryRuleStore, Rule, RuleStore, StoreError, StoreOp};
use rulesync_reconciler::{FixedClock, Reconciler, ReconcilerConfig, Warning};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0)
        .single()
        .unwrap_or_default()
}

struct Harness {
    _dir: TempDir,
    state_path: PathBuf,
    store: Arc<InMemoryRuleStore>,
    driver: Driver,
}

fn harness(store: InMemoryRuleStore) -> Result<Harness, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let state_path = dir.path().join(".rulesync").join("state.json");
    let store = Arc::new(store);
    let reconciler = Reconciler::new(
        store.clone(),
        Arc::new(FixedClock::new(now())),
        ReconcilerConfig::default(),
    );
    Ok(Harness {
        driver: Driver::new(reconciler, &state_path),
        state_path,
        store,
        _dir: dir,
    })
}

/// A fresh apply creates every rule and records it in state.
///
/// # GIVEN
/// An empty store and no state file
///
/// # WHEN
/// Two rules are applied
///
/// # THEN
/// Both exist remotely and in state, stamped with the clock
#[tokio::test]
async fn test_apply_creates_and_persists() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    let desired = DesiredState::parse(
        r#"
        [[rules]]
        metric = "up"
        aggregations = ["sum"]

        [[rules]]
        name = "requests"
        metric = "http_requests_total"
        drop_labels = ["pod"]
        "#,
    )?;

    let applied = h.driver.apply(&desired).await?.into_result()?;

    assert_eq!(applied, 2);
    assert_eq!(h.store.len().await, 2);
    let state = StateFile::load(&h.state_path)?;
    let requests = state.get("requests").ok_or("requests not in state")?;
    assert_eq!(requests.metric, "http_requests_total");
    assert_eq!(requests.local.last_updated, Some(now()));
    Ok(())
}

/// A second apply with unchanged config touches nothing.
#[tokio::test]
async fn test_second_apply_is_noop() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    let desired = DesiredState::parse("[[rules]]\nmetric = \"up\"\naggregations = [\"sum\"]")?;
    h.driver.apply(&desired).await?.into_result()?;
    h.store.clear_calls().await;

    let applied = h.driver.apply(&desired).await?.into_result()?;

    assert_eq!(applied, 0);
    assert_eq!(h.store.ops().await, vec![StoreOp::Read]);
    Ok(())
}

/// Changing the metric of an instance replaces the rule.
///
/// # GIVEN
/// Instance `web` applied with metric `a`
///
/// # WHEN
/// The config moves `web` to metric `b`
///
/// # THEN
/// The store sees delete of `a` then create of `b`, and state tracks `b`
#[tokio::test]
async fn test_metric_change_replaces() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    h.driver
        .apply(&DesiredState::parse("[[rules]]\nname = \"web\"\nmetric = \"a\"")?)
        .await?
        .into_result()?;
    h.store.clear_calls().await;

    h.driver
        .apply(&DesiredState::parse("[[rules]]\nname = \"web\"\nmetric = \"b\"")?)
        .await?
        .into_result()?;

    assert_eq!(
        h.store.ops().await,
        vec![StoreOp::Read, StoreOp::Delete, StoreOp::Create]
    );
    assert!(h.store.get("a").await.is_none());
    assert!(h.store.get("b").await.is_some());
    let state = StateFile::load(&h.state_path)?;
    assert_eq!(state.get("web").map(|r| r.metric.as_str()), Some("b"));
    Ok(())
}

/// A failed create half of a replace is partial. State keeps the prior
/// record, and the next apply recovers through drift.
#[tokio::test]
async fn test_partial_replace_recovers_on_next_apply() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    h.driver
        .apply(&DesiredState::parse("[[rules]]\nname = \"web\"\nmetric = \"a\"")?)
        .await?
        .into_result()?;
    h.store
        .fail_next(StoreOp::Create, StoreError::unavailable("down"))
        .await;
    let moved = DesiredState::parse("[[rules]]\nname = \"web\"\nmetric = \"b\"")?;

    let outcome = h.driver.apply(&moved).await?;

    assert_eq!(outcome.applied, 0);
    assert!(outcome.failure.as_ref().is_some_and(Error::is_partial));
    assert!(h.store.is_empty().await);
    let state = StateFile::load(&h.state_path)?;
    assert_eq!(state.get("web").map(|r| r.metric.as_str()), Some("a"));

    let outcome = h.driver.apply(&moved).await?;

    assert!(matches!(outcome.warnings.first(), Some(Warning::Drift { .. })));
    assert_eq!(outcome.into_result()?, 1);
    assert!(h.store.get("b").await.is_some());
    Ok(())
}

/// A failure part way through keeps the progress made before it.
#[tokio::test]
async fn test_failure_keeps_earlier_progress() -> TestResult {
    let h = harness(InMemoryRuleStore::with_rules([Rule::new("b")]))?;
    let desired = DesiredState::parse("[[rules]]\nmetric = \"a\"\n\n[[rules]]\nmetric = \"b\"")?;

    let outcome = h.driver.apply(&desired).await?;

    assert_eq!(outcome.applied, 1);
    assert!(matches!(
        outcome.failure,
        Some(Error::Reconcile { ref name, .. }) if name == "b"
    ));
    let state = StateFile::load(&h.state_path)?;
    assert!(state.get("a").is_some());
    assert!(state.get("b").is_none());
    Ok(())
}

/// Auto-import adopts an existing rule with a warning.
#[tokio::test]
async fn test_apply_auto_import_adopts() -> TestResult {
    let h = harness(InMemoryRuleStore::with_rules([Rule::new("up")]))?;
    let desired = DesiredState::parse(
        "[[rules]]\nmetric = \"up\"\naggregations = [\"max\"]\nauto_import = true",
    )?;

    let outcome = h.driver.apply(&desired).await?;

    assert!(outcome.failure.is_none());
    assert_eq!(outcome.warnings, vec![Warning::auto_import_adopted("up")]);
    assert_eq!(
        h.store.get("up").await.map(|r| r.aggregations),
        Some(vec!["max".to_string()])
    );
    Ok(())
}

/// A rule deleted out of band is dropped on refresh and recreated on apply.
#[tokio::test]
async fn test_drift_is_recreated() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    let desired = DesiredState::parse("[[rules]]\nmetric = \"up\"")?;
    h.driver.apply(&desired).await?.into_result()?;
    h.store.delete(&Rule::new("up")).await?;

    let (plan, warnings) = h.driver.plan(&desired).await?;
    assert_eq!(plan.summary(), (1, 0, 0));
    assert!(matches!(warnings.first(), Some(Warning::Drift { metric, .. }) if metric == "up"));

    h.driver.apply(&desired).await?.into_result()?;
    assert!(h.store.get("up").await.is_some());
    Ok(())
}

/// Rules removed from config are deleted after everything else.
#[tokio::test]
async fn test_removed_rule_is_deleted() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;
    h.driver
        .apply(&DesiredState::parse("[[rules]]\nmetric = \"a\"\n\n[[rules]]\nmetric = \"b\"")?)
        .await?
        .into_result()?;

    h.driver
        .apply(&DesiredState::parse("[[rules]]\nmetric = \"b\"")?)
        .await?
        .into_result()?;

    assert!(h.store.get("a").await.is_none());
    let state = StateFile::load(&h.state_path)?;
    assert_eq!(state.rules.keys().collect::<Vec<_>>(), vec!["b"]);
    Ok(())
}

/// Import adopts an existing rule under a chosen name.
#[tokio::test]
async fn test_import_existing_rule() -> TestResult {
    let rule = Rule::new("http_requests_total").with_aggregations(["sum"]);
    let h = harness(InMemoryRuleStore::with_rules([rule]))?;

    h.driver.import("requests", "http_requests_total").await?;

    let state = StateFile::load(&h.state_path)?;
    let record = state.get("requests").ok_or("not imported")?;
    assert_eq!(record.aggregations, vec!["sum"]);
    assert!(!record.local.auto_import);
    Ok(())
}

/// Importing a missing rule fails and leaves state alone.
#[tokio::test]
async fn test_import_missing_rule_fails() -> TestResult {
    let h = harness(InMemoryRuleStore::new())?;

    let result = h.driver.import("requests", "http_requests_total").await;

    assert!(matches!(result, Err(Error::ImportNotFound { .. })));
    assert!(!h.state_path.exists());
    Ok(())
}

/// Importing over a managed instance is refused.
#[tokio::test]
async fn test_import_refuses_managed_name() -> TestResult {
    let h = harness(InMemoryRuleStore::with_rules([Rule::new("up")]))?;
    h.driver.import("up", "up").await?;

    let result = h.driver.import("up", "up").await;

    assert!(matches!(result, Err(Error::AlreadyManaged { .. })));
    Ok(())
}

/// Destroy deletes every managed rule and empties state.
#[tokio::test]
async fn test_destroy_removes_everything() -> TestResult {
    let h = harness(InMemoryRuleStore::with_rules([Rule::new("unmanaged")]))?;
    h.driver
        .apply(&DesiredState::parse("[[rules]]\nmetric = \"a\"\n\n[[rules]]\nmetric = \"b\"")?)
        .await?
        .into_result()?;

    let destroyed = h.driver.destroy().await?.into_result()?;

    assert_eq!(destroyed, 2);
    assert_eq!(h.store.len().await, 1);
    assert!(StateFile::load(&h.state_path)?.rules.is_empty());
    Ok(())
}
