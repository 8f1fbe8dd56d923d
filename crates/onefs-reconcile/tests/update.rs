//! Updates of existing resources: guards, scalar deltas and relation plans

use std::sync::Arc;

use assert_matches::assert_matches;
use onefs_core::config::EngineConfig;
use onefs_core::{CancelSignal, ErrorKind, MembershipSet, OnefsError, Relation, RelationOp};
use onefs_reconcile::convergence::Convergence;
use onefs_reconcile::resources::file_pool_policy::{FilePoolPolicy, FilePoolPolicyDesired, PolicyAction};
use onefs_reconcile::resources::snapshot_schedule::SnapshotSchedule;
use onefs_reconcile::resources::synciq_rule::{RuleType, SyncIqRule, SyncIqRuleDesired};
use onefs_reconcile::resources::user_group::{UserGroup, UserGroupModel};
use onefs_reconcile::{ReconcileConfig, RelationOrder};
use onefs_testkit::{
    group_with, init_test_tracing, log_policy, nightly_schedule, office_hours_bandwidth, Call, Failure, MockAppliance,
    Op,
};

fn engine<S>(appliance: &MockAppliance) -> Convergence<S, MockAppliance>
where
    S: onefs_core::ResourceSpec,
    MockAppliance: onefs_core::ResourceEffects<S>,
{
    init_test_tracing();
    Convergence::new(Arc::new(appliance.clone()))
}

fn set(items: &[&str]) -> MembershipSet {
    items.iter().copied().collect()
}

/// Appliance with roles seeded and group `ops` (GID 3000) created.
async fn ops_group(users: &[&str], roles: &[&str]) -> (MockAppliance, UserGroupModel) {
    let appliance = MockAppliance::new();
    for role in ["AuditAdmin", "BackupAdmin", "SystemAdmin"] {
        appliance.seed_role(role);
    }
    let model = engine::<UserGroup>(&appliance)
        .reconcile(&group_with("ops", 3000, users, roles))
        .await
        .into_result()
        .unwrap();
    appliance.clear_calls();
    (appliance, model)
}

#[tokio::test]
async fn renaming_a_group_is_rejected_before_any_call() {
    let (appliance, current) = ops_group(&["alice"], &[]).await;

    let err = engine::<UserGroup>(&appliance)
        .update(&current, &group_with("operators", 3000, &["alice"], &[]))
        .await
        .unwrap_err();

    assert_matches!(err, OnefsError::ImmutableField { ref field, .. } if field == "name");
    assert!(appliance.calls().is_empty());
}

#[tokio::test]
async fn gid_change_requires_force() {
    let (appliance, current) = ops_group(&["alice"], &["AuditAdmin"]).await;

    let err = engine::<UserGroup>(&appliance)
        .update(&current, &group_with("ops", 3001, &["alice"], &["AuditAdmin"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("force"));
    assert!(appliance.calls().is_empty());
}

#[tokio::test]
async fn forced_gid_change_replaces_every_role_assignment() {
    let (appliance, current) = ops_group(&["alice"], &["AuditAdmin"]).await;
    let desired = group_with("ops", 3001, &["alice"], &["AuditAdmin", "BackupAdmin"]).forced();

    let outcome = engine::<UserGroup>(&appliance).update(&current, &desired).await.unwrap();

    assert!(outcome.updated);
    assert_eq!(
        outcome.relations,
        vec![
            (Relation::RoleAssignments, RelationOp::Remove("AuditAdmin".into())),
            (Relation::RoleAssignments, RelationOp::Add("AuditAdmin".into())),
            (Relation::RoleAssignments, RelationOp::Add("BackupAdmin".into())),
        ]
    );
    assert_eq!(outcome.model.gid, Some(3001));
    assert_eq!(outcome.model.roles, set(&["AuditAdmin", "BackupAdmin"]));
    assert_eq!(appliance.role_members("AuditAdmin"), vec!["GID:3001"]);
    assert_eq!(appliance.role_members("BackupAdmin"), vec!["GID:3001"]);

    let mutations: Vec<Op> = appliance
        .calls()
        .into_iter()
        .map(|call| call.op)
        .filter(|op| *op != Op::ListPage)
        .collect();
    assert_eq!(
        mutations,
        vec![Op::Update, Op::RemoveRelation, Op::AddRelation, Op::AddRelation, Op::Read]
    );
}

#[tokio::test]
async fn member_changes_remove_before_adding() {
    let (appliance, current) = ops_group(&["alice", "bob"], &[]).await;

    let outcome = engine::<UserGroup>(&appliance)
        .update(&current, &group_with("ops", 3000, &["bob", "carol"], &[]))
        .await
        .unwrap();

    assert!(!outcome.updated);
    assert_eq!(
        outcome.relations,
        vec![
            (Relation::GroupMembers, RelationOp::Remove("alice".into())),
            (Relation::GroupMembers, RelationOp::Add("carol".into())),
        ]
    );
    assert_eq!(outcome.model.users, set(&["bob", "carol"]));
    assert!(appliance.calls_of(Op::Update).is_empty());
}

#[tokio::test]
async fn adds_first_order_is_configurable() {
    let (appliance, current) = ops_group(&["alice"], &[]).await;
    let config = ReconcileConfig::from_toml_str("relation_order = \"adds_first\"").unwrap();
    assert_eq!(config.relation_order, RelationOrder::AddsFirst);

    let outcome = engine::<UserGroup>(&appliance)
        .with_config(config)
        .update(&current, &group_with("ops", 3000, &["bob"], &[]))
        .await
        .unwrap();

    assert_eq!(
        outcome.relations,
        vec![
            (Relation::GroupMembers, RelationOp::Add("bob".into())),
            (Relation::GroupMembers, RelationOp::Remove("alice".into())),
        ]
    );
}

#[tokio::test]
async fn relation_failures_are_aggregated_after_every_attempt() {
    let (appliance, current) = ops_group(&["alice", "bob"], &[]).await;
    appliance.fail(Failure::on(Op::AddRelation, "group_members").target("carol"));

    let err = engine::<UserGroup>(&appliance)
        .update(&current, &group_with("ops", 3000, &["bob", "carol", "dave"], &[]))
        .await
        .unwrap_err();

    let partial = assert_matches!(err, OnefsError::PartialOperation(partial) => partial);
    assert_eq!(partial.failed_identities(), vec!["carol"]);
    assert_eq!(
        partial.succeeded,
        vec![
            (Relation::GroupMembers, RelationOp::Remove("alice".into())),
            (Relation::GroupMembers, RelationOp::Add("dave".into())),
        ]
    );
    assert_eq!(appliance.group_members("ops"), vec!["bob", "dave"]);
    assert!(appliance.calls_of(Op::Read).is_empty());
}

#[tokio::test]
async fn cancellation_stops_relation_execution() {
    let (appliance, current) = ops_group(&["alice"], &[]).await;
    let signal = CancelSignal::new();
    appliance.cancel_during(Op::AddRelation, "group_members", signal.clone());

    let err = engine::<UserGroup>(&appliance)
        .with_cancellation(Arc::new(signal))
        .update(&current, &group_with("ops", 3000, &["alice", "bob", "carol"], &[]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(appliance.calls_of(Op::AddRelation).len(), 1);
}

#[tokio::test]
async fn renamed_policy_is_read_back_under_its_new_name() {
    let appliance = MockAppliance::new();
    let convergence = engine::<FilePoolPolicy>(&appliance);
    let current = convergence.reconcile(&log_policy("logs")).await.into_result().unwrap();
    appliance.clear_calls();

    let outcome = convergence.update(&current, &log_policy("app-logs")).await.unwrap();

    assert_eq!(outcome.model.name, "app-logs");
    assert_eq!(
        appliance.calls_of(Op::Read),
        vec![Call {
            op: Op::Read,
            kind: "file_pool_policy".into(),
            target: "app-logs".into(),
        }]
    );
    assert!(appliance.policy("logs").is_none());
}

#[tokio::test]
async fn default_policy_update_carries_actions_only() {
    let appliance = MockAppliance::new();
    let convergence = engine::<FilePoolPolicy>(&appliance);
    let current = convergence
        .reconcile(&FilePoolPolicyDesired::default_policy(vec![PolicyAction::EnableCoalescer(true)]))
        .await
        .into_result()
        .unwrap();

    let desired = FilePoolPolicyDesired::default_policy(vec![
        PolicyAction::EnableCoalescer(false),
        PolicyAction::SetDataAccessPattern("random".into()),
    ]);
    let outcome = convergence.update(&current, &desired).await.unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.model.actions, desired.actions);
}

#[tokio::test]
async fn default_policy_flag_is_immutable() {
    let appliance = MockAppliance::new();
    let convergence = engine::<FilePoolPolicy>(&appliance);
    let current = convergence
        .reconcile(&FilePoolPolicyDesired::default_policy(Vec::new()))
        .await
        .into_result()
        .unwrap();
    appliance.clear_calls();

    let err = convergence.update(&current, &log_policy("logs")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ImmutableField);
    assert!(appliance.calls().is_empty());
}

#[tokio::test]
async fn equal_retention_in_another_spelling_is_not_resent() {
    let appliance = MockAppliance::new();
    let convergence = engine::<SnapshotSchedule>(&appliance);
    let current = convergence
        .reconcile(&nightly_schedule("nightly"))
        .await
        .into_result()
        .unwrap();
    appliance.clear_calls();

    let desired = nightly_schedule("nightly").with_retention("7 Day(s)");
    let outcome = convergence.update(&current, &desired).await.unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.model.retention_time, "7 Day(s)");
    assert!(appliance.calls_of(Op::Update).is_empty());
}

#[tokio::test]
async fn update_echo_is_trusted_when_verification_is_off() {
    let appliance = MockAppliance::new();
    let config = ReconcileConfig {
        verify_after_update: false,
        ..ReconcileConfig::default()
    };
    let convergence = engine::<SnapshotSchedule>(&appliance).with_config(config);
    let current = convergence
        .reconcile(&nightly_schedule("nightly"))
        .await
        .into_result()
        .unwrap();
    appliance.clear_calls();

    let mut desired = nightly_schedule("nightly").with_retention("2 Week(s)");
    desired.schedule = "every 2 days at 12:00 AM".into();
    let outcome = convergence.update(&current, &desired).await.unwrap();

    assert_eq!(outcome.model.schedule, "every 2 days at 12:00 AM");
    assert_eq!(outcome.model.retention_time, "2 Week(s)");
    let ops: Vec<Op> = appliance.calls().into_iter().map(|call| call.op).collect();
    assert_eq!(ops, vec![Op::Update]);
}

#[tokio::test]
async fn rule_type_cannot_change() {
    let appliance = MockAppliance::new();
    let convergence = engine::<SyncIqRule>(&appliance);
    let current = convergence
        .reconcile(&office_hours_bandwidth(10_000))
        .await
        .into_result()
        .unwrap();

    let err = convergence
        .update(&current, &SyncIqRuleDesired::new(RuleType::Cpu, 50))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ImmutableField);

    let outcome = convergence
        .update(&current, &office_hours_bandwidth(20_000))
        .await
        .unwrap();
    assert_eq!(outcome.model.limit, 20_000);
}

#[tokio::test]
async fn dropping_a_description_clears_it_on_the_appliance() {
    let appliance = MockAppliance::new();
    let convergence = engine::<FilePoolPolicy>(&appliance);
    let mut described = log_policy("logs");
    described.description = Some("rotate application logs".into());
    let current = convergence.reconcile(&described).await.into_result().unwrap();
    assert_eq!(current.description.as_deref(), Some("rotate application logs"));

    let outcome = convergence.update(&current, &log_policy("logs")).await.unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.model.description, None);
    let stored = appliance.policy("logs").and_then(|policy| policy.description);
    assert_eq!(stored.as_deref(), Some(""));

    let again = convergence.update(&outcome.model, &log_policy("logs")).await.unwrap();
    assert!(!again.updated);
}
