//! Declared resources and appliance records used across tests

use onefs_reconcile::resources::file_pool_policy::{
    Criterion, FileMatchingPattern, FilePoolPolicyDesired, PolicyAction, StoragePolicy,
};
use onefs_reconcile::resources::snapshot_schedule::{SnapshotScheduleDesired, SnapshotScheduleRecord};
use onefs_reconcile::resources::synciq_rule::{RuleSchedule, RuleType, SyncIqRuleDesired, Weekday};
use onefs_reconcile::resources::user_group::{GroupRecord, UserGroupDesired};

/// Daily schedule of `/ifs/data/<name>` kept for one week
pub fn nightly_schedule(name: &str) -> SnapshotScheduleDesired {
    SnapshotScheduleDesired::new(
        name,
        format!("/ifs/data/{name}"),
        format!("{name}_%Y-%m-%d"),
        "every 1 days at 12:00 AM",
    )
    .with_retention("1 Week(s)")
}

pub fn snapshot_record(id: i64, name: &str) -> SnapshotScheduleRecord {
    SnapshotScheduleRecord {
        id: Some(id),
        name: name.to_string(),
        path: format!("/ifs/data/{name}"),
        pattern: format!("{name}_%Y-%m-%d"),
        schedule: "every 1 days at 12:00 AM".to_string(),
        alias: None,
        duration: Some(604_800),
        next_run: Some(1_700_000_000),
        next_snapshot: None,
    }
}

pub fn local_group(name: &str, gid: i64) -> GroupRecord {
    GroupRecord {
        id: format!("GROUP:{name}"),
        name: name.to_string(),
        gid: Some(format!("GID:{gid}")),
        domain: "UNIX_GROUPS".to_string(),
        provider: "lsa-local-provider:System".to_string(),
        sam_account_name: name.to_string(),
        kind: "group".to_string(),
        ..GroupRecord::default()
    }
}

pub fn group_with(name: &str, gid: i64, users: &[&str], roles: &[&str]) -> UserGroupDesired {
    UserGroupDesired::new(name)
        .with_gid(gid)
        .with_users(users.iter().copied())
        .with_roles(roles.iter().copied())
}

/// Policy moving `*.log` files to streaming access
pub fn log_policy(name: &str) -> FilePoolPolicyDesired {
    FilePoolPolicyDesired::new(
        name,
        FileMatchingPattern::all_of(vec![Criterion::new("name", "==", "*.log")]),
    )
    .with_action(PolicyAction::SetDataAccessPattern("streaming".to_string()))
    .with_action(PolicyAction::ApplyDataStoragePolicy(StoragePolicy {
        ssd_strategy: "metadata".to_string(),
        storagepool: "anywhere".to_string(),
    }))
}

/// Weekday office-hours bandwidth cap
pub fn office_hours_bandwidth(limit: i64) -> SyncIqRuleDesired {
    SyncIqRuleDesired::new(RuleType::Bandwidth, limit).with_schedule(RuleSchedule::new(
        "08:00",
        "18:00",
        [
            Weekday::Monday,
            Weekday::Tuesday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday,
        ],
    ))
}
