//! Snapshot schedules.
//!
//! Retention is declared as a human string (`"2 Week(s)"`, `"Never Expires"`)
//! and stored by the appliance as seconds. Mapping keeps the declared
//! spelling when one exists and otherwise renders the remote seconds with the
//! duration codec.

use onefs_core::types::duration::{decode, encode};
use onefs_core::{ConfigValidator, ListRequest, OnefsError, RemoteId, ResourceSpec, RetentionDuration, SortDir, ValidationResult};
use serde::{Deserialize, Serialize};

/// Resource kind marker
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotSchedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotScheduleDesired {
    pub name: String,
    /// Directory the snapshots are taken of, under `/ifs`
    pub path: String,
    /// Snapshot naming pattern, e.g. `ScheduleName_%Y-%m-%d_%H:%M`
    pub pattern: String,
    /// Schedule expression, e.g. `every 1 days at 12:00 AM`
    pub schedule: String,
    pub alias: Option<String>,
    /// Declared retention; defaults to the appliance's when absent
    pub retention_time: Option<String>,
}

impl SnapshotScheduleDesired {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        pattern: impl Into<String>,
        schedule: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            pattern: pattern.into(),
            schedule: schedule.into(),
            alias: None,
            retention_time: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_retention(mut self, retention: impl Into<String>) -> Self {
        self.retention_time = Some(retention.into());
        self
    }

    /// Declared retention, decoded
    pub fn retention(&self) -> Result<Option<RetentionDuration>, OnefsError> {
        self.retention_time
            .as_deref()
            .map(decode)
            .transpose()
            .map_err(OnefsError::from)
    }
}

/// Schedule record as returned by the appliance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotScheduleRecord {
    pub id: Option<i64>,
    pub name: String,
    pub path: String,
    pub pattern: String,
    pub schedule: String,
    pub alias: Option<String>,
    /// Retention seconds; absent means never expires
    pub duration: Option<i32>,
    pub next_run: Option<i64>,
    pub next_snapshot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotScheduleModel {
    pub id: String,
    pub name: String,
    pub path: String,
    pub pattern: String,
    pub schedule: String,
    pub alias: Option<String>,
    pub retention_time: String,
    pub duration: RetentionDuration,
    pub next_run: i64,
    pub next_snapshot: Option<String>,
}

/// Fields of an update call; unchanged fields are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotScheduleDelta {
    pub name: Option<String>,
    pub path: Option<String>,
    pub pattern: Option<String>,
    pub schedule: Option<String>,
    pub alias: Option<String>,
    pub duration: Option<RetentionDuration>,
}

impl SnapshotScheduleDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn changed(current: &str, desired: &str) -> Option<String> {
    (current != desired).then(|| desired.to_string())
}

impl ResourceSpec for SnapshotSchedule {
    const KIND: &'static str = "snapshot_schedule";

    type Desired = SnapshotScheduleDesired;
    type Remote = SnapshotScheduleRecord;
    type Model = SnapshotScheduleModel;
    type Delta = SnapshotScheduleDelta;

    fn validate(desired: &Self::Desired) -> ValidationResult {
        let mut validator = ConfigValidator::new();
        validator
            .non_empty("name", &desired.name)
            .non_empty("path", &desired.path)
            .non_empty("pattern", &desired.pattern)
            .non_empty("schedule", &desired.schedule);
        if !desired.path.is_empty() {
            validator.format("path", &desired.path, "an absolute path", desired.path.starts_with('/'));
        }
        if let Some(retention) = &desired.retention_time {
            if let Err(err) = decode(retention) {
                validator.push("retention_time", err);
            }
        }
        validator.result()
    }

    fn map(remote: &Self::Remote, hint: Option<&Self::Desired>) -> onefs_core::Result<Self::Model> {
        let id = remote
            .id
            .ok_or_else(|| OnefsError::mapping(Self::KIND, "schedule record has no id"))?;
        let next_run = remote
            .next_run
            .ok_or_else(|| OnefsError::mapping(Self::KIND, format!("schedule {id} has no next_run")))?;
        let duration = RetentionDuration::from_wire(remote.duration)
            .map_err(|err| OnefsError::mapping(Self::KIND, format!("schedule {id}: {err}")))?;
        let retention_time = hint
            .and_then(|desired| desired.retention_time.clone())
            .unwrap_or_else(|| encode(duration));

        Ok(SnapshotScheduleModel {
            id: id.to_string(),
            name: remote.name.clone(),
            path: remote.path.clone(),
            pattern: remote.pattern.clone(),
            schedule: remote.schedule.clone(),
            alias: remote.alias.clone(),
            retention_time,
            duration,
            next_run,
            next_snapshot: remote.next_snapshot.clone(),
        })
    }

    fn remote_id(model: &Self::Model) -> RemoteId {
        RemoteId::new(model.id.clone())
    }

    fn delta(current: &Self::Model, desired: &Self::Desired) -> onefs_core::Result<Option<Self::Delta>> {
        let duration = desired
            .retention()?
            .filter(|duration| *duration != current.duration);
        let delta = SnapshotScheduleDelta {
            name: changed(&current.name, &desired.name),
            path: changed(&current.path, &desired.path),
            pattern: changed(&current.pattern, &desired.pattern),
            schedule: changed(&current.schedule, &desired.schedule),
            alias: desired
                .alias
                .as_ref()
                .filter(|alias| current.alias.as_ref() != Some(*alias))
                .cloned(),
            duration,
        };
        Ok((!delta.is_empty()).then_some(delta))
    }
}

/// Sort and limit options of a schedule listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotScheduleFilter {
    pub sort: Option<String>,
    pub dir: Option<SortDir>,
    pub limit: Option<u32>,
}

impl From<&SnapshotScheduleFilter> for ListRequest {
    fn from(filter: &SnapshotScheduleFilter) -> Self {
        ListRequest {
            sort: filter.sort.clone(),
            dir: filter.dir,
            limit: filter.limit,
            ..ListRequest::default()
        }
    }
}
