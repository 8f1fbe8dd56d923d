//! SyncIQ performance rules.
//!
//! Rules throttle replication by bandwidth, file count, CPU or workers during
//! a weekly window. The appliance stores the window as seven day flags; the
//! declared form is a set of weekdays.

use std::collections::BTreeSet;
use std::fmt;

use onefs_core::{ConfigValidator, OnefsError, RemoteId, ResourceSpec, ValidationResult};
use serde::{Deserialize, Serialize};

use super::{non_empty_text, text_change};

/// Resource kind marker
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncIqRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Bandwidth,
    FileCount,
    Cpu,
    Worker,
}

impl RuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::Bandwidth => "bandwidth",
            RuleType::FileCount => "file_count",
            RuleType::Cpu => "cpu",
            RuleType::Worker => "worker",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleType {
    type Err = OnefsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bandwidth" => Ok(RuleType::Bandwidth),
            "file_count" => Ok(RuleType::FileCount),
            "cpu" => Ok(RuleType::Cpu),
            "worker" => Ok(RuleType::Worker),
            other => Err(OnefsError::mapping(SyncIqRule::KIND, format!("unknown rule type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];
}

/// Declared rule window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSchedule {
    /// Start of the window, `HH:MM`
    pub begin: Option<String>,
    /// End of the window, `HH:MM`
    pub end: Option<String>,
    pub days_of_week: BTreeSet<Weekday>,
}

impl RuleSchedule {
    pub fn new(begin: impl Into<String>, end: impl Into<String>, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            begin: Some(begin.into()),
            end: Some(end.into()),
            days_of_week: days.into_iter().collect(),
        }
    }

    pub fn to_record(&self) -> ScheduleRecord {
        let on = |day| self.days_of_week.contains(&day);
        ScheduleRecord {
            begin: self.begin.clone(),
            end: self.end.clone(),
            monday: on(Weekday::Monday),
            tuesday: on(Weekday::Tuesday),
            wednesday: on(Weekday::Wednesday),
            thursday: on(Weekday::Thursday),
            friday: on(Weekday::Friday),
            saturday: on(Weekday::Saturday),
            sunday: on(Weekday::Sunday),
        }
    }

    pub fn from_record(record: &ScheduleRecord) -> Self {
        Self {
            begin: record.begin.clone(),
            end: record.end.clone(),
            days_of_week: Weekday::ALL.into_iter().filter(|day| record.is_set(*day)).collect(),
        }
    }
}

/// Rule window as the appliance stores it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub begin: Option<String>,
    pub end: Option<String>,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl ScheduleRecord {
    fn is_set(&self, day: Weekday) -> bool {
        match day {
            Weekday::Monday => self.monday,
            Weekday::Tuesday => self.tuesday,
            Weekday::Wednesday => self.wednesday,
            Weekday::Thursday => self.thursday,
            Weekday::Friday => self.friday,
            Weekday::Saturday => self.saturday,
            Weekday::Sunday => self.sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIqRuleDesired {
    /// Immutable: rule identities are scoped to their type
    pub rule_type: RuleType,
    pub description: Option<String>,
    pub enabled: bool,
    pub limit: i64,
    pub schedule: Option<RuleSchedule>,
}

impl SyncIqRuleDesired {
    pub fn new(rule_type: RuleType, limit: i64) -> Self {
        Self {
            rule_type,
            description: None,
            enabled: true,
            limit,
            schedule: None,
        }
    }

    pub fn with_schedule(mut self, schedule: RuleSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIqRuleRecord {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub limit: i64,
    pub schedule: Option<ScheduleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncIqRuleModel {
    pub id: String,
    pub rule_type: RuleType,
    pub description: Option<String>,
    pub enabled: bool,
    pub limit: i64,
    pub schedule: Option<RuleSchedule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncIqRuleDelta {
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub limit: Option<i64>,
    pub schedule: Option<ScheduleRecord>,
}

impl SyncIqRuleDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Whether `value` is a 24-hour `HH:MM` clock time.
pub fn is_clock_time(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return false;
    }
    matches!((hours.parse::<u8>(), minutes.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}

impl ResourceSpec for SyncIqRule {
    const KIND: &'static str = "synciq_rule";

    type Desired = SyncIqRuleDesired;
    type Remote = SyncIqRuleRecord;
    type Model = SyncIqRuleModel;
    type Delta = SyncIqRuleDelta;

    fn validate(desired: &Self::Desired) -> ValidationResult {
        let mut validator = ConfigValidator::new();
        validator.range("limit", desired.limit, Some(0), None);
        if let Some(schedule) = &desired.schedule {
            let mut window = validator.for_field("schedule");
            for (field, value) in [("begin", &schedule.begin), ("end", &schedule.end)] {
                if let Some(value) = value {
                    window.format(field, value, "HH:MM", is_clock_time(value));
                }
            }
            validator.merge(window);
        }
        validator.result()
    }

    fn map(remote: &Self::Remote, _hint: Option<&Self::Desired>) -> onefs_core::Result<Self::Model> {
        let id = remote
            .id
            .clone()
            .ok_or_else(|| OnefsError::mapping(Self::KIND, "rule record has no id"))?;
        Ok(SyncIqRuleModel {
            id,
            rule_type: remote.rule_type.parse()?,
            description: non_empty_text(&remote.description),
            enabled: remote.enabled.unwrap_or(true),
            limit: remote.limit,
            schedule: remote.schedule.as_ref().map(RuleSchedule::from_record),
        })
    }

    fn remote_id(model: &Self::Model) -> RemoteId {
        RemoteId::new(model.id.clone())
    }

    fn delta(current: &Self::Model, desired: &Self::Desired) -> onefs_core::Result<Option<Self::Delta>> {
        let delta = SyncIqRuleDelta {
            description: text_change(&current.description, &desired.description),
            enabled: (current.enabled != desired.enabled).then_some(desired.enabled),
            limit: (current.limit != desired.limit).then_some(desired.limit),
            schedule: desired
                .schedule
                .as_ref()
                .filter(|schedule| current.schedule.as_ref() != Some(*schedule))
                .map(RuleSchedule::to_record),
        };
        Ok((!delta.is_empty()).then_some(delta))
    }

    fn immutable_violation(current: &Self::Model, desired: &Self::Desired) -> Option<&'static str> {
        (current.rule_type != desired.rule_type).then_some("rule_type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onefs_core::ErrorKind;

    fn weekdays() -> RuleSchedule {
        RuleSchedule::new(
            "08:00",
            "18:00",
            [
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
            ],
        )
    }

    fn record() -> SyncIqRuleRecord {
        SyncIqRuleRecord {
            id: Some("bw-0".into()),
            rule_type: "bandwidth".into(),
            description: Some("office hours".into()),
            enabled: Some(true),
            limit: 10_000,
            schedule: Some(weekdays().to_record()),
        }
    }

    #[test]
    fn clock_times() {
        assert!(is_clock_time("00:00"));
        assert!(is_clock_time("23:59"));
        assert!(!is_clock_time("24:00"));
        assert!(!is_clock_time("8:00"));
        assert!(!is_clock_time("08:60"));
        assert!(!is_clock_time("0800"));
    }

    #[test]
    fn day_flags_round_to_day_set() {
        let flags = weekdays().to_record();
        assert!(flags.monday && flags.friday);
        assert!(!flags.saturday && !flags.sunday);
        assert_eq!(RuleSchedule::from_record(&flags), weekdays());
    }

    #[test]
    fn validation_checks_limit_and_window() {
        assert!(SyncIqRule::validate(&SyncIqRuleDesired::new(RuleType::Cpu, 50)).is_ok());

        let mut bad = SyncIqRuleDesired::new(RuleType::Worker, -1).with_schedule(weekdays());
        if let Some(schedule) = bad.schedule.as_mut() {
            schedule.end = Some("6pm".into());
        }
        let err = SyncIqRule::validate(&bad).unwrap_err();
        let fields: Vec<_> = err.flatten().into_iter().map(|e| e.field().to_string()).collect();
        assert_eq!(fields, vec!["limit", "schedule.end"]);
    }

    #[test]
    fn map_reads_type_and_schedule() {
        let model = SyncIqRule::map(&record(), None).unwrap();
        assert_eq!(model.rule_type, RuleType::Bandwidth);
        assert_eq!(model.schedule, Some(weekdays()));

        let mut unknown = record();
        unknown.rule_type = "latency".into();
        assert_eq!(SyncIqRule::map(&unknown, None).unwrap_err().kind(), ErrorKind::Mapping);
    }

    #[test]
    fn delta_and_type_guard() {
        let current = SyncIqRule::map(&record(), None).unwrap();
        let mut desired = SyncIqRuleDesired::new(RuleType::Bandwidth, 20_000).with_schedule(weekdays());
        desired.description = Some("office hours".into());
        let delta = SyncIqRule::delta(&current, &desired).unwrap().unwrap();
        assert_eq!(delta.limit, Some(20_000));
        assert!(delta.schedule.is_none() && delta.description.is_none() && delta.enabled.is_none());

        let retyped = SyncIqRuleDesired::new(RuleType::FileCount, 10_000);
        assert_eq!(SyncIqRule::immutable_violation(&current, &retyped), Some("rule_type"));
    }

    #[test]
    fn dropped_description_is_cleared() {
        let current = SyncIqRule::map(&record(), None).unwrap();
        let desired = SyncIqRuleDesired::new(RuleType::Bandwidth, 10_000).with_schedule(weekdays());

        let delta = SyncIqRule::delta(&current, &desired).unwrap().unwrap();
        assert_eq!(delta.description.as_deref(), Some(""));
        assert!(delta.limit.is_none() && delta.schedule.is_none());

        let mut cleared = record();
        cleared.description = Some(String::new());
        let current = SyncIqRule::map(&cleared, None).unwrap();
        assert_eq!(SyncIqRule::delta(&current, &desired).unwrap(), None);
    }
}
