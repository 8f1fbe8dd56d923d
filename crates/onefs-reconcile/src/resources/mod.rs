//! Resource kinds.
//!
//! Each kind is a zero-sized marker implementing [`onefs_core::ResourceSpec`]
//! together with its declared, wire and model types.

pub mod file_pool_policy;
pub mod snapshot_schedule;
pub mod synciq_rule;
pub mod user_group;

pub use file_pool_policy::{FilePoolPolicy, FilePoolPolicyDesired, FilePoolPolicyModel, PolicyAction};
pub use snapshot_schedule::{SnapshotSchedule, SnapshotScheduleDesired, SnapshotScheduleModel};
pub use synciq_rule::{RuleSchedule, RuleType, SyncIqRule, SyncIqRuleDesired, SyncIqRuleModel, Weekday};
pub use user_group::{GroupSelector, UserGroup, UserGroupDesired, UserGroupModel};

/// Free text as the appliance reports it; an empty string means unset.
pub(crate) fn non_empty_text(value: &Option<String>) -> Option<String> {
    value.clone().filter(|text| !text.is_empty())
}

/// Update value for an optional free-text field. Dropping a declared value
/// clears it on the appliance with an empty string.
pub(crate) fn text_change(current: &Option<String>, desired: &Option<String>) -> Option<String> {
    match (current, desired) {
        (Some(current), Some(desired)) if current == desired => None,
        (_, Some(desired)) => Some(desired.clone()),
        (Some(_), None) => Some(String::new()),
        (None, None) => None,
    }
}
