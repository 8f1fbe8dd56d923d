//! File pool policies.
//!
//! The appliance always has exactly one default policy. It cannot be created
//! or deleted: declaring `is_default_policy` adopts it, updates change only its
//! actions, and destroying it only forgets it.

use onefs_core::{ConfigValidator, OnefsError, RemoteId, ResourceSpec, ValidationResult};
use serde::{Deserialize, Serialize};

use super::{non_empty_text, text_change};

/// Identity of the default policy
pub const DEFAULT_POLICY_ID: &str = "Default policy";

/// Import identifier that selects the default policy
pub const DEFAULT_POLICY_IMPORT: &str = "is_default_policy=true";

const MAX_OR_CRITERIA: i64 = 3;
const MAX_AND_CRITERIA: i64 = 5;
const SSD_STRATEGIES: &[&str] = &["metadata", "metadata-write", "data", "avoid"];
const ACCESS_PATTERNS: &[&str] = &["random", "concurrency", "streaming"];
const CACHE_TYPES: &[&str] = &["cached", "no-cache"];
const READ_AHEAD: &[&str] = &["partial", "full"];

/// Resource kind marker
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePoolPolicy;

/// Resolve an import identifier to a policy identity.
pub fn import_id(raw: &str) -> RemoteId {
    if raw == DEFAULT_POLICY_IMPORT {
        RemoteId::new(DEFAULT_POLICY_ID)
    } else {
        RemoteId::new(raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(rename = "type")]
    pub kind: String,
    pub operator: Option<String>,
    pub value: Option<String>,
    /// Only valid with `type = size`
    pub units: Option<String>,
    /// Only valid with `type = custom_attribute`
    pub field: Option<String>,
    pub use_relative_time: Option<bool>,
    pub case_sensitive: Option<bool>,
    pub begins_with: Option<bool>,
    /// Only valid with `type = custom_attribute`
    pub attribute_exists: Option<bool>,
}

impl Criterion {
    pub fn new(kind: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            operator: Some(operator.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrCriterion {
    pub and_criteria: Vec<Criterion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMatchingPattern {
    pub or_criteria: Vec<OrCriterion>,
}

impl FileMatchingPattern {
    /// A pattern of one conjunction
    pub fn all_of(criteria: Vec<Criterion>) -> Self {
        Self {
            or_criteria: vec![OrCriterion { and_criteria: criteria }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    pub ssd_strategy: String,
    pub storagepool: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudpoolCache {
    pub expiration: Option<i64>,
    pub read_ahead: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudpoolPolicy {
    pub pool: String,
    pub archive_snapshot_files: Option<bool>,
    pub compression: Option<bool>,
    pub encryption: Option<bool>,
    pub data_retention: Option<i64>,
    pub full_backup_retention: Option<i64>,
    pub incremental_backup_retention: Option<i64>,
    pub writeback_frequency: Option<i64>,
    pub cache: Option<CloudpoolCache>,
}

/// One policy action with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "payload", rename_all = "snake_case")]
pub enum PolicyAction {
    SetRequestedProtection(String),
    SetDataAccessPattern(String),
    EnableCoalescer(bool),
    EnablePacking(bool),
    ApplyDataStoragePolicy(StoragePolicy),
    ApplySnapshotStoragePolicy(StoragePolicy),
    SetCloudpoolPolicy(CloudpoolPolicy),
}

impl PolicyAction {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::SetRequestedProtection(_) => "set_requested_protection",
            Self::SetDataAccessPattern(_) => "set_data_access_pattern",
            Self::EnableCoalescer(_) => "enable_coalescer",
            Self::EnablePacking(_) => "enable_packing",
            Self::ApplyDataStoragePolicy(_) => "apply_data_storage_policy",
            Self::ApplySnapshotStoragePolicy(_) => "apply_snapshot_storage_policy",
            Self::SetCloudpoolPolicy(_) => "set_cloudpool_policy",
        }
    }

    /// Wire form of this action
    pub fn to_record(&self) -> ActionRecord {
        let mut record = ActionRecord {
            action_type: self.action_type().to_string(),
            ..ActionRecord::default()
        };
        match self {
            Self::SetRequestedProtection(level) => record.requested_protection_action = Some(level.clone()),
            Self::SetDataAccessPattern(pattern) => record.data_access_pattern_action = Some(pattern.clone()),
            Self::EnableCoalescer(enabled) => record.enable_coalescer_action = Some(*enabled),
            Self::EnablePacking(enabled) => record.enable_packing_action = Some(*enabled),
            Self::ApplyDataStoragePolicy(policy) => record.data_storage_policy_action = Some(policy.clone()),
            Self::ApplySnapshotStoragePolicy(policy) => record.snapshot_storage_policy_action = Some(policy.clone()),
            Self::SetCloudpoolPolicy(policy) => record.cloudpool_policy_action = Some(policy.clone()),
        }
        record
    }

    /// Parse a wire action, which must carry exactly the payload its type names.
    pub fn from_record(record: &ActionRecord) -> Result<Self, String> {
        if record.payload_count() != 1 {
            return Err(format!(
                "action {} carries {} payloads, expected exactly one",
                record.action_type,
                record.payload_count()
            ));
        }
        let action = match record.action_type.as_str() {
            "set_requested_protection" => record.requested_protection_action.clone().map(Self::SetRequestedProtection),
            "set_data_access_pattern" => record.data_access_pattern_action.clone().map(Self::SetDataAccessPattern),
            "enable_coalescer" => record.enable_coalescer_action.map(Self::EnableCoalescer),
            "enable_packing" => record.enable_packing_action.map(Self::EnablePacking),
            "apply_data_storage_policy" => record.data_storage_policy_action.clone().map(Self::ApplyDataStoragePolicy),
            "apply_snapshot_storage_policy" => record
                .snapshot_storage_policy_action
                .clone()
                .map(Self::ApplySnapshotStoragePolicy),
            "set_cloudpool_policy" => record.cloudpool_policy_action.clone().map(Self::SetCloudpoolPolicy),
            other => return Err(format!("unknown action type {other:?}")),
        };
        action.ok_or_else(|| format!("action {} carries a payload of another type", record.action_type))
    }
}

/// Action as the appliance stores it: a type tag and one populated payload field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: String,
    pub enable_packing_action: Option<bool>,
    pub enable_coalescer_action: Option<bool>,
    pub data_access_pattern_action: Option<String>,
    pub requested_protection_action: Option<String>,
    pub data_storage_policy_action: Option<StoragePolicy>,
    pub snapshot_storage_policy_action: Option<StoragePolicy>,
    pub cloudpool_policy_action: Option<CloudpoolPolicy>,
}

impl ActionRecord {
    fn payload_count(&self) -> usize {
        [
            self.enable_packing_action.is_some(),
            self.enable_coalescer_action.is_some(),
            self.data_access_pattern_action.is_some(),
            self.requested_protection_action.is_some(),
            self.data_storage_policy_action.is_some(),
            self.snapshot_storage_policy_action.is_some(),
            self.cloudpool_policy_action.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePoolPolicyDesired {
    pub name: String,
    /// Immutable
    pub is_default_policy: bool,
    pub description: Option<String>,
    pub apply_order: Option<i64>,
    pub file_matching_pattern: Option<FileMatchingPattern>,
    pub actions: Vec<PolicyAction>,
}

impl FilePoolPolicyDesired {
    pub fn new(name: impl Into<String>, pattern: FileMatchingPattern) -> Self {
        Self {
            name: name.into(),
            is_default_policy: false,
            description: None,
            apply_order: None,
            file_matching_pattern: Some(pattern),
            actions: Vec::new(),
        }
    }

    /// The default policy with the given actions
    pub fn default_policy(actions: Vec<PolicyAction>) -> Self {
        Self {
            name: DEFAULT_POLICY_ID.to_string(),
            is_default_policy: true,
            description: None,
            apply_order: None,
            file_matching_pattern: None,
            actions,
        }
    }

    pub fn with_action(mut self, action: PolicyAction) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePoolPolicyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub apply_order: Option<i64>,
    pub file_matching_pattern: Option<FileMatchingPattern>,
    pub actions: Vec<ActionRecord>,
    pub birth_cluster_id: Option<String>,
    /// `OK` or `disabled`
    pub state: Option<String>,
    pub state_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePoolPolicyModel {
    pub id: String,
    pub name: String,
    pub is_default_policy: bool,
    pub description: Option<String>,
    pub apply_order: Option<i64>,
    pub file_matching_pattern: Option<FileMatchingPattern>,
    pub actions: Vec<PolicyAction>,
    pub birth_cluster_id: Option<String>,
    pub state: Option<String>,
}

/// Fields of an update call; the default policy only accepts `actions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilePoolPolicyDelta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub apply_order: Option<i64>,
    pub file_matching_pattern: Option<FileMatchingPattern>,
    pub actions: Option<Vec<ActionRecord>>,
}

impl FilePoolPolicyDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn has_duplicates<T: PartialEq>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(index, item)| items[index + 1..].contains(item))
}

fn validate_pattern(validator: &mut ConfigValidator, pattern: &FileMatchingPattern) {
    let ors = &pattern.or_criteria;
    validator.range("or_criteria", ors.len() as i64, Some(1), Some(MAX_OR_CRITERIA));
    if has_duplicates(ors) {
        validator.push("or_criteria", "entries must be unique");
    }
    validator.each("or_criteria", ors, |v, _, or| {
        let ands = &or.and_criteria;
        v.range("and_criteria", ands.len() as i64, Some(1), Some(MAX_AND_CRITERIA));
        if has_duplicates(ands) {
            v.push("and_criteria", "entries must be unique");
        }
        v.each("and_criteria", ands, |v, _, criterion| validate_criterion(v, criterion));
    });
}

fn validate_criterion(validator: &mut ConfigValidator, criterion: &Criterion) {
    validator.non_empty("type", &criterion.kind);
    match &criterion.units {
        Some(_) if criterion.kind != "size" => {
            validator.push("units", "only valid with type size");
        }
        Some(units) => {
            validator.range("units", units.len() as i64, Some(1), Some(255));
        }
        None => {}
    }
    if criterion.kind != "custom_attribute" {
        if criterion.field.is_some() {
            validator.push("field", "only valid with type custom_attribute");
        }
        if criterion.attribute_exists.is_some() {
            validator.push("attribute_exists", "only valid with type custom_attribute");
        }
    }
}

fn one_of(validator: &mut ConfigValidator, field: &str, value: &str, allowed: &[&str]) {
    validator.format(field, value, &allowed.join(", "), allowed.iter().any(|candidate| *candidate == value));
}

fn validate_action(validator: &mut ConfigValidator, action: &PolicyAction) {
    match action {
        PolicyAction::SetRequestedProtection(level) => {
            validator.non_empty("requested_protection_action", level);
        }
        PolicyAction::SetDataAccessPattern(pattern) => {
            one_of(validator, "data_access_pattern_action", pattern, ACCESS_PATTERNS);
        }
        PolicyAction::ApplyDataStoragePolicy(policy) | PolicyAction::ApplySnapshotStoragePolicy(policy) => {
            one_of(validator, "ssd_strategy", &policy.ssd_strategy, SSD_STRATEGIES);
            validator.non_empty("storagepool", &policy.storagepool);
        }
        PolicyAction::SetCloudpoolPolicy(policy) => {
            validator.non_empty("pool", &policy.pool);
            if let Some(cache) = &policy.cache {
                if let Some(kind) = &cache.kind {
                    one_of(validator, "cache.type", kind, CACHE_TYPES);
                }
                if let Some(read_ahead) = &cache.read_ahead {
                    one_of(validator, "cache.read_ahead", read_ahead, READ_AHEAD);
                }
            }
        }
        PolicyAction::EnableCoalescer(_) | PolicyAction::EnablePacking(_) => {}
    }
}

fn map_actions(records: &[ActionRecord]) -> onefs_core::Result<Vec<PolicyAction>> {
    records
        .iter()
        .map(|record| PolicyAction::from_record(record).map_err(|msg| OnefsError::mapping(FilePoolPolicy::KIND, msg)))
        .collect()
}

fn action_records(actions: &[PolicyAction]) -> Vec<ActionRecord> {
    actions.iter().map(PolicyAction::to_record).collect()
}

impl ResourceSpec for FilePoolPolicy {
    const KIND: &'static str = "file_pool_policy";

    type Desired = FilePoolPolicyDesired;
    type Remote = FilePoolPolicyRecord;
    type Model = FilePoolPolicyModel;
    type Delta = FilePoolPolicyDelta;

    fn validate(desired: &Self::Desired) -> ValidationResult {
        let mut validator = ConfigValidator::new();
        validator.non_empty("name", &desired.name);

        if desired.is_default_policy {
            let default_flag = Some(true);
            validator
                .exclusive("file_matching_pattern", &desired.file_matching_pattern, "is_default_policy", &default_flag)
                .exclusive("apply_order", &desired.apply_order, "is_default_policy", &default_flag);
        } else {
            validator.required("file_matching_pattern", &desired.file_matching_pattern);
            if let Some(pattern) = &desired.file_matching_pattern {
                let mut pattern_validator = validator.for_field("file_matching_pattern");
                validate_pattern(&mut pattern_validator, pattern);
                validator.merge(pattern_validator);
            }
        }

        let types: Vec<&str> = desired.actions.iter().map(PolicyAction::action_type).collect();
        if has_duplicates(&types) {
            validator.push("actions", "each action type may appear once");
        }
        validator.each("actions", &desired.actions, |v, _, action| validate_action(v, action));
        validator.result()
    }

    fn map(remote: &Self::Remote, _hint: Option<&Self::Desired>) -> onefs_core::Result<Self::Model> {
        let id = remote
            .id
            .clone()
            .ok_or_else(|| OnefsError::mapping(Self::KIND, "policy record has no id"))?;
        let is_default_policy = id == DEFAULT_POLICY_ID;
        let name = match (&remote.name, is_default_policy) {
            (Some(name), _) => name.clone(),
            (None, true) => DEFAULT_POLICY_ID.to_string(),
            (None, false) => return Err(OnefsError::mapping(Self::KIND, format!("policy {id} has no name"))),
        };
        Ok(FilePoolPolicyModel {
            id,
            name,
            is_default_policy,
            description: non_empty_text(&remote.description),
            apply_order: remote.apply_order,
            file_matching_pattern: remote.file_matching_pattern.clone(),
            actions: map_actions(&remote.actions)?,
            birth_cluster_id: remote.birth_cluster_id.clone(),
            state: remote.state.clone(),
        })
    }

    fn remote_id(model: &Self::Model) -> RemoteId {
        if model.is_default_policy {
            RemoteId::new(DEFAULT_POLICY_ID)
        } else {
            RemoteId::new(model.name.clone())
        }
    }

    fn remote_id_after(current: &Self::Model, desired: &Self::Desired) -> RemoteId {
        if current.is_default_policy {
            RemoteId::new(DEFAULT_POLICY_ID)
        } else {
            RemoteId::new(desired.name.clone())
        }
    }

    fn delta(current: &Self::Model, desired: &Self::Desired) -> onefs_core::Result<Option<Self::Delta>> {
        let actions = (current.actions != desired.actions).then(|| action_records(&desired.actions));
        let delta = if current.is_default_policy {
            FilePoolPolicyDelta {
                actions,
                ..FilePoolPolicyDelta::default()
            }
        } else {
            FilePoolPolicyDelta {
                name: (current.name != desired.name).then(|| desired.name.clone()),
                description: text_change(&current.description, &desired.description),
                apply_order: desired.apply_order.filter(|order| current.apply_order != Some(*order)),
                file_matching_pattern: desired
                    .file_matching_pattern
                    .clone()
                    .filter(|pattern| current.file_matching_pattern.as_ref() != Some(pattern)),
                actions,
            }
        };
        Ok((!delta.is_empty()).then_some(delta))
    }

    fn immutable_violation(current: &Self::Model, desired: &Self::Desired) -> Option<&'static str> {
        (current.is_default_policy != desired.is_default_policy).then_some("is_default_policy")
    }

    fn adopt_target(desired: &Self::Desired) -> Option<RemoteId> {
        desired
            .is_default_policy
            .then(|| RemoteId::new(DEFAULT_POLICY_ID))
    }

    fn adopt_delta(desired: &Self::Desired) -> onefs_core::Result<Self::Delta> {
        Ok(FilePoolPolicyDelta {
            actions: (!desired.actions.is_empty()).then(|| action_records(&desired.actions)),
            ..FilePoolPolicyDelta::default()
        })
    }

    fn retained_on_destroy(model: &Self::Model) -> bool {
        model.is_default_policy
    }
}
