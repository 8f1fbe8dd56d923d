//! In-memory appliance implementing every collaborator effect.
//!
//! Every call is recorded. Failures are injected per operation, kind and
//! target; cancellation can be fired after a number of calls or while a given
//! call is in flight.
//!
//! # Blocking Lock Usage
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! await point.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use onefs_core::{
    CancelSignal, Created, ListRequest, NeverCancel, OnefsError, Page, PageSource, Relation,
    RelationEffects, RemoteId, ResourceEffects, ResourceSpec, Result, RetentionDuration,
};
use onefs_reconcile::resources::file_pool_policy::{
    FilePoolPolicy, FilePoolPolicyDelta, FilePoolPolicyDesired, FilePoolPolicyRecord, PolicyAction, DEFAULT_POLICY_ID,
};
use onefs_reconcile::resources::snapshot_schedule::{
    SnapshotSchedule, SnapshotScheduleDelta, SnapshotScheduleDesired, SnapshotScheduleRecord,
};
use onefs_reconcile::resources::synciq_rule::{
    RuleType, SyncIqRule, SyncIqRuleDelta, SyncIqRuleDesired, SyncIqRuleRecord,
};
use onefs_reconcile::resources::user_group::{
    load_record, GroupRecord, MemberListRequest, Persona, RoleRecord, UserGroup, UserGroupDelta, UserGroupDesired,
    UserGroupRecord,
};
use onefs_reconcile::CollectionFetcher;
use parking_lot::Mutex;
use tracing::debug;

/// Listing kind of member pages
pub const PERSONA_LISTING: &str = "persona";
/// Listing kind of role pages
pub const ROLE_LISTING: &str = "role";

const FIRST_GENERATED_GID: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Create,
    Read,
    Update,
    Delete,
    AddRelation,
    RemoveRelation,
    ListPage,
}

/// One recorded collaborator call.
///
/// `kind` is the resource kind, the relation name, or the listing name.
/// `target` is the resource identity, the relation child, or `page <n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub kind: String,
    pub target: String,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} {}", self.op, self.kind, self.target)
    }
}

/// Injected failure
#[derive(Debug, Clone)]
pub struct Failure {
    op: Op,
    kind: String,
    target: Option<String>,
    remaining: Option<usize>,
}

impl Failure {
    /// Fail every `op` call on `kind`
    pub fn on(op: Op, kind: impl Into<String>) -> Self {
        Self {
            op,
            kind: kind.into(),
            target: None,
            remaining: None,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn once(mut self) -> Self {
        self.remaining = Some(1);
        self
    }

    fn matches(&self, call: &Call) -> bool {
        self.op == call.op
            && self.kind == call.kind
            && self.target.as_ref().map_or(true, |target| *target == call.target)
    }
}

#[derive(Debug, Clone)]
enum CancelTrigger {
    AfterCalls(usize),
    During { op: Op, kind: String },
}

enum Gate {
    Proceed,
    Fail(OnefsError),
    Hang,
}

#[derive(Debug)]
struct GroupEntry {
    record: GroupRecord,
    members: BTreeSet<String>,
}

#[derive(Debug)]
struct ApplianceState {
    calls: Vec<Call>,
    failures: Vec<Failure>,
    cancel: Option<(CancelTrigger, CancelSignal)>,
    corrupt: BTreeSet<String>,
    page_size: usize,
    next_id: i64,
    next_gid: i64,
    snapshots: BTreeMap<String, SnapshotScheduleRecord>,
    groups: BTreeMap<String, GroupEntry>,
    roles: BTreeMap<String, RoleRecord>,
    policies: BTreeMap<String, FilePoolPolicyRecord>,
    rules: BTreeMap<String, SyncIqRuleRecord>,
}

impl ApplianceState {
    fn new() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(
            DEFAULT_POLICY_ID.to_string(),
            FilePoolPolicyRecord {
                id: Some(DEFAULT_POLICY_ID.to_string()),
                state: Some("OK".to_string()),
                ..FilePoolPolicyRecord::default()
            },
        );
        Self {
            calls: Vec::new(),
            failures: Vec::new(),
            cancel: None,
            corrupt: BTreeSet::new(),
            page_size: 2,
            next_id: 1,
            next_gid: FIRST_GENERATED_GID,
            snapshots: BTreeMap::new(),
            groups: BTreeMap::new(),
            roles: BTreeMap::new(),
            policies,
            rules: BTreeMap::new(),
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn gid_persona(&self, parent: &str) -> Result<String> {
        if parent.starts_with("GID:") {
            return Ok(parent.to_string());
        }
        self.groups
            .get(parent)
            .and_then(|entry| entry.record.gid.clone())
            .ok_or_else(|| not_found("group", parent))
    }
}

fn not_found(kind: &str, id: &str) -> OnefsError {
    OnefsError::transport(format!("read {kind}"), format!("{kind} {id} not found"))
}

fn conflict(kind: &str, id: &str) -> OnefsError {
    OnefsError::transport(format!("create {kind}"), format!("{kind} {id} already exists"))
}

/// In-memory OneFS appliance. Clones share state.
#[derive(Debug, Clone)]
pub struct MockAppliance {
    state: Arc<Mutex<ApplianceState>>,
}

impl Default for MockAppliance {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAppliance {
    /// Empty appliance holding only the default file pool policy
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ApplianceState::new())),
        }
    }

    /// Items per page of every list endpoint
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().page_size = page_size.max(1);
        self
    }

    pub fn fail(&self, failure: Failure) {
        self.state.lock().failures.push(failure);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Fire `signal` once `calls` calls have completed
    pub fn cancel_after(&self, calls: usize, signal: CancelSignal) {
        self.state.lock().cancel = Some((CancelTrigger::AfterCalls(calls), signal));
    }

    /// Fire `signal` while an `op` call on `kind` is in flight; the call never
    /// completes
    pub fn cancel_during(&self, op: Op, kind: impl Into<String>, signal: CancelSignal) {
        let trigger = CancelTrigger::During { op, kind: kind.into() };
        self.state.lock().cancel = Some((trigger, signal));
    }

    /// Make reads of `kind` return a record that cannot be mapped
    pub fn corrupt_reads(&self, kind: &str) {
        self.state.lock().corrupt.insert(kind.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.state.lock().calls.iter().filter(|call| call.op == op).cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn seed_group(&self, record: GroupRecord, members: &[&str]) {
        let entry = GroupEntry {
            members: members.iter().map(ToString::to_string).collect(),
            record,
        };
        self.state.lock().groups.insert(entry.record.name.clone(), entry);
    }

    pub fn seed_role(&self, name: &str) {
        let role = RoleRecord {
            id: name.to_string(),
            name: name.to_string(),
            members: Vec::new(),
        };
        self.state.lock().roles.insert(name.to_string(), role);
    }

    pub fn seed_snapshot(&self, record: SnapshotScheduleRecord) {
        let mut state = self.state.lock();
        let id = match record.id {
            Some(id) => id,
            None => state.allocate_id(),
        };
        state.snapshots.insert(id.to_string(), SnapshotScheduleRecord { id: Some(id), ..record });
    }

    pub fn group(&self, name: &str) -> Option<GroupRecord> {
        self.state.lock().groups.get(name).map(|entry| entry.record.clone())
    }

    pub fn group_members(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .groups
            .get(name)
            .map(|entry| entry.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Persona ids assigned to `role`
    pub fn role_members(&self, role: &str) -> Vec<String> {
        self.state
            .lock()
            .roles
            .get(role)
            .map(|role| role.members.iter().filter_map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, id: &str) -> Option<SnapshotScheduleRecord> {
        self.state.lock().snapshots.get(id).cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshots.len()
    }

    pub fn policy(&self, id: &str) -> Option<FilePoolPolicyRecord> {
        self.state.lock().policies.get(id).cloned()
    }

    pub fn rule(&self, id: &str) -> Option<SyncIqRuleRecord> {
        self.state.lock().rules.get(id).cloned()
    }

    pub fn rule_count(&self) -> usize {
        self.state.lock().rules.len()
    }

    fn gate(&self, op: Op, kind: &str, target: &str) -> Gate {
        let mut state = self.state.lock();
        let call = Call {
            op,
            kind: kind.to_string(),
            target: target.to_string(),
        };
        state.calls.push(call.clone());

        if let Some((trigger, signal)) = &state.cancel {
            match trigger {
                CancelTrigger::During { op, kind } if *op == call.op && *kind == call.kind => {
                    debug!(%call, "cancelling while the call is in flight");
                    signal.cancel();
                    return Gate::Hang;
                }
                CancelTrigger::AfterCalls(count) if *count == state.calls.len() => {
                    debug!(%call, calls = count, "cancelling after call");
                    signal.cancel();
                }
                _ => {}
            }
        }

        let Some(index) = state.failures.iter().position(|failure| failure.matches(&call)) else {
            return Gate::Proceed;
        };
        let exhausted = match state.failures[index].remaining.as_mut() {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            state.failures.remove(index);
        }
        debug!(%call, "injecting failure");
        Gate::Fail(OnefsError::transport(
            format!("{op:?} {kind}").to_lowercase(),
            format!("injected failure on {target}"),
        ))
    }

    async fn enter(&self, op: Op, kind: &str, target: &str) -> Result<()> {
        match self.gate(op, kind, target) {
            Gate::Proceed => Ok(()),
            Gate::Fail(err) => Err(err),
            Gate::Hang => {
                future::pending::<()>().await;
                Ok(())
            }
        }
    }

    /// Record the page call and slice `items` at the request's resume offset.
    async fn page<T, F>(&self, listing: &str, resume: Option<&str>, limit: Option<u32>, items: F) -> Result<Page<T>>
    where
        F: FnOnce(&ApplianceState) -> Result<Vec<T>>,
    {
        let offset = match resume {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| OnefsError::transport(format!("list {listing}"), format!("bad resume token {token:?}")))?,
            None => 0,
        };
        let size = {
            let page_size = self.state.lock().page_size;
            limit.map_or(page_size, |limit| limit as usize).max(1)
        };
        self.enter(Op::ListPage, listing, &format!("page {}", offset / size + 1))
            .await?;

        let items = items(&*self.state.lock())?;
        let end = (offset + size).min(items.len());
        let resume = (end < items.len()).then(|| end.to_string());
        let slice = items.into_iter().skip(offset).take(end.saturating_sub(offset)).collect();
        Ok(Page::new(slice, resume))
    }
}

#[async_trait]
impl PageSource<ListRequest, GroupRecord> for MockAppliance {
    async fn fetch(&self, request: &ListRequest) -> Result<Page<GroupRecord>> {
        let prefix = request.query.get("filter").cloned();
        self.page(UserGroup::KIND, request.resume.as_deref(), request.limit, |state| {
            Ok(state
                .groups
                .values()
                .filter(|entry| prefix.as_deref().map_or(true, |p| entry.record.name.starts_with(p)))
                .map(|entry| entry.record.clone())
                .collect())
        })
        .await
    }
}

#[async_trait]
impl PageSource<MemberListRequest, Persona> for MockAppliance {
    async fn fetch(&self, request: &MemberListRequest) -> Result<Page<Persona>> {
        self.page(PERSONA_LISTING, request.resume.as_deref(), None, |state| {
            let entry = state
                .groups
                .get(&request.group)
                .ok_or_else(|| not_found(UserGroup::KIND, &request.group))?;
            Ok(entry.members.iter().map(|name| Persona::user(name.as_str())).collect())
        })
        .await
    }
}

#[async_trait]
impl PageSource<ListRequest, RoleRecord> for MockAppliance {
    async fn fetch(&self, request: &ListRequest) -> Result<Page<RoleRecord>> {
        self.page(ROLE_LISTING, request.resume.as_deref(), request.limit, |state| {
            Ok(state.roles.values().cloned().collect())
        })
        .await
    }
}

#[async_trait]
impl PageSource<ListRequest, SnapshotScheduleRecord> for MockAppliance {
    async fn fetch(&self, request: &ListRequest) -> Result<Page<SnapshotScheduleRecord>> {
        self.page(SnapshotSchedule::KIND, request.resume.as_deref(), request.limit, |state| {
            Ok(state.snapshots.values().cloned().collect())
        })
        .await
    }
}

#[async_trait]
impl ResourceEffects<SnapshotSchedule> for MockAppliance {
    async fn create(&self, desired: &SnapshotScheduleDesired) -> Result<Created<SnapshotScheduleRecord>> {
        self.enter(Op::Create, SnapshotSchedule::KIND, &desired.name).await?;
        let duration = desired.retention()?.and_then(RetentionDuration::to_wire);

        let mut state = self.state.lock();
        let id = state.allocate_id();
        let record = SnapshotScheduleRecord {
            id: Some(id),
            name: desired.name.clone(),
            path: desired.path.clone(),
            pattern: desired.pattern.clone(),
            schedule: desired.schedule.clone(),
            alias: desired.alias.clone(),
            duration,
            next_run: Some(1_700_000_000 + id),
            next_snapshot: None,
        };
        state.snapshots.insert(id.to_string(), record.clone());
        Ok(Created {
            id: RemoteId::new(id.to_string()),
            response: Some(record),
        })
    }

    async fn read(&self, id: &RemoteId) -> Result<SnapshotScheduleRecord> {
        self.enter(Op::Read, SnapshotSchedule::KIND, id.as_str()).await?;
        let state = self.state.lock();
        let mut record = state
            .snapshots
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| not_found(SnapshotSchedule::KIND, id.as_str()))?;
        if state.corrupt.contains(SnapshotSchedule::KIND) {
            record.next_run = None;
        }
        Ok(record)
    }

    async fn update(&self, id: &RemoteId, delta: &SnapshotScheduleDelta) -> Result<Option<SnapshotScheduleRecord>> {
        self.enter(Op::Update, SnapshotSchedule::KIND, id.as_str()).await?;
        let mut state = self.state.lock();
        let record = state
            .snapshots
            .get_mut(id.as_str())
            .ok_or_else(|| not_found(SnapshotSchedule::KIND, id.as_str()))?;
        let fields = [
            (&mut record.name, &delta.name),
            (&mut record.path, &delta.path),
            (&mut record.pattern, &delta.pattern),
            (&mut record.schedule, &delta.schedule),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        if let Some(alias) = &delta.alias {
            record.alias = Some(alias.clone());
        }
        if let Some(duration) = delta.duration {
            record.duration = duration.to_wire();
        }
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.enter(Op::Delete, SnapshotSchedule::KIND, id.as_str()).await?;
        self.state
            .lock()
            .snapshots
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(SnapshotSchedule::KIND, id.as_str()))
    }
}

#[async_trait]
impl ResourceEffects<UserGroup> for MockAppliance {
    async fn create(&self, desired: &UserGroupDesired) -> Result<Created<UserGroupRecord>> {
        self.enter(Op::Create, UserGroup::KIND, &desired.name).await?;
        let mut state = self.state.lock();
        if state.groups.contains_key(&desired.name) {
            return Err(conflict(UserGroup::KIND, &desired.name));
        }
        let (gid, generated_gid) = match desired.gid {
            Some(gid) => (gid, false),
            None => {
                state.next_gid += 1;
                (state.next_gid, true)
            }
        };
        let record = GroupRecord {
            id: format!("GROUP:{}", desired.name),
            name: desired.name.clone(),
            gid: Some(format!("GID:{gid}")),
            sid: desired.sid.clone(),
            domain: "UNIX_GROUPS".to_string(),
            provider: desired
                .query
                .provider
                .clone()
                .unwrap_or_else(|| "lsa-local-provider:System".to_string()),
            sam_account_name: desired.name.clone(),
            kind: "group".to_string(),
            generated_gid,
            ..GroupRecord::default()
        };
        let members = desired.users.iter().map(ToString::to_string).collect();
        state
            .groups
            .insert(desired.name.clone(), GroupEntry { record, members });
        Ok(Created {
            id: RemoteId::new(desired.name.clone()),
            response: None,
        })
    }

    async fn read(&self, id: &RemoteId) -> Result<UserGroupRecord> {
        self.enter(Op::Read, UserGroup::KIND, id.as_str()).await?;
        let group = {
            let state = self.state.lock();
            let mut group = state
                .groups
                .get(id.as_str())
                .map(|entry| entry.record.clone())
                .ok_or_else(|| not_found(UserGroup::KIND, id.as_str()))?;
            if state.corrupt.contains(UserGroup::KIND) {
                group.gid = Some("GID:unresolved".to_string());
            }
            group
        };
        load_record(self, group, &CollectionFetcher::new(), &NeverCancel).await
    }

    async fn update(&self, id: &RemoteId, delta: &UserGroupDelta) -> Result<Option<UserGroupRecord>> {
        self.enter(Op::Update, UserGroup::KIND, id.as_str()).await?;
        if !delta.query.force {
            return Err(OnefsError::transport(
                format!("update {} {id}", UserGroup::KIND),
                "changing a gid requires force",
            ));
        }
        let mut state = self.state.lock();
        let entry = state
            .groups
            .get_mut(id.as_str())
            .ok_or_else(|| not_found(UserGroup::KIND, id.as_str()))?;
        entry.record.gid = Some(format!("GID:{}", delta.gid));
        entry.record.generated_gid = false;
        Ok(None)
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.enter(Op::Delete, UserGroup::KIND, id.as_str()).await?;
        let mut state = self.state.lock();
        let entry = state
            .groups
            .remove(id.as_str())
            .ok_or_else(|| not_found(UserGroup::KIND, id.as_str()))?;
        for role in state.roles.values_mut() {
            role.members.retain(|member| member.id != entry.record.gid);
        }
        Ok(())
    }
}

#[async_trait]
impl RelationEffects for MockAppliance {
    async fn add_relation(&self, relation: Relation, parent: &str, child: &str) -> Result<()> {
        self.enter(Op::AddRelation, &relation.to_string(), child).await?;
        let mut state = self.state.lock();
        match relation {
            Relation::GroupMembers => {
                let entry = state
                    .groups
                    .get_mut(parent)
                    .ok_or_else(|| not_found(UserGroup::KIND, parent))?;
                entry.members.insert(child.to_string());
            }
            Relation::RoleAssignments => {
                let persona = state.gid_persona(parent)?;
                let role = state.roles.get_mut(child).ok_or_else(|| not_found("role", child))?;
                if !role.members.iter().any(|m| m.id.as_deref() == Some(persona.as_str())) {
                    role.members.push(Persona {
                        id: Some(persona),
                        name: None,
                        kind: Some("group".to_string()),
                    });
                }
            }
        }
        Ok(())
    }

    async fn remove_relation(&self, relation: Relation, parent: &str, child: &str) -> Result<()> {
        self.enter(Op::RemoveRelation, &relation.to_string(), child).await?;
        let mut state = self.state.lock();
        match relation {
            Relation::GroupMembers => {
                let entry = state
                    .groups
                    .get_mut(parent)
                    .ok_or_else(|| not_found(UserGroup::KIND, parent))?;
                entry.members.remove(child);
            }
            Relation::RoleAssignments => {
                let persona = state.gid_persona(parent)?;
                let role = state.roles.get_mut(child).ok_or_else(|| not_found("role", child))?;
                role.members.retain(|m| m.id.as_deref() != Some(persona.as_str()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceEffects<FilePoolPolicy> for MockAppliance {
    async fn create(&self, desired: &FilePoolPolicyDesired) -> Result<Created<FilePoolPolicyRecord>> {
        self.enter(Op::Create, FilePoolPolicy::KIND, &desired.name).await?;
        if desired.is_default_policy {
            return Err(OnefsError::transport(
                format!("create {}", FilePoolPolicy::KIND),
                "the default policy cannot be created",
            ));
        }
        let mut state = self.state.lock();
        if state.policies.contains_key(&desired.name) {
            return Err(conflict(FilePoolPolicy::KIND, &desired.name));
        }
        let record = FilePoolPolicyRecord {
            id: Some(desired.name.clone()),
            name: Some(desired.name.clone()),
            description: desired.description.clone(),
            apply_order: Some(desired.apply_order.unwrap_or(state.policies.len() as i64)),
            file_matching_pattern: desired.file_matching_pattern.clone(),
            actions: desired.actions.iter().map(PolicyAction::to_record).collect(),
            birth_cluster_id: Some("000556bae8a4".to_string()),
            state: Some("OK".to_string()),
            state_details: None,
        };
        state.policies.insert(desired.name.clone(), record.clone());
        Ok(Created {
            id: RemoteId::new(desired.name.clone()),
            response: Some(record),
        })
    }

    async fn read(&self, id: &RemoteId) -> Result<FilePoolPolicyRecord> {
        self.enter(Op::Read, FilePoolPolicy::KIND, id.as_str()).await?;
        let state = self.state.lock();
        let mut record = state
            .policies
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| not_found(FilePoolPolicy::KIND, id.as_str()))?;
        if state.corrupt.contains(FilePoolPolicy::KIND) {
            record.id = None;
        }
        Ok(record)
    }

    async fn update(&self, id: &RemoteId, delta: &FilePoolPolicyDelta) -> Result<Option<FilePoolPolicyRecord>> {
        self.enter(Op::Update, FilePoolPolicy::KIND, id.as_str()).await?;
        let scalar_change = delta.name.is_some()
            || delta.description.is_some()
            || delta.apply_order.is_some()
            || delta.file_matching_pattern.is_some();
        if id.as_str() == DEFAULT_POLICY_ID && scalar_change {
            return Err(OnefsError::transport(
                format!("update {} {id}", FilePoolPolicy::KIND),
                "the default policy only accepts actions",
            ));
        }

        let mut state = self.state.lock();
        let mut record = state
            .policies
            .remove(id.as_str())
            .ok_or_else(|| not_found(FilePoolPolicy::KIND, id.as_str()))?;
        if let Some(name) = &delta.name {
            record.id = Some(name.clone());
            record.name = Some(name.clone());
        }
        if let Some(description) = &delta.description {
            record.description = Some(description.clone());
        }
        if let Some(order) = delta.apply_order {
            record.apply_order = Some(order);
        }
        if let Some(pattern) = &delta.file_matching_pattern {
            record.file_matching_pattern = Some(pattern.clone());
        }
        if let Some(actions) = &delta.actions {
            record.actions = actions.clone();
        }
        let key = record.id.clone().unwrap_or_else(|| id.to_string());
        state.policies.insert(key, record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.enter(Op::Delete, FilePoolPolicy::KIND, id.as_str()).await?;
        if id.as_str() == DEFAULT_POLICY_ID {
            return Err(OnefsError::transport(
                format!("delete {} {id}", FilePoolPolicy::KIND),
                "the default policy cannot be deleted",
            ));
        }
        self.state
            .lock()
            .policies
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(FilePoolPolicy::KIND, id.as_str()))
    }
}

fn rule_prefix(rule_type: RuleType) -> &'static str {
    match rule_type {
        RuleType::Bandwidth => "bw",
        RuleType::FileCount => "fc",
        RuleType::Cpu => "cpu",
        RuleType::Worker => "wk",
    }
}

#[async_trait]
impl ResourceEffects<SyncIqRule> for MockAppliance {
    async fn create(&self, desired: &SyncIqRuleDesired) -> Result<Created<SyncIqRuleRecord>> {
        let prefix = rule_prefix(desired.rule_type);
        self.enter(Op::Create, SyncIqRule::KIND, prefix).await?;
        let mut state = self.state.lock();
        let index = state.rules.keys().filter(|id| id.starts_with(prefix)).count();
        let id = format!("{prefix}-{index}");
        let record = SyncIqRuleRecord {
            id: Some(id.clone()),
            rule_type: desired.rule_type.to_string(),
            description: desired.description.clone(),
            enabled: Some(desired.enabled),
            limit: desired.limit,
            schedule: desired.schedule.as_ref().map(|schedule| schedule.to_record()),
        };
        state.rules.insert(id.clone(), record.clone());
        Ok(Created {
            id: RemoteId::new(id),
            response: Some(record),
        })
    }

    async fn read(&self, id: &RemoteId) -> Result<SyncIqRuleRecord> {
        self.enter(Op::Read, SyncIqRule::KIND, id.as_str()).await?;
        let state = self.state.lock();
        let mut record = state
            .rules
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| not_found(SyncIqRule::KIND, id.as_str()))?;
        if state.corrupt.contains(SyncIqRule::KIND) {
            record.rule_type = "latency".to_string();
        }
        Ok(record)
    }

    async fn update(&self, id: &RemoteId, delta: &SyncIqRuleDelta) -> Result<Option<SyncIqRuleRecord>> {
        self.enter(Op::Update, SyncIqRule::KIND, id.as_str()).await?;
        let mut state = self.state.lock();
        let record = state
            .rules
            .get_mut(id.as_str())
            .ok_or_else(|| not_found(SyncIqRule::KIND, id.as_str()))?;
        if let Some(description) = &delta.description {
            record.description = Some(description.clone());
        }
        if let Some(enabled) = delta.enabled {
            record.enabled = Some(enabled);
        }
        if let Some(limit) = delta.limit {
            record.limit = limit;
        }
        if let Some(schedule) = &delta.schedule {
            record.schedule = Some(schedule.clone());
        }
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.enter(Op::Delete, SyncIqRule::KIND, id.as_str()).await?;
        self.state
            .lock()
            .rules
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| not_found(SyncIqRule::KIND, id.as_str()))
    }
}
