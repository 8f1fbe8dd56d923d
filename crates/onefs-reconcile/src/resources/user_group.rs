//! User groups with member and role relations.
//!
//! A group's users and roles are relations reconciled after the scalar
//! update. Role assignments are keyed by the group's GID on removal, so a GID
//! change replaces every role assignment: all current roles are removed
//! against the old GID, then all desired roles are added by name.

use onefs_core::{
    CancellationToken, Collection, ConfigValidator, ListRequest, MembershipSet, OnefsError, PageSource, Relation,
    RelationChange, RemoteId, ResourceSpec, ResumableQuery, ValidationError, ValidationResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pagination::CollectionFetcher;

const GID_PREFIX: &str = "GID:";

/// Resource kind marker
#[derive(Debug, Clone, Copy, Default)]
pub struct UserGroup;

/// Query options sent with create and update calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupQuery {
    /// Required to change the GID of an existing group
    pub force: bool,
    pub zone: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupDesired {
    /// Immutable once created
    pub name: String,
    pub gid: Option<i64>,
    pub sid: Option<String>,
    /// User names; sent in the create body
    pub users: MembershipSet,
    /// Role names; assigned after create
    pub roles: MembershipSet,
    pub query: GroupQuery,
}

impl UserGroupDesired {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            gid: None,
            sid: None,
            users: MembershipSet::new(),
            roles: MembershipSet::new(),
            query: GroupQuery::default(),
        }
    }

    pub fn with_gid(mut self, gid: i64) -> Self {
        self.gid = Some(gid);
        self
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().collect();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn forced(mut self) -> Self {
        self.query.force = true;
        self
    }
}

/// Auth persona as the appliance reports it, e.g. `{"id": "USER:alice", "name": "alice"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Persona {
    pub fn user(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Some(format!("USER:{name}")),
            name: Some(name),
            kind: Some("user".to_string()),
        }
    }

    pub fn group_gid(gid: i64) -> Self {
        Self {
            id: Some(format!("{GID_PREFIX}{gid}")),
            name: None,
            kind: Some("group".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    pub name: String,
    /// Persona id of the GID, e.g. `GID:1000`
    pub gid: Option<String>,
    pub sid: Option<String>,
    pub dn: String,
    pub domain: String,
    pub dns_domain: String,
    pub provider: String,
    pub sam_account_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub generated_gid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    pub members: Vec<Persona>,
}

/// A group with its drained members and the role listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupRecord {
    pub group: GroupRecord,
    pub members: Vec<Persona>,
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupModel {
    pub id: String,
    pub name: String,
    pub gid: Option<i64>,
    pub sid: Option<String>,
    pub dn: String,
    pub domain: String,
    pub dns_domain: String,
    pub provider: String,
    pub sam_account_name: String,
    pub kind: String,
    pub generated_gid: bool,
    pub users: MembershipSet,
    pub roles: MembershipSet,
}

/// GID change; sent only when the GID differs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserGroupDelta {
    pub gid: i64,
    pub query: GroupQuery,
}

/// Parse a `GID:<n>` persona id.
pub fn parse_gid(raw: &str) -> Result<i64, OnefsError> {
    raw.strip_prefix(GID_PREFIX)
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or_else(|| OnefsError::mapping(UserGroup::KIND, format!("malformed gid {raw:?}")))
}

fn gid_changed(current: &UserGroupModel, desired: &UserGroupDesired) -> bool {
    desired.gid.is_some_and(|gid| current.gid != Some(gid))
}

impl ResourceSpec for UserGroup {
    const KIND: &'static str = "user_group";

    type Desired = UserGroupDesired;
    type Remote = UserGroupRecord;
    type Model = UserGroupModel;
    type Delta = UserGroupDelta;

    fn validate(desired: &Self::Desired) -> ValidationResult {
        let mut validator = ConfigValidator::new();
        validator.non_empty("name", &desired.name);
        if let Some(gid) = desired.gid {
            validator.range("gid", gid, Some(1), None);
        }
        if let Some(sid) = &desired.sid {
            validator.non_empty("sid", sid);
        }
        validator.each("users", &desired.users.iter().collect::<Vec<_>>(), |v, _, user| {
            v.non_empty("name", user);
        });
        validator.result()
    }

    fn validate_change(current: &Self::Model, desired: &Self::Desired) -> ValidationResult {
        if gid_changed(current, desired) && !desired.query.force {
            return Err(ValidationError::custom(
                "gid",
                "may not change user group's gid without using the force option",
            ));
        }
        Ok(())
    }

    fn immutable_violation(current: &Self::Model, desired: &Self::Desired) -> Option<&'static str> {
        (current.name != desired.name).then_some("name")
    }

    fn map(remote: &Self::Remote, _hint: Option<&Self::Desired>) -> onefs_core::Result<Self::Model> {
        let group = &remote.group;
        let gid = group.gid.as_deref().map(parse_gid).transpose()?;

        let users = remote
            .members
            .iter()
            .map(|member| {
                member.name.clone().ok_or_else(|| {
                    OnefsError::mapping(Self::KIND, format!("member of {} has no name", group.name))
                })
            })
            .collect::<onefs_core::Result<MembershipSet>>()?;

        let roles = match group.gid.as_deref() {
            Some(gid_id) => remote
                .roles
                .iter()
                .filter(|role| role.members.iter().any(|m| m.id.as_deref() == Some(gid_id)))
                .map(|role| role.name.clone())
                .collect(),
            None => MembershipSet::new(),
        };

        Ok(UserGroupModel {
            id: group.id.clone(),
            name: group.name.clone(),
            gid,
            sid: group.sid.clone(),
            dn: group.dn.clone(),
            domain: group.domain.clone(),
            dns_domain: group.dns_domain.clone(),
            provider: group.provider.clone(),
            sam_account_name: group.sam_account_name.clone(),
            kind: group.kind.clone(),
            generated_gid: group.generated_gid,
            users,
            roles,
        })
    }

    fn remote_id(model: &Self::Model) -> RemoteId {
        RemoteId::new(model.name.clone())
    }

    fn delta(current: &Self::Model, desired: &Self::Desired) -> onefs_core::Result<Option<Self::Delta>> {
        Ok(desired
            .gid
            .filter(|_| gid_changed(current, desired))
            .map(|gid| UserGroupDelta {
                gid,
                query: desired.query.clone(),
            }))
    }

    fn relations(current: &Self::Model, desired: &Self::Desired) -> Vec<RelationChange> {
        let role_parent = current
            .gid
            .map(|gid| format!("{GID_PREFIX}{gid}"))
            .unwrap_or_else(|| current.name.clone());
        vec![
            RelationChange::stable(
                Relation::GroupMembers,
                current.name.clone(),
                current.users.clone(),
                desired.users.clone(),
            ),
            RelationChange {
                relation: Relation::RoleAssignments,
                current_parent: role_parent,
                desired_parent: desired.name.clone(),
                current: current.roles.clone(),
                desired: desired.roles.clone(),
                key_changed: gid_changed(current, desired),
            },
        ]
    }

    fn initial_relations(desired: &Self::Desired) -> Vec<RelationChange> {
        vec![RelationChange::stable(
            Relation::RoleAssignments,
            desired.name.clone(),
            MembershipSet::new(),
            desired.roles.clone(),
        )]
    }
}

/// Selects a group by name or by GID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelector {
    pub name: Option<String>,
    pub gid: Option<i64>,
}

impl GroupSelector {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            gid: None,
        }
    }

    pub fn gid(gid: i64) -> Self {
        Self { name: None, gid: Some(gid) }
    }

    fn matches(&self, group: &GroupRecord) -> bool {
        let by_name = self.name.as_deref() == Some(group.name.as_str());
        let by_gid = match (self.gid, group.gid.as_deref()) {
            (Some(gid), Some(id)) => format!("{GID_PREFIX}{gid}") == id,
            _ => false,
        };
        by_name || by_gid
    }
}

impl std::fmt::Display for GroupSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, self.gid) {
            (Some(name), Some(gid)) => write!(f, "{name} (GID {gid})"),
            (Some(name), None) => f.write_str(name),
            (None, Some(gid)) => write!(f, "GID {gid}"),
            (None, None) => f.write_str("<empty selector>"),
        }
    }
}

/// Listing options for user groups. Name and GID selection happens locally
/// after every page has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupListFilter {
    pub name_prefix: Option<String>,
    pub domain: Option<String>,
    pub zone: Option<String>,
    pub provider: Option<String>,
    pub cached: Option<bool>,
    pub resolve_names: Option<bool>,
    pub names: Vec<GroupSelector>,
}

impl GroupListFilter {
    pub fn to_request(&self) -> ListRequest {
        let mut request = ListRequest::new();
        let params = [
            ("filter", self.name_prefix.clone()),
            ("domain", self.domain.clone()),
            ("zone", self.zone.clone()),
            ("provider", self.provider.clone()),
            ("cached", self.cached.map(|v| v.to_string())),
            ("resolve_names", self.resolve_names.map(|v| v.to_string())),
        ];
        for (key, value) in params {
            if let Some(value) = value {
                request = request.filter(key, value);
            }
        }
        request
    }
}

/// Keep the groups matched by any selector. Every selector must match at
/// least one group.
pub fn select_groups(groups: Vec<GroupRecord>, selectors: &[GroupSelector]) -> onefs_core::Result<Vec<GroupRecord>> {
    if selectors.is_empty() {
        return Ok(groups);
    }

    let selected: Vec<GroupRecord> = groups
        .into_iter()
        .filter(|group| selectors.iter().any(|selector| selector.matches(group)))
        .collect();
    let unmatched: Vec<String> = selectors
        .iter()
        .filter(|selector| !selected.iter().any(|group| selector.matches(group)))
        .map(ToString::to_string)
        .collect();

    if unmatched.is_empty() {
        return Ok(selected);
    }
    let valid: Vec<String> = selected
        .iter()
        .map(|group| format!("Name: {}, GID: {}", group.name, group.gid.as_deref().unwrap_or("-")))
        .collect();
    Err(ValidationError::custom(
        "names",
        format!(
            "not a valid user group: [{}]; valid user groups: [{}]",
            unmatched.join(", "),
            valid.join("; ")
        ),
    )
    .into())
}

/// List user groups, draining every page before selecting by name or GID.
pub async fn list_groups<P>(
    source: &P,
    filter: &GroupListFilter,
    fetcher: &CollectionFetcher,
    cancel: &dyn CancellationToken,
) -> onefs_core::Result<Vec<GroupRecord>>
where
    P: PageSource<ListRequest, GroupRecord> + ?Sized,
{
    let groups = fetcher.fetch_all(source, &filter.to_request(), cancel).await?;
    debug!(groups = groups.len(), pages = groups.pages(), "listed user groups");
    select_groups(groups.into_items(), &filter.names)
}

/// Member listing of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberListRequest {
    pub group: String,
    pub resume: Option<String>,
}

impl MemberListRequest {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resume: None,
        }
    }
}

impl ResumableQuery for MemberListRequest {
    fn with_resume(&self, token: &str) -> Self {
        Self {
            group: self.group.clone(),
            resume: Some(token.to_string()),
        }
    }

    fn is_bounded(&self) -> bool {
        false
    }
}

/// Assemble a full record for `group`: every member page and the role listing.
pub async fn load_record<P>(
    source: &P,
    group: GroupRecord,
    fetcher: &CollectionFetcher,
    cancel: &dyn CancellationToken,
) -> onefs_core::Result<UserGroupRecord>
where
    P: PageSource<MemberListRequest, Persona> + PageSource<ListRequest, RoleRecord> + ?Sized,
{
    let members: Collection<Persona> = fetcher
        .fetch_all::<MemberListRequest, Persona, P>(source, &MemberListRequest::new(group.name.clone()), cancel)
        .await?;
    let roles: Collection<RoleRecord> = fetcher
        .fetch_all::<ListRequest, RoleRecord, P>(source, &ListRequest::new(), cancel)
        .await?;
    Ok(UserGroupRecord {
        group,
        members: members.into_items(),
        roles: roles.into_items(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use onefs_core::{ErrorKind, RelationOp};

    use crate::pure::RelationPlan;

    fn group(name: &str, gid: i64) -> GroupRecord {
        GroupRecord {
            id: format!("GROUP:{name}"),
            name: name.to_string(),
            gid: Some(format!("GID:{gid}")),
            provider: "lsa-local-provider:System".to_string(),
            kind: "group".to_string(),
            ..GroupRecord::default()
        }
    }

    fn role(name: &str, members: Vec<Persona>) -> RoleRecord {
        RoleRecord {
            id: name.to_string(),
            name: name.to_string(),
            members,
        }
    }

    fn record() -> UserGroupRecord {
        UserGroupRecord {
            group: group("ops", 1000),
            members: vec![Persona::user("alice"), Persona::user("bob")],
            roles: vec![
                role("AuditAdmin", vec![Persona::group_gid(1000)]),
                role("BackupAdmin", vec![Persona::group_gid(2000)]),
                role("SystemAdmin", vec![Persona::user("root"), Persona::group_gid(1000)]),
            ],
        }
    }

    #[test]
    fn gid_persona_is_parsed() {
        assert_eq!(parse_gid("GID:1000").unwrap(), 1000);
        assert_eq!(parse_gid("UID:1000").unwrap_err().kind(), ErrorKind::Mapping);
        assert_eq!(parse_gid("GID:abc").unwrap_err().kind(), ErrorKind::Mapping);
    }

    #[test]
    fn map_collects_users_and_roles_held_by_the_gid() {
        let model = UserGroup::map(&record(), None).unwrap();
        assert_eq!(model.gid, Some(1000));
        assert_eq!(model.users, ["alice", "bob"].into_iter().collect::<MembershipSet>());
        assert_eq!(model.roles, ["AuditAdmin", "SystemAdmin"].into_iter().collect::<MembershipSet>());
    }

    #[test]
    fn nameless_member_is_a_mapping_error() {
        let mut remote = record();
        remote.members.push(Persona::default());
        assert_eq!(UserGroup::map(&remote, None).unwrap_err().kind(), ErrorKind::Mapping);
    }

    #[test]
    fn rename_is_immutable() {
        let current = UserGroup::map(&record(), None).unwrap();
        assert_eq!(UserGroup::immutable_violation(&current, &UserGroupDesired::new("ops2")), Some("name"));
        assert_eq!(UserGroup::immutable_violation(&current, &UserGroupDesired::new("ops")), None);
    }

    #[test]
    fn gid_change_requires_force() {
        let current = UserGroup::map(&record(), None).unwrap();
        let unforced = UserGroupDesired::new("ops").with_gid(2001);
        let err = UserGroup::validate_change(&current, &unforced).unwrap_err();
        assert_eq!(err.field(), "gid");

        let forced = unforced.forced();
        assert!(UserGroup::validate_change(&current, &forced).is_ok());
        let delta = UserGroup::delta(&current, &forced).unwrap().unwrap();
        assert_eq!(delta.gid, 2001);
        assert!(delta.query.force);
    }

    #[test]
    fn unchanged_or_absent_gid_needs_no_update() {
        let current = UserGroup::map(&record(), None).unwrap();
        assert_eq!(UserGroup::delta(&current, &UserGroupDesired::new("ops")).unwrap(), None);
        assert_eq!(UserGroup::delta(&current, &UserGroupDesired::new("ops").with_gid(1000)).unwrap(), None);
    }

    #[test]
    fn gid_change_replaces_all_roles() {
        let current = UserGroup::map(&record(), None).unwrap();
        let desired = UserGroupDesired::new("ops")
            .with_gid(2001)
            .forced()
            .with_users(["alice", "bob"])
            .with_roles(["AuditAdmin"]);
        let changes = UserGroup::relations(&current, &desired);
        let roles = RelationPlan::from_change(&changes[1]);
        assert!(roles.replace_all);
        assert_eq!(roles.current_parent, "GID:1000");
        assert_eq!(roles.desired_parent, "ops");
        assert_eq!(
            roles.ops,
            vec![
                RelationOp::Remove("AuditAdmin".into()),
                RelationOp::Remove("SystemAdmin".into()),
                RelationOp::Add("AuditAdmin".into()),
            ]
        );

        let users = RelationPlan::from_change(&changes[0]);
        assert!(users.is_empty());
    }

    #[test]
    fn selectors_match_by_name_or_gid() {
        let groups = vec![group("ops", 1000), group("dev", 1001), group("qa", 1002)];
        let selected = select_groups(groups, &[GroupSelector::name("ops"), GroupSelector::gid(1002)]).unwrap();
        let names: Vec<_> = selected.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["ops", "qa"]);
    }

    #[test]
    fn unknown_selector_lists_valid_groups() {
        let groups = vec![group("ops", 1000), group("dev", 1001)];
        let err = select_groups(groups, &[GroupSelector::name("ops"), GroupSelector::name("ghost")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let message = err.to_string();
        assert!(message.contains("ghost"));
        assert!(message.contains("Name: ops, GID: GID:1000"));
    }

    #[test]
    fn filter_maps_to_query_params() {
        let filter = GroupListFilter {
            name_prefix: Some("op".into()),
            zone: Some("System".into()),
            cached: Some(false),
            ..GroupListFilter::default()
        };
        let request = filter.to_request();
        assert_eq!(request.query.get("filter").map(String::as_str), Some("op"));
        assert_eq!(request.query.get("cached").map(String::as_str), Some("false"));
        assert!(!request.query.contains_key("provider"));
    }
}
