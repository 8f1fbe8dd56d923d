//! Collection retrieval against the in-memory appliance

use assert_matches::assert_matches;
use onefs_core::{CancelSignal, Collection, ErrorKind, ListRequest, NeverCancel, OnefsError, SortDir};
use onefs_reconcile::pagination::{fetch_all, CollectionFetcher};
use onefs_reconcile::resources::snapshot_schedule::{SnapshotScheduleFilter, SnapshotScheduleRecord};
use onefs_reconcile::resources::user_group::{list_groups, GroupListFilter, GroupRecord, GroupSelector};
use onefs_testkit::{init_test_tracing, local_group, snapshot_record, Failure, MockAppliance, Op};

fn five_groups() -> MockAppliance {
    let appliance = MockAppliance::new().with_page_size(2);
    for (index, name) in ["admins", "backup", "ops", "ops-oncall", "storage"].iter().enumerate() {
        appliance.seed_group(local_group(name, 2000 + index as i64), &[]);
    }
    appliance
}

fn names(groups: &[GroupRecord]) -> Vec<&str> {
    groups.iter().map(|group| group.name.as_str()).collect()
}

#[tokio::test]
async fn drains_every_page_in_order() {
    init_test_tracing();
    let appliance = five_groups();

    let groups: Collection<GroupRecord> = fetch_all(&appliance, &ListRequest::new()).await.unwrap();

    assert_eq!(groups.pages(), 3);
    assert_eq!(names(groups.items()), vec!["admins", "backup", "ops", "ops-oncall", "storage"]);
    let pages: Vec<String> = appliance.calls_of(Op::ListPage).into_iter().map(|call| call.target).collect();
    assert_eq!(pages, vec!["page 1", "page 2", "page 3"]);
}

#[tokio::test]
async fn later_page_failure_keeps_the_prefix() {
    init_test_tracing();
    let appliance = five_groups();
    appliance.fail(Failure::on(Op::ListPage, "user_group").target("page 3"));

    let result: Result<Collection<GroupRecord>, _> = fetch_all(&appliance, &ListRequest::new()).await;
    let failure = result.unwrap_err();

    assert_eq!(names(failure.items()), vec!["admins", "backup", "ops", "ops-oncall"]);
    assert_eq!(failure.error.kind(), ErrorKind::Transport);
    assert_eq!(failure.partial.as_ref().map(Collection::pages), Some(2));
}

#[tokio::test]
async fn first_page_failure_has_nothing_to_keep() {
    let appliance = five_groups();
    appliance.fail(Failure::on(Op::ListPage, "user_group").target("page 1"));

    let result: Result<Collection<GroupRecord>, _> = fetch_all(&appliance, &ListRequest::new()).await;
    let (items, error) = result.unwrap_err().into_parts();

    assert!(items.is_empty());
    assert_matches!(error, OnefsError::Transport { .. });
}

#[tokio::test]
async fn explicit_limit_is_one_page() {
    let appliance = five_groups();

    let groups: Collection<GroupRecord> = fetch_all(&appliance, &ListRequest::new().limit(3)).await.unwrap();

    assert_eq!(groups.len(), 3);
    assert_eq!(appliance.calls_of(Op::ListPage).len(), 1);
}

#[tokio::test]
async fn page_cap_stops_a_runaway_drain() {
    let appliance = five_groups();
    let fetcher = CollectionFetcher::new().with_max_pages(2);

    let result: Result<Collection<GroupRecord>, _> =
        fetcher.fetch_all(&appliance, &ListRequest::new(), &NeverCancel).await;
    let failure = result.unwrap_err();

    assert_eq!(failure.items().len(), 4);
    assert_eq!(failure.error.kind(), ErrorKind::Transport);
    assert_eq!(appliance.calls_of(Op::ListPage).len(), 2);
}

#[tokio::test]
async fn cancellation_between_pages_returns_the_prefix() {
    let appliance = five_groups();
    let signal = CancelSignal::new();
    appliance.cancel_after(1, signal.clone());

    let result: Result<Collection<GroupRecord>, _> = CollectionFetcher::new()
        .fetch_all(&appliance, &ListRequest::new(), &signal)
        .await;
    let failure = result.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
    assert_eq!(failure.items().len(), 2);
    assert_eq!(appliance.calls_of(Op::ListPage).len(), 1);
}

#[tokio::test]
async fn group_listing_selects_after_the_drain() {
    init_test_tracing();
    let appliance = five_groups();
    let filter = GroupListFilter {
        names: vec![GroupSelector::name("ops"), GroupSelector::gid(2004)],
        ..GroupListFilter::default()
    };

    let groups = list_groups(&appliance, &filter, &CollectionFetcher::new(), &NeverCancel)
        .await
        .unwrap();

    assert_eq!(names(&groups), vec!["ops", "storage"]);
    assert_eq!(appliance.calls_of(Op::ListPage).len(), 3);
}

#[tokio::test]
async fn group_listing_honours_the_name_prefix() {
    let appliance = five_groups();
    let filter = GroupListFilter {
        name_prefix: Some("ops".to_string()),
        ..GroupListFilter::default()
    };

    let groups = list_groups(&appliance, &filter, &CollectionFetcher::new(), &NeverCancel)
        .await
        .unwrap();

    assert_eq!(names(&groups), vec!["ops", "ops-oncall"]);
}

#[tokio::test]
async fn unmatched_selector_is_a_validation_error() {
    let appliance = five_groups();
    let filter = GroupListFilter {
        names: vec![GroupSelector::name("ops"), GroupSelector::name("ghosts")],
        ..GroupListFilter::default()
    };

    let err = list_groups(&appliance, &filter, &CollectionFetcher::new(), &NeverCancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let message = err.to_string();
    assert!(message.contains("ghosts"), "{message}");
    assert!(message.contains("Name: ops, GID: GID:2002"), "{message}");
}

#[tokio::test]
async fn group_listing_fails_whole_on_a_later_page() {
    let appliance = five_groups();
    appliance.fail(Failure::on(Op::ListPage, "user_group").target("page 2"));

    let err = list_groups(&appliance, &GroupListFilter::default(), &CollectionFetcher::new(), &NeverCancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn snapshot_filter_limits_the_listing() {
    let appliance = MockAppliance::new().with_page_size(10);
    for id in 1..=4 {
        appliance.seed_snapshot(snapshot_record(id, &format!("daily-{id}")));
    }
    let filter = SnapshotScheduleFilter {
        sort: Some("name".to_string()),
        dir: Some(SortDir::Asc),
        limit: Some(2),
    };

    let schedules: Collection<SnapshotScheduleRecord> =
        fetch_all(&appliance, &ListRequest::from(&filter)).await.unwrap();

    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules.pages(), 1);
}
