//! Executes relation plans against the appliance.
//!
//! Every operation of every plan is attempted even when an earlier one fails;
//! failures are collected into one [`PartialOperationError`] that names each
//! failed operation with its cause. Cancellation is the exception: it stops
//! the run immediately.

use onefs_core::{
    guarded, CancellationToken, ErrorKind, OnefsError, OperationFailure, PartialOperationError, Relation,
    RelationEffects, RelationOp,
};
use tracing::{debug, warn};

use crate::config::RelationOrder;
use crate::pure::RelationPlan;

/// What a relation run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationReport {
    pub succeeded: Vec<(Relation, RelationOp)>,
    pub failures: Vec<OperationFailure>,
}

impl RelationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The applied operations, or the aggregate of the failures.
    pub fn into_result(self) -> Result<Vec<(Relation, RelationOp)>, PartialOperationError> {
        if self.failures.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(PartialOperationError {
                succeeded: self.succeeded,
                failures: self.failures,
            })
        }
    }
}

/// Issues the operations of relation plans.
pub struct RelationExecutor<'a, R: RelationEffects + ?Sized> {
    effects: &'a R,
    cancel: &'a dyn CancellationToken,
    order: RelationOrder,
}

impl<'a, R: RelationEffects + ?Sized> RelationExecutor<'a, R> {
    pub fn new(effects: &'a R, cancel: &'a dyn CancellationToken, order: RelationOrder) -> Self {
        Self { effects, cancel, order }
    }

    /// Run every plan. Returns `Err` only when cancelled; operation failures
    /// are in the report.
    pub async fn execute(&self, plans: &[RelationPlan]) -> Result<RelationReport, OnefsError> {
        let mut report = RelationReport::default();
        for plan in plans.iter().filter(|plan| !plan.is_empty()) {
            debug!(
                relation = %plan.relation,
                ops = plan.ops.len(),
                replace_all = plan.replace_all,
                "applying relation plan"
            );
            for op in self.ordered(plan) {
                self.apply(plan, op, &mut report).await?;
            }
        }
        Ok(report)
    }

    fn ordered<'p>(&self, plan: &'p RelationPlan) -> Vec<&'p RelationOp> {
        let removes_first = plan.replace_all || self.order == RelationOrder::RemovesFirst;
        if removes_first {
            plan.removals().chain(plan.additions()).collect()
        } else {
            plan.additions().chain(plan.removals()).collect()
        }
    }

    async fn apply(&self, plan: &RelationPlan, op: &RelationOp, report: &mut RelationReport) -> Result<(), OnefsError> {
        let parent = plan.parent_for(op);
        let operation = format!("{op} {} of {parent}", plan.relation);
        let call = async {
            match op {
                RelationOp::Add(child) => self.effects.add_relation(plan.relation, parent, child).await,
                RelationOp::Remove(child) => self.effects.remove_relation(plan.relation, parent, child).await,
            }
        };

        match guarded(self.cancel, &operation, call).await {
            Ok(()) => {
                report.succeeded.push((plan.relation, op.clone()));
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::Cancelled => Err(error),
            Err(error) => {
                warn!(relation = %plan.relation, parent, op = %op, error = %error, "relation operation failed");
                report
                    .failures
                    .push(OperationFailure::new(plan.relation, op.clone(), error));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use onefs_core::{MembershipSet, NeverCancel, RelationChange};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: Vec<&'static str>,
    }

    impl Recorder {
        fn failing(fail: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn record(&self, call: String, child: &str) -> onefs_core::Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.fail.iter().any(|failing| *failing == child) {
                Err(OnefsError::transport("relation", format!("{child} rejected")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RelationEffects for Recorder {
        async fn add_relation(&self, _relation: Relation, parent: &str, child: &str) -> onefs_core::Result<()> {
            self.record(format!("add {parent}/{child}"), child)
        }

        async fn remove_relation(&self, _relation: Relation, parent: &str, child: &str) -> onefs_core::Result<()> {
            self.record(format!("remove {parent}/{child}"), child)
        }
    }

    fn set(ids: &[&str]) -> MembershipSet {
        ids.iter().copied().collect()
    }

    fn plan(current: &[&str], desired: &[&str]) -> RelationPlan {
        RelationPlan::from_change(&RelationChange::stable(
            Relation::GroupMembers,
            "ops",
            set(current),
            set(desired),
        ))
    }

    #[tokio::test]
    async fn removes_run_before_adds_by_default() {
        let effects = Recorder::default();
        let executor = RelationExecutor::new(&effects, &NeverCancel, RelationOrder::RemovesFirst);
        let report = executor.execute(&[plan(&["a"], &["b"])]).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(*effects.calls.lock().unwrap(), vec!["remove ops/a", "add ops/b"]);
    }

    #[tokio::test]
    async fn adds_first_is_honored_for_stable_parents() {
        let effects = Recorder::default();
        let executor = RelationExecutor::new(&effects, &NeverCancel, RelationOrder::AddsFirst);
        executor.execute(&[plan(&["a"], &["b"])]).await.unwrap();
        assert_eq!(*effects.calls.lock().unwrap(), vec!["add ops/b", "remove ops/a"]);
    }

    #[tokio::test]
    async fn key_change_removes_first_against_old_parent() {
        let effects = Recorder::default();
        let executor = RelationExecutor::new(&effects, &NeverCancel, RelationOrder::AddsFirst);
        let change = RelationChange {
            relation: Relation::RoleAssignments,
            current_parent: "GID:1000".into(),
            desired_parent: "ops".into(),
            current: set(&["Audit"]),
            desired: set(&["Audit"]),
            key_changed: true,
        };
        executor.execute(&[RelationPlan::from_change(&change)]).await.unwrap();
        assert_eq!(*effects.calls.lock().unwrap(), vec!["remove GID:1000/Audit", "add ops/Audit"]);
    }

    #[tokio::test]
    async fn failures_are_aggregated_and_the_rest_still_runs() {
        let effects = Recorder::failing(vec!["u1", "u3"]);
        let executor = RelationExecutor::new(&effects, &NeverCancel, RelationOrder::RemovesFirst);
        let report = executor.execute(&[plan(&[], &["u1", "u2", "u3"])]).await.unwrap();
        assert_eq!(effects.calls.lock().unwrap().len(), 3);

        let error = report.into_result().unwrap_err();
        assert_eq!(error.failed_identities(), vec!["u1", "u3"]);
        assert_eq!(error.succeeded, vec![(Relation::GroupMembers, RelationOp::Add("u2".into()))]);
    }

    #[tokio::test]
    async fn cancellation_stops_the_run() {
        let effects = Recorder::default();
        let signal = onefs_core::CancelSignal::new();
        signal.cancel();
        let executor = RelationExecutor::new(&effects, &signal, RelationOrder::RemovesFirst);
        let error = executor.execute(&[plan(&[], &["a", "b"])]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert!(effects.calls.lock().unwrap().is_empty());
    }
}
