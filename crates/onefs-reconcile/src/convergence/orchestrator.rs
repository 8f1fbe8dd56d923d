//! Create-verify-compensate convergence for one resource.

use std::marker::PhantomData;
use std::sync::Arc;

use onefs_core::{
    guarded, CancellationToken, ErrorKind, NeverCancel, OnefsError, Relation, RelationEffects, RelationOp,
    RemoteId, ResourceEffects, ResourceSpec,
};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::{ConvergencePhase, PhaseTracker};
use crate::config::ReconcileConfig;
use crate::pure::RelationPlan;
use crate::relations::RelationExecutor;

/// Outcome of one convergence run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvergenceResult<M> {
    /// The resource exists and its verified state is `M`
    Success(M),
    /// The run failed. `compensated` records whether a rollback delete was
    /// attempted, not whether it succeeded.
    Failed {
        errors: Vec<OnefsError>,
        compensated: bool,
    },
}

impl<M> ConvergenceResult<M> {
    fn failed(error: OnefsError) -> Self {
        Self::Failed {
            errors: vec![error],
            compensated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn model(&self) -> Option<&M> {
        match self {
            Self::Success(model) => Some(model),
            Self::Failed { .. } => None,
        }
    }

    pub fn errors(&self) -> &[OnefsError] {
        match self {
            Self::Success(_) => &[],
            Self::Failed { errors, .. } => errors,
        }
    }

    /// The verified model, or the most informative error: a compensation
    /// failure when one is present, otherwise the original failure.
    pub fn into_result(self) -> Result<M, OnefsError> {
        match self {
            Self::Success(model) => Ok(model),
            Self::Failed { mut errors, .. } => match errors.pop() {
                Some(last) => Err(last),
                None => Err(OnefsError::mapping("convergence", "failed without an error")),
            },
        }
    }
}

/// A convergence result with the phases the run passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport<M> {
    pub run_id: Uuid,
    pub result: ConvergenceResult<M>,
    pub phases: Vec<ConvergencePhase>,
}

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<M> {
    pub model: M,
    /// Whether a scalar update call was issued
    pub updated: bool,
    pub relations: Vec<(Relation, RelationOp)>,
}

/// Drives resources of kind `S` to their declared state through `E`.
pub struct Convergence<S: ResourceSpec, E: ?Sized> {
    effects: Arc<E>,
    config: ReconcileConfig,
    cancel: Arc<dyn CancellationToken>,
    _spec: PhantomData<fn() -> S>,
}

impl<S: ResourceSpec, E: ?Sized> Clone for Convergence<S, E> {
    fn clone(&self) -> Self {
        Self {
            effects: Arc::clone(&self.effects),
            config: self.config.clone(),
            cancel: Arc::clone(&self.cancel),
            _spec: PhantomData,
        }
    }
}

impl<S, E> Convergence<S, E>
where
    S: ResourceSpec,
    E: ResourceEffects<S> + RelationEffects + ?Sized,
{
    pub fn new(effects: Arc<E>) -> Self {
        Self {
            effects,
            config: ReconcileConfig::default(),
            cancel: Arc::new(NeverCancel),
            _spec: PhantomData,
        }
    }

    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: Arc<dyn CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Create (or adopt) the resource described by `desired` and verify it.
    pub async fn reconcile(&self, desired: &S::Desired) -> ConvergenceResult<S::Model> {
        self.reconcile_traced(desired).await.result
    }

    /// [`Convergence::reconcile`], also returning the run id and phase history.
    pub async fn reconcile_traced(&self, desired: &S::Desired) -> ConvergenceReport<S::Model> {
        let run_id = Uuid::new_v4();
        let span = info_span!("converge", kind = S::KIND, run = %run_id);
        async move {
            let mut phases = PhaseTracker::new();
            let result = self.run(desired, &mut phases).await;
            match &result {
                ConvergenceResult::Success(_) => info!("resource converged"),
                ConvergenceResult::Failed { errors, compensated } => {
                    info!(errors = errors.len(), compensated, "convergence failed")
                }
            }
            ConvergenceReport {
                run_id,
                result,
                phases: phases.into_history(),
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, desired: &S::Desired, phases: &mut PhaseTracker) -> ConvergenceResult<S::Model> {
        if let Err(err) = S::validate(desired) {
            debug!(error = %err, "pre-validation failed");
            phases.advance(ConvergencePhase::Failed);
            return ConvergenceResult::failed(err.into());
        }

        phases.advance(ConvergencePhase::Creating);
        let adopted = S::adopt_target(desired);
        let created = match &adopted {
            Some(id) => self.adopt(id, desired).await.map(|()| id.clone()),
            None => guarded(self.cancel.as_ref(), &format!("create {}", S::KIND), self.effects.create(desired))
                .await
                .map(|created| created.id),
        };
        let id = match created {
            Ok(id) => id,
            Err(err) => {
                if err.is_preflight() {
                    debug!(error = %err, "create rejected before any remote call");
                } else {
                    warn!(error = %err, "create failed");
                }
                phases.advance(ConvergencePhase::Failed);
                return ConvergenceResult::failed(err);
            }
        };

        if adopted.is_none() {
            if let Err(err) = self.assign_initial_relations(desired).await {
                let result = self.compensate(&id, err, false, phases).await;
                phases.advance(ConvergencePhase::Failed);
                return result;
            }
        }

        phases.advance(ConvergencePhase::Verifying);
        let verified = match self.read(&id).await {
            Ok(remote) => S::map(&remote, Some(desired)),
            Err(err) => Err(err),
        };
        let original = match verified {
            Ok(model) => {
                phases.advance(ConvergencePhase::Converged);
                return ConvergenceResult::Success(model);
            }
            Err(err) => err,
        };

        let result = self.compensate(&id, original, adopted.is_some(), phases).await;
        phases.advance(ConvergencePhase::Failed);
        result
    }

    async fn assign_initial_relations(&self, desired: &S::Desired) -> onefs_core::Result<()> {
        let plans: Vec<RelationPlan> = S::initial_relations(desired)
            .iter()
            .map(RelationPlan::from_change)
            .filter(|plan| !plan.is_empty())
            .collect();
        if plans.is_empty() {
            return Ok(());
        }
        let executor = RelationExecutor::new(self.effects.as_ref(), self.cancel.as_ref(), self.config.relation_order);
        executor.execute(&plans).await?.into_result()?;
        Ok(())
    }

    async fn adopt(&self, id: &RemoteId, desired: &S::Desired) -> onefs_core::Result<()> {
        debug!(id = %id, "adopting existing singleton");
        let delta = S::adopt_delta(desired)?;
        guarded(
            self.cancel.as_ref(),
            &format!("adopt {} {id}", S::KIND),
            self.effects.update(id, &delta),
        )
        .await
        .map(|_| ())
    }

    /// Delete a created resource after a failure. Enters `Compensating` only
    /// when the delete is issued.
    async fn compensate(
        &self,
        id: &RemoteId,
        original: OnefsError,
        adopted: bool,
        phases: &mut PhaseTracker,
    ) -> ConvergenceResult<S::Model> {
        if adopted {
            debug!(id = %id, "adopted singleton is not deleted");
            return ConvergenceResult::failed(original);
        }
        if original.kind() == ErrorKind::Cancelled {
            warn!(id = %id, "cancelled after create; created resource left in place");
            return ConvergenceResult::failed(original);
        }
        if !self.config.compensate_failed_creates {
            warn!(id = %id, error = %original, "compensation disabled; created resource left in place");
            return ConvergenceResult::failed(original);
        }

        warn!(id = %id, error = %original, "deleting created resource");
        phases.advance(ConvergencePhase::Compensating);
        let rollback = guarded(
            self.cancel.as_ref(),
            &format!("delete {} {id}", S::KIND),
            self.effects.delete(id),
        )
        .await;
        match rollback {
            Ok(()) => ConvergenceResult::Failed {
                errors: vec![original],
                compensated: true,
            },
            Err(rollback) => {
                error!(id = %id, error = %rollback, "compensating delete failed");
                ConvergenceResult::Failed {
                    errors: vec![
                        original.clone(),
                        OnefsError::compensation(id.as_str(), original, rollback),
                    ],
                    compensated: true,
                }
            }
        }
    }

    async fn read(&self, id: &RemoteId) -> onefs_core::Result<S::Remote> {
        guarded(
            self.cancel.as_ref(),
            &format!("read {} {id}", S::KIND),
            self.effects.read(id),
        )
        .await
    }

    /// Read the resource with identity `id` and map it to the local model.
    pub async fn refresh(&self, id: &RemoteId, hint: Option<&S::Desired>) -> onefs_core::Result<S::Model> {
        let remote = self.read(id).await?;
        S::map(&remote, hint)
    }

    /// Delete the resource. Adopted singletons are only forgotten.
    pub async fn destroy(&self, model: &S::Model) -> onefs_core::Result<()> {
        let id = S::remote_id(model);
        if S::retained_on_destroy(model) {
            info!(kind = S::KIND, id = %id, "resource retained on destroy");
            return Ok(());
        }
        guarded(
            self.cancel.as_ref(),
            &format!("delete {} {id}", S::KIND),
            self.effects.delete(&id),
        )
        .await?;
        info!(kind = S::KIND, id = %id, "resource deleted");
        Ok(())
    }

    /// Move an existing resource from `current` to `desired`.
    ///
    /// Immutable-field and validation failures are raised before any remote
    /// call. Relation failures are aggregated after every relation operation
    /// has been attempted.
    pub async fn update(&self, current: &S::Model, desired: &S::Desired) -> onefs_core::Result<UpdateOutcome<S::Model>> {
        let id = S::remote_id(current);
        let span = info_span!("update", kind = S::KIND, id = %id, run = %Uuid::new_v4());
        self.update_inner(&id, current, desired).instrument(span).await
    }

    async fn update_inner(
        &self,
        id: &RemoteId,
        current: &S::Model,
        desired: &S::Desired,
    ) -> onefs_core::Result<UpdateOutcome<S::Model>> {
        if let Some(field) = S::immutable_violation(current, desired) {
            return Err(OnefsError::immutable_field(S::KIND, field));
        }
        S::validate(desired)?;
        S::validate_change(current, desired)?;
        let delta = S::delta(current, desired)?;
        let plans: Vec<RelationPlan> = S::relations(current, desired)
            .iter()
            .map(RelationPlan::from_change)
            .collect();

        let mut echo = None;
        let updated = delta.is_some();
        if let Some(delta) = &delta {
            echo = guarded(
                self.cancel.as_ref(),
                &format!("update {} {id}", S::KIND),
                self.effects.update(id, delta),
            )
            .await?;
            debug!("scalar update applied");
        }

        let executor = RelationExecutor::new(self.effects.as_ref(), self.cancel.as_ref(), self.config.relation_order);
        let relations = executor.execute(&plans).await?.into_result()?;

        let model = match echo {
            Some(remote) if !self.config.verify_after_update && plans.iter().all(RelationPlan::is_empty) => {
                S::map(&remote, Some(desired))?
            }
            _ => self.refresh(&S::remote_id_after(current, desired), Some(desired)).await?,
        };
        info!(updated, relation_ops = relations.len(), "resource updated");
        Ok(UpdateOutcome {
            model,
            updated,
            relations,
        })
    }
}
