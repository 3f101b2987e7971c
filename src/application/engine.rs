use super::guard::{Guard, guard_for};
use super::ledger::AllocationLedger;
use crate::domain::actor::{Action, Actor};
use crate::domain::allocation::{AllocationSet, ProposedLine};
use crate::domain::payment::{AllocationStatus, AuditStamp, CasToken, PaymentId, PaymentRecord};
use crate::domain::ports::{AccessPolicy, Clock, PaymentStoreRef, RecordUpdate};
use crate::error::{DisbursementError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Applies every status and allocation change to a payment.
///
/// Each operation reads the record once, checks the actor and the guard
/// table, builds the new state on a copy and commits it with a single
/// compare-and-set against the token it read. A lost race surfaces as
/// `StaleState`; the engine never retries on its own.
pub struct TransitionEngine {
    store: PaymentStoreRef,
    policy: Arc<dyn AccessPolicy>,
    clock: Arc<dyn Clock>,
    ledger: AllocationLedger,
}

impl TransitionEngine {
    pub fn new(
        store: PaymentStoreRef,
        policy: Arc<dyn AccessPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
            ledger: AllocationLedger,
        }
    }

    pub fn store(&self) -> &PaymentStoreRef {
        &self.store
    }

    pub async fn load(&self, id: PaymentId) -> Result<PaymentRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DisbursementError::NotFound(format!("payment {id}")))
    }

    /// The allocation set the record currently points at, if any.
    pub async fn current_allocation(
        &self,
        record: &PaymentRecord,
    ) -> Result<Option<AllocationSet>> {
        match record.allocation_generation() {
            0 => Ok(None),
            generation => self.store.allocation(record.id(), generation).await,
        }
    }

    pub async fn employee_confirm(&self, actor: &Actor, id: PaymentId) -> Result<PaymentRecord> {
        let mut record = self.load(id).await?;
        self.authorize(actor, &record, Action::Confirm)?;

        let expected = record.cas_token();
        let stamp = self.stamp(actor, &record);
        record.confirm_by_employee(stamp);
        self.commit(Action::Confirm, expected, record, None).await
    }

    pub async fn finance_approve(&self, actor: &Actor, id: PaymentId) -> Result<PaymentRecord> {
        let mut record = self.load(id).await?;
        self.authorize(actor, &record, Action::Approve)?;

        if record.allocation_status() == AllocationStatus::Requested {
            return Err(DisbursementError::InvalidTransition {
                action: Action::Approve,
                status: record.status(),
                reason: "allocation request is still awaiting approval",
            });
        }

        let expected = record.cas_token();
        let stamp = self.stamp(actor, &record);
        record.approve_by_finance(stamp);
        self.commit(Action::Approve, expected, record, None).await
    }

    /// Replaces the current allocation with `lines` as a new generation.
    pub async fn request_allocation(
        &self,
        actor: &Actor,
        id: PaymentId,
        lines: Vec<ProposedLine>,
    ) -> Result<PaymentRecord> {
        let mut record = self.load(id).await?;
        self.authorize(actor, &record, Action::RequestAllocation)
            .map_err(|err| match err {
                DisbursementError::InvalidTransition { status, .. } => {
                    DisbursementError::InvalidAllocation(format!(
                        "payment in status {status} does not accept allocation requests"
                    ))
                }
                other => other,
            })?;

        let expected = record.cas_token();
        let stamp = self.stamp(actor, &record);
        let set = self
            .ledger
            .propose(&record, expected.allocation_generation + 1, lines, stamp)?;
        record.open_allocation();
        self.commit(Action::RequestAllocation, expected, record, Some(set))
            .await
    }

    /// Approves every line of `generation`, which must be the current request.
    pub async fn approve_allocation(
        &self,
        actor: &Actor,
        id: PaymentId,
        generation: u64,
    ) -> Result<PaymentRecord> {
        self.decide_allocation(actor, id, generation, true).await
    }

    pub async fn reject_allocation(
        &self,
        actor: &Actor,
        id: PaymentId,
        generation: u64,
    ) -> Result<PaymentRecord> {
        self.decide_allocation(actor, id, generation, false).await
    }

    pub async fn cancel(&self, actor: &Actor, id: PaymentId) -> Result<PaymentRecord> {
        let mut record = self.load(id).await?;
        self.authorize(actor, &record, Action::Cancel)?;

        let expected = record.cas_token();
        let stamp = self.stamp(actor, &record);
        record.cancel(stamp);
        self.commit(Action::Cancel, expected, record, None).await
    }

    async fn decide_allocation(
        &self,
        actor: &Actor,
        id: PaymentId,
        generation: u64,
        approve: bool,
    ) -> Result<PaymentRecord> {
        let action = if approve {
            Action::ApproveAllocation
        } else {
            Action::RejectAllocation
        };
        let mut record = self.load(id).await?;
        self.authorize(actor, &record, action)?;

        if record.allocation_status() != AllocationStatus::Requested {
            return Err(DisbursementError::NothingToApprove);
        }
        if record.allocation_generation() != generation {
            warn!(
                payment = %id,
                requested = generation,
                current = record.allocation_generation(),
                "allocation decision targets a superseded request"
            );
            return Err(DisbursementError::StaleState);
        }

        let set = self.store.allocation(id, generation).await?.ok_or_else(|| {
            DisbursementError::NotFound(format!("allocation {generation} of payment {id}"))
        })?;

        let expected = record.cas_token();
        let stamp = self.stamp(actor, &record);
        let set = self.ledger.decide(set, approve, actor, stamp)?;
        record.settle_allocation(approve);
        self.commit(action, expected, record, Some(set)).await
    }

    /// Identity provider plus guard table role and ownership.
    pub(crate) fn check_actor(
        &self,
        actor: &Actor,
        record: &PaymentRecord,
        action: Action,
    ) -> Result<&'static Guard> {
        let guard = guard_for(action);
        if !self.policy.allows(actor, action) || !guard.admits(actor, record) {
            warn!(
                actor = actor.id,
                role = ?actor.role,
                %action,
                payment = %record.id(),
                "action forbidden"
            );
            return Err(DisbursementError::Forbidden {
                actor: actor.id,
                action,
            });
        }
        Ok(guard)
    }

    pub(crate) fn authorize(
        &self,
        actor: &Actor,
        record: &PaymentRecord,
        action: Action,
    ) -> Result<&'static Guard> {
        let guard = self.check_actor(actor, record, action)?;
        if !guard.accepts(record.status()) {
            return Err(DisbursementError::InvalidTransition {
                action,
                status: record.status(),
                reason: "action is not defined from this status",
            });
        }
        Ok(guard)
    }

    /// Never earlier than anything already recorded on the payment.
    pub(crate) fn stamp(&self, actor: &Actor, record: &PaymentRecord) -> AuditStamp {
        AuditStamp::new(actor, self.clock.now().max(record.last_activity()))
    }

    pub(crate) async fn commit(
        &self,
        action: Action,
        expected: CasToken,
        record: PaymentRecord,
        allocation: Option<AllocationSet>,
    ) -> Result<PaymentRecord> {
        let update = RecordUpdate {
            record: record.clone(),
            allocation,
        };
        if let Err(err) = self.store.compare_and_swap(expected, update).await {
            if matches!(err, DisbursementError::StaleState) {
                warn!(payment = %record.id(), %action, "lost compare-and-set race");
            }
            return Err(err);
        }

        info!(
            payment = %record.id(),
            employee = %record.employee(),
            period = %record.period(),
            %action,
            status = %record.status(),
            allocation = %record.allocation_status(),
            "transition committed"
        );
        Ok(record)
    }
}
