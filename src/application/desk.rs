use super::disbursement::DisbursementRecorder;
use super::engine::TransitionEngine;
use super::generation::{GenerationJob, GenerationReport};
use super::guard::RoleTablePolicy;
use crate::domain::actor::Actor;
use crate::domain::allocation::ProposedLine;
use crate::domain::payment::{AccountId, EmployeeId, PaymentRecord, Period, ProofRef};
use crate::domain::ports::{
    AccessPolicy, AccountDirectory, Clock, PaymentStoreRef, PayrollSource, VoucherStore,
};
use crate::error::{DisbursementError, Result};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::in_memory::InMemoryVoucherStore;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Confirm,
    Approve,
    Transfer(AccountId),
    ConfirmPayment(ProofRef),
    RequestAllocation(Vec<ProposedLine>),
    ApproveAllocation(u64),
    RejectAllocation(u64),
    Cancel,
}

/// One lifecycle request, addressed by employee and period.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub actor: Actor,
    pub employee: EmployeeId,
    pub period: Period,
    pub command: Command,
}

/// Entry point that ties the lifecycle components to one store.
pub struct PayrollDesk {
    engine: Arc<TransitionEngine>,
    recorder: DisbursementRecorder,
    generator: GenerationJob,
}

impl PayrollDesk {
    pub fn new(
        store: PaymentStoreRef,
        policy: Arc<dyn AccessPolicy>,
        clock: Arc<dyn Clock>,
        accounts: Arc<dyn AccountDirectory>,
        vouchers: Arc<dyn VoucherStore>,
    ) -> Self {
        let engine = Arc::new(TransitionEngine::new(store.clone(), policy, clock.clone()));
        Self {
            recorder: DisbursementRecorder::new(engine.clone(), accounts, vouchers),
            generator: GenerationJob::new(store, clock),
            engine,
        }
    }

    /// Guard-table roles, wall-clock time and in-memory vouchers.
    pub fn with_defaults(store: PaymentStoreRef, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self::new(
            store,
            Arc::new(RoleTablePolicy),
            Arc::new(SystemClock),
            accounts,
            Arc::new(InMemoryVoucherStore::new()),
        )
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    pub fn recorder(&self) -> &DisbursementRecorder {
        &self.recorder
    }

    pub async fn generate(
        &self,
        period: Period,
        source: &dyn PayrollSource,
    ) -> Result<GenerationReport> {
        self.generator.generate(period, source).await
    }

    pub async fn execute(&self, instruction: Instruction) -> Result<PaymentRecord> {
        let Instruction {
            actor,
            employee,
            period,
            command,
        } = instruction;
        let id = self
            .engine
            .store()
            .find_by_period(employee, period)
            .await?
            .ok_or_else(|| {
                DisbursementError::NotFound(format!("payment for employee {employee} in {period}"))
            })?
            .id();

        match command {
            Command::Confirm => self.engine.employee_confirm(&actor, id).await,
            Command::Approve => self.engine.finance_approve(&actor, id).await,
            Command::Transfer(account) => self.recorder.record_transfer(&actor, id, account).await,
            Command::ConfirmPayment(proof) => {
                self.recorder.confirm_payment(&actor, id, proof).await
            }
            Command::RequestAllocation(lines) => {
                self.engine.request_allocation(&actor, id, lines).await
            }
            Command::ApproveAllocation(generation) => {
                self.engine.approve_allocation(&actor, id, generation).await
            }
            Command::RejectAllocation(generation) => {
                self.engine.reject_allocation(&actor, id, generation).await
            }
            Command::Cancel => self.engine.cancel(&actor, id).await,
        }
    }

    /// Every record, ordered by period and employee.
    pub async fn records(&self) -> Result<Vec<PaymentRecord>> {
        let mut records = self.engine.store().get_all().await?;
        records.sort_by_key(|r| (r.period(), r.employee()));
        Ok(records)
    }
}
