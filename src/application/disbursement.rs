use super::engine::TransitionEngine;
use crate::domain::actor::{Action, Actor};
use crate::domain::payment::{
    AccountId, AllocationStatus, PaymentId, PaymentRecord, PaymentStatus, ProofRef,
};
use crate::domain::ports::{AccountDirectory, VoucherStore};
use crate::error::{DisbursementError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Records the treasury side of a payment: which account funded it and the
/// proof that it was paid.
///
/// All writes go through the transition engine's compare-and-set.
pub struct DisbursementRecorder {
    engine: Arc<TransitionEngine>,
    accounts: Arc<dyn AccountDirectory>,
    vouchers: Arc<dyn VoucherStore>,
}

impl DisbursementRecorder {
    pub fn new(
        engine: Arc<TransitionEngine>,
        accounts: Arc<dyn AccountDirectory>,
        vouchers: Arc<dyn VoucherStore>,
    ) -> Self {
        Self {
            engine,
            accounts,
            vouchers,
        }
    }

    /// Moves a payment from `pending_payment` to `pending_payment_confirmation`.
    ///
    /// Repeating the call with the same account once the transfer has landed
    /// returns the record unchanged.
    pub async fn record_transfer(
        &self,
        actor: &Actor,
        id: PaymentId,
        account: AccountId,
    ) -> Result<PaymentRecord> {
        let mut record = self.engine.load(id).await?;

        if record.status() == PaymentStatus::PendingPaymentConfirmation
            && record.funding_account() == Some(&account)
        {
            self.engine.check_actor(actor, &record, Action::Transfer)?;
            debug!(payment = %id, %account, "transfer already recorded");
            return Ok(record);
        }
        self.engine.authorize(actor, &record, Action::Transfer)?;

        let funding = self
            .accounts
            .account(&account)
            .await?
            .ok_or_else(|| DisbursementError::NotFound(format!("funding account {account}")))?;

        if record.allocation_status() == AllocationStatus::Approved {
            let consistent = self
                .engine
                .current_allocation(&record)
                .await?
                .is_some_and(|set| set.matches_account(&funding.id, &funding.currency));
            if !consistent {
                warn!(
                    payment = %id,
                    %account,
                    currency = %funding.currency,
                    "funding account matches no approved allocation line"
                );
            }
        }

        let expected = record.cas_token();
        let stamp = self.engine.stamp(actor, &record);
        record.record_transfer(account, stamp);
        self.engine
            .commit(Action::Transfer, expected, record, None)
            .await
    }

    /// Completes a payment with a voucher reference.
    pub async fn confirm_payment(
        &self,
        actor: &Actor,
        id: PaymentId,
        proof: ProofRef,
    ) -> Result<PaymentRecord> {
        if proof.0.trim().is_empty() {
            return Err(DisbursementError::Validation(
                "payment proof reference must not be empty".to_string(),
            ));
        }

        let mut record = self.engine.load(id).await?;
        self.engine.authorize(actor, &record, Action::ConfirmPayment)?;

        let expected = record.cas_token();
        let stamp = self.engine.stamp(actor, &record);
        record.confirm_payment(proof, stamp);
        self.engine
            .commit(Action::ConfirmPayment, expected, record, None)
            .await
    }

    /// Stores `voucher` and completes the payment with the returned reference.
    ///
    /// The voucher is only stored once the actor is known to be allowed to
    /// confirm this payment. If the confirmation then loses to a concurrent
    /// write, the stored voucher is discarded and the original error returned.
    pub async fn confirm_payment_with_voucher(
        &self,
        actor: &Actor,
        id: PaymentId,
        voucher: Vec<u8>,
    ) -> Result<PaymentRecord> {
        if voucher.is_empty() {
            return Err(DisbursementError::Validation(
                "payment voucher must not be empty".to_string(),
            ));
        }
        let record = self.engine.load(id).await?;
        self.engine.authorize(actor, &record, Action::ConfirmPayment)?;

        let proof = self.vouchers.put(voucher).await?;
        match self.confirm_payment(actor, id, proof.clone()).await {
            Ok(record) => Ok(record),
            Err(err) => {
                if let Err(discard_err) = self.vouchers.discard(&proof).await {
                    warn!(
                        payment = %id,
                        %proof,
                        error = %discard_err,
                        "orphaned voucher left in store"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::guard::RoleTablePolicy;
    use crate::domain::actor::Role;
    use crate::domain::allocation::ProposedLine;
    use crate::domain::money::{Cents, CurrencyCode};
    use crate::domain::payment::{EmployeeId, Period};
    use crate::domain::ports::{FundingAccount, PaymentStore};
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::{
        InMemoryAccountDirectory, InMemoryPaymentStore, InMemoryVoucherStore,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    const FINANCE: Actor = Actor {
        id: 100,
        role: Role::Finance,
    };

    struct Fixture {
        engine: Arc<TransitionEngine>,
        recorder: DisbursementRecorder,
        vouchers: Arc<InMemoryVoucherStore>,
        id: PaymentId,
    }

    /// A payment already approved by finance, ready for transfer.
    async fn approved_payment(allocation: Option<&str>) -> Fixture {
        let store = Arc::new(InMemoryPaymentStore::new());
        let record = PaymentRecord::new(
            EmployeeId(7),
            Period::new(2024, 3).unwrap(),
            Cents::new(500000),
            Utc::now(),
        );
        let id = record.id();
        store.insert_if_absent(record).await.unwrap();

        let engine = Arc::new(TransitionEngine::new(
            store,
            Arc::new(RoleTablePolicy),
            Arc::new(SystemClock),
        ));
        let employee = Actor::employee(7);
        engine.employee_confirm(&employee, id).await.unwrap();
        if let Some(currency) = allocation {
            let line = ProposedLine::new(CurrencyCode::new(currency).unwrap(), Cents::new(1000));
            engine.request_allocation(&employee, id, vec![line]).await.unwrap();
            engine.approve_allocation(&FINANCE, id, 1).await.unwrap();
        }
        engine.finance_approve(&FINANCE, id).await.unwrap();

        let accounts = InMemoryAccountDirectory::new();
        accounts.insert(FundingAccount {
            id: AccountId("ACC-CNY".to_string()),
            currency: CurrencyCode::new("CNY").unwrap(),
        });
        let vouchers = Arc::new(InMemoryVoucherStore::new());
        let recorder =
            DisbursementRecorder::new(engine.clone(), Arc::new(accounts), vouchers.clone());
        Fixture {
            engine,
            recorder,
            vouchers,
            id,
        }
    }

    fn cny_account() -> AccountId {
        AccountId("ACC-CNY".to_string())
    }

    #[tokio::test]
    async fn test_transfer_sets_account_and_advances() {
        let f = approved_payment(None).await;
        let record = f
            .recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();
        assert_eq!(record.status(), PaymentStatus::PendingPaymentConfirmation);
        assert_eq!(record.funding_account(), Some(&cny_account()));
        assert_eq!(record.transferred().unwrap().actor, 100);
    }

    #[tokio::test]
    async fn test_transfer_is_idempotent_for_same_account() {
        let f = approved_payment(None).await;
        let first = f
            .recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();
        let second = f
            .recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();
        assert_eq!(first, second);

        let other = f
            .recorder
            .record_transfer(&FINANCE, f.id, AccountId("ACC-USD".to_string()))
            .await;
        assert!(matches!(other, Err(DisbursementError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_transfer_unknown_account() {
        let f = approved_payment(None).await;
        let result = f
            .recorder
            .record_transfer(&FINANCE, f.id, AccountId("NOPE".to_string()))
            .await;
        assert!(matches!(result, Err(DisbursementError::NotFound(_))));
        let record = f.engine.load(f.id).await.unwrap();
        assert_eq!(record.status(), PaymentStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_transfer_currency_mismatch_is_soft() {
        let f = approved_payment(Some("USDT")).await;
        let record = f
            .recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();
        assert_eq!(record.status(), PaymentStatus::PendingPaymentConfirmation);
    }

    #[tokio::test]
    async fn test_employee_cannot_transfer() {
        let f = approved_payment(None).await;
        let result = f
            .recorder
            .record_transfer(&Actor::employee(7), f.id, cny_account())
            .await;
        assert!(matches!(result, Err(DisbursementError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_confirm_payment_requires_proof() {
        let f = approved_payment(None).await;
        f.recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();

        let empty = f
            .recorder
            .confirm_payment(&FINANCE, f.id, ProofRef("  ".to_string()))
            .await;
        assert!(matches!(empty, Err(DisbursementError::Validation(_))));

        let record = f
            .recorder
            .confirm_payment(&FINANCE, f.id, ProofRef("v-123".to_string()))
            .await
            .unwrap();
        assert_eq!(record.status(), PaymentStatus::Completed);
        assert_eq!(record.payment_proof(), Some(&ProofRef("v-123".to_string())));
    }

    #[tokio::test]
    async fn test_confirm_before_transfer_is_invalid() {
        let f = approved_payment(None).await;
        let result = f
            .recorder
            .confirm_payment(&FINANCE, f.id, ProofRef("v-1".to_string()))
            .await;
        assert!(matches!(result, Err(DisbursementError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_confirm_with_voucher_stores_it() {
        let f = approved_payment(None).await;
        f.recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();

        let record = f
            .recorder
            .confirm_payment_with_voucher(&FINANCE, f.id, b"receipt".to_vec())
            .await
            .unwrap();
        let proof = record.payment_proof().unwrap();
        assert_eq!(f.vouchers.get(proof).unwrap(), b"receipt".to_vec());
    }

    /// Completes the payment itself while the voucher is being stored, the
    /// way a second finance user confirming at the same time would.
    struct RacingVoucherStore {
        inner: InMemoryVoucherStore,
        engine: Arc<TransitionEngine>,
        id: PaymentId,
        stored: Mutex<Option<ProofRef>>,
    }

    #[async_trait]
    impl VoucherStore for RacingVoucherStore {
        async fn put(&self, voucher: Vec<u8>) -> Result<ProofRef> {
            let proof = self.inner.put(voucher).await?;
            *self.stored.lock().unwrap() = Some(proof.clone());

            let mut record = self.engine.load(self.id).await?;
            let expected = record.cas_token();
            let stamp = self.engine.stamp(&FINANCE, &record);
            record.confirm_payment(ProofRef("v-other".to_string()), stamp);
            self.engine
                .commit(Action::ConfirmPayment, expected, record, None)
                .await?;
            Ok(proof)
        }

        async fn discard(&self, proof: &ProofRef) -> Result<()> {
            self.inner.discard(proof).await
        }
    }

    #[tokio::test]
    async fn test_lost_voucher_confirmation_discards_voucher() {
        let f = approved_payment(None).await;
        f.recorder
            .record_transfer(&FINANCE, f.id, cny_account())
            .await
            .unwrap();

        let vouchers = Arc::new(RacingVoucherStore {
            inner: InMemoryVoucherStore::new(),
            engine: f.engine.clone(),
            id: f.id,
            stored: Mutex::new(None),
        });
        let recorder = DisbursementRecorder::new(
            f.engine.clone(),
            Arc::new(InMemoryAccountDirectory::new()),
            vouchers.clone(),
        );

        let result = recorder
            .confirm_payment_with_voucher(&FINANCE, f.id, b"receipt".to_vec())
            .await;
        assert!(matches!(
            result,
            Err(DisbursementError::InvalidTransition { .. } | DisbursementError::StaleState)
        ));

        let orphan = vouchers.stored.lock().unwrap().clone().unwrap();
        assert_eq!(vouchers.inner.get(&orphan), None);

        let record = f.engine.load(f.id).await.unwrap();
        assert_eq!(record.payment_proof(), Some(&ProofRef("v-other".to_string())));
    }
}
