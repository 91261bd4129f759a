//! Workflows that talk to the back-office: loading balances, settling an
//! allocation, and settling reservation price changes.

use crate::adjustment::{route, Adjustment, AdjustmentRequest, PriceChange, PricePolicy, SettlementPath};
use crate::allocation::session::AllocationSession;
use crate::api::{Backend, FetchError};
use crate::error::{Result, ValidationError};
use crate::input::into_balances;
use crate::ledger::snapshot::Snapshot;
use crate::ledger::Purpose;
use crate::money::{is_zero_money, to_money, Amount};
use crate::settlement::compose::compose;
use crate::settlement::{SettlementReceipt, SettlementTarget};

use rust_decimal::Decimal;
use std::sync::Arc;

/// What a price change ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentOutcome {
    pub adjustment: Adjustment,
    pub path: SettlementPath,

    /// The ledger's answer to the refund, charge or payment, if there was one.
    pub receipt: Option<SettlementReceipt>,
}

pub struct PaymentDesk<B> {
    backend: B,
    policy: PricePolicy,
}

impl<B: Backend> PaymentDesk<B> {
    pub fn new(backend: B, policy: PricePolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the agent's balances and keep those that can be spent for
    /// `purpose`.
    pub async fn load_snapshot(
        &self,
        owner_id: &str,
        purpose: Purpose,
    ) -> std::result::Result<Snapshot, FetchError> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(FetchError::MissingOwner);
        }

        let records = self.backend.fetch_balances(owner_id).await?;
        let fetched = records.len();
        let snapshot = Snapshot::new(owner_id, purpose, into_balances(records, owner_id));
        if snapshot.is_empty() {
            tracing::warn!(owner_id, ?purpose, "no usable balances");
        }

        tracing::info!(
            owner_id,
            ?purpose,
            fetched,
            usable = snapshot.balances().len(),
            capacity = %snapshot.total_capacity(),
            "loaded balances"
        );
        Ok(snapshot)
    }

    /// Settle a session.
    ///
    /// The session is only borrowed: when the ledger refuses the settlement,
    /// the caller still has the selection and can submit it again.
    pub async fn submit(
        &self,
        session: &AllocationSession,
        target: SettlementTarget,
    ) -> Result<SettlementReceipt> {
        let payload = compose(session, target)?;

        tracing::info!(
            owner_id = %payload.owner_id,
            target = ?payload.target,
            total = %payload.total,
            balances = payload.lines.len(),
            "submitting settlement"
        );

        match self.backend.submit_settlement(&payload).await {
            Ok(receipt) => {
                tracing::info!(owner_id = %payload.owner_id, message = ?receipt.message, "settlement accepted");
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(owner_id = %payload.owner_id, error = %err, "settlement refused");
                Err(err.into())
            }
        }
    }

    /// Pay `amount` with the agent's oldest balances first.
    ///
    /// Nothing is sent unless the balances cover the whole amount.
    pub async fn pay_with_balances(
        &self,
        owner_id: &str,
        amount: Amount,
        target: SettlementTarget,
    ) -> Result<SettlementReceipt> {
        let amount = to_money(amount);
        if amount <= Decimal::ZERO || is_zero_money(amount) {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }

        let snapshot = Arc::new(self.load_snapshot(owner_id, target.purpose()).await?);
        let session = AllocationSession::auto(snapshot, amount)?;

        if let Err(err) = session.ensure_complete() {
            tracing::warn!(owner_id, %amount, error = %err, "not enough balance to pay");
            return Err(err.into());
        }

        self.submit(&session, target).await
    }

    /// Settle a reservation price change, then save the new total.
    ///
    /// The change is validated before any request is made. The new total is
    /// only saved once the difference has been settled.
    pub async fn apply_price_change(&self, change: &PriceChange) -> Result<AdjustmentOutcome> {
        let (adjustment, path) = route(change, &self.policy)?;

        tracing::info!(
            reservation_id = %change.reservation_id,
            difference = %adjustment.difference,
            ?path,
            "settling price change"
        );

        let receipt = match &path {
            SettlementPath::None => None,
            SettlementPath::AllocateBalances { target } => {
                let reservation = SettlementTarget::Reservation {
                    reservation_id: change.reservation_id.clone(),
                };
                Some(
                    self.pay_with_balances(&change.owner_id, *target, reservation)
                        .await?,
                )
            }
            SettlementPath::RefundCredit { .. }
            | SettlementPath::RefundToWallet { .. }
            | SettlementPath::ChargeCredit { .. } => match AdjustmentRequest::for_path(change, &path) {
                Some(request) => Some(self.backend.submit_adjustment(&request).await?),
                None => None,
            },
        };

        self.backend
            .update_reservation_total(&change.reservation_id, to_money(change.updated_total))
            .await?;

        Ok(AdjustmentOutcome {
            adjustment,
            path,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PaymentDesk;
    use crate::adjustment::{AdjustmentRequest, PaymentMethod, PriceChange, PricePolicy, SettlementPath};
    use crate::allocation::session::AllocationSession;
    use crate::allocation::AllocationError;
    use crate::api::{Backend, FetchError};
    use crate::error::{Error, ValidationError};
    use crate::input::BalanceRecord;
    use crate::ledger::Purpose;
    use crate::money::Amount;
    use crate::settlement::{SettlementError, SettlementPayload, SettlementReceipt, SettlementTarget};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Fetch(String),
        Settle { path: String, total: Amount, balances: Vec<(String, Amount)> },
        Adjust(String),
        Total(String, Amount),
    }

    #[derive(Default)]
    struct FakeBackend {
        records: Vec<serde_json::Value>,
        rejection: Mutex<Option<String>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeBackend {
        fn with_records(records: Vec<serde_json::Value>) -> Self {
            Self {
                records,
                ..Default::default()
            }
        }

        fn reject_with(&self, message: Option<&str>) {
            *self.rejection.lock().unwrap() = message.map(str::to_string);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<SettlementReceipt, SettlementError> {
            self.calls.lock().unwrap().push(call);
            match self.rejection.lock().unwrap().clone() {
                Some(message) => Err(SettlementError::Rejected { status: 409, message }),
                None => Ok(SettlementReceipt {
                    message: Some("ok".to_string()),
                }),
            }
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn fetch_balances(&self, owner_id: &str) -> Result<Vec<BalanceRecord>, FetchError> {
            self.calls.lock().unwrap().push(Call::Fetch(owner_id.to_string()));
            self.records
                .iter()
                .map(|r| serde_json::from_value(r.clone()).map_err(|e| FetchError::InvalidBody(e.to_string())))
                .collect()
        }

        async fn submit_settlement(
            &self,
            payload: &SettlementPayload,
        ) -> Result<SettlementReceipt, SettlementError> {
            self.record(Call::Settle {
                path: payload.target.endpoint().path(),
                total: payload.total,
                balances: payload
                    .lines
                    .iter()
                    .map(|l| (l.balance_id.clone(), l.applied))
                    .collect(),
            })
        }

        async fn submit_adjustment(
            &self,
            request: &AdjustmentRequest,
        ) -> Result<SettlementReceipt, SettlementError> {
            self.record(Call::Adjust(request.endpoint().path()))
        }

        async fn update_reservation_total(
            &self,
            reservation_id: &str,
            total: Amount,
        ) -> Result<SettlementReceipt, SettlementError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Total(reservation_id.to_string(), total));
            Ok(SettlementReceipt::default())
        }
    }

    fn records() -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({"id_saldos": 2, "id_agente": "agent-1", "saldo": "100", "fecha_creacion": "2024-02-01", "activo": 1}),
            serde_json::json!({"id_saldos": 1, "saldo": 150, "fecha_creacion": "2024-01-01 10:00:00"}),
            serde_json::json!({"id_saldos": 3, "saldo": 500, "fecha_creacion": "2023-01-01", "activo": 0}),
            serde_json::json!({"id_saldos": 4, "id_agente": "agent-2", "saldo": 500}),
            serde_json::json!({"saldo": 500}),
        ]
    }

    fn desk(records: Vec<serde_json::Value>) -> PaymentDesk<FakeBackend> {
        PaymentDesk::new(
            FakeBackend::with_records(records),
            PricePolicy {
                minimum_nightly_price: dec!(500),
            },
        )
    }

    fn reservation() -> SettlementTarget {
        SettlementTarget::Reservation {
            reservation_id: "r-1".to_string(),
        }
    }

    fn price_change(previous: Amount, updated: Amount, method: &str) -> PriceChange {
        PriceChange {
            reservation_id: "r-1".to_string(),
            owner_id: "agent-1".to_string(),
            previous_total: previous,
            updated_total: updated,
            nights: 2,
            payment_method: PaymentMethod::parse(method),
        }
    }

    #[tokio::test]
    async fn test_load_snapshot() {
        let desk = desk(records());

        let snapshot = desk.load_snapshot(" agent-1 ", Purpose::Reservation).await.unwrap();

        let ids: Vec<_> = snapshot.balances().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(vec!["2", "1"], ids);
        assert_eq!(dec!(250), snapshot.total_capacity());
        assert_eq!(vec![Call::Fetch("agent-1".to_string())], desk.backend().calls());
    }

    #[tokio::test]
    async fn test_load_snapshot_with_huge_amounts() {
        let max = rust_decimal::Decimal::MAX.to_string();
        let desk = desk(vec![
            serde_json::json!({"id_saldos": 1, "saldo": max.clone()}),
            serde_json::json!({"id_saldos": 2, "saldo": max}),
        ]);

        let snapshot = desk.load_snapshot("agent-1", Purpose::Reservation).await.unwrap();

        assert_eq!(2, snapshot.balances().len());
        assert_eq!(rust_decimal::Decimal::MAX, snapshot.total_capacity());
    }

    #[tokio::test]
    async fn test_load_snapshot_without_owner() {
        let desk = desk(records());

        let got = desk.load_snapshot("  ", Purpose::Reservation).await;

        assert_eq!(Err(FetchError::MissingOwner), got);
        assert!(desk.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_pay_with_balances() {
        let desk = desk(records());

        let receipt = desk
            .pay_with_balances("agent-1", dec!(200), reservation())
            .await
            .unwrap();

        assert_eq!(Some("ok".to_string()), receipt.message);
        assert_eq!(
            vec![
                Call::Fetch("agent-1".to_string()),
                Call::Settle {
                    path: "reservas/r-1/pagos/saldo".to_string(),
                    total: dec!(200),
                    balances: vec![("1".to_string(), dec!(150)), ("2".to_string(), dec!(50))],
                },
            ],
            desk.backend().calls()
        );
    }

    #[tokio::test]
    async fn test_pay_with_insufficient_balances() {
        let desk = desk(records());

        match desk.pay_with_balances("agent-1", dec!(300), reservation()).await {
            Err(Error::Allocation(AllocationError::Incomplete { uncovered })) => {
                assert_eq!(dec!(50), uncovered)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(vec![Call::Fetch("agent-1".to_string())], desk.backend().calls());
    }

    #[tokio::test]
    async fn test_pay_non_positive_amount() {
        for amount in vec![dec!(0), dec!(-10), dec!(0.004)] {
            let desk = desk(records());

            match desk.pay_with_balances("agent-1", amount, reservation()).await {
                Err(Error::Validation(ValidationError::NonPositiveAmount(_))) => {}
                other => panic!("unexpected result: {:?}", other),
            }
            assert!(desk.backend().calls().is_empty());
        }
    }

    #[tokio::test]
    // A refused settlement leaves the session untouched, so it can be sent again.
    async fn test_submit_can_be_retried() {
        let desk = desk(records());
        let snapshot = Arc::new(desk.load_snapshot("agent-1", Purpose::BalanceApplication).await.unwrap());
        let session = AllocationSession::new(snapshot, dec!(120))
            .unwrap()
            .toggle("2")
            .unwrap()
            .toggle("1")
            .unwrap();

        desk.backend().reject_with(Some("stale balance"));
        match desk.submit(&session, SettlementTarget::BalanceApplication).await {
            Err(Error::Settlement(SettlementError::Rejected { message, .. })) => {
                assert_eq!("stale balance", message)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(dec!(120), session.selected_total());
        assert!(session.is_selected("1") && session.is_selected("2"));

        desk.backend().reject_with(None);
        desk.submit(&session, SettlementTarget::BalanceApplication)
            .await
            .unwrap();

        let settlements: Vec<_> = desk
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Settle { .. }))
            .collect();
        assert_eq!(2, settlements.len());
        assert_eq!(settlements[0], settlements[1]);
    }

    #[tokio::test]
    async fn test_apply_price_change() {
        for (change, want_path, want_calls) in vec![
            (
                price_change(dec!(1000), dec!(1000), "credito"),
                SettlementPath::None,
                vec![Call::Total("r-1".to_string(), dec!(1000))],
            ),
            (
                price_change(dec!(1000), dec!(800), "credito"),
                SettlementPath::RefundCredit { amount: dec!(200) },
                vec![
                    Call::Adjust("reservas/r-1/credito/reembolso".to_string()),
                    Call::Total("r-1".to_string(), dec!(800)),
                ],
            ),
            (
                price_change(dec!(1000), dec!(800), "saldo"),
                SettlementPath::RefundToWallet { amount: dec!(200) },
                vec![
                    Call::Adjust("reservas/r-1/saldo/reembolso".to_string()),
                    Call::Total("r-1".to_string(), dec!(800)),
                ],
            ),
            (
                price_change(dec!(1000), dec!(1250), "credito"),
                SettlementPath::ChargeCredit { amount: dec!(250) },
                vec![
                    Call::Adjust("reservas/r-1/credito/cargo".to_string()),
                    Call::Total("r-1".to_string(), dec!(1250)),
                ],
            ),
            (
                price_change(dec!(1000), dec!(1250), "saldo"),
                SettlementPath::AllocateBalances { target: dec!(250) },
                vec![
                    Call::Fetch("agent-1".to_string()),
                    Call::Settle {
                        path: "reservas/r-1/pagos/saldo".to_string(),
                        total: dec!(250),
                        balances: vec![("1".to_string(), dec!(150)), ("2".to_string(), dec!(100))],
                    },
                    Call::Total("r-1".to_string(), dec!(1250)),
                ],
            ),
        ] {
            let desk = desk(records());

            let outcome = desk.apply_price_change(&change).await.unwrap();

            assert_eq!(want_path, outcome.path);
            assert_eq!(want_calls, desk.backend().calls());
        }
    }

    #[tokio::test]
    async fn test_invalid_price_change_sends_nothing() {
        let mut no_nights = price_change(dec!(1000), dec!(1250), "credito");
        no_nights.nights = 0;

        for change in vec![
            // 900 over 2 nights is below the minimum.
            price_change(dec!(800), dec!(900), "credito"),
            no_nights,
            PriceChange {
                reservation_id: String::new(),
                ..price_change(dec!(1000), dec!(800), "saldo")
            },
        ] {
            let desk = desk(records());

            match desk.apply_price_change(&change).await {
                Err(Error::Validation(_)) => {}
                other => panic!("unexpected result: {:?}", other),
            }
            assert!(desk.backend().calls().is_empty());
        }
    }

    #[tokio::test]
    // The total is only saved once the difference has been paid.
    async fn test_refused_settlement_keeps_previous_total() {
        for change in vec![
            price_change(dec!(1000), dec!(800), "saldo"),
            price_change(dec!(1000), dec!(1250), "saldo"),
        ] {
            let desk = desk(records());
            desk.backend().reject_with(Some("reservation locked"));

            match desk.apply_price_change(&change).await {
                Err(Error::Settlement(SettlementError::Rejected { message, .. })) => {
                    assert_eq!("reservation locked", message)
                }
                other => panic!("unexpected result: {:?}", other),
            }
            assert!(!desk
                .backend()
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Total(..))));
        }
    }

    #[tokio::test]
    async fn test_price_increase_without_enough_balance() {
        let desk = desk(records());

        match desk
            .apply_price_change(&price_change(dec!(1000), dec!(1400), "saldo"))
            .await
        {
            Err(Error::Allocation(AllocationError::Incomplete { uncovered })) => {
                assert_eq!(dec!(150), uncovered)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(vec![Call::Fetch("agent-1".to_string())], desk.backend().calls());
    }
}
