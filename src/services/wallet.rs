use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{TransactionKind, Wallet},
};

/// In-memory wallet ledger keyed by user id.
#[derive(Clone, Default)]
pub struct WalletService {
    wallets: Arc<DashMap<String, Wallet>>,
}

impl WalletService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wallet for `user_id`, empty if the user never transacted.
    pub fn get_wallet(&self, user_id: &str) -> Wallet {
        self.wallets
            .get(user_id)
            .map(|w| w.clone())
            .unwrap_or_else(|| Wallet::empty(user_id))
    }

    pub fn balance(&self, user_id: &str) -> Decimal {
        self.wallets
            .get(user_id)
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO)
    }

    #[instrument(skip(self, reason))]
    pub fn credit(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<Decimal, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "credit amount must be greater than zero".to_string(),
            ));
        }

        let mut wallet = self
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id));
        if wallet.balance.checked_add(amount).is_none() {
            warn!(balance = %wallet.balance, %amount, "wallet credit would overflow");
            return Err(ServiceError::ValidationError(
                "credit would exceed the maximum wallet balance".to_string(),
            ));
        }
        wallet.record(TransactionKind::Credit, amount, reason, order_id);

        info!(balance = %wallet.balance, "wallet credited");
        Ok(wallet.balance)
    }

    /// Debits the wallet, leaving it untouched when the balance is short.
    #[instrument(skip(self, reason))]
    pub fn debit(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
        order_id: Option<Uuid>,
    ) -> Result<Decimal, ServiceError> {
        if amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "debit amount must not be negative".to_string(),
            ));
        }

        let mut wallet = self
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::empty(user_id));

        if wallet.balance < amount {
            warn!(balance = %wallet.balance, "insufficient wallet balance");
            return Err(ServiceError::InsufficientFunds(format!(
                "wallet balance {} is less than {}",
                wallet.balance, amount
            )));
        }

        wallet.record(TransactionKind::Debit, amount, reason, order_id);
        info!(balance = %wallet.balance, "wallet debited");
        Ok(wallet.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn debit_requires_sufficient_balance() {
        let wallets = WalletService::new();
        wallets.credit("u1", dec!(100), "top-up", None).unwrap();

        assert_matches!(
            wallets.debit("u1", dec!(150), "order", None),
            Err(ServiceError::InsufficientFunds(_))
        );
        assert_eq!(wallets.balance("u1"), dec!(100));

        assert_eq!(wallets.debit("u1", dec!(40), "order", None).unwrap(), dec!(60));
        let wallet = wallets.get_wallet("u1");
        assert_eq!(wallet.transactions.len(), 2);
        assert_eq!(wallet.transactions[1].kind, TransactionKind::Debit);
    }

    #[test]
    fn unknown_user_has_empty_wallet() {
        let wallets = WalletService::new();
        assert_eq!(wallets.get_wallet("nobody").balance, Decimal::ZERO);
        assert!(wallets.credit("nobody", Decimal::ZERO, "noop", None).is_err());
    }

    #[test]
    fn credit_that_would_overflow_is_rejected() {
        let wallets = WalletService::new();
        wallets.credit("u1", Decimal::MAX, "top-up", None).unwrap();

        assert_matches!(
            wallets.credit("u1", dec!(1), "top-up", None),
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(wallets.balance("u1"), Decimal::MAX);
        assert_eq!(wallets.get_wallet("u1").transactions.len(), 1);
    }
}
