use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-user balance with an append-only ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: String,
    pub balance: Decimal,
    pub transactions: Vec<WalletTransaction>,
}

impl Wallet {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: Decimal::ZERO,
            transactions: Vec::new(),
        }
    }

    pub(crate) fn record(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        reason: impl Into<String>,
        order_id: Option<Uuid>,
    ) {
        match kind {
            TransactionKind::Credit => self.balance += amount,
            TransactionKind::Debit => self.balance -= amount,
        }
        self.transactions.push(WalletTransaction {
            id: Uuid::new_v4(),
            kind,
            amount,
            reason: reason.into(),
            order_id,
            created_at: Utc::now(),
        });
    }
}
