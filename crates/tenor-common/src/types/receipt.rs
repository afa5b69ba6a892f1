//! Settlement receipts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ids::AccountId, ids::MarketId, maturity::Maturity};

/// Kind of committed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DepositSmartPool,
    WithdrawSmartPool,
    DepositMaturityPool,
    BorrowMaturityPool,
    RepayMaturityPool,
    WithdrawMaturityPool,
    Liquidate,
}

/// Outcome of a committed settlement operation
///
/// `amount` is what actually moved (post fee-on-transfer for inbound funds).
/// `fee` is the commission locked in: yield for deposits, interest for borrows,
/// penalty paid for repayments, seized collateral for liquidations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub kind: OperationKind,
    pub market: MarketId,
    pub account: AccountId,
    pub maturity: Option<Maturity>,
    pub amount: Decimal,
    pub fee: Decimal,
    /// Unix seconds at which the operation was applied
    pub executed_at: u64,
}

impl Receipt {
    pub fn new(
        kind: OperationKind,
        market: MarketId,
        account: AccountId,
        maturity: Option<Maturity>,
        amount: Decimal,
        fee: Decimal,
        executed_at: u64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            market,
            account,
            maturity,
            amount,
            fee,
            executed_at,
        }
    }
}
