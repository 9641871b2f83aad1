//! 계좌 및 잔고 스냅샷.

use crate::domain::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 자산별 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// 자산 (예: USDT)
    pub asset: String,
    /// 지갑 잔고
    pub wallet_balance: Decimal,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 마진 잔고
    pub margin_balance: Decimal,
    /// 유지 증거금
    pub maint_margin: Decimal,
    /// 개시 증거금
    pub initial_margin: Decimal,
    /// 교차 지갑 잔고
    pub cross_wallet_balance: Decimal,
    /// 사용 가능 잔고
    pub available_balance: Decimal,
    /// 최대 출금 가능 금액
    pub max_withdraw_amount: Decimal,
}

/// 조회 시점의 계좌 스냅샷.
///
/// 코어는 캐싱하지 않으며 조회할 때마다 새로 받아옵니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub total_wallet_balance: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_margin_balance: Decimal,
    pub total_position_initial_margin: Decimal,
    pub total_open_order_initial_margin: Decimal,
    pub available_balance: Decimal,
    pub max_withdraw_amount: Decimal,
    /// 자산별 잔고
    pub assets: Vec<Balance>,
    /// 크기가 0이 아닌 포지션
    pub positions: Vec<Position>,
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub fee_tier: u32,
    pub updated_at: DateTime<Utc>,
}
