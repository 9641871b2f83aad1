//! 거래 가능 종목 메타데이터.

use crate::domain::OrderType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 심볼 정보.
///
/// 검증 참고용이며 코어는 수치 한도를 강제하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// 심볼 (예: BTCUSDT)
    pub symbol: String,
    /// 기초 자산
    pub base_asset: String,
    /// 호가 자산
    pub quote_asset: String,
    /// 거래 상태 (예: TRADING)
    pub status: String,
    pub base_asset_precision: u32,
    pub quote_asset_precision: u32,
    /// 허용된 주문 유형
    pub order_types: Vec<OrderType>,
    pub min_qty: Option<Decimal>,
    pub max_qty: Option<Decimal>,
    pub step_size: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub tick_size: Option<Decimal>,
    pub min_notional: Option<Decimal>,
}

impl SymbolInfo {
    /// 주어진 주문 유형을 지원하는지 확인합니다.
    pub fn supports(&self, order_type: OrderType) -> bool {
        self.order_types.contains(&order_type)
    }

    /// 거래 가능한 상태인지 확인합니다.
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }
}
