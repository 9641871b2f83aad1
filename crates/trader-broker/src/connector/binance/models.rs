//! Binance 선물 API 응답 타입과 도메인 모델 변환.

#![allow(dead_code)] // API 응답 필드 전체 매핑 (일부만 사용)

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use trader_core::{
    parse_decimal_or_zero, AccountInfo, Balance, BrokerResult, MarginType, Order, OrderStatus,
    OrderType, Position, PositionSide, Side, SymbolInfo, TimeInForce,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetResponse {
    pub asset: String,
    pub wallet_balance: String,
    pub unrealized_profit: String,
    pub margin_balance: String,
    pub maint_margin: String,
    pub initial_margin: String,
    pub cross_wallet_balance: String,
    pub available_balance: String,
    pub max_withdraw_amount: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountPositionResponse {
    pub symbol: String,
    pub initial_margin: String,
    pub maint_margin: String,
    pub unrealized_profit: String,
    pub leverage: String,
    pub isolated: bool,
    pub isolated_wallet: String,
    pub entry_price: String,
    pub position_side: String,
    pub position_amt: String,
    pub update_time: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountResponse {
    pub total_wallet_balance: String,
    pub total_unrealized_profit: String,
    pub total_margin_balance: String,
    pub total_position_initial_margin: String,
    pub total_open_order_initial_margin: String,
    pub available_balance: String,
    pub max_withdraw_amount: String,
    pub assets: Vec<AssetResponse>,
    pub positions: Vec<AccountPositionResponse>,
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub fee_tier: u32,
    pub update_time: i64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionRiskResponse {
    pub symbol: String,
    pub position_amt: String,
    pub entry_price: String,
    pub mark_price: String,
    pub un_realized_profit: String,
    pub leverage: String,
    pub margin_type: String,
    pub isolated_margin: String,
    pub position_side: String,
    pub update_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageResponse {
    pub leverage: u32,
    pub symbol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionModeResponse {
    pub dual_side_position: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderResponse {
    pub order_id: i64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub orig_qty: String,
    pub price: String,
    pub executed_qty: String,
    pub cum_quote: String,
    pub status: String,
    pub time_in_force: String,
    pub position_side: String,
    pub reduce_only: bool,
    pub time: Option<i64>,
    pub update_time: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterResponse {
    pub filter_type: String,
    pub min_qty: Option<String>,
    pub max_qty: Option<String>,
    pub step_size: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub tick_size: Option<String>,
    pub notional: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolResponse {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub base_asset_precision: u32,
    pub quote_precision: u32,
    pub order_types: Vec<String>,
    pub filters: Vec<FilterResponse>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ExchangeInfoResponse {
    pub timezone: String,
    pub server_time: i64,
    pub symbols: Vec<SymbolResponse>,
}

// ============================================================================
// 변환
// ============================================================================

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

fn position_side_or_both(side: &str) -> PositionSide {
    side.parse().unwrap_or(PositionSide::Both)
}

fn is_zero_amount(amount: &str) -> bool {
    parse_decimal_or_zero(amount).is_zero()
}

impl From<&AssetResponse> for Balance {
    fn from(asset: &AssetResponse) -> Self {
        Balance {
            asset: asset.asset.clone(),
            wallet_balance: parse_decimal_or_zero(&asset.wallet_balance),
            unrealized_pnl: parse_decimal_or_zero(&asset.unrealized_profit),
            margin_balance: parse_decimal_or_zero(&asset.margin_balance),
            maint_margin: parse_decimal_or_zero(&asset.maint_margin),
            initial_margin: parse_decimal_or_zero(&asset.initial_margin),
            cross_wallet_balance: parse_decimal_or_zero(&asset.cross_wallet_balance),
            available_balance: parse_decimal_or_zero(&asset.available_balance),
            max_withdraw_amount: parse_decimal_or_zero(&asset.max_withdraw_amount),
        }
    }
}

impl AccountPositionResponse {
    fn to_position(&self) -> Position {
        Position {
            symbol: self.symbol.clone(),
            position_side: position_side_or_both(&self.position_side),
            size: parse_decimal_or_zero(&self.position_amt),
            entry_price: parse_decimal_or_zero(&self.entry_price),
            mark_price: Default::default(),
            unrealized_pnl: parse_decimal_or_zero(&self.unrealized_profit),
            leverage: self.leverage.parse().unwrap_or(0),
            margin_type: if self.isolated {
                MarginType::Isolated
            } else {
                MarginType::Cross
            },
            isolated_margin: parse_decimal_or_zero(&self.isolated_wallet),
            maintenance_margin: parse_decimal_or_zero(&self.maint_margin),
            initial_margin: parse_decimal_or_zero(&self.initial_margin),
            updated_at: millis_to_datetime(self.update_time),
        }
    }
}

impl AccountResponse {
    /// 크기가 0인 포지션을 제외하고 계좌 스냅샷으로 변환합니다.
    pub fn into_account_info(self) -> AccountInfo {
        AccountInfo {
            total_wallet_balance: parse_decimal_or_zero(&self.total_wallet_balance),
            total_unrealized_pnl: parse_decimal_or_zero(&self.total_unrealized_profit),
            total_margin_balance: parse_decimal_or_zero(&self.total_margin_balance),
            total_position_initial_margin: parse_decimal_or_zero(&self.total_position_initial_margin),
            total_open_order_initial_margin: parse_decimal_or_zero(&self.total_open_order_initial_margin),
            available_balance: parse_decimal_or_zero(&self.available_balance),
            max_withdraw_amount: parse_decimal_or_zero(&self.max_withdraw_amount),
            assets: self.assets.iter().map(Balance::from).collect(),
            positions: self
                .positions
                .iter()
                .filter(|p| !is_zero_amount(&p.position_amt))
                .map(AccountPositionResponse::to_position)
                .collect(),
            can_trade: self.can_trade,
            can_withdraw: self.can_withdraw,
            fee_tier: self.fee_tier,
            updated_at: millis_to_datetime(self.update_time),
        }
    }
}

impl PositionRiskResponse {
    /// 포지션 크기가 0이 아닌지 확인합니다.
    pub fn is_open(&self) -> bool {
        !is_zero_amount(&self.position_amt)
    }

    pub fn to_position(&self) -> Position {
        Position {
            symbol: self.symbol.clone(),
            position_side: position_side_or_both(&self.position_side),
            size: parse_decimal_or_zero(&self.position_amt),
            entry_price: parse_decimal_or_zero(&self.entry_price),
            mark_price: parse_decimal_or_zero(&self.mark_price),
            unrealized_pnl: parse_decimal_or_zero(&self.un_realized_profit),
            leverage: self.leverage.parse().unwrap_or(0),
            margin_type: self.margin_type.parse().unwrap_or(MarginType::Cross),
            isolated_margin: parse_decimal_or_zero(&self.isolated_margin),
            maintenance_margin: Default::default(),
            initial_margin: Default::default(),
            updated_at: millis_to_datetime(self.update_time),
        }
    }
}

impl OrderResponse {
    /// 도메인 주문으로 변환합니다.
    pub fn into_order(self) -> BrokerResult<Order> {
        let side: Side = self.side.parse()?;
        let order_type: OrderType = self.order_type.parse()?;
        let status: OrderStatus = self.status.parse()?;
        let created_ms = self.time.or(self.update_time).unwrap_or_default();
        let updated_ms = self.update_time.or(self.time).unwrap_or_default();

        Ok(Order {
            id: self.order_id.to_string(),
            client_order_id: self.client_order_id,
            symbol: self.symbol,
            side,
            order_type,
            quantity: parse_decimal_or_zero(&self.orig_qty),
            price: parse_decimal_or_zero(&self.price),
            executed_quantity: parse_decimal_or_zero(&self.executed_qty),
            cumulative_quote: parse_decimal_or_zero(&self.cum_quote),
            status,
            time_in_force: self.time_in_force.parse::<TimeInForce>().ok(),
            position_side: position_side_or_both(&self.position_side),
            reduce_only: self.reduce_only,
            created_at: millis_to_datetime(created_ms),
            updated_at: millis_to_datetime(updated_ms),
        })
    }
}

impl SymbolResponse {
    /// 심볼 정보로 변환합니다. LOT_SIZE, PRICE_FILTER, MIN_NOTIONAL 필터를 반영합니다.
    pub fn to_symbol_info(&self) -> SymbolInfo {
        let mut info = SymbolInfo {
            symbol: self.symbol.clone(),
            base_asset: self.base_asset.clone(),
            quote_asset: self.quote_asset.clone(),
            status: self.status.clone(),
            base_asset_precision: self.base_asset_precision,
            quote_asset_precision: self.quote_precision,
            order_types: self
                .order_types
                .iter()
                .filter_map(|t| t.parse::<OrderType>().ok())
                .collect(),
            min_qty: None,
            max_qty: None,
            step_size: None,
            min_price: None,
            max_price: None,
            tick_size: None,
            min_notional: None,
        };

        let parse = |v: &Option<String>| v.as_deref().map(parse_decimal_or_zero);

        for filter in &self.filters {
            match filter.filter_type.as_str() {
                "LOT_SIZE" => {
                    info.min_qty = parse(&filter.min_qty);
                    info.max_qty = parse(&filter.max_qty);
                    info.step_size = parse(&filter.step_size);
                }
                "PRICE_FILTER" => {
                    info.min_price = parse(&filter.min_price);
                    info.max_price = parse(&filter.max_price);
                    info.tick_size = parse(&filter.tick_size);
                }
                "MIN_NOTIONAL" => {
                    info.min_notional = parse(&filter.notional);
                }
                _ => {}
            }
        }

        info
    }
}
