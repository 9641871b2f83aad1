//! 주문 타입.
//!
//! 이 모듈은 브로커 계약에서 사용하는 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가/지정가)
//! - `PositionSide` - 헤지 모드 포지션 방향
//! - `TimeInForce` - 주문 유효 기간
//! - `OrderStatus` - 주문 상태
//! - `OrderRequest` - 주문 요청
//! - `Order` - 거래소가 반환한 주문

use crate::domain::PositionMode;
use crate::error::{BrokerError, BrokerResult};
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(BrokerError::InvalidOrderSide(s.to_string())),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// 시장가 주문
    Market,
    /// 지정가 주문
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

impl FromStr for OrderType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            _ => Err(BrokerError::InvalidOrderType(s.to_string())),
        }
    }
}

/// 선물 포지션 방향.
///
/// `Both`는 단방향(one-way) 모드에서 심볼당 하나의 순포지션을 뜻합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    /// 롱
    Long,
    /// 숏
    Short,
    /// 단방향 모드
    Both,
}

impl PositionSide {
    /// 반대 포지션 방향을 반환합니다. `Both`는 그대로입니다.
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
            PositionSide::Both => PositionSide::Both,
        }
    }

    /// 주문 방향과 포지션 모드로부터 포지션 방향을 결정합니다.
    pub fn for_order_side(side: Side, mode: PositionMode) -> Self {
        match (mode, side) {
            (PositionMode::OneWay, _) => PositionSide::Both,
            (PositionMode::Hedge, Side::Buy) => PositionSide::Long,
            (PositionMode::Hedge, Side::Sell) => PositionSide::Short,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
            PositionSide::Both => write!(f, "BOTH"),
        }
    }
}

impl FromStr for PositionSide {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            "BOTH" => Ok(PositionSide::Both),
            _ => Err(BrokerError::Validation(format!("알 수 없는 포지션 방향: {}", s))),
        }
    }
}

/// 주문 유효 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// 취소 시까지 유효
    #[default]
    Gtc,
    /// 즉시 체결 또는 취소
    Ioc,
    /// 전량 체결 또는 취소
    Fok,
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            _ => Err(BrokerError::Validation(format!("알 수 없는 유효 기간: {}", s))),
        }
    }
}

/// 거래소 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 접수됨
    New,
    /// 부분 체결
    PartiallyFilled,
    /// 전량 체결
    Filled,
    /// 취소됨
    Canceled,
    /// 취소 대기
    PendingCancel,
    /// 거부됨
    Rejected,
    /// 만료됨
    Expired,
}

impl OrderStatus {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }
}

impl FromStr for OrderStatus {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELED" => Ok(OrderStatus::Canceled),
            "PENDING_CANCEL" => Ok(OrderStatus::PendingCancel),
            "REJECTED" => Ok(OrderStatus::Rejected),
            "EXPIRED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Expired),
            _ => Err(BrokerError::ApiError(format!("알 수 없는 주문 상태: {}", s))),
        }
    }
}

/// 주문 요청.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 거래소 형식 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (항상 양수)
    pub quantity: Quantity,
    /// 지정가 (지정가 주문에 필수)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 포지션 방향
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_side: Option<PositionSide>,
    /// 주문 유효 기간
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    /// 포지션 축소 전용 여부
    #[serde(default)]
    pub reduce_only: bool,
}

impl OrderRequest {
    /// 시장가 주문 요청을 생성합니다.
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            position_side: None,
            time_in_force: None,
            reduce_only: false,
        }
    }

    /// 지정가 주문 요청을 생성합니다.
    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Quantity, price: Price) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            time_in_force: Some(TimeInForce::Gtc),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// 포지션 방향을 설정합니다.
    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = Some(position_side);
        self
    }

    /// 유효 기간을 설정합니다.
    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }

    /// 포지션 축소 전용 플래그를 설정합니다.
    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    /// 주문 요청을 검증합니다.
    ///
    /// 심볼이 있어야 하고, 수량은 양수이며, 지정가 주문은 양수 가격을 가져야 합니다.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(BrokerError::InvalidSymbol("심볼이 비어 있음".to_string()));
        }

        if self.quantity <= Decimal::ZERO {
            return Err(BrokerError::InvalidQuantity(format!(
                "수량은 0보다 커야 함: {}",
                self.quantity
            )));
        }

        if self.order_type == OrderType::Limit {
            match self.price {
                Some(price) if price > Decimal::ZERO => {}
                Some(price) => {
                    return Err(BrokerError::InvalidPrice(format!(
                        "지정가 주문 가격은 0보다 커야 함: {}",
                        price
                    )))
                }
                None => {
                    return Err(BrokerError::InvalidPrice(
                        "지정가 주문에는 가격이 필요함".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// 거래소가 반환한 주문.
///
/// 주문 제출이 성공했을 때만 커넥터가 생성합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// 거래소 주문 ID
    pub id: String,
    /// 클라이언트 주문 ID
    pub client_order_id: String,
    /// 심볼
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량
    pub quantity: Quantity,
    /// 주문 가격 (시장가는 0일 수 있음)
    pub price: Price,
    /// 체결 수량
    pub executed_quantity: Quantity,
    /// 누적 체결 금액
    pub cumulative_quote: Decimal,
    /// 주문 상태
    pub status: OrderStatus,
    /// 유효 기간
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    /// 포지션 방향
    pub position_side: PositionSide,
    /// 포지션 축소 전용 여부
    pub reduce_only: bool,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 갱신 시각
    pub updated_at: DateTime<Utc>,
}
