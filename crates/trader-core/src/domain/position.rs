//! 선물 포지션 타입.

use crate::domain::PositionSide;
use crate::error::BrokerError;
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 마진 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginType {
    /// 격리 마진
    Isolated,
    /// 교차 마진
    Cross,
}

impl std::fmt::Display for MarginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginType::Isolated => write!(f, "ISOLATED"),
            MarginType::Cross => write!(f, "CROSSED"),
        }
    }
}

impl FromStr for MarginType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "isolated" => Ok(MarginType::Isolated),
            "cross" | "crossed" => Ok(MarginType::Cross),
            _ => Err(BrokerError::InvalidMarginType(s.to_string())),
        }
    }
}

/// 포지션 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionMode {
    /// 헤지 모드 (롱/숏 동시 보유)
    Hedge,
    /// 단방향 모드
    OneWay,
}

impl PositionMode {
    /// 양방향(dual side) 포지션 여부.
    pub fn is_dual_side(&self) -> bool {
        matches!(self, PositionMode::Hedge)
    }

    /// 거래소의 dual side 플래그로부터 변환합니다.
    pub fn from_dual_side(dual_side: bool) -> Self {
        if dual_side {
            PositionMode::Hedge
        } else {
            PositionMode::OneWay
        }
    }
}

impl std::fmt::Display for PositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionMode::Hedge => write!(f, "hedge"),
            PositionMode::OneWay => write!(f, "one-way"),
        }
    }
}

impl FromStr for PositionMode {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hedge" => Ok(PositionMode::Hedge),
            "one-way" => Ok(PositionMode::OneWay),
            _ => Err(BrokerError::Config(format!("잘못된 포지션 모드: {}", s))),
        }
    }
}

/// 거래소가 보고한 선물 포지션.
///
/// `size`는 부호가 있는 값입니다 (양수 = 롱, 음수 = 숏, 0 = 청산됨).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼
    pub symbol: String,
    /// 포지션 방향
    pub position_side: PositionSide,
    /// 부호 있는 포지션 크기
    pub size: Quantity,
    /// 진입 가격
    pub entry_price: Price,
    /// 마크 가격
    pub mark_price: Price,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 레버리지
    pub leverage: u32,
    /// 마진 유형
    pub margin_type: MarginType,
    /// 격리 마진
    pub isolated_margin: Decimal,
    /// 유지 증거금
    pub maintenance_margin: Decimal,
    /// 개시 증거금
    pub initial_margin: Decimal,
    /// 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// 롱 포지션인지 확인합니다.
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// 숏 포지션인지 확인합니다.
    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// 청산된(크기 0) 포지션인지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.size.is_zero()
    }
}
