//! 수량/가격 파싱 및 포맷 유틸리티.
//!
//! 거래소와 주고받는 값은 문자열이므로 정밀도 손실 없이 `Decimal`로 변환합니다.

use crate::error::{BrokerError, BrokerResult};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문/포지션 수량 타입.
pub type Quantity = Decimal;

/// 시그널 주문 수량의 소수점 자릿수.
pub const QUANTITY_PRECISION: u32 = 8;

fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// 양수 수량을 파싱합니다.
pub fn parse_quantity(value: &str) -> BrokerResult<Quantity> {
    match parse_decimal(value) {
        Some(q) if q > Decimal::ZERO => Ok(q),
        Some(q) => Err(BrokerError::InvalidQuantity(format!("수량은 0보다 커야 함: {}", q))),
        None => Err(BrokerError::InvalidQuantity(format!("수량 형식이 잘못됨: '{}'", value))),
    }
}

/// 양수 가격을 파싱합니다.
pub fn parse_price(value: &str) -> BrokerResult<Price> {
    match parse_decimal(value) {
        Some(p) if p > Decimal::ZERO => Ok(p),
        Some(p) => Err(BrokerError::InvalidPrice(format!("가격은 0보다 커야 함: {}", p))),
        None => Err(BrokerError::InvalidPrice(format!("가격 형식이 잘못됨: '{}'", value))),
    }
}

/// 부호 있는 포지션 크기를 파싱합니다 (0과 음수 허용).
pub fn parse_position_size(value: &str) -> BrokerResult<Quantity> {
    parse_decimal(value)
        .ok_or_else(|| BrokerError::InvalidQuantity(format!("포지션 크기 형식이 잘못됨: '{}'", value)))
}

/// 거래소 응답의 숫자 문자열을 관대하게 파싱합니다 (빈 값/오류는 0).
pub fn parse_decimal_or_zero(value: &str) -> Decimal {
    parse_decimal(value).unwrap_or(Decimal::ZERO)
}

fn to_fixed(value: Decimal, precision: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(precision);
    rounded
}

/// 수량을 고정 소수점 자릿수로 맞춥니다 (예: 0.001 → 0.00100000).
pub fn format_quantity(quantity: Quantity, precision: u32) -> Quantity {
    to_fixed(quantity, precision)
}

/// 가격을 고정 소수점 자릿수로 맞춥니다.
pub fn format_price(price: Price, precision: u32) -> Price {
    to_fixed(price, precision)
}
