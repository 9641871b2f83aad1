//! 거래소 커넥터 구현.
//!
//! 각 커넥터는 자체 `register` 함수로 [`BrokerRegistry`](crate::registry::BrokerRegistry)에
//! 팩토리를 등록합니다.

pub mod binance;

pub use binance::{BinanceBroker, BinanceConfig, BinanceFuturesClient};

use crate::registry::BrokerRegistry;

/// 내장 커넥터를 모두 등록한 레지스트리를 생성합니다.
pub fn default_registry() -> BrokerRegistry {
    let mut registry = BrokerRegistry::new();
    binance::register(&mut registry);
    registry
}
