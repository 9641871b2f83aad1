//! Binance USDⓈ-M 선물 커넥터.
//!
//! - `client`: 서명된 REST 호출과 에러 코드 매핑
//! - `models`: API 응답 타입과 도메인 변환
//! - `broker`: [`Broker`](crate::traits::Broker) / [`FuturesBroker`](crate::traits::FuturesBroker) 구현

mod broker;
mod client;
mod models;

use std::sync::Arc;

pub use broker::BinanceBroker;
pub use client::{BinanceConfig, BinanceFuturesClient, MAINNET_URL, TESTNET_URL};

use crate::registry::BrokerRegistry;

/// 레지스트리 키.
pub const NAME: &str = "binance";

/// 레지스트리에 Binance 팩토리를 등록합니다.
pub fn register(registry: &mut BrokerRegistry) {
    registry.register(NAME, |options| Ok(Arc::new(BinanceBroker::new(options.clone()))));
}
