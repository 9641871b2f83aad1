//! 브로커 계약과 거래소 커넥터.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `Broker` / `FuturesBroker` trait: 통합 브로커 인터페이스
//! - 커넥터 레지스트리 (이름 → 팩토리)
//! - Binance USDⓈ-M 선물 커넥터
//! - 지수 백오프 재시도와 데드라인

pub mod connector;
pub mod registry;
pub mod retry;
pub mod traits;

pub use connector::{default_registry, BinanceBroker, BinanceConfig, BinanceFuturesClient};
pub use registry::{BrokerFactory, BrokerRegistry, ConnectorOptions};
pub use retry::{
    retry_with_backoff, with_deadline, RetryConfig, CONNECT_TIMEOUT, MAX_BACKOFF, REQUEST_TIMEOUT,
};
pub use traits::*;
