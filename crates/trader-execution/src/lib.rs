//! 시그널 실행과 다중 브로커 관리.
//!
//! 이 crate는 다음을 제공합니다:
//! - 이름별 브로커 컬렉션과 단일/전체 브로커 작업 (`BrokerManager`)
//! - 목표 포지션 시그널을 주문으로 변환해 제출하는 처리기 (`SignalProcessor`)
//! - 설정 기반 브로커 초기화, 재연결, 상태 점검 (`ConfigManager`)
//!
//! # 예제
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trader_broker::default_registry;
//! use trader_core::BrokersConfig;
//! use trader_execution::{ConfigManager, SignalProcessor};
//!
//! let config = BrokersConfig::load("config/brokers.toml")?;
//! let config_manager = ConfigManager::new(config, Arc::new(default_registry()));
//! config_manager.initialize_brokers().await?;
//!
//! let processor = SignalProcessor::new(config_manager.manager());
//! let outcome = processor.process_signal(&signal).await?;
//! ```

pub mod config_manager;
pub mod manager;
pub mod signal_processor;

// 주요 타입 재내보내기
pub use config_manager::ConfigManager;
pub use manager::{BrokerManager, FanOut};
pub use signal_processor::{
    calculate_order, SignalOutcome, SignalProcessor, SignalProcessorConfig, SignalState,
};
