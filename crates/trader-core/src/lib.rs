//! # Trader Core
//!
//! 브로커 연동 코어의 도메인 모델, 에러 분류 체계, 유틸리티를 제공합니다.
//!
//! 이 크레이트는 다음을 포함합니다:
//! - 주문/포지션/계좌/심볼 정보 타입
//! - 센티널 에러와 브로커 범위 에러 (`BrokerError`)
//! - 수량/가격 파싱 및 심볼 변환
//! - 포지션 변화량 → 주문 계산
//! - 브로커 설정과 검증
//! - 로깅 초기화

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
