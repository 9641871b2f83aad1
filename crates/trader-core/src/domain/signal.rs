//! 포지션 변경 시그널.
//!
//! 차트 플랫폼 알림 웹훅에서 파생된 코어 전용 시그널 형태입니다.
//! 코어는 주문 수량을 직접 받지 않고, 변경 전/후 목표 포지션 크기만 받습니다.

use crate::error::{BrokerError, BrokerResult};
use crate::types::{parse_position_size, Quantity};
use serde::{Deserialize, Serialize};

/// 트레이딩 시그널.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSignal {
    /// 심볼 (예: BTCUSDT, BTC-USDT)
    pub symbol: String,
    /// 거래소 이름 (대소문자 무관)
    pub exchange: String,
    /// 알림 액션 (buy, sell 등)
    pub action: String,
    /// 알림이 보고한 주문 크기 (참고용)
    pub position_size: String,
    /// 가격
    pub price: String,
    /// 현재 마켓 포지션 (long, short, flat)
    pub market_position: String,
    /// 목표 포지션 크기
    pub market_position_size: String,
    /// 이전 마켓 포지션
    pub prev_market_position: String,
    /// 이전 포지션 크기
    pub prev_market_position_size: String,
    /// 레버리지 (0 = 변경하지 않음)
    pub leverage: u32,
    /// 거래 모드
    pub trading_mode: String,
    /// 주문 유형 (market, limit)
    pub order_type: String,
}

impl TradingSignal {
    /// 네트워크 호출 없이 시그널 형태를 검증합니다.
    pub fn validate(&self) -> BrokerResult<()> {
        let required = [
            ("symbol", &self.symbol),
            ("exchange", &self.exchange),
            ("action", &self.action),
            ("market_position_size", &self.market_position_size),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BrokerError::Validation(format!("{} 필드가 필요함", field)));
            }
        }

        Ok(())
    }

    /// 브로커 조회용 거래소 키 (소문자).
    pub fn exchange_key(&self) -> String {
        self.exchange.trim().to_lowercase()
    }

    /// 목표 포지션 크기.
    pub fn target_size(&self) -> BrokerResult<Quantity> {
        parse_position_size(&self.market_position_size)
            .map_err(|e| e.context("market_position_size 파싱 실패"))
    }

    /// 이전 포지션 크기.
    pub fn previous_size(&self) -> BrokerResult<Quantity> {
        parse_position_size(&self.prev_market_position_size)
            .map_err(|e| e.context("prev_market_position_size 파싱 실패"))
    }

    /// 지정가 주문으로 처리해야 하는지 확인합니다.
    pub fn is_limit_order(&self) -> bool {
        self.order_type == "limit" && !self.price.trim().is_empty()
    }
}
