//! 브로커 기능 계약.
//!
//! 모든 거래소 커넥터는 [`Broker`]를 구현합니다. 선물 전용 포지션 관리는
//! [`FuturesBroker`]로 분리되어 있으며, [`Broker::as_futures`]로 지원 여부를 조회합니다.
//!
//! 상태를 바꾸거나 데이터를 조회하는 모든 작업은 `initialize` 성공 전에는
//! [`BrokerError::NotConnected`]로 실패해야 합니다.

use async_trait::async_trait;
use trader_core::{
    AccountInfo, Balance, BrokerError, BrokerResult, Credentials, MarginType, Order, OrderRequest,
    Position, PositionMode, PositionSide, SymbolInfo,
};

/// 거래소 커넥터 공통 인터페이스.
///
/// 커넥터 인스턴스는 브로커 매니저의 레지스트리 슬롯이 단독 소유하며,
/// 모든 작업은 내부 가변성을 통해 `&self`로 수행됩니다.
#[async_trait]
pub trait Broker: Send + Sync {
    /// 브로커 이름 (레지스트리 키와 동일, 소문자).
    fn name(&self) -> &str;

    // === 수명 주기 ===

    /// 자격증명으로 커넥터를 초기화합니다.
    ///
    /// 자격증명이 불완전하면 `InvalidCredentials`로 실패합니다. 이후 거래소에 한 번
    /// 프로브 요청을 보내고, 실패하면 연결되지 않은 상태를 유지한 채 연결 에러를 반환합니다.
    async fn initialize(&self, credentials: &Credentials) -> BrokerResult<()>;

    /// 연결 상태를 확인합니다.
    async fn test_connection(&self) -> BrokerResult<()>;

    /// 연결 여부.
    fn is_connected(&self) -> bool;

    /// 연결을 닫습니다. 이후 작업은 `NotConnected`로 실패합니다.
    fn close(&self) -> BrokerResult<()>;

    // === 계좌 ===

    /// 계좌 스냅샷 조회.
    async fn get_account_info(&self) -> BrokerResult<AccountInfo>;

    /// 특정 자산의 잔고 조회.
    async fn get_balance(&self, asset: &str) -> BrokerResult<Balance>;

    // === 포지션 ===

    /// 크기가 0이 아닌 모든 포지션 조회.
    async fn get_positions(&self) -> BrokerResult<Vec<Position>>;

    /// 심볼의 포지션 조회. 없으면 `PositionNotFound`.
    async fn get_position(&self, symbol: &str) -> BrokerResult<Position>;

    /// 심볼 레버리지 설정.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BrokerResult<()>;

    /// 심볼 마진 유형 설정.
    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> BrokerResult<()>;

    // === 주문 ===

    /// 주문 제출.
    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<Order>;

    /// 주문 조회.
    async fn get_order(&self, symbol: &str, order_id: &str) -> BrokerResult<Order>;

    /// 주문 취소.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> BrokerResult<()>;

    /// 미체결 주문 조회. 심볼이 없으면 전체.
    async fn get_open_orders(&self, symbol: Option<&str>) -> BrokerResult<Vec<Order>>;

    /// 주문 이력 조회.
    async fn get_order_history(&self, symbol: &str, limit: Option<u32>) -> BrokerResult<Vec<Order>>;

    // === 시장 메타데이터 ===

    /// 심볼 정보 조회. 알 수 없는 심볼은 `InvalidSymbol`.
    async fn get_symbol_info(&self, symbol: &str) -> BrokerResult<SymbolInfo>;

    /// 거래 가능한 전체 심볼 정보 조회.
    async fn get_exchange_info(&self) -> BrokerResult<Vec<SymbolInfo>>;

    // === 확장 기능 조회 ===

    /// 선물 포지션 관리 기능을 지원하면 `Some`을 반환합니다.
    fn as_futures(&self) -> Option<&dyn FuturesBroker> {
        None
    }
}

/// 선물 전용 포지션 관리 확장.
#[async_trait]
pub trait FuturesBroker: Broker {
    /// 심볼 포지션을 시장가 reduce-only 주문으로 청산합니다.
    async fn close_position(&self, symbol: &str, position_side: PositionSide) -> BrokerResult<()>;

    /// 모든 포지션을 청산합니다. 개별 실패는 모아서 반환합니다.
    async fn close_all_positions(&self) -> BrokerResult<()>;

    /// 포지션 모드 설정.
    async fn set_position_mode(&self, mode: PositionMode) -> BrokerResult<()>;

    /// 현재 포지션 모드 조회.
    async fn get_position_mode(&self) -> BrokerResult<PositionMode>;
}

/// 선물 확장을 요구합니다. 없으면 [`BrokerError::Unsupported`].
pub fn require_futures(broker: &dyn Broker) -> BrokerResult<&dyn FuturesBroker> {
    broker
        .as_futures()
        .ok_or_else(|| BrokerError::Unsupported(format!("{}: 선물 포지션 관리", broker.name())))
}
