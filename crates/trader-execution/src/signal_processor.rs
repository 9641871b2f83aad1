//! 트레이딩 시그널 처리기.
//!
//! 목표 포지션 크기 기반 시그널을 주문으로 변환해 브로커에 제출합니다.
//!
//! 시그널 하나의 처리 흐름:
//!
//! ```text
//! Received → Validated → (LeverageApplied) → OrderComputed → Submitted → {Filled | PartiallyFilled | Rejected | Canceled | Expired}
//!                                                  └→ Skipped (포지션 변화 없음)
//! ```
//!
//! - 검증은 네트워크 호출 없이 먼저 수행됩니다.
//! - 레버리지 설정 실패는 경고만 남기고 주문을 계속 진행합니다.
//! - 주문 제출은 일시적 실패에 한해 한 번 재시도합니다 (최대 2회 시도).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use trader_broker::{retry_with_backoff, with_deadline, Broker, RetryConfig, REQUEST_TIMEOUT};
use trader_core::{
    calculate_order_quantity, derive_position_side, format_quantity, format_symbol, is_reduce_only,
    parse_price, position_drift, BrokerError, BrokerResult, ErrorKind, Order, OrderRequest,
    OrderStatus, Position, TimeInForce, TradingSignal, POSITION_DRIFT_TOLERANCE,
    QUANTITY_PRECISION,
};

use crate::manager::BrokerManager;

/// 시그널 처리기 설정.
#[derive(Debug, Clone)]
pub struct SignalProcessorConfig {
    /// 일괄 처리 시 동시 처리 상한
    pub max_concurrency: usize,
    /// 주문 제출 재시도 설정
    pub order_retry: RetryConfig,
    /// 주문 제출 시도당 데드라인
    pub order_timeout: Duration,
    /// 제출 전 이전 포지션 크기를 실제 포지션과 대조할지 여부
    pub verify_previous_position: bool,
    /// 포지션 불일치 경고 허용 오차
    pub position_tolerance: Decimal,
}

impl Default for SignalProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            order_retry: RetryConfig::order_submission(),
            order_timeout: REQUEST_TIMEOUT,
            verify_previous_position: false,
            position_tolerance: POSITION_DRIFT_TOLERANCE,
        }
    }
}

/// 시그널 처리 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Received,
    Validated,
    LeverageApplied,
    OrderComputed,
    Submitted,
    Filled,
    PartiallyFilled,
    Rejected,
    Canceled,
    Expired,
    /// 포지션 변화가 없어 주문하지 않음
    Skipped,
}

impl SignalState {
    /// 제출된 주문의 상태로부터 시그널 상태를 결정합니다.
    pub fn from_order_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::New | OrderStatus::PendingCancel => SignalState::Submitted,
            OrderStatus::PartiallyFilled => SignalState::PartiallyFilled,
            OrderStatus::Filled => SignalState::Filled,
            OrderStatus::Canceled => SignalState::Canceled,
            OrderStatus::Rejected => SignalState::Rejected,
            OrderStatus::Expired => SignalState::Expired,
        }
    }

    /// 더 이상 진행하지 않는 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalState::Filled
                | SignalState::Rejected
                | SignalState::Canceled
                | SignalState::Expired
                | SignalState::Skipped
        )
    }
}

/// 시그널 하나의 처리 결과.
#[derive(Debug, Clone)]
pub enum SignalOutcome {
    /// 포지션 변화가 없어 건너뜀 (네트워크 주문 없음)
    Skipped,
    /// 주문 제출됨
    Submitted {
        request: OrderRequest,
        order: Order,
    },
}

impl SignalOutcome {
    /// 결과에 해당하는 시그널 상태.
    pub fn state(&self) -> SignalState {
        match self {
            SignalOutcome::Skipped => SignalState::Skipped,
            SignalOutcome::Submitted { order, .. } => SignalState::from_order_status(order.status),
        }
    }

    /// 제출된 주문.
    pub fn order(&self) -> Option<&Order> {
        match self {
            SignalOutcome::Skipped => None,
            SignalOutcome::Submitted { order, .. } => Some(order),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SignalOutcome::Skipped)
    }
}

/// 시그널을 주문 요청으로 변환합니다. 네트워크 호출이 없는 순수 함수입니다.
///
/// 포지션 변화가 없으면 `Ok(None)`을 반환합니다.
/// - 수량은 소수점 8자리로 고정
/// - `order_type == "limit"`이고 가격이 있을 때만 지정가
/// - 유효 기간은 GTC
/// - 포지션 방향과 reduce-only는 이전/목표 크기로 결정
pub fn calculate_order(signal: &TradingSignal) -> BrokerResult<Option<OrderRequest>> {
    let previous = signal.previous_size()?;
    let target = signal.target_size()?;

    let (quantity, side) = match calculate_order_quantity(previous, target) {
        Ok(order) => order,
        Err(BrokerError::NoPositionChange) => return Ok(None),
        Err(e) => return Err(e),
    };

    let symbol = format_symbol(&signal.symbol, &signal.exchange_key());
    let quantity = format_quantity(quantity, QUANTITY_PRECISION);

    let request = if signal.is_limit_order() {
        let price = parse_price(&signal.price)?;
        OrderRequest::limit(symbol, side, quantity, price)
    } else {
        OrderRequest::market(symbol, side, quantity)
    };

    Ok(Some(
        request
            .with_position_side(derive_position_side(target))
            .with_time_in_force(TimeInForce::Gtc)
            .with_reduce_only(is_reduce_only(previous, target)),
    ))
}

/// 시그널 처리기.
///
/// 복제 비용이 작아 일괄 처리 시 작업마다 복제해 사용합니다.
#[derive(Debug, Clone)]
pub struct SignalProcessor {
    manager: Arc<BrokerManager>,
    config: SignalProcessorConfig,
    cancel: CancellationToken,
}

impl SignalProcessor {
    /// 기본 설정으로 처리기를 생성합니다.
    pub fn new(manager: Arc<BrokerManager>) -> Self {
        Self::with_config(manager, SignalProcessorConfig::default())
    }

    /// 설정을 지정해 처리기를 생성합니다.
    pub fn with_config(manager: Arc<BrokerManager>, config: SignalProcessorConfig) -> Self {
        Self {
            manager,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// 재시도 대기를 중단할 취소 토큰을 지정합니다.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 처리기 설정.
    pub fn config(&self) -> &SignalProcessorConfig {
        &self.config
    }

    /// 시그널 하나를 처리합니다.
    pub async fn process_signal(&self, signal: &TradingSignal) -> BrokerResult<SignalOutcome> {
        let span = trader_core::signal_span!(
            "process_signal",
            signal.exchange,
            signal.symbol,
            signal.action
        );
        self.process_signal_inner(signal).instrument(span).await
    }

    async fn process_signal_inner(&self, signal: &TradingSignal) -> BrokerResult<SignalOutcome> {
        info!("시그널 처리 시작");

        signal
            .validate()
            .map_err(|e| e.context("시그널 검증 실패"))?;

        let exchange = signal.exchange_key();
        let broker = self
            .manager
            .get_broker(&exchange)
            .await
            .map_err(|e| e.context(format!("브로커 {} 조회 실패", signal.exchange)))?;

        if !broker.is_connected() {
            return Err(BrokerError::NotConnected.context(format!("브로커 {} 연결되지 않음", signal.exchange)));
        }

        if signal.leverage > 0 {
            self.apply_leverage(broker.as_ref(), signal).await;
        }

        let request = match calculate_order(signal).map_err(|e| e.context("주문 계산 실패"))? {
            Some(request) => request,
            None => {
                info!("포지션 변화 없음, 주문 생략");
                return Ok(SignalOutcome::Skipped);
            }
        };

        if self.config.verify_previous_position {
            self.verify_previous_position(broker.as_ref(), signal, &request.symbol)
                .await;
        }

        let order = retry_with_backoff(&self.config.order_retry, &self.cancel, || {
            with_deadline(self.config.order_timeout, broker.place_order(&request))
        })
        .await
        .map_err(|e| e.context("주문 제출 실패"))?;

        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            status = ?order.status,
            "주문 제출 완료"
        );

        Ok(SignalOutcome::Submitted { request, order })
    }

    /// 레버리지를 설정합니다. 실패해도 시그널 처리는 계속합니다.
    async fn apply_leverage(&self, broker: &dyn Broker, signal: &TradingSignal) {
        let symbol = format_symbol(&signal.symbol, &signal.exchange_key());

        match with_deadline(REQUEST_TIMEOUT, broker.set_leverage(&symbol, signal.leverage)).await {
            Ok(()) => debug!(leverage = signal.leverage, "레버리지 설정 완료"),
            Err(e) => warn!(leverage = signal.leverage, error = %e, "레버리지 설정 실패, 주문은 계속 진행"),
        }
    }

    /// 시그널의 이전 포지션 크기를 실제 포지션과 대조합니다 (경고만).
    async fn verify_previous_position(&self, broker: &dyn Broker, signal: &TradingSignal, symbol: &str) {
        let Ok(previous) = signal.previous_size() else {
            return;
        };

        let actual = match with_deadline(REQUEST_TIMEOUT, broker.get_position(symbol)).await {
            Ok(position) => position.size,
            Err(e) if e.is(ErrorKind::PositionNotFound) => Decimal::ZERO,
            Err(e) => {
                warn!(error = %e, "이전 포지션 확인 실패");
                return;
            }
        };

        if let Some(drift) = position_drift(previous, actual, self.config.position_tolerance) {
            warn!(
                %previous,
                %actual,
                %drift,
                "시그널의 이전 포지션 크기가 실제 포지션과 다름"
            );
        }
    }

    /// 여러 시그널을 동시에 처리합니다.
    ///
    /// 동시 처리 수는 `max_concurrency`로 제한되며, 결과는 입력 순서를 따릅니다.
    pub async fn process_signals(&self, signals: Vec<TradingSignal>) -> Vec<BrokerResult<SignalOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let handles: Vec<_> = signals
            .into_iter()
            .map(|signal| {
                let processor = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| BrokerError::Cancelled)?;
                    processor.process_signal(&signal).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(BrokerError::Cancelled),
                Err(e) => Err(BrokerError::ApiError(format!("시그널 작업 실패: {}", e))),
            })
            .collect()
    }

    /// 심볼 → 거래소 → 포지션 요약.
    pub async fn position_summary(&self) -> HashMap<String, HashMap<String, Position>> {
        let mut summary: HashMap<String, HashMap<String, Position>> = HashMap::new();

        for (exchange, positions) in self.manager.get_all_positions().await {
            for position in positions {
                summary
                    .entry(position.symbol.clone())
                    .or_default()
                    .insert(exchange.clone(), position);
            }
        }

        summary
    }

    /// 모든 브로커의 `symbol` 포지션을 목표 포지션에 맞춥니다.
    ///
    /// 변화가 필요 없는 브로커는 건너뛰고, 실패한 브로커만 결과에 포함됩니다.
    pub async fn sync_positions(&self, symbol: &str, target: &Position) -> HashMap<String, BrokerError> {
        let mut errors = HashMap::new();

        let mut brokers: Vec<_> = self.manager.get_brokers().await.into_iter().collect();
        brokers.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, broker) in brokers {
            if let Err(e) = self.sync_broker_position(broker.as_ref(), symbol, target).await {
                warn!(broker = %name, symbol, error = %e, "포지션 동기화 실패");
                errors.insert(name, e);
            }
        }

        errors
    }

    async fn sync_broker_position(&self, broker: &dyn Broker, symbol: &str, target: &Position) -> BrokerResult<()> {
        if !broker.is_connected() {
            return Err(BrokerError::NotConnected.context(format!("브로커 {} 연결되지 않음", broker.name())));
        }

        let current = match with_deadline(REQUEST_TIMEOUT, broker.get_position(symbol)).await {
            Ok(position) => position.size,
            Err(e) if e.is(ErrorKind::PositionNotFound) => Decimal::ZERO,
            Err(e) => return Err(e.context("현재 포지션 조회 실패")),
        };

        let (quantity, side) = match calculate_order_quantity(current, target.size) {
            Ok(order) => order,
            Err(BrokerError::NoPositionChange) => {
                debug!(broker = broker.name(), symbol, "포지션 일치, 동기화 생략");
                return Ok(());
            }
            Err(e) => return Err(e.context("동기화 주문 계산 실패")),
        };

        let request = OrderRequest::market(symbol, side, format_quantity(quantity, QUANTITY_PRECISION))
            .with_position_side(target.position_side);

        with_deadline(self.config.order_timeout, broker.place_order(&request))
            .await
            .map_err(|e| e.context("동기화 주문 실패"))?;

        info!(broker = broker.name(), symbol, side = %side, %quantity, "포지션 동기화 주문 완료");
        Ok(())
    }
}
