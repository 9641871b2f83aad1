//! 통합 테스트용 목 브로커.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use trader_broker::{Broker, BrokerRegistry, FuturesBroker};
use trader_core::{
    codes, AccountInfo, Balance, BrokerError, BrokerResult, Credentials, MarginType, Order,
    OrderRequest, OrderStatus, Position, PositionMode, PositionSide, Side, SymbolInfo,
    TradingSignal,
};

/// 초기화 프로브를 실패시키는 API 키.
pub const UNREACHABLE_KEY: &str = "unreachable";

/// 메모리 내 포지션을 갖는 목 브로커.
pub struct MockBroker {
    name: String,
    futures: bool,
    connected: AtomicBool,
    positions: Mutex<HashMap<String, Decimal>>,
    placed: Mutex<Vec<OrderRequest>>,
    order_failures: Mutex<VecDeque<BrokerError>>,
    fail_leverage: AtomicBool,
    fail_close: AtomicBool,
    leverage_calls: AtomicU32,
    order_seq: AtomicU64,
    position_mode: Mutex<PositionMode>,
}

impl MockBroker {
    /// 연결되지 않은 목 브로커.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            futures: true,
            connected: AtomicBool::new(false),
            positions: Mutex::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            order_failures: Mutex::new(VecDeque::new()),
            fail_leverage: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            leverage_calls: AtomicU32::new(0),
            order_seq: AtomicU64::new(1),
            position_mode: Mutex::new(PositionMode::OneWay),
        }
    }

    /// 연결된 목 브로커.
    pub fn connected(name: &str) -> Self {
        let broker = Self::new(name);
        broker.connected.store(true, Ordering::SeqCst);
        broker
    }

    /// 선물 확장 지원 여부.
    pub fn with_futures(mut self, futures: bool) -> Self {
        self.futures = futures;
        self
    }

    /// 초기 포지션 설정.
    pub fn with_position(self, symbol: &str, size: Decimal) -> Self {
        self.positions.lock().unwrap().insert(symbol.to_string(), size);
        self
    }

    /// 다음 주문 제출들을 순서대로 실패시킵니다.
    pub fn fail_next_orders(&self, errors: Vec<BrokerError>) {
        self.order_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_leverage(&self) {
        self.fail_leverage.store(true, Ordering::SeqCst);
    }

    /// close() 호출 시 연결은 끊되 에러를 반환.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn leverage_calls(&self) -> u32 {
        self.leverage_calls.load(Ordering::SeqCst)
    }

    pub fn position_size(&self, symbol: &str) -> Decimal {
        self.positions
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    fn ensure_connected(&self) -> BrokerResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn to_position(symbol: &str, size: Decimal) -> Position {
        position(symbol, size)
    }
}

/// 매니저에 넣을 수 있는 형태로 변환합니다.
pub fn as_dyn(broker: &Arc<MockBroker>) -> Option<Arc<dyn Broker>> {
    Some(broker.clone())
}

/// 테스트용 포지션 생성.
pub fn position(symbol: &str, size: Decimal) -> Position {
    Position {
        symbol: symbol.to_string(),
        position_side: PositionSide::Both,
        size,
        entry_price: Decimal::from(40000),
        mark_price: Decimal::from(40000),
        unrealized_pnl: Decimal::ZERO,
        leverage: 10,
        margin_type: MarginType::Cross,
        isolated_margin: Decimal::ZERO,
        maintenance_margin: Decimal::ZERO,
        initial_margin: Decimal::ZERO,
        updated_at: Utc::now(),
    }
}

/// 테스트용 시그널 생성.
pub fn signal(exchange: &str, symbol: &str, previous: &str, target: &str) -> TradingSignal {
    TradingSignal {
        symbol: symbol.to_string(),
        exchange: exchange.to_string(),
        action: "buy".to_string(),
        market_position_size: target.to_string(),
        prev_market_position_size: previous.to_string(),
        order_type: "market".to_string(),
        ..Default::default()
    }
}

/// 주어진 이름들로 목 커넥터를 등록한 레지스트리.
pub fn mock_registry(names: &[&str]) -> BrokerRegistry {
    let mut registry = BrokerRegistry::new();
    for name in names {
        let owned = name.to_string();
        registry.register(name, move |_| Ok(Arc::new(MockBroker::new(&owned))));
    }
    registry
}

/// 생성된 목 브로커를 테스트에서 들여다볼 수 있는 레지스트리.
pub fn capturing_registry(name: &str) -> (BrokerRegistry, Arc<Mutex<Option<Arc<MockBroker>>>>) {
    let created = Arc::new(Mutex::new(None));
    let slot = created.clone();
    let owned = name.to_string();
    let mut registry = BrokerRegistry::new();
    registry.register(name, move |_| {
        let broker = Arc::new(MockBroker::new(&owned));
        *slot.lock().unwrap() = Some(broker.clone());
        Ok(broker as Arc<dyn Broker>)
    });
    (registry, created)
}

#[async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, credentials: &Credentials) -> BrokerResult<()> {
        credentials.validate()?;
        if credentials.api_key == UNREACHABLE_KEY {
            return Err(BrokerError::wrap(
                self.name.as_str(),
                codes::CONNECTION_FAILED,
                "프로브 실패",
                BrokerError::NetworkError("connection refused".to_string()),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn test_connection(&self) -> BrokerResult<()> {
        self.ensure_connected()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> BrokerResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(BrokerError::NetworkError(format!("{} 세션 종료 실패", self.name)));
        }
        Ok(())
    }

    async fn get_account_info(&self) -> BrokerResult<AccountInfo> {
        self.ensure_connected()?;
        Ok(AccountInfo {
            total_wallet_balance: Decimal::from(1000),
            total_unrealized_pnl: Decimal::ZERO,
            total_margin_balance: Decimal::from(1000),
            total_position_initial_margin: Decimal::ZERO,
            total_open_order_initial_margin: Decimal::ZERO,
            available_balance: Decimal::from(1000),
            max_withdraw_amount: Decimal::from(1000),
            assets: Vec::new(),
            positions: self.get_positions().await?,
            can_trade: true,
            can_withdraw: true,
            fee_tier: 0,
            updated_at: Utc::now(),
        })
    }

    async fn get_balance(&self, asset: &str) -> BrokerResult<Balance> {
        self.ensure_connected()?;
        Err(BrokerError::exchange(self.name.as_str(), codes::ASSET_NOT_FOUND, asset))
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        self.ensure_connected()?;
        let mut positions: Vec<Position> = self
            .positions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, size)| !size.is_zero())
            .map(|(symbol, size)| Self::to_position(symbol, *size))
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn get_position(&self, symbol: &str) -> BrokerResult<Position> {
        self.get_positions()
            .await?
            .into_iter()
            .find(|p| p.symbol == symbol)
            .ok_or(BrokerError::PositionNotFound)
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> BrokerResult<()> {
        self.ensure_connected()?;
        self.leverage_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_leverage.load(Ordering::SeqCst) {
            return Err(BrokerError::InvalidLeverage(leverage.to_string()));
        }
        Ok(())
    }

    async fn set_margin_type(&self, _symbol: &str, _margin_type: MarginType) -> BrokerResult<()> {
        self.ensure_connected()
    }

    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<Order> {
        self.ensure_connected()?;
        request.validate()?;

        if let Some(err) = self.order_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        self.placed.lock().unwrap().push(request.clone());

        let delta = match request.side {
            Side::Buy => request.quantity,
            Side::Sell => -request.quantity,
        };
        *self
            .positions
            .lock()
            .unwrap()
            .entry(request.symbol.clone())
            .or_default() += delta;

        let now = Utc::now();
        Ok(Order {
            id: self.order_seq.fetch_add(1, Ordering::SeqCst).to_string(),
            client_order_id: String::new(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price.unwrap_or_default(),
            executed_quantity: request.quantity,
            cumulative_quote: Decimal::ZERO,
            status: OrderStatus::Filled,
            time_in_force: request.time_in_force,
            position_side: request.position_side.unwrap_or(PositionSide::Both),
            reduce_only: request.reduce_only,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_order(&self, _symbol: &str, _order_id: &str) -> BrokerResult<Order> {
        self.ensure_connected()?;
        Err(BrokerError::OrderNotFound)
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: &str) -> BrokerResult<()> {
        self.ensure_connected()?;
        Err(BrokerError::OrderNotFound)
    }

    async fn get_open_orders(&self, _symbol: Option<&str>) -> BrokerResult<Vec<Order>> {
        self.ensure_connected()?;
        Ok(Vec::new())
    }

    async fn get_order_history(&self, _symbol: &str, _limit: Option<u32>) -> BrokerResult<Vec<Order>> {
        self.ensure_connected()?;
        Ok(Vec::new())
    }

    async fn get_symbol_info(&self, symbol: &str) -> BrokerResult<SymbolInfo> {
        self.ensure_connected()?;
        Err(BrokerError::InvalidSymbol(symbol.to_string()))
    }

    async fn get_exchange_info(&self) -> BrokerResult<Vec<SymbolInfo>> {
        self.ensure_connected()?;
        Ok(Vec::new())
    }

    fn as_futures(&self) -> Option<&dyn FuturesBroker> {
        if self.futures {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl FuturesBroker for MockBroker {
    async fn close_position(&self, symbol: &str, position_side: PositionSide) -> BrokerResult<()> {
        let size = self.get_position(symbol).await?.size;
        let side = if size.is_sign_positive() { Side::Sell } else { Side::Buy };
        let request = OrderRequest::market(symbol, side, size.abs())
            .with_position_side(position_side)
            .with_reduce_only(true);
        self.place_order(&request).await.map(|_| ())
    }

    async fn close_all_positions(&self) -> BrokerResult<()> {
        for position in self.get_positions().await? {
            self.close_position(&position.symbol, position.position_side)
                .await?;
        }
        Ok(())
    }

    async fn set_position_mode(&self, mode: PositionMode) -> BrokerResult<()> {
        self.ensure_connected()?;
        *self.position_mode.lock().unwrap() = mode;
        Ok(())
    }

    async fn get_position_mode(&self) -> BrokerResult<PositionMode> {
        self.ensure_connected()?;
        Ok(*self.position_mode.lock().unwrap())
    }
}
