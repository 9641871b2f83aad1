//! Binance 선물 브로커 커넥터.
//!
//! [`BinanceFuturesClient`]를 감싸 [`Broker`]와 [`FuturesBroker`] 계약을 구현합니다.
//! 모든 거래소 실패는 `[binance] CODE: message` 형태의 브로커 범위 에러로 감싸며,
//! 원인 센티널은 체인에 보존됩니다.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use trader_core::{
    codes, is_valid_leverage, AccountInfo, Balance, BrokerError, BrokerResult, Credentials,
    MarginType, Order, OrderRequest, OrderType, Position, PositionMode, PositionSide, Side,
    SymbolInfo, TimeInForce,
};

use super::client::{BinanceConfig, BinanceFuturesClient};
use super::NAME;
use crate::registry::ConnectorOptions;
use crate::retry::{with_deadline, CONNECT_TIMEOUT};
use crate::traits::{Broker, FuturesBroker};

/// Binance USDⓈ-M 선물 커넥터.
///
/// `initialize` 성공 시 클라이언트가 게시되고, `close` 시 제거됩니다.
/// 클라이언트가 없으면 모든 작업이 `NotConnected`로 실패합니다.
#[derive(Debug)]
pub struct BinanceBroker {
    options: ConnectorOptions,
    client: RwLock<Option<Arc<BinanceFuturesClient>>>,
}

impl BinanceBroker {
    /// 연결되지 않은 커넥터를 생성합니다.
    pub fn new(options: ConnectorOptions) -> Self {
        Self {
            options,
            client: RwLock::new(None),
        }
    }

    /// 커넥터 생성 옵션.
    pub fn options(&self) -> &ConnectorOptions {
        &self.options
    }

    fn client(&self) -> BrokerResult<Arc<BinanceFuturesClient>> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BrokerError::NotConnected)
    }

    fn set_client(&self, client: Option<Arc<BinanceFuturesClient>>) {
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
    }

    fn parse_order_id(order_id: &str) -> BrokerResult<i64> {
        order_id.parse::<i64>().map_err(|_| {
            BrokerError::exchange(
                NAME,
                codes::INVALID_ORDER_ID,
                format!("잘못된 주문 ID: {}", order_id),
            )
        })
    }

    /// 주문 요청을 Binance 파라미터로 변환합니다.
    ///
    /// 헤지 모드(LONG/SHORT)에서는 `reduceOnly`를 받지 않으므로
    /// 포지션 방향이 없거나 BOTH일 때만 전송합니다.
    fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", request.symbol.clone()),
            ("side", request.side.to_string()),
            ("type", request.order_type.to_string()),
            ("quantity", request.quantity.normalize().to_string()),
        ];

        if let Some(position_side) = request.position_side {
            params.push(("positionSide", position_side.to_string()));
        }

        if request.order_type == OrderType::Limit {
            if let Some(price) = request.price {
                params.push(("price", price.normalize().to_string()));
            }
            let tif = request.time_in_force.unwrap_or(TimeInForce::Gtc);
            params.push(("timeInForce", tif.to_string()));
        }

        let one_way = matches!(request.position_side, None | Some(PositionSide::Both));
        if request.reduce_only && one_way {
            params.push(("reduceOnly", "true".to_string()));
        }

        params
    }

    fn convert_orders(orders: Vec<super::models::OrderResponse>) -> Vec<Order> {
        orders
            .into_iter()
            .filter_map(|resp| {
                let order_id = resp.order_id;
                match resp.into_order() {
                    Ok(order) => Some(order),
                    Err(e) => {
                        debug!(order_id, error = %e, "변환할 수 없는 주문 건너뜀");
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl Broker for BinanceBroker {
    fn name(&self) -> &str {
        NAME
    }

    async fn initialize(&self, credentials: &Credentials) -> BrokerResult<()> {
        // 재초기화 실패 시 이전 클라이언트가 남지 않도록 먼저 해제
        self.set_client(None);

        credentials.validate().map_err(|e| {
            BrokerError::wrap(NAME, codes::INVALID_CREDENTIALS, "API 키와 시크릿 키가 필요합니다", e)
        })?;

        info!(
            broker = NAME,
            testnet = self.options.testnet,
            "Binance 선물 연결 중"
        );

        let config = BinanceConfig::from_options(credentials, &self.options);
        let client = BinanceFuturesClient::new(config)?;

        with_deadline(CONNECT_TIMEOUT, client.server_time())
            .await
            .map_err(|e| {
                BrokerError::wrap(NAME, codes::CONNECTION_FAILED, "Binance 연결 실패", e)
            })?;

        self.set_client(Some(Arc::new(client)));
        info!(broker = NAME, "Binance 선물 연결 완료");
        Ok(())
    }

    async fn test_connection(&self) -> BrokerResult<()> {
        let client = self.client()?;
        with_deadline(CONNECT_TIMEOUT, client.server_time())
            .await
            .map_err(|e| BrokerError::wrap(NAME, codes::CONNECTION_FAILED, "Binance 연결 실패", e))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn close(&self) -> BrokerResult<()> {
        self.set_client(None);
        info!(broker = NAME, "Binance 연결 종료");
        Ok(())
    }

    async fn get_account_info(&self) -> BrokerResult<AccountInfo> {
        let client = self.client()?;
        let account = client.account().await.map_err(|e| {
            BrokerError::wrap(NAME, codes::ACCOUNT_INFO_FAILED, "계좌 정보 조회 실패", e)
        })?;
        Ok(account.into_account_info())
    }

    async fn get_balance(&self, asset: &str) -> BrokerResult<Balance> {
        let account = self.get_account_info().await?;
        account
            .assets
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .ok_or_else(|| {
                BrokerError::exchange(
                    NAME,
                    codes::ASSET_NOT_FOUND,
                    format!("자산을 찾을 수 없음: {}", asset),
                )
            })
    }

    async fn get_positions(&self) -> BrokerResult<Vec<Position>> {
        let client = self.client()?;
        let risks = client.position_risk(None).await.map_err(|e| {
            BrokerError::wrap(NAME, codes::POSITIONS_FAILED, "포지션 조회 실패", e)
        })?;

        Ok(risks
            .iter()
            .filter(|r| r.is_open())
            .map(|r| r.to_position())
            .collect())
    }

    async fn get_position(&self, symbol: &str) -> BrokerResult<Position> {
        self.get_positions()
            .await?
            .into_iter()
            .find(|p| p.symbol == symbol)
            .ok_or(BrokerError::PositionNotFound)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BrokerResult<()> {
        let client = self.client()?;
        if !is_valid_leverage(leverage) {
            return Err(BrokerError::InvalidLeverage(leverage.to_string()));
        }

        let resp = client.change_leverage(symbol, leverage).await.map_err(|e| {
            BrokerError::wrap(NAME, codes::LEVERAGE_FAILED, "레버리지 설정 실패", e)
        })?;
        info!(symbol, leverage = resp.leverage, "레버리지 설정 완료");
        Ok(())
    }

    async fn set_margin_type(&self, symbol: &str, margin_type: MarginType) -> BrokerResult<()> {
        let client = self.client()?;
        client
            .change_margin_type(symbol, &margin_type.to_string())
            .await
            .map_err(|e| {
                BrokerError::wrap(NAME, codes::MARGIN_TYPE_FAILED, "마진 유형 설정 실패", e)
            })?;
        info!(symbol, margin_type = %margin_type, "마진 유형 설정 완료");
        Ok(())
    }

    async fn place_order(&self, request: &OrderRequest) -> BrokerResult<Order> {
        let client = self.client()?;
        request.validate()?;

        let params = Self::order_params(request);
        info!(
            symbol = %request.symbol,
            side = %request.side,
            order_type = %request.order_type,
            quantity = %request.quantity,
            price = ?request.price,
            reduce_only = request.reduce_only,
            "주문 제출"
        );

        let resp = client
            .new_order(&params)
            .await
            .map_err(|e| BrokerError::wrap(NAME, codes::ORDER_FAILED, "주문 실패", e))?;

        let order = resp.into_order()?;
        info!(order_id = %order.id, status = ?order.status, "주문 접수 완료");
        Ok(order)
    }

    async fn get_order(&self, symbol: &str, order_id: &str) -> BrokerResult<Order> {
        let client = self.client()?;
        let id = Self::parse_order_id(order_id)?;

        client
            .query_order(symbol, id)
            .await
            .map_err(|e| BrokerError::wrap(NAME, codes::ORDER_NOT_FOUND, "주문 조회 실패", e))?
            .into_order()
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> BrokerResult<()> {
        let client = self.client()?;
        let id = Self::parse_order_id(order_id)?;

        client
            .cancel_order(symbol, id)
            .await
            .map_err(|e| BrokerError::wrap(NAME, codes::CANCEL_FAILED, "주문 취소 실패", e))?;
        info!(symbol, order_id, "주문 취소 완료");
        Ok(())
    }

    async fn get_open_orders(&self, symbol: Option<&str>) -> BrokerResult<Vec<Order>> {
        let client = self.client()?;
        let orders = client.open_orders(symbol).await.map_err(|e| {
            BrokerError::wrap(NAME, codes::OPEN_ORDERS_FAILED, "미체결 주문 조회 실패", e)
        })?;
        Ok(Self::convert_orders(orders))
    }

    async fn get_order_history(&self, symbol: &str, limit: Option<u32>) -> BrokerResult<Vec<Order>> {
        let client = self.client()?;
        let orders = client.all_orders(symbol, limit).await.map_err(|e| {
            BrokerError::wrap(NAME, codes::ORDER_HISTORY_FAILED, "주문 이력 조회 실패", e)
        })?;
        Ok(Self::convert_orders(orders))
    }

    async fn get_symbol_info(&self, symbol: &str) -> BrokerResult<SymbolInfo> {
        self.get_exchange_info()
            .await?
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BrokerError::InvalidSymbol(symbol.to_string()))
    }

    async fn get_exchange_info(&self) -> BrokerResult<Vec<SymbolInfo>> {
        let client = self.client()?;
        let info = client.exchange_info().await.map_err(|e| {
            BrokerError::wrap(NAME, codes::EXCHANGE_INFO_FAILED, "거래소 정보 조회 실패", e)
        })?;
        Ok(info.symbols.iter().map(|s| s.to_symbol_info()).collect())
    }

    fn as_futures(&self) -> Option<&dyn FuturesBroker> {
        Some(self)
    }
}

#[async_trait]
impl FuturesBroker for BinanceBroker {
    async fn close_position(&self, symbol: &str, position_side: PositionSide) -> BrokerResult<()> {
        self.client()?;

        let positions = self
            .get_positions()
            .await
            .map_err(|e| e.context(format!("{} 포지션 조회 실패", symbol)))?;

        // 헤지 모드에서는 같은 심볼에 LONG/SHORT 두 레그가 있을 수 있음
        let Some(position) = positions.into_iter().find(|p| {
            p.symbol == symbol
                && (position_side == PositionSide::Both || p.position_side == position_side)
        }) else {
            debug!(symbol, position_side = %position_side, "청산할 포지션 없음");
            return Ok(());
        };

        if position.size.is_zero() {
            return Ok(());
        }

        let side = if position.size.is_sign_positive() {
            Side::Sell
        } else {
            Side::Buy
        };
        let request = OrderRequest::market(symbol, side, position.size.abs())
            .with_position_side(position.position_side)
            .with_reduce_only(true);

        self.place_order(&request).await.map_err(|e| {
            BrokerError::wrap(NAME, codes::CLOSE_POSITION_FAILED, "포지션 청산 실패", e)
        })?;
        info!(symbol, side = %side, size = %position.size, "포지션 청산 주문 완료");
        Ok(())
    }

    async fn close_all_positions(&self) -> BrokerResult<()> {
        let positions = self
            .get_positions()
            .await
            .map_err(|e| e.context("포지션 목록 조회 실패"))?;

        let mut errors = Vec::new();
        for position in positions {
            if let Err(e) = self
                .close_position(&position.symbol, position.position_side)
                .await
            {
                warn!(symbol = %position.symbol, error = %e, "포지션 청산 실패");
                errors.push(e.context(format!("{} 청산 실패", position.symbol)));
            }
        }

        match BrokerError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_position_mode(&self, mode: PositionMode) -> BrokerResult<()> {
        let client = self.client()?;
        client
            .change_position_mode(mode.is_dual_side())
            .await
            .map_err(|e| {
                BrokerError::wrap(NAME, codes::POSITION_MODE_FAILED, "포지션 모드 설정 실패", e)
            })?;
        info!(mode = ?mode, "포지션 모드 설정 완료");
        Ok(())
    }

    async fn get_position_mode(&self) -> BrokerResult<PositionMode> {
        let client = self.client()?;
        let dual_side = client.position_mode().await.map_err(|e| {
            BrokerError::wrap(
                NAME,
                codes::GET_POSITION_MODE_FAILED,
                "포지션 모드 조회 실패",
                e,
            )
        })?;
        Ok(PositionMode::from_dual_side(dual_side))
    }
}
