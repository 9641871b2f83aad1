//! Binance 커넥터 통합 테스트 (목 HTTP 서버 사용).

use mockito::{Matcher, Server, ServerGuard};
use rust_decimal_macros::dec;
use trader_broker::{default_registry, Broker, ConnectorOptions};
use trader_core::{codes, Credentials, ErrorKind, OrderRequest, OrderStatus, PositionMode, PositionSide, Side};

const SERVER_TIME: &str = r#"{"serverTime": 1700000000000}"#;

async fn connected_broker(server: &mut ServerGuard) -> std::sync::Arc<dyn Broker> {
    server
        .mock("GET", "/fapi/v1/time")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SERVER_TIME)
        .create_async()
        .await;

    let options = ConnectorOptions::default().with_base_url(server.url());
    let broker = default_registry().create("binance", &options).unwrap();
    broker
        .initialize(&Credentials::new("test-api-key", "test-secret"))
        .await
        .unwrap();
    broker
}

fn order_body(side: &str, reduce_only: bool) -> String {
    format!(
        r#"{{
            "orderId": 1001, "clientOrderId": "c1", "symbol": "BTCUSDT", "side": "{}",
            "type": "MARKET", "origQty": "0.5", "price": "0", "executedQty": "0.5",
            "cumQuote": "21000", "status": "FILLED", "timeInForce": "GTC",
            "positionSide": "BOTH", "reduceOnly": {}, "updateTime": 1700000000000
        }}"#,
        side, reduce_only
    )
}

#[tokio::test]
async fn test_initialize_connects_after_probe() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    assert!(broker.is_connected());
    assert_eq!(broker.name(), "binance");

    broker.close().unwrap();
    assert!(!broker.is_connected());
    let err = broker.get_positions().await.unwrap_err();
    assert!(err.is(ErrorKind::NotConnected));
}

#[tokio::test]
async fn test_initialize_probe_failure_stays_disconnected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/fapi/v1/time")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let options = ConnectorOptions::default().with_base_url(server.url());
    let broker = default_registry().create("binance", &options).unwrap();
    let err = broker
        .initialize(&Credentials::new("test-api-key", "test-secret"))
        .await
        .unwrap_err();

    assert!(!broker.is_connected());
    assert_eq!(err.broker_code(), Some(codes::CONNECTION_FAILED));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_reinitialize_failure_drops_previous_client() {
    let mut server = Server::new_async().await;
    let time_ok = server
        .mock("GET", "/fapi/v1/time")
        .with_status(200)
        .with_body(SERVER_TIME)
        .create_async()
        .await;

    let options = ConnectorOptions::default().with_base_url(server.url());
    let broker = default_registry().create("binance", &options).unwrap();
    let credentials = Credentials::new("test-api-key", "test-secret");
    broker.initialize(&credentials).await.unwrap();
    assert!(broker.is_connected());

    time_ok.remove_async().await;
    server
        .mock("GET", "/fapi/v1/time")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let err = broker.initialize(&credentials).await.unwrap_err();
    assert_eq!(err.broker_code(), Some(codes::CONNECTION_FAILED));
    assert!(!broker.is_connected());
    assert!(broker.get_positions().await.unwrap_err().is(ErrorKind::NotConnected));
}

#[tokio::test]
async fn test_reinitialize_with_bad_credentials_disconnects() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    let err = broker
        .initialize(&Credentials::new("test-api-key", ""))
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::InvalidCredentials));
    assert!(!broker.is_connected());
}

#[tokio::test]
async fn test_place_order_sends_reduce_only_and_maps_response() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    let mock = server
        .mock("POST", "/fapi/v1/order")
        .match_header("x-mbx-apikey", "test-api-key")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("symbol=BTCUSDT".to_string()),
            Matcher::Regex("side=SELL".to_string()),
            Matcher::Regex("type=MARKET".to_string()),
            Matcher::Regex("quantity=0.5".to_string()),
            Matcher::Regex("reduceOnly=true".to_string()),
            Matcher::Regex("signature=[0-9a-f]{64}".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(order_body("SELL", true))
        .create_async()
        .await;

    let request = OrderRequest::market("BTCUSDT", Side::Sell, dec!(0.5)).with_reduce_only(true);
    let order = broker.place_order(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.id, "1001");
    assert_eq!(order.side, Side::Sell);
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.executed_quantity, dec!(0.5));
    assert!(order.reduce_only);
}

#[tokio::test]
async fn test_order_rejection_is_classified() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("POST", "/fapi/v1/order")
        .with_status(400)
        .with_body(r#"{"code": -2019, "msg": "Margin is insufficient."}"#)
        .create_async()
        .await;

    let request = OrderRequest::market("BTCUSDT", Side::Buy, dec!(1));
    let err = broker.place_order(&request).await.unwrap_err();

    assert!(err.is(ErrorKind::InsufficientBalance));
    assert_eq!(err.broker_code(), Some(codes::ORDER_FAILED));
    assert!(!err.is_retryable());
    assert!(err.to_string().starts_with("[binance] ORDER_FAILED"));
}

#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"code": -1003, "msg": "Too many requests"}"#)
        .create_async()
        .await;

    let err = broker.get_positions().await.unwrap_err();
    assert!(err.is(ErrorKind::RateLimitExceeded));
    assert_eq!(err.broker_code(), Some(codes::POSITIONS_FAILED));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_positions_skip_flat_entries() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[
                {"symbol": "BTCUSDT", "positionAmt": "0.000", "entryPrice": "0", "markPrice": "42000",
                 "unRealizedProfit": "0", "leverage": "20", "marginType": "cross", "positionSide": "BOTH"},
                {"symbol": "ETHUSDT", "positionAmt": "-2.5", "entryPrice": "2500", "markPrice": "2400",
                 "unRealizedProfit": "250", "leverage": "10", "marginType": "isolated", "positionSide": "BOTH"}
            ]"#,
        )
        .create_async()
        .await;

    let positions = broker.get_positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, "ETHUSDT");
    assert_eq!(positions[0].size, dec!(-2.5));
    assert!(positions[0].is_short());

    let err = broker.get_position("BTCUSDT").await.unwrap_err();
    assert!(err.is(ErrorKind::PositionNotFound));
}

#[tokio::test]
async fn test_close_position_buys_back_short() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[{"symbol": "BTCUSDT", "positionAmt": "-0.5", "entryPrice": "42000", "markPrice": "42000",
                 "unRealizedProfit": "0", "leverage": "20", "marginType": "cross", "positionSide": "BOTH"}]"#,
        )
        .create_async()
        .await;

    let order_mock = server
        .mock("POST", "/fapi/v1/order")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("side=BUY".to_string()),
            Matcher::Regex("quantity=0.5".to_string()),
            Matcher::Regex("positionSide=BOTH".to_string()),
            Matcher::Regex("reduceOnly=true".to_string()),
        ]))
        .with_status(200)
        .with_body(order_body("BUY", true))
        .create_async()
        .await;

    let futures = broker.as_futures().unwrap();
    futures
        .close_position("BTCUSDT", PositionSide::Both)
        .await
        .unwrap();

    order_mock.assert_async().await;
}

#[tokio::test]
async fn test_position_mode_roundtrip() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v1/positionSide/dual")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"dualSidePosition": true}"#)
        .create_async()
        .await;

    let mode = broker.as_futures().unwrap().get_position_mode().await.unwrap();
    assert_eq!(mode, PositionMode::Hedge);
}

#[tokio::test]
async fn test_unknown_symbol_is_invalid() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_status(200)
        .with_body(
            r#"{"timezone": "UTC", "serverTime": 1700000000000, "symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
                 "orderTypes": ["LIMIT", "MARKET"], "filters": []}
            ]}"#,
        )
        .create_async()
        .await;

    let info = broker.get_symbol_info("BTCUSDT").await.unwrap();
    assert_eq!(info.base_asset, "BTC");

    let err = broker.get_symbol_info("DOGEBTC").await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidSymbol));
}

#[tokio::test]
async fn test_close_position_selects_hedge_leg() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[{"symbol": "BTCUSDT", "positionAmt": "0.3", "entryPrice": "42000", "markPrice": "42000",
                 "unRealizedProfit": "0", "leverage": "20", "marginType": "cross", "positionSide": "LONG"},
                {"symbol": "BTCUSDT", "positionAmt": "-0.5", "entryPrice": "42000", "markPrice": "42000",
                 "unRealizedProfit": "0", "leverage": "20", "marginType": "cross", "positionSide": "SHORT"}]"#,
        )
        .create_async()
        .await;

    // SHORT 레그 청산: BUY 0.5, 헤지 모드이므로 reduceOnly 없음
    let order_mock = server
        .mock("POST", "/fapi/v1/order")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("side=BUY".to_string()),
            Matcher::Regex("quantity=0.5".to_string()),
            Matcher::Regex("positionSide=SHORT".to_string()),
        ]))
        .with_status(200)
        .with_body(order_body("BUY", false))
        .expect(1)
        .create_async()
        .await;

    broker
        .as_futures()
        .unwrap()
        .close_position("BTCUSDT", PositionSide::Short)
        .await
        .unwrap();

    order_mock.assert_async().await;
}

#[tokio::test]
async fn test_close_position_missing_leg_is_noop() {
    let mut server = Server::new_async().await;
    let broker = connected_broker(&mut server).await;

    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[{"symbol": "BTCUSDT", "positionAmt": "0.3", "entryPrice": "42000", "markPrice": "42000",
                 "unRealizedProfit": "0", "leverage": "20", "marginType": "cross", "positionSide": "LONG"}]"#,
        )
        .create_async()
        .await;

    let order_mock = server
        .mock("POST", "/fapi/v1/order")
        .expect(0)
        .create_async()
        .await;

    broker
        .as_futures()
        .unwrap()
        .close_position("BTCUSDT", PositionSide::Short)
        .await
        .unwrap();

    order_mock.assert_async().await;
}
