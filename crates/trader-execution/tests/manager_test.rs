//! BrokerManager 통합 테스트.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::{as_dyn, mock_registry, MockBroker, UNREACHABLE_KEY};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use trader_broker::Broker;
use trader_core::{BrokerError, Credentials, ErrorKind, OrderRequest, Side};
use trader_execution::BrokerManager;

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

fn manager() -> BrokerManager {
    BrokerManager::new(Arc::new(mock_registry(&["alpha", "beta"])))
}

/// A(연결됨), B(연결 안 됨)를 가진 매니저.
async fn manager_with_one_disconnected() -> (BrokerManager, Arc<MockBroker>, Arc<MockBroker>) {
    let manager = manager();
    let a = Arc::new(MockBroker::connected("a").with_position("BTCUSDT", dec!(1)));
    let b = Arc::new(MockBroker::new("b"));
    manager.add_broker("a", as_dyn(&a)).await.unwrap();
    manager.add_broker("b", as_dyn(&b)).await.unwrap();
    (manager, a, b)
}

// ============================================================================
// 컬렉션 관리
// ============================================================================

#[tokio::test]
async fn test_add_none_leaves_registry_unchanged() {
    let manager = manager();
    let err = manager.add_broker("a", None).await.unwrap_err();

    assert!(matches!(err, BrokerError::Validation(_)));
    assert!(manager.broker_names().await.is_empty());
}

#[tokio::test]
async fn test_get_and_remove_broker() {
    let (manager, a, _) = manager_with_one_disconnected().await;

    assert_eq!(manager.get_broker("a").await.unwrap().name(), "a");
    assert!(manager.get_broker("zzz").await.err().unwrap().is(ErrorKind::BrokerNotFound));

    manager.remove_broker("a").await.unwrap();
    assert!(!a.is_connected());
    assert_eq!(manager.broker_names().await, vec!["b".to_string()]);

    let err = manager.remove_broker("a").await.unwrap_err();
    assert!(err.is(ErrorKind::BrokerNotFound));
}

#[tokio::test]
async fn test_connected_brokers() {
    let (manager, _, _) = manager_with_one_disconnected().await;
    assert_eq!(manager.get_connected_brokers().await, vec!["a".to_string()]);
}

// ============================================================================
// 초기화
// ============================================================================

#[tokio::test]
async fn test_initialize_broker_adds_only_on_success() {
    let manager = manager();

    manager
        .initialize_broker("alpha", &Credentials::new("key", "secret"))
        .await
        .unwrap();
    assert!(manager.get_broker("alpha").await.unwrap().is_connected());

    let err = manager
        .initialize_broker("beta", &Credentials::new(UNREACHABLE_KEY, "secret"))
        .await
        .unwrap_err();
    assert!(errors.iter().all(|e| e.is(ErrorKind::NetworkError)));
    assert!(manager.get_broker("beta").await.is_err());

    let err = manager
        .initialize_broker("bitget", &Credentials::new("key", "secret"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::BrokerNotFound));

    assert_eq!(manager.broker_names().await, vec!["alpha".to_string()]);
}

#[tokio::test]
async fn test_initialize_rejects_missing_secret() {
    let manager = manager();
    let err = manager
        .initialize_broker("alpha", &Credentials::new("key", ""))
        .await
        .unwrap_err();

    assert!(err.is(ErrorKind::InvalidCredentials));
    assert!(manager.broker_names().await.is_empty());
}

// ============================================================================
// 연결 점검
// ============================================================================

#[tokio::test]
async fn test_connections_report_only_failures() {
    let (manager, _, _) = manager_with_one_disconnected().await;

    let errors = manager.test_connections().await;
    assert_eq!(errors.len(), 1);
    assert!(errors["b"].is(ErrorKind::NotConnected));
    assert!(!errors.contains_key("a"));

    let health = manager.health_check().await;
    assert_eq!(health.len(), 2);
    assert!(health["a"]);
    assert!(!health["b"]);
}

// ============================================================================
// 실행
// ============================================================================

#[tokio::test]
async fn test_execute_on_all_isolates_disconnected() {
    let (manager, _, _) = manager_with_one_disconnected().await;

    let fan_out = manager
        .execute_on_all_brokers(|name, _| async move { Ok(name.len()) })
        .await;

    assert_eq!(fan_out.results.len(), 1);
    assert_eq!(fan_out.errors.len(), 1);
    assert_eq!(fan_out.results["a"], 1);
    assert!(fan_out.errors["b"].is(ErrorKind::NotConnected));
    assert!(!fan_out.is_complete());
}

#[tokio::test]
async fn test_single_broker_operations() {
    let (manager, a, _) = manager_with_one_disconnected().await;

    let request = OrderRequest::market("ETHUSDT", Side::Buy, dec!(2));
    let order = manager.place_order_on_broker("a", &request).await.unwrap();
    assert_eq!(order.symbol, "ETHUSDT");
    assert_eq!(a.position_size("ETHUSDT"), dec!(2));

    let err = manager.place_order_on_broker("b", &request).await.unwrap_err();
    assert!(err.is(ErrorKind::NotConnected));

    let positions = manager.get_positions_from_broker("a").await.unwrap();
    assert_eq!(positions.len(), 2);

    manager.set_leverage_on_broker("a", "BTCUSDT", 20).await.unwrap();
    assert_eq!(a.leverage_calls(), 1);

    let account = manager.get_account_info_from_broker("a").await.unwrap();
    assert!(account.can_trade);
}

#[tokio::test]
async fn test_aggregate_operations() {
    let (manager, a, _) = manager_with_one_disconnected().await;

    let positions = manager.get_all_positions().await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions["a"][0].symbol, "BTCUSDT");

    let accounts = manager.get_all_account_info().await;
    assert_eq!(accounts.len(), 1);

    let errors = manager.set_leverage_on_all_brokers("BTCUSDT", 5).await;
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("b"));
    assert_eq!(a.leverage_calls(), 1);
}

#[tokio::test]
async fn test_close_all_positions_requires_futures() {
    let manager = manager();
    let futures = Arc::new(MockBroker::connected("f").with_position("BTCUSDT", dec!(-0.5)));
    let spot = Arc::new(MockBroker::connected("s").with_futures(false));
    manager.add_broker("f", as_dyn(&futures)).await.unwrap();
    manager.add_broker("s", as_dyn(&spot)).await.unwrap();

    let errors = manager.close_all_positions().await;

    assert_eq!(errors.len(), 1);
    assert!(matches!(errors["s"], BrokerError::Unsupported(_)));
    assert_eq!(futures.position_size("BTCUSDT"), dec!(0));

    let placed = futures.placed_orders();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].side, Side::Buy);
    assert!(placed[0].reduce_only);
}

#[tokio::test]
async fn test_close_clears_all_brokers() {
    let (manager, a, _) = manager_with_one_disconnected().await;

    manager.close().await.unwrap();

    assert!(manager.broker_names().await.is_empty());
    assert!(!a.is_connected());
}

#[tokio::test]
async fn test_close_joins_errors_and_drains() {
    let manager = manager();
    let a = Arc::new(MockBroker::connected("a"));
    let b = Arc::new(MockBroker::connected("b"));
    let c = Arc::new(MockBroker::connected("c"));
    a.fail_close();
    c.fail_close();
    manager.add_broker("a", as_dyn(&a)).await.unwrap();
    manager.add_broker("b", as_dyn(&b)).await.unwrap();
    manager.add_broker("c", as_dyn(&c)).await.unwrap();

    let err = manager.close().await.unwrap_err();

    let BrokerError::Multiple(errors) = &err else {
        panic!("실패 두 건이 합쳐져야 함: {}", err);
    };
    assert_eq!(errors.len(), 2);
    let message = err.to_string();
    assert!(message.contains("브로커 a 종료 실패"));
    assert!(message.contains("브로커 c 종료 실패"));
    assert!(!message.contains("브로커 b"));
    assert!(err.is(ErrorKind::NetworkError));

    // 실패한 브로커도 레지스트리에서 제거됨
    assert!(manager.get_brokers().await.is_empty());
    assert!(!a.is_connected());
    assert!(!b.is_connected());
    assert!(!c.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_retry_operation() {
    let manager = manager();
    let cancel = CancellationToken::new();
    let calls = Arc::new(AtomicU32::new(0));

    let c = calls.clone();
    let value = manager
        .retry_operation(&cancel, 3, || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(BrokerError::Timeout)
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
