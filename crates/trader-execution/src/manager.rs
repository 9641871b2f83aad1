//! 브로커 매니저.
//!
//! 이름 → 연결된 커넥터 컬렉션을 관리하고, 단일/전체 브로커 대상 작업을 제공합니다.
//!
//! # 잠금 규칙
//!
//! - 조회와 팬아웃은 읽기 잠금으로 맵 스냅샷을 복사한 뒤 잠금을 해제하고 호출합니다.
//!   브로커 호출이 오래 걸려도 레지스트리 변경을 막지 않습니다.
//! - `add_broker`, `remove_broker`, `close`만 쓰기 잠금을 잡습니다.
//! - 전체 브로커 작업은 한 브로커의 실패로 중단되지 않으며, 결과를 이름별로 돌려줍니다.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trader_broker::{
    require_futures, retry_with_backoff, with_deadline, Broker, BrokerRegistry, ConnectorOptions,
    RetryConfig, CONNECT_TIMEOUT, REQUEST_TIMEOUT,
};
use trader_core::{AccountInfo, BrokerError, BrokerResult, Credentials, Order, OrderRequest, Position};

/// `retry_operation`의 기본 지연.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// 전체 브로커 작업 결과.
///
/// 부분 실패는 정상 결과입니다. 성공한 브로커는 `results`, 실패한 브로커는 `errors`에 담깁니다.
#[derive(Debug)]
pub struct FanOut<T> {
    /// 브로커별 성공 결과
    pub results: HashMap<String, T>,
    /// 브로커별 에러
    pub errors: HashMap<String, BrokerError>,
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
            errors: HashMap::new(),
        }
    }
}

impl<T> FanOut<T> {
    /// 모든 브로커가 성공했는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

fn not_connected(name: &str) -> BrokerError {
    BrokerError::NotConnected.context(format!("브로커 {} 연결되지 않음", name))
}

/// 다중 브로커 매니저.
pub struct BrokerManager {
    registry: Arc<BrokerRegistry>,
    brokers: RwLock<HashMap<String, Arc<dyn Broker>>>,
}

impl fmt::Debug for BrokerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl BrokerManager {
    /// 커넥터 레지스트리로 매니저를 생성합니다.
    pub fn new(registry: Arc<BrokerRegistry>) -> Self {
        Self {
            registry,
            brokers: RwLock::new(HashMap::new()),
        }
    }

    /// 커넥터 레지스트리.
    pub fn registry(&self) -> &BrokerRegistry {
        &self.registry
    }

    // ========================================================================
    // 컬렉션 관리
    // ========================================================================

    /// 브로커를 추가합니다.
    ///
    /// `None`이면 컬렉션을 바꾸지 않고 에러를 반환합니다.
    /// 같은 이름의 기존 브로커는 닫고 교체합니다.
    pub async fn add_broker(&self, name: &str, broker: Option<Arc<dyn Broker>>) -> BrokerResult<()> {
        let broker = broker.ok_or_else(|| BrokerError::Validation("브로커가 비어 있음".to_string()))?;

        let replaced = self.brokers.write().await.insert(name.to_string(), broker);
        if let Some(old) = replaced {
            if let Err(e) = old.close() {
                warn!(broker = name, error = %e, "교체된 브로커 종료 실패");
            }
        }

        info!(broker = name, "브로커 추가");
        Ok(())
    }

    /// 브로커를 닫고 제거합니다. 종료 실패는 경고로만 남깁니다.
    pub async fn remove_broker(&self, name: &str) -> BrokerResult<()> {
        let broker = self
            .brokers
            .write()
            .await
            .remove(name)
            .ok_or_else(|| BrokerError::BrokerNotFound(name.to_string()))?;

        if let Err(e) = broker.close() {
            warn!(broker = name, error = %e, "브로커 종료 실패");
        }

        info!(broker = name, "브로커 제거");
        Ok(())
    }

    /// 이름으로 브로커를 조회합니다.
    pub async fn get_broker(&self, name: &str) -> BrokerResult<Arc<dyn Broker>> {
        self.brokers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::BrokerNotFound(name.to_string()))
    }

    /// 현재 컬렉션의 스냅샷.
    pub async fn get_brokers(&self) -> HashMap<String, Arc<dyn Broker>> {
        self.brokers.read().await.clone()
    }

    /// 이름순으로 정렬된 스냅샷.
    async fn snapshot(&self) -> Vec<(String, Arc<dyn Broker>)> {
        let mut brokers: Vec<_> = self.get_brokers().await.into_iter().collect();
        brokers.sort_by(|a, b| a.0.cmp(&b.0));
        brokers
    }

    /// 등록된 브로커 이름 (정렬됨).
    pub async fn broker_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.brokers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// 연결된 브로커 이름 (정렬됨).
    pub async fn get_connected_brokers(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|(_, broker)| broker.is_connected())
            .map(|(name, _)| name)
            .collect()
    }

    // ========================================================================
    // 초기화
    // ========================================================================

    /// 기본 옵션으로 브로커를 생성하고 초기화합니다.
    pub async fn initialize_broker(&self, name: &str, credentials: &Credentials) -> BrokerResult<()> {
        self.initialize_broker_with(name, credentials, &ConnectorOptions::default())
            .await
    }

    /// 레지스트리로 커넥터를 생성해 초기화하고, 성공한 경우에만 컬렉션에 추가합니다.
    pub async fn initialize_broker_with(
        &self,
        name: &str,
        credentials: &Credentials,
        options: &ConnectorOptions,
    ) -> BrokerResult<()> {
        let broker = self
            .registry
            .create(name, options)
            .map_err(|e| e.context(format!("브로커 {} 생성 실패", name)))?;

        with_deadline(CONNECT_TIMEOUT, broker.initialize(credentials))
            .await
            .map_err(|e| e.context(format!("브로커 {} 초기화 실패", name)))?;

        if let Err(e) = self.add_broker(name, Some(broker.clone())).await {
            if let Err(close_err) = broker.close() {
                warn!(broker = name, error = %close_err, "브로커 정리 실패");
            }
            return Err(e.context(format!("브로커 {} 추가 실패", name)));
        }

        Ok(())
    }

    /// 모든 브로커의 연결을 점검합니다. 실패한 브로커만 결과에 포함됩니다.
    pub async fn test_connections(&self) -> HashMap<String, BrokerError> {
        let mut errors = HashMap::new();

        for (name, broker) in self.snapshot().await {
            match with_deadline(CONNECT_TIMEOUT, broker.test_connection()).await {
                Ok(()) => debug!(broker = %name, "연결 점검 통과"),
                Err(e) => {
                    warn!(broker = %name, error = %e, "연결 점검 실패");
                    errors.insert(name, e);
                }
            }
        }

        errors
    }

    /// 브로커별 상태 (이름 → 연결 점검 통과 여부).
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let errors = self.test_connections().await;
        self.broker_names()
            .await
            .into_iter()
            .map(|name| {
                let healthy = !errors.contains_key(&name);
                (name, healthy)
            })
            .collect()
    }

    // ========================================================================
    // 실행 기본 요소
    // ========================================================================

    /// 특정 브로커에서 작업을 실행합니다. 연결되지 않았으면 `NotConnected`.
    pub async fn execute_on_broker<T, F, Fut>(&self, name: &str, operation: F) -> BrokerResult<T>
    where
        F: FnOnce(Arc<dyn Broker>) -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        let broker = self.get_broker(name).await?;
        if !broker.is_connected() {
            return Err(not_connected(name));
        }
        operation(broker).await
    }

    /// 모든 브로커에서 작업을 순차 실행합니다.
    ///
    /// 연결되지 않은 브로커는 해당 이름의 에러로 기록하고 나머지는 계속 진행합니다.
    pub async fn execute_on_all_brokers<T, F, Fut>(&self, mut operation: F) -> FanOut<T>
    where
        F: FnMut(String, Arc<dyn Broker>) -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        let mut fan_out = FanOut::default();

        for (name, broker) in self.snapshot().await {
            if !broker.is_connected() {
                let err = not_connected(&name);
                fan_out.errors.insert(name, err);
                continue;
            }

            match operation(name.clone(), broker).await {
                Ok(value) => {
                    fan_out.results.insert(name, value);
                }
                Err(e) => {
                    fan_out.errors.insert(name, e);
                }
            }
        }

        fan_out
    }

    // ========================================================================
    // 단일 브로커 작업
    // ========================================================================

    /// 특정 브로커에 주문을 제출합니다.
    pub async fn place_order_on_broker(&self, name: &str, request: &OrderRequest) -> BrokerResult<Order> {
        self.execute_on_broker(name, |broker| async move {
            with_deadline(REQUEST_TIMEOUT, broker.place_order(request)).await
        })
        .await
    }

    /// 특정 브로커의 포지션을 조회합니다.
    pub async fn get_positions_from_broker(&self, name: &str) -> BrokerResult<Vec<Position>> {
        self.execute_on_broker(name, |broker| async move { broker.get_positions().await })
            .await
    }

    /// 특정 브로커의 레버리지를 설정합니다.
    pub async fn set_leverage_on_broker(&self, name: &str, symbol: &str, leverage: u32) -> BrokerResult<()> {
        self.execute_on_broker(name, |broker| async move {
            with_deadline(REQUEST_TIMEOUT, broker.set_leverage(symbol, leverage)).await
        })
        .await
    }

    /// 특정 브로커의 계좌 정보를 조회합니다.
    pub async fn get_account_info_from_broker(&self, name: &str) -> BrokerResult<AccountInfo> {
        self.execute_on_broker(name, |broker| async move { broker.get_account_info().await })
            .await
    }

    // ========================================================================
    // 전체 브로커 작업
    // ========================================================================

    /// 모든 브로커의 포지션. 실패한 브로커는 로그만 남기고 제외합니다.
    pub async fn get_all_positions(&self) -> HashMap<String, Vec<Position>> {
        let fan_out = self
            .execute_on_all_brokers(|_, broker| async move { broker.get_positions().await })
            .await;

        for (name, e) in &fan_out.errors {
            warn!(broker = %name, error = %e, "포지션 조회 실패");
        }
        fan_out.results
    }

    /// 모든 브로커의 계좌 정보. 실패한 브로커는 로그만 남기고 제외합니다.
    pub async fn get_all_account_info(&self) -> HashMap<String, AccountInfo> {
        let fan_out = self
            .execute_on_all_brokers(|_, broker| async move { broker.get_account_info().await })
            .await;

        for (name, e) in &fan_out.errors {
            warn!(broker = %name, error = %e, "계좌 정보 조회 실패");
        }
        fan_out.results
    }

    /// 모든 브로커의 포지션을 청산합니다.
    ///
    /// 선물 확장이 없는 브로커는 `Unsupported` 에러로 기록됩니다.
    pub async fn close_all_positions(&self) -> HashMap<String, BrokerError> {
        self.execute_on_all_brokers(|_, broker| async move {
            require_futures(broker.as_ref())?.close_all_positions().await
        })
        .await
        .errors
    }

    /// 모든 브로커에 같은 레버리지를 설정합니다.
    pub async fn set_leverage_on_all_brokers(&self, symbol: &str, leverage: u32) -> HashMap<String, BrokerError> {
        self.execute_on_all_brokers(|_, broker| async move {
            with_deadline(REQUEST_TIMEOUT, broker.set_leverage(symbol, leverage)).await
        })
        .await
        .errors
    }

    // ========================================================================
    // 수명 주기
    // ========================================================================

    /// 모든 브로커를 닫고 컬렉션을 비웁니다.
    ///
    /// 개별 종료 실패에서 멈추지 않고 모두 모아서 반환합니다.
    pub async fn close(&self) -> BrokerResult<()> {
        let brokers: Vec<_> = self.brokers.write().await.drain().collect();

        let errors: Vec<BrokerError> = brokers
            .into_iter()
            .filter_map(|(name, broker)| {
                broker
                    .close()
                    .err()
                    .map(|e| e.context(format!("브로커 {} 종료 실패", name)))
            })
            .collect();

        match BrokerError::join(errors) {
            Some(err) => Err(err),
            None => {
                info!("모든 브로커 종료");
                Ok(())
            }
        }
    }

    /// 지수 백오프(기본 지연 1초)로 작업을 재시도합니다.
    pub async fn retry_operation<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        max_retries: u32,
        operation: F,
    ) -> BrokerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BrokerResult<T>>,
    {
        retry_with_backoff(&RetryConfig::new(max_retries, RETRY_BASE_DELAY), cancel, operation).await
    }
}
