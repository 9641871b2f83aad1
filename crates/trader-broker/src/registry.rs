//! 커넥터 레지스트리.
//!
//! 거래소 이름 → 커넥터 팩토리 매핑입니다. 프로세스 시작 시 한 번 구성해
//! 브로커 매니저에 참조로 넘깁니다. 각 커넥터는 자체 `register` 함수로 등록합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use trader_core::{BrokerError, BrokerResult, DEFAULT_REQUEST_TIMEOUT};

use crate::traits::Broker;

/// 커넥터 생성 옵션.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorOptions {
    /// 테스트넷(샌드박스) 엔드포인트 사용 여부
    pub testnet: bool,
    /// HTTP 요청 타임아웃
    pub request_timeout: Duration,
    /// 기본 URL 재정의 (테스트용 목 서버 등)
    pub base_url: Option<String>,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            testnet: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            base_url: None,
        }
    }
}

impl ConnectorOptions {
    /// 테스트넷 사용 여부를 설정합니다.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// 요청 타임아웃을 설정합니다.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 기본 URL을 재정의합니다.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// 커넥터 팩토리.
pub type BrokerFactory = Arc<dyn Fn(&ConnectorOptions) -> BrokerResult<Arc<dyn Broker>> + Send + Sync>;

/// 이름 → 팩토리 레지스트리.
#[derive(Default, Clone)]
pub struct BrokerRegistry {
    factories: HashMap<String, BrokerFactory>,
}

impl BrokerRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 팩토리를 등록합니다. 같은 이름이 있으면 교체합니다.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ConnectorOptions) -> BrokerResult<Arc<dyn Broker>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Arc::new(factory));
    }

    /// 이름으로 커넥터를 생성합니다. 미등록 이름은 `BrokerNotFound`.
    pub fn create(&self, name: &str, options: &ConnectorOptions) -> BrokerResult<Arc<dyn Broker>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| BrokerError::BrokerNotFound(name.to_string()))?;
        factory(options)
    }

    /// 등록 여부.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// 등록된 이름 목록 (정렬됨).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for BrokerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerRegistry")
            .field("brokers", &self.names())
            .finish()
    }
}
