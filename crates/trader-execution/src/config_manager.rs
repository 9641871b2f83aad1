//! 설정 기반 브로커 초기화와 상태 관리.
//!
//! [`BrokersConfig`]를 받아 활성화된 브로커를 초기화하고, 설정 적용과 재연결,
//! 상태 점검을 담당합니다. 초기화는 원자적이지 않아 일부 브로커만 성공할 수 있습니다.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use trader_broker::{with_deadline, BrokerRegistry, ConnectorOptions, REQUEST_TIMEOUT};
use trader_core::{BrokerConfig, BrokerError, BrokerHealth, BrokerResult, BrokersConfig};

use crate::manager::BrokerManager;

/// 브로커 설정 관리자.
#[derive(Debug)]
pub struct ConfigManager {
    config: BrokersConfig,
    manager: Arc<BrokerManager>,
}

impl ConfigManager {
    /// 설정과 커넥터 레지스트리로 관리자를 생성합니다.
    pub fn new(config: BrokersConfig, registry: Arc<BrokerRegistry>) -> Self {
        Self {
            config,
            manager: Arc::new(BrokerManager::new(registry)),
        }
    }

    /// 브로커 매니저.
    pub fn manager(&self) -> Arc<BrokerManager> {
        Arc::clone(&self.manager)
    }

    /// 현재 설정.
    pub fn config(&self) -> &BrokersConfig {
        &self.config
    }

    /// 설정을 검증합니다.
    pub fn validate_config(&self) -> BrokerResult<()> {
        self.config.validate()
    }

    /// 활성화된 브로커 이름 (정렬됨).
    pub fn enabled_brokers(&self) -> Vec<String> {
        self.config.enabled_brokers()
    }

    /// 브로커 설정 조회.
    pub fn broker_config(&self, name: &str) -> BrokerResult<&BrokerConfig> {
        self.config
            .brokers
            .get(name)
            .ok_or_else(|| BrokerError::Config(format!("설정에 브로커 {}가 없음", name)))
    }

    /// 브로커 설정을 추가하거나 교체합니다.
    pub fn update_broker_config(&mut self, name: &str, config: BrokerConfig) {
        self.config.brokers.insert(name.to_string(), config);
        info!(broker = name, "브로커 설정 갱신");
    }

    /// 활성화된 모든 브로커를 초기화합니다.
    ///
    /// 비활성 브로커는 건너뛰고, 개별 실패가 있어도 나머지를 계속 진행한 뒤
    /// 실패를 모아서 반환합니다.
    pub async fn initialize_brokers(&self) -> BrokerResult<()> {
        let mut names: Vec<&String> = self.config.brokers.keys().collect();
        names.sort();

        let mut errors = Vec::new();
        for name in names {
            let broker_config = &self.config.brokers[name];
            if !broker_config.enabled {
                info!(broker = %name, "비활성 브로커 건너뜀");
                continue;
            }

            info!(broker = %name, "브로커 초기화 중");
            match self.initialize_broker(name, broker_config).await {
                Ok(()) => info!(broker = %name, "브로커 초기화 완료"),
                Err(e) => {
                    warn!(broker = %name, error = %e, "브로커 초기화 실패");
                    errors.push(e.context(format!("{} 초기화 실패", name)));
                }
            }
        }

        match BrokerError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn initialize_broker(&self, name: &str, broker_config: &BrokerConfig) -> BrokerResult<()> {
        if !broker_config.credentials.is_complete() {
            return Err(BrokerError::InvalidCredentials.context("API 키와 시크릿 키가 필요함"));
        }

        let timeout = self.config.request_timeout(broker_config);
        let options = ConnectorOptions::default()
            .with_testnet(broker_config.settings.test_mode)
            .with_request_timeout(timeout);
        let credentials = broker_config.credentials.to_credentials();

        with_deadline(
            timeout,
            self.manager
                .initialize_broker_with(name, &credentials, &options),
        )
        .await?;

        if let Err(e) = self.apply_broker_settings(name, broker_config).await {
            warn!(broker = name, error = %e, "브로커 설정 적용 실패");
        }

        Ok(())
    }

    /// 초기화 후 브로커 설정을 적용합니다.
    ///
    /// 포지션 모드만 실제로 적용하며 선물 확장을 지원하는 브로커에 한합니다.
    /// 레버리지와 마진 유형은 심볼별 설정이라 여기서는 로그만 남기고 거래소에 보내지 않습니다.
    async fn apply_broker_settings(&self, name: &str, broker_config: &BrokerConfig) -> BrokerResult<()> {
        let broker = self.manager.get_broker(name).await?;
        let settings = &broker_config.settings;

        if settings.leverage > 0 {
            info!(broker = name, leverage = settings.leverage, "레버리지는 심볼별로 적용됨");
        }
        if !settings.margin_type.trim().is_empty() {
            info!(broker = name, margin_type = %settings.margin_type, "마진 유형은 심볼별로 적용됨");
        }

        let Some(mode) = settings.position_mode()? else {
            return Ok(());
        };

        match broker.as_futures() {
            Some(futures) => {
                with_deadline(REQUEST_TIMEOUT, futures.set_position_mode(mode))
                    .await
                    .map_err(|e| e.context("포지션 모드 설정 실패"))?;
                info!(broker = name, mode = %settings.position_mode, "포지션 모드 설정 완료");
            }
            None => debug!(broker = name, "선물 확장 미지원, 포지션 모드 생략"),
        }

        Ok(())
    }

    /// 모든 브로커 연결 점검. 실패한 브로커만 포함됩니다.
    pub async fn test_all_connections(&self) -> HashMap<String, BrokerError> {
        self.manager.test_connections().await
    }

    /// 설정된 모든 브로커의 상태.
    pub async fn health_status(&self) -> HashMap<String, BrokerHealth> {
        let mut results = HashMap::new();

        for name in self.config.brokers.keys() {
            let health = match self.manager.get_broker(name).await {
                Err(e) => BrokerHealth::unhealthy(name.as_str(), false, e),
                Ok(broker) if !broker.is_connected() => BrokerHealth {
                    name: name.clone(),
                    connected: false,
                    error: None,
                },
                Ok(broker) => match with_deadline(REQUEST_TIMEOUT, broker.test_connection()).await {
                    Ok(()) => BrokerHealth::healthy(name.as_str()),
                    Err(e) => BrokerHealth::unhealthy(name.as_str(), false, e),
                },
            };
            results.insert(name.clone(), health);
        }

        results
    }

    /// 저장된 설정으로 브로커 하나를 재연결합니다. 다른 브로커에는 영향이 없습니다.
    pub async fn reconnect_broker(&self, name: &str) -> BrokerResult<()> {
        let broker_config = self.broker_config(name)?;
        if !broker_config.enabled {
            return Err(BrokerError::Config(format!("브로커 {}가 비활성화됨", name)));
        }

        if let Err(e) = self.manager.remove_broker(name).await {
            warn!(broker = name, error = %e, "기존 브로커 제거 실패");
        }

        info!(broker = name, "브로커 재연결 중");
        self.initialize_broker(name, broker_config).await
    }

    /// 모든 브로커 연결을 닫습니다.
    pub async fn close(&self) -> BrokerResult<()> {
        self.manager.close().await
    }
}
