//! 브로커 설정.
//!
//! 이 모듈은 이름별 브로커 설정(활성화 여부, 자격증명, 레버리지/마진/포지션 모드,
//! 타임아웃)과 그 검증 규칙을 정의합니다.

use crate::domain::{mask_key, Credentials, MarginType, PositionMode, MAX_LEVERAGE};
use crate::error::{BrokerError, BrokerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// 요청 타임아웃 기본값.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 전체 브로커 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokersConfig {
    /// 이름별 브로커 설정
    #[serde(default)]
    pub brokers: HashMap<String, BrokerConfig>,
    /// 브로커 설정에 값이 없을 때 쓰는 기본값
    #[serde(default)]
    pub default: DefaultSettings,
}

/// 브로커 하나의 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// 활성화 여부
    #[serde(default)]
    pub enabled: bool,
    /// API 자격증명
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// 브로커별 설정
    #[serde(default)]
    pub settings: BrokerSettings,
}

/// 설정 파일의 자격증명.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passphrase: String,
}

impl CredentialsConfig {
    /// 커넥터에 넘길 자격증명을 생성합니다.
    pub fn to_credentials(&self) -> Credentials {
        Credentials::new(self.api_key.clone(), self.secret_key.clone())
            .with_passphrase(self.passphrase.clone())
    }

    /// API 키와 시크릿 키가 있는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("secret_key", &"[REDACTED]")
            .field("has_passphrase", &!self.passphrase.is_empty())
            .finish()
    }
}

/// 브로커별 설정. 0 또는 빈 값은 "설정 안 함"을 뜻합니다.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// 레버리지 (0 = 변경하지 않음)
    pub leverage: u32,
    /// 마진 유형 (isolated, cross)
    pub margin_type: String,
    /// 포지션 모드 (hedge, one-way)
    pub position_mode: String,
    /// 테스트넷 사용 여부
    pub test_mode: bool,
    /// 재시도 횟수
    pub retry_attempts: u32,
    /// 재시도 기본 지연 (밀리초)
    pub retry_delay_ms: u64,
    /// 요청 타임아웃 (밀리초)
    pub request_timeout_ms: u64,
    /// 요청 간 최소 간격 (밀리초)
    pub rate_limit_delay_ms: u64,
}

impl BrokerSettings {
    /// 설정된 포지션 모드.
    pub fn position_mode(&self) -> BrokerResult<Option<PositionMode>> {
        non_empty(&self.position_mode)
            .map(|v| v.parse::<PositionMode>())
            .transpose()
    }

    /// 설정된 마진 유형.
    pub fn margin_type(&self) -> BrokerResult<Option<MarginType>> {
        non_empty(&self.margin_type)
            .map(|v| v.parse::<MarginType>())
            .transpose()
    }
}

/// 기본 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultSettings {
    pub leverage: u32,
    pub margin_type: String,
    pub position_mode: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            leverage: 0,
            margin_type: String::new(),
            position_mode: String::new(),
            retry_attempts: 3,
            retry_delay_ms: 1_000,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl BrokersConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 형식은 확장자로 판별하며, `BROKER__` 접두사 환경 변수가 파일 값을 덮어씁니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BROKER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 요청 타임아웃을 결정합니다 (브로커 설정 → 기본 설정 → 30초).
    pub fn request_timeout(&self, broker: &BrokerConfig) -> Duration {
        if broker.settings.request_timeout_ms > 0 {
            Duration::from_millis(broker.settings.request_timeout_ms)
        } else if self.default.request_timeout_ms > 0 {
            Duration::from_millis(self.default.request_timeout_ms)
        } else {
            DEFAULT_REQUEST_TIMEOUT
        }
    }

    /// 활성화된 브로커 이름 목록 (정렬됨).
    pub fn enabled_brokers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .brokers
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// 설정을 검증합니다.
    ///
    /// 활성화된 브로커는 자격증명이 있어야 하고, 레버리지는 0..=125,
    /// 마진 유형은 isolated/cross, 포지션 모드는 hedge/one-way여야 합니다.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.brokers.is_empty() {
            return Err(BrokerError::Config("설정된 브로커가 없음".to_string()));
        }

        for (name, broker) in &self.brokers {
            if !broker.enabled {
                continue;
            }

            if !broker.credentials.is_complete() {
                return Err(BrokerError::Config(format!(
                    "브로커 {}: API 키와 시크릿 키가 필요함",
                    name
                )));
            }

            let settings = &broker.settings;
            if settings.leverage > MAX_LEVERAGE {
                return Err(BrokerError::Config(format!(
                    "브로커 {}: 레버리지는 0에서 {} 사이여야 함 (현재 {})",
                    name, MAX_LEVERAGE, settings.leverage
                )));
            }

            if settings.margin_type().is_err() {
                return Err(BrokerError::Config(format!(
                    "브로커 {}: 마진 유형은 isolated 또는 cross여야 함 (현재 {})",
                    name, settings.margin_type
                )));
            }

            if settings.position_mode().is_err() {
                return Err(BrokerError::Config(format!(
                    "브로커 {}: 포지션 모드는 hedge 또는 one-way여야 함 (현재 {})",
                    name, settings.position_mode
                )));
            }
        }

        Ok(())
    }
}
