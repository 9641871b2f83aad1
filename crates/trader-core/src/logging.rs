//! tracing 기반 로깅 초기화.
//!
//! 브로커 코어는 라이브러리이므로 구독자를 직접 설치하지 않습니다.
//! 임베딩 애플리케이션은 [`init_logging`]을, 테스트는 [`init_test_logging`]을 사용합니다.
//!
//! 출력 형식은 `pretty`(개발용), `json`(로그 집계용), `compact`(한 줄) 중 하나입니다.

use std::str::FromStr;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{BrokerError, BrokerResult};

/// 기본 로그 필터.
pub const DEFAULT_LOG_FILTER: &str = "info,trader_broker=info,trader_execution=info";

/// 레벨 필터 환경 변수.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

/// 출력 형식 환경 변수.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(BrokerError::Config(format!("알 수 없는 로그 형식: {}", other))),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 레벨 필터 (예: "info", "trader_broker=debug")
    pub filter: String,
    pub format: LogFormat,
    /// 시그널 span 진입/종료를 이벤트로 남길지 여부
    pub span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    pub with_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::default(),
            span_events: false,
            with_location: false,
        }
    }
}

impl LogConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_location(mut self, enabled: bool) -> Self {
        self.with_location = enabled;
        self
    }

    /// 환경 변수에서 설정을 읽습니다.
    ///
    /// 값이 없거나 형식이 잘못되면 기본값을 씁니다.
    pub fn from_env() -> Self {
        let filter = std::env::var(LOG_FILTER_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self::new(filter).with_format(format)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// 주어진 설정으로 전역 구독자를 설치합니다.
///
/// 필터 문법이 잘못되었거나 구독자가 이미 설치되어 있으면 `Config` 에러입니다.
///
/// ```no_run
/// use trader_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("trader_broker=debug").with_format(LogFormat::Json))?;
/// # Ok::<(), trader_core::BrokerError>(())
/// ```
pub fn init_logging(config: LogConfig) -> BrokerResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| BrokerError::Config(format!("로그 필터 파싱 실패: {}", e)))?;

    let layer = fmt::layer()
        .with_file(config.with_location)
        .with_line_number(config.with_location)
        .with_span_events(config.span_events());

    let layer = match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| BrokerError::Config(format!("로깅 초기화 실패: {}", e)))?;

    tracing::debug!(format = ?config.format, filter = %config.filter, "로깅 초기화 완료");
    Ok(())
}

/// `RUST_LOG`, `LOG_FORMAT`으로 로깅을 초기화합니다.
pub fn init_logging_from_env() -> BrokerResult<()> {
    init_logging(LogConfig::from_env())
}

/// 테스트 출력 캡처용 구독자. 여러 번 호출해도 안전합니다.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init();
}

/// 시그널 처리 컨텍스트(거래소, 심볼)가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! signal_span {
    ($name:expr, $exchange:expr, $symbol:expr) => {
        tracing::info_span!($name, exchange = %$exchange, symbol = %$symbol)
    };
    ($name:expr, $exchange:expr, $symbol:expr, $action:expr) => {
        tracing::info_span!(
            $name,
            exchange = %$exchange,
            symbol = %$symbol,
            action = %$action
        )
    };
}
