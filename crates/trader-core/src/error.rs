//! 브로커 계층의 에러 타입.
//!
//! 이 모듈은 브로커 연동 전반에서 사용되는 에러 분류 체계를 정의합니다:
//! - 센티널 에러 (`NotConnected`, `RateLimitExceeded` 등) - 프로그래밍 방식 검사용
//! - 브로커 범위 에러 (`BrokerError::Exchange`) - 거래소 이름, 코드, 메시지, 원인을 보존
//! - 재시도 가능 여부 판정 (`BrokerError::is_retryable`)

use thiserror::Error;

/// 브로커 범위 에러에서 사용하는 기계 판독용 코드.
pub mod codes {
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";

    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
    pub const ACCOUNT_INFO_FAILED: &str = "ACCOUNT_INFO_FAILED";
    pub const ASSET_NOT_FOUND: &str = "ASSET_NOT_FOUND";
    pub const POSITIONS_FAILED: &str = "POSITIONS_FAILED";
    pub const LEVERAGE_FAILED: &str = "LEVERAGE_FAILED";
    pub const MARGIN_TYPE_FAILED: &str = "MARGIN_TYPE_FAILED";
    pub const ORDER_FAILED: &str = "ORDER_FAILED";
    pub const INVALID_ORDER_ID: &str = "INVALID_ORDER_ID";
    pub const ORDER_NOT_FOUND: &str = "ORDER_NOT_FOUND";
    pub const CANCEL_FAILED: &str = "CANCEL_FAILED";
    pub const OPEN_ORDERS_FAILED: &str = "OPEN_ORDERS_FAILED";
    pub const ORDER_HISTORY_FAILED: &str = "ORDER_HISTORY_FAILED";
    pub const EXCHANGE_INFO_FAILED: &str = "EXCHANGE_INFO_FAILED";
    pub const CLOSE_POSITION_FAILED: &str = "CLOSE_POSITION_FAILED";
    pub const POSITION_MODE_FAILED: &str = "POSITION_MODE_FAILED";
    pub const GET_POSITION_MODE_FAILED: &str = "GET_POSITION_MODE_FAILED";

    /// 일시적 장애로 분류되는 코드 목록.
    pub const RETRYABLE: [&str; 4] = [RATE_LIMIT, NETWORK_ERROR, TIMEOUT, SERVER_ERROR];
}

/// 센티널 에러 조건.
///
/// 래핑된 에러에서도 [`BrokerError::is`]로 검사할 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotConnected,
    InvalidCredentials,
    InvalidSymbol,
    InvalidOrderType,
    InvalidOrderSide,
    InvalidQuantity,
    InvalidPrice,
    InsufficientBalance,
    OrderNotFound,
    PositionNotFound,
    MarketClosed,
    RateLimitExceeded,
    ApiError,
    NetworkError,
    Timeout,
    InvalidLeverage,
    InvalidMarginType,
    BrokerNotFound,
}

/// 브로커 작업 에러.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 브로커가 연결되지 않음
    #[error("브로커가 연결되지 않음")]
    NotConnected,

    /// 잘못된 자격증명
    #[error("잘못된 자격증명")]
    InvalidCredentials,

    /// 잘못된 심볼
    #[error("잘못된 심볼: {0}")]
    InvalidSymbol(String),

    /// 잘못된 주문 유형
    #[error("잘못된 주문 유형: {0}")]
    InvalidOrderType(String),

    /// 잘못된 주문 방향
    #[error("잘못된 주문 방향: {0}")]
    InvalidOrderSide(String),

    /// 잘못된 수량
    #[error("잘못된 수량: {0}")]
    InvalidQuantity(String),

    /// 잘못된 가격
    #[error("잘못된 가격: {0}")]
    InvalidPrice(String),

    /// 잔고 부족
    #[error("잔고 부족")]
    InsufficientBalance,

    /// 주문을 찾을 수 없음
    #[error("주문을 찾을 수 없음")]
    OrderNotFound,

    /// 포지션을 찾을 수 없음
    #[error("포지션을 찾을 수 없음")]
    PositionNotFound,

    /// 시장이 닫혀 있음
    #[error("시장이 닫혀 있음")]
    MarketClosed,

    /// 요청 한도 초과
    #[error("요청 한도 초과")]
    RateLimitExceeded,

    /// 거래소 API 에러
    #[error("API 에러: {0}")]
    ApiError(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("요청 타임아웃")]
    Timeout,

    /// 잘못된 레버리지
    #[error("잘못된 레버리지: {0}")]
    InvalidLeverage(String),

    /// 잘못된 마진 유형
    #[error("잘못된 마진 유형: {0}")]
    InvalidMarginType(String),

    /// 브로커를 찾을 수 없음
    #[error("브로커를 찾을 수 없음: {0}")]
    BrokerNotFound(String),

    /// 거래소 이름과 코드가 붙은 브로커 범위 에러
    #[error("[{broker}] {code}: {message}")]
    Exchange {
        broker: String,
        code: String,
        message: String,
        #[source]
        source: Option<Box<BrokerError>>,
    },

    /// 호출자가 덧붙인 문맥
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<BrokerError>,
    },

    /// 시그널 검증 실패
    #[error("검증 실패: {0}")]
    Validation(String),

    /// 포지션 변화 없음
    #[error("포지션 변경이 필요하지 않음")]
    NoPositionChange,

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),

    /// 호출자가 작업을 취소함
    #[error("작업이 취소됨")]
    Cancelled,

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 여러 브로커에서 발생한 에러 묶음
    #[error("{}개 작업 실패: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<BrokerError>),
}

/// 브로커 작업을 위한 Result 타입.
pub type BrokerResult<T> = Result<T, BrokerError>;

fn join_errors(errors: &[BrokerError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl BrokerError {
    /// 원인 없는 브로커 범위 에러를 생성합니다.
    pub fn exchange(
        broker: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Exchange {
            broker: broker.into(),
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// 원인을 감싼 브로커 범위 에러를 생성합니다.
    pub fn wrap(
        broker: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        cause: BrokerError,
    ) -> Self {
        Self::Exchange {
            broker: broker.into(),
            code: code.into(),
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// 원인 체인을 보존한 채 문맥을 덧붙입니다.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// 여러 에러를 하나로 묶습니다. 비어 있으면 `None`.
    pub fn join(mut errors: Vec<BrokerError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// 이 에러 자체의 센티널 종류를 반환합니다 (래퍼는 `None`).
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            Self::NotConnected => ErrorKind::NotConnected,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::InvalidSymbol(_) => ErrorKind::InvalidSymbol,
            Self::InvalidOrderType(_) => ErrorKind::InvalidOrderType,
            Self::InvalidOrderSide(_) => ErrorKind::InvalidOrderSide,
            Self::InvalidQuantity(_) => ErrorKind::InvalidQuantity,
            Self::InvalidPrice(_) => ErrorKind::InvalidPrice,
            Self::InsufficientBalance => ErrorKind::InsufficientBalance,
            Self::OrderNotFound => ErrorKind::OrderNotFound,
            Self::PositionNotFound => ErrorKind::PositionNotFound,
            Self::MarketClosed => ErrorKind::MarketClosed,
            Self::RateLimitExceeded => ErrorKind::RateLimitExceeded,
            Self::ApiError(_) => ErrorKind::ApiError,
            Self::NetworkError(_) => ErrorKind::NetworkError,
            Self::Timeout => ErrorKind::Timeout,
            Self::InvalidLeverage(_) => ErrorKind::InvalidLeverage,
            Self::InvalidMarginType(_) => ErrorKind::InvalidMarginType,
            Self::BrokerNotFound(_) => ErrorKind::BrokerNotFound,
            _ => return None,
        };
        Some(kind)
    }

    /// 래핑된 직접 원인을 반환합니다.
    pub fn cause(&self) -> Option<&BrokerError> {
        match self {
            Self::Exchange { source, .. } => source.as_deref(),
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }

    /// 자기 자신부터 시작하는 원인 체인을 순회합니다.
    pub fn chain(&self) -> impl Iterator<Item = &BrokerError> {
        std::iter::successors(Some(self), |err| err.cause())
    }

    /// 원인 체인 어딘가에 주어진 센티널이 있는지 확인합니다.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.chain().any(|err| err.kind() == Some(kind))
    }

    /// 원인 체인에서 가장 바깥쪽 브로커 범위 에러의 코드를 반환합니다.
    pub fn broker_code(&self) -> Option<&str> {
        self.chain().find_map(|err| match err {
            Self::Exchange { code, .. } => Some(code.as_str()),
            _ => None,
        })
    }

    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 요청 한도 초과, 네트워크 에러, 타임아웃이거나 이를 감싼 경우,
    /// 또는 브로커 범위 에러의 코드가 일시적 장애 코드인 경우에 해당합니다.
    pub fn is_retryable(&self) -> bool {
        self.chain().any(|err| match err {
            Self::RateLimitExceeded | Self::NetworkError(_) | Self::Timeout => true,
            Self::Exchange { code, .. } => codes::RETRYABLE.contains(&code.as_str()),
            _ => false,
        })
    }

    /// 연결 상태 에러인지 확인합니다 (재초기화 전에는 재시도 불가).
    pub fn is_connection_state(&self) -> bool {
        self.is(ErrorKind::NotConnected) || self.is(ErrorKind::InvalidCredentials)
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::ApiError(format!("응답 파싱 실패: {}", err))
    }
}
