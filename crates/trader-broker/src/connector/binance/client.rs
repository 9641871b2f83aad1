//! Binance USDⓈ-M 선물 REST 클라이언트.
//!
//! HMAC-SHA256 서명 요청과 Binance 에러 코드 → 브로커 에러 매핑을 담당합니다.
//! 응답 형태는 [`super::models`]에 정의되어 있습니다.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, error};
use trader_core::{codes, mask_key, BrokerError, BrokerResult, Credentials, DEFAULT_REQUEST_TIMEOUT};

use super::models::{
    AccountResponse, ApiErrorResponse, ExchangeInfoResponse, LeverageResponse, OrderResponse,
    PositionModeResponse, PositionRiskResponse, ServerTimeResponse,
};
use super::NAME;
use crate::registry::ConnectorOptions;
use crate::retry::CONNECT_TIMEOUT;

type HmacSha256 = Hmac<Sha256>;

/// 메인넷 REST 기본 URL.
pub const MAINNET_URL: &str = "https://fapi.binance.com";

/// 테스트넷 REST 기본 URL.
pub const TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// 기본 수신 윈도우 (밀리초).
pub const DEFAULT_RECV_WINDOW: u64 = 5000;

/// Binance 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 `api_key`를 마스킹하고 `api_secret`은 출력하지 않습니다.
pub struct BinanceConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// REST 기본 URL
    pub base_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("api_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl BinanceConfig {
    /// 메인넷 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        let api_secret: String = api_secret.into();
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::new(api_secret.into()),
            base_url: MAINNET_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            recv_window: DEFAULT_RECV_WINDOW,
        }
    }

    /// 자격증명과 커넥터 옵션으로 설정을 생성합니다.
    ///
    /// `base_url`이 지정되면 테스트넷 여부보다 우선합니다.
    pub fn from_options(credentials: &Credentials, options: &ConnectorOptions) -> Self {
        let base_url = match &options.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if options.testnet => TESTNET_URL.to_string(),
            None => MAINNET_URL.to_string(),
        };

        Self {
            base_url,
            timeout: options.request_timeout,
            ..Self::new(credentials.api_key.clone(), credentials.secret_key())
        }
    }
}

/// Binance 선물 REST 클라이언트.
///
/// 내부 `reqwest::Client`는 스레드 안전하므로 동시 조회에 공유할 수 있습니다.
#[derive(Debug)]
pub struct BinanceFuturesClient {
    config: BinanceConfig,
    client: Client,
}

impl BinanceFuturesClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `BrokerError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceConfig) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 설정 조회.
    pub fn config(&self) -> &BinanceConfig {
        &self.config
    }

    fn timestamp_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    pub(crate) fn sign(&self, query: &str) -> BrokerResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.expose_secret().as_bytes())
            .map_err(|_| BrokerError::InvalidCredentials)?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> BrokerResult<T> {
        let query = Self::build_query(params);
        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.config.base_url, endpoint, query)
        };

        debug!(endpoint, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::handle_response(response).await
    }

    /// 서명된 API 요청.
    ///
    /// POST는 폼 본문으로, GET/DELETE는 쿼리 문자열로 파라미터를 보냅니다.
    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> BrokerResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut all_params = params.to_vec();
        all_params.push(("timestamp", Self::timestamp_ms().to_string()));
        all_params.push(("recvWindow", self.config.recv_window.to_string()));

        let query = Self::build_query(&all_params);
        let signed_query = format!("{}&signature={}", query, self.sign(&query)?);

        debug!(%method, endpoint, "signed request");

        let request = if method == Method::POST {
            self.client
                .post(&url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(signed_query)
        } else {
            self.client
                .request(method, format!("{}?{}", url, signed_query))
        };

        let response = request
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> BrokerResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!(error = %e, body = %body, "응답 파싱 실패");
                BrokerError::from(e)
            });
        }

        Err(map_http_error(status, &body))
    }

    // ========================================================================
    // 엔드포인트
    // ========================================================================

    /// 서버 시간 조회 (연결 프로브).
    pub async fn server_time(&self) -> BrokerResult<i64> {
        let resp: ServerTimeResponse = self.public_get("/fapi/v1/time", &[]).await?;
        Ok(resp.server_time)
    }

    /// 계좌 정보.
    pub async fn account(&self) -> BrokerResult<AccountResponse> {
        self.signed(Method::GET, "/fapi/v2/account", &[]).await
    }

    /// 포지션 위험 정보 (심볼별 포지션).
    pub async fn position_risk(&self, symbol: Option<&str>) -> BrokerResult<Vec<PositionRiskResponse>> {
        let params: Vec<(&str, String)> = symbol
            .map(|s| vec![("symbol", s.to_string())])
            .unwrap_or_default();
        self.signed(Method::GET, "/fapi/v2/positionRisk", &params).await
    }

    /// 레버리지 변경.
    pub async fn change_leverage(&self, symbol: &str, leverage: u32) -> BrokerResult<LeverageResponse> {
        let params = [("symbol", symbol.to_string()), ("leverage", leverage.to_string())];
        self.signed(Method::POST, "/fapi/v1/leverage", &params).await
    }

    /// 마진 유형 변경 (`ISOLATED` 또는 `CROSSED`).
    pub async fn change_margin_type(&self, symbol: &str, margin_type: &str) -> BrokerResult<()> {
        let params = [("symbol", symbol.to_string()), ("marginType", margin_type.to_string())];
        let _: serde_json::Value = self.signed(Method::POST, "/fapi/v1/marginType", &params).await?;
        Ok(())
    }

    /// 신규 주문.
    pub async fn new_order(&self, params: &[(&str, String)]) -> BrokerResult<OrderResponse> {
        self.signed(Method::POST, "/fapi/v1/order", params).await
    }

    /// 주문 조회.
    pub async fn query_order(&self, symbol: &str, order_id: i64) -> BrokerResult<OrderResponse> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.signed(Method::GET, "/fapi/v1/order", &params).await
    }

    /// 주문 취소.
    pub async fn cancel_order(&self, symbol: &str, order_id: i64) -> BrokerResult<OrderResponse> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.signed(Method::DELETE, "/fapi/v1/order", &params).await
    }

    /// 미체결 주문.
    pub async fn open_orders(&self, symbol: Option<&str>) -> BrokerResult<Vec<OrderResponse>> {
        let params: Vec<(&str, String)> = symbol
            .map(|s| vec![("symbol", s.to_string())])
            .unwrap_or_default();
        self.signed(Method::GET, "/fapi/v1/openOrders", &params).await
    }

    /// 전체 주문 이력.
    pub async fn all_orders(&self, symbol: &str, limit: Option<u32>) -> BrokerResult<Vec<OrderResponse>> {
        let mut params = vec![("symbol", symbol.to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.signed(Method::GET, "/fapi/v1/allOrders", &params).await
    }

    /// 거래소 정보.
    pub async fn exchange_info(&self) -> BrokerResult<ExchangeInfoResponse> {
        self.public_get("/fapi/v1/exchangeInfo", &[]).await
    }

    /// 포지션 모드 변경 (`true` = 헤지 모드).
    pub async fn change_position_mode(&self, dual_side: bool) -> BrokerResult<()> {
        let params = [("dualSidePosition", dual_side.to_string())];
        let _: serde_json::Value = self
            .signed(Method::POST, "/fapi/v1/positionSide/dual", &params)
            .await?;
        Ok(())
    }

    /// 현재 포지션 모드 (`true` = 헤지 모드).
    pub async fn position_mode(&self) -> BrokerResult<bool> {
        let resp: PositionModeResponse = self
            .signed(Method::GET, "/fapi/v1/positionSide/dual", &[])
            .await?;
        Ok(resp.dual_side_position)
    }
}

/// 전송 계층 에러 매핑.
fn map_transport_error(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout
    } else {
        BrokerError::NetworkError(err.to_string())
    }
}

/// HTTP 실패 응답 매핑.
pub(crate) fn map_http_error(status: StatusCode, body: &str) -> BrokerError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return BrokerError::RateLimitExceeded;
    }

    if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(mapped) = map_error_code(err.code, &err.msg) {
            return mapped;
        }
        if status.is_server_error() {
            return BrokerError::exchange(NAME, codes::SERVER_ERROR, format!("{}: {}", err.code, err.msg));
        }
        return BrokerError::ApiError(format!("{}: {}", err.code, err.msg));
    }

    if status.is_server_error() {
        return BrokerError::exchange(NAME, codes::SERVER_ERROR, format!("HTTP {}: {}", status.as_u16(), body));
    }

    BrokerError::ApiError(format!("HTTP {}: {}", status.as_u16(), body))
}

/// Binance 에러 코드를 센티널 에러로 매핑. 대응하는 센티널이 없으면 `None`.
pub(crate) fn map_error_code(code: i64, msg: &str) -> Option<BrokerError> {
    let err = match code {
        -1001 => BrokerError::NetworkError(msg.to_string()),
        -1003 | -1015 => BrokerError::RateLimitExceeded,
        -1007 => BrokerError::Timeout,
        -1013 | -4003 => BrokerError::InvalidQuantity(msg.to_string()),
        -1021 => BrokerError::NetworkError(format!("타임스탬프 불일치: {}", msg)),
        -1022 | -2014 | -2015 => BrokerError::InvalidCredentials,
        -1116 => BrokerError::InvalidOrderType(msg.to_string()),
        -1117 => BrokerError::InvalidOrderSide(msg.to_string()),
        -1121 => BrokerError::InvalidSymbol(msg.to_string()),
        -2010 | -2019 => BrokerError::InsufficientBalance,
        -2011 | -2013 => BrokerError::OrderNotFound,
        -4001 | -4014 => BrokerError::InvalidPrice(msg.to_string()),
        -4028 => BrokerError::InvalidLeverage(msg.to_string()),
        -4046 | -4047 | -4048 => BrokerError::InvalidMarginType(msg.to_string()),
        _ => return None,
    };
    Some(err)
}
