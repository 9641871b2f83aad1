//! 브로커 API 재시도 및 데드라인 유틸리티.
//!
//! 네트워크 오류, 요청 한도 초과 등 일시적인 오류에 대해 지수 백오프로 재시도합니다.
//! 재시도 여부는 [`BrokerError::is_retryable`]로 판정합니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use trader_broker::retry::{retry_with_backoff, RetryConfig};
//!
//! let cancel = CancellationToken::new();
//! let order = retry_with_backoff(&RetryConfig::default(), &cancel, || async {
//!     broker.place_order(&request).await
//! })
//! .await?;
//! ```

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trader_core::{BrokerError, BrokerResult};

/// 연결/초기화 프로브 데드라인.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 주문 제출 및 상태 조회 데드라인.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 백오프 대기 상한.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외).
    pub max_retries: u32,
    /// 첫 재시도 전 대기 시간. 이후 매번 두 배.
    pub base_delay: Duration,
    /// 최대 대기 시간.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: MAX_BACKOFF,
        }
    }
}

impl RetryConfig {
    /// 주어진 재시도 횟수와 기본 지연으로 설정을 생성합니다.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_BACKOFF,
        }
    }

    /// 주문 제출용 설정 (최대 2회 시도).
    pub fn order_submission() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: MAX_BACKOFF,
        }
    }

    /// 재시도 없음 (단일 시도).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// `attempt`번째 재시도(1부터) 전 대기 시간.
    ///
    /// `base_delay * 2^(attempt-1)`, `max_delay`로 상한.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 재시도 가능한 에러에 대해 지수 백오프로 작업을 반복합니다.
///
/// - 재시도 불가능한 에러는 남은 횟수와 무관하게 즉시 반환합니다.
/// - 대기 중 `cancel`이 발동하면 마지막 작업 에러 대신 [`BrokerError::Cancelled`]를 반환합니다.
/// - 진행 중인 요청 자체는 중단하지 않으며, 이후 재시도만 막습니다.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> BrokerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BrokerResult<T>>,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "재시도 대기 중");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "재시도 후 성공");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                debug!(error = %e, "재시도 불가능한 에러");
                return Err(e);
            }
            Err(e) if attempt >= config.max_retries => {
                warn!(error = %e, attempts = attempt + 1, "최대 재시도 횟수 도달");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, attempt = attempt + 1, max_retries = config.max_retries, "일시적 에러, 재시도 예정");
                attempt += 1;
            }
        }
    }
}

/// 작업에 데드라인을 적용합니다. 초과 시 [`BrokerError::Timeout`].
pub async fn with_deadline<T, Fut>(deadline: Duration, operation: Fut) -> BrokerResult<T>
where
    Fut: Future<Output = BrokerResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(BrokerError::Timeout),
    }
}
