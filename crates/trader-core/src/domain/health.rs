//! 브로커 상태 점검 결과.

use serde::{Deserialize, Serialize};

/// 브로커 하나의 상태.
///
/// 점검할 때마다 새로 계산되며 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerHealth {
    /// 브로커 이름
    pub name: String,
    /// 연결 여부
    pub connected: bool,
    /// 마지막 에러
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BrokerHealth {
    /// 정상 상태.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: true,
            error: None,
        }
    }

    /// 비정상 상태.
    pub fn unhealthy(name: impl Into<String>, connected: bool, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            connected,
            error: Some(error.to_string()),
        }
    }

    /// 연결되어 있고 에러가 없는지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        self.connected && self.error.is_none()
    }
}
