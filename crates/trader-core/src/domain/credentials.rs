//! 거래소 API 자격증명.

use crate::error::{BrokerError, BrokerResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// 거래소 API 자격증명.
///
/// 시크릿은 `SecretString`으로 보관되어 로그에 노출되지 않습니다.
/// 커넥터의 `initialize`에 넘겨진 뒤에는 변경되지 않습니다.
pub struct Credentials {
    /// API 키
    pub api_key: String,
    secret_key: SecretString,
    passphrase: Option<SecretString>,
}

impl Credentials {
    /// 새 자격증명을 생성합니다.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: SecretString::new(secret_key.into().into()),
            passphrase: None,
        }
    }

    /// 세 번째 시크릿이 필요한 거래소(OKX 등)용 패스프레이즈를 설정합니다.
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        let passphrase: String = passphrase.into();
        if !passphrase.is_empty() {
            self.passphrase = Some(SecretString::new(passphrase.into()));
        }
        self
    }

    /// 시크릿 키.
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    /// 패스프레이즈.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.expose_secret())
    }

    /// API 키와 시크릿 키가 모두 있는지 확인합니다.
    pub fn validate(&self) -> BrokerResult<()> {
        if self.api_key.trim().is_empty() || self.secret_key().trim().is_empty() {
            return Err(BrokerError::InvalidCredentials);
        }
        Ok(())
    }
}

/// API 키 마스킹 (앞뒤 4자만 노출).
pub fn mask_key(key: &str) -> String {
    if key.len() > 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***REDACTED***".to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask_key(&self.api_key))
            .field("secret_key", &"[REDACTED]")
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}
