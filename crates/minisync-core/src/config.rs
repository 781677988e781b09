// miniSync Connection Config
// author: kodeholic (powered by Claude)
//
// 원격 호스트 접속 정보. 엔진 옵션(suffix, policy 등)은 각 엔진 builder에 있음

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 22;

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
}

#[derive(Debug, Clone)]
pub enum AuthMethod {
    Password(String),
    PublicKey { private_key_path: PathBuf },
}

impl ConnectConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 접속 전 필수 항목 확인 (I/O 없음)
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Configuration("host is empty".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Configuration("username is empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Configuration("port must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, user: &str) -> ConnectConfig {
        ConnectConfig {
            host: host.to_string(),
            port: DEFAULT_PORT,
            username: user.to_string(),
            auth: AuthMethod::Password("pw".to_string()),
        }
    }

    #[test]
    fn addr_joins_host_and_port() {
        assert_eq!(config("10.0.0.5", "tst").addr(), "10.0.0.5:22");
    }

    #[test]
    fn empty_host_or_user_is_rejected() {
        assert!(matches!(config("", "tst").validate(), Err(Error::Configuration(_))));
        assert!(matches!(config("host", " ").validate(), Err(Error::Configuration(_))));
        assert!(config("host", "tst").validate().is_ok());
    }
}
