// miniSync Error Types
// author: kodeholic (powered by Claude)
//
// 엔진 전체에서 공유하는 에러 분류
// - Configuration   : I/O 이전 인자 검증 실패
// - NotFound        : 로컬/리모트 경로 없음 (Side로 구분)
// - NotADirectory   : 디렉토리여야 하는 경로가 파일
// - Transport       : 네트워크/프로토콜 실패
// - PartialTransfer : 전송 후 크기 불일치
// - FsConflict      : 디렉토리 생성 위치를 파일이 점유

use std::fmt;
use std::path::PathBuf;

use crate::state::ConnectionState;

/// 에러가 발생한 쪽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local  => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("No such {side} path: {path}")]
    NotFound { side: Side, path: String },

    #[error("Not a directory ({side}): {path}")]
    NotADirectory { side: Side, path: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Partial transfer of {path}: expected {expected} bytes, got {actual}")]
    PartialTransfer { path: String, expected: u64, actual: u64 },

    #[error("Path exists and is not a directory: {}", path.display())]
    FsConflict { path: PathBuf },

    #[error("IO error: {0}")]
    Io(std::io::Error),

    #[error("Auth failed: {0}")]
    Auth(String),

    #[error("Invalid state transition: {from:?} → {to:?}")]
    InvalidTransition { from: ConnectionState, to: ConnectionState },

    #[error("Remote command `{command}` exited with status {status}")]
    Remote { command: String, status: u32 },
}

impl Error {
    /// 로컬 IO 에러에 경로 문맥을 붙임 (NotFound는 별도 variant로)
    pub fn local_io(path: impl Into<PathBuf>, e: std::io::Error) -> Self {
        let path = path.into();
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { side: Side::Local, path: path.display().to_string() }
        } else {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_io_maps_not_found() {
        let e = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::local_io("/tmp/x", e);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No such local path: /tmp/x");
    }

    #[test]
    fn local_io_keeps_other_kinds() {
        let e = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::local_io("/root/secret", e);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("/root/secret"));
    }
}
