// miniSync Core Library (russh 기반)
// author: kodeholic (powered by Claude)
//
// 리모트 ↔ 로컬 디렉토리 동기화 엔진
// - mirror   : 리모트 트리 → 로컬 트리 (재귀)
// - upload   : 로컬 평면 디렉토리 → 리모트 (suffix 필터 + cleanup)
// - layout   : 로컬 디렉토리 골격 생성
// - pipeline : 결과 다운로드 / 리모트 명령 실행

pub mod config;
pub mod error;
pub mod layout;
pub mod memory;
pub mod mirror;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod session;
pub mod sftp;
pub mod state;
pub mod transport;
pub mod upload;

pub use config::{AuthMethod, ConnectConfig};
pub use error::{Error, Result, Side};
pub use mirror::{mirror_dir, Mirror, MirrorReport, SyncResult};
pub use policy::{CachedDecider, ChangePolicy, OverwriteDecider, OverwriteDecision};
pub use transport::{FileEntry, FileKind, FileStat, Transport};
pub use upload::{upload_files, Upload, UploadReport};
