// miniSync CLI Logging
// author: kodeholic (powered by Claude)
//
// tracing-subscriber 설정
// - 콘솔 : fmt 레이어 (RUST_LOG, 기본 info)
// - 세션 로그 : 같은 이벤트를 파일에도 기록 (ANSI 없음, 0o640)
//   기본 경로 = <log-dir>/YYYY/MM/DD/YYYY_MM_DDTHH_MM_SS.log

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use minisync_core::error::{Error, Result};
use minisync_core::layout::{ensure_dir, DEFAULT_DIR_MODE};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = "log";
const LOG_FILE_MODE: u32 = 0o640;

/// 세션 시작 시각 기준 로그 파일 경로
pub fn session_log_path(root: &Path, now: &DateTime<Local>) -> PathBuf {
    root.join(now.format("%Y").to_string())
        .join(now.format("%m").to_string())
        .join(now.format("%d").to_string())
        .join(format!("{}.log", now.format("%Y_%m_%dT%H_%M_%S")))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent, DEFAULT_DIR_MODE)?;
    }

    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(LOG_FILE_MODE);
    }
    opts.open(path).map_err(|e| Error::local_io(path, e))
}

pub fn init(log_file: Option<&Path>) -> Result<()> {
    // RUST_LOG=debug minisync ...  (UP-TO-DATE 파일 / 상태 전이까지 출력)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_layer = log_file
        .map(open_log_file)
        .transpose()?
        .map(|file| {
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Configuration(format!("unable to install logger: {}", e)))
}
