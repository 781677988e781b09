// miniSync Progress Reporter
// author: kodeholic (powered by Claude)
//
// 카운터 → 사람이 읽는 상태 문자열 (순수 함수, IO 없음)
// - format_ordinal_progress : "[   3/12] ( 25.00%)"
// - format_byte_progress    : "transferred: 50/100 bytes [50.00%] incomplete"
// - format_level_summary    : 디렉토리 한 단계의 성공/실패 요약
// - fmt_size / mtime_str    : 리모트 목록 출력용

use chrono::{DateTime, Local, LocalResult, TimeZone, Utc};

use crate::mirror::SyncResult;

/// 0으로 나누지 않는 백분율
pub fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 { part as f64 / total as f64 * 100.0 } else { 0.0 }
}

/// 디렉토리 안에서 몇 번째 파일인지
pub fn format_ordinal_progress(index: u64, total: u64) -> String {
    format!("[{:4}/{}] ({:6.2}%)", index, total, percentage(index, total))
}

/// 전송 후 바이트 비교 결과. transferred >= total이면 OK
pub fn format_byte_progress(transferred: u64, total: u64) -> String {
    let status = if transferred >= total { "OK" } else { "incomplete" };
    format!("transferred: {}/{} bytes [{:.2}%] {}",
        transferred, total, percentage(transferred, total), status)
}

/// 한 단계 요약. 처리한 파일이 없으면 None
pub fn format_level_summary(dir: &str, result: &SyncResult) -> Option<String> {
    let total = (result.succeeded + result.failed) as u64;
    if total == 0 {
        return None;
    }
    Some(format!(
        "{}: {} succeeded [{:5.1}%], {} failed [{:5.1}%], total {}",
        dir,
        result.succeeded, percentage(result.succeeded as u64, total),
        result.failed, percentage(result.failed as u64, total),
        total,
    ))
}

/// 바이트 → 사람이 읽기 좋은 단위 문자열
pub fn fmt_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB      { format!("{:.1}GB", bytes as f64 / GB as f64) }
    else if bytes >= MB { format!("{:.1}MB", bytes as f64 / MB as f64) }
    else if bytes >= KB { format!("{:.1}KB", bytes as f64 / KB as f64) }
    else                { format!("{}B",     bytes) }
}

/// unix timestamp → "2021-11-11 09:30:00" (로컬 시간)
pub fn mtime_str(ts: u64) -> String {
    let dt: DateTime<Local> = match Utc.timestamp_opt(ts as i64, 0) {
        LocalResult::Single(utc) => utc.with_timezone(&Local),
        _ => return "?".to_string(),
    };
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
