// miniSync Transfer Policy
// author: kodeholic (powered by Claude)
//
// TransferDecision  : 파일 하나에 대한 판정 (MISSING / STALE / UP_TO_DATE)
// ChangePolicy      : 판정 기준
//   - SizeOnly    : 크기만 비교 (기본값, 기존 동작)
//   - SizeOrNewer : 크기 + 원본 mtime이 더 최신이면 STALE
// OverwriteDecider  : STALE 파일을 덮어쓸지 묻는 콜백 (엔진은 직접 묻지 않음)
// CachedDecider     : "모두 덮어쓰기 / 모두 건너뛰기" 응답을 실행 끝까지 기억
//
// 크기가 같고 내용만 다른 파일은 SizeOnly에서 다시 전송되지 않음

use crate::transport::FileStat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDecision {
    Missing,
    Stale,
    UpToDate,
}

impl TransferDecision {
    pub fn reason(self) -> &'static str {
        match self {
            TransferDecision::Missing  => "missing",
            TransferDecision::Stale    => "sizes differ",
            TransferDecision::UpToDate => "up to date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    #[default]
    SizeOnly,
    SizeOrNewer,
}

/// 원본(source)과 대상(destination) stat으로 전송 필요 여부 판정
///
/// destination이 None이면 MISSING
pub fn decide(source: &FileStat, destination: Option<&FileStat>, policy: ChangePolicy) -> TransferDecision {
    let Some(dest) = destination else {
        return TransferDecision::Missing;
    };

    if dest.size < source.size {
        return TransferDecision::Stale;
    }

    if policy == ChangePolicy::SizeOrNewer {
        if let (Some(src_mtime), Some(dest_mtime)) = (source.mtime, dest.mtime) {
            if src_mtime > dest_mtime {
                return TransferDecision::Stale;
            }
        }
    }

    TransferDecision::UpToDate
}

// ── 덮어쓰기 확인 ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    Overwrite,
    Skip,
    OverwriteAll,
    SkipAll,
}

impl OverwriteDecision {
    pub fn allows(self) -> bool {
        matches!(self, OverwriteDecision::Overwrite | OverwriteDecision::OverwriteAll)
    }
}

/// 덮어쓰기 확인 콜백
///
/// CLI: stdin 프롬프트
/// 테스트: 미리 정한 응답 목록
pub trait OverwriteDecider: Send {
    fn decide(&mut self, path: &str) -> OverwriteDecision;
}

impl<F> OverwriteDecider for F
where
    F: FnMut(&str) -> OverwriteDecision + Send,
{
    fn decide(&mut self, path: &str) -> OverwriteDecision {
        self(path)
    }
}

/// *All 응답을 기억해서 이후로는 묻지 않는 래퍼
pub struct CachedDecider<D> {
    inner: D,
    sticky: Option<OverwriteDecision>,
}

impl<D: OverwriteDecider> CachedDecider<D> {
    pub fn new(inner: D) -> Self {
        Self { inner, sticky: None }
    }
}

impl<D: OverwriteDecider> OverwriteDecider for CachedDecider<D> {
    fn decide(&mut self, path: &str) -> OverwriteDecision {
        if let Some(answer) = self.sticky {
            return answer;
        }
        let answer = self.inner.decide(path);
        if matches!(answer, OverwriteDecision::OverwriteAll | OverwriteDecision::SkipAll) {
            self.sticky = Some(answer);
        }
        answer
    }
}

/// 엔진 내부용: decider가 없으면 항상 덮어쓰기
pub(crate) fn confirm_overwrite(decider: &mut Option<&mut dyn OverwriteDecider>, path: &str) -> bool {
    match decider {
        Some(d) => d.decide(path).allows(),
        None    => true,
    }
}
