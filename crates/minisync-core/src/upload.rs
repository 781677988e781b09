// miniSync Upload Engine (업로드 방향)
// author: kodeholic (powered by Claude)
//
// 평평한 로컬 디렉토리에서 suffix가 맞는 파일만 리모트 디렉토리로 올림. 로컬이 원본
//
// 1. 리모트 작업 디렉토리 변경 (실패 시 호출 전체 중단)
// 2. 로컬 목록 → suffix 필터 → 이름순 정렬
// 3. 파일마다 리모트 stat → MISSING / STALE이면 put, 아니면 건너뜀
// 4. 리모트 목록을 다시 읽어 리모트와 일치하는 로컬 파일은 삭제 (cleanup)
//    실패/거절된 파일과 정책상 아직 STALE인 파일은 남김
//
// 파일 단위 실패는 로그 + failed_paths 기록 후 계속 진행

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::policy::{confirm_overwrite, decide, ChangePolicy, OverwriteDecider, TransferDecision};
use crate::progress::{fmt_size, format_ordinal_progress, mtime_str};
use crate::transport::{FileEntry, FileKind, FileStat, Transport};

/// 압축된 입력 데이터 확장자
pub const DEFAULT_SUFFIX: &str = ".csv.gz";

#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub skipped: usize,
    pub declined: usize,
    pub failed_paths: Vec<String>,
    /// cleanup으로 삭제된 로컬 파일
    pub deleted: Vec<PathBuf>,
    /// 업로드 후 리모트 작업 디렉토리 목록
    pub remote_listing: Vec<FileEntry>,
}

pub struct Upload<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    suffix: String,
    cleanup: bool,
    policy: ChangePolicy,
    decider: Option<&'a mut dyn OverwriteDecider>,
}

impl<'a, T: Transport + ?Sized> Upload<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            suffix: DEFAULT_SUFFIX.to_string(),
            cleanup: true,
            policy: ChangePolicy::default(),
            decider: None,
        }
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// false면 업로드 후에도 로컬 파일을 지우지 않음
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn policy(mut self, policy: ChangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn decider(mut self, decider: &'a mut dyn OverwriteDecider) -> Self {
        self.decider = Some(decider);
        self
    }

    pub async fn run(mut self, local_dir: &Path, remote_dir: &str) -> Result<UploadReport> {
        if local_dir.as_os_str().is_empty() {
            return Err(Error::Configuration("local directory is empty".to_string()));
        }
        if remote_dir.is_empty() {
            return Err(Error::Configuration("remote directory is empty".to_string()));
        }
        if self.suffix.is_empty() {
            return Err(Error::Configuration("file suffix is empty".to_string()));
        }

        tracing::info!("changing to remote directory '{}'", remote_dir);
        self.transport.change_working_directory(remote_dir).await?;
        tracing::info!("remote directory: {}", self.transport.current_working_directory());

        let candidates = matching_local_files(local_dir, &self.suffix).await?;
        let total = candidates.len() as u64;
        let mut report = UploadReport::default();
        // 실패/거절된 파일: 리모트가 로컬과 다르므로 cleanup 대상에서 제외
        let mut held = HashSet::new();

        for (i, entry) in candidates.iter().enumerate() {
            tracing::info!("{} checking {}", format_ordinal_progress(i as u64 + 1, total), entry.path);
            if !self.upload_one(local_dir, entry, &mut report).await {
                held.insert(entry.path.clone());
            }
        }

        self.reconcile(local_dir, remote_dir, &held, &mut report).await?;

        tracing::info!(
            "upload done: {} uploaded, {} up to date, {} declined, {} failed, {} local copies removed",
            report.uploaded.len(), report.skipped, report.declined,
            report.failed_paths.len(), report.deleted.len(),
        );
        Ok(report)
    }

    /// 파일 하나 판정 → put. 리모트가 로컬과 같아졌거나 이미 같으면 true
    async fn upload_one(&mut self, local_dir: &Path, entry: &FileEntry, report: &mut UploadReport) -> bool {
        let local_path = local_dir.join(&entry.path);

        let remote = match self.transport.stat(&entry.path).await {
            Ok(st) => Some(st),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!("unable to stat remote {}: {}", entry.path, e);
                report.failed_paths.push(entry.path.clone());
                return false;
            }
        };

        let decision = decide(&entry.stat(), remote.as_ref(), self.policy);
        match decision {
            TransferDecision::UpToDate => {
                tracing::debug!("{} ... OK", entry.path);
                report.skipped += 1;
                return true;
            }
            TransferDecision::Stale if !confirm_overwrite(&mut self.decider, &entry.path) => {
                tracing::info!("skipping {} (overwrite declined)", entry.path);
                report.declined += 1;
                return false;
            }
            _ => {}
        }

        tracing::info!("uploading (put) file `{}` [{}]", local_path.display(), decision.reason());
        match self.transport.put(&local_path, &entry.path).await {
            Ok(n) => {
                tracing::info!("  {} sent", fmt_size(n));
                report.uploaded.push(entry.path.clone());
                true
            }
            Err(e) => {
                tracing::warn!("put {} failed: {}", entry.path, e);
                report.failed_paths.push(entry.path.clone());
                false
            }
        }
    }

    /// 리모트 목록 재확인 + 리모트와 일치하는 로컬 사본 삭제
    async fn reconcile(
        &mut self,
        local_dir: &Path,
        remote_dir: &str,
        held: &HashSet<String>,
        report: &mut UploadReport,
    ) -> Result<()> {
        let mut names = self.transport.list(".").await?;
        names.sort();

        tracing::info!("remote content after transferring");
        tracing::info!("{:<10}{:<24}{}", "size", "modified", "name");
        for name in names {
            let st = match self.transport.stat(&name).await {
                Ok(st) => st,
                Err(e) => {
                    tracing::warn!("unable to stat remote {}: {}", name, e);
                    continue;
                }
            };
            tracing::info!("{:<10}{:<24}{}/{}",
                st.size, st.mtime.map(mtime_str).unwrap_or_else(|| "?".to_string()), remote_dir, name);

            if self.cleanup && st.is_regular() && !held.contains(&name) {
                let just_sent = report.uploaded.contains(&name);
                if let Some(path) = remove_if_mirrored(local_dir, &name, &st, self.policy, just_sent).await {
                    report.deleted.push(path);
                }
            }
            report.remote_listing.push(FileEntry::new(name, &st));
        }
        Ok(())
    }
}

/// 로컬 사본이 리모트와 일치하면 삭제하고 경로 반환
///
/// 크기가 같아야 하고, 이번에 보낸 파일이 아니면 정책상으로도 UP_TO_DATE여야 함
async fn remove_if_mirrored(
    local_dir: &Path,
    name: &str,
    remote: &FileStat,
    policy: ChangePolicy,
    just_sent: bool,
) -> Option<PathBuf> {
    let path = local_dir.join(name);
    let meta = tokio::fs::metadata(&path).await.ok()?;
    if !meta.is_file() || meta.len() != remote.size {
        return None;
    }
    let local = FileStat::from_metadata(&meta);
    if !just_sent && decide(&local, Some(remote), policy) != TransferDecision::UpToDate {
        tracing::info!("keeping `{}` [remote copy is older]", path.display());
        return None;
    }
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!("deleting file `{}` [already in remote]", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("unable to delete {}: {}", path.display(), e);
            None
        }
    }
}

/// 로컬 디렉토리에서 suffix로 끝나는 정규 파일 (이름 오름차순)
async fn matching_local_files(dir: &Path, suffix: &str) -> Result<Vec<FileEntry>> {
    let mut read = tokio::fs::read_dir(dir).await.map_err(|e| Error::local_io(dir, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = read.next_entry().await.map_err(|e| Error::local_io(dir, e))? {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                tracing::warn!("skipping {:?} (name is not valid UTF-8)", raw);
                continue;
            }
        };
        if !name.ends_with(suffix) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else { continue };
        let stat = FileStat::from_metadata(&meta);
        if stat.kind == FileKind::Regular {
            entries.push(FileEntry::new(name, &stat));
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// 기본 옵션(.csv.gz, cleanup 켬, 크기 비교)으로 업로드
pub async fn upload_files<T: Transport + ?Sized>(
    transport: &mut T,
    local_dir: &Path,
    remote_dir: &str,
) -> Result<UploadReport> {
    Upload::new(transport).run(local_dir, remote_dir).await
}
