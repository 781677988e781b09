// miniSync Mirror Engine (다운로드 방향)
// author: kodeholic (powered by Claude)
//
// 리모트 트리를 로컬 트리로 복제. 리모트가 항상 원본
//
// SyncResult   : 디렉토리 한 단계의 직속 파일 결과 (하위 디렉토리 결과는 합산하지 않음)
// LevelReport  : 방문한 디렉토리마다 하나 (깊이 우선 전위 순서)
// MirrorReport : 한 번의 실행에서 나온 LevelReport 전체
// Mirror       : builder (policy, decider) + run()
//
// 순회는 재귀 대신 명시적 스택(Frame)으로 수행
// 루트 단계의 사전 검사/목록 실패만 호출 전체를 중단시키고,
// 하위 디렉토리/파일 단위 실패는 기록 후 계속 진행

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, Side};
use crate::layout::{ensure_dir, DEFAULT_DIR_MODE};
use crate::policy::{confirm_overwrite, decide, ChangePolicy, OverwriteDecider, TransferDecision};
use crate::progress::{format_byte_progress, format_level_summary, format_ordinal_progress};
use crate::transport::{join_remote, FileEntry, FileKind, FileStat, Transport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub succeeded: usize,
    pub failed: usize,
    pub failed_paths: Vec<String>,
    /// 덮어쓰기 확인에서 거절된 파일 수 (실패로 세지 않음)
    pub declined: usize,
}

impl SyncResult {
    fn record_failure(&mut self, path: String) {
        self.failed += 1;
        self.failed_paths.push(path);
    }
}

#[derive(Debug)]
pub enum LevelOutcome {
    Synced(SyncResult),
    Failed(Error),
}

#[derive(Debug)]
pub struct LevelReport {
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub outcome: LevelOutcome,
}

impl LevelReport {
    pub fn result(&self) -> Option<&SyncResult> {
        match &self.outcome {
            LevelOutcome::Synced(r) => Some(r),
            LevelOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MirrorReport {
    pub levels: Vec<LevelReport>,
}

impl MirrorReport {
    /// 루트 단계 결과 (run()이 Ok면 항상 존재)
    pub fn root(&self) -> Option<&SyncResult> {
        self.levels.first().and_then(LevelReport::result)
    }

    pub fn level(&self, remote_dir: &str) -> Option<&LevelReport> {
        self.levels.iter().find(|l| l.remote_dir == remote_dir)
    }

    pub fn total_succeeded(&self) -> usize {
        self.levels.iter().filter_map(LevelReport::result).map(|r| r.succeeded).sum()
    }

    /// 모든 단계의 실패 파일
    pub fn failed_paths(&self) -> impl Iterator<Item = &str> {
        self.levels.iter()
            .filter_map(LevelReport::result)
            .flat_map(|r| r.failed_paths.iter().map(String::as_str))
    }

    /// 디렉토리 단위로 실패한 단계
    pub fn failed_levels(&self) -> impl Iterator<Item = &LevelReport> {
        self.levels.iter().filter(|l| matches!(l.outcome, LevelOutcome::Failed(_)))
    }
}

// 스택 프레임 = 재귀 호출 한 번
struct Frame {
    remote_dir: String,
    local_dir: PathBuf,
    entries: Vec<FileEntry>,
    next: usize,
    total_files: u64,
    file_index: u64,
    result: SyncResult,
    slot: usize,  // report.levels 위치
}

pub struct Mirror<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    policy: ChangePolicy,
    decider: Option<&'a mut dyn OverwriteDecider>,
}

impl<'a, T: Transport + ?Sized> Mirror<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport, policy: ChangePolicy::default(), decider: None }
    }

    pub fn policy(mut self, policy: ChangePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// STALE 파일 덮어쓰기 전에 확인. MISSING 파일은 묻지 않음
    pub fn decider(mut self, decider: &'a mut dyn OverwriteDecider) -> Self {
        self.decider = Some(decider);
        self
    }

    pub async fn run(mut self, remote_dir: &str, local_dir: &Path) -> Result<MirrorReport> {
        if remote_dir.is_empty() {
            return Err(Error::Configuration("remote directory is empty".to_string()));
        }
        if local_dir.as_os_str().is_empty() {
            return Err(Error::Configuration("local directory is empty".to_string()));
        }

        // ---- 사전 검사 (변경 없음) ----
        let local_is_dir = tokio::fs::metadata(local_dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !local_is_dir {
            return Err(Error::NotADirectory { side: Side::Local, path: local_dir.display().to_string() });
        }
        let root_stat = self.transport.stat(remote_dir).await?;
        if !root_stat.is_dir() {
            return Err(Error::NotADirectory { side: Side::Remote, path: remote_dir.to_string() });
        }

        let mut report  = MirrorReport::default();
        let mut visited = HashSet::new();
        let mut stack   = Vec::new();

        let root = self.open_level(remote_dir, local_dir, &mut visited, 0).await?
            .ok_or_else(|| Error::Transport(format!("{}: already visited", remote_dir)))?;
        report.levels.push(LevelReport {
            remote_dir: remote_dir.to_string(),
            local_dir: local_dir.to_path_buf(),
            outcome: LevelOutcome::Synced(SyncResult::default()),
        });
        stack.push(root);

        loop {
            let Some(frame) = stack.last_mut() else { break };
            let Some(entry) = frame.entries.get(frame.next).cloned() else {
                if let Some(done) = stack.pop() {
                    finish_level(done, &mut report);
                }
                continue;
            };
            frame.next += 1;

            match entry.kind {
                FileKind::Regular => {
                    frame.file_index += 1;
                    self.sync_file(frame, &entry).await;
                }
                FileKind::Directory => {
                    let remote_child = join_remote(&frame.remote_dir, &entry.path);
                    let local_child  = frame.local_dir.join(&entry.path);
                    tracing::info!("descending into {}", remote_child);
                    if let Some(child) = self.enter(remote_child, local_child, &mut report, &mut visited).await {
                        stack.push(child);
                    }
                }
                FileKind::Other => {
                    tracing::debug!("skipping special file {}", join_remote(&frame.remote_dir, &entry.path));
                }
            }
        }

        Ok(report)
    }

    /// 하위 디렉토리 진입. 실패는 단계 결과로 기록하고 None
    async fn enter(
        &mut self,
        remote_dir: String,
        local_dir: PathBuf,
        report: &mut MirrorReport,
        visited: &mut HashSet<String>,
    ) -> Option<Frame> {
        let slot = report.levels.len();
        match self.open_level(&remote_dir, &local_dir, visited, slot).await {
            Ok(Some(frame)) => {
                report.levels.push(LevelReport {
                    remote_dir,
                    local_dir,
                    outcome: LevelOutcome::Synced(SyncResult::default()),
                });
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("unable to mirror {} into {}: {}", remote_dir, local_dir.display(), e);
                report.levels.push(LevelReport { remote_dir, local_dir, outcome: LevelOutcome::Failed(e) });
                None
            }
        }
    }

    /// 디렉토리 한 단계 준비: 루프 검사 → 목록 + 분류 → 로컬 디렉토리 보장
    async fn open_level(
        &mut self,
        remote_dir: &str,
        local_dir: &Path,
        visited: &mut HashSet<String>,
        slot: usize,
    ) -> Result<Option<Frame>> {
        let real = self.transport.realpath(remote_dir).await?;
        if !visited.insert(real.clone()) {
            tracing::warn!("{} resolves to already visited {}, skipping", remote_dir, real);
            return Ok(None);
        }

        let names = self.transport.list(remote_dir).await?;

        let mut result  = SyncResult::default();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let remote_path = join_remote(remote_dir, &name);
            match self.transport.stat(&remote_path).await {
                Ok(st) => entries.push(FileEntry::new(name, &st)),
                Err(e) => {
                    tracing::warn!("unable to stat remote {}: {}", remote_path, e);
                    result.record_failure(local_dir.join(&name).display().to_string());
                }
            }
        }

        ensure_dir(local_dir, DEFAULT_DIR_MODE)?;

        let total_files = entries.iter().filter(|e| e.kind == FileKind::Regular).count() as u64;
        Ok(Some(Frame {
            remote_dir: remote_dir.to_string(),
            local_dir: local_dir.to_path_buf(),
            entries,
            next: 0,
            total_files,
            file_index: 0,
            result,
            slot,
        }))
    }

    /// 정규 파일 하나 판정 → 전송 → 크기 재확인
    async fn sync_file(&mut self, frame: &mut Frame, entry: &FileEntry) {
        let remote_path = join_remote(&frame.remote_dir, &entry.path);
        let local_path  = frame.local_dir.join(&entry.path);
        let local_str   = local_path.display().to_string();

        tracing::info!("[{}] {}", frame.remote_dir, format_ordinal_progress(frame.file_index, frame.total_files));

        let local = match tokio::fs::metadata(&local_path).await {
            Ok(meta) => Some(FileStat::from_metadata(&meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("unable to stat local {}: {}", local_str, e);
                frame.result.record_failure(local_str);
                return;
            }
        };

        // 디렉토리 등이 자리를 점유 → 크기 비교 의미 없음
        if let Some(st) = local.as_ref().filter(|st| !st.is_regular()) {
            let e = Error::FsConflict { path: local_path.clone() };
            tracing::warn!("{} ({:?} in the way)", e, st.kind);
            frame.result.record_failure(local_str);
            return;
        }

        let decision = decide(&entry.stat(), local.as_ref(), self.policy);
        match decision {
            TransferDecision::UpToDate => {
                tracing::debug!("{} is OK", local_str);
                return;
            }
            TransferDecision::Stale if !confirm_overwrite(&mut self.decider, &local_str) => {
                tracing::info!("skipping {} (overwrite declined)", local_str);
                frame.result.declined += 1;
                return;
            }
            _ => {}
        }

        tracing::info!("fetch {} into {} [{}]", remote_path, local_str, decision.reason());
        if let Err(e) = self.transport.get(&remote_path, &local_path).await {
            tracing::warn!("fetch {} failed: {}", remote_path, e);
            frame.result.record_failure(local_str);
            return;
        }

        // 전송 후 크기 재확인
        match tokio::fs::metadata(&local_path).await {
            Ok(meta) => {
                tracing::info!("  {}", format_byte_progress(meta.len(), entry.size));
                if meta.len() == entry.size {
                    frame.result.succeeded += 1;
                } else {
                    let e = Error::PartialTransfer { path: local_str.clone(), expected: entry.size, actual: meta.len() };
                    tracing::warn!("{}", e);
                    frame.result.record_failure(local_str);
                }
            }
            Err(e) => {
                tracing::warn!("unable to re-check {}: {}", local_str, e);
                frame.result.record_failure(local_str);
            }
        }
    }
}

fn finish_level(frame: Frame, report: &mut MirrorReport) {
    if let Some(summary) = format_level_summary(&frame.local_dir.display().to_string(), &frame.result) {
        tracing::info!("{}", summary);
    }
    if let Some(level) = report.levels.get_mut(frame.slot) {
        level.outcome = LevelOutcome::Synced(frame.result);
    }
}

/// remote_dir을 local_dir로 복제하고 루트 단계 결과를 반환
///
/// 하위 디렉토리 결과는 로그로만 보고되고 반환값에 합산되지 않음
pub async fn mirror_dir<T: Transport + ?Sized>(
    transport: &mut T,
    remote_dir: &str,
    local_dir: &Path,
) -> Result<SyncResult> {
    let report = Mirror::new(transport).run(remote_dir, local_dir).await?;
    Ok(report.root().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::policy::OverwriteDecision;

    fn remote_tree() -> MemoryTransport {
        let mut t = MemoryTransport::new();
        t.add_file("/case/a.txt", &[b'a'; 10])
            .add_file("/case/sub/b.txt", &[b'b'; 5]);
        t
    }

    #[tokio::test]
    async fn root_result_counts_only_direct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();

        let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();

        assert_eq!(report.levels.len(), 2);
        assert_eq!(report.root().unwrap().succeeded, 1);
        assert_eq!(report.level("/case/sub").unwrap().result().unwrap().succeeded, 1);
        assert_eq!(std::fs::read(tmp.path().join("sub/b.txt")).unwrap(), vec![b'b'; 5]);
    }

    #[tokio::test]
    async fn missing_local_root_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();

        let err = mirror_dir(&mut t, "/case", &tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, Error::NotADirectory { side: Side::Local, .. }));
        assert!(t.gets().is_empty());
    }

    #[tokio::test]
    async fn remote_root_errors_abort_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();

        let err = mirror_dir(&mut t, "/absent", tmp.path()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { side: Side::Remote, .. }));

        let err = mirror_dir(&mut t, "/case/a.txt", tmp.path()).await.unwrap_err();
        assert!(matches!(err, Error::NotADirectory { side: Side::Remote, .. }));

        t.fail_stat("/case");
        let err = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn smaller_local_copy_is_refetched() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"abc").unwrap();
        let mut t = MemoryTransport::new();
        t.add_file("/case/a.txt", &[b'a'; 10]);

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result.succeeded, 1);
        assert_eq!(std::fs::metadata(tmp.path().join("a.txt")).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn larger_local_copy_is_left_alone() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), [b'x'; 20]).unwrap();
        let mut t = MemoryTransport::new();
        t.add_file("/case/a.txt", &[b'a'; 10]);

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result, SyncResult::default());
        assert!(t.gets().is_empty());
    }

    #[tokio::test]
    async fn truncated_fetch_is_a_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();
        t.truncate_get("/case/a.txt");

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result.succeeded, 0);
        assert_eq!(result.failed, 1);
        assert!(result.failed_paths[0].ends_with("a.txt"));
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = MemoryTransport::new();
        t.add_file("/case/1.csv", b"one")
            .add_file("/case/2.csv", b"two")
            .fail_get("/case/1.csv");

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(tmp.path().join("2.csv").exists());
    }

    #[tokio::test]
    async fn unreadable_subdirectory_is_recorded_and_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();
        t.add_file("/case/z.txt", b"z").fail_list("/case/sub");

        let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
        assert_eq!(report.root().unwrap().succeeded, 2);
        assert_eq!(report.failed_levels().count(), 1);
        assert!(report.level("/case/sub").unwrap().result().is_none());
    }

    #[tokio::test]
    async fn directory_in_place_of_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("a.txt")).unwrap();
        let mut t = remote_tree();

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result.failed, 1);
        assert!(result.failed_paths[0].ends_with("a.txt"));
        assert!(tmp.path().join("a.txt").is_dir());
        assert_eq!(t.gets(), &["/case/sub/b.txt".to_string()]);
    }

    #[tokio::test]
    async fn entry_stat_failure_is_recorded_and_siblings_continue() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();
        t.add_file("/case/c.txt", b"ccc").fail_stat("/case/a.txt");

        let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
        let root = report.root().unwrap();
        assert_eq!(root.failed, 1);
        assert!(root.failed_paths[0].ends_with("a.txt"));
        assert_eq!(root.succeeded, 1);
        assert!(!tmp.path().join("a.txt").exists());
        assert!(tmp.path().join("c.txt").exists());
        assert!(tmp.path().join("sub/b.txt").exists());
    }

    #[tokio::test]
    async fn file_occupying_subdirectory_is_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("sub"), b"in the way").unwrap();
        let mut t = remote_tree();

        let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
        let level = report.level("/case/sub").unwrap();
        assert!(matches!(level.outcome, LevelOutcome::Failed(Error::FsConflict { .. })));
        assert_eq!(std::fs::read(tmp.path().join("sub")).unwrap(), b"in the way");
    }

    #[tokio::test]
    async fn directory_loops_are_visited_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut t = remote_tree();
        t.add_link("/case/sub/again", "/case");

        let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
        assert_eq!(report.levels.len(), 2);
        assert_eq!(t.gets().len(), 2);
    }

    #[tokio::test]
    async fn declined_overwrite_keeps_local_copy() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"old").unwrap();
        let mut t = remote_tree();
        let mut skip = |_: &str| OverwriteDecision::Skip;

        let report = Mirror::new(&mut t).decider(&mut skip).run("/case", tmp.path()).await.unwrap();
        let root = report.root().unwrap();
        assert_eq!(root.declined, 1);
        assert_eq!(root.failed, 0);
        assert_eq!(std::fs::read(tmp.path().join("a.txt")).unwrap(), b"old");
        // MISSING 파일은 확인 없이 받음
        assert!(tmp.path().join("sub/b.txt").exists());
    }

    #[tokio::test]
    async fn size_or_newer_refetches_same_sized_newer_file() {
        let tmp = tempfile::tempdir().unwrap();
        let local = tmp.path().join("a.txt");
        std::fs::write(&local, [b'x'; 10]).unwrap();
        let mut t = MemoryTransport::new();
        // 로컬 mtime(현재)보다 한참 뒤
        t.add_file_with_mtime("/case/a.txt", &[b'a'; 10], u32::MAX as u64);

        let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();
        assert_eq!(result.succeeded, 0, "size-only keeps same-sized file");

        let report = Mirror::new(&mut t).policy(ChangePolicy::SizeOrNewer).run("/case", tmp.path()).await.unwrap();
        assert_eq!(report.root().unwrap().succeeded, 1);
        assert_eq!(std::fs::read(&local).unwrap(), vec![b'a'; 10]);
    }
}
