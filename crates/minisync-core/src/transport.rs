// miniSync Transport
// author: kodeholic (powered by Claude)
//
// 엔진이 리모트 트리에 접근하는 유일한 통로
// FileKind  : REGULAR / DIRECTORY / 그 외
// FileStat  : stat 결과 (size, mtime, kind)
// FileEntry : 디렉토리 순회 중 만들어지는 엔트리 (저장되지 않음)
// Transport : stat / list / get / put / cwd / exec
//
// 구현체: SftpTransport (russh-sftp), MemoryTransport (테스트용 메모리 트리)

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Other,
}

impl FileKind {
    /// unix mode bits → FileKind (S_IFMT 마스크)
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => FileKind::Regular,
            0o040000 => FileKind::Directory,
            _        => FileKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mtime: Option<u64>,  // unix timestamp
    pub kind: FileKind,
}

impl FileStat {
    pub fn is_dir(&self) -> bool { self.kind == FileKind::Directory }
    pub fn is_regular(&self) -> bool { self.kind == FileKind::Regular }

    /// 로컬 메타데이터 → FileStat
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let kind = if meta.is_dir() {
            FileKind::Directory
        } else if meta.is_file() {
            FileKind::Regular
        } else {
            FileKind::Other
        };
        let mtime = meta.modified().ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        FileStat { size: meta.len(), mtime, kind }
    }
}

/// 순회 중 디렉토리 한 단계의 엔트리
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,  // 상위 디렉토리 기준 상대경로 (엔트리 이름)
    pub size: u64,
    pub kind: FileKind,
    pub mtime: Option<u64>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, stat: &FileStat) -> Self {
        Self { path: path.into(), size: stat.size, kind: stat.kind, mtime: stat.mtime }
    }

    pub fn stat(&self) -> FileStat {
        FileStat { size: self.size, mtime: self.mtime, kind: self.kind }
    }
}

/// 리모트 명령 실행 결과
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_status: u32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool { self.exit_status == 0 }
}

/// 리모트 파일 접근 capability
///
/// 세션은 호출자가 소유하고 엔진은 한 번의 호출 동안 &mut로 빌림
/// 상대경로는 모두 현재 작업 디렉토리(change_working_directory) 기준으로 해석
#[async_trait]
pub trait Transport: Send {
    async fn stat(&mut self, path: &str) -> Result<FileStat>;

    /// 엔트리 이름 목록 ("." / ".." 제외, 순서는 구현체가 돌려준 그대로)
    async fn list(&mut self, path: &str) -> Result<Vec<String>>;

    /// 리모트 → 로컬 (로컬 파일은 덮어씀), 쓴 바이트 수 반환
    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64>;

    /// 로컬 → 리모트 (리모트 파일은 덮어씀), 쓴 바이트 수 반환
    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64>;

    async fn change_working_directory(&mut self, path: &str) -> Result<()>;

    fn current_working_directory(&self) -> String;

    /// 심볼릭 링크를 풀어낸 절대경로. 지원하지 않으면 입력 그대로
    async fn realpath(&mut self, path: &str) -> Result<String> {
        Ok(resolve_path(&self.current_working_directory(), path))
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;
}

/// 리모트 상대경로 → 절대경로 변환
///
/// - 절대경로 입력 → 그대로 반환
/// - ".", ".." 세그먼트 정리
/// - 나머지 → current/path 조합
pub fn resolve_path(current: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", current.trim_end_matches('/'), path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".."     => { parts.pop(); }
            s        => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

/// 리모트 경로 결합 (구분자는 항상 '/')
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() || dir == "." {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
