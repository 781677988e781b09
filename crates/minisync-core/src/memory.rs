// miniSync Memory Transport
// author: kodeholic (powered by Claude)
//
// 메모리 위의 리모트 트리. 네트워크 없이 엔진 로직을 검증하거나 dry-run에 사용
// - 호출 기록 : gets / puts / commands
// - 장애 주입 : fail_get, fail_put, fail_stat, fail_list, truncate_get
// - link      : 디렉토리 별칭 (심볼릭 링크 루프 재현용)
//
// 경로 키는 모두 정규화된 절대경로

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result, Side};
use crate::transport::{resolve_path, ExecOutput, FileKind, FileStat, Transport};

const DEFAULT_MTIME: u64 = 1_000;

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mtime: u64 },
    Dir,
}

#[derive(Default)]
pub struct MemoryTransport {
    nodes: BTreeMap<String, Node>,
    links: BTreeMap<String, String>,
    cwd: String,
    clock: u64,

    gets: Vec<String>,
    puts: Vec<String>,
    commands: Vec<String>,
    exec_results: HashMap<String, ExecOutput>,

    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
    fail_stat: HashSet<String>,
    fail_list: HashSet<String>,
    truncate_get: HashSet<String>,
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _))     => "/",
        Some((parent, _)) => parent,
        None              => "/",
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let mut t = Self { cwd: "/".to_string(), clock: DEFAULT_MTIME, ..Self::default() };
        t.nodes.insert("/".to_string(), Node::Dir);
        t
    }

    fn abs(&self, path: &str) -> String {
        resolve_path(&self.cwd, path)
    }

    /// 링크를 따라간 실제 경로
    fn follow(&self, abs: &str) -> String {
        let mut current = String::from("/");
        for seg in abs.split('/').filter(|s| !s.is_empty()) {
            current = if current == "/" { format!("/{}", seg) } else { format!("{}/{}", current, seg) };
            let mut hops = 0;
            while let Some(target) = self.links.get(&current) {
                current = target.clone();
                hops += 1;
                if hops > 32 { break; }
            }
        }
        current
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // ── 트리 구성 ────────────────────────────────────────────────────────────

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        let mut current = String::new();
        for seg in abs.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(seg);
            self.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
        self
    }

    pub fn add_file(&mut self, path: &str, data: &[u8]) -> &mut Self {
        self.add_file_with_mtime(path, data, DEFAULT_MTIME)
    }

    pub fn add_file_with_mtime(&mut self, path: &str, data: &[u8], mtime: u64) -> &mut Self {
        let abs = self.abs(path);
        let parent = parent_of(&abs).to_string();
        self.add_dir(&parent);
        self.nodes.insert(abs, Node::File { data: data.to_vec(), mtime });
        self
    }

    /// path를 target 디렉토리의 별칭으로 등록
    pub fn add_link(&mut self, path: &str, target: &str) -> &mut Self {
        let abs = self.abs(path);
        let target = self.abs(target);
        self.links.insert(abs, target);
        self
    }

    pub fn set_exec_result(&mut self, command: &str, output: ExecOutput) -> &mut Self {
        self.exec_results.insert(command.to_string(), output);
        self
    }

    // ── 장애 주입 ────────────────────────────────────────────────────────────

    pub fn fail_get(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        self.fail_get.insert(abs);
        self
    }

    pub fn fail_put(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        self.fail_put.insert(abs);
        self
    }

    pub fn fail_stat(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        self.fail_stat.insert(abs);
        self
    }

    pub fn fail_list(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        self.fail_list.insert(abs);
        self
    }

    /// get 시 절반만 써서 부분 전송을 흉내냄
    pub fn truncate_get(&mut self, path: &str) -> &mut Self {
        let abs = self.abs(path);
        self.truncate_get.insert(abs);
        self
    }

    // ── 검사 ─────────────────────────────────────────────────────────────────

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        match self.nodes.get(&self.follow(&self.abs(path))) {
            Some(Node::File { data, .. }) => Some(data.as_slice()),
            _ => None,
        }
    }

    /// get 호출된 리모트 절대경로 (호출 순서)
    pub fn gets(&self) -> &[String] { &self.gets }

    /// put 호출된 리모트 절대경로 (호출 순서)
    pub fn puts(&self) -> &[String] { &self.puts }

    pub fn commands(&self) -> &[String] { &self.commands }

    fn lookup(&self, path: &str) -> Result<(String, &Node)> {
        let real = self.follow(&self.abs(path));
        match self.nodes.get(&real) {
            Some(node) => Ok((real, node)),
            None => Err(Error::NotFound { side: Side::Remote, path: real }),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn stat(&mut self, path: &str) -> Result<FileStat> {
        let abs = self.abs(path);
        if self.fail_stat.contains(&abs) {
            return Err(Error::Transport(format!("{}: stat failed", abs)));
        }
        let (_, node) = self.lookup(path)?;
        Ok(match node {
            Node::File { data, mtime } => FileStat {
                size: data.len() as u64,
                mtime: Some(*mtime),
                kind: FileKind::Regular,
            },
            Node::Dir => FileStat { size: 0, mtime: None, kind: FileKind::Directory },
        })
    }

    async fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let abs = self.abs(path);
        if self.fail_list.contains(&abs) {
            return Err(Error::Transport(format!("{}: list failed", abs)));
        }
        let (real, node) = self.lookup(path)?;
        if !matches!(node, Node::Dir) {
            return Err(Error::NotADirectory { side: Side::Remote, path: real });
        }

        let mut names: Vec<String> = self.nodes.keys()
            .chain(self.links.keys())
            .filter(|k| k.as_str() != "/" && parent_of(k) == real)
            .filter_map(|k| k.rsplit('/').next().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let abs = self.abs(remote);
        self.gets.push(abs.clone());
        if self.fail_get.contains(&abs) {
            return Err(Error::Transport(format!("{}: connection reset", abs)));
        }
        let (real, node) = self.lookup(remote)?;
        let data = match node {
            Node::File { data, .. } => data.clone(),
            Node::Dir => return Err(Error::Transport(format!("{}: is a directory", real))),
        };
        let written = if self.truncate_get.contains(&abs) { &data[..data.len() / 2] } else { &data[..] };

        tokio::fs::write(local, written).await
            .map_err(|e| Error::local_io(local, e))?;
        Ok(written.len() as u64)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let abs = self.abs(remote);
        self.puts.push(abs.clone());
        if self.fail_put.contains(&abs) {
            return Err(Error::Transport(format!("{}: permission denied", abs)));
        }
        let real = self.follow(&abs);
        match self.nodes.get(parent_of(&real)) {
            Some(Node::Dir) => {}
            _ => return Err(Error::NotFound { side: Side::Remote, path: parent_of(&real).to_string() }),
        }
        if matches!(self.nodes.get(&real), Some(Node::Dir)) {
            return Err(Error::Transport(format!("{}: is a directory", real)));
        }

        let data = tokio::fs::read(local).await
            .map_err(|e| Error::local_io(local, e))?;
        let len = data.len() as u64;
        let mtime = self.tick();
        self.nodes.insert(real, Node::File { data, mtime });
        Ok(len)
    }

    async fn change_working_directory(&mut self, path: &str) -> Result<()> {
        let (real, node) = self.lookup(path)?;
        if !matches!(node, Node::Dir) {
            return Err(Error::NotADirectory { side: Side::Remote, path: real });
        }
        self.cwd = real;
        Ok(())
    }

    fn current_working_directory(&self) -> String {
        self.cwd.clone()
    }

    async fn realpath(&mut self, path: &str) -> Result<String> {
        let (real, _) = self.lookup(path)?;
        Ok(real)
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.commands.push(command.to_string());
        Ok(self.exec_results.get(command).cloned().unwrap_or_default())
    }
}
