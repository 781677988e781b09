// miniSync SFTP Transport (russh-sftp 기반)
// author: kodeholic (powered by Claude)
//
// SftpTransport : Transport trait의 실제 구현
// - stat/list/get/put : russh-sftp SftpSession
// - cwd               : SFTP에는 작업 디렉토리가 없음 → 클라이언트 쪽에서 유지
// - exec              : 같은 SSH 연결에 exec 채널을 새로 열어 실행
//
// get/put은 항상 덮어쓰기 (이어받기 없음). 전송 여부는 엔진이 결정

use std::path::Path;

use async_trait::async_trait;
use russh::client;
use russh::ChannelMsg;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result, Side};
use crate::session::ClientHandler;
use crate::transport::{resolve_path, ExecOutput, FileKind, FileStat, Transport};

const CHUNK_SIZE: usize = 64 * 1024; // 64KB

pub struct SftpTransport {
    sftp: SftpSession,
    ssh: client::Handle<ClientHandler>,
    cwd: String,
}

impl SftpTransport {
    pub(crate) async fn new(sftp: SftpSession, ssh: client::Handle<ClientHandler>) -> Self {
        // 접속 직후 서버의 실제 홈 디렉토리를 cwd로
        let cwd = match sftp.canonicalize(".").await {
            Ok(home) => home,
            Err(e) => {
                tracing::warn!("[sftp] unable to resolve home directory, using '/': {}", e);
                "/".to_string()
            }
        };
        Self { sftp, ssh, cwd }
    }

    fn abs(&self, path: &str) -> String {
        resolve_path(&self.cwd, path)
    }

    /// SFTP 채널과 SSH 연결 종료. 엔진은 호출하지 않음
    pub async fn close(self) -> Result<()> {
        self.sftp.close().await
            .map_err(|e| Error::Transport(e.to_string()))?;
        self.ssh.disconnect(russh::Disconnect::ByApplication, "", "English").await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }
}

/// russh-sftp 에러 → 엔진 에러 (NoSuchFile만 NotFound로 구분)
fn remote_err(path: &str, e: SftpError) -> Error {
    match e {
        SftpError::Status(status) if status.status_code == StatusCode::NoSuchFile => {
            Error::NotFound { side: Side::Remote, path: path.to_string() }
        }
        other => Error::Transport(format!("{}: {}", path, other)),
    }
}

#[async_trait]
impl Transport for SftpTransport {
    async fn stat(&mut self, path: &str) -> Result<FileStat> {
        let target = self.abs(path);
        let attrs = self.sftp.metadata(target.as_str()).await
            .map_err(|e| remote_err(&target, e))?;
        Ok(FileStat {
            size: attrs.size.unwrap_or(0),
            mtime: attrs.mtime.map(|t| t as u64),
            kind: attrs.permissions.map(FileKind::from_mode).unwrap_or(FileKind::Other),
        })
    }

    async fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let target = self.abs(path);
        let dir = self.sftp.read_dir(target.as_str()).await
            .map_err(|e| remote_err(&target, e))?;
        Ok(dir.into_iter()
            .map(|e| e.file_name())
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    async fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let target = self.abs(remote);
        let mut remote_file = self.sftp.open(target.as_str()).await
            .map_err(|e| remote_err(&target, e))?;

        let mut local_file = tokio::fs::File::create(local).await
            .map_err(|e| Error::local_io(local, e))?;

        let mut buf         = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let n = remote_file.read(&mut buf).await
                .map_err(|e| Error::Transport(format!("{}: {}", target, e)))?;
            if n == 0 { break; }

            local_file.write_all(&buf[..n]).await
                .map_err(|e| Error::local_io(local, e))?;
            transferred += n as u64;
            tracing::trace!("[sftp] get {} {} bytes", target, transferred);
        }
        // tokio File은 백그라운드 쓰기 → 재확인(stat) 전에 반드시 flush
        local_file.flush().await.map_err(|e| Error::local_io(local, e))?;
        Ok(transferred)
    }

    async fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let target = self.abs(remote);
        let mut local_file = tokio::fs::File::open(local).await
            .map_err(|e| Error::local_io(local, e))?;

        let mut remote_file = self.sftp
            .open_with_flags(target.as_str(), OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::TRUNCATE)
            .await
            .map_err(|e| remote_err(&target, e))?;

        let mut buf         = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let n = local_file.read(&mut buf).await
                .map_err(|e| Error::local_io(local, e))?;
            if n == 0 { break; }

            remote_file.write_all(&buf[..n]).await
                .map_err(|e| Error::Transport(format!("{}: {}", target, e)))?;
            transferred += n as u64;
            tracing::trace!("[sftp] put {} {} bytes", target, transferred);
        }
        remote_file.shutdown().await
            .map_err(|e| Error::Transport(format!("{}: {}", target, e)))?;
        Ok(transferred)
    }

    async fn change_working_directory(&mut self, path: &str) -> Result<()> {
        let target = self.abs(path);
        let real = self.sftp.canonicalize(target.as_str()).await
            .map_err(|e| remote_err(&target, e))?;
        let st = self.stat(&real).await?;
        if !st.is_dir() {
            return Err(Error::NotADirectory { side: Side::Remote, path: real });
        }
        tracing::debug!("[sftp] cwd {} → {}", self.cwd, real);
        self.cwd = real;
        Ok(())
    }

    fn current_working_directory(&self) -> String {
        self.cwd.clone()
    }

    async fn realpath(&mut self, path: &str) -> Result<String> {
        let target = self.abs(path);
        self.sftp.canonicalize(target.as_str()).await
            .map_err(|e| remote_err(&target, e))
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let mut channel = self.ssh.channel_open_session().await
            .map_err(|e| Error::Transport(e.to_string()))?;
        channel.exec(true, command).await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(ExecOutput {
            // exit-status 없이 채널이 닫히면 실패로 간주
            exit_status: exit_status.unwrap_or(u32::MAX),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
