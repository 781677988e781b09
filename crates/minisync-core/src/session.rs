// miniSync Session (russh 기반)
// author: kodeholic (powered by Claude)
//
// russh로 SSH 연결/인증을 처리하고
// russh-sftp로 SFTP 서브시스템을 열어 SftpTransport를 돌려줍니다.
// 세션 소유권은 호출자(CLI)에게 있고 엔진은 &mut로 빌려 씀

use std::sync::Arc;

use russh::client;
use russh_sftp::client::SftpSession;

use crate::config::{AuthMethod, ConnectConfig};
use crate::error::{Error, Result};
use crate::sftp::SftpTransport;
use crate::state::{ConnectionObserver, ConnectionState};

// russh 클라이언트 핸들러 (서버 이벤트 처리)
pub struct ClientHandler;

#[async_trait::async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        // 호스트키 검증은 이 계층의 관심사가 아님 (접속 협상은 호출자 책임)
        Ok(true)
    }
}

pub struct SshSession {
    state: ConnectionState,
    observer: Box<dyn ConnectionObserver>,
}

impl SshSession {
    pub fn new(observer: Box<dyn ConnectionObserver>) -> Self {
        Self { state: ConnectionState::Idle, observer }
    }

    pub fn state(&self) -> &ConnectionState { &self.state }

    fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(Error::InvalidTransition { from: self.state.clone(), to: next });
        }
        let prev = std::mem::replace(&mut self.state, next);
        self.observer.on_state_changed(&prev, &self.state);
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        let current = self.state.clone();
        let prev = std::mem::replace(
            &mut self.state,
            ConnectionState::Failed { state: Box::new(current), message: err.to_string() },
        );
        self.observer.on_state_changed(&prev, &self.state);
        err
    }

    pub async fn connect(&mut self, config: &ConnectConfig) -> Result<SftpTransport> {
        config.validate()?;

        // ---- TCP + 키 교환 ----
        self.transition(ConnectionState::Connecting)?;

        let russh_config = Arc::new(client::Config::default());
        let addr = config.addr();
        tracing::info!("[session] connecting to {}", addr);

        let mut ssh = match client::connect(russh_config, addr.as_str(), ClientHandler).await {
            Ok(handle) => handle,
            Err(e) => return Err(self.fail(Error::Transport(e.to_string()))),
        };

        // ---- 인증 ----
        self.transition(ConnectionState::Authenticating)?;

        let authed = match &config.auth {
            AuthMethod::Password(pw) => {
                ssh.authenticate_password(&config.username, pw).await
                    .map_err(|e| Error::Auth(e.to_string()))
            }
            AuthMethod::PublicKey { private_key_path } => {
                match russh::keys::load_secret_key(private_key_path, None) {
                    Ok(key) => ssh.authenticate_publickey(&config.username, Arc::new(key)).await
                        .map_err(|e| Error::Auth(e.to_string())),
                    Err(e) => Err(Error::Auth(format!("{}: {}", private_key_path.display(), e))),
                }
            }
        };

        match authed {
            Ok(true) => {}
            Ok(false) => return Err(self.fail(Error::Auth("Authentication failed".to_string()))),
            Err(e) => return Err(self.fail(e)),
        }
        self.transition(ConnectionState::Authenticated)?;

        // ---- 채널 + SFTP ----
        self.transition(ConnectionState::SubsystemOpening)?;

        let sftp = match open_sftp(&ssh).await {
            Ok(sftp) => sftp,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(ConnectionState::Ready)?;
        tracing::info!("[session] SFTP ready");
        Ok(SftpTransport::new(sftp, ssh).await)
    }

    /// 트랜스포트 종료 + 상태 마무리
    pub async fn close(&mut self, transport: SftpTransport) -> Result<()> {
        self.transition(ConnectionState::Closing)?;
        if let Err(e) = transport.close().await {
            return Err(self.fail(e));
        }
        self.transition(ConnectionState::Closed)
    }
}

async fn open_sftp(ssh: &client::Handle<ClientHandler>) -> Result<SftpSession> {
    let channel = ssh.channel_open_session().await
        .map_err(|e| Error::Transport(e.to_string()))?;

    channel.request_subsystem(true, "sftp").await
        .map_err(|e| Error::Transport(e.to_string()))?;

    SftpSession::new(channel.into_stream()).await
        .map_err(|e| Error::Transport(e.to_string()))
}
