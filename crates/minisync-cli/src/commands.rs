// miniSync CLI Commands
// author: kodeholic (powered by Claude)
//
// 순수 파싱만 담당 (IO 없음, 테스트 용이)
// - Cli / Command : clap derive 정의
// - parse_answer  : 덮어쓰기 확인 응답 (y / n / Y / N)

use std::path::PathBuf;

use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use minisync_core::config::DEFAULT_PORT;
use minisync_core::policy::{ChangePolicy, OverwriteDecision};
use minisync_core::upload::DEFAULT_SUFFIX;

use crate::logging::{session_log_path, DEFAULT_LOG_DIR};

#[derive(Debug, Parser)]
#[command(name = "minisync", version, about = "Directory sync over SFTP")]
pub struct Cli {
    #[command(flatten)]
    pub remote: RemoteArgs,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// 접속 옵션 (init 외 모든 서브커맨드에서 사용)
#[derive(Debug, Args)]
pub struct RemoteArgs {
    #[arg(long, global = true)]
    pub host: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    #[arg(long, global = true, env = "MINISYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// 개인키 경로 (지정하면 비밀번호 대신 공개키 인증)
    #[arg(long, short = 'i', global = true)]
    pub identity: Option<PathBuf>,
}

/// 세션 로그 파일 옵션
#[derive(Debug, Args)]
pub struct LogArgs {
    /// 세션 로그 파일 (기본: <log-dir>/YYYY/MM/DD/<시각>.log)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// 세션 로그 파일을 남기지 않음 (콘솔만)
    #[arg(long, global = true, conflicts_with = "log_file")]
    pub no_log_file: bool,
}

impl LogArgs {
    pub fn session_log(&self, now: &DateTime<Local>) -> Option<PathBuf> {
        if self.no_log_file {
            return None;
        }
        Some(match &self.log_file {
            Some(path) => path.clone(),
            None       => session_log_path(&self.log_dir, now),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// 크기만 비교
    Size,
    /// 크기가 같으면 수정시각도 비교
    SizeOrNewer,
}

impl From<PolicyArg> for ChangePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Size        => ChangePolicy::SizeOnly,
            PolicyArg::SizeOrNewer => ChangePolicy::SizeOrNewer,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// 오래된 파일을 덮어쓰기 전에 물어봄
    #[arg(long)]
    pub confirm: bool,

    #[arg(long, value_enum, default_value_t = PolicyArg::Size)]
    pub policy: PolicyArg,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 리모트 디렉토리 트리를 로컬로 복제
    Mirror {
        remote: String,
        local: PathBuf,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// 로컬 디렉토리의 suffix 일치 파일을 리모트로 업로드
    Upload {
        local: PathBuf,
        remote: String,
        #[arg(long, default_value = DEFAULT_SUFFIX)]
        suffix: String,
        /// 업로드 후 로컬 사본을 지우지 않음
        #[arg(long)]
        keep_local: bool,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// 결과 케이스 (log / output / plots + 보고서) 다운로드
    Download {
        remote_case: String,
        local_case: PathBuf,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// 로컬 결과 디렉토리 골격 생성 (접속 없음)
    Init {
        local_case: PathBuf,
    },
    /// 리모트 명령 실행
    Exec {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

impl Command {
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Command::Init { .. })
    }
}

/// 덮어쓰기 확인 응답 파싱. 알 수 없는 입력이면 None (다시 묻기)
pub fn parse_answer(input: &str) -> Option<OverwriteDecision> {
    match input.trim() {
        "y" => Some(OverwriteDecision::Overwrite),
        "n" => Some(OverwriteDecision::Skip),
        "Y" => Some(OverwriteDecision::OverwriteAll),
        "N" => Some(OverwriteDecision::SkipAll),
        _   => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn mirror_defaults() {
        let cli = parse(&["minisync", "--host", "hpc", "-u", "tst", "mirror", "/work/case", "./case"]);
        assert_eq!(cli.remote.port, 22);
        assert_eq!(cli.remote.host.as_deref(), Some("hpc"));
        match cli.command {
            Command::Mirror { remote, local, sync } => {
                assert_eq!(remote, "/work/case");
                assert_eq!(local, PathBuf::from("./case"));
                assert!(!sync.confirm);
                assert_eq!(ChangePolicy::from(sync.policy), ChangePolicy::SizeOnly);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn upload_options() {
        let cli = parse(&[
            "minisync", "upload", "./csv", "work/csv",
            "--suffix", ".lst", "--keep-local", "--policy", "size-or-newer", "--host", "hpc",
        ]);
        match cli.command {
            Command::Upload { suffix, keep_local, sync, .. } => {
                assert_eq!(suffix, ".lst");
                assert!(keep_local);
                assert_eq!(sync.policy, PolicyArg::SizeOrNewer);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cli.remote.host.as_deref(), Some("hpc"));
    }

    #[test]
    fn upload_suffix_default() {
        let cli = parse(&["minisync", "upload", "./csv", "work/csv"]);
        assert!(matches!(cli.command, Command::Upload { ref suffix, .. } if suffix == ".csv.gz"));
    }

    #[test]
    fn exec_keeps_trailing_words() {
        let cli = parse(&["minisync", "exec", "run.sh", "-v", "2021S"]);
        match cli.command {
            Command::Exec { command } => assert_eq!(command.join(" "), "run.sh -v 2021S"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn init_needs_no_connection() {
        let cli = parse(&["minisync", "init", "./case"]);
        assert!(!cli.command.needs_connection());
        assert!(Cli::try_parse_from(["minisync", "exec"]).is_err());
    }

    #[test]
    fn session_log_defaults_to_dated_file() {
        let now = Local::now();
        let cli = parse(&["minisync", "init", "./case"]);
        let path = cli.log.session_log(&now).unwrap();
        assert!(path.starts_with("log"));
        assert_eq!(path, session_log_path(Path::new("log"), &now));

        let cli = parse(&["minisync", "init", "./case", "--log-file", "run.log"]);
        assert_eq!(cli.log.session_log(&now), Some(PathBuf::from("run.log")));

        let cli = parse(&["minisync", "--no-log-file", "init", "./case"]);
        assert_eq!(cli.log.session_log(&now), None);
        assert!(Cli::try_parse_from(["minisync", "--no-log-file", "--log-file", "x", "init", "."]).is_err());
    }

    #[test]
    fn answers_are_case_sensitive() {
        assert_eq!(parse_answer("y\n"), Some(OverwriteDecision::Overwrite));
        assert_eq!(parse_answer("N"), Some(OverwriteDecision::SkipAll));
        assert_eq!(parse_answer("yes"), None);
        assert_eq!(parse_answer(""), None);
    }
}
