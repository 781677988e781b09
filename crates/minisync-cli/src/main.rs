// miniSync CLI
// author: kodeholic (powered by Claude)
//
// Usage: minisync --host <host> --user <user> <mirror|upload|download|init|exec> ...
//
// 종료 코드: 0 성공 / 1 호출 실패 / 2 일부 파일 실패
// 세션 로그: 기본 log/YYYY/MM/DD/<시각>.log (--log-file, --log-dir, --no-log-file)

use chrono::Local;
use clap::Parser;

mod commands;
mod handler;
mod logging;

#[tokio::main]
async fn main() {
    let cli = commands::Cli::parse();

    let log_file = cli.log.session_log(&Local::now());
    if let Err(e) = logging::init(log_file.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    if let Some(path) = &log_file {
        tracing::debug!("session log: {}", path.display());
    }

    match handler::run(cli).await {
        Ok(true)  => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}
