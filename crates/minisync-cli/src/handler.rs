// miniSync CLI Handler
// author: kodeholic (powered by Claude)
//
// core 호출 + 결과 출력
// 세션은 여기서 열고 닫음. 엔진은 호출 동안 빌려 쓰기만 함

use std::io::{self, Write};
use std::path::Path;

use minisync_core::config::{AuthMethod, ConnectConfig};
use minisync_core::error::{Error, Result};
use minisync_core::layout::{ensure_tree, RESULT_SKELETON};
use minisync_core::mirror::{LevelOutcome, Mirror, MirrorReport};
use minisync_core::pipeline::{run_remote, Download, DownloadReport, ExtraOutcome};
use minisync_core::policy::{CachedDecider, OverwriteDecider, OverwriteDecision};
use minisync_core::session::SshSession;
use minisync_core::sftp::SftpTransport;
use minisync_core::state::TracingObserver;
use minisync_core::upload::{Upload, UploadReport};

use crate::commands::{parse_answer, Cli, Command, RemoteArgs};

/// stdin으로 덮어쓰기 여부를 묻는 decider
struct PromptDecider;

impl OverwriteDecider for PromptDecider {
    fn decide(&mut self, path: &str) -> OverwriteDecision {
        loop {
            print!("overwrite {}? [y]es / [n]o / [Y]es to all / [N]o to all: ", path);
            let _ = io::stdout().flush();

            let mut input = String::new();
            match io::stdin().read_line(&mut input) {
                // EOF / 읽기 실패 → 건드리지 않음
                Ok(0) | Err(_) => return OverwriteDecision::SkipAll,
                Ok(_) => {}
            }
            if let Some(answer) = parse_answer(&input) {
                return answer;
            }
        }
    }
}

/// 서브커맨드 실행. 파일 단위 실패가 하나라도 있으면 Ok(false)
pub async fn run(cli: Cli) -> Result<bool> {
    if !cli.command.needs_connection() {
        return run_local(&cli.command);
    }

    let config = connect_config(&cli.remote)?;
    println!("Connecting to {}...", config.addr());

    let mut session   = SshSession::new(Box::new(TracingObserver));
    let mut transport = session.connect(&config).await?;
    tracing::info!("user {}@{} has logged in", config.username, config.host);

    let outcome = dispatch(&cli.command, &mut transport).await;

    if let Err(e) = session.close(transport).await {
        tracing::warn!("closing session: {}", e);
    }
    outcome
}

fn run_local(command: &Command) -> Result<bool> {
    if let Command::Init { local_case } = command {
        ensure_tree(local_case, RESULT_SKELETON)?;
        println!("Initialized {}", local_case.display());
    }
    Ok(true)
}

async fn dispatch(command: &Command, transport: &mut SftpTransport) -> Result<bool> {
    let mut prompt = CachedDecider::new(PromptDecider);

    match command {
        Command::Mirror { remote, local, sync } => {
            let mut mirror = Mirror::new(transport).policy(sync.policy.into());
            if sync.confirm {
                mirror = mirror.decider(&mut prompt);
            }
            let report = mirror.run(remote, local).await?;
            Ok(print_mirror(remote, local, &report))
        }
        Command::Upload { local, remote, suffix, keep_local, sync } => {
            let mut upload = Upload::new(transport)
                .suffix(suffix.as_str())
                .cleanup(!keep_local)
                .policy(sync.policy.into());
            if sync.confirm {
                upload = upload.decider(&mut prompt);
            }
            let report = upload.run(local, remote).await?;
            Ok(print_upload(&report))
        }
        Command::Download { remote_case, local_case, sync } => {
            let mut download = Download::new(transport).policy(sync.policy.into());
            if sync.confirm {
                download = download.decider(&mut prompt);
            }
            let report = download.run(remote_case, local_case).await?;
            Ok(print_download(&report))
        }
        Command::Exec { command } => {
            run_remote(transport, &command.join(" ")).await?;
            Ok(true)
        }
        Command::Init { .. } => Ok(true),
    }
}

fn connect_config(args: &RemoteArgs) -> Result<ConnectConfig> {
    let host = args.host.clone()
        .ok_or_else(|| Error::Configuration("--host is required".to_string()))?;
    let username = args.user.clone()
        .ok_or_else(|| Error::Configuration("--user is required".to_string()))?;

    let auth = match (&args.identity, &args.password) {
        (Some(key), _)     => AuthMethod::PublicKey { private_key_path: key.clone() },
        (None, Some(pw))   => AuthMethod::Password(pw.clone()),
        (None, None)       => AuthMethod::Password(read_password(&username, &host)?),
    };

    let config = ConnectConfig { host, port: args.port, username, auth };
    config.validate()?;
    Ok(config)
}

fn read_password(username: &str, host: &str) -> Result<String> {
    eprint!("{}@{}'s password: ", username, host);
    let _ = io::stderr().flush();
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    Ok(password.trim().to_string())
}

// ── 결과 출력 ────────────────────────────────────────────────────────────────

fn print_mirror(remote: &str, local: &Path, report: &MirrorReport) -> bool {
    println!(
        "Mirrored {} → {}: {} files fetched across {} directories",
        remote, local.display(), report.total_succeeded(), report.levels.len(),
    );
    print_failures(report)
}

fn print_failures(report: &MirrorReport) -> bool {
    let mut clean = true;
    for path in report.failed_paths() {
        println!("  failed: {}", path);
        clean = false;
    }
    for level in report.failed_levels() {
        if let LevelOutcome::Failed(e) = &level.outcome {
            println!("  skipped directory {}: {}", level.remote_dir, e);
        }
        clean = false;
    }
    clean
}

fn print_upload(report: &UploadReport) -> bool {
    println!(
        "Uploaded {} files ({} up to date, {} declined), removed {} local copies",
        report.uploaded.len(), report.skipped, report.declined, report.deleted.len(),
    );
    for path in &report.failed_paths {
        println!("  failed: {}", path);
    }
    report.failed_paths.is_empty()
}

fn print_download(report: &DownloadReport) -> bool {
    for section in &report.sections {
        match &section.outcome {
            Ok(r) => {
                println!("{}: {} files fetched", section.name, r.total_succeeded());
                print_failures(r);
            }
            Err(e) => println!("{}: not mirrored ({})", section.name, e),
        }
    }
    for extra in &report.extras {
        match &extra.outcome {
            ExtraOutcome::Fetched(n) => println!("{}: {} bytes", extra.local_path.display(), n),
            ExtraOutcome::Missing    => println!("{}: not present on remote", extra.remote_path),
            ExtraOutcome::Failed(e)  => println!("{}: failed ({})", extra.remote_path, e),
        }
    }
    report.is_clean()
}
