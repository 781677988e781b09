// miniSync Pipeline Steps
// author: kodeholic (powered by Claude)
//
// 엔진들을 배치 파이프라인 단계로 묶음
// - download_results : 결과 케이스 골격 생성 → log/output/plots 복제 → 보고서 파일 수신
// - run_remote       : 리모트 처리 명령 실행 (출력은 로그로)
//
// 보고서 파일(Failure-Report.csv, ../Master-Report.xlsx)은 없을 수도 있음 → Missing으로 보고

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::layout::{ensure_tree, RESULT_SKELETON};
use crate::mirror::{Mirror, MirrorReport};
use crate::policy::{ChangePolicy, OverwriteDecider};
use crate::progress::{fmt_size, format_byte_progress};
use crate::transport::{join_remote, ExecOutput, Transport};

/// 케이스 아래에서 복제하는 결과 디렉토리 (순서대로)
pub const RESULT_SECTIONS: &[&str] = &["log", "output", "plots"];

pub const FAILURE_REPORT: &str = "Failure-Report.csv";
pub const MASTER_REPORT: &str = "Master-Report.xlsx";

#[derive(Debug)]
pub struct SectionReport {
    pub name: String,
    pub outcome: Result<MirrorReport>,
}

#[derive(Debug)]
pub enum ExtraOutcome {
    Fetched(u64),
    Missing,
    Failed(Error),
}

#[derive(Debug)]
pub struct ExtraReport {
    pub remote_path: String,
    pub local_path: PathBuf,
    pub outcome: ExtraOutcome,
}

#[derive(Debug, Default)]
pub struct DownloadReport {
    pub sections: Vec<SectionReport>,
    pub extras: Vec<ExtraReport>,
}

impl DownloadReport {
    pub fn section(&self, name: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// 섹션 전체 실패 + 파일 단위 실패가 하나도 없으면 true
    pub fn is_clean(&self) -> bool {
        self.sections.iter().all(|s| match &s.outcome {
            Ok(r)  => r.failed_paths().next().is_none() && r.failed_levels().next().is_none(),
            Err(_) => false,
        }) && self.extras.iter().all(|e| !matches!(e.outcome, ExtraOutcome::Failed(_)))
    }
}

pub struct Download<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    policy: ChangePolicy,
    decider: Option<&'a mut dyn OverwriteDecider>,
}

impl<'a, T: Transport + ?Sized> Download<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport, policy: ChangePolicy::default(), decider: None }
    }

    pub fn policy(mut self, policy: ChangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn decider(mut self, decider: &'a mut dyn OverwriteDecider) -> Self {
        self.decider = Some(decider);
        self
    }

    pub async fn run(mut self, remote_case: &str, local_case: &Path) -> Result<DownloadReport> {
        if remote_case.is_empty() {
            return Err(Error::Configuration("remote case directory is empty".to_string()));
        }
        if local_case.as_os_str().is_empty() {
            return Err(Error::Configuration("local case directory is empty".to_string()));
        }

        ensure_tree(local_case, RESULT_SKELETON)?;

        let mut report = DownloadReport::default();
        for section in RESULT_SECTIONS {
            let remote_dir = join_remote(remote_case, section);
            let local_dir  = local_case.join(section);

            let mut mirror = Mirror::new(&mut *self.transport).policy(self.policy);
            if let Some(d) = self.decider.as_deref_mut() {
                mirror = mirror.decider(d);
            }
            let outcome = mirror.run(&remote_dir, &local_dir).await;
            if let Err(e) = &outcome {
                tracing::warn!("unable to mirror {}: {}", remote_dir, e);
            }
            report.sections.push(SectionReport { name: section.to_string(), outcome });
        }

        let failure_report = (join_remote(remote_case, FAILURE_REPORT), local_case.join(FAILURE_REPORT));
        let mut extras = vec![failure_report];
        if let Some(parent) = local_case.parent().filter(|p| !p.as_os_str().is_empty()) {
            extras.push((join_remote(remote_case, &format!("../{}", MASTER_REPORT)), parent.join(MASTER_REPORT)));
        }
        for (remote_path, local_path) in extras {
            let outcome = fetch_optional(&mut *self.transport, &remote_path, &local_path).await;
            report.extras.push(ExtraReport { remote_path, local_path, outcome });
        }

        Ok(report)
    }
}

/// 단일 파일 수신. 리모트에 없으면 Missing
async fn fetch_optional<T: Transport + ?Sized>(transport: &mut T, remote: &str, local: &Path) -> ExtraOutcome {
    let expected = match transport.stat(remote).await {
        Ok(st) => st.size,
        Err(e) if e.is_not_found() => {
            tracing::info!("downloading {} ... not found", remote);
            return ExtraOutcome::Missing;
        }
        Err(e) => {
            tracing::warn!("unable to stat {}: {}", remote, e);
            return ExtraOutcome::Failed(e);
        }
    };

    if let Err(e) = transport.get(remote, local).await {
        tracing::warn!("downloading {} failed: {}", remote, e);
        return ExtraOutcome::Failed(e);
    }

    match tokio::fs::metadata(local).await {
        Ok(meta) if meta.len() == expected => {
            tracing::info!("downloading {} ... done ({})", remote, fmt_size(expected));
            ExtraOutcome::Fetched(expected)
        }
        Ok(meta) => {
            tracing::warn!("downloading {}: {}", remote, format_byte_progress(meta.len(), expected));
            ExtraOutcome::Failed(Error::PartialTransfer {
                path: local.display().to_string(),
                expected,
                actual: meta.len(),
            })
        }
        Err(e) => ExtraOutcome::Failed(Error::local_io(local, e)),
    }
}

/// 결과 케이스 다운로드 (기본 옵션)
pub async fn download_results<T: Transport + ?Sized>(
    transport: &mut T,
    remote_case: &str,
    local_case: &Path,
) -> Result<DownloadReport> {
    Download::new(transport).run(remote_case, local_case).await
}

/// 리모트 처리 명령 실행. 0이 아닌 종료 코드는 Error::Remote
pub async fn run_remote<T: Transport + ?Sized>(transport: &mut T, command: &str) -> Result<ExecOutput> {
    if command.trim().is_empty() {
        return Err(Error::Configuration("remote command is empty".to_string()));
    }

    tracing::info!("running remote command: {}", command);
    let output = transport.exec(command).await?;
    for line in output.stdout.lines() {
        tracing::info!("  {}", line);
    }
    for line in output.stderr.lines() {
        tracing::warn!("  {}", line);
    }

    if !output.success() {
        return Err(Error::Remote { command: command.to_string(), status: output.exit_status });
    }
    Ok(output)
}
