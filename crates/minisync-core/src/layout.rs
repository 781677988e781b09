// miniSync Directory Structure Initializer
// author: kodeholic (powered by Claude)
//
// 전송 전에 로컬 디렉토리 골격을 만들어 둠
// - 이미 있는 디렉토리는 그대로 (멱등)
// - 경로 중간에 파일이 있으면 FsConflict, 기존 데이터는 건드리지 않음
//
// 결과 케이스 골격:
//   log/
//   output/report, output/summary
//   plots/angle, plots/volt, plots/unstable

use std::path::{Component, Path};

use crate::error::{Error, Result};

pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// 결과 다운로드 시 로컬에 미리 만드는 구조 (위에서 아래 순서)
pub const RESULT_SKELETON: &[&str] = &[
    "log",
    "output",
    "output/report",
    "output/summary",
    "plots",
    "plots/angle",
    "plots/volt",
    "plots/unstable",
];

/// root 아래에 subpaths를 순서대로 생성 (mode 0o755)
pub fn ensure_tree<P: AsRef<Path>>(root: &Path, subpaths: &[P]) -> Result<()> {
    ensure_tree_with_mode(root, subpaths, DEFAULT_DIR_MODE)
}

pub fn ensure_tree_with_mode<P: AsRef<Path>>(root: &Path, subpaths: &[P], mode: u32) -> Result<()> {
    ensure_dir(root, mode)?;
    for sub in subpaths {
        let mut current = root.to_path_buf();
        for comp in sub.as_ref().components() {
            match comp {
                Component::Normal(name) => {
                    current.push(name);
                    ensure_dir(&current, mode)?;
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::Configuration(format!(
                        "subpath must be relative and stay under root: {}",
                        sub.as_ref().display()
                    )));
                }
            }
        }
    }
    Ok(())
}

/// 디렉토리 하나 보장. 상위 경로는 이미 있다고 가정하지 않음
pub fn ensure_dir(path: &Path, mode: u32) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => return Err(Error::FsConflict { path: path.to_path_buf() }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::local_io(path, e)),
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent, mode)?;
        }
    }

    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(path) {
        Ok(()) => {
            tracing::info!("creating '{}'", path.display());
            Ok(())
        }
        // 다른 프로세스가 먼저 만든 경우
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            if path.is_dir() { Ok(()) } else { Err(Error::FsConflict { path: path.to_path_buf() }) }
        }
        Err(e) => Err(Error::local_io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_nested_skeleton_top_down() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("case");
        ensure_tree(&root, RESULT_SKELETON).unwrap();

        for sub in RESULT_SKELETON {
            assert!(root.join(sub).is_dir(), "{} missing", sub);
        }
    }

    #[test]
    fn repeated_calls_are_no_ops() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        ensure_tree(root, &["output/report"]).unwrap();
        std::fs::write(root.join("output/report/keep.txt"), b"data").unwrap();

        ensure_tree(root, &["output/report"]).unwrap();
        assert_eq!(std::fs::read(root.join("output/report/keep.txt")).unwrap(), b"data");
    }

    #[test]
    fn file_in_the_way_is_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("plots"), b"not a dir").unwrap();

        let err = ensure_tree(root, &["log", "plots/volt"]).unwrap_err();
        assert!(matches!(err, Error::FsConflict { ref path } if path.ends_with("plots")));
        // 충돌 전까지의 생성은 유지, 기존 파일은 그대로
        assert!(root.join("log").is_dir());
        assert_eq!(std::fs::read(root.join("plots")).unwrap(), b"not a dir");
    }

    #[test]
    fn escaping_subpath_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ensure_tree(tmp.path(), &["../outside"]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[cfg(unix)]
    #[test]
    fn applies_requested_mode() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        ensure_tree_with_mode(tmp.path(), &["csv"], 0o750).unwrap();
        let mode = std::fs::metadata(tmp.path().join("csv")).unwrap().permissions().mode();
        // umask가 비트를 더 지울 수는 있어도 더하지는 않음
        assert_eq!(mode & 0o027, 0);
    }
}
