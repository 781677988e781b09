// miniSync end-to-end properties over MemoryTransport
// author: kodeholic (powered by Claude)

use std::path::Path;

use minisync_core::memory::MemoryTransport;
use minisync_core::mirror::{mirror_dir, Mirror};
use minisync_core::progress::{format_byte_progress, format_ordinal_progress};
use minisync_core::transport::{join_remote, Transport};
use minisync_core::upload::upload_files;

fn case_tree() -> MemoryTransport {
    let mut t = MemoryTransport::new();
    t.add_file("/case/a.txt", &[b'a'; 10])
        .add_file("/case/sub/b.txt", &[b'b'; 5])
        .add_file("/case/sub/deep/c.txt", &[b'c'; 7])
        .add_dir("/case/empty");
    t
}

/// 리모트의 모든 정규 파일 (리모트 루트 기준 상대경로, 크기)
async fn remote_files(t: &mut MemoryTransport, root: &str) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    let mut stack = vec![String::new()];
    while let Some(rel) = stack.pop() {
        let dir = if rel.is_empty() { root.to_string() } else { join_remote(root, &rel) };
        for name in t.list(&dir).await.unwrap() {
            let child = if rel.is_empty() { name.clone() } else { join_remote(&rel, &name) };
            let st = t.stat(&join_remote(root, &child)).await.unwrap();
            if st.is_dir() {
                stack.push(child);
            } else if st.is_regular() {
                out.push((child, st.size));
            }
        }
    }
    out
}

fn local_size(root: &Path, rel: &str) -> Option<u64> {
    std::fs::metadata(root.join(rel)).ok().map(|m| m.len())
}

#[tokio::test]
async fn nested_file_counts_only_in_its_own_level() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = MemoryTransport::new();
    t.add_file("/case/a.txt", &[b'a'; 10]).add_file("/case/sub/b.txt", &[b'b'; 5]);

    let result = mirror_dir(&mut t, "/case", tmp.path()).await.unwrap();

    assert!(tmp.path().join("sub").is_dir());
    assert_eq!(result.succeeded, 1);
    assert_eq!(t.gets(), &["/case/a.txt".to_string(), "/case/sub/b.txt".to_string()]);
}

#[tokio::test]
async fn second_mirror_run_transfers_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = case_tree();

    let first = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
    assert_eq!(first.total_succeeded(), 3);
    let fetched = t.gets().len();

    let second = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
    assert_eq!(t.gets().len(), fetched);
    assert_eq!(second.levels.len(), 4);
    for level in &second.levels {
        let r = level.result().unwrap();
        assert_eq!((r.succeeded, r.failed), (0, 0), "{}", level.remote_dir);
    }
    assert!(tmp.path().join("empty").is_dir());
}

#[tokio::test]
async fn every_file_is_mirrored_or_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = case_tree();
    t.truncate_get("/case/sub/b.txt").fail_get("/case/sub/deep/c.txt");

    let report = Mirror::new(&mut t).run("/case", tmp.path()).await.unwrap();
    let failed: Vec<String> = report.failed_paths().map(str::to_string).collect();
    assert_eq!(failed.len(), 2);

    for (rel, size) in remote_files(&mut t, "/case").await {
        let mirrored = local_size(tmp.path(), &rel) == Some(size);
        let reported = failed.iter().any(|p| Path::new(p) == tmp.path().join(&rel));
        assert!(mirrored || reported, "{} neither mirrored nor reported", rel);
    }

    // 재실행으로 수렴
    let mut healthy = case_tree();
    let rerun = Mirror::new(&mut healthy).run("/case", tmp.path()).await.unwrap();
    assert_eq!(rerun.failed_paths().count(), 0);
    assert_eq!(local_size(tmp.path(), "sub/deep/c.txt"), Some(7));
}

#[tokio::test]
async fn same_sized_remote_file_is_not_uploaded() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("x.csv.gz"), [1u8; 100]).unwrap();
    let mut t = MemoryTransport::new();
    t.add_file("/work/x.csv.gz", &[2u8; 100]);

    let report = upload_files(&mut t, tmp.path(), "/work").await.unwrap();
    assert!(t.puts().is_empty());
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn smaller_remote_file_is_overwritten() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("x.csv.gz"), [1u8; 100]).unwrap();
    let mut t = MemoryTransport::new();
    t.add_file("/work/x.csv.gz", &[2u8; 50]);

    let report = upload_files(&mut t, tmp.path(), "/work").await.unwrap();
    assert_eq!(t.puts(), &["/work/x.csv.gz".to_string()]);
    assert_eq!(report.uploaded, vec!["x.csv.gz"]);
    assert_eq!(t.file("/work/x.csv.gz").map(<[u8]>::len), Some(100));
}

#[tokio::test]
async fn only_local_copies_matching_remote_are_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("x.csv.gz"), [1u8; 100]).unwrap();
    std::fs::write(tmp.path().join("y.csv.gz"), [1u8; 100]).unwrap();
    let mut t = MemoryTransport::new();
    // y: 리모트가 더 크므로 전송하지 않고 크기도 다름
    t.add_file("/work/y.csv.gz", &[2u8; 150]);

    let report = upload_files(&mut t, tmp.path(), "/work").await.unwrap();
    assert!(!tmp.path().join("x.csv.gz").exists());
    assert!(tmp.path().join("y.csv.gz").exists());
    assert_eq!(report.deleted, vec![tmp.path().join("x.csv.gz")]);
    assert_eq!(report.remote_listing.len(), 2);
}

#[test]
fn progress_lines_match_log_format() {
    assert_eq!(format_ordinal_progress(3, 12), "[   3/12] ( 25.00%)");
    assert_eq!(format_byte_progress(50, 100), "transferred: 50/100 bytes [50.00%] incomplete");
    assert_eq!(format_byte_progress(100, 100), "transferred: 100/100 bytes [100.00%] OK");
    assert_eq!(format_ordinal_progress(0, 0), "[   0/0] (  0.00%)");
}
