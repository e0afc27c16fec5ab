mod common;

use std::path::PathBuf;

use common::{test_config, test_ctx, write_file};
use safe_fm::Error;
use safe_fm::ops::{Context, StatKind};

#[test]
fn stat_describes_files_and_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "docs/manual.pdf", "%PDF-1.7");
    let ctx = test_ctx(dir.path());

    let file = ctx.stat(&ctx.resolve("docs/manual.pdf").expect("resolve")).expect("stat");
    assert_eq!(file.name, "manual.pdf");
    assert_eq!(file.kind, StatKind::File);
    assert_eq!(file.size_bytes, 8);
    assert_eq!(file.mime.as_deref(), Some("application/pdf"));
    assert_eq!(file.relative_path, PathBuf::from("docs/manual.pdf"));
    assert!(file.modified.is_some());
    assert!(!file.is_symlink);

    let docs = ctx.stat(&ctx.resolve("docs").expect("resolve")).expect("stat");
    assert_eq!(docs.kind, StatKind::Directory);
    assert_eq!(docs.size_bytes, 0);
    assert_eq!(docs.mime, None);

    let root = ctx.stat(&ctx.resolve("").expect("root")).expect("stat");
    assert_eq!(root.relative_path, PathBuf::from("."));
}

#[test]
fn stat_of_a_missing_entry_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = test_ctx(dir.path());

    let err = ctx
        .stat(&ctx.resolve("ghost.txt").expect("resolve"))
        .expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
}

#[test]
#[cfg(unix)]
fn stat_follows_a_symlink_inside_the_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "data.json", "{}");
    std::os::unix::fs::symlink("data.json", dir.path().join("latest")).expect("symlink");
    let ctx = test_ctx(dir.path());

    let stat = ctx.stat(&ctx.resolve("latest").expect("resolve")).expect("stat");
    assert!(stat.is_symlink);
    assert_eq!(stat.kind, StatKind::File);
    assert_eq!(stat.size_bytes, 2);
}

#[test]
fn read_returns_bytes_and_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "hello.txt", "hello world");
    let ctx = test_ctx(dir.path());

    let read = ctx
        .read_file(&ctx.resolve("hello.txt").expect("resolve"))
        .expect("read");
    assert_eq!(read.name, "hello.txt");
    assert_eq!(read.bytes_read, 11);
    assert_eq!(read.content, b"hello world");
    assert_eq!(read.text.as_deref(), Some("hello world"));
    assert_eq!(read.mime, "text/plain");
}

#[test]
fn binary_content_has_no_text_form() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).expect("write");
    let ctx = test_ctx(dir.path());

    let read = ctx
        .read_file(&ctx.resolve("blob.bin").expect("resolve"))
        .expect("read");
    assert_eq!(read.content, [0xff, 0xfe, 0x00]);
    assert_eq!(read.text, None);
}

#[test]
fn read_refuses_directories_and_oversized_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "big.log", "0123456789");
    std::fs::create_dir(dir.path().join("folder")).expect("mkdir");
    let mut config = test_config(dir.path());
    config.limits.max_read_bytes = 4;
    let ctx = Context::new(config).expect("ctx");

    let err = ctx
        .read_file(&ctx.resolve("folder").expect("resolve"))
        .expect_err("directory");
    assert_eq!(err.code(), "invalid_path");

    let err = ctx
        .read_file(&ctx.resolve("big.log").expect("resolve"))
        .expect_err("too large");
    match err {
        Error::TooLarge {
            size_bytes,
            max_bytes,
            ..
        } => {
            assert_eq!(size_bytes, 10);
            assert_eq!(max_bytes, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
