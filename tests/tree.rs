mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{test_ctx, write_file};
use safe_fm::Error;
use safe_fm::ops::{DeleteKind, MoveMethod};

#[test]
fn create_directory_creates_a_single_child() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = test_ctx(dir.path());

    let root = ctx.resolve("").expect("root");
    let created = ctx.create_directory(&root, " projects ").expect("mkdir");
    assert_eq!(created.relative_path, PathBuf::from("projects"));
    assert!(ctx.root().join("projects").is_dir());

    let err = ctx
        .create_directory(&root, "projects")
        .expect_err("second mkdir");
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
}

#[test]
fn create_directory_rejects_names_that_are_not_one_segment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = test_ctx(dir.path());
    let root = ctx.resolve("").expect("root");

    for name in ["", "  ", ".", "..", "a/b", "../escape", "a\\b"] {
        let err = ctx.create_directory(&root, name).expect_err("invalid name");
        assert_eq!(err.code(), "invalid_path", "{name:?}");
    }
    assert_eq!(fs::read_dir(ctx.root()).expect("read_dir").count(), 0);
}

#[test]
#[cfg(unix)]
fn create_directory_uses_configured_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = test_ctx(dir.path());
    let root = ctx.resolve("").expect("root");
    ctx.create_directory(&root, "uploads").expect("mkdir");

    let mode = fs::metadata(ctx.root().join("uploads"))
        .expect("metadata")
        .permissions()
        .mode();
    // The process umask may only clear bits.
    assert_eq!(mode & 0o7777 & !0o755, 0, "mode {mode:o}");
}

#[test]
fn rename_round_trip_restores_the_original() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "docs/a.txt", "alpha");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("docs/a.txt").expect("resolve");
    let renamed = ctx.rename(&from, "b.txt").expect("rename");
    assert_eq!(renamed.to, PathBuf::from("docs/b.txt"));
    assert!(!ctx.root().join("docs/a.txt").exists());

    let back = ctx.resolve("docs/b.txt").expect("resolve");
    ctx.rename(&back, "a.txt").expect("rename back");
    assert_eq!(
        fs::read_to_string(ctx.root().join("docs/a.txt")).expect("read"),
        "alpha"
    );
    assert!(!ctx.root().join("docs/b.txt").exists());
}

#[test]
fn rename_refuses_existing_target_and_bad_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "a.txt", "a");
    write_file(dir.path(), "b.txt", "b");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("a.txt").expect("resolve");
    let err = ctx.rename(&from, "b.txt").expect_err("exists");
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
    assert_eq!(fs::read_to_string(ctx.root().join("a.txt")).expect("read"), "a");
    assert_eq!(fs::read_to_string(ctx.root().join("b.txt")).expect("read"), "b");

    let err = ctx.rename(&from, "../c.txt").expect_err("separator");
    assert_eq!(err.code(), "invalid_path");

    let missing = ctx.resolve("missing.txt").expect("resolve");
    let err = ctx.rename(&missing, "c.txt").expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");

    let root = ctx.resolve("").expect("root");
    let err = ctx.rename(&root, "c").expect_err("root");
    assert_eq!(err.code(), "invalid_path");
}

#[test]
fn copied_file_is_independent_of_the_original() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "a.txt", "original");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("a.txt").expect("resolve");
    let to = ctx.resolve("copy.txt").expect("resolve");
    let copied = ctx.copy(&from, &to).expect("copy");
    assert_eq!(copied.files_copied, 1);
    assert_eq!(copied.bytes, "original".len() as u64);

    fs::write(ctx.root().join("copy.txt"), "changed").expect("write");
    assert_eq!(
        fs::read_to_string(ctx.root().join("a.txt")).expect("read"),
        "original"
    );
}

#[test]
fn copy_recreates_a_directory_tree() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "src/a.txt", "a");
    write_file(dir.path(), "src/nested/b.txt", "bb");
    fs::create_dir(dir.path().join("src/empty")).expect("mkdir");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("src").expect("resolve");
    let to = ctx.resolve("dst").expect("resolve");
    let copied = ctx.copy(&from, &to).expect("copy");

    assert_eq!(copied.files_copied, 2);
    assert_eq!(copied.dirs_created, 3);
    assert_eq!(copied.bytes, 3);
    assert_eq!(
        fs::read_to_string(ctx.root().join("dst/nested/b.txt")).expect("read"),
        "bb"
    );
    assert!(ctx.root().join("dst/empty").is_dir());
    assert!(ctx.root().join("src/a.txt").exists());
}

#[test]
fn copy_fails_fast_before_mutating() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "src/a.txt", "a");
    write_file(dir.path(), "taken.txt", "t");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("src/a.txt").expect("resolve");
    let taken = ctx.resolve("taken.txt").expect("resolve");
    let err = ctx.copy(&from, &taken).expect_err("exists");
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");
    assert_eq!(
        fs::read_to_string(ctx.root().join("taken.txt")).expect("read"),
        "t"
    );

    let missing = ctx.resolve("nope.txt").expect("resolve");
    let free = ctx.resolve("free.txt").expect("resolve");
    let err = ctx.copy(&missing, &free).expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");

    let tree = ctx.resolve("src").expect("resolve");
    let inside = ctx.resolve("src/inner").expect("resolve");
    let err = ctx.copy(&tree, &inside).expect_err("into itself");
    assert_eq!(err.code(), "invalid_path");
    assert!(!ctx.root().join("src/inner").exists());
}

#[test]
#[cfg(unix)]
fn copy_reports_symlinks_inside_the_tree_as_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "src/a.txt", "a");
    std::os::unix::fs::symlink("a.txt", dir.path().join("src/link")).expect("symlink");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("src").expect("resolve");
    let to = ctx.resolve("dst").expect("resolve");
    let err = ctx.copy(&from, &to).expect_err("partial");

    match &err {
        Error::PartialFailure { op, failures, .. } => {
            assert_eq!(*op, "copy");
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].path, PathBuf::from("src/link"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(ctx.root().join("dst/a.txt").exists());
    assert!(fs::symlink_metadata(ctx.root().join("dst/link")).is_err());
}

#[test]
fn recursive_delete_counts_every_removed_entry() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "tree/a.txt", "a");
    write_file(dir.path(), "tree/b.txt", "b");
    write_file(dir.path(), "tree/c.txt", "c");
    write_file(dir.path(), "tree/s1/x.txt", "x");
    fs::create_dir(dir.path().join("tree/s2")).expect("mkdir");
    let ctx = test_ctx(dir.path());

    let target = ctx.resolve("tree").expect("resolve");
    let deleted = ctx.delete(&target).expect("delete");

    // 4 files + 2 subdirectories + the directory itself.
    assert_eq!(deleted.removed, 7);
    assert_eq!(deleted.kind, DeleteKind::Directory);
    assert!(deleted.kind == "directory");
    assert!(!ctx.root().join("tree").exists());
}

#[test]
fn delete_refuses_root_and_reports_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "keep.txt", "k");
    let ctx = test_ctx(dir.path());

    let root = ctx.resolve("").expect("root");
    let err = ctx.delete(&root).expect_err("root");
    assert_eq!(err.code(), "invalid_path");
    assert!(ctx.root().join("keep.txt").exists());

    let missing = ctx.resolve("gone.txt").expect("resolve");
    let err = ctx.delete(&missing).expect_err("missing");
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
}

#[test]
#[cfg(unix)]
fn delete_unlinks_symlinks_without_touching_targets() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "real/data.txt", "data");
    std::os::unix::fs::symlink("real", dir.path().join("alias")).expect("symlink");
    let ctx = test_ctx(dir.path());

    let alias = ctx.resolve("alias").expect("resolve");
    let deleted = ctx.delete(&alias).expect("delete");
    assert_eq!(deleted.kind, DeleteKind::Symlink);
    assert_eq!(deleted.removed, 1);
    assert!(fs::symlink_metadata(ctx.root().join("alias")).is_err());
    assert!(ctx.root().join("real/data.txt").exists());
}

#[test]
#[cfg(unix)]
fn recursive_delete_reports_exactly_the_failed_entries() {
    if common::is_running_as_root() {
        eprintln!("skipping: permission checks do not apply to root");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "tree/other.txt", "o");
    write_file(dir.path(), "tree/locked/held.txt", "h");
    let ctx = test_ctx(dir.path());

    let locked = ctx.root().join("tree/locked");
    let _guard = common::ModeGuard::new(&locked, 0o555, 0o755);

    let target = ctx.resolve("tree").expect("resolve");
    let err = ctx.delete(&target).expect_err("partial");
    match &err {
        Error::PartialFailure {
            op,
            processed,
            failures,
        } => {
            assert_eq!(*op, "delete");
            assert_eq!(*processed, 1);
            let paths: Vec<&Path> = failures.iter().map(|f| f.path.as_path()).collect();
            assert_eq!(paths, [Path::new("tree/locked/held.txt")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!ctx.root().join("tree/other.txt").exists());
    assert!(ctx.root().join("tree/locked/held.txt").exists());
}

#[test]
fn move_relocates_into_another_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "inbox/report.txt", "r");
    fs::create_dir(dir.path().join("archive")).expect("mkdir");
    let ctx = test_ctx(dir.path());

    let from = ctx.resolve("inbox/report.txt").expect("resolve");
    let to = ctx.resolve("archive/report.txt").expect("resolve");
    let moved = ctx.move_path(&from, &to).expect("move");

    assert_eq!(moved.method, MoveMethod::Rename);
    assert_eq!(moved.to, PathBuf::from("archive/report.txt"));
    assert!(!ctx.root().join("inbox/report.txt").exists());
    assert_eq!(
        fs::read_to_string(ctx.root().join("archive/report.txt")).expect("read"),
        "r"
    );
}

#[test]
fn move_refuses_root_own_subtree_and_existing_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "a/inner/x.txt", "x");
    write_file(dir.path(), "b.txt", "b");
    let ctx = test_ctx(dir.path());

    let a = ctx.resolve("a").expect("resolve");
    let into_self = ctx.resolve("a/inner/a").expect("resolve");
    let err = ctx.move_path(&a, &into_self).expect_err("into itself");
    assert_eq!(err.code(), "invalid_path");

    let taken = ctx.resolve("b.txt").expect("resolve");
    let x = ctx.resolve("a/inner/x.txt").expect("resolve");
    let err = ctx.move_path(&x, &taken).expect_err("exists");
    assert!(matches!(err, Error::AlreadyExists(_)), "{err:?}");

    let root = ctx.resolve("").expect("root");
    let elsewhere = ctx.resolve("a/root").expect("resolve");
    let err = ctx.move_path(&root, &elsewhere).expect_err("root");
    assert_eq!(err.code(), "invalid_path");
    assert!(ctx.root().join("a/inner/x.txt").exists());
}

#[test]
#[cfg(unix)]
fn copy_keeps_going_past_an_unreadable_file() {
    if common::is_running_as_root() {
        eprintln!("skipping: permission checks do not apply to root");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "src/a.txt", "a");
    write_file(dir.path(), "src/locked.txt", "secret");
    write_file(dir.path(), "src/sub/b.txt", "b");
    let ctx = test_ctx(dir.path());

    let locked = ctx.root().join("src/locked.txt");
    let _guard = common::ModeGuard::new(&locked, 0o000, 0o644);

    let from = ctx.resolve("src").expect("resolve");
    let to = ctx.resolve("dst").expect("resolve");
    let err = ctx.copy(&from, &to).expect_err("partial");
    match &err {
        Error::PartialFailure {
            op,
            processed,
            failures,
        } => {
            assert_eq!(*op, "copy");
            // dst, dst/sub, a.txt and sub/b.txt.
            assert_eq!(*processed, 4);
            let paths: Vec<&Path> = failures.iter().map(|f| f.path.as_path()).collect();
            assert_eq!(paths, [Path::new("src/locked.txt")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(ctx.root().join("dst/a.txt")).expect("read"),
        "a"
    );
    assert_eq!(
        fs::read_to_string(ctx.root().join("dst/sub/b.txt")).expect("read"),
        "b"
    );
    assert!(!ctx.root().join("dst/locked.txt").exists());
}
