use std::fs;
use std::path::Path;

/// Renames `src_path` to `dest_path`, failing with `AlreadyExists` instead of replacing an
/// existing destination.
///
/// Uses the platform's atomic no-replace primitive where one exists. On filesystems that refuse
/// it, falls back to an existence check followed by a plain rename, which leaves a small race
/// window (see DESIGN.md, concurrency notes).
pub(crate) fn rename_no_replace(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    match rename_no_replace_native(src_path, dest_path) {
        Err(err) if no_replace_unsupported(&err) => {
            tracing::debug!(
                from = %src_path.display(),
                to = %dest_path.display(),
                "atomic no-replace rename unsupported here; using checked rename"
            );
            match fs::symlink_metadata(dest_path) {
                Ok(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "destination exists",
                )),
                Err(meta_err) if meta_err.kind() == std::io::ErrorKind::NotFound => {
                    fs::rename(src_path, dest_path)
                }
                Err(meta_err) => Err(meta_err),
            }
        }
        other => other,
    }
}

/// `true` when a rename failed because source and destination live on different volumes.
pub(crate) fn is_cross_device(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::CrossesDevices {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn no_replace_unsupported(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::Unsupported {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            err.raw_os_error(),
            Some(code) if code == libc::EINVAL || code == libc::ENOSYS || code == libc::ENOTSUP
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(windows)]
fn rename_no_replace_native(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    use std::os::windows::ffi::OsStrExt;

    use windows_sys::Win32::Storage::FileSystem::{MOVEFILE_WRITE_THROUGH, MoveFileExW};

    fn to_wide_null(p: &Path) -> Vec<u16> {
        let mut wide: Vec<u16> = p.as_os_str().encode_wide().collect();
        wide.push(0);
        wide
    }

    let src_w = to_wide_null(src_path);
    let dest_w = to_wide_null(dest_path);

    // Without MOVEFILE_REPLACE_EXISTING the call fails if the destination exists, and without
    // MOVEFILE_COPY_ALLOWED a cross-volume move surfaces as ERROR_NOT_SAME_DEVICE.
    //
    // SAFETY:
    // - `src_w` and `dest_w` are owned, NUL-terminated UTF-16 buffers.
    // - Passed pointers stay valid for this synchronous call and do not escape.
    let moved = unsafe { MoveFileExW(src_w.as_ptr(), dest_w.as_ptr(), MOVEFILE_WRITE_THROUGH) };
    if moved == 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, any(target_os = "linux", target_os = "android")))]
fn rename_no_replace_native(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let src = CString::new(src_path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "source path contains interior NUL byte",
        )
    })?;
    let dest = CString::new(dest_path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "destination path contains interior NUL byte",
        )
    })?;

    // SAFETY:
    // - Both C strings are NUL-terminated and valid for this synchronous call.
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            src.as_ptr(),
            libc::AT_FDCWD,
            dest.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }
    Err(std::io::Error::last_os_error())
}

#[cfg(all(unix, any(target_os = "macos", target_os = "ios")))]
fn rename_no_replace_native(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let src = CString::new(src_path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "source path contains interior NUL byte",
        )
    })?;
    let dest = CString::new(dest_path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "destination path contains interior NUL byte",
        )
    })?;

    // SAFETY:
    // - Both C strings are NUL-terminated and valid for this synchronous call.
    let rc = unsafe { libc::renamex_np(src.as_ptr(), dest.as_ptr(), libc::RENAME_EXCL) };
    if rc == 0 {
        return Ok(());
    }
    Err(std::io::Error::last_os_error())
}

#[cfg(all(
    unix,
    not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    ))
))]
fn rename_no_replace_native(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    let _ = src_path;
    let _ = dest_path;
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "atomic no-replace rename is unsupported on this platform",
    ))
}

#[cfg(not(any(unix, windows)))]
fn rename_no_replace_native(src_path: &Path, dest_path: &Path) -> std::io::Result<()> {
    let _ = src_path;
    let _ = dest_path;
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "atomic no-replace rename is unsupported on this platform",
    ))
}
