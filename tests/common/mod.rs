#![allow(dead_code)]

use std::path::Path;

use safe_fm::EngineConfig;
use safe_fm::ops::Context;

pub fn test_config(root: &Path) -> EngineConfig {
    EngineConfig::new(root)
}

pub fn test_ctx(root: &Path) -> Context {
    Context::new(test_config(root)).expect("ctx")
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir parents");
    }
    std::fs::write(&path, content).expect("write");
}

#[cfg(unix)]
pub fn is_running_as_root() -> bool {
    // SAFETY: `geteuid` has no preconditions and does not touch memory.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).expect("chmod");
}

/// Restores a directory's mode on drop so tempdir cleanup can proceed after a failing test.
#[cfg(unix)]
pub struct ModeGuard<'a> {
    path: &'a Path,
    mode: u32,
}

#[cfg(unix)]
impl<'a> ModeGuard<'a> {
    pub fn new(path: &'a Path, temporary_mode: u32, restore_mode: u32) -> Self {
        set_mode(path, temporary_mode);
        Self {
            path,
            mode: restore_mode,
        }
    }
}

#[cfg(unix)]
impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(self.path, std::fs::Permissions::from_mode(self.mode));
    }
}
