//! Default [`DiskSpaceProbe`](crate::traits::DiskSpaceProbe) backed by
//! `statvfs(2)`, in the same spirit as the `libc`-based filesystem calls in
//! the atomic installer this engine was modeled on.

use std::ffi::CString;
use std::path::Path;

use crate::traits::DiskSpaceProbe;

/// Queries available space via `statvfs`. Returns `-1` if the path does not
/// exist or the syscall fails, which the disk-space gate treats as "no
/// space available" rather than panicking.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsDiskSpaceProbe;

impl DiskSpaceProbe for StatvfsDiskSpaceProbe {
    fn available_space(&self, path: &Path) -> i64 {
        let Some(path_str) = path.to_str() else {
            return -1;
        };
        let Ok(c_path) = CString::new(path_str) else {
            return -1;
        };

        #[allow(unsafe_code)]
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return -1;
            }
            let block_size = i64::try_from(stat.f_frsize).unwrap_or(0);
            let available_blocks = i64::try_from(stat.f_bavail).unwrap_or(0);
            block_size.saturating_mul(available_blocks)
        }
    }
}
