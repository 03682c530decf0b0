// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Opening log segment files with the OS page cache bypassed.
//!
//! Two mechanisms exist:
//!
//! - macOS/iOS: the file is opened normally and `F_NOCACHE` is set on the
//!   descriptor. No buffer alignment is needed.
//! - Linux, Android and the BSDs that support it: `O_DIRECT` is passed at open
//!   time. Buffers, offsets and lengths used on such a handle must be multiples of
//!   [`ALIGN_SIZE`]; this module does not check or pad them.
//!
//! Other platforms fall back to a buffered open.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::AppResult;

/// Recommended I/O granularity on direct handles.
pub const BLOCK_SIZE: usize = 4096;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod sys {
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use crate::{AppError, AppResult};

    /// No alignment required with `F_NOCACHE`.
    pub const ALIGN_SIZE: usize = 0;

    pub fn open_direct(path: &Path, options: OpenOptions) -> AppResult<File> {
        let file = options.open(path)?;
        // a non-zero argument turns data caching off for this descriptor
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
        if ret == -1 {
            let source = std::io::Error::last_os_error();
            drop(file);
            return Err(AppError::DirectIo {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(file)
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
mod sys {
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::Path;

    use crate::AppResult;

    /// Buffers must start on a 4096 byte boundary with `O_DIRECT`.
    pub const ALIGN_SIZE: usize = 4096;

    pub fn open_direct(path: &Path, mut options: OpenOptions) -> AppResult<File> {
        options.custom_flags(libc::O_DIRECT);
        Ok(options.open(path)?)
    }
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
mod sys {
    use std::fs::{File, OpenOptions};
    use std::path::Path;

    use tracing::warn;

    use crate::AppResult;

    pub const ALIGN_SIZE: usize = 0;

    pub fn open_direct(path: &Path, options: OpenOptions) -> AppResult<File> {
        warn!(
            "direct io is not supported on this platform, opening {} buffered",
            path.display()
        );
        Ok(options.open(path)?)
    }
}

pub use sys::ALIGN_SIZE;

#[cfg(unix)]
fn apply_mode(options: &mut OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(mode);
}

#[cfg(not(unix))]
fn apply_mode(_options: &mut OpenOptions, _mode: u32) {}

/// Opens `path` with `options`, optionally asking the OS to bypass its page cache.
///
/// `mode` is the permission set used when `options` creates the file (ignored on
/// non-unix targets). When `direct` is false this is a plain open. Failures of the
/// open itself are returned unchanged; a failure to switch the cache off closes the
/// handle and returns [`crate::AppError::DirectIo`].
pub fn open_file<P: AsRef<Path>>(
    path: P,
    direct: bool,
    mut options: OpenOptions,
    mode: u32,
) -> AppResult<File> {
    let path = path.as_ref();
    apply_mode(&mut options, mode);
    if !direct {
        return Ok(options.open(path)?);
    }
    sys::open_direct(path, options)
}

/// Read-only options, the way segment readers open files.
pub fn read_only() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true);
    options
}
