//! Linux-specific memory file operations

use crate::error::{ShmError, ShmResult};
use beacon::consts::SHM_DIR;
use memmap2::{MmapMut, MmapOptions};
use nix::time::{ClockId, clock_gettime};
use nix::unistd::{gethostname, getpid};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Poll interval while waiting for a contended file lock
const LOCK_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Path of the backing file for a named memory file
pub fn memfile_path(name: &str) -> PathBuf {
    PathBuf::from(SHM_DIR).join(name)
}

/// Open or create the backing file, sizing it to `size` bytes if it was empty
///
/// Existing files keep their size. Returns the file and whether it was empty
/// before this call.
pub fn create_memfile(name: &str, size: usize) -> ShmResult<(File, bool)> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .mode(0o666)
        .open(memfile_path(name))?;

    let fresh = file.metadata()?.len() == 0;
    if fresh {
        file.set_len(size as u64)?;
    }

    Ok((file, fresh))
}

/// Open an existing backing file
pub fn open_memfile(name: &str) -> ShmResult<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(memfile_path(name))
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ShmError::NotFound {
                    name: name.to_string(),
                }
            } else {
                ShmError::Io { source: e }
            }
        })
}

/// Map the whole backing file read/write
pub fn map_memfile(file: &File) -> ShmResult<MmapMut> {
    let mmap = unsafe { MmapOptions::new().map_mut(file)? };
    Ok(mmap)
}

/// Remove the backing file of a memory file
pub fn unlink_memfile(name: &str) -> ShmResult<()> {
    match std::fs::remove_file(memfile_path(name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Take a shared or exclusive `flock` on `file`, polling until `timeout` expires
///
/// Returns `Ok(false)` when the lock is still held by someone else at the deadline.
pub fn lock_file(file: &File, exclusive: bool, timeout: Duration) -> ShmResult<bool> {
    let operation = if exclusive {
        libc::LOCK_EX
    } else {
        libc::LOCK_SH
    } | libc::LOCK_NB;
    let deadline = Instant::now() + timeout;

    loop {
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(true);
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EWOULDBLOCK) | Some(libc::EINTR) => {}
            _ => return Err(err.into()),
        }

        if Instant::now() >= deadline {
            return Ok(false);
        }
        std::thread::sleep(LOCK_POLL_INTERVAL);
    }
}

/// Release a lock taken with [`lock_file`]
pub fn unlock_file(file: &File) {
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

/// Get current process ID
pub fn get_current_pid() -> i32 {
    getpid().as_raw()
}

/// Host name of this machine, `"localhost"` if it cannot be determined
pub fn host_name() -> String {
    gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Microseconds on the system-wide monotonic clock
///
/// The clock is shared by all processes on the host, so timestamps taken by
/// different processes are comparable.
pub fn monotonic_timestamp_us() -> i64 {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => (ts.tv_sec() as i64) * 1_000_000 + (ts.tv_nsec() as i64) / 1_000,
        Err(_) => 0,
    }
}
