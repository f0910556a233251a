//! Pipe allocation for child standard streams
//!
//! A child process gets three unidirectional channels: one the parent
//! writes (the child's stdin) and two the parent reads (the child's stdout
//! and stderr). All six endpoints are created before the process, in the
//! order stdout, stderr, stdin, and a failed creation closes every
//! endpoint made so far before the error returns.
//!
//! Endpoints are created with `O_CLOEXEC` so concurrently spawned children
//! never inherit stray descriptors; `dup2` onto a standard stream slot
//! clears the flag for exactly the endpoints a child must keep.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tracing::debug;

use crate::{Error, Result};

/// One unidirectional channel with a read end and a write end.
#[derive(Debug)]
pub struct Pipe {
    /// Read end of the channel
    pub read: OwnedFd,
    /// Write end of the channel
    pub write: OwnedFd,
}

/// The three channels backing a child's standard streams.
///
/// The stdin channel's read end goes to the child and its write end stays
/// with the parent; the stdout and stderr channels are the other way
/// around. Field order matches creation order.
#[derive(Debug)]
pub struct PipeTriple {
    /// Channel for the child's stdout (parent keeps `read`)
    pub stdout: Pipe,
    /// Channel for the child's stderr (parent keeps `read`)
    pub stderr: Pipe,
    /// Channel for the child's stdin (parent keeps `write`)
    pub stdin: Pipe,
}

/// Allocate the three channels for a future child process.
///
/// # Errors
///
/// Returns `Error::ResourceExhausted` when the OS refuses a pipe (for
/// example `EMFILE`/`ENFILE`). Endpoints created before the failure are
/// closed before the error returns; nothing leaks on any partial path.
pub fn allocate_pipes() -> Result<PipeTriple> {
    let triple = allocate_pipes_with(&mut || {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)
            .map_err(|e| Error::ResourceExhausted(format!("Unable to create pipe: {e}")))?;
        Ok((read, write))
    })?;
    debug!("Allocated stdio pipe triple");
    Ok(triple)
}

// Creation order is stdout, stderr, stdin. Early return drops (closes)
// every OwnedFd created so far, which is the rollback contract.
fn allocate_pipes_with<F>(create: &mut F) -> Result<PipeTriple>
where
    F: FnMut() -> Result<(OwnedFd, OwnedFd)>,
{
    let (read, write) = create()?;
    let stdout = Pipe { read, write };

    let (read, write) = create()?;
    let stderr = Pipe { read, write };

    let (read, write) = create()?;
    let stdin = Pipe { read, write };

    Ok(PipeTriple {
        stdout,
        stderr,
        stdin,
    })
}

/// Parent-retained read end of a pipe (the child's stdout or stderr).
///
/// Blocking by default; the caller owns the I/O policy.
#[derive(Debug)]
pub struct PipeReader(OwnedFd);

impl From<OwnedFd> for PipeReader {
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}

impl AsFd for PipeReader {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl AsRawFd for PipeReader {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl io::Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::read(
                self.0.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

/// Parent-retained write end of a pipe (the child's stdin).
#[derive(Debug)]
pub struct PipeWriter(OwnedFd);

impl From<OwnedFd> for PipeWriter {
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}

impl AsFd for PipeWriter {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl AsRawFd for PipeWriter {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::write(
                self.0.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Pipes have no userspace buffer to flush.
        Ok(())
    }
}
