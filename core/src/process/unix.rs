//! Unix process launch with piped standard streams
//!
//! This module spawns a child process whose stdin, stdout, and stderr are
//! rewired to pipes allocated by [`crate::pipes::allocate_pipes`]. The
//! parent keeps exactly three endpoints (write-to-stdin, read-from-stdout,
//! read-from-stderr); the child-side endpoints are closed in the parent as
//! soon as the child owns its copies, so the parent can observe
//! end-of-stream on the read sides.
//!
//! ## Redirection
//!
//! Stream rewiring happens in the new execution context, before it runs
//! user code, through a `pre_exec` hook. The `dup2` order mirrors the
//! allocation order: stdout, stderr, stdin. A failed `dup2` or `exec`
//! reaches the parent through the spawn error channel, so `spawn` returns
//! a typed error instead of leaving a misbehaving child behind.
//!
//! ## Safety
//!
//! The `pre_exec` hook runs between `fork` and `exec` and is restricted to
//! async-signal-safe calls; `dup2` qualifies. Error handling converts the
//! raw C errors to Rust errors.

// Allow unsafe code for this module since the pre_exec hook requires raw libc calls
#![allow(unsafe_code)]

use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus};

use nix::unistd::Pid;
use tracing::{debug, error};

use crate::pipes::{allocate_pipes, PipeReader, PipeTriple, PipeWriter};
use crate::{Error, Result};

/// A spawned child process bound to its three parent-side pipe endpoints.
///
/// The handle owns the endpoints and the platform process reference until
/// [`ProcessHandle::release`] is called or the handle is dropped; either
/// way every endpoint is closed exactly once.
#[derive(Debug)]
pub struct ProcessHandle {
    /// The process ID of the spawned process
    pid: Pid,
    /// Live resources; `None` once the handle has been released
    inner: Option<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    child: Child,
    stdin: PipeWriter,
    stdout: PipeReader,
    stderr: PipeReader,
}

/// Spawn a new process with piped standard streams
///
/// Allocates the stdout/stderr/stdin pipe triple, creates the child with
/// its standard streams redirected to the child-side endpoints, and
/// returns a handle owning the parent-side endpoints.
///
/// By argv convention `args` carries the full argument vector: when it is
/// non-empty, `args[0]` becomes the child's `argv[0]` and the rest follow;
/// when it is empty, `argv[0]` defaults to `path`.
///
/// ## Errors
///
/// - `Error::ProcessCreation` when `path` is empty, when the OS cannot
///   create the child, or when the child-side stream rewiring fails (the
///   failure reaches the parent through the spawn error channel).
/// - `Error::ResourceExhausted` when pipe allocation fails; endpoints
///   created before the failure are closed first.
///
/// On any failure all six pipe endpoints are closed and no handle escapes.
///
/// ## Example
///
/// ```rust,no_run
/// use procpipe_core::process::unix::spawn;
///
/// let mut handle = spawn("/bin/echo", &["echo", "hi"])?;
/// println!("Spawned process with PID: {}", handle.pid());
/// handle.release()?;
/// # Ok::<(), procpipe_core::Error>(())
/// ```
pub fn spawn(path: &str, args: &[&str]) -> Result<ProcessHandle> {
    if path.is_empty() {
        return Err(Error::ProcessCreation(
            "program path must not be empty".to_string(),
        ));
    }

    let pipes = allocate_pipes()?;
    spawn_with_pipes(path, args, pipes)
}

fn spawn_with_pipes(path: &str, args: &[&str], pipes: PipeTriple) -> Result<ProcessHandle> {
    debug!("Spawning process: {} {:?}", path, args);

    let mut command = Command::new(path);
    if let Some((arg0, rest)) = args.split_first() {
        command.arg0(arg0);
        command.args(rest);
    }

    let child_stdout = pipes.stdout.write.as_raw_fd();
    let child_stderr = pipes.stderr.write.as_raw_fd();
    let child_stdin = pipes.stdin.read.as_raw_fd();

    // Rewire the child's standard streams before it runs user code. The
    // dup2 order mirrors the allocation order: stdout, stderr, stdin.
    // Safety: dup2 is async-signal-safe and appropriate for use in pre_exec
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        command.pre_exec(move || {
            if libc::dup2(child_stdout, libc::STDOUT_FILENO) == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::dup2(child_stderr, libc::STDERR_FILENO) == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::dup2(child_stdin, libc::STDIN_FILENO) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    // On error `pipes` drops here, closing all six endpoints.
    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", path, e);
        Error::ProcessCreation(format!("Failed to spawn '{}': {}", path, e))
    })?;

    let pid = Pid::from_raw(child.id() as i32);

    // The child owns its copies of these endpoints now; dropping the
    // parent's references lets the read sides report end-of-stream.
    let PipeTriple {
        stdout,
        stderr,
        stdin,
    } = pipes;
    drop(stdout.write);
    drop(stderr.write);
    drop(stdin.read);

    debug!("Successfully spawned process {} with piped stdio", pid);

    Ok(ProcessHandle {
        pid,
        inner: Some(HandleInner {
            child,
            stdin: PipeWriter::from(stdin.write),
            stdout: PipeReader::from(stdout.read),
            stderr: PipeReader::from(stderr.read),
        }),
    })
}

impl ProcessHandle {
    /// Get the process ID. Remains available after `release`.
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Write end of the pipe connected to the child's stdin
    pub fn stdin_writer(&mut self) -> Result<&mut PipeWriter> {
        Ok(&mut self.inner_mut("stdin_writer")?.stdin)
    }

    /// Read end of the pipe connected to the child's stdout
    pub fn stdout_reader(&mut self) -> Result<&mut PipeReader> {
        Ok(&mut self.inner_mut("stdout_reader")?.stdout)
    }

    /// Read end of the pipe connected to the child's stderr
    pub fn stderr_reader(&mut self) -> Result<&mut PipeReader> {
        Ok(&mut self.inner_mut("stderr_reader")?.stderr)
    }

    /// Close all three parent-side endpoints and release the process
    /// reference.
    ///
    /// A handle can be released once; any accessor call (or a second
    /// `release`) afterwards fails with `Error::InvalidHandle`. Dropping an
    /// unreleased handle performs the same cleanup.
    pub fn release(&mut self) -> Result<()> {
        let pid = self.pid;
        let inner = self.inner.take().ok_or_else(|| {
            Error::InvalidHandle(format!("release called twice for process {pid}"))
        })?;
        drop(inner);
        debug!("Released handle for process {}", pid);
        Ok(())
    }

    /// Wait for the process to exit and return its exit status.
    ///
    /// Reaping is opt-in: nothing waits on the child implicitly, and
    /// `release` never blocks.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let pid = self.pid;
        self.inner_mut("wait")?
            .child
            .wait()
            .map_err(|e| Error::ProcessWait(format!("Failed to wait for process {pid}: {e}")))
    }

    /// Try to wait for the process to exit without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        let pid = self.pid;
        self.inner_mut("try_wait")?
            .child
            .try_wait()
            .map_err(|e| Error::ProcessWait(format!("Failed to try_wait for process {pid}: {e}")))
    }

    fn inner_mut(&mut self, op: &str) -> Result<&mut HandleInner> {
        let pid = self.pid;
        self.inner.as_mut().ok_or_else(|| {
            Error::InvalidHandle(format!("{op} called on released handle for process {pid}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::fd::RawFd;

    fn fd_inode(fd: RawFd) -> u64 {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(fd, &mut st) };
        assert_eq!(rc, 0, "fstat failed on fd {fd}");
        st.st_ino as u64
    }

    fn fd_released(fd: RawFd, inode: u64) -> bool {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(fd, &mut st) };
        rc == -1 || st.st_ino as u64 != inode
    }

    fn fd_open_with_inode(fd: RawFd, inode: u64) -> bool {
        !fd_released(fd, inode)
    }

    fn reap(pid: u32) {
        let mut status = 0;
        unsafe { libc::waitpid(pid as i32, &mut status, 0) };
    }

    #[test]
    fn test_spawn_retains_parent_side_and_closes_child_side() {
        let pipes = allocate_pipes().expect("Failed to allocate pipes");

        let child_side = [
            (
                pipes.stdout.write.as_raw_fd(),
                fd_inode(pipes.stdout.write.as_raw_fd()),
            ),
            (
                pipes.stderr.write.as_raw_fd(),
                fd_inode(pipes.stderr.write.as_raw_fd()),
            ),
            (
                pipes.stdin.read.as_raw_fd(),
                fd_inode(pipes.stdin.read.as_raw_fd()),
            ),
        ];
        let parent_stdout = (
            pipes.stdout.read.as_raw_fd(),
            fd_inode(pipes.stdout.read.as_raw_fd()),
        );
        let parent_stderr = (
            pipes.stderr.read.as_raw_fd(),
            fd_inode(pipes.stderr.read.as_raw_fd()),
        );
        let parent_stdin = (
            pipes.stdin.write.as_raw_fd(),
            fd_inode(pipes.stdin.write.as_raw_fd()),
        );

        let mut handle =
            spawn_with_pipes("cat", &["cat"], pipes).expect("Failed to spawn cat");
        let pid = handle.pid();

        // Child-side endpoints must be closed in the parent after launch.
        for (fd, inode) in child_side {
            assert!(fd_released(fd, inode), "child-side fd {fd} still open");
        }

        // The parent retains exactly the three endpoints it will use.
        let stdout_fd = handle.stdout_reader().unwrap().as_raw_fd();
        let stderr_fd = handle.stderr_reader().unwrap().as_raw_fd();
        let stdin_fd = handle.stdin_writer().unwrap().as_raw_fd();
        assert_eq!(stdout_fd, parent_stdout.0);
        assert_eq!(stderr_fd, parent_stderr.0);
        assert_eq!(stdin_fd, parent_stdin.0);
        assert!(fd_open_with_inode(parent_stdout.0, parent_stdout.1));
        assert!(fd_open_with_inode(parent_stderr.0, parent_stderr.1));
        assert!(fd_open_with_inode(parent_stdin.0, parent_stdin.1));

        // Releasing closes all three; cat exits on stdin end-of-stream.
        handle.release().expect("Failed to release handle");
        assert!(fd_released(parent_stdout.0, parent_stdout.1));
        assert!(fd_released(parent_stderr.0, parent_stderr.1));
        assert!(fd_released(parent_stdin.0, parent_stdin.1));
        reap(pid);
    }

    #[test]
    fn test_spawn_failure_closes_all_endpoints() {
        let pipes = allocate_pipes().expect("Failed to allocate pipes");
        let endpoints = [
            pipes.stdout.read.as_raw_fd(),
            pipes.stdout.write.as_raw_fd(),
            pipes.stderr.read.as_raw_fd(),
            pipes.stderr.write.as_raw_fd(),
            pipes.stdin.read.as_raw_fd(),
            pipes.stdin.write.as_raw_fd(),
        ];
        let inodes: Vec<u64> = endpoints.iter().map(|&fd| fd_inode(fd)).collect();

        let result = spawn_with_pipes("this_command_does_not_exist_12345", &[], pipes);
        match result {
            Err(Error::ProcessCreation(_)) => {}
            other => panic!("Expected ProcessCreation error, got: {other:?}"),
        }

        for (fd, inode) in endpoints.into_iter().zip(inodes) {
            assert!(fd_released(fd, inode), "fd {fd} leaked after failed spawn");
        }
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let result = spawn("", &[]);
        match result {
            Err(Error::ProcessCreation(_)) => {}
            other => panic!("Expected ProcessCreation error, got: {other:?}"),
        }
    }

    #[test]
    fn test_argv0_convention() {
        // args[0] becomes the child's argv[0]; `sh -c 'echo $0'` echoes it.
        let mut handle = spawn("/bin/sh", &["custom-name", "-c", "echo $0"])
            .expect("Failed to spawn sh");
        let mut out = String::new();
        handle
            .stdout_reader()
            .unwrap()
            .read_to_string(&mut out)
            .expect("Failed to read stdout");
        assert_eq!(out.trim_end(), "custom-name");
        handle.wait().expect("Failed to wait for sh");
    }
}
