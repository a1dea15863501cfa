use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::OwnedFd;

use log::{trace, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, pipe2, ForkResult, Pid};

use crate::shell::error::{Error, ExecError, Result};

/// Exit status reported when a program cannot be executed.
pub const EXIT_NOT_FOUND: i32 = 127;

/// A forked child and the read end of its error channel.
pub struct Child {
    pid: Pid,
    errors: File,
}

impl Child {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Blocks until the child terminates. A fatal error raised in the child
    /// comes back as `ExecError::Child`, whatever status it exited with.
    pub fn wait(self) -> std::result::Result<i32, ExecError> {
        loop {
            if let Some(status) = waitpidx(self.pid, true)? {
                self.check()?;
                return Ok(status);
            }
        }
    }

    /// Like `wait`, but returns `None` at once while the child still runs.
    pub fn poll(&self) -> std::result::Result<Option<i32>, ExecError> {
        match waitpidx(self.pid, false)? {
            Some(status) => {
                self.check()?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    fn check(&self) -> std::result::Result<(), ExecError> {
        let mut message = Vec::new();
        match (&self.errors).read_to_end(&mut message) {
            Ok(_) => {}
            // Grandchildren may still hold the write end open.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("cannot read errors of child {}: {}", self.pid, e),
        }
        if message.is_empty() {
            Ok(())
        } else {
            Err(ExecError::Child(String::from_utf8_lossy(&message).into_owned()))
        }
    }
}

/// Forks and runs `body` in the child, which exits with the returned
/// status. A fatal error in the child is sent back over a close-on-exec
/// pipe and the child exits with status 1, so the parent sees it as an
/// error rather than a status.
pub fn fork_child<F>(body: F) -> std::result::Result<Child, ExecError>
where
    F: FnOnce() -> Result<i32>,
{
    // Anything still buffered would be written by both processes.
    let _ = io::stdout().flush();
    let (read_end, write_end) =
        pipe2(OFlag::O_CLOEXEC | OFlag::O_NONBLOCK).map_err(ExecError::Pipe)?;

    match unsafe { fork() }.map_err(ExecError::Fork)? {
        ForkResult::Parent { child } => {
            drop(write_end);
            trace!("forked child {}", child);
            Ok(Child {
                pid: child,
                errors: File::from(read_end),
            })
        }
        ForkResult::Child => {
            drop(read_end);
            let code = match body() {
                Ok(code) => code,
                Err(e) => {
                    report(write_end, &e);
                    1
                }
            };
            exit_child(code)
        }
    }
}

/// Hands a fatal error to the parent, or prints it if the parent cannot
/// be reached.
fn report(channel: OwnedFd, error: &Error) {
    let message = error.to_string();
    let mut channel = File::from(channel);
    if channel.write_all(message.as_bytes()).is_err() {
        eprintln!("{}: {}", env!("CARGO_PKG_NAME"), message);
    }
}

/// Leaves a forked child without running the parent's destructors or
/// atexit handlers.
pub fn exit_child(code: i32) -> ! {
    let _ = io::stdout().flush();
    unsafe { libc::_exit(code) }
}

/// Replaces the current process image. Only returns on failure, after
/// printing a diagnostic, with the status the child should exit with.
pub fn exec(argv: &[CString]) -> i32 {
    let Some(program) = argv.first() else {
        return EXIT_NOT_FOUND;
    };
    // Ignored signals survive exec, and Rust ignores SIGPIPE at startup.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };
    match execvp(program, argv) {
        Ok(never) => match never {},
        Err(errno) => {
            let name = program.to_string_lossy();
            if errno == Errno::ENOENT {
                eprintln!("{}: command not found", name);
            } else {
                eprintln!("{}: {}", name, errno.desc());
            }
            EXIT_NOT_FOUND
        }
    }
}

fn waitpidx(pid: Pid, block: bool) -> std::result::Result<Option<i32>, ExecError> {
    let options = if block {
        None
    } else {
        Some(WaitPidFlag::WNOHANG)
    };
    match waitpid(pid, options) {
        Ok(WaitStatus::Exited(_, status)) => Ok(Some(status)),
        // Same convention as a POSIX shell: 128 plus the signal number.
        Ok(WaitStatus::Signaled(_, sig, _)) => {
            warn!("child {} killed by {}", pid, sig);
            Ok(Some(128 + sig as i32))
        }
        Ok(WaitStatus::StillAlive) => Ok(None),
        Ok(other) => {
            trace!("child {} changed state: {:?}", pid, other);
            Ok(None)
        }
        Err(Errno::EINTR) => Ok(None),
        Err(e) => Err(ExecError::Wait(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_without_arguments() {
        assert_eq!(exec(&[]), EXIT_NOT_FOUND);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_child_status_is_returned() {
        let child = fork_child(|| Ok(3)).unwrap();
        assert_eq!(child.wait().unwrap(), 3);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_child_error_reaches_parent() {
        let child = fork_child(|| Err(ExecError::InvalidArgument("a".to_string()).into())).unwrap();
        let err = child.wait().unwrap_err();
        match err {
            ExecError::Child(message) => assert!(message.contains("NUL byte")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_poll_reports_child_error() {
        let child = fork_child(|| Err(ExecError::Stalled(vec![2]).into())).unwrap();
        let err = loop {
            match child.poll() {
                Ok(None) => std::thread::sleep(std::time::Duration::from_millis(1)),
                Ok(Some(status)) => panic!("error lost, got status {}", status),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, ExecError::Child(_)));
    }
}
