use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::debug;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::unistd::{close, dup2};

use crate::shell::error::ExecError;

/// Files opened for a node's `<` and `>` before anything is forked, so an
/// unopenable file stops the run in the parent.
#[derive(Debug, Default)]
pub struct Redirections {
    input: Option<File>,
    output: Option<File>,
}

impl Redirections {
    /// Input is opened read-only. Output is created or truncated with
    /// mode 0666 before the umask.
    pub fn open(input: Option<&str>, output: Option<&str>) -> Result<Self, ExecError> {
        let input = input
            .map(|path| {
                debug!("opening {} for reading", path);
                File::open(path).map_err(|source| open_error(path, source))
            })
            .transpose()?;
        let output = output
            .map(|path| {
                debug!("opening {} for writing", path);
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .mode(0o666)
                    .open(path)
                    .map_err(|source| open_error(path, source))
            })
            .transpose()?;
        Ok(Self { input, output })
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    /// Moves the files onto stdin and stdout in a forked child and closes
    /// the originals. The parent keeps its own copies until it drops them.
    pub fn apply(&self) -> Result<(), ExecError> {
        if let Some(file) = &self.input {
            move_fd(file.as_raw_fd(), libc::STDIN_FILENO)?;
        }
        if let Some(file) = &self.output {
            move_fd(file.as_raw_fd(), libc::STDOUT_FILENO)?;
        }
        Ok(())
    }
}

fn open_error(path: &str, source: io::Error) -> ExecError {
    ExecError::Open {
        path: path.to_string(),
        source,
    }
}

/// Duplicates `fd` onto `target` and closes `fd`. Only for use in a child
/// that never drops the owner of `fd`.
///
/// When `fd` already is `target` (the tool started with that stream
/// closed), it is only made to survive exec.
pub fn move_fd(fd: RawFd, target: RawFd) -> Result<(), ExecError> {
    if fd == target {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map_err(|e| ExecError::Dup(e.into()))?;
        return Ok(());
    }
    dup2(fd, target).map_err(|e| ExecError::Dup(e.into()))?;
    close(fd).map_err(|e| ExecError::Dup(e.into()))?;
    Ok(())
}

/// Points stdin and stdout at a node's files for the duration of its
/// subtree and puts the originals back on drop.
pub struct StdioGuard {
    saved_input: Option<OwnedFd>,
    saved_output: Option<OwnedFd>,
}

impl StdioGuard {
    pub fn redirect(redirections: Redirections) -> Result<Self, ExecError> {
        let mut guard = Self {
            saved_input: None,
            saved_output: None,
        };
        if let Some(file) = redirections.input {
            guard.saved_input = Some(save(libc::STDIN_FILENO)?);
            dup2(file.as_raw_fd(), libc::STDIN_FILENO).map_err(|e| ExecError::Dup(e.into()))?;
        }
        if let Some(file) = redirections.output {
            let _ = io::stdout().flush();
            guard.saved_output = Some(save(libc::STDOUT_FILENO)?);
            dup2(file.as_raw_fd(), libc::STDOUT_FILENO).map_err(|e| ExecError::Dup(e.into()))?;
        }
        Ok(guard)
    }
}

/// A close-on-exec copy of `fd`, so commands run meanwhile never see it.
fn save(fd: RawFd) -> Result<OwnedFd, ExecError> {
    // SAFETY: stdin and stdout stay open for the life of the process.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    fd.try_clone_to_owned().map_err(ExecError::Dup)
}

impl Drop for StdioGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.saved_input.take() {
            let _ = dup2(fd.as_raw_fd(), libc::STDIN_FILENO);
        }
        if let Some(fd) = self.saved_output.take() {
            let _ = io::stdout().flush();
            let _ = dup2(fd.as_raw_fd(), libc::STDOUT_FILENO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_output_is_created_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        fs::write(&path, "old contents").unwrap();

        let redirections = Redirections::open(None, path.to_str()).unwrap();
        assert!(!redirections.is_empty());
        drop(redirections);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_missing_input_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        let err = Redirections::open(path.to_str(), None).unwrap_err();
        assert!(matches!(err, ExecError::Open { .. }));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_failed_input_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::write(&out, "keep").unwrap();
        let missing = dir.path().join("missing");

        assert!(Redirections::open(missing.to_str(), out.to_str()).is_err());
        assert_eq!(fs::read_to_string(&out).unwrap(), "keep");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_move_onto_itself_clears_close_on_exec() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();
        let flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
        assert!(flags.contains(FdFlag::FD_CLOEXEC));

        move_fd(fd, fd).unwrap();
        let flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
        assert!(!flags.contains(FdFlag::FD_CLOEXEC));
    }
}
