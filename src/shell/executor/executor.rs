use std::ffi::CString;
use std::os::fd::AsRawFd;

use log::{debug, info};
use nix::unistd::{close, pipe};

use super::process;
use super::redirect::{self, Redirections, StdioGuard};
use crate::shell::error::{ExecError, Result};
use crate::shell::parser::ast::{Command, CommandKind};
use crate::shell::parser::stream::CommandStream;

/// Runs command trees with the usual shell meaning of each operator.
/// Every node gets its exit status recorded as it finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `command` to completion and returns its exit status.
    ///
    /// A simple command applies its own redirections in the child. Any
    /// other node points stdin and stdout at its files for its whole
    /// subtree.
    pub fn execute(&self, command: &mut Command) -> Result<i32> {
        let input = command.input.as_deref();
        let output = command.output.as_deref();
        let stdio = match command.kind {
            CommandKind::Simple(_) => None,
            _ => self.redirect_stdio(input, output)?,
        };

        let status = match &mut command.kind {
            CommandKind::Simple(words) => self.execute_simple(words, input, output)?,
            CommandKind::And(left, right) => {
                let status = self.execute(left)?;
                if status == 0 {
                    self.execute(right)?
                } else {
                    status
                }
            }
            CommandKind::Or(left, right) => {
                let status = self.execute(left)?;
                if status != 0 {
                    self.execute(right)?
                } else {
                    status
                }
            }
            CommandKind::Sequence(left, right) => {
                self.execute(left)?;
                self.execute(right)?
            }
            CommandKind::Pipe(left, right) => self.execute_pipe(left, right)?,
            CommandKind::Subshell(inner) => self.execute(inner)?,
        };
        drop(stdio);

        command.set_status(status);
        Ok(status)
    }

    /// Runs every tree in input order, one at a time. Returns the status of
    /// the last one, or `None` for an empty stream.
    pub fn execute_stream(&self, stream: &mut CommandStream) -> Result<Option<i32>> {
        for entry in stream.iter_mut() {
            entry.mark_running();
            let status = self.execute(entry.command_mut())?;
            info!("command {} exited with {}", entry.index(), status);
            entry.mark_finished(status);
        }
        Ok(stream.last_status())
    }

    fn redirect_stdio(
        &self,
        input: Option<&str>,
        output: Option<&str>,
    ) -> Result<Option<StdioGuard>> {
        let redirections = Redirections::open(input, output)?;
        if redirections.is_empty() {
            return Ok(None);
        }
        Ok(Some(StdioGuard::redirect(redirections)?))
    }

    fn execute_simple(
        &self,
        words: &[String],
        input: Option<&str>,
        output: Option<&str>,
    ) -> Result<i32> {
        let argv = words
            .iter()
            .map(|word| {
                CString::new(word.as_str()).map_err(|_| ExecError::InvalidArgument(word.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let redirections = Redirections::open(input, output)?;

        debug!("running {}", words.join(" "));
        let child = process::fork_child(|| {
            redirections.apply()?;
            Ok(process::exec(&argv))
        })?;
        drop(redirections);

        let status = child.wait()?;
        debug!("{} exited with {}", words.join(" "), status);
        Ok(status)
    }

    /// Both sides run in their own child, connected by a pipe. The left
    /// status is recorded on its node; the pipeline reports the right one.
    fn execute_pipe(&self, left: &mut Command, right: &mut Command) -> Result<i32> {
        let (read_end, write_end) = pipe().map_err(ExecError::Pipe)?;
        let (read_fd, write_fd) = (read_end.as_raw_fd(), write_end.as_raw_fd());

        let writer = process::fork_child(|| {
            close(read_fd).map_err(|e| ExecError::Dup(e.into()))?;
            redirect::move_fd(write_fd, libc::STDOUT_FILENO)?;
            self.execute(left)
        })?;
        let reader = process::fork_child(|| {
            close(write_fd).map_err(|e| ExecError::Dup(e.into()))?;
            redirect::move_fd(read_fd, libc::STDIN_FILENO)?;
            self.execute(right)
        })?;
        drop(read_end);
        drop(write_end);

        // Reap both sides before giving up on either.
        let left_status = writer.wait();
        let right_status = reader.wait();
        left.set_status(left_status?);
        let right_status = right_status?;
        right.set_status(right_status);
        Ok(right_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_nul_byte_is_rejected_before_fork() {
        let mut command = Command::simple(["echo".to_string(), "a\0b".to_string()]);
        let err = Executor::new().execute(&mut command).unwrap_err();
        assert!(matches!(
            err,
            crate::shell::error::Error::Exec(ExecError::InvalidArgument(_))
        ));
        assert_eq!(command.status(), None);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_unopenable_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut command = Command::simple(["cat".to_string()])
            .with_input(missing.to_string_lossy().into_owned());
        let err = Executor::new().execute(&mut command).unwrap_err();
        assert!(matches!(
            err,
            crate::shell::error::Error::Exec(ExecError::Open { .. })
        ));
    }
}
