//! Runs the trees of a stream concurrently wherever their file accesses
//! allow it.
//!
//! Each tree runs in its own forked process. A tree starts once every
//! tree it depends on has finished; until then it is blocked and looked at
//! again on every pass. Finished processes are collected with non-blocking
//! waits, and the scheduler sleeps for `poll_interval` whenever a pass makes
//! no progress.
//!
//! A fatal error in any tree ends the run: nothing new is started, the trees
//! still running are waited for, and the error is returned.

use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::shell::error::{ExecError, Result};
use crate::shell::executor::process::{self, Child};
use crate::shell::executor::Executor;
use crate::shell::parser::stream::{CommandStream, StreamEntry};

pub struct Scheduler {
    executor: Executor,
    poll_interval: Duration,
    running: BTreeMap<usize, Child>,
    blocked: BTreeSet<usize>,
}

impl Scheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            executor: Executor::new(),
            poll_interval,
            running: BTreeMap::new(),
            blocked: BTreeSet::new(),
        }
    }

    /// Runs every tree and waits for all of them. Returns the status of the
    /// last tree in input order, or `None` for an empty stream.
    pub fn run(&mut self, stream: &mut CommandStream) -> Result<Option<i32>> {
        self.drive(stream, CommandStream::all_finished)?;
        Ok(stream.last_status())
    }

    /// Keeps scheduling until the tree at `index` has finished and returns
    /// its status. Other trees keep starting meanwhile.
    pub fn wait(&mut self, stream: &mut CommandStream, index: usize) -> Result<Option<i32>> {
        if stream.get(index).is_none() {
            return Ok(None);
        }
        self.drive(stream, |stream| {
            stream.get(index).is_some_and(StreamEntry::is_finished)
        })?;
        Ok(stream.get(index).and_then(|entry| entry.command().status()))
    }

    fn drive<F>(&mut self, stream: &mut CommandStream, done: F) -> Result<()>
    where
        F: Fn(&CommandStream) -> bool,
    {
        let result = self.advance(stream, done);
        if result.is_err() {
            self.drain();
        }
        result
    }

    fn advance<F>(&mut self, stream: &mut CommandStream, done: F) -> Result<()>
    where
        F: Fn(&CommandStream) -> bool,
    {
        self.start(stream)?;
        while !done(&*stream) {
            self.step(stream)?;
        }
        Ok(())
    }

    /// Waits for every tree still running once the run has failed.
    fn drain(&mut self) {
        for (index, child) in std::mem::take(&mut self.running) {
            match child.wait() {
                Ok(status) => {
                    debug!("command {} exited with {} after the run failed", index, status)
                }
                Err(e) => warn!("command {} also failed: {}", index, e),
            }
        }
    }

    /// One pass in input order over every tree not yet begun.
    fn start(&mut self, stream: &mut CommandStream) -> Result<()> {
        for index in 1..=stream.len() {
            self.try_start(stream, index)?;
        }
        Ok(())
    }

    fn step(&mut self, stream: &mut CommandStream) -> Result<()> {
        let mut progressed = self.reap(stream)?;

        let blocked: Vec<usize> = self.blocked.iter().copied().collect();
        for index in blocked {
            progressed |= self.try_start(stream, index)?;
        }

        if !progressed {
            if self.running.is_empty() && !self.blocked.is_empty() {
                let stuck = self.blocked.iter().copied().collect();
                return Err(ExecError::Stalled(stuck).into());
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    /// Starts the tree at `index` if all its dependencies have finished,
    /// otherwise marks it blocked. Returns whether it started.
    fn try_start(&mut self, stream: &mut CommandStream, index: usize) -> Result<bool> {
        let ready = stream.dependencies_finished(index);
        let Some(entry) = stream.get_mut(index) else {
            return Ok(false);
        };
        if entry.is_begun() {
            return Ok(false);
        }
        if !ready {
            if self.blocked.insert(index) {
                debug!("command {} waits on {:?}", index, entry.dependencies());
            }
            entry.mark_blocked();
            return Ok(false);
        }

        let executor = self.executor;
        let command = entry.command_mut();
        let child = process::fork_child(|| executor.execute(command))?;
        entry.mark_running();
        self.blocked.remove(&index);
        info!("command {} started as pid {}", index, child.pid());
        self.running.insert(index, child);
        Ok(true)
    }

    /// Collects every running tree that has exited. Returns whether any did,
    /// or the first fatal error raised inside one.
    fn reap(&mut self, stream: &mut CommandStream) -> Result<bool> {
        let mut finished = Vec::new();
        let mut failed = None;
        for (&index, child) in &self.running {
            match child.poll() {
                Ok(Some(status)) => finished.push((index, status)),
                Ok(None) => {}
                Err(e) => {
                    failed = Some((index, e));
                    break;
                }
            }
        }

        let progressed = !finished.is_empty();
        for (index, status) in finished {
            self.running.remove(&index);
            if let Some(entry) = stream.get_mut(index) {
                entry.mark_finished(status);
            }
            info!("command {} exited with {}", index, status);
        }
        if let Some((index, e)) = failed {
            self.running.remove(&index);
            debug!("command {} failed: {}", index, e);
            return Err(e.into());
        }
        Ok(progressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream_has_no_status() {
        let mut stream = CommandStream::new();
        let mut scheduler = Scheduler::new(Duration::from_millis(1));
        assert!(matches!(scheduler.run(&mut stream), Ok(None)));
        assert!(matches!(scheduler.wait(&mut stream, 1), Ok(None)));
    }

    #[test]
    fn test_unsatisfiable_dependency_is_reported() {
        let mut stream = CommandStream::new();
        let mut scheduler = Scheduler::new(Duration::from_millis(1));
        scheduler.blocked.insert(7);
        let err = scheduler.step(&mut stream);
        assert!(matches!(
            err,
            Err(crate::shell::error::Error::Exec(ExecError::Stalled(ref stuck))) if stuck == &[7]
        ));
    }
}
