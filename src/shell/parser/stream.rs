use std::collections::BTreeSet;
use std::slice;
use std::vec;

use super::ast::Command;

/// Where an entry is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    /// Checked at least once and found waiting on a predecessor.
    Blocked,
    Running,
    Finished,
}

/// One top-level tree plus what the scheduler needs to know about it.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    index: usize,
    command: Command,
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    dependencies: Vec<usize>,
    state: EntryState,
    dependencies_resolved: bool,
}

impl StreamEntry {
    fn new(index: usize, command: Command) -> Self {
        Self {
            index,
            command,
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            dependencies: Vec::new(),
            state: EntryState::Pending,
            dependencies_resolved: false,
        }
    }

    /// 1-based position in the stream.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn command_mut(&mut self) -> &mut Command {
        &mut self.command
    }

    pub fn into_command(self) -> Command {
        self.command
    }

    pub fn reads(&self) -> &BTreeSet<String> {
        &self.reads
    }

    pub fn writes(&self) -> &BTreeSet<String> {
        &self.writes
    }

    /// Indices of the earlier entries this one conflicts with directly.
    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_begun(&self) -> bool {
        matches!(self.state, EntryState::Running | EntryState::Finished)
    }

    pub fn is_finished(&self) -> bool {
        self.state == EntryState::Finished
    }

    pub fn dependencies_resolved(&self) -> bool {
        self.dependencies_resolved
    }

    pub(crate) fn set_access_sets(&mut self, reads: BTreeSet<String>, writes: BTreeSet<String>) {
        self.reads = reads;
        self.writes = writes;
    }

    pub(crate) fn add_dependency(&mut self, index: usize) {
        if index > 0 && index < self.index && !self.dependencies.contains(&index) {
            self.dependencies.push(index);
        }
    }

    pub(crate) fn mark_blocked(&mut self) {
        if self.state == EntryState::Pending {
            self.state = EntryState::Blocked;
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.dependencies_resolved = true;
        self.state = EntryState::Running;
    }

    pub(crate) fn mark_finished(&mut self, status: i32) {
        self.dependencies_resolved = true;
        self.state = EntryState::Finished;
        self.command.set_status(status);
    }
}

/// Parsed trees in input order.
#[derive(Debug, Clone, Default)]
pub struct CommandStream {
    entries: Vec<StreamEntry>,
}

impl CommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tree and returns its index.
    pub fn push(&mut self, command: Command) -> usize {
        let index = self.entries.len() + 1;
        self.entries.push(StreamEntry::new(index, command));
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StreamEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut StreamEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get_mut(i))
    }

    pub fn iter(&self) -> slice::Iter<'_, StreamEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, StreamEntry> {
        self.entries.iter_mut()
    }

    /// True once every direct predecessor of `index` has finished.
    pub fn dependencies_finished(&self, index: usize) -> bool {
        self.get(index).is_some_and(|entry| {
            entry
                .dependencies()
                .iter()
                .all(|dep| self.get(*dep).is_some_and(StreamEntry::is_finished))
        })
    }

    pub fn all_finished(&self) -> bool {
        self.entries.iter().all(StreamEntry::is_finished)
    }

    /// Status of the last tree, if it has run.
    pub fn last_status(&self) -> Option<i32> {
        self.entries.last().and_then(|entry| entry.command().status())
    }
}

impl IntoIterator for CommandStream {
    type Item = StreamEntry;
    type IntoIter = vec::IntoIter<StreamEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommandStream {
    type Item = &'a StreamEntry;
    type IntoIter = slice::Iter<'a, StreamEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
