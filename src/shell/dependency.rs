//! File-level dependencies between top-level trees.
//!
//! Every output redirection is a write. Every input redirection and every
//! argument after a program name is treated as a read, since any bare word
//! might name a file. Paths are compared as plain strings.

use std::collections::BTreeSet;
use std::fmt;

use log::debug;

use crate::shell::parser::ast::{Command, CommandKind};
use crate::shell::parser::stream::{CommandStream, StreamEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// The earlier tree writes something the later one reads.
    ReadAfterWrite,
    /// The earlier tree reads something the later one writes.
    WriteAfterRead,
    WriteAfterWrite,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Conflict::ReadAfterWrite => "RAW",
            Conflict::WriteAfterRead => "WAR",
            Conflict::WriteAfterWrite => "WAW",
        })
    }
}

/// Files a tree may read and files it writes.
pub fn access_sets(command: &Command) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut reads = BTreeSet::new();
    let mut writes = BTreeSet::new();
    collect(command, &mut reads, &mut writes);
    (reads, writes)
}

fn collect(command: &Command, reads: &mut BTreeSet<String>, writes: &mut BTreeSet<String>) {
    if let Some(input) = &command.input {
        reads.insert(input.clone());
    }
    if let Some(output) = &command.output {
        writes.insert(output.clone());
    }
    match &command.kind {
        CommandKind::Simple(words) => {
            reads.extend(words.iter().skip(1).cloned());
        }
        CommandKind::Subshell(inner) => collect(inner, reads, writes),
        CommandKind::And(left, right)
        | CommandKind::Or(left, right)
        | CommandKind::Sequence(left, right)
        | CommandKind::Pipe(left, right) => {
            collect(left, reads, writes);
            collect(right, reads, writes);
        }
    }
}

/// How `later` must wait for `earlier`, if at all.
pub fn conflict(earlier: &StreamEntry, later: &StreamEntry) -> Option<Conflict> {
    if !earlier.writes().is_disjoint(later.reads()) {
        Some(Conflict::ReadAfterWrite)
    } else if !earlier.reads().is_disjoint(later.writes()) {
        Some(Conflict::WriteAfterRead)
    } else if !earlier.writes().is_disjoint(later.writes()) {
        Some(Conflict::WriteAfterWrite)
    } else {
        None
    }
}

/// Fills in read/write sets and direct predecessors for every entry.
pub fn analyze(stream: &mut CommandStream) {
    for entry in stream.iter_mut() {
        let (reads, writes) = access_sets(entry.command());
        entry.set_access_sets(reads, writes);
    }

    let mut edges = Vec::new();
    for later in stream.iter() {
        for earlier in stream.iter().take_while(|e| e.index() < later.index()) {
            if let Some(kind) = conflict(earlier, later) {
                debug!(
                    "command {} depends on command {} ({})",
                    later.index(),
                    earlier.index(),
                    kind
                );
                edges.push((later.index(), earlier.index()));
            }
        }
    }

    for (later, earlier) in edges {
        if let Some(entry) = stream.get_mut(later) {
            entry.add_dependency(earlier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::parser::parse_str;

    #[allow(clippy::unwrap_used)]
    fn deps(input: &str) -> Vec<Vec<usize>> {
        parse_str(input)
            .unwrap()
            .iter()
            .map(|entry| entry.dependencies().to_vec())
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_access_sets() {
        let stream = parse_str("(sort -u data <in | tee copy) >out").unwrap();
        let entry = stream.get(1).unwrap();
        assert_eq!(entry.reads(), &set(&["-u", "data", "in", "copy"]));
        assert_eq!(entry.writes(), &set(&["out"]));
    }

    #[test]
    fn test_read_after_write() {
        assert_eq!(deps("echo hi >f\n\ncat f"), vec![vec![], vec![1]]);
        assert_eq!(deps("echo hi >f\n\ncat <f"), vec![vec![], vec![1]]);
    }

    #[test]
    fn test_write_after_read() {
        assert_eq!(deps("cat f\n\necho hi >f"), vec![vec![], vec![1]]);
    }

    #[test]
    fn test_write_after_write() {
        assert_eq!(deps("echo a >f\n\necho b >f"), vec![vec![], vec![1]]);
    }

    #[test]
    fn test_independent_trees() {
        assert_eq!(
            deps("echo a >x\n\necho b >y\n\nsleep 1"),
            vec![vec![], vec![], vec![]]
        );
    }

    #[test]
    fn test_multiple_predecessors_are_all_recorded() {
        assert_eq!(
            deps("echo a >x\n\necho b >y\n\ncat x y >z\n\ncat z"),
            vec![vec![], vec![], vec![1, 2], vec![3]]
        );
    }

    #[test]
    fn test_different_spellings_do_not_conflict() {
        assert_eq!(deps("echo a >f\n\ncat ./f"), vec![vec![], vec![]]);
    }

    #[test]
    fn test_program_name_is_not_a_read() {
        assert_eq!(deps("echo a >cat\n\ncat"), vec![vec![], vec![]]);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_conflict_kind_prefers_raw() {
        let stream = parse_str("cat f >f\n\ncat f >f").unwrap();
        let (first, second) = (stream.get(1).unwrap(), stream.get(2).unwrap());
        assert_eq!(conflict(first, second), Some(Conflict::ReadAfterWrite));
    }
}
