use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use timetrash::{parse_str, EntryState, Scheduler};

#[allow(clippy::unwrap_used)]
#[test]
fn test_wait_returns_once_entry_and_dependencies_finish() {
    let dir = TempDir::new().unwrap();
    let f = dir.path().join("f");
    let g = dir.path().join("g");
    let script = format!(
        "sleep 1 ; echo x >{f}\n\ncat {f} >{g}\n\nfalse\n",
        f = f.display(),
        g = g.display()
    );
    let mut stream = parse_str(&script).unwrap();
    assert_eq!(stream.get(2).unwrap().dependencies(), &[1]);

    let mut scheduler = Scheduler::new(Duration::from_millis(1));
    assert_eq!(scheduler.wait(&mut stream, 2).unwrap(), Some(0));
    assert_eq!(stream.get(1).unwrap().state(), EntryState::Finished);
    assert_eq!(stream.get(2).unwrap().state(), EntryState::Finished);
    assert_eq!(fs::read_to_string(&g).unwrap(), "x\n");

    assert_eq!(scheduler.run(&mut stream).unwrap(), Some(1));
    assert!(stream.all_finished());
}

#[allow(clippy::unwrap_used)]
#[test]
fn test_wait_on_missing_entry() {
    let mut stream = parse_str("true\n").unwrap();
    let mut scheduler = Scheduler::new(Duration::from_millis(1));
    assert_eq!(scheduler.wait(&mut stream, 5).unwrap(), None);
    assert_eq!(stream.get(1).unwrap().state(), EntryState::Pending);
}
