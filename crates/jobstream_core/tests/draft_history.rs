use jobstream_core::DraftHistory;

#[test]
fn undo_redo_walks_the_history() {
    let mut history = DraftHistory::new("v0");
    assert!(!history.is_dirty());
    assert!(!history.can_undo());

    assert!(history.edit("v1"));
    assert!(history.edit("v2"));
    assert!(!history.edit("v2"));
    assert_eq!(history.current(), "v2");
    assert!(history.is_dirty());

    assert!(history.undo());
    assert_eq!(history.current(), "v1");
    assert!(history.undo());
    assert_eq!(history.current(), "v0");
    assert!(!history.is_dirty());
    assert!(!history.undo());

    assert!(history.redo());
    assert_eq!(history.current(), "v1");
    assert!(history.can_redo());

    // A fresh edit forks the history.
    history.edit("v1b");
    assert!(!history.can_redo());
    assert!(history.undo());
    assert_eq!(history.current(), "v1");
}

#[test]
fn depth_bounds_undo_stack() {
    let mut history = DraftHistory::with_depth("0", 2);
    for text in ["1", "2", "3"] {
        history.edit(text);
    }
    assert!(history.undo());
    assert!(history.undo());
    assert!(!history.undo());
    assert_eq!(history.current(), "1");
}

#[test]
fn save_and_discard_move_the_baseline() {
    let mut history = DraftHistory::restored("saved", "local draft");
    assert!(history.is_dirty());
    assert_eq!(history.current(), "local draft");

    history.mark_saved();
    assert!(!history.is_dirty());
    assert_eq!(history.baseline(), "local draft");

    history.edit("more");
    history.discard();
    assert_eq!(history.current(), "local draft");
    assert!(!history.can_undo());

    history.rebase("restored v3");
    assert_eq!(history.current(), "restored v3");
    assert!(!history.is_dirty());
}
