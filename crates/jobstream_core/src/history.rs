use std::collections::VecDeque;

pub const DEFAULT_HISTORY_DEPTH: usize = 100;

/// Undo/redo history over an edited job result.
///
/// `baseline` is the last text known to be saved on the backend; the history is
/// dirty whenever the current text differs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftHistory {
    baseline: String,
    current: String,
    undo: VecDeque<String>,
    redo: Vec<String>,
    depth: usize,
}

impl DraftHistory {
    pub fn new(baseline: impl Into<String>) -> Self {
        Self::with_depth(baseline, DEFAULT_HISTORY_DEPTH)
    }

    pub fn with_depth(baseline: impl Into<String>, depth: usize) -> Self {
        let baseline = baseline.into();
        Self {
            current: baseline.clone(),
            baseline,
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Starts from a recovered local draft on top of the saved baseline.
    pub fn restored(baseline: impl Into<String>, draft: impl Into<String>) -> Self {
        let mut history = Self::new(baseline);
        history.edit(draft);
        history
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Records a new text. Identical text is not a new history entry.
    pub fn edit(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.current {
            return false;
        }
        let previous = std::mem::replace(&mut self.current, text);
        self.undo.push_back(previous);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
        self.redo.clear();
        true
    }

    pub fn undo(&mut self) -> bool {
        match self.undo.pop_back() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.current, previous);
                self.redo.push(current);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.redo.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.current, next);
                self.undo.push_back(current);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.baseline
    }

    /// The current text was persisted remotely; it becomes the new baseline.
    pub fn mark_saved(&mut self) {
        self.baseline = self.current.clone();
    }

    /// Drops every edit and returns to the baseline.
    pub fn discard(&mut self) {
        self.current = self.baseline.clone();
        self.undo.clear();
        self.redo.clear();
    }

    /// Replaces the baseline after a remote change (e.g. a restored version).
    pub fn rebase(&mut self, baseline: impl Into<String>) {
        self.baseline = baseline.into();
        self.discard();
    }
}
