//! Undo/redo queue for scene mutations made by checks
//!
//! Checks that change external state do so through [`Operation`] values
//! applied to the context extensions. Every applied operation is recorded;
//! operations recorded between [`UndoQueue::begin_chunk`] and the matching
//! outermost [`UndoQueue::end_chunk`] form one chunk that is undone and
//! redone as a unit. The evaluator opens a chunk around each fix run, so one
//! undo step reverts one fix.

use std::collections::VecDeque;

use crate::check::CheckError;
use crate::context::Extensions;

/// Default number of chunks kept on the undo side
pub const DEFAULT_UNDO_LEVELS: usize = 100;

/// A reversible mutation of the context extensions
pub trait Operation: Send + Sync {
    /// Apply the mutation
    fn do_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError>;

    /// Revert the mutation applied by the last `do_it`
    fn undo_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError>;

    /// Label used when the operation forms a chunk on its own
    fn label(&self) -> &str {
        "operation"
    }
}

struct Chunk {
    label: String,
    ops: Vec<Box<dyn Operation>>,
}

impl Chunk {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ops: Vec::new(),
        }
    }
}

/// Bounded undo/redo history of operation chunks
pub struct UndoQueue {
    done: VecDeque<Chunk>,
    undone: Vec<Chunk>,
    open: Option<Chunk>,
    depth: usize,
    max_chunks: usize,
    enabled: bool,
}

impl UndoQueue {
    /// Create a queue keeping at most `max_chunks` undo steps
    pub fn new(max_chunks: usize) -> Self {
        Self {
            done: VecDeque::new(),
            undone: Vec::new(),
            open: None,
            depth: 0,
            max_chunks: max_chunks.max(1),
            enabled: true,
        }
    }

    /// Open a chunk; nested calls join the outermost chunk
    pub fn begin_chunk(&mut self, label: impl Into<String>) {
        if self.depth == 0 {
            self.open = Some(Chunk::new(label));
        }
        self.depth += 1;
    }

    /// Close one nesting level; the outermost close commits the chunk
    pub fn end_chunk(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(chunk) = self.open.take() {
                if !chunk.ops.is_empty() {
                    self.push_done(chunk);
                }
            }
        }
    }

    /// Close nesting levels until `depth` is reached
    pub fn unwind_to(&mut self, depth: usize) {
        while self.depth > depth {
            self.end_chunk();
        }
    }

    /// Current chunk nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Record an operation that has already been applied
    ///
    /// Recording clears the redo history. Nothing is recorded while the
    /// queue is disabled.
    pub fn record(&mut self, op: Box<dyn Operation>) {
        if !self.enabled {
            return;
        }
        match self.open.as_mut() {
            Some(chunk) => {
                chunk.ops.push(op);
                self.undone.clear();
            }
            None => {
                let mut chunk = Chunk::new(op.label().to_string());
                chunk.ops.push(op);
                self.push_done(chunk);
            }
        }
    }

    fn push_done(&mut self, chunk: Chunk) {
        self.undone.clear();
        self.done.push_back(chunk);
        while self.done.len() > self.max_chunks {
            self.done.pop_front();
        }
    }

    /// Revert the most recent chunk
    ///
    /// Returns `Ok(false)` when there is nothing to undo. When an operation
    /// fails, the operations already reverted are reapplied and the chunk
    /// stays on the undo side.
    pub fn undo(&mut self, ext: &mut Extensions) -> Result<bool, CheckError> {
        let Some(mut chunk) = self.done.pop_back() else {
            return Ok(false);
        };
        for index in (0..chunk.ops.len()).rev() {
            if let Err(err) = chunk.ops[index].undo_it(ext) {
                // Reapply what was already reverted; the chunk stays undoable
                for op in chunk.ops[index + 1..].iter_mut() {
                    if let Err(rollback) = op.do_it(ext) {
                        log::warn!(
                            "Failed to restore '{}' after undo error: {}",
                            chunk.label,
                            rollback
                        );
                    }
                }
                self.done.push_back(chunk);
                return Err(err);
            }
        }
        self.undone.push(chunk);
        Ok(true)
    }

    /// Reapply the most recently undone chunk
    ///
    /// A failing operation rolls the chunk back and leaves it redoable.
    pub fn redo(&mut self, ext: &mut Extensions) -> Result<bool, CheckError> {
        let Some(mut chunk) = self.undone.pop() else {
            return Ok(false);
        };
        for index in 0..chunk.ops.len() {
            if let Err(err) = chunk.ops[index].do_it(ext) {
                for op in chunk.ops[..index].iter_mut().rev() {
                    if let Err(rollback) = op.undo_it(ext) {
                        log::warn!(
                            "Failed to restore '{}' after redo error: {}",
                            chunk.label,
                            rollback
                        );
                    }
                }
                self.undone.push(chunk);
                return Err(err);
            }
        }
        self.done.push_back(chunk);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Number of undoable chunks
    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Labels of the undoable chunks, oldest first
    pub fn labels(&self) -> Vec<&str> {
        self.done.iter().map(|c| c.label.as_str()).collect()
    }

    /// Enable or disable recording
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}

impl Default for UndoQueue {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LEVELS)
    }
}
