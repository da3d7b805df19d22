// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history built on the command pattern.
//!
//! The history only sequences calls and owns command lifetimes. What a
//! command does to its target is entirely up to the command.

use crate::document::GraphError;
use crate::layout::LayoutError;
use std::collections::VecDeque;
use std::fmt;

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// Error raised by a command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The document rejected an edit
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Auto-layout refused to run
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    /// Command was run in an order it does not support
    #[error("Invalid command state: {0}")]
    InvalidState(String),
}

/// An undoable operation on a target of type `T`
pub trait Command<T>: Send {
    /// Human-readable description, shown in Edit menus
    fn description(&self) -> &str;

    /// Apply the command. Also called to redo it.
    fn execute(&mut self, target: &mut T) -> Result<(), CommandError>;

    /// Revert the command
    fn undo(&mut self, target: &mut T) -> Result<(), CommandError>;
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Commands in the undo stack
    pub undo_count: usize,
    /// Commands in the redo stack
    pub redo_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Two-stack undo/redo history
pub struct CommandHistory<T> {
    undo_stack: VecDeque<Box<dyn Command<T>>>,
    redo_stack: Vec<Box<dyn Command<T>>>,
    max_depth: usize,
}

impl<T> CommandHistory<T> {
    /// Create a history with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth (at least 1)
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Run a command and record it.
    ///
    /// A successful command clears the redo stack and may evict the oldest
    /// entry. A failed command is dropped and the history is left as it was.
    pub fn execute_command(
        &mut self,
        mut command: Box<dyn Command<T>>,
        target: &mut T,
    ) -> Result<(), CommandError> {
        if let Err(err) = command.execute(target) {
            tracing::warn!("Command '{}' failed: {err}", command.description());
            return Err(err);
        }
        tracing::debug!("Executed '{}'", command.description());

        self.redo_stack.clear();
        self.undo_stack.push_back(command);
        while self.undo_stack.len() > self.max_depth {
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::debug!("History full, dropped '{}'", evicted.description());
            }
        }
        Ok(())
    }

    /// Undo the most recent command. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, target: &mut T) -> Result<bool, CommandError> {
        let Some(mut command) = self.undo_stack.pop_back() else {
            return Ok(false);
        };
        if let Err(err) = command.undo(target) {
            tracing::warn!("Undo of '{}' failed: {err}", command.description());
            self.undo_stack.push_back(command);
            return Err(err);
        }
        tracing::debug!("Undid '{}'", command.description());
        self.redo_stack.push(command);
        Ok(true)
    }

    /// Redo the most recently undone command. Returns `false` if there was nothing to redo.
    pub fn redo(&mut self, target: &mut T) -> Result<bool, CommandError> {
        let Some(mut command) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = command.execute(target) {
            tracing::warn!("Redo of '{}' failed: {err}", command.description());
            self.redo_stack.push(command);
            return Err(err);
        }
        tracing::debug!("Redid '{}'", command.description());
        self.undo_stack.push_back(command);
        Ok(true)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|command| command.description())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|command| command.description())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
        }
    }
}

impl<T> Default for CommandHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CommandHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo", &self.undo_description())
            .field("redo", &self.redo_description())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Add {
        amount: i32,
        label: String,
    }

    impl Add {
        fn boxed(amount: i32) -> Box<dyn Command<i32>> {
            Box::new(Self {
                amount,
                label: format!("Add {amount}"),
            })
        }
    }

    impl Command<i32> for Add {
        fn description(&self) -> &str {
            &self.label
        }

        fn execute(&mut self, target: &mut i32) -> Result<(), CommandError> {
            *target += self.amount;
            Ok(())
        }

        fn undo(&mut self, target: &mut i32) -> Result<(), CommandError> {
            *target -= self.amount;
            Ok(())
        }
    }

    struct Fails;

    impl Command<i32> for Fails {
        fn description(&self) -> &str {
            "Fails"
        }

        fn execute(&mut self, _target: &mut i32) -> Result<(), CommandError> {
            Err(CommandError::InvalidState("always".to_string()))
        }

        fn undo(&mut self, _target: &mut i32) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[test]
    fn test_undo_restores_and_redo_reapplies() {
        let mut value = 0;
        let mut history = CommandHistory::new();

        history.execute_command(Add::boxed(5), &mut value).unwrap();
        assert_eq!(value, 5);
        assert!(history.undo(&mut value).unwrap());
        assert_eq!(value, 0);
        assert!(history.redo(&mut value).unwrap());
        assert_eq!(value, 5);
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut value = 0;
        let mut history = CommandHistory::new();

        history.execute_command(Add::boxed(1), &mut value).unwrap();
        history.undo(&mut value).unwrap();
        assert!(history.can_redo());

        history.execute_command(Add::boxed(2), &mut value).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.undo_description(), Some("Add 2"));
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut value = 3;
        let mut history: CommandHistory<i32> = CommandHistory::new();
        assert!(!history.undo(&mut value).unwrap());
        assert!(!history.redo(&mut value).unwrap());
        assert_eq!(value, 3);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_depth_limit_evicts_oldest() {
        let mut value = 0;
        let mut history = CommandHistory::with_max_depth(3);
        for amount in 1..=5 {
            history.execute_command(Add::boxed(amount), &mut value).unwrap();
        }

        assert_eq!(history.undo_depth(), 3);
        while history.undo(&mut value).unwrap() {}
        // Only 3, 4 and 5 could be undone.
        assert_eq!(value, 3);
    }

    #[test]
    fn test_failed_command_is_not_recorded() {
        let mut value = 0;
        let mut history = CommandHistory::new();
        history.execute_command(Add::boxed(1), &mut value).unwrap();
        history.undo(&mut value).unwrap();

        assert!(history.execute_command(Box::new(Fails), &mut value).is_err());
        assert_eq!(history.undo_depth(), 0);
        assert!(history.can_redo());
    }

    #[test]
    fn test_stats() {
        let mut value = 0;
        let mut history = CommandHistory::with_max_depth(10);
        history.execute_command(Add::boxed(1), &mut value).unwrap();
        history.execute_command(Add::boxed(1), &mut value).unwrap();
        history.undo(&mut value).unwrap();

        assert_eq!(
            history.stats(),
            HistoryStats {
                undo_count: 1,
                redo_count: 1,
                max_depth: 10,
            }
        );
        history.clear();
        assert_eq!(history.stats().undo_count, 0);
    }
}
