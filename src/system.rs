//! Per-parse mutable engine state.
//!
//! `SystemData` is created fresh for every parse call and carries the pieces
//! of state every operator handler reads or writes: the current match state
//! and phrase length, the look-around stack whose top selects forward or
//! behind execution, and the two back-reference frames.  The parent frame is
//! swapped out on rule entry and restored on exit; the universal frame is
//! monotonic across the parse.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grammar::BkrMode;

/// Match state of the most recently completed operator.
///
/// `Active` only exists between an operator's entry and the completion of
/// its handler; every handler returns one of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhraseState {
    Active,
    Match,
    Empty,
    Nomatch,
}

impl PhraseState {
    /// Match and Empty are the two success states.
    pub fn succeeded(self) -> bool {
        matches!(self, PhraseState::Match | PhraseState::Empty)
    }
}

/// Direction of a recorded AST or trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

/// Kind of the enclosing look-around context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookAroundKind {
    None,
    Ahead,
    Behind,
}

/// One frame of the look-around stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookFrame {
    pub kind: LookAroundKind,
    pub anchor: usize,
    pub saved_end: usize,
}

/// Phrase last captured by a back-referenced rule or UDT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseCapture {
    pub start: usize,
    pub length: usize,
}

/// Mutable record threaded through every evaluator invocation.
#[derive(Debug)]
pub struct SystemData {
    pub state: PhraseState,
    pub phrase_length: usize,
    look: Vec<LookFrame>,
    universal: HashMap<String, PhraseCapture>,
    parent: HashMap<String, PhraseCapture>,
}

impl Default for SystemData {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemData {
    pub fn new() -> Self {
        Self {
            state: PhraseState::Active,
            phrase_length: 0,
            look: vec![LookFrame {
                kind: LookAroundKind::None,
                anchor: 0,
                saved_end: 0,
            }],
            universal: HashMap::new(),
            parent: HashMap::new(),
        }
    }

    /// Reset for a fresh parse call; shells may be retained between calls.
    pub fn init(&mut self) {
        self.state = PhraseState::Active;
        self.phrase_length = 0;
        self.look.truncate(1);
        self.universal.clear();
        self.parent.clear();
    }

    pub fn push_look(&mut self, kind: LookAroundKind, anchor: usize, saved_end: usize) {
        self.look.push(LookFrame {
            kind,
            anchor,
            saved_end,
        });
    }

    pub fn pop_look(&mut self) -> LookFrame {
        debug_assert!(self.look.len() > 1, "look-around stack bottom is permanent");
        self.look.pop().unwrap_or(LookFrame {
            kind: LookAroundKind::None,
            anchor: 0,
            saved_end: 0,
        })
    }

    fn top(&self) -> &LookFrame {
        self.look.last().expect("look-around stack is never empty")
    }

    pub fn look_kind(&self) -> LookAroundKind {
        self.top().kind
    }

    pub fn look_anchor(&self) -> usize {
        self.top().anchor
    }

    pub fn in_look_around(&self) -> bool {
        self.top().kind != LookAroundKind::None
    }

    /// Begin a fresh parent frame for a rule activation, returning the saved
    /// frame of the enclosing rule.
    pub fn begin_parent_frame(&mut self) -> HashMap<String, PhraseCapture> {
        std::mem::take(&mut self.parent)
    }

    /// Restore the enclosing rule's frame on rule exit.
    pub fn restore_parent_frame(&mut self, saved: HashMap<String, PhraseCapture>) {
        self.parent = saved;
    }

    /// Record a successful capture in both frames.
    pub fn record_capture(&mut self, lower: &str, capture: PhraseCapture) {
        self.universal.insert(lower.to_owned(), capture);
        self.parent.insert(lower.to_owned(), capture);
    }

    /// Look up the capture a back-reference compares against.
    pub fn capture(&self, mode: BkrMode, lower: &str) -> Option<PhraseCapture> {
        let frame = match mode {
            BkrMode::Universal => &self.universal,
            BkrMode::Parent => &self.parent,
        };
        frame.get(lower).copied()
    }
}
