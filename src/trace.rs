//! Trace recorder.
//!
//! The recorder captures a down record when an opcode is entered and an up
//! record when its handler completes, subject to the configured operator and
//! rule filters.  Records live in a fixed-capacity ring, so a long parse
//! retains only the newest records; pairing between a down record and its up
//! record is back-patched while both are still inside the ring's window and
//! silently dropped once the partner is evicted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar::{Grammar, Opcode, OperatorKind};
use crate::ring::CircularBuffer;
use crate::system::{Direction, LookAroundKind, PhraseState};

/// Default ring capacity.
pub const DEFAULT_MAX_RECORDS: usize = 5000;

/// Operator admission filter; the default records no operator-selected
/// records (rule records are admitted by the rule filter).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperatorFilter {
    All,
    #[default]
    None,
    Only(BTreeSet<OperatorKind>),
}

impl OperatorFilter {
    fn allows(&self, kind: OperatorKind) -> bool {
        match self {
            OperatorFilter::All => true,
            OperatorFilter::None => false,
            OperatorFilter::Only(kinds) => kinds.contains(&kind),
        }
    }
}

/// Rule/UDT admission filter, keyed by lowercase name; defaults to all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RuleFilter {
    #[default]
    All,
    None,
    Only(BTreeSet<String>),
}

impl RuleFilter {
    fn allows(&self, name: &str) -> bool {
        match self {
            RuleFilter::All => true,
            RuleFilter::None => false,
            RuleFilter::Only(names) => names.contains(&name.to_ascii_lowercase()),
        }
    }
}

/// Which end of an over-long parse the ring retains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeepPolicy {
    /// Keep the newest records, evicting the oldest.
    #[default]
    Last,
    /// Stop recording once the capacity is reached.
    First,
}

/// One retained trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub direction: Direction,
    pub depth: usize,
    pub this_line: usize,
    pub paired_line: Option<usize>,
    pub operator: OperatorKind,
    /// Rule/UDT name for RNM, UDT and BKR records.
    pub name: Option<String>,
    pub opcode: Opcode,
    pub state: PhraseState,
    pub phrase_index: usize,
    pub phrase_length: usize,
    pub look_kind: LookAroundKind,
    pub look_anchor: usize,
}

/// Structured trace emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub records: Vec<TraceRecord>,
    /// Records admitted over the whole parse, including dropped ones.
    pub total: usize,
    pub dropped: usize,
}

/// Trace shell owned by the parser across calls; `init` is run per parse.
#[derive(Debug)]
pub struct Trace {
    capacity: usize,
    keep: KeepPolicy,
    operator_filter: OperatorFilter,
    rule_filter: RuleFilter,
    ring: CircularBuffer,
    records: Vec<Option<TraceRecord>>,
    /// One entry per admitted down event, recorded or dropped; ups pop their
    /// partner to keep the pairing stack aligned with the parse tree.
    open: Vec<Option<usize>>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            keep: KeepPolicy::default(),
            operator_filter: OperatorFilter::default(),
            rule_filter: RuleFilter::default(),
            ring: CircularBuffer::new(capacity),
            records: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Resize the ring; takes effect at the next parse init.
    pub fn set_max_records(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn set_keep_policy(&mut self, keep: KeepPolicy) {
        self.keep = keep;
    }

    pub fn set_operator_filter(&mut self, filter: OperatorFilter) {
        self.operator_filter = filter;
    }

    pub fn set_rule_filter(&mut self, filter: RuleFilter) {
        self.rule_filter = filter;
    }

    /// Validate filter names against the grammar and reset per-parse state.
    pub fn init(&mut self, grammar: &Grammar) -> Result<(), TraceError> {
        if let RuleFilter::Only(names) = &self.rule_filter {
            for name in names {
                if grammar.rule_named(name).is_none() && grammar.udt_named(name).is_none() {
                    return Err(TraceError::UnknownRule { name: name.clone() });
                }
            }
        }
        self.ring = CircularBuffer::new(self.capacity);
        self.records.clear();
        self.records.resize_with(self.capacity, || None);
        self.open.clear();
        Ok(())
    }

    fn enabled(&self, kind: OperatorKind, name: Option<&str>) -> bool {
        match kind {
            OperatorKind::Rnm | OperatorKind::Udt | OperatorKind::Bkr => {
                self.operator_filter.allows(kind)
                    || name.map_or(false, |name| self.rule_filter.allows(name))
            }
            _ => self.operator_filter.allows(kind),
        }
    }

    fn push(&mut self, record: TraceRecord) -> Option<usize> {
        if self.keep == KeepPolicy::First && self.ring.total() >= self.capacity {
            return None;
        }
        let line = self.ring.push();
        let slot = self.ring.slot_of(line).expect("line just pushed");
        self.records[slot] = Some(TraceRecord {
            this_line: line,
            ..record
        });
        Some(line)
    }

    /// Record opcode entry.
    #[allow(clippy::too_many_arguments)]
    pub fn down(
        &mut self,
        opcode: &Opcode,
        name: Option<&str>,
        depth: usize,
        phrase_index: usize,
        look_kind: LookAroundKind,
        look_anchor: usize,
    ) {
        if !self.enabled(opcode.kind(), name) {
            return;
        }
        let line = self.push(TraceRecord {
            direction: Direction::Down,
            depth,
            this_line: 0,
            paired_line: None,
            operator: opcode.kind(),
            name: name.map(str::to_owned),
            opcode: opcode.clone(),
            state: PhraseState::Active,
            phrase_index,
            phrase_length: 0,
            look_kind,
            look_anchor,
        });
        self.open.push(line);
    }

    /// Record opcode completion and back-patch the matching down record.
    #[allow(clippy::too_many_arguments)]
    pub fn up(
        &mut self,
        opcode: &Opcode,
        name: Option<&str>,
        depth: usize,
        state: PhraseState,
        phrase_index: usize,
        phrase_length: usize,
        look_kind: LookAroundKind,
        look_anchor: usize,
    ) {
        if !self.enabled(opcode.kind(), name) {
            return;
        }
        let down_line = self.open.pop().flatten();
        let line = self.push(TraceRecord {
            direction: Direction::Up,
            depth,
            this_line: 0,
            paired_line: down_line,
            operator: opcode.kind(),
            name: name.map(str::to_owned),
            opcode: opcode.clone(),
            state,
            phrase_index,
            phrase_length,
            look_kind,
            look_anchor,
        });
        if let (Some(line), Some(down_line)) = (line, down_line) {
            // The push above may have evicted the down record.
            if let Some(slot) = self.ring.slot_of(down_line) {
                if let Some(down) = self.records[slot].as_mut() {
                    down.paired_line = Some(line);
                }
            }
        }
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.ring.lines().filter_map(move |line| {
            self.ring
                .slot_of(line)
                .and_then(|slot| self.records[slot].as_ref())
        })
    }

    pub fn emit(&self) -> TraceReport {
        let records: Vec<TraceRecord> = self.records().cloned().collect();
        let total = self.ring.total();
        TraceReport {
            dropped: total - records.len(),
            total,
            records,
        }
    }
}

/// Trace configuration errors detected at parse init.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("trace rule filter names '{name}', which is not a rule or UDT")]
    UnknownRule { name: String },
}
