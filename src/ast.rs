//! AST builder.
//!
//! During a parse the evaluator appends down/up node events for every rule
//! or UDT the caller selected; a failed sub-parse truncates the events it
//! appended, so only nodes on the successful parse path survive.  After the
//! parse, `translate` walks the surviving events and invokes the registered
//! per-node callbacks to perform semantic actions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar::Grammar;
use crate::system::{Direction, PhraseState};

/// Phase of a translation callback: `Pre` on the down event, `Post` on up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstPhase {
    Pre,
    Post,
}

/// Returned by a translation callback; `SkipSubtree` is honored in the pre
/// phase only and jumps to the node's matching up event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateAction {
    Continue,
    SkipSubtree,
}

/// View of one retained node handed to a translation callback.
#[derive(Debug)]
pub struct AstNode<'a> {
    pub name: &'a str,
    pub input: &'a [u32],
    pub phrase_index: usize,
    pub phrase_length: usize,
}

/// Per-node translation callback.
pub type AstCallback<U> = fn(AstPhase, &AstNode<'_>, &mut U) -> TranslateAction;

/// One down or up node event.
///
/// Down events are back-patched when their up event arrives, so a retained
/// down record already carries the node's final state and phrase extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstRecord {
    pub direction: Direction,
    /// Combined node id: rule index, or rule count + UDT index.
    pub node: usize,
    pub name: String,
    pub state: PhraseState,
    pub phrase_index: usize,
    pub phrase_length: usize,
    /// Working-stack depth after this event was applied.
    pub depth: usize,
    pub paired: Option<usize>,
}

struct NodeSpec<U> {
    callback: Option<AstCallback<U>>,
}

/// AST shell owned by the parser across calls; `init` is run per parse.
pub struct Ast<U = ()> {
    registered: HashMap<String, Option<AstCallback<U>>>,
    resolved: Vec<Option<NodeSpec<U>>>,
    records: Vec<AstRecord>,
    stack: Vec<usize>,
}

impl<U> Default for Ast<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Ast<U> {
    pub fn new() -> Self {
        Self {
            registered: HashMap::new(),
            resolved: Vec::new(),
            records: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Retain this rule/UDT's nodes in the AST without a callback.
    pub fn enable(&mut self, name: &str) {
        self.registered.insert(name.to_ascii_lowercase(), None);
    }

    /// Retain this rule/UDT's nodes and translate them with `callback`.
    pub fn set_callback(&mut self, name: &str, callback: AstCallback<U>) {
        self.registered
            .insert(name.to_ascii_lowercase(), Some(callback));
    }

    /// Resolve registered names against the grammar and reset per-parse
    /// state.  Run by the facade at parse init.
    pub fn init(&mut self, grammar: &Grammar) -> Result<(), AstError> {
        self.records.clear();
        self.stack.clear();
        self.resolved.clear();
        self.resolved.resize_with(grammar.node_count(), || None);
        for (lower, callback) in &self.registered {
            let node = if let Some(rule) = grammar.rule_named(lower) {
                rule
            } else if let Some(udt) = grammar.udt_named(lower) {
                grammar.rules.len() + udt
            } else {
                return Err(AstError::UnknownNode { name: lower.clone() });
            };
            self.resolved[node] = Some(NodeSpec {
                callback: *callback,
            });
        }
        Ok(())
    }

    /// Whether events for this node id should be recorded.
    pub fn node_enabled(&self, node: usize) -> bool {
        self.resolved.get(node).map_or(false, Option::is_some)
    }

    /// Record a down event, returning its record index.
    pub fn down(&mut self, node: usize, name: &str) -> usize {
        let index = self.records.len();
        self.stack.push(index);
        self.records.push(AstRecord {
            direction: Direction::Down,
            node,
            name: name.to_owned(),
            state: PhraseState::Active,
            phrase_index: 0,
            phrase_length: 0,
            depth: self.stack.len(),
            paired: None,
        });
        index
    }

    /// Record an up event and back-patch its down record.
    pub fn up(
        &mut self,
        node: usize,
        name: &str,
        state: PhraseState,
        phrase_index: usize,
        phrase_length: usize,
    ) -> usize {
        let index = self.records.len();
        let down = self.stack.pop();
        self.records.push(AstRecord {
            direction: Direction::Up,
            node,
            name: name.to_owned(),
            state,
            phrase_index,
            phrase_length,
            depth: self.stack.len(),
            paired: down,
        });
        if let Some(down) = down {
            let record = &mut self.records[down];
            record.paired = Some(index);
            record.state = state;
            record.phrase_index = phrase_index;
            record.phrase_length = phrase_length;
        }
        index
    }

    /// Number of recorded events; the save point for rollback.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Roll back to a previously saved length after a NOMATCH, restoring
    /// the working stack to the depth in force at that point.
    pub fn truncate(&mut self, length: usize) {
        if length >= self.records.len() {
            return;
        }
        self.records.truncate(length);
        let depth = if length == 0 {
            0
        } else {
            self.records[length - 1].depth
        };
        self.stack.truncate(depth);
    }

    /// Retained events in parse order.
    pub fn records(&self) -> &[AstRecord] {
        &self.records
    }

    /// Walk the retained events, invoking per-node callbacks.
    pub fn translate(&self, input: &[u32], data: &mut U) {
        let mut index = 0;
        while index < self.records.len() {
            let record = &self.records[index];
            let callback = self
                .resolved
                .get(record.node)
                .and_then(|spec| spec.as_ref())
                .and_then(|spec| spec.callback);
            if let Some(callback) = callback {
                let node = AstNode {
                    name: &record.name,
                    input,
                    phrase_index: record.phrase_index,
                    phrase_length: record.phrase_length,
                };
                match record.direction {
                    Direction::Down => {
                        if callback(AstPhase::Pre, &node, data) == TranslateAction::SkipSubtree {
                            // Jump to the matching up record; its post phase
                            // still runs.
                            if let Some(paired) = record.paired {
                                index = paired;
                                continue;
                            }
                        }
                    }
                    Direction::Up => {
                        callback(AstPhase::Post, &node, data);
                    }
                }
            }
            index += 1;
        }
    }
}

/// AST configuration errors detected at parse init.
#[derive(Debug, Error)]
pub enum AstError {
    #[error("AST node '{name}' is not a rule or UDT of the grammar")]
    UnknownNode { name: String },
}
