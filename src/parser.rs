//! Parser facade.
//!
//! The facade owns everything with a lifetime longer than one parse call:
//! the callback registry, the optional AST/trace/stats attachments, and the
//! safety-cap configuration.  Each `parse` call validates the grammar
//! object, resolves names to indices, re-initializes the attachments,
//! synthesizes a one-opcode RNM for the start rule and hands control to the
//! evaluator, then assembles the final outcome from the evaluator's state
//! and counters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{Ast, AstCallback, AstError};
use crate::callbacks::{CallbackError, CallbackRegistry, SyntaxCallback};
use crate::evaluator::{Evaluator, ParseError};
use crate::grammar::{Grammar, GrammarError};
use crate::limits::ParseLimits;
use crate::stats::Stats;
use crate::system::PhraseState;
use crate::trace::{Trace, TraceError};

/// Configuration controlling parser resource budgets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    pub limits: ParseLimits,
}

/// Start rule selector: by name or by rule-table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRule<'a> {
    Named(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for StartRule<'a> {
    fn from(name: &'a str) -> Self {
        StartRule::Named(name)
    }
}

impl<'a> From<usize> for StartRule<'a> {
    fn from(index: usize) -> Self {
        StartRule::Index(index)
    }
}

/// Final result of a parse that ran to completion.
///
/// `success` requires a success state *and* a phrase covering the whole
/// window; a prefix match reports `success = false` with the prefix length
/// in `matched` and the deepest cursor reached in `max_matched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub state: PhraseState,
    /// Window length; equal to `sub_length`.
    pub length: usize,
    pub matched: usize,
    /// Farthest `phrase_index + phrase_length` reached outside look-around.
    pub max_matched: usize,
    pub max_tree_depth: usize,
    pub node_hits: u64,
    pub input_length: usize,
    pub sub_begin: usize,
    pub sub_end: usize,
    pub sub_length: usize,
}

/// Public parser facade.
pub struct Parser<U = ()> {
    config: ParserConfig,
    callbacks: CallbackRegistry<U>,
    ast: Option<Ast<U>>,
    trace: Option<Trace>,
    stats: Option<Stats>,
}

impl<U> Default for Parser<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> Parser<U> {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            callbacks: CallbackRegistry::new(),
            ast: None,
            trace: None,
            stats: None,
        }
    }

    pub fn config(&self) -> ParserConfig {
        self.config
    }

    /// Register an optional syntax callback for a rule.
    pub fn set_rule_callback(&mut self, name: &str, callback: SyntaxCallback<U>) {
        self.callbacks.set_rule(name, callback);
    }

    /// Register the mandatory callback for a UDT.
    pub fn set_udt_callback(&mut self, name: &str, callback: SyntaxCallback<U>) {
        self.callbacks.set_udt(name, callback);
    }

    /// Attach an AST builder; replaces any previous attachment.
    pub fn attach_ast(&mut self, ast: Ast<U>) -> &mut Ast<U> {
        self.ast = Some(ast);
        self.ast.as_mut().expect("ast attached above")
    }

    /// Shorthand for attaching a fresh AST and selecting one node.
    pub fn enable_ast_node(&mut self, name: &str) {
        self.ast.get_or_insert_with(Ast::new).enable(name);
    }

    /// Shorthand for attaching a fresh AST and selecting one node with a
    /// translation callback.
    pub fn set_ast_node(&mut self, name: &str, callback: AstCallback<U>) {
        self.ast
            .get_or_insert_with(Ast::new)
            .set_callback(name, callback);
    }

    pub fn ast(&self) -> Option<&Ast<U>> {
        self.ast.as_ref()
    }

    pub fn ast_mut(&mut self) -> Option<&mut Ast<U>> {
        self.ast.as_mut()
    }

    pub fn take_ast(&mut self) -> Option<Ast<U>> {
        self.ast.take()
    }

    /// Attach a trace recorder; replaces any previous attachment.
    pub fn attach_trace(&mut self, trace: Trace) -> &mut Trace {
        self.trace = Some(trace);
        self.trace.as_mut().expect("trace attached above")
    }

    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    pub fn trace_mut(&mut self) -> Option<&mut Trace> {
        self.trace.as_mut()
    }

    pub fn take_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// Attach a statistics collector; replaces any previous attachment.
    pub fn attach_stats(&mut self, stats: Stats) -> &mut Stats {
        self.stats = Some(stats);
        self.stats.as_mut().expect("stats attached above")
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    pub fn take_stats(&mut self) -> Option<Stats> {
        self.stats.take()
    }

    /// Parse the whole input.
    pub fn parse<'s>(
        &mut self,
        grammar: &Grammar,
        start: impl Into<StartRule<'s>>,
        input: &[u32],
        user_data: &mut U,
    ) -> Result<ParseOutcome, ParserError> {
        self.parse_substring(grammar, start, input, 0, input.len(), user_data)
    }

    /// Convenience entry converting a string to code points first.
    pub fn parse_str<'s>(
        &mut self,
        grammar: &Grammar,
        start: impl Into<StartRule<'s>>,
        input: &str,
        user_data: &mut U,
    ) -> Result<ParseOutcome, ParserError> {
        let codes = crate::grammar::codes_from_str(input);
        self.parse(grammar, start, &codes, user_data)
    }

    /// Parse the sub-window `[begin, begin + length)` of the input.
    pub fn parse_substring<'s>(
        &mut self,
        grammar: &Grammar,
        start: impl Into<StartRule<'s>>,
        input: &[u32],
        begin: usize,
        length: usize,
        user_data: &mut U,
    ) -> Result<ParseOutcome, ParserError> {
        grammar.validate()?;
        let sub_end = begin
            .checked_add(length)
            .filter(|&end| end <= input.len())
            .ok_or(ParserError::WindowOutOfBounds {
                begin,
                length,
                input_length: input.len(),
            })?;
        let start_rule = match start.into() {
            StartRule::Named(name) => grammar
                .rule_named(name)
                .ok_or_else(|| ParserError::UnknownStartRule(name.to_owned()))?,
            StartRule::Index(index) => {
                if index >= grammar.rules.len() {
                    return Err(ParserError::StartRuleOutOfRange(index));
                }
                index
            }
        };
        let callbacks = self.callbacks.resolve(grammar)?;
        if let Some(ast) = self.ast.as_mut() {
            ast.init(grammar)?;
        }
        if let Some(trace) = self.trace.as_mut() {
            trace.init(grammar)?;
        }
        if let Some(stats) = self.stats.as_mut() {
            stats.init();
        }

        let mut evaluator = Evaluator::new(
            grammar,
            input,
            begin,
            sub_end,
            callbacks,
            self.ast.as_mut(),
            self.trace.as_mut(),
            self.stats.as_mut(),
            self.config.limits,
            user_data,
        );
        evaluator.run(start_rule)?;

        let state = evaluator.state();
        let matched = evaluator.matched();
        let metrics = evaluator.metrics();
        Ok(ParseOutcome {
            success: state.succeeded() && matched == length,
            state,
            length,
            matched,
            max_matched: evaluator.max_matched(),
            max_tree_depth: metrics.max_tree_depth,
            node_hits: metrics.node_hits,
            input_length: input.len(),
            sub_begin: begin,
            sub_end,
            sub_length: length,
        })
    }
}

/// Errors surfaced by the parser facade.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid grammar object: {0}")]
    Grammar(#[from] GrammarError),
    #[error("unknown start rule '{0}'")]
    UnknownStartRule(String),
    #[error("start rule index {0} out of range")]
    StartRuleOutOfRange(usize),
    #[error("window [{begin}, {begin} + {length}) out of bounds for input of length {input_length}")]
    WindowOutOfBounds {
        begin: usize,
        length: usize,
        input_length: usize,
    },
    #[error("callback configuration: {0}")]
    Callback(#[from] CallbackError),
    #[error("AST configuration: {0}")]
    Ast(#[from] AstError),
    #[error("trace configuration: {0}")]
    Trace(#[from] TraceError),
    #[error("parse aborted: {0}")]
    Parse(#[from] ParseError),
}
