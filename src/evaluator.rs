//! Recursive opcode evaluator.
//!
//! This is the engine core: a single `execute` entry point dispatches on the
//! opcode tag, delegates to the per-operator handler, and threads the match
//! state through `SystemData`.  NOMATCH is the normal backtracking signal
//! and travels through the state enum; the `Result` channel is reserved for
//! fatal conditions (safety-cap breaches and callback contract violations).
//! When the top of the look-around stack is a behind frame, the handlers for
//! CAT, REP, TRG, TBS, TLS and BKR run their right-to-left variants and
//! match phrases ending at the cursor.

use thiserror::Error;

use crate::ast::Ast;
use crate::callbacks::{ResolvedCallbacks, SyntaxCallback};
use crate::grammar::{BkrMode, BkrTarget, CaseMode, Grammar, Opcode, Rule};
use crate::limits::{LimitError, LimitMetrics, LimitTracker, ParseLimits};
use crate::stats::Stats;
use crate::system::{LookAroundKind, PhraseCapture, PhraseState, SystemData};
use crate::trace::Trace;

/// Fatal conditions raised during opcode execution.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("safety cap breached: {0}")]
    Limit(#[from] LimitError),
    #[error("callback for '{name}' left the parser state ACTIVE where a final match state is required")]
    CallbackActive { name: String },
    #[error("UDT '{name}' is declared non-empty but returned an empty match")]
    EmptyUdtMatch { name: String },
    #[error("callback for '{name}' claimed {length} characters with only {remaining} remaining")]
    PhraseLengthOverrun {
        name: String,
        length: usize,
        remaining: usize,
    },
    #[error("UDT '{name}' invoked inside look-behind")]
    UdtInLookBehind { name: String },
    #[error("syntax callback for rule '{name}' invoked inside look-behind")]
    CallbackInLookBehind { name: String },
    #[error("rule index {0} out of range for callback evaluation")]
    RuleIndexOutOfRange(usize),
    #[error("UDT index {0} out of range for callback evaluation")]
    UdtIndexOutOfRange(usize),
    #[error("callback failure: {0}")]
    Callback(String),
}

/// ASCII case fold used by TLS and insensitive back-references.
fn fold(code: u32) -> u32 {
    if (65..=90).contains(&code) {
        code + 32
    } else {
        code
    }
}

/// Display and lowercase names of the rule/UDT an opcode touches, if any.
fn op_names<'g>(grammar: &'g Grammar, op: &Opcode) -> Option<(&'g str, &'g str)> {
    match op {
        Opcode::Rnm { rule } => grammar
            .rules
            .get(*rule)
            .map(|rule| (rule.name.as_str(), rule.lower.as_str())),
        Opcode::Udt { udt, .. } => grammar
            .udts
            .get(*udt)
            .map(|udt| (udt.name.as_str(), udt.lower.as_str())),
        Opcode::Bkr { target, .. } => match target {
            BkrTarget::Rule(index) => grammar
                .rules
                .get(*index)
                .map(|rule| (rule.name.as_str(), rule.lower.as_str())),
            BkrTarget::Udt(index) => grammar
                .udts
                .get(*index)
                .map(|udt| (udt.name.as_str(), udt.lower.as_str())),
        },
        _ => None,
    }
}

/// Per-parse execution state over a shared read-only grammar.
pub(crate) struct Evaluator<'p, U> {
    grammar: &'p Grammar,
    input: &'p [u32],
    sub_begin: usize,
    /// Effective window end; widened to the full input inside look-ahead.
    window_end: usize,
    rule_callbacks: Vec<Option<SyntaxCallback<U>>>,
    udt_callbacks: Vec<SyntaxCallback<U>>,
    ast: Option<&'p mut Ast<U>>,
    trace: Option<&'p mut Trace>,
    stats: Option<&'p mut Stats>,
    limits: LimitTracker,
    sys: SystemData,
    max_matched: usize,
    user_data: &'p mut U,
}

impl<'p, U> Evaluator<'p, U> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        grammar: &'p Grammar,
        input: &'p [u32],
        sub_begin: usize,
        sub_end: usize,
        callbacks: ResolvedCallbacks<U>,
        ast: Option<&'p mut Ast<U>>,
        trace: Option<&'p mut Trace>,
        stats: Option<&'p mut Stats>,
        limits: ParseLimits,
        user_data: &'p mut U,
    ) -> Self {
        Self {
            grammar,
            input,
            sub_begin,
            window_end: sub_end,
            rule_callbacks: callbacks.rules,
            udt_callbacks: callbacks.udts,
            ast,
            trace,
            stats,
            limits: LimitTracker::new(limits),
            sys: SystemData::new(),
            max_matched: sub_begin,
            user_data,
        }
    }

    /// Execute the parse from a synthesized RNM for the start rule.
    pub(crate) fn run(&mut self, start_rule: usize) -> Result<(), ParseError> {
        let start = [Opcode::Rnm { rule: start_rule }];
        self.execute(&start, 0, self.sub_begin)
    }

    pub(crate) fn state(&self) -> PhraseState {
        self.sys.state
    }

    pub(crate) fn matched(&self) -> usize {
        self.sys.phrase_length
    }

    pub(crate) fn max_matched(&self) -> usize {
        self.max_matched
    }

    pub(crate) fn metrics(&self) -> LimitMetrics {
        self.limits.metrics()
    }

    /// Single entry point for every opcode evaluation.
    fn execute(&mut self, ops: &[Opcode], index: usize, phrase_index: usize) -> Result<(), ParseError> {
        self.limits.observe_node()?;
        self.limits.enter_node()?;
        self.sys.state = PhraseState::Active;
        self.sys.phrase_length = 0;

        let grammar = self.grammar;
        let op = &ops[index];
        let names = op_names(grammar, op);
        let name = names.map(|(name, _)| name);
        let lower = names.map(|(_, lower)| lower);
        let depth = self.limits.tree_depth();
        let look_kind = self.sys.look_kind();
        let look_anchor = self.sys.look_anchor();

        if let Some(trace) = self.trace.as_deref_mut() {
            trace.down(op, name, depth, phrase_index, look_kind, look_anchor);
        }

        let behind = look_kind == LookAroundKind::Behind;
        match op {
            Opcode::Alt { children } => self.op_alt(ops, children, phrase_index)?,
            Opcode::Cat { children } if behind => {
                self.op_cat_behind(ops, children, phrase_index)?
            }
            Opcode::Cat { children } => self.op_cat(ops, children, phrase_index)?,
            Opcode::Rep { min, max } if behind => {
                self.op_rep_behind(ops, index, *min, *max, phrase_index)?
            }
            Opcode::Rep { min, max } => self.op_rep(ops, index, *min, *max, phrase_index)?,
            Opcode::Rnm { rule } => self.op_rnm(*rule, phrase_index)?,
            Opcode::Udt { udt, .. } => self.op_udt(*udt, phrase_index)?,
            Opcode::And => self.op_look_ahead(ops, index, phrase_index, true)?,
            Opcode::Not => self.op_look_ahead(ops, index, phrase_index, false)?,
            Opcode::Bka => self.op_look_behind(ops, index, phrase_index, true)?,
            Opcode::Bkn => self.op_look_behind(ops, index, phrase_index, false)?,
            Opcode::Trg { min, max } => self.op_trg(*min, *max, phrase_index, behind),
            Opcode::Tbs { codes } => self.op_tbs(codes, phrase_index, behind),
            Opcode::Tls { codes } => self.op_tls(codes, phrase_index, behind),
            Opcode::Bkr { target, case, mode } => {
                self.op_bkr(*target, *case, *mode, phrase_index, behind)
            }
            Opcode::Abg => {
                self.sys.phrase_length = 0;
                self.sys.state = if phrase_index == self.sub_begin {
                    PhraseState::Empty
                } else {
                    PhraseState::Nomatch
                };
            }
            Opcode::Aen => {
                self.sys.phrase_length = 0;
                self.sys.state = if phrase_index == self.window_end {
                    PhraseState::Empty
                } else {
                    PhraseState::Nomatch
                };
            }
        }

        if !self.sys.in_look_around() {
            let reach = phrase_index + self.sys.phrase_length;
            if reach > self.max_matched {
                self.max_matched = reach;
            }
        }

        let state = self.sys.state;
        let phrase_length = self.sys.phrase_length;
        if let Some(stats) = self.stats.as_deref_mut() {
            stats.collect(op.kind(), lower, state);
        }
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.up(
                op,
                name,
                depth,
                state,
                phrase_index,
                phrase_length,
                look_kind,
                look_anchor,
            );
        }
        self.limits.leave_node();
        Ok(())
    }

    fn succeed(&mut self, length: usize) {
        self.sys.state = if length == 0 {
            PhraseState::Empty
        } else {
            PhraseState::Match
        };
        self.sys.phrase_length = length;
    }

    fn fail(&mut self) {
        self.sys.state = PhraseState::Nomatch;
        self.sys.phrase_length = 0;
    }

    fn ast_mark(&self) -> Option<usize> {
        self.ast.as_ref().map(|ast| ast.len())
    }

    fn ast_rollback(&mut self, mark: Option<usize>) {
        if let (Some(ast), Some(mark)) = (self.ast.as_deref_mut(), mark) {
            ast.truncate(mark);
        }
    }

    /// Ordered alternation: first child that does not fail wins.
    fn op_alt(
        &mut self,
        ops: &[Opcode],
        children: &[usize],
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        for &child in children {
            self.execute(ops, child, phrase_index)?;
            if self.sys.state != PhraseState::Nomatch {
                break;
            }
        }
        Ok(())
    }

    /// Left-to-right concatenation; all children must succeed.
    fn op_cat(
        &mut self,
        ops: &[Opcode],
        children: &[usize],
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        let mark = self.ast_mark();
        let mut cursor = phrase_index;
        let mut total = 0;
        let mut matched = true;
        for &child in children {
            self.execute(ops, child, cursor)?;
            if self.sys.state == PhraseState::Nomatch {
                matched = false;
                break;
            }
            cursor += self.sys.phrase_length;
            total += self.sys.phrase_length;
        }
        if matched {
            self.succeed(total);
        } else {
            self.fail();
            self.ast_rollback(mark);
        }
        Ok(())
    }

    /// Right-to-left concatenation for look-behind: children are walked last
    /// to first and the cursor retreats by each matched length.
    fn op_cat_behind(
        &mut self,
        ops: &[Opcode],
        children: &[usize],
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        let mark = self.ast_mark();
        let mut cursor = phrase_index;
        let mut total = 0;
        let mut matched = true;
        for &child in children.iter().rev() {
            self.execute(ops, child, cursor)?;
            if self.sys.state == PhraseState::Nomatch {
                matched = false;
                break;
            }
            cursor -= self.sys.phrase_length;
            total += self.sys.phrase_length;
        }
        if matched {
            self.succeed(total);
        } else {
            self.fail();
            self.ast_rollback(mark);
        }
        Ok(())
    }

    /// Repetition over the implicit child at `index + 1`.
    ///
    /// An EMPTY child ends the loop without failing the repetition; this is
    /// what keeps zero-width children from looping forever.
    fn op_rep(
        &mut self,
        ops: &[Opcode],
        index: usize,
        min: usize,
        max: Option<usize>,
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        let mark = self.ast_mark();
        let mut cursor = phrase_index;
        let mut count = 0;
        let mut total = 0;
        loop {
            if max.map_or(false, |max| count >= max) {
                break;
            }
            if cursor > self.window_end {
                break;
            }
            self.execute(ops, index + 1, cursor)?;
            if matches!(self.sys.state, PhraseState::Nomatch | PhraseState::Empty) {
                break;
            }
            count += 1;
            total += self.sys.phrase_length;
            cursor += self.sys.phrase_length;
        }
        if self.sys.state == PhraseState::Empty || count >= min {
            self.succeed(total);
        } else {
            self.fail();
            self.ast_rollback(mark);
        }
        Ok(())
    }

    /// Repetition in look-behind; the cursor retreats toward input begin.
    fn op_rep_behind(
        &mut self,
        ops: &[Opcode],
        index: usize,
        min: usize,
        max: Option<usize>,
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        let mark = self.ast_mark();
        let mut cursor = phrase_index;
        let mut count = 0;
        let mut total = 0;
        loop {
            if max.map_or(false, |max| count >= max) {
                break;
            }
            if cursor == 0 {
                break;
            }
            self.execute(ops, index + 1, cursor)?;
            if matches!(self.sys.state, PhraseState::Nomatch | PhraseState::Empty) {
                break;
            }
            count += 1;
            total += self.sys.phrase_length;
            cursor -= self.sys.phrase_length;
        }
        if self.sys.state == PhraseState::Empty || count >= min {
            self.succeed(total);
        } else {
            self.fail();
            self.ast_rollback(mark);
        }
        Ok(())
    }

    /// Rule invocation: swaps the opcode table to the rule's opcodes, runs
    /// the optional syntax callback around them, and maintains the AST and
    /// back-reference frames.
    fn op_rnm(&mut self, rule_index: usize, phrase_index: usize) -> Result<(), ParseError> {
        let grammar = self.grammar;
        let rule = &grammar.rules[rule_index];
        let not_look = !self.sys.in_look_around();
        let ast_enabled =
            not_look && self.ast.as_ref().map_or(false, |ast| ast.node_enabled(rule_index));
        let mark = if ast_enabled {
            let ast = self.ast.as_deref_mut().expect("ast presence checked");
            let mark = ast.len();
            ast.down(rule_index, &rule.name);
            Some(mark)
        } else {
            None
        };

        let saved_parent = self.sys.begin_parent_frame();
        let result = self.run_rule(rule, rule_index, phrase_index);
        self.sys.restore_parent_frame(saved_parent);
        result?;

        if not_look && rule.is_back_referenced && self.sys.state.succeeded() {
            self.sys.record_capture(
                &rule.lower,
                PhraseCapture {
                    start: phrase_index,
                    length: self.sys.phrase_length,
                },
            );
        }
        if let Some(mark) = mark {
            let state = self.sys.state;
            let phrase_length = self.sys.phrase_length;
            let ast = self.ast.as_deref_mut().expect("ast recorded a down event");
            if state == PhraseState::Nomatch {
                ast.truncate(mark);
            } else {
                ast.up(rule_index, &rule.name, state, phrase_index, phrase_length);
            }
        }
        Ok(())
    }

    fn run_rule(
        &mut self,
        rule: &Rule,
        rule_index: usize,
        phrase_index: usize,
    ) -> Result<(), ParseError> {
        match self.rule_callbacks[rule_index] {
            None => self.execute(&rule.opcodes, 0, phrase_index),
            Some(callback) => {
                // Callbacks produce forward phrases, which cannot be spliced
                // into a right-to-left match.
                if self.sys.look_kind() == LookAroundKind::Behind {
                    return Err(ParseError::CallbackInLookBehind {
                        name: rule.name.clone(),
                    });
                }
                callback(&mut CallbackContext {
                    eval: self,
                    phrase_index,
                })?;
                self.validate_callback(&rule.name, phrase_index, true, true)?;
                if self.sys.state == PhraseState::Active {
                    self.execute(&rule.opcodes, 0, phrase_index)?;
                    callback(&mut CallbackContext {
                        eval: self,
                        phrase_index,
                    })?;
                    self.validate_callback(&rule.name, phrase_index, false, true)?;
                }
                Ok(())
            }
        }
    }

    /// User-defined terminal: the mandatory callback is the matcher.
    fn op_udt(&mut self, udt_index: usize, phrase_index: usize) -> Result<(), ParseError> {
        let grammar = self.grammar;
        let udt = &grammar.udts[udt_index];
        if self.sys.look_kind() == LookAroundKind::Behind {
            return Err(ParseError::UdtInLookBehind {
                name: udt.name.clone(),
            });
        }
        let node = grammar.rules.len() + udt_index;
        let not_look = !self.sys.in_look_around();
        let ast_enabled =
            not_look && self.ast.as_ref().map_or(false, |ast| ast.node_enabled(node));
        let mark = if ast_enabled {
            let ast = self.ast.as_deref_mut().expect("ast presence checked");
            let mark = ast.len();
            ast.down(node, &udt.name);
            Some(mark)
        } else {
            None
        };

        let callback = self.udt_callbacks[udt_index];
        callback(&mut CallbackContext {
            eval: self,
            phrase_index,
        })?;
        self.validate_callback(&udt.name, phrase_index, false, udt.empty)?;

        if not_look && udt.is_back_referenced && self.sys.state.succeeded() {
            self.sys.record_capture(
                &udt.lower,
                PhraseCapture {
                    start: phrase_index,
                    length: self.sys.phrase_length,
                },
            );
        }
        if let Some(mark) = mark {
            let state = self.sys.state;
            let phrase_length = self.sys.phrase_length;
            let ast = self.ast.as_deref_mut().expect("ast recorded a down event");
            if state == PhraseState::Nomatch {
                ast.truncate(mark);
            } else {
                ast.up(node, &udt.name, state, phrase_index, phrase_length);
            }
        }
        Ok(())
    }

    /// Enforce the callback result contract of rules and UDTs.
    fn validate_callback(
        &mut self,
        name: &str,
        phrase_index: usize,
        allow_active: bool,
        allow_empty: bool,
    ) -> Result<(), ParseError> {
        match self.sys.state {
            PhraseState::Active => {
                if !allow_active {
                    return Err(ParseError::CallbackActive {
                        name: name.to_owned(),
                    });
                }
                self.sys.phrase_length = 0;
            }
            PhraseState::Nomatch => self.sys.phrase_length = 0,
            PhraseState::Empty => {
                if !allow_empty {
                    return Err(ParseError::EmptyUdtMatch {
                        name: name.to_owned(),
                    });
                }
                self.sys.phrase_length = 0;
            }
            PhraseState::Match => {
                let remaining = self.window_end.saturating_sub(phrase_index);
                if self.sys.phrase_length > remaining {
                    return Err(ParseError::PhraseLengthOverrun {
                        name: name.to_owned(),
                        length: self.sys.phrase_length,
                        remaining,
                    });
                }
                if self.sys.phrase_length == 0 {
                    self.sys.state = PhraseState::Empty;
                }
            }
        }
        Ok(())
    }

    /// AND / NOT: zero-width look-ahead over the child at `index + 1`.
    ///
    /// The window end is widened to the full input for the child and
    /// restored on every exit path.
    fn op_look_ahead(
        &mut self,
        ops: &[Opcode],
        index: usize,
        phrase_index: usize,
        positive: bool,
    ) -> Result<(), ParseError> {
        let saved_end = self.window_end;
        self.sys
            .push_look(LookAroundKind::Ahead, phrase_index, saved_end);
        self.window_end = self.input.len();
        let result = self.execute(ops, index + 1, phrase_index);
        self.window_end = saved_end;
        self.sys.pop_look();
        result?;
        let matched = self.sys.state.succeeded();
        self.sys.phrase_length = 0;
        self.sys.state = if matched == positive {
            PhraseState::Empty
        } else {
            PhraseState::Nomatch
        };
        Ok(())
    }

    /// BKA / BKN: zero-width look-behind; the child runs right-to-left and
    /// must match a phrase ending at `phrase_index`.
    fn op_look_behind(
        &mut self,
        ops: &[Opcode],
        index: usize,
        phrase_index: usize,
        positive: bool,
    ) -> Result<(), ParseError> {
        self.sys
            .push_look(LookAroundKind::Behind, phrase_index, self.window_end);
        let result = self.execute(ops, index + 1, phrase_index);
        self.sys.pop_look();
        result?;
        let matched = self.sys.state.succeeded();
        self.sys.phrase_length = 0;
        self.sys.state = if matched == positive {
            PhraseState::Empty
        } else {
            PhraseState::Nomatch
        };
        Ok(())
    }

    fn op_trg(&mut self, min: u32, max: u32, phrase_index: usize, behind: bool) {
        let code = if behind {
            if phrase_index == 0 {
                None
            } else {
                Some(self.input[phrase_index - 1])
            }
        } else if phrase_index < self.window_end {
            Some(self.input[phrase_index])
        } else {
            None
        };
        match code {
            Some(code) if code >= min && code <= max => self.succeed(1),
            _ => self.fail(),
        }
    }

    fn op_tbs(&mut self, codes: &[u32], phrase_index: usize, behind: bool) {
        let length = codes.len();
        let start = if behind {
            if phrase_index < length {
                self.fail();
                return;
            }
            phrase_index - length
        } else {
            if phrase_index + length > self.window_end {
                self.fail();
                return;
            }
            phrase_index
        };
        if self.input[start..start + length] == codes[..] {
            self.succeed(length);
        } else {
            self.fail();
        }
    }

    fn op_tls(&mut self, codes: &[u32], phrase_index: usize, behind: bool) {
        let length = codes.len();
        if length == 0 {
            // An empty TLS matches the empty string anywhere.
            self.succeed(0);
            return;
        }
        let start = if behind {
            if phrase_index < length {
                self.fail();
                return;
            }
            phrase_index - length
        } else {
            if phrase_index + length > self.window_end {
                self.fail();
                return;
            }
            phrase_index
        };
        let matched = self.input[start..start + length]
            .iter()
            .zip(codes)
            .all(|(&code, &expected)| fold(code) == expected);
        if matched {
            self.succeed(length);
        } else {
            self.fail();
        }
    }

    /// Back-reference: compare against the phrase last captured by the
    /// referenced rule/UDT, selected from the frame the mode names.
    fn op_bkr(
        &mut self,
        target: BkrTarget,
        case: CaseMode,
        mode: BkrMode,
        phrase_index: usize,
        behind: bool,
    ) {
        let grammar = self.grammar;
        let lower = match target {
            BkrTarget::Rule(index) => grammar.rules[index].lower.as_str(),
            BkrTarget::Udt(index) => grammar.udts[index].lower.as_str(),
        };
        let capture = match self.sys.capture(mode, lower) {
            Some(capture) => capture,
            None => {
                self.fail();
                return;
            }
        };
        if capture.length == 0 {
            self.succeed(0);
            return;
        }
        let start = if behind {
            if phrase_index < capture.length {
                self.fail();
                return;
            }
            phrase_index - capture.length
        } else {
            if phrase_index + capture.length > self.window_end {
                self.fail();
                return;
            }
            phrase_index
        };
        if self.phrases_equal(capture.start, start, capture.length, case) {
            self.succeed(capture.length);
        } else {
            self.fail();
        }
    }

    fn phrases_equal(&self, left: usize, right: usize, length: usize, case: CaseMode) -> bool {
        let a = &self.input[left..left + length];
        let b = &self.input[right..right + length];
        match case {
            CaseMode::Sensitive => a == b,
            CaseMode::Insensitive => a
                .iter()
                .zip(b)
                .all(|(&x, &y)| fold(x) == fold(y)),
        }
    }
}

/// Mutable view of the evaluator handed to rule and UDT callbacks.
///
/// A callback reports its result by writing `state` and `phrase_length`;
/// the advanced `evaluate_rule`/`evaluate_udt` hooks re-enter the evaluator
/// for callers that implement terminals in terms of other productions.
pub struct CallbackContext<'a, 'p, U> {
    eval: &'a mut Evaluator<'p, U>,
    phrase_index: usize,
}

impl<'a, 'p, U> CallbackContext<'a, 'p, U> {
    pub fn state(&self) -> PhraseState {
        self.eval.sys.state
    }

    pub fn set_state(&mut self, state: PhraseState) {
        self.eval.sys.state = state;
    }

    pub fn phrase_length(&self) -> usize {
        self.eval.sys.phrase_length
    }

    pub fn set_phrase_length(&mut self, length: usize) {
        self.eval.sys.phrase_length = length;
    }

    pub fn phrase_index(&self) -> usize {
        self.phrase_index
    }

    pub fn input(&self) -> &[u32] {
        self.eval.input
    }

    /// Characters remaining between the phrase index and the window end.
    pub fn max_phrase_length(&self) -> usize {
        self.eval.window_end.saturating_sub(self.phrase_index)
    }

    pub fn look_around(&self) -> LookAroundKind {
        self.eval.sys.look_kind()
    }

    pub fn user_data(&mut self) -> &mut U {
        &mut *self.eval.user_data
    }

    /// Re-enter the evaluator on a rule, as if an RNM opcode were present.
    pub fn evaluate_rule(&mut self, rule: usize, phrase_index: usize) -> Result<(), ParseError> {
        if rule >= self.eval.grammar.rules.len() {
            return Err(ParseError::RuleIndexOutOfRange(rule));
        }
        let ops = [Opcode::Rnm { rule }];
        self.eval.execute(&ops, 0, phrase_index)
    }

    /// Re-enter the evaluator on a UDT, as if a UDT opcode were present.
    pub fn evaluate_udt(&mut self, udt: usize, phrase_index: usize) -> Result<(), ParseError> {
        let empty = match self.eval.grammar.udts.get(udt) {
            Some(udt) => udt.empty,
            None => return Err(ParseError::UdtIndexOutOfRange(udt)),
        };
        let ops = [Opcode::Udt { udt, empty }];
        self.eval.execute(&ops, 0, phrase_index)
    }
}
