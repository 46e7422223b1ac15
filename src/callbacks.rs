//! Rule and UDT callback registry.
//!
//! Callbacks are registered by rule/UDT name and resolved to index-parallel
//! arrays at parse init.  Rule callbacks are optional; a UDT has no opcodes,
//! so every UDT in the grammar must have a callback before a parse can
//! start.

use std::collections::HashMap;

use thiserror::Error;

use crate::evaluator::{CallbackContext, ParseError};
use crate::grammar::Grammar;

/// Syntax callback invoked by the evaluator for a rule or UDT.
///
/// The callback reports its result by mutating the context's state and
/// phrase length; the `Err` channel is reserved for fatal conditions.
pub type SyntaxCallback<U> = fn(&mut CallbackContext<'_, '_, U>) -> Result<(), ParseError>;

/// Name-keyed registry owned by the parser facade.
pub struct CallbackRegistry<U> {
    rules: HashMap<String, SyntaxCallback<U>>,
    udts: HashMap<String, SyntaxCallback<U>>,
}

impl<U> Default for CallbackRegistry<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> CallbackRegistry<U> {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            udts: HashMap::new(),
        }
    }

    pub fn set_rule(&mut self, name: &str, callback: SyntaxCallback<U>) {
        self.rules.insert(name.to_ascii_lowercase(), callback);
    }

    pub fn set_udt(&mut self, name: &str, callback: SyntaxCallback<U>) {
        self.udts.insert(name.to_ascii_lowercase(), callback);
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.udts.clear();
    }

    /// Resolve registered names to index-parallel arrays for one grammar.
    pub(crate) fn resolve(&self, grammar: &Grammar) -> Result<ResolvedCallbacks<U>, CallbackError> {
        let mut rules: Vec<Option<SyntaxCallback<U>>> = vec![None; grammar.rules.len()];
        for (name, callback) in &self.rules {
            let index = grammar
                .rule_named(name)
                .ok_or_else(|| CallbackError::UnknownRule { name: name.clone() })?;
            rules[index] = Some(*callback);
        }
        let mut udts: Vec<SyntaxCallback<U>> = Vec::with_capacity(grammar.udts.len());
        for udt in &grammar.udts {
            let callback = self
                .udts
                .get(&udt.lower)
                .ok_or_else(|| CallbackError::MissingUdt {
                    name: udt.name.clone(),
                })?;
            udts.push(*callback);
        }
        for name in self.udts.keys() {
            if grammar.udt_named(name).is_none() {
                return Err(CallbackError::UnknownUdt { name: name.clone() });
            }
        }
        Ok(ResolvedCallbacks { rules, udts })
    }
}

/// Index-parallel callback arrays handed to the evaluator.
pub(crate) struct ResolvedCallbacks<U> {
    pub rules: Vec<Option<SyntaxCallback<U>>>,
    pub udts: Vec<SyntaxCallback<U>>,
}

/// Callback registration errors detected at parse init.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback registered for '{name}', which is not a rule of the grammar")]
    UnknownRule { name: String },
    #[error("callback registered for '{name}', which is not a UDT of the grammar")]
    UnknownUdt { name: String },
    #[error("UDT '{name}' has no callback; UDT callbacks are mandatory")]
    MissingUdt { name: String },
}
