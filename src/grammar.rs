//! Grammar model for the SABNF parse engine.
//!
//! A grammar object is produced by an external generator and consumed here
//! read-only: rules and user-defined terminals (UDTs) address flat opcode
//! lists, and every opcode is one node of the pre-compiled parse tree.  The
//! types below describe that object shape; `Grammar::validate` performs the
//! structural checks the parser facade runs before the first opcode executes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-free discriminant for an opcode, used by trace filters and the
/// statistics collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    Alt,
    Cat,
    Rep,
    Rnm,
    Udt,
    And,
    Not,
    Bka,
    Bkn,
    Trg,
    Tbs,
    Tls,
    Bkr,
    Abg,
    Aen,
}

/// Case handling for a back-reference comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseMode {
    Sensitive,
    Insensitive,
}

/// Back-reference scoping: the last match anywhere in the parse, or the last
/// match within the current parent-rule activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BkrMode {
    Universal,
    Parent,
}

/// The rule or UDT a back-reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum BkrTarget {
    Rule(usize),
    Udt(usize),
}

/// One node of the pre-compiled grammar.
///
/// Child references are indices into the opcode list of the enclosing rule.
/// Operators with a single child (REP, AND, NOT, BKA, BKN) own the opcode at
/// `self_index + 1` implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Opcode {
    /// Ordered alternation over child opcodes.
    Alt { children: Vec<usize> },
    /// Concatenation of child opcodes.
    Cat { children: Vec<usize> },
    /// Repetition of the implicit child; `max = None` is unbounded.
    Rep { min: usize, max: Option<usize> },
    /// Rule invocation by index into the rule table.
    Rnm { rule: usize },
    /// User-defined terminal; `empty` declares whether it may match nothing.
    Udt { udt: usize, empty: bool },
    /// Positive look-ahead.
    And,
    /// Negative look-ahead.
    Not,
    /// Positive look-behind.
    Bka,
    /// Negative look-behind.
    Bkn,
    /// Single character in the inclusive range `min..=max`.
    Trg { min: u32, max: u32 },
    /// Exact, case-sensitive terminal string.
    Tbs { codes: Vec<u32> },
    /// ASCII case-insensitive terminal string, pre-folded to lowercase.
    Tls { codes: Vec<u32> },
    /// Back-reference to the phrase last captured by a rule or UDT.
    Bkr {
        target: BkrTarget,
        case: CaseMode,
        mode: BkrMode,
    },
    /// Anchor at the begin of the input window.
    Abg,
    /// Anchor at the end of the input window.
    Aen,
}

impl Opcode {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Opcode::Alt { .. } => OperatorKind::Alt,
            Opcode::Cat { .. } => OperatorKind::Cat,
            Opcode::Rep { .. } => OperatorKind::Rep,
            Opcode::Rnm { .. } => OperatorKind::Rnm,
            Opcode::Udt { .. } => OperatorKind::Udt,
            Opcode::And => OperatorKind::And,
            Opcode::Not => OperatorKind::Not,
            Opcode::Bka => OperatorKind::Bka,
            Opcode::Bkn => OperatorKind::Bkn,
            Opcode::Trg { .. } => OperatorKind::Trg,
            Opcode::Tbs { .. } => OperatorKind::Tbs,
            Opcode::Tls { .. } => OperatorKind::Tls,
            Opcode::Bkr { .. } => OperatorKind::Bkr,
            Opcode::Abg => OperatorKind::Abg,
            Opcode::Aen => OperatorKind::Aen,
        }
    }
}

/// Named grammar production with its compiled opcode list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub lower: String,
    pub opcodes: Vec<Opcode>,
    pub is_back_referenced: bool,
    pub index: usize,
}

/// User-defined terminal; matching logic is supplied as a parser callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Udt {
    pub name: String,
    pub lower: String,
    pub empty: bool,
    pub is_back_referenced: bool,
    pub index: usize,
}

/// Immutable grammar object: the rule and UDT tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub rules: Vec<Rule>,
    pub udts: Vec<Udt>,
}

impl Grammar {
    pub fn new(rules: Vec<Rule>, udts: Vec<Udt>) -> Self {
        Self { rules, udts }
    }

    /// Find a rule by ASCII case-insensitive name.
    pub fn rule_named(&self, name: &str) -> Option<usize> {
        let lower = name.to_ascii_lowercase();
        self.rules.iter().position(|rule| rule.lower == lower)
    }

    /// Find a UDT by ASCII case-insensitive name.
    pub fn udt_named(&self, name: &str) -> Option<usize> {
        let lower = name.to_ascii_lowercase();
        self.udts.iter().position(|udt| udt.lower == lower)
    }

    /// Combined node count: rules first, then UDTs.
    pub fn node_count(&self) -> usize {
        self.rules.len() + self.udts.len()
    }

    /// Structural validation run by the facade before any opcode executes.
    pub fn validate(&self) -> Result<(), GrammarError> {
        if self.rules.is_empty() {
            return Err(GrammarError::NoRules);
        }
        for (position, rule) in self.rules.iter().enumerate() {
            if rule.index != position {
                return Err(GrammarError::IndexMismatch {
                    name: rule.name.clone(),
                    index: rule.index,
                    position,
                });
            }
            if rule.lower != rule.name.to_ascii_lowercase() {
                return Err(GrammarError::NameCaseMismatch {
                    name: rule.name.clone(),
                });
            }
            if rule.opcodes.is_empty() {
                return Err(GrammarError::EmptyOpcodeList {
                    rule: rule.name.clone(),
                });
            }
            for (opcode_index, opcode) in rule.opcodes.iter().enumerate() {
                self.validate_opcode(rule, opcode_index, opcode)?;
            }
        }
        for (position, udt) in self.udts.iter().enumerate() {
            if udt.index != position {
                return Err(GrammarError::IndexMismatch {
                    name: udt.name.clone(),
                    index: udt.index,
                    position,
                });
            }
            if udt.lower != udt.name.to_ascii_lowercase() {
                return Err(GrammarError::NameCaseMismatch {
                    name: udt.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_opcode(
        &self,
        rule: &Rule,
        opcode_index: usize,
        opcode: &Opcode,
    ) -> Result<(), GrammarError> {
        let out_of_range = |child: usize| GrammarError::ChildOutOfRange {
            rule: rule.name.clone(),
            opcode: opcode_index,
            child,
        };
        match opcode {
            Opcode::Alt { children } | Opcode::Cat { children } => {
                if children.is_empty() {
                    return Err(GrammarError::NoChildren {
                        rule: rule.name.clone(),
                        opcode: opcode_index,
                    });
                }
                for &child in children {
                    if child >= rule.opcodes.len() {
                        return Err(out_of_range(child));
                    }
                }
            }
            Opcode::Rep { min, max } => {
                if let Some(max) = max {
                    if max < min {
                        return Err(GrammarError::InvalidRange {
                            rule: rule.name.clone(),
                            opcode: opcode_index,
                        });
                    }
                }
                if opcode_index + 1 >= rule.opcodes.len() {
                    return Err(out_of_range(opcode_index + 1));
                }
            }
            Opcode::And | Opcode::Not | Opcode::Bka | Opcode::Bkn => {
                if opcode_index + 1 >= rule.opcodes.len() {
                    return Err(out_of_range(opcode_index + 1));
                }
            }
            Opcode::Rnm { rule: target } => {
                if *target >= self.rules.len() {
                    return Err(GrammarError::RuleRefOutOfRange {
                        rule: rule.name.clone(),
                        target: *target,
                    });
                }
            }
            Opcode::Udt { udt, .. } => {
                if *udt >= self.udts.len() {
                    return Err(GrammarError::UdtRefOutOfRange {
                        rule: rule.name.clone(),
                        target: *udt,
                    });
                }
            }
            Opcode::Trg { min, max } => {
                if max < min {
                    return Err(GrammarError::InvalidRange {
                        rule: rule.name.clone(),
                        opcode: opcode_index,
                    });
                }
            }
            Opcode::Tbs { codes } => {
                if codes.is_empty() {
                    return Err(GrammarError::EmptyTerminal {
                        rule: rule.name.clone(),
                        opcode: opcode_index,
                    });
                }
            }
            Opcode::Tls { codes } => {
                if codes.iter().any(|&code| (65..=90).contains(&code)) {
                    return Err(GrammarError::TlsNotFolded {
                        rule: rule.name.clone(),
                        opcode: opcode_index,
                    });
                }
            }
            Opcode::Bkr { target, .. } => match target {
                BkrTarget::Rule(index) if *index >= self.rules.len() => {
                    return Err(GrammarError::RuleRefOutOfRange {
                        rule: rule.name.clone(),
                        target: *index,
                    });
                }
                BkrTarget::Udt(index) if *index >= self.udts.len() => {
                    return Err(GrammarError::UdtRefOutOfRange {
                        rule: rule.name.clone(),
                        target: *index,
                    });
                }
                _ => {}
            },
            Opcode::Abg | Opcode::Aen => {}
        }
        Ok(())
    }
}

/// Convert a string to the code-point sequence the engine operates on.
pub fn codes_from_str(input: &str) -> Vec<u32> {
    input.chars().map(u32::from).collect()
}

/// Grammar-object shape violations detected before parsing.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar contains no rules")]
    NoRules,
    #[error("'{name}' carries index {index} but sits at table position {position}")]
    IndexMismatch {
        name: String,
        index: usize,
        position: usize,
    },
    #[error("lowercase name for '{name}' does not match")]
    NameCaseMismatch { name: String },
    #[error("rule '{rule}' has an empty opcode list")]
    EmptyOpcodeList { rule: String },
    #[error("opcode {opcode} of rule '{rule}' has no children")]
    NoChildren { rule: String, opcode: usize },
    #[error("opcode {opcode} of rule '{rule}' references child {child} out of range")]
    ChildOutOfRange {
        rule: String,
        opcode: usize,
        child: usize,
    },
    #[error("rule '{rule}' references rule index {target} out of range")]
    RuleRefOutOfRange { rule: String, target: usize },
    #[error("rule '{rule}' references UDT index {target} out of range")]
    UdtRefOutOfRange { rule: String, target: usize },
    #[error("opcode {opcode} of rule '{rule}' has an inverted range")]
    InvalidRange { rule: String, opcode: usize },
    #[error("opcode {opcode} of rule '{rule}' is a zero-length terminal")]
    EmptyTerminal { rule: String, opcode: usize },
    #[error("opcode {opcode} of rule '{rule}' carries unfolded TLS characters")]
    TlsNotFolded { rule: String, opcode: usize },
}
