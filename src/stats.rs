//! Hit-count statistics for a parse.
//!
//! Every executed opcode lands in a bucket for its operator kind, and RNM,
//! UDT and BKR opcodes additionally land in a bucket for the named rule or
//! UDT they touch.  Totals accumulate over the whole parse, NOMATCH
//! outcomes included.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grammar::OperatorKind;
use crate::system::PhraseState;

/// Outcome counts for one operator kind or one named rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBucket {
    pub empty: u64,
    pub matched: u64,
    pub nomatch: u64,
    pub total: u64,
}

impl StatBucket {
    fn add(&mut self, state: PhraseState) {
        match state {
            PhraseState::Empty => self.empty += 1,
            PhraseState::Match => self.matched += 1,
            PhraseState::Nomatch => self.nomatch += 1,
            PhraseState::Active => {}
        }
        self.total += 1;
    }

    fn merge(&mut self, other: &StatBucket) {
        self.empty += other.empty;
        self.matched += other.matched;
        self.nomatch += other.nomatch;
        self.total += other.total;
    }
}

/// Statistics shell owned by the parser across calls; `init` is run per
/// parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    operators: BTreeMap<OperatorKind, StatBucket>,
    rules: BTreeMap<String, StatBucket>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self) {
        self.operators.clear();
        self.rules.clear();
    }

    /// Record one completed opcode.
    pub fn collect(&mut self, kind: OperatorKind, lower: Option<&str>, state: PhraseState) {
        self.operators.entry(kind).or_default().add(state);
        if let Some(lower) = lower {
            self.rules.entry(lower.to_owned()).or_default().add(state);
        }
    }

    /// Bucket for one operator kind.
    pub fn operator(&self, kind: OperatorKind) -> StatBucket {
        self.operators.get(&kind).copied().unwrap_or_default()
    }

    /// Bucket for one rule/UDT by ASCII case-insensitive name.
    pub fn rule(&self, name: &str) -> StatBucket {
        self.rules
            .get(&name.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn operators(&self) -> impl Iterator<Item = (OperatorKind, StatBucket)> + '_ {
        self.operators.iter().map(|(kind, bucket)| (*kind, *bucket))
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, StatBucket)> {
        self.rules
            .iter()
            .map(|(name, bucket)| (name.as_str(), *bucket))
    }

    /// All operator buckets folded together.
    pub fn total(&self) -> StatBucket {
        let mut total = StatBucket::default();
        for bucket in self.operators.values() {
            total.merge(bucket);
        }
        total
    }
}
