//! Shared fixture builders for the integration tests.

#![allow(dead_code)]

use sabnf_runtime::grammar::{BkrMode, BkrTarget, CaseMode, Grammar, Opcode, Rule, Udt};

pub fn codes(text: &str) -> Vec<u32> {
    text.chars().map(u32::from).collect()
}

pub fn rule(index: usize, name: &str, opcodes: Vec<Opcode>) -> Rule {
    Rule {
        name: name.to_owned(),
        lower: name.to_ascii_lowercase(),
        opcodes,
        is_back_referenced: false,
        index,
    }
}

/// Rule flagged as the target of a back-reference.
pub fn referenced_rule(index: usize, name: &str, opcodes: Vec<Opcode>) -> Rule {
    Rule {
        is_back_referenced: true,
        ..rule(index, name, opcodes)
    }
}

pub fn udt(index: usize, name: &str, empty: bool) -> Udt {
    Udt {
        name: name.to_owned(),
        lower: name.to_ascii_lowercase(),
        empty,
        is_back_referenced: false,
        index,
    }
}

pub fn referenced_udt(index: usize, name: &str, empty: bool) -> Udt {
    Udt {
        is_back_referenced: true,
        ..udt(index, name, empty)
    }
}

pub fn grammar(rules: Vec<Rule>) -> Grammar {
    Grammar::new(rules, Vec::new())
}

/// Case-insensitive terminal; the compiler emits these pre-folded.
pub fn tls(text: &str) -> Opcode {
    Opcode::Tls {
        codes: codes(&text.to_ascii_lowercase()),
    }
}

/// Case-sensitive terminal.
pub fn tbs(text: &str) -> Opcode {
    Opcode::Tbs { codes: codes(text) }
}

pub fn alt(children: Vec<usize>) -> Opcode {
    Opcode::Alt { children }
}

pub fn cat(children: Vec<usize>) -> Opcode {
    Opcode::Cat { children }
}

pub fn rep(min: usize, max: Option<usize>) -> Opcode {
    Opcode::Rep { min, max }
}

pub fn rnm(rule: usize) -> Opcode {
    Opcode::Rnm { rule }
}

pub fn trg(min: u32, max: u32) -> Opcode {
    Opcode::Trg { min, max }
}

pub fn bkr(target: BkrTarget, case: CaseMode, mode: BkrMode) -> Opcode {
    Opcode::Bkr { target, case, mode }
}
