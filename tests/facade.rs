//! Facade setup errors, windowed parsing, and grammar-object interchange.

mod common;

use common::*;
use sabnf_runtime::grammar::{codes_from_str, Grammar, GrammarError, Opcode};
use sabnf_runtime::parser::{Parser, ParserError};

fn double_a_grammar() -> Grammar {
    grammar(vec![rule(0, "s", vec![rep(2, Some(3)), tls("a")])])
}

#[test]
fn unknown_start_rule_is_a_setup_error() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "t", &codes("aa"), &mut ())
        .expect_err("there is no rule 't'");
    assert!(matches!(err, ParserError::UnknownStartRule(name) if name == "t"));
}

#[test]
fn start_rule_resolution_is_case_insensitive() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    assert!(parser
        .parse(&grammar, "S", &codes("aa"), &mut ())
        .expect("parse should run")
        .success);
}

#[test]
fn start_rule_can_be_selected_by_index() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    assert!(parser
        .parse(&grammar, 0usize, &codes("aa"), &mut ())
        .expect("parse should run")
        .success);
    let err = parser
        .parse(&grammar, 7usize, &codes("aa"), &mut ())
        .expect_err("index past the rule table");
    assert!(matches!(err, ParserError::StartRuleOutOfRange(7)));
}

#[test]
fn out_of_bounds_window_is_a_setup_error() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    let input = codes("aaa");
    let err = parser
        .parse_substring(&grammar, "s", &input, 2, 5, &mut ())
        .expect_err("the window exceeds the input");
    assert!(matches!(err, ParserError::WindowOutOfBounds { .. }));
}

#[test]
fn substring_parse_reports_the_window() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    let input = codes("xaay");
    let outcome = parser
        .parse_substring(&grammar, "s", &input, 1, 2, &mut ())
        .expect("parse should run");
    assert!(outcome.success);
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.length, 2);
    assert_eq!(outcome.input_length, 4);
    assert_eq!(outcome.sub_begin, 1);
    assert_eq!(outcome.sub_end, 3);
    assert_eq!(outcome.sub_length, 2);
    assert_eq!(outcome.max_matched, 3);
}

#[test]
fn parse_str_converts_to_code_points() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    assert!(parser
        .parse_str(&grammar, "s", "aa", &mut ())
        .expect("parse should run")
        .success);
    assert_eq!(codes_from_str("ab"), vec![0x61, 0x62]);
}

#[test]
fn child_index_out_of_range_is_rejected() {
    let grammar = grammar(vec![rule(0, "s", vec![alt(vec![5]), tls("a")])]);
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "s", &codes("a"), &mut ())
        .expect_err("the alternation points past the opcode list");
    assert!(matches!(
        err,
        ParserError::Grammar(GrammarError::ChildOutOfRange { .. })
    ));
}

#[test]
fn childless_alternation_is_rejected() {
    let grammar = grammar(vec![rule(0, "s", vec![alt(vec![]), tls("a")])]);
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "s", &codes("a"), &mut ())
        .expect_err("an alternation needs children");
    assert!(matches!(
        err,
        ParserError::Grammar(GrammarError::NoChildren { .. })
    ));
}

#[test]
fn unfolded_tls_is_rejected() {
    let grammar = grammar(vec![rule(0, "s", vec![Opcode::Tls { codes: vec![0x41] }])]);
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "s", &codes("a"), &mut ())
        .expect_err("TLS bytes must arrive folded");
    assert!(matches!(
        err,
        ParserError::Grammar(GrammarError::TlsNotFolded { .. })
    ));
}

#[test]
fn zero_length_tbs_is_rejected() {
    let grammar = grammar(vec![rule(0, "s", vec![Opcode::Tbs { codes: vec![] }])]);
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "s", &codes("a"), &mut ())
        .expect_err("TBS terminals cannot be empty");
    assert!(matches!(
        err,
        ParserError::Grammar(GrammarError::EmptyTerminal { .. })
    ));
}

#[test]
fn misnumbered_rule_table_is_rejected() {
    let grammar = Grammar::new(vec![rule(3, "s", vec![tls("a")])], Vec::new());
    let mut parser: Parser = Parser::new();
    let err = parser
        .parse(&grammar, "s", &codes("a"), &mut ())
        .expect_err("rule index must match its table position");
    assert!(matches!(
        err,
        ParserError::Grammar(GrammarError::IndexMismatch { .. })
    ));
}

#[test]
fn grammar_objects_round_trip_through_json() {
    let grammar = Grammar::new(
        vec![
            rule(
                0,
                "s",
                vec![cat(vec![1, 2]), rnm(1), tls("b")],
            ),
            rule(1, "a", vec![alt(vec![1, 2]), tls("x"), tls("y")]),
        ],
        Vec::new(),
    );
    let json = serde_json::to_string(&grammar).expect("grammar serializes");
    let decoded: Grammar = serde_json::from_str(&json).expect("grammar deserializes");
    assert_eq!(grammar, decoded);

    let mut parser: Parser = Parser::new();
    assert!(parser
        .parse(&decoded, "s", &codes("xb"), &mut ())
        .expect("parse should run")
        .success);
}

#[test]
fn unknown_rule_callback_target_is_a_setup_error() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    parser.set_rule_callback("nosuchrule", |_ctx| Ok(()));
    let err = parser
        .parse(&grammar, "s", &codes("aa"), &mut ())
        .expect_err("the callback names an unknown rule");
    assert!(matches!(err, ParserError::Callback(_)));
}

#[test]
fn unknown_ast_node_is_a_setup_error() {
    let grammar = double_a_grammar();
    let mut parser: Parser = Parser::new();
    parser.enable_ast_node("nosuchrule");
    let err = parser
        .parse(&grammar, "s", &codes("aa"), &mut ())
        .expect_err("the AST selection names an unknown rule");
    assert!(matches!(err, ParserError::Ast(_)));
}
