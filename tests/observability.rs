//! AST construction and rollback, trace recording, statistics, safety caps.

mod common;

use common::*;
use sabnf_runtime::ast::{AstNode, AstPhase, TranslateAction};
use sabnf_runtime::evaluator::ParseError;
use sabnf_runtime::grammar::{Grammar, Opcode, OperatorKind};
use sabnf_runtime::limits::ParseLimits;
use sabnf_runtime::parser::{Parser, ParserConfig, ParserError};
use sabnf_runtime::stats::Stats;
use sabnf_runtime::system::{Direction, LookAroundKind, PhraseState};
use sabnf_runtime::trace::{KeepPolicy, OperatorFilter, RuleFilter, Trace};

fn pair_grammar() -> Grammar {
    // s = a a; a = "x" / "y"
    Grammar::new(
        vec![
            rule(0, "s", vec![cat(vec![1, 2]), rnm(1), rnm(1)]),
            rule(1, "a", vec![alt(vec![1, 2]), tls("x"), tls("y")]),
        ],
        Vec::new(),
    )
}

#[test]
fn ast_records_nest_and_pair() {
    let grammar = pair_grammar();
    let mut parser: Parser = Parser::new();
    parser.enable_ast_node("s");
    parser.enable_ast_node("a");
    let outcome = parser
        .parse(&grammar, "s", &codes("xy"), &mut ())
        .expect("parse should run");
    assert!(outcome.success);

    let records = parser.ast().expect("ast attached").records();
    assert_eq!(records.len(), 6);

    let root = &records[0];
    assert_eq!(root.direction, Direction::Down);
    assert_eq!(root.name, "s");
    assert_eq!(root.paired, Some(5));
    assert_eq!(root.phrase_length, 2);
    assert_eq!(root.state, PhraseState::Match);

    let first = &records[1];
    assert_eq!(first.name, "a");
    assert_eq!(first.phrase_index, 0);
    assert_eq!(first.phrase_length, 1);
    assert_eq!(first.paired, Some(2));

    let second = &records[3];
    assert_eq!(second.phrase_index, 1);
    assert_eq!(second.paired, Some(4));

    assert_eq!(records[5].direction, Direction::Up);
    assert_eq!(records[5].paired, Some(0));
}

#[test]
fn failed_branch_leaves_no_trace_in_the_ast() {
    // s = (a "b") / (a "c"); a = "a". The first branch records an `a`
    // node, fails on "b", and must roll the record back.
    let with_failing_branch = Grammar::new(
        vec![
            rule(
                0,
                "s",
                vec![
                    alt(vec![1, 4]),
                    cat(vec![2, 3]),
                    rnm(1),
                    tls("b"),
                    cat(vec![5, 6]),
                    rnm(1),
                    tls("c"),
                ],
            ),
            rule(1, "a", vec![tls("a")]),
        ],
        Vec::new(),
    );
    let straight = Grammar::new(
        vec![
            rule(0, "s", vec![cat(vec![1, 2]), rnm(1), tls("c")]),
            rule(1, "a", vec![tls("a")]),
        ],
        Vec::new(),
    );

    let mut with_branch_parser: Parser = Parser::new();
    with_branch_parser.enable_ast_node("a");
    assert!(with_branch_parser
        .parse(&with_failing_branch, "s", &codes("ac"), &mut ())
        .expect("parse should run")
        .success);

    let mut straight_parser: Parser = Parser::new();
    straight_parser.enable_ast_node("a");
    assert!(straight_parser
        .parse(&straight, "s", &codes("ac"), &mut ())
        .expect("parse should run")
        .success);

    assert_eq!(
        with_branch_parser.ast().expect("ast attached").records(),
        straight_parser.ast().expect("ast attached").records(),
    );
}

type Log = Vec<String>;

fn collect(phase: AstPhase, node: &AstNode<'_>, data: &mut Log) -> TranslateAction {
    let phase = match phase {
        AstPhase::Pre => "pre",
        AstPhase::Post => "post",
    };
    data.push(format!(
        "{phase} {} {}+{}",
        node.name, node.phrase_index, node.phrase_length
    ));
    TranslateAction::Continue
}

fn collect_and_skip(phase: AstPhase, node: &AstNode<'_>, data: &mut Log) -> TranslateAction {
    collect(phase, node, data);
    TranslateAction::SkipSubtree
}

#[test]
fn translate_walks_retained_nodes_in_order() {
    let grammar = pair_grammar();
    let mut parser: Parser<Log> = Parser::new();
    parser.set_ast_node("s", collect);
    parser.set_ast_node("a", collect);
    let input = codes("xy");
    let mut log = Log::new();
    parser
        .parse(&grammar, "s", &input, &mut log)
        .expect("parse should run");
    parser.ast().expect("ast attached").translate(&input, &mut log);
    assert_eq!(
        log,
        vec![
            "pre s 0+2".to_owned(),
            "pre a 0+1".to_owned(),
            "post a 0+1".to_owned(),
            "pre a 1+1".to_owned(),
            "post a 1+1".to_owned(),
            "post s 0+2".to_owned(),
        ]
    );
}

#[test]
fn skip_subtree_jumps_to_the_matching_up_event() {
    let grammar = pair_grammar();
    let mut parser: Parser<Log> = Parser::new();
    parser.set_ast_node("s", collect_and_skip);
    parser.set_ast_node("a", collect);
    let input = codes("xy");
    let mut log = Log::new();
    parser
        .parse(&grammar, "s", &input, &mut log)
        .expect("parse should run");
    parser.ast().expect("ast attached").translate(&input, &mut log);
    assert_eq!(log, vec!["pre s 0+2".to_owned(), "post s 0+2".to_owned()]);
}

fn alternation_grammar() -> Grammar {
    grammar(vec![rule(0, "s", vec![alt(vec![1, 2]), tls("ab"), tls("ac")])])
}

#[test]
fn default_filters_trace_rule_nodes_only() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    parser.attach_trace(Trace::new());
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.dropped, 0);
    assert_eq!(report.records[0].operator, OperatorKind::Rnm);
    assert_eq!(report.records[0].direction, Direction::Down);
    assert_eq!(report.records[0].paired_line, Some(1));
    assert_eq!(report.records[1].direction, Direction::Up);
    assert_eq!(report.records[1].state, PhraseState::Match);
}

#[test]
fn trace_shows_the_failed_alternative_before_the_match() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::new();
    trace.set_operator_filter(OperatorFilter::All);
    parser.attach_trace(trace);
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    // RNM + ALT + two TLS attempts, down and up each.
    assert_eq!(report.records.len(), 8);
    let tls_ups: Vec<_> = report
        .records
        .iter()
        .filter(|record| {
            record.operator == OperatorKind::Tls && record.direction == Direction::Up
        })
        .collect();
    assert_eq!(tls_ups.len(), 2);
    assert_eq!(tls_ups[0].state, PhraseState::Nomatch);
    assert_eq!(tls_ups[1].state, PhraseState::Match);
    assert!(tls_ups[0].this_line < tls_ups[1].this_line);
}

#[test]
fn ring_keeps_the_newest_records_with_consistent_pairing() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::with_capacity(4);
    trace.set_operator_filter(OperatorFilter::All);
    parser.attach_trace(trace);
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    assert_eq!(report.total, 8);
    assert_eq!(report.records.len(), 4);
    assert_eq!(report.dropped, 4);
    // The newest four lines survive.
    let lines: Vec<usize> = report.records.iter().map(|record| record.this_line).collect();
    assert_eq!(lines, vec![4, 5, 6, 7]);
    for record in &report.records {
        match record.direction {
            Direction::Up => {
                let paired = record.paired_line.expect("up events always know their down line");
                assert!(paired < record.this_line);
            }
            Direction::Down => {
                if let Some(paired) = record.paired_line {
                    assert!(paired > record.this_line);
                }
            }
        }
    }
}

#[test]
fn keep_first_policy_stops_recording_at_capacity() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::with_capacity(4);
    trace.set_operator_filter(OperatorFilter::All);
    trace.set_keep_policy(KeepPolicy::First);
    parser.attach_trace(trace);
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    assert_eq!(report.records.len(), 4);
    let lines: Vec<usize> = report.records.iter().map(|record| record.this_line).collect();
    assert_eq!(lines, vec![0, 1, 2, 3]);
    // The root down event's up partner fell past the cutoff.
    assert_eq!(report.records[0].paired_line, None);
}

#[test]
fn lookaround_context_is_recorded() {
    let grammar = grammar(vec![rule(
        0,
        "s",
        vec![cat(vec![1, 3]), Opcode::And, tls("x"), tls("xy")],
    )]);
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::new();
    trace.set_operator_filter(OperatorFilter::All);
    parser.attach_trace(trace);
    parser
        .parse(&grammar, "s", &codes("xy"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    assert!(report
        .records
        .iter()
        .any(|record| record.look_kind == LookAroundKind::Ahead && record.look_anchor == 0));
}

#[test]
fn explicit_rule_filter_narrows_the_trace() {
    let grammar = pair_grammar();
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::new();
    trace.set_rule_filter(RuleFilter::Only(["a".to_owned()].into_iter().collect()));
    parser.attach_trace(trace);
    parser
        .parse(&grammar, "s", &codes("xy"), &mut ())
        .expect("parse should run");

    let report = parser.trace().expect("trace attached").emit();
    // Two invocations of `a`, down and up each; `s` is filtered out.
    assert_eq!(report.records.len(), 4);
    assert!(report
        .records
        .iter()
        .all(|record| record.name.as_deref() == Some("a")));
}

#[test]
fn unknown_rule_in_the_trace_filter_is_a_setup_error() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    let mut trace = Trace::new();
    trace.set_rule_filter(RuleFilter::Only(
        ["nosuchrule".to_owned()].into_iter().collect(),
    ));
    parser.attach_trace(trace);
    let err = parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect_err("the filter names an unknown rule");
    assert!(matches!(err, ParserError::Trace(_)));
}

#[test]
fn stats_count_every_outcome() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    parser.attach_stats(Stats::new());
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");

    let stats = parser.stats().expect("stats attached");
    let tls = stats.operator(OperatorKind::Tls);
    assert_eq!(tls.total, 2);
    assert_eq!(tls.matched, 1);
    assert_eq!(tls.nomatch, 1);
    assert_eq!(stats.operator(OperatorKind::Alt).matched, 1);
    assert_eq!(stats.operator(OperatorKind::Rnm).total, 1);
    assert_eq!(stats.operator(OperatorKind::Trg).total, 0);
    assert_eq!(stats.rule("S").matched, 1);
    assert_eq!(stats.total().total, 4);
}

#[test]
fn stats_are_reset_between_parses() {
    let grammar = alternation_grammar();
    let mut parser: Parser = Parser::new();
    parser.attach_stats(Stats::new());
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");
    let first = parser.stats().expect("stats attached").total().total;
    parser
        .parse(&grammar, "s", &codes("ac"), &mut ())
        .expect("parse should run");
    let second = parser.stats().expect("stats attached").total().total;
    assert_eq!(first, second);
}

fn capped_parser(limits: ParseLimits) -> Parser {
    Parser::with_config(ParserConfig { limits })
}

#[test]
fn outcome_reports_node_hits_and_depth() {
    let grammar = grammar(vec![rule(0, "s", vec![rep(2, Some(3)), tls("a")])]);
    let mut parser: Parser = Parser::new();
    let outcome = parser
        .parse(&grammar, "s", &codes("aa"), &mut ())
        .expect("parse should run");
    assert!(outcome.success);
    // RNM, REP, and three TLS attempts.
    assert_eq!(outcome.node_hits, 5);
    assert_eq!(outcome.max_tree_depth, 3);
}

#[test]
fn node_hit_cap_aborts_the_parse() {
    let grammar = grammar(vec![rule(0, "s", vec![rep(2, Some(3)), tls("a")])]);
    let mut parser = capped_parser(ParseLimits {
        max_node_hits: Some(4),
        max_tree_depth: None,
    });
    let err = parser
        .parse(&grammar, "s", &codes("aa"), &mut ())
        .expect_err("the parse needs five node hits");
    assert!(matches!(err, ParserError::Parse(ParseError::Limit(_))));
}

#[test]
fn tree_depth_cap_aborts_the_parse() {
    let grammar = grammar(vec![rule(0, "s", vec![rep(2, Some(3)), tls("a")])]);
    let mut parser = capped_parser(ParseLimits {
        max_node_hits: None,
        max_tree_depth: Some(2),
    });
    let err = parser
        .parse(&grammar, "s", &codes("aa"), &mut ())
        .expect_err("the parse tree is three levels deep");
    assert!(matches!(err, ParserError::Parse(ParseError::Limit(_))));
}
