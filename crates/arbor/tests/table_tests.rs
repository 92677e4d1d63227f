//! Table-compilation tests: conflict resolution and the compiled
//! language's reflection surface.

mod common;

use arbor::compile::Language;
use arbor::error::CompileError;
use arbor::grammar::{dsl::*, GrammarBuilder};
use arbor::lexer::{CharSet, Pattern};
use arbor::parser::Parser;

fn number() -> arbor::grammar::RuleExpr {
    pattern(Pattern::repeat1(Pattern::class(CharSet::digits())))
}

#[test]
fn fixture_language_compiles() {
    let language = common::script_language();
    assert_eq!(language.name(), "script");
    assert!(!language.states().is_empty());
    assert!(language.kind("binary_expression").is_some());
    assert!(language.kind("no_such_kind").is_none());
    assert!(language.field("left").is_some());
    assert!(language.field("no_such_field").is_none());
}

#[test]
fn unannotated_shift_reduce_conflict_fails_compilation() {
    let grammar = GrammarBuilder::new("ambiguous")
        .rule(
            "expression",
            choice([
                seq([sym("expression"), lit("+"), sym("expression")]),
                sym("number"),
            ]),
        )
        .rule("number", number())
        .build()
        .unwrap();

    let err = Language::compile(&grammar).unwrap_err();
    let CompileError::UnresolvedConflict { productions, .. } = err else {
        panic!("expected an unresolved conflict, got {err:?}");
    };
    assert!(productions.contains(&"expression".to_string()));
}

#[test]
fn undeclared_reduce_reduce_conflict_fails_compilation() {
    let grammar = GrammarBuilder::new("ambiguous")
        .rule("program", choice([sym("alpha"), sym("beta")]))
        .rule("alpha", field("value", sym("number")))
        .rule("beta", field("value", sym("number")))
        .rule("number", number())
        .build()
        .unwrap();

    let err = Language::compile(&grammar).unwrap_err();
    let CompileError::UnresolvedConflict { productions, .. } = err else {
        panic!("expected an unresolved conflict, got {err:?}");
    };
    assert_eq!(productions, vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn declared_conflict_forks_and_dynamic_precedence_decides() {
    let grammar = GrammarBuilder::new("ambiguous")
        .rule("program", choice([sym("alpha"), sym("beta")]))
        .rule("alpha", field("value", sym("number")))
        .rule("beta", prec_dynamic(1, field("value", sym("number"))))
        .rule("number", number())
        .conflict(["alpha", "beta"])
        .build()
        .unwrap();

    let language = Language::compile(&grammar).expect("declared conflict compiles");
    let output = Parser::new(language).parse("42").expect("parse completes");
    assert_eq!(output.tree.to_sexp(), "(program (beta value: (number)))");
    assert!(output.diagnostics.is_empty());
}

#[test]
fn precedence_annotations_resolve_conflicts_statically() {
    let grammar = GrammarBuilder::new("arith")
        .rule(
            "expression",
            choice([
                prec_left(1, seq([sym("expression"), lit("+"), sym("expression")])),
                sym("number"),
            ]),
        )
        .rule("number", number())
        .build()
        .unwrap();
    assert!(Language::compile(&grammar).is_ok());
}

#[test]
fn expected_terminals_describe_a_state() {
    let language = common::script_language();
    // State 0 is the start of a statement.
    let expected = language.expected_terminals(0);
    assert!(expected.contains(&"identifier".to_string()));
    assert!(expected.contains(&"number".to_string()));
    assert!(expected.contains(&"\"if\"".to_string()));
    assert!(expected.contains(&"end of file".to_string()));
}

#[test]
fn kind_names_round_trip() {
    let language = common::script_language();
    for name in ["program", "if_statement", "map_entry", "identifier"] {
        let kind = language.kind(name).expect("kind exists");
        assert_eq!(language.kind_name(kind), name);
    }
}

#[test]
fn terminals_and_nonterminals_partition_the_symbol_space() {
    let language = common::script_language();
    let count = u16::try_from(language.symbol_count()).unwrap();
    for raw in 0..count {
        let id = arbor::compile::SymbolId::new(raw);
        let info = language.symbol(id);
        assert_eq!(language.is_terminal(id), info.terminal, "symbol {}", info.name);
    }
    assert!(language.is_terminal(language.eof()));
}
