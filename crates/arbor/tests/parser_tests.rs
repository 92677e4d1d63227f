//! End-to-end parse tests over the shared script fixture.

mod common;

use arbor::error::DiagnosticKind;
use arbor::parser::Parser;

fn parse(source: &str) -> (String, usize) {
    let parser = Parser::new(common::script_language());
    let output = parser.parse(source).expect("parse completes");
    assert_eq!(output.tree.text(), source, "trees are lossless");
    (output.tree.to_sexp(), output.diagnostics.len())
}

fn sexp(source: &str) -> String {
    let (sexp, diagnostics) = parse(source);
    assert_eq!(diagnostics, 0, "unexpected diagnostics for {source:?}");
    sexp
}

#[test]
fn empty_input() {
    assert_eq!(sexp(""), "(program)");
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
        sexp("1 + 2 * 3"),
        "(program (expression_statement (binary_expression \
         left: (number) \
         right: (binary_expression left: (number) right: (number)))))"
    );
}

#[test]
fn addition_is_left_associative() {
    assert_eq!(
        sexp("1 + 2 + 3"),
        "(program (expression_statement (binary_expression \
         left: (binary_expression left: (number) right: (number)) \
         right: (number))))"
    );
}

#[test]
fn power_is_right_associative() {
    assert_eq!(
        sexp("a ** b ** c"),
        "(program (expression_statement (binary_expression \
         left: (identifier) \
         right: (binary_expression left: (identifier) right: (identifier)))))"
    );
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(
        sexp("(1 + 2) * 3"),
        "(program (expression_statement (binary_expression \
         left: (parenthesized_expression (binary_expression \
         left: (number) right: (number))) \
         right: (number))))"
    );
}

#[test]
fn else_attaches_to_the_nearest_if() {
    assert_eq!(
        sexp("if (a) if (b) c else d"),
        "(program (if_statement condition: (identifier) \
         consequence: (if_statement condition: (identifier) \
         consequence: (expression_statement (identifier)) \
         alternative: (expression_statement (identifier)))))"
    );
}

#[test]
fn assignment_with_fields() {
    assert_eq!(
        sexp("x = 1 + 2;"),
        "(program (assignment left: (identifier) \
         right: (binary_expression left: (number) right: (number))))"
    );
}

#[test]
fn statements_sequence_with_and_without_semicolons() {
    assert_eq!(
        sexp("a; b\nc;"),
        "(program (expression_statement (identifier)) \
         (expression_statement (identifier)) \
         (expression_statement (identifier)))"
    );
}

#[test]
fn comments_and_whitespace_are_trivia() {
    let source = "a // line\n/* block */ b";
    assert_eq!(
        sexp(source),
        "(program (expression_statement (identifier)) \
         (expression_statement (identifier)))"
    );
}

#[test]
fn keyword_must_not_split_an_identifier() {
    // `ifx` is one identifier, not the keyword `if` followed by `x`.
    assert_eq!(sexp("ifx"), "(program (expression_statement (identifier)))");
}

#[test]
fn list_and_map_literals() {
    assert_eq!(
        sexp("[1, 2, 3]"),
        "(program (expression_statement (list (number) (number) (number))))"
    );
    assert_eq!(
        sexp("[a: 1, b: 2]"),
        "(program (expression_statement (map \
         (map_entry key: (identifier) value: (number)) \
         (map_entry key: (identifier) value: (number)))))"
    );
    assert_eq!(sexp("[]"), "(program (expression_statement (list)))");
    assert_eq!(sexp("[:]"), "(program (expression_statement (map)))");
}

#[test]
fn string_literals_lex_as_single_tokens() {
    assert_eq!(
        sexp("\"a + b\" + c"),
        "(program (expression_statement (binary_expression \
         left: (string) right: (identifier))))"
    );
}

#[test]
fn triple_quoted_strings_win_over_single_quotes() {
    // Both delimiters apply at the opening quote; the longer one must win.
    assert_eq!(
        sexp("x = \"\"\"say \"hi\" twice\"\"\";"),
        "(program (assignment left: (identifier) right: (string)))"
    );
    assert_eq!(
        sexp("\"\" + \"\"\"\"\"\""),
        "(program (expression_statement (binary_expression \
         left: (string) right: (string))))"
    );
}

#[test]
fn truncated_else_keyword_parses_the_rest_cleanly() {
    // `el` is an ordinary identifier, so the truncated source is a complete
    // if statement followed by an expression statement, with no errors.
    assert_eq!(
        sexp("if (x) { y } el"),
        "(program (if_statement condition: (identifier) \
         consequence: (block (expression_statement (identifier)))) \
         (expression_statement (identifier)))"
    );
}

#[test]
fn braces_at_statement_level_prefer_block() {
    // `{ 1 }` is ambiguous between a block and a parameterless closure; the
    // declared conflict forks the parse and dynamic precedence picks block.
    assert_eq!(
        sexp("{ 1 }"),
        "(program (block (expression_statement (number))))"
    );
    assert_eq!(sexp("{}"), "(program (block))");
}

#[test]
fn brace_statement_with_identifier_body_stays_a_block() {
    // `y` must lex as an identifier token here, not as the start of a
    // closure parameter list; the fork over the declared conflict settles
    // the rest.
    assert_eq!(
        sexp("{ y }"),
        "(program (block (expression_statement (identifier))))"
    );
}

#[test]
fn braces_in_expression_position_are_closures() {
    assert_eq!(
        sexp("x = { 1 }"),
        "(program (assignment left: (identifier) right: (closure \
         (expression_statement (number)))))"
    );
}

#[test]
fn closure_with_parameters() {
    assert_eq!(
        sexp("x = { a, b -> a + b }"),
        "(program (assignment left: (identifier) right: (closure \
         parameters: (parameter_list (identifier) (identifier)) \
         (expression_statement (binary_expression \
         left: (identifier) right: (identifier))))))"
    );
}

#[test]
fn missing_operand_is_fabricated() {
    let parser = Parser::new(common::script_language());
    let output = parser.parse("1 + ;").expect("parse completes");
    assert_eq!(output.tree.text(), "1 + ;");
    assert!(output.tree.has_error());
    assert!(output.tree.to_sexp().contains("(MISSING)"));
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::Missing);
}

#[test]
fn unlexable_input_is_skipped_with_a_diagnostic() {
    let parser = Parser::new(common::script_language());
    let output = parser.parse("1 @ 2").expect("parse completes");
    assert_eq!(output.tree.text(), "1 @ 2");
    assert!(output.tree.has_error());
    assert!(output.tree.to_sexp().contains("(ERROR)"));
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].kind, DiagnosticKind::Unexpected);
    assert!(!output.diagnostics[0].expected.is_empty());
}

#[test]
fn garbage_only_input_still_produces_a_tree() {
    let parser = Parser::new(common::script_language());
    let output = parser.parse("@@@").expect("parse completes");
    assert_eq!(output.tree.text(), "@@@");
    assert!(output.tree.has_error());
    assert!(!output.diagnostics.is_empty());
}

#[test]
fn truncated_input_recovers_at_end_of_file() {
    let parser = Parser::new(common::script_language());
    let output = parser.parse("x = ").expect("parse completes");
    assert_eq!(output.tree.text(), "x = ");
    assert!(output.tree.has_error());
    assert!(output
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Missing));
}

#[test]
fn operation_budget_cancels_long_parses() {
    let parser = Parser::new(common::script_language()).with_operation_budget(3);
    let err = parser.parse("1 + 2 + 3 + 4 + 5").unwrap_err();
    assert!(matches!(err, arbor::error::ParseError::Cancelled { .. }));
}

#[test]
fn trailing_trivia_stays_in_the_tree() {
    let (rendered, diagnostics) = parse("a; // trailing\n");
    assert_eq!(rendered, "(program (expression_statement (identifier)))");
    assert_eq!(diagnostics, 0);
}

#[test]
fn supertype_membership_is_queryable() {
    let language = common::script_language();
    let parser = Parser::new(language.clone());
    let output = parser.parse("x = 1 + 2;").expect("parse completes");

    let expression = language.kind("_expression").expect("supertype kind");
    assert!(language.is_supertype(expression));

    let root = output.tree.root();
    let assignment = root
        .named_children()
        .next()
        .and_then(|el| el.as_node().copied())
        .expect("assignment node");
    let right = language.field("right").expect("right field exists");
    let value = assignment
        .child_by_field(right)
        .and_then(|el| el.as_node().copied())
        .expect("binary expression node");

    // The elided supertype still answers membership for the node that took
    // its place.
    assert!(language.is_supertype_of(expression, value.kind()));
    let members = language.supertype_members(expression);
    assert!(members.contains(&language.kind("closure").expect("closure kind")));
    assert!(!members.contains(&language.kind("program").expect("program kind")));
}

#[test]
fn field_lookup_through_the_red_tree() {
    let language = common::script_language();
    let parser = Parser::new(language.clone());
    let output = parser.parse("x = 1;").expect("parse completes");

    let root = output.tree.root();
    let assignment = root
        .named_children()
        .next()
        .and_then(|el| el.as_node().copied())
        .expect("assignment node");
    assert_eq!(
        language.kind_name(assignment.kind()),
        "assignment"
    );

    let left = language.field("left").expect("left field exists");
    let target = assignment.child_by_field(left).expect("left child");
    assert_eq!(target.as_token().expect("identifier token").text(), "x");
}
