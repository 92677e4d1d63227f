//! Incremental reparse tests: equivalence with full parses and verbatim
//! subtree reuse.

mod common;

use arbor::incremental::IncrementalParser;
use arbor::parser::Parser;
use arbor::syntax::{GreenElement, GreenNode, Kind, TextEdit, TextRange, TextSize};
use std::sync::Arc;

fn edit(start: u32, old_end: u32, new_end: u32) -> TextEdit {
    TextEdit::new(
        TextSize::from(start),
        TextSize::from(old_end),
        TextSize::from(new_end),
    )
}

/// Collect every green descendant node of `kind`, depth first.
fn nodes_of_kind(root: &Arc<GreenNode>, kind: Kind, out: &mut Vec<Arc<GreenNode>>) {
    if root.kind() == kind {
        out.push(Arc::clone(root));
    }
    for child in root.children() {
        if let GreenElement::Node(node) = &child.element {
            nodes_of_kind(node, kind, out);
        }
    }
}

#[test]
fn incremental_parse_matches_full_parse() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language);

    let old_source = "x = 1 + 2 * 3;";
    let old = full.parse(old_source).expect("full parse");

    // Replace `x` with `total`.
    let new_source = "total = 1 + 2 * 3;";
    let output = incremental
        .parse_incremental(new_source, &old.tree, &[edit(0, 1, 5)])
        .expect("incremental parse");

    let reference = full.parse(new_source).expect("full parse of edited text");
    assert_eq!(output.tree.text(), new_source);
    assert_eq!(output.tree.to_sexp(), reference.tree.to_sexp());
    assert!(output.diagnostics.is_empty());
}

#[test]
fn unchanged_subtrees_are_reused_by_reference() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language.clone());

    let old = full.parse("x = 1 + 2 * 3;").expect("full parse");
    let output = incremental
        .parse_incremental("y = 1 + 2 * 3;", &old.tree, &[edit(0, 1, 1)])
        .expect("incremental parse");

    let binary = language.kind("binary_expression").expect("kind exists");
    let mut old_nodes = Vec::new();
    let mut new_nodes = Vec::new();
    nodes_of_kind(old.tree.green_root(), binary, &mut old_nodes);
    nodes_of_kind(output.tree.green_root(), binary, &mut new_nodes);

    // The edit only touched the assignment target; at least the `2 * 3`
    // subtree must be shared verbatim with the previous tree.
    let shared = new_nodes.iter().any(|new| {
        old_nodes.iter().any(|old| Arc::ptr_eq(old, new))
    });
    assert!(shared, "no green subtree was reused across the edit");
}

#[test]
fn statements_after_the_edit_are_reused() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language.clone());

    let old = full.parse("a = 1;\nb = 2;\nc = 3;").expect("full parse");
    let new_source = "a = 9;\nb = 2;\nc = 3;";
    let output = incremental
        .parse_incremental(new_source, &old.tree, &[edit(4, 5, 5)])
        .expect("incremental parse");

    let assignment = language.kind("assignment").expect("kind exists");
    let mut old_nodes = Vec::new();
    let mut new_nodes = Vec::new();
    nodes_of_kind(old.tree.green_root(), assignment, &mut old_nodes);
    nodes_of_kind(output.tree.green_root(), assignment, &mut new_nodes);
    assert_eq!(old_nodes.len(), 3);
    assert_eq!(new_nodes.len(), 3);

    let shared = new_nodes
        .iter()
        .filter(|new| old_nodes.iter().any(|old| Arc::ptr_eq(old, new)))
        .count();
    assert!(shared >= 1, "expected later statements to be reused");
    assert_eq!(output.tree.text(), new_source);
}

#[test]
fn editing_the_right_operand_keeps_the_left_subtree() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language.clone());

    let old = full.parse("x = a * b + c;").expect("full parse");
    // Replace `c` with `d`.
    let new_source = "x = a * b + d;";
    let output = incremental
        .parse_incremental(new_source, &old.tree, &[edit(12, 13, 13)])
        .expect("incremental parse");

    let binary = language.kind("binary_expression").expect("kind exists");
    let mut old_nodes = Vec::new();
    let mut new_nodes = Vec::new();
    nodes_of_kind(old.tree.green_root(), binary, &mut old_nodes);
    nodes_of_kind(output.tree.green_root(), binary, &mut new_nodes);

    // `a * b` sits left of the edit and must be carried over verbatim.
    let shared = new_nodes
        .iter()
        .any(|new| old_nodes.iter().any(|old| Arc::ptr_eq(old, new)));
    assert!(shared, "left operand subtree was not reused");

    assert_eq!(output.tree.text(), new_source);
    let reference = full.parse(new_source).expect("full parse of edited text");
    assert_eq!(output.tree.to_sexp(), reference.tree.to_sexp());
}

#[test]
fn edits_near_a_subtree_invalidate_it() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language);

    let old = full.parse("a = 1;").expect("full parse");
    // Replace the whole statement.
    let output = incremental
        .parse_incremental("b = 2;", &old.tree, &[edit(0, 6, 6)])
        .expect("incremental parse");
    assert_eq!(
        output.tree.to_sexp(),
        "(program (assignment left: (identifier) right: (number)))"
    );
}

#[test]
fn whole_source_cache_returns_identical_results() {
    let mut incremental = IncrementalParser::new(common::script_language());
    let first = incremental.parse("1 + 2;").expect("parse");
    let second = incremental.parse("1 + 2;").expect("cached parse");
    assert!(Arc::ptr_eq(first.tree.green_root(), second.tree.green_root()));
}

#[test]
fn incremental_parse_with_errors_matches_full_parse() {
    let language = common::script_language();
    let full = Parser::new(language.clone());
    let mut incremental = IncrementalParser::new(language);

    let old = full.parse("x = 1;\ny = @;").expect("full parse");
    let new_source = "x = 2;\ny = @;";
    let output = incremental
        .parse_incremental(new_source, &old.tree, &[edit(4, 5, 5)])
        .expect("incremental parse");
    let reference = full.parse(new_source).expect("full parse of edited text");

    assert_eq!(output.tree.text(), new_source);
    assert_eq!(output.tree.to_sexp(), reference.tree.to_sexp());
    assert_eq!(output.diagnostics.len(), reference.diagnostics.len());
}

#[test]
fn edit_ranges_map_between_text_versions() {
    let e = TextEdit::replace(
        TextRange::new(TextSize::from(2), TextSize::from(5)),
        TextSize::from(1),
    );
    assert_eq!(e.damaged_range(), TextRange::new(TextSize::from(2), TextSize::from(3)));
    assert_eq!(e.map_old_offset(TextSize::from(1)), TextSize::from(1));
    assert_eq!(e.map_old_offset(TextSize::from(8)), TextSize::from(6));
}
