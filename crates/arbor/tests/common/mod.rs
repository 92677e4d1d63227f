//! Shared fixture: a small Groovy-flavored script language exercising
//! precedence, fields, hidden and supertype rules, keywords, trivia, and a
//! declared block-versus-closure ambiguity.

use arbor::compile::Language;
use arbor::grammar::{dsl::*, Grammar, GrammarBuilder, RuleExpr};
use arbor::lexer::{CharSet, Pattern};
use std::sync::Arc;

fn expr() -> RuleExpr {
    sym("_expression")
}

fn identifier_pattern() -> Pattern {
    Pattern::seq([
        Pattern::class(CharSet::word_start()),
        Pattern::repeat(Pattern::class(CharSet::word_continue())),
    ])
}

fn number_pattern() -> Pattern {
    Pattern::seq([
        Pattern::repeat1(Pattern::class(CharSet::digits())),
        Pattern::optional(Pattern::seq([
            Pattern::lit("."),
            Pattern::repeat1(Pattern::class(CharSet::digits())),
        ])),
    ])
}

#[must_use]
pub fn script_grammar() -> Grammar {
    GrammarBuilder::new("script")
        .rule("program", repeat(sym("_statement")))
        .rule(
            "_statement",
            choice([
                sym("expression_statement"),
                sym("assignment"),
                sym("if_statement"),
                sym("block"),
            ]),
        )
        .rule(
            "expression_statement",
            seq([expr(), optional(lit(";"))]),
        )
        .rule(
            "assignment",
            seq([
                field("left", sym("identifier")),
                lit("="),
                field("right", expr()),
                optional(lit(";")),
            ]),
        )
        .rule(
            "if_statement",
            prec_right(
                0,
                seq([
                    lit("if"),
                    lit("("),
                    field("condition", expr()),
                    lit(")"),
                    field("consequence", sym("_statement")),
                    optional(seq([
                        lit("else"),
                        field("alternative", sym("_statement")),
                    ])),
                ]),
            ),
        )
        .rule(
            "block",
            prec_dynamic(1, seq([lit("{"), repeat(sym("_statement")), lit("}")])),
        )
        .rule(
            "_expression",
            choice([
                sym("binary_expression"),
                sym("identifier"),
                sym("number"),
                sym("string"),
                sym("list"),
                sym("map"),
                sym("closure"),
                sym("parenthesized_expression"),
            ]),
        )
        .rule(
            "binary_expression",
            choice([
                prec_left(1, seq([field("left", expr()), lit("+"), field("right", expr())])),
                prec_left(1, seq([field("left", expr()), lit("-"), field("right", expr())])),
                prec_left(2, seq([field("left", expr()), lit("*"), field("right", expr())])),
                prec_left(2, seq([field("left", expr()), lit("/"), field("right", expr())])),
                prec_right(3, seq([field("left", expr()), lit("**"), field("right", expr())])),
            ]),
        )
        .rule(
            "parenthesized_expression",
            seq([lit("("), expr(), lit(")")]),
        )
        .rule(
            "closure",
            seq([
                lit("{"),
                optional(seq([
                    field("parameters", sym("parameter_list")),
                    lit("->"),
                ])),
                repeat(sym("_statement")),
                lit("}"),
            ]),
        )
        .rule("parameter_list", sep1(sym("identifier"), lit(",")))
        .rule(
            "list",
            seq([lit("["), sep(expr(), lit(",")), lit("]")]),
        )
        .rule(
            "map",
            seq([
                lit("["),
                choice([sep1(sym("map_entry"), lit(",")), lit(":")]),
                lit("]"),
            ]),
        )
        .rule(
            "map_entry",
            seq([
                field("key", sym("identifier")),
                lit(":"),
                field("value", expr()),
            ]),
        )
        .rule("identifier", pattern(identifier_pattern()))
        .rule("number", pattern(number_pattern()))
        // Longest match picks the triple-quoted form when both delimiters
        // apply at the same offset.
        .rule(
            "string",
            choice([
                seq([
                    lit("\"\"\""),
                    pattern(Pattern::until("\"\"\"", Some('\\'))),
                    lit("\"\"\""),
                ]),
                seq([
                    lit("\""),
                    pattern(Pattern::until("\"", Some('\\'))),
                    lit("\""),
                ]),
            ]),
        )
        .extra(pattern(Pattern::repeat1(Pattern::class(CharSet::whitespace()))))
        .extra(pattern(Pattern::seq([
            Pattern::lit("//"),
            Pattern::until("\n", None),
        ])))
        .extra(pattern(Pattern::seq([
            Pattern::lit("/*"),
            Pattern::until("*/", None),
            Pattern::lit("*/"),
        ])))
        .word("identifier")
        .supertype("_expression")
        .conflict(["block", "closure"])
        .build()
        .expect("fixture grammar builds")
}

#[must_use]
pub fn script_language() -> Arc<Language> {
    Language::compile(&script_grammar()).expect("fixture language compiles")
}
