//! Whole-grammar checks run once at build time.

use crate::error::CompileError;
use crate::grammar::builder::Grammar;
use crate::grammar::expr::RuleExpr;

pub(crate) fn validate(grammar: &Grammar) -> Result<(), CompileError> {
    if grammar.rules().is_empty() {
        return Err(CompileError::EmptyGrammar);
    }
    check_references(grammar)?;
    check_extras(grammar)?;
    check_word(grammar)?;
    check_flags(grammar)?;
    Ok(())
}

/// Every `Symbol` in every rule body and extra must name a defined rule.
fn check_references(grammar: &Grammar) -> Result<(), CompileError> {
    let mut refs = Vec::new();
    for rule in grammar.rules() {
        rule.body.referenced_rules(&mut refs);
    }
    for extra in grammar.extras() {
        extra.referenced_rules(&mut refs);
    }
    for name in refs {
        if grammar.resolve(&name).is_none() {
            return Err(CompileError::UndefinedRule(name.into()));
        }
    }
    Ok(())
}

/// Extras are lexed between tokens, so each must collapse to a terminal:
/// either a reference to a lexical rule or a character-level expression.
fn check_extras(grammar: &Grammar) -> Result<(), CompileError> {
    let lexical = |body: &RuleExpr| body.is_terminal_body(&|_| None);
    for extra in grammar.extras() {
        let ok = match extra {
            RuleExpr::Symbol(name) => grammar.resolve(name).is_some_and(lexical),
            other => lexical(other),
        };
        if !ok {
            let description = match extra {
                RuleExpr::Symbol(name) => name.to_string(),
                other => format!("{other:?}"),
            };
            return Err(CompileError::InvalidExtra(description));
        }
    }
    Ok(())
}

fn check_word(grammar: &Grammar) -> Result<(), CompileError> {
    let Some(word) = grammar.word() else {
        return Ok(());
    };
    let rule = grammar
        .rule(word)
        .ok_or_else(|| CompileError::InvalidWordRule(grammar.rule_name(word).to_string()))?;
    let resolve = |name: &str| grammar.resolve(name);
    if rule.body.is_terminal_body(&resolve) {
        Ok(())
    } else {
        Err(CompileError::InvalidWordRule(
            grammar.rule_name(word).to_string(),
        ))
    }
}

/// `inline` erases a rule from the tree; a supertype is a point of interest
/// in it. The two are mutually exclusive.
fn check_flags(grammar: &Grammar) -> Result<(), CompileError> {
    for rule in grammar.rules() {
        if grammar.is_inline(rule.name) && grammar.is_supertype(rule.name) {
            return Err(CompileError::ConflictingRuleFlags(
                grammar.rule_name(rule.name).to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::CompileError;
    use crate::grammar::builder::GrammarBuilder;
    use crate::grammar::dsl::*;
    use crate::lexer::{CharSet, Pattern};

    fn number() -> crate::grammar::RuleExpr {
        pattern(Pattern::repeat1(Pattern::class(CharSet::digits())))
    }

    #[test]
    fn undefined_reference_rejected() {
        let err = GrammarBuilder::new("bad")
            .rule("program", sym("expresion"))
            .build()
            .unwrap_err();
        assert_eq!(err, CompileError::UndefinedRule("expresion".to_string()));
    }

    #[test]
    fn empty_grammar_rejected() {
        let err = GrammarBuilder::new("empty").build().unwrap_err();
        assert_eq!(err, CompileError::EmptyGrammar);
    }

    #[test]
    fn extras_must_be_terminal() {
        let err = GrammarBuilder::new("bad")
            .rule("program", sym("pair"))
            .rule("pair", seq([sym("program"), sym("program")]))
            .extra(sym("pair"))
            .build()
            .unwrap_err();
        assert_eq!(err, CompileError::InvalidExtra("pair".to_string()));
    }

    #[test]
    fn extras_may_reference_terminal_rules() {
        let grammar = GrammarBuilder::new("ok")
            .rule("program", sym("comment"))
            .rule(
                "comment",
                token(seq([lit("//"), pattern(Pattern::until("\n", None))])),
            )
            .extra(sym("comment"))
            .build();
        assert!(grammar.is_ok());
    }

    #[test]
    fn word_must_be_terminal_rule() {
        let err = GrammarBuilder::new("bad")
            .rule("program", sym("call"))
            .rule("call", seq([sym("program"), lit("()")]))
            .word("call")
            .build()
            .unwrap_err();
        assert_eq!(err, CompileError::InvalidWordRule("call".to_string()));
    }

    #[test]
    fn inline_supertype_overlap_rejected() {
        let err = GrammarBuilder::new("bad")
            .rule("program", sym("_expression"))
            .rule("_expression", number())
            .inline("_expression")
            .supertype("_expression")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::ConflictingRuleFlags("_expression".to_string())
        );
    }
}
